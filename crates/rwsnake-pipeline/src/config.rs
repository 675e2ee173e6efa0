//! Parameter marshaling: flat key/value configuration to typed parameters.
//!
//! Hosts hand over configuration as an untyped map of named values
//! (strings from a text field, numbers from a spinner, booleans from a
//! checkbox). [`marshal`] pulls the recognized keys out of a
//! [`RawConfig`], applies defaults for absent keys, validates ranges and
//! derives the secondary convergence threshold.
//!
//! Keys are matched case-insensitively, so `shrinkPower` and
//! `shrinkpower` address the same value.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Key names recognized by [`marshal`], in canonical spelling.
pub mod keys {
    /// Intensity-fidelity weight.
    pub const ALPHA: &str = "alpha";
    /// Edge-sensitivity weight.
    pub const BETA: &str = "beta";
    /// Maximum number of solver iterations.
    pub const ITER: &str = "iter";
    /// Primary relative convergence threshold.
    pub const RELIM: &str = "relim";
    /// Erosion distance for the foreground seed.
    pub const SHRINK_POWER: &str = "shrinkPower";
    /// Dilation distance for the background seed.
    pub const EXPAND_POWER: &str = "expandPower";
    /// Whether the solver uses local mean intensity.
    pub const LOCAL_MEAN: &str = "localMean";
    /// Local mean window size.
    pub const LM_WINDOW: &str = "LmWindow";
    /// Whether to post-filter the label mask.
    pub const CLEAN: &str = "clean";
    /// Whether to produce the seed composite preview.
    pub const MASK_PREVIEW: &str = "maskPreview";
    /// Mask limiting mode.
    pub const MASK_LIMITS: &str = "maskLimits";

    /// Every recognized key.
    pub const ALL: [&str; 11] = [
        ALPHA,
        BETA,
        ITER,
        RELIM,
        SHRINK_POWER,
        EXPAND_POWER,
        LOCAL_MEAN,
        LM_WINDOW,
        CLEAN,
        MASK_PREVIEW,
        MASK_LIMITS,
    ];
}

/// Divisor applied to the primary convergence threshold to obtain the
/// secondary one.
pub const RELIM_DIVISOR: f64 = 2.0;

/// Smallest accepted local mean window.
pub const MIN_LOCAL_MEAN_WINDOW: u32 = 3;

/// Largest accepted local mean window.
pub const MAX_LOCAL_MEAN_WINDOW: u32 = 101;

/// One untyped configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// A boolean, e.g. from a checkbox.
    Bool(bool),
    /// A number, e.g. from a spinner.
    Number(f64),
    /// Free text; numbers and booleans are parsed from it on demand.
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A flat key/value configuration with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawConfig(BTreeMap<String, ConfigValue>);

impl RawConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any entry whose key differs only in case.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        self.0.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        self.0.insert(key, value.into());
    }

    /// Look up a value by key, ignoring case.
    ///
    /// An exact match wins over a case-insensitive one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for RawConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (k, v) in iter {
            config.insert(k, v);
        }
        config
    }
}

/// How the engine output is constrained by the seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskLimit {
    /// The engine output is used as returned.
    #[default]
    None,
    /// Object pixels inside the background seed are discarded.
    Seeds,
}

impl fmt::Display for MaskLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Seeds => write!(f, "seeds"),
        }
    }
}

/// Strongly typed parameters for one refinement run.
///
/// Built by [`marshal`]; [`Default`] equals marshaling an empty
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParameters {
    /// Intensity-fidelity weight (> 0).
    pub alpha: f64,
    /// Edge-sensitivity weight (> 0).
    pub beta: f64,
    /// Maximum number of solver iterations (> 0).
    pub max_iterations: u32,
    /// Relative convergence thresholds: primary and derived secondary.
    pub relim: [f64; 2],
    /// Whether the solver uses local mean intensity from the rough mask.
    pub local_mean: bool,
    /// Local mean window size (odd, 3..=101).
    pub local_mean_window: u32,
    /// Erosion distance for the foreground seed, in pixels.
    pub shrink_distance: u8,
    /// Dilation distance for the background seed, in pixels.
    pub expand_distance: u8,
    /// Whether to post-filter the label mask.
    pub clean: bool,
    /// Whether to produce the seed composite preview.
    pub show_seeds: bool,
    /// How the engine output is constrained by the seeds.
    pub mask_limit: MaskLimit,
}

impl SegmentationParameters {
    /// Default intensity-fidelity weight.
    pub const DEFAULT_ALPHA: f64 = 400.0;
    /// Default edge-sensitivity weight.
    pub const DEFAULT_BETA: f64 = 50.0;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 10_000;
    /// Default primary convergence threshold.
    pub const DEFAULT_RELIM: f64 = 8e-3;
    /// Default local mean window.
    pub const DEFAULT_LOCAL_MEAN_WINDOW: u32 = 23;
    /// Default foreground erosion distance.
    pub const DEFAULT_SHRINK_DISTANCE: u8 = 10;
    /// Default background dilation distance.
    pub const DEFAULT_EXPAND_DISTANCE: u8 = 10;

    /// Check the invariants [`marshal`] enforces on values built by hand.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the key of the
    /// first field that is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (key, value) in [
            (keys::ALPHA, self.alpha),
            (keys::BETA, self.beta),
            (keys::RELIM, self.relim[0]),
            (keys::RELIM, self.relim[1]),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::invalid_parameter(
                    key,
                    format!("must be a finite number greater than 0, got {value}"),
                ));
            }
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::invalid_parameter(
                keys::ITER,
                "must be at least 1",
            ));
        }
        let window = self.local_mean_window;
        if !(MIN_LOCAL_MEAN_WINDOW..=MAX_LOCAL_MEAN_WINDOW).contains(&window) || window % 2 == 0 {
            return Err(PipelineError::invalid_parameter(
                keys::LM_WINDOW,
                format!(
                    "window must be odd and within \
                     {MIN_LOCAL_MEAN_WINDOW}..={MAX_LOCAL_MEAN_WINDOW}, got {window}"
                ),
            ));
        }
        Ok(())
    }

    /// Write every field back under its canonical key.
    ///
    /// Marshaling the result reproduces `self`.
    #[must_use]
    pub fn to_raw_config(&self) -> RawConfig {
        let mut raw = RawConfig::new();
        raw.insert(keys::ALPHA, self.alpha);
        raw.insert(keys::BETA, self.beta);
        raw.insert(keys::ITER, self.max_iterations);
        raw.insert(keys::RELIM, self.relim[0]);
        raw.insert(keys::SHRINK_POWER, u32::from(self.shrink_distance));
        raw.insert(keys::EXPAND_POWER, u32::from(self.expand_distance));
        raw.insert(keys::LOCAL_MEAN, self.local_mean);
        raw.insert(keys::LM_WINDOW, self.local_mean_window);
        raw.insert(keys::CLEAN, self.clean);
        raw.insert(keys::MASK_PREVIEW, self.show_seeds);
        raw.insert(keys::MASK_LIMITS, self.mask_limit.to_string());
        raw
    }
}

impl Default for SegmentationParameters {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            beta: Self::DEFAULT_BETA,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            relim: derive_relim(Self::DEFAULT_RELIM),
            local_mean: false,
            local_mean_window: Self::DEFAULT_LOCAL_MEAN_WINDOW,
            shrink_distance: Self::DEFAULT_SHRINK_DISTANCE,
            expand_distance: Self::DEFAULT_EXPAND_DISTANCE,
            clean: false,
            show_seeds: false,
            mask_limit: MaskLimit::None,
        }
    }
}

/// Primary and secondary convergence thresholds from the primary one.
#[must_use]
pub fn derive_relim(primary: f64) -> [f64; 2] {
    [primary, primary / RELIM_DIVISOR]
}

/// Build [`SegmentationParameters`] from a flat configuration.
///
/// Absent keys take the `DEFAULT_*` values of
/// [`SegmentationParameters`]. Unrecognized keys are ignored.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] naming the key of the
/// first value that has the wrong type or is out of range.
pub fn marshal(raw: &RawConfig) -> Result<SegmentationParameters, PipelineError> {
    for (key, _) in raw.iter() {
        if !keys::ALL.iter().any(|k| k.eq_ignore_ascii_case(key)) {
            log::debug!("ignoring unrecognized configuration key `{key}`");
        }
    }

    let defaults = SegmentationParameters::default();

    let alpha = read_positive(raw, keys::ALPHA, defaults.alpha)?;
    let beta = read_positive(raw, keys::BETA, defaults.beta)?;
    let max_iterations = read_int(
        raw,
        keys::ITER,
        defaults.max_iterations,
        1..=u32::MAX,
    )?;
    let relim = read_positive(raw, keys::RELIM, defaults.relim[0])?;
    let shrink_distance = read_int(
        raw,
        keys::SHRINK_POWER,
        defaults.shrink_distance,
        0..=u8::MAX,
    )?;
    let expand_distance = read_int(
        raw,
        keys::EXPAND_POWER,
        defaults.expand_distance,
        0..=u8::MAX,
    )?;
    let local_mean = read_bool(raw, keys::LOCAL_MEAN, defaults.local_mean)?;
    let local_mean_window = read_int(
        raw,
        keys::LM_WINDOW,
        defaults.local_mean_window,
        MIN_LOCAL_MEAN_WINDOW..=MAX_LOCAL_MEAN_WINDOW,
    )?;
    if local_mean_window % 2 == 0 {
        return Err(PipelineError::invalid_parameter(
            keys::LM_WINDOW,
            format!("window must be odd, got {local_mean_window}"),
        ));
    }
    let clean = read_bool(raw, keys::CLEAN, defaults.clean)?;
    let show_seeds = read_bool(raw, keys::MASK_PREVIEW, defaults.show_seeds)?;
    let mask_limit = read_mask_limit(raw, keys::MASK_LIMITS, defaults.mask_limit)?;

    Ok(SegmentationParameters {
        alpha,
        beta,
        max_iterations,
        relim: derive_relim(relim),
        local_mean,
        local_mean_window,
        shrink_distance,
        expand_distance,
        clean,
        show_seeds,
        mask_limit,
    })
}

/// Read a finite number.
fn read_number(raw: &RawConfig, key: &str) -> Result<Option<f64>, PipelineError> {
    let value = match raw.get(key) {
        None => return Ok(None),
        Some(ConfigValue::Number(n)) => *n,
        Some(ConfigValue::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
            PipelineError::invalid_parameter(key, format!("expected a number, got `{s}`"))
        })?,
        Some(ConfigValue::Bool(b)) => {
            return Err(PipelineError::invalid_parameter(
                key,
                format!("expected a number, got boolean {b}"),
            ));
        }
    };
    if value.is_finite() {
        Ok(Some(value))
    } else {
        Err(PipelineError::invalid_parameter(
            key,
            format!("expected a finite number, got {value}"),
        ))
    }
}

/// Read a strictly positive number.
fn read_positive(raw: &RawConfig, key: &str, default: f64) -> Result<f64, PipelineError> {
    match read_number(raw, key)? {
        None => Ok(default),
        Some(v) if v > 0.0 => Ok(v),
        Some(v) => Err(PipelineError::invalid_parameter(
            key,
            format!("must be greater than 0, got {v}"),
        )),
    }
}

/// Read an integral number within `range`.
///
/// `"100.0"` is accepted as 100; `"100.5"` is rejected.
fn read_int<T>(
    raw: &RawConfig,
    key: &str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, PipelineError>
where
    T: Copy + Into<f64> + TryFrom<u64> + fmt::Display,
{
    let Some(value) = read_number(raw, key)? else {
        return Ok(default);
    };
    let (lo, hi) = (*range.start(), *range.end());
    if value.fract() != 0.0 {
        return Err(PipelineError::invalid_parameter(
            key,
            format!("expected an integer, got {value}"),
        ));
    }
    if value < lo.into() || value > hi.into() {
        return Err(PipelineError::invalid_parameter(
            key,
            format!("must be in {lo}..={hi}, got {value}"),
        ));
    }
    // In range and integral, so the conversion is exact.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = value as u64;
    T::try_from(whole).map_err(|_| {
        PipelineError::invalid_parameter(key, format!("must be in {lo}..={hi}, got {value}"))
    })
}

/// Read a boolean from a bool or `true`/`false` text.
fn read_bool(raw: &RawConfig, key: &str, default: bool) -> Result<bool, PipelineError> {
    match raw.get(key) {
        None => Ok(default),
        Some(ConfigValue::Bool(b)) => Ok(*b),
        Some(ConfigValue::Text(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Some(ConfigValue::Text(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(PipelineError::invalid_parameter(
            key,
            format!("expected true or false, got `{other}`"),
        )),
    }
}

/// Read a [`MaskLimit`] from its name, or from a boolean toggle.
fn read_mask_limit(
    raw: &RawConfig,
    key: &str,
    default: MaskLimit,
) -> Result<MaskLimit, PipelineError> {
    match raw.get(key) {
        None => Ok(default),
        Some(ConfigValue::Bool(false)) => Ok(MaskLimit::None),
        Some(ConfigValue::Bool(true)) => Ok(MaskLimit::Seeds),
        Some(ConfigValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "none" | "false" => Ok(MaskLimit::None),
            "seeds" | "true" => Ok(MaskLimit::Seeds),
            _ => Err(PipelineError::invalid_parameter(
                key,
                format!("expected `none` or `seeds`, got `{s}`"),
            )),
        },
        Some(other) => Err(PipelineError::invalid_parameter(
            key,
            format!("expected `none` or `seeds`, got `{other}`"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Every recognized key set to a known, non-default value.
    fn full_config() -> RawConfig {
        [
            ("alpha", "400.0"),
            ("beta", "50.0"),
            ("iter", "100.0"),
            ("relim", "0.008"),
            ("shrinkPower", "2.0"),
            ("expandPower", "15"),
            ("localMean", "true"),
            ("LmWindow", "9.0"),
            ("clean", "true"),
            ("maskPreview", "true"),
            ("maskLimits", "seeds"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn defaults_and_marshaled_values_validate() {
        assert!(SegmentationParameters::default().validate().is_ok());
        let params = marshal(&full_config()).unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validate_rejects_hand_built_values() {
        let cases = [
            (
                SegmentationParameters {
                    local_mean_window: 8,
                    ..SegmentationParameters::default()
                },
                keys::LM_WINDOW,
            ),
            (
                SegmentationParameters {
                    local_mean_window: 1,
                    ..SegmentationParameters::default()
                },
                keys::LM_WINDOW,
            ),
            (
                SegmentationParameters {
                    alpha: -1.0,
                    ..SegmentationParameters::default()
                },
                keys::ALPHA,
            ),
            (
                SegmentationParameters {
                    beta: f64::NAN,
                    ..SegmentationParameters::default()
                },
                keys::BETA,
            ),
            (
                SegmentationParameters {
                    relim: [0.008, 0.0],
                    ..SegmentationParameters::default()
                },
                keys::RELIM,
            ),
            (
                SegmentationParameters {
                    max_iterations: 0,
                    ..SegmentationParameters::default()
                },
                keys::ITER,
            ),
        ];
        for (params, expected_key) in cases {
            let result = params.validate();
            assert!(
                matches!(result, Err(PipelineError::InvalidParameter { ref key, .. }) if key == expected_key),
                "expected InvalidParameter for {expected_key}, got {result:?}",
            );
        }
    }

    fn assert_invalid(raw: &RawConfig, expected_key: &str) {
        let result = marshal(raw);
        assert!(
            matches!(result, Err(PipelineError::InvalidParameter { ref key, .. }) if key == expected_key),
            "expected InvalidParameter for {expected_key}, got {result:?}",
        );
    }

    #[test]
    fn empty_config_yields_defaults() {
        let params = marshal(&RawConfig::new()).unwrap();
        assert_eq!(params, SegmentationParameters::default());
        assert_eq!(params.shrink_distance, 10);
        assert_eq!(params.expand_distance, 10);
        assert_eq!(params.mask_limit, MaskLimit::None);
    }

    #[test]
    fn full_config_marshals_every_field() {
        let params = marshal(&full_config()).unwrap();
        assert!((params.alpha - 400.0).abs() < f64::EPSILON);
        assert!((params.beta - 50.0).abs() < f64::EPSILON);
        assert_eq!(params.max_iterations, 100);
        assert_eq!(params.shrink_distance, 2);
        assert_eq!(params.expand_distance, 15);
        assert!(params.local_mean);
        assert_eq!(params.local_mean_window, 9);
        assert!(params.clean);
        assert!(params.show_seeds);
        assert_eq!(params.mask_limit, MaskLimit::Seeds);
    }

    #[test]
    fn secondary_threshold_is_half_the_primary() {
        let params = marshal(&full_config()).unwrap();
        assert_eq!(params.relim[0], 0.008);
        assert_eq!(params.relim[1], 0.008 / 2.0);
        assert_eq!(params.relim[1], 0.004);
    }

    #[test]
    fn keys_match_case_insensitively() {
        let raw: RawConfig = [("shrinkpower", "3"), ("LMWINDOW", "5"), ("LocalMean", "TRUE")]
            .into_iter()
            .collect();
        let params = marshal(&raw).unwrap();
        assert_eq!(params.shrink_distance, 3);
        assert_eq!(params.local_mean_window, 5);
        assert!(params.local_mean);
    }

    #[test]
    fn insert_replaces_key_differing_in_case() {
        let mut raw = RawConfig::new();
        raw.insert("alpha", 1.0);
        raw.insert("ALPHA", 2.0);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.get("Alpha"), Some(&ConfigValue::Number(2.0)));
    }

    #[test]
    fn marshal_is_idempotent() {
        let raw = full_config();
        assert_eq!(marshal(&raw).unwrap(), marshal(&raw).unwrap());
    }

    #[test]
    fn raw_config_round_trip_reproduces_parameters() {
        let params = marshal(&full_config()).unwrap();
        let again = marshal(&params.to_raw_config()).unwrap();
        assert_eq!(params, again);

        let defaults = SegmentationParameters::default();
        assert_eq!(marshal(&defaults.to_raw_config()).unwrap(), defaults);
    }

    #[test]
    fn typed_values_are_accepted() {
        let mut raw = RawConfig::new();
        raw.insert("alpha", 12.5);
        raw.insert("iter", 7_u32);
        raw.insert("clean", true);
        raw.insert("maskLimits", true);
        let params = marshal(&raw).unwrap();
        assert!((params.alpha - 12.5).abs() < f64::EPSILON);
        assert_eq!(params.max_iterations, 7);
        assert!(params.clean);
        assert_eq!(params.mask_limit, MaskLimit::Seeds);
    }

    #[test]
    fn even_window_is_rejected() {
        let raw: RawConfig = [("LmWindow", "8")].into_iter().collect();
        assert_invalid(&raw, keys::LM_WINDOW);
    }

    #[test]
    fn window_below_three_is_rejected() {
        let raw: RawConfig = [("LmWindow", "1")].into_iter().collect();
        assert_invalid(&raw, keys::LM_WINDOW);
    }

    #[test]
    fn non_positive_alpha_is_rejected() {
        let raw: RawConfig = [("alpha", "0")].into_iter().collect();
        assert_invalid(&raw, keys::ALPHA);
        let raw: RawConfig = [("beta", "-1")].into_iter().collect();
        assert_invalid(&raw, keys::BETA);
    }

    #[test]
    fn fractional_iteration_count_is_rejected() {
        let raw: RawConfig = [("iter", "10.5")].into_iter().collect();
        assert_invalid(&raw, keys::ITER);
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let raw: RawConfig = [("iter", "0")].into_iter().collect();
        assert_invalid(&raw, keys::ITER);
    }

    #[test]
    fn shrink_above_u8_is_rejected() {
        let raw: RawConfig = [("shrinkPower", "256")].into_iter().collect();
        assert_invalid(&raw, keys::SHRINK_POWER);
        let raw: RawConfig = [("expandPower", "-1")].into_iter().collect();
        assert_invalid(&raw, keys::EXPAND_POWER);
    }

    #[test]
    fn wrong_types_are_rejected() {
        let raw: RawConfig = [("relim", "fast")].into_iter().collect();
        assert_invalid(&raw, keys::RELIM);

        let mut raw = RawConfig::new();
        raw.insert("alpha", true);
        assert_invalid(&raw, keys::ALPHA);

        let raw: RawConfig = [("clean", "yes")].into_iter().collect();
        assert_invalid(&raw, keys::CLEAN);

        let mut raw = RawConfig::new();
        raw.insert("localMean", 1.0);
        assert_invalid(&raw, keys::LOCAL_MEAN);

        let raw: RawConfig = [("maskLimits", "everywhere")].into_iter().collect();
        assert_invalid(&raw, keys::MASK_LIMITS);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut raw = RawConfig::new();
        raw.insert("alpha", f64::INFINITY);
        assert_invalid(&raw, keys::ALPHA);
        let raw: RawConfig = [("beta", "NaN")].into_iter().collect();
        assert_invalid(&raw, keys::BETA);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw: RawConfig = [("gamma", "3")].into_iter().collect();
        assert_eq!(marshal(&raw).unwrap(), SegmentationParameters::default());
    }

    #[test]
    fn raw_config_deserializes_mixed_json() {
        let json = r#"{"alpha": 300, "localMean": true, "LmWindow": "7", "maskLimits": "none"}"#;
        let raw: RawConfig = serde_json::from_str(json).unwrap();
        assert_eq!(raw.get("alpha"), Some(&ConfigValue::Number(300.0)));
        assert_eq!(raw.get("localmean"), Some(&ConfigValue::Bool(true)));
        let params = marshal(&raw).unwrap();
        assert_eq!(params.local_mean_window, 7);
    }

    #[test]
    fn parameters_serde_round_trip() {
        let params = marshal(&full_config()).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: SegmentationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
