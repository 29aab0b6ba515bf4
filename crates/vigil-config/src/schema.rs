//! Canonical configuration schema: default tree plus declarative rules.
//!
//! # Design
//! - The schema is an immutable value built once at process start and passed
//!   explicitly into the validator and merge engine; there is no global state.
//! - Defaults and rules live in plain data tables below. Absence of a rule
//!   for a parameter means the parameter is unconstrained.

use std::collections::BTreeMap;

use crate::error::ConfigResult;
use crate::merge::complete_tree;
use crate::tree::{ConfigTree, ParamValue};
use crate::validate::validate_tree;

/// Declared type of one configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Integer parameter; non-integral candidates are rejected.
    Int,
    /// Floating point parameter; any numeric candidate is accepted.
    Float,
    /// Boolean parameter.
    Bool,
}

/// Declarative constraint for one `(section, parameter)` pair.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Declared parameter type.
    pub kind: ParamType,
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    /// Enumerated allowed values, when the parameter is restricted to a set.
    pub values: Option<Vec<i64>>,
}

/// Immutable schema value: canonical defaults plus the rule table.
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    defaults: ConfigTree,
    rules: BTreeMap<(String, String), ValidationRule>,
}

impl ConfigSchema {
    /// Build a schema from an explicit default tree and rule set.
    #[must_use]
    pub fn new(
        defaults: ConfigTree,
        rules: impl IntoIterator<Item = ((String, String), ValidationRule)>,
    ) -> Self {
        Self {
            defaults,
            rules: rules.into_iter().collect(),
        }
    }

    /// The schema shipped with the fleet console.
    #[must_use]
    pub fn builtin() -> Self {
        let mut defaults = ConfigTree::new();
        for (section, parameter, value) in DEFAULTS {
            defaults.set(section, parameter, value.clone());
        }
        let rules = RULES.iter().map(|spec| {
            (
                (spec.section.to_string(), spec.parameter.to_string()),
                ValidationRule {
                    kind: spec.kind,
                    min: spec.min,
                    max: spec.max,
                    values: if spec.values.is_empty() {
                        None
                    } else {
                        Some(spec.values.to_vec())
                    },
                },
            )
        });
        Self::new(defaults, rules)
    }

    /// Canonical default tree.
    #[must_use]
    pub const fn defaults(&self) -> &ConfigTree {
        &self.defaults
    }

    /// Rule declared for one parameter, if any.
    #[must_use]
    pub fn rule(&self, section: &str, parameter: &str) -> Option<&ValidationRule> {
        self.rules
            .get(&(section.to_string(), parameter.to_string()))
    }

    /// Declared rules in deterministic `(section, parameter)` order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &str, &ValidationRule)> {
        self.rules
            .iter()
            .map(|((section, parameter), rule)| (section.as_str(), parameter.as_str(), rule))
    }

    /// Check every ruled parameter present in `candidate`, stopping at the
    /// first violation. Parameters absent from the candidate are skipped;
    /// completeness is the merge engine's concern.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::Validation`] naming the first offending
    /// section, parameter, and constraint.
    pub fn validate(&self, candidate: &ConfigTree) -> ConfigResult<()> {
        validate_tree(self, candidate)
    }

    /// Complete a partial tree against the canonical defaults, section by
    /// section. The result always contains every default parameter; sections
    /// unknown to the schema pass through unchanged.
    #[must_use]
    pub fn complete(&self, partial: &ConfigTree) -> ConfigTree {
        complete_tree(self, partial)
    }
}

struct RuleSpec {
    section: &'static str,
    parameter: &'static str,
    kind: ParamType,
    min: Option<f64>,
    max: Option<f64>,
    values: &'static [i64],
}

#[allow(clippy::cast_precision_loss)]
const fn int_range(
    section: &'static str,
    parameter: &'static str,
    min: i64,
    max: i64,
) -> RuleSpec {
    RuleSpec {
        section,
        parameter,
        kind: ParamType::Int,
        min: Some(min as f64),
        max: Some(max as f64),
        values: &[],
    }
}

const fn float_range(
    section: &'static str,
    parameter: &'static str,
    min: f64,
    max: f64,
) -> RuleSpec {
    RuleSpec {
        section,
        parameter,
        kind: ParamType::Float,
        min: Some(min),
        max: Some(max),
        values: &[],
    }
}

const fn int_values(
    section: &'static str,
    parameter: &'static str,
    values: &'static [i64],
) -> RuleSpec {
    RuleSpec {
        section,
        parameter,
        kind: ParamType::Int,
        min: None,
        max: None,
        values,
    }
}

const fn boolean(section: &'static str, parameter: &'static str) -> RuleSpec {
    RuleSpec {
        section,
        parameter,
        kind: ParamType::Bool,
        min: None,
        max: None,
        values: &[],
    }
}

#[derive(Debug, Clone)]
enum DefaultValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'static str),
}

impl From<DefaultValue> for ParamValue {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Int(v) => Self::Int(v),
            DefaultValue::Float(v) => Self::Float(v),
            DefaultValue::Bool(v) => Self::Bool(v),
            DefaultValue::Text(v) => Self::Text(v.to_string()),
        }
    }
}

use DefaultValue::{Bool, Float, Int, Text};

/// Canonical per-device defaults, one row per leaf parameter.
const DEFAULTS: &[(&str, &str, DefaultValue)] = &[
    ("camera", "fps", Int(15)),
    ("camera", "width", Int(640)),
    ("camera", "height", Int(480)),
    ("camera", "brightness", Int(0)),
    ("camera", "contrast", Int(0)),
    ("camera", "saturation", Int(0)),
    ("camera", "exposure", Int(-1)),
    ("camera", "buffer_size", Int(1)),
    ("camera", "use_threading", Bool(true)),
    ("camera", "warmup_time", Int(2)),
    ("fatigue", "eye_closed_threshold", Float(1.5)),
    ("fatigue", "ear_threshold", Float(0.25)),
    ("fatigue", "ear_night_adjustment", Float(0.03)),
    ("fatigue", "window_size", Int(600)),
    ("fatigue", "frames_to_confirm", Int(2)),
    ("fatigue", "calibration_period", Int(30)),
    ("fatigue", "alarm_cooldown", Int(5)),
    ("fatigue", "multiple_fatigue_threshold", Int(3)),
    ("fatigue", "night_mode_threshold", Int(50)),
    ("fatigue", "enable_night_mode", Bool(true)),
    ("yawn", "mouth_threshold", Float(0.7)),
    ("yawn", "duration_threshold", Float(2.5)),
    ("yawn", "window_size", Int(600)),
    ("yawn", "frames_to_confirm", Int(3)),
    ("yawn", "alert_cooldown", Float(5.0)),
    ("yawn", "max_yawns_before_alert", Int(3)),
    ("yawn", "report_delay", Float(2.0)),
    ("yawn", "enable_auto_calibration", Bool(true)),
    ("yawn", "calibration_frames", Int(60)),
    ("yawn", "calibration_factor", Float(0.4)),
    ("yawn", "enable_sounds", Bool(true)),
    ("distraction", "rotation_threshold_day", Float(2.6)),
    ("distraction", "rotation_threshold_night", Float(2.8)),
    ("distraction", "extreme_rotation_threshold", Float(2.5)),
    ("distraction", "level1_time", Int(3)),
    ("distraction", "level2_time", Int(5)),
    ("distraction", "visibility_threshold", Int(15)),
    ("distraction", "frames_without_face_limit", Int(5)),
    ("distraction", "confidence_threshold", Float(0.7)),
    ("distraction", "prediction_buffer_size", Int(10)),
    ("distraction", "distraction_window", Int(600)),
    ("distraction", "min_frames_for_reset", Int(10)),
    ("distraction", "audio_enabled", Bool(true)),
    ("distraction", "level1_volume", Float(0.8)),
    ("distraction", "level2_volume", Float(1.0)),
    ("distraction", "camera_fps", Int(4)),
    ("behavior", "confidence_threshold", Float(0.4)),
    ("behavior", "night_confidence_threshold", Float(0.35)),
    ("behavior", "night_mode_threshold", Int(50)),
    ("behavior", "night_image_alpha", Float(1.3)),
    ("behavior", "night_image_beta", Int(40)),
    ("behavior", "phone_alert_threshold_1", Int(3)),
    ("behavior", "phone_alert_threshold_2", Int(7)),
    ("behavior", "cigarette_pattern_window", Int(30)),
    ("behavior", "cigarette_pattern_threshold", Int(3)),
    ("behavior", "cigarette_continuous_threshold", Int(7)),
    ("behavior", "face_proximity_factor", Int(2)),
    ("behavior", "detection_timeout", Float(1.0)),
    ("behavior", "audio_enabled", Bool(true)),
    ("audio", "enabled", Bool(true)),
    ("audio", "volume", Float(1.0)),
    ("audio", "frequency", Int(44100)),
    ("audio", "size", Int(-16)),
    ("audio", "channels", Int(2)),
    ("audio", "buffer", Int(2048)),
    ("system", "enable_gui", Bool(false)),
    ("system", "log_level", Text("INFO")),
    ("system", "debug_mode", Bool(false)),
    ("system", "performance_monitoring", Bool(true)),
    ("system", "auto_optimization", Bool(true)),
    ("system", "startup_timeout", Int(30)),
    ("system", "module_init_timeout", Int(10)),
    ("sync", "enabled", Bool(true)),
    ("sync", "auto_sync_interval", Int(300)),
    ("sync", "batch_size", Int(50)),
    ("sync", "connection_timeout", Int(10)),
    ("sync", "read_timeout", Int(30)),
    ("sync", "max_retries", Int(3)),
    ("sync", "retry_delay", Int(5)),
    ("sync", "max_local_events", Int(10000)),
    ("sync", "cleanup_days", Int(30)),
];

/// Declared constraints. Parameters without a row accept any value.
const RULES: &[RuleSpec] = &[
    int_range("camera", "fps", 1, 30),
    int_values("camera", "width", &[320, 640, 800, 1024, 1280]),
    int_values("camera", "height", &[240, 480, 600, 768, 720]),
    int_range("camera", "brightness", -100, 100),
    int_range("camera", "contrast", -100, 100),
    int_range("camera", "saturation", -100, 100),
    int_range("camera", "buffer_size", 1, 5),
    boolean("camera", "use_threading"),
    int_range("camera", "warmup_time", 0, 10),
    float_range("fatigue", "eye_closed_threshold", 0.5, 5.0),
    float_range("fatigue", "ear_threshold", 0.1, 0.5),
    float_range("fatigue", "ear_night_adjustment", 0.01, 0.1),
    int_range("fatigue", "frames_to_confirm", 1, 10),
    int_range("fatigue", "calibration_period", 10, 120),
    int_range("fatigue", "alarm_cooldown", 1, 30),
    int_range("fatigue", "multiple_fatigue_threshold", 1, 10),
    int_range("fatigue", "night_mode_threshold", 10, 100),
    boolean("fatigue", "enable_night_mode"),
    float_range("yawn", "mouth_threshold", 0.3, 1.0),
    float_range("yawn", "duration_threshold", 1.0, 5.0),
    int_range("yawn", "frames_to_confirm", 1, 10),
    float_range("yawn", "alert_cooldown", 1.0, 30.0),
    int_range("yawn", "max_yawns_before_alert", 1, 10),
    float_range("yawn", "report_delay", 0.5, 10.0),
    int_range("yawn", "calibration_frames", 30, 120),
    float_range("yawn", "calibration_factor", 0.1, 1.0),
    float_range("distraction", "rotation_threshold_day", 1.0, 5.0),
    float_range("distraction", "rotation_threshold_night", 1.0, 5.0),
    float_range("distraction", "extreme_rotation_threshold", 1.0, 5.0),
    int_range("distraction", "level1_time", 1, 10),
    int_range("distraction", "level2_time", 2, 15),
    int_range("distraction", "visibility_threshold", 5, 50),
    int_range("distraction", "frames_without_face_limit", 1, 20),
    float_range("distraction", "confidence_threshold", 0.1, 1.0),
    float_range("distraction", "level1_volume", 0.1, 1.0),
    float_range("distraction", "level2_volume", 0.1, 1.0),
    float_range("behavior", "confidence_threshold", 0.1, 0.9),
    float_range("behavior", "night_confidence_threshold", 0.1, 0.9),
    int_range("behavior", "night_mode_threshold", 10, 100),
    int_range("behavior", "phone_alert_threshold_1", 1, 10),
    int_range("behavior", "phone_alert_threshold_2", 2, 20),
    int_range("behavior", "cigarette_pattern_window", 10, 60),
    int_range("behavior", "cigarette_pattern_threshold", 1, 10),
    int_range("behavior", "cigarette_continuous_threshold", 3, 30),
    float_range("behavior", "detection_timeout", 0.5, 5.0),
    boolean("audio", "enabled"),
    float_range("audio", "volume", 0.0, 1.0),
    int_values("audio", "frequency", &[22050, 44100, 48000]),
    int_values("audio", "channels", &[1, 2]),
    int_values("audio", "buffer", &[1024, 2048, 4096]),
    boolean("system", "enable_gui"),
    int_range("system", "startup_timeout", 10, 120),
    int_range("system", "module_init_timeout", 5, 60),
    boolean("sync", "enabled"),
    int_range("sync", "auto_sync_interval", 60, 3600),
    int_range("sync", "batch_size", 10, 500),
    int_range("sync", "connection_timeout", 5, 60),
    int_range("sync", "read_timeout", 10, 300),
    int_range("sync", "max_retries", 1, 10),
    int_range("sync", "retry_delay", 1, 30),
    int_range("sync", "max_local_events", 1000, 50000),
    int_range("sync", "cleanup_days", 1, 365),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_cover_every_ruled_parameter() {
        let schema = ConfigSchema::builtin();
        for (section, parameter, _) in schema.rules() {
            assert!(
                schema.defaults().get(section, parameter).is_some(),
                "rule for {section}.{parameter} has no default"
            );
        }
    }

    #[test]
    fn builtin_defaults_satisfy_their_own_rules() {
        let schema = ConfigSchema::builtin();
        schema
            .validate(schema.defaults())
            .expect("canonical defaults must validate");
    }

    #[test]
    fn rule_lookup_matches_the_table() {
        let schema = ConfigSchema::builtin();
        let fps = schema.rule("camera", "fps").expect("camera.fps rule");
        assert_eq!(fps.kind, ParamType::Int);
        assert_eq!(fps.min, Some(1.0));
        assert_eq!(fps.max, Some(30.0));
        assert!(fps.values.is_none());

        let frequency = schema.rule("audio", "frequency").expect("audio.frequency rule");
        assert_eq!(
            frequency.values.as_deref(),
            Some(&[22050, 44100, 48000][..])
        );

        assert!(schema.rule("system", "log_level").is_none());
    }
}
