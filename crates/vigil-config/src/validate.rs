//! Rule evaluation for candidate configuration trees.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{ConfigSchema, ParamType, ValidationRule};
use crate::tree::{ConfigTree, ParamValue};

/// Check every ruled parameter present in the candidate, in deterministic
/// order, stopping at the first violation. Parameters the candidate omits are
/// skipped: partial updates are legal and completion happens later.
pub(crate) fn validate_tree(
    schema: &ConfigSchema,
    candidate: &ConfigTree,
) -> ConfigResult<()> {
    for (section, parameter, rule) in schema.rules() {
        if let Some(value) = candidate.get(section, parameter) {
            check_value(section, parameter, rule, value)?;
        }
    }
    Ok(())
}

fn check_value(
    section: &str,
    parameter: &str,
    rule: &ValidationRule,
    value: &ParamValue,
) -> ConfigResult<()> {
    let numeric = match rule.kind {
        ParamType::Int => match value.as_integral() {
            Some(integral) => Some(check_enumeration(section, parameter, rule, integral)?),
            None => {
                return Err(ConfigError::validation(
                    section,
                    parameter,
                    "must be an integer",
                ));
            }
        },
        ParamType::Float => match value.as_f64() {
            Some(numeric) => Some(numeric),
            None => {
                return Err(ConfigError::validation(
                    section,
                    parameter,
                    "must be a number",
                ));
            }
        },
        ParamType::Bool => {
            if matches!(value, ParamValue::Bool(_)) {
                None
            } else {
                return Err(ConfigError::validation(
                    section,
                    parameter,
                    "must be true or false",
                ));
            }
        }
    };

    if let Some(numeric) = numeric {
        check_range(section, parameter, rule, numeric)?;
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn check_enumeration(
    section: &str,
    parameter: &str,
    rule: &ValidationRule,
    integral: i64,
) -> ConfigResult<f64> {
    if let Some(values) = &rule.values
        && !values.contains(&integral)
    {
        let allowed = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConfigError::validation(
            section,
            parameter,
            format!("must be one of: {allowed}"),
        ));
    }
    Ok(integral as f64)
}

fn check_range(
    section: &str,
    parameter: &str,
    rule: &ValidationRule,
    numeric: f64,
) -> ConfigResult<()> {
    if let Some(min) = rule.min
        && numeric < min
    {
        return Err(ConfigError::validation(
            section,
            parameter,
            format!("must be at least {min}"),
        ));
    }
    if let Some(max) = rule.max
        && numeric > max
    {
        return Err(ConfigError::validation(
            section,
            parameter,
            format!("must be at most {max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConfigTree;

    fn schema() -> ConfigSchema {
        ConfigSchema::builtin()
    }

    fn single(section: &str, parameter: &str, value: impl Into<ParamValue>) -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.set(section, parameter, value);
        tree
    }

    fn expect_reason(result: ConfigResult<()>, expected: &str) {
        match result {
            Err(ConfigError::Validation { reason, .. }) => assert_eq!(reason, expected),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn accepts_values_inside_their_range() {
        let schema = schema();
        assert!(schema.validate(&single("camera", "fps", 20)).is_ok());
        assert!(
            schema
                .validate(&single("fatigue", "ear_threshold", 0.3))
                .is_ok()
        );
        assert!(
            schema
                .validate(&single("fatigue", "enable_night_mode", false))
                .is_ok()
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let schema = schema();
        expect_reason(
            schema.validate(&single("camera", "fps", 50)),
            "must be at most 30",
        );
        expect_reason(
            schema.validate(&single("camera", "fps", 0)),
            "must be at least 1",
        );
        expect_reason(
            schema.validate(&single("fatigue", "ear_threshold", 0.05)),
            "must be at least 0.1",
        );
    }

    #[test]
    fn integer_rules_reject_non_integral_values() {
        let schema = schema();
        expect_reason(
            schema.validate(&single("camera", "fps", 2.5)),
            "must be an integer",
        );
        expect_reason(
            schema.validate(&single("camera", "fps", "fast")),
            "must be an integer",
        );
        // An integral float carries an integer value and passes.
        assert!(schema.validate(&single("camera", "fps", 20.0)).is_ok());
    }

    #[test]
    fn float_rules_reject_non_numeric_values() {
        let schema = schema();
        expect_reason(
            schema.validate(&single("fatigue", "ear_threshold", true)),
            "must be a number",
        );
        // Integers are numeric and pass a float rule.
        expect_reason(
            schema.validate(&single("fatigue", "ear_threshold", 2)),
            "must be at most 0.5",
        );
    }

    #[test]
    fn bool_rules_reject_non_boolean_values() {
        let schema = schema();
        expect_reason(
            schema.validate(&single("audio", "enabled", 1)),
            "must be true or false",
        );
    }

    #[test]
    fn enumerated_rules_list_the_allowed_set() {
        let schema = schema();
        assert!(schema.validate(&single("audio", "frequency", 44100)).is_ok());
        expect_reason(
            schema.validate(&single("audio", "frequency", 32000)),
            "must be one of: 22050, 44100, 48000",
        );
    }

    #[test]
    fn unruled_parameters_accept_any_value() {
        let schema = schema();
        assert!(
            schema
                .validate(&single("system", "log_level", "TRACE"))
                .is_ok()
        );
        assert!(schema.validate(&single("system", "log_level", 42)).is_ok());
    }

    #[test]
    fn validation_is_fail_fast_in_section_order() {
        let schema = schema();
        let mut tree = ConfigTree::new();
        tree.set("camera", "fps", 50);
        tree.set("audio", "frequency", 32000);
        match schema.validate(&tree) {
            Err(ConfigError::Validation {
                section, parameter, ..
            }) => {
                assert_eq!(section, "audio");
                assert_eq!(parameter, "frequency");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn empty_candidate_passes() {
        assert!(schema().validate(&ConfigTree::new()).is_ok());
    }
}
