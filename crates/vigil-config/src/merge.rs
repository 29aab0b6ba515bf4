//! Completion against canonical defaults and change summaries.

use std::collections::BTreeSet;

use crate::schema::ConfigSchema;
use crate::tree::ConfigTree;

/// Marker used when two trees hold identical values.
pub const NO_CHANGES: &str = "no changes";

/// Overlay a partial tree onto the canonical defaults, one level deep.
/// Parameters supplied in the partial win parameter-by-parameter; sections the
/// schema does not know pass through unchanged so device-side parameters newer
/// than this schema survive a round trip.
pub(crate) fn complete_tree(schema: &ConfigSchema, partial: &ConfigTree) -> ConfigTree {
    let mut completed = schema.defaults().clone();
    for (section, params) in &partial.0 {
        let merged = completed.0.entry(section.clone()).or_default();
        for (parameter, value) in params {
            merged.insert(parameter.clone(), value.clone());
        }
    }
    completed
}

/// Render a human-readable summary of every leaf that differs between two
/// full trees, one `section.parameter: old → new` entry per change.
#[must_use]
pub fn summarize_changes(before: &ConfigTree, after: &ConfigTree) -> String {
    let mut entries = Vec::new();
    let sections: BTreeSet<&String> = before.0.keys().chain(after.0.keys()).collect();
    for section in sections {
        let parameters: BTreeSet<&String> = before
            .section(section)
            .into_iter()
            .chain(after.section(section))
            .flat_map(|params| params.keys())
            .collect();
        for parameter in parameters {
            let old = before.get(section, parameter);
            let new = after.get(section, parameter);
            if old != new {
                let old = old.map_or_else(|| "(unset)".to_string(), ToString::to_string);
                let new = new.map_or_else(|| "(unset)".to_string(), ToString::to_string);
                entries.push(format!("{section}.{parameter}: {old} → {new}"));
            }
        }
    }
    if entries.is_empty() {
        NO_CHANGES.to_string()
    } else {
        entries.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ParamValue;

    fn schema() -> ConfigSchema {
        ConfigSchema::builtin()
    }

    #[test]
    fn completing_the_defaults_is_idempotent() {
        let schema = schema();
        assert_eq!(schema.complete(schema.defaults()), *schema.defaults());
    }

    #[test]
    fn completing_an_empty_tree_yields_the_defaults() {
        let schema = schema();
        assert_eq!(schema.complete(&ConfigTree::new()), *schema.defaults());
    }

    #[test]
    fn partial_overrides_win_parameter_by_parameter() {
        let schema = schema();
        let mut partial = ConfigTree::new();
        partial.set("camera", "fps", 25);
        let completed = schema.complete(&partial);

        assert_eq!(completed.get("camera", "fps"), Some(&ParamValue::Int(25)));
        // Untouched siblings keep their defaults.
        assert_eq!(
            completed.get("camera", "width"),
            schema.defaults().get("camera", "width")
        );
        // Every default parameter is present in the result.
        for (section, parameter, _) in schema.defaults().leaves() {
            assert!(completed.get(section, parameter).is_some());
        }
    }

    #[test]
    fn unknown_sections_pass_through_unchanged() {
        let schema = schema();
        let mut partial = ConfigTree::new();
        partial.set("thermal", "poll_interval", 30);
        let completed = schema.complete(&partial);
        assert_eq!(
            completed.get("thermal", "poll_interval"),
            Some(&ParamValue::Int(30))
        );
    }

    #[test]
    fn unknown_parameters_within_known_sections_survive() {
        let schema = schema();
        let mut partial = ConfigTree::new();
        partial.set("camera", "rotation", 180);
        let completed = schema.complete(&partial);
        assert_eq!(
            completed.get("camera", "rotation"),
            Some(&ParamValue::Int(180))
        );
        assert_eq!(
            completed.get("camera", "fps"),
            schema.defaults().get("camera", "fps")
        );
    }

    #[test]
    fn validated_overrides_stay_valid_after_completion() {
        let schema = schema();
        let mut partial = ConfigTree::new();
        partial.set("camera", "fps", 10);
        partial.set("yawn", "mouth_threshold", 0.5);
        schema.validate(&partial).expect("partial should validate");
        schema
            .validate(&schema.complete(&partial))
            .expect("completed tree should validate");
    }

    #[test]
    fn summary_lists_each_changed_leaf() {
        let schema = schema();
        let before = schema.complete(&ConfigTree::new());
        let mut partial = ConfigTree::new();
        partial.set("camera", "fps", 20);
        partial.set("audio", "volume", 0.5);
        let after = schema.complete(&partial);

        let summary = summarize_changes(&before, &after);
        assert!(summary.contains("camera.fps: 15 → 20"), "summary: {summary}");
        assert!(
            summary.contains("audio.volume: 1 → 0.5"),
            "summary: {summary}"
        );
    }

    #[test]
    fn summary_marks_identical_trees() {
        let schema = schema();
        let tree = schema.complete(&ConfigTree::new());
        assert_eq!(summarize_changes(&tree, &tree), NO_CHANGES);
    }

    #[test]
    fn summary_renders_vanished_parameters_as_unset() {
        let mut before = ConfigTree::new();
        before.set("thermal", "poll_interval", 30);
        let after = ConfigTree::new();
        assert_eq!(
            summarize_changes(&before, &after),
            "thermal.poll_interval: 30 → (unset)"
        );
    }
}
