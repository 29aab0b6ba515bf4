//! Canned configuration payloads shared by integration suites.

use serde_json::{Value, json};

/// A small, valid partial update touching two sections.
#[must_use]
pub fn valid_partial_update() -> Value {
    json!({
        "camera": {"fps": 20, "brightness": 10},
        "fatigue": {"ear_threshold": 0.3},
    })
}

/// A partial update whose `camera.fps` violates the declared 1..=30 range.
#[must_use]
pub fn out_of_range_update() -> Value {
    json!({
        "camera": {"fps": 50},
    })
}

/// A payload that is not a section/parameter tree at all.
#[must_use]
pub fn malformed_update() -> Value {
    json!({
        "camera": {"fps": [1, 2, 3]},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_have_the_expected_shapes() {
        assert!(valid_partial_update().get("camera").is_some());
        assert_eq!(out_of_range_update()["camera"]["fps"], json!(50));
        assert!(malformed_update()["camera"]["fps"].is_array());
    }
}
