//! Input validators
//!
//! Pure predicates. Every tab identifier, volume percentage and page address
//! arriving from outside the process passes through one of these before it
//! reaches state.

use serde_json::Value;

use super::tab::TabId;

/// Lowest accepted volume percentage
pub const MIN_VOLUME: u8 = 0;

/// Highest accepted volume percentage
pub const MAX_VOLUME: u8 = 100;

/// Longest page address used as a durable key
pub const MAX_ADDRESS_LEN: usize = 2048;

const TRACKED_SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// Browser tab identifiers are non-negative 32-bit integers
pub fn is_valid_tab_id(tab_id: TabId) -> bool {
    (0..=i64::from(i32::MAX)).contains(&tab_id)
}

/// Whether `volume` is a finite number within [0, 100]
pub fn is_valid_volume(volume: f64) -> bool {
    volume.is_finite() && (f64::from(MIN_VOLUME)..=f64::from(MAX_VOLUME)).contains(&volume)
}

/// Validate a volume percentage, rounding fractional values
pub fn validate_volume(volume: f64) -> Option<u8> {
    if is_valid_volume(volume) {
        Some(volume.round() as u8)
    } else {
        None
    }
}

/// Validate a stored volume value
///
/// Accepts JSON numbers and numeric strings (older records stored the
/// slider's string value).
pub fn validate_volume_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_f64().and_then(validate_volume),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(validate_volume),
        _ => None,
    }
}

/// Mute flags must be real booleans
pub fn is_valid_mute_flag(value: &Value) -> bool {
    value.is_boolean()
}

/// Normalize a page address into its durable key form
///
/// Only http(s) and file pages are remembered by address. The fragment is
/// dropped so in-page anchors share one record.
pub fn normalize_page_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if !TRACKED_SCHEMES.iter().any(|scheme| trimmed.starts_with(scheme)) {
        return None;
    }

    let without_fragment = match trimmed.find('#') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };

    if without_fragment.len() > MAX_ADDRESS_LEN || without_fragment.chars().any(char::is_whitespace) {
        return None;
    }
    Some(without_fragment.to_string())
}

/// Whether `address` can be used as a durable key
pub fn is_valid_page_address(address: &str) -> bool {
    normalize_page_address(address).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_tab_id_bounds() {
        assert!(is_valid_tab_id(0));
        assert!(is_valid_tab_id(42));
        assert!(is_valid_tab_id(i64::from(i32::MAX)));
        assert!(!is_valid_tab_id(-1));
        assert!(!is_valid_tab_id(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn test_volume_edges() {
        assert_eq!(validate_volume(0.0), Some(0));
        assert_eq!(validate_volume(100.0), Some(100));
        assert_eq!(validate_volume(49.6), Some(50));
        assert_eq!(validate_volume(-0.5), None);
        assert_eq!(validate_volume(100.01), None);
        assert_eq!(validate_volume(f64::NAN), None);
        assert_eq!(validate_volume(f64::INFINITY), None);
    }

    #[test]
    fn test_stored_volume_values() {
        assert_eq!(validate_volume_value(&json!(75)), Some(75));
        assert_eq!(validate_volume_value(&json!("30")), Some(30));
        assert_eq!(validate_volume_value(&json!("loud")), None);
        assert_eq!(validate_volume_value(&json!(null)), None);
        assert_eq!(validate_volume_value(&json!(true)), None);
        assert_eq!(validate_volume_value(&json!(250)), None);
    }

    #[test]
    fn test_mute_flag() {
        assert!(is_valid_mute_flag(&json!(true)));
        assert!(!is_valid_mute_flag(&json!("true")));
        assert!(!is_valid_mute_flag(&json!(1)));
    }

    #[test]
    fn test_page_address_normalization() {
        assert_eq!(
            normalize_page_address("https://example.com/watch?v=1#t=30"),
            Some("https://example.com/watch?v=1".to_string())
        );
        assert_eq!(
            normalize_page_address("  http://a.test/  "),
            Some("http://a.test/".to_string())
        );
        assert_eq!(normalize_page_address("chrome://extensions"), None);
        assert_eq!(normalize_page_address("about:blank"), None);
        assert_eq!(normalize_page_address(""), None);
        assert!(!is_valid_page_address("https://a.test/with space"));
    }

    proptest! {
        #[test]
        fn prop_volume_accepted_iff_in_range(v in -1000.0f64..1000.0) {
            let accepted = validate_volume(v).is_some();
            prop_assert_eq!(accepted, (0.0..=100.0).contains(&v));
        }

        #[test]
        fn prop_accepted_volume_is_in_range(v in 0.0f64..=100.0) {
            let stored = validate_volume(v).unwrap();
            prop_assert!(stored <= MAX_VOLUME);
        }
    }
}
