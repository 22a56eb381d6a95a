//! Stable keys for listen units.
//!
//! A unit is addressed by `(block_id, position)`. Equal pairs always and only
//! produce equal ids, which lets registration merge in place and lets late
//! audio callbacks find their unit after the upstream list was rebuilt.

use listen_types::UnitId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitIdError {
    #[error("unit id '{0}' has no ':<position>' suffix")]
    MissingPosition(String),
    #[error("unit id '{0}' has an invalid position suffix")]
    InvalidPosition(String),
}

/// Coerces a raw position to a non-negative integer.
///
/// NaN, infinities and negatives become 0; fractions are floored.
pub fn normalize_position(raw: f64) -> u32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    let floored = raw.floor();
    if floored >= u32::MAX as f64 {
        u32::MAX
    } else {
        floored as u32
    }
}

/// Same rule as [`normalize_position`] for an untyped JSON value.
/// Numeric strings are accepted; anything else is 0.
pub fn normalize_position_value(value: Option<&serde_json::Value>) -> u32 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(normalize_position).unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().map(normalize_position).unwrap_or(0),
        _ => 0,
    }
}

pub fn build_unit_id(block_id: &str, position: f64) -> UnitId {
    unit_id(block_id, normalize_position(position))
}

/// Builds the id for an already normalized position.
pub fn unit_id(block_id: &str, position: u32) -> UnitId {
    UnitId::from_raw(format!("{}:{}", block_id.trim(), position))
}

/// Splits an id back into `(block_id, position)`.
pub fn parse_unit_id(id: &str) -> Result<(String, u32), UnitIdError> {
    let (block_id, suffix) = id
        .rsplit_once(':')
        .ok_or_else(|| UnitIdError::MissingPosition(id.to_string()))?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UnitIdError::InvalidPosition(id.to_string()));
    }
    let position = suffix
        .parse::<u32>()
        .map_err(|_| UnitIdError::InvalidPosition(id.to_string()))?;
    Ok((block_id.to_string(), position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_trims_block_and_floors_position() {
        assert_eq!(build_unit_id("  blk-1 ", 2.9).as_str(), "blk-1:2");
        assert_eq!(build_unit_id("blk-1", 0.0).as_str(), "blk-1:0");
    }

    #[test]
    fn test_invalid_positions_coerce_to_zero() {
        assert_eq!(build_unit_id("b", -3.0).as_str(), "b:0");
        assert_eq!(build_unit_id("b", f64::NAN).as_str(), "b:0");
        assert_eq!(build_unit_id("b", f64::INFINITY).as_str(), "b:0");
        assert_eq!(build_unit_id("b", f64::NEG_INFINITY).as_str(), "b:0");
    }

    #[test]
    fn test_parse_round_trips_normalized_pair() {
        let cases = [("blk", 4.0, 4), (" a:b ", 1.5, 1), ("x", -7.0, 0), ("", 3.0, 3)];
        for (block, position, expected) in cases {
            let id = build_unit_id(block, position);
            let (parsed_block, parsed_position) = parse_unit_id(id.as_str()).unwrap();
            assert_eq!(parsed_block, block.trim());
            assert_eq!(parsed_position, expected);
        }
    }

    #[test]
    fn test_parse_rejects_bad_suffix() {
        assert_eq!(
            parse_unit_id("no-position"),
            Err(UnitIdError::MissingPosition("no-position".to_string()))
        );
        assert!(matches!(parse_unit_id("blk:"), Err(UnitIdError::InvalidPosition(_))));
        assert!(matches!(parse_unit_id("blk:-1"), Err(UnitIdError::InvalidPosition(_))));
        assert!(matches!(parse_unit_id("blk:1.5"), Err(UnitIdError::InvalidPosition(_))));
        assert!(matches!(parse_unit_id("blk:99999999999"), Err(UnitIdError::InvalidPosition(_))));
    }

    #[test]
    fn test_position_from_json_value() {
        assert_eq!(normalize_position_value(Some(&serde_json::json!(3))), 3);
        assert_eq!(normalize_position_value(Some(&serde_json::json!(2.7))), 2);
        assert_eq!(normalize_position_value(Some(&serde_json::json!("5"))), 5);
        assert_eq!(normalize_position_value(Some(&serde_json::json!(-1))), 0);
        assert_eq!(normalize_position_value(Some(&serde_json::json!(null))), 0);
        assert_eq!(normalize_position_value(None), 0);
    }
}
