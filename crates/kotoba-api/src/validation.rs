use crate::error::ApiError;

/// Item types the content catalog knows about
const VALID_ITEM_TYPES: &[&str] = &["radical", "kanji", "vocabulary", "grammar"];

/// Levels the curriculum spans
const LEVEL_RANGE: std::ops::RangeInclusive<i32> = 1..=60;

/// Largest queue a session endpoint will assemble
const MAX_QUEUE_LIMIT: i64 = 500;

/// Validate a learning-item type label.
pub fn validate_item_type(item_type: &str) -> Result<(), ApiError> {
    if !VALID_ITEM_TYPES.contains(&item_type) {
        return Err(ApiError::Validation(format!(
            "invalid item type: '{item_type}'. Must be one of: radical, kanji, vocabulary, grammar"
        )));
    }
    Ok(())
}

/// Validate a curriculum level.
pub fn validate_level(level: i32) -> Result<(), ApiError> {
    if !LEVEL_RANGE.contains(&level) {
        return Err(ApiError::Validation(format!(
            "invalid level: {level}. Must be between 1 and 60"
        )));
    }
    Ok(())
}

/// Validate a session queue limit.
pub fn validate_limit(limit: i64) -> Result<(), ApiError> {
    if limit < 1 || limit > MAX_QUEUE_LIMIT {
        return Err(ApiError::Validation(format!(
            "invalid limit: {limit}. Must be between 1 and {MAX_QUEUE_LIMIT}"
        )));
    }
    Ok(())
}
