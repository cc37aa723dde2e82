//! Validation of user picks

use crate::{CoreError, Event, EventType};

/// A best-of-seven series ends after four to seven games
pub const SERIES_LENGTHS: std::ops::RangeInclusive<i64> = 4..=7;

/// Validate a winner and margin prediction for an event
pub fn validate_pick(
    event: &Event,
    predicted_winner: &str,
    margin_prediction: Option<i64>,
) -> Result<(), CoreError> {
    if predicted_winner.is_empty() {
        return Err(CoreError::Validation("predicted winner required".into()));
    }

    if !event.has_team(predicted_winner) {
        return Err(CoreError::Validation(format!(
            "{} is not playing in event {} ({} vs {})",
            predicted_winner, event.id, event.team1, event.team2
        )));
    }

    if let Some(margin) = margin_prediction {
        if margin < 0 {
            return Err(CoreError::Validation(
                "margin prediction cannot be negative".into(),
            ));
        }
        if event.event_type == EventType::Series && !SERIES_LENGTHS.contains(&margin) {
            return Err(CoreError::Validation(format!(
                "a series lasts between {} and {} games, got {}",
                SERIES_LENGTHS.start(),
                SERIES_LENGTHS.end(),
                margin
            )));
        }
    }

    Ok(())
}
