//! Rule table mapping (round, event type) to the base points for a correct pick

use serde::{Deserialize, Serialize};

use crate::{CoreError, EventType, Round};

/// Identifies the scoring rule pinned to a wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Fallback for rounds without a scale, always awards 0
    F0,
    PlayinGame,
    FirstRoundGame,
    FirstRoundSeries,
    SecondRoundGame,
    SecondRoundSeries,
    ConferenceGame,
    ConferenceSeries,
    FinalsGame,
    FinalsSeries,
}

/// Total lookup, anything without an entry in the table falls back to `F0`
pub fn resolve_scoring_rule(round: Round, event_type: EventType) -> RuleId {
    match (round, event_type) {
        (Round::Playin, EventType::Game) => RuleId::PlayinGame,
        (Round::FirstRound, EventType::Game) => RuleId::FirstRoundGame,
        (Round::FirstRound, EventType::Series) => RuleId::FirstRoundSeries,
        (Round::SecondRound, EventType::Game) => RuleId::SecondRoundGame,
        (Round::SecondRound, EventType::Series) => RuleId::SecondRoundSeries,
        (Round::Conference, EventType::Game) => RuleId::ConferenceGame,
        (Round::Conference, EventType::Series) => RuleId::ConferenceSeries,
        (Round::Finals, EventType::Game) => RuleId::FinalsGame,
        (Round::Finals, EventType::Series) => RuleId::FinalsSeries,
        // No play-in series exist and unset rounds have no scale
        (Round::Playin, EventType::Series) | (Round::Unset, _) => RuleId::F0,
    }
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F0 => "f0",
            Self::PlayinGame => "playin_game",
            Self::FirstRoundGame => "first_round_game",
            Self::FirstRoundSeries => "first_round_series",
            Self::SecondRoundGame => "second_round_game",
            Self::SecondRoundSeries => "second_round_series",
            Self::ConferenceGame => "conference_game",
            Self::ConferenceSeries => "conference_series",
            Self::FinalsGame => "finals_game",
            Self::FinalsSeries => "finals_series",
        }
    }

    /// Points for a correct winner pick under this rule
    pub fn base_points(&self) -> i64 {
        match self {
            Self::F0 => 0,
            Self::PlayinGame => 2,
            Self::FirstRoundGame | Self::FirstRoundSeries => 4,
            Self::SecondRoundGame | Self::SecondRoundSeries => 8,
            Self::ConferenceGame => 2,
            Self::ConferenceSeries => 8,
            Self::FinalsGame => 4,
            Self::FinalsSeries => 12,
        }
    }

    pub fn score(&self, winner_correct: bool) -> i64 {
        if winner_correct {
            self.base_points()
        } else {
            0
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RuleId {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "f0" => Ok(Self::F0),
            "playin_game" => Ok(Self::PlayinGame),
            "first_round_game" => Ok(Self::FirstRoundGame),
            "first_round_series" => Ok(Self::FirstRoundSeries),
            "second_round_game" => Ok(Self::SecondRoundGame),
            "second_round_series" => Ok(Self::SecondRoundSeries),
            "conference_game" => Ok(Self::ConferenceGame),
            "conference_series" => Ok(Self::ConferenceSeries),
            "finals_game" => Ok(Self::FinalsGame),
            "finals_series" => Ok(Self::FinalsSeries),
            val => Err(CoreError::unknown("scoring rule", val)),
        }
    }
}
