//! Event and wager records shared between the scoring engine and the service

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{resolve_scoring_rule, CoreError, RuleId};

/// Lifecycle of a tracked event as reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Live,
    Final,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Final => "final",
        }
    }

    /// Maps the upstream numeric game status (1 scheduled, 2 live, 3 final)
    pub fn from_feed_code(code: i64) -> Self {
        match code {
            3 => Self::Final,
            2 => Self::Live,
            _ => Self::Scheduled,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EventStatus {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "live" => Ok(Self::Live),
            "final" => Ok(Self::Final),
            val => Err(CoreError::unknown("event status", val)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A single game, margin is the point differential
    Game,
    /// A best-of-seven series, margin is the number of games played
    Series,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Series => "series",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EventType {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "game" => Ok(Self::Game),
            "series" => Ok(Self::Series),
            val => Err(CoreError::unknown("event type", val)),
        }
    }
}

/// Competition stage, determines the point scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Round {
    Playin,
    FirstRound,
    SecondRound,
    Conference,
    Finals,
    /// Events fresh from the feed carry no round until one is assigned
    #[default]
    Unset,
}

impl Round {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playin => "playin",
            Self::FirstRound => "firstRound",
            Self::SecondRound => "secondRound",
            Self::Conference => "conference",
            Self::Finals => "finals",
            Self::Unset => "unset",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Round {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "playin" => Ok(Self::Playin),
            "firstRound" => Ok(Self::FirstRound),
            "secondRound" => Ok(Self::SecondRound),
            "conference" => Ok(Self::Conference),
            "finals" => Ok(Self::Finals),
            "unset" | "" => Ok(Self::Unset),
            val => Err(CoreError::unknown("round", val)),
        }
    }
}

/// A tracked game or series between two teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub team1: String,
    pub team2: String,
    /// Only populated once the event is final
    pub team1_score: Option<i64>,
    pub team2_score: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub status: EventStatus,
    pub event_type: EventType,
    #[serde(default)]
    pub round: Round,
}

impl Event {
    pub fn is_final(&self) -> bool {
        self.status == EventStatus::Final
    }

    pub fn final_scores(&self) -> Option<(i64, i64)> {
        if !self.is_final() {
            return None;
        }
        Some((self.team1_score?, self.team2_score?))
    }

    /// Team with the strictly greater final score. `None` while the event is
    /// not final, when a score is missing, or on a tie.
    pub fn winning_team(&self) -> Option<&str> {
        let (score1, score2) = self.final_scores()?;
        if score1 > score2 {
            Some(&self.team1)
        } else if score2 > score1 {
            Some(&self.team2)
        } else {
            None
        }
    }

    /// Point differential for a game, games played for a series
    pub fn actual_margin(&self) -> Option<i64> {
        let (score1, score2) = self.final_scores()?;
        match self.event_type {
            EventType::Game => Some((score1 - score2).abs()),
            EventType::Series => Some(score1 + score2),
        }
    }

    /// Playoffs run inside one calendar year, the year of the start is the season
    pub fn season(&self) -> i32 {
        self.start_time.year()
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.team1 == team || self.team2 == team
    }

    /// Folds a fresh feed observation into the stored record. Fields the feed
    /// leaves unset keep their stored values.
    ///
    /// The feed only knows the pairing of a series, so a series keeps its
    /// stored status and the start of its first game.
    pub fn refresh_from(&mut self, observed: Event) {
        self.team1 = observed.team1;
        self.team2 = observed.team2;
        if observed.team1_score.is_some() {
            self.team1_score = observed.team1_score;
        }
        if observed.team2_score.is_some() {
            self.team2_score = observed.team2_score;
        }
        if observed.round.is_set() {
            self.round = observed.round;
        }
        if self.event_type == EventType::Game {
            self.status = observed.status;
            self.start_time = observed.start_time;
        }
    }
}

/// One user's prediction for an event plus its scored outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub event_id: String,
    pub user_id: Uuid,
    pub predicted_winner: Option<String>,
    /// Point differential for a game, total games for a series
    pub margin_prediction: Option<i64>,
    /// Winning team, set once the event is final
    pub result: Option<String>,
    pub points_base: Option<i64>,
    pub points_bonus: Option<i64>,
    /// Pinned when the wager is created, never changed afterwards
    pub scoring_rule_ref: RuleId,
    #[serde(with = "time::serde::rfc3339")]
    pub close_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Wager {
    /// Empty wager for a user who has not picked yet, the scoring rule is
    /// pinned from the event's current round and type
    pub fn placeholder(event: &Event, user_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id: event.id.clone(),
            user_id,
            predicted_winner: None,
            margin_prediction: None,
            result: None,
            points_base: None,
            points_bonus: None,
            scoring_rule_ref: resolve_scoring_rule(event.round, event.event_type),
            close_time: event.start_time,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn picked(&self, team: &str) -> bool {
        self.predicted_winner.as_deref() == Some(team)
    }

    pub fn total_points(&self) -> i64 {
        self.points_base.unwrap_or(0) + self.points_bonus.unwrap_or(0)
    }
}
