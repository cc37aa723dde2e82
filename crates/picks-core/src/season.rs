//! Season-long bets: the finals champion and the finals MVP

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::CoreError;

/// Longest accepted team or player name
pub const MAX_SEASON_PICK_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonBetKind {
    /// Team that wins the finals
    Champion,
    FinalsMvp,
}

impl SeasonBetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Champion => "champion",
            Self::FinalsMvp => "finals_mvp",
        }
    }
}

impl std::fmt::Display for SeasonBetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SeasonBetKind {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "champion" => Ok(Self::Champion),
            "finals_mvp" => Ok(Self::FinalsMvp),
            val => Err(CoreError::unknown("season bet kind", val)),
        }
    }
}

/// One user's season-long pick. At most one per (user, season, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonBet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub season: i32,
    pub kind: SeasonBetKind,
    /// Team name for a champion bet, player name for an MVP bet
    pub pick: String,
    /// Set once the season's answer is known
    pub points: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl SeasonBet {
    pub fn new(user_id: Uuid, season: i32, kind: SeasonBetKind, pick: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            season,
            kind,
            pick,
            points: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn picked(&self, answer: &str) -> bool {
        self.pick.eq_ignore_ascii_case(answer.trim())
    }

    /// Awards `points` for a matching pick and zero otherwise
    pub fn settle(&mut self, answer: &str, points: i64) {
        self.points = Some(if self.picked(answer) { points } else { 0 });
    }
}

/// Trims the pick and checks it is a plausible name
pub fn validate_season_pick(kind: SeasonBetKind, pick: &str) -> Result<String, CoreError> {
    let pick = pick.trim();
    if pick.is_empty() {
        return Err(CoreError::Validation(format!("{} pick required", kind)));
    }
    if pick.chars().count() > MAX_SEASON_PICK_LEN {
        return Err(CoreError::Validation(format!(
            "{} pick longer than {} characters",
            kind, MAX_SEASON_PICK_LEN
        )));
    }
    Ok(pick.to_string())
}
