mod book;
mod store;

pub use book::*;
pub use store::*;

use async_trait::async_trait;
use picks_core::{Event, EventStatus, EventType, Round, Wager};
use std::fmt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::Error;

/// Persistence the scoring pass and the feed sync run against
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, Error>;
    async fn upsert_event(&self, event: &Event) -> Result<(), Error>;
    async fn list_users(&self) -> Result<Vec<Uuid>, Error>;
    /// A row that no longer decodes is reported as `Error::MalformedRecord`
    async fn get_wager(&self, event_id: &str, user_id: Uuid) -> Result<Option<Wager>, Error>;
    /// Rows that fail to decode are skipped
    async fn list_wagers_for_event(&self, event_id: &str) -> Result<Vec<Wager>, Error>;
    /// Inserts, or updates every field except the id and the pinned scoring rule
    async fn upsert_wager(&self, wager: &Wager) -> Result<(), Error>;
    /// Overwrites the (event, user) row in full, pinned rule included. Only
    /// for rows that no longer decode.
    async fn replace_wager(&self, wager: &Wager) -> Result<(), Error>;
    async fn list_event_ids_missing_final_score(
        &self,
        event_type: EventType,
    ) -> Result<Vec<String>, Error>;
    /// Events no wager row points at yet
    async fn list_event_ids_not_yet_wagered(&self) -> Result<Vec<String>, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPlayer {
    /// Clients may bring their own id, otherwise one is generated
    pub id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacePick {
    pub event_id: String,
    pub user_id: Uuid,
    pub predicted_winner: String,
    pub margin_prediction: Option<i64>,
}

/// Admin patch for an event, unset fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventCorrection {
    pub round: Option<Round>,
    pub status: Option<EventStatus>,
    pub team1_score: Option<i64>,
    pub team2_score: Option<i64>,
    pub event_type: Option<EventType>,
}

impl EventCorrection {
    pub fn apply(&self, event: &mut Event) -> Result<(), Error> {
        if self.team1_score.is_some_and(|s| s < 0) || self.team2_score.is_some_and(|s| s < 0) {
            return Err(Error::BadRequest(String::from("scores can't be negative")));
        }
        if let Some(round) = self.round {
            event.round = round;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if self.team1_score.is_some() {
            event.team1_score = self.team1_score;
        }
        if self.team2_score.is_some() {
            event.team2_score = self.team2_score;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
    pub season: Option<i32>,
}

/// Who is looking at an event's wagers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WagerViewer {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickLogKind {
    InteractionStart,
    ValidationFailure,
    PlacementComplete,
    ServerError,
}

impl PickLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InteractionStart => "interaction_start",
            Self::ValidationFailure => "validation_failure",
            Self::PlacementComplete => "placement_complete",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for PickLogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PickLogKind {
    type Error = picks_core::CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "interaction_start" => Ok(Self::InteractionStart),
            "validation_failure" => Ok(Self::ValidationFailure),
            "placement_complete" => Ok(Self::PlacementComplete),
            "server_error" => Ok(Self::ServerError),
            val => Err(picks_core::CoreError::UnknownValue {
                kind: "pick log kind",
                value: val.to_string(),
            }),
        }
    }
}

/// One line of the pick audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickLogEntry {
    pub event_id: String,
    pub user_id: Uuid,
    pub predicted_winner: Option<String>,
    pub margin_prediction: Option<i64>,
    pub kind: PickLogKind,
    /// Failure reason for rejected or failed picks
    pub detail: Option<String>,
    /// Event details captured on a completed placement
    pub round: Option<Round>,
    pub event_type: Option<EventType>,
    #[serde(with = "time::serde::rfc3339")]
    pub logged_at: OffsetDateTime,
}

impl PickLogEntry {
    pub fn new(pick: &PlacePick, kind: PickLogKind) -> Self {
        Self {
            event_id: pick.event_id.clone(),
            user_id: pick.user_id,
            predicted_winner: Some(pick.predicted_winner.clone()),
            margin_prediction: pick.margin_prediction,
            kind,
            detail: None,
            round: None,
            event_type: None,
            logged_at: OffsetDateTime::now_utc(),
        }
    }
}
