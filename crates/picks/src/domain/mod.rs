mod locks;
pub mod picks;
mod reconciler;
mod seasons;
mod watcher;

pub use locks::*;
pub use picks::*;
pub use reconciler::*;
pub use seasons::*;
pub use watcher::*;

use picks_core::{CoreError, SeasonBetKind};
use thiserror::Error;
use time::OffsetDateTime;

use crate::infra::feed;

#[derive(Error, Debug)]
pub enum Error {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("problem querying db: {0}")]
    DbError(#[from] sqlx::Error),
    #[error("event feed request failed: {0}")]
    FeedFailed(#[from] feed::Error),
    #[error("picks for event {event_id} closed at {start_time}")]
    BettingClosed {
        event_id: String,
        start_time: OffsetDateTime,
    },
    #[error("{kind} picks for season {season} closed at {deadline}")]
    SeasonClosed {
        season: i32,
        kind: SeasonBetKind,
        deadline: OffsetDateTime,
    },
    #[error("{0}")]
    Validation(#[from] CoreError),
    /// A stored row exists but no longer decodes
    #[error("unreadable record: {0}")]
    MalformedRecord(String),
    #[error("background task failed: {0}")]
    Thread(String),
}
