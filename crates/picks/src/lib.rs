pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod startup;

pub use api::routes::*;
pub use config::*;
pub use domain::{
    AddPlayer, Error as PicksError, EventCorrection, EventFilter, EventStore, PickBook,
    PicksStore, PlacePick, PlaceSeasonBet, Player, ReconcileReport, Reconciler, SeasonBook,
    SettleSeasonBets, SyncSummary,
};
pub use infra::db::*;
pub use infra::feed::{EventFeed, NbaFeedClient};
pub use startup::*;
