use axum::{
    extract::{Path, State},
    response::ErrorResponse,
    Json,
};
use log::error;
use std::sync::Arc;

use crate::{
    domain::{
        AddPlayer, EventCorrection, PickLogEntry, Player, ReconcileReport, SettleSeasonBets,
        SyncSummary,
    },
    startup::AppState,
};
use picks_core::SeasonBet;

// Private routes, bind these to an internal interface only

pub async fn add_player(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddPlayer>,
) -> Result<Json<Player>, ErrorResponse> {
    state.book.add_player(body).await.map(Json).map_err(|e| {
        error!("error adding player: {:?}", e);
        e.into()
    })
}

pub async fn correct_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(body): Json<EventCorrection>,
) -> Result<Json<ReconcileReport>, ErrorResponse> {
    state
        .reconciler
        .correct_event(&event_id, body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error correcting event {}: {:?}", event_id, e);
            e.into()
        })
}

/// Runs a sync cycle now instead of waiting for the watcher
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncSummary>, ErrorResponse> {
    state.reconciler.sync_cycle().await.map(Json).map_err(|e| {
        error!("error running sync cycle: {:?}", e);
        e.into()
    })
}

pub async fn settle_season_bets(
    State(state): State<Arc<AppState>>,
    Path(season): Path<i32>,
    Json(body): Json<SettleSeasonBets>,
) -> Result<Json<Vec<SeasonBet>>, ErrorResponse> {
    state
        .seasons
        .settle(season, body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error settling season {}: {:?}", season, e);
            e.into()
        })
}

pub async fn get_pick_log(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<PickLogEntry>>, ErrorResponse> {
    state
        .book
        .pick_log(&event_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error reading pick log for event {}: {:?}", event_id, e);
            e.into()
        })
}
