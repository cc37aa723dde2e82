use axum::{
    extract::{Path, Query, State},
    response::ErrorResponse,
    Json,
};
use log::{debug, error};
use picks_core::{Event, Standing, Wager};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{EventFilter, PlacePick, SeasonQuery, WagerViewer},
    startup::AppState,
};

pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<Event>>, ErrorResponse> {
    state
        .book
        .list_events(filter)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting events: {:?}", e);
            e.into()
        })
}

pub async fn get_event_wagers(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Query(viewer): Query<WagerViewer>,
) -> Result<Json<Vec<Wager>>, ErrorResponse> {
    state
        .book
        .list_event_wagers(&event_id, viewer.user_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting wagers for event {}: {:?}", event_id, e);
            e.into()
        })
}

pub async fn get_user_wagers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<Vec<Wager>>, ErrorResponse> {
    state
        .book
        .list_user_wagers(user_id, query.season)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting wagers for user {}: {:?}", user_id, e);
            e.into()
        })
}

pub async fn place_pick(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlacePick>,
) -> Result<Json<Wager>, ErrorResponse> {
    debug!("pick: {:?}", body);
    state
        .book
        .place_pick(body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error placing pick: {:?}", e);
            e.into()
        })
}

/// Defaults to the current season
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<Vec<Standing>>, ErrorResponse> {
    let season = state.seasons.resolve_season(query.season);
    state.book.leaderboard(season).await.map(Json).map_err(|e| {
        error!("error building season {} leaderboard: {:?}", season, e);
        e.into()
    })
}
