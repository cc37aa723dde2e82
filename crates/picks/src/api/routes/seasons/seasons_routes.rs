use axum::{
    extract::{Path, Query, State},
    response::ErrorResponse,
    Json,
};
use log::{debug, error};
use picks_core::SeasonBet;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{PlaceSeasonBet, SeasonQuery},
    startup::AppState,
};

/// Champion or finals MVP bet, replaces the user's earlier pick of that kind
pub async fn place_season_bet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlaceSeasonBet>,
) -> Result<Json<SeasonBet>, ErrorResponse> {
    debug!("season bet: {:?}", body);
    state
        .seasons
        .place_bet(body)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error placing season bet: {:?}", e);
            e.into()
        })
}

pub async fn get_user_season_bets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<Vec<SeasonBet>>, ErrorResponse> {
    state
        .seasons
        .user_bets(user_id, query.season)
        .await
        .map(Json)
        .map_err(|e| {
            error!("error getting season bets for user {}: {:?}", user_id, e);
            e.into()
        })
}
