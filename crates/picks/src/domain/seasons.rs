use std::sync::Arc;

use log::{info, warn};
use picks_core::{validate_season_pick, SeasonBet, SeasonBetKind};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Error, PicksStore};
use crate::config::SeasonSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceSeasonBet {
    pub user_id: Uuid,
    /// Current season when unset
    pub season: Option<i32>,
    pub kind: SeasonBetKind,
    pub pick: String,
}

/// Admin settlement of one kind of season bet once the answer is known
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleSeasonBets {
    pub kind: SeasonBetKind,
    pub answer: String,
    pub points: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonQuery {
    pub season: Option<i32>,
}

/// Champion and finals MVP bets, open until the season's deadline
pub struct SeasonBook {
    store: Arc<PicksStore>,
    settings: SeasonSettings,
}

impl SeasonBook {
    pub fn new(store: Arc<PicksStore>, settings: SeasonSettings) -> Self {
        Self { store, settings }
    }

    pub fn resolve_season(&self, season: Option<i32>) -> i32 {
        season.unwrap_or(self.settings.current_season)
    }

    pub fn deadline(&self, season: i32, kind: SeasonBetKind) -> Result<OffsetDateTime, Error> {
        let config = self
            .settings
            .season(season)
            .ok_or_else(|| Error::BadRequest(format!("season {} is not configured", season)))?;
        Ok(match kind {
            SeasonBetKind::Champion => config.champion_deadline,
            SeasonBetKind::FinalsMvp => config.mvp_deadline,
        })
    }

    pub async fn place_bet(&self, bet: PlaceSeasonBet) -> Result<SeasonBet, Error> {
        self.place_bet_at(bet, OffsetDateTime::now_utc()).await
    }

    /// Closed from the deadline onwards. Re-betting replaces the pick and
    /// keeps the bet's id.
    pub async fn place_bet_at(
        &self,
        bet: PlaceSeasonBet,
        now: OffsetDateTime,
    ) -> Result<SeasonBet, Error> {
        let season = self.resolve_season(bet.season);
        let deadline = self.deadline(season, bet.kind)?;
        if now >= deadline {
            return Err(Error::SeasonClosed {
                season,
                kind: bet.kind,
                deadline,
            });
        }

        if self.store.get_player(bet.user_id).await?.is_none() {
            return Err(Error::NotFound(format!("user {} not found", bet.user_id)));
        }

        let pick = validate_season_pick(bet.kind, &bet.pick)?;
        let season_bet = match self.store.get_season_bet(bet.user_id, season, bet.kind).await {
            Ok(Some(mut existing)) => {
                existing.pick = pick;
                existing
            }
            Ok(None) => SeasonBet::new(bet.user_id, season, bet.kind, pick),
            Err(Error::MalformedRecord(reason)) => {
                warn!("replacing unreadable season bet: {}", reason);
                SeasonBet::new(bet.user_id, season, bet.kind, pick)
            }
            Err(e) => return Err(e),
        };
        self.store.upsert_season_bet(&season_bet).await?;

        info!(
            "user {} bet {} on {} for season {}",
            season_bet.user_id, season_bet.pick, season_bet.kind, season
        );
        Ok(season_bet)
    }

    pub async fn user_bets(
        &self,
        user_id: Uuid,
        season: Option<i32>,
    ) -> Result<Vec<SeasonBet>, Error> {
        self.store
            .list_user_season_bets(user_id, self.resolve_season(season))
            .await
    }

    /// Scores every bet of `kind` in the season against the answer
    pub async fn settle(
        &self,
        season: i32,
        settlement: SettleSeasonBets,
    ) -> Result<Vec<SeasonBet>, Error> {
        if settlement.points < 0 {
            return Err(Error::BadRequest(String::from("points can't be negative")));
        }
        let answer = validate_season_pick(settlement.kind, &settlement.answer)?;

        let mut settled = vec![];
        for mut bet in self.store.list_season_bets(season).await? {
            if bet.kind != settlement.kind {
                continue;
            }
            bet.settle(&answer, settlement.points);
            self.store.upsert_season_bet(&bet).await?;
            settled.push(bet);
        }

        info!(
            "settled {} {} bets for season {} on {}",
            settled.len(),
            settlement.kind,
            season,
            answer
        );
        Ok(settled)
    }
}
