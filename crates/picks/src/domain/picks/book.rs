use std::sync::Arc;

use log::{debug, info, warn};
use picks_core::{tally_leaderboard, validate_pick, Event, Standing, Wager};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AddPlayer, EventFilter, EventStore, PickLogEntry, PickLogKind, PicksStore, PlacePick, Player,
};
use crate::domain::{Error, EventLocks};

/// User facing side of the service: taking picks and reading results
pub struct PickBook {
    store: Arc<PicksStore>,
    locks: Arc<EventLocks>,
}

impl PickBook {
    pub fn new(store: Arc<PicksStore>, locks: Arc<EventLocks>) -> Self {
        Self { store, locks }
    }

    pub async fn place_pick(&self, pick: PlacePick) -> Result<Wager, Error> {
        self.place_pick_at(pick, OffsetDateTime::now_utc()).await
    }

    /// Picks stay open up to and including the event's start time. Only the
    /// prediction fields of an existing wager are touched. Every attempt is
    /// written to the pick log along with how it ended.
    pub async fn place_pick_at(
        &self,
        pick: PlacePick,
        now: OffsetDateTime,
    ) -> Result<Wager, Error> {
        self.audit(PickLogEntry::new(&pick, PickLogKind::InteractionStart))
            .await;
        let mut entry = PickLogEntry::new(&pick, PickLogKind::PlacementComplete);

        match self.write_pick(pick, now).await {
            Ok((wager, event)) => {
                entry.round = Some(event.round);
                entry.event_type = Some(event.event_type);
                self.audit(entry).await;
                Ok(wager)
            }
            Err(e) => {
                entry.kind = match e {
                    Error::NotFound(_)
                    | Error::BadRequest(_)
                    | Error::Validation(_)
                    | Error::BettingClosed { .. } => PickLogKind::ValidationFailure,
                    _ => PickLogKind::ServerError,
                };
                entry.detail = Some(e.to_string());
                self.audit(entry).await;
                Err(e)
            }
        }
    }

    async fn write_pick(
        &self,
        pick: PlacePick,
        now: OffsetDateTime,
    ) -> Result<(Wager, Event), Error> {
        let _guard = self.locks.lock(&pick.event_id).await;

        let event = self
            .store
            .get_event(&pick.event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {} not found", pick.event_id)))?;

        if now > event.start_time {
            return Err(Error::BettingClosed {
                event_id: event.id,
                start_time: event.start_time,
            });
        }

        if self.store.get_player(pick.user_id).await?.is_none() {
            return Err(Error::NotFound(format!("user {} not found", pick.user_id)));
        }

        validate_pick(&event, &pick.predicted_winner, pick.margin_prediction)?;

        let (mut wager, repair) = match self.store.get_wager(&event.id, pick.user_id).await {
            Ok(Some(wager)) => (wager, false),
            Ok(None) => (Wager::placeholder(&event, pick.user_id), false),
            Err(Error::MalformedRecord(reason)) => {
                warn!("rebuilding unreadable wager before pick: {}", reason);
                (Wager::placeholder(&event, pick.user_id), true)
            }
            Err(e) => return Err(e),
        };
        wager.predicted_winner = Some(pick.predicted_winner);
        wager.margin_prediction = pick.margin_prediction;
        if repair {
            self.store.replace_wager(&wager).await?;
        } else {
            self.store.upsert_wager(&wager).await?;
        }

        debug!(
            "user {} picked {:?} by {:?} for event {}",
            wager.user_id, wager.predicted_winner, wager.margin_prediction, wager.event_id
        );

        Ok((wager, event))
    }

    /// The audit trail never blocks a pick
    async fn audit(&self, entry: PickLogEntry) {
        if let Err(e) = self.store.log_pick(&entry).await {
            warn!(
                "failed to log {} for user {} on event {}: {}",
                entry.kind, entry.user_id, entry.event_id, e
            );
        }
    }

    pub async fn pick_log(&self, event_id: &str) -> Result<Vec<PickLogEntry>, Error> {
        self.store.list_pick_log(event_id).await
    }

    pub async fn add_player(&self, player: AddPlayer) -> Result<Player, Error> {
        let player = self.store.add_player(player).await?;
        info!("registered player {} ({})", player.name, player.id);
        Ok(player)
    }

    pub async fn list_events(&self, filter: EventFilter) -> Result<Vec<Event>, Error> {
        self.store.list_events(&filter).await
    }

    pub async fn list_event_wagers(
        &self,
        event_id: &str,
        viewer: Option<Uuid>,
    ) -> Result<Vec<Wager>, Error> {
        self.list_event_wagers_at(event_id, viewer, OffsetDateTime::now_utc())
            .await
    }

    /// Until the event starts only the viewer's own prediction is shown
    pub async fn list_event_wagers_at(
        &self,
        event_id: &str,
        viewer: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<Vec<Wager>, Error> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {} not found", event_id)))?;

        let mut wagers = self.store.list_wagers_for_event(event_id).await?;
        if now <= event.start_time {
            for wager in wagers.iter_mut() {
                if Some(wager.user_id) != viewer {
                    wager.predicted_winner = None;
                    wager.margin_prediction = None;
                }
            }
        }
        Ok(wagers)
    }

    pub async fn list_user_wagers(
        &self,
        user_id: Uuid,
        season: Option<i32>,
    ) -> Result<Vec<Wager>, Error> {
        self.store.list_wagers_for_user(user_id, season).await
    }

    /// Game, series, champion and finals MVP points for one season
    pub async fn leaderboard(&self, season: i32) -> Result<Vec<Standing>, Error> {
        let players: Vec<(Uuid, String)> = self
            .store
            .list_players()
            .await?
            .into_iter()
            .map(|player| (player.id, player.name))
            .collect();
        let wagers = self.store.list_season_wagers(season).await?;
        let season_bets = self.store.list_season_bets(season).await?;

        Ok(tally_leaderboard(&players, &wagers, &season_bets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::DBConnection;
    use picks_core::{EventStatus, EventType, Round, RuleId, SeasonBet, SeasonBetKind};
    use sqlx::SqlitePool;
    use time::{macros::datetime, Duration};

    async fn setup(pool: SqlitePool) -> (Arc<PicksStore>, PickBook) {
        let store = Arc::new(PicksStore::new(DBConnection::new_with_pools(
            String::from("picks"),
            String::from(":memory:"),
            pool.clone(),
            pool,
        )));
        let book = PickBook::new(store.clone(), Arc::new(EventLocks::new()));
        (store, book)
    }

    fn series() -> Event {
        Event {
            id: "3012916608".to_string(),
            team1: "Celtics".to_string(),
            team2: "Knicks".to_string(),
            team1_score: None,
            team2_score: None,
            start_time: datetime!(2025-05-05 23:00 UTC),
            status: EventStatus::Scheduled,
            event_type: EventType::Series,
            round: Round::SecondRound,
        }
    }

    async fn player(book: &PickBook, name: &str) -> Uuid {
        book.add_player(AddPlayer {
            id: None,
            name: name.to_string(),
        })
        .await
        .unwrap()
        .id
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_pick_window_closes_at_start_time(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let event = series();
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        let pick = PlacePick {
            event_id: event.id.clone(),
            user_id: ana,
            predicted_winner: "Knicks".to_string(),
            margin_prediction: Some(6),
        };

        let at_start = book.place_pick_at(pick.clone(), event.start_time).await;
        assert!(at_start.is_ok());

        let late = book
            .place_pick_at(pick, event.start_time + Duration::seconds(1))
            .await;
        assert!(matches!(late, Err(Error::BettingClosed { .. })));
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_pick_validation(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let event = series();
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        let early = event.start_time - Duration::hours(2);

        let wrong_team = PlacePick {
            event_id: event.id.clone(),
            user_id: ana,
            predicted_winner: "Lakers".to_string(),
            margin_prediction: None,
        };
        let result = book.place_pick_at(wrong_team, early).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let short_series = PlacePick {
            event_id: event.id.clone(),
            user_id: ana,
            predicted_winner: "Celtics".to_string(),
            margin_prediction: Some(3),
        };
        let result = book.place_pick_at(short_series, early).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let missing_event = PlacePick {
            event_id: "3000000000".to_string(),
            user_id: ana,
            predicted_winner: "Celtics".to_string(),
            margin_prediction: Some(4),
        };
        let result = book.place_pick_at(missing_event, early).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let stranger = PlacePick {
            event_id: event.id.clone(),
            user_id: Uuid::now_v7(),
            predicted_winner: "Celtics".to_string(),
            margin_prediction: Some(4),
        };
        let result = book.place_pick_at(stranger, early).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_repick_updates_prediction_only(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let mut event = series();
        event.round = Round::Unset;
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        let early = event.start_time - Duration::hours(2);

        let first = book
            .place_pick_at(
                PlacePick {
                    event_id: event.id.clone(),
                    user_id: ana,
                    predicted_winner: "Knicks".to_string(),
                    margin_prediction: Some(7),
                },
                early,
            )
            .await
            .unwrap();
        assert_eq!(first.scoring_rule_ref, RuleId::F0);

        // Round assigned after the wager exists, the pinned rule does not move
        event.round = Round::SecondRound;
        store.upsert_event(&event).await.unwrap();

        let second = book
            .place_pick_at(
                PlacePick {
                    event_id: event.id.clone(),
                    user_id: ana,
                    predicted_winner: "Celtics".to_string(),
                    margin_prediction: Some(5),
                },
                early,
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.scoring_rule_ref, RuleId::F0);
        assert_eq!(second.predicted_winner.as_deref(), Some("Celtics"));
        assert_eq!(book.list_user_wagers(ana, None).await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_pick_attempts_are_logged(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let event = series();
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        let pick = PlacePick {
            event_id: event.id.clone(),
            user_id: ana,
            predicted_winner: "Knicks".to_string(),
            margin_prediction: Some(6),
        };

        book.place_pick_at(pick.clone(), event.start_time - Duration::hours(1))
            .await
            .unwrap();
        let late = book
            .place_pick_at(pick, event.start_time + Duration::minutes(5))
            .await;
        assert!(late.is_err());

        let log = book.pick_log(&event.id).await.unwrap();
        let kinds: Vec<PickLogKind> = log.iter().map(|entry| entry.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PickLogKind::InteractionStart,
                PickLogKind::PlacementComplete,
                PickLogKind::InteractionStart,
                PickLogKind::ValidationFailure,
            ]
        );
        assert_eq!(log[1].round, Some(Round::SecondRound));
        assert_eq!(log[1].event_type, Some(EventType::Series));
        assert_eq!(log[1].predicted_winner.as_deref(), Some("Knicks"));
        assert!(log[3].detail.as_deref().unwrap().contains("closed"));
        assert_eq!(log[3].round, None);
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_pick_rebuilds_unreadable_wager(pool: SqlitePool) {
        let (store, book) = setup(pool.clone()).await;
        let event = series();
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        sqlx::query(
            "INSERT INTO wagers (id, event_id, user_id, scoring_rule_ref, close_time, created_at, updated_at)
             VALUES (?, ?, ?, 'mystery_rule', 'soon', 'soon', 'soon')",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(&event.id)
        .bind(ana.to_string())
        .execute(&pool)
        .await
        .unwrap();

        let wager = book
            .place_pick_at(
                PlacePick {
                    event_id: event.id.clone(),
                    user_id: ana,
                    predicted_winner: "Celtics".to_string(),
                    margin_prediction: Some(5),
                },
                event.start_time - Duration::hours(1),
            )
            .await
            .unwrap();

        let stored = store.get_wager(&event.id, ana).await.unwrap().unwrap();
        assert_eq!(stored, wager);
        assert_eq!(stored.scoring_rule_ref, RuleId::SecondRoundSeries);
        assert_eq!(stored.predicted_winner.as_deref(), Some("Celtics"));
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_other_predictions_hidden_until_start(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let event = series();
        store.upsert_event(&event).await.unwrap();
        let ana = player(&book, "ana").await;
        let ben = player(&book, "ben").await;
        let early = event.start_time - Duration::hours(1);
        for (user_id, team) in [(ana, "Knicks"), (ben, "Celtics")] {
            book.place_pick_at(
                PlacePick {
                    event_id: event.id.clone(),
                    user_id,
                    predicted_winner: team.to_string(),
                    margin_prediction: Some(6),
                },
                early,
            )
            .await
            .unwrap();
        }

        let before = book
            .list_event_wagers_at(&event.id, Some(ana), early)
            .await
            .unwrap();
        assert_eq!(before.len(), 2);
        for wager in &before {
            if wager.user_id == ana {
                assert_eq!(wager.predicted_winner.as_deref(), Some("Knicks"));
            } else {
                assert_eq!(wager.predicted_winner, None);
                assert_eq!(wager.margin_prediction, None);
            }
        }

        let anonymous = book
            .list_event_wagers_at(&event.id, None, event.start_time)
            .await
            .unwrap();
        assert!(anonymous.iter().all(|w| w.predicted_winner.is_none()));

        let after = book
            .list_event_wagers_at(&event.id, None, event.start_time + Duration::seconds(1))
            .await
            .unwrap();
        assert!(after.iter().all(|w| w.predicted_winner.is_some()));
    }

    #[sqlx::test(migrations = "./migrations/picks")]
    async fn test_leaderboard_is_per_season(pool: SqlitePool) {
        let (store, book) = setup(pool).await;
        let ana = player(&book, "ana").await;
        let ben = player(&book, "ben").await;

        let mut this_year = series();
        this_year.status = EventStatus::Final;
        this_year.team1_score = Some(2);
        this_year.team2_score = Some(4);
        let last_year = Event {
            id: "3099999999".to_string(),
            start_time: datetime!(2024-05-05 23:00 UTC),
            ..this_year.clone()
        };
        for event in [&this_year, &last_year] {
            store.upsert_event(event).await.unwrap();
            let mut wager = Wager::placeholder(event, ana);
            wager.points_base = Some(4);
            wager.points_bonus = Some(4);
            store.upsert_wager(&wager).await.unwrap();
        }
        let mut champion = SeasonBet::new(ben, 2025, SeasonBetKind::Champion, "Thunder".into());
        champion.points = Some(20);
        store.upsert_season_bet(&champion).await.unwrap();

        let standings = book.leaderboard(2025).await.unwrap();
        let totals: Vec<(&str, i64)> = standings
            .iter()
            .map(|s| (s.name.as_str(), s.score))
            .collect();
        assert_eq!(totals, vec![("ben", 20), ("ana", 8)]);
        assert_eq!(standings[0].champion_pick.as_deref(), Some("Thunder"));

        let last = book.leaderboard(2024).await.unwrap();
        assert_eq!(last[0].name, "ana");
        assert_eq!(last[0].score, 8);
        assert_eq!(last[1].score, 0);
    }
}
