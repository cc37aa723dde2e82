use async_trait::async_trait;
use log::warn;
use picks_core::{Event, EventType, SeasonBet, SeasonBetKind, Wager};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{AddPlayer, EventFilter, EventStore, PickLogEntry, Player};
use crate::{
    domain::Error,
    infra::db::{
        format_datetime, parse_optional_enum, parse_required_datetime, parse_required_enum,
        parse_required_uuid, DBConnection,
    },
};

const EVENT_COLUMNS: &str =
    "id, team1, team2, team1_score, team2_score, start_time, status, event_type, round";

const WAGER_COLUMNS: &str = "id, event_id, user_id, predicted_winner, margin_prediction, \
     result, points_base, points_bonus, scoring_rule_ref, close_time, created_at";

/// Same columns, qualified for queries joining `events e`
const JOINED_WAGER_COLUMNS: &str = "w.id, w.event_id, w.user_id, w.predicted_winner, \
     w.margin_prediction, w.result, w.points_base, w.points_bonus, w.scoring_rule_ref, \
     w.close_time, w.created_at";

const SEASON_BET_COLUMNS: &str = "id, user_id, season, kind, pick, points, created_at";

const PICK_LOG_COLUMNS: &str = "event_id, user_id, predicted_winner, margin_prediction, kind, \
     detail, round, event_type, logged_at";

impl FromRow<'_, SqliteRow> for Player {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Player {
            id: parse_required_uuid(row, "uuid")?,
            name: row.try_get("name")?,
            created_at: parse_required_datetime(row, "created_at")?,
        })
    }
}

fn event_from_row(row: &SqliteRow) -> Result<Event, sqlx::Error> {
    Ok(Event {
        id: row.try_get("id")?,
        team1: row.try_get("team1")?,
        team2: row.try_get("team2")?,
        team1_score: row.try_get("team1_score")?,
        team2_score: row.try_get("team2_score")?,
        start_time: parse_required_datetime(row, "start_time")?,
        status: parse_required_enum(row, "status")?,
        event_type: parse_required_enum(row, "event_type")?,
        round: parse_required_enum(row, "round")?,
    })
}

fn wager_from_row(row: &SqliteRow) -> Result<Wager, sqlx::Error> {
    Ok(Wager {
        id: parse_required_uuid(row, "id")?,
        event_id: row.try_get("event_id")?,
        user_id: parse_required_uuid(row, "user_id")?,
        predicted_winner: row.try_get("predicted_winner")?,
        margin_prediction: row.try_get("margin_prediction")?,
        result: row.try_get("result")?,
        points_base: row.try_get("points_base")?,
        points_bonus: row.try_get("points_bonus")?,
        scoring_rule_ref: parse_required_enum(row, "scoring_rule_ref")?,
        close_time: parse_required_datetime(row, "close_time")?,
        created_at: parse_required_datetime(row, "created_at")?,
    })
}

fn season_bet_from_row(row: &SqliteRow) -> Result<SeasonBet, sqlx::Error> {
    Ok(SeasonBet {
        id: parse_required_uuid(row, "id")?,
        user_id: parse_required_uuid(row, "user_id")?,
        season: row.try_get("season")?,
        kind: parse_required_enum(row, "kind")?,
        pick: row.try_get("pick")?,
        points: row.try_get("points")?,
        created_at: parse_required_datetime(row, "created_at")?,
    })
}

fn pick_log_from_row(row: &SqliteRow) -> Result<PickLogEntry, sqlx::Error> {
    Ok(PickLogEntry {
        event_id: row.try_get("event_id")?,
        user_id: parse_required_uuid(row, "user_id")?,
        predicted_winner: row.try_get("predicted_winner")?,
        margin_prediction: row.try_get("margin_prediction")?,
        kind: parse_required_enum(row, "kind")?,
        detail: row.try_get("detail")?,
        round: parse_optional_enum(row, "round")?,
        event_type: parse_optional_enum(row, "event_type")?,
        logged_at: parse_required_datetime(row, "logged_at")?,
    })
}

/// Decodes what it can, one bad row shouldn't hide the rest
fn decode_rows<T>(
    rows: Vec<SqliteRow>,
    kind: &str,
    decode: fn(&SqliteRow) -> Result<T, sqlx::Error>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("skipping unreadable {} row: {}", kind, e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct PicksStore {
    db_connection: DBConnection,
}

impl PicksStore {
    pub fn new(db_connection: DBConnection) -> Self {
        Self { db_connection }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        self.db_connection.ping().await
    }

    pub async fn add_player(&self, player: AddPlayer) -> Result<Player, Error> {
        let name = player.name.trim();
        if name.is_empty() {
            return Err(Error::BadRequest(String::from("player name required")));
        }

        let id = player.id.unwrap_or_else(Uuid::now_v7);
        let created_at = format_datetime(OffsetDateTime::now_utc())?;
        let player = sqlx::query_as::<_, Player>(
            "INSERT INTO users (uuid, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(uuid) DO UPDATE SET name = excluded.name
             RETURNING uuid, name, created_at",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(created_at)
        .fetch_one(self.db_connection.write())
        .await?;

        Ok(player)
    }

    pub async fn get_player(&self, user_id: Uuid) -> Result<Option<Player>, Error> {
        let player = sqlx::query_as::<_, Player>(
            "SELECT uuid, name, created_at FROM users WHERE uuid = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.db_connection.read())
        .await?;

        Ok(player)
    }

    pub async fn list_players(&self) -> Result<Vec<Player>, Error> {
        let rows = sqlx::query("SELECT uuid, name, created_at FROM users ORDER BY name")
            .fetch_all(self.db_connection.read())
            .await?;
        Ok(decode_rows(rows, "user", |row| Player::from_row(row)))
    }

    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR event_type = ?2)
               AND (?3 IS NULL OR season = ?3)
             ORDER BY start_time DESC, id",
            EVENT_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.event_type.map(|t| t.as_str()))
        .bind(filter.season)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "event", event_from_row))
    }

    /// Every season when `season` is `None`
    pub async fn list_wagers_for_user(
        &self,
        user_id: Uuid,
        season: Option<i32>,
    ) -> Result<Vec<Wager>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM wagers w JOIN events e ON e.id = w.event_id
             WHERE w.user_id = ?1 AND (?2 IS NULL OR e.season = ?2)
             ORDER BY w.close_time DESC",
            JOINED_WAGER_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(season)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "wager", wager_from_row))
    }

    pub async fn list_season_wagers(&self, season: i32) -> Result<Vec<Wager>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM wagers w JOIN events e ON e.id = w.event_id WHERE e.season = ?",
            JOINED_WAGER_COLUMNS
        ))
        .bind(season)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "wager", wager_from_row))
    }

    pub async fn get_season_bet(
        &self,
        user_id: Uuid,
        season: i32,
        kind: SeasonBetKind,
    ) -> Result<Option<SeasonBet>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM season_bets WHERE user_id = ? AND season = ? AND kind = ?",
            SEASON_BET_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(season)
        .bind(kind.as_str())
        .fetch_optional(self.db_connection.read())
        .await?;

        row.as_ref()
            .map(season_bet_from_row)
            .transpose()
            .map_err(|e| Error::MalformedRecord(format!("season bet for {}: {}", user_id, e)))
    }

    pub async fn list_user_season_bets(
        &self,
        user_id: Uuid,
        season: i32,
    ) -> Result<Vec<SeasonBet>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM season_bets WHERE user_id = ? AND season = ? ORDER BY kind",
            SEASON_BET_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(season)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "season bet", season_bet_from_row))
    }

    pub async fn list_season_bets(&self, season: i32) -> Result<Vec<SeasonBet>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM season_bets WHERE season = ?",
            SEASON_BET_COLUMNS
        ))
        .bind(season)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "season bet", season_bet_from_row))
    }

    /// Inserts, or updates the pick and points of the user's existing bet
    pub async fn upsert_season_bet(&self, bet: &SeasonBet) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO season_bets (id, user_id, season, kind, pick, points, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, season, kind) DO UPDATE SET
                pick = excluded.pick,
                points = excluded.points,
                updated_at = excluded.updated_at",
        )
        .bind(bet.id.to_string())
        .bind(bet.user_id.to_string())
        .bind(bet.season)
        .bind(bet.kind.as_str())
        .bind(&bet.pick)
        .bind(bet.points)
        .bind(format_datetime(bet.created_at)?)
        .bind(format_datetime(OffsetDateTime::now_utc())?)
        .execute(self.db_connection.write())
        .await?;

        Ok(())
    }

    pub async fn log_pick(&self, entry: &PickLogEntry) -> Result<(), Error> {
        sqlx::query(&format!(
            "INSERT INTO pick_log ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PICK_LOG_COLUMNS
        ))
        .bind(&entry.event_id)
        .bind(entry.user_id.to_string())
        .bind(&entry.predicted_winner)
        .bind(entry.margin_prediction)
        .bind(entry.kind.as_str())
        .bind(&entry.detail)
        .bind(entry.round.map(|r| r.as_str()))
        .bind(entry.event_type.map(|t| t.as_str()))
        .bind(format_datetime(entry.logged_at)?)
        .execute(self.db_connection.write())
        .await?;

        Ok(())
    }

    /// Oldest first
    pub async fn list_pick_log(&self, event_id: &str) -> Result<Vec<PickLogEntry>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pick_log WHERE event_id = ? ORDER BY id",
            PICK_LOG_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "pick log", pick_log_from_row))
    }
}

#[async_trait]
impl EventStore for PicksStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, Error> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(self.db_connection.read())
            .await?;

        row.as_ref()
            .map(event_from_row)
            .transpose()
            .map_err(Error::from)
    }

    async fn upsert_event(&self, event: &Event) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO events (
                id, team1, team2, team1_score, team2_score, start_time, status, event_type, round,
                season, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                team1 = excluded.team1,
                team2 = excluded.team2,
                team1_score = excluded.team1_score,
                team2_score = excluded.team2_score,
                start_time = excluded.start_time,
                status = excluded.status,
                event_type = excluded.event_type,
                round = excluded.round,
                season = excluded.season,
                updated_at = excluded.updated_at",
        )
        .bind(&event.id)
        .bind(&event.team1)
        .bind(&event.team2)
        .bind(event.team1_score)
        .bind(event.team2_score)
        .bind(format_datetime(event.start_time)?)
        .bind(event.status.as_str())
        .bind(event.event_type.as_str())
        .bind(event.round.as_str())
        .bind(event.season())
        .bind(format_datetime(OffsetDateTime::now_utc())?)
        .execute(self.db_connection.write())
        .await?;

        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<Uuid>, Error> {
        let rows = sqlx::query("SELECT uuid FROM users ORDER BY uuid")
            .fetch_all(self.db_connection.read())
            .await?;

        Ok(decode_rows(rows, "user", |row| parse_required_uuid(row, "uuid")))
    }

    async fn get_wager(&self, event_id: &str, user_id: Uuid) -> Result<Option<Wager>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM wagers WHERE event_id = ? AND user_id = ?",
            WAGER_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id.to_string())
        .fetch_optional(self.db_connection.read())
        .await?;

        row.as_ref().map(wager_from_row).transpose().map_err(|e| {
            Error::MalformedRecord(format!("wager {} / {}: {}", event_id, user_id, e))
        })
    }

    async fn list_wagers_for_event(&self, event_id: &str) -> Result<Vec<Wager>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM wagers WHERE event_id = ?",
            WAGER_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(decode_rows(rows, "wager", wager_from_row))
    }

    async fn upsert_wager(&self, wager: &Wager) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO wagers (
                id, event_id, user_id, predicted_winner, margin_prediction, result,
                points_base, points_bonus, scoring_rule_ref, close_time, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id, user_id) DO UPDATE SET
                predicted_winner = excluded.predicted_winner,
                margin_prediction = excluded.margin_prediction,
                result = excluded.result,
                points_base = excluded.points_base,
                points_bonus = excluded.points_bonus,
                updated_at = excluded.updated_at",
        )
        .bind(wager.id.to_string())
        .bind(&wager.event_id)
        .bind(wager.user_id.to_string())
        .bind(&wager.predicted_winner)
        .bind(wager.margin_prediction)
        .bind(&wager.result)
        .bind(wager.points_base)
        .bind(wager.points_bonus)
        .bind(wager.scoring_rule_ref.as_str())
        .bind(format_datetime(wager.close_time)?)
        .bind(format_datetime(wager.created_at)?)
        .bind(format_datetime(OffsetDateTime::now_utc())?)
        .execute(self.db_connection.write())
        .await?;

        Ok(())
    }

    async fn replace_wager(&self, wager: &Wager) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO wagers (
                id, event_id, user_id, predicted_winner, margin_prediction, result,
                points_base, points_bonus, scoring_rule_ref, close_time, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id, user_id) DO UPDATE SET
                id = excluded.id,
                predicted_winner = excluded.predicted_winner,
                margin_prediction = excluded.margin_prediction,
                result = excluded.result,
                points_base = excluded.points_base,
                points_bonus = excluded.points_bonus,
                scoring_rule_ref = excluded.scoring_rule_ref,
                close_time = excluded.close_time,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )
        .bind(wager.id.to_string())
        .bind(&wager.event_id)
        .bind(wager.user_id.to_string())
        .bind(&wager.predicted_winner)
        .bind(wager.margin_prediction)
        .bind(&wager.result)
        .bind(wager.points_base)
        .bind(wager.points_bonus)
        .bind(wager.scoring_rule_ref.as_str())
        .bind(format_datetime(wager.close_time)?)
        .bind(format_datetime(wager.created_at)?)
        .bind(format_datetime(OffsetDateTime::now_utc())?)
        .execute(self.db_connection.write())
        .await?;

        Ok(())
    }

    async fn list_event_ids_missing_final_score(
        &self,
        event_type: EventType,
    ) -> Result<Vec<String>, Error> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM events
             WHERE event_type = ? AND (team1_score IS NULL OR team2_score IS NULL)
             ORDER BY start_time",
        )
        .bind(event_type.as_str())
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(ids)
    }

    async fn list_event_ids_not_yet_wagered(&self) -> Result<Vec<String>, Error> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT e.id FROM events e
             WHERE NOT EXISTS (SELECT 1 FROM wagers w WHERE w.event_id = e.id)
             ORDER BY e.start_time",
        )
        .fetch_all(self.db_connection.read())
        .await?;

        Ok(ids)
    }
}
