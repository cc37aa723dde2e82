use hyper::header::ACCEPT;
use itertools::Itertools;
use log::{debug, error};
use mime::APPLICATION_JSON;
use picks_core::{Event, EventStatus, EventType, Round};
use primitive_types::U256;
use reqwest_middleware::{
    reqwest::{Response, StatusCode, Url},
    ClientWithMiddleware,
};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Error, Debug)]
pub enum Error {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("problem sending request to event feed: {0}")]
    Send(#[from] reqwest_middleware::reqwest::Error),
    #[error("problem sending request to event feed: {0}")]
    SendRetry(#[from] reqwest_middleware::Error),
    #[error("problem requesting event feed: {0}")]
    Request(String),
    #[error("event feed temporarily unavailable: {0}")]
    Transient(String),
    #[error("unexpected payload from event feed: {0}")]
    Decode(String),
}

impl Error {
    /// Anything other than a definite "no such event" means the feed could not answer
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Error::NotFound(_))
    }
}

#[async_trait::async_trait]
pub trait EventFeed: Send + Sync {
    /// Every game on today's slate
    async fn list_todays_events(&self) -> Result<Vec<Event>, Error>;
    async fn get_event_by_id(&self, event_id: &str) -> Result<Event, Error>;
    /// Playoff pairings derived from today's slate, one event per series
    async fn list_series(&self) -> Result<Vec<Event>, Error>;
}

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    scoreboard: Scoreboard,
}

#[derive(Debug, Deserialize)]
struct Scoreboard {
    #[serde(default)]
    games: Vec<FeedGame>,
}

#[derive(Debug, Deserialize)]
struct BoxscoreResponse {
    game: FeedGame,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedGame {
    game_id: String,
    game_status: i64,
    #[serde(rename = "gameTimeUTC", with = "time::serde::rfc3339")]
    game_time_utc: OffsetDateTime,
    home_team: FeedTeam,
    away_team: FeedTeam,
    #[serde(default)]
    series_text: String,
    #[serde(default)]
    series_game_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedTeam {
    team_name: String,
    #[serde(default)]
    score: i64,
}

impl FeedGame {
    fn is_playoff_series(&self) -> bool {
        !self.series_text.trim().is_empty() || !self.series_game_number.trim().is_empty()
    }
}

impl From<FeedGame> for Event {
    fn from(game: FeedGame) -> Self {
        let status = EventStatus::from_feed_code(game.game_status);
        // The feed reports 0-0 before tip-off, scores only count once final
        let (team1_score, team2_score) = if status == EventStatus::Final {
            (Some(game.home_team.score), Some(game.away_team.score))
        } else {
            (None, None)
        };

        Event {
            id: game.game_id,
            team1: game.home_team.team_name,
            team2: game.away_team.team_name,
            team1_score,
            team2_score,
            start_time: game.game_time_utc,
            status,
            event_type: EventType::Game,
            round: Round::Unset,
        }
    }
}

/// Stable id for the series between two teams: "30" followed by the leading
/// eight decimal digits of the sha256 of the concatenated team names.
pub fn generate_series_id(team1: &str, team2: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", team1, team2).as_bytes());
    let digits = U256::from_big_endian(&digest).to_string();
    format!("30{}", &digits[..digits.len().min(8)])
}

/// One scheduled series per pairing seen on the slate. Team order is
/// alphabetical so either home/away orientation maps to the same id.
pub(crate) fn series_from_games(games: Vec<FeedGame>) -> Vec<Event> {
    games
        .into_iter()
        .filter(FeedGame::is_playoff_series)
        .map(|game| {
            let (team1, team2) = if game.home_team.team_name <= game.away_team.team_name {
                (game.home_team.team_name, game.away_team.team_name)
            } else {
                (game.away_team.team_name, game.home_team.team_name)
            };
            Event {
                id: generate_series_id(&team1, &team2),
                team1,
                team2,
                team1_score: None,
                team2_score: None,
                start_time: game.game_time_utc,
                status: EventStatus::Scheduled,
                event_type: EventType::Series,
                round: Round::Unset,
            }
        })
        .unique_by(|event| event.id.clone())
        .collect()
}

#[derive(Clone)]
pub struct NbaFeedClient {
    pub scoreboard_url: Url,
    pub boxscore_url_template: String,
    pub client: ClientWithMiddleware,
}

impl NbaFeedClient {
    pub fn new(
        client: ClientWithMiddleware,
        scoreboard_url: &str,
        boxscore_url_template: &str,
    ) -> Result<Self, Error> {
        let scoreboard_url =
            Url::parse(scoreboard_url).map_err(|e| Error::Request(e.to_string()))?;
        Ok(Self {
            scoreboard_url,
            boxscore_url_template: boxscore_url_template.to_string(),
            client,
        })
    }

    fn boxscore_url(&self, event_id: &str) -> Result<Url, Error> {
        if event_id.is_empty() || !event_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::NotFound(format!("event with id {} not found", event_id)));
        }
        Url::parse(&self.boxscore_url_template.replace("{game_id}", event_id))
            .map_err(|e| Error::Request(e.to_string()))
    }

    async fn send_request(&self, url: Url, not_found_message: String) -> Result<Response, Error> {
        debug!("requesting {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, APPLICATION_JSON.to_string())
            .send()
            .await
            .map_err(|e| {
                error!("error sending to event feed: {}", e);
                Error::SendRetry(e)
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            // The CDN answers 403 for boxscores it has never published
            Err(Error::NotFound(not_found_message))
        } else if status == StatusCode::SERVICE_UNAVAILABLE
            || status == StatusCode::BAD_GATEWAY
            || status == StatusCode::GATEWAY_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Transient(format!(
                "error response from event feed with status {}: {:?}",
                status, body
            )))
        } else {
            let body = response.text().await?;
            Err(Error::Request(format!(
                "error response from event feed with status {}: {:?}",
                status, body
            )))
        }
    }

    async fn fetch<T>(&self, url: Url, not_found_message: String) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self.send_request(url, not_found_message).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    async fn todays_games(&self) -> Result<Vec<FeedGame>, Error> {
        let response: ScoreboardResponse = self
            .fetch(
                self.scoreboard_url.clone(),
                String::from("scoreboard not found"),
            )
            .await?;
        Ok(response.scoreboard.games)
    }
}

#[async_trait::async_trait]
impl EventFeed for NbaFeedClient {
    async fn list_todays_events(&self) -> Result<Vec<Event>, Error> {
        let games = self.todays_games().await?;
        Ok(games.into_iter().map(Event::from).collect())
    }

    async fn get_event_by_id(&self, event_id: &str) -> Result<Event, Error> {
        let url = self.boxscore_url(event_id)?;
        let response: BoxscoreResponse = self
            .fetch(url, format!("event with id {} not found", event_id))
            .await?;
        Ok(response.game.into())
    }

    async fn list_series(&self) -> Result<Vec<Event>, Error> {
        let games = self.todays_games().await?;
        Ok(series_from_games(games))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const SCOREBOARD: &str = r#"{
        "meta": {"version": 1},
        "scoreboard": {
            "gameDate": "2025-04-20",
            "games": [
                {
                    "gameId": "0042400101",
                    "gameStatus": 3,
                    "gameStatusText": "Final",
                    "gameTimeUTC": "2025-04-20T17:00:00Z",
                    "seriesGameNumber": "Game 1",
                    "seriesText": "CLE leads 1-0",
                    "homeTeam": {"teamId": 1, "teamName": "Cavaliers", "score": 121},
                    "awayTeam": {"teamId": 2, "teamName": "Heat", "score": 100}
                },
                {
                    "gameId": "0042400131",
                    "gameStatus": 1,
                    "gameTimeUTC": "2025-04-20T23:30:00Z",
                    "seriesGameNumber": "Game 1",
                    "seriesText": "",
                    "homeTeam": {"teamName": "Pacers", "score": 0},
                    "awayTeam": {"teamName": "Bucks", "score": 0}
                },
                {
                    "gameId": "0022400999",
                    "gameStatus": 2,
                    "gameTimeUTC": "2025-04-20T20:00:00Z",
                    "homeTeam": {"teamName": "Lakers", "score": 54},
                    "awayTeam": {"teamName": "Nuggets", "score": 50}
                }
            ]
        }
    }"#;

    fn games() -> Vec<FeedGame> {
        serde_json::from_str::<ScoreboardResponse>(SCOREBOARD)
            .unwrap()
            .scoreboard
            .games
    }

    #[test]
    fn test_feed_game_maps_home_team_first() {
        let events: Vec<Event> = games().into_iter().map(Event::from).collect();

        assert_eq!(events.len(), 3);
        let opener = &events[0];
        assert_eq!(opener.id, "0042400101");
        assert_eq!(opener.team1, "Cavaliers");
        assert_eq!(opener.team2, "Heat");
        assert_eq!(opener.status, EventStatus::Final);
        assert_eq!(opener.final_scores(), Some((121, 100)));
        assert_eq!(opener.start_time, datetime!(2025-04-20 17:00 UTC));
        assert_eq!(opener.round, Round::Unset);
    }

    #[test]
    fn test_scores_are_dropped_until_final() {
        let events: Vec<Event> = games().into_iter().map(Event::from).collect();

        assert_eq!(events[2].status, EventStatus::Live);
        assert_eq!(events[2].team1_score, None);
        assert_eq!(events[2].team2_score, None);
    }

    #[test]
    fn test_series_come_from_playoff_games_only() {
        let series = series_from_games(games());

        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|s| s.event_type == EventType::Series));
        assert!(series.iter().all(|s| s.status == EventStatus::Scheduled));

        let bucks = series.iter().find(|s| s.has_team("Bucks")).unwrap();
        assert_eq!(bucks.team1, "Bucks");
        assert_eq!(bucks.team2, "Pacers");
        assert_eq!(bucks.id, generate_series_id("Bucks", "Pacers"));
        assert_eq!(bucks.start_time, datetime!(2025-04-20 23:30 UTC));
    }

    #[test]
    fn test_series_id_is_stable_for_a_pairing() {
        assert_eq!(generate_series_id("Cavaliers", "Pacers"), "3086085523");
        assert_eq!(generate_series_id("Celtics", "Knicks"), "3012916608");
        assert_ne!(
            generate_series_id("Cavaliers", "Pacers"),
            generate_series_id("Pacers", "Cavaliers")
        );
    }

    #[test]
    fn test_unavailable_errors() {
        assert!(!Error::NotFound(String::from("gone")).is_unavailable());
        assert!(Error::Transient(String::from("502")).is_unavailable());
        assert!(Error::Decode(String::from("bad json")).is_unavailable());
    }
}
