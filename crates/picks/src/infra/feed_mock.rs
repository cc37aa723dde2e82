use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use picks_core::Event;
use tokio::sync::RwLock;

use super::feed::{Error, EventFeed};

/// In-process stand-in for the upstream provider. Tests and local runs script
/// what the feed reports and which lookups fail.
#[derive(Default)]
pub struct MockFeed {
    todays: RwLock<Vec<String>>,
    events: RwLock<HashMap<String, Event>>,
    series: RwLock<Vec<Event>>,
    unavailable: RwLock<HashSet<String>>,
    slate_down: RwLock<bool>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces today's slate, each event also becomes fetchable by id
    pub async fn set_todays_events(&self, events: Vec<Event>) {
        let mut todays = self.todays.write().await;
        let mut known = self.events.write().await;
        todays.clear();
        for event in events {
            todays.push(event.id.clone());
            known.insert(event.id.clone(), event);
        }
    }

    /// Makes an event fetchable by id without putting it on today's slate
    pub async fn put_event(&self, event: Event) {
        self.events.write().await.insert(event.id.clone(), event);
    }

    pub async fn set_series(&self, series: Vec<Event>) {
        *self.series.write().await = series;
    }

    /// Lookups of `event_id` fail as if the provider were down
    pub async fn fail_event(&self, event_id: &str) {
        self.unavailable.write().await.insert(event_id.to_string());
    }

    pub async fn set_slate_down(&self, down: bool) {
        *self.slate_down.write().await = down;
    }

    async fn check_slate(&self) -> Result<(), Error> {
        if *self.slate_down.read().await {
            return Err(Error::Transient(String::from("mock slate unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl EventFeed for MockFeed {
    async fn list_todays_events(&self) -> Result<Vec<Event>, Error> {
        self.check_slate().await?;
        let todays = self.todays.read().await;
        let events = self.events.read().await;
        Ok(todays
            .iter()
            .filter_map(|id| events.get(id).cloned())
            .collect())
    }

    async fn get_event_by_id(&self, event_id: &str) -> Result<Event, Error> {
        if self.unavailable.read().await.contains(event_id) {
            return Err(Error::Transient(format!(
                "mock feed down for event {}",
                event_id
            )));
        }
        self.events
            .read()
            .await
            .get(event_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("event with id {} not found", event_id)))
    }

    async fn list_series(&self) -> Result<Vec<Event>, Error> {
        self.check_slate().await?;
        Ok(self.series.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picks_core::{EventStatus, EventType, Round};
    use time::macros::datetime;

    fn game(id: &str) -> Event {
        Event {
            id: id.to_string(),
            team1: "Knicks".to_string(),
            team2: "Pistons".to_string(),
            team1_score: None,
            team2_score: None,
            start_time: datetime!(2025-04-19 22:00 UTC),
            status: EventStatus::Scheduled,
            event_type: EventType::Game,
            round: Round::Unset,
        }
    }

    #[tokio::test]
    async fn test_slate_events_are_fetchable_by_id() {
        let feed = MockFeed::new();
        feed.set_todays_events(vec![game("0042400161")]).await;
        feed.put_event(game("0042400151")).await;

        let todays = feed.list_todays_events().await.unwrap();
        assert_eq!(todays.len(), 1);
        assert!(feed.get_event_by_id("0042400151").await.is_ok());
        assert!(feed.get_event_by_id("0042400161").await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let feed = MockFeed::new();
        feed.put_event(game("0042400161")).await;
        feed.fail_event("0042400161").await;
        feed.set_slate_down(true).await;

        let err = feed.get_event_by_id("0042400161").await.unwrap_err();
        assert!(err.is_unavailable());

        let missing = feed.get_event_by_id("0042400999").await.unwrap_err();
        assert!(!missing.is_unavailable());

        assert!(feed.list_todays_events().await.is_err());
        assert!(feed.list_series().await.is_err());
    }
}
