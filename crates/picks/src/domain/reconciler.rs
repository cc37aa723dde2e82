use std::sync::Arc;

use log::{debug, info, warn};
use picks_core::{settle_wager, Event, EventType, Wager};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Error, EventCorrection, EventLocks, EventStore};
use crate::infra::feed::EventFeed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WagerState {
    /// Event not final yet, outcome fields are empty
    Pending,
    Scored { points_base: i64, points_bonus: i64 },
    /// The stored wager could not be read and was rewritten as an empty pick
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReconcile {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub state: WagerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub event_id: String,
    pub is_final: bool,
    /// Wagers created for users without one
    pub created: usize,
    /// Existing wagers whose outcome fields changed
    pub updated: usize,
    pub unchanged: usize,
    /// Unreadable rows replaced by a placeholder
    pub repaired: usize,
    pub users: Vec<UserReconcile>,
}

impl ReconcileReport {
    fn new(event: &Event) -> Self {
        Self {
            event_id: event.id.clone(),
            is_final: event.is_final(),
            created: 0,
            updated: 0,
            unchanged: 0,
            repaired: 0,
            users: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Events written from feed data
    pub refreshed: usize,
    pub reconciled: usize,
    /// Feed lookups that failed and were left for the next cycle
    pub skipped: usize,
}

/// Drives scoring: merges feed data into the store and runs the per-event
/// scoring pass over every registered user.
///
/// Every read-modify-write of an event and its wagers happens under that
/// event's lock. The `*_locked` helpers assume the caller holds it.
pub struct Reconciler {
    store: Arc<dyn EventStore>,
    feed: Arc<dyn EventFeed>,
    locks: Arc<EventLocks>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn EventStore>,
        feed: Arc<dyn EventFeed>,
        locks: Arc<EventLocks>,
    ) -> Self {
        Self { store, feed, locks }
    }

    /// Ensures every user has a wager on the event and brings the outcome
    /// fields in line with the event as currently stored. Safe to repeat,
    /// wagers whose computed outcome matches what is stored are not rewritten.
    pub async fn reconcile_event(&self, event_id: &str) -> Result<ReconcileReport, Error> {
        let _guard = self.locks.lock(event_id).await;
        let event = self.load_event(event_id).await?;
        self.reconcile_locked(&event).await
    }

    async fn load_event(&self, event_id: &str) -> Result<Event, Error> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {} not found", event_id)))
    }

    async fn reconcile_locked(&self, event: &Event) -> Result<ReconcileReport, Error> {
        let users = self.store.list_users().await?;
        // Margin bonuses compare against every wager on the event
        let peers = if event.is_final() {
            self.store.list_wagers_for_event(&event.id).await?
        } else {
            vec![]
        };

        if event.is_final() && event.winning_team().is_none() {
            warn!(
                "event {} is final without a winner (scores {:?}-{:?}), every pick scores zero",
                event.id, event.team1_score, event.team2_score
            );
        }

        let mut report = ReconcileReport::new(event);
        for user_id in users {
            let existing = match self.store.get_wager(&event.id, user_id).await {
                Ok(existing) => existing,
                Err(Error::MalformedRecord(reason)) => {
                    warn!(
                        "replacing unreadable wager for user {} on event {}: {}",
                        user_id, event.id, reason
                    );
                    let mut wager = Wager::placeholder(event, user_id);
                    settle_wager(event, &peers, &mut wager);
                    self.store.replace_wager(&wager).await?;
                    report.repaired += 1;
                    report.users.push(UserReconcile {
                        user_id,
                        state: WagerState::Placeholder,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let created = existing.is_none();
            let mut wager = existing.unwrap_or_else(|| Wager::placeholder(event, user_id));
            let before = wager.clone();
            settle_wager(event, &peers, &mut wager);

            if created {
                self.store.upsert_wager(&wager).await?;
                report.created += 1;
            } else if wager != before {
                self.store.upsert_wager(&wager).await?;
                report.updated += 1;
            } else {
                report.unchanged += 1;
            }

            let state = match (wager.points_base, wager.points_bonus) {
                (Some(points_base), Some(points_bonus)) => WagerState::Scored {
                    points_base,
                    points_bonus,
                },
                _ => WagerState::Pending,
            };
            debug!(
                "event {} user {}: picked {:?} by {:?}, {:?}",
                event.id, user_id, wager.predicted_winner, wager.margin_prediction, state
            );
            report.users.push(UserReconcile { user_id, state });
        }

        info!(
            "reconciled event {} (final: {}): {} created, {} updated, {} unchanged, {} repaired",
            report.event_id,
            report.is_final,
            report.created,
            report.updated,
            report.unchanged,
            report.repaired
        );

        Ok(report)
    }

    /// Merges a feed observation into the stored event, writing only when
    /// something changed. Returns the merged record.
    async fn refresh_event(&self, observed: Event) -> Result<Event, Error> {
        let _guard = self.locks.lock(&observed.id).await;
        self.refresh_locked(observed).await
    }

    async fn refresh_locked(&self, observed: Event) -> Result<Event, Error> {
        let stored = self.store.get_event(&observed.id).await?;
        let merged = match stored.clone() {
            Some(mut event) => {
                event.refresh_from(observed);
                event
            }
            None => observed,
        };

        if stored.as_ref() != Some(&merged) {
            self.store.upsert_event(&merged).await?;
        }
        Ok(merged)
    }

    /// Merge and scoring pass under one hold of the event's lock
    async fn refresh_and_reconcile(&self, observed: Event) -> Result<ReconcileReport, Error> {
        let _guard = self.locks.lock(&observed.id).await;
        let event = self.refresh_locked(observed).await?;
        self.reconcile_locked(&event).await
    }

    /// One pass over the feed: today's slate, stragglers missing a final
    /// score, series pairings, then any event nobody has a wager on yet.
    pub async fn sync_cycle(&self) -> Result<SyncSummary, Error> {
        let mut summary = SyncSummary::default();

        match self.feed.list_todays_events().await {
            Ok(events) => {
                for observed in events {
                    self.refresh_and_reconcile(observed).await?;
                    summary.refreshed += 1;
                    summary.reconciled += 1;
                }
            }
            Err(e) => {
                warn!("skipping today's events, feed unavailable: {}", e);
                summary.skipped += 1;
            }
        }

        let missing = self
            .store
            .list_event_ids_missing_final_score(EventType::Game)
            .await?;
        for event_id in missing {
            let observed = match self.feed.get_event_by_id(&event_id).await {
                Ok(observed) => observed,
                Err(e) => {
                    warn!("skipping event {}, feed lookup failed: {}", event_id, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            if !observed.is_final() {
                continue;
            }
            self.refresh_and_reconcile(observed).await?;
            summary.refreshed += 1;
            summary.reconciled += 1;
        }

        match self.feed.list_series().await {
            Ok(series) => {
                for observed in series {
                    self.refresh_event(observed).await?;
                    summary.refreshed += 1;
                }
            }
            Err(e) => {
                warn!("skipping series, feed unavailable: {}", e);
                summary.skipped += 1;
            }
        }

        for event_id in self.store.list_event_ids_not_yet_wagered().await? {
            match self.reconcile_event(&event_id).await {
                Ok(_) => summary.reconciled += 1,
                // Removed since it was listed
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        info!(
            "sync cycle done: {} refreshed, {} reconciled, {} skipped",
            summary.refreshed, summary.reconciled, summary.skipped
        );
        Ok(summary)
    }

    /// Applies an admin correction and rescores the event
    pub async fn correct_event(
        &self,
        event_id: &str,
        correction: EventCorrection,
    ) -> Result<ReconcileReport, Error> {
        let _guard = self.locks.lock(event_id).await;
        let mut event = self.load_event(event_id).await?;

        correction.apply(&mut event)?;
        self.store.upsert_event(&event).await?;
        info!("corrected event {}: {:?}", event_id, correction);

        self.reconcile_locked(&event).await
    }
}
