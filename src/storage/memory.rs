//! In-memory storage backend.
//!
//! All ports share one mutex-guarded state, so the cooldown guard sees the
//! events the coordinator just inserted.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{AppError, AppResult};
use crate::models::{
    DeliveryStatus, EarthquakeEvent, EarthquakeSearch, EarthquakeStats, EventKey,
    FailedNotificationRecord, NewEarthquake, NewFailedNotification, NewNotification,
    NotificationRecord, Poll, Recipient, RecipientGroup,
};
use crate::storage::{EarthquakeQueries, EarthquakeStore, NotificationStore, SubscriberDirectory};

#[derive(Default)]
struct State {
    earthquakes: Vec<EarthquakeEvent>,
    notifications: Vec<NotificationRecord>,
    failures: Vec<FailedNotificationRecord>,
    polls: Vec<Poll>,
    groups: Vec<RecipientGroup>,
    group_polls: HashSet<(i32, i32)>,
    recipients: Vec<Recipient>,
    group_members: Vec<(i32, i32)>,
    /// Audit writes for these recipients fail with a database error
    #[cfg(test)]
    failing_recipients: HashSet<i32>,
    /// Inserts of events from this source fail with a database error
    #[cfg(test)]
    failing_source: Option<crate::models::FeedSource>,
}

#[cfg(test)]
impl State {
    fn insert_fault(&self, new: &NewEarthquake) -> AppResult<()> {
        if self.failing_source == Some(new.event.source) {
            return Err(AppError::Database {
                operation: "insert".to_string(),
                source: anyhow::anyhow!("simulated write failure"),
            });
        }
        Ok(())
    }

    fn audit_fault(&self, recipient_id: i32) -> AppResult<()> {
        if self.failing_recipients.contains(&recipient_id) {
            return Err(AppError::Database {
                operation: format!("record notification for recipient {}", recipient_id),
                source: anyhow::anyhow!("simulated write failure"),
            });
        }
        Ok(())
    }
}

#[cfg(not(test))]
impl State {
    fn insert_fault(&self, _new: &NewEarthquake) -> AppResult<()> {
        Ok(())
    }

    fn audit_fault(&self, _recipient_id: i32) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|e| AppError::Internal {
            source: anyhow::anyhow!("memory store poisoned: {}", e),
        })
    }

    fn lock_unpoisoned(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------
    // Seeding helpers for the subscriber directory
    // ------------------------------------------------------------------

    pub fn add_poll(&self, name: &str, min_magnitude: f64) -> Poll {
        let mut state = self.lock_unpoisoned();
        let poll = Poll {
            id: state.polls.len() as i32 + 1,
            name: name.to_string(),
            channel_type: "whatsapp".to_string(),
            min_magnitude,
            created_at: Timestamp::now(),
        };
        state.polls.push(poll.clone());
        poll
    }

    pub fn add_group(&self, name: &str, active: bool) -> RecipientGroup {
        let mut state = self.lock_unpoisoned();
        let group = RecipientGroup {
            id: state.groups.len() as i32 + 1,
            name: name.to_string(),
            active,
        };
        state.groups.push(group.clone());
        group
    }

    pub fn subscribe(&self, group_id: i32, poll_id: i32) {
        self.lock_unpoisoned().group_polls.insert((group_id, poll_id));
    }

    pub fn add_recipient(&self, name: &str, address: &str, active: bool) -> Recipient {
        let mut state = self.lock_unpoisoned();
        let recipient = Recipient {
            id: state.recipients.len() as i32 + 1,
            name: name.to_string(),
            address: address.to_string(),
            active,
        };
        state.recipients.push(recipient.clone());
        recipient
    }

    pub fn add_member(&self, group_id: i32, recipient_id: i32) {
        let mut state = self.lock_unpoisoned();
        if !state.group_members.contains(&(group_id, recipient_id)) {
            state.group_members.push((group_id, recipient_id));
        }
    }

    /// Make every audit write for `recipient_id` fail.
    #[cfg(test)]
    pub fn fail_audit_for(&self, recipient_id: i32) {
        self.lock_unpoisoned().failing_recipients.insert(recipient_id);
    }

    /// Make every insert of an event reported by `source` fail, or clear
    /// the fault with `None`.
    #[cfg(test)]
    pub fn fail_inserts_from(&self, source: Option<crate::models::FeedSource>) {
        self.lock_unpoisoned().failing_source = source;
    }

    /// Move an event's insert time, e.g. to age it past the cooldown.
    #[cfg(test)]
    pub fn backdate_event(&self, id: i64, created_at: Timestamp) {
        let mut state = self.lock_unpoisoned();
        if let Some(event) = state.earthquakes.iter_mut().find(|e| e.id == id) {
            event.created_at = created_at;
        }
    }

    // ------------------------------------------------------------------
    // Inspection helpers
    // ------------------------------------------------------------------

    pub fn earthquakes(&self) -> Vec<EarthquakeEvent> {
        self.lock_unpoisoned().earthquakes.clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.lock_unpoisoned().notifications.clone()
    }

    pub fn failures(&self) -> Vec<FailedNotificationRecord> {
        self.lock_unpoisoned().failures.clone()
    }
}

fn same_key(event: &EarthquakeEvent, key: &EventKey) -> bool {
    event.timestamp == key.timestamp
        && event.latitude == key.latitude
        && event.longitude == key.longitude
}

fn newest_first(mut events: Vec<EarthquakeEvent>, limit: i64) -> Vec<EarthquakeEvent> {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit.max(0) as usize);
    events
}

#[async_trait]
impl EarthquakeStore for MemoryStore {
    async fn exists(&self, key: &EventKey) -> AppResult<bool> {
        Ok(self.lock()?.earthquakes.iter().any(|e| same_key(e, key)))
    }

    async fn insert(&self, new: NewEarthquake) -> AppResult<Option<EarthquakeEvent>> {
        let mut state = self.lock()?;
        state.insert_fault(&new)?;
        let key = new.event.key();
        if state.earthquakes.iter().any(|e| same_key(e, &key)) {
            return Ok(None);
        }

        let id = state.earthquakes.len() as i64 + 1;
        let event = EarthquakeEvent::from_new(id, new, Timestamp::now());
        state.earthquakes.push(event.clone());
        Ok(Some(event))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<EarthquakeEvent>> {
        Ok(self.lock()?.earthquakes.iter().find(|e| e.id == id).cloned())
    }
}

#[async_trait]
impl EarthquakeQueries for MemoryStore {
    async fn latest(&self, limit: i64) -> AppResult<Vec<EarthquakeEvent>> {
        Ok(newest_first(self.lock()?.earthquakes.clone(), limit))
    }

    async fn by_date(&self, date: &str, limit: i64) -> AppResult<Vec<EarthquakeEvent>> {
        let events = self
            .lock()?
            .earthquakes
            .iter()
            .filter(|e| e.event_date == date)
            .cloned()
            .collect();
        Ok(newest_first(events, limit))
    }

    async fn by_week(&self, year: i32, week: i32, limit: i64) -> AppResult<Vec<EarthquakeEvent>> {
        let events = self
            .lock()?
            .earthquakes
            .iter()
            .filter(|e| e.year == year && e.week == week)
            .cloned()
            .collect();
        Ok(newest_first(events, limit))
    }

    async fn by_month(
        &self,
        year: i32,
        month: i32,
        limit: i64,
    ) -> AppResult<Vec<EarthquakeEvent>> {
        let events = self
            .lock()?
            .earthquakes
            .iter()
            .filter(|e| e.year == year && e.month == month)
            .cloned()
            .collect();
        Ok(newest_first(events, limit))
    }

    async fn search(&self, filter: &EarthquakeSearch) -> AppResult<Vec<EarthquakeEvent>> {
        let keyword = filter.location.as_ref().map(|l| l.to_lowercase());
        let events = self
            .lock()?
            .earthquakes
            .iter()
            .filter(|e| filter.min_magnitude.is_none_or(|m| e.magnitude >= m))
            .filter(|e| filter.max_magnitude.is_none_or(|m| e.magnitude <= m))
            .filter(|e| {
                filter
                    .start_date
                    .as_deref()
                    .is_none_or(|d| e.event_date.as_str() >= d)
            })
            .filter(|e| {
                filter
                    .end_date
                    .as_deref()
                    .is_none_or(|d| e.event_date.as_str() <= d)
            })
            .filter(|e| {
                keyword
                    .as_deref()
                    .is_none_or(|k| e.location.to_lowercase().contains(k))
            })
            .cloned()
            .collect();
        Ok(newest_first(events, filter.limit))
    }

    async fn stats(&self) -> AppResult<EarthquakeStats> {
        Ok(EarthquakeStats::from_events(&self.lock()?.earthquakes))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn record_sent(&self, new: NewNotification) -> AppResult<NotificationRecord> {
        let mut state = self.lock()?;
        state.audit_fault(new.recipient_id)?;
        if state
            .notifications
            .iter()
            .any(|n| n.message_id == new.message_id)
        {
            return Err(AppError::Duplicate {
                entity: "notifications".to_string(),
                field: "message_id".to_string(),
                value: new.message_id,
            });
        }

        let now = Timestamp::now();
        let record = NotificationRecord {
            message_id: new.message_id,
            recipient_id: new.recipient_id,
            earthquake_id: new.earthquake_id,
            poll_name: new.poll_name,
            is_read: false,
            message: None,
            created_at: now,
            updated_at: now,
        };
        state.notifications.push(record.clone());
        Ok(record)
    }

    async fn record_failed(
        &self,
        new: NewFailedNotification,
    ) -> AppResult<FailedNotificationRecord> {
        let mut state = self.lock()?;
        state.audit_fault(new.recipient_id)?;

        let record = FailedNotificationRecord {
            id: state.failures.len() as i64 + 1,
            recipient_id: new.recipient_id,
            earthquake_id: new.earthquake_id,
            reason: new.reason,
            detail: new.detail,
            created_at: Timestamp::now(),
        };
        state.failures.push(record.clone());
        Ok(record)
    }

    async fn latest_sent(&self) -> AppResult<Option<NotificationRecord>> {
        // max_by_key keeps the last maximum, so later pushes win ties
        Ok(self
            .lock()?
            .notifications
            .iter()
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn apply_delivery_status(
        &self,
        message_id: &str,
        status: &DeliveryStatus,
    ) -> AppResult<bool> {
        let mut state = self.lock()?;
        let Some(record) = state
            .notifications
            .iter_mut()
            .find(|n| n.message_id == message_id)
        else {
            return Ok(false);
        };

        match status {
            DeliveryStatus::Delivered | DeliveryStatus::Failed => {}
            DeliveryStatus::Read => record.is_read = true,
            DeliveryStatus::Replied(text) => {
                record.is_read = true;
                record.message = Some(text.clone());
            }
        }
        record.updated_at = Timestamp::now();
        Ok(true)
    }
}

#[async_trait]
impl SubscriberDirectory for MemoryStore {
    async fn find_poll(&self, name: &str) -> AppResult<Option<Poll>> {
        Ok(self.lock()?.polls.iter().find(|p| p.name == name).cloned())
    }

    async fn groups_for_poll(&self, poll_id: i32) -> AppResult<Vec<RecipientGroup>> {
        let state = self.lock()?;
        Ok(state
            .groups
            .iter()
            .filter(|g| g.active && state.group_polls.contains(&(g.id, poll_id)))
            .cloned()
            .collect())
    }

    async fn active_members(&self, group_id: i32) -> AppResult<Vec<Recipient>> {
        let state = self.lock()?;
        Ok(state
            .group_members
            .iter()
            .filter(|(group, _)| *group == group_id)
            .filter_map(|(_, recipient_id)| state.recipients.iter().find(|r| r.id == *recipient_id))
            .filter(|r| r.active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedSource, ParsedEvent};
    use jiff::tz::Offset;

    fn parsed(ts: &str, lon: f64, magnitude: f64, location: &str) -> NewEarthquake {
        let event = ParsedEvent {
            source: FeedSource::Kandilli,
            timestamp: ts.parse().unwrap(),
            latitude: 36.9173,
            longitude: lon,
            depth: 8.9,
            md: None,
            ml: Some(magnitude),
            mw: None,
            magnitude,
            location: location.to_string(),
            quality: "İlksel".to_string(),
        };
        NewEarthquake::from_parsed(event, Offset::constant(3))
    }

    #[tokio::test]
    async fn test_insert_skips_existing_key() {
        let store = MemoryStore::new();
        let first = store
            .insert(parsed("2025-05-13T06:05:56Z", 27.6803, 1.4, "GOKOVA KORFEZI"))
            .await
            .unwrap();
        assert!(first.is_some());

        let again = parsed("2025-05-13T06:05:56Z", 27.6803, 1.9, "GOKOVA KORFEZI");
        assert!(store.exists(&again.event.key()).await.unwrap());
        assert!(store.insert(again).await.unwrap().is_none());
        assert_eq!(store.earthquakes().len(), 1);
    }

    #[tokio::test]
    async fn test_search_filters_combine() {
        let store = MemoryStore::new();
        store.insert(parsed("2025-05-13T06:00:00Z", 27.1, 2.1, "GOKOVA KORFEZI")).await.unwrap();
        store.insert(parsed("2025-05-14T06:00:00Z", 27.2, 4.3, "Sindirgi (Balikesir)")).await.unwrap();
        store.insert(parsed("2025-05-15T06:00:00Z", 27.3, 3.0, "SINDIRGI-BALIKESIR")).await.unwrap();

        let filter = EarthquakeSearch {
            min_magnitude: Some(3.0),
            start_date: Some("2025-05-14".into()),
            location: Some("sindirgi".into()),
            limit: 10,
            ..Default::default()
        };
        let found = store.search(&filter).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].event_date, "2025-05-15");
        assert_eq!(found[1].event_date, "2025-05-14");
    }

    #[tokio::test]
    async fn test_calendar_queries_use_stored_fields() {
        let store = MemoryStore::new();
        // 22:30 UTC on May 31 is already June 1 at +03:00
        store.insert(parsed("2025-05-31T22:30:00Z", 27.1, 2.0, "A")).await.unwrap();
        store.insert(parsed("2025-05-30T10:00:00Z", 27.2, 2.0, "B")).await.unwrap();

        assert_eq!(store.by_month(2025, 6, 10).await.unwrap().len(), 1);
        assert_eq!(store.by_month(2025, 5, 10).await.unwrap().len(), 1);
        assert_eq!(store.by_date("2025-06-01", 10).await.unwrap()[0].location, "A");
        assert_eq!(store.by_week(2025, 22, 10).await.unwrap().len(), 2);
        assert_eq!(store.latest(1).await.unwrap()[0].location, "A");
    }

    #[tokio::test]
    async fn test_directory_filters_inactive_groups_and_members() {
        let store = MemoryStore::new();
        let poll = store.add_poll("deprem", 1.7);
        let active = store.add_group("ege", true);
        let inactive = store.add_group("marmara", false);
        store.subscribe(active.id, poll.id);
        store.subscribe(inactive.id, poll.id);

        let ayse = store.add_recipient("Ayşe", "905551112233", true);
        let mehmet = store.add_recipient("Mehmet", "905554445566", false);
        store.add_member(active.id, ayse.id);
        store.add_member(active.id, mehmet.id);

        assert_eq!(store.groups_for_poll(poll.id).await.unwrap(), vec![active.clone()]);
        assert_eq!(store.active_members(active.id).await.unwrap(), vec![ayse]);
        assert!(store.find_poll("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delivery_status_updates() {
        let store = MemoryStore::new();
        store
            .record_sent(NewNotification {
                message_id: "wamid.1".into(),
                recipient_id: 1,
                earthquake_id: 1,
                poll_name: "deprem".into(),
            })
            .await
            .unwrap();

        assert!(store.apply_delivery_status("wamid.1", &DeliveryStatus::Delivered).await.unwrap());
        assert!(!store.notifications()[0].is_read);

        let reply = DeliveryStatus::Replied("İyiyim".into());
        assert!(store.apply_delivery_status("wamid.1", &reply).await.unwrap());
        let record = &store.notifications()[0];
        assert!(record.is_read);
        assert_eq!(record.message.as_deref(), Some("İyiyim"));

        assert!(!store.apply_delivery_status("wamid.2", &DeliveryStatus::Read).await.unwrap());
    }
}
