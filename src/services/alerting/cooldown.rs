use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};

use crate::error::AppResult;
use crate::storage::{EarthquakeStore, NotificationStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Clear,
    Active {
        /// Event that triggered the previous burst
        last_event_id: i64,
        remaining: SignedDuration,
    },
}

/// Suppresses a new burst while the previous one is recent.
///
/// The window is measured from when the event behind the latest sent
/// notification was stored, regardless of poll.
pub struct CooldownGuard {
    notifications: Arc<dyn NotificationStore>,
    earthquakes: Arc<dyn EarthquakeStore>,
    window: SignedDuration,
}

impl CooldownGuard {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        earthquakes: Arc<dyn EarthquakeStore>,
        cooldown_minutes: u64,
    ) -> Self {
        let minutes = i64::try_from(cooldown_minutes)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 60);
        Self {
            notifications,
            earthquakes,
            window: SignedDuration::from_mins(minutes),
        }
    }

    pub async fn check(&self, now: Timestamp) -> AppResult<CooldownStatus> {
        if self.window.is_zero() {
            return Ok(CooldownStatus::Clear);
        }

        let Some(latest) = self.notifications.latest_sent().await? else {
            return Ok(CooldownStatus::Clear);
        };

        let Some(event) = self.earthquakes.find_by_id(latest.earthquake_id).await? else {
            tracing::warn!(
                earthquake_id = latest.earthquake_id,
                "Latest notification points at a missing event, ignoring cooldown"
            );
            return Ok(CooldownStatus::Clear);
        };

        let elapsed = now.duration_since(event.created_at);
        if elapsed < self.window {
            Ok(CooldownStatus::Active {
                last_event_id: event.id,
                remaining: self.window - elapsed,
            })
        } else {
            Ok(CooldownStatus::Clear)
        }
    }
}
