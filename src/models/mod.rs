//! Domain models.
//!
//! Database row types live next to their repositories; these are the
//! shapes the services work with.

mod earthquake;
mod notification;
mod subscriber;

pub use earthquake::{
    CalendarFields, EarthquakeEvent, EarthquakeSearch, EarthquakeStats, EventKey, FeedSource,
    MagnitudeBuckets, NewEarthquake, ParsedEvent, display_magnitude,
};
pub use notification::{
    DeliveryStatus, FailedNotificationRecord, FailureReason, NewFailedNotification,
    NewNotification, NotificationRecord,
};
pub use subscriber::{Poll, Recipient, RecipientGroup};
