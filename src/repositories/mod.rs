//! Repository layer for data access operations.
//!
//! Postgres implementations of the [`crate::storage`] ports.

mod earthquake_repo;
mod notification_repo;
mod subscriber_repo;

pub use earthquake_repo::EarthquakeRepository;
pub use notification_repo::NotificationRepository;
pub use subscriber_repo::SubscriberRepository;

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub earthquakes: EarthquakeRepository,
    pub notifications: NotificationRepository,
    pub subscribers: SubscriberRepository,
}

impl Repositories {
    /// Creates a new Repositories instance with all repositories initialized.
    ///
    /// # Arguments
    /// * `pool` - The async database connection pool
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            earthquakes: EarthquakeRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            subscribers: SubscriberRepository::new(pool),
        }
    }
}
