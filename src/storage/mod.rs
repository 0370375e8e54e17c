//! Storage ports and the in-memory backend.
//!
//! The Postgres backend lives in [`crate::repositories`].

pub mod memory;
mod traits;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use traits::{EarthquakeQueries, EarthquakeStore, NotificationStore, SubscriberDirectory};

use crate::repositories::Repositories;

/// The ports the services are wired with
#[derive(Clone)]
pub struct StoragePorts {
    pub earthquakes: Arc<dyn EarthquakeStore>,
    pub queries: Arc<dyn EarthquakeQueries>,
    pub notifications: Arc<dyn NotificationStore>,
    pub subscribers: Arc<dyn SubscriberDirectory>,
}

impl StoragePorts {
    pub fn from_repositories(repos: Repositories) -> Self {
        let earthquakes = Arc::new(repos.earthquakes);
        Self {
            earthquakes: earthquakes.clone(),
            queries: earthquakes,
            notifications: Arc::new(repos.notifications),
            subscribers: Arc::new(repos.subscribers),
        }
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            earthquakes: store.clone(),
            queries: store.clone(),
            notifications: store.clone(),
            subscribers: store,
        }
    }
}
