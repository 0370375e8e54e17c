//! Poll and subscriber directory models.
//!
//! Groups subscribe to polls and recipients belong to groups, both as
//! many-to-many relations.

use jiff::Timestamp;
use serde::Serialize;

/// Alerting configuration owned by the dashboard; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Poll {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
    pub min_magnitude: f64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientGroup {
    pub id: i32,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub id: i32,
    /// Display name passed into the template
    pub name: String,
    /// Phone number in international format, digits only
    pub address: String,
    pub active: bool,
}
