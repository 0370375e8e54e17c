use std::cmp::Ordering;

use crate::models::EarthquakeEvent;

/// What the threshold gate decided for one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Nothing new was ingested
    NoCandidate,
    /// The strongest new event is weaker than the poll threshold
    BelowThreshold(EarthquakeEvent),
    Alert(EarthquakeEvent),
}

/// Strongest event: highest magnitude, then earliest timestamp, then lowest id.
pub fn select_candidate<'a, I>(events: I) -> Option<&'a EarthquakeEvent>
where
    I: IntoIterator<Item = &'a EarthquakeEvent>,
{
    events.into_iter().min_by(|a, b| rank(a, b))
}

fn rank(a: &EarthquakeEvent, b: &EarthquakeEvent) -> Ordering {
    b.magnitude
        .total_cmp(&a.magnitude)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn evaluate<'a, I>(events: I, threshold: f64) -> GateDecision
where
    I: IntoIterator<Item = &'a EarthquakeEvent>,
{
    match select_candidate(events) {
        None => GateDecision::NoCandidate,
        Some(event) if event.magnitude < threshold => GateDecision::BelowThreshold(event.clone()),
        Some(event) => GateDecision::Alert(event.clone()),
    }
}
