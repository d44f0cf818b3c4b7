//! Bike listing and map annotations.
//!
//! Read-only views over the bike inventory: what a browsing user sees on
//! each card and map pin, derived from the remote record alone.

use chrono::{DateTime, Utc};
use log::warn;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::models::Bike;
use crate::store::{BikeFilter, Datastore};

/// What a listing card or map pin says about a bike
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Free to rent right now
    Available,
    /// A rental window is running; label reads `<H>h:<M>m left`
    RentedUntil { label: String },
    /// Rented with no running window, or the window has already expired
    /// and the record has not flipped back yet
    CurrentlyRented,
}

impl Availability {
    /// Derive the annotation from the bike record at a given instant.
    /// Leftover rental timestamps on an active bike are stale and ignored.
    pub fn of(bike: &Bike, now: DateTime<Utc>) -> Self {
        if bike.active {
            return Availability::Available;
        }
        match bike.rental_end_time {
            Some(end) if end > now => {
                let remaining = end - now;
                let hours = remaining.num_hours();
                let minutes = remaining.num_minutes() % 60;
                Availability::RentedUntil {
                    label: format!("{}h:{}m left", hours, minutes),
                }
            }
            _ => Availability::CurrentlyRented,
        }
    }

    /// The text shown on the card
    pub fn label(&self) -> &str {
        match self {
            Availability::Available => "Available",
            Availability::RentedUntil { label } => label,
            Availability::CurrentlyRented => "Currently Rented",
        }
    }
}

/// One bike with its derived annotation
#[derive(Debug, Clone)]
pub struct ListedBike {
    pub bike: Bike,
    pub availability: Availability,
}

/// Handle to the background listing poller
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Read-side service over the bike inventory
pub struct ListingService {
    store: Arc<dyn Datastore>,
}

impl ListingService {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Fetch and annotate the listing, newest bikes first
    pub async fn list(&self, filter: &BikeFilter) -> Result<Vec<ListedBike>, Error> {
        self.list_at(filter, Utc::now()).await
    }

    /// `list` with an explicit clock
    pub async fn list_at(
        &self,
        filter: &BikeFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ListedBike>, Error> {
        let bikes = self.store.fetch_bikes(filter).await?;
        Ok(bikes
            .into_iter()
            .map(|bike| ListedBike {
                availability: Availability::of(&bike, now),
                bike,
            })
            .collect())
    }

    /// Fetch one bike with its annotation
    pub async fn get(&self, bike_id: i64) -> Result<Option<ListedBike>, Error> {
        let now = Utc::now();
        Ok(self.store.fetch_bike(bike_id).await?.map(|bike| ListedBike {
            availability: Availability::of(&bike, now),
            bike,
        }))
    }

    /// Re-poll the listing on a fixed cadence, publishing each snapshot on
    /// the returned watch channel. Failed polls keep the previous snapshot.
    pub fn spawn_poller(
        self: &Arc<Self>,
        filter: BikeFilter,
        cadence: std::time::Duration,
    ) -> (PollerHandle, watch::Receiver<Vec<ListedBike>>) {
        let service = Arc::clone(self);
        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            loop {
                interval.tick().await;
                match service.list(&filter).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("listing poll failed, keeping last snapshot: {}", e),
                }
            }
        });
        (PollerHandle { task }, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bike(active: bool, end: Option<DateTime<Utc>>) -> Bike {
        Bike {
            id: 1,
            active,
            address: None,
            coordinates: None,
            bike_number: None,
            vehicle_type: None,
            kind: None,
            condition: None,
            material: None,
            description: None,
            rental_start_time: None,
            rental_end_time: end,
            created_by: None,
            photos: Vec::new(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn active_bike_is_available() {
        let annotated = Availability::of(&bike(true, None), at(0));
        assert_eq!(annotated, Availability::Available);
    }

    #[test]
    fn stale_window_on_active_bike_is_ignored() {
        // a leftover future end time must not hide an available bike
        let annotated = Availability::of(&bike(true, Some(at(10_000))), at(0));
        assert_eq!(annotated, Availability::Available);
    }

    #[test]
    fn running_window_shows_time_left() {
        // 1h 31m remaining
        let annotated = Availability::of(&bike(false, Some(at(5_460))), at(0));
        assert_eq!(annotated.label(), "1h:31m left");
    }

    #[test]
    fn expired_window_reads_currently_rented() {
        let annotated = Availability::of(&bike(false, Some(at(100))), at(200));
        assert_eq!(annotated, Availability::CurrentlyRented);
        // so does a rented bike without any window at all
        let annotated = Availability::of(&bike(false, None), at(200));
        assert_eq!(annotated, Availability::CurrentlyRented);
    }
}
