//! Rental lifecycle controller.
//!
//! Drives a bike through available → paid → rented → overdue → returned →
//! available, keeping the local rental cache and the remote store in step.
//! The remote bike record is authoritative; the controller reconciles toward
//! it and never trusts the cache over a remote update.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::RentalCache;
use crate::clock;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::models::{BikePatch, Bike, NewPayment, NewReturn, RackLocation};
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::storage::BlobStore;
use crate::store::Datastore;

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A message for the embedding UI to surface to the user
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Input for confirming a rental payment
#[derive(Debug, Clone)]
pub struct PaymentForm {
    pub renter_name: String,
    /// 13-digit numeric payment reference from the payment provider
    pub reference_code: String,
    /// Whole hours being rented, must be positive
    pub hours: i64,
}

/// A photo attached to a return, already read into memory
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Input for returning a bike
#[derive(Debug, Clone)]
pub struct ReturnForm {
    /// Slug of the rack the bike was parked at
    pub rack_slug: String,
    pub photo: Option<PhotoUpload>,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Per-tick snapshot of one tracked rental
#[derive(Debug, Clone)]
pub struct RentalStatus {
    pub bike_id: i64,
    pub rental_end: DateTime<Utc>,
    pub remaining_ms: i64,
    /// `HH:MM:SS` countdown, `00:00:00` once expired
    pub countdown: String,
    pub overdue_fee: f64,
}

/// Removes a bike id from the in-flight set when the operation ends,
/// whichever way it ends
struct InFlight<'a> {
    set: &'a Mutex<HashSet<i64>>,
    bike_id: i64,
}

impl<'a> Drop for InFlight<'a> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.bike_id);
        }
    }
}

/// Handle to the background countdown ticker. The ticker keeps running
/// until it is stopped explicitly; it does not follow any view lifetime.
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Stop the ticker
    pub fn stop(&self) {
        self.task.abort();
    }
}

/// The rental lifecycle controller
pub struct RentalController {
    store: Arc<dyn Datastore>,
    blobs: Arc<dyn BlobStore>,
    cache: RentalCache,
    options: ClientOptions,
    /// Bikes with a pay/return currently in flight
    in_flight: Mutex<HashSet<i64>>,
    /// Bikes with an auto-end write currently in flight
    ending: Mutex<HashSet<i64>>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl RentalController {
    /// Build a controller. The returned receiver carries user-facing
    /// notices; the embedding UI drains it.
    pub fn new(
        store: Arc<dyn Datastore>,
        blobs: Arc<dyn BlobStore>,
        cache: RentalCache,
        options: ClientOptions,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            store,
            blobs,
            cache,
            options,
            in_flight: Mutex::new(HashSet::new()),
            ending: Mutex::new(HashSet::new()),
            notices: tx,
        });
        (controller, rx)
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        // receiver may be gone; notices are best-effort
        let _ = self.notices.send(Notice {
            level,
            message: message.into(),
        });
    }

    /// Reject a user-initiated operation, surfacing the reason as a notice
    fn reject(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        self.notify(NoticeLevel::Error, message.clone());
        Error::Validation(message)
    }

    fn begin(&self, bike_id: i64) -> Result<InFlight<'_>, Error> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| Error::general("in-flight set lock poisoned"))?;
        if !set.insert(bike_id) {
            return Err(Error::validation(format!(
                "another operation for bike {} is already in progress",
                bike_id
            )));
        }
        Ok(InFlight {
            set: &self.in_flight,
            bike_id,
        })
    }

    /// Price a rental of `hours` whole hours
    pub fn quote(&self, hours: i64) -> Result<f64, Error> {
        if hours <= 0 {
            return Err(Error::validation("rental duration must be at least one hour"));
        }
        Ok(self.options.rent_price_per_hour * hours as f64)
    }

    /// Confirm a payment and open the rental window, anchored at the
    /// current wall clock
    pub async fn pay(&self, bike_id: i64, form: &PaymentForm) -> Result<DateTime<Utc>, Error> {
        self.pay_at(bike_id, form, Utc::now()).await
    }

    /// `pay` with an explicit clock
    pub async fn pay_at(
        &self,
        bike_id: i64,
        form: &PaymentForm,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, Error> {
        let _guard = self.begin(bike_id).map_err(|e| match e {
            Error::Validation(message) => self.reject(message),
            other => other,
        })?;

        let renter_name = form.renter_name.trim();
        if renter_name.is_empty() {
            return Err(self.reject("renter name is required"));
        }
        if form.reference_code.len() != 13
            || !form.reference_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(self.reject("payment reference must be exactly 13 digits"));
        }
        let amount = self.quote(form.hours).map_err(|e| match e {
            Error::Validation(message) => self.reject(message),
            other => other,
        })?;

        // payment first, bike second; a failure in between leaves the
        // payment on record and the bike untouched
        let payment = NewPayment {
            renter_name: renter_name.to_string(),
            reference_code: form.reference_code.clone(),
            amount,
        };
        if let Err(e) = self.store.insert_payment(&payment).await {
            self.notify(
                NoticeLevel::Error,
                format!("Payment could not be recorded: {}", e),
            );
            return Err(e);
        }

        let rental_end = now + ChronoDuration::hours(form.hours);
        if let Err(e) = self
            .store
            .update_bike(bike_id, &BikePatch::start_rental(now, rental_end))
            .await
        {
            let message = format!(
                "payment reference {} was recorded but bike {} could not be marked rented: {}",
                form.reference_code, bike_id, e
            );
            self.notify(NoticeLevel::Error, message.clone());
            return Err(Error::remote_write(message));
        }

        if let Err(e) = self.cache.set(bike_id, rental_end) {
            // the remote record is already correct; losing the cache entry
            // only costs the local countdown
            warn!("failed to cache rental for bike {}: {}", bike_id, e);
        }

        self.notify(
            NoticeLevel::Success,
            format!("Payment confirmed, bike {} is yours until {}", bike_id, rental_end),
        );
        Ok(rental_end)
    }

    /// Recompute every tracked rental and auto-end the expired ones,
    /// anchored at the current wall clock
    pub async fn tick(&self) -> Vec<RentalStatus> {
        self.tick_at(Utc::now()).await
    }

    /// `tick` with an explicit clock
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<RentalStatus> {
        let tracked = self.cache.load();
        let mut statuses = Vec::with_capacity(tracked.len());
        for (bike_id, rental_end) in tracked {
            let remaining_ms = clock::remaining_millis(now, rental_end);
            statuses.push(RentalStatus {
                bike_id,
                rental_end,
                remaining_ms,
                countdown: clock::format_hms(remaining_ms),
                overdue_fee: clock::overdue_fee(now, rental_end),
            });
            if remaining_ms <= 0 {
                self.auto_end(bike_id).await;
            }
        }
        statuses
    }

    /// Flip an expired rental back to available. Guarded so overlapping
    /// ticks never issue the write twice; a failed write is retried on the
    /// next tick.
    async fn auto_end(&self, bike_id: i64) {
        {
            let Ok(mut ending) = self.ending.lock() else {
                return;
            };
            if !ending.insert(bike_id) {
                debug!("auto-end already in flight for bike {}", bike_id);
                return;
            }
        }

        let result = self.store.update_bike(bike_id, &BikePatch::activate()).await;
        if let Ok(mut ending) = self.ending.lock() {
            ending.remove(&bike_id);
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.cache.remove(bike_id) {
                    warn!("failed to drop ended rental for bike {}: {}", bike_id, e);
                }
                self.notify(
                    NoticeLevel::Info,
                    format!("Rental for bike {} has ended", bike_id),
                );
            }
            Err(e) => {
                warn!("auto-end write for bike {} failed, will retry: {}", bike_id, e);
            }
        }
    }

    /// Return a bike to a rack, with proof photo when policy requires one
    pub async fn submit_return(&self, bike_id: i64, form: &ReturnForm) -> Result<(), Error> {
        let _guard = self.begin(bike_id).map_err(|e| match e {
            Error::Validation(message) => self.reject(message),
            other => other,
        })?;

        let Some(rack) = RackLocation::by_slug(&form.rack_slug) else {
            return Err(self.reject(format!("unknown rack location: {}", form.rack_slug)));
        };
        if self.options.require_return_photo && form.photo.is_none() {
            return Err(self.reject("a proof photo is required to return this bike"));
        }

        let photo_url = match &form.photo {
            Some(photo) => {
                let url = self
                    .blobs
                    .upload_photo(
                        &self.options.return_photo_bucket,
                        &photo.file_name,
                        photo.data.clone(),
                        &photo.content_type,
                    )
                    .await
                    .map_err(|e| {
                        self.notify(
                            NoticeLevel::Error,
                            format!("Return photo upload failed: {}", e),
                        );
                        e
                    })?;
                Some(url)
            }
            None => None,
        };

        let record = NewReturn {
            bike_id,
            photo_url,
            full_name: form.full_name.clone(),
            email: form.email.clone(),
            avatar_url: form.avatar_url.clone(),
        };
        if let Err(e) = self.store.insert_return(&record).await {
            self.notify(
                NoticeLevel::Error,
                format!("Return could not be recorded: {}", e),
            );
            return Err(e);
        }

        if let Err(e) = self
            .store
            .update_bike(bike_id, &BikePatch::return_to(rack))
            .await
        {
            let message = format!(
                "return of bike {} was recorded but the bike could not be made available again: {}",
                bike_id, e
            );
            self.notify(NoticeLevel::Error, message.clone());
            return Err(Error::remote_write(message));
        }

        if let Err(e) = self.cache.remove(bike_id) {
            warn!("failed to drop returned bike {} from the cache: {}", bike_id, e);
        }
        self.notify(
            NoticeLevel::Success,
            format!("Bike {} returned at {}", bike_id, rack.label),
        );
        Ok(())
    }

    /// Apply one remote bike change. A bike flipping back to available
    /// clears its cache entry; duplicates and replays are no-ops.
    pub fn apply_remote_event(&self, event: &ChangeEvent<Bike>) {
        if event.kind != ChangeKind::Update {
            return;
        }
        let Some(bike) = &event.record else {
            return;
        };
        if !bike.active {
            return;
        }
        match self.cache.remove(bike.id) {
            Ok(true) => {
                self.notify(
                    NoticeLevel::Info,
                    format!("Your rental of bike {} has ended", bike.id),
                );
            }
            Ok(false) => {}
            Err(e) => warn!("failed to reconcile bike {}: {}", bike.id, e),
        }
    }

    /// Start the background countdown ticker at the configured cadence
    pub fn start_ticker(self: &Arc<Self>) -> TickerHandle {
        let controller = Arc::clone(self);
        let cadence = controller.options.tick_interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            loop {
                interval.tick().await;
                controller.tick().await;
            }
        });
        TickerHandle { task }
    }

    /// Drain a realtime change feed into the reconciler until the feed
    /// closes
    pub fn spawn_reconciler(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ChangeEvent<Bike>>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.apply_remote_event(&event);
            }
            debug!("change feed closed, reconciler stopping");
        })
    }
}
