//! Rent-a-Bike Core Library
//!
//! The rental lifecycle engine behind a campus bike-share: listing and map
//! views, payment-confirmed rentals with a live countdown, overdue fees,
//! photo-verified returns, and back-office inventory, report, and ledger
//! services, all against Supabase-style backend services.

pub mod admin;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod listing;
pub mod models;
pub mod realtime;
pub mod storage;
pub mod store;

use reqwest::Client;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::admin::{InventoryService, ReportService, TransactionLedger};
use crate::auth::Auth;
use crate::cache::{FileStore, RentalCache};
use crate::config::ClientOptions;
use crate::controller::{Notice, RentalController};
use crate::error::Error;
use crate::listing::ListingService;
use crate::models::Bike;
use crate::realtime::{ChangeKind, RealtimeClient, Subscription};
use crate::storage::PhotoStorage;
use crate::store::RestStore;

/// The main entry point for the rental client
pub struct RentABike {
    /// The base URL for the backend project
    pub url: String,
    /// The anonymous API key for the backend project
    pub key: String,
    /// HTTP client shared by every sub-client
    pub http_client: Client,
    /// Auth client for session handling
    pub auth: Auth,
    /// Client options
    pub options: ClientOptions,
}

impl RentABike {
    /// Create a new rental client
    ///
    /// # Example
    ///
    /// ```
    /// use rent_a_bike::RentABike;
    ///
    /// let client = RentABike::new("https://your-project-url.supabase.co", "your-anon-key");
    /// ```
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a new rental client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use rent_a_bike::{RentABike, config::ClientOptions};
    ///
    /// let options = ClientOptions::default().with_require_return_photo(false);
    /// let client = RentABike::new_with_options(
    ///     "https://your-project-url.supabase.co",
    ///     "your-anon-key",
    ///     options,
    /// );
    /// ```
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Self {
        let http_client = Client::new();
        let auth = Auth::new(url, key, http_client.clone(), options.request_timeout);

        Self {
            url: url.to_string(),
            key: key.to_string(),
            http_client,
            auth,
            options,
        }
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// The typed record store over the rental collections
    pub fn store(&self) -> Arc<RestStore> {
        Arc::new(RestStore::new(
            &self.url,
            &self.key,
            self.http_client.clone(),
            self.options.request_timeout,
        ))
    }

    /// The photo blob store
    pub fn photos(&self) -> Arc<PhotoStorage> {
        Arc::new(PhotoStorage::new(
            &self.url,
            &self.key,
            self.http_client.clone(),
            self.options.request_timeout,
        ))
    }

    /// The realtime change-feed client
    pub fn realtime(&self) -> RealtimeClient {
        RealtimeClient::new(&self.url, &self.key)
    }

    /// The read-side listing service
    pub fn listing(&self) -> Arc<ListingService> {
        Arc::new(ListingService::new(self.store()))
    }

    /// Admin inventory service
    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.store(), self.photos(), &self.options.bike_photo_bucket)
    }

    /// Issue report service
    pub fn reports(&self) -> ReportService {
        ReportService::new(self.store())
    }

    /// Transaction ledger
    pub fn ledger(&self) -> TransactionLedger {
        TransactionLedger::new(self.store())
    }

    /// Build the rental lifecycle controller over the production
    /// collaborators and the file-backed cache
    pub fn controller(&self) -> (Arc<RentalController>, mpsc::UnboundedReceiver<Notice>) {
        let cache = RentalCache::new(Box::new(FileStore::new(self.options.cache_path.clone())));
        RentalController::new(self.store(), self.photos(), cache, self.options.clone())
    }

    /// Subscribe the controller to remote bike updates so rentals ended
    /// elsewhere reconcile the local state
    pub async fn connect_reconciler(
        &self,
        controller: &Arc<RentalController>,
    ) -> Result<Subscription, Error> {
        let (subscription, events) = self
            .realtime()
            .subscribe::<Bike>("public", "bike", &[ChangeKind::Update])
            .await?;
        controller.spawn_reconciler(events);
        Ok(subscription)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::controller::{Notice, NoticeLevel, PaymentForm, RentalController, ReturnForm};
    pub use crate::error::Error;
    pub use crate::RentABike;
}
