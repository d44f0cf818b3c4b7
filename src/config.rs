//! Configuration options for the rental client

use std::path::PathBuf;
use std::time::Duration;

/// Configuration options for the rental client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound applied to every remote call
    pub request_timeout: Option<Duration>,

    /// Hourly rental price in currency units
    pub rent_price_per_hour: f64,

    /// Cadence of the countdown ticker and the availability poller
    pub tick_interval: Duration,

    /// Whether a proof photo is required when returning a bike
    pub require_return_photo: bool,

    /// Path of the local rental cache file
    pub cache_path: PathBuf,

    /// Storage bucket for return proof photos
    pub return_photo_bucket: String,

    /// Storage bucket for bike listing photos
    pub bike_photo_bucket: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            rent_price_per_hour: 15.0,
            tick_interval: Duration::from_secs(1),
            require_return_photo: true,
            cache_path: PathBuf::from("rental-data.json"),
            return_photo_bucket: "bike-return-photos".to_string(),
            bike_photo_bucket: "bike-photos".to_string(),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout; `None` disables the bound
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the hourly rental price
    pub fn with_rent_price_per_hour(mut self, value: f64) -> Self {
        self.rent_price_per_hour = value;
        self
    }

    /// Set the ticker/poller cadence
    pub fn with_tick_interval(mut self, value: Duration) -> Self {
        self.tick_interval = value;
        self
    }

    /// Set whether returns require a proof photo
    pub fn with_require_return_photo(mut self, value: bool) -> Self {
        self.require_return_photo = value;
        self
    }

    /// Set the local rental cache path
    pub fn with_cache_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.cache_path = value.into();
        self
    }

    /// Set the bucket that receives return proof photos
    pub fn with_return_photo_bucket(mut self, value: &str) -> Self {
        self.return_photo_bucket = value.to_string();
        self
    }

    /// Set the bucket that receives bike listing photos
    pub fn with_bike_photo_bucket(mut self, value: &str) -> Self {
        self.bike_photo_bucket = value.to_string();
        self
    }
}
