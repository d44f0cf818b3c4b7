//! Remote datastore: typed access to the rental collections.
//!
//! `Datastore` is the seam the rental services are written against;
//! `RestStore` is the production implementation speaking the PostgREST
//! dialect. Tests substitute in-memory stores.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::Error;
use crate::models::{
    Bike, BikePatch, NewBike, NewBikePhoto, NewPayment, NewReport, NewReturn, Payment, Report,
    ReportStatus, Return,
};

pub mod query;

use self::query::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};

/// Columns fetched for bike listings, with photo rows embedded
const BIKE_COLUMNS: &str = "*,bike_photo(*)";

/// Optional narrowing applied to a bike listing query
#[derive(Debug, Clone, Default)]
pub struct BikeFilter {
    /// Case-insensitive substring match on the frame number
    pub bike_number: Option<String>,
    /// Case-insensitive substring match on the rack address label
    pub address: Option<String>,
    /// Exact match on the pricing class
    pub kind: Option<String>,
    /// Exact match on the vehicle type
    pub vehicle_type: Option<String>,
    /// Keep only bikes currently available for rent
    pub active_only: bool,
}

/// The operations the rental services need from the remote store
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn fetch_bikes(&self, filter: &BikeFilter) -> Result<Vec<Bike>, Error>;
    async fn fetch_bike(&self, bike_id: i64) -> Result<Option<Bike>, Error>;
    async fn insert_bike(&self, bike: &NewBike) -> Result<Bike, Error>;
    async fn update_bike(&self, bike_id: i64, patch: &BikePatch) -> Result<(), Error>;
    async fn delete_bike(&self, bike_id: i64) -> Result<(), Error>;

    async fn insert_bike_photo(&self, photo: &NewBikePhoto) -> Result<(), Error>;
    async fn delete_bike_photos(&self, bike_id: i64) -> Result<(), Error>;

    async fn insert_payment(&self, payment: &NewPayment) -> Result<(), Error>;
    async fn fetch_payments(&self) -> Result<Vec<Payment>, Error>;

    async fn insert_return(&self, record: &NewReturn) -> Result<(), Error>;
    async fn fetch_returns(&self) -> Result<Vec<Return>, Error>;

    async fn insert_report(&self, report: &NewReport) -> Result<(), Error>;
    async fn fetch_reports(&self) -> Result<Vec<Report>, Error>;
    async fn set_report_status(&self, report_id: i64, status: ReportStatus)
        -> Result<(), Error>;
}

/// PostgREST-backed datastore
pub struct RestStore {
    base_url: String,
    key: String,
    http: Client,
    timeout: Option<Duration>,
}

impl RestStore {
    pub fn new(base_url: &str, key: &str, http: Client, timeout: Option<Duration>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http,
            timeout,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn select(&self, table: &str, columns: &str) -> SelectBuilder {
        SelectBuilder::new(
            self.table_url(table),
            self.key.clone(),
            columns,
            self.http.clone(),
            self.timeout,
        )
    }

    fn insert<T: serde::Serialize>(&self, table: &str, values: T) -> InsertBuilder<T> {
        InsertBuilder::new(
            self.table_url(table),
            self.key.clone(),
            values,
            self.http.clone(),
            self.timeout,
        )
    }

    fn update<T: serde::Serialize>(&self, table: &str, values: T) -> UpdateBuilder<T> {
        UpdateBuilder::new(
            self.table_url(table),
            self.key.clone(),
            values,
            self.http.clone(),
            self.timeout,
        )
    }

    fn delete(&self, table: &str) -> DeleteBuilder {
        DeleteBuilder::new(
            self.table_url(table),
            self.key.clone(),
            self.http.clone(),
            self.timeout,
        )
    }
}

#[async_trait]
impl Datastore for RestStore {
    async fn fetch_bikes(&self, filter: &BikeFilter) -> Result<Vec<Bike>, Error> {
        let mut query = self.select("bike", BIKE_COLUMNS).order("id", false);
        if let Some(ref number) = filter.bike_number {
            query = query.ilike("bike_number", &format!("%{}%", number));
        }
        if let Some(ref address) = filter.address {
            query = query.ilike("address", &format!("%{}%", address));
        }
        if let Some(ref kind) = filter.kind {
            query = query.eq("kind", kind);
        }
        if let Some(ref vehicle_type) = filter.vehicle_type {
            query = query.eq("vehicle_type", vehicle_type);
        }
        if filter.active_only {
            query = query.eq("active", true);
        }
        query.execute::<Bike>().await
    }

    async fn fetch_bike(&self, bike_id: i64) -> Result<Option<Bike>, Error> {
        self.select("bike", BIKE_COLUMNS)
            .eq("id", bike_id)
            .execute_one::<Bike>()
            .await
    }

    async fn insert_bike(&self, bike: &NewBike) -> Result<Bike, Error> {
        let rows = self.insert("bike", bike).execute::<Bike>().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::remote_write("insert returned no bike row"))
    }

    async fn update_bike(&self, bike_id: i64, patch: &BikePatch) -> Result<(), Error> {
        self.update("bike", patch)
            .eq("id", bike_id)
            .execute_no_return()
            .await
    }

    async fn delete_bike(&self, bike_id: i64) -> Result<(), Error> {
        self.delete("bike").eq("id", bike_id).execute_no_return().await
    }

    async fn insert_bike_photo(&self, photo: &NewBikePhoto) -> Result<(), Error> {
        self.insert("bike_photo", photo).execute_no_return().await
    }

    async fn delete_bike_photos(&self, bike_id: i64) -> Result<(), Error> {
        self.delete("bike_photo")
            .eq("bike_id", bike_id)
            .execute_no_return()
            .await
    }

    async fn insert_payment(&self, payment: &NewPayment) -> Result<(), Error> {
        self.insert("payment", payment).execute_no_return().await
    }

    async fn fetch_payments(&self) -> Result<Vec<Payment>, Error> {
        self.select("payment", "*")
            .order("created_at", true)
            .execute::<Payment>()
            .await
    }

    async fn insert_return(&self, record: &NewReturn) -> Result<(), Error> {
        self.insert("return", record).execute_no_return().await
    }

    async fn fetch_returns(&self) -> Result<Vec<Return>, Error> {
        self.select("return", "*")
            .order("returned_at", false)
            .execute::<Return>()
            .await
    }

    async fn insert_report(&self, report: &NewReport) -> Result<(), Error> {
        self.insert("report", report).execute_no_return().await
    }

    async fn fetch_reports(&self) -> Result<Vec<Report>, Error> {
        self.select("report", "*")
            .order("created_at", false)
            .execute::<Report>()
            .await
    }

    async fn set_report_status(
        &self,
        report_id: i64,
        status: ReportStatus,
    ) -> Result<(), Error> {
        #[derive(serde::Serialize)]
        struct StatusPatch {
            status: ReportStatus,
        }
        self.update("report", StatusPatch { status })
            .eq("id", report_id)
            .execute_no_return()
            .await
    }
}
