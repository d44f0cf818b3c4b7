//! Back-office services: inventory upkeep, issue reports, and the
//! transaction ledger.

use chrono::Datelike;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controller::PhotoUpload;
use crate::error::Error;
use crate::models::{
    Bike, BikePatch, CurrentUser, IssueKind, NewBike, NewBikePhoto, NewReport, Payment,
    RackLocation, Report, ReportStatus, Return,
};
use crate::storage::BlobStore;
use crate::store::Datastore;

fn require_admin(user: &CurrentUser) -> Result<(), Error> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(Error::auth("administrator role required"))
    }
}

/// Bike inventory upkeep, admin only
pub struct InventoryService {
    store: Arc<dyn Datastore>,
    blobs: Arc<dyn BlobStore>,
    photo_bucket: String,
}

impl InventoryService {
    pub fn new(store: Arc<dyn Datastore>, blobs: Arc<dyn BlobStore>, photo_bucket: &str) -> Self {
        Self {
            store,
            blobs,
            photo_bucket: photo_bucket.to_string(),
        }
    }

    /// Create a bike at a rack. New bikes stay off the listing until
    /// published.
    pub async fn add_bike(&self, user: &CurrentUser, rack_slug: &str) -> Result<Bike, Error> {
        require_admin(user)?;
        let Some(rack) = RackLocation::by_slug(rack_slug) else {
            return Err(Error::validation(format!("unknown rack location: {}", rack_slug)));
        };
        self.store
            .insert_bike(&NewBike {
                address: rack.label.to_string(),
                coordinates: rack.point,
                created_by: user.email.clone(),
            })
            .await
    }

    /// Apply a partial edit from the detail screen
    pub async fn update_details(
        &self,
        user: &CurrentUser,
        bike_id: i64,
        patch: &BikePatch,
    ) -> Result<(), Error> {
        require_admin(user)?;
        self.store.update_bike(bike_id, patch).await
    }

    /// Put the bike on the listing
    pub async fn publish(&self, user: &CurrentUser, bike_id: i64) -> Result<(), Error> {
        require_admin(user)?;
        self.store.update_bike(bike_id, &BikePatch::activate()).await
    }

    /// Take the bike off the listing without opening a rental window
    pub async fn mark_rented(&self, user: &CurrentUser, bike_id: i64) -> Result<(), Error> {
        require_admin(user)?;
        self.store.update_bike(bike_id, &BikePatch::deactivate()).await
    }

    /// Force a bike back to available, overriding whatever rental state the
    /// record carries; any leftover window timestamps become stale
    pub async fn mark_available(&self, user: &CurrentUser, bike_id: i64) -> Result<(), Error> {
        require_admin(user)?;
        self.store.update_bike(bike_id, &BikePatch::activate()).await
    }

    /// Upload a listing photo and attach it to the bike
    pub async fn attach_photo(
        &self,
        user: &CurrentUser,
        bike_id: i64,
        photo: &PhotoUpload,
    ) -> Result<String, Error> {
        require_admin(user)?;
        let url = self
            .blobs
            .upload_photo(
                &self.photo_bucket,
                &photo.file_name,
                photo.data.clone(),
                &photo.content_type,
            )
            .await?;
        self.store
            .insert_bike_photo(&NewBikePhoto {
                bike_id,
                url: url.clone(),
            })
            .await?;
        Ok(url)
    }

    /// Delete a bike, photo rows first so nothing dangles
    pub async fn delete_bike(&self, user: &CurrentUser, bike_id: i64) -> Result<(), Error> {
        require_admin(user)?;
        self.store.delete_bike_photos(bike_id).await?;
        self.store.delete_bike(bike_id).await
    }
}

/// Issue reports: user submission plus admin triage
pub struct ReportService {
    store: Arc<dyn Datastore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// File a report against a bike. `Other` requires free-text details;
    /// for the predefined kinds details are optional color.
    pub async fn submit(
        &self,
        user: &CurrentUser,
        bike_number: &str,
        issue: IssueKind,
        details: Option<&str>,
    ) -> Result<(), Error> {
        let bike_number = bike_number.trim();
        if bike_number.is_empty() {
            return Err(Error::validation("bike number is required"));
        }
        let details = details.map(str::trim).filter(|d| !d.is_empty());
        let description = match (&issue, details) {
            (IssueKind::Other, None) => {
                return Err(Error::validation("describe the issue when choosing Other"))
            }
            (IssueKind::Other, Some(text)) => text.to_string(),
            (kind, None) => kind.label().to_string(),
            (kind, Some(text)) => format!("{}: {}", kind.label(), text),
        };

        self.store
            .insert_report(&NewReport {
                bike_number: bike_number.to_string(),
                description,
                status: ReportStatus::Pending,
                created_by: user.email.clone(),
                full_name: user.full_name.clone(),
                avatar_url: user.avatar_url.clone(),
            })
            .await
    }

    /// Reports filed by one user, newest first as the store returns them
    pub async fn history_for(&self, email: &str) -> Result<Vec<Report>, Error> {
        let reports = self.store.fetch_reports().await?;
        Ok(reports
            .into_iter()
            .filter(|r| r.created_by == email)
            .collect())
    }

    /// Everything still waiting on triage
    pub async fn pending(&self, user: &CurrentUser) -> Result<Vec<Report>, Error> {
        require_admin(user)?;
        let reports = self.store.fetch_reports().await?;
        Ok(reports
            .into_iter()
            .filter(|r| r.status == ReportStatus::Pending)
            .collect())
    }

    /// Close a report out
    pub async fn resolve(&self, user: &CurrentUser, report_id: i64) -> Result<(), Error> {
        require_admin(user)?;
        self.store
            .set_report_status(report_id, ReportStatus::Resolved)
            .await
    }

    /// Report volume per calendar month, keyed `YYYY-MM`
    pub fn monthly_counts(reports: &[Report]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for report in reports {
            let key = format!("{:04}-{:02}", report.created_at.year(), report.created_at.month());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

/// One ledger line: a payment and the return recorded alongside it.
/// Payments and returns are append-only and written in step, so the ledger
/// pairs them positionally.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub payment: Payment,
    pub return_record: Option<Return>,
}

/// Read-side view over payments and returns
pub struct TransactionLedger {
    store: Arc<dyn Datastore>,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// The full transaction history
    pub async fn transactions(&self, user: &CurrentUser) -> Result<Vec<Transaction>, Error> {
        require_admin(user)?;
        let payments = self.store.fetch_payments().await?;
        let mut returns = self.store.fetch_returns().await?;
        // returns arrive newest first; pair them oldest first like payments
        returns.reverse();
        let mut returns = returns.into_iter();
        Ok(payments
            .into_iter()
            .map(|payment| Transaction {
                payment,
                return_record: returns.next(),
            })
            .collect())
    }

    /// Income per calendar month, keyed `YYYY-MM`
    pub fn monthly_income(payments: &[Payment]) -> BTreeMap<String, f64> {
        let mut income = BTreeMap::new();
        for payment in payments {
            let key = format!(
                "{:04}-{:02}",
                payment.created_at.year(),
                payment.created_at.month()
            );
            *income.entry(key).or_insert(0.0) += payment.amount;
        }
        income
    }

    /// Lifetime income across every payment
    pub fn total_income(payments: &[Payment]) -> f64 {
        payments.iter().map(|p| p.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn payment(id: i64, amount: f64, secs: i64) -> Payment {
        Payment {
            id,
            renter_name: "Ana Reyes".to_string(),
            reference_code: "1234567890123".to_string(),
            amount,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn monthly_income_groups_by_calendar_month() {
        // 2024-01-15 and 2024-01-20 fall in one bucket, 2024-02-01 in another
        let payments = vec![
            payment(1, 15.0, 1_705_276_800),
            payment(2, 30.0, 1_705_708_800),
            payment(3, 45.0, 1_706_745_600),
        ];
        let income = TransactionLedger::monthly_income(&payments);
        assert_eq!(income["2024-01"], 45.0);
        assert_eq!(income["2024-02"], 45.0);
        assert_eq!(TransactionLedger::total_income(&payments), 90.0);
    }

    #[test]
    fn monthly_counts_group_reports() {
        let report = |secs| Report {
            id: 1,
            bike_number: "2024-001".to_string(),
            description: "Flat tire".to_string(),
            status: ReportStatus::Pending,
            created_by: "a@b.c".to_string(),
            full_name: "Ana Reyes".to_string(),
            avatar_url: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        };
        let reports = vec![
            report(1_705_276_800),
            report(1_705_708_800),
            report(1_706_745_600),
        ];
        let counts = ReportService::monthly_counts(&reports);
        assert_eq!(counts["2024-01"], 2);
        assert_eq!(counts["2024-02"], 1);
    }
}
