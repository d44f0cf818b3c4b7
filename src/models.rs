//! Typed records for the rental collections.
//!
//! The remote store returns untyped JSON rows; everything is validated into
//! these shapes at the store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair as stored on the bike record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A named campus rack where bikes are parked and returned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RackLocation {
    pub label: &'static str,
    pub slug: &'static str,
    pub point: GeoPoint,
}

/// The fixed set of racks bikes can be assigned to or returned at
pub const RACK_LOCATIONS: [RackLocation; 6] = [
    RackLocation { label: "Main Gate", slug: "main-gate", point: GeoPoint { lat: 8.95742, lng: 125.59735 } },
    RackLocation { label: "Green Gate", slug: "green-gate", point: GeoPoint { lat: 8.95702, lng: 125.59802 } },
    RackLocation { label: "Kinaadman Lot", slug: "kinaadman-lot", point: GeoPoint { lat: 8.95623, lng: 125.59752 } },
    RackLocation { label: "Villares Lot", slug: "villares-lot", point: GeoPoint { lat: 8.95329, lng: 125.59752 } },
    RackLocation { label: "Hiradya Lot", slug: "hiradya-lot", point: GeoPoint { lat: 8.95445, lng: 125.59768 } },
    RackLocation { label: "Main Gymnasium", slug: "main-gymnasium", point: GeoPoint { lat: 8.95584, lng: 125.595828 } },
];

impl RackLocation {
    /// Look a rack up by its slug, e.g. `main-gate`
    pub fn by_slug(slug: &str) -> Option<&'static RackLocation> {
        RACK_LOCATIONS.iter().find(|r| r.slug == slug)
    }

    /// Look a rack up by its display label, e.g. `Main Gate`
    pub fn by_label(label: &str) -> Option<&'static RackLocation> {
        RACK_LOCATIONS.iter().find(|r| r.label == label)
    }
}

/// A bike inventory record.
///
/// When `active` is true any leftover rental timestamps are stale and must
/// be ignored by readers; the rental window is only authoritative while the
/// bike is inactive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    pub id: i64,
    #[serde(default)]
    pub active: bool,
    pub address: Option<String>,
    pub coordinates: Option<GeoPoint>,
    /// Label painted on the frame, e.g. `2024-001`
    pub bike_number: Option<String>,
    pub vehicle_type: Option<String>,
    /// Pricing class: `inclusive` or `exclusive`
    pub kind: Option<String>,
    pub condition: Option<String>,
    pub material: Option<String>,
    pub description: Option<String>,
    pub rental_start_time: Option<DateTime<Utc>>,
    pub rental_end_time: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    /// Joined photo rows, present when the query embeds them
    #[serde(default, rename = "bike_photo")]
    pub photos: Vec<BikePhoto>,
}

/// A photo attached to a bike listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikePhoto {
    pub id: i64,
    pub bike_id: i64,
    pub url: String,
}

/// Insert shape for a new bike; everything else is filled in later from the
/// edit screen, and the bike stays inactive until published
#[derive(Debug, Clone, Serialize)]
pub struct NewBike {
    pub address: String,
    pub coordinates: GeoPoint,
    pub created_by: String,
}

/// Insert shape for a bike photo row
#[derive(Debug, Clone, Serialize)]
pub struct NewBikePhoto {
    pub bike_id: i64,
    pub url: String,
}

/// Partial update applied to a bike record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BikePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bike_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rental_start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rental_end_time: Option<DateTime<Utc>>,
}

impl BikePatch {
    /// Take the bike off the listing and stamp the rental window
    pub fn start_rental(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            active: Some(false),
            rental_start_time: Some(start),
            rental_end_time: Some(end),
            ..Self::default()
        }
    }

    /// Flip the bike back to available; leftover timestamps stay stale
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    /// Mark the bike rented without a rental window (admin override)
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    /// Park the bike at a rack and make it available again
    pub fn return_to(rack: &RackLocation) -> Self {
        Self {
            active: Some(true),
            address: Some(rack.label.to_string()),
            coordinates: Some(rack.point),
            ..Self::default()
        }
    }
}

/// An immutable payment record; appended once per confirmed rental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub renter_name: String,
    /// 13-digit numeric payment reference
    pub reference_code: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a payment record
#[derive(Debug, Clone, Serialize)]
pub struct NewPayment {
    pub renter_name: String,
    pub reference_code: String,
    pub amount: f64,
}

/// One return event: who brought which bike back, with optional photo proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub id: i64,
    pub bike_id: i64,
    pub photo_url: Option<String>,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub returned_at: DateTime<Utc>,
}

/// Insert shape for a return record
#[derive(Debug, Clone, Serialize)]
pub struct NewReturn {
    pub bike_id: i64,
    pub photo_url: Option<String>,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Processing state of a reported issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
}

/// A reported bike issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub bike_number: String,
    pub description: String,
    pub status: ReportStatus,
    pub created_by: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a report
#[derive(Debug, Clone, Serialize)]
pub struct NewReport {
    pub bike_number: String,
    pub description: String,
    pub status: ReportStatus,
    pub created_by: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// The predefined issue choices on the report form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    FlatTire,
    BrokenChain,
    LooseBrakes,
    Other,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::FlatTire => "Flat tire",
            IssueKind::BrokenChain => "Broken chain",
            IssueKind::LooseBrakes => "Loose brakes",
            IssueKind::Other => "Other",
        }
    }
}

/// The signed-in identity as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

impl CurrentUser {
    /// Whether the session carries the administrator role claim
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
