//! Typed view of the raw payload returned by the practice-management API.
//!
//! The upstream schema is unstable, so every field the pipeline does not
//! strictly require is optional and defaults rather than failing
//! deserialization. Missing numeric fields read as zero; missing dates drop
//! the record out of date-bucketed trends but never out of counts.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Upstream timestamps arrive either as plain dates ("2025-03-04") or full
/// RFC 3339 instants. Only the date part matters for bucketing.
pub(crate) fn flexible_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_upstream_date))
}

pub(crate) fn parse_upstream_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Locations arrive either keyed by practice slug (one entry per known
/// practice) or as a plain array. Both normalize to the same entry list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationSet {
    Keyed(BTreeMap<String, LocationRecord>),
    Listed(Vec<LocationRecord>),
}

impl Default for LocationSet {
    fn default() -> Self {
        LocationSet::Listed(Vec::new())
    }
}

impl LocationSet {
    /// Uniform (key, record) list regardless of the upstream shape. Listed
    /// records key by id, then lowercased name, then position.
    pub fn entries(&self) -> Vec<(String, LocationRecord)> {
        match self {
            LocationSet::Keyed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            LocationSet::Listed(list) => list
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    let key = record
                        .id
                        .clone()
                        .or_else(|| record.name.as_ref().map(|n| n.to_lowercase()))
                        .unwrap_or_else(|| format!("location-{}", i));
                    (key, record.clone())
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LocationSet::Keyed(map) => map.len(),
            LocationSet::Listed(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record's location association: a bare identifier or a nested object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationRef {
    Id(String),
    NumericId(i64),
    Nested(LocationRecord),
}

impl LocationRef {
    pub fn key(&self) -> Option<String> {
        match self {
            LocationRef::Id(id) => Some(id.clone()),
            LocationRef::NumericId(id) => Some(id.to_string()),
            LocationRef::Nested(record) => record
                .id
                .clone()
                .or_else(|| record.name.as_ref().map(|n| n.to_lowercase())),
        }
    }
}

const ACTIVE_STATUSES: &[&str] = &[
    "active",
    "in_treatment",
    "in treatment",
    "started",
    "accepted",
    "scheduled",
    "confirmed",
    "completed",
];

const NO_SHOW_STATUSES: &[&str] = &["no_show", "no-show", "noshow", "missed"];

fn status_matches(status: &Option<String>, vocabulary: &[&str]) -> bool {
    status
        .as_deref()
        .map(|s| vocabulary.contains(&s.trim().to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Treatment {
    pub id: Option<String>,
    pub status: Option<String>,
}

impl Treatment {
    pub fn is_active(&self) -> bool {
        status_matches(&self.status, ACTIVE_STATUSES)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Patient {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub created_at: Option<NaiveDate>,
    pub referral_source: Option<String>,
    pub location: Option<LocationRef>,
    pub treatments: Vec<Treatment>,
}

impl Patient {
    pub fn has_active_treatment(&self) -> bool {
        self.treatments.iter().any(Treatment::is_active)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appointment {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub location: Option<LocationRef>,
}

impl Appointment {
    pub fn is_no_show(&self) -> bool {
        status_matches(&self.status, NO_SHOW_STATUSES)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Booking {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub location: Option<LocationRef>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        status_matches(&self.status, ACTIVE_STATUSES)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lead {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub created_at: Option<NaiveDate>,
    pub referral_source: Option<String>,
    pub location: Option<LocationRef>,
    pub bookings: Vec<Booking>,
}

impl Lead {
    pub fn has_active_booking(&self) -> bool {
        self.bookings.iter().any(Booking::is_active)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevenueLine {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub location: Option<LocationRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductionLine {
    pub id: Option<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub date: Option<NaiveDate>,
    pub amount: f64,
    /// Production net of adjustments. Falls back to the gross amount when the
    /// upstream omits it.
    pub net_amount: Option<f64>,
    pub location: Option<LocationRef>,
}

impl ProductionLine {
    pub fn net(&self) -> f64 {
        self.net_amount.unwrap_or(self.amount)
    }
}

/// One fetch worth of raw upstream data. Transient: processed and discarded,
/// never cached in this form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDataset {
    pub locations: LocationSet,
    pub patients: Vec<Patient>,
    pub appointments: Vec<Appointment>,
    pub leads: Vec<Lead>,
    pub appointment_bookings: Vec<Booking>,
    pub revenue: Vec<RevenueLine>,
    pub production: Vec<ProductionLine>,
}

impl RawDataset {
    pub fn record_count(&self) -> usize {
        self.patients.len()
            + self.appointments.len()
            + self.leads.len()
            + self.appointment_bookings.len()
            + self.revenue.len()
            + self.production.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flexible_date_parsing() {
        assert_eq!(
            parse_upstream_date("2025-03-04"),
            NaiveDate::from_ymd_opt(2025, 3, 4)
        );
        assert_eq!(
            parse_upstream_date("2025-03-04T09:30:00Z"),
            NaiveDate::from_ymd_opt(2025, 3, 4)
        );
        assert_eq!(parse_upstream_date("not a date"), None);
        assert_eq!(parse_upstream_date(""), None);
    }

    #[test]
    fn test_location_set_keyed_and_listed() {
        let keyed: LocationSet = serde_json::from_str(
            r#"{ "gilbert": { "name": "Gilbert" }, "phoenix": { "name": "Phoenix" } }"#,
        )
        .unwrap();
        let entries = keyed.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|(k, _)| k == "gilbert"));

        let listed: LocationSet = serde_json::from_str(
            r#"[ { "id": "loc-1", "name": "Gilbert" }, { "name": "Phoenix" }, {} ]"#,
        )
        .unwrap();
        let entries = listed.entries();
        assert_eq!(entries[0].0, "loc-1");
        assert_eq!(entries[1].0, "phoenix");
        assert_eq!(entries[2].0, "location-2");
    }

    #[test]
    fn test_location_ref_key() {
        assert_eq!(
            LocationRef::Id("loc-1".to_string()).key(),
            Some("loc-1".to_string())
        );
        assert_eq!(LocationRef::NumericId(7).key(), Some("7".to_string()));
        assert_eq!(
            LocationRef::Nested(LocationRecord {
                id: None,
                name: Some("Phoenix".to_string()),
                address: None,
            })
            .key(),
            Some("phoenix".to_string())
        );
        assert_eq!(LocationRef::Nested(LocationRecord::default()).key(), None);
    }

    #[test]
    fn test_partial_patient_deserializes() {
        let patient: Patient = serde_json::from_str(r#"{ "id": "p1" }"#).unwrap();
        assert_eq!(patient.id.as_deref(), Some("p1"));
        assert!(patient.created_at.is_none());
        assert!(patient.referral_source.is_none());
        assert!(!patient.has_active_treatment());

        let full: Patient = serde_json::from_str(
            r#"{
                "id": "p2",
                "createdAt": "2025-01-05T08:00:00Z",
                "referralSource": "Google Ads",
                "location": { "id": "gilbert" },
                "treatments": [ { "status": "Active" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(full.created_at, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert!(full.has_active_treatment());
    }

    #[test]
    fn test_no_show_status() {
        let appointment: Appointment =
            serde_json::from_str(r#"{ "status": "No-Show" }"#).unwrap();
        assert!(appointment.is_no_show());

        let kept: Appointment = serde_json::from_str(r#"{ "status": "completed" }"#).unwrap();
        assert!(!kept.is_no_show());
    }

    #[test]
    fn test_production_net_fallback() {
        let line: ProductionLine =
            serde_json::from_str(r#"{ "amount": 1200.0 }"#).unwrap();
        assert_eq!(line.net(), 1200.0);

        let with_net: ProductionLine =
            serde_json::from_str(r#"{ "amount": 1200.0, "netAmount": 950.0 }"#).unwrap();
        assert_eq!(with_net.net(), 950.0);
    }

    #[test]
    fn test_empty_dataset() {
        let dataset: RawDataset = serde_json::from_str("{}").unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.record_count(), 0);
    }
}
