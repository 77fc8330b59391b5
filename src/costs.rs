//! Acquisition-cost aggregation: manual entries and ad-platform synced spend,
//! merged into per-period totals by source.

use crate::error::{AnalyticsError, Result};
use crate::referral::ReferralSource;
use crate::utils::{month_keys_in_range, parse_period_key};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    Manual,
    Meta,
    Google,
    Quickbooks,
}

/// Persisted marketing spend attributed to acquiring patients. Rows are
/// soft-deleted only; the audit trail is never truncated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionCost {
    pub id: u64,
    /// None applies the row to every location.
    pub location_id: Option<String>,
    pub user_id: String,
    pub referral_type: ReferralSource,
    pub cost: f64,
    /// "YYYY-MM" month key.
    pub period: String,
    pub source: CostSource,
    pub is_deleted: bool,
    pub metadata: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Input shape for an upsert. The natural key is
/// (location_id, referral_type, period, user_id, source); submitting the same
/// key again updates the existing row's cost, last write wins.
#[derive(Debug, Clone)]
pub struct NewAcquisitionCost {
    pub location_id: Option<String>,
    pub user_id: String,
    pub referral_type: ReferralSource,
    pub cost: f64,
    pub period: String,
    pub source: CostSource,
    pub metadata: Option<serde_json::Value>,
}

impl NewAcquisitionCost {
    /// Rejects malformed period keys before they reach storage.
    pub fn validate(&self) -> Result<()> {
        parse_period_key(&self.period).map(|_| ())
    }

    fn matches(&self, row: &AcquisitionCost) -> bool {
        row.location_id == self.location_id
            && row.user_id == self.user_id
            && row.referral_type == self.referral_type
            && row.period == self.period
            && row.source == self.source
    }
}

/// Persistence boundary for cost rows. The relational implementation lives
/// with the application; `InMemoryCostStore` ships here for tests and
/// single-process use.
pub trait CostStore: Send + Sync {
    fn upsert(&self, entry: NewAcquisitionCost) -> Result<AcquisitionCost>;

    /// Non-deleted rows for (user, period), scoped to a location. A location
    /// query also returns all-location rows (location_id = None); a None
    /// query returns everything for the period.
    fn costs(
        &self,
        user_id: &str,
        period: &str,
        location_id: Option<&str>,
    ) -> Result<Vec<AcquisitionCost>>;

    /// Marks the row deleted and bumps its timestamp. Returns false when the
    /// id is unknown.
    fn soft_delete(&self, id: u64) -> Result<bool>;
}

#[derive(Default)]
struct CostStoreInner {
    rows: Vec<AcquisitionCost>,
    next_id: u64,
}

#[derive(Default)]
pub struct InMemoryCostStore {
    inner: Mutex<CostStoreInner>,
}

impl InMemoryCostStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CostStoreInner>> {
        self.inner
            .lock()
            .map_err(|_| AnalyticsError::Persistence("cost store lock poisoned".to_string()))
    }
}

impl CostStore for InMemoryCostStore {
    fn upsert(&self, entry: NewAcquisitionCost) -> Result<AcquisitionCost> {
        entry.validate()?;
        let mut inner = self.lock()?;

        if let Some(row) = inner.rows.iter_mut().find(|row| entry.matches(row)) {
            row.cost = entry.cost;
            row.metadata = entry.metadata;
            row.is_deleted = false;
            row.updated_at = Utc::now();
            return Ok(row.clone());
        }

        inner.next_id += 1;
        let row = AcquisitionCost {
            id: inner.next_id,
            location_id: entry.location_id,
            user_id: entry.user_id,
            referral_type: entry.referral_type,
            cost: entry.cost,
            period: entry.period,
            source: entry.source,
            is_deleted: false,
            metadata: entry.metadata,
            updated_at: Utc::now(),
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    fn costs(
        &self,
        user_id: &str,
        period: &str,
        location_id: Option<&str>,
    ) -> Result<Vec<AcquisitionCost>> {
        let inner = self.lock()?;
        Ok(inner
            .rows
            .iter()
            .filter(|row| !row.is_deleted && row.user_id == user_id && row.period == period)
            .filter(|row| match location_id {
                Some(location) => {
                    row.location_id.is_none() || row.location_id.as_deref() == Some(location)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    fn soft_delete(&self, id: u64) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.is_deleted = true;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Per-period cost totals by source, in the shape the snapshot exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostTotals {
    pub manual: f64,
    pub meta: f64,
    pub google: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostReport {
    pub manual: Vec<AcquisitionCost>,
    pub api: Vec<AcquisitionCost>,
    pub totals: CostTotals,
}

impl CostReport {
    /// Cost attributable to one location: its own rows only. All-location
    /// rows stay in the period totals but are not assigned to any single
    /// aggregate.
    pub fn location_total(&self, location_key: &str) -> f64 {
        self.manual
            .iter()
            .chain(self.api.iter())
            .filter(|row| row.location_id.as_deref() == Some(location_key))
            .map(|row| row.cost)
            .sum()
    }
}

pub struct CostAggregator {
    store: Arc<dyn CostStore>,
}

impl CostAggregator {
    pub fn new(store: Arc<dyn CostStore>) -> Self {
        Self { store }
    }

    pub fn costs_for(
        &self,
        user_id: &str,
        location_id: Option<&str>,
        period: &str,
    ) -> Result<CostReport> {
        let rows = self.store.costs(user_id, period, location_id)?;

        let mut report = CostReport::default();
        for row in rows {
            report.totals.total += row.cost;
            match row.source {
                CostSource::Manual => {
                    report.totals.manual += row.cost;
                    report.manual.push(row);
                }
                CostSource::Meta => {
                    report.totals.meta += row.cost;
                    report.api.push(row);
                }
                CostSource::Google => {
                    report.totals.google += row.cost;
                    report.api.push(row);
                }
                CostSource::Quickbooks => {
                    report.api.push(row);
                }
            }
        }
        Ok(report)
    }

    /// Merged report across every month key the inclusive range overlaps.
    pub fn costs_for_range(
        &self,
        user_id: &str,
        location_id: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CostReport> {
        let mut merged = CostReport::default();
        for key in month_keys_in_range(start, end) {
            let report = self.costs_for(user_id, location_id, &key)?;
            merged.totals.manual += report.totals.manual;
            merged.totals.meta += report.totals.meta;
            merged.totals.google += report.totals.google;
            merged.totals.total += report.totals.total;
            merged.manual.extend(report.manual);
            merged.api.extend(report.api);
        }
        Ok(merged)
    }
}

/// One campaign's spend as reported by an ad-platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSpend {
    pub campaign_id: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
}

fn platform_sync_row(
    records: &[CampaignSpend],
    source: CostSource,
    referral_type: ReferralSource,
    user_id: &str,
    period: &str,
    location_id: Option<&str>,
) -> Option<NewAcquisitionCost> {
    if records.is_empty() {
        return None;
    }

    let spend: f64 = records.iter().map(|r| r.spend).sum();
    let impressions: u64 = records.iter().map(|r| r.impressions).sum();
    let clicks: u64 = records.iter().map(|r| r.clicks).sum();
    let conversions: u64 = records.iter().map(|r| r.conversions).sum();

    Some(NewAcquisitionCost {
        location_id: location_id.map(|s| s.to_string()),
        user_id: user_id.to_string(),
        referral_type,
        cost: spend,
        period: period.to_string(),
        source,
        metadata: Some(json!({
            "campaigns": records.len(),
            "impressions": impressions,
            "clicks": clicks,
            "conversions": conversions,
        })),
    })
}

/// Collapses one Meta sync batch into a single upsertable digital-spend row.
pub fn meta_sync_row(
    records: &[CampaignSpend],
    user_id: &str,
    period: &str,
    location_id: Option<&str>,
) -> Option<NewAcquisitionCost> {
    platform_sync_row(
        records,
        CostSource::Meta,
        ReferralSource::Digital,
        user_id,
        period,
        location_id,
    )
}

pub fn google_sync_row(
    records: &[CampaignSpend],
    user_id: &str,
    period: &str,
    location_id: Option<&str>,
) -> Option<NewAcquisitionCost> {
    platform_sync_row(
        records,
        CostSource::Google,
        ReferralSource::Digital,
        user_id,
        period,
        location_id,
    )
}

/// QuickBooks rows carry marketing spend without a channel, so they land in
/// the direct bucket.
pub fn quickbooks_sync_row(
    records: &[CampaignSpend],
    user_id: &str,
    period: &str,
    location_id: Option<&str>,
) -> Option<NewAcquisitionCost> {
    platform_sync_row(
        records,
        CostSource::Quickbooks,
        ReferralSource::Direct,
        user_id,
        period,
        location_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_entry(cost: f64) -> NewAcquisitionCost {
        NewAcquisitionCost {
            location_id: Some("1".to_string()),
            user_id: "user-a".to_string(),
            referral_type: ReferralSource::Digital,
            cost,
            period: "2025-03".to_string(),
            source: CostSource::Manual,
            metadata: None,
        }
    }

    #[test]
    fn test_upsert_is_last_write_wins() {
        let store = InMemoryCostStore::new();

        let first = store.upsert(manual_entry(100.0)).unwrap();
        let second = store.upsert(manual_entry(150.0)).unwrap();

        assert_eq!(first.id, second.id);
        let rows = store.costs("user-a", "2025-03", Some("1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost, 150.0);
    }

    #[test]
    fn test_distinct_keys_create_distinct_rows() {
        let store = InMemoryCostStore::new();
        store.upsert(manual_entry(100.0)).unwrap();

        let mut other_period = manual_entry(80.0);
        other_period.period = "2025-04".to_string();
        store.upsert(other_period).unwrap();

        let mut other_type = manual_entry(60.0);
        other_type.referral_type = ReferralSource::Professional;
        store.upsert(other_type).unwrap();

        assert_eq!(store.costs("user-a", "2025-03", Some("1")).unwrap().len(), 2);
        assert_eq!(store.costs("user-a", "2025-04", Some("1")).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_rejects_malformed_period() {
        let store = InMemoryCostStore::new();
        let mut entry = manual_entry(100.0);
        entry.period = "March 2025".to_string();

        let err = store.upsert(entry).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));
    }

    #[test]
    fn test_soft_delete_hides_but_keeps_row() {
        let store = InMemoryCostStore::new();
        let row = store.upsert(manual_entry(100.0)).unwrap();

        assert!(store.soft_delete(row.id).unwrap());
        assert!(store.costs("user-a", "2025-03", Some("1")).unwrap().is_empty());
        assert!(!store.soft_delete(999).unwrap());

        // Upserting the same key resurrects the audit row instead of
        // duplicating it.
        let revived = store.upsert(manual_entry(120.0)).unwrap();
        assert_eq!(revived.id, row.id);
        assert!(!revived.is_deleted);
    }

    #[test]
    fn test_location_scoping_includes_global_rows() {
        let store = InMemoryCostStore::new();
        store.upsert(manual_entry(100.0)).unwrap();

        let mut global = manual_entry(50.0);
        global.location_id = None;
        global.referral_type = ReferralSource::Direct;
        store.upsert(global).unwrap();

        let mut other_location = manual_entry(70.0);
        other_location.location_id = Some("2".to_string());
        store.upsert(other_location).unwrap();

        let scoped = store.costs("user-a", "2025-03", Some("1")).unwrap();
        assert_eq!(scoped.len(), 2);

        let all = store.costs("user-a", "2025-03", None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_aggregator_totals_by_source() {
        let store = Arc::new(InMemoryCostStore::new());
        store.upsert(manual_entry(100.0)).unwrap();
        store
            .upsert(
                meta_sync_row(
                    &[CampaignSpend {
                        campaign_id: "c1".to_string(),
                        spend: 250.0,
                        impressions: 10_000,
                        clicks: 400,
                        conversions: 12,
                    }],
                    "user-a",
                    "2025-03",
                    Some("1"),
                )
                .unwrap(),
            )
            .unwrap();
        store
            .upsert(
                google_sync_row(
                    &[CampaignSpend {
                        campaign_id: "g1".to_string(),
                        spend: 175.0,
                        impressions: 8_000,
                        clicks: 300,
                        conversions: 9,
                    }],
                    "user-a",
                    "2025-03",
                    Some("1"),
                )
                .unwrap(),
            )
            .unwrap();

        let aggregator = CostAggregator::new(store);
        let report = aggregator.costs_for("user-a", Some("1"), "2025-03").unwrap();

        assert_eq!(report.totals.manual, 100.0);
        assert_eq!(report.totals.meta, 250.0);
        assert_eq!(report.totals.google, 175.0);
        assert_eq!(report.totals.total, 525.0);
        assert_eq!(report.manual.len(), 1);
        assert_eq!(report.api.len(), 2);
    }

    #[test]
    fn test_costs_for_range_merges_months() {
        let store = Arc::new(InMemoryCostStore::new());
        store.upsert(manual_entry(100.0)).unwrap();
        let mut april = manual_entry(40.0);
        april.period = "2025-04".to_string();
        store.upsert(april).unwrap();

        let aggregator = CostAggregator::new(store);
        let report = aggregator
            .costs_for_range(
                "user-a",
                Some("1"),
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            )
            .unwrap();

        assert_eq!(report.totals.manual, 140.0);
        assert_eq!(report.totals.total, 140.0);
    }

    #[test]
    fn test_platform_sync_transform() {
        let records = vec![
            CampaignSpend {
                campaign_id: "c1".to_string(),
                spend: 120.5,
                impressions: 5_000,
                clicks: 250,
                conversions: 8,
            },
            CampaignSpend {
                campaign_id: "c2".to_string(),
                spend: 79.5,
                impressions: 3_000,
                clicks: 110,
                conversions: 3,
            },
        ];

        let row = meta_sync_row(&records, "user-a", "2025-03", None).unwrap();
        assert_eq!(row.cost, 200.0);
        assert_eq!(row.source, CostSource::Meta);
        assert_eq!(row.referral_type, ReferralSource::Digital);
        let metadata = row.metadata.unwrap();
        assert_eq!(metadata["campaigns"], 2);
        assert_eq!(metadata["impressions"], 8_000);

        assert!(meta_sync_row(&[], "user-a", "2025-03", None).is_none());

        let qb = quickbooks_sync_row(&records, "user-a", "2025-03", None).unwrap();
        assert_eq!(qb.referral_type, ReferralSource::Direct);
    }
}
