//! # Ortho Analytics
//!
//! A library for aggregating multi-location orthodontic practice data into
//! period-comparison analytics snapshots.
//!
//! ## Core Concepts
//!
//! - **Raw dataset**: one fetch worth of patients, appointments, leads,
//!   bookings, revenue and production lines from the practice-management
//!   GraphQL API, tolerant of its unstable schema
//! - **Processing**: per-location normalization, referral classification
//!   (digital / professional / direct), weekly and monthly trend bucketing,
//!   financial KPI rollup
//! - **Costs**: manual entries and ad-platform synced spend, upserted on
//!   natural business keys and merged into per-period totals
//! - **Snapshot**: the immutable cached result for one (location, date range)
//!   combination, consumed by the dashboard, the PDF renderer and the AI
//!   summarizer
//! - **Fallback**: any upstream failure substitutes a deterministic sample
//!   dataset, tagged so the UI can show a "using sample data" indicator
//!
//! ## Example
//!
//! ```rust,ignore
//! use ortho_analytics::*;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! let client = UpstreamClient::new(UpstreamConfig::new("key", "secret"))?;
//! let store = Arc::new(InMemoryCostStore::new());
//! let pipeline = AnalyticsPipeline::new(client, store);
//!
//! let period = PeriodConfig::new(
//!     "March 2025",
//!     NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
//!     None,
//! );
//! let snapshot = pipeline.snapshot_for_period("user-1", &period).await?;
//! println!("{}", render_report(&snapshot, &period.label));
//! ```

pub mod cache;
pub mod client;
pub mod costs;
pub mod error;
pub mod locations;
pub mod processor;
pub mod referral;
pub mod report;
pub mod sample;
pub mod schema;
pub mod snapshot;
pub mod trends;
pub mod utils;

#[cfg(feature = "openai")]
pub mod insights;

pub use cache::{SnapshotCache, SnapshotKey, DEFAULT_TTL_SECONDS};
pub use client::{FieldMap, UpstreamClient, UpstreamConfig, DEFAULT_API_URL};
pub use costs::{
    google_sync_row, meta_sync_row, quickbooks_sync_row, AcquisitionCost, CampaignSpend,
    CostAggregator, CostReport, CostSource, CostStore, CostTotals, InMemoryCostStore,
    NewAcquisitionCost,
};
pub use error::{AnalyticsError, Result};
pub use locations::{Location, LocationDirectory};
pub use processor::{
    profit_margin, restrict_to_location, roi, ConversionRates, DataProcessor, LocationAggregate,
    ProcessedData, UNKNOWN_LOCATION_KEY,
};
pub use referral::{ReferralSource, ReferralVocabulary};
pub use report::render_report;
pub use sample::sample_dataset;
pub use schema::RawDataset;
pub use snapshot::{
    assemble, AnalyticsSnapshot, ApiStatus, PeriodConfig, QueryParams, SnapshotSummary,
    SnapshotTrends, MAX_COMPARISON_PERIODS,
};
pub use trends::{
    monthly_financial_trend, weekly_referral_trend, FinancialTrendBucket, ReferralTrendBucket,
    SourceCounts, SourcePercentages,
};

use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;

const SNAPSHOT_DATA_TYPE: &str = "analytics";

/// Request-scoped orchestrator: fetch, process, merge costs, assemble, cache.
/// Holds no mutable state of its own beyond the cache and the cost store,
/// both safe under concurrent periods.
pub struct AnalyticsPipeline {
    client: UpstreamClient,
    costs: CostAggregator,
    cache: SnapshotCache,
    processor: DataProcessor,
}

impl AnalyticsPipeline {
    pub fn new(client: UpstreamClient, store: Arc<dyn CostStore>) -> Self {
        Self {
            client,
            costs: CostAggregator::new(store),
            cache: SnapshotCache::default(),
            processor: DataProcessor::default(),
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: ReferralVocabulary) -> Self {
        self.processor = DataProcessor::new(vocabulary);
        self
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = cache;
        self
    }

    /// Produces the snapshot for one period, short-circuiting through the
    /// cache when a fresh entry exists. Upstream failures of any kind
    /// (credentials, transport, timeout, schema drift, empty result) are
    /// masked with the deterministic sample dataset and tagged; validation
    /// and persistence failures surface to the caller.
    pub async fn snapshot_for_period(
        &self,
        user_id: &str,
        period: &PeriodConfig,
    ) -> Result<AnalyticsSnapshot> {
        period.validate()?;

        let key = SnapshotKey {
            location: period.location_key(),
            start_date: period.start_date,
            end_date: period.end_date,
            data_type: SNAPSHOT_DATA_TYPE.to_string(),
        };
        if let Some(hit) = self.cache.get(&key) {
            debug!("Snapshot cache hit for '{}'", period.label);
            return Ok(hit);
        }

        // The upstream fetch and the cost read are independent per period.
        let location = period.location.as_deref();
        let (fetched, cost_report) = tokio::join!(
            self.client.fetch_dataset(period.start_date, period.end_date),
            async {
                self.costs
                    .costs_for_range(user_id, location, period.start_date, period.end_date)
            }
        );
        let cost_report = cost_report?;

        let (raw, api_status) = match fetched {
            Ok(raw) => (raw, ApiStatus::Live),
            Err(err) if err.is_upstream_failure() => {
                warn!(
                    "Upstream fetch failed for '{}' ({}); substituting sample data",
                    period.label, err
                );
                (
                    sample_dataset(period.start_date, period.end_date),
                    ApiStatus::Sample,
                )
            }
            Err(err) => return Err(err),
        };

        let raw = match &period.location {
            Some(location) => restrict_to_location(&raw, location),
            None => raw,
        };

        let processed =
            self.processor
                .process(&raw, Some(period.start_date), Some(period.end_date));
        let snapshot = assemble(period, &processed, &cost_report, api_status);

        info!(
            "Assembled snapshot for '{}': {} patients, {} locations ({:?})",
            period.label,
            snapshot.summary.total_patients,
            snapshot.locations.len(),
            snapshot.api_status
        );

        self.cache.insert(key, snapshot.clone());
        Ok(snapshot)
    }

    /// Side-by-side comparison: every period resolves independently, so one
    /// period's failure never blocks the others. The request itself is
    /// rejected when it exceeds the period cap.
    pub async fn compare_periods(
        &self,
        user_id: &str,
        periods: &[PeriodConfig],
    ) -> Result<Vec<Result<AnalyticsSnapshot>>> {
        if periods.len() > MAX_COMPARISON_PERIODS {
            return Err(AnalyticsError::Validation(format!(
                "At most {} periods can be compared at once (got {})",
                MAX_COMPARISON_PERIODS,
                periods.len()
            )));
        }

        let futures = periods
            .iter()
            .map(|period| self.snapshot_for_period(user_id, period));
        Ok(join_all(futures).await)
    }
}
