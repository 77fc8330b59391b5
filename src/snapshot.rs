//! Period snapshot assembly: one immutable `AnalyticsSnapshot` per
//! user-defined analysis period, merging processor output with the period's
//! cost report.

use crate::costs::{CostReport, CostTotals};
use crate::error::{AnalyticsError, Result};
use crate::processor::{profit_margin, roi, ConversionRates, LocationAggregate, ProcessedData};
use crate::trends::{FinancialTrendBucket, ReferralTrendBucket, SourceCounts};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The UI caps how many periods one comparison request may carry.
pub const MAX_COMPARISON_PERIODS: usize = 10;

/// Marks whether a snapshot was computed from live upstream data or from the
/// deterministic sample dataset after an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Live,
    Sample,
}

/// A user-defined named date range, optionally scoped to one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodConfig {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// None compares across all locations.
    pub location: Option<String>,
}

impl PeriodConfig {
    pub fn new(
        label: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        location: Option<String>,
    ) -> Self {
        Self {
            label: label.into(),
            start_date,
            end_date,
            location,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(AnalyticsError::Validation(
                "Period label must not be empty".to_string(),
            ));
        }
        if self.end_date < self.start_date {
            return Err(AnalyticsError::Validation(format!(
                "Period '{}' ends ({}) before it starts ({})",
                self.label, self.end_date, self.start_date
            )));
        }
        Ok(())
    }

    pub fn location_key(&self) -> String {
        self.location.clone().unwrap_or_else(|| "all".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total_patients: u64,
    pub total_appointments: u64,
    pub total_leads: u64,
    pub total_revenue: f64,
    pub total_production: f64,
    pub total_net_production: f64,
    pub profit_margin: f64,
    pub roi: f64,
    pub no_show_rate: f64,
    pub referral_sources: SourceCounts,
    pub conversion_rates: ConversionRates,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTrends {
    pub weekly: Vec<ReferralTrendBucket>,
    pub monthly: Vec<FinancialTrendBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
}

/// The immutable analytics result for one (location, date range) combination.
/// Consumed by the dashboard UI, the PDF renderer, and the AI summarizer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub locations: BTreeMap<String, LocationAggregate>,
    pub summary: SnapshotSummary,
    pub trends: SnapshotTrends,
    pub acquisition_cost_breakdown: CostTotals,
    pub api_status: ApiStatus,
    pub last_updated: DateTime<Utc>,
    pub query_params: QueryParams,
}

/// Combines one processing pass with the period's cost report.
pub fn assemble(
    period: &PeriodConfig,
    processed: &ProcessedData,
    costs: &CostReport,
    api_status: ApiStatus,
) -> AnalyticsSnapshot {
    let mut locations = processed.locations.clone();
    for (key, aggregate) in locations.iter_mut() {
        aggregate.acquisition_cost_total = costs.location_total(key);
    }

    let summary = SnapshotSummary {
        total_patients: processed.total_patients,
        total_appointments: processed.total_appointments,
        total_leads: processed.total_leads,
        total_revenue: processed.total_revenue,
        total_production: processed.total_production,
        total_net_production: processed.total_net_production,
        profit_margin: profit_margin(processed.total_revenue, costs.totals.total),
        roi: roi(processed.total_net_production, costs.totals.total),
        no_show_rate: processed.no_show_rate,
        referral_sources: processed.referral_sources,
        conversion_rates: processed.conversion_rates,
    };

    AnalyticsSnapshot {
        locations,
        summary,
        trends: SnapshotTrends {
            weekly: processed.weekly_trend.clone(),
            monthly: processed.monthly_trend.clone(),
        },
        acquisition_cost_breakdown: costs.totals,
        api_status,
        last_updated: Utc::now(),
        query_params: QueryParams {
            start_date: period.start_date,
            end_date: period.end_date,
            location: period.location_key(),
        },
    }
}
