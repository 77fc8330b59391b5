//! Weekly and monthly trend bucketing over date-stamped records.

use crate::referral::ReferralSource;
use crate::utils::{month_label, ordinal_week, week_label};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-source record counts for one distribution (a trend bucket or the whole
/// period summary).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceCounts {
    pub digital: u64,
    pub professional: u64,
    pub direct: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourcePercentages {
    pub digital: u32,
    pub professional: u32,
    pub direct: u32,
}

impl SourcePercentages {
    pub fn sum(&self) -> u32 {
        self.digital + self.professional + self.direct
    }
}

impl SourceCounts {
    pub fn record(&mut self, source: ReferralSource) {
        match source {
            ReferralSource::Digital => self.digital += 1,
            ReferralSource::Professional => self.professional += 1,
            ReferralSource::Direct => self.direct += 1,
        }
    }

    pub fn get(&self, source: ReferralSource) -> u64 {
        match source {
            ReferralSource::Digital => self.digital,
            ReferralSource::Professional => self.professional,
            ReferralSource::Direct => self.direct,
        }
    }

    pub fn total(&self) -> u64 {
        self.digital + self.professional + self.direct
    }

    /// Integer percentage split via largest-remainder apportionment, so the
    /// three values sum to exactly 100 for any non-empty distribution and to
    /// 0 for an empty one.
    pub fn percentages(&self) -> SourcePercentages {
        let total = self.total();
        if total == 0 {
            return SourcePercentages::default();
        }

        let counts = [self.digital, self.professional, self.direct];
        let mut shares = [0u32; 3];
        let mut remainders = [(0u64, 0usize); 3];
        let mut assigned = 0u32;

        for (i, &count) in counts.iter().enumerate() {
            let scaled = count * 100;
            shares[i] = (scaled / total) as u32;
            remainders[i] = (scaled % total, i);
            assigned += shares[i];
        }

        // Hand the leftover points to the largest remainders, ties broken by
        // bucket order so the split is deterministic.
        remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let mut leftover = 100 - assigned;
        for &(_, idx) in remainders.iter() {
            if leftover == 0 {
                break;
            }
            shares[idx] += 1;
            leftover -= 1;
        }

        SourcePercentages {
            digital: shares[0],
            professional: shares[1],
            direct: shares[2],
        }
    }
}

/// One week of referral-mix trend data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferralTrendBucket {
    pub period_label: String,
    pub digital_pct: u32,
    pub professional_pct: u32,
    pub direct_pct: u32,
}

/// One month of financial trend data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTrendBucket {
    pub period_label: String,
    pub revenue: f64,
    pub production: f64,
}

/// Groups classified records into chronological weekly buckets. Buckets are
/// keyed by (year, ordinal week) so a range spanning New Year produces
/// distinct, correctly ordered buckets.
pub fn weekly_referral_trend(records: &[(NaiveDate, ReferralSource)]) -> Vec<ReferralTrendBucket> {
    let mut grid: BTreeMap<(i32, u32), (NaiveDate, SourceCounts)> = BTreeMap::new();

    for (date, source) in records {
        let slot = grid
            .entry((date.year(), ordinal_week(*date)))
            .or_insert((*date, SourceCounts::default()));
        slot.1.record(*source);
    }

    grid.into_values()
        .map(|(date, counts)| {
            let pct = counts.percentages();
            ReferralTrendBucket {
                period_label: week_label(date),
                digital_pct: pct.digital,
                professional_pct: pct.professional,
                direct_pct: pct.direct,
            }
        })
        .collect()
}

/// Groups revenue and production lines into chronological monthly buckets.
pub fn monthly_financial_trend(
    revenue: &[(NaiveDate, f64)],
    production: &[(NaiveDate, f64)],
) -> Vec<FinancialTrendBucket> {
    let mut grid: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();

    for (date, amount) in revenue {
        grid.entry((date.year(), date.month())).or_default().0 += amount;
    }
    for (date, amount) in production {
        grid.entry((date.year(), date.month())).or_default().1 += amount;
    }

    grid.into_iter()
        .map(|((year, month), (revenue, production))| {
            let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            FinancialTrendBucket {
                period_label: month_label(first),
                revenue,
                production,
            }
        })
        .collect()
}
