//! Multi-location data processor: normalizes a raw upstream dataset into
//! per-location aggregates, referral distributions, trend buckets, and
//! financial totals for one analysis window.

use crate::referral::{ReferralSource, ReferralVocabulary};
use crate::schema::{
    Appointment, Booking, Lead, LocationRef, LocationSet, Patient, ProductionLine, RawDataset,
    RevenueLine,
};
use crate::trends::{
    monthly_financial_trend, weekly_referral_trend, FinancialTrendBucket, ReferralTrendBucket,
    SourceCounts,
};
use crate::utils::in_range;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Synthetic bucket for records whose location identifier is missing or does
/// not match any known practice. Data is never dropped over an unknown key.
pub const UNKNOWN_LOCATION_KEY: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationAggregate {
    pub location_key: String,
    pub name: String,
    pub patient_count: u64,
    pub appointment_count: u64,
    pub lead_count: u64,
    pub booking_count: u64,
    pub revenue_total: f64,
    pub production_total: f64,
    pub net_production_total: f64,
    /// Filled during snapshot assembly from the cost report; the processor
    /// itself has no cost visibility.
    pub acquisition_cost_total: f64,
}

impl LocationAggregate {
    fn new(location_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            location_key: location_key.into(),
            name: name.into(),
            patient_count: 0,
            appointment_count: 0,
            lead_count: 0,
            booking_count: 0,
            revenue_total: 0.0,
            production_total: 0.0,
            net_production_total: 0.0,
            acquisition_cost_total: 0.0,
        }
    }
}

/// Conversion rate per referral source as 0-100 integer percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRates {
    pub digital: u32,
    pub professional: u32,
    pub direct: u32,
}

/// Output of one processing pass. Counts always reflect the filtered record
/// set, never the unfiltered fetch.
#[derive(Debug, Clone, Default)]
pub struct ProcessedData {
    pub locations: BTreeMap<String, LocationAggregate>,
    pub total_patients: u64,
    pub total_appointments: u64,
    pub total_leads: u64,
    pub total_bookings: u64,
    pub referral_sources: SourceCounts,
    pub conversion_rates: ConversionRates,
    pub no_show_rate: f64,
    pub total_revenue: f64,
    pub total_production: f64,
    pub total_net_production: f64,
    pub weekly_trend: Vec<ReferralTrendBucket>,
    pub monthly_trend: Vec<FinancialTrendBucket>,
}

/// `(revenue - costs) / revenue * 100`, clamped to 0 when there is no revenue.
pub fn profit_margin(revenue: f64, costs: f64) -> f64 {
    if revenue == 0.0 {
        0.0
    } else {
        (revenue - costs) / revenue * 100.0
    }
}

/// `(net production - acquisition cost) / acquisition cost * 100`, clamped to
/// 0 when nothing was spent. Never NaN or infinite.
pub fn roi(net_production: f64, acquisition_cost: f64) -> f64 {
    if acquisition_cost == 0.0 {
        0.0
    } else {
        (net_production - acquisition_cost) / acquisition_cost * 100.0
    }
}

fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        0
    } else {
        (part * 100 / whole) as u32
    }
}

/// Keeps a record when its timestamp falls inside the inclusive window. With
/// no window there is nothing to prove; with a window, an undated record
/// cannot be placed inside it and is excluded.
fn date_in_window(date: Option<NaiveDate>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    match date {
        Some(date) => in_range(date, start, end),
        None => false,
    }
}

pub struct DataProcessor {
    vocabulary: ReferralVocabulary,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self {
            vocabulary: ReferralVocabulary::default(),
        }
    }
}

impl DataProcessor {
    pub fn new(vocabulary: ReferralVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn process(
        &self,
        raw: &RawDataset,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ProcessedData {
        // 1. Filter every per-entity collection to the window before any
        //    counting.
        let patients: Vec<&Patient> = raw
            .patients
            .iter()
            .filter(|p| date_in_window(p.created_at, start, end))
            .collect();
        let appointments: Vec<&Appointment> = raw
            .appointments
            .iter()
            .filter(|a| date_in_window(a.date, start, end))
            .collect();
        let leads: Vec<&Lead> = raw
            .leads
            .iter()
            .filter(|l| date_in_window(l.created_at, start, end))
            .collect();
        let bookings: Vec<&Booking> = raw
            .appointment_bookings
            .iter()
            .filter(|b| date_in_window(b.date, start, end))
            .collect();
        let revenue: Vec<&RevenueLine> = raw
            .revenue
            .iter()
            .filter(|r| date_in_window(r.date, start, end))
            .collect();
        let production: Vec<&ProductionLine> = raw
            .production
            .iter()
            .filter(|p| date_in_window(p.date, start, end))
            .collect();

        debug!(
            "Processing {} patients, {} appointments, {} leads, {} bookings, {} revenue lines, {} production lines across {} locations",
            patients.len(),
            appointments.len(),
            leads.len(),
            bookings.len(),
            revenue.len(),
            production.len(),
            raw.locations.len()
        );

        // 2. Resolve locations into a uniform registry. Both upstream shapes
        //    (keyed object, array) land here; aliases cover id and name.
        let mut aggregates: BTreeMap<String, LocationAggregate> = BTreeMap::new();
        let mut aliases: HashMap<String, String> = HashMap::new();

        for (key, record) in raw.locations.entries() {
            let name = record.name.clone().unwrap_or_else(|| key.clone());
            aliases.insert(key.to_lowercase(), key.clone());
            if let Some(id) = &record.id {
                aliases.insert(id.to_lowercase(), key.clone());
            }
            if let Some(name) = &record.name {
                aliases.insert(name.to_lowercase(), key.clone());
            }
            aggregates.insert(key.clone(), LocationAggregate::new(key, name));
        }

        let resolve = |location: &Option<LocationRef>| -> String {
            location
                .as_ref()
                .and_then(LocationRef::key)
                .and_then(|k| aliases.get(&k.to_lowercase()).cloned())
                .unwrap_or_else(|| UNKNOWN_LOCATION_KEY.to_string())
        };

        let mut data = ProcessedData::default();
        let mut weekly_records: Vec<(NaiveDate, ReferralSource)> = Vec::new();
        let mut source_totals = SourceCounts::default();
        let mut source_converted = SourceCounts::default();

        // 3. Patients: referral classification, conversion, per-location
        //    counts.
        for patient in &patients {
            let key = resolve(&patient.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.patient_count += 1;

            let source = self.vocabulary.classify(patient.referral_source.as_deref());
            source_totals.record(source);
            if patient.has_active_treatment() {
                source_converted.record(source);
            }
            if let Some(date) = patient.created_at {
                weekly_records.push((date, source));
            }
        }

        // 4. Leads follow the same classification and conversion rules,
        //    converting through an active booking instead of a treatment.
        for lead in &leads {
            let key = resolve(&lead.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.lead_count += 1;

            let source = self.vocabulary.classify(lead.referral_source.as_deref());
            source_totals.record(source);
            if lead.has_active_booking() {
                source_converted.record(source);
            }
            if let Some(date) = lead.created_at {
                weekly_records.push((date, source));
            }
        }

        // 5. Appointments and bookings: raw counts plus the no-show tally.
        let mut no_shows = 0u64;
        for appointment in &appointments {
            let key = resolve(&appointment.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.appointment_count += 1;
            if appointment.is_no_show() {
                no_shows += 1;
            }
        }
        for booking in &bookings {
            let key = resolve(&booking.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.booking_count += 1;
        }

        // 6. Financial rollup: straight sums per location and overall.
        let mut revenue_points: Vec<(NaiveDate, f64)> = Vec::new();
        for line in &revenue {
            let key = resolve(&line.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.revenue_total += line.amount;
            data.total_revenue += line.amount;
            if let Some(date) = line.date {
                revenue_points.push((date, line.amount));
            }
        }

        let mut production_points: Vec<(NaiveDate, f64)> = Vec::new();
        for line in &production {
            let key = resolve(&line.location);
            let aggregate = aggregates
                .entry(key.clone())
                .or_insert_with(|| LocationAggregate::new(&key, UNKNOWN_LOCATION_KEY));
            aggregate.production_total += line.amount;
            aggregate.net_production_total += line.net();
            data.total_production += line.amount;
            data.total_net_production += line.net();
            if let Some(date) = line.date {
                production_points.push((date, line.amount));
            }
        }

        data.total_patients = patients.len() as u64;
        data.total_appointments = appointments.len() as u64;
        data.total_leads = leads.len() as u64;
        data.total_bookings = bookings.len() as u64;
        data.referral_sources = source_totals;

        data.conversion_rates = ConversionRates {
            digital: percentage(
                source_converted.get(ReferralSource::Digital),
                source_totals.get(ReferralSource::Digital),
            ),
            professional: percentage(
                source_converted.get(ReferralSource::Professional),
                source_totals.get(ReferralSource::Professional),
            ),
            direct: percentage(
                source_converted.get(ReferralSource::Direct),
                source_totals.get(ReferralSource::Direct),
            ),
        };

        data.no_show_rate = if appointments.is_empty() {
            0.0
        } else {
            no_shows as f64 / appointments.len() as f64 * 100.0
        };

        data.weekly_trend = weekly_referral_trend(&weekly_records);
        data.monthly_trend = monthly_financial_trend(&revenue_points, &production_points);
        data.locations = aggregates;

        data
    }
}

/// Narrows a raw dataset to one location for a location-scoped snapshot.
/// Matching is alias-aware (registry key, upstream id, name); records tied to
/// other locations, or to none, drop out of the scoped view.
pub fn restrict_to_location(raw: &RawDataset, location_key: &str) -> RawDataset {
    let needle = location_key.to_lowercase();
    let mut aliases = vec![needle.clone()];
    let mut kept_entry = None;

    for (key, record) in raw.locations.entries() {
        let mut entry_aliases = vec![key.to_lowercase()];
        if let Some(id) = &record.id {
            entry_aliases.push(id.to_lowercase());
        }
        if let Some(name) = &record.name {
            entry_aliases.push(name.to_lowercase());
        }
        if entry_aliases.contains(&needle) {
            aliases.extend(entry_aliases);
            kept_entry = Some((key, record));
            break;
        }
    }

    let matches = |location: &Option<LocationRef>| -> bool {
        location
            .as_ref()
            .and_then(LocationRef::key)
            .map(|k| aliases.contains(&k.to_lowercase()))
            .unwrap_or(false)
    };

    let mut scoped = RawDataset::default();
    if let Some((key, record)) = kept_entry {
        let mut locations = std::collections::BTreeMap::new();
        locations.insert(key, record);
        scoped.locations = LocationSet::Keyed(locations);
    }

    scoped.patients = raw
        .patients
        .iter()
        .filter(|p| matches(&p.location))
        .cloned()
        .collect();
    scoped.appointments = raw
        .appointments
        .iter()
        .filter(|a| matches(&a.location))
        .cloned()
        .collect();
    scoped.leads = raw
        .leads
        .iter()
        .filter(|l| matches(&l.location))
        .cloned()
        .collect();
    scoped.appointment_bookings = raw
        .appointment_bookings
        .iter()
        .filter(|b| matches(&b.location))
        .cloned()
        .collect();
    scoped.revenue = raw
        .revenue
        .iter()
        .filter(|r| matches(&r.location))
        .cloned()
        .collect();
    scoped.production = raw
        .production
        .iter()
        .filter(|p| matches(&p.location))
        .cloned()
        .collect();

    scoped
}
