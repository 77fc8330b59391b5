use chrono::NaiveDate;
use ortho_analytics::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn march_period(location: Option<&str>) -> PeriodConfig {
    PeriodConfig::new(
        "March 2025",
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        location.map(|s| s.to_string()),
    )
}

/// A plausible month of raw data for a two-location practice, in the exact
/// wire shape the upstream client normalizes into.
fn march_payload() -> RawDataset {
    let payload = json!({
        "locations": {
            "gilbert": { "id": "loc-1", "name": "Gilbert" },
            "phoenix": { "id": "loc-2", "name": "Phoenix" }
        },
        "patients": [
            { "id": "p1", "createdAt": "2025-03-03", "referralSource": "Google Ads",
              "location": { "id": "loc-1" },
              "treatments": [ { "id": "t1", "status": "active" } ] },
            { "id": "p2", "createdAt": "2025-03-05T10:30:00Z", "referralSource": "Website form",
              "location": "gilbert", "treatments": [] },
            { "id": "p3", "createdAt": "2025-03-10", "referralSource": "Dr. Smith referral",
              "location": { "id": "loc-2" },
              "treatments": [ { "id": "t2", "status": "in_treatment" } ] },
            { "id": "p4", "createdAt": "2025-03-12", "referralSource": "General dentist",
              "location": "phoenix", "treatments": [] },
            { "id": "p5", "createdAt": "2025-03-18",
              "location": "gilbert", "treatments": [] },
            { "id": "p6", "createdAt": "2025-03-21", "referralSource": "Word of mouth",
              "location": "mesa", "treatments": [] }
        ],
        "appointments": [
            { "id": "a1", "date": "2025-03-04", "status": "completed", "location": "gilbert" },
            { "id": "a2", "date": "2025-03-06", "status": "no_show", "location": "gilbert" },
            { "id": "a3", "date": "2025-03-11", "status": "completed", "location": "phoenix" },
            { "id": "a4", "date": "2025-03-13", "status": "completed", "location": "phoenix" }
        ],
        "leads": [
            { "id": "l1", "createdAt": "2025-03-07", "referralSource": "instagram",
              "location": "gilbert",
              "bookings": [ { "id": "b1", "date": "2025-03-09", "status": "scheduled" } ] },
            { "id": "l2", "createdAt": "2025-03-14", "referralSource": "Dentist referral",
              "location": "phoenix", "bookings": [] }
        ],
        "appointmentBookings": [
            { "id": "ab1", "date": "2025-03-08", "status": "confirmed", "location": "gilbert" }
        ],
        "revenue": [
            { "id": "r1", "date": "2025-03-15", "amount": 24000.0, "location": "gilbert" },
            { "id": "r2", "date": "2025-03-20", "amount": 16000.0, "location": "phoenix" }
        ],
        "production": [
            { "id": "pr1", "date": "2025-03-15", "amount": 30000.0, "netAmount": 26000.0,
              "location": "gilbert" },
            { "id": "pr2", "date": "2025-03-20", "amount": 18000.0,
              "location": "phoenix" }
        ]
    });

    serde_json::from_value(payload).expect("payload should deserialize")
}

fn seeded_store() -> Arc<InMemoryCostStore> {
    let store = Arc::new(InMemoryCostStore::new());
    store
        .upsert(NewAcquisitionCost {
            location_id: Some("gilbert".to_string()),
            user_id: "user-1".to_string(),
            referral_type: ReferralSource::Digital,
            cost: 2_000.0,
            period: "2025-03".to_string(),
            source: CostSource::Manual,
            metadata: None,
        })
        .unwrap();
    store
        .upsert(
            meta_sync_row(
                &[CampaignSpend {
                    campaign_id: "spring-campaign".to_string(),
                    spend: 1_200.0,
                    impressions: 80_000,
                    clicks: 2_400,
                    conversions: 31,
                }],
                "user-1",
                "2025-03",
                None,
            )
            .unwrap(),
        )
        .unwrap();
    store
}

#[test]
fn test_end_to_end_march_snapshot() {
    let raw = march_payload();
    let period = march_period(None);

    let processed = DataProcessor::default().process(
        &raw,
        Some(period.start_date),
        Some(period.end_date),
    );

    assert_eq!(processed.total_patients, 6);
    assert_eq!(processed.total_appointments, 4);
    assert_eq!(processed.total_leads, 2);
    assert_eq!(processed.total_bookings, 1);

    // p6 references an unregistered location and must land in the synthetic
    // bucket rather than disappear.
    assert_eq!(processed.locations[UNKNOWN_LOCATION_KEY].patient_count, 1);
    assert_eq!(processed.locations["gilbert"].patient_count, 3);
    assert_eq!(processed.locations["phoenix"].patient_count, 2);

    // 8 classified records: digital (google ads, website, instagram) = 3,
    // professional (dr referral, dentist x2) = 3, direct (missing, word of
    // mouth) = 2.
    assert_eq!(processed.referral_sources.digital, 3);
    assert_eq!(processed.referral_sources.professional, 3);
    assert_eq!(processed.referral_sources.direct, 2);

    assert_eq!(processed.no_show_rate, 25.0);

    // Digital: p1 converted + p2 not + l1 converted = 66%.
    assert_eq!(processed.conversion_rates.digital, 66);
    // Professional: p3 converted, p4 and l2 not = 33%.
    assert_eq!(processed.conversion_rates.professional, 33);
    assert_eq!(processed.conversion_rates.direct, 0);

    let aggregator = CostAggregator::new(seeded_store());
    let costs = aggregator
        .costs_for_range("user-1", None, period.start_date, period.end_date)
        .unwrap();
    assert_eq!(costs.totals.manual, 2_000.0);
    assert_eq!(costs.totals.meta, 1_200.0);
    assert_eq!(costs.totals.total, 3_200.0);

    let snapshot = assemble(&period, &processed, &costs, ApiStatus::Live);

    assert_eq!(snapshot.summary.total_revenue, 40_000.0);
    assert_eq!(snapshot.summary.total_production, 48_000.0);
    // pr2 has no net amount and falls back to gross.
    assert_eq!(snapshot.summary.total_net_production, 44_000.0);
    assert!((snapshot.summary.profit_margin - 92.0).abs() < 0.01);
    assert!((snapshot.summary.roi - 1275.0).abs() < 0.01);

    // Only the gilbert-scoped manual row attributes to a single location;
    // the all-location meta row stays in the period totals.
    assert_eq!(snapshot.locations["gilbert"].acquisition_cost_total, 2_000.0);
    assert_eq!(snapshot.locations["phoenix"].acquisition_cost_total, 0.0);

    for bucket in &snapshot.trends.weekly {
        let sum = bucket.digital_pct + bucket.professional_pct + bucket.direct_pct;
        assert_eq!(sum, 100, "bucket {} does not sum to 100", bucket.period_label);
    }
    assert_eq!(snapshot.trends.monthly.len(), 1);
    assert_eq!(snapshot.trends.monthly[0].period_label, "Mar 2025");
    assert_eq!(snapshot.trends.monthly[0].revenue, 40_000.0);
}

#[test]
fn test_array_location_payload_is_equivalent() {
    let payload = json!({
        "locations": [
            { "id": "loc-1", "name": "Gilbert" },
            { "id": "loc-2", "name": "Phoenix" }
        ],
        "patients": [
            { "id": "p1", "createdAt": "2025-03-03", "location": "loc-1", "treatments": [] },
            { "id": "p2", "createdAt": "2025-03-04", "location": "Phoenix", "treatments": [] }
        ]
    });
    let raw: RawDataset = serde_json::from_value(payload).unwrap();

    let processed = DataProcessor::default().process(&raw, None, None);
    assert_eq!(processed.total_patients, 2);
    assert_eq!(processed.locations["loc-1"].patient_count, 1);
    assert_eq!(processed.locations["loc-2"].patient_count, 1);
}

#[test]
fn test_date_filter_applies_before_counting() {
    let payload = json!({
        "locations": { "gilbert": { "name": "Gilbert" } },
        "appointments": [
            { "id": "a1", "date": "2025-01-05", "location": "gilbert" },
            { "id": "a2", "date": "2025-04-05", "location": "gilbert" }
        ]
    });
    let raw: RawDataset = serde_json::from_value(payload).unwrap();
    let processor = DataProcessor::default();

    let filtered = processor.process(
        &raw,
        NaiveDate::from_ymd_opt(2025, 1, 1),
        NaiveDate::from_ymd_opt(2025, 2, 1),
    );
    assert_eq!(filtered.total_appointments, 1);

    let unfiltered = processor.process(&raw, None, None);
    assert_eq!(unfiltered.total_appointments, 2);
    assert!(filtered.total_appointments <= unfiltered.total_appointments);
}

#[test]
fn test_cost_upsert_flows_into_snapshot() {
    let store = Arc::new(InMemoryCostStore::new());
    let entry = NewAcquisitionCost {
        location_id: Some("1".to_string()),
        user_id: "user-1".to_string(),
        referral_type: ReferralSource::Digital,
        cost: 100.0,
        period: "2025-03".to_string(),
        source: CostSource::Manual,
        metadata: None,
    };
    store.upsert(entry.clone()).unwrap();
    store
        .upsert(NewAcquisitionCost {
            cost: 150.0,
            ..entry
        })
        .unwrap();

    let aggregator = CostAggregator::new(store);
    let report = aggregator.costs_for("user-1", Some("1"), "2025-03").unwrap();
    assert_eq!(report.manual.len(), 1);
    assert_eq!(report.totals.manual, 150.0);

    let period = march_period(None);
    let processed = DataProcessor::default().process(&march_payload(), None, None);
    let snapshot = assemble(&period, &processed, &report, ApiStatus::Live);
    assert_eq!(snapshot.acquisition_cost_breakdown.total, 150.0);
}

#[tokio::test]
async fn test_pipeline_fallback_end_to_end() {
    let config = UpstreamConfig::new("key", "secret")
        .with_endpoint("http://127.0.0.1:9/v1/graphql")
        .with_timeout(Duration::from_millis(500));
    let client = UpstreamClient::new(config).unwrap();
    let pipeline = AnalyticsPipeline::new(client, seeded_store());

    let snapshot = pipeline
        .snapshot_for_period("user-1", &march_period(None))
        .await
        .unwrap();

    // The upstream is unreachable: data is synthetic and tagged, but the
    // cost store is real and still merged in.
    assert_eq!(snapshot.api_status, ApiStatus::Sample);
    assert!(snapshot.summary.total_patients > 0);
    assert_eq!(snapshot.acquisition_cost_breakdown.manual, 2_000.0);
    assert_eq!(snapshot.acquisition_cost_breakdown.meta, 1_200.0);
    assert!(snapshot.summary.roi != 0.0);

    let html = render_report(&snapshot, "March 2025");
    assert!(html.contains("Using sample data"));
    assert!(html.contains("Gilbert"));
}

#[tokio::test]
async fn test_pipeline_fallback_is_deterministic() {
    let make_pipeline = || {
        let config = UpstreamConfig::new("key", "secret")
            .with_endpoint("http://127.0.0.1:9/v1/graphql")
            .with_timeout(Duration::from_millis(500));
        let client = UpstreamClient::new(config).unwrap();
        // Zero-TTL cache so the second pipeline recomputes from scratch.
        AnalyticsPipeline::new(client, Arc::new(InMemoryCostStore::new()))
            .with_cache(SnapshotCache::with_ttl(0))
    };

    let first = make_pipeline()
        .snapshot_for_period("user-1", &march_period(None))
        .await
        .unwrap();
    let second = make_pipeline()
        .snapshot_for_period("user-1", &march_period(None))
        .await
        .unwrap();

    assert_eq!(first.summary.total_patients, second.summary.total_patients);
    assert_eq!(first.summary.total_revenue, second.summary.total_revenue);
    assert_eq!(
        first.summary.referral_sources,
        second.summary.referral_sources
    );
}

#[test]
fn test_snapshot_wire_contract() -> anyhow::Result<()> {
    let period = march_period(Some("gilbert"));
    let raw = restrict_to_location(&march_payload(), "gilbert");
    let processed = DataProcessor::default().process(&raw, None, None);
    let snapshot = assemble(&period, &processed, &CostReport::default(), ApiStatus::Live);

    let value = serde_json::to_value(&snapshot)?;
    for key in [
        "locations",
        "summary",
        "trends",
        "acquisitionCostBreakdown",
        "apiStatus",
        "lastUpdated",
        "queryParams",
    ] {
        assert!(value.get(key).is_some(), "snapshot missing '{}'", key);
    }

    let summary = &value["summary"];
    for key in [
        "totalPatients",
        "totalAppointments",
        "totalLeads",
        "totalRevenue",
        "totalProduction",
        "totalNetProduction",
        "profitMargin",
        "roi",
        "noShowRate",
        "referralSources",
        "conversionRates",
    ] {
        assert!(summary.get(key).is_some(), "summary missing '{}'", key);
    }

    assert_eq!(value["queryParams"]["location"], "gilbert");
    assert!(value["trends"]["weekly"].is_array());
    assert!(value["trends"]["monthly"].is_array());

    // Round-trips: the snapshot is also a consumer input (PDF, AI summary).
    let back: AnalyticsSnapshot = serde_json::from_value(value)?;
    assert_eq!(back.summary.total_patients, snapshot.summary.total_patients);
    Ok(())
}
