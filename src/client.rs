//! Authenticated GraphQL client for the practice-management API. The whole
//! upstream query surface sits behind one adapter (`FieldMap`), so schema
//! drift is absorbed by editing a versioned field table instead of scattering
//! trial queries through the pipeline.

use crate::error::{AnalyticsError, Result};
use crate::schema::RawDataset;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://connect.greyfinch.com/v1/graphql";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request-scoped credentials and transport settings. Passed into each client
/// instance; nothing here is shared mutable state.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            endpoint: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checked before every request so no network call is wasted on
    /// credentials that cannot travel in a header.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(AnalyticsError::CredentialsInvalid(
                "API key and secret must both be set".to_string(),
            ));
        }
        for (label, value) in [("key", &self.api_key), ("secret", &self.api_secret)] {
            if !value.chars().all(|c| c.is_ascii_graphic()) {
                return Err(AnalyticsError::CredentialsInvalid(format!(
                    "API {} contains characters that cannot be sent in a header",
                    label
                )));
            }
        }
        Ok(())
    }
}

/// Versioned mapping from the logical collections this crate consumes to the
/// upstream schema's field names. Schema drift is handled by shipping a new
/// map version, not by probing from the request path.
#[derive(Debug, Clone)]
pub struct FieldMap {
    pub version: &'static str,
    pub locations: &'static str,
    pub patients: &'static str,
    pub patient_timestamp: &'static str,
    pub appointments: &'static str,
    pub appointment_timestamp: &'static str,
    pub leads: &'static str,
    pub lead_timestamp: &'static str,
    pub bookings: &'static str,
    pub booking_timestamp: &'static str,
    pub revenue: &'static str,
    pub production: &'static str,
    pub line_timestamp: &'static str,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            version: "v1",
            locations: "locations",
            patients: "patients",
            patient_timestamp: "createdAt",
            appointments: "appointments",
            appointment_timestamp: "date",
            leads: "leads",
            lead_timestamp: "createdAt",
            bookings: "appointmentBookings",
            booking_timestamp: "date",
            revenue: "revenue",
            production: "production",
            line_timestamp: "date",
        }
    }
}

impl FieldMap {
    /// One GraphQL document covering every collection the processor consumes.
    pub fn dataset_query(&self) -> String {
        format!(
            "query PracticeAnalytics($startDate: date!, $endDate: date!) {{\n\
             \x20 {locations} {{ id name address }}\n\
             \x20 {patients}(where: {{{patient_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {patient_ts} referralSource location {{ id name }} treatments {{ id status }}\n\
             \x20 }}\n\
             \x20 {appointments}(where: {{{appointment_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {appointment_ts} status location {{ id name }}\n\
             \x20 }}\n\
             \x20 {leads}(where: {{{lead_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {lead_ts} referralSource location {{ id name }} bookings {{ id {booking_ts} status }}\n\
             \x20 }}\n\
             \x20 {bookings}(where: {{{booking_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {booking_ts} status location {{ id name }}\n\
             \x20 }}\n\
             \x20 {revenue}(where: {{{line_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {line_ts} amount location {{ id name }}\n\
             \x20 }}\n\
             \x20 {production}(where: {{{line_ts}: {{_gte: $startDate, _lte: $endDate}}}}) {{\n\
             \x20   id {line_ts} amount netAmount location {{ id name }}\n\
             \x20 }}\n\
             }}",
            locations = self.locations,
            patients = self.patients,
            patient_ts = self.patient_timestamp,
            appointments = self.appointments,
            appointment_ts = self.appointment_timestamp,
            leads = self.leads,
            lead_ts = self.lead_timestamp,
            bookings = self.bookings,
            booking_ts = self.booking_timestamp,
            revenue = self.revenue,
            production = self.production,
            line_ts = self.line_timestamp,
        )
    }

    /// Renames the upstream response collections into the dataset's logical
    /// keys.
    fn normalize(&self, data: Value) -> Value {
        let mut normalized = Map::new();
        let pairs = [
            ("locations", self.locations),
            ("patients", self.patients),
            ("appointments", self.appointments),
            ("leads", self.leads),
            ("appointmentBookings", self.bookings),
            ("revenue", self.revenue),
            ("production", self.production),
        ];
        for (logical, upstream) in pairs {
            if let Some(value) = data.get(upstream) {
                normalized.insert(logical.to_string(), value.clone());
            }
        }
        Value::Object(normalized)
    }
}

/// Lifts GraphQL-level errors out of an HTTP 200 response.
pub(crate) fn extract_data(body: Value) -> Result<Value> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let message: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            let message = if message.is_empty() {
                "GraphQL error with no message".to_string()
            } else {
                message.join("; ")
            };
            return Err(AnalyticsError::Upstream {
                status: 200,
                message,
            });
        }
    }

    body.get("data").cloned().ok_or_else(|| AnalyticsError::Upstream {
        status: 200,
        message: "Response missing 'data'".to_string(),
    })
}

pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
    fields: FieldMap,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            fields: FieldMap::default(),
        })
    }

    pub fn with_field_map(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Simple concatenation shim, not a cryptographic scheme. The upstream
    /// expects both halves in one bearer value.
    fn bearer_token(&self) -> String {
        BASE64.encode(format!("{}:{}", self.config.api_key, self.config.api_secret))
    }

    /// Issues one GraphQL request. Transport failures, timeouts, non-2xx
    /// statuses, and GraphQL error payloads all surface as errors; retries
    /// are the caller's decision.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        self.config.validate()?;

        debug!(
            "Upstream request to {} (field map {})",
            self.config.endpoint, self.fields.version
        );

        let response = self
            .http
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.bearer_token()))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        extract_data(body)
    }

    /// Fetches and normalizes one analysis window worth of raw records. An
    /// empty result set counts as an upstream failure so the caller can fall
    /// back to sample data instead of rendering a hollow dashboard.
    pub async fn fetch_dataset(&self, start: NaiveDate, end: NaiveDate) -> Result<RawDataset> {
        let query = self.fields.dataset_query();
        let variables = json!({ "startDate": start, "endDate": end });

        let data = self.execute(&query, variables).await?;
        let dataset: RawDataset =
            serde_json::from_value(self.fields.normalize(data)).map_err(|e| {
                AnalyticsError::Upstream {
                    status: 200,
                    message: format!("Upstream payload did not match the expected shape: {}", e),
                }
            })?;

        if dataset.is_empty() {
            return Err(AnalyticsError::Upstream {
                status: 200,
                message: "Upstream returned an empty dataset".to_string(),
            });
        }

        info!(
            "Fetched {} records across {} locations for {}..{}",
            dataset.record_count(),
            dataset.locations.len(),
            start,
            end
        );
        Ok(dataset)
    }
}
