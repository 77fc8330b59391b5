use crate::error::Result;
use crate::snapshot::{AnalyticsSnapshot, ApiStatus};

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are an analytics consultant for orthodontic practices. You receive one \
analytics snapshot as JSON and write a short narrative summary for the \
practice owner: overall patient volume and trend, the strongest and weakest \
referral channels, conversion performance, and the financial picture \
(production, revenue, profit margin, ROI on marketing spend). Be concrete, \
cite the numbers you use, and keep it under 300 words. Do not invent data \
that is not in the snapshot.";

/// Builds the user prompt for one snapshot. Pure function so prompt content
/// is testable without a network.
pub fn build_summary_prompt(snapshot: &AnalyticsSnapshot) -> Result<String> {
    let payload = serde_json::to_string_pretty(snapshot)?;

    let mut prompt = format!(
        "Analytics snapshot for {} to {} (location: {}):\n```json\n{}\n```\n\n\
         Write the narrative summary.",
        snapshot.query_params.start_date,
        snapshot.query_params.end_date,
        snapshot.query_params.location,
        payload
    );

    if snapshot.api_status == ApiStatus::Sample {
        prompt.push_str(
            "\n\nNote: this snapshot was generated from sample data because the \
             practice-management connection was unavailable. Say so prominently \
             and do not present the figures as actuals.",
        );
    }

    Ok(prompt)
}
