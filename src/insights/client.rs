use crate::error::{AnalyticsError, Result};
use crate::insights::prompts::{build_summary_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::snapshot::AnalyticsSnapshot;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_INSIGHT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct InsightsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl InsightsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Turns one snapshot into narrative practice-performance text.
    pub async fn generate_summary(
        &self,
        model: &str,
        snapshot: &AnalyticsSnapshot,
    ) -> Result<String> {
        let user_prompt = build_summary_prompt(snapshot)?;
        debug!("Requesting insight summary from model {}", model);

        let payload = json!({
            "model": model,
            "temperature": 0.4,
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
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
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AnalyticsError::Upstream {
                status: status.as_u16(),
                message: "Completion response missing content".to_string(),
            })
    }
}
