use serde::{Deserialize, Serialize};

/// Marketing channel a patient or lead is attributed to. Classification is
/// total: every record lands in exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralSource {
    Digital,
    Professional,
    Direct,
}

impl ReferralSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralSource::Digital => "digital",
            ReferralSource::Professional => "professional",
            ReferralSource::Direct => "direct",
        }
    }

    pub fn all() -> [ReferralSource; 3] {
        [
            ReferralSource::Digital,
            ReferralSource::Professional,
            ReferralSource::Direct,
        ]
    }
}

/// Keyword vocabulary for referral classification. The defaults cover the
/// stock channels; deployments can extend or replace the lists. Matching is a
/// case-insensitive substring check, digital before professional, and
/// anything unmatched (including empty or missing sources) is direct.
#[derive(Debug, Clone)]
pub struct ReferralVocabulary {
    digital: Vec<String>,
    professional: Vec<String>,
}

impl Default for ReferralVocabulary {
    fn default() -> Self {
        Self {
            digital: [
                "online",
                "google",
                "web",
                "facebook",
                "instagram",
                "social",
                "ads",
                "digital",
                "seo",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            professional: [
                "referral",
                "doctor",
                "dentist",
                "dr.",
                "physician",
                "specialist",
                "orthodontist",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ReferralVocabulary {
    pub fn new(
        digital: impl IntoIterator<Item = String>,
        professional: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            digital: digital.into_iter().map(|s| s.to_lowercase()).collect(),
            professional: professional.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn with_digital_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.digital.push(keyword.into().to_lowercase());
        self
    }

    pub fn with_professional_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.professional.push(keyword.into().to_lowercase());
        self
    }

    pub fn classify(&self, source: Option<&str>) -> ReferralSource {
        let needle = match source {
            Some(s) if !s.trim().is_empty() => s.trim().to_lowercase(),
            _ => return ReferralSource::Direct,
        };

        if self.digital.iter().any(|k| needle.contains(k.as_str())) {
            return ReferralSource::Digital;
        }
        if self.professional.iter().any(|k| needle.contains(k.as_str())) {
            return ReferralSource::Professional;
        }
        ReferralSource::Direct
    }
}
