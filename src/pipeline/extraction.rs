use serde::{Deserialize, Serialize};

/// Qualitative bucket derived from the numeric extraction confidence.
///
/// The tier is reported to the consumer; confirmation is never blocked
/// programmatically, even on Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Score above 80: auto-acceptable
    High,
    /// Score 50 to 80: user review recommended
    Medium,
    /// Score below 50: user correction expected before confirming
    Low,
}

impl ConfidenceTier {
    /// Bucket a 0-100 confidence score
    pub fn from_score(score: u8) -> Self {
        if score > 80 {
            ConfidenceTier::High
        } else if score >= 50 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Structured fields the extraction service pulled out of the evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetFields {
    #[serde(default)]
    pub bet_type: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub odds: Vec<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

/// The extraction outcome under review. Owned by the pipeline for the
/// duration of the review step; user corrections mutate it in place
/// before confirmation.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Server-side id of the provisional bet record
    pub bet_id: String,
    pub fields: BetFields,
    /// Confidence score, 0-100
    pub confidence_score: u8,
}

impl ExtractionResult {
    /// Confidence tier for this result
    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.confidence_score)
    }
}

/// Wire shape of `POST /api/bets/upload`
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub bet_id: Option<serde_json::Value>,
    pub bet_data: Option<BetFields>,
    #[serde(default)]
    pub integrity_score: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Fold the wire payload into an owned result; `None` when the server
    /// reported success but the payload is unusable.
    pub(crate) fn into_extraction(self) -> Option<ExtractionResult> {
        if !self.success {
            return None;
        }
        let bet_id = match self.bet_id? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let fields = self.bet_data?;
        let confidence_score = self
            .integrity_score
            .map(|s| s.clamp(0.0, 100.0) as u8)
            .unwrap_or(0);

        Some(ExtractionResult {
            bet_id,
            fields,
            confidence_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_tiers_bucket_at_the_documented_boundaries() {
        assert_eq!(ConfidenceTier::from_score(100), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(81), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(80), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(50), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(49), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0), ConfidenceTier::Low);
    }

    #[test]
    fn upload_response_with_numeric_bet_id_parses() {
        let raw = r#"{
            "success": true,
            "bet_id": 917,
            "bet_data": {
                "bet_type": "Moneyline",
                "sport": "Basketball",
                "teams": ["Lakers", "Knicks"],
                "odds": ["-110"],
                "amount": "$50"
            },
            "integrity_score": 45
        }"#;
        let response: UploadResponse = serde_json::from_str(raw).unwrap();
        let extraction = response.into_extraction().unwrap();

        assert_eq!(extraction.bet_id, "917");
        assert_eq!(extraction.confidence_score, 45);
        assert_eq!(extraction.confidence_tier(), ConfidenceTier::Low);
        assert_eq!(extraction.fields.teams, vec!["Lakers", "Knicks"]);
    }

    #[test]
    fn unsuccessful_upload_yields_no_extraction() {
        let raw = r#"{"success": false, "error": "No text could be extracted"}"#;
        let response: UploadResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_extraction().is_none());
    }

    #[test]
    fn success_without_bet_data_is_unusable() {
        let raw = r#"{"success": true, "bet_id": "abc"}"#;
        let response: UploadResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_extraction().is_none());
    }
}
