//! Bet submission pipeline: evidence capture, remote extraction, user
//! review with corrections, and final confirmation.

pub mod draft;
pub mod extraction;

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::client::MultipartForm;
use crate::http::gateway::{ApiRequest, HttpGateway};

pub use draft::{BetDraft, Evidence, ImageFormat, MAX_IMAGE_BYTES};
pub use extraction::{BetFields, ConfidenceTier, ExtractionResult};

use extraction::UploadResponse;

/// Where a submission attempt currently stands. Exactly one active state
/// per attempt; progression is linear with an explicit reset back to
/// Capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Waiting for the user to provide evidence
    Capturing,
    /// Extraction call in flight
    Submitting,
    /// Extraction result available for review and correction
    Reviewing,
    /// Confirmation call in flight
    Confirming,
    /// The bet record is final
    Completed,
    /// The session was terminated mid-flight; only reset is possible
    Failed,
}

impl SubmissionState {
    fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Capturing => "capturing",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Reviewing => "reviewing",
            SubmissionState::Confirming => "confirming",
            SubmissionState::Completed => "completed",
            SubmissionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct PipelineInner {
    state: SubmissionState,
    draft: Option<BetDraft>,
    extraction: Option<ExtractionResult>,
    /// Set when a submit attempt failed and the pipeline fell back to
    /// Capturing; permits reset from there.
    had_error: bool,
}

/// Drives one bet submission attempt through its states, using the
/// gateway for all network steps.
///
/// Transitions are serialized: a submit while Submitting or a confirm
/// while Confirming is rejected with a busy error, never queued. Cheap to
/// clone; clones share the attempt.
#[derive(Clone)]
pub struct SubmissionPipeline {
    gateway: HttpGateway,
    inner: Arc<RwLock<PipelineInner>>,
}

impl SubmissionPipeline {
    /// Create a pipeline in Capturing with an empty draft
    pub fn new(gateway: HttpGateway) -> Self {
        Self {
            gateway,
            inner: Arc::new(RwLock::new(PipelineInner {
                state: SubmissionState::Capturing,
                draft: None,
                extraction: None,
                had_error: false,
            })),
        }
    }

    /// Current state
    pub async fn state(&self) -> SubmissionState {
        self.inner.read().await.state
    }

    /// The extraction result under review, if any
    pub async fn current_extraction(&self) -> Option<ExtractionResult> {
        self.inner.read().await.extraction.clone()
    }

    /// Confidence tier of the extraction under review, if any
    pub async fn confidence_tier(&self) -> Option<ConfidenceTier> {
        self.inner
            .read()
            .await
            .extraction
            .as_ref()
            .map(|e| e.confidence_tier())
    }

    /// The draft awaiting or retained after extraction, if any
    pub async fn current_draft(&self) -> Option<BetDraft> {
        self.inner.read().await.draft.clone()
    }

    /// Validate and submit a draft for extraction.
    ///
    /// Invalid drafts fail locally without transitioning. On extraction
    /// failure the pipeline returns to Capturing with the draft retained
    /// so the user can retry without re-entering input.
    pub async fn submit(&self, draft: BetDraft) -> Result<ExtractionResult> {
        let request = {
            let mut inner = self.inner.write().await;
            match inner.state {
                SubmissionState::Capturing => {}
                SubmissionState::Submitting => return Err(Error::busy("submit")),
                SubmissionState::Confirming => return Err(Error::busy("confirm")),
                other => {
                    return Err(Error::invalid_transition(other.as_str(), "submit"));
                }
            }

            if let Err(e) = draft.validate() {
                inner.had_error = true;
                return Err(e);
            }

            let request = build_upload_request(&draft);
            inner.draft = Some(draft);
            inner.state = SubmissionState::Submitting;
            request
        };

        debug!("Submitting draft for extraction");
        let outcome = self.gateway.send(request).await;

        let mut inner = self.inner.write().await;
        match outcome {
            Err(Error::SessionTerminated) => {
                warn!("Session terminated during extraction, abandoning attempt");
                fail_attempt(&mut inner);
                Err(Error::SessionTerminated)
            }
            Err(e) => {
                inner.state = SubmissionState::Capturing;
                inner.had_error = true;
                Err(e)
            }
            Ok(response) if !response.is_success() => {
                inner.state = SubmissionState::Capturing;
                inner.had_error = true;
                Err(Error::extraction(response.error_message()))
            }
            Ok(response) => {
                let parsed: UploadResponse = match response.json() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        inner.state = SubmissionState::Capturing;
                        inner.had_error = true;
                        return Err(Error::extraction(e.to_string()));
                    }
                };
                let reported_error = parsed.error.clone();
                match parsed.into_extraction() {
                    Some(extraction) => {
                        info!(
                            bet_id = %extraction.bet_id,
                            score = extraction.confidence_score,
                            tier = ?extraction.confidence_tier(),
                            "Extraction succeeded"
                        );
                        inner.extraction = Some(extraction.clone());
                        inner.state = SubmissionState::Reviewing;
                        inner.had_error = false;
                        Ok(extraction)
                    }
                    None => {
                        inner.state = SubmissionState::Capturing;
                        inner.had_error = true;
                        Err(Error::extraction(
                            reported_error.unwrap_or_else(|| "no usable extraction data".into()),
                        ))
                    }
                }
            }
        }
    }

    /// Correct the bet type while reviewing
    pub async fn set_bet_type(&self, bet_type: impl Into<String>) -> Result<()> {
        self.edit_field(|fields| fields.bet_type = Some(bet_type.into()))
            .await
    }

    /// Correct the sport while reviewing
    pub async fn set_sport(&self, sport: impl Into<String>) -> Result<()> {
        self.edit_field(|fields| fields.sport = Some(sport.into()))
            .await
    }

    async fn edit_field(&self, apply: impl FnOnce(&mut BetFields)) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.state != SubmissionState::Reviewing {
            return Err(Error::invalid_transition(inner.state.as_str(), "edit"));
        }
        // Reviewing always holds an extraction
        if let Some(extraction) = inner.extraction.as_mut() {
            apply(&mut extraction.fields);
        }
        Ok(())
    }

    /// Commit the (possibly corrected) bet type and sport.
    ///
    /// On failure the pipeline stays in Reviewing with the corrections
    /// intact, so confirm can simply be retried.
    pub async fn confirm(&self) -> Result<()> {
        let request = {
            let mut inner = self.inner.write().await;
            match inner.state {
                SubmissionState::Reviewing => {}
                SubmissionState::Confirming => return Err(Error::busy("confirm")),
                SubmissionState::Submitting => return Err(Error::busy("submit")),
                other => {
                    return Err(Error::invalid_transition(other.as_str(), "confirm"));
                }
            }

            let extraction = match inner.extraction.as_ref() {
                Some(extraction) => extraction,
                None => {
                    return Err(Error::invalid_transition("reviewing", "confirm"));
                }
            };
            let request = ApiRequest::patch_json(
                format!("/api/bets/{}/update-category", extraction.bet_id),
                serde_json::json!({
                    "bet_type": extraction.fields.bet_type,
                    "sport": extraction.fields.sport,
                }),
            );
            inner.state = SubmissionState::Confirming;
            request
        };

        debug!("Confirming bet");
        let outcome = self.gateway.send(request).await;

        let mut inner = self.inner.write().await;
        match outcome {
            Err(Error::SessionTerminated) => {
                warn!("Session terminated during confirmation, abandoning attempt");
                fail_attempt(&mut inner);
                Err(Error::SessionTerminated)
            }
            Err(e) => {
                inner.state = SubmissionState::Reviewing;
                Err(e)
            }
            Ok(response) if !response.is_success() => {
                inner.state = SubmissionState::Reviewing;
                Err(Error::persistence(response.error_message()))
            }
            Ok(_) => {
                info!("Bet confirmed");
                inner.state = SubmissionState::Completed;
                inner.draft = None;
                Ok(())
            }
        }
    }

    /// Discard all draft and extraction state and return to Capturing.
    /// Legal from Completed, Failed, or Capturing after an error; no
    /// partial state carries over to the next attempt.
    pub async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let allowed = matches!(
            inner.state,
            SubmissionState::Completed | SubmissionState::Failed
        ) || (inner.state == SubmissionState::Capturing && inner.had_error);

        if !allowed {
            return Err(Error::invalid_transition(inner.state.as_str(), "reset"));
        }

        inner.state = SubmissionState::Capturing;
        inner.draft = None;
        inner.extraction = None;
        inner.had_error = false;
        Ok(())
    }
}

/// Session termination invalidates everything this attempt held
fn fail_attempt(inner: &mut PipelineInner) {
    inner.state = SubmissionState::Failed;
    inner.draft = None;
    inner.extraction = None;
    inner.had_error = false;
}

fn build_upload_request(draft: &BetDraft) -> ApiRequest {
    match &draft.evidence {
        Evidence::Image { bytes, format } => {
            let mut form = MultipartForm::new().file(
                "image",
                bytes.clone(),
                format!("bet-slip.{}", format.extension()),
                format.mime(),
            );
            if let Some(handle) = &draft.reddit_handle {
                form = form.text("reddit_username", handle.clone());
            }
            if let Some(handle) = &draft.subscription_handle {
                form = form.text("subscription_username", handle.clone());
            }
            ApiRequest::post_multipart("/api/bets/upload", form)
        }
        Evidence::Text(text) => {
            let mut body = serde_json::json!({ "text": text });
            if let Some(handle) = &draft.reddit_handle {
                body["reddit_username"] = serde_json::Value::String(handle.clone());
            }
            if let Some(handle) = &draft.subscription_handle {
                body["subscription_username"] = serde_json::Value::String(handle.clone());
            }
            ApiRequest::post_json("/api/bets/upload", body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authority::TokenAuthority;
    use crate::auth::session::{TokenPair, UserIdentity};
    use crate::auth::store::MemoryStore;
    use crate::http::client::mock::MockHttpClient;
    use std::time::Duration;

    const API: &str = "http://api.test";

    fn upload_url() -> String {
        format!("{}/api/bets/upload", API)
    }

    fn confirm_url(bet_id: &str) -> String {
        format!("{}/api/bets/{}/update-category", API, bet_id)
    }

    fn extraction_payload(score: u8) -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "bet_id": "bet-1",
            "bet_data": {
                "bet_type": "Spread",
                "sport": "Basketball",
                "teams": ["Lakers", "Knicks"],
                "odds": ["-110"],
                "amount": "$50"
            },
            "integrity_score": score
        })
    }

    async fn pipeline_with(http: MockHttpClient) -> SubmissionPipeline {
        let authority =
            TokenAuthority::new(API, Arc::new(MemoryStore::new()), Arc::new(http.clone()));
        authority
            .login(
                UserIdentity {
                    id: "u-1".into(),
                    username: "sharp".into(),
                    email: None,
                },
                TokenPair {
                    access_token: "access".into(),
                    refresh_token: "refresh".into(),
                },
            )
            .await;
        SubmissionPipeline::new(HttpGateway::new(API, Arc::new(http), authority))
    }

    #[tokio::test]
    async fn oversized_image_fails_locally_without_network() {
        let http = MockHttpClient::new();
        let pipeline = pipeline_with(http.clone()).await;

        let draft = BetDraft::from_image(vec![0u8; 6 * 1024 * 1024], ImageFormat::Jpeg);
        let result = pipeline.submit(draft).await;

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(pipeline.state().await, SubmissionState::Capturing);
        assert_eq!(http.calls_to(&upload_url()), 0);
    }

    #[tokio::test]
    async fn low_confidence_extraction_reaches_review_then_completes() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(45));
        http.enqueue(confirm_url("bet-1"), 200, r#"{"success":true}"#);
        let pipeline = pipeline_with(http).await;

        let extraction = pipeline
            .submit(BetDraft::from_text("Lakers -5.5, -110, $50"))
            .await
            .unwrap();

        assert_eq!(pipeline.state().await, SubmissionState::Reviewing);
        assert_eq!(extraction.confidence_tier(), ConfidenceTier::Low);
        assert_eq!(
            pipeline.confidence_tier().await,
            Some(ConfidenceTier::Low)
        );

        pipeline.set_bet_type("Moneyline").await.unwrap();
        pipeline.confirm().await.unwrap();

        assert_eq!(pipeline.state().await, SubmissionState::Completed);
    }

    #[tokio::test]
    async fn confirm_failure_keeps_corrections_for_retry() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(72));
        http.enqueue(confirm_url("bet-1"), 500, r#"{"error":"db down"}"#);
        http.enqueue(confirm_url("bet-1"), 200, r#"{"success":true}"#);
        let pipeline = pipeline_with(http.clone()).await;

        pipeline
            .submit(BetDraft::from_text("Jets ML, +140"))
            .await
            .unwrap();
        pipeline.set_bet_type("Moneyline").await.unwrap();
        pipeline.set_sport("Football").await.unwrap();

        let failed = pipeline.confirm().await;
        assert!(matches!(failed, Err(Error::Persistence { .. })));
        assert_eq!(pipeline.state().await, SubmissionState::Reviewing);

        // Corrections survived the failed confirm
        let extraction = pipeline.current_extraction().await.unwrap();
        assert_eq!(extraction.fields.bet_type.as_deref(), Some("Moneyline"));
        assert_eq!(extraction.fields.sport.as_deref(), Some("Football"));

        pipeline.confirm().await.unwrap();
        assert_eq!(pipeline.state().await, SubmissionState::Completed);

        // The retried PATCH carried the corrections
        let last = http
            .requests()
            .into_iter()
            .filter(|r| r.url == confirm_url("bet-1"))
            .last()
            .unwrap();
        assert!(last.body.contains("Moneyline"));
        assert!(last.body.contains("Football"));
    }

    #[tokio::test]
    async fn extraction_failure_returns_to_capturing_with_draft() {
        let http = MockHttpClient::new();
        http.enqueue(
            upload_url(),
            422,
            r#"{"success":false,"error":"No text could be extracted"}"#,
        );
        let pipeline = pipeline_with(http).await;

        let draft = BetDraft::from_text("blurry nonsense");
        let result = pipeline.submit(draft).await;

        assert!(matches!(result, Err(Error::Extraction { .. })));
        assert_eq!(pipeline.state().await, SubmissionState::Capturing);
        // Draft retained so the user can retry without re-entering input
        let retained = pipeline.current_draft().await.unwrap();
        assert!(matches!(retained.evidence, Evidence::Text(ref t) if t == "blurry nonsense"));
    }

    #[tokio::test]
    async fn reset_from_completed_clears_all_attempt_state() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(90));
        http.enqueue(confirm_url("bet-1"), 200, "{}");
        let pipeline = pipeline_with(http).await;

        pipeline
            .submit(BetDraft::from_text("Celtics -3"))
            .await
            .unwrap();
        pipeline.confirm().await.unwrap();
        assert_eq!(pipeline.state().await, SubmissionState::Completed);

        pipeline.reset().await.unwrap();

        assert_eq!(pipeline.state().await, SubmissionState::Capturing);
        assert!(pipeline.current_draft().await.is_none());
        assert!(pipeline.current_extraction().await.is_none());
    }

    #[tokio::test]
    async fn reset_is_rejected_mid_review() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(90));
        let pipeline = pipeline_with(http).await;

        pipeline
            .submit(BetDraft::from_text("Celtics -3"))
            .await
            .unwrap();

        assert!(matches!(
            pipeline.reset().await,
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_not_queued() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(60));
        http.set_delay(upload_url(), Duration::from_millis(60));
        let pipeline = pipeline_with(http).await;

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(BetDraft::from_text("Bills -7")).await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;

        let second = pipeline.submit(BetDraft::from_text("Bucks +2")).await;
        assert_eq!(second.unwrap_err(), Error::busy("submit"));

        assert!(first.await.unwrap().is_ok());
        assert_eq!(pipeline.state().await, SubmissionState::Reviewing);
    }

    #[tokio::test]
    async fn concurrent_confirm_is_rejected_not_queued() {
        let http = MockHttpClient::new();
        http.enqueue_json(upload_url(), 200, &extraction_payload(60));
        http.enqueue(confirm_url("bet-1"), 200, "{}");
        http.set_delay(confirm_url("bet-1"), Duration::from_millis(60));
        let pipeline = pipeline_with(http).await;

        pipeline
            .submit(BetDraft::from_text("Bills -7"))
            .await
            .unwrap();

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.confirm().await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;

        let second = pipeline.confirm().await;
        assert_eq!(second.unwrap_err(), Error::busy("confirm"));

        assert!(first.await.unwrap().is_ok());
        assert_eq!(pipeline.state().await, SubmissionState::Completed);
    }

    #[tokio::test]
    async fn session_termination_mid_submit_fails_the_attempt() {
        let http = MockHttpClient::new();
        http.enqueue(upload_url(), 401, "expired");
        http.enqueue(
            format!("{}/api/auth/refresh", API),
            401,
            r#"{"error":"revoked"}"#,
        );
        let pipeline = pipeline_with(http).await;

        let result = pipeline.submit(BetDraft::from_text("Bills -7")).await;
        assert_eq!(result.unwrap_err(), Error::SessionTerminated);
        assert_eq!(pipeline.state().await, SubmissionState::Failed);

        // Recovery path: reset back to a clean capture
        pipeline.reset().await.unwrap();
        assert_eq!(pipeline.state().await, SubmissionState::Capturing);
        assert!(pipeline.current_draft().await.is_none());
    }

    #[tokio::test]
    async fn edits_are_rejected_outside_review() {
        let http = MockHttpClient::new();
        let pipeline = pipeline_with(http).await;

        assert!(matches!(
            pipeline.set_bet_type("Parlay").await,
            Err(Error::InvalidTransition { .. })
        ));
    }
}
