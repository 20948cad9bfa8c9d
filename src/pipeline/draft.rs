use crate::error::{Error, Result};

/// Maximum accepted image size (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted bet-slip image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// MIME type sent with the upload
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// Filename extension used for the multipart part
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Raw evidence the user provided for extraction
#[derive(Debug, Clone)]
pub enum Evidence {
    /// A bet-slip screenshot or photo
    Image { bytes: Vec<u8>, format: ImageFormat },
    /// Free-text description of the bet
    Text(String),
}

/// Unsubmitted user-provided evidence awaiting extraction.
///
/// Created when the user begins an upload; destroyed on completion or
/// explicit reset.
#[derive(Debug, Clone)]
pub struct BetDraft {
    pub evidence: Evidence,
    /// Reddit account to credit the pick to, if any
    pub reddit_handle: Option<String>,
    /// Subscription account the upload counts against, if any
    pub subscription_handle: Option<String>,
}

impl BetDraft {
    /// Draft from an image
    pub fn from_image(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            evidence: Evidence::Image { bytes, format },
            reddit_handle: None,
            subscription_handle: None,
        }
    }

    /// Draft from free text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            evidence: Evidence::Text(text.into()),
            reddit_handle: None,
            subscription_handle: None,
        }
    }

    /// Attach a reddit handle
    pub fn with_reddit_handle(mut self, handle: impl Into<String>) -> Self {
        self.reddit_handle = Some(handle.into());
        self
    }

    /// Attach a subscription handle
    pub fn with_subscription_handle(mut self, handle: impl Into<String>) -> Self {
        self.subscription_handle = Some(handle.into());
        self
    }

    /// Local validation, performed before anything touches the network.
    /// Images must be jpeg/png and at most 5 MiB; text must be non-empty
    /// after trimming.
    pub fn validate(&self) -> Result<()> {
        match &self.evidence {
            Evidence::Image { bytes, .. } => {
                if bytes.is_empty() {
                    return Err(Error::validation("image is empty"));
                }
                if bytes.len() > MAX_IMAGE_BYTES {
                    return Err(Error::validation(format!(
                        "image is {} bytes, limit is {} bytes",
                        bytes.len(),
                        MAX_IMAGE_BYTES
                    )));
                }
                Ok(())
            }
            Evidence::Text(text) => {
                if text.trim().is_empty() {
                    return Err(Error::validation("bet text is empty"));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_image_fails_validation() {
        let draft = BetDraft::from_image(vec![0u8; 6 * 1024 * 1024], ImageFormat::Jpeg);
        assert!(matches!(
            draft.validate(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn image_at_the_limit_passes() {
        let draft = BetDraft::from_image(vec![0u8; MAX_IMAGE_BYTES], ImageFormat::Png);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn whitespace_only_text_fails_validation() {
        let draft = BetDraft::from_text("   \n\t ");
        assert!(matches!(
            draft.validate(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn plain_text_draft_passes() {
        let draft = BetDraft::from_text("Lakers -5.5 vs Knicks, -110, $50")
            .with_reddit_handle("u/sharp")
            .with_subscription_handle("sharp-premium");
        assert!(draft.validate().is_ok());
        assert_eq!(draft.reddit_handle.as_deref(), Some("u/sharp"));
    }
}
