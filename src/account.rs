//! Subscription plan payloads consumed from the marketplace's pricing
//! data. Checkout itself is an opaque redirect handled elsewhere; this
//! module only types the payloads.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Credits granted by a plan. The server encodes unlimited plans with the
/// literal string `"Unlimited"`, so this is a tagged variant rather than
/// a type-punned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditAllowance {
    Unlimited,
    Count(u32),
}

impl CreditAllowance {
    /// Whether `n` uploads fit within this allowance
    pub fn allows(&self, n: u32) -> bool {
        match self {
            CreditAllowance::Unlimited => true,
            CreditAllowance::Count(limit) => n <= *limit,
        }
    }
}

impl Serialize for CreditAllowance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CreditAllowance::Unlimited => serializer.serialize_str("Unlimited"),
            CreditAllowance::Count(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for CreditAllowance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Ok(CreditAllowance::Count(n)),
            Repr::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(CreditAllowance::Unlimited),
            Repr::Text(s) => Err(de::Error::custom(format!(
                "unknown credit allowance '{}'",
                s
            ))),
        }
    }
}

/// One paid tier as served by the pricing data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTier {
    pub id: String,
    pub name: String,
    /// Monthly price in whole currency units, matching the wire format
    pub price: f64,
    /// Bet uploads included per month
    #[serde(rename = "betUploadCredits")]
    pub bet_upload_credits: CreditAllowance,
}
