// Offer evaluation: accept / counter / reject against a popularity-driven threshold.
// Pure and stateless. Each call stands alone even when the UI presents a conversation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::format_price;
use crate::error::{Result, StorefrontError};
use crate::types::*;

/// Offers at or above this share of list price are accepted outright.
const ACCEPT_RATIO: f64 = 0.98;
/// Below this share of list price an offer is "too low".
const TOO_LOW_RATIO: f64 = 0.5;
const SUGGESTED_MINIMUM_RATIO: f64 = 0.75;
const DEMAND_FLOOR: f64 = 0.6;
const POPULARITY_SCALE: f64 = 30.0;

pub const COUNTER_NOTE: &str = "or we can include free shipping";

/// Why an offer was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    TooLow,
    BelowExpectedRange,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooLow => f.write_str("too low"),
            RejectReason::BelowExpectedRange => f.write_str("below expected range"),
        }
    }
}

/// Seller's answer to an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Decision {
    Accepted {
        final_price: f64,
    },
    Countered {
        counter_price: Price,
        note: String,
    },
    Rejected {
        reason: RejectReason,
        suggested_minimum: Price,
    },
}

impl Decision {
    /// The seller's chat line for this decision.
    pub fn seller_message(&self, offer: f64, currency: &str) -> String {
        match self {
            Decision::Accepted { final_price } => format!(
                "Accepted ✅ — order placed at {}",
                format_price(currency, *final_price)
            ),
            Decision::Countered {
                counter_price,
                note,
            } => format!(
                "I'd accept {} — {}. Accept?",
                format_price(currency, counter_price.as_f64()),
                note
            ),
            Decision::Rejected {
                reason,
                suggested_minimum,
            } => format!(
                "Sorry, offer {} is {}. Suggested minimum {}",
                format_price(currency, offer),
                reason,
                format_price(currency, suggested_minimum.as_f64())
            ),
        }
    }
}

/// Higher popularity compresses the acceptable discount band toward list price.
pub fn demand_factor(popularity: u32) -> f64 {
    (1.0 - popularity as f64 / POPULARITY_SCALE).max(DEMAND_FLOOR)
}

/// Lowest offer the seller will counter instead of rejecting.
pub fn acceptable_price(product: &Product) -> Price {
    let factor = demand_factor(product.popularity);
    let ratio = 0.9 - (factor - DEMAND_FLOOR) / 2.0;
    Price::new(round_half_up(product.price.as_f64() * ratio))
}

/// Evaluate an offer. Boundary values resolve to the earlier branch.
pub fn evaluate(product: &Product, offer: f64) -> Result<Decision> {
    if !offer.is_finite() || offer <= 0.0 {
        return Err(StorefrontError::invalid_input("Enter a valid offer"));
    }

    let price = product.price.as_f64();
    let acceptable = acceptable_price(product);

    let decision = if offer >= price * ACCEPT_RATIO {
        Decision::Accepted { final_price: offer }
    } else if offer >= acceptable.as_f64() {
        Decision::Countered {
            counter_price: Price::new(round_half_up((offer + price) / 2.0)),
            note: COUNTER_NOTE.to_string(),
        }
    } else {
        let reason = if offer < price * TOO_LOW_RATIO {
            RejectReason::TooLow
        } else {
            RejectReason::BelowExpectedRange
        };
        Decision::Rejected {
            reason,
            suggested_minimum: Price::new(round_half_up(price * SUGGESTED_MINIMUM_RATIO)),
        }
    };

    tracing::debug!(
        product_id = product.id.as_u32(),
        offer,
        acceptable = acceptable.amount(),
        ?decision,
        "offer evaluated"
    );

    Ok(decision)
}

/// Parse the offer text box. Blank, non-numeric, and non-positive input is rejected.
pub fn parse_offer(text: &str) -> Result<f64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| StorefrontError::invalid_input("Enter a valid offer"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(StorefrontError::invalid_input("Enter a valid offer"));
    }
    Ok(value)
}

/// Opening line shown when a negotiation starts.
pub fn negotiation_tip() -> &'static str {
    "Negotiation started. Tip: offer between 70%–95% of listed price depending on supply/demand."
}

fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor().max(0.0) as u64
}
