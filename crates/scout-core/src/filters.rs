//! Facet filters and aggregates
//!
//! These run on already-normalized entities and never fail.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{ActivityRecord, Offer, TokenHolding};

/// How many trading records a report keeps for display
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct TradingSummary {
    /// All trading records in the page, not just the retained ones
    pub count: usize,
    pub recent: Vec<ActivityRecord>,
}

/// Offers that are neither cancelled, expired nor in a terminal status.
///
/// Missing and unrecognised statuses count as active.
pub fn filter_active_offers(offers: Vec<Offer>, now: DateTime<Utc>) -> Vec<Offer> {
    offers
        .into_iter()
        .filter(|offer| is_active_offer(offer, now))
        .collect()
}

pub fn is_active_offer(offer: &Offer, now: DateTime<Utc>) -> bool {
    if offer.cancelled_at.is_some() {
        return false;
    }
    if offer.expires_at.is_some_and(|expiry| expiry <= now) {
        return false;
    }
    !offer.status.is_terminal()
}

pub fn filter_listed_tokens(tokens: Vec<TokenHolding>) -> Vec<TokenHolding> {
    tokens.into_iter().filter(|token| token.listed).collect()
}

/// Trading records in upstream order (newest first), with the first `limit` retained.
pub fn filter_trading_activity(activity: &[ActivityRecord], limit: usize) -> TradingSummary {
    let trading: Vec<&ActivityRecord> = activity.iter().filter(|r| r.kind.is_trading()).collect();

    TradingSummary {
        count: trading.len(),
        recent: trading.into_iter().take(limit).cloned().collect(),
    }
}

/// Sum of offer prices; offers without a readable price add nothing.
///
/// Saturates at `Decimal::MAX` instead of overflowing.
pub fn sum_offer_value(offers: &[Offer]) -> Decimal {
    offers
        .iter()
        .filter_map(|offer| offer.price)
        .fold(Decimal::ZERO, |total, price| {
            total.checked_add(price).unwrap_or(Decimal::MAX)
        })
}

/// Concatenate listing sources, keeping the first holding seen for each mint.
pub fn merge_listings<I>(sources: I) -> Vec<TokenHolding>
where
    I: IntoIterator<Item = Vec<TokenHolding>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for token in sources.into_iter().flatten() {
        if seen.insert(token.mint.clone()) {
            merged.push(token);
        } else {
            tracing::trace!(mint = %token.mint, "Dropping duplicate listing");
        }
    }

    merged
}
