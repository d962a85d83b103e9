//! Report assembly
//!
//! Combines the five normalized facets of one wallet into a [`WalletReport`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::filters::{
    filter_active_offers, filter_listed_tokens, filter_trading_activity, merge_listings,
    sum_offer_value,
};
use crate::models::{ActivityRecord, FacetKind, Offer, TokenHolding, WalletReport};

/// Normalized facet values for one wallet, before filtering
#[derive(Debug, Clone, Default)]
pub struct FacetData {
    pub activity: Vec<ActivityRecord>,
    pub tokens: Vec<TokenHolding>,
    pub escrow_balance: Decimal,
    pub offers_made: Vec<Offer>,
    pub offers_received: Vec<Offer>,
    /// Facets whose value above is a fallback default
    pub degraded: Vec<FacetKind>,
}

pub fn assemble(
    address: &str,
    data: FacetData,
    recent_limit: usize,
    now: DateTime<Utc>,
) -> WalletReport {
    let trading = filter_trading_activity(&data.activity, recent_limit);
    let listed_tokens = merge_listings([filter_listed_tokens(data.tokens)]);

    let offers_made = filter_active_offers(data.offers_made, now);
    let offers_received = filter_active_offers(data.offers_received, now);
    let offers_made_total = sum_offer_value(&offers_made);
    let offers_received_total = sum_offer_value(&offers_received);

    tracing::debug!(
        wallet = %address,
        trading_count = trading.count,
        listed = listed_tokens.len(),
        offers_made = offers_made.len(),
        offers_received = offers_received.len(),
        degraded = data.degraded.len(),
        "Assembled wallet report"
    );

    WalletReport {
        address: address.to_string(),
        trading_count: trading.count,
        recent_activity: trading.recent,
        listed_tokens,
        escrow_balance: data.escrow_balance.max(Decimal::ZERO),
        offers_made,
        offers_made_total,
        offers_received,
        offers_received_total,
        degraded: data.degraded,
        checked_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_assemble_full_report() {
        let data = FacetData {
            activity: normalize::activity_records(&json!([
                {"type": "buyNow", "price": 2, "tokenMint": "A"},
                {"type": "delist", "tokenMint": "B"},
                {"type": "list", "price": 3, "tokenMint": "C"}
            ])),
            tokens: normalize::token_holdings(&json!([
                {"mintAddress": "C", "listStatus": "listed", "price": 3},
                {"mintAddress": "C", "listed": true, "name": "dupe"},
                {"mintAddress": "D"}
            ])),
            escrow_balance: dec!(0.5),
            offers_made: normalize::offers(&json!([
                {"tokenMint": "X", "price": 1.5, "status": "active"},
                {"tokenMint": "Y", "price": 9, "status": "expired"}
            ])),
            offers_received: vec![],
            degraded: vec![FacetKind::OffersReceived],
        };

        let report = assemble("wallet", data, 5, Utc::now());
        assert_eq!(report.address, "wallet");
        assert_eq!(report.trading_count, 2);
        assert_eq!(report.recent_activity.len(), 2);
        assert_eq!(report.listed_count(), 1);
        assert_eq!(report.listed_tokens[0].name, None);
        assert_eq!(report.escrow_balance, dec!(0.5));
        assert_eq!(report.offers_made_count(), 1);
        assert_eq!(report.offers_made_total, dec!(1.5));
        assert_eq!(report.offers_received_total, Decimal::ZERO);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_assemble_empty_facets() {
        let report = assemble("wallet", FacetData::default(), 5, Utc::now());
        assert!(!report.has_trading());
        assert_eq!(report.listed_count(), 0);
        assert_eq!(report.escrow_balance, Decimal::ZERO);
        assert!(report.is_complete());
    }

    #[test]
    fn test_totals_match_kept_offers() {
        let offers = normalize::offers(&json!([
            {"tokenMint": "a", "price": "0.3"},
            {"tokenMint": "b", "price": 0.2, "cancelledAt": 1_600_000_000},
            {"tokenMint": "c"}
        ]));
        let data = FacetData {
            offers_received: offers,
            ..FacetData::default()
        };
        let report = assemble("wallet", data, 5, Utc::now());
        assert_eq!(report.offers_received_count(), 2);
        assert_eq!(report.offers_received_total, sum_offer_value(&report.offers_received));
        assert_eq!(report.offers_received_total, dec!(0.3));
    }
}
