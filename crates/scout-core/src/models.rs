//! Strict entities produced from marketplace responses
//!
//! Everything in here has already been through [`crate::normalize`]; no
//! untyped JSON survives past that point.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Wallet Identifier
// =============================================================================

/// A wallet found in user input.
///
/// When `secret` is present, `address` is the public key derived from it.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletIdentifier {
    address: String,
    secret: Option<String>,
}

impl WalletIdentifier {
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: None,
        }
    }

    /// Only the classifier builds these, after deriving `address` from `secret`.
    pub(crate) fn from_secret(address: String, secret: String) -> Self {
        Self {
            address,
            secret: Some(secret),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The base58 secret key exactly as the user sent it
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

impl fmt::Debug for WalletIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletIdentifier")
            .field("address", &self.address)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// Activity
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    BuyNow,
    ExecuteSale,
    AcceptOffer,
    List,
    Delist,
    PlaceOffer,
    Other(String),
}

impl ActivityKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "buyNow" => ActivityKind::BuyNow,
            "executeSale" => ActivityKind::ExecuteSale,
            "acceptOffer" => ActivityKind::AcceptOffer,
            "list" => ActivityKind::List,
            "delist" => ActivityKind::Delist,
            "placeOffer" => ActivityKind::PlaceOffer,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    /// Kinds that count towards a wallet's trading history
    pub fn is_trading(&self) -> bool {
        matches!(
            self,
            ActivityKind::BuyNow
                | ActivityKind::ExecuteSale
                | ActivityKind::AcceptOffer
                | ActivityKind::List
                | ActivityKind::PlaceOffer
        )
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::BuyNow => write!(f, "buyNow"),
            ActivityKind::ExecuteSale => write!(f, "executeSale"),
            ActivityKind::AcceptOffer => write!(f, "acceptOffer"),
            ActivityKind::List => write!(f, "list"),
            ActivityKind::Delist => write!(f, "delist"),
            ActivityKind::PlaceOffer => write!(f, "placeOffer"),
            ActivityKind::Other(label) if label.is_empty() => write!(f, "unknown"),
            ActivityKind::Other(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub price: Option<Decimal>,
    pub token_mint: String,
    pub collection: Option<String>,
    pub signature: Option<String>,
    pub block_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub mint: String,
    pub name: Option<String>,
    pub collection: Option<String>,
    /// Derived from any of the upstream "for sale" signals
    pub listed: bool,
    pub price: Option<Decimal>,
}

// =============================================================================
// Offers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Active,
    Cancelled,
    Expired,
    Rejected,
    /// Missing or unrecognised upstream value
    Unknown,
}

impl OfferStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "active" | "open" | "valid" => OfferStatus::Active,
            "cancelled" | "canceled" => OfferStatus::Cancelled,
            "expired" => OfferStatus::Expired,
            "rejected" => OfferStatus::Rejected,
            _ => OfferStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferStatus::Cancelled | OfferStatus::Expired | OfferStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub token_mint: String,
    /// Token or collection name, for display only
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub status: OfferStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Report
// =============================================================================

/// One of the five independent upstream data categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    Activity,
    Tokens,
    Escrow,
    OffersMade,
    OffersReceived,
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetKind::Activity => write!(f, "activity"),
            FacetKind::Tokens => write!(f, "tokens"),
            FacetKind::Escrow => write!(f, "escrow"),
            FacetKind::OffersMade => write!(f, "offers_made"),
            FacetKind::OffersReceived => write!(f, "offers_received"),
        }
    }
}

/// The merged view of one wallet. Built fresh per check and never cached.
#[derive(Debug, Clone, Serialize)]
pub struct WalletReport {
    pub address: String,
    pub trading_count: usize,
    /// Most recent trading records first, bounded
    pub recent_activity: Vec<ActivityRecord>,
    /// Unique by mint
    pub listed_tokens: Vec<TokenHolding>,
    pub escrow_balance: Decimal,
    pub offers_made: Vec<Offer>,
    pub offers_made_total: Decimal,
    pub offers_received: Vec<Offer>,
    pub offers_received_total: Decimal,
    /// Facets that fell back to their default value
    pub degraded: Vec<FacetKind>,
    pub checked_at: DateTime<Utc>,
}

impl WalletReport {
    pub fn has_trading(&self) -> bool {
        self.trading_count > 0
    }

    pub fn listed_count(&self) -> usize {
        self.listed_tokens.len()
    }

    pub fn offers_made_count(&self) -> usize {
        self.offers_made.len()
    }

    pub fn offers_received_count(&self) -> usize {
        self.offers_received.len()
    }

    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}
