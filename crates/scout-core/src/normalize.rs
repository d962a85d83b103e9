//! Marketplace JSON normalization
//!
//! Magic Eden responses are not contractually fixed: fields move between
//! names, prices arrive as numbers or strings, and the escrow endpoint returns
//! either a bare number or an object. Each function here takes the raw
//! `serde_json::Value` and returns strict entities, dropping anything that
//! cannot be interpreted instead of failing.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde_json::{Map, Value};

use crate::models::{ActivityKind, ActivityRecord, Offer, OfferStatus, TokenHolding};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: Decimal = dec!(1000000000);

/// Escrow amounts at or above this are assumed to be lamports
pub const LAMPORT_THRESHOLD: Decimal = dec!(1000000);

/// Field names the escrow endpoint has been seen to use for the amount
const ESCROW_FIELDS: &[&str] = &[
    "sol",
    "balance",
    "amount",
    "escrowBalance",
    "escrow_balance",
    "value",
];

/// Numeric timestamps above this are milliseconds
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

// ============================================================================
// Scalar coercion
// ============================================================================

/// Numbers and numeric strings become decimals; everything else is `None`.
pub fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal_str(&n.to_string()),
        Value::String(s) => parse_decimal_str(s.trim()),
        _ => None,
    }
}

fn parse_decimal_str(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
        .map(|d| d.normalize())
}

/// RFC 3339 strings, numeric strings or numbers (seconds, or millis when huge).
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<f64>().ok().and_then(epoch_to_datetime)
        }
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    }
}

fn epoch_to_datetime(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let raw = raw as i64;
    if raw > MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// First non-empty string among `keys`
fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty_str(obj.get(*key)))
}

/// First field among `keys` that coerces to a decimal
fn first_decimal(obj: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| obj.get(*key).and_then(coerce_decimal))
}

fn first_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(coerce_timestamp))
}

fn is_true(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(Value::Bool(true)))
}

/// `name` on a nested object such as `token` or `collection`
fn nested_name(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_object)
        .and_then(|inner| non_empty_str(inner.get("name")))
}

/// Objects of a top-level array. Anything else yields nothing.
fn objects(payload: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    let items: &[Value] = match payload {
        Value::Array(items) => items,
        other => {
            if !other.is_null() {
                tracing::debug!("Expected an array payload, treating as empty");
            }
            &[]
        }
    };
    items.iter().filter_map(Value::as_object)
}

// ============================================================================
// Activity
// ============================================================================

pub fn activity_records(payload: &Value) -> Vec<ActivityRecord> {
    objects(payload).map(activity_record).collect()
}

fn activity_record(obj: &Map<String, Value>) -> ActivityRecord {
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(ActivityKind::from_label)
        .unwrap_or_else(|| ActivityKind::Other(String::new()));

    ActivityRecord {
        kind,
        price: first_decimal(obj, &["price"]),
        token_mint: first_str(obj, &["tokenMint", "mint", "mintAddress"]).unwrap_or_default(),
        collection: first_str(obj, &["collection", "collectionSymbol"]),
        signature: first_str(obj, &["signature"]),
        block_time: first_timestamp(obj, &["blockTime", "timestamp"]),
    }
}

// ============================================================================
// Tokens
// ============================================================================

pub fn token_holdings(payload: &Value) -> Vec<TokenHolding> {
    objects(payload).filter_map(token_holding).collect()
}

fn token_holding(obj: &Map<String, Value>) -> Option<TokenHolding> {
    let Some(mint) = first_str(obj, &["mintAddress", "mint", "tokenMint"]) else {
        tracing::trace!("Dropping token entry without a mint");
        return None;
    };

    let collection = first_str(obj, &["collection", "collectionName"])
        .or_else(|| nested_name(obj, "collection"));

    Some(TokenHolding {
        mint,
        name: first_str(obj, &["name", "title"]),
        collection,
        listed: is_listed_signal(obj),
        price: positive(first_decimal(obj, &["price"]))
            .or_else(|| positive(first_decimal(obj, &["listPrice"]))),
    })
}

/// Any one of the marketplace's "for sale" signals is enough.
pub fn is_listed_signal(obj: &Map<String, Value>) -> bool {
    let status_listed = obj
        .get("listStatus")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("listed"));

    status_listed
        || is_true(obj, "listed")
        || is_true(obj, "onMarket")
        || positive(first_decimal(obj, &["price"])).is_some()
        || positive(first_decimal(obj, &["listPrice"])).is_some()
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|d| d.is_sign_positive() && !d.is_zero())
}

// ============================================================================
// Offers
// ============================================================================

pub fn offers(payload: &Value) -> Vec<Offer> {
    objects(payload).map(offer).collect()
}

fn offer(obj: &Map<String, Value>) -> Offer {
    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .map(OfferStatus::from_label)
        .unwrap_or(OfferStatus::Unknown);

    let name = nested_name(obj, "token")
        .or_else(|| nested_name(obj, "collection"))
        .or_else(|| first_str(obj, &["collectionName", "name"]));

    Offer {
        token_mint: first_str(obj, &["tokenMint", "mint", "mintAddress"]).unwrap_or_default(),
        name,
        price: first_decimal(obj, &["price", "offerPrice"]),
        status,
        cancelled_at: first_timestamp(obj, &["cancelledAt", "canceledAt"]),
        expires_at: first_timestamp(obj, &["expiresAt", "expiry"]),
    }
}

// ============================================================================
// Escrow
// ============================================================================

/// Escrow balance in SOL. Unreadable payloads and negative amounts give zero.
pub fn escrow_balance(payload: &Value) -> Decimal {
    let raw = match payload {
        Value::Object(obj) => first_decimal(obj, ESCROW_FIELDS),
        other => coerce_decimal(other),
    };

    let Some(amount) = raw else {
        tracing::debug!("Escrow payload carried no readable amount");
        return Decimal::ZERO;
    };

    if amount.is_sign_negative() {
        return Decimal::ZERO;
    }

    if amount >= LAMPORT_THRESHOLD {
        (amount / LAMPORTS_PER_SOL).normalize()
    } else {
        amount
    }
}
