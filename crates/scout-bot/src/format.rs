//! Telegram Markdown rendering
//!
//! Uses the legacy `Markdown` parse mode, so only `_`, `*`, `` ` `` and `[`
//! need escaping in free text coming from the marketplace.

use rust_decimal::Decimal;
use scout_core::classifier::is_base58_char;
use scout_core::{ScoutError, WalletIdentifier, WalletReport};

use crate::aggregator::BatchOutcome;

/// Telegram rejects messages longer than this
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Reply keyboard button shown with the usage message
pub const CHECK_BUTTON: &str = "🎯 Check wallet";

const SHORT_ADDRESS_LEN: usize = 12;

pub fn usage_message() -> String {
    let mut msg = String::new();
    msg.push_str("🎯 *Magic Eden Wallet Checker*\n\n");
    msg.push_str("*📝 How to use:*\n");
    msg.push_str("• Send a Solana wallet address\n");
    msg.push_str("• Or send a private key (base58)\n");
    msg.push_str("• Or send text containing several addresses\n\n");
    msg.push_str("*🔍 What gets checked:*\n");
    msg.push_str("✅ Buy and sell activity\n");
    msg.push_str("✅ NFTs currently listed for sale\n");
    msg.push_str("✅ Escrow balance\n");
    msg.push_str("✅ Active offers made and received, with totals\n\n");
    msg.push_str("*⚡ Example:*\n");
    msg.push_str("`9sBtLtMHWT1Srg1Q2wQMifuY6jrt14fPv7CTpyB6aHQE`");
    msg
}

pub fn check_prompt() -> String {
    "📨 Send a wallet address or private key to check.".to_string()
}

pub fn checking_notice() -> String {
    "🔍 Checking wallet...".to_string()
}

pub fn found_wallets_notice(count: usize) -> String {
    format!("🔍 Found {} wallets, checking...", count)
}

pub fn invalid_input() -> String {
    "❌ *No valid addresses found*\nPlease send a valid wallet address or private key".to_string()
}

pub fn check_failed(error: &ScoutError) -> String {
    let reason = match error {
        ScoutError::WalletCheckFailed { reason, .. } => reason.as_str(),
    };
    format!("❌ *Wallet check failed*\n{}", escape_markdown(reason))
}

pub fn unexpected_error() -> String {
    "❌ *Something went wrong while checking*\nPlease try again later".to_string()
}

/// Full report for a single wallet.
pub fn single_report(report: &WalletReport, wallet: &WalletIdentifier) -> String {
    let mut msg = String::new();
    let address = &report.address;

    msg.push_str("🎯 *Wallet check result*\n\n");
    msg.push_str(&format!("📍 *Address:*\n{}\n\n", code(address)));

    if let Some(secret) = wallet.secret() {
        msg.push_str(&format!("🔑 *Private key:*\n{}\n\n", code(secret)));
    }

    msg.push_str("📊 *Results:*\n");
    msg.push_str(&format!(
        "{} *Trading:* {} transactions\n",
        mark(report.has_trading()),
        report.trading_count
    ));
    msg.push_str(&format!(
        "{} *Listed for sale:* {} NFT\n",
        mark(report.listed_count() > 0),
        report.listed_count()
    ));
    msg.push_str(&format!(
        "{} *Escrow balance:* {} SOL\n",
        mark(report.escrow_balance > Decimal::ZERO),
        report.escrow_balance
    ));
    msg.push_str(&format!(
        "{} *Offers made:* {} active ({:.4} SOL)\n",
        mark(report.offers_made_count() > 0),
        report.offers_made_count(),
        report.offers_made_total
    ));
    msg.push_str(&format!(
        "{} *Offers received:* {} active ({:.4} SOL)\n",
        mark(report.offers_received_count() > 0),
        report.offers_received_count(),
        report.offers_received_total
    ));
    msg.push('\n');

    if !report.degraded.is_empty() {
        let facets: Vec<String> = report.degraded.iter().map(|f| f.to_string()).collect();
        msg.push_str(&format!(
            "⚠️ _Marketplace did not answer for: {}_\n\n",
            escape_markdown(&facets.join(", "))
        ));
    }

    if !report.recent_activity.is_empty() {
        msg.push_str("📈 *Recent activity:*\n");
        for (i, record) in report.recent_activity.iter().enumerate() {
            msg.push_str(&format!(
                "{}. {} - {}\n",
                i + 1,
                escape_markdown(&record.kind.to_string()),
                price_or_na(record.price)
            ));
        }
        msg.push('\n');
    }

    if !report.listed_tokens.is_empty() {
        msg.push_str(&format!("🖼️ *Listed NFTs ({}):*\n", report.listed_count()));
        for (i, token) in report.listed_tokens.iter().enumerate() {
            let name = token.name.as_deref().unwrap_or("Unknown");
            msg.push_str(&format!(
                "{}. {} - {}\n",
                i + 1,
                escape_markdown(name),
                price_or_na(token.price)
            ));
        }
        msg.push('\n');
    }

    if !report.offers_made.is_empty() {
        msg.push_str(&format!("💰 *Offers made ({}):*\n", report.offers_made_count()));
        push_offers(&mut msg, &report.offers_made);
        msg.push_str(&format!("*Total: {:.4} SOL*\n\n", report.offers_made_total));
    }

    if !report.offers_received.is_empty() {
        msg.push_str(&format!("💎 *Offers received ({}):*\n", report.offers_received_count()));
        push_offers(&mut msg, &report.offers_received);
        msg.push_str(&format!("*Total: {:.4} SOL*\n\n", report.offers_received_total));
    }

    // Fallback input can be arbitrary text; only real addresses become links
    if address.chars().all(is_base58_char) {
        msg.push_str("🔗 *Quick links:*\n");
        msg.push_str(&format!("[View on Magic Eden](https://magiceden.io/u/{})\n", address));
        msg.push_str(&format!("[View on Solscan](https://solscan.io/account/{})\n\n", address));
    }

    msg.push_str(&format!(
        "⏰ *Checked at:* {}",
        report.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    msg
}

/// One compact block per checked wallet, plus a notice when the batch was cut short.
pub fn batch_summary(outcome: &BatchOutcome) -> String {
    let mut msg = String::new();
    msg.push_str(&format!("🎯 *Results for {} wallets*\n\n", outcome.total));

    for (i, entry) in outcome.entries.iter().enumerate() {
        let short = short_address(entry.wallet.address());
        match &entry.result {
            Ok(report) => {
                msg.push_str(&format!("📍 *Wallet {}:* {}\n", i + 1, code(&format!("{}...", short))));
                msg.push_str(&format!(
                    "🔄 Trading: {} | 🖼️ Listed: {} | 💰 Escrow: {} SOL\n",
                    report.trading_count,
                    report.listed_count(),
                    report.escrow_balance
                ));
                msg.push_str(&format!(
                    "📤 Offers: {} ({:.2} SOL) | 📥 Received: {} ({:.2} SOL)\n",
                    report.offers_made_count(),
                    report.offers_made_total,
                    report.offers_received_count(),
                    report.offers_received_total
                ));
                if !report.is_complete() {
                    msg.push_str("⚠️ _partial data_\n");
                }
                msg.push('\n');
            }
            Err(_) => {
                msg.push_str(&format!(
                    "📍 *Wallet {}:* {} - ❌ error\n\n",
                    i + 1,
                    code(&format!("{}...", short))
                ));
            }
        }
    }

    if outcome.is_truncated() {
        msg.push_str(&format!(
            "📝 *Note:* showing the first {} of {} wallets ({} not checked)",
            outcome.entries.len(),
            outcome.total,
            outcome.skipped()
        ));
    }

    msg.trim_end().to_string()
}

/// Split on line boundaries so each part fits in one Telegram message.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        let needed = if current.is_empty() { line.len() } else { current.len() + 1 + line.len() };
        if needed > limit && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }

        if line.len() > limit {
            // A single overlong line is cut on char boundaries
            let mut chunk = String::new();
            for c in line.chars() {
                if chunk.len() + c.len_utf8() > limit {
                    parts.push(std::mem::take(&mut chunk));
                }
                chunk.push(c);
            }
            current = chunk;
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inline code entity, or escaped plain text when a backtick would break it
fn code(text: &str) -> String {
    if text.contains('`') {
        escape_markdown(text)
    } else {
        format!("`{}`", text)
    }
}

fn push_offers(msg: &mut String, offers: &[scout_core::Offer]) {
    for (i, offer) in offers.iter().enumerate() {
        let name = offer.name.as_deref().unwrap_or("Unknown");
        msg.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            escape_markdown(name),
            price_or_na(offer.price)
        ));
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

fn price_or_na(price: Option<Decimal>) -> String {
    match price {
        Some(p) => format!("{} SOL", p.normalize()),
        None => "N/A".to_string(),
    }
}

fn short_address(address: &str) -> &str {
    match address.char_indices().nth(SHORT_ADDRESS_LEN) {
        Some((idx, _)) => &address[..idx],
        None => address,
    }
}
