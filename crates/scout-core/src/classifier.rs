//! Input classification
//!
//! Turns free-form chat text into wallet identifiers. A line can hold any
//! number of public addresses, or be a base58 secret key on its own. Both
//! checks run on every line, so one line may yield several identifiers.

use ed25519_dalek::SigningKey;

use crate::models::WalletIdentifier;

pub const MIN_ADDRESS_LEN: usize = 32;
pub const MAX_ADDRESS_LEN: usize = 44;

/// Solana keypair: 32 byte seed followed by the 32 byte public key
const SECRET_KEY_LEN: usize = 64;

/// Classify text, falling back to the whole-text path when no line matched.
///
/// An empty result means the input held nothing usable.
pub fn classify_text(text: &str) -> Vec<WalletIdentifier> {
    let found = classify(text);
    if !found.is_empty() {
        return found;
    }
    classify_single(text).into_iter().collect()
}

/// Scan every non-empty line for addresses and secret keys, in order of appearance.
pub fn classify(text: &str) -> Vec<WalletIdentifier> {
    let mut wallets = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        for address in scan_addresses(line) {
            wallets.push(WalletIdentifier::from_address(address));
        }

        if let Some(wallet) = decode_secret_key(line) {
            wallets.push(wallet);
        }
    }

    tracing::debug!(count = wallets.len(), "Classified input lines");
    wallets
}

/// Treat the whole trimmed text as one candidate: secret key first, then a bare address.
pub fn classify_single(text: &str) -> Option<WalletIdentifier> {
    let candidate = text.trim();
    if candidate.is_empty() {
        return None;
    }

    if let Some(wallet) = decode_secret_key(candidate) {
        return Some(wallet);
    }

    // Length is the only check here; the line scan already rejected anything base58-shaped.
    let len = candidate.chars().count();
    if (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
        return Some(WalletIdentifier::from_address(candidate));
    }

    None
}

pub fn is_base58_char(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

/// Non-overlapping, greedy matches of `[base58]{32,44}`.
fn scan_addresses(line: &str) -> Vec<&str> {
    let mut matches = Vec::new();
    let mut run_start: Option<usize> = None;

    // Base58 is ASCII, so byte offsets from char_indices slice cleanly.
    for (idx, c) in line.char_indices().chain(std::iter::once((line.len(), ' '))) {
        let in_alphabet = idx < line.len() && is_base58_char(c);
        match (in_alphabet, run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                chunk_run(&line[start..idx], &mut matches);
                run_start = None;
            }
            _ => {}
        }
    }

    matches
}

fn chunk_run<'a>(run: &'a str, out: &mut Vec<&'a str>) {
    let mut rest = run;
    while rest.len() >= MIN_ADDRESS_LEN {
        let take = rest.len().min(MAX_ADDRESS_LEN);
        out.push(&rest[..take]);
        rest = &rest[take..];
    }
}

fn decode_secret_key(candidate: &str) -> Option<WalletIdentifier> {
    let bytes = bs58::decode(candidate).into_vec().ok()?;
    let keypair: [u8; SECRET_KEY_LEN] = bytes.try_into().ok()?;

    // Rejects blobs whose trailing half is not the key derived from the seed.
    let signing_key = match SigningKey::from_keypair_bytes(&keypair) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!(error = %e, "64-byte input is not a valid keypair");
            return None;
        }
    };

    let address = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
    Some(WalletIdentifier::from_secret(address, candidate.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "9sBtLtMHWT1Srg1Q2wQMifuY6jrt14fPv7CTpyB6aHQE";

    fn keypair_from_seed(seed: [u8; 32]) -> (String, String) {
        let signing_key = SigningKey::from_bytes(&seed);
        let secret = bs58::encode(signing_key.to_keypair_bytes()).into_string();
        let address = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        (secret, address)
    }

    #[test]
    fn test_single_address() {
        let wallets = classify_text(ADDRESS);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address(), ADDRESS);
        assert!(!wallets[0].has_secret());
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(classify_text("").is_empty());
        assert!(classify_text("   \n\t \n").is_empty());
    }

    #[test]
    fn test_addresses_keep_order_and_duplicates() {
        let other = "DRpbCBMxVnDK7maPM5tGv6MvB3v1sRMC86PZ8okm21hy";
        let text = format!("first {ADDRESS}\n\n{other} then {ADDRESS}");
        let wallets = classify(&text);
        let addresses: Vec<&str> = wallets.iter().map(|w| w.address()).collect();
        assert_eq!(addresses, vec![ADDRESS, other, ADDRESS]);
    }

    #[test]
    fn test_short_runs_are_ignored() {
        assert!(classify("hello world 12345").is_empty());
        // 0, O, I and l break a run
        let broken = format!("{}0{}", &ADDRESS[..20], &ADDRESS[20..]);
        assert!(classify(&broken).is_empty());
    }

    #[test]
    fn test_long_run_is_chunked() {
        let run = "2".repeat(70);
        let wallets = classify(&run);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address().len(), MAX_ADDRESS_LEN);

        let run = "3".repeat(90);
        assert_eq!(classify(&run).len(), 2);
    }

    #[test]
    fn test_secret_key_line_yields_derived_address() {
        let (secret, address) = keypair_from_seed([7u8; 32]);
        let wallets = classify(&secret);

        let with_secret: Vec<_> = wallets.iter().filter(|w| w.has_secret()).collect();
        assert_eq!(with_secret.len(), 1);
        assert_eq!(with_secret[0].address(), address);
        assert_eq!(with_secret[0].secret(), Some(secret.as_str()));

        // The key text itself also looks like address-shaped runs
        assert!(wallets.iter().any(|w| !w.has_secret()));
    }

    #[test]
    fn test_mismatched_keypair_is_rejected() {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let mut bytes = signing_key.to_keypair_bytes();
        bytes[63] ^= 0xff;
        let forged = bs58::encode(bytes).into_string();

        assert!(classify(&forged).iter().all(|w| !w.has_secret()));
        assert!(classify_single(&forged).is_none());
    }

    #[test]
    fn test_fallback_accepts_bare_length() {
        // Not base58 (contains 0 and l) but of address length
        let candidate = "0l0l0l0l0l0l0l0l0l0l0l0l0l0l0l0l0l";
        assert!(classify(candidate).is_empty());
        let wallets = classify_text(candidate);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address(), candidate);
    }

    #[test]
    fn test_fallback_rejects_wrong_length() {
        assert!(classify_single("too short").is_none());
        assert!(classify_text(&"0".repeat(45)).is_empty());
    }
}
