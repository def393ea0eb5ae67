//! Verification of Shopify's OAuth callback signature.
//!
//! Shopify signs the callback query string with the app secret: every
//! parameter except `hmac` and `signature` is rendered as `key=value`, the
//! pairs are sorted and joined with `&`, and the hex-encoded HMAC-SHA256 of
//! that message is sent as `hmac`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build the signed message from decoded query pairs.
#[must_use]
pub fn signing_message<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut parts: Vec<String> = pairs
        .into_iter()
        .filter(|(key, _)| *key != "hmac" && *key != "signature")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    parts.sort();
    parts.join("&")
}

/// Verify the `hmac` parameter of a raw callback query string.
///
/// Returns `false` when the parameter is missing, is not hex, or does not
/// match. The comparison is constant-time.
#[must_use]
pub fn verify_query(raw_query: &str, secret: &str) -> bool {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw_query.as_bytes())
        .into_owned()
        .collect();

    let Some(provided) = pairs
        .iter()
        .find(|(key, _)| key == "hmac")
        .map(|(_, value)| value.as_str())
    else {
        return false;
    };

    let Ok(expected) = hex::decode(provided) else {
        return false;
    };

    let message = signing_message(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Hex-encoded signature of `message`. Used to sign test callbacks.
#[must_use]
pub fn sign(message: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
