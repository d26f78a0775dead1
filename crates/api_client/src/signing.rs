//! Management API request signing.
//!
//! The platform authenticates a request by recomputing an HMAC-SHA1 over its
//! query string: parameters sorted by lower-cased name, values
//! percent-encoded, the whole string lower-cased. The base64 digest travels
//! as the `signature` parameter.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters pass through; everything else is `%XX`.
/// Spaces become `%20`, never `+`.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

/// `key=value` pairs sorted by lower-cased key and joined with `&`.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| k.to_lowercase());
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 of the lower-cased query.
pub fn signature(query: &str, secret_key: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha1::new_from_slice(secret_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC key length is unrestricted"),
    };
    mac.update(query.to_lowercase().as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Full signed query string for `command`, ready to append after `?`.
///
/// Adds `apiKey`, `command` and `response=json` to `params`.
pub fn signed_query(command: &str, params: &[(&str, &str)], api_key: &str, secret_key: &str) -> String {
    let mut all: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    all.push(("apiKey".to_string(), api_key.to_string()));
    all.push(("command".to_string(), command.to_string()));
    all.push(("response".to_string(), "json".to_string()));

    let query = canonical_query(&all);
    let sig = signature(&query, secret_key);
    format!("{}&signature={}", query, percent_encode(&sig))
}
