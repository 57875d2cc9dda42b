use std::fmt;

use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ACCESS_KEY: &str = "ACCESS-KEY";
pub const HEADER_ACCESS_TIMESTAMP: &str = "ACCESS-TIMESTAMP";
pub const HEADER_ACCESS_SIGN: &str = "ACCESS-SIGN";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// API key pair used to authenticate private endpoints.
///
/// `Debug` masks both values so the struct can be logged safely.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Lowercase hex HMAC-SHA256 of `payload`, keyed with the API secret.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Builds the signed request for `method` and `path` at `timestamp`.
    ///
    /// `path` must already carry its query string, since the exchange signs
    /// the full request target. `body` is signed and later sent byte for byte.
    pub fn sign_request(
        &self,
        method: Method,
        path: impl Into<String>,
        body: Option<String>,
        timestamp: i64,
    ) -> SignedRequest {
        let path = path.into();
        let timestamp = timestamp.to_string();
        let payload = signing_payload(&timestamp, &method, &path, body.as_deref());
        let signature = self.sign(&payload);
        SignedRequest {
            method,
            path,
            body,
            timestamp,
            signature,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***REDACTED***".to_string()
    }
}

/// `timestamp + method + path + body`, the string the exchange expects signed.
pub fn signing_payload(timestamp: &str, method: &Method, path: &str, body: Option<&str>) -> String {
    format!(
        "{}{}{}{}",
        timestamp,
        method.as_str(),
        path,
        body.unwrap_or_default()
    )
}

/// A request that has been timestamped and signed but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub timestamp: String,
    pub signature: String,
}

impl SignedRequest {
    pub fn headers<'a>(&'a self, credentials: &'a Credentials) -> [(&'static str, &'a str); 4] {
        [
            (HEADER_ACCESS_KEY, credentials.api_key()),
            (HEADER_ACCESS_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_ACCESS_SIGN, self.signature.as_str()),
            ("Content-Type", CONTENT_TYPE_JSON),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("test-key", "test-secret")
    }

    #[test]
    fn known_hmac_vector() {
        let creds = Credentials::new("unused", "key");
        assert_eq!(
            creds.sign("The quick brown fox jumps over the lazy dog"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn payload_concatenates_parts() {
        let get = signing_payload("1700000000", &Method::GET, "/v1/me/getbalance", None);
        assert_eq!(get, "1700000000GET/v1/me/getbalance");

        let post = signing_payload(
            "1700000000",
            &Method::POST,
            "/v1/me/sendchildorder",
            Some(r#"{"size":0.02}"#),
        );
        assert_eq!(post, r#"1700000000POST/v1/me/sendchildorder{"size":0.02}"#);
    }

    #[test]
    fn signing_is_deterministic() {
        let a = creds().sign_request(Method::GET, "/v1/me/getbalance", None, 1_700_000_000);
        let b = creds().sign_request(Method::GET, "/v1/me/getbalance", None, 1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a.signature.len(), 64);
        assert_eq!(a.timestamp, "1700000000");
    }

    #[test]
    fn every_input_changes_signature() {
        let body = Some(r#"{"price":1230000}"#.to_string());
        let base = creds()
            .sign_request(Method::POST, "/v1/me/sendchildorder", body.clone(), 1)
            .signature;

        let other_secret = Credentials::new("test-key", "other-secret")
            .sign_request(Method::POST, "/v1/me/sendchildorder", body.clone(), 1)
            .signature;
        let other_ts = creds()
            .sign_request(Method::POST, "/v1/me/sendchildorder", body.clone(), 2)
            .signature;
        let other_method = creds()
            .sign_request(Method::GET, "/v1/me/sendchildorder", body.clone(), 1)
            .signature;
        let other_path = creds()
            .sign_request(Method::POST, "/v1/me/getbalance", body, 1)
            .signature;
        let other_body = creds()
            .sign_request(
                Method::POST,
                "/v1/me/sendchildorder",
                Some(r#"{"price":1228000}"#.to_string()),
                1,
            )
            .signature;

        for changed in [other_secret, other_ts, other_method, other_path, other_body] {
            assert_ne!(base, changed);
        }
    }

    #[test]
    fn headers_carry_key_timestamp_and_signature() {
        let creds = creds();
        let request = creds.sign_request(Method::GET, "/v1/me/getbalance", None, 42);
        let headers = request.headers(&creds);
        assert_eq!(headers[0], ("ACCESS-KEY", "test-key"));
        assert_eq!(headers[1], ("ACCESS-TIMESTAMP", "42"));
        assert_eq!(headers[2].0, "ACCESS-SIGN");
        assert_eq!(headers[2].1, request.signature);
        assert_eq!(headers[3], ("Content-Type", "application/json"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", Credentials::new("abcdefghijklmnop", "s3cr3t-value"));
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(!rendered.contains("abcdefghijklmnop"));
        assert!(rendered.contains("abcd...mnop"));
    }
}
