//! Volcengine-style V4 request signing (HMAC-SHA256 over a canonical request).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use super::HttpRequest;
use crate::error::{ProviderError, Result};
use crate::models::ProviderId;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";

#[derive(Debug, Clone)]
pub struct V4Signer {
    access_key: String,
    secret_key: String,
    region: String,
    service: String,
}

impl V4Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            service: service.into(),
        }
    }

    /// Adds `X-Date`, `X-Content-Sha256` and `Authorization` to a POST request.
    pub fn sign(&self, request: HttpRequest, now: DateTime<Utc>) -> Result<HttpRequest> {
        let url = Url::parse(&request.url).map_err(|e| {
            ProviderError::request_failed(None, format!("invalid endpoint {}: {}", request.url, e))
        })?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let x_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let short_date = now.format("%Y%m%d").to_string();
        let content_type = request
            .header("content-type")
            .unwrap_or("application/json")
            .to_string();
        let payload_hash = hex::encode(Sha256::digest(&request.body));

        let canonical_request = [
            "POST".to_string(),
            canonical_path(&url),
            canonical_query(&url),
            format!(
                "content-type:{}\nhost:{}\nx-content-sha256:{}\nx-date:{}\n",
                content_type.trim(),
                host,
                payload_hash,
                x_date
            ),
            SIGNED_HEADERS.to_string(),
            payload_hash.clone(),
        ]
        .join("\n");

        let scope = format!("{}/{}/{}/request", short_date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            x_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let mut key = hmac(self.secret_key.as_bytes(), short_date.as_bytes())?;
        for part in [self.region.as_str(), self.service.as_str(), "request"] {
            key = hmac(&key, part.as_bytes())?;
        }
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
        );

        Ok(request
            .with_header("X-Date", x_date)
            .with_header("X-Content-Sha256", payload_hash)
            .with_header("Authorization", authorization))
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| {
        ProviderError::unauthenticated(ProviderId::Jimeng, format!("unusable secret key: {}", e))
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_path(url: &Url) -> String {
    match url.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    fn request() -> HttpRequest {
        HttpRequest::json(
            "https://visual.volcengineapi.com?Action=CVProcess&Version=2022-08-31",
            &json!({ "req_key": "jimeng_t2i_v31" }),
        )
        .unwrap()
    }

    #[test]
    fn test_signature_headers() {
        let signer = V4Signer::new("AKTEST", "secret", "cn-north-1", "cv");
        let signed = signer.sign(request(), fixed_time()).unwrap();

        assert_eq!(signed.header("x-date"), Some("20240501T083000Z"));
        assert_eq!(
            signed.header("x-content-sha256"),
            Some(hex::encode(Sha256::digest(&signed.body)).as_str())
        );

        let auth = signed.header("authorization").unwrap();
        assert!(auth.starts_with(
            "HMAC-SHA256 Credential=AKTEST/20240501/cn-north-1/cv/request, \
             SignedHeaders=content-type;host;x-content-sha256;x-date, Signature="
        ));
        let signature = auth.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_known_signature() {
        let signer = V4Signer::new("AKTEST", "secret", "cn-north-1", "cv");
        let signed = signer.sign(request(), fixed_time()).unwrap();
        let auth = signed.header("authorization").unwrap();
        assert!(auth.ends_with(
            "Signature=6da3255ce0c9c69af8d61b5b955c6343faed63aa30e5f5b626b0841fea8ef272"
        ));
    }

    #[test]
    fn test_signature_depends_on_body_and_secret() {
        let signer = V4Signer::new("AKTEST", "secret", "cn-north-1", "cv");
        let base = signer.sign(request(), fixed_time()).unwrap();
        let again = signer.sign(request(), fixed_time()).unwrap();
        assert_eq!(base.header("authorization"), again.header("authorization"));

        let other_body = HttpRequest::json(
            "https://visual.volcengineapi.com?Action=CVProcess&Version=2022-08-31",
            &json!({ "req_key": "jimeng_t2i_v40" }),
        )
        .unwrap();
        let changed = signer.sign(other_body, fixed_time()).unwrap();
        assert_ne!(base.header("authorization"), changed.header("authorization"));

        let other_secret = V4Signer::new("AKTEST", "another", "cn-north-1", "cv");
        let changed = other_secret.sign(request(), fixed_time()).unwrap();
        assert_ne!(base.header("authorization"), changed.header("authorization"));
    }

    #[test]
    fn test_canonical_query_is_sorted_and_encoded() {
        let url = Url::parse("https://example.com/path?b=2&a=x y&Action=Run").unwrap();
        assert_eq!(canonical_query(&url), "Action=Run&a=x%20y&b=2");
        assert_eq!(canonical_path(&url), "/path");
    }
}
