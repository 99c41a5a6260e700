//! OAuth 1.0a request signing (HMAC-SHA1 only).
//!
//! Parameters are percent-encoded exactly once, here, so callers always hand
//! over raw keys and values.

use crate::config::Credentials;
use crate::twitter::error::{ApiError, ApiResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use std::collections::HashMap;
use url::Url;

pub type Params = HashMap<String, String>;

/// Everything outside the RFC 3986 unreserved set.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";
const NONCE_BYTES: usize = 32;

pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, UNRESERVED).to_string()
}

/// `key=value&...` in map order, for the request URL.
pub fn query_string(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sorted, encoded parameter string used inside the signature base string.
pub fn signature_parameter_string(params: &Params) -> String {
    let mut pairs = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn generate_nonce() -> ApiResult<String> {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(ApiError::Nonce)?;
    let mut nonce = BASE64.encode(bytes);
    nonce.retain(|c| c.is_ascii_alphanumeric());
    Ok(nonce)
}

/// Signs requests on behalf of one set of credentials.
pub struct OAuthSigner<'a> {
    credentials: &'a Credentials,
}

impl<'a> OAuthSigner<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Base64 HMAC-SHA1 signature for one request.
    ///
    /// `endpoint` may carry a query string; it is dropped before signing
    /// since the same parameters are passed in `params`.
    pub fn signature(
        &self,
        method: &str,
        endpoint: &str,
        params: &Params,
        nonce: &str,
        timestamp: &str,
    ) -> ApiResult<String> {
        let base_string = self.base_string(method, endpoint, params, nonce, timestamp)?;
        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.access_token_secret)
        );
        // HMAC takes keys of any length, so this only fails if that changes
        let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| ApiError::SigningKey(e.to_string()))?;
        mac.update(base_string.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    pub fn base_string(
        &self,
        method: &str,
        endpoint: &str,
        params: &Params,
        nonce: &str,
        timestamp: &str,
    ) -> ApiResult<String> {
        let mut all = params.clone();
        all.insert("oauth_consumer_key".into(), self.credentials.consumer_key.clone());
        all.insert("oauth_nonce".into(), nonce.into());
        all.insert("oauth_signature_method".into(), SIGNATURE_METHOD.into());
        all.insert("oauth_timestamp".into(), timestamp.into());
        all.insert("oauth_token".into(), self.credentials.access_token.clone());
        all.insert("oauth_version".into(), VERSION.into());

        Ok(format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(&base_url(endpoint)?),
            percent_encode(&signature_parameter_string(&all))
        ))
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(
        &self,
        method: &str,
        endpoint: &str,
        params: &Params,
        nonce: &str,
        timestamp: &str,
    ) -> ApiResult<String> {
        let signature = self.signature(method, endpoint, params, nonce, timestamp)?;
        let fields = [
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature", signature.as_str()),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", VERSION),
        ];
        let header = fields
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {header}"))
    }
}

fn base_url(endpoint: &str) -> ApiResult<String> {
    let mut url = Url::parse(endpoint).map_err(|e| ApiError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}
