//! Chef Server request signing (authentication protocol version 1.3).
//!
//! Every API request carries a canonical description of itself signed with the
//! client's RSA private key:
//!
//! ```text
//! Method:GET
//! Path:/organizations/acme/cookbooks
//! X-Ops-Content-Hash:{base64(sha256(body))}
//! X-Ops-Sign:version=1.3
//! X-Ops-Timestamp:2024-01-01T00:00:00Z
//! X-Ops-UserId:bodega
//! X-Ops-Server-API-Version:0
//! ```
//!
//! The RSASSA-PKCS1-v1_5 (SHA-256) signature is base64 encoded and split
//! across `X-Ops-Authorization-N` headers of at most 60 characters each.

use crate::error::{ErrorKind, Result};
use data_encoding::BASE64;
use exn::ResultExt;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use sha2::{Digest, Sha256};
use time::UtcDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub const SIGN_VERSION: &str = "1.3";
/// API version 0 is the one that still groups cookbook files into segments.
pub const SERVER_API_VERSION: &str = "0";
/// Protocol version advertised to the server.
pub const CHEF_VERSION: &str = "12.0.0";
const AUTHORIZATION_LINE_WIDTH: usize = 60;

/// Signs Chef Server API requests on behalf of one client.
pub struct Signer {
    client_name: String,
    key: SigningKey<Sha256>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("Signer").field("client_name", &self.client_name).finish_non_exhaustive()
    }
}

impl Signer {
    /// Parse a PEM-encoded RSA private key (PKCS#1 `RSA PRIVATE KEY`, as
    /// issued by Chef Server, or PKCS#8 `PRIVATE KEY`).
    pub fn from_pem(client_name: impl Into<String>, pem: &str) -> Result<Self> {
        let key = match RsaPrivateKey::from_pkcs1_pem(pem) {
            Ok(key) => key,
            Err(_) => RsaPrivateKey::from_pkcs8_pem(pem)
                .or_raise(|| ErrorKind::Credentials("not a PEM encoded RSA private key".to_string()))?,
        };
        Ok(Self { client_name: client_name.into(), key: SigningKey::<Sha256>::new(key) })
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Headers authenticating a request made right now.
    pub fn sign(&self, method: &str, path: &str, body: &[u8]) -> Result<Vec<(String, String)>> {
        self.sign_at(method, path, body, UtcDateTime::now())
    }

    /// Headers authenticating a request made at `at`.
    pub fn sign_at(&self, method: &str, path: &str, body: &[u8], at: UtcDateTime) -> Result<Vec<(String, String)>> {
        let timestamp = format_timestamp(at)?;
        let content_hash = BASE64.encode(&Sha256::digest(body));
        let canonical = canonical_request(method, path, &content_hash, &timestamp, &self.client_name);
        let signature = self.key.try_sign(canonical.as_bytes()).or_raise(|| ErrorKind::Signing)?;
        let encoded = BASE64.encode(&signature.to_bytes());

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Chef-Version".to_string(), CHEF_VERSION.to_string()),
            ("X-Ops-Sign".to_string(), format!("algorithm=sha256;version={SIGN_VERSION}")),
            ("X-Ops-UserId".to_string(), self.client_name.clone()),
            ("X-Ops-Timestamp".to_string(), timestamp),
            ("X-Ops-Content-Hash".to_string(), content_hash),
            ("X-Ops-Server-API-Version".to_string(), SERVER_API_VERSION.to_string()),
        ];
        // Base64 is pure ASCII, so byte chunks are always valid UTF-8.
        for (index, line) in encoded.as_bytes().chunks(AUTHORIZATION_LINE_WIDTH).enumerate() {
            headers.push((format!("X-Ops-Authorization-{}", index + 1), String::from_utf8_lossy(line).into_owned()));
        }
        Ok(headers)
    }
}

/// Chef ignores repeated and trailing slashes when comparing paths.
fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn canonical_request(method: &str, path: &str, content_hash: &str, timestamp: &str, user: &str) -> String {
    format!(
        "Method:{}\nPath:{}\nX-Ops-Content-Hash:{}\nX-Ops-Sign:version={}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{}\nX-Ops-Server-API-Version:{}",
        method.to_uppercase(),
        canonical_path(path),
        content_hash,
        SIGN_VERSION,
        timestamp,
        user,
        SERVER_API_VERSION,
    )
}

/// RFC 3339 at whole-second precision, which is what the server compares.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

fn format_timestamp(at: UtcDateTime) -> Result<String> {
    at.format(TIMESTAMP_FORMAT).or_raise(|| ErrorKind::Signing)
}
