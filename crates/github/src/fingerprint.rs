//! Canonical request fingerprints.
//!
//! A fingerprint identifies a logical request independent of how its
//! parameters were assembled. It keys both the response cache and the
//! in-flight request map, so two calls that mean the same thing must always
//! produce the same fingerprint, in any process.
//!
//! Canonical form:
//!
//! - object keys are sorted, at every depth
//! - object members whose value is `null` are dropped, so an explicit
//!   `null` and an absent key are the same request
//! - array order is preserved (arrays are ordered data)
//!
//! The canonical text is hashed with SHA-256 together with the method and
//! operation name, and the operation name is also kept as a readable prefix.

use std::fmt;

use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex characters of the digest kept in a fingerprint (128 bits).
const DIGEST_HEX_LEN: usize = 32;

/// A canonical, order-independent request identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    ///
    /// # Examples
    ///
    /// ```
    /// use hubkit_github::Fingerprint;
    /// use reqwest::Method;
    /// use serde_json::json;
    ///
    /// let a = Fingerprint::compute(&Method::GET, "repos.get", &json!({"owner": "octo", "repo": "demo"}));
    /// let b = Fingerprint::compute(&Method::GET, "repos.get", &json!({"repo": "demo", "owner": "octo"}));
    /// assert_eq!(a, b);
    /// assert!(a.as_str().starts_with("GET repos.get:"));
    /// ```
    #[must_use]
    pub fn compute(method: &Method, operation: &str, params: &Value) -> Self {
        let canonical = canonical_json(params);

        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(operation.as_bytes());
        hasher.update([0]);
        hasher.update(canonical.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self(format!(
            "{} {operation}:{}",
            method.as_str(),
            &digest[..DIGEST_HEX_LEN]
        ))
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a JSON value in canonical form.
///
/// Key ordering is applied here rather than relying on `serde_json::Map`,
/// whose iteration order depends on the `preserve_order` feature.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<_> = map.iter().filter(|(_, v)| !v.is_null()).collect();
            members.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Scalars serialize deterministically.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}
