use std::fmt;

use sha2::{Digest, Sha256};
use url::form_urlencoded;

/// Query parameters in a stable, order-independent encoding.
///
/// Pairs are sorted by key and then by value before being form-encoded, so
/// `b=2&a=1` and `a=1&b=2` produce the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CanonicalQuery(String);

impl CanonicalQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        pairs.sort();

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        Self(encoded)
    }

    /// Canonical form of a raw query string, dropping the named keys.
    pub fn from_query_str(raw: &str, ignore: &[&str]) -> Self {
        Self::from_pairs(
            form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
                .filter(|(k, _)| !ignore.contains(&k.as_ref())),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key derived from `canonicalQuery:deviceID:selectedUser`.
///
/// The composite is hashed so keys have a fixed size regardless of how many
/// sources a query names.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(query: &CanonicalQuery, device: &str, user: &str) -> Self {
        let composite = Self::composite(query, device, user);
        Self(hex::encode(Sha256::digest(composite.as_bytes())))
    }

    /// The un-hashed `query:device:user` text a key is derived from.
    pub fn composite(query: &CanonicalQuery, device: &str, user: &str) -> String {
        format!("{}:{}:{}", query.as_str(), device, user)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheKey").field(&&self.0[..12]).finish()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}
