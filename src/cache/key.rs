//! Key Codec Module
//!
//! Derives stable cache keys of the form `cache:<category>:<identifier>[:<param-hash>]`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Namespace prefix shared by every cache key.
pub const KEY_PREFIX: &str = "cache";

/// Length of the parameter digest appended to keys.
pub const PARAM_HASH_LEN: usize = 10;

/// Extra call parameters. A `BTreeMap` so serialization is always key-sorted.
pub type Params = BTreeMap<String, Value>;

// == Category ==
/// Data domain partitioning the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Geodata,
    Regulation,
    Subsidy,
    Climate,
    ExternalApi,
    ModelPrediction,
    Generic,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Geodata,
        Category::Regulation,
        Category::Subsidy,
        Category::Climate,
        Category::ExternalApi,
        Category::ModelPrediction,
        Category::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Geodata => "geodata",
            Category::Regulation => "regulation",
            Category::Subsidy => "subsidy",
            Category::Climate => "climate",
            Category::ExternalApi => "external_api",
            Category::ModelPrediction => "model_prediction",
            Category::Generic => "generic",
        }
    }

    /// Glob pattern matching every key of this category.
    pub fn key_pattern(&self) -> String {
        format!("{}:{}:*", KEY_PREFIX, self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CacheError::InvalidRequest(format!("Unknown category: {}", s)))
    }
}

// == Parsed Key ==
/// Components recovered from a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub category: Category,
    pub identifier: String,
    pub param_hash: Option<String>,
}

// == Key Codec ==
/// Builds and parses cache keys.
pub struct KeyCodec;

impl KeyCodec {
    /// Builds the key for `(category, identifier, params)`.
    ///
    /// Parameters are hashed over their key-sorted JSON form, so insertion
    /// order never changes the result. An empty or absent map adds no hash.
    /// `:` and `%` in the identifier are percent-escaped, so the identifier
    /// always stays a single segment.
    pub fn build(category: Category, identifier: impl fmt::Display, params: Option<&Params>) -> String {
        let identifier = escape_identifier(&identifier.to_string());
        match params.filter(|p| !p.is_empty()) {
            Some(params) => format!(
                "{}:{}:{}:{}",
                KEY_PREFIX,
                category,
                identifier,
                Self::hash_params(params)
            ),
            None => format!("{}:{}:{}", KEY_PREFIX, category, identifier),
        }
    }

    /// Digest of the canonical JSON form of `params`.
    pub fn hash_params(params: &Params) -> String {
        // Serializing a map of `Value`s cannot fail; fall back to Debug anyway.
        let canonical = serde_json::to_string(params).unwrap_or_else(|_| format!("{:?}", params));
        let mut digest = hex_digest(canonical.as_bytes());
        digest.truncate(PARAM_HASH_LEN);
        digest
    }

    /// Converts any serializable value into a parameter value.
    ///
    /// Values serde cannot represent are coerced to their `Debug` string.
    pub fn param_value<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{:?}", value)))
    }

    /// Splits a key back into its components.
    ///
    /// The segment after the identifier, if any, must be the ten-character
    /// lowercase hex parameter hash.
    pub fn parse(key: &str) -> Result<ParsedKey> {
        let mut parts = key.splitn(3, ':');
        let (prefix, category, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(c), Some(r)) => (p, c, r),
            _ => return Err(CacheError::MalformedKey(key.to_string())),
        };
        if prefix != KEY_PREFIX || rest.is_empty() {
            return Err(CacheError::MalformedKey(key.to_string()));
        }
        let category = category
            .parse::<Category>()
            .map_err(|_| CacheError::MalformedKey(key.to_string()))?;

        let (identifier, param_hash) = match rest.split_once(':') {
            None => (rest, None),
            Some((id, hash)) if !id.is_empty() && is_param_hash(hash) => (id, Some(hash.to_string())),
            Some(_) => return Err(CacheError::MalformedKey(key.to_string())),
        };
        let identifier = unescape_identifier(identifier)
            .ok_or_else(|| CacheError::MalformedKey(key.to_string()))?;

        Ok(ParsedKey {
            category,
            identifier,
            param_hash,
        })
    }
}

fn escape_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

/// Reverses `escape_identifier`; `None` on an escape it never produces.
fn unescape_identifier(escaped: &str) -> Option<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        if let Some(after) = tail.strip_prefix("%25") {
            out.push('%');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%3A") {
            out.push(':');
            rest = after;
        } else {
            return None;
        }
    }
    out.push_str(rest);
    Some(out)
}

fn is_param_hash(segment: &str) -> bool {
    segment.len() == PARAM_HASH_LEN
        && segment
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_build_without_params() {
        let key = KeyCodec::build(Category::Geodata, "13097", None);
        assert_eq!(key, "cache:geodata:13097");
    }

    #[test]
    fn test_build_with_empty_params() {
        let empty = Params::new();
        let key = KeyCodec::build(Category::Geodata, "13097", Some(&empty));
        assert_eq!(key, "cache:geodata:13097");
    }

    #[test]
    fn test_build_with_params_appends_hash() {
        let p = params(&[("year", json!(2030)), ("scenario", json!("rcp45"))]);
        let key = KeyCodec::build(Category::Climate, "parcel-7", Some(&p));
        let parsed = KeyCodec::parse(&key).unwrap();
        assert_eq!(parsed.category, Category::Climate);
        assert_eq!(parsed.identifier, "parcel-7");
        assert_eq!(parsed.param_hash.unwrap().len(), PARAM_HASH_LEN);
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let mut a = Params::new();
        a.insert("b".into(), json!(2));
        a.insert("a".into(), json!(1));
        let mut b = Params::new();
        b.insert("a".into(), json!(1));
        b.insert("b".into(), json!(2));
        assert_eq!(
            KeyCodec::build(Category::Generic, "x", Some(&a)),
            KeyCodec::build(Category::Generic, "x", Some(&b))
        );
    }

    #[test]
    fn test_different_params_different_keys() {
        let a = params(&[("year", json!(2030))]);
        let b = params(&[("year", json!(2050))]);
        assert_ne!(
            KeyCodec::build(Category::Climate, "p", Some(&a)),
            KeyCodec::build(Category::Climate, "p", Some(&b))
        );
    }

    #[test]
    fn test_parse_rejects_bad_prefix() {
        let result = KeyCodec::parse("store:geodata:1");
        assert!(matches!(result, Err(CacheError::MalformedKey(_))));
    }

    #[test]
    fn test_parse_rejects_too_few_segments() {
        assert!(matches!(KeyCodec::parse("cache:geodata"), Err(CacheError::MalformedKey(_))));
        assert!(matches!(KeyCodec::parse("cache:geodata:"), Err(CacheError::MalformedKey(_))));
        assert!(matches!(KeyCodec::parse(""), Err(CacheError::MalformedKey(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_category() {
        assert!(matches!(KeyCodec::parse("cache:weather:1"), Err(CacheError::MalformedKey(_))));
    }

    #[test]
    fn test_identifier_with_colon_is_escaped() {
        let key = KeyCodec::build(Category::ExternalApi, "https://x?q=50%", None);
        assert_eq!(key, "cache:external_api:https%3A//x?q=50%25");

        let parsed = KeyCodec::parse(&key).unwrap();
        assert_eq!(parsed.identifier, "https://x?q=50%");
        assert!(parsed.param_hash.is_none());
    }

    #[test]
    fn test_identifier_cannot_forge_param_hash() {
        let p = params(&[("year", json!(2030))]);
        let with_params = KeyCodec::build(Category::Generic, "x", Some(&p));
        let hash = KeyCodec::parse(&with_params).unwrap().param_hash.unwrap();

        let forged = KeyCodec::build(Category::Generic, format!("x:{}", hash), None);
        assert_ne!(forged, with_params);

        let parsed = KeyCodec::parse(&forged).unwrap();
        assert_eq!(parsed.identifier, format!("x:{}", hash));
        assert_eq!(parsed.param_hash, None);
    }

    #[test]
    fn test_parse_rejects_unescaped_extra_segment() {
        let result = KeyCodec::parse("cache:external_api:https://x");
        assert!(matches!(result, Err(CacheError::MalformedKey(_))));
        let result = KeyCodec::parse("cache:generic:50%zz");
        assert!(matches!(result, Err(CacheError::MalformedKey(_))));
    }

    #[test]
    fn test_param_value_primitive() {
        assert_eq!(KeyCodec::param_value(&3), json!(3));
        assert_eq!(KeyCodec::param_value("abc"), json!("abc"));
    }

    #[test]
    fn test_category_round_trip_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!(Category::Subsidy.key_pattern(), "cache:subsidy:*");
    }
}
