use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

// i64::MIN is exactly representable; i64::MAX rounds up to 2^63.
const I64_MIN_F: f64 = i64::MIN as f64;
const I64_END_F: f64 = 9_223_372_036_854_775_808.0;

/// A single configuration value. The configuration page and the watch only
/// exchange scalars; `null`, arrays and objects are rejected on parse.
///
/// Numbers follow the page's single number type: an integral number is
/// always an `Integer`, whether it was written `1` or `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ConfigValue {
    /// Integral values that fit an `i64` become `Integer`, the rest `Float`.
    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0 && (I64_MIN_F..I64_END_F).contains(&value) {
            ConfigValue::Integer(value as i64)
        } else {
            ConfigValue::Float(value)
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Integer(n) => write!(f, "{n}"),
            ConfigValue::Float(x) => write_number(f, *x),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

/// Render a float the way the configuration page's `String(number)` does:
/// plain decimal between 1e-6 and 1e21, exponent form with an explicit sign
/// outside that range.
fn write_number(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("NaN");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if x == 0.0 {
        return f.write_str("0");
    }

    let abs = x.abs();
    if (1e-6..1e21).contains(&abs) {
        return write!(f, "{x}");
    }

    let sci = format!("{x:e}");
    match sci.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{mantissa}e+{exp}"),
        _ => f.write_str(&sci),
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConfigValueVisitor)
    }
}

struct ConfigValueVisitor;

impl<'de> Visitor<'de> for ConfigValueVisitor {
    type Value = ConfigValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, number or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ConfigValue, E> {
        Ok(match i64::try_from(v) {
            Ok(n) => ConfigValue::Integer(n),
            Err(_) => ConfigValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ConfigValue, E> {
        Ok(ConfigValue::number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ConfigValue, E> {
        Ok(ConfigValue::Text(v))
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::number(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

/// User configuration: string keys to scalar values.
///
/// Iteration follows insertion order (for parsed blobs, the order keys
/// appear in the text), which is the order query parameters are written in.
/// Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(IndexMap<String, ConfigValue>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized configuration (a JSON object of scalars).
    pub fn from_json(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Insert or overwrite a key. An overwritten key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Render as a URL query string: `?k1=v1&k2=v2`, values percent-encoded.
    ///
    /// Returns an empty string for an empty configuration, never a bare `?`.
    pub fn to_query_string(&self) -> String {
        let mut params = String::new();
        for (key, value) in self.iter() {
            params.push(if params.is_empty() { '?' } else { '&' });
            params.push_str(key);
            params.push('=');
            params.push_str(&urlencoding::encode(&value.to_string()));
        }
        params
    }
}

impl FromIterator<(String, ConfigValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = indexmap::map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
