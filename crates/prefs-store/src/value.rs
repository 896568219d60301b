use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value in one of the representations a [`Store`](crate::Store) holds natively.
///
/// Every typed preference is bridged to one of these variants before it reaches the store.
/// Collections may nest arbitrarily, but only string-keyed dictionaries are supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum NativeValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer. Unsigned values up to `u32::MAX` fit without loss.
    Integer(i64),
    /// A double precision float. Infinities and NaN are serialized as strings.
    Float(#[serde(with = "non_finite")] f64),
    /// UTF-8 text.
    String(String),
    /// A point in time, always stored in UTC.
    Date(DateTime<Utc>),
    /// An opaque byte buffer. Structured and archived values are stored this way.
    Data(#[serde(with = "serde_bytes")] Vec<u8>),
    /// An ordered list of native values.
    Array(Vec<NativeValue>),
    /// A string-keyed dictionary of native values.
    Dictionary(BTreeMap<String, NativeValue>),
}

/// Serde adapter keeping infinities and NaN intact in formats without a representation for them.
mod non_finite {
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(INFINITY)
        } else {
            serializer.serialize_str(NEG_INFINITY)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, \"NaN\", \"Infinity\" or \"-Infinity\"",
                )),
            },
        }
    }
}

impl NativeValue {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Bool(_) => "bool",
            NativeValue::Integer(_) => "integer",
            NativeValue::Float(_) => "float",
            NativeValue::String(_) => "string",
            NativeValue::Date(_) => "date",
            NativeValue::Data(_) => "data",
            NativeValue::Array(_) => "array",
            NativeValue::Dictionary(_) => "dictionary",
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Integer(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Float(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_owned())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(value: Vec<u8>) -> Self {
        NativeValue::Data(value)
    }
}
