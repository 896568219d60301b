//! Codec strategies bridging typed values to [`NativeValue`]s.
//!
//! A key picks its strategy through its second type parameter, so the encode/decode path is fixed
//! at compile time:
//!
//! | Strategy       | Value types                                        | Stored as          |
//! |----------------|----------------------------------------------------|--------------------|
//! | [`Native`]     | [`NativeRepresentable`] primitives and collections | the matching value |
//! | [`RawValue`]   | [`RawRepresentable`] enums                         | the raw primitive  |
//! | [`Structured`] | any `Serialize + DeserializeOwned` type            | CBOR bytes         |
//! | [`Archived`]   | [`SecureCodable`] types                            | a checked archive  |

use std::{
    collections::{BTreeMap, HashMap},
    marker::PhantomData,
};

use chrono::{DateTime, Utc};
use prefs_store::NativeValue;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::archive::{self, ArchiveError, SecureCodable};

/// Errors raised while translating between typed values and native values.
///
/// None of these reach callers of the read path: keys recover by falling back to their default.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized by the structured encoder.
    #[error("Failed to serialize structured value: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    /// The raw value does not match the expected structured schema.
    #[error("Failed to deserialize structured value: {0}")]
    Schema(#[from] ciborium::de::Error<std::io::Error>),

    /// The raw value has the wrong native kind, or is out of range for the target type.
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind the codec expected.
        expected: &'static str,
        /// The kind that was stored.
        found: String,
    },

    /// The raw value does not correspond to any variant of the target enum.
    #[error("Unknown raw value {0}")]
    UnknownRawValue(String),

    /// The archive is corrupt or holds a class that is not allowed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl CodecError {
    fn mismatch(expected: &'static str, raw: &NativeValue) -> Self {
        CodecError::TypeMismatch {
            expected,
            found: raw.kind().to_owned(),
        }
    }
}

/// Encode/decode rules for values of type `T`.
pub trait Codec<T> {
    /// Translate `value` into its native representation.
    fn encode(value: &T) -> Result<NativeValue, CodecError>;
    /// Translate a native value back into `T`.
    fn decode(raw: &NativeValue) -> Result<T, CodecError>;
}

/// Strategy for types the store represents natively.
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

/// Strategy for enums backed by a primitive raw value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawValue;

/// Strategy for arbitrary serde types, stored as a CBOR byte blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct Structured;

/// Strategy for [`SecureCodable`] types, stored as a class-checked archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Archived;

/// Types with a direct [`NativeValue`] representation.
pub trait NativeRepresentable: Sized {
    /// Convert to the native representation.
    fn to_native(&self) -> Result<NativeValue, CodecError>;
    /// Convert from the native representation.
    fn from_native(raw: &NativeValue) -> Result<Self, CodecError>;
}

impl<T: NativeRepresentable> Codec<T> for Native {
    fn encode(value: &T) -> Result<NativeValue, CodecError> {
        value.to_native()
    }

    fn decode(raw: &NativeValue) -> Result<T, CodecError> {
        T::from_native(raw)
    }
}

/// Enums (or other types) identified by a primitive raw value.
///
/// Implement by hand or with [`raw_representable!`](crate::raw_representable).
pub trait RawRepresentable: Sized {
    /// The primitive stored in place of the value.
    type Raw: NativeRepresentable;

    /// The raw value of `self`.
    fn raw_value(&self) -> Self::Raw;

    /// The value for `raw`, or `None` if no variant matches.
    fn from_raw_value(raw: Self::Raw) -> Option<Self>;
}

impl<T: RawRepresentable> Codec<T> for RawValue {
    fn encode(value: &T) -> Result<NativeValue, CodecError> {
        value.raw_value().to_native()
    }

    fn decode(raw: &NativeValue) -> Result<T, CodecError> {
        let primitive = T::Raw::from_native(raw)?;
        T::from_raw_value(primitive).ok_or_else(|| CodecError::UnknownRawValue(format!("{raw:?}")))
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for Structured {
    fn encode(value: &T) -> Result<NativeValue, CodecError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes)?;
        Ok(NativeValue::Data(bytes))
    }

    fn decode(raw: &NativeValue) -> Result<T, CodecError> {
        match raw {
            NativeValue::Data(bytes) => Ok(ciborium::from_reader(bytes.as_slice())?),
            other => Err(CodecError::mismatch("data", other)),
        }
    }
}

impl<T: SecureCodable> Codec<T> for Archived {
    fn encode(value: &T) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Data(archive::archive(value)?))
    }

    fn decode(raw: &NativeValue) -> Result<T, CodecError> {
        match raw {
            NativeValue::Data(bytes) => Ok(archive::unarchive(bytes)?),
            other => Err(CodecError::mismatch("data", other)),
        }
    }
}

/// An opaque byte buffer, stored as [`NativeValue::Data`].
///
/// `Vec<u8>` is stored as an array of integers like any other `Vec`; use this wrapper for blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data(pub Vec<u8>);

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data(bytes)
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl NativeRepresentable for NativeValue {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(self.clone())
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        Ok(raw.clone())
    }
}

impl NativeRepresentable for bool {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Bool(*self))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::Bool(value) => Ok(*value),
            other => Err(CodecError::mismatch("bool", other)),
        }
    }
}

impl NativeRepresentable for String {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::String(self.clone()))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::String(value) => Ok(value.clone()),
            other => Err(CodecError::mismatch("string", other)),
        }
    }
}

macro_rules! impl_native_integer {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl NativeRepresentable for $ty {
                fn to_native(&self) -> Result<NativeValue, CodecError> {
                    i64::try_from(*self)
                        .map(NativeValue::Integer)
                        .map_err(|_| CodecError::TypeMismatch {
                            expected: "integer",
                            found: format!("{} out of range", self),
                        })
                }

                fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
                    match raw {
                        NativeValue::Integer(value) => <$ty>::try_from(*value).map_err(|_| {
                            CodecError::TypeMismatch {
                                expected: stringify!($ty),
                                found: format!("integer {}", value),
                            }
                        }),
                        other => Err(CodecError::mismatch(stringify!($ty), other)),
                    }
                }
            }
        )+
    };
}

impl_native_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl NativeRepresentable for f64 {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Float(*self))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::Float(value) => Ok(*value),
            // Integral floats written by other tools come back as integers.
            NativeValue::Integer(value) => Ok(*value as f64),
            other => Err(CodecError::mismatch("float", other)),
        }
    }
}

impl NativeRepresentable for f32 {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Float(f64::from(*self)))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        f64::from_native(raw).map(|value| value as f32)
    }
}

impl NativeRepresentable for DateTime<Utc> {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Date(*self))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::Date(value) => Ok(*value),
            other => Err(CodecError::mismatch("date", other)),
        }
    }
}

impl NativeRepresentable for Data {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        Ok(NativeValue::Data(self.0.clone()))
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::Data(bytes) => Ok(Data(bytes.clone())),
            other => Err(CodecError::mismatch("data", other)),
        }
    }
}

impl<T: NativeRepresentable> NativeRepresentable for Vec<T> {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        self.iter()
            .map(T::to_native)
            .collect::<Result<_, _>>()
            .map(NativeValue::Array)
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        match raw {
            NativeValue::Array(items) => items.iter().map(T::from_native).collect(),
            other => Err(CodecError::mismatch("array", other)),
        }
    }
}

fn dictionary_to_native<'a, T: NativeRepresentable + 'a>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
) -> Result<NativeValue, CodecError> {
    entries
        .map(|(key, value)| Ok((key.clone(), value.to_native()?)))
        .collect::<Result<BTreeMap<_, _>, CodecError>>()
        .map(NativeValue::Dictionary)
}

fn dictionary_from_native<T: NativeRepresentable, M: FromIterator<(String, T)>>(
    raw: &NativeValue,
) -> Result<M, CodecError> {
    match raw {
        NativeValue::Dictionary(entries) => entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), T::from_native(value)?)))
            .collect(),
        other => Err(CodecError::mismatch("dictionary", other)),
    }
}

impl<T: NativeRepresentable> NativeRepresentable for BTreeMap<String, T> {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        dictionary_to_native(self.iter())
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        dictionary_from_native(raw)
    }
}

impl<T: NativeRepresentable> NativeRepresentable for HashMap<String, T> {
    fn to_native(&self) -> Result<NativeValue, CodecError> {
        dictionary_to_native(self.iter())
    }

    fn from_native(raw: &NativeValue) -> Result<Self, CodecError> {
        dictionary_from_native(raw)
    }
}

/// Implement [`RawRepresentable`] for a fieldless enum.
///
/// ```rust
/// use prefs::{raw_representable, RawRepresentable};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Theme {
///     Light,
///     Dark,
/// }
///
/// raw_representable!(Theme: String {
///     Theme::Light => "light",
///     Theme::Dark => "dark",
/// });
///
/// assert_eq!(Theme::Dark.raw_value(), "dark");
/// assert_eq!(Theme::from_raw_value("light".to_owned()), Some(Theme::Light));
/// ```
#[macro_export]
macro_rules! raw_representable {
    ($ty:ty : $raw:ty { $($variant:path => $value:expr),+ $(,)? }) => {
        impl $crate::RawRepresentable for $ty {
            type Raw = $raw;

            fn raw_value(&self) -> $raw {
                match self {
                    $($variant => <$raw>::from($value),)+
                }
            }

            fn from_raw_value(raw: $raw) -> Option<Self> {
                $(
                    if raw == <$raw>::from($value) {
                        return Some($variant);
                    }
                )+
                None
            }
        }
    };
}

/// Marker used by keys to carry their value type and codec without owning either.
pub(crate) type CodecMarker<T, C> = PhantomData<fn() -> (T, C)>;
