//! Class-checked archives for values that have no native representation.
//!
//! An archive is a CBOR map recording the concrete class name and version of the value next to
//! its keyed fields. Unarchiving refuses any class the target type does not list as allowed, so a
//! blob written for one type can never be materialized as another.

use ciborium::Value;
use thiserror::Error;

const CLASS_LABEL: &str = "class";
const VERSION_LABEL: &str = "version";
const FIELDS_LABEL: &str = "fields";

/// Errors raised while archiving or unarchiving a [`SecureCodable`] value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The archive holds a class that is not in the target type's allow-list.
    #[error("Archived class {found} is not allowed, expected {expected}")]
    ClassMismatch {
        /// The class the target type accepts.
        expected: &'static str,
        /// The class recorded in the archive.
        found: String,
    },

    /// The bytes are not a well-formed archive.
    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    /// A field required by the target type is absent.
    #[error("Missing field {0}")]
    MissingField(String),

    /// A field is present but holds the wrong kind of value.
    #[error("Field {field} is not a {expected}")]
    UnexpectedType {
        /// The field name.
        field: String,
        /// The kind the decoder asked for.
        expected: &'static str,
    },
}

impl From<ciborium::de::Error<std::io::Error>> for ArchiveError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        ArchiveError::Corrupt(err.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for ArchiveError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        ArchiveError::Corrupt(err.to_string())
    }
}

/// A type that can be stored through the archive codec.
///
/// Implementors write their state into an [`Archiver`] field by field and read it back from an
/// [`Unarchiver`]. The class name is recorded in the archive and checked on the way back.
///
/// ```rust
/// use prefs::{ArchiveError, Archiver, SecureCodable, Unarchiver};
///
/// #[derive(Debug, PartialEq)]
/// struct Bookmark {
///     title: String,
///     visits: i64,
/// }
///
/// impl SecureCodable for Bookmark {
///     const CLASS_NAME: &'static str = "Bookmark";
///
///     fn encode_with(&self, archiver: &mut Archiver) {
///         archiver.encode_string("title", &self.title);
///         archiver.encode_i64("visits", self.visits);
///     }
///
///     fn decode_with(unarchiver: &Unarchiver) -> Result<Self, ArchiveError> {
///         Ok(Bookmark {
///             title: unarchiver.decode_string("title")?,
///             visits: unarchiver.decode_i64("visits")?,
///         })
///     }
/// }
///
/// let bookmark = Bookmark { title: "docs".to_owned(), visits: 3 };
/// let bytes = prefs::archive::archive(&bookmark).unwrap();
/// assert_eq!(prefs::archive::unarchive::<Bookmark>(&bytes).unwrap(), bookmark);
/// ```
pub trait SecureCodable: Sized {
    /// The class name recorded in archives of this type.
    const CLASS_NAME: &'static str;

    /// Other class names accepted when unarchiving, e.g. names this type had before a rename.
    const LEGACY_CLASS_NAMES: &'static [&'static str] = &[];

    /// Version recorded alongside the fields, available through [`Unarchiver::version`].
    const VERSION: u32 = 1;

    /// Write the value's fields.
    fn encode_with(&self, archiver: &mut Archiver);

    /// Rebuild a value from its fields.
    fn decode_with(unarchiver: &Unarchiver) -> Result<Self, ArchiveError>;

    /// Whether an archive recorded as `class` may be decoded as this type.
    fn is_allowed_class(class: &str) -> bool {
        class == Self::CLASS_NAME || Self::LEGACY_CLASS_NAMES.contains(&class)
    }
}

/// Keyed container receiving the fields of a value being archived.
#[derive(Debug, Default)]
pub struct Archiver {
    fields: Vec<(Value, Value)>,
}

impl Archiver {
    fn put(&mut self, key: &str, value: Value) {
        let label = Value::Text(key.to_owned());
        match self.fields.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((label, value)),
        }
    }

    /// Archive a boolean.
    pub fn encode_bool(&mut self, key: &str, value: bool) {
        self.put(key, Value::Bool(value));
    }

    /// Archive an integer.
    pub fn encode_i64(&mut self, key: &str, value: i64) {
        self.put(key, Value::Integer(value.into()));
    }

    /// Archive a float.
    pub fn encode_f64(&mut self, key: &str, value: f64) {
        self.put(key, Value::Float(value));
    }

    /// Archive a string.
    pub fn encode_string(&mut self, key: &str, value: &str) {
        self.put(key, Value::Text(value.to_owned()));
    }

    /// Archive a byte buffer.
    pub fn encode_bytes(&mut self, key: &str, value: &[u8]) {
        self.put(key, Value::Bytes(value.to_vec()));
    }

    /// Archive a nested object, recording its class.
    pub fn encode_object<T: SecureCodable>(&mut self, key: &str, value: &T) {
        self.put(key, envelope(value));
    }

    /// Archive a list of nested objects of one class.
    pub fn encode_objects<T: SecureCodable>(&mut self, key: &str, values: &[T]) {
        self.put(key, Value::Array(values.iter().map(envelope).collect()));
    }
}

/// Keyed container handing the fields of an archive back to [`SecureCodable::decode_with`].
#[derive(Debug)]
pub struct Unarchiver {
    version: u32,
    fields: Vec<(Value, Value)>,
}

impl Unarchiver {
    fn get(&self, key: &str) -> Result<&Value, ArchiveError> {
        self.fields
            .iter()
            .find(|(label, _)| matches!(label, Value::Text(text) if text == key))
            .map(|(_, value)| value)
            .ok_or_else(|| ArchiveError::MissingField(key.to_owned()))
    }

    fn unexpected(key: &str, expected: &'static str) -> ArchiveError {
        ArchiveError::UnexpectedType {
            field: key.to_owned(),
            expected,
        }
    }

    /// Version the archive was written with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether the archive holds a field named `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    /// Read a boolean.
    pub fn decode_bool(&self, key: &str) -> Result<bool, ArchiveError> {
        match self.get(key)? {
            Value::Bool(value) => Ok(*value),
            _ => Err(Self::unexpected(key, "bool")),
        }
    }

    /// Read an integer.
    pub fn decode_i64(&self, key: &str) -> Result<i64, ArchiveError> {
        match self.get(key)? {
            Value::Integer(value) => {
                i64::try_from(*value).map_err(|_| Self::unexpected(key, "64-bit integer"))
            }
            _ => Err(Self::unexpected(key, "integer")),
        }
    }

    /// Read a float.
    pub fn decode_f64(&self, key: &str) -> Result<f64, ArchiveError> {
        match self.get(key)? {
            Value::Float(value) => Ok(*value),
            _ => Err(Self::unexpected(key, "float")),
        }
    }

    /// Read a string.
    pub fn decode_string(&self, key: &str) -> Result<String, ArchiveError> {
        match self.get(key)? {
            Value::Text(value) => Ok(value.clone()),
            _ => Err(Self::unexpected(key, "string")),
        }
    }

    /// Read a byte buffer.
    pub fn decode_bytes(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        match self.get(key)? {
            Value::Bytes(value) => Ok(value.clone()),
            _ => Err(Self::unexpected(key, "bytes")),
        }
    }

    /// Read a nested object, checking its class.
    pub fn decode_object<T: SecureCodable>(&self, key: &str) -> Result<T, ArchiveError> {
        open_envelope(self.get(key)?)
    }

    /// Read a list of nested objects, checking the class of each.
    pub fn decode_objects<T: SecureCodable>(&self, key: &str) -> Result<Vec<T>, ArchiveError> {
        match self.get(key)? {
            Value::Array(items) => items.iter().map(open_envelope).collect(),
            _ => Err(Self::unexpected(key, "array")),
        }
    }
}

fn envelope<T: SecureCodable>(value: &T) -> Value {
    let mut archiver = Archiver::default();
    value.encode_with(&mut archiver);

    Value::Map(vec![
        (
            Value::Text(CLASS_LABEL.to_owned()),
            Value::Text(T::CLASS_NAME.to_owned()),
        ),
        (
            Value::Text(VERSION_LABEL.to_owned()),
            Value::Integer(T::VERSION.into()),
        ),
        (Value::Text(FIELDS_LABEL.to_owned()), Value::Map(archiver.fields)),
    ])
}

fn header<'a>(entries: &'a [(Value, Value)], label: &str) -> Result<&'a Value, ArchiveError> {
    entries
        .iter()
        .find(|(key, _)| matches!(key, Value::Text(text) if text == label))
        .map(|(_, value)| value)
        .ok_or_else(|| ArchiveError::Corrupt(format!("missing {label}")))
}

fn open_envelope<T: SecureCodable>(value: &Value) -> Result<T, ArchiveError> {
    let Value::Map(entries) = value else {
        return Err(ArchiveError::Corrupt("archive is not a map".to_owned()));
    };

    let class = match header(entries, CLASS_LABEL)? {
        Value::Text(class) => class,
        _ => return Err(ArchiveError::Corrupt("class is not a string".to_owned())),
    };
    if !T::is_allowed_class(class) {
        return Err(ArchiveError::ClassMismatch {
            expected: T::CLASS_NAME,
            found: class.clone(),
        });
    }

    let version = match header(entries, VERSION_LABEL)? {
        Value::Integer(version) => u32::try_from(*version)
            .map_err(|_| ArchiveError::Corrupt("version out of range".to_owned()))?,
        _ => return Err(ArchiveError::Corrupt("version is not an integer".to_owned())),
    };

    let fields = match header(entries, FIELDS_LABEL)? {
        Value::Map(fields) => fields.clone(),
        _ => return Err(ArchiveError::Corrupt("fields is not a map".to_owned())),
    };

    T::decode_with(&Unarchiver { version, fields })
}

/// Archive `value` into bytes.
pub fn archive<T: SecureCodable>(value: &T) -> Result<Vec<u8>, ArchiveError> {
    let mut buffer = Vec::new();
    ciborium::into_writer(&envelope(value), &mut buffer)?;
    Ok(buffer)
}

/// Unarchive bytes produced by [`archive`], accepting only classes allowed by `T`.
pub fn unarchive<T: SecureCodable>(bytes: &[u8]) -> Result<T, ArchiveError> {
    let value: Value = ciborium::from_reader(bytes)?;
    open_envelope(&value)
}
