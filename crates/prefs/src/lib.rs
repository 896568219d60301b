#![doc = include_str!("../README.md")]

mod access;
pub mod archive;
pub mod codec;
mod defaults;
mod key;
mod observation;

pub use access::{remove_all, reset};
pub use archive::{ArchiveError, Archiver, SecureCodable, Unarchiver};
pub use codec::{
    Archived, Codec, CodecError, Data, Native, NativeRepresentable, RawRepresentable, RawValue,
    Structured,
};
pub use defaults::Defaults;
pub use key::{AnyKey, Key, OptionalKey, SecureCodingKey, SecureCodingOptionalKey};
pub use observation::{Change, Observation, ObservationOptions};
pub use prefs_store::{
    NativeValue, Store, StoreConfiguration, StoreError, Subscription, SuiteRegistry, SuiteStore,
};
