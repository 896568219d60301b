#![doc = include_str!("../README.md")]

mod configuration;
mod error;
mod persistence;
mod registry;
mod store;
mod subscription;
mod suite;
mod value;

pub use configuration::StoreConfiguration;
pub use error::StoreError;
pub use registry::SuiteRegistry;
pub use store::{validate_suite_name, RawObserver, Store};
pub use subscription::{ActiveFlag, Subscription};
pub use suite::SuiteStore;
pub use value::NativeValue;
