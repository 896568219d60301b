use std::path::PathBuf;

/// Configuration for a store opened through a [`SuiteRegistry`](crate::SuiteRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfiguration {
    /// The application-wide standard suite, kept in memory.
    Standard,

    /// A named suite kept in memory. Every store opened with the same name shares its data.
    Suite {
        /// The suite name. Must pass [`validate_suite_name`](crate::validate_suite_name).
        name: String,
    },

    /// A named suite persisted as JSON.
    File {
        /// The suite name, also used as the file stem.
        suite: String,
        /// Folder holding the suite file. Different applications should use different folders.
        folder_path: PathBuf,
    },
}

impl StoreConfiguration {
    /// Shorthand for [`StoreConfiguration::Suite`].
    pub fn suite(name: impl Into<String>) -> Self {
        StoreConfiguration::Suite { name: name.into() }
    }

    /// The suite name, `None` for the standard suite.
    pub fn suite_name(&self) -> Option<&str> {
        match self {
            StoreConfiguration::Standard => None,
            StoreConfiguration::Suite { name } => Some(name),
            StoreConfiguration::File { suite, .. } => Some(suite),
        }
    }
}
