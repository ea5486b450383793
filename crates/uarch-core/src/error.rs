//! Error types shared by the loaders, the registry and the statistics helpers.

use std::path::PathBuf;

/// Failure while reading an experiment output directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid metadata JSON in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("metadata in {path} is not a JSON object")]
    MetadataNotObject { path: PathBuf },
    #[error("{path}:{line}: expected `<key> = <json>` inside results block, got {content:?}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("{path}:{line}: invalid JSON value for `{key}`: {source}")]
    Value {
        path: PathBuf,
        line: usize,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A loaded result set does not carry what an analyzer asked for.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("missing key `{0}`")]
    MissingKey(String),
    #[error("key `{key}` is not {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("metadata has no hostname")]
    MissingHostname,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid registry TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("host `{host}` references unknown core type `{core}`")]
    UnknownCore { host: String, core: String },
    #[error("host `{0}` is declared more than once")]
    DuplicateHost(String),
    #[error("host `{0}` is not in the registry")]
    UnknownHost(String),
    #[error("host `{host}` has {cores} cores, no core {index}")]
    CoreOutOfRange {
        host: String,
        index: u64,
        cores: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("empty sample")]
    Empty,
    #[error("geometric mean needs strictly positive values")]
    NonPositive,
    #[error("repeated runs report different numbers of metrics")]
    MismatchedRuns,
}
