//! Loader for experiment output directories.
//!
//! Layout on disk:
//!
//! ```text
//! out/
//!   <host-dir>/metadata.json   JSON object, at least {"hostname": ...}
//!   <host-dir>/run.out         log with one or more results blocks
//! ```
//!
//! A results block is delimited by [`RESULTS_START`] and [`RESULTS_END`] and
//! holds one `key = <json>` pair per line.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DataError, LoadError};

pub const RESULTS_START: &str = "### RESULTS START ###";
pub const RESULTS_END: &str = "### RESULTS END ###";

pub const METADATA_FILE: &str = "metadata.json";
pub const RUN_FILE: &str = "run.out";

/// Measurements and metadata of one host directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub data: BTreeMap<String, Value>,
    pub metadata: Map<String, Value>,
}

impl ResultSet {
    pub fn new(data: BTreeMap<String, Value>, metadata: Map<String, Value>) -> Self {
        Self { data, metadata }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.metadata.get("hostname").and_then(Value::as_str)
    }

    /// Core the experiment was pinned to, if recorded.
    ///
    /// Accepts an integer or an integer-valued string.
    pub fn experiment_core(&self) -> Option<u64> {
        match self.metadata.get("experiment_core")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&Value, DataError> {
        self.data
            .get(key)
            .ok_or_else(|| DataError::MissingKey(key.to_string()))
    }

    pub fn number(&self, key: &str) -> Result<f64, DataError> {
        self.get(key)?.as_f64().ok_or_else(|| DataError::WrongType {
            key: key.to_string(),
            expected: "a number",
        })
    }

    pub fn numbers(&self, key: &str) -> Result<Vec<f64>, DataError> {
        let wrong_type = || DataError::WrongType {
            key: key.to_string(),
            expected: "a list of numbers",
        };
        self.get(key)?
            .as_array()
            .ok_or_else(wrong_type)?
            .iter()
            .map(|v| v.as_f64().ok_or_else(wrong_type))
            .collect()
    }

    /// Largest of several scalar measurements, e.g. the per-instruction noise
    /// controls of one run.
    pub fn max_of(&self, keys: &[&str]) -> Result<f64, DataError> {
        let mut max = f64::NEG_INFINITY;
        for key in keys {
            max = max.max(self.number(key)?);
        }
        Ok(max)
    }
}

/// Load every non-hidden host directory below `out_dir`.
///
/// The map is keyed by directory name.
pub fn load_out_dir(out_dir: &Path) -> Result<BTreeMap<String, ResultSet>, LoadError> {
    let entries = fs::read_dir(out_dir).map_err(|e| LoadError::io(out_dir, e))?;

    let mut sets = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| LoadError::io(out_dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let host_dir = entry.path();
        if !host_dir.is_dir() {
            tracing::debug!(path = %host_dir.display(), "skipping non-directory entry");
            continue;
        }

        let metadata = read_metadata(&host_dir.join(METADATA_FILE))?;
        let data = read_results(&host_dir.join(RUN_FILE))?;
        tracing::debug!(host_dir = %name, keys = data.len(), "loaded result set");
        sets.insert(name, ResultSet::new(data, metadata));
    }

    Ok(sets)
}

pub fn read_metadata(path: &Path) -> Result<Map<String, Value>, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|source| LoadError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LoadError::MetadataNotObject {
            path: path.to_path_buf(),
        }),
    }
}

pub fn read_results(path: &Path) -> Result<BTreeMap<String, Value>, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    parse_results(path, &content)
}

/// Extract the `key = <json>` pairs between the results markers of `content`.
///
/// `path` is only used for error reporting.
pub fn parse_results(path: &Path, content: &str) -> Result<BTreeMap<String, Value>, LoadError> {
    let mut result = BTreeMap::new();
    let mut inside = false;

    for (idx, line) in content.lines().enumerate() {
        if line.starts_with(RESULTS_START) {
            inside = true;
            continue;
        }
        if line.starts_with(RESULTS_END) {
            inside = false;
            continue;
        }
        if !inside {
            continue;
        }

        let line_no = idx + 1;
        let (key, raw) = split_pair(line).ok_or_else(|| LoadError::MalformedLine {
            path: path.to_path_buf(),
            line: line_no,
            content: line.to_string(),
        })?;
        let value = serde_json::from_str(raw).map_err(|source| LoadError::Value {
            path: path.to_path_buf(),
            line: line_no,
            key: key.to_string(),
            source,
        })?;
        result.insert(key.to_string(), value);
    }

    Ok(result)
}

/// `<key without spaces> = <non-empty rest>`
fn split_pair(line: &str) -> Option<(&str, &str)> {
    let space = line.find(' ')?;
    let key = &line[..space];
    let value = line[space..].strip_prefix(" = ")?;
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}
