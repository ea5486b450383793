//! Registry of test machines.
//!
//! The registry is an immutable value built from a TOML document and passed
//! explicitly to whatever needs host metadata. Host declaration order is the
//! display order of every table and figure.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Registry compiled into the binary.
pub const BUILTIN_REGISTRY: &str = include_str!("hosts.toml");

/// Microarchitecture of one logical core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDescriptor {
    pub march: String,
    /// Core class on hybrid parts (P-Core / E-Core).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HostEntry {
    pub id: String,
    pub code_name: String,
    pub name: Option<String>,
    pub microcode: Option<String>,
    pub os: Option<String>,
    pub kernel_version: Option<String>,
    /// Indexed by core number. Slots of the same core type share one
    /// descriptor.
    pub cores: Vec<Arc<CoreDescriptor>>,
}

impl HostEntry {
    pub fn core(&self, index: u64) -> Option<&Arc<CoreDescriptor>> {
        usize::try_from(index).ok().and_then(|i| self.cores.get(i))
    }

    /// Consecutive runs of identical descriptors, e.g. `16x Raptor Cove`.
    pub fn core_layout(&self) -> Vec<(usize, &CoreDescriptor)> {
        let mut layout: Vec<(usize, &CoreDescriptor)> = Vec::new();
        for core in &self.cores {
            match layout.last_mut() {
                Some((count, last)) if *last == core.as_ref() => *count += 1,
                _ => layout.push((1, core.as_ref())),
            }
        }
        layout
    }
}

#[derive(Debug, Clone)]
pub struct HostRegistry {
    hosts: Vec<HostEntry>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct RawRegistry {
    #[serde(default)]
    core_types: HashMap<String, CoreDescriptor>,
    #[serde(default)]
    hosts: Vec<RawHost>,
}

#[derive(Deserialize)]
struct RawHost {
    id: String,
    code_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    microcode: Option<String>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    kernel_version: Option<String>,
    #[serde(default)]
    cores: Vec<CoreRun>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoreRun {
    Shared {
        core: String,
        #[serde(default = "one")]
        count: usize,
    },
    /// Cores of an unregistered machine, labelled by index.
    Local { local: usize },
}

fn one() -> usize {
    1
}

impl HostRegistry {
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_REGISTRY)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        let raw: RawRegistry = toml::from_str(content)?;

        let core_types: HashMap<String, Arc<CoreDescriptor>> = raw
            .core_types
            .into_iter()
            .map(|(id, core)| (id, Arc::new(core)))
            .collect();

        let mut hosts = Vec::with_capacity(raw.hosts.len());
        let mut index = HashMap::with_capacity(raw.hosts.len());
        for host in raw.hosts {
            if index.contains_key(&host.id) {
                return Err(RegistryError::DuplicateHost(host.id));
            }

            let mut cores = Vec::new();
            for run in host.cores {
                match run {
                    CoreRun::Shared { core, count } => {
                        let descriptor = core_types.get(&core).ok_or_else(|| {
                            RegistryError::UnknownCore {
                                host: host.id.clone(),
                                core: core.clone(),
                            }
                        })?;
                        cores.extend(std::iter::repeat(descriptor).take(count).cloned());
                    }
                    CoreRun::Local { local } => {
                        cores.extend((0..local).map(|i| {
                            Arc::new(CoreDescriptor {
                                march: format!("Manual Run (local core {i})"),
                                kind: None,
                            })
                        }));
                    }
                }
            }

            index.insert(host.id.clone(), hosts.len());
            hosts.push(HostEntry {
                id: host.id,
                code_name: host.code_name,
                name: host.name,
                microcode: host.microcode,
                os: host.os,
                kernel_version: host.kernel_version,
                cores,
            });
        }

        Ok(Self { hosts, index })
    }

    /// Hosts in declaration order.
    pub fn hosts(&self) -> impl Iterator<Item = &HostEntry> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HostEntry> {
        self.index.get(id).map(|&i| &self.hosts[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id` in display order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn host(&self, id: &str) -> Result<&HostEntry, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::UnknownHost(id.to_string()))
    }

    pub fn core(&self, id: &str, index: u64) -> Result<&Arc<CoreDescriptor>, RegistryError> {
        let host = self.host(id)?;
        host.core(index).ok_or_else(|| RegistryError::CoreOutOfRange {
            host: id.to_string(),
            index,
            cores: host.cores.len(),
        })
    }

    /// Display label of core `index` on host `id`.
    pub fn march(&self, id: &str, index: u64) -> Result<&str, RegistryError> {
        Ok(self.core(id, index)?.march.as_str())
    }
}
