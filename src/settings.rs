//! Resolved command-line configuration shared by every analyzer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use uarch_core::{DataError, HostRecord, HostRegistry, RegistryError, ResultSet};

#[derive(Debug)]
pub struct Settings {
    pub experiments_dir: PathBuf,
    pub tables_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub registry: HostRegistry,
    /// Treat unregistered hosts and unknown cores as errors.
    pub strict: bool,
}

impl Settings {
    pub fn new(
        experiments_dir: PathBuf,
        tables_dir: PathBuf,
        figures_dir: PathBuf,
        registry_path: Option<&Path>,
        strict: bool,
    ) -> Result<Self> {
        let registry = match registry_path {
            Some(path) => HostRegistry::load(path)
                .with_context(|| format!("loading host registry {}", path.display()))?,
            None => HostRegistry::builtin().context("parsing built-in host registry")?,
        };
        tracing::debug!(hosts = registry.len(), strict, "settings resolved");

        Ok(Self {
            experiments_dir,
            tables_dir,
            figures_dir,
            registry,
            strict,
        })
    }

    /// `<experiments-dir>/<experiment-dir>/out` unless overridden.
    pub fn data_dir(&self, experiment_dir: &str, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self.experiments_dir.join(experiment_dir).join("out"),
        }
    }

    /// Load an experiment output directory and put it in display order.
    pub fn load_ordered(&self, data_dir: &Path) -> Result<Vec<ResultSet>> {
        let sets = uarch_core::load_out_dir(data_dir)
            .with_context(|| format!("loading results from {}", data_dir.display()))?;
        tracing::info!(dir = %data_dir.display(), sets = sets.len(), "loaded results");
        self.order(sets.into_values().collect(), data_dir)
    }

    /// Put records in registry order. Unregistered hosts are dropped, or
    /// rejected in strict mode.
    pub fn order<T: HostRecord>(&self, records: Vec<T>, data_dir: &Path) -> Result<Vec<T>> {
        if self.strict {
            let unmatched = uarch_core::unmatched_hosts(&self.registry, &records);
            if !unmatched.is_empty() {
                bail!(
                    "hosts missing from registry: {} ({})",
                    unmatched.join(", "),
                    data_dir.display()
                );
            }
        }
        Ok(uarch_core::order_records(&self.registry, records))
    }

    /// Microarchitecture label of the core a result set was measured on.
    pub fn core_label(&self, set: &ResultSet) -> Result<String> {
        let host = set.hostname().ok_or(DataError::MissingHostname)?;
        let core = set.experiment_core().unwrap_or(0);
        match self.registry.march(host, core) {
            Ok(march) => Ok(march.to_string()),
            Err(err @ RegistryError::CoreOutOfRange { .. }) if !self.strict => {
                tracing::warn!(%err, "labelling core by index");
                let entry = self.registry.host(host)?;
                Ok(format!("{} (core {core})", entry.code_name))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn table_path(&self, file_name: &str) -> Result<PathBuf> {
        output_path(&self.tables_dir, file_name)
    }

    pub fn figure_path(&self, file_name: &str) -> Result<PathBuf> {
        output_path(&self.figures_dir, file_name)
    }
}

fn output_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    Ok(dir.join(file_name))
}

/// Write a generated artifact and log where it went.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = content.len(), "wrote output");
    Ok(())
}
