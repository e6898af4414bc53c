use std::path::{Path, PathBuf};

use anyhow::Context;
use rfv_types::ExclusionSet;
use rfv_verify::VerifierConfig;
use serde::{Deserialize, Serialize};

use crate::cli::{FilterArgs, RemoteArgs};

/// Contents of an `rfv` TOML configuration file.
///
/// ```toml
/// [store]
/// root = "/mnt/buckets"
///
/// [verify]
/// algorithm = "md5"
/// concurrency = 16
///
/// [verify.exclusions]
/// names = [".gitkeep"]
/// paths = ["ocfl_1.1.md", "ocfl_1.0.txt"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub verify: VerifierConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory whose subdirectories are buckets.
    pub root: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load the file named by `--config`, or defaults, then apply the
    /// exclusion flags on top.
    pub fn resolve(filter: &FilterArgs) -> anyhow::Result<Self> {
        let mut settings = match &filter.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if filter.no_default_exclusions {
            settings.verify.exclusions = ExclusionSet::empty();
        }
        let mut extra = ExclusionSet::empty();
        for name in &filter.exclude_names {
            extra = extra.with_name(name.clone());
        }
        for path in &filter.exclude_paths {
            extra = extra.with_path(path.clone());
        }
        settings.verify.exclusions.extend(extra);
        Ok(settings)
    }

    /// The bucket root directory, from the flag or the config file.
    pub fn store_root(&self, remote: &RemoteArgs) -> anyhow::Result<PathBuf> {
        remote
            .store_root
            .clone()
            .or_else(|| self.store.root.clone())
            .context("no store root: pass --store-root or set [store] root in the config file")
    }
}
