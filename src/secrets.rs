use anyhow::{anyhow, Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct EnvStore;

impl SecretStore for EnvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Secrets read once from a private dotenv-style file.
pub struct EnvFileStore {
    map: HashMap<String, String>,
}

impl EnvFileStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_private_file(&path)?;

        let mut map = HashMap::new();
        let iter = dotenvy::from_path_iter(&path)
            .with_context(|| format!("failed reading secrets file: {}", path.display()))?;
        for item in iter {
            let (k, v) =
                item.with_context(|| format!("failed parsing secrets file: {}", path.display()))?;
            if !v.is_empty() {
                map.insert(k, v);
            }
        }

        Ok(Self { map })
    }
}

impl SecretStore for EnvFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }
}

/// First store with a value wins.
pub struct CompositeStore {
    stores: Vec<Box<dyn SecretStore>>,
}

impl CompositeStore {
    pub fn new(stores: Vec<Box<dyn SecretStore>>) -> Self {
        Self { stores }
    }
}

impl SecretStore for CompositeStore {
    fn get(&self, key: &str) -> Option<String> {
        self.stores.iter().find_map(|s| s.get(key))
    }
}

/// Refuse secrets files readable by group/others, or living in a directory that is.
pub fn ensure_private_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("secrets file not found: {}", path.display()));
    }

    #[cfg(unix)]
    {
        let meta = fs::metadata(path)?;
        let mode = meta.mode() & 0o777;
        if (mode & 0o077) != 0 {
            return Err(anyhow!(
                "secrets file permissions too open (need 600): {} has mode {:o}",
                path.display(),
                mode
            ));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let pmode = fs::metadata(parent)?.mode() & 0o777;
            if (pmode & 0o077) != 0 {
                return Err(anyhow!(
                    "secrets dir permissions too open (need 700): {} has mode {:o}",
                    parent.display(),
                    pmode
                ));
            }
        }
    }

    #[cfg(not(unix))]
    let _ = fs::metadata(path)?;

    Ok(())
}
