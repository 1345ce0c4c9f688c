use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{Result, types::TokenBundle};

/// Single-record token cache, `.cache/tokens` by default.
///
/// A missing or unreadable record is a cache miss, never an error.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &digger_config::CacheConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<TokenBundle> {
        let path = self.path.display().to_string();
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "token cache not found");
                return None;
            },
            Err(e) => {
                warn!(path = %path, error = %e, "token cache read failed");
                return None;
            },
        };

        match serde_json::from_str::<TokenBundle>(&data) {
            Ok(bundle) => {
                debug!(path = %path, "cached token loaded");
                Some(bundle)
            },
            Err(e) => {
                warn!(path = %path, error = %e, "token cache is corrupt, ignoring it");
                None
            },
        }
    }

    /// Replace the record atomically via temp file + rename.
    pub fn save(&self, bundle: &TokenBundle) -> Result<()> {
        let path = self.path.display().to_string();
        debug!(path = %path, "saving token cache");

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        let data = serde_json::to_string_pretty(bundle)?;
        std::fs::write(&tmp, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(path = %path, "token cache saved");
        Ok(())
    }

    /// Remove the record. Succeeds when nothing is cached.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token cache cleared");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tokens".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
