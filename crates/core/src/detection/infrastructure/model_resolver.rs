use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::MODEL_ENV_VAR;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("model {name} not found; searched {searched:?} (set FACECAM_MODEL or pass a path)")]
    NotFound { name: String, searched: Vec<PathBuf> },
}

/// Locate a detector model on disk.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. `FACECAM_MODEL` environment variable (must exist when set)
/// 3. User cache directory (platform-specific)
/// 4. Bundled directory (for development / pre-packaged installs)
pub fn resolve(
    name: &str,
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    let env_path = std::env::var_os(MODEL_ENV_VAR).map(PathBuf::from);
    resolve_from(name, explicit, env_path.as_deref(), model_cache_dir(), bundled_dir)
}

fn resolve_from(
    name: &str,
    explicit: Option<&Path>,
    env_path: Option<&Path>,
    cache_dir: Option<PathBuf>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(pinned) = explicit.or(env_path) {
        return if pinned.is_file() {
            Ok(pinned.to_path_buf())
        } else {
            Err(ModelResolveError::Missing(pinned.to_path_buf()))
        };
    }

    let searched: Vec<PathBuf> = cache_dir
        .into_iter()
        .chain(bundled_dir.map(Path::to_path_buf))
        .map(|dir| dir.join(name))
        .collect();

    match searched.iter().find(|p| p.is_file()) {
        Some(found) => {
            log::debug!("Resolved model {name} at {}", found.display());
            Ok(found.clone())
        }
        None => Err(ModelResolveError::NotFound {
            name: name.to_string(),
            searched,
        }),
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/facecam/models/`
/// - Linux: `$XDG_CACHE_HOME/facecam/models/` or `~/.cache/facecam/models/`
/// - Windows: `%LOCALAPPDATA%/facecam/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("facecam").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("facecam").join("models"))
    }
}
