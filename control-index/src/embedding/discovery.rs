//! Model cache discovery
//!
//! Finds where downloaded embedding models live across installation scenarios.

use std::path::{Path, PathBuf};

/// Environment variable pointing at a shared model cache
pub const MODELS_PATH_ENV: &str = "CONTROLS_MODELS_PATH";

/// Find the model cache directory with priority:
/// 1. Explicit configuration value
/// 2. CONTROLS_MODELS_PATH environment variable
/// 3. User home directory (~/.controls/models), if it exists
///
/// `None` leaves the choice to the embedding backend.
pub fn find_model_cache_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    let env_value = std::env::var(MODELS_PATH_ENV).ok();
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    resolve_cache_dir(explicit, env_value.as_deref(), home.as_deref())
}

fn resolve_cache_dir(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(models_path) = env_value.filter(|v| !v.is_empty()) {
        log::debug!("Using {}: {}", MODELS_PATH_ENV, models_path);
        return Some(PathBuf::from(models_path));
    }

    let user_path = home?.join(".controls").join("models");
    user_path.is_dir().then_some(user_path)
}
