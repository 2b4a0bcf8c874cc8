// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the engine configuration and the
//! gazetteer from files.

use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Config, Gazetteer};

/// Load configuration from a TOML file and validate it.
///
/// Falls back to defaults if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration in {path:?}: {e}")))?;
    Ok(config)
}

/// Load the gazetteer named by `paths.gazetteer_file`, resolved against
/// `base_path`, or the built-in one.
///
/// A configured file that cannot be loaded is fatal: posts must not be
/// located against the wrong reference data.
pub fn load_gazetteer(config: &Config, base_path: &Path) -> Result<Gazetteer> {
    let Some(file) = &config.paths.gazetteer_file else {
        log::info!("Using built-in gazetteer");
        return Ok(Gazetteer::builtin());
    };

    let path = base_path.join(file);
    let gazetteer = Gazetteer::load(&path).map_err(|e| match e {
        AppError::GazetteerUnavailable(_) => e,
        other => AppError::GazetteerUnavailable(format!("{}: {}", path.display(), other)),
    })?;
    log::info!(
        "Loaded gazetteer from {}: {} districts, {} metro stations",
        path.display(),
        gazetteer.districts().len(),
        gazetteer.metro_stations().len()
    );
    Ok(gazetteer)
}

/// Load and validate configuration and gazetteer under `base_path`.
pub fn load_all(base_path: &Path) -> Result<(Config, Arc<Gazetteer>)> {
    let config = load_config(&base_path.join("data/config.toml"))?;
    let gazetteer = load_gazetteer(&config, base_path)?;
    Ok((config, Arc::new(gazetteer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let (config, gazetteer) = load_all(tmp.path()).unwrap();
        assert_eq!(config.dedup.window_days, 14);
        assert!(!gazetteer.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(
            tmp.path().join("data/config.toml"),
            "[dedup]\nsimilarity_threshold = 1.5\n",
        )
        .unwrap();
        assert!(matches!(load_all(tmp.path()), Err(AppError::Config(_))));
    }

    #[test]
    fn test_configured_gazetteer_must_load() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(
            tmp.path().join("data/config.toml"),
            "[paths]\ngazetteer_file = \"data/missing.toml\"\n",
        )
        .unwrap();
        assert!(matches!(
            load_all(tmp.path()),
            Err(AppError::GazetteerUnavailable(_))
        ));
    }
}
