use std::path::{Path, PathBuf};

use serde::Deserialize;
use sioc_core::EngineConfig;

use crate::SiocError;

pub const CONFIG_FILE_NAME: &str = "sioc.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiocToml {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: SiocTomlLog,
    #[serde(default)]
    pub startup: SiocTomlStartup,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiocTomlLog {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiocTomlStartup {
    /// Files evaluated before anything on the command line, relative to the
    /// directory holding the config file.
    #[serde(default)]
    pub preload: Vec<PathBuf>,
}

pub fn read_sioc_toml(path: &Path) -> Result<SiocToml, SiocError> {
    let text = std::fs::read_to_string(path)?;
    let config: SiocToml = toml::from_str(&text)
        .map_err(|err| SiocError::Config(format!("failed to parse {}: {err}", path.display())))?;
    if config.engine.root_scope_name.is_empty() {
        return Err(SiocError::Config(format!(
            "{}: engine.root_scope_name must not be empty",
            path.display()
        )));
    }
    Ok(config)
}

/// `sioc.toml` in `dir`, if there is one.
pub fn find_sioc_toml(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}
