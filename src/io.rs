use crate::model::Config;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Charge le fichier déclaratif YAML (équipes, utilisateurs, gardes).
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        serde_yaml::from_slice(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
