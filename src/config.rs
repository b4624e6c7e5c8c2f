use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `palimpsest.toml`; CLI flags override every field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PalimpsestConfig {
    /// Where IR files, emitted artifacts and blobs go
    pub output_dir: Option<String>,
    /// Indent IR JSON
    pub pretty_ir: bool,
    /// Batch worker count (defaults to available parallelism)
    pub workers: Option<usize>,
    /// Extra gitignore-style patterns excluded from walks
    pub exclude: Vec<String>,
    /// Format emitted by `convert` and `batch` when none is given
    pub default_target: Option<String>,
}

impl PalimpsestConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_output_dir)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("palimpsest.toml")
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from(".palimpsest")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PalimpsestConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: PalimpsestConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &PalimpsestConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("palimpsest.toml").as_path())).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palimpsest.toml");
        let config = PalimpsestConfig {
            output_dir: Some("build/ir".to_string()),
            pretty_ir: true,
            workers: Some(4),
            exclude: vec!["drafts/".to_string()],
            default_target: Some("osis".to_string()),
        };
        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(path.as_path())).unwrap(), Some(config.clone()));

        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &PalimpsestConfig::default(), true).unwrap();
        assert_eq!(load_config(Some(path.as_path())).unwrap().unwrap().output_dir(), default_output_dir());
    }

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palimpsest.toml");
        std::fs::write(&path, "pretty_ir = true\n").unwrap();
        let config = load_config(Some(path.as_path())).unwrap().unwrap();
        assert!(config.pretty_ir);
        assert!(config.exclude.is_empty());
    }
}
