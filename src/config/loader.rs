use std::path::Path;

use anyhow::Context;

use super::types::Config;

pub const CONFIG_FILE: &str = ".berthrc";

impl Config {
    /// Load config from a `.berthrc` file in the given directory.
    pub fn load(dir: &Path) -> anyhow::Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(Some(config))
    }
}

/// Configuration for `dir`, falling back to defaults when no file exists.
pub fn load(dir: &Path) -> anyhow::Result<Config> {
    Ok(Config::load(dir)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path()).unwrap().is_none());
        assert_eq!(load(dir.path()).unwrap().engine, "docker");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "engine: podman\nselinux_relabel: false\n",
        )
        .unwrap();

        let cfg = load(dir.path()).unwrap();
        assert_eq!(cfg.engine, "podman");
        assert!(!cfg.selinux_relabel);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "engine: [unterminated\n").unwrap();

        let err = load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE));
    }
}
