use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

use super::manifest::Project;

pub const PLUGIN_MANIFEST: &str = "plugin.json";

/// Prefix marking a plugin path as relative to the plugins directory.
const PLUGINS_DIR_PREFIX: &str = "^/";

/// A directory shared between the host and the dev container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedDirectory {
    /// Relative to the project directory.
    pub host: String,
    /// Absolute path inside the container.
    pub container: String,
}

/// Contents of `plugin.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginManifest {
    #[serde(default = "default_schema")]
    pub schema: u32,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub shared_directories: Vec<SharedDirectory>,
    #[serde(default = "default_template_root")]
    pub template_root: String,
}

fn default_schema() -> u32 {
    1
}

fn default_template_root() -> String {
    "templates".to_string()
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            kind: None,
            shared_directories: Vec::new(),
            template_root: default_template_root(),
        }
    }
}

/// A locally available plugin. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Plugin {
    path: PathBuf,
    manifest: PluginManifest,
}

impl Plugin {
    /// Locate the project's plugin on disk and load it.
    pub fn resolve(project: &Project, config: &Config) -> Result<Self> {
        let path = plugin_path(project, config)?;
        if !path.is_dir() {
            return Err(Error::config(format!(
                "plugin not found at {}; install it there or set `localPluginPath` in the project manifest",
                path.display()
            )));
        }
        Self::load(&path)
    }

    /// Load the plugin at `path`. A missing `plugin.json` means all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest_path = path.join(PLUGIN_MANIFEST);
        let manifest = if manifest_path.is_file() {
            let contents = std::fs::read_to_string(&manifest_path)?;
            serde_json::from_str(&contents).map_err(|source| Error::Manifest {
                path: manifest_path.clone(),
                source,
            })?
        } else {
            PluginManifest::default()
        };
        tracing::debug!(path = %path.display(), "using plugin");
        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn shared_directories(&self) -> &[SharedDirectory] {
        &self.manifest.shared_directories
    }

    /// Directory template lookups start from.
    pub fn template_root(&self) -> PathBuf {
        self.path.join(&self.manifest.template_root)
    }
}

fn plugin_path(project: &Project, config: &Config) -> Result<PathBuf> {
    let manifest = project.manifest();
    if let Some(local) = manifest.local_plugin_path.as_deref() {
        if let Some(rest) = local.strip_prefix(PLUGINS_DIR_PREFIX) {
            return Ok(plugins_dir(config)?.join(rest));
        }
        let local = Path::new(local);
        return Ok(if local.is_absolute() {
            local.to_path_buf()
        } else {
            project.path().join(local)
        });
    }

    let dir_name = match (manifest.plugin_url.as_deref(), manifest.kind.as_deref()) {
        (Some(url), _) => url_dir_name(url),
        (None, Some(kind)) => format!("plugin-{kind}"),
        (None, None) => {
            return Err(Error::config(
                "project manifest names no plugin; set `localPluginPath`, `pluginUrl` or `type`",
            ));
        }
    };
    Ok(plugins_dir(config)?.join(dir_name))
}

fn plugins_dir(config: &Config) -> Result<PathBuf> {
    config
        .plugins_dir()
        .ok_or_else(|| Error::config("Failed to determine local plugin path: no user data directory"))
}

/// `https://host/org/plugin-nodejs.git` -> `plugin-nodejs`.
fn url_dir_name(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}
