use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tera::Context;

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "berth.json";

const SCHEMA_VERSION: u32 = 1;

/// Contents of `berth.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectManifest {
    #[serde(default = "default_schema")]
    pub schema: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_plugin_path: Option<String>,
    /// Free-form values handed to template expansion.
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_schema() -> u32 {
    SCHEMA_VERSION
}

/// A loaded project: its directory and validated manifest.
#[derive(Debug, Clone)]
pub struct Project {
    path: PathBuf,
    manifest: ProjectManifest,
}

impl Project {
    /// Read and validate `berth.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::config(format!(
                "no {MANIFEST_FILE} found in {}",
                dir.display()
            )));
        }
        let contents = std::fs::read_to_string(&path)?;
        let manifest: ProjectManifest =
            serde_json::from_str(&contents).map_err(|source| Error::Manifest {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), name = %manifest.name, "loaded project manifest");
        Self::new(dir, manifest)
    }

    pub fn new(dir: &Path, manifest: ProjectManifest) -> Result<Self> {
        validate(&manifest)?;
        Ok(Self {
            path: dir.to_path_buf(),
            manifest,
        })
    }

    /// Project identity, used verbatim as image repository and pod label.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Registry path segment; falls back to the project name.
    pub fn application(&self) -> &str {
        self.manifest
            .application
            .as_deref()
            .unwrap_or(&self.manifest.name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    /// Template context: the manifest's `data` plus `PROJECT_NAME`.
    pub fn template_context(&self) -> Context {
        let mut context = Context::new();
        for (key, value) in &self.manifest.data {
            context.insert(key.as_str(), value);
        }
        context.insert("PROJECT_NAME", &self.manifest.name);
        context
    }
}

fn validate(manifest: &ProjectManifest) -> Result<()> {
    if manifest.schema != SCHEMA_VERSION {
        return Err(Error::config(format!(
            "unsupported {MANIFEST_FILE} schema {} (expected {SCHEMA_VERSION})",
            manifest.schema
        )));
    }
    let name = manifest.name.as_str();
    if name.trim().is_empty() {
        return Err(Error::config(format!("{MANIFEST_FILE}: `name` must not be empty")));
    }
    // Engines reject repository names outside this set.
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(Error::config(format!(
            "{MANIFEST_FILE}: name `{name}` may only contain lowercase letters, digits, `-`, `_` and `.`"
        )));
    }
    Ok(())
}
