use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build variant, embedded in the canonical `<name>:<mode>` image tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Dev,
    Prod,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Dev, Mode::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When `build` invokes the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPolicy {
    /// Rebuild on every request.
    #[default]
    Always,
    /// Skip the build when `<name>:<mode>` already exists, unless forced.
    Missing,
}

/// Tool configuration, read from `.berthrc` in the project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Container engine binary.
    pub engine: String,
    /// Orchestration platform binary.
    pub platform: String,
    /// Version-control binary.
    pub vcs: String,
    /// Append `:z` to shared volume mounts so SELinux hosts relabel them.
    pub selinux_relabel: bool,
    /// Label used to select a project's pods.
    pub pod_label: String,
    /// Where `^/`-prefixed plugin paths resolve. Defaults to the user data
    /// directory.
    pub plugins_dir: Option<PathBuf>,
    pub build_policy: BuildPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: "docker".to_string(),
            platform: "kubectl".to_string(),
            vcs: "git".to_string(),
            selinux_relabel: true,
            pod_label: "app".to_string(),
            plugins_dir: None,
            build_policy: BuildPolicy::Always,
        }
    }
}

impl Config {
    pub fn plugins_dir(&self) -> Option<PathBuf> {
        self.plugins_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("berth").join("plugins")))
    }
}
