use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::project::VariableSpec;

/// Flags that shape every lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Prompt for missing variables instead of failing.
    pub interactive: bool,
    /// Echo every tool call and its output, queries included.
    pub debug: bool,
    /// Keep tool output off the terminal unless `debug` is set.
    pub quiet: bool,
    /// Rebuild even when the build policy would skip.
    pub force: bool,
    /// Leave the project directory untouched: files that would be written
    /// are printed and prompted values are not saved.
    pub dry_run: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interactive: true,
            debug: false,
            quiet: false,
            force: false,
            dry_run: false,
        }
    }
}

/// Variables `publish` needs, prompted in this order.
pub const REGISTRY_VARIABLES: [VariableSpec; 4] = [
    VariableSpec {
        name: "docker.registry.host",
        message: "Container registry host",
        sensitive: false,
    },
    VariableSpec {
        name: "docker.registry.repository",
        message: "Container registry repository",
        sensitive: false,
    },
    VariableSpec {
        name: "docker.registry.username",
        message: "Container registry user name",
        sensitive: false,
    },
    VariableSpec {
        name: "docker.registry.password",
        message: "Container registry password",
        sensitive: true,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub host: String,
    pub repository: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    pub(crate) fn from_variables(mut values: BTreeMap<String, String>) -> Result<Self> {
        let mut take = |name: &str| {
            values
                .remove(name)
                .ok_or_else(|| Error::config(format!("variable `{name}` is not set")))
        };
        Ok(Self {
            host: take("docker.registry.host")?,
            repository: take("docker.registry.repository")?,
            username: take("docker.registry.username")?,
            password: take("docker.registry.password")?,
        })
    }
}
