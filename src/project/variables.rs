use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::prompt::Prompter;

/// Per-project variable file. Values are stored unencrypted.
pub const VARIABLES_FILE: &str = ".berth/variables.json";

/// A variable an operation needs before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSpec {
    /// Dotted path into the variable file, e.g. `docker.registry.host`.
    pub name: &'static str,
    pub message: &'static str,
    /// Read without echo.
    pub sensitive: bool,
}

/// Nested JSON values persisted in the project directory.
#[derive(Debug, Clone)]
pub struct VariableStore {
    path: PathBuf,
    values: Map<String, Value>,
    read_only: bool,
}

impl VariableStore {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(VARIABLES_FILE);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no variables file");
            return Ok(Self {
                path,
                values: Map::new(),
                read_only: false,
            });
        }

        let contents = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| Error::Parse {
            what: path.display().to_string(),
            source,
        })?;
        let Value::Object(values) = value else {
            return Err(Error::config(format!("{} must hold a JSON object", path.display())));
        };
        tracing::debug!(path = %path.display(), "loaded variables");
        Ok(Self {
            path,
            values,
            read_only: false,
        })
    }

    /// Keep prompted answers in memory only; [`resolve`](Self::resolve) never
    /// writes the file.
    pub fn read_only(mut self, on: bool) -> Self {
        self.read_only = on;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a dotted name. Only string leaves count as set.
    pub fn get(&self, name: &str) -> Option<&str> {
        let mut parts = name.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        current.as_str()
    }

    /// Set a dotted name, creating intermediate objects and replacing any
    /// non-object value in the way.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let mut parts: Vec<&str> = name.split('.').collect();
        let Some(leaf) = parts.pop() else { return };
        let mut current = &mut self.values;
        for part in parts {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Some(map) = entry.as_object_mut() else { return };
            current = map;
        }
        current.insert(leaf.to_string(), Value::String(value.into()));
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values).map_err(|source| Error::Parse {
            what: "variables".to_string(),
            source,
        })?;
        std::fs::write(&self.path, json + "\n")?;
        Ok(())
    }

    /// Values for every spec, prompting in order for the ones not yet stored.
    ///
    /// Answers are persisted once all prompts are done, unless the store is
    /// read-only. With `interactive` off, the first missing value is an error
    /// and nothing is written.
    pub fn resolve(
        &mut self,
        specs: &[VariableSpec],
        prompter: &dyn Prompter,
        interactive: bool,
    ) -> Result<BTreeMap<String, String>> {
        let mut prompted = false;
        for spec in specs {
            if self.get(spec.name).is_some() {
                continue;
            }
            if !interactive {
                return Err(Error::InteractiveInputRequired {
                    name: spec.name.to_string(),
                });
            }
            let answer = prompter.ask(spec.message, spec.sensitive)?;
            self.set(spec.name, answer);
            prompted = true;
        }
        if prompted && self.read_only {
            tracing::info!(path = %self.path.display(), "not saving variables");
        } else if prompted {
            self.save()?;
            tracing::info!(path = %self.path.display(), "saved variables");
        }

        Ok(specs
            .iter()
            .filter_map(|spec| Some((spec.name.to_string(), self.get(spec.name)?.to_string())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;

    const SPECS: [VariableSpec; 2] = [
        VariableSpec {
            name: "docker.registry.host",
            message: "Registry host",
            sensitive: false,
        },
        VariableSpec {
            name: "docker.registry.password",
            message: "Registry password",
            sensitive: true,
        },
    ];

    #[test]
    fn dotted_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        store.set("docker.registry.host", "registry.example.com");
        store.set("docker.registry.username", "me");

        assert_eq!(store.get("docker.registry.host"), Some("registry.example.com"));
        assert_eq!(store.get("docker.registry.username"), Some("me"));
        assert_eq!(store.get("docker.registry"), None);
        assert_eq!(store.get("docker.missing.host"), None);
    }

    #[test]
    fn set_replaces_scalar_in_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        store.set("docker", "flat");
        store.set("docker.registry.host", "h");
        assert_eq!(store.get("docker.registry.host"), Some("h"));
    }

    #[test]
    fn values_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        store.set("docker.registry.host", "h");
        store.save().unwrap();

        let reloaded = VariableStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.get("docker.registry.host"), Some("h"));
        let raw = std::fs::read_to_string(dir.path().join(VARIABLES_FILE)).unwrap();
        assert!(raw.contains("\"registry\""));
    }

    #[test]
    fn resolve_prompts_only_for_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        store.set("docker.registry.host", "cached");
        let prompter = ScriptedPrompter::new(["secret"]);

        let values = store.resolve(&SPECS, &prompter, true).unwrap();
        assert_eq!(prompter.asked(), ["Registry password"]);
        assert_eq!(values["docker.registry.host"], "cached");
        assert_eq!(values["docker.registry.password"], "secret");

        let reloaded = VariableStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.get("docker.registry.password"), Some("secret"));
    }

    #[test]
    fn nothing_missing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        store.set("docker.registry.host", "h");
        store.set("docker.registry.password", "p");

        store.resolve(&SPECS, &ScriptedPrompter::default(), false).unwrap();
        assert!(!dir.path().join(VARIABLES_FILE).exists());
    }

    #[test]
    fn non_interactive_names_the_first_missing_variable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap();
        let prompter = ScriptedPrompter::new(["unused"]);

        match store.resolve(&SPECS, &prompter, false) {
            Err(Error::InteractiveInputRequired { name }) => assert_eq!(name, "docker.registry.host"),
            other => panic!("expected InteractiveInputRequired, got {other:?}"),
        }
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn read_only_store_answers_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VariableStore::load(dir.path()).unwrap().read_only(true);
        let prompter = ScriptedPrompter::new(["h", "p"]);

        let values = store.resolve(&SPECS, &prompter, true).unwrap();
        assert_eq!(values["docker.registry.host"], "h");
        assert_eq!(values["docker.registry.password"], "p");
        assert!(!dir.path().join(VARIABLES_FILE).exists());
    }

    #[test]
    fn non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".berth")).unwrap();
        std::fs::write(dir.path().join(VARIABLES_FILE), "[1, 2]").unwrap();
        assert!(matches!(VariableStore::load(dir.path()), Err(Error::Configuration(_))));
    }
}
