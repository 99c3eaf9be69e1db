// Project and plugin manifests, templates and the per-project variable store.

mod manifest;
mod plugin;
mod template;
mod variables;

pub use manifest::{MANIFEST_FILE, Project, ProjectManifest};
pub use plugin::{PLUGIN_MANIFEST, Plugin, PluginManifest, SharedDirectory};
pub use template::{TemplateSource, find_template, render};
pub use variables::{VARIABLES_FILE, VariableSpec, VariableStore};
