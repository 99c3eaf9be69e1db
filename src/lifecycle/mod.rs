pub mod commands;
mod deploy;
mod orchestrator;
mod types;

pub use deploy::docker_config_secret;
pub use orchestrator::Lifecycle;
pub use types::{Options, REGISTRY_VARIABLES, RegistryCredentials};
