use crate::config::{Config, Mode};
use crate::error::{Error, Result};
use crate::process::{CommandRunner, Invocation};

use super::parse::parse_json_lines;
use super::records::{ContainerRecord, ImageRecord, PodList, PodRecord};

const JSON_FORMAT: &str = "{{json .}}";

/// Read-only view of engine and platform state for a project.
///
/// Nothing is cached; every call re-queries the tools.
pub struct ResourceQuery<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a Config,
    echo: bool,
}

impl<'a> ResourceQuery<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a Config) -> Self {
        Self {
            runner,
            config,
            echo: false,
        }
    }

    /// Echo query commands and their raw output (debug mode).
    pub fn echo(mut self, on: bool) -> Self {
        self.echo = on;
        self
    }

    fn invocation(&self, program: &str, args: &[&str]) -> Invocation {
        Invocation::new(program, args.iter().copied())
            .echo_command(self.echo)
            .echo_output(self.echo)
    }

    pub fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let inv = self.invocation(&self.config.engine, &["image", "ls", "--format", JSON_FORMAT]);
        let result = self.runner.invoke(&inv)?;
        Ok(parse_json_lines(&result.stdout))
    }

    pub fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let inv = self.invocation(
            &self.config.engine,
            &["container", "ls", "--format", JSON_FORMAT],
        );
        let result = self.runner.invoke(&inv)?;
        Ok(parse_json_lines(&result.stdout))
    }

    pub fn list_project_images(&self, identity: &str, mode: Option<Mode>) -> Result<Vec<ImageRecord>> {
        Ok(filter_project_images(self.list_images()?, identity, mode))
    }

    pub fn list_project_containers(&self, identity: &str) -> Result<Vec<ContainerRecord>> {
        Ok(filter_project_containers(self.list_containers()?, identity))
    }

    /// The project's running container, if any.
    ///
    /// More than one match breaks the one-instance-per-project invariant and
    /// is reported instead of picking one.
    pub fn find_single_container(&self, identity: &str) -> Result<Option<ContainerRecord>> {
        let matches = self.list_project_containers(identity)?;
        single("container", identity, matches, |c| c.id.clone())
    }

    /// Pods labelled with the project's identity.
    pub fn list_pods(&self, identity: &str) -> Result<Vec<PodRecord>> {
        let selector = format!("{}={identity}", self.config.pod_label);
        let inv = self.invocation(
            &self.config.platform,
            &["get", "pods", "-l", &selector, "-o", "json"],
        );
        let result = self.runner.invoke(&inv)?;
        if result.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: PodList = serde_json::from_str(&result.stdout).map_err(|source| Error::Parse {
            what: "pod list".to_string(),
            source,
        })?;
        Ok(list.items)
    }

    pub fn find_single_pod(&self, identity: &str) -> Result<Option<PodRecord>> {
        let matches = self.list_pods(identity)?;
        single("pod", identity, matches, |p| p.name.clone())
    }
}

/// Images whose repository is exactly the project name, optionally of one mode.
pub fn filter_project_images(images: Vec<ImageRecord>, identity: &str, mode: Option<Mode>) -> Vec<ImageRecord> {
    images
        .into_iter()
        .filter(|image| image.repository == identity)
        .filter(|image| mode.is_none_or(|m| image.tag == m.as_str()))
        .collect()
}

/// Containers started from one of the project's images (`<name>` or
/// `<name>:<tag>`).
pub fn filter_project_containers(containers: Vec<ContainerRecord>, identity: &str) -> Vec<ContainerRecord> {
    containers
        .into_iter()
        .filter(|container| belongs_to(&container.image, identity))
        .collect()
}

fn belongs_to(image: &str, identity: &str) -> bool {
    match image.strip_prefix(identity) {
        Some(rest) => rest.is_empty() || rest.starts_with(':'),
        None => false,
    }
}

fn single<T>(kind: &'static str, identity: &str, mut matches: Vec<T>, id: impl Fn(&T) -> String) -> Result<Option<T>> {
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => Err(Error::ResourceAmbiguity {
            kind,
            identity: identity.to_string(),
            ids: matches.iter().map(id).collect(),
        }),
    }
}
