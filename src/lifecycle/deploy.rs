use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tera::Context;

use crate::config::Mode;
use crate::error::{Error, Result};
use crate::project::{Plugin, Project, TemplateSource, VariableStore, find_template, render};

use super::commands::{apply_command, head_commit_command, image_reference, login_command, push_command};
use super::orchestrator::Lifecycle;
use super::types::{REGISTRY_VARIABLES, RegistryCredentials};

const DEPLOYMENT_FILE: &str = "deployment.yaml";
const DEPLOYMENT_TEMPLATE: &str = "kubernetes/deployment.yaml";

impl Lifecycle {
    /// Build the production image, tag it for the registry and push it.
    /// Returns the pushed image reference.
    pub fn publish(&self, project: &Project, plugin: &Plugin) -> Result<String> {
        self.publish_with_credentials(project, plugin)
            .map(|(image_ref, _)| image_ref)
    }

    fn publish_with_credentials(&self, project: &Project, plugin: &Plugin) -> Result<(String, RegistryCredentials)> {
        let mut store = VariableStore::load(project.path())?.read_only(self.options.dry_run);
        let values = store.resolve(&REGISTRY_VARIABLES, self.prompter.as_ref(), self.options.interactive)?;
        let creds = RegistryCredentials::from_variables(values)?;

        let head = head_commit_command(&self.config, project.path());
        let command = head.display();
        let commit = self.exec(head)?.stdout.trim().to_string();
        if commit.is_empty() {
            return Err(Error::UnexpectedOutput {
                command,
                expected: "commit hash",
            });
        }

        let image_ref = image_reference(
            &creds.host,
            &creds.repository,
            project.application(),
            project.name(),
            &commit,
        );
        // The registry tag is new for every commit, so the build policy does
        // not apply.
        self.build_image(project, plugin, Mode::Prod, std::slice::from_ref(&image_ref))?;

        tracing::info!("Logging in to {}", creds.host);
        self.exec(login_command(&self.config, &creds.host, &creds.username, &creds.password))?;
        tracing::info!("Pushing {image_ref}");
        self.exec_visible(push_command(&self.config, &image_ref))?;
        tracing::info!(image = %image_ref, "Published");
        Ok((image_ref, creds))
    }

    /// Publish, then apply the rendered deployment to the platform.
    /// Returns the deployed image reference.
    pub fn deploy(&self, project: &Project, plugin: &Plugin) -> Result<String> {
        let (image_ref, creds) = self.publish_with_credentials(project, plugin)?;

        let mut context = project.template_context();
        context.insert("imageRef", &image_ref);
        context.insert("dockerConfigSecret", &docker_config_secret(&creds));
        let manifest = deployment_manifest(project, plugin, &context)?;
        check_yaml(&manifest)?;
        tracing::debug!("applying deployment:\n{manifest}");

        tracing::info!("Deploying {image_ref}");
        self.exec_visible(apply_command(&self.config, manifest))?;
        Ok(image_ref)
    }

    /// Write the rendered Dockerfiles and deployment into the project so they
    /// can be customised. Nothing is executed. In a dry run the files are
    /// printed instead.
    pub fn eject(&self, project: &Project, plugin: &Plugin, force: bool) -> Result<Vec<PathBuf>> {
        let root = [plugin.template_root()];
        let mut outputs: Vec<(PathBuf, TemplateSource)> = Vec::new();
        for mode in Mode::ALL {
            let mode_template = format!("docker/Dockerfile-{mode}");
            let template = find_template(&root, &[mode_template.as_str(), "docker/Dockerfile"])?
                .ok_or_else(|| missing_template(plugin, &mode_template))?;
            outputs.push((project.path().join(format!("Dockerfile-{mode}")), template));
        }
        let deployment = find_template(&root, &[DEPLOYMENT_TEMPLATE])?
            .ok_or_else(|| missing_template(plugin, DEPLOYMENT_TEMPLATE))?;
        outputs.push((project.path().join(DEPLOYMENT_FILE), deployment));

        if !force
            && let Some((existing, _)) = outputs.iter().find(|(path, _)| path.exists())
        {
            return Err(Error::config(format!(
                "{} already exists; pass --force to overwrite",
                existing.display()
            )));
        }

        // Placeholders survive so a later deploy can fill them in.
        let mut context = project.template_context();
        context.insert("imageRef", "{{ imageRef }}");
        context.insert("dockerConfigSecret", "{{ dockerConfigSecret }}");

        let mut written = Vec::with_capacity(outputs.len());
        for (target, template) in outputs {
            let body = render(&template.path, &template.body, &context)?;
            if self.options.dry_run {
                println!("{}", target.display());
                for line in body.lines() {
                    println!("  | {line}");
                }
            } else {
                std::fs::write(&target, body)?;
                tracing::info!("Wrote {}", target.display());
            }
            written.push(target);
        }
        Ok(written)
    }
}

fn missing_template(plugin: &Plugin, name: &str) -> Error {
    Error::config(format!(
        "plugin templates at {} have no {name}",
        plugin.template_root().display()
    ))
}

/// An ejected `deployment.yaml` in the project wins over the plugin template.
fn deployment_manifest(project: &Project, plugin: &Plugin, context: &Context) -> Result<String> {
    let roots = [project.path().to_path_buf(), plugin.template_root()];
    let candidates = [DEPLOYMENT_FILE, DEPLOYMENT_TEMPLATE];
    let template = find_template(&roots, &candidates)?
        .ok_or_else(|| missing_template(plugin, DEPLOYMENT_TEMPLATE))?;
    render(&template.path, &template.body, context)
}

/// Base64 of `{"auths": {<host>: {"auth": base64(<user>:<password>)}}}`.
pub fn docker_config_secret(creds: &RegistryCredentials) -> String {
    let auth = STANDARD.encode(format!("{}:{}", creds.username, creds.password));
    let config = serde_json::json!({
        "auths": { (creds.host.clone()): { "auth": auth } }
    });
    STANDARD.encode(config.to_string())
}

fn check_yaml(manifest: &str) -> Result<()> {
    for document in serde_yaml::Deserializer::from_str(manifest) {
        serde_yaml::Value::deserialize(document).map_err(|source| Error::Yaml {
            what: "deployment manifest".to_string(),
            source,
        })?;
    }
    Ok(())
}
