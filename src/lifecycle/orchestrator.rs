use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Context;

use crate::config::{BuildPolicy, Config, Mode};
use crate::error::{Error, Result};
use crate::interrupt::InterruptController;
use crate::process::{CommandRunner, Invocation, ProcessResult};
use crate::project::{Plugin, Project, find_template, render};
use crate::prompt::Prompter;
use crate::resources::{ResourceQuery, render_table};

use super::commands::{
    build_command, image_tag, logs_command, pod_logs_command, remove_command, remove_image_command,
    run_command, stop_command,
};
use super::types::Options;

/// Composes tool calls into project lifecycle operations.
///
/// Holds no resource state: every operation re-queries the engine or platform.
#[derive(Clone)]
pub struct Lifecycle {
    pub(super) runner: Arc<dyn CommandRunner>,
    pub(super) interrupts: InterruptController,
    pub(super) prompter: Arc<dyn Prompter>,
    pub(super) config: Config,
    pub(super) options: Options,
}

impl Lifecycle {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        interrupts: InterruptController,
        prompter: Arc<dyn Prompter>,
        config: Config,
        options: Options,
    ) -> Self {
        Self {
            runner,
            interrupts,
            prompter,
            config,
            options,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    pub(super) fn query(&self) -> ResourceQuery<'_> {
        ResourceQuery::new(self.runner.as_ref(), &self.config).echo(self.options.debug)
    }

    /// Run a step whose output only matters in debug mode.
    pub(super) fn exec(&self, inv: Invocation) -> Result<ProcessResult> {
        let debug = self.options.debug;
        self.runner.invoke(&inv.echo_command(debug).echo_output(debug))
    }

    /// Run a step whose output the user normally wants to follow.
    pub(super) fn exec_visible(&self, inv: Invocation) -> Result<ProcessResult> {
        let debug = self.options.debug;
        let show = debug || !self.options.quiet;
        self.runner.invoke(&inv.echo_command(debug).echo_output(show))
    }

    /// Build `<name>:<mode>` plus any extra tags.
    pub fn build(&self, project: &Project, plugin: &Plugin, mode: Mode, tags: &[String]) -> Result<()> {
        let name = project.name();
        if self.options.force {
            tracing::debug!("forced rebuild of {}", image_tag(name, mode));
        } else if self.config.build_policy == BuildPolicy::Missing
            && !self.query().list_project_images(name, Some(mode))?.is_empty()
        {
            tracing::info!("{} already exists, skipping build", image_tag(name, mode));
            return Ok(());
        }
        self.build_image(project, plugin, mode, tags)
    }

    /// Build regardless of the build policy.
    pub(super) fn build_image(&self, project: &Project, plugin: &Plugin, mode: Mode, tags: &[String]) -> Result<()> {
        let dockerfile = self.dockerfile(project, plugin, mode)?;
        tracing::debug!("building with Dockerfile:\n{dockerfile}");
        tracing::info!("Building {}", image_tag(project.name(), mode));
        self.exec_visible(build_command(
            &self.config,
            project.path(),
            project.name(),
            mode,
            tags,
            dockerfile,
        ))?;
        Ok(())
    }

    /// An ejected Dockerfile in the project is used as is; otherwise the
    /// plugin's template is expanded.
    fn dockerfile(&self, project: &Project, plugin: &Plugin, mode: Mode) -> Result<String> {
        let mode_file = format!("Dockerfile-{mode}");
        let local_roots = [project.path().to_path_buf()];
        if let Some(local) = find_template(&local_roots, &[mode_file.as_str(), "Dockerfile"])? {
            tracing::debug!(path = %local.path.display(), "using project Dockerfile");
            return Ok(local.body);
        }

        let mode_template = format!("docker/{mode_file}");
        let plugin_roots = [plugin.template_root()];
        match find_template(&plugin_roots, &[mode_template.as_str(), "docker/Dockerfile"])? {
            Some(template) => render(&template.path, &template.body, &project.template_context()),
            None => Err(Error::config(format!(
                "no Dockerfile for {mode} mode in the project or in plugin templates at {}",
                plugin.template_root().display()
            ))),
        }
    }

    /// Build and start the project's container, replacing any running one.
    ///
    /// Detached: returns as soon as the container runs. Attached: streams its
    /// logs until it exits, then removes it; an interrupt stops and removes it.
    pub fn up(
        &self,
        project: &Project,
        plugin: &Plugin,
        mode: Mode,
        tags: &[String],
        detached: bool,
    ) -> Result<String> {
        let (built, stopped) = thread::scope(|s| {
            let build = s.spawn(|| self.build(project, plugin, mode, tags));
            let down = s.spawn(|| self.down(project, true));
            (join(build), join(down))
        });
        built?;
        stopped?;

        let image = image_tag(project.name(), mode);
        let run = run_command(
            &self.config,
            project.path(),
            &image,
            mode,
            plugin.shared_directories(),
        );
        let command = run.display();
        let id = self.exec(run)?.stdout.trim().to_string();
        if id.is_empty() {
            return Err(Error::UnexpectedOutput {
                command,
                expected: "container id",
            });
        }
        tracing::info!(container = %id, "Started {image}");
        if detached {
            return Ok(id);
        }

        let removed = Arc::new(AtomicBool::new(false));
        let guard = self.interrupts.push_handler({
            let runner = Arc::clone(&self.runner);
            let config = self.config.clone();
            let id = id.clone();
            let removed = Arc::clone(&removed);
            move || {
                runner
                    .invoke(&stop_command(&config, &id))
                    .with_context(|| format!("failed to stop container {id}"))?;
                runner
                    .invoke(&remove_command(&config, &id))
                    .with_context(|| format!("failed to remove container {id}"))?;
                removed.store(true, Ordering::SeqCst);
                Ok(true)
            }
        });
        let streamed = self.runner.invoke(
            &logs_command(&self.config, &id, true)
                .isolated()
                .echo_command(self.options.debug)
                .echo_output(true),
        );
        guard.pop();
        streamed?;

        // The stream ends once the container has exited. Listings only show
        // running containers, so a later `down` would never find it.
        if !removed.load(Ordering::SeqCst) {
            self.exec(remove_command(&self.config, &id))?;
            tracing::info!(container = %id, "Removed exited container");
        }
        Ok(id)
    }

    /// Stop and remove every container of the project.
    pub fn down(&self, project: &Project, quiet: bool) -> Result<usize> {
        let containers = self.query().list_project_containers(project.name())?;
        if containers.is_empty() {
            if !quiet {
                tracing::info!("{} is not running", project.name());
            }
            return Ok(0);
        }

        let ids: Vec<String> = containers.into_iter().map(|c| c.id).collect();
        for_each_concurrently(&ids, |id| self.exec(stop_command(&self.config, id)).map(drop))?;
        for_each_concurrently(&ids, |id| self.exec(remove_command(&self.config, id)).map(drop))?;
        if !quiet {
            tracing::info!("Stopped {} container(s) of {}", ids.len(), project.name());
        }
        Ok(ids.len())
    }

    /// Show the output of the project's container. `None` when it is not running.
    pub fn logs(&self, project: &Project, follow: bool) -> Result<Option<String>> {
        let Some(container) = self.query().find_single_container(project.name())? else {
            tracing::info!("{} is not running", project.name());
            return Ok(None);
        };
        self.runner.invoke(
            &logs_command(&self.config, &container.id, follow)
                .echo_command(self.options.debug)
                .echo_output(true),
        )?;
        Ok(Some(container.id))
    }

    /// Stream logs from every deployed pod at once, each line labelled with
    /// its pod. Returns the number of pods.
    pub fn remote_logs(&self, project: &Project, follow: bool) -> Result<usize> {
        let pods = self.query().list_pods(project.name())?;
        if pods.is_empty() {
            tracing::info!("no pods found for {}", project.name());
            return Ok(0);
        }
        let names: Vec<String> = pods.into_iter().map(|p| p.name).collect();
        for_each_concurrently(&names, |pod| {
            self.runner
                .invoke(
                    &pod_logs_command(&self.config, pod, follow)
                        .prefix(pod.as_str())
                        .echo_command(self.options.debug)
                        .echo_output(true),
                )
                .map(drop)
        })?;
        Ok(names.len())
    }

    /// Table of the project's running containers.
    pub fn ps(&self, project: &Project) -> Result<String> {
        let rows: Vec<Vec<String>> = self
            .query()
            .list_project_containers(project.name())?
            .into_iter()
            .map(|c| vec![c.id, c.image, c.status, c.size])
            .collect();
        Ok(render_table(&["Container", "Image", "Status", "Size"], &rows))
    }

    /// Table of the project's deployed pods.
    pub fn remote_ps(&self, project: &Project) -> Result<String> {
        let rows: Vec<Vec<String>> = self
            .query()
            .list_pods(project.name())?
            .into_iter()
            .map(|p| vec![p.name, p.phase, p.creation_timestamp])
            .collect();
        Ok(render_table(&["Pod", "Status", "Created"], &rows))
    }

    /// Table of the project's local images.
    pub fn ls(&self, project: &Project, mode: Option<Mode>) -> Result<String> {
        let rows: Vec<Vec<String>> = self
            .query()
            .list_project_images(project.name(), mode)?
            .into_iter()
            .map(|i| vec![i.id.clone(), i.reference(), i.size, i.created_since])
            .collect();
        Ok(render_table(&["Image", "Tag", "Size", "Created"], &rows))
    }

    /// Remove the project's images. Returns how many were removed.
    pub fn clean(&self, project: &Project, mode: Option<Mode>) -> Result<usize> {
        let images = self.query().list_project_images(project.name(), mode)?;
        // One image id can carry several project tags.
        let mut ids: Vec<String> = Vec::with_capacity(images.len());
        for image in images {
            if !ids.contains(&image.id) {
                ids.push(image.id);
            }
        }
        for id in &ids {
            self.exec(remove_image_command(&self.config, id))?;
        }
        tracing::info!("Removed {} image(s) of {}", ids.len(), project.name());
        Ok(ids.len())
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
}

/// Run `f` for every item on its own thread and wait for all of them.
/// The first failure, in item order, is returned.
fn for_each_concurrently<T, F>(items: &[T], f: F) -> Result<()>
where
    T: Sync,
    F: Fn(&T) -> Result<()> + Sync,
{
    let f = &f;
    let results: Vec<Result<()>> = thread::scope(|s| {
        let handles: Vec<_> = items.iter().map(|item| s.spawn(move || f(item))).collect();
        handles.into_iter().map(join).collect()
    });
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ScriptedRunner;
    use crate::project::ProjectManifest;
    use crate::prompt::ScriptedPrompter;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        project: Project,
        plugin: Plugin,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("demo");
        let plugin_dir = dir.path().join("plugin");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(plugin_dir.join("templates/docker")).unwrap();
        std::fs::write(
            plugin_dir.join("templates/docker/Dockerfile"),
            "FROM node:20\nLABEL app={{ PROJECT_NAME }}\n",
        )
        .unwrap();
        std::fs::write(
            plugin_dir.join("templates/docker/Dockerfile-prod"),
            "FROM node:20-slim\n",
        )
        .unwrap();
        let manifest: ProjectManifest = serde_json::from_str(r#"{"name": "demo"}"#).unwrap();
        Fixture {
            project: Project::new(&project_dir, manifest).unwrap(),
            plugin: Plugin::load(&plugin_dir).unwrap(),
            _dir: dir,
        }
    }

    fn lifecycle(runner: Arc<ScriptedRunner>, options: Options) -> Lifecycle {
        Lifecycle::new(
            runner,
            InterruptController::manual(),
            Arc::new(ScriptedPrompter::default()),
            Config::default(),
            options,
        )
    }

    #[test]
    fn dockerfile_prefers_mode_template_and_renders_it() {
        let fx = fixture();
        let lc = lifecycle(Arc::new(ScriptedRunner::new()), Options::default());
        assert_eq!(
            lc.dockerfile(&fx.project, &fx.plugin, Mode::Dev).unwrap(),
            "FROM node:20\nLABEL app=demo\n"
        );
        assert_eq!(
            lc.dockerfile(&fx.project, &fx.plugin, Mode::Prod).unwrap(),
            "FROM node:20-slim\n"
        );
    }

    #[test]
    fn ejected_dockerfile_is_used_verbatim() {
        let fx = fixture();
        std::fs::write(fx.project.path().join("Dockerfile-dev"), "FROM scratch # {{ raw }}\n").unwrap();
        let lc = lifecycle(Arc::new(ScriptedRunner::new()), Options::default());
        assert_eq!(
            lc.dockerfile(&fx.project, &fx.plugin, Mode::Dev).unwrap(),
            "FROM scratch # {{ raw }}\n"
        );
    }

    #[test]
    fn missing_dockerfile_is_a_configuration_error() {
        let fx = fixture();
        let empty_plugin = Plugin::load(Path::new("/nonexistent-plugin")).unwrap();
        let lc = lifecycle(Arc::new(ScriptedRunner::new()), Options::default());
        let err = lc.dockerfile(&fx.project, &empty_plugin, Mode::Dev).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn missing_policy_skips_existing_image_unless_forced() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new().respond(
            "docker",
            &["image", "ls"],
            r#"{"ID":"i1","Repository":"demo","Tag":"dev"}"#,
        ));
        let mut lc = lifecycle(Arc::clone(&runner), Options::default());
        lc.config.build_policy = BuildPolicy::Missing;

        lc.build(&fx.project, &fx.plugin, Mode::Dev, &[]).unwrap();
        assert!(runner.calls_to("docker", &["build"]).is_empty());

        lc.build(&fx.project, &fx.plugin, Mode::Prod, &[]).unwrap();
        assert_eq!(runner.calls_to("docker", &["build"]).len(), 1);

        lc.options.force = true;
        lc.build(&fx.project, &fx.plugin, Mode::Dev, &[]).unwrap();
        assert_eq!(runner.calls_to("docker", &["build"]).len(), 2);
    }

    #[test]
    fn down_stops_before_removing() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new().respond(
            "docker",
            &["container", "ls"],
            "{\"ID\":\"c1\",\"Image\":\"demo:dev\"}\n{\"ID\":\"c2\",\"Image\":\"demo:prod\"}\n",
        ));
        let lc = lifecycle(Arc::clone(&runner), Options::default());

        assert_eq!(lc.down(&fx.project, false).unwrap(), 2);

        let verbs: Vec<String> = runner
            .calls()
            .iter()
            .filter(|c| c.args()[0] == "stop" || c.args()[0] == "rm")
            .map(|c| c.args()[0].clone())
            .collect();
        assert_eq!(verbs, ["stop", "stop", "rm", "rm"]);
    }

    #[test]
    fn failed_stop_skips_removal() {
        let fx = fixture();
        let runner = Arc::new(
            ScriptedRunner::new()
                .respond("docker", &["container", "ls"], "{\"ID\":\"c1\",\"Image\":\"demo:dev\"}")
                .fail("docker", &["stop"], 1, "no such container"),
        );
        let lc = lifecycle(Arc::clone(&runner), Options::default());

        let err = lc.down(&fx.project, false).unwrap_err();
        assert_eq!(err.execution().and_then(|e| e.code), Some(1));
        assert!(runner.calls_to("docker", &["rm"]).is_empty());
    }

    #[test]
    fn remote_logs_prefixes_each_pod() {
        let fx = fixture();
        let pods = r#"{"items":[{"metadata":{"name":"demo-a"}},{"metadata":{"name":"demo-b"}}]}"#;
        let runner = Arc::new(ScriptedRunner::new().respond("kubectl", &["get", "pods"], pods));
        let lc = lifecycle(Arc::clone(&runner), Options::default());

        assert_eq!(lc.remote_logs(&fx.project, false).unwrap(), 2);
        let mut prefixes: Vec<String> = runner
            .calls_to("kubectl", &["logs"])
            .iter()
            .filter_map(|c| c.output_prefix().map(str::to_string))
            .collect();
        prefixes.sort();
        assert_eq!(prefixes, ["demo-a", "demo-b"]);
    }

    #[test]
    fn clean_removes_each_image_id_once() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new().respond(
            "docker",
            &["image", "ls"],
            "{\"ID\":\"i1\",\"Repository\":\"demo\",\"Tag\":\"dev\"}\n\
             {\"ID\":\"i1\",\"Repository\":\"demo\",\"Tag\":\"prod\"}\n\
             {\"ID\":\"i2\",\"Repository\":\"other\",\"Tag\":\"dev\"}\n",
        ));
        let lc = lifecycle(Arc::clone(&runner), Options::default());

        assert_eq!(lc.clean(&fx.project, None).unwrap(), 1);
        let removed = runner.calls_to("docker", &["image", "rm"]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].args(), ["image", "rm", "--force", "i1"]);
    }

    #[test]
    fn ps_renders_only_project_containers() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new().respond(
            "docker",
            &["container", "ls"],
            "{\"ID\":\"c1\",\"Image\":\"demo:dev\",\"Status\":\"Up\",\"Size\":\"1kB\"}\n\
             {\"ID\":\"c9\",\"Image\":\"redis:7\",\"Status\":\"Up\",\"Size\":\"0B\"}\n",
        ));
        let lc = lifecycle(runner, Options::default());

        let table = lc.ps(&fx.project).unwrap();
        assert!(table.contains("demo:dev"));
        assert!(!table.contains("redis"));
        assert_eq!(table.lines().count(), 2);
    }

    #[test]
    fn quiet_hides_build_output_but_debug_shows_everything() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        let quiet = Options {
            quiet: true,
            ..Options::default()
        };
        lifecycle(Arc::clone(&runner), quiet)
            .build(&fx.project, &fx.plugin, Mode::Dev, &[])
            .unwrap();
        let build = &runner.calls_to("docker", &["build"])[0];
        assert!(!build.echoes_output());
        assert!(!build.echoes_command());

        let runner = Arc::new(ScriptedRunner::new());
        let debug = Options {
            debug: true,
            quiet: true,
            ..Options::default()
        };
        lifecycle(Arc::clone(&runner), debug)
            .build(&fx.project, &fx.plugin, Mode::Dev, &[])
            .unwrap();
        let build = &runner.calls_to("docker", &["build"])[0];
        assert!(build.echoes_output());
        assert!(build.echoes_command());
    }

    #[test]
    fn up_without_container_id_reports_the_run_command() {
        let fx = fixture();
        let runner = Arc::new(ScriptedRunner::new());
        let lc = lifecycle(Arc::clone(&runner), Options::default());

        match lc.up(&fx.project, &fx.plugin, Mode::Dev, &[], false) {
            Err(Error::UnexpectedOutput { command, expected }) => {
                assert!(command.starts_with("docker run -d"));
                assert_eq!(expected, "container id");
            }
            other => panic!("expected unexpected output, got {other:?}"),
        }
        assert!(runner.calls_to("docker", &["logs"]).is_empty());
        assert_eq!(lc.interrupts().depth(), 0);
    }
}
