use std::path::Path;

use crate::config::{Config, Mode};
use crate::process::Invocation;
use crate::project::SharedDirectory;

/// Canonical local tag for a project build.
pub fn image_tag(name: &str, mode: Mode) -> String {
    format!("{name}:{mode}")
}

/// `docker build <dir> --tag=<name>:<mode> [--tag=<t>]... -f -` with the
/// Dockerfile on stdin.
pub fn build_command(
    cfg: &Config,
    project_dir: &Path,
    name: &str,
    mode: Mode,
    tags: &[String],
    dockerfile: String,
) -> Invocation {
    let mut args = vec!["build".to_string(), project_dir.display().to_string()];
    args.push(format!("--tag={}", image_tag(name, mode)));
    args.extend(tags.iter().map(|t| format!("--tag={t}")));
    args.extend(["-f".into(), "-".into()]);
    Invocation::new(&cfg.engine, args).stdin(dockerfile)
}

/// `docker run -d [-v ...] <image>`. Volumes are only given in dev mode.
pub fn run_command(
    cfg: &Config,
    project_dir: &Path,
    image: &str,
    mode: Mode,
    shared: &[SharedDirectory],
) -> Invocation {
    let mut args = vec!["run".to_string(), "-d".to_string()];
    if mode == Mode::Dev {
        for dir in shared {
            args.push("-v".into());
            args.push(volume_spec(cfg, project_dir, dir));
        }
    }
    args.push(image.to_string());
    Invocation::new(&cfg.engine, args)
}

fn volume_spec(cfg: &Config, project_dir: &Path, dir: &SharedDirectory) -> String {
    let host = project_dir.join(&dir.host);
    let mut spec = format!("{}:{}", host.display(), dir.container);
    if cfg.selinux_relabel {
        spec.push_str(":z");
    }
    spec
}

pub fn stop_command(cfg: &Config, container_id: &str) -> Invocation {
    Invocation::new(&cfg.engine, ["stop", container_id])
}

pub fn remove_command(cfg: &Config, container_id: &str) -> Invocation {
    Invocation::new(&cfg.engine, ["rm", container_id])
}

pub fn logs_command(cfg: &Config, container_id: &str, follow: bool) -> Invocation {
    let mut args = vec!["logs"];
    if follow {
        args.push("--follow");
    }
    args.push(container_id);
    Invocation::new(&cfg.engine, args)
}

pub fn remove_image_command(cfg: &Config, image_id: &str) -> Invocation {
    Invocation::new(&cfg.engine, ["image", "rm", "--force", image_id])
}

/// `docker login <host> --username <user> --password-stdin`.
pub fn login_command(cfg: &Config, host: &str, username: &str, password: &str) -> Invocation {
    Invocation::new(
        &cfg.engine,
        ["login", host, "--username", username, "--password-stdin"],
    )
    .stdin(password)
}

pub fn push_command(cfg: &Config, image_ref: &str) -> Invocation {
    Invocation::new(&cfg.engine, ["push", image_ref])
}

/// `kubectl apply -f -` with the manifest on stdin.
pub fn apply_command(cfg: &Config, manifest: String) -> Invocation {
    Invocation::new(&cfg.platform, ["apply", "-f", "-"]).stdin(manifest)
}

pub fn pod_logs_command(cfg: &Config, pod: &str, follow: bool) -> Invocation {
    let mut args = vec!["logs"];
    if follow {
        args.push("--follow");
    }
    args.push(pod);
    Invocation::new(&cfg.platform, args)
}

pub fn head_commit_command(cfg: &Config, project_dir: &Path) -> Invocation {
    Invocation::new(&cfg.vcs, ["rev-parse", "HEAD"]).current_dir(project_dir)
}

/// `<host>/<repository>/<application>/<name>:<commit>`.
pub fn image_reference(host: &str, repository: &str, application: &str, name: &str, commit: &str) -> String {
    format!("{host}/{repository}/{application}/{name}:{commit}")
}
