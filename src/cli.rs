use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Mode;

#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(author, version, about = "Build, run, publish and deploy containerized projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (defaults to the working directory)
    #[arg(long, global = true, env = "BERTH_PROJECT")]
    pub project: Option<PathBuf>,

    /// Fail instead of prompting for missing values
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Echo every tool invocation and its output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the commands and files that would be run or written, without
    /// touching anything
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Where `logs` and `ps` look.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum Environment {
    /// The local container engine
    #[default]
    Local,
    /// The deployed pods
    Prod,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, value_enum, default_value_t = Mode::Dev)]
    pub mode: Mode,

    /// Extra tag for the image (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Rebuild even if an up-to-date image exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project's image
    Build(BuildArgs),

    /// Build and start the project's container
    Up {
        #[command(flatten)]
        build: BuildArgs,

        /// Return once the container is running instead of streaming its logs
        #[arg(short, long)]
        detached: bool,
    },

    /// Stop and remove the project's containers
    Down,

    /// Show the project's output
    Logs {
        #[arg(short, long)]
        follow: bool,

        #[arg(long, value_enum, default_value = "local")]
        env: Environment,
    },

    /// List the project's containers or pods
    Ps {
        #[arg(long, value_enum, default_value = "local")]
        env: Environment,
    },

    /// List the project's images
    Ls {
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },

    /// Remove the project's images
    Clean {
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },

    /// Build the production image and push it to the registry
    Publish,

    /// Publish and apply the deployment
    Deploy,

    /// Write the Dockerfiles and deployment into the project for customisation
    Eject {
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Whether the command needs the project's plugin.
    pub fn needs_plugin(&self) -> bool {
        matches!(
            self,
            Commands::Build(_) | Commands::Up { .. } | Commands::Publish | Commands::Deploy | Commands::Eject { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn up_accepts_repeated_tags_and_detached() {
        let cli = Cli::parse_from(["berth", "up", "--mode", "prod", "--tag", "a", "--tag", "b", "-d"]);
        match cli.command {
            Commands::Up { build, detached } => {
                assert_eq!(build.mode, Mode::Prod);
                assert_eq!(build.tags, ["a", "b"]);
                assert!(detached);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from(["berth", "logs", "-f", "--env", "prod", "--project", "/p", "--debug"]);
        assert_eq!(cli.project, Some(PathBuf::from("/p")));
        assert!(cli.debug);
        match cli.command {
            Commands::Logs { follow, env } => {
                assert!(follow);
                assert_eq!(env, Environment::Prod);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn build_defaults_to_dev() {
        let cli = Cli::parse_from(["berth", "build"]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.mode, Mode::Dev);
                assert!(args.tags.is_empty());
                assert!(!args.force);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["berth", "-q", "-v", "down"]).is_err());
    }

    #[test]
    fn plugin_requirement_by_command() {
        assert!(Cli::parse_from(["berth", "eject"]).command.needs_plugin());
        assert!(!Cli::parse_from(["berth", "ps"]).command.needs_plugin());
    }
}
