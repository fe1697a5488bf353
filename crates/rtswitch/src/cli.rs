use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rtswitch_backend::RuntimeFamily;
use rtswitch_env::ShellType;

#[derive(Parser, Debug)]
#[command(name = "rtswitch", version)]
#[command(about = "Install and switch PHP, Python, Java and Node.js versions through Scoop", long_about = None)]
pub struct Cli {
    /// Scoop root to use instead of $SCOOP or ~/scoop.
    #[arg(long, global = true)]
    pub scoop_root: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Php {
        #[command(subcommand)]
        action: Action,
    },
    Python {
        #[command(subcommand)]
        action: Action,
    },
    Java {
        #[command(subcommand)]
        action: JavaAction,
    },
    Node {
        #[command(subcommand)]
        action: Action,
    },
    /// Print a snippet that applies the stored PATH and home variables.
    Env {
        #[arg(long)]
        shell: Option<ShellType>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Install a version, trying fallback packages in order.
    Install { version: String },
    /// Activate an installed version.
    Switch { version: String },
    /// Remove an installed version.
    Uninstall { version: String },
    /// Show the active version and environment.
    Status,
    /// List installed versions.
    List,
    /// Switch if installed, otherwise replace installed versions with this one.
    Use { version: String },
}

#[derive(Subcommand, Debug)]
pub enum JavaAction {
    #[command(flatten)]
    Common(Action),
    /// Point JAVA_HOME at a JDK found on disk or given by path.
    Home {
        #[arg(long)]
        path: Option<PathBuf>,
        /// Accept a path that does not look like a JDK.
        #[arg(long)]
        force: bool,
    },
}

/// What the user asked for, independent of how it was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Family(RuntimeFamily, Action),
    Home {
        family: RuntimeFamily,
        path: Option<PathBuf>,
        force: bool,
    },
    Env(Option<ShellType>),
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        match command {
            Command::Php { action } => Self::Family(RuntimeFamily::Php, action),
            Command::Python { action } => Self::Family(RuntimeFamily::Python, action),
            Command::Node { action } => Self::Family(RuntimeFamily::Node, action),
            Command::Java {
                action: JavaAction::Common(action),
            } => Self::Family(RuntimeFamily::Java, action),
            Command::Java {
                action: JavaAction::Home { path, force },
            } => Self::Home {
                family: RuntimeFamily::Java,
                path,
                force,
            },
            Command::Env { shell } => Self::Env(shell),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use rtswitch_backend::RuntimeFamily;
    use rtswitch_env::ShellType;

    use super::{Action, Cli, Request};

    fn request(args: &[&str]) -> Request {
        let cli = Cli::try_parse_from(args).expect("arguments should parse");
        cli.command.expect("a subcommand").into()
    }

    #[test]
    fn family_actions_parse() {
        assert_eq!(
            request(&["rtswitch", "php", "install", "8.2"]),
            Request::Family(
                RuntimeFamily::Php,
                Action::Install {
                    version: "8.2".to_string()
                }
            )
        );
        assert_eq!(
            request(&["rtswitch", "java", "use", "21"]),
            Request::Family(
                RuntimeFamily::Java,
                Action::Use {
                    version: "21".to_string()
                }
            )
        );
        assert_eq!(
            request(&["rtswitch", "node", "status"]),
            Request::Family(RuntimeFamily::Node, Action::Status)
        );
    }

    #[test]
    fn java_home_parses_path_and_force() {
        assert_eq!(
            request(&["rtswitch", "java", "home", "--path", "/opt/jdk", "--force"]),
            Request::Home {
                family: RuntimeFamily::Java,
                path: Some(PathBuf::from("/opt/jdk")),
                force: true,
            }
        );
    }

    #[test]
    fn home_is_java_only() {
        assert!(Cli::try_parse_from(["rtswitch", "php", "home"]).is_err());
    }

    #[test]
    fn version_is_required_for_mutations() {
        assert!(Cli::try_parse_from(["rtswitch", "python", "install"]).is_err());
    }

    #[test]
    fn env_accepts_shell_names() {
        assert_eq!(
            request(&["rtswitch", "env", "--shell", "fish"]),
            Request::Env(Some(ShellType::Fish))
        );
        assert!(Cli::try_parse_from(["rtswitch", "env", "--shell", "tcsh"]).is_err());
    }

    #[test]
    fn global_flags_and_no_subcommand() {
        let cli = Cli::try_parse_from(["rtswitch", "--debug", "--scoop-root", "D:/scoop"])
            .expect("arguments should parse");

        assert!(cli.debug);
        assert_eq!(cli.scoop_root, Some(PathBuf::from("D:/scoop")));
        assert!(cli.command.is_none());
    }
}
