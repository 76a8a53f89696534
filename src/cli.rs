use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "smilecdr-config")]
#[command(version)]
#[command(about = "Declarative configuration for Smile CDR modules, OpenID clients, identity providers, and users", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./smilecdr.toml, then ~/.config/smilecdr/config.toml)
    #[arg(short, long, global = true, env = "SMILECDR_CONFIG")]
    pub config: Option<String>,

    /// State file (default: smilecdr.state.json next to the config file)
    #[arg(long, global = true, env = "SMILECDR_STATE")]
    pub state: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Admin API connection flags
///
/// The environment variables are read when settings are resolved so that
/// an empty variable falls through to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Admin API base URL [env: SMILECDR_BASE_URL]
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Admin API username [env: SMILECDR_USERNAME]
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Admin API password [env: SMILECDR_PASSWORD]
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the config file without contacting the server
    Validate,

    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the server match the config file
    Apply(ApplyArgs),

    /// Remove every tracked resource from the server
    Destroy(DestroyArgs),

    /// Start tracking a resource that already exists on the server
    Import {
        /// Address to track it under (kind.name)
        address: String,

        /// Natural key, e.g. Master/smart_auth/my-client
        id: String,
    },

    /// Look up a resource on the server without tracking it
    Show {
        /// Resource kind
        kind: String,

        /// Natural key, e.g. Master/local_security/12
        id: String,
    },

    /// Inspect or edit the state file
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Only plan matching resources (kind or kind.name)
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only apply matching resources (kind or kind.name)
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources applied at once
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Only destroy matching resources (kind or kind.name)
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked resources
    List,

    /// Stop tracking a resource, leaving it on the server
    Rm {
        /// Address of the resource (kind.name)
        address: String,
    },
}
