//! CLI entry and dispatch.

use amux_core::config;
use amux_core::core::interrupt;
use anyhow::{Context, Result};
use clap::Parser;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "amux")]
#[command(version = "0.1")]
#[command(about = "Multi-tab session manager for AI assistant CLIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a one-shot prompt in a fresh tab
    Exec {
        /// The prompt to send to the assistant
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Project directory the session runs in
        #[arg(long, default_value = ".")]
        project: String,

        /// Resume an existing backend session by id
        #[arg(long, value_name = "SESSION_ID")]
        resume: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage the saved tab deck
    Tabs {
        #[command(subcommand)]
        command: TabsCommands,
    },

    /// Inspect backend session history
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TabsCommands {
    /// Lists the saved tabs
    List,
    /// Deletes the saved tab deck
    Clear,
}

#[derive(clap::Subcommand)]
enum SessionsCommands {
    /// Lists recorded sessions for a project
    List {
        /// Project directory the sessions belong to
        #[arg(long, default_value = ".")]
        project: String,
    },
    /// Shows a session's grouped transcript
    Show {
        /// The ID of the session to show
        #[arg(value_name = "SESSION_ID")]
        id: String,

        /// Project directory the session belongs to
        #[arg(long, default_value = ".")]
        project: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init();

    let config = config::Config::load().context("load config")?;
    // Keep the guard alive for the whole run so buffered logs get flushed.
    let _log_guard = logging::init(&config).context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli, config).await })
}

async fn dispatch(cli: Cli, config: config::Config) -> Result<()> {
    match cli.command {
        Commands::Exec {
            prompt,
            project,
            resume,
            model,
        } => {
            commands::exec::run(commands::exec::ExecRunOptions {
                prompt: &prompt,
                project: &project,
                resume: resume.as_deref(),
                model_override: model.as_deref(),
                config: &config,
            })
            .await
        }

        Commands::Tabs { command } => match command {
            TabsCommands::List => commands::tabs::list(),
            TabsCommands::Clear => commands::tabs::clear(),
        },

        Commands::Sessions { command } => match command {
            SessionsCommands::List { project } => commands::sessions::list(&project, &config),
            SessionsCommands::Show { id, project } => {
                commands::sessions::show(&id, &project, &config)
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
