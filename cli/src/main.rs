use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod util;

#[derive(Parser)]
#[command(
    name = "fleet-assist",
    version,
    about = "Fleet Assist CLI: ask the browser-fleet troubleshooting agent from a terminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "FLEET_ASSIST_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Bearer token used to start sessions
    #[arg(long, env = "FLEET_ASSIST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Where the current session id is kept (default: user config dir)
    #[arg(long, env = "FLEET_ASSIST_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Print compact JSON
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Ask a question, continuing the saved session if there is one
    Chat {
        /// The question for the assistant
        message: String,
        /// Ignore any saved session and start a new one
        #[arg(long)]
        new: bool,
    },
    /// Show the saved session's transcript
    Resume,
    /// Close the saved session
    Close,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_url = cli.api_url.trim_end_matches('/').to_string();
    let session_file = cli.session_file.unwrap_or_else(util::session_path);
    tracing::debug!(api_url = %api_url, session_file = %session_file.display(), "cli starting");

    let code = match cli.command {
        Commands::Health => commands::health::run(&api_url).await,
        Commands::Chat { message, new } => {
            commands::chat::run(
                &api_url,
                cli.token.as_deref(),
                &session_file,
                &message,
                new,
                cli.raw,
            )
            .await
        }
        Commands::Resume => commands::session::resume(&api_url, &session_file, cli.raw).await,
        Commands::Close => commands::session::close(&api_url, &session_file).await,
    };

    std::process::exit(code);
}
