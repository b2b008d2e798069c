//! CLI for gpustatd — serve or print live GPU status.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gpustatd")]
#[command(about = "gpustatd — live NVIDIA GPU and process telemetry over HTTP")]
#[command(version = gpustatd_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP status server
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,

        /// URL path prefix for both endpoints (e.g. "gpu" serves /gpu/status)
        #[arg(long, env = "URL_PREFIX", default_value = "")]
        prefix: String,

        /// Authorization header value required on every request; empty
        /// disables auth entirely
        #[arg(long, env = "TOKEN", hide_env_values = true, default_value = "")]
        token: String,
    },

    /// Print the number of visible GPUs
    Count,

    /// Print a one-shot status snapshot as JSON
    Status {
        /// Comma-separated device indices (default: all)
        #[arg(long)]
        idx: Option<String>,

        /// Process type filter: C, G, or NA
        #[arg(long)]
        process: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            host,
            port,
            prefix,
            token,
        } => commands::serve::run(&host, port, &prefix, &token),
        Commands::Count => commands::count::run(),
        Commands::Status { idx, process } => {
            commands::status::run(idx.as_deref(), process.as_deref())
        }
    }
}
