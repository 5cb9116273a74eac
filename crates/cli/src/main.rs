mod client;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Wayfinder migration flow lifecycle toolchain.
#[derive(Parser)]
#[command(name = "wayfinder", version, about = "Wayfinder migration flow lifecycle toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Connection and tenant arguments shared by every client subcommand.
#[derive(Debug, clap::Args)]
struct ClientArgs {
    /// Base URL of a running `wayfinder serve` instance
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Client account identifier (tenant)
    #[arg(long)]
    account: String,

    /// Engagement identifier (tenant)
    #[arg(long)]
    engagement: String,

    /// API key, when the server has authentication enabled
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Wayfinder HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Create a new flow
    Init {
        /// Flow type: discovery, collection, or assessment
        #[arg(long, value_enum)]
        flow_type: FlowTypeArg,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show the current state of a flow
    Status {
        /// Business identifier of the flow
        flow_id: String,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// List all flows for the tenant
    List {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Attempt one phase transition
    Advance {
        /// Business identifier of the flow
        flow_id: String,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Supply external input (import batch, questionnaire responses,
    /// review decision) to the current phase
    Input {
        /// Business identifier of the flow
        flow_id: String,
        /// Path to a JSON input payload, or '-' for stdin
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Cancel a flow
    Cancel {
        /// Business identifier of the flow
        flow_id: String,
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Delete a flow
    Delete {
        /// Business identifier of the flow
        flow_id: String,
        /// Cascade deletion to dependent records
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        client: ClientArgs,
    },
}

/// CLI-facing flow type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FlowTypeArg {
    Discovery,
    Collection,
    Assessment,
}

impl FlowTypeArg {
    fn as_str(&self) -> &'static str {
        match self {
            FlowTypeArg::Discovery => "discovery",
            FlowTypeArg::Collection => "collection",
            FlowTypeArg::Assessment => "assessment",
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {e}");
                    process::exit(1);
                }
            };
            rt.block_on(serve::start_server(port))
                .map_err(|e| e.to_string())
        }
        Commands::Init { flow_type, client } => {
            client::cmd_init(&client, flow_type.as_str(), cli.output)
        }
        Commands::Status { flow_id, client } => client::cmd_status(&client, &flow_id, cli.output),
        Commands::List { client } => client::cmd_list(&client, cli.output),
        Commands::Advance { flow_id, client } => client::cmd_advance(&client, &flow_id, cli.output),
        Commands::Input {
            flow_id,
            file,
            client,
        } => client::cmd_input(&client, &flow_id, &file, cli.output),
        Commands::Cancel { flow_id, client } => client::cmd_cancel(&client, &flow_id, cli.output),
        Commands::Delete {
            flow_id,
            force,
            client,
        } => client::cmd_delete(&client, &flow_id, force),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}
