use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tripwatch-server")]
#[command(about = "Development stand-in for the trip service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the trip and driver API
    Serve {
        /// Port for the HTTP API
        #[arg(short, long, default_value = "5001")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Load seed drivers and trips on startup
        #[arg(long)]
        seed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, seed } => {
            tripwatch_server::run_server(host, port, seed).await
        }
    }
}
