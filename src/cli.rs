use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rust-eth-activity-lab", version, about = "Wallet activity classifier")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the classified activity list for an address
    Activity {
        address: String,
        /// Window start, unix seconds (default: 30 days before end)
        #[arg(long)]
        start: Option<u64>,
        /// Window end, unix seconds (default: now)
        #[arg(long)]
        end: Option<u64>,
    },
    /// Print per-category counters for an address
    Stats {
        address: String,
        #[arg(long)]
        start: Option<u64>,
        #[arg(long)]
        end: Option<u64>,
    },
    /// Run the HTTP API server
    Serve {
        /// Override bind address, e.g. 0.0.0.0:8080
        #[arg(long)]
        addr: Option<String>,
    },
}
