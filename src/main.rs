//! trustlend CLI: discover lending paths over a fixture network.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use trustlend::address::Address;
use trustlend::fixture::FixtureNetwork;
use trustlend::session::{SearchEvent, SearchSession};

#[derive(Parser)]
#[command(name = "trustlend", version, about = "Lending-path discovery over a trust graph")]
struct Cli {
    /// JSON file describing the trust network and lender state.
    #[arg(long, global = true, default_value = "network.json")]
    network: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find lending paths for a borrower, streaming them as discovered.
    Find {
        /// Borrower address (0x-prefixed hex).
        #[arg(long)]
        borrower: Address,

        /// Maximum trust hops to explore.
        #[arg(long, default_value = "3")]
        max_depth: usize,

        /// Emit each path as a JSON line instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Show network statistics.
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let network = FixtureNetwork::from_path(&cli.network).into_diagnostic()?;

    match cli.command {
        Commands::Find {
            borrower,
            max_depth,
            json,
        } => {
            let network = Arc::new(network);
            let session = SearchSession::new(network.clone(), network.clone(), network);
            let mut handle = session.start(borrower, max_depth);

            let mut found = 0usize;
            while let Some(event) = handle.next_event().await {
                match event {
                    SearchEvent::Depth(depth) => {
                        eprintln!("checking distance {}...", depth + 1);
                    }
                    SearchEvent::Discovered(path) => {
                        found += 1;
                        if json {
                            println!(
                                "{}",
                                serde_json::to_string(&path).into_diagnostic()?
                            );
                        } else {
                            println!(
                                "{}  available {}  @ {}",
                                path.path.key(),
                                path.path.source_available,
                                path.path.final_rate()
                            );
                        }
                    }
                    SearchEvent::Enriched(path) => {
                        if !json {
                            if let Some(name) = path.source_name() {
                                println!("  {} is {}", path.path.source().short(), name);
                            }
                        }
                    }
                    SearchEvent::Finished => {
                        if !json {
                            if found == 0 {
                                println!(
                                    "No lending paths found. Expand the trust network or \
                                     ask trusted contacts to enable the lending module."
                                );
                            } else {
                                println!("No more paths ({found} found).");
                            }
                        }
                    }
                    SearchEvent::Failed(err) => {
                        return Err(miette::miette!("{err}"));
                    }
                }
            }
        }

        Commands::Info => {
            println!("trustlend network info");
            println!("  trust edges:     {}", network.trust_edge_count());
            println!("  lenders:         {}", network.lender_count());
            println!("  module enabled:  {}", network.enabled_count());
        }
    }

    Ok(())
}
