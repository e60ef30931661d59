//! mason - package manager CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mason::cmd;
use mason::ops::Context;

#[derive(Parser)]
#[command(name = "mason")]
#[command(about = "Package manager for developer tooling", version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Uninstall packages
    Uninstall {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Upgrade packages (all outdated ones when none are named)
    Upgrade { packages: Vec<String> },
    /// List installed packages
    List,
    /// Search packages
    Search {
        query: Option<String>,
        /// Category of package (DAP, Formatter, Linter, LSP)
        #[arg(short, long)]
        category: Option<String>,
        /// Language of package
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Update registries
    Update,
}

fn long_version() -> String {
    format!(
        "{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut ctx = Context::load().await?;

    match cli.command {
        Commands::Install { packages } => cmd::install::run(&ctx, &packages).await,
        Commands::Uninstall { packages } => cmd::uninstall::run(&ctx, &packages).await,
        Commands::Upgrade { packages } => cmd::upgrade::run(&ctx, &packages).await,
        Commands::List => cmd::list::run(&ctx),
        Commands::Search {
            query,
            category,
            language,
        } => cmd::search::run(
            &ctx,
            query.as_deref(),
            category.as_deref(),
            language.as_deref(),
        ),
        Commands::Update => cmd::update::run(&mut ctx).await,
    }
}
