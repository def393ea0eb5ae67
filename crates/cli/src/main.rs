//! Shopify ChatBI CLI - Migrations and one-shot queries.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! chatbi-cli migrate
//!
//! # Run a query against a shop
//! chatbi-cli query --shop acme.myshopify.com --token shpat_... --query '{ shop { name } }'
//!
//! # Sanitize a model-generated query read from stdin
//! chatbi-cli sanitize < query.graphql
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `query` - Execute one Admin API query and print the result
//! - `sanitize` - Print the repaired form of a query

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "chatbi-cli")]
#[command(author, version, about = "Shopify ChatBI CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run a GraphQL query against a shop
    Query {
        /// Shop domain (`*.myshopify.com`)
        #[arg(short, long, env = "SHOP_DOMAIN")]
        shop: String,

        /// Offline Admin API access token
        #[arg(short, long, env = "SHOP_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// GraphQL query text
        #[arg(short, long, env = "SHOPIFY_GRAPHQL")]
        query: String,

        /// Print normalized rows and chart keys instead of the raw result
        #[arg(long)]
        table: bool,
    },
    /// Read a query from stdin and print the sanitized form
    Sanitize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Query {
            shop,
            token,
            query,
            table,
        } => commands::query::run(&shop, token, &query, table).await?,
        Commands::Sanitize => commands::sanitize::run()?,
    }
    Ok(())
}
