use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitectl::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitectl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => cli::commands::init().await,
        Commands::Create {
            domain,
            alias,
            website_type,
            proxy,
            extra_domain,
            default_server,
            parent,
        } => {
            cli::commands::create(
                &domain,
                alias,
                &website_type,
                proxy,
                extra_domain,
                default_server,
                parent,
            )
            .await
        }
        Commands::List { format } => cli::commands::list(format).await,
        Commands::Delete { alias, force } => cli::commands::delete(&alias, force).await,
        Commands::Config { alias } => cli::commands::show_config(&alias).await,
        Commands::Serve { host, port } => cli::commands::serve(&host, port).await,
        Commands::Nginx { action } => cli::commands::nginx(action).await,
    }
}
