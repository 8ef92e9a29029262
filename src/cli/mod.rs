//! CLI interface for sitectl

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sitectl")]
#[command(version)]
#[command(about = "Manage nginx virtual hosts and reverse proxies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new sitectl.toml configuration file
    Init,

    /// Create a new website
    Create {
        /// Primary domain, optionally with a port (example.com:8080)
        #[arg(short, long)]
        domain: String,

        /// Optional custom alias (defaults to sanitized domain)
        #[arg(short, long)]
        alias: Option<String>,

        /// Website type: static, deployment, runtime, subsite or stream
        #[arg(short = 't', long, default_value = "static")]
        website_type: String,

        /// Upstream target for deployment/runtime/stream sites
        #[arg(short, long, default_value = "")]
        proxy: String,

        /// Additional domain[:port] bindings
        #[arg(long)]
        extra_domain: Vec<String>,

        /// Mark the listens as default_server
        #[arg(long)]
        default_server: bool,

        /// Parent website alias (required for subsites)
        #[arg(long)]
        parent: Option<String>,
    },

    /// List all websites
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete a website and its site directory
    Delete {
        /// Alias of the website to delete
        alias: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Print a website's nginx config
    Config {
        /// Alias of the website
        alias: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3457")]
        port: u16,
    },

    /// Manage the nginx process
    Nginx {
        #[command(subcommand)]
        action: NginxAction,
    },
}

#[derive(Subcommand)]
pub enum NginxAction {
    /// Syntax-check the nginx configuration
    Check,

    /// Check and reload nginx
    Reload,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
