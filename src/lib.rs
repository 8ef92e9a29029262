//! sitectl - nginx virtual host and reverse proxy management
//!
//! This is the library interface for sitectl, allowing programmatic access
//! to website, proxy, upstream, redirect and auth management.

pub mod api;
pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod firewall;
pub mod nginx;
pub mod task;
pub mod website;

pub use config::Config;
pub use error::Error;
pub use website::Website;
