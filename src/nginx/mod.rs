//! Nginx configuration engine: directive tree, parser/writer, typed views
//! and the check/reload channel to the live proxy

pub mod location;
mod model;
pub mod parser;
pub mod reload;
pub mod server;
pub mod upstream;
pub mod writer;

pub use location::{Location, LocationInfo, SubFilter};
pub use model::{Block, Directive, NginxParam};
pub use parser::parse;
pub use server::Server;
pub use upstream::UpstreamServer;
pub use writer::write;
