//! CLI module for the caching proxy
//!
//! Subcommands:
//! - `serve`: run the proxy server
//! - `key`: print the cache key a request would use

pub mod key;
pub mod serve;

use clap::{Parser, Subcommand};

/// Proxy HTTP Cache - transparent forward proxy with request deduplication
#[derive(Parser)]
#[command(name = "proxy-http-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the proxy server
    Serve,

    /// Print the cache key for a request without contacting any store
    Key(key::KeyArgs),
}
