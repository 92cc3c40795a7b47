//! Key command - derives a cache key offline

use anyhow::Context;
use clap::Args;

use crate::config::AppConfig;
use crate::domain::cache::CacheKeyDeriver;

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long)]
    pub body: Option<String>,

    /// Print the normalized signature as well
    #[arg(long)]
    pub verbose: bool,

    /// Target URL, exactly as passed to `/proxy?url=`
    pub url: String,
}

/// Prints the key using the configured prefix and header exclusions
pub async fn run(args: KeyArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let deriver =
        CacheKeyDeriver::new(config.cache.key_prefix.clone(), config.proxy.key_exclusions());

    let headers = parse_headers(&args.headers)?;
    let body = args.body.as_deref().unwrap_or_default().as_bytes();

    if args.verbose {
        let signature = deriver.signature(&args.method, &args.url, &headers, body);
        println!("{}", signature.canonical());
    }

    println!("{}", deriver.derive(&args.method, &args.url, &headers, body));

    Ok(())
}

fn parse_headers(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|h| {
            h.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .with_context(|| format!("Invalid header '{}', expected 'Name: value'", h))
        })
        .collect()
}
