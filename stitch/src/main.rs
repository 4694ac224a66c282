use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use reqwest::Url;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stitch::agent::{Agent, AgentHost, HttpOrigin};
use stitch::api::{ApiServer, DirectoryBundles, Registry};
use stitch::config::{AgentConfig, ServerConfig};
use stitch::wire::{split, ContentKind};
use stitch_cache::{CacheStorage, FsStorage, MemoryStorage};

#[derive(Parser)]
#[command(name = "stitch")]
#[command(about = "Multi-bundle concatenation server and caching agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve bundles from a directory through the concatenation endpoint
    Serve {
        /// Directory holding `<name>-<version>.<ext>` files
        #[arg(short, long)]
        bundles: PathBuf,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// URL namespace segment
        #[arg(long)]
        namespace: Option<String>,

        /// Content kind (js, css, svg)
        #[arg(short, long)]
        kind: Option<ContentKind>,

        /// Serve the bare chunk join without the exec wrapper
        #[arg(long)]
        no_wrap: bool,
    },

    /// Run the caching agent as a local proxy in front of an origin
    Agent {
        /// Concatenation server to fetch from
        #[arg(short, long)]
        origin: Option<Url>,

        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Keep the cache in memory only
        #[arg(long, conflicts_with = "cache_dir")]
        memory: bool,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// URL namespace segment
        #[arg(long)]
        namespace: Option<String>,

        /// Content kind (js, css, svg)
        #[arg(short, long)]
        kind: Option<ContentKind>,

        /// Cache generation version; changing it discards older caches
        #[arg(long)]
        cache_version: Option<String>,

        /// Drop cache entries not used for this many seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Print the chunks of a concatenated payload
    Split {
        /// Payload file
        file: PathBuf,

        /// Content kind (js, css, svg)
        #[arg(short, long, default_value = "js")]
        kind: ContentKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "stitch=info,stitch_cache=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bundles, host, port, namespace, kind, no_wrap } => {
            let mut config = ServerConfig::from_env()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(namespace) = namespace {
                config.namespace = namespace;
            }
            if let Some(kind) = kind {
                config.kind = kind;
            }
            if no_wrap {
                config.wrap = false;
            }
            config.validate()?;

            if !bundles.is_dir() {
                anyhow::bail!("Bundle directory {:?} does not exist", bundles);
            }

            let mut registry = Registry::new();
            registry.register_catch_all(DirectoryBundles::new(&bundles, config.kind));

            println!("Serving {:?} at http://{}/{}/", bundles, config.addr(), config.namespace);
            ApiServer::new(config, registry).start().await?;
        }

        Commands::Agent {
            origin,
            cache_dir,
            memory,
            host,
            port,
            namespace,
            kind,
            cache_version,
            ttl_secs,
        } => {
            let mut builder = AgentConfig::from_env()?.into_builder();
            if let Some(origin) = origin {
                builder = builder.origin(origin);
            }
            if let Some(dir) = cache_dir {
                builder = builder.cache_dir(Some(dir));
            }
            if memory {
                builder = builder.cache_dir(None);
            }
            if let Some(host) = host {
                builder = builder.host(host);
            }
            if let Some(port) = port {
                builder = builder.port(port);
            }
            if let Some(namespace) = namespace {
                builder = builder.namespace(namespace);
            }
            if let Some(kind) = kind {
                builder = builder.kind(kind);
            }
            if let Some(version) = cache_version {
                builder = builder.cache_version(version);
            }
            if let Some(secs) = ttl_secs {
                builder = builder.ttl(Duration::from_secs(secs));
            }
            let config = builder.build()?;

            let storage: Arc<dyn CacheStorage> = match &config.cache_dir {
                Some(dir) => Arc::new(
                    FsStorage::new(dir)
                        .await
                        .with_context(|| format!("Failed to open cache directory {:?}", dir))?,
                ),
                None => Arc::new(MemoryStorage::new()),
            };

            let agent = Agent::new(config, storage, Arc::new(HttpOrigin::default()))?;
            println!(
                "Agent for {} listening on http://{}",
                agent.config().origin,
                agent.config().addr()
            );
            AgentHost::new(agent).start().await?;
        }

        Commands::Split { file, kind } => {
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let chunks = split(&payload, kind)?;

            if chunks.is_empty() {
                println!("No bundles found in {:?}", file);
                return Ok(());
            }

            println!("{} bundles:", chunks.len());
            println!("{}", "=".repeat(70));
            for chunk in chunks {
                let status = if chunk.cacheable { "✓" } else { "✗" };
                println!("{} {} ({} bytes)", status, chunk.id, chunk.body.len());
            }
        }
    }

    Ok(())
}
