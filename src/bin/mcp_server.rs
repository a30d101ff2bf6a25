//! amz-scraper MCP Server
//!
//! Exposes the scraping tools over the Model Context Protocol. Logs go to
//! stderr; with the stdio transport stdout carries JSON-RPC only.

use amz_scraper::{browser::{BrowserSession, ConnectionOptions, LaunchOptions},
                  mcp::ScraperServer,
                  pagination::{DEFAULT_ORIGIN, ScrapeConfig},
                  store::ScrapeStore};
use clap::{Parser, ValueEnum};
use rmcp::{ServiceExt, transport::stdio};
use std::path::PathBuf;

#[cfg(feature = "mcp-server")]
use rmcp::transport::{sse_server::{SseServer, SseServerConfig},
                      streamable_http_server::{StreamableHttpService, session::local::LocalSessionManager}};

#[cfg(feature = "mcp-server")]
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Standard input/output transport (default)
    Stdio,
    /// Server-Sent Events transport
    Sse,
    /// HTTP streamable transport
    Http,
}

#[derive(Parser)]
#[command(name = "amz-mcp-server")]
#[command(version)]
#[command(about = "Amazon scraper MCP server", long_about = None)]
struct Cli {
    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// WebSocket endpoint URL of an already running browser
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// JSON file holding scraped results between exports
    #[arg(long, value_name = "FILE", default_value = "amz_store.json")]
    store: PathBuf,

    /// Marketplace origin for generated URLs
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Transport type to use
    #[arg(long, short = 't', value_enum, default_value = "stdio")]
    transport: Transport,

    /// Port for SSE or HTTP transport (default: 3000)
    #[arg(long, short = 'p', default_value = "3000")]
    port: u16,

    /// SSE endpoint path (default: /sse)
    #[arg(long, default_value = "/sse")]
    sse_path: String,

    /// SSE POST path for messages (default: /message)
    #[arg(long, default_value = "/message")]
    sse_post_path: String,

    /// HTTP streamable endpoint path (default: /mcp)
    #[arg(long, default_value = "/mcp")]
    http_path: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let mut options = LaunchOptions::new().headless(!cli.headed);
    if let Some(path) = &cli.executable_path {
        options = options.chrome_path(path);
    }
    if let Some(dir) = &cli.user_data_dir {
        options = options.user_data_dir(dir);
    }

    let config = ScrapeConfig::new().origin(cli.origin.clone());

    log::info!("amz-scraper MCP server v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Browser mode: {}", if options.headless { "headless" } else { "headed" });
    log::info!("Store: {}", cli.store.display());

    let server = match &cli.ws_endpoint {
        Some(endpoint) => {
            log::info!("Connecting to browser at {}", endpoint);
            let session = BrowserSession::connect(ConnectionOptions::new(endpoint.as_str()))?;
            ScraperServer::new(session, ScrapeStore::open(&cli.store)?, config)
        }
        None => ScraperServer::with_options(options, &cli.store, config)
            .map_err(|e| format!("Failed to create scraper server: {}", e))?,
    };

    match cli.transport {
        Transport::Stdio => {
            log::info!("Ready to accept MCP connections via stdio");
            let running = server.serve(stdio()).await?;
            let quit_reason = running.waiting().await?;
            log::info!("Server quit with reason: {:?}", quit_reason);
            // Give a small delay for destructors to complete
            tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        }
        Transport::Sse => {
            let bind_addr = format!("127.0.0.1:{}", cli.port);

            let config = SseServerConfig {
                bind: bind_addr.parse()?,
                sse_path: cli.sse_path.clone(),
                post_path: cli.sse_post_path.clone(),
                ct: CancellationToken::new(),
                sse_keep_alive: None,
            };

            let (sse_server, router) = SseServer::new(config);

            log::info!("Ready to accept MCP connections at http://{}{}", bind_addr, cli.sse_path);

            // Connections share one browser and one store
            let _cancellation_token = sse_server.with_service(move || server.clone());

            let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
            axum::serve(listener, router.into_make_service()).await?;
        }
        Transport::Http => {
            let bind_addr = format!("127.0.0.1:{}", cli.port);

            let service_factory = move || Ok::<_, std::io::Error>(server.clone());

            let http_service = StreamableHttpService::new(
                service_factory,
                LocalSessionManager::default().into(),
                Default::default(),
            );

            let router = axum::Router::new().nest_service(&cli.http_path, http_service);

            log::info!("Ready to accept MCP connections at http://{}{}", bind_addr, cli.http_path);

            let listener = tokio::net::TcpListener::bind(bind_addr).await?;
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
