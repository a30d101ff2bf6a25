use crate::{browser::{BrowserSession, LaunchOptions},
            pagination::ScrapeConfig,
            store::ScrapeStore,
            tools::ToolRegistry};
use rmcp::{ServerHandler,
           handler::server::router::tool::ToolRouter,
           model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
           tool_handler};
use std::{path::PathBuf,
          sync::{Arc, Mutex}};

/// Browser, result store and settings shared by every MCP request
pub(crate) struct ServerState {
    pub(crate) session: BrowserSession,
    pub(crate) store: ScrapeStore,
    pub(crate) config: ScrapeConfig,
    pub(crate) registry: ToolRegistry,
}

/// MCP server exposing the scraping tools.
///
/// Requests are served one at a time: tools drive a single browser tab and
/// write to a single store file.
#[derive(Clone)]
pub struct ScraperServer {
    pub(crate) state: Arc<Mutex<ServerState>>,
    tool_router: ToolRouter<ScraperServer>,
}

impl ScraperServer {
    pub fn new(session: BrowserSession, store: ScrapeStore, config: ScrapeConfig) -> Self {
        let state = ServerState {
            session,
            store,
            config,
            registry: ToolRegistry::with_defaults(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            tool_router: Self::tool_router(),
        }
    }

    /// Launch a browser and open the store at `store_path`
    pub fn with_options(
        options: LaunchOptions,
        store_path: impl Into<PathBuf>,
        config: ScrapeConfig,
    ) -> crate::Result<Self> {
        let session = BrowserSession::launch(options)?;
        let store = ScrapeStore::open(store_path)?;
        Ok(Self::new(session, store, config))
    }
}

#[tool_handler]
impl ServerHandler for ScraperServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Amazon product and review scraper. Use amz_extract_reviews on a product or review page to collect \
                 every review, amz_extract_product for product details, amz_store_stats to see what is stored and \
                 amz_export_csv to write the stored data to CSV files."
                    .to_string(),
            ),
        }
    }
}
