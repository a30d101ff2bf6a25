//! amz-scraper command line
//!
//! ```bash
//! amz-scraper reviews https://www.amazon.com/dp/B0ABCDEF12 --max-pages 5
//! amz-scraper product https://www.amazon.com/dp/B0ABCDEF12
//! amz-scraper replay ./saved-pages --asin B0ABCDEF12
//! amz-scraper export --output-dir ./csv
//! amz-scraper stats
//! ```

use amz_scraper::{agent::{ChromeAgent, ReplayAgent},
                  browser::{BrowserSession, LaunchOptions},
                  export::ProductCsvOptions,
                  models::SpecBucket,
                  pagination::{DEFAULT_ORIGIN, PageBudget, RunReport, ScrapeConfig, product_page_url, resolve_asin,
                               scrape_product, scrape_reviews},
                  store::ScrapeStore,
                  tools::utils::normalize_url};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "amz-scraper")]
#[command(version)]
#[command(about = "Scrape Amazon products and reviews to CSV", long_about = None)]
struct Cli {
    /// JSON file holding scraped results between exports
    #[arg(long, global = true, value_name = "FILE", default_value = "amz_store.json")]
    store: PathBuf,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct BrowserArgs {
    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Disable the Chrome sandbox (needed in some containers)
    #[arg(long)]
    no_sandbox: bool,
}

impl BrowserArgs {
    fn launch(&self) -> Result<BrowserSession> {
        let mut options = LaunchOptions::new().headless(!self.headed).sandbox(!self.no_sandbox);
        if let Some(path) = &self.executable_path {
            options = options.chrome_path(path);
        }
        if let Some(dir) = &self.user_data_dir {
            options = options.user_data_dir(dir);
        }
        BrowserSession::launch(options).context("Could not start the browser")
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FallbackBucket {
    ItemDetails,
    AdditionalDetails,
}

impl From<FallbackBucket> for SpecBucket {
    fn from(bucket: FallbackBucket) -> Self {
        match bucket {
            FallbackBucket::ItemDetails => SpecBucket::ItemDetails,
            FallbackBucket::AdditionalDetails => SpecBucket::AdditionalDetails,
        }
    }
}

#[derive(Args, Clone)]
struct ScrapeArgs {
    /// Stop after this many review pages (0: all)
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Give up on a page change after this many milliseconds
    #[arg(long, value_name = "MS", default_value = "10000")]
    navigation_timeout: u64,

    /// Pause after each page change, in milliseconds
    #[arg(long, value_name = "MS", default_value = "2000")]
    settle: u64,

    /// Marketplace origin for generated URLs
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Bucket for specifications no rule recognizes
    #[arg(long, value_enum, default_value = "item-details")]
    spec_fallback: FallbackBucket,
}

impl ScrapeArgs {
    fn config(&self) -> ScrapeConfig {
        ScrapeConfig::new()
            .budget(PageBudget::from_max_pages(self.max_pages))
            .navigation_timeout(std::time::Duration::from_millis(self.navigation_timeout))
            .settle(std::time::Duration::from_millis(self.settle))
            .origin(self.origin.clone())
            .spec_fallback(self.spec_fallback.into())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Scrape every review page of a product
    Reviews {
        /// Product or review page URL
        url: String,

        /// Also extract the product page and store it
        #[arg(long)]
        with_product: bool,

        #[command(flatten)]
        scrape: ScrapeArgs,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Extract product details from a product page
    Product {
        /// Product page URL
        url: String,

        #[command(flatten)]
        scrape: ScrapeArgs,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Run the scraper over saved HTML pages instead of a browser
    Replay {
        /// Directory with product.html and numbered review pages
        dir: PathBuf,

        /// Product identifier the pages belong to
        #[arg(long)]
        asin: String,

        #[command(flatten)]
        scrape: ScrapeArgs,
    },

    /// Write stored data to CSV files
    Export {
        /// Destination directory
        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,

        /// Add the materials_care_json column to the product CSV
        #[arg(long)]
        materials_care: bool,

        /// Keep the stored data after exporting
        #[arg(long)]
        keep: bool,
    },

    /// Show what is stored
    Stats,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_report(report: &RunReport) {
    println!(
        "{} ({}): {} reviews from {} pages, {}",
        report.session.product_name,
        report.session.asin,
        report.review_count(),
        report.pages_visited,
        report.termination
    );
}

fn save_report(store: &mut ScrapeStore, report: &RunReport) -> Result<()> {
    if report.review_count() == 0 {
        log::warn!("No reviews collected");
        if let Some(product) = &report.session.product {
            store.add_product(product.clone());
        }
    } else {
        let key = store.add_session(report.session.clone().into_entry());
        println!("Stored as {}", key);
    }
    store.save()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut store = ScrapeStore::open(&cli.store).with_context(|| format!("Could not open {}", cli.store.display()))?;

    match cli.command {
        Command::Reviews {
            url,
            with_product,
            scrape,
            browser,
        } => {
            let url = normalize_url(&url);
            let config = scrape.config();
            let session = browser.launch()?;
            let mut agent = ChromeAgent::new(&session);

            let product = if with_product {
                let product_url = product_page_url(&config.origin, &resolve_asin(&url)?);
                Some(scrape_product(&mut agent, Some(&product_url), &config)?)
            } else {
                None
            };

            let mut report = scrape_reviews(&mut agent, &url, &config)?;
            if let Some(product) = product {
                report.session.attach_product(product);
            }
            print_report(&report);
            save_report(&mut store, &report)?;
            session.close()?;
        }
        Command::Product { url, scrape, browser } => {
            let url = normalize_url(&url);
            let session = browser.launch()?;
            let mut agent = ChromeAgent::new(&session);

            let product = scrape_product(&mut agent, Some(&url), &scrape.config())?;
            println!("{}", serde_json::to_string_pretty(&product)?);
            store.add_product(product);
            store.save()?;
            session.close()?;
        }
        Command::Replay { dir, asin, scrape } => {
            let config = scrape.config();
            let mut agent = ReplayAgent::from_dir(&dir, &asin)?.origin(config.origin.clone());
            if agent.review_page_count() == 0 && !agent.has_product_page() {
                bail!("No saved pages found in {}", dir.display());
            }

            let product_url = product_page_url(&config.origin, &asin);

            let product = if agent.has_product_page() {
                Some(scrape_product(&mut agent, Some(&product_url), &config)?)
            } else {
                None
            };

            if agent.review_page_count() > 0 {
                let mut report = scrape_reviews(&mut agent, &product_url, &config)?;
                if let Some(product) = product {
                    report.session.attach_product(product);
                }
                print_report(&report);
                save_report(&mut store, &report)?;
            } else {
                if let Some(product) = product {
                    store.add_product(product);
                }
                store.save()?;
            }
        }
        Command::Export {
            output_dir,
            materials_care,
            keep,
        } => {
            let options = ProductCsvOptions {
                include_materials_care: materials_care,
            };
            let summary = store.export(&output_dir, &options)?;
            if summary.is_empty() {
                println!("No data to export");
                return Ok(());
            }

            for path in [&summary.reviews_path, &summary.products_path].into_iter().flatten() {
                println!("Wrote {}", path.display());
            }

            if !keep {
                store.clear();
                store.save()?;
            }
        }
        Command::Stats => {
            let stats = store.stats();
            println!("Product sessions: {}", stats.product_sessions);
            println!("Reviews:          {}", stats.reviews);
            println!("Product info:     {}", stats.product_info);
        }
    }

    Ok(())
}
