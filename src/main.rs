use clap::Parser;
use std::path::PathBuf;
use ted_tender_scraper::cache::PageCache;
use ted_tender_scraper::sink::CsvSink;
use ted_tender_scraper::ted::{TedClient, DEFAULT_QUERY, PREFERRED_LANGUAGE, TED_API_URL};
use ted_tender_scraper::{run_scraper, ScrapeConfig, ScrapeMode, Schema};
use tokio::time::Duration;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "ted-tender-scraper")]
#[command(about = "Scrape TED procurement notices into a CSV file")]
struct Args {
    /// `search` flattens API results, `detail` reads every rendered notice
    #[arg(long, value_enum, default_value = "search", env = "TED_MODE")]
    mode: ScrapeMode,

    #[arg(long, default_value_t = 1, env = "TED_START_PAGE")]
    start_page: u32,

    /// Number of search pages to visit
    #[arg(long, default_value_t = 1, env = "TED_PAGES")]
    pages: u32,

    #[arg(long, default_value_t = 100, env = "TED_PAGE_SIZE")]
    page_size: u32,

    /// Expert search query
    #[arg(long, default_value = DEFAULT_QUERY, env = "TED_QUERY")]
    query: String,

    #[arg(long, default_value = TED_API_URL, env = "TED_API_URL")]
    api_url: String,

    /// Pause between two requests
    #[arg(long, default_value_t = 2000, env = "TED_DELAY_MS")]
    delay_ms: u64,

    #[arg(long, default_value = "ted_cache", env = "TED_CACHE_DIR")]
    cache_dir: PathBuf,

    /// Always fetch pages, refreshing the cache
    #[arg(long)]
    no_cache: bool,

    #[arg(long, short, default_value = "ted_tenders.csv", env = "TED_OUTPUT")]
    output: PathBuf,

    /// Append to the output file instead of replacing it
    #[arg(long)]
    append: bool,

    /// Preferred language of multilingual fields
    #[arg(long, default_value = PREFERRED_LANGUAGE, env = "TED_LANGUAGE")]
    language: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "debug,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();
    let config = ScrapeConfig {
        mode: args.mode,
        start_page: args.start_page,
        pages: args.pages,
        page_size: args.page_size,
        delay: Duration::from_millis(args.delay_ms),
        use_cache: !args.no_cache,
        language: args.language,
    };

    let client = TedClient::with_base_url(&args.api_url)?.with_query(args.query);
    let cache = PageCache::new(args.cache_dir);
    let mut sink = if args.append {
        CsvSink::append(&args.output, Schema::ted())?
    } else {
        CsvSink::create(&args.output, Schema::ted())?
    };

    info!(
        "Scrape {} page(s) from page {} in {:?} mode into {}",
        config.pages,
        config.start_page,
        config.mode,
        args.output.display()
    );
    let summary = run_scraper(&client, Some(&cache), &mut sink, &config).await?;
    info!("Done: {:?}", summary);

    Ok(())
}
