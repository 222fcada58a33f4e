//! Rebuilds a CSV file from the cached search pages, without any request.

use clap::Parser;
use std::path::PathBuf;
use ted_tender_scraper::cache::PageCache;
use ted_tender_scraper::sink::CsvSink;
use ted_tender_scraper::ted::{self, NoticeExtractor, PREFERRED_LANGUAGE};
use ted_tender_scraper::{Extractor, Schema, Sink};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "replay-cache")]
struct Args {
    #[arg(long, default_value = "ted_cache", env = "TED_CACHE_DIR")]
    cache_dir: PathBuf,

    #[arg(long, short, default_value = "ted_tenders.csv", env = "TED_OUTPUT")]
    output: PathBuf,

    #[arg(long, default_value = PREFERRED_LANGUAGE, env = "TED_LANGUAGE")]
    language: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| "info".into()),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();
    let cache = PageCache::new(&args.cache_dir);
    let extractor = NoticeExtractor::new(args.language);
    let mut sink = CsvSink::create(&args.output, Schema::ted())?;

    let pages = cache.pages();
    if pages.is_empty() {
        warn!("No cached pages in {}", cache.dir().display());
    }

    let mut total = 0;
    for page in pages {
        let Some(value) = cache.load(page) else {
            continue;
        };
        let rows: Vec<_> = ted::notices(&value)
            .iter()
            .flat_map(|notice| extractor.extract(notice))
            .collect();
        total += sink.write_rows(&rows)?;
        info!("[page {}] Replayed {} rows", page, rows.len());
    }
    sink.flush()?;

    info!("Wrote {} rows to {}", total, args.output.display());
    Ok(())
}
