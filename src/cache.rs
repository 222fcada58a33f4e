//! On-disk cache of raw search API pages, one JSON file per page number.
//!
//! The cache never fails a run: unreadable or corrupt entries are logged
//! and reported as a miss.

use crate::ScraperError;
use lazy_regex::regex_captures;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        PageCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, page: u32) -> PathBuf {
        self.dir.join(format!("ted_api_page_{}.json", page))
    }

    fn read(&self, path: &Path) -> Result<Value, ScraperError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write(&self, path: &Path, value: &Value) -> Result<(), ScraperError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    pub fn load(&self, page: u32) -> Option<Value> {
        let path = self.path(page);
        if !path.exists() {
            return None;
        }

        match self.read(&path) {
            Ok(value) => {
                debug!("Cache hit for page {}", page);
                Some(value)
            }
            Err(e) => {
                warn!("Ignore cached page {} ({}): {}", page, path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, page: u32, value: &Value) {
        let path = self.path(page);
        if let Err(e) = self.write(&path, value) {
            warn!("Cannot cache page {} to {}: {}", page, path.display(), e);
        }
    }

    /// Page numbers currently cached, ascending.
    pub fn pages(&self) -> Vec<u32> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list cache dir {}: {}", self.dir.display(), e);
                return vec![];
            }
        };

        let mut pages: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let (_, page) = regex_captures!(r"^ted_api_page_(\d+)\.json$", name)?;
                page.parse().ok()
            })
            .collect();
        pages.sort_unstable();
        pages
    }
}
