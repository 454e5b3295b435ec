use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the generated-document cache (one JSON file per year/type).
    pub data_root: PathBuf,
    /// Root of the raw-body fetch cache.
    pub fetch_cache: PathBuf,
    /// Manually curated year -> official start instant table.
    pub starts_file: PathBuf,
    /// FORCE_GENERATE=true bypasses cache reads (never cache writes).
    pub force: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_root: env::var("WSER_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".data-cache")),
            fetch_cache: env::var("WSER_FETCH_CACHE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".fetch-cache")),
            starts_file: env::var("WSER_STARTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("manual-data/starts.json")),
            force: env::var("FORCE_GENERATE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Path of the generated document for a (year, type) pair.
    pub fn raw_path(&self, year: i32, file: &str) -> PathBuf {
        self.data_root.join("raw").join(year.to_string()).join(file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
