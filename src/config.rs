use log::warn;
use std::path::PathBuf;

// Defaults
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "database";
const DEFAULT_STORE_FILE: &str = "store.bin.gz";
const DEFAULT_PREVIEW_ROWS: usize = 100;

/// Runtime configuration
///
/// Every field can be overridden through a `DATAVIS_*` environment variable.
/// Missing variables fall back to the defaults above.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Address the web server binds to (`DATAVIS_ADDR`)
    pub addr: String,

    /// Directory holding the durable store snapshot (`DATAVIS_DATA_DIR`)
    pub data_dir: PathBuf,

    /// Snapshot file name inside `data_dir` (`DATAVIS_STORE_FILE`)
    pub store_file: String,

    /// Number of rows shown in the data table preview (`DATAVIS_PREVIEW_ROWS`)
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_file: DEFAULT_STORE_FILE.to_string(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, or `None` when unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(addr) = lookup("DATAVIS_ADDR").filter(|v| !v.trim().is_empty()) {
            config.addr = addr;
        }
        if let Some(dir) = lookup("DATAVIS_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("DATAVIS_STORE_FILE").filter(|v| !v.trim().is_empty()) {
            config.store_file = file;
        }
        if let Some(rows) = lookup("DATAVIS_PREVIEW_ROWS") {
            match rows.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.preview_rows = n,
                _ => warn!(
                    "ignoring DATAVIS_PREVIEW_ROWS={:?}, using {}",
                    rows, DEFAULT_PREVIEW_ROWS
                ),
            }
        }

        config
    }

    /// Full path of the store snapshot
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}
