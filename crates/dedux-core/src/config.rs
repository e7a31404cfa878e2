//! Runtime settings.
//!
//! Everything is environment-driven with sensible defaults; the CLI
//! overrides individual values through flags. Model server settings
//! (`OLLAMA_HOST`, `OLLAMA_MODEL`, `OLLAMA_VISION_MODEL`, `AI_BACKEND`)
//! are read by the reasoner itself, and the database key
//! (`DEDUX_DB_KEY`) by the database layer.

use std::path::PathBuf;

use chrono::Datelike;

/// Env var selecting the tax year rules are looked up under.
pub const TAX_YEAR_ENV: &str = "DEDUX_TAX_YEAR";

/// Directory name under the platform data dir.
pub const DATA_DIR_NAME: &str = "dedux";

/// User id applied when the CLI or API caller gives none.
pub const DEFAULT_USER_ID: &str = "local";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Tax year used for rule lookups and seeding
    pub tax_year: i32,
    /// Root directory for the database, receipt images, and prompt overrides
    pub data_dir: PathBuf,
}

impl Settings {
    /// Settings from the environment with defaults applied.
    pub fn from_env() -> Self {
        let tax_year = std::env::var(TAX_YEAR_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(current_tax_year);

        Self {
            tax_year,
            data_dir: default_data_dir(),
        }
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn with_tax_year(mut self, tax_year: i32) -> Self {
        self.tax_year = tax_year;
        self
    }

    /// Database file path.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("dedux.db")
    }

    /// Directory for stored receipt images.
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("receipts")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

/// The current calendar year, the default tax year.
pub fn current_tax_year() -> i32 {
    chrono::Local::now().year()
}

/// Platform data dir with a fallback to the working directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let settings = Settings::from_env().with_data_dir(PathBuf::from("/tmp/dedux-test"));
        assert_eq!(settings.db_path(), PathBuf::from("/tmp/dedux-test/dedux.db"));
        assert_eq!(
            settings.images_dir(),
            PathBuf::from("/tmp/dedux-test/receipts")
        );
    }

    #[test]
    fn test_tax_year_env_override() {
        std::env::set_var(TAX_YEAR_ENV, "2024");
        assert_eq!(Settings::from_env().tax_year, 2024);
        std::env::remove_var(TAX_YEAR_ENV);

        std::env::set_var(TAX_YEAR_ENV, "not-a-year");
        assert_eq!(Settings::from_env().tax_year, current_tax_year());
        std::env::remove_var(TAX_YEAR_ENV);
    }
}
