use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

const CACHE_DIR: &str = "soccer_predictor";
const WAREHOUSE_FILE: &str = "warehouse.sqlite";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Settings {
    pub warehouse: WarehouseConfig,
    pub scraper: ScraperConfig,
    pub model: ModelConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// File attached as schema `tmp`. `:memory:` keeps everything in RAM.
    pub path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub page_load_timeout: Duration,
    pub page_delay: Duration,
    pub user_agent: String,
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub test_size: f64,
    pub random_state: u64,
    pub max_depth: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Models"),
            // Large held-out share, matching the historical models.
            test_size: 0.6,
            random_state: 2,
            max_depth: 2,
            n_estimators: 100,
            learning_rate: 0.1,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: default_warehouse_path(),
            timeout: Duration::from_secs(240),
        }
    }
}

impl WarehouseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(30),
            page_delay: Duration::from_millis(1000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            snapshot_dir: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let model_defaults = ModelConfig::default();
        let warehouse_defaults = WarehouseConfig::default();
        let scraper_defaults = ScraperConfig::default();

        let warehouse = WarehouseConfig {
            path: env_path("WAREHOUSE_PATH").unwrap_or(warehouse_defaults.path),
            timeout: Duration::from_secs(env_parse(
                "WAREHOUSE_TIMEOUT_SECS",
                warehouse_defaults.timeout.as_secs(),
            )),
        };

        let scraper = ScraperConfig {
            page_load_timeout: Duration::from_secs(
                env_parse(
                    "SCRAPER_PAGE_LOAD_TIMEOUT_SECS",
                    scraper_defaults.page_load_timeout.as_secs(),
                )
                .max(1),
            ),
            page_delay: Duration::from_millis(env_parse(
                "SCRAPER_PAGE_DELAY_MS",
                scraper_defaults.page_delay.as_millis() as u64,
            )),
            user_agent: env_string("SCRAPER_USER_AGENT").unwrap_or(scraper_defaults.user_agent),
            snapshot_dir: env_path("SCRAPER_SNAPSHOT_DIR"),
        };

        let model = ModelConfig {
            dir: env_path("MODEL_DIR").unwrap_or(model_defaults.dir),
            test_size: env_parse("MODEL_TEST_SIZE", model_defaults.test_size),
            random_state: env_parse("MODEL_RANDOM_STATE", model_defaults.random_state),
            max_depth: env_parse("MODEL_MAX_DEPTH", model_defaults.max_depth).max(1),
            n_estimators: env_parse("MODEL_N_ESTIMATORS", model_defaults.n_estimators).max(1),
            learning_rate: env_parse("MODEL_LEARNING_RATE", model_defaults.learning_rate),
        };

        let log = LogConfig {
            level: env_string("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json: env_string("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };

        Self {
            warehouse,
            scraper,
            model,
            log,
        }
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn default_warehouse_path() -> PathBuf {
    app_cache_dir()
        .map(|dir| dir.join(WAREHOUSE_FILE))
        .unwrap_or_else(|| PathBuf::from(WAREHOUSE_FILE))
}

fn env_string(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = env_string(key) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %raw, fallback = %default, "ignoring malformed setting");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_defaults_match_historical_tuning() {
        let m = ModelConfig::default();
        assert_eq!(m.test_size, 0.6);
        assert_eq!(m.random_state, 2);
        assert_eq!(m.max_depth, 2);
        assert_eq!(m.n_estimators, 100);
        assert!((m.learning_rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        // SAFETY: key is unique to this test.
        unsafe { std::env::set_var("SOCCER_PREDICTOR_TEST_PARSE", "not-a-number") };
        assert_eq!(env_parse("SOCCER_PREDICTOR_TEST_PARSE", 7usize), 7);
        unsafe { std::env::set_var("SOCCER_PREDICTOR_TEST_PARSE", " 12 ") };
        assert_eq!(env_parse("SOCCER_PREDICTOR_TEST_PARSE", 7usize), 12);
        unsafe { std::env::remove_var("SOCCER_PREDICTOR_TEST_PARSE") };
    }
}
