use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Subscription tier deciding the default postcode ceiling per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTier {
    Standard,
    Bulk,
}

impl AnalysisTier {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bulk" | "enterprise" => Self::Bulk,
            _ => Self::Standard,
        }
    }

    pub const fn default_max_postcodes(self) -> usize {
        match self {
            Self::Standard => 10_000,
            Self::Bulk => 50_000,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub analysis: AnalysisConfig,
    pub reference: ReferenceDataConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let tier = AnalysisTier::from_str(
            &env::var("ELIGIBILITY_TIER").unwrap_or_else(|_| "standard".to_string()),
        );
        let max_postcodes = positive_var("ELIGIBILITY_MAX_POSTCODES")?
            .unwrap_or_else(|| tier.default_max_postcodes());
        let chunk_size = positive_var("ELIGIBILITY_CHUNK_SIZE")?;
        let worker_count =
            positive_var("ELIGIBILITY_WORKERS")?.unwrap_or_else(AnalysisConfig::default_workers);
        let timeout = positive_var("ELIGIBILITY_TIMEOUT_SECS")?
            .map(|secs| Duration::from_secs(secs as u64));

        let data_dir = env::var("REFERENCE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/reference"));
        let cache_ttl = positive_var("REFERENCE_CACHE_TTL_SECS")?
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(ReferenceDataConfig::DEFAULT_CACHE_TTL);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            analysis: AnalysisConfig {
                tier,
                max_postcodes,
                chunk_size,
                worker_count,
                timeout,
            },
            reference: ReferenceDataConfig {
                data_dir,
                cache_ttl,
            },
        })
    }
}

fn positive_var(key: &'static str) -> Result<Option<usize>, ConfigError> {
    let raw = match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidNumber { key })?;
    if value == 0 {
        return Err(ConfigError::MustBePositive { key });
    }

    Ok(Some(value))
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colour output; only wanted on a developer terminal.
    pub ansi: bool,
}

/// Limits and pool sizing for population analysis runs.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub tier: AnalysisTier,
    pub max_postcodes: usize,
    /// Fixed chunk size; adaptive to the input size when unset.
    pub chunk_size: Option<usize>,
    pub worker_count: usize,
    /// Hard ceiling for a run; proportional to the input size when unset.
    pub timeout: Option<Duration>,
}

impl AnalysisConfig {
    const BASE_TIMEOUT: Duration = Duration::from_secs(10);
    const TIMEOUT_PER_THOUSAND: Duration = Duration::from_secs(2);

    pub fn for_tier(tier: AnalysisTier) -> Self {
        Self {
            tier,
            max_postcodes: tier.default_max_postcodes(),
            chunk_size: None,
            worker_count: Self::default_workers(),
            timeout: None,
        }
    }

    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(4)
    }

    pub fn effective_chunk_size(&self, total: usize) -> usize {
        if let Some(size) = self.chunk_size {
            return size.max(1);
        }

        match total {
            0..=2_000 => 500,
            2_001..=10_000 => 1_000,
            _ => 2_000,
        }
    }

    pub fn effective_timeout(&self, total: usize) -> Duration {
        self.timeout.unwrap_or_else(|| {
            let thousands = total.div_ceil(1_000) as u32;
            Self::BASE_TIMEOUT + Self::TIMEOUT_PER_THOUSAND * thousands
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::for_tier(AnalysisTier::Standard)
    }
}

/// Location and freshness policy of the reference tables.
#[derive(Debug, Clone)]
pub struct ReferenceDataConfig {
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
}

impl ReferenceDataConfig {
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3_600);
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    MustBePositive { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{} must be a non-negative integer", key)
            }
            ConfigError::MustBePositive { key } => write!(f, "{} must be greater than zero", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::MustBePositive { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ELIGIBILITY_TIER",
            "ELIGIBILITY_MAX_POSTCODES",
            "ELIGIBILITY_CHUNK_SIZE",
            "ELIGIBILITY_WORKERS",
            "ELIGIBILITY_TIMEOUT_SECS",
            "REFERENCE_DATA_DIR",
            "REFERENCE_CACHE_TTL_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.ansi);
        assert_eq!(config.analysis.tier, AnalysisTier::Standard);
        assert_eq!(config.analysis.max_postcodes, 10_000);
        assert!(config.analysis.chunk_size.is_none());
        assert!(config.analysis.worker_count >= 1);
        assert_eq!(config.reference.data_dir, PathBuf::from("data/reference"));
        assert_eq!(
            config.reference.cache_ttl,
            ReferenceDataConfig::DEFAULT_CACHE_TTL
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn bulk_tier_raises_postcode_ceiling_unless_overridden() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ELIGIBILITY_TIER", "bulk");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.analysis.max_postcodes, 50_000);

        env::set_var("ELIGIBILITY_MAX_POSTCODES", "25000");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.analysis.max_postcodes, 25_000);
        reset_env();
    }

    #[test]
    fn rejects_zero_and_garbage_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ELIGIBILITY_WORKERS", "0");
        match AppConfig::load() {
            Err(ConfigError::MustBePositive { key }) => assert_eq!(key, "ELIGIBILITY_WORKERS"),
            other => panic!("expected MustBePositive, got {other:?}"),
        }

        reset_env();
        env::set_var("ELIGIBILITY_CHUNK_SIZE", "lots");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "ELIGIBILITY_CHUNK_SIZE"),
            other => panic!("expected InvalidNumber, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn chunk_size_and_timeout_scale_with_input() {
        let config = AnalysisConfig::default();
        assert_eq!(config.effective_chunk_size(10), 500);
        assert_eq!(config.effective_chunk_size(8_000), 1_000);
        assert_eq!(config.effective_chunk_size(50_000), 2_000);
        assert_eq!(config.effective_timeout(0), Duration::from_secs(10));
        assert_eq!(config.effective_timeout(1_500), Duration::from_secs(14));

        let fixed = AnalysisConfig {
            chunk_size: Some(64),
            timeout: Some(Duration::from_millis(250)),
            ..AnalysisConfig::default()
        };
        assert_eq!(fixed.effective_chunk_size(50_000), 64);
        assert_eq!(fixed.effective_timeout(50_000), Duration::from_millis(250));
    }
}
