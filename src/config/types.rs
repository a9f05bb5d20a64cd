use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
///
/// Built once at startup and shared read-only between the workers.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// The site being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL every relative page and image path is appended to
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path the discovery worker starts from (and resyncs to)
    pub entrypoint: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Custom User-Agent header
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Optional forward proxy
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: None,
            proxy: None,
        }
    }
}

/// Forward proxy for one URL scheme
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Scheme whose traffic goes through the proxy ("http" or "https")
    pub scheme: String,

    /// Proxy host and port, e.g. "127.0.0.1:8080"
    pub host: String,
}

impl ProxyConfig {
    /// The proxy URL, e.g. `http://127.0.0.1:8080`
    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Where pages and images are persisted
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite queue database
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Root directory for per-page image directories
    pub output: PathBuf,
}

/// Random pause inserted between successful iterations (milliseconds)
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThrottleConfig {
    pub min: u64,
    pub max: u64,
}

/// Iteration and attempt limits
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Discovery iterations before restarting from the entrypoint
    #[serde(default = "default_pages_threshold")]
    pub pages: u32,

    /// Download attempts per image before it is skipped
    #[serde(default = "default_images_threshold")]
    pub images: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pages: default_pages_threshold(),
            images: default_images_threshold(),
        }
    }
}

/// Fixed backoff for page-level failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Delay in milliseconds
    #[serde(default = "default_retry_delay")]
    pub delay: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: default_retry_delay(),
        }
    }
}

/// Queue store contention handling
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite busy timeout in milliseconds
    #[serde(rename = "busy-timeout", default = "default_busy_timeout")]
    pub busy_timeout: u64,

    /// Attempts for a write that keeps failing on a locked database
    #[serde(rename = "lock-attempts", default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Backoff per failed attempt in milliseconds
    #[serde(rename = "lock-backoff", default = "default_lock_backoff")]
    pub lock_backoff: u64,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout)
    }

    pub fn lock_backoff(&self) -> Duration {
        Duration::from_millis(self.lock_backoff)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: default_busy_timeout(),
            lock_attempts: default_lock_attempts(),
            lock_backoff: default_lock_backoff(),
        }
    }
}

/// Restart policy for crashed workers
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Consecutive failures tolerated before giving up
    #[serde(rename = "max-restarts", default = "default_max_restarts")]
    pub max_restarts: u32,

    /// First restart delay in milliseconds, doubled on each failure
    #[serde(rename = "initial-backoff", default = "default_initial_backoff")]
    pub initial_backoff: u64,

    /// Upper bound for the restart delay in milliseconds
    #[serde(rename = "max-backoff", default = "default_max_backoff")]
    pub max_backoff: u64,

    /// Seconds a worker must stay up for its failure count to reset
    #[serde(rename = "healthy-after", default = "default_healthy_after")]
    pub healthy_after: u64,
}

impl SupervisorConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff)
    }

    pub fn healthy_after(&self) -> Duration {
        Duration::from_secs(self.healthy_after)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            healthy_after: default_healthy_after(),
        }
    }
}

fn default_timeout() -> u64 {
    180
}

fn default_pages_threshold() -> u32 {
    10
}

fn default_images_threshold() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_lock_attempts() -> u32 {
    3
}

fn default_lock_backoff() -> u64 {
    50
}

fn default_max_restarts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_healthy_after() -> u64 {
    300
}
