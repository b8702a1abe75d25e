use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: AdminConfig,
    pub cors: CorsConfig,
    pub proxy: ProxyConfig,
    pub consent: ConsentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Postgres,
}

/// Fixed-window admission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token guarding analytics reports; reports fail with 500 when unset
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Trust CF-Connecting-IP
    Cloudflare,
    /// Walk Forwarded / X-Forwarded-For, skipping trusted proxies
    Standard,
    /// Only the socket address
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    pub ttl_days: u64,
}

impl RateLimitConfig {
    /// Build from raw overrides; anything unparsable or non-positive falls back to the default
    pub fn from_overrides(max_requests: Option<&str>, window_secs: Option<&str>) -> Self {
        let max_requests = positive_or::<u32>(max_requests, "RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or(DEFAULT_MAX_REQUESTS);
        let window_secs = positive_or::<u64>(window_secs, "RATE_LIMIT_WINDOW_SECONDS")
            .unwrap_or(DEFAULT_WINDOW_SECS);

        Self {
            max_requests,
            window_secs,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl ConsentConfig {
    const fn default_ttl_days() -> u64 {
        365
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_days.saturating_mul(24 * 60 * 60)
    }
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            ttl_days: Self::default_ttl_days(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: TrustedProxyMode::Cloudflare,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Strictly positive value of the target type; anything else warns and yields `None`
fn positive_or<T>(raw: Option<&str>, name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            tracing::warn!("Invalid {name} '{raw}', falling back to default");
            None
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_source<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "8787".to_string())
            .parse::<u16>()?;

        let backend = match var("STORE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite,
            "postgres" | "postgresql" => StoreBackend::Postgres,
            other => {
                tracing::warn!(
                    "Unknown STORE_BACKEND '{other}', falling back to 'memory'. Supported values: memory, sqlite, postgres"
                );
                StoreBackend::Memory
            }
        };
        let url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://./consentd.db".to_string());
        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(5);

        let rate_limit = RateLimitConfig::from_overrides(
            var("RATE_LIMIT_MAX_REQUESTS").as_deref(),
            var("RATE_LIMIT_WINDOW_SECONDS").as_deref(),
        );

        let admin_token = var("ADMIN_TOKEN").filter(|t| !t.is_empty());

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mode = match var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|| "cloudflare".to_string())
            .to_lowercase()
            .as_str()
        {
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'cloudflare'. Supported values: cloudflare, standard, none"
                );
                TrustedProxyMode::Cloudflare
            }
        };

        let mut trusted_proxies = Vec::new();
        if let Some(list) = var("TRUSTED_PROXIES") {
            for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                match entry.parse::<IpNet>() {
                    Ok(net) => trusted_proxies.push(net),
                    Err(_) => match entry.parse::<std::net::IpAddr>() {
                        Ok(ip) => trusted_proxies.push(IpNet::from(ip)),
                        Err(_) => tracing::warn!("Ignoring invalid TRUSTED_PROXIES entry '{entry}'"),
                    },
                }
            }
        }

        let ttl_days = var("CONSENT_TTL_DAYS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or_else(ConsentConfig::default_ttl_days);

        Ok(Config {
            server: ServerConfig { host, port },
            store: StoreConfig {
                backend,
                url,
                max_connections,
            },
            rate_limit,
            admin: AdminConfig { token: admin_token },
            cors: CorsConfig { allowed_origins },
            proxy: ProxyConfig {
                mode,
                trusted_proxies,
            },
            consent: ConsentConfig { ttl_days },
        })
    }
}
