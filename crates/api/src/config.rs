use webopt_core::config::{
    default_breakpoints, parse_breakpoints, PipelineConfig, PlanConfig, QuotaConfig,
    DEFAULT_ANONYMOUS_DAILY_LIMIT, DEFAULT_CYCLE_DAYS, DEFAULT_MAX_CONCURRENT_IMAGES,
    DEFAULT_MAX_FILES_PER_BATCH, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_VARIANT_QUALITY,
};
use webopt_core::error::CoreError;
use webopt_pipeline::BackendPreference;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development except
/// `JWT_SECRET`. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight batches, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory originals and derived assets are written under.
    pub storage_root: String,
    /// Codec backend selection (default: `auto`).
    pub codec_backend: BackendPreference,
    /// Optional JSON file of subscriber accounts to register at startup.
    pub accounts_file: Option<String>,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Breakpoints, quality, concurrency, limits and quota plans.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                        |
    /// |-------------------------|--------------------------------|
    /// | `HOST`                  | `0.0.0.0`                      |
    /// | `PORT`                  | `3000`                         |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`        |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                           |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                           |
    /// | `STORAGE_ROOT`          | `./storage`                    |
    /// | `CODEC_BACKEND`         | `auto` (`auto`, `full`, `basic`) |
    /// | `ACCOUNTS_FILE`         | unset                          |
    /// | `BREAKPOINTS`           | `thumbnail:320,...,xlarge:1280` |
    /// | `VARIANT_QUALITY`       | `80`                           |
    /// | `MAX_CONCURRENT_IMAGES` | `4`                            |
    /// | `MAX_FILES_PER_BATCH`   | `50`                           |
    /// | `MAX_UPLOAD_BYTES`      | `20971520`                     |
    /// | `ANON_DAILY_LIMIT`      | `10`                           |
    /// | `BILLING_CYCLE_DAYS`    | `30`                           |
    /// | `QUOTA_PLANS`           | `starter:500:2,pro:2500:1`     |
    ///
    /// # Panics
    ///
    /// Panics on any unparsable value or an inconsistent pipeline
    /// configuration. Misconfiguration should stop the process at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let storage_root = std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".into());

        let codec_backend = BackendPreference::from_name(
            &std::env::var("CODEC_BACKEND").unwrap_or_else(|_| "auto".into()),
        )
        .expect("CODEC_BACKEND must be one of: auto, full, basic");

        let accounts_file = std::env::var("ACCOUNTS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let jwt = JwtConfig::from_env();
        let pipeline = pipeline_config_from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            storage_root,
            codec_backend,
            accounts_file,
            jwt,
            pipeline,
        }
    }
}

fn pipeline_config_from_env() -> PipelineConfig {
    let breakpoints = match std::env::var("BREAKPOINTS") {
        Ok(spec) => parse_breakpoints(&spec).expect("BREAKPOINTS must be a name:width list"),
        Err(_) => default_breakpoints(),
    };

    let variant_quality: u8 = std::env::var("VARIANT_QUALITY")
        .unwrap_or_else(|_| DEFAULT_VARIANT_QUALITY.to_string())
        .parse()
        .expect("VARIANT_QUALITY must be a valid u8");

    let max_concurrent_images: usize = std::env::var("MAX_CONCURRENT_IMAGES")
        .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT_IMAGES.to_string())
        .parse()
        .expect("MAX_CONCURRENT_IMAGES must be a valid usize");

    let max_files_per_batch: usize = std::env::var("MAX_FILES_PER_BATCH")
        .unwrap_or_else(|_| DEFAULT_MAX_FILES_PER_BATCH.to_string())
        .parse()
        .expect("MAX_FILES_PER_BATCH must be a valid usize");

    let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
        .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
        .parse()
        .expect("MAX_UPLOAD_BYTES must be a valid usize");

    let anonymous_daily_limit: u32 = std::env::var("ANON_DAILY_LIMIT")
        .unwrap_or_else(|_| DEFAULT_ANONYMOUS_DAILY_LIMIT.to_string())
        .parse()
        .expect("ANON_DAILY_LIMIT must be a valid u32");

    let cycle_days: i64 = std::env::var("BILLING_CYCLE_DAYS")
        .unwrap_or_else(|_| DEFAULT_CYCLE_DAYS.to_string())
        .parse()
        .expect("BILLING_CYCLE_DAYS must be a valid i64");

    let plans = match std::env::var("QUOTA_PLANS") {
        Ok(spec) => parse_plans(&spec).expect("QUOTA_PLANS must be a name:limit:rate list"),
        Err(_) => QuotaConfig::default().plans,
    };

    let config = PipelineConfig {
        breakpoints,
        variant_quality,
        max_concurrent_images,
        max_files_per_batch,
        max_upload_bytes,
        quota: QuotaConfig {
            anonymous_daily_limit,
            cycle_days,
            plans,
        },
        ..PipelineConfig::default()
    };
    if let Err(e) = config.validate() {
        panic!("Invalid pipeline configuration: {e}");
    }
    config
}

/// Parse a `name:monthly_limit:overage_rate_cents` list.
pub fn parse_plans(spec: &str) -> Result<Vec<PlanConfig>, CoreError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [name, limit, rate] = parts.as_slice() else {
                return Err(CoreError::Validation(format!(
                    "Plan '{entry}' must be written as name:limit:rate"
                )));
            };
            let invalid =
                || CoreError::Validation(format!("Plan '{entry}' has a non-numeric field"));
            Ok(PlanConfig {
                name: name.to_string(),
                monthly_limit: limit.parse().map_err(|_| invalid())?,
                overage_rate_cents: rate.parse().map_err(|_| invalid())?,
            })
        })
        .collect()
}
