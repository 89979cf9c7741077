//! Server configuration
//!
//! Everything is read from `BKS_*` environment variables (see `cli-help.txt` for the full list). Missing or malformed
//! values are logged and replaced by defaults, so the server always starts. The one exception is the installment
//! policy: an out-of-range `BKS_DOWN_PAYMENT_PERCENT` is rejected when the server is built.
use std::{env, path::PathBuf};

use booking_engine::{
    ledger::{DEFAULT_DOWN_PAYMENT_PERCENT, DEFAULT_PAYMENT_METHOD},
    DEFAULT_CLAIM_TIMEOUT_SECS,
};
use log::*;
use studio_common::{
    helpers::{parse_boolean_flag, parse_list},
    Secret,
};

const DEFAULT_BKS_HOST: &str = "127.0.0.1";
const DEFAULT_BKS_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/booking_store.db";
const DEFAULT_DOCUMENT_DIR: &str = "data/documents";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Admin requests must present this key in the `X-Booking-Admin-Key` header. If empty, nobody is an admin.
    pub admin_api_key: Secret<String>,
    pub scheduling: SchedulingConfig,
    /// The down payment share of an order's total, in percent
    pub down_payment_percent: u32,
    pub payment_methods: Vec<String>,
    /// Where the bundled renderer writes generated documents
    pub document_dir: PathBuf,
    /// Seconds after which an unfinished document claim stops blocking its document
    pub document_claim_timeout: i64,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SchedulingConfig {
    /// Shared secret for the HMAC signature on scheduling-provider callbacks
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BKS_HOST.to_string(),
            port: DEFAULT_BKS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_api_key: Secret::default(),
            scheduling: SchedulingConfig { hmac_secret: Secret::default(), hmac_checks: true },
            down_payment_percent: DEFAULT_DOWN_PAYMENT_PERCENT,
            payment_methods: vec![DEFAULT_PAYMENT_METHOD.to_string()],
            document_dir: PathBuf::from(DEFAULT_DOCUMENT_DIR),
            document_claim_timeout: DEFAULT_CLAIM_TIMEOUT_SECS,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BKS_HOST").ok().unwrap_or_else(|| DEFAULT_BKS_HOST.into());
        let port = env::var("BKS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BKS_PORT. {e} Using the default, {DEFAULT_BKS_PORT}, instead."
                    );
                    DEFAULT_BKS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BKS_PORT);
        let database_url = env::var("BKS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BKS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let admin_api_key = Secret::new(env::var("BKS_ADMIN_API_KEY").ok().unwrap_or_else(|| {
            warn!("🚨️ BKS_ADMIN_API_KEY is not set. Admin routes will refuse every request.");
            String::default()
        }));
        let scheduling = SchedulingConfig::from_env_or_defaults();
        let down_payment_percent = configure_down_payment_percent();
        let payment_methods = env::var("BKS_PAYMENT_METHODS").map(|s| parse_list(&s)).unwrap_or_default();
        let payment_methods = if payment_methods.is_empty() {
            info!("🪛️ BKS_PAYMENT_METHODS is not set. Accepting {DEFAULT_PAYMENT_METHOD} only.");
            vec![DEFAULT_PAYMENT_METHOD.to_string()]
        } else {
            payment_methods
        };
        let document_dir = env::var("BKS_DOCUMENT_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            info!("🪛️ BKS_DOCUMENT_DIR is not set. Documents will be written to {DEFAULT_DOCUMENT_DIR}.");
            PathBuf::from(DEFAULT_DOCUMENT_DIR)
        });
        let document_claim_timeout = configure_claim_timeout();
        let use_x_forwarded_for = parse_boolean_flag(env::var("BKS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("BKS_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            admin_api_key,
            scheduling,
            down_payment_percent,
            payment_methods,
            document_dir,
            document_claim_timeout,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("BKS_SCHEDULING_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ BKS_SCHEDULING_HMAC_SECRET is not set. Please set it to the signing secret shared with your \
                 scheduling provider."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("BKS_SCHEDULING_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ HMAC checks on scheduling callbacks are DISABLED. Anyone can move meetings around.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

fn configure_down_payment_percent() -> u32 {
    env::var("BKS_DOWN_PAYMENT_PERCENT")
        .map_err(|_| {
            info!(
                "🪛️ BKS_DOWN_PAYMENT_PERCENT is not set. Using the default value of {DEFAULT_DOWN_PAYMENT_PERCENT}%."
            )
        })
        .and_then(|s| {
            s.trim()
                .trim_end_matches('%')
                .parse::<u32>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for BKS_DOWN_PAYMENT_PERCENT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_DOWN_PAYMENT_PERCENT)
}

fn configure_claim_timeout() -> i64 {
    match env::var("BKS_DOCUMENT_CLAIM_TIMEOUT").map(|s| s.trim().parse::<i64>()) {
        Ok(Ok(secs)) if secs > 0 => secs,
        Ok(_) => {
            warn!(
                "🪛️ BKS_DOCUMENT_CLAIM_TIMEOUT must be a positive number of seconds. Using {DEFAULT_CLAIM_TIMEOUT_SECS}."
            );
            DEFAULT_CLAIM_TIMEOUT_SECS
        },
        Err(_) => DEFAULT_CLAIM_TIMEOUT_SECS,
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that handlers may need. Secrets stay out of it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8380);
        assert_eq!(config.down_payment_percent, 25);
        assert_eq!(config.payment_methods, vec!["bank_transfer".to_string()]);
        assert_eq!(config.document_claim_timeout, 600);
        assert!(config.admin_api_key.is_empty());
        assert!(config.scheduling.hmac_checks);
        let options = ServerOptions::from_config(&config);
        assert!(!options.use_forwarded);
    }
}
