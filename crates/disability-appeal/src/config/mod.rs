use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAIL_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub document: DocumentConfig,
    pub mail: MailConfig,
    pub webhook: WebhookConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database_path =
            env::var("APPEAL_DATABASE_PATH").unwrap_or_else(|_| "appeals.sqlite3".to_string());

        let template_path = env::var("APPEAL_TEMPLATE_PATH")
            .unwrap_or_else(|_| "templates/disability-appeal-template.html".to_string());
        let debug_html_path = match env::var("APPEAL_DEBUG_HTML_PATH") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(PathBuf::from(value)),
            Err(_) => Some(PathBuf::from("debug_disability_appeal.html")),
        };
        let converter =
            env::var("APPEAL_PDF_CONVERTER").unwrap_or_else(|_| "wkhtmltopdf".to_string());
        let output_dir = non_empty_var("APPEAL_PDF_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        let render_timeout = timeout_secs("APPEAL_PDF_TIMEOUT_SECS", 60)?;
        let mail_timeout = timeout_secs("APPEAL_MAIL_TIMEOUT_SECS", 30)?;
        let webhook_timeout = timeout_secs("APPEAL_WEBHOOK_TIMEOUT_SECS", 30)?;

        let recipients = env::var("APPEAL_MAIL_RECIPIENTS")
            .map(|raw| parse_recipients(&raw))
            .unwrap_or_default();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { database_path },
            document: DocumentConfig {
                template_path: PathBuf::from(template_path),
                debug_html_path,
                converter: PathBuf::from(converter),
                output_dir,
                render_timeout,
            },
            mail: MailConfig {
                endpoint: env::var("APPEAL_MAIL_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_MAIL_ENDPOINT.to_string()),
                api_key: non_empty_var("EMAIL_API_KEY"),
                sender_email: non_empty_var("EMAIL_USER"),
                sender_name: env::var("EMAIL_SENDER_NAME")
                    .unwrap_or_else(|_| "Disability Appeal Intake".to_string()),
                recipients,
                timeout: mail_timeout,
            },
            webhook: WebhookConfig {
                url: non_empty_var("APPEAL_WEBHOOK_URL"),
                timeout: webhook_timeout,
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whole seconds, strictly positive.
fn timeout_secs(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout { key, value: raw }),
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the appeal store. `:memory:` keeps records for the process lifetime only.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: String,
}

/// Template, debug output and HTML-to-PDF converter settings.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub template_path: PathBuf,
    pub debug_html_path: Option<PathBuf>,
    pub converter: PathBuf,
    pub output_dir: PathBuf,
    pub render_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub sender_email: Option<String>,
    pub sender_name: String,
    pub recipients: Vec<String>,
    /// Upper bound on one mail API request, connect to last byte.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout { key, value } => write!(
                f,
                "{key} must be a positive number of seconds (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTimeout { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
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
            "PORT",
            "APP_LOG_LEVEL",
            "APPEAL_DATABASE_PATH",
            "APPEAL_TEMPLATE_PATH",
            "APPEAL_DEBUG_HTML_PATH",
            "APPEAL_PDF_CONVERTER",
            "APPEAL_PDF_OUTPUT_DIR",
            "APPEAL_PDF_TIMEOUT_SECS",
            "APPEAL_MAIL_RECIPIENTS",
            "APPEAL_MAIL_ENDPOINT",
            "EMAIL_API_KEY",
            "EMAIL_USER",
            "EMAIL_SENDER_NAME",
            "APPEAL_WEBHOOK_URL",
            "APPEAL_MAIL_TIMEOUT_SECS",
            "APPEAL_WEBHOOK_TIMEOUT_SECS",
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
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.storage.database_path, "appeals.sqlite3");
        assert_eq!(config.document.render_timeout, Duration::from_secs(60));
        assert_eq!(
            config.document.debug_html_path,
            Some(PathBuf::from("debug_disability_appeal.html"))
        );
        assert_eq!(config.mail.endpoint, DEFAULT_MAIL_ENDPOINT);
        assert!(config.mail.api_key.is_none());
        assert!(config.mail.recipients.is_empty());
        assert!(config.webhook.url.is_none());
        assert_eq!(config.mail.timeout, Duration::from_secs(30));
        assert_eq!(config.webhook.timeout, Duration::from_secs(30));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3001));
    }

    #[test]
    fn falls_back_to_plain_port_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PORT", "8088");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.server.port, 8088);
    }

    #[test]
    fn splits_recipient_list_and_disables_debug_output() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var(
            "APPEAL_MAIL_RECIPIENTS",
            " intake@example.org, ,review@example.org ",
        );
        env::set_var("APPEAL_DEBUG_HTML_PATH", "");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.mail.recipients,
            vec!["intake@example.org".to_string(), "review@example.org".to_string()]
        );
        assert!(config.document.debug_html_path.is_none());
    }

    #[test]
    fn rejects_zero_render_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APPEAL_PDF_TIMEOUT_SECS", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidTimeout { key, value }) => {
                assert_eq!(key, "APPEAL_PDF_TIMEOUT_SECS");
                assert_eq!(value, "0");
            }
            other => panic!("expected invalid timeout, got {other:?}"),
        }
    }

    #[test]
    fn reads_delivery_timeouts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APPEAL_MAIL_TIMEOUT_SECS", "12");
        env::set_var("APPEAL_WEBHOOK_TIMEOUT_SECS", " 7 ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.mail.timeout, Duration::from_secs(12));
        assert_eq!(config.webhook.timeout, Duration::from_secs(7));

        env::set_var("APPEAL_MAIL_TIMEOUT_SECS", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidTimeout { key, .. }) => {
                assert_eq!(key, "APPEAL_MAIL_TIMEOUT_SECS")
            }
            other => panic!("expected invalid timeout, got {other:?}"),
        }
    }
}
