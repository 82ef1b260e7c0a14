//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::auth::is_valid_hash;
use crate::application::session::MAX_SESSION_TTL;
use crate::domain::entities::UserRecord;
use crate::domain::types::Role;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quillpress";
const ENV_PREFIX: &str = "QUILLPRESS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SITE_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_SITE_NAME: &str = "Quillpress";
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_UPLOAD_PREFIX: &str = "/uploads";
const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Command-line arguments for the Quillpress binary.
#[derive(Debug, Parser)]
#[command(name = "quillpress", version, about = "Quillpress blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUILLPRESS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the blog HTTP server.
    Serve(Box<ServeArgs>),
    /// Print an Argon2 PHC hash for use as an account password hash.
    #[command(name = "hash-password")]
    HashPassword(HashPasswordArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct HashPasswordArgs {
    /// Password to hash; read from stdin when omitted.
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the per-call storage timeout.
    #[arg(long = "database-statement-timeout-ms", value_name = "MILLIS")]
    pub database_statement_timeout_ms: Option<u64>,

    /// Override the public site URL used for canonical links.
    #[arg(long = "site-url", value_name = "URL")]
    pub site_url: Option<String>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Mark the session cookie `Secure`.
    #[arg(
        long = "auth-secure-cookie",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub auth_secure_cookie: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Absent means the in-memory store.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    /// Upper bound for a single storage call.
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub url: Url,
    pub name: String,
    pub author: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_ttl: time::Duration,
    pub secure_cookie: bool,
    /// Accounts from configuration; the admin account, when set, comes first.
    pub accounts: Vec<UserRecord>,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub public_prefix: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::HashPassword(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    auth: RawAuthSettings,
    uploads: RawUploadSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(millis) = overrides.database_statement_timeout_ms {
            self.database.statement_timeout_ms = Some(millis);
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.site.url = Some(url.clone());
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(secure) = overrides.auth_secure_cookie {
            self.auth.secure_cookie = Some(secure);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            auth,
            uploads,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site)?,
            auth: build_auth_settings(auth)?,
            uploads: build_upload_settings(uploads)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let timeout_ms = database
        .statement_timeout_ms
        .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "database.statement_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        statement_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_url = site.url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("site.url", format!("`{raw_url}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "site.url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(LoadError::invalid("site.url", "must be an absolute URL"));
    }

    let name = non_blank(site.name).unwrap_or_else(|| DEFAULT_SITE_NAME.to_string());
    let author = non_blank(site.author).unwrap_or_else(|| name.clone());
    let description = non_blank(site.description).unwrap_or_default();

    Ok(SiteSettings {
        url,
        name,
        author,
        description,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let ttl_secs = auth.session_ttl_seconds.unwrap_or(DEFAULT_SESSION_TTL_SECS);
    let ttl_secs = i64::try_from(ttl_secs)
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| LoadError::invalid("auth.session_ttl_seconds", "must be positive"))?;
    if ttl_secs > MAX_SESSION_TTL.whole_seconds() {
        return Err(LoadError::invalid(
            "auth.session_ttl_seconds",
            format!(
                "must be at most {} seconds (365 days)",
                MAX_SESSION_TTL.whole_seconds()
            ),
        ));
    }

    let mut accounts = Vec::with_capacity(auth.accounts.len() + 1);

    match (
        non_blank(auth.admin_username),
        non_blank(auth.admin_password_hash),
    ) {
        (Some(name), Some(password_hash)) => {
            if !is_valid_hash(&password_hash) {
                return Err(LoadError::invalid(
                    "auth.admin_password_hash",
                    "not a PHC password hash",
                ));
            }
            accounts.push(UserRecord {
                name,
                password_hash,
                role: Role::Admin,
            });
        }
        (None, None) => {}
        _ => {
            return Err(LoadError::invalid(
                "auth.admin_username",
                "admin username and password hash must be set together",
            ));
        }
    }

    for account in auth.accounts {
        let name = non_blank(Some(account.name))
            .ok_or_else(|| LoadError::invalid("auth.accounts", "account name is empty"))?;
        if !is_valid_hash(&account.password_hash) {
            return Err(LoadError::invalid(
                "auth.accounts",
                format!("`{name}` has an invalid password hash"),
            ));
        }
        let role = account
            .role
            .as_deref()
            .map(Role::from_str)
            .transpose()
            .map_err(|err| LoadError::invalid("auth.accounts", format!("`{name}`: {err}")))?
            .unwrap_or(Role::User);
        if accounts.iter().any(|existing| existing.name == name) {
            return Err(LoadError::invalid(
                "auth.accounts",
                format!("`{name}` is configured twice"),
            ));
        }
        accounts.push(UserRecord {
            name,
            password_hash: account.password_hash,
            role,
        });
    }

    Ok(AuthSettings {
        session_ttl: time::Duration::seconds(ttl_secs),
        secure_cookie: auth.secure_cookie.unwrap_or(false),
        accounts,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "uploads.directory",
            "path must not be empty",
        ));
    }

    let prefix = non_blank(uploads.public_prefix)
        .unwrap_or_else(|| DEFAULT_UPLOAD_PREFIX.to_string());
    if !prefix.starts_with('/') || prefix.trim_matches('/').is_empty() {
        return Err(LoadError::invalid(
            "uploads.public_prefix",
            "must be a non-root path starting with `/`",
        ));
    }

    Ok(UploadSettings {
        directory,
        public_prefix: prefix,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    url: Option<String>,
    name: Option<String>,
    author: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    session_ttl_seconds: Option<u64>,
    secure_cookie: Option<bool>,
    admin_username: Option<String>,
    admin_password_hash: Option<String>,
    accounts: Vec<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAccount {
    name: String,
    password_hash: String,
    role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    public_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::auth::hash_password;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert!(settings.database.url.is_none());
        assert_eq!(settings.database.statement_timeout, Duration::from_secs(5));
        assert_eq!(settings.site.url.as_str(), DEFAULT_SITE_URL);
        assert_eq!(settings.uploads.public_prefix, "/uploads");
        assert!(settings.cache.enabled);
        assert!(settings.auth.accounts.is_empty());
        assert!(!settings.auth.secure_cookie);
    }

    #[test]
    fn zero_statement_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.database.statement_timeout_ms = Some(0);
        let err = Settings::from_raw(raw).expect_err("zero timeout");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "database.statement_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn session_ttl_is_bounded() {
        let mut raw = RawSettings::default();
        raw.auth.session_ttl_seconds = Some(1_000_000_000_000);
        let err = Settings::from_raw(raw).expect_err("oversized ttl");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "auth.session_ttl_seconds",
                ..
            }
        ));

        let mut raw = RawSettings::default();
        raw.auth.session_ttl_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.auth.session_ttl_seconds = Some(365 * 24 * 60 * 60);
        let settings = Settings::from_raw(raw).expect("one year is allowed");
        assert_eq!(settings.auth.session_ttl, MAX_SESSION_TTL);
    }

    #[test]
    fn site_url_must_be_http() {
        let mut raw = RawSettings::default();
        raw.site.url = Some("ftp://example.com/".to_string());
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.site.url = Some("not a url".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn admin_credentials_must_be_paired() {
        let mut raw = RawSettings::default();
        raw.auth.admin_username = Some("admin".to_string());
        let err = Settings::from_raw(raw).expect_err("hash missing");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "auth.admin_username",
                ..
            }
        ));
    }

    #[test]
    fn admin_hash_must_parse() {
        let mut raw = RawSettings::default();
        raw.auth.admin_username = Some("admin".to_string());
        raw.auth.admin_password_hash = Some("plaintext".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn configured_accounts_are_collected() {
        let hash = hash_password("secret").expect("hash");
        let mut raw = RawSettings::default();
        raw.auth.admin_username = Some("admin".to_string());
        raw.auth.admin_password_hash = Some(hash.clone());
        raw.auth.accounts = vec![RawAccount {
            name: "reader".to_string(),
            password_hash: hash,
            role: None,
        }];

        let settings = Settings::from_raw(raw).expect("valid settings");
        let roles: Vec<_> = settings
            .auth
            .accounts
            .iter()
            .map(|account| (account.name.as_str(), account.role))
            .collect();
        assert_eq!(roles, vec![("admin", Role::Admin), ("reader", Role::User)]);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["quillpress"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_hash_password_arguments() {
        let args = CliArgs::parse_from(["quillpress", "hash-password", "--password", "hunter2"]);
        match args.command.expect("hash-password command") {
            Command::HashPassword(hash) => assert_eq!(hash.password.as_deref(), Some("hunter2")),
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "quillpress",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--database-url",
            "postgres://override",
            "--site-url",
            "https://blog.example.com/",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.database_url.as_deref(),
                    Some("postgres://override")
                );
                assert_eq!(
                    serve.overrides.site_url.as_deref(),
                    Some("https://blog.example.com/")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
