use serde::{Deserialize, Deserializer};
use synaptic_core::SynapticError;
use url::Url;

/// Port used when none is configured, or the configured one is unusable.
pub const DEFAULT_PORT: u16 = 6379;
/// Host used when neither the credential nor the environment names one.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Transport security for the Redis connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain TCP.
    #[default]
    Disabled,
    /// TLS **without certificate or hostname verification**.
    ///
    /// Traffic is encrypted but the server is not authenticated, so an active
    /// man-in-the-middle can impersonate it. Intended for private or managed
    /// deployments that present self-signed certificates.
    AcceptInvalidCertificates,
}

impl TlsMode {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            TlsMode::AcceptInvalidCertificates
        } else {
            TlsMode::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        self != TlsMode::Disabled
    }
}

/// Fully resolved connection parameters.
///
/// This is the one shape the connection manager remembers and compares, so a
/// URL and the equivalent discrete fields resolve to equal values.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsMode,
    pub db: i64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            tls: TlsMode::Disabled,
            db: 0,
        }
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("db", &self.db)
            .finish()
    }
}

impl ConnectionSettings {
    /// Parse a `redis://` or `rediss://` URL.
    ///
    /// Port defaults to [`DEFAULT_PORT`] when absent or zero; the database
    /// index comes from the path (`/2`). A `rediss` scheme selects
    /// [`TlsMode::AcceptInvalidCertificates`].
    pub fn parse_url(raw: &str) -> Result<Self, SynapticError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| SynapticError::Config(format!("invalid Redis URL: {e}")))?;

        let tls = match url.scheme() {
            "redis" => TlsMode::Disabled,
            "rediss" => TlsMode::AcceptInvalidCertificates,
            other => {
                return Err(SynapticError::Config(format!(
                    "invalid Redis URL: unsupported scheme '{other}'"
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SynapticError::Config("invalid Redis URL: missing host".to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url.port().filter(|p| *p != 0).unwrap_or(DEFAULT_PORT);

        let db = match url.path().trim_matches('/') {
            "" => 0,
            path => path.parse::<i64>().map_err(|e| {
                SynapticError::Config(format!("invalid Redis URL: bad database '{path}': {e}"))
            })?,
        };

        Ok(Self {
            host,
            port,
            username: decode_component(url.username())?,
            password: url.password().map(decode_component).transpose()?.flatten(),
            tls,
            db,
        })
    }

    /// `host:port` for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Render as a URL the `redis` crate accepts.
    ///
    /// TLS settings carry the `#insecure` fragment, which turns off
    /// certificate verification in the client.
    pub fn connection_url(&self) -> Result<String, SynapticError> {
        let scheme = if self.tls.is_enabled() { "rediss" } else { "redis" };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut url = Url::parse(&format!("{scheme}://{host}:{}/{}", self.port, self.db))
            .map_err(|e| {
                SynapticError::Config(format!("invalid Redis host '{}': {e}", self.host))
            })?;

        if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| SynapticError::Config("cannot set Redis username".to_string()))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| SynapticError::Config("cannot set Redis password".to_string()))?;
        }
        if self.tls == TlsMode::AcceptInvalidCertificates {
            url.set_fragment(Some("insecure"));
        }
        Ok(url.into())
    }
}

fn decode_component(raw: &str) -> Result<Option<String>, SynapticError> {
    if raw.is_empty() {
        return Ok(None);
    }
    urlencoding::decode(raw)
        .map(|s| Some(s.into_owned()))
        .map_err(|e| SynapticError::Config(format!("invalid Redis URL credentials: {e}")))
}

/// Connection record supplied by the credential subsystem.
///
/// Field names of the Redis credential payload (`redisUrl`, `redisCacheHost`,
/// `redisCachePort`, `redisCacheUser`, `redisCachePwd`,
/// `redisCacheSslEnabled`) are accepted as aliases.
#[derive(Clone, Default, Deserialize)]
pub struct CredentialRecord {
    #[serde(default, alias = "redisUrl")]
    pub url: Option<String>,
    #[serde(default, alias = "redisCacheHost")]
    pub host: Option<String>,
    #[serde(default, alias = "redisCachePort", deserialize_with = "string_or_number")]
    pub port: Option<String>,
    #[serde(default, alias = "redisCacheUser")]
    pub username: Option<String>,
    #[serde(default, alias = "redisCachePwd")]
    pub password: Option<String>,
    #[serde(default, alias = "redisCacheSslEnabled")]
    pub ssl_enabled: Option<bool>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_enabled", &self.ssl_enabled)
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    }))
}

/// Process-wide fallbacks, read from `REDIS_URL`, `REDIS_HOST`, `REDIS_PORT`,
/// `REDIS_USER` and `REDIS_PASSWORD`.
#[derive(Clone, Default)]
pub struct EnvDefaults {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            url: var("REDIS_URL"),
            host: var("REDIS_HOST"),
            port: var("REDIS_PORT"),
            username: var("REDIS_USER"),
            password: var("REDIS_PASSWORD"),
        }
    }
}

/// First non-empty value of `primary`, then `fallback`.
fn pick<'a>(primary: &'a Option<String>, fallback: &'a Option<String>) -> Option<&'a str> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|value| !value.is_empty())
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.trim().parse::<u16>().ok())
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_PORT)
}

/// Resolve a credential record against environment defaults.
///
/// A non-empty URL (credential first, then `REDIS_URL`) wins over discrete
/// fields; a URL that does not parse fails the whole resolution. Credentials
/// missing from the URL fall back to `REDIS_USER` / `REDIS_PASSWORD`. The
/// TLS flag applies to both shapes.
pub fn resolve(
    credential: &CredentialRecord,
    env: &EnvDefaults,
) -> Result<ConnectionSettings, SynapticError> {
    let tls_flag = credential.ssl_enabled.unwrap_or(false);

    if let Some(raw_url) = pick(&credential.url, &env.url) {
        let mut settings = ConnectionSettings::parse_url(raw_url)?;
        if settings.username.is_none() {
            settings.username = pick(&None, &env.username).map(String::from);
        }
        if settings.password.is_none() {
            settings.password = pick(&None, &env.password).map(String::from);
        }
        if tls_flag {
            settings.tls = TlsMode::AcceptInvalidCertificates;
        }
        return Ok(settings);
    }

    Ok(ConnectionSettings {
        host: pick(&credential.host, &env.host)
            .unwrap_or(DEFAULT_HOST)
            .to_string(),
        port: parse_port(pick(&credential.port, &env.port)),
        username: pick(&credential.username, &env.username).map(String::from),
        password: pick(&credential.password, &env.password).map(String::from),
        tls: TlsMode::from_flag(tls_flag),
        db: 0,
    })
}
