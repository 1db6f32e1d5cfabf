//! Per-session configuration.

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

/// Username and password substituted when no authentication is configured.
pub const ANONYMOUS_LOGIN: &str = "Anonymous";

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// SMTP authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// No authentication.
    #[default]
    None,
    /// `AUTH LOGIN`.
    Login,
    /// `AUTH PLAIN`.
    Plain,
    /// `AUTH CRAM-MD5`.
    CramMd5,
    /// `AUTH NTLM`.
    Ntlm,
}

impl AuthMethod {
    /// Parse an authentication method name (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "login" => Some(Self::Login),
            "plain" => Some(Self::Plain),
            "cram-md5" | "crammd5" => Some(Self::CramMd5),
            "ntlm" => Some(Self::Ntlm),
            _ => None,
        }
    }

    /// Mechanism name as sent in `AUTH`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Login => "LOGIN",
            Self::Plain => "PLAIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::Ntlm => "NTLM",
        }
    }
}

/// Transport encryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Plain TCP.
    #[default]
    None,
    /// Upgrade with `STARTTLS` after the greeting.
    StartTls,
    /// TLS from the first byte (SMTPS).
    Implicit,
}

/// Login credentials for a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Optional login domain (NTLM).
    pub login_domain: Option<String>,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            login_domain: None,
        }
    }

    /// Set the login domain.
    #[must_use]
    pub fn login_domain(mut self, domain: impl Into<String>) -> Self {
        self.login_domain = Some(domain.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("login_domain", &self.login_domain)
            .finish()
    }
}

/// Configuration handed to the engine for every session it creates.
///
/// Treated as immutable once the pool is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct SessionConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 25).
    pub port: u16,

    /// Login credentials.
    pub credentials: Credentials,

    /// Authentication mechanism.
    pub auth_method: AuthMethod,

    /// Encryption mode.
    pub encryption: Encryption,

    /// Time allowed to connect and complete the greeting.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            auth_method: AuthMethod::None,
            encryption: Encryption::None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given host with default values.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Parse a connection string.
    ///
    /// ```text
    /// Server=smtp.example.com:587;User Id=mailer;Password=secret;Auth Method=LOGIN;StartTls=true
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self, TransportError> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| TransportError::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" | "host" | "smtp host" => {
                    if let Some((host, port)) = value.rsplit_once(':') {
                        config.host = host.to_string();
                        config.port = parse_port(port)?;
                    } else {
                        config.host = value.to_string();
                    }
                }
                "port" => {
                    config.port = parse_port(value)?;
                }
                "user id" | "uid" | "user" | "username" => {
                    config.credentials.username = value.to_string();
                }
                "password" | "pwd" => {
                    config.credentials.password = value.to_string();
                }
                "login domain" | "domain" => {
                    config.credentials.login_domain = Some(value.to_string());
                }
                "auth method" | "authentication method" | "auth" => {
                    config.auth_method = AuthMethod::parse(value).ok_or_else(|| {
                        TransportError::Config(format!("invalid authentication method: {value}"))
                    })?;
                }
                "starttls" | "start tls" => {
                    if parse_bool(value) {
                        config.encryption = Encryption::StartTls;
                    } else if config.encryption == Encryption::StartTls {
                        config.encryption = Encryption::None;
                    }
                }
                "encryption" | "encrypt" => {
                    config.encryption = match value.to_ascii_lowercase().as_str() {
                        "none" | "false" | "no" | "0" => Encryption::None,
                        "starttls" => Encryption::StartTls,
                        "tls" | "ssl" | "implicit" | "true" | "yes" | "1" => Encryption::Implicit,
                        _ => {
                            return Err(TransportError::Config(format!(
                                "invalid encryption mode: {value}"
                            )));
                        }
                    };
                }
                "connect timeout" | "connection timeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        TransportError::Config(format!("invalid timeout: {value}"))
                    })?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                _ => {
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the authentication method.
    #[must_use]
    pub fn auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Set the encryption mode.
    #[must_use]
    pub fn encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Credentials the engine should log in with.
    ///
    /// Without an authentication method, empty fields fall back to
    /// [`ANONYMOUS_LOGIN`].
    #[must_use]
    pub fn effective_credentials(&self) -> Credentials {
        let mut credentials = self.credentials.clone();
        if self.auth_method == AuthMethod::None {
            if credentials.username.is_empty() {
                credentials.username = ANONYMOUS_LOGIN.to_string();
            }
            if credentials.password.is_empty() {
                credentials.password = ANONYMOUS_LOGIN.to_string();
            }
        }
        credentials
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.trim().is_empty() {
            return Err(TransportError::Config("SMTP host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(TransportError::Config("SMTP port must be greater than 0".into()));
        }
        Ok(())
    }
}

fn parse_port(value: &str) -> Result<u16, TransportError> {
    value
        .trim()
        .parse()
        .map_err(|_| TransportError::Config(format!("invalid port: {value}")))
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") || value == "1"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 25);
        assert_eq!(config.auth_method, AuthMethod::None);
        assert_eq!(config.encryption, Encryption::None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_full_connection_string() {
        let config = SessionConfig::from_connection_string(
            "Server=smtp.example.com;Port=587;User Id=mailer;Password=s3cret;\
             Auth Method=LOGIN;StartTls=true;Connect Timeout=15",
        )
        .unwrap();

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.credentials.username, "mailer");
        assert_eq!(config.credentials.password, "s3cret");
        assert_eq!(config.auth_method, AuthMethod::Login);
        assert_eq!(config.encryption, Encryption::StartTls);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_host_with_port() {
        let config = SessionConfig::from_connection_string("Host=mail.local:2525").unwrap();
        assert_eq!(config.host, "mail.local");
        assert_eq!(config.port, 2525);
    }

    #[test]
    fn test_parse_implicit_tls() {
        let config =
            SessionConfig::from_connection_string("Server=mail.local;Encryption=tls").unwrap();
        assert_eq!(config.encryption, Encryption::Implicit);
    }

    #[test]
    fn test_parse_login_domain() {
        let config = SessionConfig::from_connection_string(
            "Server=exchange.corp;Auth=NTLM;Login Domain=CORP",
        )
        .unwrap();
        assert_eq!(config.auth_method, AuthMethod::Ntlm);
        assert_eq!(config.credentials.login_domain.as_deref(), Some("CORP"));
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        let err = SessionConfig::from_connection_string("Server=x;Port=abc").unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        assert!(SessionConfig::from_connection_string("Server").is_err());
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let config = SessionConfig::from_connection_string("Server=x;Flavor=vanilla").unwrap();
        assert_eq!(config.host, "x");
    }

    #[test]
    fn test_anonymous_credentials_without_auth() {
        let config = SessionConfig::new("mail.local");
        let creds = config.effective_credentials();
        assert_eq!(creds.username, ANONYMOUS_LOGIN);
        assert_eq!(creds.password, ANONYMOUS_LOGIN);
    }

    #[test]
    fn test_explicit_credentials_kept_with_auth() {
        let config = SessionConfig::new("mail.local")
            .auth_method(AuthMethod::Plain)
            .credentials(Credentials::new("", ""));
        let creds = config.effective_credentials();
        assert!(creds.username.is_empty());
        assert!(creds.password.is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("mailer", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_zero_port() {
        let config = SessionConfig::new("mail.local").port(0);
        assert!(config.validate().is_err());
    }
}
