//! Publisher configuration.
//!
//! Settings are read once, either explicitly or from the environment:
//! - `EVENTHUB_CONNECTION_STRING`: namespace connection string (required)
//! - `EVENTHUB_NAME`: target event hub (required)
//! - `EVENTHUB_REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 60)
//! - `EVENTHUB_MAX_BATCH_BYTES`: largest accepted request body (default: 1 MiB)

use std::env;
use std::time::Duration;

use crate::errors::ConfigurationError;

pub const CONNECTION_STRING_VAR: &str = "EVENTHUB_CONNECTION_STRING";
pub const EVENTHUB_NAME_VAR: &str = "EVENTHUB_NAME";
pub const REQUEST_TIMEOUT_VAR: &str = "EVENTHUB_REQUEST_TIMEOUT_SECS";
pub const MAX_BATCH_BYTES_VAR: &str = "EVENTHUB_MAX_BATCH_BYTES";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Event Hubs standard tier limit for a single publish.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Parsed `Endpoint=sb://...;SharedAccessKeyName=...;SharedAccessKey=...` string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// `host[:port]` of the namespace, without scheme or trailing slash.
    pub host: String,
    pub key_name: String,
    pub key: String,
    pub entity_path: Option<String>,
    pub use_development_emulator: bool,
}

// Keeps the shared access key out of logs.
impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host", &self.host)
            .field("key_name", &self.key_name)
            .field("key", &"***")
            .field("entity_path", &self.entity_path)
            .field("use_development_emulator", &self.use_development_emulator)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;
        let mut use_development_emulator = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Split at the first '=' only: keys are base64 and end in '=' padding.
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ConfigurationError::InvalidConnectionString(format!(
                    "segment '{}' is not a Key=Value pair",
                    part
                ))
            })?;
            let value = value.trim().to_string();

            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
                "usedevelopmentemulator" => {
                    use_development_emulator = value.eq_ignore_ascii_case("true")
                }
                _ => {}
            }
        }

        let endpoint = required(endpoint, "Endpoint")?;
        let host = endpoint
            .strip_prefix("sb://")
            .ok_or_else(|| {
                ConfigurationError::InvalidConnectionString(format!(
                    "Endpoint '{}' must use the sb:// scheme",
                    endpoint
                ))
            })?
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(ConfigurationError::InvalidConnectionString(
                "Endpoint has no host".to_string(),
            ));
        }

        Ok(Self {
            host,
            key_name: required(key_name, "SharedAccessKeyName")?,
            key: required(key, "SharedAccessKey")?,
            entity_path,
            use_development_emulator,
        })
    }

    /// `http` for the local emulator, `https` otherwise.
    pub fn scheme(&self) -> &'static str {
        if self.use_development_emulator {
            "http"
        } else {
            "https"
        }
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigurationError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ConfigurationError::InvalidConnectionString(format!("missing {}", key))
    })
}

/// Everything needed to open a publisher. Populated once, passed by value.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub connection_string: String,
    pub eventhub_name: String,
    pub request_timeout: Duration,
    pub max_batch_bytes: usize,
}

impl PublisherConfig {
    pub fn new(
        connection_string: impl Into<String>,
        eventhub_name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let connection_string = connection_string.into();
        let eventhub_name = eventhub_name.into();

        if connection_string.trim().is_empty() {
            return Err(ConfigurationError::Empty("connection string"));
        }
        if eventhub_name.trim().is_empty() {
            return Err(ConfigurationError::Empty("event hub name"));
        }

        Ok(Self {
            connection_string,
            eventhub_name,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
        })
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Missing` naming every required variable
    /// that is unset or blank, or `ConfigurationError::Invalid` when an
    /// optional variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`PublisherConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let connection_string = read(CONNECTION_STRING_VAR);
        let eventhub_name = read(EVENTHUB_NAME_VAR);

        let missing: Vec<&'static str> = [
            (CONNECTION_STRING_VAR, connection_string.is_none()),
            (EVENTHUB_NAME_VAR, eventhub_name.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(connection_string), Some(eventhub_name)) = (connection_string, eventhub_name)
        else {
            return Err(ConfigurationError::Missing(missing));
        };

        let mut config = Self::new(connection_string, eventhub_name)?;

        if let Some(value) = read(REQUEST_TIMEOUT_VAR) {
            let secs = parse_number::<u64>(REQUEST_TIMEOUT_VAR, &value)?;
            if secs == 0 || secs > MAX_REQUEST_TIMEOUT_SECS {
                return Err(ConfigurationError::Invalid {
                    var: REQUEST_TIMEOUT_VAR,
                    message: format!(
                        "timeout {} must be between 1 and {} seconds",
                        secs, MAX_REQUEST_TIMEOUT_SECS
                    ),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = read(MAX_BATCH_BYTES_VAR) {
            let bytes = parse_number::<usize>(MAX_BATCH_BYTES_VAR, &value)?;
            if bytes == 0 {
                return Err(ConfigurationError::Invalid {
                    var: MAX_BATCH_BYTES_VAR,
                    message: "batch limit must be greater than 0".to_string(),
                });
            }
            config.max_batch_bytes = bytes;
        }

        Ok(config)
    }

    /// Parse the connection string and check it against the hub name.
    pub fn connection(&self) -> Result<ConnectionString, ConfigurationError> {
        let connection = ConnectionString::parse(&self.connection_string)?;
        if let Some(entity_path) = &connection.entity_path {
            if entity_path != &self.eventhub_name {
                return Err(ConfigurationError::EntityPathMismatch {
                    entity_path: entity_path.clone(),
                    eventhub_name: self.eventhub_name.clone(),
                });
            }
        }
        Ok(connection)
    }
}

fn parse_number<T: std::str::FromStr>(
    var: &'static str,
    value: &str,
) -> Result<T, ConfigurationError> {
    value.trim().parse().map_err(|_| ConfigurationError::Invalid {
        var,
        message: format!("'{}' is not a valid number", value),
    })
}
