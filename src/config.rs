use crate::core::{Result, StoreError};

const SCHEME: &str = "memberstore://";
const DEFAULT_PORT: u16 = 27017;

/// Store and registration configuration
///
/// Connection details use the URL form `memberstore://host:port/database`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store host
    pub host: String,

    /// Store port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Collection holding members
    pub members_collection: String,

    /// When disabled, unknown callers are registered from their claims
    /// instead of being sent through registration completion
    pub complete_registration_enabled: bool,

    /// Page size used when a caller does not ask for one
    pub default_page_size: i64,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: "memberstore".to_string(),
            members_collection: "members".to_string(),
            complete_registration_enabled: true,
            default_page_size: 20,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn members_collection(mut self, collection: &str) -> Self {
        self.members_collection = collection.to_string();
        self
    }

    pub fn complete_registration_enabled(mut self, enabled: bool) -> Self {
        self.complete_registration_enabled = enabled;
        self
    }

    pub fn default_page_size(mut self, size: i64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Parse from connection string
    ///
    /// Format: "memberstore://host[:port]/database"
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = StoreConfig::from_url("memberstore://db.internal:27017/members")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let Some(rest) = url.strip_prefix(SCHEME) else {
            return Err(invalid(format!("URL must start with '{SCHEME}'")));
        };

        let Some((authority, database)) = rest.split_once('/') else {
            return Err(invalid("Invalid host/database format"));
        };
        if database.is_empty() || database.contains('/') {
            return Err(invalid("Invalid host/database format"));
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| invalid(format!("Invalid port '{port}'")))?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        let config = Self::new().host(host).port(port).database(database);
        config.validate()?;
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        format!("{SCHEME}{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(invalid("host cannot be empty"));
        }

        if self.port == 0 {
            return Err(invalid("port must be > 0"));
        }

        if self.database.is_empty() {
            return Err(invalid("database cannot be empty"));
        }

        if self.members_collection.is_empty() {
            return Err(invalid("members_collection cannot be empty"));
        }

        if self.default_page_size <= 0 {
            return Err(invalid("default_page_size must be > 0"));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidConfig(message.into())
}
