//! Database connection configuration.
//!
//! A connection is either a full URL (`--url`, or `connection_string` in the
//! config file) or discrete host/port/user/password/database values that
//! [`ConnectionConfig`] turns into a URL for the chosen driver.

use reqwest::Url;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Unsupported dialect: {0}. Supported: postgres, mysql, sqlserver")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// PostgreSQL (sqlx)
    Postgres,
    /// MySQL / MariaDB (sqlx)
    MySql,
    /// Microsoft SQL Server (worker process)
    SqlServer,
}

impl Driver {
    /// Parse driver from a dialect name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "sqlserver" | "mssql" | "sql_server" => Ok(Driver::SqlServer),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::SqlServer => "sqlserver",
        }
    }

    /// Driver name understood by the worker process.
    pub fn worker_name(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::SqlServer => "mssql",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::MySql => 3306,
            Driver::SqlServer => 1433,
        }
    }

    /// URL scheme for connection strings.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::SqlServer => "sqlserver",
        }
    }
}

/// Database connection built from discrete values.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub driver: Driver,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionConfig {
    pub fn new(driver: Driver, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver,
            host: host.into(),
            port: None,
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Build the connection URL for this driver.
    ///
    /// Credentials are percent-encoded. SQL Server without a username
    /// falls back to a trusted connection.
    pub fn to_connection_string(&self) -> Result<String, ConnectionError> {
        if self.host.is_empty() {
            return Err(ConnectionError::InvalidConfig("host is required".into()));
        }
        if self.database.is_empty() {
            return Err(ConnectionError::InvalidConfig("database is required".into()));
        }

        match self.driver {
            Driver::Postgres | Driver::MySql => self.build_url(),
            Driver::SqlServer => Ok(self.build_mssql_connection_string()),
        }
    }

    fn build_url(&self) -> Result<String, ConnectionError> {
        let base = format!(
            "{}://{}:{}",
            self.driver.url_scheme(),
            self.host,
            self.port.unwrap_or(self.driver.default_port())
        );
        let mut url = Url::parse(&base)
            .map_err(|e| ConnectionError::InvalidConfig(format!("invalid host {}: {e}", self.host)))?;

        url.set_path(&self.database);
        if let Some(user) = &self.username {
            url.set_username(user)
                .map_err(|_| ConnectionError::InvalidConfig("cannot set username".into()))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| ConnectionError::InvalidConfig("cannot set password".into()))?;
        }
        Ok(url.to_string())
    }

    fn build_mssql_connection_string(&self) -> String {
        let mut base = format!("sqlserver://{}", self.host);
        if let Some(port) = self.port {
            base = format!("sqlserver://{}:{}", self.host, port);
        }

        let mut params = vec![format!("database={}", self.database)];
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                params.push(format!("user id={user}"));
                params.push(format!("password={pass}"));
            }
            (Some(user), None) => params.push(format!("user id={user}")),
            (None, _) => params.push("trusted_connection=true".to_string()),
        }

        format!("{}?{}", base, params.join("&"))
    }
}

/// A resolved connection: backend, URL and schema to enrich.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    pub driver: Driver,
    pub url: String,
    /// Schema override; backend default when `None`. Ignored by MySQL.
    pub schema: Option<String>,
}

impl ConnectionTarget {
    /// Database name from the URL path, or the `database` query parameter.
    pub fn database_name(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let from_path = url.path().trim_start_matches('/');
        if !from_path.is_empty() {
            return Some(from_path.to_string());
        }
        url.query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("database"))
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}
