//! Connexion PostgreSQL: paramètres et pool deadpool

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    /// SSL préféré mais non requis
    Prefer,
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        })
    }
}

/// Surcharges saisies en ligne de commande
#[derive(Debug, Clone, Default)]
pub struct DatabaseOverrides {
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<String>,
}

/// Paramètres de connexion à la base carto
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

// Le mot de passe n'apparaît jamais dans les logs
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("pool_size", &self.pool_size)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "bornhack".into(),
            user: "bornhack".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
        }
    }
}

impl DatabaseConfig {
    /// Variables PG* de l'environnement (PGHOST, PGPORT, PGDATABASE, PGUSER,
    /// PGPASSWORD, PGSSLMODE) et POOL_SIZE
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construit la configuration à partir d'une fonction de lecture des variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup("PGHOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PGPORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(dbname) = lookup("PGDATABASE") {
            config.dbname = dbname;
        }
        if let Some(user) = lookup("PGUSER") {
            config.user = user;
        }
        config.password = lookup("PGPASSWORD");
        if let Some(size) = lookup("POOL_SIZE").and_then(|s| s.parse().ok()) {
            config.pool_size = size;
        }
        if let Some(mode) = lookup("PGSSLMODE").and_then(|s| s.parse().ok()) {
            config.ssl_mode = mode;
        }
        config
    }

    /// Applique les surcharges; un mode SSL inconnu est une erreur
    pub fn apply(&mut self, overrides: DatabaseOverrides) -> Result<()> {
        let DatabaseOverrides {
            host,
            database,
            user,
            password,
            port,
            ssl,
        } = overrides;

        self.host = host.unwrap_or_else(|| std::mem::take(&mut self.host));
        self.dbname = database.unwrap_or_else(|| std::mem::take(&mut self.dbname));
        self.user = user.unwrap_or_else(|| std::mem::take(&mut self.user));
        self.password = password.or_else(|| self.password.take());
        self.port = port.unwrap_or(self.port);
        if let Some(ssl) = ssl {
            self.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    /// `user@host:port/dbname`, pour les logs
    pub fn label(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }

    fn to_deadpool(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.application_name = Some("campmap".into());
        cfg.pool = Some(PoolConfig {
            max_size: self.pool_size,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });
        cfg
    }
}

fn rustls_connector() -> MakeRustlsConnect {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    MakeRustlsConnect::new(tls)
}

/// Crée le pool; aucune connexion n'est ouverte avant le premier `get()`
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.to_deadpool();
    let runtime = Some(Runtime::Tokio1);
    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(runtime, NoTls)
            .with_context(|| format!("Failed to create pool for {}", config.label())),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(runtime, rustls_connector())
            .with_context(|| format!("Failed to create TLS pool for {}", config.label())),
    }
}

/// Vérifie que la base répond
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ssl_mode_parsing() {
        assert_eq!("disable".parse::<SslMode>(), Ok(SslMode::Disable));
        assert_eq!("PREFER".parse::<SslMode>(), Ok(SslMode::Prefer));
        assert_eq!("on".parse::<SslMode>(), Ok(SslMode::Require));
        assert!("maybe".parse::<SslMode>().is_err());
        assert_eq!(SslMode::Require.to_string(), "require");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PGHOST", "db.bornhack.org"),
            ("PGPORT", "not a port"),
            ("PGPASSWORD", "secret"),
            ("PGSSLMODE", "require"),
        ]
        .into_iter()
        .collect();
        let config = DatabaseConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.host, "db.bornhack.org");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "bornhack");
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_overrides() {
        let mut config = DatabaseConfig::default();
        config
            .apply(DatabaseOverrides {
                database: Some("maps".into()),
                port: Some(6543),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.label(), "bornhack@localhost:6543/maps");

        let bogus = DatabaseOverrides {
            ssl: Some("bogus".into()),
            ..Default::default()
        };
        assert!(config.apply(bogus).is_err());
    }
}
