// outline-backup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::errors::AppError;
use crate::utils::validate_identifier;

const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_PG_HOST: &str = "localhost";
const DEFAULT_PG_PORT: u16 = 5432;
const DEFAULT_PG_USER: &str = "postgres";
const DEFAULT_MINIO_REGION: &str = "us-east-1";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawJsonConfig {
    pub backup_dir: Option<PathBuf>,
    pub postgres: Option<JsonPostgresConfig>,
    pub minio: Option<JsonMinioConfig>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonPostgresConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub stop_on_error: Option<bool>,
    pub databases: Option<Vec<DatabaseTarget>>,
    pub roles: Option<Vec<RoleSpec>>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonMinioConfig {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub secure: Option<bool>,
    pub region: Option<String>,
}

impl fmt::Debug for JsonPostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonPostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("stop_on_error", &self.stop_on_error)
            .field("databases", &self.databases)
            .field("roles", &self.roles)
            .finish()
    }
}

impl fmt::Debug for JsonMinioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonMinioConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

/// One member of the target database set and the role that owns it after restore.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseTarget {
    pub name: String,
    pub owner: String,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub superuser: bool,
}

impl fmt::Debug for RoleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleSpec")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("superuser", &self.superuser)
            .finish()
    }
}

// Application's internal configuration structs
#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub stop_on_error: bool,
    pub databases: Vec<DatabaseTarget>,
    pub roles: Vec<RoleSpec>,
}

impl PostgresConfig {
    pub fn database_names(&self) -> Vec<String> {
        self.databases.iter().map(|db| db.name.clone()).collect()
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("stop_on_error", &self.stop_on_error)
            .field("databases", &self.databases)
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub region: String,
}

impl MinioConfig {
    /// Endpoint as a full URL; a bare `host:port` gets its scheme from the TLS flag.
    pub fn endpoint_url(&self) -> Result<Url> {
        let raw = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        };
        Url::parse(&raw).with_context(|| format!("Invalid MinIO endpoint: {}", self.endpoint))
    }

    /// Access and secret key. Only the storage passes need them, so a missing
    /// key is reported here rather than when the configuration loads.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        if self.access_key.is_empty() {
            return Err(AppError::Config(
                "MinIO access key must be set (minio.access_key in config.json or MINIO_ACCESS_KEY)".to_string(),
            )
            .into());
        }
        if self.secret_key.is_empty() {
            return Err(AppError::Config(
                "MinIO secret key must be set (minio.secret_key in config.json or MINIO_SECRET_KEY)".to_string(),
            )
            .into());
        }
        Ok((&self.access_key, &self.secret_key))
    }
}

impl fmt::Debug for MinioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinioConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backup_root: PathBuf,
    pub postgres: PostgresConfig,
    pub minio: MinioConfig,
}

impl AppConfig {
    /// Reads `config_path` when it exists and layers the process environment on top.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw_json_config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        } else {
            tracing::debug!("No config file at {}, using environment only", config_path.display());
            RawJsonConfig::default()
        };

        Self::resolve(raw_json_config, |key| std::env::var(key).ok())
    }

    /// Merges defaults, the parsed JSON file and `env` (highest precedence) and validates the result.
    pub fn resolve<F>(raw: RawJsonConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_nonempty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let pg_raw = raw.postgres.unwrap_or_default();
        let minio_raw = raw.minio.unwrap_or_default();

        let port = match env_nonempty("PGPORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PGPORT is not a valid port: {}", p))?,
            None => pg_raw.port.unwrap_or(DEFAULT_PG_PORT),
        };

        let mut roles = pg_raw.roles.unwrap_or_else(default_roles);
        for role in &mut roles {
            let key = format!("ROLE_PASSWORD_{}", role.name.to_uppercase().replace('-', "_"));
            if let Some(password) = env_nonempty(&key) {
                role.password = Some(password);
            }
        }

        let postgres = PostgresConfig {
            host: env_nonempty("PGHOST")
                .or(pg_raw.host)
                .unwrap_or_else(|| DEFAULT_PG_HOST.to_string()),
            port,
            user: env_nonempty("PGUSER")
                .or(pg_raw.user)
                .unwrap_or_else(|| DEFAULT_PG_USER.to_string()),
            password: env("PGPASSWORD").or(pg_raw.password).unwrap_or_default(),
            stop_on_error: pg_raw.stop_on_error.unwrap_or(false),
            databases: pg_raw.databases.unwrap_or_else(default_databases),
            roles,
        };

        let secure = match env_nonempty("MINIO_SECURE") {
            Some(v) => parse_bool(&v).with_context(|| format!("MINIO_SECURE is not a boolean: {}", v))?,
            None => minio_raw.secure.unwrap_or(false),
        };

        let minio = MinioConfig {
            endpoint: env_nonempty("MINIO_ENDPOINT")
                .or(minio_raw.endpoint)
                .context("MinIO endpoint must be set (minio.endpoint in config.json or MINIO_ENDPOINT)")?,
            access_key: env_nonempty("MINIO_ACCESS_KEY")
                .or(minio_raw.access_key)
                .unwrap_or_default(),
            secret_key: env_nonempty("MINIO_SECRET_KEY")
                .or(minio_raw.secret_key)
                .unwrap_or_default(),
            secure,
            region: env_nonempty("MINIO_REGION")
                .or(minio_raw.region)
                .unwrap_or_else(|| DEFAULT_MINIO_REGION.to_string()),
        };

        let backup_root = env_nonempty("BACKUP_DIR")
            .map(PathBuf::from)
            .or(raw.backup_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));

        let config = AppConfig {
            backup_root,
            postgres,
            minio,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backup_root.as_os_str().is_empty() {
            return Err(AppError::Config("backup directory cannot be empty".to_string()).into());
        }
        if self.postgres.databases.is_empty() {
            return Err(AppError::Config("postgres.databases must name at least one database".to_string()).into());
        }

        for role in &self.postgres.roles {
            validate_identifier(&role.name)?;
        }
        for db in &self.postgres.databases {
            validate_identifier(&db.name)?;
            validate_identifier(&db.owner)?;
            if !self.postgres.roles.iter().any(|r| r.name == db.owner) {
                return Err(AppError::Config(format!(
                    "database '{}' is owned by '{}', which is not listed in postgres.roles",
                    db.name, db.owner
                ))
                .into());
            }
        }

        self.minio.endpoint_url()?;
        Ok(())
    }
}

fn default_databases() -> Vec<DatabaseTarget> {
    [("outline", "outline"), ("outline_test", "outline"), ("keycloak", "keycloak")]
        .into_iter()
        .map(|(name, owner)| DatabaseTarget {
            name: name.to_string(),
            owner: owner.to_string(),
        })
        .collect()
}

fn default_roles() -> Vec<RoleSpec> {
    vec![
        RoleSpec {
            name: "outline".to_string(),
            password: None,
            superuser: true,
        },
        RoleSpec {
            name: "keycloak".to_string(),
            password: None,
            superuser: false,
        },
    ]
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("expected true/false")),
    }
}
