// outline-backup/src/database/admin.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, Row};

use super::{AdminConnector, AdminSession};
use crate::config::{PostgresConfig, RoleSpec};
use crate::utils::{quote_identifier, quote_literal, validate_identifier};

const MAINTENANCE_DB: &str = "postgres";

pub struct PgAdminConnector {
    options: PgConnectOptions,
    host: String,
}

impl PgAdminConnector {
    pub fn new(config: &PostgresConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(MAINTENANCE_DB);
        PgAdminConnector {
            options,
            host: format!("{}:{}", config.host, config.port),
        }
    }
}

#[async_trait]
impl AdminConnector for PgAdminConnector {
    async fn connect(&self) -> Result<Box<dyn AdminSession>> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to '{}' database on {}",
                    MAINTENANCE_DB, self.host
                )
            })?;
        tracing::debug!("Connected to {} as administrator", self.host);
        Ok(Box::new(PgAdminSession { conn }))
    }
}

/// A bare connection never opens a transaction, so each statement autocommits.
struct PgAdminSession {
    conn: PgConnection,
}

#[async_trait]
impl AdminSession for PgAdminSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT datname FROM pg_database WHERE datistemplate = false;")
            .fetch_all(&mut self.conn)
            .await
            .context("Failed to fetch database list from pg_database")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("datname"))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to get 'datname' from row when fetching database list")
    }

    async fn terminate_connections(&mut self, name: &str) -> Result<()> {
        sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1 AND pid <> pg_backend_pid();",
        )
        .bind(name)
        .execute(&mut self.conn)
        .await
        .with_context(|| format!("Failed to terminate connections to database '{}'", name))?;
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        validate_identifier(name)?;
        sqlx::query(&format!("DROP DATABASE IF EXISTS {}", quote_identifier(name)))
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("Failed to drop database '{}'", name))?;
        Ok(())
    }

    async fn role_exists(&mut self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1)")
            .bind(name)
            .fetch_one(&mut self.conn)
            .await
            .with_context(|| format!("Failed to check existence of role '{}'", name))?;
        Ok(exists)
    }

    async fn create_role(&mut self, role: &RoleSpec) -> Result<()> {
        validate_identifier(&role.name)?;
        let mut sql = format!("CREATE ROLE {} WITH LOGIN", quote_identifier(&role.name));
        if let Some(password) = &role.password {
            sql.push_str(&format!(" PASSWORD {}", quote_literal(password)));
        }
        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("Failed to create role '{}'", role.name))?;
        Ok(())
    }

    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()> {
        validate_identifier(name)?;
        validate_identifier(owner)?;
        let sql = format!(
            "CREATE DATABASE {} OWNER {}",
            quote_identifier(name),
            quote_identifier(owner)
        );
        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("Failed to create database '{}' owned by '{}'", name, owner))?;
        Ok(())
    }

    async fn grant_superuser(&mut self, role: &str) -> Result<()> {
        validate_identifier(role)?;
        sqlx::query(&format!("ALTER ROLE {} WITH SUPERUSER", quote_identifier(role)))
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("Failed to grant SUPERUSER to role '{}'", role))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .context("Failed to close administrative connection")
    }
}
