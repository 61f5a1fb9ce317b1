// outline-backup/src/testing.rs
//! In-memory stand-ins for PostgreSQL, the dump utilities and MinIO.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{DatabaseTarget, PostgresConfig, RoleSpec};
use crate::database::{AdminConnector, AdminSession, DumpTool};
use crate::errors::AppError;
use crate::storage::{ObjectStore, copy_in_chunks};

#[derive(Debug, Default)]
pub struct PgState {
    /// database name -> SQL it currently holds
    pub databases: BTreeMap<String, String>,
    pub owners: HashMap<String, String>,
    pub roles: BTreeSet<String>,
    pub superusers: BTreeSet<String>,
    pub refuse_connections: bool,
    pub fail_dump: HashSet<String>,
    pub fail_drop: HashSet<String>,
    pub role_creations: usize,
    pub open_sessions: usize,
    pub dumped: Vec<String>,
    pub replayed: Vec<String>,
}

/// A fake server shared by the connector and the dump tool.
#[derive(Clone, Default)]
pub struct FakePg {
    state: Arc<Mutex<PgState>>,
}

impl FakePg {
    pub fn with_databases(dbs: &[(&str, &str)]) -> Self {
        let fake = FakePg::default();
        {
            let mut state = fake.state();
            state.databases.insert("postgres".to_string(), String::new());
            for (name, sql) in dbs {
                state.databases.insert(name.to_string(), sql.to_string());
            }
        }
        fake
    }

    pub fn state(&self) -> MutexGuard<'_, PgState> {
        self.state.lock().expect("fake pg state poisoned")
    }
}

#[async_trait]
impl AdminConnector for FakePg {
    async fn connect(&self) -> Result<Box<dyn AdminSession>> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(anyhow!("connection refused"));
        }
        state.open_sessions += 1;
        Ok(Box::new(FakeSession { server: self.clone() }))
    }
}

struct FakeSession {
    server: FakePg,
}

#[async_trait]
impl AdminSession for FakeSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        Ok(self.server.state().databases.keys().cloned().collect())
    }

    async fn terminate_connections(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        let mut state = self.server.state();
        if state.fail_drop.contains(name) {
            return Err(anyhow!("database \"{}\" is being accessed by other users", name));
        }
        state.databases.remove(name);
        state.owners.remove(name);
        Ok(())
    }

    async fn role_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.server.state().roles.contains(name))
    }

    async fn create_role(&mut self, role: &RoleSpec) -> Result<()> {
        let mut state = self.server.state();
        if !state.roles.insert(role.name.clone()) {
            return Err(anyhow!("role \"{}\" already exists", role.name));
        }
        state.role_creations += 1;
        Ok(())
    }

    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()> {
        let mut state = self.server.state();
        if state.databases.contains_key(name) {
            return Err(anyhow!("database \"{}\" already exists", name));
        }
        if !state.roles.contains(owner) {
            return Err(anyhow!("role \"{}\" does not exist", owner));
        }
        state.databases.insert(name.to_string(), String::new());
        state.owners.insert(name.to_string(), owner.to_string());
        Ok(())
    }

    async fn grant_superuser(&mut self, role: &str) -> Result<()> {
        self.server.state().superusers.insert(role.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.server.state().open_sessions -= 1;
        Ok(())
    }
}

#[async_trait]
impl DumpTool for FakePg {
    async fn dump(&self, database: &str, output: &Path) -> Result<()> {
        let mut state = self.state();
        if state.fail_dump.contains(database) {
            return Err(AppError::Command {
                program: "pg_dump".to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("pg_dump: error: cannot dump {}", database),
            }
            .into());
        }
        let sql = state
            .databases
            .get(database)
            .cloned()
            .ok_or_else(|| anyhow!("database \"{}\" does not exist", database))?;
        std::fs::write(output, sql)?;
        state.dumped.push(database.to_string());
        Ok(())
    }

    async fn restore(&self, database: &str, input: &Path) -> Result<()> {
        let sql = std::fs::read_to_string(input)?;
        let mut state = self.state();
        let current = state
            .databases
            .get_mut(database)
            .ok_or_else(|| anyhow!("database \"{}\" does not exist", database))?;
        current.push_str(&sql);
        state.replayed.push(database.to_string());
        Ok(())
    }
}

pub fn pg_config(databases: &[(&str, &str)], roles: &[(&str, bool)]) -> PostgresConfig {
    PostgresConfig {
        host: "localhost".to_string(),
        port: 5432,
        user: "postgres".to_string(),
        password: String::new(),
        stop_on_error: false,
        databases: databases
            .iter()
            .map(|(name, owner)| DatabaseTarget {
                name: name.to_string(),
                owner: owner.to_string(),
            })
            .collect(),
        roles: roles
            .iter()
            .map(|(name, superuser)| RoleSpec {
                name: name.to_string(),
                password: Some("pw".to_string()),
                superuser: *superuser,
            })
            .collect(),
    }
}

/// The deployment this tool was built for.
pub fn outline_pg_config() -> PostgresConfig {
    pg_config(
        &[
            ("outline", "outline"),
            ("outline_test", "outline"),
            ("keycloak", "keycloak"),
        ],
        &[("outline", true), ("keycloak", false)],
    )
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FakeBucket {
    pub objects: BTreeMap<String, Vec<u8>>,
    pub policy: Option<String>,
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub buckets: BTreeMap<String, FakeBucket>,
    pub unreachable: bool,
    pub fail_download: HashSet<String>,
    /// Keys whose download writes part of the body before failing.
    pub fail_midstream: HashSet<String>,
    pub fail_make_bucket: HashSet<String>,
    pub uploads: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_bucket(self, name: &str, objects: &[(&str, &[u8])], policy: Option<&str>) -> Self {
        self.state().buckets.insert(
            name.to_string(),
            FakeBucket {
                objects: objects
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                policy: policy.map(str::to_string),
            },
        );
        self
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("fake store state poisoned")
    }

    fn reachable(&self) -> Result<MutexGuard<'_, StoreState>> {
        let state = self.state();
        if state.unreachable {
            return Err(anyhow!("dispatch failure: connection refused"));
        }
        Ok(state)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.reachable()?.buckets.keys().cloned().collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let state = self.reachable()?;
        let b = state
            .buckets
            .get(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        Ok(b.objects.keys().cloned().collect())
    }

    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let (data, midstream) = {
            let state = self.reachable()?;
            if state.fail_download.contains(key) {
                return Err(anyhow!("connection reset while reading {}", key));
            }
            let data = state
                .buckets
                .get(bucket)
                .and_then(|b| b.objects.get(key))
                .cloned()
                .ok_or_else(|| anyhow!("NoSuchKey: {}", key))?;
            (data, state.fail_midstream.contains(key))
        };
        let mut file = tokio::fs::File::create(dest).await?;
        if midstream {
            let half = data.len().div_ceil(2);
            copy_in_chunks(&mut &data[..half], &mut file).await?;
            return Err(anyhow!("connection reset after {} bytes of {}", half, key));
        }
        copy_in_chunks(&mut data.as_slice(), &mut file).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.reachable()?.buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.reachable()?;
        if state.fail_make_bucket.contains(bucket) {
            return Err(anyhow!("AccessDenied: cannot create {}", bucket));
        }
        state.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<String>> {
        Ok(self
            .reachable()?
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone()))
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        let mut state = self.reachable()?;
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        b.policy = Some(policy.to_string());
        Ok(())
    }

    async fn upload_file(&self, bucket: &str, key: &str, src: &Path) -> Result<()> {
        let data = tokio::fs::read(src).await?;
        let mut state = self.reachable()?;
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        b.objects.insert(key.to_string(), data);
        state.uploads += 1;
        Ok(())
    }
}
