// outline-backup/src/scenarios.rs
//! Backup-then-restore runs through the public flows against in-memory services.

use std::fs;
use std::path::Path;

use crate::backup::run_backup_flow;
use crate::config::{AppConfig, MinioConfig};
use crate::restore::run_restore_flow;
use crate::services::Services;
use crate::testing::{FakeBucket, FakePg, MemoryStore, outline_pg_config};
use crate::utils::snapshot::is_snapshot_name;

const POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"AWS":["*"]},"Action":["s3:GetObject"],"Resource":["arn:aws:s3:::outline/public/*"]}]}"#;

fn app_config(backup_root: &Path) -> AppConfig {
    AppConfig {
        backup_root: backup_root.to_path_buf(),
        postgres: outline_pg_config(),
        minio: MinioConfig {
            endpoint: "minio.local:9000".to_string(),
            access_key: "admin".to_string(),
            secret_key: "secret".to_string(),
            secure: false,
            region: "us-east-1".to_string(),
        },
    }
}

fn live_pg() -> FakePg {
    FakePg::with_databases(&[
        ("outline", "INSERT INTO documents VALUES (1);\n"),
        ("outline_test", "INSERT INTO documents VALUES (2);\n"),
        ("keycloak", "INSERT INTO realm VALUES ('outline');\n"),
    ])
}

fn live_store() -> MemoryStore {
    MemoryStore::default()
        .with_bucket(
            "outline",
            &[("a.txt", b"alpha"), ("dir/b.txt", b"beta"), ("public/avatar.png", &[0x89, 0x50, 0x4e, 0x47])],
            Some(POLICY),
        )
        .with_bucket("empty", &[], None)
}

fn snapshots_in(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        names.push(name);
    }
    Ok(names)
}

#[tokio::test]
async fn test_backup_then_restore_latest_into_fresh_services() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backup_root = dir.path().join("backups");
    let config = app_config(&backup_root);

    let source_pg = live_pg();
    let source_store = live_store();
    let backup_summary = run_backup_flow(
        &config,
        Services {
            connector: &source_pg,
            dump_tool: &source_pg,
            store: &source_store,
        },
    )
    .await?;
    assert!(backup_summary.is_success());

    let snapshots = snapshots_in(&backup_root)?;
    assert_eq!(snapshots.len(), 1);
    assert!(is_snapshot_name(&snapshots[0]));
    assert!(backup_summary.snapshot.join("postgres").is_dir());
    assert!(backup_summary.snapshot.join("minio").is_dir());

    let target_pg = FakePg::with_databases(&[]);
    let target_store = MemoryStore::default();
    let restore_summary = run_restore_flow(
        &config,
        Services {
            connector: &target_pg,
            dump_tool: &target_pg,
            store: &target_store,
        },
        None,
    )
    .await?;
    assert!(restore_summary.is_success());
    assert_eq!(restore_summary.snapshot, backup_summary.snapshot);

    assert_eq!(
        target_pg.state().databases.get("outline"),
        source_pg.state().databases.get("outline")
    );
    assert_eq!(
        target_pg.state().databases.get("keycloak"),
        source_pg.state().databases.get("keycloak")
    );

    let restored = target_store.state().buckets.clone();
    let original = source_store.state().buckets.clone();
    assert_eq!(restored, original);
    assert!(!restored["outline"].objects.contains_key("policy.json"));
    Ok(())
}

#[tokio::test]
async fn test_restore_twice_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = app_config(dir.path());

    let source_pg = live_pg();
    let source_store = live_store();
    let backup = run_backup_flow(
        &config,
        Services {
            connector: &source_pg,
            dump_tool: &source_pg,
            store: &source_store,
        },
    )
    .await?;

    let target_pg = FakePg::with_databases(&[("outline", "DROP ME;\n")]);
    let target_store = MemoryStore::default().with_bucket("outline", &[("a.txt", b"stale")], None);
    let services = Services {
        connector: &target_pg,
        dump_tool: &target_pg,
        store: &target_store,
    };

    run_restore_flow(&config, services, Some(backup.snapshot.clone())).await?;
    let databases_once = target_pg.state().databases.clone();
    let buckets_once: std::collections::BTreeMap<String, FakeBucket> = target_store.state().buckets.clone();
    assert_eq!(target_store.state().uploads, 3);

    let second = run_restore_flow(&config, services, Some(backup.snapshot.clone())).await?;
    assert!(second.is_success());
    assert_eq!(target_pg.state().databases, databases_once);
    assert_eq!(target_store.state().buckets, buckets_once);
    assert_eq!(target_store.state().uploads, 6);
    assert_eq!(target_store.state().buckets["outline"].objects["a.txt"], b"alpha".to_vec());
    Ok(())
}

#[tokio::test]
async fn test_one_failing_dump_leaves_the_rest_of_the_snapshot_intact() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = app_config(dir.path());
    let source_pg = live_pg();
    source_pg.state().fail_dump.insert("outline_test".to_string());
    let source_store = live_store();

    let summary = run_backup_flow(
        &config,
        Services {
            connector: &source_pg,
            dump_tool: &source_pg,
            store: &source_store,
        },
    )
    .await?;

    assert!(!summary.is_success());
    let pg_report = summary.report("postgres").expect("postgres report");
    assert_eq!(pg_report.failures.len(), 1);
    assert_eq!(pg_report.failures[0].resource, "outline_test");
    assert_eq!(pg_report.completed, vec!["outline", "keycloak"]);
    let postgres_dir = summary.snapshot.join("postgres");
    assert!(postgres_dir.join("outline_backup.sql").is_file());
    assert!(postgres_dir.join("keycloak_backup.sql").is_file());
    assert!(!postgres_dir.join("outline_test_backup.sql").exists());
    Ok(())
}

#[tokio::test]
async fn test_restore_without_any_snapshot_reports_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = app_config(&dir.path().join("never-created"));
    let pg = FakePg::with_databases(&[("outline", "keep\n")]);
    let store = MemoryStore::default();

    let result = run_restore_flow(
        &config,
        Services {
            connector: &pg,
            dump_tool: &pg,
            store: &store,
        },
        None,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(pg.state().databases.get("outline").map(String::as_str), Some("keep\n"));
    Ok(())
}
