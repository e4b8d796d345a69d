use rowkeeper_core::builtin::{builtin_registry, ensure_version_row, MODEL_NAME, SCHEMA_VERSION};
use rowkeeper_core::config::{ENV_MAX_IDLE, ENV_MAX_OPEN, ENV_PREFIX, ENV_VERBOSE};
use rowkeeper_core::db::open_pool;
use rowkeeper_core::schema::sync_app_schema;
use rowkeeper_core::{AppContext, ConfigError, DbError, Engine, SearchMode, StoreConfig, Value};
use std::collections::HashMap;

#[test]
fn file_store_runs_in_wal_mode_with_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let config = StoreConfig::sqlite(format!("sqlite://{}", path.display()), "rprj");

    let pool = open_pool(&config).unwrap();
    let conn = pool.get().unwrap();
    let journal: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal.to_ascii_lowercase(), "wal");
    assert_eq!(foreign_keys, 1);
    assert!(path.exists());
}

#[test]
fn reopening_a_file_store_keeps_schema_and_version_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let config = StoreConfig::sqlite(path.to_string_lossy(), "rprj");

    let app = AppContext::open(config.clone(), builtin_registry().unwrap()).unwrap();
    sync_app_schema(&app).unwrap();
    assert!(ensure_version_row(&app.repository(app.context_for("", &[]))).unwrap());
    drop(app);

    let app = AppContext::open(config, builtin_registry().unwrap()).unwrap();
    let report = sync_app_schema(&app).unwrap();
    assert!(report.created.is_empty());
    let repo = app.repository(app.context_for("", &[]));
    assert!(!ensure_version_row(&repo).unwrap());

    let rows = repo
        .search(
            &repo.instance_for("DBVersion").unwrap(),
            SearchMode::exact(),
            "",
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("model_name"), Some(&Value::from(MODEL_NAME)));
    assert_eq!(rows[0].get("version"), Some(&Value::from(SCHEMA_VERSION)));
}

#[test]
fn engines_without_a_driver_are_rejected() {
    let mut config = StoreConfig::default();
    config.engine = Engine::Postgres;

    match open_pool(&config).unwrap_err() {
        DbError::UnsupportedEngine(engine) => assert_eq!(engine, Engine::Postgres),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn overrides_replace_file_values_and_normalize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(
        &path,
        r#"{"url": "data.db", "table_prefix": "my_app", "pool": {"max_open": 4}}"#,
    )
    .unwrap();

    let mut config = StoreConfig::from_json_file(&path).unwrap();
    assert_eq!(config.table_prefix, "myapp");
    assert_eq!(config.pool.max_open, 4);
    assert_eq!(config.pool.max_idle, 4);
    assert_eq!(config.busy_timeout_ms, 30_000);

    let env: HashMap<&str, &str> = [
        (ENV_PREFIX, "other"),
        (ENV_MAX_OPEN, "2"),
        (ENV_MAX_IDLE, "9"),
        (ENV_VERBOSE, "true"),
    ]
    .into_iter()
    .collect();
    config
        .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
        .unwrap();
    assert_eq!(config.table_prefix, "other");
    assert_eq!(config.pool.max_open, 2);
    assert_eq!(config.pool.max_idle, 2);
    assert!(config.verbose);

    let err = config
        .apply_overrides(|key| (key == ENV_MAX_OPEN).then(|| "many".to_string()))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
}
