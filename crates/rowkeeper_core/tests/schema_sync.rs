use rowkeeper_core::builtin::builtin_registry;
use rowkeeper_core::model::column::{Column, ForeignKey};
use rowkeeper_core::schema::{
    creation_order, sync_app_schema, LiveColumn, SchemaBackend, SchemaDrift, SchemaError,
    SchemaSynchronizer, SqliteBackend,
};
use rowkeeper_core::{AppContext, Engine, EntityDescriptor, EntityRegistry, StoreConfig};
use rusqlite::Connection;
use std::collections::HashMap;

fn position(order: &[String], table: &str) -> usize {
    order
        .iter()
        .position(|entry| entry == table)
        .unwrap_or_else(|| panic!("{table} missing from {order:?}"))
}

fn plain(type_name: &str, table: &str, references: &[&str]) -> EntityDescriptor {
    let mut columns = vec![Column::new("id", "varchar(16)", &["NOT NULL"])];
    let mut foreign_keys = Vec::new();
    for target in references {
        let column = format!("{target}_id");
        columns.push(Column::new(&column, "varchar(16)", &[]));
        foreign_keys.push(ForeignKey::new(&column, target, "id"));
    }
    EntityDescriptor::plain(type_name, table, columns, &["id"], foreign_keys).unwrap()
}

#[test]
fn first_sync_creates_everything_and_second_finds_it() {
    let app = AppContext::open(
        StoreConfig::sqlite_in_memory("rprj"),
        builtin_registry().unwrap(),
    )
    .unwrap();

    let first = sync_app_schema(&app).unwrap();
    assert_eq!(first.created.len(), app.registry().len());
    assert!(first.existing.is_empty());
    assert!(!first.has_drift());
    assert!(first.cycles.is_empty());
    assert!(position(&first.order, "rprj_groups") < position(&first.order, "rprj_users"));
    assert!(position(&first.order, "rprj_users") < position(&first.order, "rprj_users_groups"));
    assert!(position(&first.order, "rprj_objects") < position(&first.order, "rprj_folders"));

    let second = sync_app_schema(&app).unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.existing, first.order);
    assert!(!second.has_drift(), "{:?}", second.drift);
}

#[test]
fn sqlite_drift_is_reported_but_never_applied() {
    let registry = builtin_registry().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE rprj_groups (id varchar(16) NOT NULL, name text)")
        .unwrap();

    let mut backend = SqliteBackend::new(&conn);
    let report = SchemaSynchronizer::new(&registry, "rprj")
        .ensure_schema(&mut backend)
        .unwrap();

    assert!(report.existing.contains(&"rprj_groups".to_string()));
    assert!(!report.created.contains(&"rprj_groups".to_string()));
    assert_eq!(report.drift.len(), 2);
    assert!(report.drift.contains(&SchemaDrift::TypeMismatch {
        table: "rprj_groups".to_string(),
        column: "name".to_string(),
        declared: "varchar(255)".to_string(),
        live: "text".to_string(),
        alter_sql: None,
    }));
    assert!(report.drift.contains(&SchemaDrift::MissingColumn {
        table: "rprj_groups".to_string(),
        column: "description".to_string(),
        declared: "text".to_string(),
        alter_sql: "ALTER TABLE rprj_groups ADD COLUMN description text".to_string(),
    }));

    let columns: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('rprj_groups')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(columns, 2);
}

#[test]
fn dependencies_come_first_and_self_references_are_ignored() {
    let mut registry = EntityRegistry::new();
    registry.register_plain(plain("Alpha", "alpha", &["beta", "alpha"])).unwrap();
    registry.register_plain(plain("Beta", "beta", &["gamma"])).unwrap();
    registry.register_plain(plain("Gamma", "gamma", &[])).unwrap();
    registry.process_foreign_keys().unwrap();

    let order = creation_order(&registry);
    assert_eq!(order.tables, vec!["gamma", "beta", "alpha"]);
    assert!(order.cycles.is_empty());
}

#[test]
fn cycles_are_reported_and_every_table_still_created() {
    let mut registry = EntityRegistry::new();
    registry.register_plain(plain("Left", "left_side", &["right_side"])).unwrap();
    registry.register_plain(plain("Right", "right_side", &["left_side"])).unwrap();
    registry.process_foreign_keys().unwrap();

    let conn = Connection::open_in_memory().unwrap();
    let mut backend = SqliteBackend::new(&conn);
    let report = SchemaSynchronizer::new(&registry, "cyc")
        .ensure_schema(&mut backend)
        .unwrap();

    assert_eq!(report.created.len(), 2);
    assert_eq!(
        report.cycles,
        vec![vec!["left_side".to_string(), "right_side".to_string(), "left_side".to_string()]]
    );
}

/// In-memory stand-in for a Postgres catalog.
#[derive(Default)]
struct FakeCatalog {
    tables: HashMap<String, Vec<LiveColumn>>,
    executed: Vec<String>,
}

impl FakeCatalog {
    fn with_groups(name_type: &str, name_length: Option<i64>) -> Self {
        let column = |name: &str, sql_type: &str, max_length: Option<i64>| LiveColumn {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            max_length,
        };
        let mut catalog = Self::default();
        catalog.tables.insert(
            "rprj_groups".to_string(),
            vec![
                column("id", "character varying", Some(16)),
                column("name", name_type, name_length),
                column("description", "text", None),
            ],
        );
        catalog
    }
}

impl SchemaBackend for FakeCatalog {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaError> {
        Ok(self.tables.contains_key(table))
    }

    fn live_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>, SchemaError> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<(), SchemaError> {
        self.executed.push(sql.to_string());
        Ok(())
    }
}

#[test]
fn postgres_catalog_types_match_declared_types() {
    let registry = builtin_registry().unwrap();
    let mut catalog = FakeCatalog::with_groups("character varying", Some(255));

    let report = SchemaSynchronizer::new(&registry, "rprj")
        .ensure_schema(&mut catalog)
        .unwrap();

    assert!(!report.has_drift(), "{:?}", report.drift);
    assert_eq!(report.existing, vec!["rprj_groups".to_string()]);
    assert_eq!(catalog.executed.len(), registry.len() - 1);

    let folders = catalog
        .executed
        .iter()
        .find(|sql| sql.contains("rprj_folders ("))
        .unwrap();
    assert!(folders.ends_with(" INHERITS (rprj_objects)"));
    assert!(!folders.contains("owner"));
    let objects = catalog
        .executed
        .iter()
        .find(|sql| sql.contains("rprj_objects ("))
        .unwrap();
    assert!(objects.contains("creation_date TIMESTAMP"));
    assert!(!objects.contains("INHERITS"));
}

#[test]
fn postgres_type_mismatch_carries_alter_statement() {
    let registry = builtin_registry().unwrap();
    let mut catalog = FakeCatalog::with_groups("text", None);

    let report = SchemaSynchronizer::new(&registry, "rprj")
        .ensure_schema(&mut catalog)
        .unwrap();

    assert_eq!(
        report.drift,
        vec![SchemaDrift::TypeMismatch {
            table: "rprj_groups".to_string(),
            column: "name".to_string(),
            declared: "varchar(255)".to_string(),
            live: "text".to_string(),
            alter_sql: Some("ALTER TABLE rprj_groups ALTER COLUMN name TYPE varchar(255)".to_string()),
        }]
    );
    assert!(catalog
        .executed
        .iter()
        .all(|sql| sql.starts_with("CREATE TABLE IF NOT EXISTS")));
}

#[test]
fn ddl_listing_follows_creation_order() {
    let registry = builtin_registry().unwrap();
    let statements = SchemaSynchronizer::new(&registry, "rprj")
        .create_statements(Engine::Sqlite)
        .unwrap();
    assert_eq!(statements.len(), registry.len());

    let index = |table: &str| {
        statements
            .iter()
            .position(|sql| sql.contains(&format!("EXISTS {table} (")))
            .unwrap()
    };
    assert!(index("rprj_groups") < index("rprj_users"));
    assert!(index("rprj_users") < index("rprj_users_groups"));
    assert!(statements[index("rprj_users_groups")]
        .contains("FOREIGN KEY (user_id) REFERENCES rprj_users(id)"));
}
