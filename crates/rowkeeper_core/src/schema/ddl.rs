//! `CREATE TABLE` generation from entity descriptors.
//!
//! # Invariants
//! - Physical names are always `<prefix>_<table>`.
//! - FOREIGN KEY clauses are emitted for associations only; owned and plain
//!   foreign keys may be polymorphic and stay logical.
//! - On Postgres, owned subtypes inherit the base object columns from
//!   `<prefix>_objects` instead of repeating them.

use crate::db::{prefixed_table_name, Engine};
use crate::model::column::Column;
use crate::model::descriptor::{object_columns, EntityDescriptor, EntityKind, OBJECTS_TABLE};
use crate::schema::dialect::translate_type;

/// Renders the `CREATE TABLE IF NOT EXISTS` statement for `descriptor`.
pub fn create_table_sql(engine: Engine, prefix: &str, descriptor: &EntityDescriptor) -> String {
    let table = prefixed_table_name(prefix, descriptor.table_name());
    let inherits = engine == Engine::Postgres
        && descriptor.kind() == EntityKind::Owned
        && !descriptor.is_base_object();

    let mut lines: Vec<String> = descriptor
        .columns()
        .iter()
        .filter(|column| !(inherits && object_columns::ALL.contains(&column.name.as_str())))
        .map(|column| column_sql(engine, column))
        .collect();
    if !descriptor.keys().is_empty() {
        lines.push(format!("PRIMARY KEY ({})", descriptor.keys().join(", ")));
    }
    if descriptor.kind() == EntityKind::Association {
        for foreign_key in descriptor.foreign_keys() {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                foreign_key.column,
                prefixed_table_name(prefix, &foreign_key.ref_table),
                foreign_key.ref_column
            ));
        }
    }

    let mut sql = format!("CREATE TABLE IF NOT EXISTS {table} (\n {}\n)", lines.join(",\n "));
    if inherits {
        sql.push_str(&format!(
            " INHERITS ({})",
            prefixed_table_name(prefix, OBJECTS_TABLE)
        ));
    }
    sql
}

fn column_sql(engine: Engine, column: &Column) -> String {
    let mut line = format!("{} {}", column.name, translate_type(engine, &column.sql_type));
    for constraint in &column.constraints {
        line.push(' ');
        line.push_str(constraint);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::create_table_sql;
    use crate::db::Engine;
    use crate::model::column::{Column, ForeignKey};
    use crate::model::descriptor::EntityDescriptor;

    fn folder() -> EntityDescriptor {
        EntityDescriptor::object(
            "DBFolder",
            "folders",
            vec![Column::new("childs_sort_order", "text", &["DEFAULT NULL"])],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn plain_tables_carry_primary_key_only() {
        let version = EntityDescriptor::plain(
            "DBVersion",
            "dbversion",
            vec![
                Column::new("model_name", "varchar(255)", &["NOT NULL"]),
                Column::new("version", "int(11)", &["NOT NULL"]),
            ],
            &["model_name"],
            vec![],
        )
        .unwrap();
        assert_eq!(
            create_table_sql(Engine::Sqlite, "rprj", &version),
            "CREATE TABLE IF NOT EXISTS rprj_dbversion (\n model_name varchar(255) NOT NULL,\n version int(11) NOT NULL,\n PRIMARY KEY (model_name)\n)"
        );
    }

    #[test]
    fn associations_declare_foreign_keys() {
        let membership = EntityDescriptor::association(
            "UserGroup",
            "users_groups",
            vec![
                Column::new("user_id", "varchar(16)", &["NOT NULL"]),
                Column::new("group_id", "varchar(16)", &["NOT NULL"]),
            ],
            &["user_id", "group_id"],
            vec![
                ForeignKey::new("user_id", "users", "id"),
                ForeignKey::new("group_id", "groups", "id"),
            ],
        )
        .unwrap();
        let sql = create_table_sql(Engine::Mysql, "rprj", &membership);
        assert!(sql.contains("PRIMARY KEY (user_id, group_id)"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES rprj_users(id)"));
        assert!(sql.contains("FOREIGN KEY (group_id) REFERENCES rprj_groups(id)"));
    }

    #[test]
    fn postgres_subtypes_inherit_object_columns() {
        let sql = create_table_sql(Engine::Postgres, "rprj", &folder());
        assert!(sql.ends_with(" INHERITS (rprj_objects)"));
        assert!(sql.contains("childs_sort_order text"));
        assert!(!sql.contains("owner varchar"));

        let sql = create_table_sql(Engine::Sqlite, "rprj", &folder());
        assert!(sql.contains("owner varchar(16) NOT NULL"));
        assert!(sql.contains("creation_date datetime"));
        assert!(!sql.contains("INHERITS"));
    }

    #[test]
    fn postgres_base_object_table_is_self_contained() {
        let objects = EntityDescriptor::object("DBObject", "objects", vec![], vec![]).unwrap();
        let sql = create_table_sql(Engine::Postgres, "rprj", &objects);
        assert!(sql.contains("creation_date TIMESTAMP DEFAULT NULL"));
        assert!(!sql.contains("INHERITS"));
        assert!(!sql.contains("FOREIGN KEY"));
    }
}
