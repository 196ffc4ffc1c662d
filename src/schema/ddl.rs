//! DDL rendering for the supported SQL dialects.
//!
//! Produces `CREATE TABLE IF NOT EXISTS` statements in dependency order.
//! Deferred foreign keys cannot be declared inline without creating a cycle,
//! so they become trailing `ALTER TABLE` statements where the dialect allows
//! it and plain nullable columns elsewhere. Those statements are guarded by a
//! catalog lookup so the whole script can run twice.

use super::{AttrType, EntityDef, EntityKind, FkAction, SchemaRegistry};
use crate::error::Result;
use std::fmt;
use std::str::FromStr;

/// SQL dialect for rendered statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    MySql,
    Postgres,
    Sqlite,
    #[default]
    DuckDb,
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "sqlite" | "sqlite3" => Ok(SqlDialect::Sqlite),
            "duckdb" => Ok(SqlDialect::DuckDb),
            _ => Err(format!(
                "Unknown dialect: {}. Valid options: mysql, postgres, sqlite, duckdb",
                s
            )),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::MySql => write!(f, "mysql"),
            SqlDialect::Postgres => write!(f, "postgres"),
            SqlDialect::Sqlite => write!(f, "sqlite"),
            SqlDialect::DuckDb => write!(f, "duckdb"),
        }
    }
}

impl SqlDialect {
    /// Quote an identifier
    pub fn quote(&self, ident: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", ident),
            _ => format!("\"{}\"", ident),
        }
    }

    /// Whether `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` is available
    pub fn supports_alter_foreign_key(&self) -> bool {
        matches!(self, SqlDialect::MySql | SqlDialect::Postgres)
    }

    /// Whether `ON DELETE` actions are accepted on foreign keys
    pub fn supports_on_delete(&self) -> bool {
        !matches!(self, SqlDialect::DuckDb)
    }
}

impl AttrType {
    /// Column type for a dialect
    pub fn render(&self, dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::MySql => match self {
                AttrType::Serial => "INT AUTO_INCREMENT".to_string(),
                AttrType::Integer => "INT".to_string(),
                AttrType::BigInt => "BIGINT".to_string(),
                AttrType::VarChar(n) => format!("VARCHAR({})", n),
                AttrType::Text => "TEXT".to_string(),
                AttrType::Boolean => "TINYINT(1)".to_string(),
                AttrType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
                AttrType::Date => "DATE".to_string(),
                AttrType::Timestamp => "DATETIME".to_string(),
                AttrType::Blob => "BLOB".to_string(),
            },
            SqlDialect::Postgres => match self {
                AttrType::Serial => "SERIAL".to_string(),
                AttrType::Integer => "INTEGER".to_string(),
                AttrType::BigInt => "BIGINT".to_string(),
                AttrType::VarChar(n) => format!("VARCHAR({})", n),
                AttrType::Text => "TEXT".to_string(),
                AttrType::Boolean => "BOOLEAN".to_string(),
                AttrType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
                AttrType::Date => "DATE".to_string(),
                AttrType::Timestamp => "TIMESTAMP".to_string(),
                AttrType::Blob => "BYTEA".to_string(),
            },
            // PRIMARY KEY on a lone INTEGER column aliases the rowid
            SqlDialect::Sqlite => match self {
                AttrType::Serial | AttrType::Integer | AttrType::BigInt => "INTEGER".to_string(),
                AttrType::VarChar(_) | AttrType::Text => "TEXT".to_string(),
                AttrType::Boolean => "INTEGER".to_string(),
                AttrType::Decimal(_, _) => "REAL".to_string(),
                AttrType::Date | AttrType::Timestamp => "TEXT".to_string(),
                AttrType::Blob => "BLOB".to_string(),
            },
            // Keys and references share one width so FK columns match their targets
            SqlDialect::DuckDb => match self {
                AttrType::Serial | AttrType::Integer | AttrType::BigInt => "BIGINT".to_string(),
                AttrType::VarChar(n) => format!("VARCHAR({})", n),
                AttrType::Text => "VARCHAR".to_string(),
                AttrType::Boolean => "BOOLEAN".to_string(),
                AttrType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
                AttrType::Date => "DATE".to_string(),
                AttrType::Timestamp => "TIMESTAMP".to_string(),
                AttrType::Blob => "BLOB".to_string(),
            },
        }
    }
}

/// Name of the DuckDB sequence backing an entity's serial key
pub fn sequence_name(kind: EntityKind) -> String {
    format!("seq_{}", kind.table_name())
}

fn foreign_key_clause(
    dialect: SqlDialect,
    column: &str,
    target: EntityKind,
    target_attr: &str,
    on_delete: FkAction,
) -> String {
    let mut clause = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote(column),
        dialect.quote(target.table_name()),
        dialect.quote(target_attr)
    );
    if on_delete != FkAction::NoAction && dialect.supports_on_delete() {
        clause.push_str(" ON DELETE ");
        clause.push_str(on_delete.to_sql());
    }
    clause
}

/// Render the CREATE TABLE statement for one entity (without trailing `;`)
pub fn render_create_table(def: &EntityDef, dialect: SqlDialect) -> String {
    let mut lines: Vec<String> = Vec::new();

    for attr in &def.attributes {
        let mut line = format!(
            "  {} {}",
            dialect.quote(&attr.name),
            attr.attr_type.render(dialect)
        );
        if attr.is_serial() && dialect == SqlDialect::DuckDb {
            line.push_str(&format!(" DEFAULT nextval('{}')", sequence_name(def.kind)));
        }
        if attr.not_null {
            line.push_str(" NOT NULL");
        }
        if attr.unique && !attr.primary_key {
            line.push_str(" UNIQUE");
        }
        if attr.default_now {
            line.push_str(" DEFAULT CURRENT_TIMESTAMP");
        }
        lines.push(line);
    }

    let pk = def.primary_key_names();
    if !pk.is_empty() {
        let cols: Vec<String> = pk.iter().map(|c| dialect.quote(c)).collect();
        lines.push(format!("  PRIMARY KEY ({})", cols.join(", ")));
    }

    for composite in &def.composite_uniques {
        let cols: Vec<String> = composite.iter().map(|c| dialect.quote(c)).collect();
        lines.push(format!("  UNIQUE ({})", cols.join(", ")));
    }

    for (attr, fk) in def.foreign_keys() {
        if fk.deferred {
            continue;
        }
        lines.push(format!(
            "  {}",
            foreign_key_clause(dialect, &attr.name, fk.target, &fk.target_attr, fk.on_delete)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        dialect.quote(def.name()),
        lines.join(",\n")
    )
}

/// Render every statement needed to create the schema, in execution order
pub fn render_statements(
    registry: &SchemaRegistry,
    dialect: SqlDialect,
    order: &[EntityKind],
) -> Result<Vec<String>> {
    let mut statements = Vec::new();

    for &kind in order {
        let def = registry.def(kind)?;
        if dialect == SqlDialect::DuckDb && def.primary_key().iter().any(|a| a.is_serial()) {
            statements.push(format!(
                "CREATE SEQUENCE IF NOT EXISTS {} START 1",
                sequence_name(kind)
            ));
        }
        statements.push(render_create_table(def, dialect));
    }

    if dialect.supports_alter_foreign_key() {
        for edge in registry.deferred_edges() {
            let def = registry.def(edge.child)?;
            let Some(fk) = def
                .get_attribute(&edge.attribute)
                .and_then(|a| a.foreign_key.as_ref())
            else {
                continue;
            };
            let table = edge.child.table_name();
            let name = format!("fk_{}_{}", edge.child, edge.attribute);
            let alter = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {}",
                dialect.quote(table),
                dialect.quote(&name),
                foreign_key_clause(dialect, &edge.attribute, fk.target, &fk.target_attr, fk.on_delete)
            );
            statements.extend(guard_constraint(dialect, table, &name, alter));
        }
    }

    Ok(statements)
}

/// Wrap an `ADD CONSTRAINT` so it is skipped when the constraint exists.
///
/// PostgreSQL gets a `DO` block. MySQL has no `IF NOT EXISTS` for
/// constraints, so the statement text is chosen from `information_schema`
/// and run as a prepared statement.
fn guard_constraint(dialect: SqlDialect, table: &str, name: &str, alter: String) -> Vec<String> {
    match dialect {
        SqlDialect::Postgres => vec![format!(
            "DO $$\nBEGIN\n  IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = '{}') THEN\n    {};\n  END IF;\nEND $$",
            name, alter
        )],
        SqlDialect::MySql => vec![
            format!(
                "SET @fk_sql = IF((SELECT COUNT(*) FROM information_schema.TABLE_CONSTRAINTS \
                 WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = '{}' \
                 AND CONSTRAINT_NAME = '{}') = 0, '{}', 'DO 0')",
                table,
                name,
                alter.replace('\'', "''")
            ),
            "PREPARE fk_stmt FROM @fk_sql".to_string(),
            "EXECUTE fk_stmt".to_string(),
            "DEALLOCATE PREPARE fk_stmt".to_string(),
        ],
        SqlDialect::Sqlite | SqlDialect::DuckDb => vec![alter],
    }
}

/// Render the whole schema as a DDL script
pub fn render_ddl(registry: &SchemaRegistry, dialect: SqlDialect) -> Result<String> {
    let order = registry.dependency_order()?;
    let statements = render_statements(registry, dialect, &order)?;

    let mut out = String::new();
    for stmt in statements {
        out.push_str(&stmt);
        out.push_str(";\n\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rental_schema;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("MySQL".parse::<SqlDialect>().unwrap(), SqlDialect::MySql);
        assert_eq!("pg".parse::<SqlDialect>().unwrap(), SqlDialect::Postgres);
        assert_eq!("duckdb".parse::<SqlDialect>().unwrap(), SqlDialect::DuckDb);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_every_statement_is_rerunnable() {
        let registry = rental_schema();
        for dialect in [
            SqlDialect::MySql,
            SqlDialect::Postgres,
            SqlDialect::Sqlite,
            SqlDialect::DuckDb,
        ] {
            let ddl = render_ddl(&registry, dialect).unwrap();
            let statements: Vec<&str> = ddl.split(";\n\n").filter(|s| !s.is_empty()).collect();
            for stmt in statements {
                let guarded = if stmt.starts_with("CREATE") {
                    stmt.contains("IF NOT EXISTS")
                } else if stmt.starts_with("DO $$") {
                    stmt.contains("IF NOT EXISTS (SELECT 1 FROM pg_constraint")
                } else if stmt.starts_with("SET @fk_sql") {
                    stmt.contains("information_schema.TABLE_CONSTRAINTS")
                } else {
                    ["PREPARE fk_stmt", "EXECUTE fk_stmt", "DEALLOCATE PREPARE fk_stmt"]
                        .iter()
                        .any(|p| stmt.starts_with(p))
                };
                assert!(guarded, "{}: {}", dialect, stmt);
            }
        }
    }

    #[test]
    fn test_script_ends_with_one_terminator() {
        for dialect in [SqlDialect::MySql, SqlDialect::Postgres] {
            let ddl = render_ddl(&rental_schema(), dialect).unwrap();
            assert!(ddl.ends_with(";\n\n"));
            assert!(!ddl.contains(";;"));
        }
    }

    #[test]
    fn test_mysql_constraint_checked_in_catalog() {
        let ddl = render_ddl(&rental_schema(), SqlDialect::MySql).unwrap();
        assert!(ddl.contains(
            "TABLE_NAME = 'store' AND CONSTRAINT_NAME = 'fk_store_manager_staff_id') = 0, \
             'ALTER TABLE `store` ADD CONSTRAINT `fk_store_manager_staff_id` \
             FOREIGN KEY (`manager_staff_id`) REFERENCES `staff` (`staff_id`)', 'DO 0')"
        ));
        assert_eq!(ddl.matches("EXECUTE fk_stmt").count(), 2);
        assert!(!ddl.contains("\nALTER TABLE"));
        assert!(!ddl.starts_with("ALTER TABLE"));
    }

    #[test]
    fn test_deferred_fk_as_alter_on_postgres() {
        let ddl = render_ddl(&rental_schema(), SqlDialect::Postgres).unwrap();
        assert!(ddl.contains(
            "ALTER TABLE \"store\" ADD CONSTRAINT \"fk_store_manager_staff_id\" \
             FOREIGN KEY (\"manager_staff_id\") REFERENCES \"staff\" (\"staff_id\")"
        ));
        assert!(ddl.contains("REFERENCES \"rental\" (\"rental_id\")"));
        assert!(ddl.contains(
            "IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'fk_store_manager_staff_id') THEN"
        ));
        assert!(!ddl.contains(";\n\nALTER TABLE"));
    }

    #[test]
    fn test_deferred_fk_omitted_on_duckdb() {
        let registry = rental_schema();
        let ddl = render_ddl(&registry, SqlDialect::DuckDb).unwrap();
        assert!(!ddl.contains("ALTER TABLE"));

        let store = render_create_table(registry.get(EntityKind::Store).unwrap(), SqlDialect::DuckDb);
        assert!(store.contains("\"manager_staff_id\" BIGINT,"));
        assert!(!store.contains("REFERENCES \"staff\""));
        assert!(!ddl.contains("ON DELETE"));
        assert!(ddl.contains("CREATE SEQUENCE IF NOT EXISTS seq_film START 1"));
        assert!(ddl.contains("DEFAULT nextval('seq_film')"));
    }

    #[test]
    fn test_cascade_rendered_where_supported() {
        let ddl = render_ddl(&rental_schema(), SqlDialect::MySql).unwrap();
        assert!(ddl.contains(
            "FOREIGN KEY (`category_id`) REFERENCES `category` (`category_id`) ON DELETE CASCADE"
        ));
        assert!(ddl.contains("`film_id` INT AUTO_INCREMENT NOT NULL"));
    }

    #[test]
    fn test_junction_has_composite_primary_key() {
        let registry = rental_schema();
        let def = registry.get(EntityKind::FilmActor).unwrap();
        let sql = render_create_table(def, SqlDialect::Sqlite);
        assert!(sql.contains("PRIMARY KEY (\"film_id\", \"actor_id\")"));
        assert!(!sql.contains("last_update"));
    }

    #[test]
    fn test_tables_follow_dependency_order() {
        let ddl = render_ddl(&rental_schema(), SqlDialect::Sqlite).unwrap();
        let country = ddl.find("CREATE TABLE IF NOT EXISTS \"country\"").unwrap();
        let city = ddl.find("CREATE TABLE IF NOT EXISTS \"city\"").unwrap();
        let payment = ddl.find("CREATE TABLE IF NOT EXISTS \"payment\"").unwrap();
        assert!(country < city);
        assert!(city < payment);
    }
}
