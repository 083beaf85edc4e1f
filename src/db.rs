use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::enrich::NormalizedEntity;
use crate::error::PersistError;
use crate::registry::{CategorySpec, Registry};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// One table per registered category; columns mirror the field list, `id` is the key.
pub fn init_schema(conn: &Connection, registry: &Registry) -> Result<()> {
    for spec in registry.specs() {
        let cols: Vec<String> = spec
            .fields
            .iter()
            .map(|f| if f == "id" { "id PRIMARY KEY".to_string() } else { f.clone() })
            .collect();
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", spec.table(), cols.join(", "));
        conn.execute(&sql, [])?;
    }
    Ok(())
}

/// Insert-or-replace one row keyed by id, columns in the registry's declared order.
pub fn upsert(
    conn: &Connection,
    spec: &CategorySpec,
    entity: &NormalizedEntity,
) -> Result<(), PersistError> {
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        spec.table(),
        spec.fields.join(", "),
        (1..=spec.fields.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", "),
    );

    let mut stmt = conn.prepare_cached(&sql).map_err(|source| PersistError::Prepare {
        table: spec.table().to_string(),
        source,
    })?;

    let entity = entity.entity();
    debug_assert!(entity.columns().eq(spec.fields.iter().map(String::as_str)));
    let params: Vec<&dyn rusqlite::ToSql> =
        entity.values().map(|v| v as &dyn rusqlite::ToSql).collect();

    stmt.execute(params.as_slice()).map_err(|source| PersistError::Exec {
        table: spec.table().to_string(),
        id: entity.id().to_string(),
        source,
    })?;
    Ok(())
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub struct TableStats {
    pub table: &'static str,
    pub rows: usize,
}

pub fn row_counts(conn: &Connection, registry: &Registry) -> Result<Vec<TableStats>> {
    let mut out = Vec::new();
    for spec in registry.specs() {
        let rows = if table_exists(conn, spec.table())? {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", spec.table()), [], |r| r.get(0))?
        } else {
            0
        };
        out.push(TableStats { table: spec.table(), rows });
    }
    Ok(out)
}
