// ==========================================
// 营销后台 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout,减少并发写入时的偶发 busy 错误
// - 按实体描述符建表（无迁移,仅 CREATE IF NOT EXISTS）
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 生成实体表 DDL
///
/// - 主键: Id TEXT PRIMARY KEY
/// - 业务键: UNIQUE
/// - 外键: REFERENCES 父表(Id)
pub fn entity_table_ddl(descriptor: &EntityDescriptor) -> String {
    let mut columns = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        let mut column = format!("\"{}\" {}", field.name, field.field_type.sql_type());
        if field.is_primary {
            column.push_str(" PRIMARY KEY");
        } else if !field.nullable {
            column.push_str(" NOT NULL");
        }
        if descriptor.is_natural_key(field.name) {
            column.push_str(" UNIQUE");
        }
        if let Some(fk) = descriptor
            .foreign_keys
            .iter()
            .find(|fk| fk.local_field == field.name)
        {
            if let Some(parent) = EntityKind::from_name(fk.referenced_entity) {
                column.push_str(&format!(
                    " REFERENCES \"{}\"(\"Id\")",
                    parent.descriptor().table_name
                ));
            }
        }
        columns.push(column);
    }

    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
        descriptor.table_name,
        columns.join(",\n    ")
    )
}

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_batch (
            batch_id TEXT PRIMARY KEY,
            file_names TEXT NOT NULL,
            total_inserted INTEGER NOT NULL,
            warning_count INTEGER NOT NULL,
            imported_at TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL,
            report_json TEXT NOT NULL
        );
        "#,
    )?;

    // 父表先于子表创建
    for kind in EntityKind::ALL {
        conn.execute_batch(&entity_table_ddl(&kind.descriptor()))?;
    }

    Ok(())
}
