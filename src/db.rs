// ==========================================
// 商品目录数据导入引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建库 DDL 集中在本模块, 仓储层与测试复用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

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

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库: 创建全部表与索引并登记 schema_version
///
/// # 说明
/// - 所有 DDL 使用 IF NOT EXISTS, 重复调用安全
/// - 配置层默认写入 global 作用域记录
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

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

        CREATE TABLE IF NOT EXISTS import_job (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source_file TEXT NOT NULL,
            entity_kind TEXT NOT NULL,
            operation TEXT NOT NULL,
            max_allowed_faults INTEGER NOT NULL DEFAULT 0,
            column_delimiter TEXT NOT NULL DEFAULT ',',
            text_qualifier TEXT NOT NULL DEFAULT '"',
            mappings_json TEXT NOT NULL,
            catalog_guid TEXT,
            store_guid TEXT,
            warehouse_guid TEXT,
            dependent_guid TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_job_status (
            process_id TEXT PRIMARY KEY,
            job_guid TEXT NOT NULL REFERENCES import_job(guid) ON DELETE CASCADE,
            state TEXT NOT NULL,
            started_by TEXT NOT NULL,
            total_rows INTEGER NOT NULL DEFAULT 0,
            current_row INTEGER NOT NULL DEFAULT 0,
            failed_rows INTEGER NOT NULL DEFAULT 0,
            cancel_requested INTEGER NOT NULL DEFAULT 0,
            start_time TEXT,
            end_time TEXT,
            last_modified TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_bad_row (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            process_id TEXT NOT NULL REFERENCES import_job_status(process_id) ON DELETE CASCADE,
            row_number INTEGER NOT NULL,
            raw_row TEXT NOT NULL,
            faults_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_import_bad_row_process
            ON import_bad_row(process_id, row_number);

        CREATE TABLE IF NOT EXISTS catalog_entity (
            entity_kind TEXT NOT NULL,
            guid TEXT NOT NULL,
            scope_guid TEXT NOT NULL DEFAULT '',
            doc_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (entity_kind, guid, scope_guid)
        );

        CREATE TABLE IF NOT EXISTS product_association (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            catalog_guid TEXT NOT NULL DEFAULT '',
            source_product_guid TEXT NOT NULL,
            target_product_guid TEXT NOT NULL,
            association_type TEXT NOT NULL,
            default_quantity INTEGER NOT NULL DEFAULT 1,
            ordering INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_product_association_source
            ON product_association(catalog_guid, source_product_guid);

        CREATE TABLE IF NOT EXISTS reference_guid (
            ref_kind TEXT NOT NULL,
            guid TEXT NOT NULL,
            scope_guid TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (ref_kind, guid, scope_guid)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_ensure_schema_idempotent() {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_str().unwrap().to_string();

        let conn = open_sqlite_connection(&db_path).unwrap();
        ensure_schema(&conn).unwrap();
        // 重复建库不应报错
        ensure_schema(&conn).unwrap();

        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_schema_version_none_on_empty_db() {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_str().unwrap().to_string();

        let conn = open_sqlite_connection(&db_path).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
