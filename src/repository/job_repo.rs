// ==========================================
// 商品目录数据导入引擎 - 任务配置仓储
// ==========================================
// 职责: import_job 表的 CRUD (列映射以 JSON 存储)
// 红线: Repository 不含业务规则, 只做数据 CRUD
// ==========================================

use crate::db;
use crate::domain::{ColumnMapping, EntityKind, ImportJob, ImportOperation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportJobRepository Trait
// ==========================================
// 用途: 任务配置记录的数据访问
// 实现者: ImportJobRepositoryImpl (使用 rusqlite)
#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// 新增任务配置
    async fn insert(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 整体覆盖任务配置
    ///
    /// # 返回
    /// - Err(NotFound): 任务不存在
    async fn update(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按任务标识查找
    async fn find_by_guid(&self, guid: &str) -> RepositoryResult<Option<ImportJob>>;

    /// 全部任务, 按创建时间倒序
    async fn list_all(&self) -> RepositoryResult<Vec<ImportJob>>;

    /// 指定实体类型的任务, 按创建时间倒序
    async fn list_by_kind(&self, kind: EntityKind) -> RepositoryResult<Vec<ImportJob>>;

    /// 删除任务配置 (级联删除其运行状态与坏行记录)
    ///
    /// # 返回
    /// - Ok(true): 删除了一条记录
    /// - Ok(false): 任务不存在
    async fn delete(&self, guid: &str) -> RepositoryResult<bool>;
}

// 行读取时的原始列值, 枚举与 JSON 在第二步转换
type RawJobRow = (
    String,         // guid
    String,         // name
    String,         // source_file
    String,         // entity_kind
    String,         // operation
    i64,            // max_allowed_faults
    String,         // column_delimiter
    String,         // text_qualifier
    String,         // mappings_json
    Option<String>, // catalog_guid
    Option<String>, // store_guid
    Option<String>, // warehouse_guid
    Option<String>, // dependent_guid
    String,         // created_at
    String,         // updated_at
);

const SELECT_COLUMNS: &str = "guid, name, source_file, entity_kind, operation, \
     max_allowed_faults, column_delimiter, text_qualifier, mappings_json, \
     catalog_guid, store_guid, warehouse_guid, dependent_guid, created_at, updated_at";

// ==========================================
// ImportJobRepositoryImpl
// ==========================================
pub struct ImportJobRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 复用既有连接 (与状态仓储共享同一 SQLite 连接)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJobRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
            row.get(13)?,
            row.get(14)?,
        ))
    }

    fn hydrate(raw: RawJobRow) -> RepositoryResult<ImportJob> {
        let (
            guid,
            name,
            source_file,
            kind_raw,
            op_raw,
            max_allowed_faults,
            delimiter_raw,
            qualifier_raw,
            mappings_json,
            catalog_guid,
            store_guid,
            warehouse_guid,
            dependent_guid,
            created_at,
            updated_at,
        ) = raw;

        let entity_kind =
            EntityKind::from_str(&kind_raw).ok_or_else(|| RepositoryError::FieldValueError {
                field: "entity_kind".to_string(),
                message: kind_raw.clone(),
            })?;
        let operation =
            ImportOperation::from_str(&op_raw).ok_or_else(|| RepositoryError::FieldValueError {
                field: "operation".to_string(),
                message: op_raw.clone(),
            })?;
        let mappings: Vec<ColumnMapping> = serde_json::from_str(&mappings_json)?;

        Ok(ImportJob {
            guid,
            name,
            source_file,
            entity_kind,
            operation,
            max_allowed_faults: max_allowed_faults.max(0) as u32,
            column_delimiter: delimiter_raw.chars().next().unwrap_or(','),
            text_qualifier: qualifier_raw.chars().next().unwrap_or('"'),
            mappings,
            catalog_guid,
            store_guid,
            warehouse_guid,
            dependent_guid,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ImportJobRepository for ImportJobRepositoryImpl {
    async fn insert(&self, job: &ImportJob) -> RepositoryResult<()> {
        let mappings_json = serde_json::to_string(&job.mappings)?;
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_job (
                guid, name, source_file, entity_kind, operation,
                max_allowed_faults, column_delimiter, text_qualifier, mappings_json,
                catalog_guid, store_guid, warehouse_guid, dependent_guid,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                job.guid,
                job.name,
                job.source_file,
                job.entity_kind.to_db_str(),
                job.operation.to_db_str(),
                job.max_allowed_faults,
                job.column_delimiter.to_string(),
                job.text_qualifier.to_string(),
                mappings_json,
                job.catalog_guid,
                job.store_guid,
                job.warehouse_guid,
                job.dependent_guid,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn update(&self, job: &ImportJob) -> RepositoryResult<()> {
        let mappings_json = serde_json::to_string(&job.mappings)?;
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"
            UPDATE import_job SET
                name = ?2, source_file = ?3, entity_kind = ?4, operation = ?5,
                max_allowed_faults = ?6, column_delimiter = ?7, text_qualifier = ?8,
                mappings_json = ?9, catalog_guid = ?10, store_guid = ?11,
                warehouse_guid = ?12, dependent_guid = ?13, updated_at = ?14
            WHERE guid = ?1
            "#,
            params![
                job.guid,
                job.name,
                job.source_file,
                job.entity_kind.to_db_str(),
                job.operation.to_db_str(),
                job.max_allowed_faults,
                job.column_delimiter.to_string(),
                job.text_qualifier.to_string(),
                mappings_json,
                job.catalog_guid,
                job.store_guid,
                job.warehouse_guid,
                job.dependent_guid,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJob".to_string(),
                id: job.guid.clone(),
            });
        }

        Ok(())
    }

    async fn find_by_guid(&self, guid: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;

        let raw = conn
            .query_row(
                &format!("SELECT {} FROM import_job WHERE guid = ?1", SELECT_COLUMNS),
                params![guid],
                Self::read_raw,
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(Self::hydrate(raw)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_job ORDER BY created_at DESC, guid",
            SELECT_COLUMNS
        ))?;
        let raws = stmt
            .query_map([], Self::read_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(Self::hydrate).collect()
    }

    async fn list_by_kind(&self, kind: EntityKind) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_job WHERE entity_kind = ?1 ORDER BY created_at DESC, guid",
            SELECT_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![kind.to_db_str()], Self::read_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(Self::hydrate).collect()
    }

    async fn delete(&self, guid: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM import_job WHERE guid = ?1", params![guid])?;
        Ok(affected > 0)
    }
}
