// ==========================================
// 商品目录数据导入引擎 - 运行状态仓储
// ==========================================
// 职责: import_job_status / import_bad_row 两表的数据访问
// 红线: cancel_requested 只经 request_cancellation 翻转, 常规 update 不回写
// ==========================================

use crate::db;
use crate::domain::{BadRow, Fault, ImportJobStatus, JobState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportStatusRepository Trait
// ==========================================
// 用途: 运行状态与坏行记录的数据访问
// 实现者: ImportStatusRepositoryImpl (使用 rusqlite)
#[async_trait]
pub trait ImportStatusRepository: Send + Sync {
    /// 登记一次新的运行 (状态记录以 process_id 为主键)
    async fn insert(&self, status: &ImportJobStatus) -> RepositoryResult<()>;

    /// 回写状态机与进度计数
    ///
    /// # 说明
    /// - 不更新 cancel_requested, 避免覆盖并发的取消请求
    /// - 不更新坏行明细, 坏行经 append_bad_rows 追加
    async fn update(&self, status: &ImportJobStatus) -> RepositoryResult<()>;

    /// 追加坏行明细
    ///
    /// # 返回
    /// - Ok(usize): 写入的坏行条数
    async fn append_bad_rows(&self, process_id: &str, rows: &[BadRow]) -> RepositoryResult<usize>;

    /// 按运行标识查找 (坏行明细一并装载)
    async fn find_by_process_id(&self, process_id: &str)
        -> RepositoryResult<Option<ImportJobStatus>>;

    /// 任务最近一次运行
    async fn find_latest_for_job(&self, job_guid: &str)
        -> RepositoryResult<Option<ImportJobStatus>>;

    /// 任务的全部运行记录, 最近的在前 (不装载坏行明细)
    async fn list_for_job(&self, job_guid: &str) -> RepositoryResult<Vec<ImportJobStatus>>;

    /// 请求取消一次运行
    ///
    /// # 返回
    /// - Ok(true): 标记已写入
    /// - Ok(false): 运行不存在或已进入终态
    async fn request_cancellation(&self, process_id: &str) -> RepositoryResult<bool>;

    /// 执行器轮询点: 是否有未消费的取消请求
    async fn is_cancellation_requested(&self, process_id: &str) -> RepositoryResult<bool>;

    /// 坏行明细, 按行号排序
    async fn list_bad_rows(&self, process_id: &str) -> RepositoryResult<Vec<BadRow>>;
}

const SELECT_COLUMNS: &str = "process_id, job_guid, state, started_by, total_rows, \
     current_row, failed_rows, cancel_requested, start_time, end_time, last_modified";

type RawStatusRow = (
    String,         // process_id
    String,         // job_guid
    String,         // state
    String,         // started_by
    i64,            // total_rows
    i64,            // current_row
    i64,            // failed_rows
    bool,           // cancel_requested
    Option<String>, // start_time
    Option<String>, // end_time
    String,         // last_modified
);

// ==========================================
// ImportStatusRepositoryImpl
// ==========================================
pub struct ImportStatusRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportStatusRepositoryImpl {
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

    /// 复用既有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStatusRow> {
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
        ))
    }

    fn hydrate(raw: RawStatusRow) -> RepositoryResult<ImportJobStatus> {
        let (
            process_id,
            job_guid,
            state_raw,
            started_by,
            total_rows,
            current_row,
            failed_rows,
            cancel_requested,
            start_time,
            end_time,
            last_modified,
        ) = raw;

        let state =
            JobState::from_str(&state_raw).ok_or_else(|| RepositoryError::FieldValueError {
                field: "state".to_string(),
                message: state_raw.clone(),
            })?;

        Ok(ImportJobStatus {
            process_id,
            job_guid,
            state,
            started_by,
            total_rows: total_rows.max(0) as u64,
            current_row: current_row.max(0) as u64,
            failed_rows: failed_rows.max(0) as u64,
            cancel_requested,
            start_time: start_time.as_deref().map(parse_timestamp),
            end_time: end_time.as_deref().map(parse_timestamp),
            last_modified: parse_timestamp(&last_modified),
            bad_rows: Vec::new(),
        })
    }

    fn bad_rows_with_conn(conn: &Connection, process_id: &str) -> RepositoryResult<Vec<BadRow>> {
        let mut stmt = conn.prepare(
            "SELECT row_number, raw_row, faults_json FROM import_bad_row \
             WHERE process_id = ?1 ORDER BY row_number, id",
        )?;
        let raws = stmt
            .query_map(params![process_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raws.len());
        for (row_number, raw_row, faults_json) in raws {
            let faults: Vec<Fault> = serde_json::from_str(&faults_json)?;
            rows.push(BadRow {
                row_number: row_number.max(0) as u64,
                raw_row,
                faults,
            });
        }
        Ok(rows)
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ImportStatusRepository for ImportStatusRepositoryImpl {
    async fn insert(&self, status: &ImportJobStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_job_status (
                process_id, job_guid, state, started_by, total_rows,
                current_row, failed_rows, cancel_requested, start_time, end_time, last_modified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                status.process_id,
                status.job_guid,
                status.state.to_db_str(),
                status.started_by,
                status.total_rows,
                status.current_row,
                status.failed_rows,
                status.cancel_requested,
                status.start_time.map(|dt| dt.to_rfc3339()),
                status.end_time.map(|dt| dt.to_rfc3339()),
                status.last_modified.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn update(&self, status: &ImportJobStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            r#"
            UPDATE import_job_status SET
                state = ?2, total_rows = ?3, current_row = ?4, failed_rows = ?5,
                start_time = ?6, end_time = ?7, last_modified = ?8
            WHERE process_id = ?1
            "#,
            params![
                status.process_id,
                status.state.to_db_str(),
                status.total_rows,
                status.current_row,
                status.failed_rows,
                status.start_time.map(|dt| dt.to_rfc3339()),
                status.end_time.map(|dt| dt.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJobStatus".to_string(),
                id: status.process_id.clone(),
            });
        }

        Ok(())
    }

    async fn append_bad_rows(&self, process_id: &str, rows: &[BadRow]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO import_bad_row (process_id, row_number, raw_row, faults_json) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                let faults_json = serde_json::to_string(&row.faults)?;
                stmt.execute(params![process_id, row.row_number, row.raw_row, faults_json])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    async fn find_by_process_id(
        &self,
        process_id: &str,
    ) -> RepositoryResult<Option<ImportJobStatus>> {
        let conn = self.get_conn()?;

        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_job_status WHERE process_id = ?1",
                    SELECT_COLUMNS
                ),
                params![process_id],
                Self::read_raw,
            )
            .optional()?;

        match raw {
            Some(raw) => {
                let mut status = Self::hydrate(raw)?;
                status.bad_rows = Self::bad_rows_with_conn(&conn, process_id)?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    async fn find_latest_for_job(
        &self,
        job_guid: &str,
    ) -> RepositoryResult<Option<ImportJobStatus>> {
        let conn = self.get_conn()?;

        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_job_status WHERE job_guid = ?1 \
                     ORDER BY last_modified DESC, process_id LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![job_guid],
                Self::read_raw,
            )
            .optional()?;

        match raw {
            Some(raw) => {
                let mut status = Self::hydrate(raw)?;
                status.bad_rows = Self::bad_rows_with_conn(&conn, &status.process_id)?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    async fn list_for_job(&self, job_guid: &str) -> RepositoryResult<Vec<ImportJobStatus>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_job_status WHERE job_guid = ?1 \
             ORDER BY last_modified DESC, process_id",
            SELECT_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![job_guid], Self::read_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(Self::hydrate).collect()
    }

    async fn request_cancellation(&self, process_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        // 终态运行不再接受取消
        let affected = conn.execute(
            r#"
            UPDATE import_job_status SET cancel_requested = 1, last_modified = ?2
            WHERE process_id = ?1
              AND state NOT IN ('FINISHED', 'FAILED', 'VALIDATION_FAILED', 'CANCELLED')
            "#,
            params![process_id, Utc::now().to_rfc3339()],
        )?;

        Ok(affected > 0)
    }

    async fn is_cancellation_requested(&self, process_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let flag = conn
            .query_row(
                "SELECT cancel_requested FROM import_job_status WHERE process_id = ?1",
                params![process_id],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;

        Ok(flag.unwrap_or(false))
    }

    async fn list_bad_rows(&self, process_id: &str) -> RepositoryResult<Vec<BadRow>> {
        let conn = self.get_conn()?;
        Self::bad_rows_with_conn(&conn, process_id)
    }
}
