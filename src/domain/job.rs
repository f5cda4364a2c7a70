// ==========================================
// 商品目录数据导入引擎 - 导入任务与运行状态
// ==========================================
// 职责: 任务配置记录 / 运行状态记录 / 坏行记录
// 红线: leftRows 与 succeededRows 一律派生, 不落库不独立存储
// ==========================================

use crate::domain::fault::Fault;
use crate::domain::types::{EntityKind, ImportOperation, JobState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// ColumnMapping - 列映射
// ==========================================
// 字段名到 0 基列号的映射, 同一字段只允许映射一列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub field_name: String,
    pub column_index: usize,
}

impl ColumnMapping {
    pub fn new(field_name: &str, column_index: usize) -> Self {
        Self {
            field_name: field_name.to_string(),
            column_index,
        }
    }
}

// ==========================================
// ImportJob - 任务配置记录 (持久化)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub guid: String,
    pub name: String,
    pub source_file: String,
    pub entity_kind: EntityKind,
    pub operation: ImportOperation,
    /// 0 表示零容忍: 第一条 error 级坏行即超限
    pub max_allowed_faults: u32,
    pub column_delimiter: char,
    pub text_qualifier: char,
    pub mappings: Vec<ColumnMapping>,
    pub catalog_guid: Option<String>,
    pub store_guid: Option<String>,
    pub warehouse_guid: Option<String>,
    pub dependent_guid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(name: &str, source_file: &str, kind: EntityKind, operation: ImportOperation) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            source_file: source_file.to_string(),
            entity_kind: kind,
            operation,
            max_allowed_faults: 0,
            column_delimiter: ',',
            text_qualifier: '"',
            mappings: Vec::new(),
            catalog_guid: None,
            store_guid: None,
            warehouse_guid: None,
            dependent_guid: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 追加一条列映射
    pub fn map_column(mut self, field_name: &str, column_index: usize) -> Self {
        self.mappings.push(ColumnMapping::new(field_name, column_index));
        self
    }

    /// 查找字段对应的列号
    pub fn column_of(&self, field_name: &str) -> Option<usize> {
        self.mappings
            .iter()
            .find(|m| m.field_name == field_name)
            .map(|m| m.column_index)
    }

    /// 实体类型对应的作用域标识 (目录/门店/仓库), 未配置时为空串
    pub fn scope_guid(&self) -> &str {
        let scope = match self.entity_kind {
            EntityKind::Category
            | EntityKind::Product
            | EntityKind::ProductSku
            | EntityKind::ProductAssociation => &self.catalog_guid,
            EntityKind::Customer => &self.store_guid,
            EntityKind::Inventory => &self.warehouse_guid,
        };
        scope.as_deref().unwrap_or("")
    }
}

// ==========================================
// BadRow - 坏行记录
// ==========================================
// 原始行文本仅用于诊断展示, 不参与任何计算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadRow {
    pub row_number: u64,
    pub raw_row: String,
    pub faults: Vec<Fault>,
}

impl BadRow {
    pub fn new(row_number: u64, raw_row: &str, faults: Vec<Fault>) -> Self {
        Self {
            row_number,
            raw_row: raw_row.to_string(),
            faults,
        }
    }

    /// 含 error 级故障的行计入失败行
    pub fn has_error(&self) -> bool {
        self.faults.iter().any(Fault::is_error)
    }
}

// ==========================================
// ImportJobStatus - 运行状态记录 (持久化)
// ==========================================
// 终态后只读, 留存审计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJobStatus {
    pub process_id: String,
    pub job_guid: String,
    pub state: JobState,
    pub started_by: String,
    pub total_rows: u64,
    pub current_row: u64,
    pub failed_rows: u64,
    pub cancel_requested: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub bad_rows: Vec<BadRow>,
}

impl ImportJobStatus {
    pub fn new(job_guid: &str, started_by: &str) -> Self {
        Self {
            process_id: Uuid::new_v4().to_string(),
            job_guid: job_guid.to_string(),
            state: JobState::QueuedForValidation,
            started_by: started_by.to_string(),
            total_rows: 0,
            current_row: 0,
            failed_rows: 0,
            cancel_requested: false,
            start_time: None,
            end_time: None,
            last_modified: Utc::now(),
            bad_rows: Vec::new(),
        }
    }

    /// 剩余行数 (派生值)
    pub fn left_rows(&self) -> u64 {
        self.total_rows.saturating_sub(self.current_row)
    }

    /// 成功行数 (派生值, 约定 failed_rows <= current_row)
    pub fn succeeded_rows(&self) -> u64 {
        self.current_row.saturating_sub(self.failed_rows)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
