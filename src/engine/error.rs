// ==========================================
// 商品目录数据导入引擎 - 引擎层错误类型
// ==========================================
// 依据: Rust 错误处理最佳实践
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

use crate::domain::{EntityKind, JobState};
use crate::engine::contracts::CollaboratorError;
use crate::schema::SchemaError;

/// 引擎层错误类型
///
/// 行级数据故障不走这里 (那是坏行记录的事);
/// 这里只收导致任务直接失败或无法启动的错误
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 任务状态机 =====
    #[error("非法状态迁移: {from} -> {to}")]
    InvalidStateTransition { from: JobState, to: JobState },

    #[error("任务不存在: {0}")]
    JobNotFound(String),

    #[error("执行状态不存在: {0}")]
    StatusNotFound(String),

    // ===== 任务配置 =====
    #[error("模式配置错误: {0}")]
    Schema(#[from] SchemaError),

    #[error("任务缺少必需的作用域标识: {0}")]
    MissingScope(String),

    #[error("元对象未登记: {0}")]
    MetaObjectNotFound(String),

    #[error("实体变体与模式不匹配: 期望 {expected}, 实际 {actual}")]
    EntityMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },

    // ===== 文件与行来源 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0} (仅支持 .csv/.xlsx)")]
    UnsupportedFormat(String),

    #[error("行来源错误: {0}")]
    RowSource(String),

    // ===== 协作方与仓储 =====
    #[error("协作方错误: {0}")]
    Collaborator(String),

    #[error("仓储错误: {0}")]
    Repository(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CollaboratorError> for EngineError {
    fn from(e: CollaboratorError) -> Self {
        EngineError::Collaborator(e.to_string())
    }
}

impl From<crate::repository::RepositoryError> for EngineError {
    fn from(e: crate::repository::RepositoryError) -> Self {
        EngineError::Repository(e.to_string())
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
