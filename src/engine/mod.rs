// ==========================================
// 商品目录数据导入引擎 - 引擎层
// ==========================================
// 职责: 行绑定、行来源、任务执行与导入服务门面
// 红线: 引擎不拼 SQL, 所有数据访问经由协作方接口与仓储
// ==========================================

pub mod contracts;
pub mod error;
pub mod import_service;
pub mod job_runner;
pub mod row_binder;
pub mod row_source;

// 重导出核心引擎
pub use contracts::{CollaboratorError, EntityStore, ReferenceResolver};
pub use error::{EngineError, EngineResult};
pub use import_service::{ImportService, ImportServiceImpl};
pub use job_runner::{ImportJobRunner, MAX_RECORDED_BAD_ROWS};
pub use row_binder::{BindOutcome, RowBinder};
pub use row_source::{open_row_source, CsvRowSource, ExcelRowSource, RowSource, SourceRow};
