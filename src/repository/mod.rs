// ==========================================
// 商品目录数据导入引擎 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod catalog_store;
pub mod error;
pub mod job_repo;
pub mod status_repo;

// 重导出核心仓储
pub use catalog_store::SqliteCatalogStore;
pub use error::{RepositoryError, RepositoryResult};
pub use job_repo::{ImportJobRepository, ImportJobRepositoryImpl};
pub use status_repo::{ImportStatusRepository, ImportStatusRepositoryImpl};
