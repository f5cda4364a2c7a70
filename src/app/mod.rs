// ==========================================
// 商品目录数据导入引擎 - 应用层
// ==========================================
// 职责: 面向嵌入方的装配入口
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, CatalogImportService};
