// ==========================================
// 商品目录数据导入引擎 - 应用状态
// ==========================================
// 职责: 装配共享连接、仓储、配置与导入服务
// 说明: 嵌入方 (桌面壳/REST 层/队列消费者) 持有一个 AppState
//       即可使用完整的导入子系统
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::config::ConfigManager;
use crate::db;
use crate::engine::ImportServiceImpl;
use crate::repository::{
    ImportJobRepositoryImpl, ImportStatusRepositoryImpl, SqliteCatalogStore,
};
use crate::schema::SchemaRegistry;

/// SQLite 全家桶装配出的导入服务具体类型
pub type CatalogImportService = ImportServiceImpl<
    ImportJobRepositoryImpl,
    ImportStatusRepositoryImpl,
    ConfigManager,
    SqliteCatalogStore,
>;

/// 应用状态
///
/// 包含导入服务实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配置管理器 (配置写入与元对象登记经由此句柄)
    pub config_manager: Arc<ConfigManager>,

    /// 目录实体存储 (引用数据登记经由此句柄)
    pub catalog_store: Arc<SqliteCatalogStore>,

    /// 导入服务
    pub import_service: Arc<CatalogImportService>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享数据库连接并建表 (幂等)
    /// 2. 初始化全部 Repository
    /// 3. 装配导入服务
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化 AppState, 数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::ensure_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

        let job_repo = Arc::new(ImportJobRepositoryImpl::from_connection(conn.clone()));
        let status_repo = Arc::new(ImportStatusRepositoryImpl::from_connection(conn.clone()));
        let catalog_store = Arc::new(SqliteCatalogStore::from_connection(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建 ConfigManager: {}", e))?,
        );

        let import_service = Arc::new(ImportServiceImpl::new(
            job_repo,
            status_repo,
            config_manager.clone(),
            catalog_store.clone(),
            SchemaRegistry::with_defaults(),
        ));

        tracing::info!("AppState 初始化完成");

        Ok(Self {
            db_path,
            config_manager,
            catalog_store,
            import_service,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/commerce-import-dev/commerce_import.db
/// - 生产环境: 用户数据目录/commerce-import/commerce_import.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("COMMERCE_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./commerce_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("commerce-import-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("commerce-import");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("commerce_import.db");
    }

    path.to_string_lossy().to_string()
}
