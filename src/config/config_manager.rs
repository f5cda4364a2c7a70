// ==========================================
// 商品目录数据导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理与元对象登记
// 存储: config_scope + config_kv 表 (key-value, 门店覆写全局)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::{CategoryType, ProductType, StoreContext};
use crate::engine::CollaboratorError;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 全局作用域在 config_scope 表中的固定主键
const GLOBAL_SCOPE_ID: &str = "global";

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
// 门店作用域的值覆写全局值; 读取顺序固定为 门店 -> 全局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Store { store_guid: String },
}

impl ConfigScope {
    pub fn store(store_guid: &str) -> Self {
        ConfigScope::Store {
            store_guid: store_guid.to_string(),
        }
    }

    /// config_scope 表的主键形态
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => GLOBAL_SCOPE_ID.to_string(),
            ConfigScope::Store { store_guid } => format!("store:{}", store_guid),
        }
    }

    pub fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Store { .. } => "STORE",
        }
    }

    pub fn scope_key(&self) -> &str {
        match self {
            ConfigScope::Global => GLOBAL_SCOPE_ID,
            ConfigScope::Store { store_guid } => store_guid,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, CollaboratorError> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, CollaboratorError> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取指定作用域的配置值
    ///
    /// # 参数
    /// - scope_id: 作用域主键 (ConfigScope::scope_id)
    /// - key: 配置键
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_value(&self, scope_id: &str, key: &str) -> Result<Option<String>, CollaboratorError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![scope_id, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global 作用域的配置值（公开方法，供嵌入方复用）
    pub fn get_global_value(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        self.get_value(GLOBAL_SCOPE_ID, key)
    }

    /// 按 门店 -> 全局 的顺序读取配置值
    ///
    /// # 参数
    /// - store_guid: 门店标识; None 时只查全局
    fn get_scoped_value(
        &self,
        store_guid: Option<&str>,
        key: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        if let Some(guid) = store_guid {
            let scope_id = ConfigScope::store(guid).scope_id();
            if let Some(value) = self.get_value(&scope_id, key)? {
                return Ok(Some(value));
            }
        }
        self.get_value(GLOBAL_SCOPE_ID, key)
    }

    /// 读取配置值, 门店覆写全局, 都不存在取默认值
    fn get_scoped_or_default(
        &self,
        store_guid: Option<&str>,
        key: &str,
        default: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(self
            .get_scoped_value(store_guid, key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取逗号分隔的列表配置 (去空白, 丢弃空项)
    ///
    /// 解析结果为空时回退到默认串的解析结果
    fn get_scoped_list(
        &self,
        store_guid: Option<&str>,
        key: &str,
        default: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        let value = self.get_scoped_or_default(store_guid, key, default)?;
        let items = Self::parse_list(&value);

        if items.is_empty() {
            Ok(Self::parse_list(default))
        } else {
            Ok(items)
        }
    }

    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// 写入配置值 (UPSERT; 门店作用域自动登记 config_scope 行)
    ///
    /// # 参数
    /// - scope: 目标作用域
    /// - key: 配置键
    /// - value: 配置值
    pub fn set_value(
        &self,
        scope: &ConfigScope,
        key: &str,
        value: &str,
    ) -> Result<(), CollaboratorError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let scope_id = scope.scope_id();

        if !matches!(scope, ConfigScope::Global) {
            conn.execute(
                "INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
                 VALUES (?1, ?2, ?3)",
                params![scope_id, scope.scope_type(), scope.scope_key()],
            )?;
        }

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope_id, key, value],
        )?;

        Ok(())
    }

    /// 写入 global 作用域的配置值
    pub fn set_global_value(&self, key: &str, value: &str) -> Result<(), CollaboratorError> {
        self.set_value(&ConfigScope::Global, key, value)
    }

    // ===== 元对象登记 =====

    /// 登记分类类型 (存储于 config_kv: category_type/{name}, JSON)
    ///
    /// # 说明
    /// 同名重复登记整体覆盖原定义
    pub fn register_category_type(&self, category_type: &CategoryType) -> Result<(), CollaboratorError> {
        let key = format!("{}{}", config_keys::CATEGORY_TYPE_PREFIX, category_type.name);
        let json = serde_json::to_string(category_type)?;
        self.set_global_value(&key, &json)
    }

    /// 登记商品类型 (存储于 config_kv: product_type/{name}, JSON)
    pub fn register_product_type(&self, product_type: &ProductType) -> Result<(), CollaboratorError> {
        let key = format!("{}{}", config_keys::PRODUCT_TYPE_PREFIX, product_type.name);
        let json = serde_json::to_string(product_type)?;
        self.set_global_value(&key, &json)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    // ===== 门店上下文配置 =====

    async fn get_store_context(
        &self,
        store_guid: Option<&str>,
    ) -> Result<StoreContext, CollaboratorError> {
        let mut supported_locales =
            self.get_scoped_list(store_guid, config_keys::SUPPORTED_LOCALES, "en")?;
        let required_locale =
            self.get_scoped_or_default(store_guid, config_keys::REQUIRED_LOCALE, "en")?;
        let mut supported_currencies =
            self.get_scoped_list(store_guid, config_keys::SUPPORTED_CURRENCIES, "USD")?;
        let required_currency =
            self.get_scoped_or_default(store_guid, config_keys::REQUIRED_CURRENCY, "USD")?;

        // 必填语言/币种必须出现在支持集合中, 否则模式不会产出必填字段
        if !supported_locales.contains(&required_locale) {
            supported_locales.insert(0, required_locale.clone());
        }
        if !supported_currencies.contains(&required_currency) {
            supported_currencies.insert(0, required_currency.clone());
        }

        Ok(StoreContext::new(
            supported_locales,
            &required_locale,
            supported_currencies,
            &required_currency,
        ))
    }

    // ===== 任务默认值配置 =====

    async fn get_default_max_allowed_faults(&self) -> Result<u32, CollaboratorError> {
        let value =
            self.get_scoped_or_default(None, config_keys::DEFAULT_MAX_ALLOWED_FAULTS, "0")?;
        Ok(value.parse::<u32>().unwrap_or(0))
    }

    // ===== 元对象登记表 =====

    async fn get_category_type(
        &self,
        name: &str,
    ) -> Result<Option<CategoryType>, CollaboratorError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let key = format!("{}{}", config_keys::CATEGORY_TYPE_PREFIX, trimmed);
        let raw = match self.get_global_value(&key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let category_type: CategoryType = serde_json::from_str(&raw)?;
        Ok(Some(category_type))
    }

    async fn get_product_type(&self, name: &str) -> Result<Option<ProductType>, CollaboratorError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let key = format!("{}{}", config_keys::PRODUCT_TYPE_PREFIX, trimmed);
        let raw = match self.get_global_value(&key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let product_type: ProductType = serde_json::from_str(&raw)?;
        Ok(Some(product_type))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 门店上下文
    pub const SUPPORTED_LOCALES: &str = "supported_locales";
    pub const REQUIRED_LOCALE: &str = "required_locale";
    pub const SUPPORTED_CURRENCIES: &str = "supported_currencies";
    pub const REQUIRED_CURRENCY: &str = "required_currency";

    // 任务默认值
    pub const DEFAULT_MAX_ALLOWED_FAULTS: &str = "default_max_allowed_faults";

    // 元对象登记 (值为 JSON, 键为 前缀 + 名称)
    pub const CATEGORY_TYPE_PREFIX: &str = "category_type/";
    pub const PRODUCT_TYPE_PREFIX: &str = "product_type/";
}
