// ==========================================
// 商品目录数据导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 动态字段绑定 + 导入任务执行
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 字段模式层 - 动态字段集
pub mod schema;

// 引擎层 - 行绑定与任务执行
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    EntityKind, FaultSeverity, ImportOperation, JobState, ValueKind,
};

// 领域实体与任务对象
pub use domain::{
    BadRow, CatalogEntity, Category, Customer, Fault, FaultSink, ImportJob, ImportJobStatus,
    InventoryRecord, Product, ProductAssociation, ProductSku,
};

// 字段模式
pub use schema::{EntitySchema, ImportField, SchemaError, SchemaRegistry};

// 引擎
pub use engine::{
    EngineError, EntityStore, ImportJobRunner, ImportService, ImportServiceImpl,
    ReferenceResolver, RowBinder, RowSource,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "商品目录数据导入引擎";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================
