// ==========================================
// 商品目录数据导入引擎 - 字段模式层
// ==========================================
// 职责: 字段访问器、实体模式与模式注册表
// 红线: 模式层不落库不读文件; 行级故障与配置错误严格分流
// ==========================================

pub mod accessor;
pub mod association;
pub mod category;
pub mod customer;
pub mod entity_schema;
pub mod error;
pub(crate) mod fields;
pub mod inventory;
pub mod product;
pub mod registry;
pub mod sku;

// 重导出核心类型
pub use accessor::{
    format_date, is_null_value, parse_boolean, parse_date, parse_decimal, parse_integer,
    BindContext, BindError, ImportField,
};
pub use association::AssociationBlueprint;
pub use category::CategoryBlueprint;
pub use customer::CustomerBlueprint;
pub use entity_schema::{EntitySchema, SchemaBlueprint};
pub use error::{SchemaError, SchemaResult};
pub use inventory::InventoryBlueprint;
pub use product::ProductBlueprint;
pub use registry::SchemaRegistry;
pub use sku::SkuBlueprint;
