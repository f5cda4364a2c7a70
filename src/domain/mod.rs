// ==========================================
// 商品目录数据导入引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、任务与故障模型
// 红线: 不含数据访问逻辑, 不含绑定/执行逻辑
// ==========================================

pub mod entity;
pub mod fault;
pub mod job;
pub mod metadata;
pub mod types;

// 重导出核心类型
pub use entity::{
    AttributeValue, CatalogEntity, Category, Customer, InventoryQuantity, InventoryRecord,
    Product, ProductAssociation, ProductSku, SkuDimension,
};
pub use fault::{codes, Fault, FaultSink};
pub use job::{BadRow, ColumnMapping, ImportJob, ImportJobStatus};
pub use metadata::{
    AttributeDescriptor, CategoryType, MetaObject, ProductType, SkuOptionDescriptor, StoreContext,
};
pub use types::{
    AssociationKind, AvailabilityRule, CustomerStatus, EntityKind, FaultSeverity, ImportOperation,
    JobState, ReferenceKind, ValueKind,
};
