// ==========================================
// 商品目录数据导入引擎 - 模式注册表
// ==========================================
// 职责: 按实体类型选取蓝图并构建实体模式
// 说明: 六种实体类型在 with_defaults 中一次性注册;
//       任务启动时按任务的实体类型取蓝图构建私有模式实例
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{EntityKind, MetaObject, StoreContext};
use crate::schema::association::AssociationBlueprint;
use crate::schema::category::CategoryBlueprint;
use crate::schema::customer::CustomerBlueprint;
use crate::schema::entity_schema::{EntitySchema, SchemaBlueprint};
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::inventory::InventoryBlueprint;
use crate::schema::product::ProductBlueprint;
use crate::schema::sku::SkuBlueprint;

/// 模式注册表
pub struct SchemaRegistry {
    blueprints: HashMap<EntityKind, Arc<dyn SchemaBlueprint>>,
}

impl SchemaRegistry {
    /// 空注册表
    pub fn new() -> Self {
        SchemaRegistry {
            blueprints: HashMap::new(),
        }
    }

    /// 注册全部内置实体类型
    pub fn with_defaults() -> Self {
        let mut registry = SchemaRegistry::new();
        registry.register(Arc::new(CategoryBlueprint));
        registry.register(Arc::new(ProductBlueprint));
        registry.register(Arc::new(SkuBlueprint));
        registry.register(Arc::new(CustomerBlueprint));
        registry.register(Arc::new(InventoryBlueprint));
        registry.register(Arc::new(AssociationBlueprint));
        registry
    }

    /// 注册蓝图, 同类型后注册者覆盖先注册者
    pub fn register(&mut self, blueprint: Arc<dyn SchemaBlueprint>) {
        self.blueprints.insert(blueprint.kind(), blueprint);
    }

    /// 取某实体类型的蓝图
    pub fn blueprint(&self, kind: EntityKind) -> SchemaResult<Arc<dyn SchemaBlueprint>> {
        self.blueprints
            .get(&kind)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownEntityKind(kind.to_db_str().to_string()))
    }

    /// 按 (实体类型, 元对象, 门店上下文) 构建模式
    pub fn build_schema(
        &self,
        kind: EntityKind,
        meta: Option<MetaObject>,
        ctx: StoreContext,
    ) -> SchemaResult<EntitySchema> {
        let blueprint = self.blueprint(kind)?;
        EntitySchema::init(blueprint, meta, ctx)
    }

    /// 已注册的实体类型, 保持内置注册顺序
    pub fn kinds(&self) -> Vec<EntityKind> {
        EntityKind::all()
            .iter()
            .copied()
            .filter(|kind| self.blueprints.contains_key(kind))
            .collect()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        SchemaRegistry::with_defaults()
    }
}

// ==========================================
// 测试辅助
// ==========================================


// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategoryType, ProductType};

    fn ctx() -> StoreContext {
        StoreContext::minimal("en", "USD")
    }

    #[test]
    fn test_defaults_cover_all_entity_kinds() {
        let registry = SchemaRegistry::with_defaults();
        assert_eq!(registry.kinds(), EntityKind::all().to_vec());
    }

    #[test]
    fn test_build_schema_per_kind() {
        let registry = SchemaRegistry::with_defaults();

        let category = registry
            .build_schema(
                EntityKind::Category,
                Some(MetaObject::CategoryType(CategoryType::new("Default"))),
                ctx(),
            )
            .unwrap();
        assert_eq!(category.kind(), EntityKind::Category);

        let sku = registry.build_schema(
            EntityKind::ProductSku,
            Some(MetaObject::ProductType(ProductType::new("Shoes", false))),
            ctx(),
        );
        assert!(matches!(sku, Err(SchemaError::NotMultiSku(_))));

        let customer = registry
            .build_schema(EntityKind::Customer, None, ctx())
            .unwrap();
        assert_eq!(customer.guid_field_name(), "guid");
    }

    #[test]
    fn test_empty_registry_reports_unknown_kind() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.blueprint(EntityKind::Category),
            Err(SchemaError::UnknownEntityKind(_))
        ));
    }
}
