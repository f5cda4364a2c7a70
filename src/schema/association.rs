// ==========================================
// 商品目录数据导入引擎 - 商品关联模式蓝图
// ==========================================
// 职责: PRODUCT_ASSOCIATION 实体的字段集定义
// 元对象: 无; 纯值对象导入, 没有业务标识字段
// ==========================================

use crate::domain::{
    AssociationKind, CatalogEntity, EntityKind, ImportOperation, MetaObject, ProductAssociation,
    ReferenceKind, StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_association, expect_association_mut, parse_integer, BindError, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::fields::reference_exists;

// 关联只能整组重建或追加, 不支持按行更新/删除
const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::ClearThenInsert,
];

/// 商品关联模式蓝图
pub struct AssociationBlueprint;

fn reject_meta(meta: Option<&MetaObject>) -> SchemaResult<()> {
    match meta {
        None => Ok(()),
        Some(other) => Err(SchemaError::UnexpectedMetaObject {
            kind: EntityKind::ProductAssociation.to_db_str().to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

impl SchemaBlueprint for AssociationBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::ProductAssociation
    }

    fn supported_operations(&self) -> &'static [ImportOperation] {
        OPERATIONS
    }

    fn guid_field_name(&self) -> Option<&'static str> {
        None
    }

    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        _ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        reject_meta(meta)?;
        let mut fields = Vec::new();

        fields.push(
            ImportField::new(
                "sourceProductCode",
                ValueKind::Text,
                true,
                false,
                |e| Ok(expect_association(e)?.source_product_code.clone()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Product, "sourceProductCode", raw, true)?;
                    expect_association_mut(e)?.source_product_code = raw.trim().to_string();
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Product, "sourceProductCode", raw, true)
            })
            .catalog_scoped(),
        );

        fields.push(
            ImportField::new(
                "targetProductCode",
                ValueKind::Text,
                true,
                false,
                |e| Ok(expect_association(e)?.target_product_code.clone()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Product, "targetProductCode", raw, true)?;
                    expect_association_mut(e)?.target_product_code = raw.trim().to_string();
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Product, "targetProductCode", raw, true)
            })
            .catalog_scoped(),
        );

        fields.push(ImportField::new(
            "associationType",
            ValueKind::Enumeration,
            true,
            false,
            |e| Ok(expect_association(e)?.kind.to_db_str().to_string()),
            |e, raw, _ctx| {
                let kind = AssociationKind::from_str(raw.trim()).ok_or_else(|| {
                    BindError::bad_value("associationType", raw, ValueKind::Enumeration)
                })?;
                expect_association_mut(e)?.kind = kind;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "defaultQuantity",
            ValueKind::Integer,
            false,
            false,
            |e| Ok(expect_association(e)?.default_quantity.to_string()),
            |e, raw, _ctx| {
                let qty = parse_integer("defaultQuantity", raw)?;
                expect_association_mut(e)?
                    .set_default_quantity(qty)
                    .map_err(|_| BindError::out_of_range("defaultQuantity", raw))
            },
        ));

        fields.push(ImportField::new(
            "ordering",
            ValueKind::Integer,
            false,
            false,
            |e| Ok(expect_association(e)?.ordering.to_string()),
            |e, raw, _ctx| {
                expect_association_mut(e)?.ordering = parse_integer("ordering", raw)?;
                Ok(())
            },
        ));

        Ok(fields)
    }

    fn new_entity(
        &self,
        meta: Option<&MetaObject>,
        scope_guid: &str,
    ) -> SchemaResult<CatalogEntity> {
        reject_meta(meta)?;
        Ok(CatalogEntity::ProductAssociation(ProductAssociation::new(
            scope_guid,
        )))
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codes;
    use crate::schema::accessor::BindContext;
    use crate::schema::entity_schema::EntitySchema;
    use crate::schema::registry::tests_support::StubResolver;
    use std::sync::Arc;

    fn schema() -> EntitySchema {
        EntitySchema::init(
            Arc::new(AssociationBlueprint),
            None,
            StoreContext::minimal("en", "USD"),
        )
        .unwrap()
    }

    #[test]
    fn test_value_object_has_no_guid_field() {
        let schema = schema();
        assert_eq!(schema.guid_field_name(), "");
        assert!(schema.guid_field().is_none());
        assert!(schema.supports(ImportOperation::ClearThenInsert));
        assert!(!schema.supports(ImportOperation::Update));
        assert!(!schema.supports(ImportOperation::Delete));
    }

    #[test]
    fn test_association_type_parsing() {
        let schema = schema();
        let mut entity = schema.new_entity("CAT-MAIN").unwrap();
        let resolver = StubResolver::with_everything();
        let bctx = BindContext::new(&resolver, "CAT-MAIN", ImportOperation::Insert);

        schema
            .field("associationType")
            .unwrap()
            .write(&mut entity, "UP_SELL", &bctx)
            .unwrap();
        assert_eq!(
            entity.as_association().unwrap().kind,
            AssociationKind::UpSell
        );

        match schema
            .field("associationType")
            .unwrap()
            .write(&mut entity, "BUNDLE", &bctx)
        {
            Err(BindError::Fault(fault)) => assert_eq!(fault.code, codes::BAD_VALUE),
            other => panic!("期望 BAD_VALUE 故障, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_default_quantity_minimum() {
        let schema = schema();
        let mut entity = schema.new_entity("CAT-MAIN").unwrap();
        let resolver = StubResolver::with_everything();
        let bctx = BindContext::new(&resolver, "CAT-MAIN", ImportOperation::Insert);

        schema
            .field("defaultQuantity")
            .unwrap()
            .write(&mut entity, "2", &bctx)
            .unwrap();
        assert_eq!(entity.as_association().unwrap().default_quantity, 2);

        match schema
            .field("defaultQuantity")
            .unwrap()
            .write(&mut entity, "0", &bctx)
        {
            Err(BindError::Fault(fault)) => assert_eq!(fault.code, codes::OUT_OF_RANGE),
            other => panic!("期望 OUT_OF_RANGE 故障, 实际 {:?}", other),
        }
    }
}
