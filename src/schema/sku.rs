// ==========================================
// 商品目录数据导入引擎 - SKU 模式蓝图
// ==========================================
// 职责: PRODUCT_SKU 实体的字段集定义
// 元对象: ProductType (必须, 且必须是多SKU类型)
// ==========================================

use crate::domain::{
    CatalogEntity, EntityKind, ImportOperation, MetaObject, ProductSku, ProductType,
    ReferenceKind, SkuDimension, StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_sku, expect_sku_mut, format_date, is_null_value, parse_boolean, parse_date,
    validate_guid_format, BindError, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::fields::{
    attribute_fields, list_price_fields, reference_exists, sale_price_fields,
};
use crate::schema::product::dimension_field;

const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::Update,
    ImportOperation::InsertOrUpdate,
    ImportOperation::Delete,
];

/// SKU 模式蓝图
pub struct SkuBlueprint;

fn multi_sku_type(meta: Option<&MetaObject>) -> SchemaResult<&ProductType> {
    let pt = match meta {
        Some(MetaObject::ProductType(pt)) => pt,
        Some(other) => {
            return Err(SchemaError::WrongMetaObject {
                expected: "ProductType".to_string(),
                actual: other.kind_name().to_string(),
            })
        }
        None => {
            return Err(SchemaError::MissingMetaObject(
                EntityKind::ProductSku.to_db_str().to_string(),
            ))
        }
    };
    if !pt.multi_sku {
        return Err(SchemaError::NotMultiSku(pt.name.clone()));
    }
    Ok(pt)
}

impl SchemaBlueprint for SkuBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::ProductSku
    }

    fn supported_operations(&self) -> &'static [ImportOperation] {
        OPERATIONS
    }

    fn guid_field_name(&self) -> Option<&'static str> {
        Some("skuCode")
    }

    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        let pt = multi_sku_type(meta)?;
        let mut fields = Vec::new();

        // 业务标识
        fields.push(ImportField::new(
            "skuCode",
            ValueKind::Text,
            true,
            true,
            |e| Ok(expect_sku(e)?.code.clone()),
            |e, raw, _ctx| {
                validate_guid_format("skuCode", raw)?;
                expect_sku_mut(e)?.code = raw.trim().to_string();
                Ok(())
            },
        ));

        // 归属商品: 目录作用域引用, 创建时必填
        fields.push(
            ImportField::new(
                "productCode",
                ValueKind::Text,
                true,
                false,
                |e| Ok(expect_sku(e)?.product_code.clone()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Product, "productCode", raw, true)?;
                    expect_sku_mut(e)?.product_code = raw.trim().to_string();
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Product, "productCode", raw, true)
            })
            .catalog_scoped(),
        );

        // 商品类型声明的SKU选项, 每个选项一个枚举字段
        for option in &pt.sku_options {
            let name = option.key.clone();
            let read_key = option.key.clone();
            let write_key = option.key.clone();
            let write_name = option.key.clone();
            let allowed = option.values.clone();
            fields.push(ImportField::new(
                name,
                ValueKind::Enumeration,
                true,
                false,
                move |e| {
                    Ok(expect_sku(e)?
                        .option_values
                        .get(&read_key)
                        .cloned()
                        .unwrap_or_default())
                },
                move |e, raw, _ctx| {
                    let trimmed = raw.trim();
                    if !allowed.iter().any(|v| v == trimmed) {
                        return Err(BindError::bad_value(
                            &write_name,
                            raw,
                            ValueKind::Enumeration,
                        ));
                    }
                    expect_sku_mut(e)?
                        .option_values
                        .insert(write_key.clone(), trimmed.to_string());
                    Ok(())
                },
            ));
        }

        fields.push(ImportField::new(
            "enableDate",
            ValueKind::Date,
            false,
            false,
            |e| Ok(format_date(&expect_sku(e)?.enable_date)),
            |e, raw, _ctx| {
                expect_sku_mut(e)?.enable_date = parse_date("enableDate", raw)?;
                Ok(())
            },
        ));

        fields.push(
            ImportField::new(
                "disableDate",
                ValueKind::Date,
                false,
                false,
                |e| {
                    Ok(expect_sku(e)?
                        .disable_date
                        .as_ref()
                        .map(format_date)
                        .unwrap_or_default())
                },
                |e, raw, _ctx| {
                    let sku = expect_sku_mut(e)?;
                    if is_null_value(raw) {
                        sku.disable_date = None;
                    } else {
                        sku.disable_date = Some(parse_date("disableDate", raw)?);
                    }
                    Ok(())
                },
            )
            .clearing_on_null(),
        );

        fields.push(ImportField::new(
            "shippable",
            ValueKind::Boolean,
            false,
            false,
            |e| Ok(expect_sku(e)?.shippable.to_string()),
            |e, raw, _ctx| {
                expect_sku_mut(e)?.shippable = parse_boolean("shippable", raw)?;
                Ok(())
            },
        ));

        fields.push(dimension_field("weight", SkuDimension::Weight, expect_sku, expect_sku_mut));
        fields.push(dimension_field("width", SkuDimension::Width, expect_sku, expect_sku_mut));
        fields.push(dimension_field("length", SkuDimension::Length, expect_sku, expect_sku_mut));
        fields.push(dimension_field("height", SkuDimension::Height, expect_sku, expect_sku_mut));

        fields.push(ImportField::new(
            "image",
            ValueKind::Text,
            false,
            false,
            |e| Ok(expect_sku(e)?.image.clone().unwrap_or_default()),
            |e, raw, _ctx| {
                expect_sku_mut(e)?.image = Some(raw.trim().to_string());
                Ok(())
            },
        ));

        fields.extend(list_price_fields(
            ctx,
            |e| Ok(&expect_sku(e)?.list_price),
            |e| Ok(&mut expect_sku_mut(e)?.list_price),
        ));
        fields.extend(sale_price_fields(
            ctx,
            |e| Ok(&expect_sku(e)?.list_price),
            |e| Ok(&expect_sku(e)?.sale_price),
            |e| Ok(&mut expect_sku_mut(e)?.sale_price),
        ));

        fields.extend(attribute_fields(
            &pt.sku_attributes,
            ctx,
            |e| Ok(&expect_sku(e)?.attributes),
            |e| Ok(&mut expect_sku_mut(e)?.attributes),
        ));

        Ok(fields)
    }

    fn new_entity(
        &self,
        meta: Option<&MetaObject>,
        scope_guid: &str,
    ) -> SchemaResult<CatalogEntity> {
        multi_sku_type(meta)?;
        Ok(CatalogEntity::ProductSku(ProductSku::new(scope_guid)))
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{codes, SkuOptionDescriptor};
    use crate::schema::accessor::BindContext;
    use crate::schema::entity_schema::EntitySchema;
    use crate::schema::registry::tests_support::StubResolver;
    use std::sync::Arc;

    fn ctx() -> StoreContext {
        StoreContext::new(
            vec!["en".to_string()],
            "en",
            vec!["USD".to_string()],
            "USD",
        )
    }

    fn meta() -> MetaObject {
        let mut pt = ProductType::new("Shirts", true);
        pt.sku_options.push(SkuOptionDescriptor::new(
            "color",
            vec!["RED".to_string(), "BLUE".to_string()],
        ));
        pt.sku_options.push(SkuOptionDescriptor::new(
            "size",
            vec!["S".to_string(), "M".to_string(), "L".to_string()],
        ));
        MetaObject::ProductType(pt)
    }

    #[test]
    fn test_single_sku_type_is_config_error() {
        let single = MetaObject::ProductType(ProductType::new("Shoes", false));
        assert!(matches!(
            EntitySchema::init(Arc::new(SkuBlueprint), Some(single), ctx()),
            Err(SchemaError::NotMultiSku(_))
        ));
    }

    #[test]
    fn test_option_fields_are_required_enums() {
        let schema = EntitySchema::init(Arc::new(SkuBlueprint), Some(meta()), ctx()).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(&names[..4], &["skuCode", "productCode", "color", "size"]);
        assert!(schema.field("color").unwrap().is_required());
        assert_eq!(
            schema.field("color").unwrap().value_kind(),
            ValueKind::Enumeration
        );

        let mut entity = schema.new_entity("CAT-MAIN").unwrap();
        let resolver = StubResolver::with_everything();
        let bctx = BindContext::new(&resolver, "CAT-MAIN", ImportOperation::Insert);

        schema
            .field("color")
            .unwrap()
            .write(&mut entity, "RED", &bctx)
            .unwrap();
        assert_eq!(
            entity.as_sku().unwrap().option_values.get("color"),
            Some(&"RED".to_string())
        );

        match schema
            .field("color")
            .unwrap()
            .write(&mut entity, "GREEN", &bctx)
        {
            Err(BindError::Fault(fault)) => assert_eq!(fault.code, codes::BAD_VALUE),
            other => panic!("期望 BAD_VALUE 故障, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_product_reference_must_resolve() {
        let schema = EntitySchema::init(Arc::new(SkuBlueprint), Some(meta()), ctx()).unwrap();
        let mut entity = schema.new_entity("CAT-MAIN").unwrap();
        let resolver = StubResolver::with_nothing();
        let bctx = BindContext::new(&resolver, "CAT-MAIN", ImportOperation::Insert);

        match schema
            .field("productCode")
            .unwrap()
            .write(&mut entity, "P-404", &bctx)
        {
            Err(BindError::Fault(fault)) => {
                assert_eq!(fault.code, codes::UNRESOLVED_REFERENCE)
            }
            other => panic!("期望 UNRESOLVED_REFERENCE 故障, 实际 {:?}", other),
        }
    }
}
