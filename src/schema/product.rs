// ==========================================
// 商品目录数据导入引擎 - 商品模式蓝图
// ==========================================
// 职责: PRODUCT 实体的字段集定义
// 元对象: ProductType (必须)
// 说明: 单SKU商品类型会在字段集末尾并入内嵌默认SKU的字段,
//       多SKU商品的SKU走独立的 PRODUCT_SKU 模式
// ==========================================

use crate::domain::{
    AvailabilityRule, CatalogEntity, EntityKind, ImportOperation, MetaObject, Product,
    ProductSku, ProductType, ReferenceKind, SkuDimension, StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_product, expect_product_mut, format_date, is_null_value, parse_boolean, parse_date,
    parse_decimal, parse_integer, validate_guid_format, BindError, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::fields::{
    attribute_fields, list_price_fields, locale_text_fields, reference_exists, sale_price_fields,
    MAX_LOCALIZED_TEXT_LENGTH,
};

const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::Update,
    ImportOperation::InsertOrUpdate,
    ImportOperation::Delete,
];

/// 商品模式蓝图
pub struct ProductBlueprint;

fn product_type(meta: Option<&MetaObject>) -> SchemaResult<&ProductType> {
    match meta {
        Some(MetaObject::ProductType(pt)) => Ok(pt),
        Some(other) => Err(SchemaError::WrongMetaObject {
            expected: "ProductType".to_string(),
            actual: other.kind_name().to_string(),
        }),
        None => Err(SchemaError::MissingMetaObject(
            EntityKind::Product.to_db_str().to_string(),
        )),
    }
}

/// 取内嵌默认SKU; 单SKU商品在构造时就内嵌, 缺失属于数据完整性问题
fn default_sku(e: &CatalogEntity) -> Result<&ProductSku, BindError> {
    expect_product(e)?
        .default_sku
        .as_ref()
        .ok_or_else(|| BindError::Collaborator("单SKU商品缺少内嵌默认SKU".into()))
}

fn default_sku_mut(e: &mut CatalogEntity) -> Result<&mut ProductSku, BindError> {
    let product = expect_product_mut(e)?;
    let catalog = product.catalog_guid.clone();
    let code = product.code.clone();
    let sku = product
        .default_sku
        .get_or_insert_with(|| ProductSku::new(&catalog));
    if sku.product_code.is_empty() {
        sku.product_code = code;
    }
    Ok(sku)
}

/// 物流维度字段 (重量/宽/长/高), 商品内嵌SKU与独立SKU共用一套生成逻辑
pub(crate) fn dimension_field(
    name: &'static str,
    dimension: SkuDimension,
    get: fn(&CatalogEntity) -> Result<&ProductSku, BindError>,
    get_mut: fn(&mut CatalogEntity) -> Result<&mut ProductSku, BindError>,
) -> ImportField {
    ImportField::new(
        name,
        ValueKind::Decimal,
        false,
        false,
        move |e| {
            let sku = get(e)?;
            let value = match dimension {
                SkuDimension::Weight => sku.weight_kg,
                SkuDimension::Width => sku.width_cm,
                SkuDimension::Length => sku.length_cm,
                SkuDimension::Height => sku.height_cm,
            };
            Ok(value.map(|v| v.to_string()).unwrap_or_default())
        },
        move |e, raw, _ctx| {
            let value = parse_decimal(name, raw)?;
            get_mut(e)?
                .set_dimension(dimension, value)
                .map_err(|_| BindError::out_of_range(name, raw))
        },
    )
}

impl SchemaBlueprint for ProductBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::Product
    }

    fn supported_operations(&self) -> &'static [ImportOperation] {
        OPERATIONS
    }

    fn guid_field_name(&self) -> Option<&'static str> {
        Some("productCode")
    }

    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        let pt = product_type(meta)?;
        let mut fields = Vec::new();

        // 业务标识; 内嵌默认SKU存在时同步其归属商品编码
        fields.push(ImportField::new(
            "productCode",
            ValueKind::Text,
            true,
            true,
            |e| Ok(expect_product(e)?.code.clone()),
            |e, raw, _ctx| {
                validate_guid_format("productCode", raw)?;
                let product = expect_product_mut(e)?;
                product.code = raw.trim().to_string();
                if let Some(sku) = product.default_sku.as_mut() {
                    sku.product_code = product.code.clone();
                }
                Ok(())
            },
        ));

        // 默认分类: 目录作用域引用, 创建时必填
        fields.push(
            ImportField::new(
                "defaultCategoryCode",
                ValueKind::Text,
                true,
                false,
                |e| {
                    Ok(expect_product(e)?
                        .default_category_code
                        .clone()
                        .unwrap_or_default())
                },
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Category, "defaultCategoryCode", raw, true)?;
                    expect_product_mut(e)?.default_category_code = Some(raw.trim().to_string());
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Category, "defaultCategoryCode", raw, true)
            })
            .catalog_scoped(),
        );

        fields.push(
            ImportField::new(
                "brandCode",
                ValueKind::Text,
                false,
                false,
                |e| Ok(expect_product(e)?.brand_code.clone().unwrap_or_default()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Brand, "brandCode", raw, true)?;
                    expect_product_mut(e)?.brand_code = Some(raw.trim().to_string());
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Brand, "brandCode", raw, true)
            })
            .catalog_scoped(),
        );

        fields.push(ImportField::new(
            "enableDate",
            ValueKind::Date,
            false,
            false,
            |e| Ok(format_date(&expect_product(e)?.enable_date)),
            |e, raw, _ctx| {
                expect_product_mut(e)?.enable_date = parse_date("enableDate", raw)?;
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
                    Ok(expect_product(e)?
                        .disable_date
                        .as_ref()
                        .map(format_date)
                        .unwrap_or_default())
                },
                |e, raw, _ctx| {
                    let product = expect_product_mut(e)?;
                    if is_null_value(raw) {
                        product.disable_date = None;
                    } else {
                        product.disable_date = Some(parse_date("disableDate", raw)?);
                    }
                    Ok(())
                },
            )
            .clearing_on_null(),
        );

        fields.push(ImportField::new(
            "hidden",
            ValueKind::Boolean,
            false,
            false,
            |e| Ok(expect_product(e)?.hidden.to_string()),
            |e, raw, _ctx| {
                expect_product_mut(e)?.hidden = parse_boolean("hidden", raw)?;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "notSoldSeparately",
            ValueKind::Boolean,
            false,
            false,
            |e| Ok(expect_product(e)?.not_sold_separately.to_string()),
            |e, raw, _ctx| {
                expect_product_mut(e)?.not_sold_separately =
                    parse_boolean("notSoldSeparately", raw)?;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "image",
            ValueKind::Text,
            false,
            false,
            |e| Ok(expect_product(e)?.image.clone().unwrap_or_default()),
            |e, raw, _ctx| {
                expect_product_mut(e)?.image = Some(raw.trim().to_string());
                Ok(())
            },
        ));

        // 税码是全局引用数据, 不限目录作用域
        fields.push(
            ImportField::new(
                "taxCode",
                ValueKind::Text,
                false,
                false,
                |e| Ok(expect_product(e)?.tax_code.clone().unwrap_or_default()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::TaxCode, "taxCode", raw, false)?;
                    expect_product_mut(e)?.tax_code = Some(raw.trim().to_string());
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::TaxCode, "taxCode", raw, false)
            }),
        );

        fields.push(ImportField::new(
            "minOrderQty",
            ValueKind::Integer,
            false,
            false,
            |e| Ok(expect_product(e)?.min_order_qty.to_string()),
            |e, raw, _ctx| {
                let qty = parse_integer("minOrderQty", raw)?;
                expect_product_mut(e)?
                    .set_min_order_qty(qty)
                    .map_err(|_| BindError::out_of_range("minOrderQty", raw))
            },
        ));

        fields.push(ImportField::new(
            "availability",
            ValueKind::Enumeration,
            false,
            false,
            |e| Ok(expect_product(e)?.availability.to_db_str().to_string()),
            |e, raw, _ctx| {
                let rule = AvailabilityRule::from_str(raw.trim()).ok_or_else(|| {
                    BindError::bad_value("availability", raw, ValueKind::Enumeration)
                })?;
                expect_product_mut(e)?.availability = rule;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "preOrBackOrderLimit",
            ValueKind::Integer,
            false,
            false,
            |e| Ok(expect_product(e)?.pre_or_back_order_limit.to_string()),
            |e, raw, _ctx| {
                let limit = parse_integer("preOrBackOrderLimit", raw)?;
                if limit < 0 {
                    return Err(BindError::out_of_range("preOrBackOrderLimit", raw));
                }
                expect_product_mut(e)?.pre_or_back_order_limit = limit;
                Ok(())
            },
        ));

        // 展示名与 SEO 块
        fields.extend(locale_text_fields(
            "displayName",
            ctx,
            true,
            None,
            |e| Ok(&expect_product(e)?.display_name),
            |e| Ok(&mut expect_product_mut(e)?.display_name),
        ));
        fields.extend(locale_text_fields(
            "seoUrl",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_product(e)?.seo_url),
            |e| Ok(&mut expect_product_mut(e)?.seo_url),
        ));
        fields.extend(locale_text_fields(
            "seoTitle",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_product(e)?.seo_title),
            |e| Ok(&mut expect_product_mut(e)?.seo_title),
        ));
        fields.extend(locale_text_fields(
            "seoKeyWords",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_product(e)?.seo_keywords),
            |e| Ok(&mut expect_product_mut(e)?.seo_keywords),
        ));
        fields.extend(locale_text_fields(
            "seoDescription",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_product(e)?.seo_description),
            |e| Ok(&mut expect_product_mut(e)?.seo_description),
        ));

        // 价格块: 必填币种目录价必填, 促销价不得高于同币种目录价
        fields.extend(list_price_fields(
            ctx,
            |e| Ok(&expect_product(e)?.list_price),
            |e| Ok(&mut expect_product_mut(e)?.list_price),
        ));
        fields.extend(sale_price_fields(
            ctx,
            |e| Ok(&expect_product(e)?.list_price),
            |e| Ok(&expect_product(e)?.sale_price),
            |e| Ok(&mut expect_product_mut(e)?.sale_price),
        ));

        // 商品类型声明的商品属性
        fields.extend(attribute_fields(
            &pt.product_attributes,
            ctx,
            |e| Ok(&expect_product(e)?.attributes),
            |e| Ok(&mut expect_product_mut(e)?.attributes),
        ));

        // 单SKU商品: 内嵌默认SKU的字段并入商品模式
        if !pt.multi_sku {
            fields.push(ImportField::new(
                "skuCode",
                ValueKind::Text,
                true,
                false,
                |e| Ok(default_sku(e)?.code.clone()),
                |e, raw, _ctx| {
                    validate_guid_format("skuCode", raw)?;
                    default_sku_mut(e)?.code = raw.trim().to_string();
                    Ok(())
                },
            ));

            fields.push(ImportField::new(
                "shippable",
                ValueKind::Boolean,
                false,
                false,
                |e| Ok(default_sku(e)?.shippable.to_string()),
                |e, raw, _ctx| {
                    default_sku_mut(e)?.shippable = parse_boolean("shippable", raw)?;
                    Ok(())
                },
            ));

            fields.push(dimension_field("weight", SkuDimension::Weight, default_sku, default_sku_mut));
            fields.push(dimension_field("width", SkuDimension::Width, default_sku, default_sku_mut));
            fields.push(dimension_field("length", SkuDimension::Length, default_sku, default_sku_mut));
            fields.push(dimension_field("height", SkuDimension::Height, default_sku, default_sku_mut));

            fields.extend(attribute_fields(
                &pt.sku_attributes,
                ctx,
                |e| Ok(&default_sku(e)?.attributes),
                |e| Ok(&mut default_sku_mut(e)?.attributes),
            ));
        }

        Ok(fields)
    }

    fn new_entity(
        &self,
        meta: Option<&MetaObject>,
        scope_guid: &str,
    ) -> SchemaResult<CatalogEntity> {
        let pt = product_type(meta)?;
        let mut product = Product::new(scope_guid, &pt.name);
        if !pt.multi_sku {
            product.default_sku = Some(ProductSku::new(scope_guid));
        }
        Ok(CatalogEntity::Product(product))
    }
}

// ==========================================
// 单元测试
// ==========================================
