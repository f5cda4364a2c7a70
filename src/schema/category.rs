// ==========================================
// 商品目录数据导入引擎 - 分类模式蓝图
// ==========================================
// 职责: CATEGORY 实体的字段集定义
// 元对象: CategoryType (必须)
// ==========================================

use crate::domain::{
    CatalogEntity, Category, CategoryType, EntityKind, ImportOperation, MetaObject,
    ReferenceKind, StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_category, expect_category_mut, format_date, is_null_value, parse_date, parse_integer,
    parse_boolean, validate_guid_format, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::fields::{
    attribute_fields, locale_text_fields, reference_exists, MAX_LOCALIZED_TEXT_LENGTH,
};

const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::Update,
    ImportOperation::InsertOrUpdate,
    ImportOperation::Delete,
];

/// 分类模式蓝图
pub struct CategoryBlueprint;

fn category_type(meta: Option<&MetaObject>) -> SchemaResult<&CategoryType> {
    match meta {
        Some(MetaObject::CategoryType(ct)) => Ok(ct),
        Some(other) => Err(SchemaError::WrongMetaObject {
            expected: "CategoryType".to_string(),
            actual: other.kind_name().to_string(),
        }),
        None => Err(SchemaError::MissingMetaObject(
            EntityKind::Category.to_db_str().to_string(),
        )),
    }
}

impl SchemaBlueprint for CategoryBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::Category
    }

    fn supported_operations(&self) -> &'static [ImportOperation] {
        OPERATIONS
    }

    fn guid_field_name(&self) -> Option<&'static str> {
        Some("categoryCode")
    }

    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        let ct = category_type(meta)?;
        let mut fields = Vec::new();

        // 业务标识
        fields.push(ImportField::new(
            "categoryCode",
            ValueKind::Text,
            true,
            true,
            |e| Ok(expect_category(e)?.code.clone()),
            |e, raw, _ctx| {
                validate_guid_format("categoryCode", raw)?;
                expect_category_mut(e)?.code = raw.trim().to_string();
                Ok(())
            },
        ));

        // 父分类: 目录作用域引用, 空值保持现父不变
        fields.push(
            ImportField::new(
                "parentCategoryCode",
                ValueKind::Text,
                false,
                false,
                |e| Ok(expect_category(e)?.parent_code.clone().unwrap_or_default()),
                |e, raw, ctx| {
                    reference_exists(ctx, ReferenceKind::Category, "parentCategoryCode", raw, true)?;
                    expect_category_mut(e)?.parent_code = Some(raw.trim().to_string());
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                reference_exists(ctx, ReferenceKind::Category, "parentCategoryCode", raw, true)
            })
            .catalog_scoped(),
        );

        fields.push(ImportField::new(
            "enableDate",
            ValueKind::Date,
            false,
            false,
            |e| Ok(format_date(&expect_category(e)?.enable_date)),
            |e, raw, _ctx| {
                expect_category_mut(e)?.enable_date = parse_date("enableDate", raw)?;
                Ok(())
            },
        ));

        // 停用日期是唯一空值表示显式清空的字段
        fields.push(
            ImportField::new(
                "disableDate",
                ValueKind::Date,
                false,
                false,
                |e| {
                    Ok(expect_category(e)?
                        .disable_date
                        .as_ref()
                        .map(format_date)
                        .unwrap_or_default())
                },
                |e, raw, _ctx| {
                    let category = expect_category_mut(e)?;
                    if is_null_value(raw) {
                        category.disable_date = None;
                    } else {
                        category.disable_date = Some(parse_date("disableDate", raw)?);
                    }
                    Ok(())
                },
            )
            .clearing_on_null(),
        );

        fields.push(ImportField::new(
            "storeVisible",
            ValueKind::Boolean,
            false,
            false,
            |e| Ok(expect_category(e)?.store_visible.to_string()),
            |e, raw, _ctx| {
                expect_category_mut(e)?.store_visible = parse_boolean("storeVisible", raw)?;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "ordering",
            ValueKind::Integer,
            false,
            false,
            |e| Ok(expect_category(e)?.ordering.to_string()),
            |e, raw, _ctx| {
                expect_category_mut(e)?.ordering = parse_integer("ordering", raw)?;
                Ok(())
            },
        ));

        // 展示名: 必填语言上必填
        fields.extend(locale_text_fields(
            "displayName",
            ctx,
            true,
            None,
            |e| Ok(&expect_category(e)?.display_name),
            |e| Ok(&mut expect_category_mut(e)?.display_name),
        ));

        // SEO 块: 全部可选, 长度 255 上限
        fields.extend(locale_text_fields(
            "seoUrl",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_category(e)?.seo_url),
            |e| Ok(&mut expect_category_mut(e)?.seo_url),
        ));
        fields.extend(locale_text_fields(
            "seoTitle",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_category(e)?.seo_title),
            |e| Ok(&mut expect_category_mut(e)?.seo_title),
        ));
        fields.extend(locale_text_fields(
            "seoKeyWords",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_category(e)?.seo_keywords),
            |e| Ok(&mut expect_category_mut(e)?.seo_keywords),
        ));
        fields.extend(locale_text_fields(
            "seoDescription",
            ctx,
            false,
            Some(MAX_LOCALIZED_TEXT_LENGTH),
            |e| Ok(&expect_category(e)?.seo_description),
            |e| Ok(&mut expect_category_mut(e)?.seo_description),
        ));

        // 分类类型声明的动态属性
        fields.extend(attribute_fields(
            &ct.attributes,
            ctx,
            |e| Ok(&expect_category(e)?.attributes),
            |e| Ok(&mut expect_category_mut(e)?.attributes),
        ));

        Ok(fields)
    }

    fn new_entity(
        &self,
        meta: Option<&MetaObject>,
        scope_guid: &str,
    ) -> SchemaResult<CatalogEntity> {
        let ct = category_type(meta)?;
        Ok(CatalogEntity::Category(Category::new(scope_guid, &ct.name)))
    }
}

// ==========================================
// 单元测试
// ==========================================
