// ==========================================
// 商品目录数据导入引擎 - 库存模式蓝图
// ==========================================
// 职责: INVENTORY 实体的字段集定义
// 元对象: 无; 以 (skuCode, 任务的仓库 guid) 定位记录
// ==========================================

use crate::domain::{
    CatalogEntity, EntityKind, ImportOperation, InventoryQuantity, InventoryRecord, MetaObject,
    ReferenceKind, StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_inventory, expect_inventory_mut, format_date, parse_date, parse_integer,
    validate_guid_format, BindError, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::fields::reference_exists;

// 库存不支持删除, 清零即下架
const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::Update,
    ImportOperation::InsertOrUpdate,
];

/// 库存模式蓝图
pub struct InventoryBlueprint;

fn reject_meta(meta: Option<&MetaObject>) -> SchemaResult<()> {
    match meta {
        None => Ok(()),
        Some(other) => Err(SchemaError::UnexpectedMetaObject {
            kind: EntityKind::Inventory.to_db_str().to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

/// 数量类整数字段, 负值由领域对象拒绝
fn quantity_field(
    name: &'static str,
    quantity: InventoryQuantity,
    required: bool,
    read: fn(&InventoryRecord) -> i64,
) -> ImportField {
    ImportField::new(
        name,
        ValueKind::Integer,
        required,
        false,
        move |e| Ok(read(expect_inventory(e)?).to_string()),
        move |e, raw, _ctx| {
            let value = parse_integer(name, raw)?;
            expect_inventory_mut(e)?
                .set_quantity(quantity, value)
                .map_err(|_| BindError::out_of_range(name, raw))
        },
    )
}

impl SchemaBlueprint for InventoryBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::Inventory
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
        _ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        reject_meta(meta)?;
        let mut fields = Vec::new();

        // 业务标识即 SKU 编码, 必须能解析到已存在的 SKU
        fields.push(
            ImportField::new(
                "skuCode",
                ValueKind::Text,
                true,
                true,
                |e| Ok(expect_inventory(e)?.sku_code.clone()),
                |e, raw, ctx| {
                    validate_guid_format("skuCode", raw)?;
                    reference_exists(ctx, ReferenceKind::ProductSku, "skuCode", raw, false)?;
                    expect_inventory_mut(e)?.sku_code = raw.trim().to_string();
                    Ok(())
                },
            )
            .with_check(|_e, raw, ctx| {
                validate_guid_format("skuCode", raw)?;
                reference_exists(ctx, ReferenceKind::ProductSku, "skuCode", raw, false)
            }),
        );

        fields.push(quantity_field(
            "quantityOnHand",
            InventoryQuantity::OnHand,
            true,
            |r| r.quantity_on_hand,
        ));
        fields.push(quantity_field(
            "reservedQuantity",
            InventoryQuantity::Reserved,
            false,
            |r| r.reserved_quantity,
        ));
        fields.push(quantity_field(
            "reorderMinimum",
            InventoryQuantity::ReorderMinimum,
            false,
            |r| r.reorder_minimum,
        ));
        fields.push(quantity_field(
            "reorderQuantity",
            InventoryQuantity::ReorderQuantity,
            false,
            |r| r.reorder_quantity,
        ));

        fields.push(ImportField::new(
            "restockDate",
            ValueKind::Date,
            false,
            false,
            |e| {
                Ok(expect_inventory(e)?
                    .restock_date
                    .as_ref()
                    .map(format_date)
                    .unwrap_or_default())
            },
            |e, raw, _ctx| {
                expect_inventory_mut(e)?.restock_date = Some(parse_date("restockDate", raw)?);
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
        Ok(CatalogEntity::Inventory(InventoryRecord::new(scope_guid)))
    }
}

// ==========================================
// 单元测试
// ==========================================
