// ==========================================
// 商品目录数据导入引擎 - 客户模式蓝图
// ==========================================
// 职责: CUSTOMER 实体的字段集定义
// 元对象: 无 (传入即配置错误); 作用域为任务的门店 guid
// ==========================================

use crate::domain::{
    CatalogEntity, Customer, CustomerStatus, EntityKind, ImportOperation, MetaObject,
    StoreContext, ValueKind,
};
use crate::schema::accessor::{
    expect_customer, expect_customer_mut, format_date, parse_date, validate_guid_format,
    validate_text_length, BindError, ImportField,
};
use crate::schema::entity_schema::SchemaBlueprint;
use crate::schema::error::{SchemaError, SchemaResult};

const OPERATIONS: &[ImportOperation] = &[
    ImportOperation::Insert,
    ImportOperation::Update,
    ImportOperation::InsertOrUpdate,
    ImportOperation::Delete,
];

/// 联系方式类文本的长度上限
const MAX_CONTACT_LENGTH: usize = 255;

/// 客户模式蓝图
pub struct CustomerBlueprint;

fn reject_meta(meta: Option<&MetaObject>) -> SchemaResult<()> {
    match meta {
        None => Ok(()),
        Some(other) => Err(SchemaError::UnexpectedMetaObject {
            kind: EntityKind::Customer.to_db_str().to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

/// 可选文本字段的通用生成 (客户模式里反复出现)
fn optional_text_field(
    name: &'static str,
    max_len: Option<usize>,
    get: fn(&CatalogEntity) -> Result<&Option<String>, BindError>,
    get_mut: fn(&mut CatalogEntity) -> Result<&mut Option<String>, BindError>,
) -> ImportField {
    ImportField::new(
        name,
        ValueKind::Text,
        false,
        false,
        move |e| Ok(get(e)?.clone().unwrap_or_default()),
        move |e, raw, _ctx| {
            if let Some(max) = max_len {
                validate_text_length(name, raw, max)?;
            }
            *get_mut(e)? = Some(raw.trim().to_string());
            Ok(())
        },
    )
}

impl SchemaBlueprint for CustomerBlueprint {
    fn kind(&self) -> EntityKind {
        EntityKind::Customer
    }

    fn supported_operations(&self) -> &'static [ImportOperation] {
        OPERATIONS
    }

    fn guid_field_name(&self) -> Option<&'static str> {
        Some("guid")
    }

    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        _ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>> {
        reject_meta(meta)?;
        let mut fields = Vec::new();

        fields.push(ImportField::new(
            "guid",
            ValueKind::Text,
            true,
            true,
            |e| Ok(expect_customer(e)?.guid.clone()),
            |e, raw, _ctx| {
                validate_guid_format("guid", raw)?;
                expect_customer_mut(e)?.guid = raw.trim().to_string();
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "userId",
            ValueKind::Text,
            true,
            false,
            |e| Ok(expect_customer(e)?.user_id.clone()),
            |e, raw, _ctx| {
                validate_text_length("userId", raw, MAX_CONTACT_LENGTH)?;
                expect_customer_mut(e)?.user_id = raw.trim().to_string();
                Ok(())
            },
        ));

        fields.push(optional_text_field(
            "email",
            Some(MAX_CONTACT_LENGTH),
            |e| Ok(&expect_customer(e)?.email),
            |e| Ok(&mut expect_customer_mut(e)?.email),
        ));
        fields.push(optional_text_field(
            "firstName",
            None,
            |e| Ok(&expect_customer(e)?.first_name),
            |e| Ok(&mut expect_customer_mut(e)?.first_name),
        ));
        fields.push(optional_text_field(
            "lastName",
            None,
            |e| Ok(&expect_customer(e)?.last_name),
            |e| Ok(&mut expect_customer_mut(e)?.last_name),
        ));
        fields.push(optional_text_field(
            "phoneNumber",
            Some(MAX_CONTACT_LENGTH),
            |e| Ok(&expect_customer(e)?.phone_number),
            |e| Ok(&mut expect_customer_mut(e)?.phone_number),
        ));

        fields.push(ImportField::new(
            "status",
            ValueKind::Enumeration,
            false,
            false,
            |e| Ok(expect_customer(e)?.status.to_db_str().to_string()),
            |e, raw, _ctx| {
                let status = CustomerStatus::from_str(raw.trim()).ok_or_else(|| {
                    BindError::bad_value("status", raw, ValueKind::Enumeration)
                })?;
                expect_customer_mut(e)?.status = status;
                Ok(())
            },
        ));

        fields.push(ImportField::new(
            "creationDate",
            ValueKind::Date,
            false,
            false,
            |e| Ok(format_date(&expect_customer(e)?.creation_date)),
            |e, raw, _ctx| {
                expect_customer_mut(e)?.creation_date = parse_date("creationDate", raw)?;
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
        Ok(CatalogEntity::Customer(Customer::new(scope_guid)))
    }
}

// ==========================================
// 单元测试
// ==========================================
