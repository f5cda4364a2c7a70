// ==========================================
// 商品目录数据导入引擎 - 展开式字段生成
// ==========================================
// 职责: 语言/币种/属性三类按上下文展开的字段族
// 说明: 分类/商品/SKU 三种模式共用; 生成顺序即字段集顺序,
//       同一输入必须生成同一字段族 (重建幂等的基础)
// ==========================================

use std::collections::BTreeMap;

use crate::domain::codes;
use crate::domain::{
    AttributeDescriptor, AttributeValue, CatalogEntity, Fault, ReferenceKind, StoreContext,
    ValueKind,
};
use crate::schema::accessor::{
    parse_boolean, parse_date, parse_decimal, parse_integer, validate_text_length, BindContext,
    BindError, ImportField,
};

/// SEO/展示类文本字段的统一长度上限
pub const MAX_LOCALIZED_TEXT_LENGTH: usize = 255;

/// 多语言文本 map 的只读取值闭包
pub(crate) type LocaleMapGetter =
    fn(&CatalogEntity) -> Result<&BTreeMap<String, String>, BindError>;

/// 多语言文本 map 的可写取值闭包
pub(crate) type LocaleMapGetterMut =
    fn(&mut CatalogEntity) -> Result<&mut BTreeMap<String, String>, BindError>;

/// 币种价格 map 的只读取值闭包
pub(crate) type PriceMapGetter = fn(&CatalogEntity) -> Result<&BTreeMap<String, f64>, BindError>;

/// 币种价格 map 的可写取值闭包
pub(crate) type PriceMapGetterMut =
    fn(&mut CatalogEntity) -> Result<&mut BTreeMap<String, f64>, BindError>;

/// 属性 map 的只读取值闭包
pub(crate) type AttributeMapGetter =
    fn(&CatalogEntity) -> Result<&BTreeMap<String, AttributeValue>, BindError>;

/// 属性 map 的可写取值闭包
pub(crate) type AttributeMapGetterMut =
    fn(&mut CatalogEntity) -> Result<&mut BTreeMap<String, AttributeValue>, BindError>;

/// 生成每语言一个的文本字段族: `base(locale)`
///
/// # 参数
/// - `required_on_required_locale`: true 时仅必填语言的字段必填
/// - `max_len`: 文本长度上限, 超限产出 TOO_LONG 故障
pub(crate) fn locale_text_fields(
    base: &str,
    ctx: &StoreContext,
    required_on_required_locale: bool,
    max_len: Option<usize>,
    get: LocaleMapGetter,
    get_mut: LocaleMapGetterMut,
) -> Vec<ImportField> {
    let mut fields = Vec::with_capacity(ctx.supported_locales.len());
    for locale in &ctx.supported_locales {
        let name = format!("{}({})", base, locale);
        let required = required_on_required_locale && *locale == ctx.required_locale;
        let read_key = locale.clone();
        let write_key = locale.clone();
        let write_name = name.clone();
        fields.push(ImportField::new(
            name,
            ValueKind::Text,
            required,
            false,
            move |e| Ok(get(e)?.get(&read_key).cloned().unwrap_or_default()),
            move |e, raw, _ctx| {
                if let Some(max) = max_len {
                    validate_text_length(&write_name, raw, max)?;
                }
                get_mut(e)?.insert(write_key.clone(), raw.trim().to_string());
                Ok(())
            },
        ));
    }
    fields
}

/// 解析一次跨实体引用, 不存在产出 UNRESOLVED_REFERENCE 故障
///
/// # 参数
/// - `scoped`: true 时限定在当前目录作用域内查找
pub(crate) fn reference_exists(
    ctx: &BindContext,
    kind: ReferenceKind,
    field: &str,
    raw: &str,
    scoped: bool,
) -> Result<(), BindError> {
    let guid = raw.trim();
    let scope = if scoped { Some(ctx.catalog_guid) } else { None };
    let exists = ctx
        .resolver
        .exists_by_guid(kind, guid, scope)
        .map_err(BindError::Collaborator)?;
    if exists {
        Ok(())
    } else {
        Err(BindError::unresolved_reference(field, guid))
    }
}

/// 生成每币种一个的目录价字段族: `listPrice(currency)`
///
/// # 规则
/// - 必填币种的字段必填, 其余可选
/// - 价格不允许负值 (OUT_OF_RANGE)
pub(crate) fn list_price_fields(
    ctx: &StoreContext,
    get: PriceMapGetter,
    get_mut: PriceMapGetterMut,
) -> Vec<ImportField> {
    let mut fields = Vec::with_capacity(ctx.supported_currencies.len());
    for currency in &ctx.supported_currencies {
        let name = format!("listPrice({})", currency);
        let required = *currency == ctx.required_currency;
        let read_key = currency.clone();
        let write_key = currency.clone();
        let write_name = name.clone();
        fields.push(ImportField::new(
            name,
            ValueKind::Decimal,
            required,
            false,
            move |e| {
                Ok(get(e)?
                    .get(&read_key)
                    .map(|v| v.to_string())
                    .unwrap_or_default())
            },
            move |e, raw, _ctx| {
                let value = parse_decimal(&write_name, raw)?;
                if value < 0.0 {
                    return Err(BindError::out_of_range(&write_name, raw));
                }
                get_mut(e)?.insert(write_key.clone(), value);
                Ok(())
            },
        ));
    }
    fields
}

/// 生成每币种一个的促销价字段族: `salePrice(currency)`
///
/// # 规则
/// - 全部可选
/// - 价格不允许负值 (OUT_OF_RANGE)
/// - 同币种目录价已知时促销价不得高于目录价 (SALE_PRICE_ABOVE_LIST)
pub(crate) fn sale_price_fields(
    ctx: &StoreContext,
    get_list: PriceMapGetter,
    get_sale: PriceMapGetter,
    get_sale_mut: PriceMapGetterMut,
) -> Vec<ImportField> {
    let mut fields = Vec::with_capacity(ctx.supported_currencies.len());
    for currency in &ctx.supported_currencies {
        let name = format!("salePrice({})", currency);
        let read_key = currency.clone();
        let write_key = currency.clone();
        let write_name = name.clone();
        fields.push(ImportField::new(
            name,
            ValueKind::Decimal,
            false,
            false,
            move |e| {
                Ok(get_sale(e)?
                    .get(&read_key)
                    .map(|v| v.to_string())
                    .unwrap_or_default())
            },
            move |e, raw, _ctx| {
                let value = parse_decimal(&write_name, raw)?;
                if value < 0.0 {
                    return Err(BindError::out_of_range(&write_name, raw));
                }
                if let Some(list) = get_list(e)?.get(&write_key).copied() {
                    if value > list {
                        return Err(BindError::Fault(Fault::error(
                            codes::SALE_PRICE_ABOVE_LIST,
                            vec![write_key.clone(), value.to_string(), list.to_string()],
                        )));
                    }
                }
                get_sale_mut(e)?.insert(write_key.clone(), value);
                Ok(())
            },
        ));
    }
    fields
}

/// 按属性描述生成属性字段族
///
/// # 规则
/// - 语言相关属性每个支持语言展开为 `key(locale)`, 其必填性只落在必填语言上
/// - 语言无关属性生成单个 `key` 字段
/// - 值按属性的类型解析存储; 枚举属性校验允许值集合
pub(crate) fn attribute_fields(
    descriptors: &[AttributeDescriptor],
    ctx: &StoreContext,
    get: AttributeMapGetter,
    get_mut: AttributeMapGetterMut,
) -> Vec<ImportField> {
    let mut fields = Vec::new();
    for descriptor in descriptors {
        if descriptor.locale_dependent {
            for locale in &ctx.supported_locales {
                let name = format!("{}({})", descriptor.key, locale);
                let required = descriptor.required && *locale == ctx.required_locale;
                fields.push(single_attribute_field(
                    name, required, descriptor, get, get_mut,
                ));
            }
        } else {
            fields.push(single_attribute_field(
                descriptor.key.clone(),
                descriptor.required,
                descriptor,
                get,
                get_mut,
            ));
        }
    }
    fields
}

/// 单个属性字段, 存储键即对外字段名
fn single_attribute_field(
    name: String,
    required: bool,
    descriptor: &AttributeDescriptor,
    get: AttributeMapGetter,
    get_mut: AttributeMapGetterMut,
) -> ImportField {
    let value_kind = descriptor.value_kind;
    let allowed = descriptor.allowed_values.clone();
    let read_key = name.clone();
    let write_key = name.clone();
    let write_name = name.clone();
    ImportField::new(
        name,
        value_kind,
        required,
        false,
        move |e| {
            Ok(get(e)?
                .get(&read_key)
                .map(AttributeValue::to_display_string)
                .unwrap_or_default())
        },
        move |e, raw, _ctx| {
            let trimmed = raw.trim();
            let value = match value_kind {
                ValueKind::Text => AttributeValue::Text(trimmed.to_string()),
                ValueKind::Integer => AttributeValue::Integer(parse_integer(&write_name, raw)?),
                ValueKind::Decimal => AttributeValue::Decimal(parse_decimal(&write_name, raw)?),
                ValueKind::Boolean => AttributeValue::Boolean(parse_boolean(&write_name, raw)?),
                ValueKind::Date => AttributeValue::Date(parse_date(&write_name, raw)?),
                ValueKind::Enumeration => {
                    if !allowed.is_empty() && !allowed.iter().any(|v| v == trimmed) {
                        return Err(BindError::bad_value(
                            &write_name,
                            raw,
                            ValueKind::Enumeration,
                        ));
                    }
                    AttributeValue::Text(trimmed.to_string())
                }
            };
            get_mut(e)?.insert(write_key.clone(), value);
            Ok(())
        },
    )
}

// ==========================================
// 单元测试
// ==========================================
