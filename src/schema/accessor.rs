// ==========================================
// 商品目录数据导入引擎 - 字段访问器
// ==========================================
// 职责: 单个可导入字段的读/写/只检查三种访问路径
// 红线: 空值哨兵规则集中在 write/check 包装入口, 闭包内不再重复判断
// 红线: 行级故障(Fault)与协作方系统错误(Collaborator)严格分流
// ==========================================

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::domain::codes;
use crate::domain::{
    CatalogEntity, Category, Customer, EntityKind, Fault, ImportOperation, InventoryRecord,
    Product, ProductAssociation, ProductSku, ValueKind,
};
use crate::engine::ReferenceResolver;

/// 空值哨兵字面量 (不区分大小写)
pub const NULL_TOKEN: &str = "null";

/// 业务标识字段的最大长度
pub const MAX_GUID_LENGTH: usize = 64;

/// 判断原始单元格是否为空值哨兵
///
/// # 规则
/// - 去除首尾空白后为空串
/// - 或不区分大小写等于 "null"
pub fn is_null_value(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NULL_TOKEN)
}

// ==========================================
// 绑定错误
// ==========================================

/// 单字段绑定失败的分类结果
///
/// # 说明
/// - `Fault`: 行级数据故障, 由调用方累积进故障收集器, 消耗任务阈值
/// - `EntityMismatch`: 实体变体与模式不匹配, 属于配置错误, 任务直接失败
/// - `Collaborator`: 协作方(解析器/存储)系统错误, 任务直接失败
pub enum BindError {
    Fault(Fault),
    EntityMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
    Collaborator(Box<dyn Error + Send + Sync>),
}

impl fmt::Debug for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Fault(fault) => write!(f, "Fault({:?})", fault),
            BindError::EntityMismatch { expected, actual } => {
                write!(f, "EntityMismatch(expected={}, actual={})", expected, actual)
            }
            BindError::Collaborator(e) => write!(f, "Collaborator({})", e),
        }
    }
}

impl BindError {
    /// 数据格式故障: 值无法按目标类型解析
    pub fn bad_value(field: &str, raw: &str, kind: ValueKind) -> Self {
        BindError::Fault(Fault::error(
            codes::BAD_VALUE,
            vec![
                field.to_string(),
                raw.to_string(),
                kind.to_db_str().to_string(),
            ],
        ))
    }

    /// 引用未解析故障
    pub fn unresolved_reference(field: &str, raw: &str) -> Self {
        BindError::Fault(Fault::error(
            codes::UNRESOLVED_REFERENCE,
            vec![field.to_string(), raw.to_string()],
        ))
    }

    /// 数值越界故障
    pub fn out_of_range(field: &str, raw: &str) -> Self {
        BindError::Fault(Fault::error(
            codes::OUT_OF_RANGE,
            vec![field.to_string(), raw.to_string()],
        ))
    }
}

impl From<Fault> for BindError {
    fn from(fault: Fault) -> Self {
        BindError::Fault(fault)
    }
}

/// 字段绑定上下文
///
/// 目录上下文与引用解析器在每次绑定时显式传入, 模式对象本身保持
/// 只读共享, 多任务并用时互不污染
pub struct BindContext<'a> {
    /// 引用解析器
    pub resolver: &'a dyn ReferenceResolver,
    /// 当前目录 guid, 非目录作用域的任务传空串
    pub catalog_guid: &'a str,
    /// 本次任务的导入操作
    pub operation: ImportOperation,
}

impl<'a> BindContext<'a> {
    pub fn new(
        resolver: &'a dyn ReferenceResolver,
        catalog_guid: &'a str,
        operation: ImportOperation,
    ) -> Self {
        BindContext {
            resolver,
            catalog_guid,
            operation,
        }
    }
}

// ==========================================
// 访问器闭包类型
// ==========================================

/// 读路径: 从实体取出字段的字符串形式
pub type ReadFn = Arc<dyn Fn(&CatalogEntity) -> Result<String, BindError> + Send + Sync>;

/// 写路径: 解析原始值并落到实体上
pub type WriteFn =
    Arc<dyn Fn(&mut CatalogEntity, &str, &BindContext) -> Result<(), BindError> + Send + Sync>;

/// 只检查路径: 验证但绝不改动实体
pub type CheckFn =
    Arc<dyn Fn(&CatalogEntity, &str, &BindContext) -> Result<(), BindError> + Send + Sync>;

// ==========================================
// 可导入字段
// ==========================================

/// 单个可导入字段
///
/// # 说明
/// 每个字段携带三种访问路径:
/// - `read`: 导出/回显时取值
/// - `write`: 校验并落值
/// - `check_only`: 仅校验; 未提供专用检查闭包时在一次性副本上走写路径
///
/// 空值哨兵处理集中在 `write`/`check_only` 的入口:
/// - 必填字段收到空值 -> NOT_NULL 故障
/// - 可选字段收到空值 -> 保持现值不动 (唯一例外是标记了
///   `clearing_on_null` 的字段, 空值透传给写闭包表示显式清空)
#[derive(Clone)]
pub struct ImportField {
    name: String,
    value_kind: ValueKind,
    required: bool,
    primary_required: bool,
    catalog_scoped: bool,
    clears_on_null: bool,
    read_fn: ReadFn,
    write_fn: WriteFn,
    check_fn: Option<CheckFn>,
}

impl fmt::Debug for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportField")
            .field("name", &self.name)
            .field("value_kind", &self.value_kind)
            .field("required", &self.required)
            .field("primary_required", &self.primary_required)
            .field("catalog_scoped", &self.catalog_scoped)
            .finish()
    }
}

impl ImportField {
    /// 构造字段
    ///
    /// # 参数
    /// - `name`: 对外字段名, 含语言/币种后缀时形如 `displayName(en)`
    /// - `required`: 创建类操作下必须非空
    /// - `primary_required`: 更新/删除类操作下必须非空
    pub fn new<R, W>(
        name: impl Into<String>,
        value_kind: ValueKind,
        required: bool,
        primary_required: bool,
        read_fn: R,
        write_fn: W,
    ) -> Self
    where
        R: Fn(&CatalogEntity) -> Result<String, BindError> + Send + Sync + 'static,
        W: Fn(&mut CatalogEntity, &str, &BindContext) -> Result<(), BindError>
            + Send
            + Sync
            + 'static,
    {
        ImportField {
            name: name.into(),
            value_kind,
            required,
            primary_required,
            catalog_scoped: false,
            clears_on_null: false,
            read_fn: Arc::new(read_fn),
            write_fn: Arc::new(write_fn),
            check_fn: None,
        }
    }

    /// 附加专用检查闭包 (默认走一次性副本上的写路径)
    pub fn with_check<C>(mut self, check_fn: C) -> Self
    where
        C: Fn(&CatalogEntity, &str, &BindContext) -> Result<(), BindError>
            + Send
            + Sync
            + 'static,
    {
        self.check_fn = Some(Arc::new(check_fn));
        self
    }

    /// 标记为目录作用域字段 (绑定前任务必须带目录上下文)
    pub fn catalog_scoped(mut self) -> Self {
        self.catalog_scoped = true;
        self
    }

    /// 标记空值哨兵为显式清空而非不动
    pub fn clearing_on_null(mut self) -> Self {
        self.clears_on_null = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_primary_required(&self) -> bool {
        self.primary_required
    }

    pub fn is_catalog_scoped(&self) -> bool {
        self.catalog_scoped
    }

    /// 给定操作下该字段是否必须非空
    ///
    /// # 规则
    /// - 创建类操作看 `required`
    /// - 更新/删除看 `primary_required`
    /// - 插入或更新两者取并
    pub fn is_required_for(&self, op: ImportOperation) -> bool {
        match op {
            ImportOperation::Insert | ImportOperation::ClearThenInsert => self.required,
            ImportOperation::Update | ImportOperation::Delete => self.primary_required,
            ImportOperation::InsertOrUpdate => self.required || self.primary_required,
        }
    }

    /// 读取字段当前值的字符串形式
    pub fn read(&self, entity: &CatalogEntity) -> Result<String, BindError> {
        (self.read_fn)(entity)
    }

    /// 写入字段
    ///
    /// 空值哨兵在此统一分流, 见类型文档
    pub fn write(
        &self,
        entity: &mut CatalogEntity,
        raw: &str,
        ctx: &BindContext,
    ) -> Result<(), BindError> {
        if is_null_value(raw) {
            if self.is_required_for(ctx.operation) {
                return Err(BindError::Fault(Fault::error(
                    codes::NOT_NULL,
                    vec![self.name.clone()],
                )));
            }
            if !self.clears_on_null {
                return Ok(());
            }
        }
        (self.write_fn)(entity, raw, ctx)
    }

    /// 只检查不落值
    pub fn check_only(
        &self,
        entity: &CatalogEntity,
        raw: &str,
        ctx: &BindContext,
    ) -> Result<(), BindError> {
        if is_null_value(raw) {
            if self.is_required_for(ctx.operation) {
                return Err(BindError::Fault(Fault::error(
                    codes::NOT_NULL,
                    vec![self.name.clone()],
                )));
            }
            if !self.clears_on_null {
                return Ok(());
            }
        }
        match &self.check_fn {
            Some(check) => check(entity, raw, ctx),
            None => {
                // 一次性副本, 写后即弃, 原实体不受影响
                let mut scratch = entity.clone();
                (self.write_fn)(&mut scratch, raw, ctx)
            }
        }
    }
}

// ==========================================
// 解析与校验辅助
// ==========================================

/// 解析整数, 失败产出 BAD_VALUE 故障
pub fn parse_integer(field: &str, raw: &str) -> Result<i64, BindError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| BindError::bad_value(field, raw, ValueKind::Integer))
}

/// 解析小数, 失败产出 BAD_VALUE 故障
pub fn parse_decimal(field: &str, raw: &str) -> Result<f64, BindError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| BindError::bad_value(field, raw, ValueKind::Decimal))?;
    if !value.is_finite() {
        return Err(BindError::bad_value(field, raw, ValueKind::Decimal));
    }
    Ok(value)
}

/// 解析布尔值
///
/// # 规则
/// 仅接受 true/false/1/0 (不区分大小写), 其余一律故障, 不做静默回退
pub fn parse_boolean(field: &str, raw: &str) -> Result<bool, BindError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        Ok(false)
    } else {
        Err(BindError::bad_value(field, raw, ValueKind::Boolean))
    }
}

/// 解析日期时间
///
/// # 规则
/// 依次尝试下列格式, 纯日期按当天零点处理, 全部失败产出 BAD_VALUE:
/// - `%Y-%m-%d %H:%M:%S`
/// - `%Y-%m-%dT%H:%M:%S`
/// - `%Y-%m-%d`
/// - `%Y%m%d`
pub fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>, BindError> {
    let trimmed = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(nd) = NaiveDate::parse_from_str(trimmed, fmt) {
            if let Some(ndt) = nd.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }
    }
    Err(BindError::bad_value(field, raw, ValueKind::Date))
}

/// 日期时间的导出格式, 与解析首选格式一致
pub fn format_date(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 校验业务标识格式
///
/// # 规则
/// 仅允许字母数字与 `-` `_`, 长度不超过 64, 违规产出 WRONG_GUID 故障
pub fn validate_guid_format(field: &str, raw: &str) -> Result<(), BindError> {
    let trimmed = raw.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.len() <= MAX_GUID_LENGTH
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(BindError::Fault(Fault::error(
            codes::WRONG_GUID,
            vec![field.to_string(), raw.to_string()],
        )))
    }
}

/// 校验文本长度上限, 超限产出 TOO_LONG 故障
pub fn validate_text_length(field: &str, raw: &str, max: usize) -> Result<(), BindError> {
    if raw.trim().chars().count() > max {
        Err(BindError::Fault(Fault::error(
            codes::TOO_LONG,
            vec![field.to_string(), raw.to_string(), max.to_string()],
        )))
    } else {
        Ok(())
    }
}

// ==========================================
// 实体变体下沉辅助
// ==========================================

macro_rules! expect_variant {
    ($fn_name:ident, $fn_name_mut:ident, $variant:ident, $target:ty, $as_ref:ident, $as_mut:ident) => {
        pub(crate) fn $fn_name(entity: &CatalogEntity) -> Result<&$target, BindError> {
            entity.$as_ref().ok_or(BindError::EntityMismatch {
                expected: EntityKind::$variant,
                actual: entity.kind(),
            })
        }

        pub(crate) fn $fn_name_mut(entity: &mut CatalogEntity) -> Result<&mut $target, BindError> {
            let actual = entity.kind();
            entity.$as_mut().ok_or(BindError::EntityMismatch {
                expected: EntityKind::$variant,
                actual,
            })
        }
    };
}

expect_variant!(expect_category, expect_category_mut, Category, Category, as_category, as_category_mut);
expect_variant!(expect_product, expect_product_mut, Product, Product, as_product, as_product_mut);
expect_variant!(expect_sku, expect_sku_mut, ProductSku, ProductSku, as_sku, as_sku_mut);
expect_variant!(expect_customer, expect_customer_mut, Customer, Customer, as_customer, as_customer_mut);
expect_variant!(expect_inventory, expect_inventory_mut, Inventory, InventoryRecord, as_inventory, as_inventory_mut);
expect_variant!(expect_association, expect_association_mut, ProductAssociation, ProductAssociation, as_association, as_association_mut);

// ==========================================
// 单元测试
// ==========================================
