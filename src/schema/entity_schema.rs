// ==========================================
// 商品目录数据导入引擎 - 实体模式
// ==========================================
// 职责: 某实体类型在给定元对象与门店上下文下的有序字段集
// 红线: 模式构建后只读共享; 任何上下文变更在私有副本上重建
// 红线: 字段集重建必须幂等, 同一 (元对象, 上下文) 产出同一字段集
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::domain::{
    CatalogEntity, ColumnMapping, EntityKind, ImportOperation, MetaObject, StoreContext,
};
use crate::schema::accessor::ImportField;
use crate::schema::error::{SchemaError, SchemaResult};

// ==========================================
// SchemaBlueprint Trait
// ==========================================
// 用途: 每种实体类型一份蓝图, 负责产出字段集与新实体
// 实现者: category/product/sku/customer/inventory/association 模块
pub trait SchemaBlueprint: Send + Sync {
    /// 蓝图对应的实体类型
    fn kind(&self) -> EntityKind;

    /// 该实体类型支持的导入操作
    fn supported_operations(&self) -> &'static [ImportOperation];

    /// 业务标识字段名, 纯值对象 (商品关联) 返回 None
    fn guid_field_name(&self) -> Option<&'static str>;

    /// 按元对象与门店上下文产出有序字段集
    ///
    /// # 规则
    /// - 同一输入必须产出同一字段集 (重建幂等的基础)
    /// - 元对象缺失/类型不符在此报配置错误
    fn build_fields(
        &self,
        meta: Option<&MetaObject>,
        ctx: &StoreContext,
    ) -> SchemaResult<Vec<ImportField>>;

    /// 构造一个带类型信息与作用域的空白实体
    fn new_entity(
        &self,
        meta: Option<&MetaObject>,
        scope_guid: &str,
    ) -> SchemaResult<CatalogEntity>;
}

// ==========================================
// EntitySchema - 实体模式
// ==========================================
/// 实体模式
///
/// # 说明
/// 初始化时按 (蓝图, 元对象, 门店上下文) 构建有序字段集;
/// 语言/币种上下文变更通过 setter 触发整体重建, 重建会清空
/// 懒计算的必填/可选分区缓存。
///
/// 模式可 Clone: 需要就地改上下文的调用方先克隆出私有副本,
/// 共享中的模式实例保持只读。
#[derive(Clone)]
pub struct EntitySchema {
    kind: EntityKind,
    blueprint: Arc<dyn SchemaBlueprint>,
    meta: Option<MetaObject>,
    store_context: StoreContext,
    fields: Vec<ImportField>,
    index: HashMap<String, usize>,
    guid_field: Option<String>,
    /// (必填字段下标, 可选字段下标), 懒计算, 重建时失效
    partitions: OnceLock<(Vec<usize>, Vec<usize>)>,
}

impl EntitySchema {
    /// 初始化模式
    ///
    /// # 参数
    /// - `blueprint`: 实体类型蓝图
    /// - `meta`: 元对象 (分类类型/商品类型); 无元对象的实体类型传 None
    /// - `ctx`: 门店上下文 (支持语言/币种集合与必填项)
    ///
    /// # 返回
    /// - Err: 元对象缺失/类型不符/字段重名等配置错误
    pub fn init(
        blueprint: Arc<dyn SchemaBlueprint>,
        meta: Option<MetaObject>,
        ctx: StoreContext,
    ) -> SchemaResult<Self> {
        let mut schema = EntitySchema {
            kind: blueprint.kind(),
            guid_field: blueprint.guid_field_name().map(str::to_string),
            blueprint,
            meta,
            store_context: ctx,
            fields: Vec::new(),
            index: HashMap::new(),
            partitions: OnceLock::new(),
        };
        schema.rebuild()?;
        Ok(schema)
    }

    /// 从蓝图快照整体重建字段集
    fn rebuild(&mut self) -> SchemaResult<()> {
        let fields = self
            .blueprint
            .build_fields(self.meta.as_ref(), &self.store_context)?;

        let mut index = HashMap::with_capacity(fields.len());
        for (pos, field) in fields.iter().enumerate() {
            if index.insert(field.name().to_string(), pos).is_some() {
                return Err(SchemaError::DuplicateField(field.name().to_string()));
            }
        }

        self.fields = fields;
        self.index = index;
        self.partitions = OnceLock::new();
        Ok(())
    }

    // ===== 上下文 setter (每个都触发重建) =====

    /// 替换整个门店上下文并重建
    pub fn set_store_context(&mut self, ctx: StoreContext) -> SchemaResult<()> {
        self.store_context = ctx;
        self.rebuild()
    }

    /// 替换支持语言集合并重建
    pub fn set_supported_locales(&mut self, locales: Vec<String>) -> SchemaResult<()> {
        self.store_context.supported_locales = locales;
        self.rebuild()
    }

    /// 替换必填语言并重建
    pub fn set_required_locale(&mut self, locale: impl Into<String>) -> SchemaResult<()> {
        self.store_context.required_locale = locale.into();
        self.rebuild()
    }

    /// 替换支持币种集合并重建
    pub fn set_supported_currencies(&mut self, currencies: Vec<String>) -> SchemaResult<()> {
        self.store_context.supported_currencies = currencies;
        self.rebuild()
    }

    /// 替换必填币种并重建
    pub fn set_required_currency(&mut self, currency: impl Into<String>) -> SchemaResult<()> {
        self.store_context.required_currency = currency.into();
        self.rebuild()
    }

    // ===== 查询 =====

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn store_context(&self) -> &StoreContext {
        &self.store_context
    }

    /// 有序字段集
    pub fn fields(&self) -> &[ImportField] {
        &self.fields
    }

    /// 按名取字段, 未知名报配置错误
    pub fn field(&self, name: &str) -> SchemaResult<&ImportField> {
        self.index
            .get(name)
            .map(|pos| &self.fields[*pos])
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 业务标识字段名, 无则空串
    pub fn guid_field_name(&self) -> &str {
        self.guid_field.as_deref().unwrap_or("")
    }

    /// 业务标识字段本体
    pub fn guid_field(&self) -> Option<&ImportField> {
        self.guid_field
            .as_deref()
            .and_then(|name| self.index.get(name))
            .map(|pos| &self.fields[*pos])
    }

    fn partitions(&self) -> &(Vec<usize>, Vec<usize>) {
        self.partitions.get_or_init(|| {
            let mut required = Vec::new();
            let mut optional = Vec::new();
            for (pos, field) in self.fields.iter().enumerate() {
                if field.is_required() {
                    required.push(pos);
                } else {
                    optional.push(pos);
                }
            }
            (required, optional)
        })
    }

    /// 必填字段分区 (保持字段集顺序)
    pub fn required_fields(&self) -> Vec<&ImportField> {
        self.partitions().0.iter().map(|p| &self.fields[*p]).collect()
    }

    /// 可选字段分区 (保持字段集顺序)
    pub fn optional_fields(&self) -> Vec<&ImportField> {
        self.partitions().1.iter().map(|p| &self.fields[*p]).collect()
    }

    pub fn supported_operations(&self) -> &'static [ImportOperation] {
        self.blueprint.supported_operations()
    }

    pub fn supports(&self, op: ImportOperation) -> bool {
        self.supported_operations().contains(&op)
    }

    /// 校验操作受支持, 否则报配置错误
    pub fn ensure_supports(&self, op: ImportOperation) -> SchemaResult<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(SchemaError::UnsupportedOperation {
                kind: self.kind.to_db_str().to_string(),
                op: op.to_db_str().to_string(),
            })
        }
    }

    /// 构造空白实体 (类型信息与作用域已就位)
    pub fn new_entity(&self, scope_guid: &str) -> SchemaResult<CatalogEntity> {
        self.blueprint.new_entity(self.meta.as_ref(), scope_guid)
    }

    /// 校验任务列映射与本模式、给定操作的一致性
    ///
    /// # 规则
    /// - 映射的字段必须存在于字段集
    /// - 列号不得重复使用
    /// - 业务标识字段存在时必须被映射
    /// - 该操作下必须非空的字段必须被映射
    pub fn validate_mappings(
        &self,
        mappings: &[ColumnMapping],
        op: ImportOperation,
    ) -> SchemaResult<()> {
        self.ensure_supports(op)?;

        let mut seen_columns = HashMap::new();
        for mapping in mappings {
            self.field(&mapping.field_name)?;
            if seen_columns
                .insert(mapping.column_index, &mapping.field_name)
                .is_some()
            {
                return Err(SchemaError::DuplicateColumnIndex(mapping.column_index));
            }
        }

        let mapped =
            |name: &str| mappings.iter().any(|m| m.field_name == name);

        if let Some(guid) = self.guid_field.as_deref() {
            if !mapped(guid) {
                return Err(SchemaError::GuidFieldUnmapped(guid.to_string()));
            }
        }

        for field in &self.fields {
            if field.is_required_for(op) && !mapped(field.name()) {
                return Err(SchemaError::RequiredFieldUnmapped(field.name().to_string()));
            }
        }
        Ok(())
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ValueKind};
    use crate::schema::accessor::{expect_category, expect_category_mut};

    /// 测试蓝图: 一个编号字段 + 每语言一个名称字段
    struct FakeBlueprint;

    impl SchemaBlueprint for FakeBlueprint {
        fn kind(&self) -> EntityKind {
            EntityKind::Category
        }

        fn supported_operations(&self) -> &'static [ImportOperation] {
            &[
                ImportOperation::Insert,
                ImportOperation::Update,
                ImportOperation::InsertOrUpdate,
                ImportOperation::Delete,
            ]
        }

        fn guid_field_name(&self) -> Option<&'static str> {
            Some("categoryCode")
        }

        fn build_fields(
            &self,
            _meta: Option<&MetaObject>,
            ctx: &StoreContext,
        ) -> SchemaResult<Vec<ImportField>> {
            let mut fields = vec![ImportField::new(
                "categoryCode",
                ValueKind::Text,
                true,
                true,
                |e| Ok(expect_category(e)?.code.clone()),
                |e, raw, _| {
                    expect_category_mut(e)?.code = raw.trim().to_string();
                    Ok(())
                },
            )];
            for locale in &ctx.supported_locales {
                let name = format!("displayName({})", locale);
                let key = locale.clone();
                let key_w = locale.clone();
                let required = *locale == ctx.required_locale;
                fields.push(ImportField::new(
                    name,
                    ValueKind::Text,
                    required,
                    false,
                    move |e| {
                        Ok(expect_category(e)?
                            .display_name
                            .get(&key)
                            .cloned()
                            .unwrap_or_default())
                    },
                    move |e, raw, _| {
                        expect_category_mut(e)?
                            .display_name
                            .insert(key_w.clone(), raw.trim().to_string());
                        Ok(())
                    },
                ));
            }
            Ok(fields)
        }

        fn new_entity(
            &self,
            _meta: Option<&MetaObject>,
            scope_guid: &str,
        ) -> SchemaResult<CatalogEntity> {
            Ok(CatalogEntity::Category(Category::new(scope_guid, "Default")))
        }
    }

    fn two_locale_ctx() -> StoreContext {
        StoreContext::new(
            vec!["en".to_string(), "fr".to_string()],
            "en",
            vec!["USD".to_string()],
            "USD",
        )
    }

    fn build_schema() -> EntitySchema {
        EntitySchema::init(Arc::new(FakeBlueprint), None, two_locale_ctx()).unwrap()
    }

    #[test]
    fn test_field_order_and_lookup() {
        let schema = build_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec!["categoryCode", "displayName(en)", "displayName(fr)"]
        );
        assert!(schema.field("displayName(fr)").is_ok());
        assert!(matches!(
            schema.field("noSuchField"),
            Err(SchemaError::UnknownField(_))
        ));
        assert_eq!(schema.guid_field_name(), "categoryCode");
    }

    #[test]
    fn test_partitions_follow_required_locale() {
        let schema = build_schema();
        let required: Vec<&str> = schema.required_fields().iter().map(|f| f.name()).collect();
        assert_eq!(required, vec!["categoryCode", "displayName(en)"]);
        let optional: Vec<&str> = schema.optional_fields().iter().map(|f| f.name()).collect();
        assert_eq!(optional, vec!["displayName(fr)"]);
    }

    #[test]
    fn test_locale_setter_triggers_rebuild() {
        let mut schema = build_schema();
        assert_eq!(schema.fields().len(), 3);

        schema
            .set_supported_locales(vec!["en".to_string(), "fr".to_string(), "de".to_string()])
            .unwrap();
        assert_eq!(schema.fields().len(), 4);
        assert!(schema.contains_field("displayName(de)"));

        // 必填语言切换后分区缓存必须失效
        schema.set_required_locale("fr").unwrap();
        let required: Vec<&str> = schema.required_fields().iter().map(|f| f.name()).collect();
        assert_eq!(required, vec!["categoryCode", "displayName(fr)"]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut schema = build_schema();
        let before: Vec<String> = schema.fields().iter().map(|f| f.name().to_string()).collect();
        schema.set_store_context(two_locale_ctx()).unwrap();
        let after: Vec<String> = schema.fields().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_validate_mappings() {
        let schema = build_schema();
        let ok = vec![
            ColumnMapping::new("categoryCode", 0),
            ColumnMapping::new("displayName(en)", 1),
        ];
        schema
            .validate_mappings(&ok, ImportOperation::Insert)
            .unwrap();

        // 业务标识未映射
        let missing_guid = vec![ColumnMapping::new("displayName(en)", 0)];
        assert!(matches!(
            schema.validate_mappings(&missing_guid, ImportOperation::Insert),
            Err(SchemaError::GuidFieldUnmapped(_))
        ));

        // 必填字段未映射 (仅创建类操作要求)
        let missing_required = vec![ColumnMapping::new("categoryCode", 0)];
        assert!(matches!(
            schema.validate_mappings(&missing_required, ImportOperation::Insert),
            Err(SchemaError::RequiredFieldUnmapped(_))
        ));
        schema
            .validate_mappings(&missing_required, ImportOperation::Delete)
            .unwrap();

        // 列号重复
        let dup = vec![
            ColumnMapping::new("categoryCode", 0),
            ColumnMapping::new("displayName(en)", 0),
        ];
        assert!(matches!(
            schema.validate_mappings(&dup, ImportOperation::Insert),
            Err(SchemaError::DuplicateColumnIndex(0))
        ));

        // 未知字段
        let unknown = vec![
            ColumnMapping::new("categoryCode", 0),
            ColumnMapping::new("displayName(en)", 1),
            ColumnMapping::new("bogus", 2),
        ];
        assert!(matches!(
            schema.validate_mappings(&unknown, ImportOperation::Insert),
            Err(SchemaError::UnknownField(_))
        ));
    }
}
