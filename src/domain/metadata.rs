// ==========================================
// 商品目录数据导入引擎 - 元数据描述
// ==========================================
// 职责: 字段模式构建所依赖的元对象与门店上下文
// 说明: 分类类型/商品类型决定属性字段集, 门店上下文决定
//       语言/币种展开, 两者变化都会触发模式整体重建
// ==========================================

use crate::domain::types::ValueKind;
use serde::{Deserialize, Serialize};

// ==========================================
// AttributeDescriptor - 属性描述
// ==========================================
// locale_dependent 的属性按每个支持语言展开为 key(locale) 字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub key: String,
    pub value_kind: ValueKind,
    pub locale_dependent: bool,
    pub required: bool,
    /// 仅 ENUMERATION 类型使用, 为空表示不限
    pub allowed_values: Vec<String>,
}

impl AttributeDescriptor {
    pub fn new(key: &str, value_kind: ValueKind, locale_dependent: bool, required: bool) -> Self {
        Self {
            key: key.to_string(),
            value_kind,
            locale_dependent,
            required,
            allowed_values: Vec::new(),
        }
    }

    pub fn enumeration(key: &str, required: bool, allowed_values: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            value_kind: ValueKind::Enumeration,
            locale_dependent: false,
            required,
            allowed_values,
        }
    }
}

// ==========================================
// SkuOptionDescriptor - SKU 选项描述
// ==========================================
// 多SKU商品类型声明的选项, 每个选项展开为一个枚举字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuOptionDescriptor {
    pub key: String,
    pub values: Vec<String>,
}

impl SkuOptionDescriptor {
    pub fn new(key: &str, values: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            values,
        }
    }
}

// ==========================================
// CategoryType - 分类类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryType {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl CategoryType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }
}

// ==========================================
// ProductType - 商品类型
// ==========================================
// multi_sku 决定商品模式是否内嵌单SKU字段,
// 以及 SKU 模式能否基于该类型构建
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductType {
    pub name: String,
    pub multi_sku: bool,
    pub product_attributes: Vec<AttributeDescriptor>,
    pub sku_attributes: Vec<AttributeDescriptor>,
    pub sku_options: Vec<SkuOptionDescriptor>,
}

impl ProductType {
    pub fn new(name: &str, multi_sku: bool) -> Self {
        Self {
            name: name.to_string(),
            multi_sku,
            product_attributes: Vec::new(),
            sku_attributes: Vec::new(),
            sku_options: Vec::new(),
        }
    }
}

// ==========================================
// MetaObject - 模式构建的元对象
// ==========================================
// 每种实体模式声明自己需要的元对象类型, 类型不符属于
// 配置错误 (任务不启动), 不属于行级故障
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaObject {
    CategoryType(CategoryType),
    ProductType(ProductType),
}

impl MetaObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MetaObject::CategoryType(_) => "CategoryType",
            MetaObject::ProductType(_) => "ProductType",
        }
    }
}

// ==========================================
// StoreContext - 门店上下文
// ==========================================
// 支持语言/币种集合与必填语言/币种; 任何一项变化都要求
// 清空并重建全部字段 (重建幂等)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreContext {
    pub supported_locales: Vec<String>,
    pub required_locale: String,
    pub supported_currencies: Vec<String>,
    pub required_currency: String,
}

impl StoreContext {
    pub fn new(
        supported_locales: Vec<String>,
        required_locale: &str,
        supported_currencies: Vec<String>,
        required_currency: &str,
    ) -> Self {
        Self {
            supported_locales,
            required_locale: required_locale.to_string(),
            supported_currencies,
            required_currency: required_currency.to_string(),
        }
    }

    /// 单语言单币种的最小上下文
    pub fn minimal(locale: &str, currency: &str) -> Self {
        Self::new(
            vec![locale.to_string()],
            locale,
            vec![currency.to_string()],
            currency,
        )
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::minimal("en", "USD")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_object_kind_name() {
        let meta = MetaObject::CategoryType(CategoryType::new("DefaultCategoryType"));
        assert_eq!(meta.kind_name(), "CategoryType");

        let meta = MetaObject::ProductType(ProductType::new("Shoes", true));
        assert_eq!(meta.kind_name(), "ProductType");
    }

    #[test]
    fn test_minimal_store_context() {
        let ctx = StoreContext::minimal("fr", "EUR");
        assert_eq!(ctx.supported_locales, vec!["fr"]);
        assert_eq!(ctx.required_locale, "fr");
        assert_eq!(ctx.required_currency, "EUR");
    }
}
