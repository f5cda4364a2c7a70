// ==========================================
// 商品目录数据导入引擎 - 目录领域实体
// ==========================================
// 职责: 六种可导入实体与其属性值容器
// 红线: 实体不含数据访问逻辑; 字段校验发生在字段访问器,
//       领域自带的范围规则发生在实体 setter (单一事实)
// ==========================================

use crate::domain::types::{
    AssociationKind, AvailabilityRule, CustomerStatus, EntityKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// AttributeValue - 类型化属性值
// ==========================================
// 动态属性按属性描述的类型存储, 读取时统一转为展示字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl AttributeValue {
    pub fn to_display_string(&self) -> String {
        match self {
            AttributeValue::Text(v) => v.clone(),
            AttributeValue::Integer(v) => v.to_string(),
            AttributeValue::Decimal(v) => v.to_string(),
            AttributeValue::Boolean(v) => v.to_string(),
            AttributeValue::Date(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// ==========================================
// Category - 目录分类
// ==========================================
// enable_date 在构造时取当前时间, 因此空值写入保持
// "不改变现值" 的统一约定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub code: String,
    pub catalog_guid: String,
    pub category_type: String,
    pub parent_code: Option<String>,
    pub enable_date: DateTime<Utc>,
    pub disable_date: Option<DateTime<Utc>>,
    pub store_visible: bool,
    pub ordering: i64,
    pub display_name: BTreeMap<String, String>,
    pub seo_url: BTreeMap<String, String>,
    pub seo_title: BTreeMap<String, String>,
    pub seo_keywords: BTreeMap<String, String>,
    pub seo_description: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Category {
    pub fn new(catalog_guid: &str, category_type: &str) -> Self {
        Self {
            code: String::new(),
            catalog_guid: catalog_guid.to_string(),
            category_type: category_type.to_string(),
            parent_code: None,
            enable_date: Utc::now(),
            disable_date: None,
            store_visible: false,
            ordering: 0,
            display_name: BTreeMap::new(),
            seo_url: BTreeMap::new(),
            seo_title: BTreeMap::new(),
            seo_keywords: BTreeMap::new(),
            seo_description: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }
}

// ==========================================
// Product - 商品
// ==========================================
// 单SKU商品内嵌一个默认 SKU, 与商品文档一同持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    pub catalog_guid: String,
    pub product_type: String,
    pub default_category_code: Option<String>,
    pub brand_code: Option<String>,
    pub enable_date: DateTime<Utc>,
    pub disable_date: Option<DateTime<Utc>>,
    pub hidden: bool,
    pub not_sold_separately: bool,
    pub image: Option<String>,
    pub tax_code: Option<String>,
    pub min_order_qty: i64,
    pub availability: AvailabilityRule,
    pub pre_or_back_order_limit: i64,
    pub display_name: BTreeMap<String, String>,
    pub seo_url: BTreeMap<String, String>,
    pub seo_title: BTreeMap<String, String>,
    pub seo_keywords: BTreeMap<String, String>,
    pub seo_description: BTreeMap<String, String>,
    /// 目录价 / 促销价, 键为币种代码
    pub list_price: BTreeMap<String, f64>,
    pub sale_price: BTreeMap<String, f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub default_sku: Option<ProductSku>,
}

impl Product {
    pub fn new(catalog_guid: &str, product_type: &str) -> Self {
        Self {
            code: String::new(),
            catalog_guid: catalog_guid.to_string(),
            product_type: product_type.to_string(),
            default_category_code: None,
            brand_code: None,
            enable_date: Utc::now(),
            disable_date: None,
            hidden: false,
            not_sold_separately: false,
            image: None,
            tax_code: None,
            min_order_qty: 1,
            availability: AvailabilityRule::AlwaysAvailable,
            pre_or_back_order_limit: 0,
            display_name: BTreeMap::new(),
            seo_url: BTreeMap::new(),
            seo_title: BTreeMap::new(),
            seo_keywords: BTreeMap::new(),
            seo_description: BTreeMap::new(),
            list_price: BTreeMap::new(),
            sale_price: BTreeMap::new(),
            attributes: BTreeMap::new(),
            default_sku: None,
        }
    }

    /// 最小起订量下限为 1, 范围规则由领域对象持有
    pub fn set_min_order_qty(&mut self, qty: i64) -> Result<(), String> {
        if qty < 1 {
            return Err(format!("minOrderQty 必须 >= 1, 实际 {}", qty));
        }
        self.min_order_qty = qty;
        Ok(())
    }
}

// ==========================================
// ProductSku - 商品 SKU
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSku {
    pub code: String,
    pub product_code: String,
    pub catalog_guid: String,
    /// 选项键 -> 选项值, 仅多SKU商品使用
    pub option_values: BTreeMap<String, String>,
    pub enable_date: DateTime<Utc>,
    pub disable_date: Option<DateTime<Utc>>,
    pub shippable: bool,
    pub weight_kg: Option<f64>,
    pub width_cm: Option<f64>,
    pub length_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub image: Option<String>,
    pub list_price: BTreeMap<String, f64>,
    pub sale_price: BTreeMap<String, f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl ProductSku {
    pub fn new(catalog_guid: &str) -> Self {
        Self {
            code: String::new(),
            product_code: String::new(),
            catalog_guid: catalog_guid.to_string(),
            option_values: BTreeMap::new(),
            enable_date: Utc::now(),
            disable_date: None,
            shippable: false,
            weight_kg: None,
            width_cm: None,
            length_cm: None,
            height_cm: None,
            image: None,
            list_price: BTreeMap::new(),
            sale_price: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// 物流尺寸与重量不允许负值
    pub fn set_dimension(&mut self, field: SkuDimension, value: f64) -> Result<(), String> {
        if value < 0.0 {
            return Err(format!("{:?} 不允许负值, 实际 {}", field, value));
        }
        match field {
            SkuDimension::Weight => self.weight_kg = Some(value),
            SkuDimension::Width => self.width_cm = Some(value),
            SkuDimension::Length => self.length_cm = Some(value),
            SkuDimension::Height => self.height_cm = Some(value),
        }
        Ok(())
    }
}

/// SKU 物流维度标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkuDimension {
    Weight,
    Width,
    Length,
    Height,
}

// ==========================================
// Customer - 客户
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub guid: String,
    pub store_guid: String,
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub status: CustomerStatus,
    pub creation_date: DateTime<Utc>,
}

impl Customer {
    pub fn new(store_guid: &str) -> Self {
        Self {
            guid: String::new(),
            store_guid: store_guid.to_string(),
            user_id: String::new(),
            email: None,
            first_name: None,
            last_name: None,
            phone_number: None,
            status: CustomerStatus::Active,
            creation_date: Utc::now(),
        }
    }
}

// ==========================================
// InventoryRecord - 库存记录
// ==========================================
// 以 (skuCode, warehouse_guid) 定位, 数量规则由实体持有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub sku_code: String,
    pub warehouse_guid: String,
    pub quantity_on_hand: i64,
    pub reserved_quantity: i64,
    pub reorder_minimum: i64,
    pub reorder_quantity: i64,
    pub restock_date: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    pub fn new(warehouse_guid: &str) -> Self {
        Self {
            sku_code: String::new(),
            warehouse_guid: warehouse_guid.to_string(),
            quantity_on_hand: 0,
            reserved_quantity: 0,
            reorder_minimum: 0,
            reorder_quantity: 0,
            restock_date: None,
        }
    }

    /// 数量类字段不允许负值
    pub fn set_quantity(&mut self, field: InventoryQuantity, value: i64) -> Result<(), String> {
        if value < 0 {
            return Err(format!("{:?} 不允许负值, 实际 {}", field, value));
        }
        match field {
            InventoryQuantity::OnHand => self.quantity_on_hand = value,
            InventoryQuantity::Reserved => self.reserved_quantity = value,
            InventoryQuantity::ReorderMinimum => self.reorder_minimum = value,
            InventoryQuantity::ReorderQuantity => self.reorder_quantity = value,
        }
        Ok(())
    }
}

/// 库存数量维度标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryQuantity {
    OnHand,
    Reserved,
    ReorderMinimum,
    ReorderQuantity,
}

// ==========================================
// ProductAssociation - 商品关联
// ==========================================
// 纯值对象导入: 无独立业务标识, 按源商品整组清空重建
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAssociation {
    pub catalog_guid: String,
    pub source_product_code: String,
    pub target_product_code: String,
    pub kind: AssociationKind,
    pub default_quantity: i64,
    pub ordering: i64,
}

impl ProductAssociation {
    pub fn new(catalog_guid: &str) -> Self {
        Self {
            catalog_guid: catalog_guid.to_string(),
            source_product_code: String::new(),
            target_product_code: String::new(),
            kind: AssociationKind::CrossSell,
            default_quantity: 1,
            ordering: 0,
        }
    }

    /// 默认数量下限为 1
    pub fn set_default_quantity(&mut self, qty: i64) -> Result<(), String> {
        if qty < 1 {
            return Err(format!("defaultQuantity 必须 >= 1, 实际 {}", qty));
        }
        self.default_quantity = qty;
        Ok(())
    }
}

// ==========================================
// CatalogEntity - 实体标签变体
// ==========================================
// 字段访问器面向该变体编写, 模式按实体类型各取所需;
// 变体不匹配属于配置错误而非行级故障
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_kind")]
pub enum CatalogEntity {
    Category(Category),
    Product(Product),
    ProductSku(ProductSku),
    Customer(Customer),
    Inventory(InventoryRecord),
    ProductAssociation(ProductAssociation),
}

impl CatalogEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogEntity::Category(_) => EntityKind::Category,
            CatalogEntity::Product(_) => EntityKind::Product,
            CatalogEntity::ProductSku(_) => EntityKind::ProductSku,
            CatalogEntity::Customer(_) => EntityKind::Customer,
            CatalogEntity::Inventory(_) => EntityKind::Inventory,
            CatalogEntity::ProductAssociation(_) => EntityKind::ProductAssociation,
        }
    }

    /// 业务标识; 商品关联为纯值对象, 返回空串
    pub fn guid(&self) -> &str {
        match self {
            CatalogEntity::Category(c) => &c.code,
            CatalogEntity::Product(p) => &p.code,
            CatalogEntity::ProductSku(s) => &s.code,
            CatalogEntity::Customer(c) => &c.guid,
            CatalogEntity::Inventory(i) => &i.sku_code,
            CatalogEntity::ProductAssociation(_) => "",
        }
    }

    /// 作用域标识 (目录/门店/仓库)
    pub fn scope_guid(&self) -> &str {
        match self {
            CatalogEntity::Category(c) => &c.catalog_guid,
            CatalogEntity::Product(p) => &p.catalog_guid,
            CatalogEntity::ProductSku(s) => &s.catalog_guid,
            CatalogEntity::Customer(c) => &c.store_guid,
            CatalogEntity::Inventory(i) => &i.warehouse_guid,
            CatalogEntity::ProductAssociation(a) => &a.catalog_guid,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            CatalogEntity::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_category_mut(&mut self) -> Option<&mut Category> {
        match self {
            CatalogEntity::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<&Product> {
        match self {
            CatalogEntity::Product(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_product_mut(&mut self) -> Option<&mut Product> {
        match self {
            CatalogEntity::Product(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sku(&self) -> Option<&ProductSku> {
        match self {
            CatalogEntity::ProductSku(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sku_mut(&mut self) -> Option<&mut ProductSku> {
        match self {
            CatalogEntity::ProductSku(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_customer(&self) -> Option<&Customer> {
        match self {
            CatalogEntity::Customer(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_customer_mut(&mut self) -> Option<&mut Customer> {
        match self {
            CatalogEntity::Customer(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_inventory(&self) -> Option<&InventoryRecord> {
        match self {
            CatalogEntity::Inventory(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_inventory_mut(&mut self) -> Option<&mut InventoryRecord> {
        match self {
            CatalogEntity::Inventory(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_association(&self) -> Option<&ProductAssociation> {
        match self {
            CatalogEntity::ProductAssociation(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_association_mut(&mut self) -> Option<&mut ProductAssociation> {
        match self {
            CatalogEntity::ProductAssociation(a) => Some(a),
            _ => None,
        }
    }
}
