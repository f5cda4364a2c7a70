// ==========================================
// 商品目录数据导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::{CategoryType, ProductType, StoreContext};
use crate::engine::CollaboratorError;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入引擎与服务层所需的配置读取接口
// 实现者: ConfigManager（从 config_scope/config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 门店上下文配置 =====

    /// 获取门店上下文（语言/币种集合与必填项）
    ///
    /// # 参数
    /// - store_guid: 门店标识; None 或该门店无覆写时取全局配置
    ///
    /// # 返回
    /// - StoreContext: 支持语言、必填语言、支持币种、必填币种
    ///
    /// # 默认值
    /// - 语言 ["en"]、必填语言 "en"、币种 ["USD"]、必填币种 "USD"
    ///
    /// # 用途
    /// - 驱动字段模式的按语言/按币种展开
    async fn get_store_context(
        &self,
        store_guid: Option<&str>,
    ) -> Result<StoreContext, CollaboratorError>;

    // ===== 任务默认值配置 =====

    /// 获取任务的默认故障容忍数
    ///
    /// # 返回
    /// - u32: 新建任务未指定时采用的 max_allowed_faults
    ///
    /// # 默认值
    /// - 0（零容忍）
    async fn get_default_max_allowed_faults(&self) -> Result<u32, CollaboratorError>;

    // ===== 元对象登记表 =====

    /// 按名称读取已登记的分类类型
    ///
    /// # 返回
    /// - Some(CategoryType): 已登记
    /// - None: 未登记
    ///
    /// # 用途
    /// - 分类任务按 dependent_guid 解析其属性字段集
    async fn get_category_type(&self, name: &str)
        -> Result<Option<CategoryType>, CollaboratorError>;

    /// 按名称读取已登记的商品类型
    ///
    /// # 返回
    /// - Some(ProductType): 已登记
    /// - None: 未登记
    ///
    /// # 用途
    /// - 商品/SKU 任务按 dependent_guid 解析其属性与选项字段集
    async fn get_product_type(&self, name: &str)
        -> Result<Option<ProductType>, CollaboratorError>;
}
