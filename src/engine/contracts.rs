// ==========================================
// 商品目录数据导入引擎 - 协作方接口
// ==========================================
// 职责: 定义绑定与执行阶段依赖的外部协作面 (不含业务逻辑)
// 红线: 引擎不拼 SQL, 所有数据访问经由这些接口
// ==========================================

use std::error::Error;

use crate::domain::{CatalogEntity, EntityKind, ReferenceKind};

/// 协作方错误的统一盒装形态, 保持接口实现方可跨线程传递
pub type CollaboratorError = Box<dyn Error + Send + Sync>;

// ==========================================
// ReferenceResolver Trait
// ==========================================
// 用途: 字段访问器解析跨实体引用 (父分类/默认分类/品牌/税码等)
// 实现者: SqliteCatalogStore
pub trait ReferenceResolver: Send + Sync {
    /// 按业务标识查找实体
    ///
    /// # 参数
    /// - `kind`: 引用目标类型
    /// - `guid`: 业务标识
    /// - `scope_guid`: 作用域限定, None 表示不限作用域
    ///
    /// # 返回
    /// - Ok(Some): 找到实体 (仅目录实体类引用会返回实体本体)
    /// - Ok(None): 未找到
    /// - Err: 协作方系统错误, 任务直接失败而非记坏行
    fn find_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<Option<CatalogEntity>, CollaboratorError>;

    /// 按业务标识判断存在性
    ///
    /// 品牌/税码/仓库等纯引用数据只有存在性可查
    fn exists_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<bool, CollaboratorError>;
}

// ==========================================
// EntityStore Trait
// ==========================================
// 用途: 任务执行器落地实体的读写删
// 实现者: SqliteCatalogStore
pub trait EntityStore: Send + Sync {
    /// 按 (类型, 业务标识, 作用域) 加载实体
    fn load(
        &self,
        kind: EntityKind,
        guid: &str,
        scope_guid: &str,
    ) -> Result<Option<CatalogEntity>, CollaboratorError>;

    /// 保存实体 (插入或整体覆盖; 商品关联变体为追加一条)
    fn save(&self, entity: &CatalogEntity) -> Result<(), CollaboratorError>;

    /// 删除实体
    fn delete(
        &self,
        kind: EntityKind,
        guid: &str,
        scope_guid: &str,
    ) -> Result<(), CollaboratorError>;

    /// 删除分类及其整棵子树
    ///
    /// 分类删除语义是树删除, 子分类一并移除
    fn remove_category_tree(
        &self,
        code: &str,
        catalog_guid: &str,
    ) -> Result<(), CollaboratorError>;

    /// 清空某源商品名下的全部关联 (清空重建操作的前半步)
    fn clear_product_associations(
        &self,
        source_product_code: &str,
        catalog_guid: &str,
    ) -> Result<(), CollaboratorError>;
}
