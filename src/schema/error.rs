// ==========================================
// 商品目录数据导入引擎 - 模式层错误类型
// ==========================================
// 职责: 配置级错误 (任务不启动), 与行级故障严格区分
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 模式层错误类型
///
/// 这些错误属于配置错误: 出现即终止任务构建/启动, 不会进入
/// 坏行记录, 也不消耗故障阈值
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("模式需要元对象: {0}")]
    MissingMetaObject(String),

    #[error("元对象类型不匹配: 期望 {expected}, 实际 {actual}")]
    WrongMetaObject { expected: String, actual: String },

    #[error("模式不接受元对象: {kind} 收到 {actual}")]
    UnexpectedMetaObject { kind: String, actual: String },

    #[error("商品类型不是多SKU, 无法构建SKU模式: {0}")]
    NotMultiSku(String),

    #[error("未知字段: {0}")]
    UnknownField(String),

    #[error("字段重名: {0}")]
    DuplicateField(String),

    #[error("未注册的实体类型: {0}")]
    UnknownEntityKind(String),

    #[error("实体类型不支持该操作: kind={kind} op={op}")]
    UnsupportedOperation { kind: String, op: String },

    #[error("列映射重复使用列号: {0}")]
    DuplicateColumnIndex(usize),

    #[error("必填字段未映射: {0}")]
    RequiredFieldUnmapped(String),

    #[error("业务标识字段未映射: {0}")]
    GuidFieldUnmapped(String),
}

/// Result 类型别名
pub type SchemaResult<T> = Result<T, SchemaError>;
