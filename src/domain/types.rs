// ==========================================
// 商品目录数据导入引擎 - 领域类型定义
// ==========================================
// 职责: 实体类型/导入操作/任务状态/故障等级等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体类型 (Entity Kind)
// ==========================================
// 每种实体类型对应一个字段模式构建器, 由注册表按名称选取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Category,           // 目录分类
    Product,            // 商品
    ProductSku,         // 商品SKU
    Customer,           // 客户
    Inventory,          // 库存记录
    ProductAssociation, // 商品关联 (纯值对象导入)
}

impl EntityKind {
    /// 全部实体类型, 顺序即注册顺序
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Category,
            EntityKind::Product,
            EntityKind::ProductSku,
            EntityKind::Customer,
            EntityKind::Inventory,
            EntityKind::ProductAssociation,
        ]
    }

    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CATEGORY" => Some(EntityKind::Category),
            "PRODUCT" => Some(EntityKind::Product),
            "PRODUCT_SKU" => Some(EntityKind::ProductSku),
            "CUSTOMER" => Some(EntityKind::Customer),
            "INVENTORY" => Some(EntityKind::Inventory),
            "PRODUCT_ASSOCIATION" => Some(EntityKind::ProductAssociation),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "CATEGORY",
            EntityKind::Product => "PRODUCT",
            EntityKind::ProductSku => "PRODUCT_SKU",
            EntityKind::Customer => "CUSTOMER",
            EntityKind::Inventory => "INVENTORY",
            EntityKind::ProductAssociation => "PRODUCT_ASSOCIATION",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 导入操作类型 (Import Operation)
// ==========================================
// 普通枚举 + id/名称查询表, 调用方不依赖单例身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportOperation {
    InsertOrUpdate, // 存在则更新, 否则新增
    Update,         // 仅更新, 不存在报故障
    Insert,         // 仅新增, 已存在报故障
    Delete,         // 删除 (分类级联删除子树)
    ClearThenInsert, // 先清空关联数据再逐行插入
}

impl ImportOperation {
    /// 数据库/历史数据中的数字 id
    pub fn id(&self) -> i64 {
        match self {
            ImportOperation::InsertOrUpdate => 1,
            ImportOperation::Update => 2,
            ImportOperation::Insert => 3,
            ImportOperation::Delete => 4,
            ImportOperation::ClearThenInsert => 5,
        }
    }

    /// 按数字 id 查询
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(ImportOperation::InsertOrUpdate),
            2 => Some(ImportOperation::Update),
            3 => Some(ImportOperation::Insert),
            4 => Some(ImportOperation::Delete),
            5 => Some(ImportOperation::ClearThenInsert),
            _ => None,
        }
    }

    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INSERT_OR_UPDATE" => Some(ImportOperation::InsertOrUpdate),
            "UPDATE" => Some(ImportOperation::Update),
            "INSERT" => Some(ImportOperation::Insert),
            "DELETE" => Some(ImportOperation::Delete),
            "CLEAR_THEN_INSERT" => Some(ImportOperation::ClearThenInsert),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportOperation::InsertOrUpdate => "INSERT_OR_UPDATE",
            ImportOperation::Update => "UPDATE",
            ImportOperation::Insert => "INSERT",
            ImportOperation::Delete => "DELETE",
            ImportOperation::ClearThenInsert => "CLEAR_THEN_INSERT",
        }
    }

    /// 该操作是否会新建实体
    pub fn creates_entities(&self) -> bool {
        matches!(
            self,
            ImportOperation::Insert
                | ImportOperation::InsertOrUpdate
                | ImportOperation::ClearThenInsert
        )
    }

    /// 该操作是否按业务标识定位既有实体 (更新/删除语义)
    pub fn addresses_existing(&self) -> bool {
        matches!(self, ImportOperation::Update | ImportOperation::Delete)
    }
}

impl fmt::Display for ImportOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 任务状态 (Job State)
// ==========================================
// 状态机: QueuedForValidation → Validating → QueuedForImport → Importing
//         → {Finished | Failed | ValidationFailed | Cancelled}
// 任意非终态可在行边界被取消
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    QueuedForValidation, // 等待校验
    Validating,          // 校验中 (只读遍历)
    QueuedForImport,     // 校验通过, 等待导入
    Importing,           // 导入中 (提交遍历)
    Finished,            // 正常完成 (允许存在未超限的坏行)
    Failed,              // 系统性失败或提交阶段超限
    ValidationFailed,    // 数据校验超限, 未写入任何数据
    Cancelled,           // 外部取消
}

impl JobState {
    /// 是否为终态 (终态后不再处理任何行)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished
                | JobState::Failed
                | JobState::ValidationFailed
                | JobState::Cancelled
        )
    }

    /// 状态机合法迁移判定
    pub fn can_transition_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Cancelled {
            // 任意非终态均可取消
            return true;
        }
        matches!(
            (self, next),
            (JobState::QueuedForValidation, JobState::Validating)
                | (JobState::Validating, JobState::ValidationFailed)
                | (JobState::Validating, JobState::QueuedForImport)
                | (JobState::Validating, JobState::Failed)
                | (JobState::QueuedForImport, JobState::Importing)
                | (JobState::QueuedForImport, JobState::Failed)
                | (JobState::Importing, JobState::Finished)
                | (JobState::Importing, JobState::Failed)
        )
    }

    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED_FOR_VALIDATION" => Some(JobState::QueuedForValidation),
            "VALIDATING" => Some(JobState::Validating),
            "QUEUED_FOR_IMPORT" => Some(JobState::QueuedForImport),
            "IMPORTING" => Some(JobState::Importing),
            "FINISHED" => Some(JobState::Finished),
            "FAILED" => Some(JobState::Failed),
            "VALIDATION_FAILED" => Some(JobState::ValidationFailed),
            "CANCELLED" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            JobState::QueuedForValidation => "QUEUED_FOR_VALIDATION",
            JobState::Validating => "VALIDATING",
            JobState::QueuedForImport => "QUEUED_FOR_IMPORT",
            JobState::Importing => "IMPORTING",
            JobState::Finished => "FINISHED",
            JobState::Failed => "FAILED",
            JobState::ValidationFailed => "VALIDATION_FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }

    /// 展示层文案键 (渲染发生在边界, 引擎不产出文案)
    pub fn i18n_key(&self) -> &'static str {
        match self {
            JobState::QueuedForValidation => "import.job.queuedForValidation",
            JobState::Validating => "import.job.validating",
            JobState::QueuedForImport => "import.job.queuedForImport",
            JobState::Importing => "import.job.importing",
            JobState::Finished => "import.job.finished",
            JobState::Failed => "import.job.failed",
            JobState::ValidationFailed => "import.job.validationFailed",
            JobState::Cancelled => "import.job.cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 故障等级 (Fault Severity)
// ==========================================
// 含 error 级故障的行不计入成功行; warning 级不影响计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultSeverity {
    Warning,
    Error,
}

impl fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultSeverity::Warning => write!(f, "WARNING"),
            FaultSeverity::Error => write!(f, "ERROR"),
        }
    }
}

// ==========================================
// 字段值类型 (Value Kind)
// ==========================================
// 字段访问器的类型标签, 同时用于故障参数中的类型名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    Enumeration,
}

impl ValueKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "TEXT",
            ValueKind::Integer => "INTEGER",
            ValueKind::Decimal => "DECIMAL",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::Date => "DATE",
            ValueKind::Enumeration => "ENUMERATION",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 引用类型 (Reference Kind)
// ==========================================
// 引用解析器可解析的对象类型, 是实体类型的超集
// (品牌/税码/仓库只作为引用数据存在, 不可导入)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Category,
    Product,
    ProductSku,
    Customer,
    Brand,
    TaxCode,
    Warehouse,
}

impl ReferenceKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReferenceKind::Category => "CATEGORY",
            ReferenceKind::Product => "PRODUCT",
            ReferenceKind::ProductSku => "PRODUCT_SKU",
            ReferenceKind::Customer => "CUSTOMER",
            ReferenceKind::Brand => "BRAND",
            ReferenceKind::TaxCode => "TAX_CODE",
            ReferenceKind::Warehouse => "WAREHOUSE",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 商品可售性 (Availability Rule)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityRule {
    AlwaysAvailable,       // 常备
    AvailableWhenInStock,  // 有库存可售
    AvailableForPreOrder,  // 可预订
    AvailableForBackOrder, // 可缺货下单
}

impl AvailabilityRule {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ALWAYS_AVAILABLE" => Some(AvailabilityRule::AlwaysAvailable),
            "AVAILABLE_WHEN_IN_STOCK" => Some(AvailabilityRule::AvailableWhenInStock),
            "AVAILABLE_FOR_PRE_ORDER" => Some(AvailabilityRule::AvailableForPreOrder),
            "AVAILABLE_FOR_BACK_ORDER" => Some(AvailabilityRule::AvailableForBackOrder),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AvailabilityRule::AlwaysAvailable => "ALWAYS_AVAILABLE",
            AvailabilityRule::AvailableWhenInStock => "AVAILABLE_WHEN_IN_STOCK",
            AvailabilityRule::AvailableForPreOrder => "AVAILABLE_FOR_PRE_ORDER",
            AvailabilityRule::AvailableForBackOrder => "AVAILABLE_FOR_BACK_ORDER",
        }
    }
}

impl fmt::Display for AvailabilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 客户状态 (Customer Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,          // 正常
    Disabled,        // 停用
    PendingApproval, // 待审核
}

impl CustomerStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(CustomerStatus::Active),
            "DISABLED" => Some(CustomerStatus::Disabled),
            "PENDING_APPROVAL" => Some(CustomerStatus::PendingApproval),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "ACTIVE",
            CustomerStatus::Disabled => "DISABLED",
            CustomerStatus::PendingApproval => "PENDING_APPROVAL",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 商品关联类型 (Association Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationKind {
    CrossSell,   // 交叉销售
    UpSell,      // 向上销售
    Warranty,    // 延保
    Accessory,   // 配件
    Replacement, // 替代品
}

impl AssociationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CROSS_SELL" => Some(AssociationKind::CrossSell),
            "UP_SELL" => Some(AssociationKind::UpSell),
            "WARRANTY" => Some(AssociationKind::Warranty),
            "ACCESSORY" => Some(AssociationKind::Accessory),
            "REPLACEMENT" => Some(AssociationKind::Replacement),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssociationKind::CrossSell => "CROSS_SELL",
            AssociationKind::UpSell => "UP_SELL",
            AssociationKind::Warranty => "WARRANTY",
            AssociationKind::Accessory => "ACCESSORY",
            AssociationKind::Replacement => "REPLACEMENT",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::all() {
            assert_eq!(EntityKind::from_str(kind.to_db_str()), Some(*kind));
        }
        assert_eq!(EntityKind::from_str("NOPE"), None);
    }

    #[test]
    fn test_operation_id_roundtrip() {
        for op in [
            ImportOperation::InsertOrUpdate,
            ImportOperation::Update,
            ImportOperation::Insert,
            ImportOperation::Delete,
            ImportOperation::ClearThenInsert,
        ] {
            assert_eq!(ImportOperation::from_id(op.id()), Some(op));
            assert_eq!(ImportOperation::from_str(op.to_db_str()), Some(op));
        }
        assert_eq!(ImportOperation::from_id(99), None);
    }

    #[test]
    fn test_job_state_legal_transitions() {
        use JobState::*;

        assert!(QueuedForValidation.can_transition_to(Validating));
        assert!(Validating.can_transition_to(QueuedForImport));
        assert!(Validating.can_transition_to(ValidationFailed));
        assert!(QueuedForImport.can_transition_to(Importing));
        assert!(Importing.can_transition_to(Finished));
        assert!(Importing.can_transition_to(Failed));
    }

    #[test]
    fn test_job_state_illegal_transitions() {
        use JobState::*;

        // 不可跳过校验直接导入
        assert!(!QueuedForValidation.can_transition_to(Importing));
        assert!(!Validating.can_transition_to(Finished));
        // 终态不可再迁移
        assert!(!Finished.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Validating));
    }

    #[test]
    fn test_any_non_terminal_state_cancellable() {
        use JobState::*;

        for state in [QueuedForValidation, Validating, QueuedForImport, Importing] {
            assert!(state.can_transition_to(Cancelled), "{} 应可取消", state);
        }
    }

    #[test]
    fn test_terminal_states() {
        use JobState::*;

        for state in [Finished, Failed, ValidationFailed, Cancelled] {
            assert!(state.is_terminal());
        }
        for state in [QueuedForValidation, Validating, QueuedForImport, Importing] {
            assert!(!state.is_terminal());
        }
    }
}
