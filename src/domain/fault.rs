// ==========================================
// 商品目录数据导入引擎 - 行级故障模型
// ==========================================
// 职责: 结构化故障 (故障码 + 位置参数) 的定义与累积
// 红线: 引擎内部不渲染文案, 文案渲染只发生在 i18n 边界
// ==========================================

use crate::domain::types::FaultSeverity;
use serde::{Deserialize, Serialize};

// ==========================================
// 故障码
// ==========================================
// 故障码同时是文案键, 与 locales/*.yml 对齐
pub mod codes {
    /// 必填字段为空
    pub const NOT_NULL: &str = "import.csvFile.badRow.notNull";
    /// 业务标识格式非法
    pub const WRONG_GUID: &str = "import.csvFile.badRow.wrongGuid";
    /// 值无法解析为目标类型
    pub const BAD_VALUE: &str = "import.csvFile.badRow.badValue";
    /// 值超出长度上限
    pub const TOO_LONG: &str = "import.csvFile.badRow.tooLong";
    /// 引用对象不存在
    pub const UNRESOLVED_REFERENCE: &str = "import.csvFile.badRow.unresolvedReference";
    /// 值超出领域对象允许的范围
    pub const OUT_OF_RANGE: &str = "import.csvFile.badRow.outOfRange";
    /// 促销价高于目录价
    pub const SALE_PRICE_ABOVE_LIST: &str = "import.csvFile.badRow.salePriceAboveList";
    /// 新增时业务标识已存在
    pub const ALREADY_EXISTS: &str = "import.csvFile.badRow.alreadyExists";
    /// 更新/删除时业务标识不存在
    pub const DOES_NOT_EXIST: &str = "import.csvFile.badRow.doesNotExist";
    /// 行列数与标题行不一致
    pub const WRONG_COLUMNS_NUMBER: &str = "import.csvFile.badRow.wrongColumnsNumber";
    /// 其他绑定失败
    pub const BIND_ERROR: &str = "import.csvFile.badRow.bindError";
}

// ==========================================
// Fault - 单条故障
// ==========================================
// 参数为位置参数, 顺序即文案占位符 %{0}, %{1}, ... 的顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: String,
    pub args: Vec<String>,
    pub severity: FaultSeverity,
}

impl Fault {
    pub fn new(code: &str, args: Vec<String>, severity: FaultSeverity) -> Self {
        Self {
            code: code.to_string(),
            args,
            severity,
        }
    }

    /// error 级故障 (所在行计入失败行)
    pub fn error(code: &str, args: Vec<String>) -> Self {
        Self::new(code, args, FaultSeverity::Error)
    }

    /// warning 级故障 (记录但不影响计数)
    pub fn warning(code: &str, args: Vec<String>) -> Self {
        Self::new(code, args, FaultSeverity::Warning)
    }

    pub fn is_error(&self) -> bool {
        self.severity == FaultSeverity::Error
    }
}

// ==========================================
// FaultSink - 行内故障累积器
// ==========================================
// 一行绑定过程中所有字段的故障先进沉降器, 行结束后整体取出
#[derive(Debug, Default)]
pub struct FaultSink {
    faults: Vec<Fault>,
}

impl FaultSink {
    pub fn new() -> Self {
        Self { faults: Vec::new() }
    }

    pub fn push(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn record_error(&mut self, code: &str, args: Vec<String>) {
        self.push(Fault::error(code, args));
    }

    pub fn record_warning(&mut self, code: &str, args: Vec<String>) {
        self.push(Fault::warning(code, args));
    }

    /// 是否存在 error 级故障
    pub fn has_error(&self) -> bool {
        self.faults.iter().any(Fault::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    /// 取出全部故障, 沉降器清空复用
    pub fn drain(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.faults)
    }
}
