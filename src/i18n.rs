// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// 注意: 引擎内部只携带故障码与位置参数, 文案渲染全部发生在这里
// ==========================================

use crate::domain::Fault;

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use commerce_import_engine::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带命名参数）
///
/// # 示例
/// ```no_run
/// use commerce_import_engine::i18n::t_with_args;
/// let msg = t_with_args("import.csvFile.badRow.notNull", &[("0", "categoryCode")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

/// 渲染一条导入故障为当前语言的文本
///
/// # 规则
/// - 故障码即文案键, 位置参数依次填充 %{0}, %{1}, ...
/// - 该函数只应在展示边界调用, 引擎层不渲染文案
pub fn render_fault(fault: &Fault) -> String {
    let mut result = rust_i18n::t!(fault.code.as_str()).to_string();
    for (idx, arg) in fault.args.iter().enumerate() {
        let placeholder = format!("%{{{}}}", idx);
        result = result.replace(&placeholder, arg);
    }
    result
}
