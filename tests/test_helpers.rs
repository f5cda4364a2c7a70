// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供集成测试所需的应用装配、临时数据文件等功能
// ==========================================

use commerce_import_engine::app::AppState;
use std::io::Write;
use tempfile::{Builder, NamedTempFile, TempDir};

/// 在临时目录上装配完整的应用状态
///
/// # 返回
/// - AppState: 共享连接上的仓储、配置与导入服务
/// - TempDir: 数据库所在目录（需要保持存活）
pub fn create_test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().expect("创建临时目录失败");
    let db_path = dir
        .path()
        .join("commerce_import_test.db")
        .to_string_lossy()
        .to_string();
    let state = AppState::new(db_path).expect("初始化 AppState 失败");
    (state, dir)
}

/// 写出一个临时 CSV 数据文件 (.csv 后缀, 文件需保持存活)
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时 CSV 失败");
    for line in lines {
        writeln!(file, "{}", line).expect("写入临时 CSV 失败");
    }
    file.flush().expect("刷新临时 CSV 失败");
    file
}

/// 静态数据文件的绝对路径
pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}
