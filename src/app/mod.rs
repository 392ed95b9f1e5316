// ==========================================
// 精酿啤酒灌装台账系统 - 应用层
// ==========================================
// 职责: 组装应用状态, 连接入口程序与后端
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
