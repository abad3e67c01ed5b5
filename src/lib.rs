// ==========================================
// 营销后台 - 核心库
// ==========================================
// 职责: 基于实体描述符的表格数据导入引擎
// 技术栈: Rust + SQLite
// 红线: 一批文件要么整体落库,要么零记录可见
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体描述符与导入中间产物
pub mod domain;

// 数据仓储层 - 批次工作单元
pub mod repository;

// 导入层 - 分类/转换/外键解析/调度
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    EntityDescriptor, EntityKind, FieldDescriptor, FieldType, ImportDiagnostic, ImportReport,
    TypedValue,
};

// 导入
pub use importer::{BatchImporter, ImportError, ImportPhase, ImportSource, TransactionalImporter};

// 仓储 / 配置
pub use config::{ConfigManager, ImportConfig};
pub use repository::{EntityStore, SqliteEntityStore};

// API
pub use api::{ApiError, ImportApi, ImportApiResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "营销后台数据导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
