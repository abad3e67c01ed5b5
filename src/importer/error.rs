// ==========================================
// 营销后台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - CoercionError: 单元格类型转换失败（行级）
// - RowError: 行级错误,记入诊断后继续处理
// - ImportError: 批级错误,中止整批并回滚
// ==========================================

use crate::config::ConfigError;
use crate::domain::import::ImportReport;
use crate::domain::types::FieldType;
use crate::importer::scheduler::ImportPhase;
use crate::repository::RepositoryError;
use thiserror::Error;

// ==========================================
// CoercionError - 类型转换错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("RequiredFieldEmpty: 必填字段 {field} 为空")]
    RequiredFieldEmpty { field: String },

    #[error("ConversionError: 字段 {field} 的值 '{raw}' 无法转换为 {target}")]
    Conversion {
        field: String,
        raw: String,
        target: FieldType,
    },

    #[error("InvalidEnumValue: 字段 {field} 的值 '{raw}' 不在允许范围内 [{allowed}]")]
    InvalidEnumValue {
        field: String,
        raw: String,
        allowed: String,
    },

    #[error("NegativeAmountRejected: 金额字段 {field} 不允许负数 '{raw}'")]
    NegativeAmountRejected { field: String, raw: String },
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("UnsupportedChildType: 判别列的值 '{value}' 不是可导入的子实体")]
    UnsupportedChildType { value: String },

    #[error("UnresolvedParentReference: 未找到 {parent} '{key}'")]
    UnresolvedParentReference { parent: String, key: String },

    #[error("MissingParentKey: 缺少 {parent} 业务键列 '{column}'")]
    MissingParentKey { parent: String, column: String },

    #[error("AmbiguousParentKey: 回退列 '{column}' 无法确定父实体业务键 ({reason})")]
    AmbiguousParentKey { column: String, reason: String },

    #[error("DuplicateNaturalKey: {entity} '{key}' 已在第 {first_line} 行出现")]
    DuplicateNaturalKey {
        entity: String,
        key: String,
        first_line: u64,
    },

    #[error("NaturalKeyExists: {entity} '{key}' 已存在")]
    NaturalKeyExists { entity: String, key: String },

    #[error("InvalidDateRange: {end_field} ({end}) 早于 {start_field} ({start})")]
    InvalidDateRange {
        start_field: String,
        end_field: String,
        start: String,
        end: String,
    },
}

// ==========================================
// ImportError - 批级错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败 ({file}): {message}")]
    FileReadError { file: String, message: String },

    #[error("FileStructureError ({file}): {message}")]
    FileStructure { file: String, message: String },

    #[error("UnknownEntity: 未知实体 '{name}'")]
    UnknownEntity { name: String },

    // ===== 批次结果 =====
    #[error("导入被拒绝: {} 个错误,批次已回滚", .report.errors.len())]
    Rejected { report: Box<ImportReport> },

    #[error("导入已取消,批次已回滚")]
    Cancelled,

    #[error("非法阶段转换: {from} -> {to}")]
    InvalidPhaseTransition { from: ImportPhase, to: ImportPhase },

    // ===== 下层错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 可写入报告的批级错误（文件结构/未知实体）
    pub fn is_diagnosable(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::FileReadError { .. }
                | ImportError::FileStructure { .. }
                | ImportError::UnknownEntity { .. }
        )
    }
}

// ==========================================
// RowFailure - 行处理结果
// ==========================================
// Row: 记入诊断,继续下一行
// Fatal: 中止整批
#[derive(Debug)]
pub enum RowFailure {
    Row(RowError),
    Fatal(ImportError),
}

impl From<RowError> for RowFailure {
    fn from(err: RowError) -> Self {
        RowFailure::Row(err)
    }
}

impl From<CoercionError> for RowFailure {
    fn from(err: CoercionError) -> Self {
        RowFailure::Row(RowError::Coercion(err))
    }
}

impl From<ImportError> for RowFailure {
    fn from(err: ImportError) -> Self {
        RowFailure::Fatal(err)
    }
}

impl From<RepositoryError> for RowFailure {
    fn from(err: RepositoryError) -> Self {
        RowFailure::Fatal(ImportError::Repository(err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
