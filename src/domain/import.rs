// ==========================================
// 营销后台 - 导入领域模型
// ==========================================
// 职责: 原始行记录 / 暂存实体 / 外键绑定 / 导入报告
// 红线: 暂存实体在整批校验通过前不得落库
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::domain::types::DiagnosticLevel;
use crate::domain::value::TypedValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ==========================================
// RawRecord - 原始行记录
// ==========================================
// 生命周期: 文件解析 → 转换为 StagedEntity 后丢弃
// 保留列顺序,便于诊断输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub line: u64,
    pub cells: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(line: u64) -> Self {
        Self {
            line,
            cells: Vec::new(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    /// 按列名取值（不区分大小写）
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(column))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

// ==========================================
// StagedEntity - 暂存实体
// ==========================================
// 字段顺序与描述符一致;主键在暂存时生成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedEntity {
    pub kind: EntityKind,
    pub id: String,
    pub values: Vec<(String, TypedValue)>,
    pub source_file: String,
    pub source_line: u64,
}

impl StagedEntity {
    pub fn new(descriptor: &EntityDescriptor, source_file: &str, source_line: u64) -> Self {
        let id = Uuid::new_v4().to_string();
        let values = descriptor
            .fields
            .iter()
            .map(|f| {
                let value = if f.is_primary {
                    TypedValue::Text(id.clone())
                } else {
                    TypedValue::Null
                };
                (f.name.to_string(), value)
            })
            .collect();

        Self {
            kind: descriptor.kind,
            id,
            values,
            source_file: source_file.to_string(),
            source_line,
        }
    }

    pub fn get(&self, field: &str) -> Option<&TypedValue> {
        self.values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// 写入字段值;字段不存在时返回 false
    pub fn set(&mut self, field: &str, value: TypedValue) -> bool {
        match self
            .values
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
        {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn natural_key(&self, descriptor: &EntityDescriptor) -> Option<&str> {
        descriptor
            .natural_key
            .and_then(|k| self.get(k))
            .and_then(|v| v.as_text())
    }
}

// ==========================================
// ForeignKeyBinding - 外键绑定
// ==========================================
// 由外键解析器产出,落库前回写到子实体的外键字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyBinding {
    pub local_field: String,
    pub parent_kind: EntityKind,
    pub parent_id: String,
}

impl ForeignKeyBinding {
    pub fn apply(&self, child: &mut StagedEntity) -> bool {
        child.set(&self.local_field, TypedValue::Text(self.parent_id.clone()))
    }
}

// ==========================================
// ImportDiagnostic - 诊断信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDiagnostic {
    pub level: DiagnosticLevel,
    pub file: String,
    /// 行号（表头为第 1 行）;文件级问题为 None
    pub line: Option<u64>,
    pub message: String,
}

impl std::fmt::Display for ImportDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] {}:{} {}", self.level, self.file, line, self.message),
            None => write!(f, "[{}] {} {}", self.level, self.file, self.message),
        }
    }
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
// 每批一个;回滚时计数作废,诊断完整保留
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub inserted_counts: BTreeMap<String, usize>,
    pub seeded_counts: BTreeMap<String, usize>,
    pub errors: Vec<ImportDiagnostic>,
    pub warnings: Vec<ImportDiagnostic>,
    pub elapsed_ms: u64,
}

impl ImportReport {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, file: &str, line: Option<u64>, message: impl Into<String>) {
        self.errors.push(ImportDiagnostic {
            level: DiagnosticLevel::Error,
            file: file.to_string(),
            line,
            message: message.into(),
        });
    }

    pub fn record_warning(&mut self, file: &str, line: Option<u64>, message: impl Into<String>) {
        self.warnings.push(ImportDiagnostic {
            level: DiagnosticLevel::Warning,
            file: file.to_string(),
            line,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn increment(&mut self, kind: EntityKind) {
        *self.inserted_counts.entry(kind.name().to_string()).or_insert(0) += 1;
    }

    pub fn add_seeded(&mut self, kind: EntityKind, count: usize) {
        if count > 0 {
            *self.seeded_counts.entry(kind.name().to_string()).or_insert(0) += count;
        }
    }

    pub fn inserted(&self, kind: EntityKind) -> usize {
        self.inserted_counts.get(kind.name()).copied().unwrap_or(0)
    }

    pub fn total_inserted(&self) -> usize {
        self.inserted_counts.values().sum()
    }

    /// 回滚后计数作废
    pub fn void_counts(&mut self) {
        self.inserted_counts.clear();
        self.seeded_counts.clear();
    }
}
