// ==========================================
// 营销后台 - 领域类型定义
// ==========================================
// 职责: 字段语义类型 + 枚举值域（代码 ↔ 名称）
// 约束: 实体种类为封闭集合,值域在编译期确定
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 枚举成员
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMember {
    pub code: i32,
    pub name: &'static str,
}

const CAMPAIGN_STATUS: &[EnumMember] = &[
    EnumMember { code: 0, name: "Draft" },
    EnumMember { code: 1, name: "Active" },
    EnumMember { code: 2, name: "Paused" },
    EnumMember { code: 3, name: "Completed" },
    EnumMember { code: 4, name: "Cancelled" },
];

const BUDGET_CATEGORY: &[EnumMember] = &[
    EnumMember { code: 0, name: "Media" },
    EnumMember { code: 1, name: "Production" },
    EnumMember { code: 2, name: "Events" },
    EnumMember { code: 3, name: "Digital" },
    EnumMember { code: 4, name: "Other" },
];

const EXPENSE_CATEGORY: &[EnumMember] = &[
    EnumMember { code: 0, name: "Travel" },
    EnumMember { code: 1, name: "Advertising" },
    EnumMember { code: 2, name: "Supplies" },
    EnumMember { code: 3, name: "Services" },
    EnumMember { code: 4, name: "Other" },
];

const CUSTOMER_SEGMENT: &[EnumMember] = &[
    EnumMember { code: 0, name: "Retail" },
    EnumMember { code: 1, name: "Wholesale" },
    EnumMember { code: 2, name: "Enterprise" },
    EnumMember { code: 3, name: "Government" },
];

// ==========================================
// 枚举类型 (Enum Type)
// ==========================================
// 导入时接受整数代码或名称（不区分大小写）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnumType {
    CampaignStatus,
    BudgetCategory,
    ExpenseCategory,
    CustomerSegment,
}

impl EnumType {
    /// 值域（按代码升序）
    pub fn members(&self) -> &'static [EnumMember] {
        match self {
            EnumType::CampaignStatus => CAMPAIGN_STATUS,
            EnumType::BudgetCategory => BUDGET_CATEGORY,
            EnumType::ExpenseCategory => EXPENSE_CATEGORY,
            EnumType::CustomerSegment => CUSTOMER_SEGMENT,
        }
    }

    pub fn by_code(&self, code: i32) -> Option<EnumMember> {
        self.members().iter().copied().find(|m| m.code == code)
    }

    pub fn by_name(&self, name: &str) -> Option<EnumMember> {
        self.members()
            .iter()
            .copied()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// 允许值列表（用于错误提示）,例如 "0=Draft, 1=Active"
    pub fn allowed_values(&self) -> String {
        self.members()
            .iter()
            .map(|m| format!("{}={}", m.code, m.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumType::CampaignStatus => write!(f, "CampaignStatus"),
            EnumType::BudgetCategory => write!(f, "BudgetCategory"),
            EnumType::ExpenseCategory => write!(f, "ExpenseCategory"),
            EnumType::CustomerSegment => write!(f, "CustomerSegment"),
        }
    }
}

// ==========================================
// 字段语义类型 (Field Type)
// ==========================================
// Amount: 金额类字段,不允许负数
// Identifier: 内部标识（主键/外键）,由系统生成或由解析器回写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Identifier,
    Text,
    Integer,
    Decimal,
    Amount,
    Date,
    DateTime,
    Boolean,
    Enum(EnumType),
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Decimal | FieldType::Amount
        )
    }

    /// SQLite 列类型
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Integer | FieldType::Boolean => "INTEGER",
            FieldType::Decimal | FieldType::Amount => "REAL",
            _ => "TEXT",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Identifier => write!(f, "identifier"),
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Decimal => write!(f, "decimal"),
            FieldType::Amount => write!(f, "amount"),
            FieldType::Date => write!(f, "date"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Enum(e) => write!(f, "enum {}", e),
        }
    }
}

// ==========================================
// 诊断级别 (Diagnostic Level)
// ==========================================
// Error: 触发整批回滚
// Warning: 仅记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "ERROR"),
            DiagnosticLevel::Warning => write!(f, "WARNING"),
        }
    }
}
