// ==========================================
// 营销后台 - 实体描述符
// ==========================================
// 职责: 可导入实体的静态注册表（字段/类型/外键/业务键）
// 红线: 描述符构建后不可变,导入代码不依赖运行期反射
// ==========================================

use crate::domain::types::{EnumType, FieldType};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// EntityKind - 可导入实体种类（封闭集合）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Customer,
    Campaign,
    Budget,
    Expense,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Customer,
        EntityKind::Campaign,
        EntityKind::Budget,
        EntityKind::Expense,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Customer => "Customer",
            EntityKind::Campaign => "Campaign",
            EntityKind::Budget => "Budget",
            EntityKind::Expense => "Expense",
        }
    }

    /// 按名称查找（不区分大小写）
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// 构建该实体的描述符
    pub fn descriptor(&self) -> EntityDescriptor {
        match self {
            EntityKind::Customer => EntityDescriptor {
                kind: *self,
                table_name: "customer",
                natural_key: Some("Number"),
                fields: vec![
                    FieldDescriptor::primary("Id"),
                    FieldDescriptor::required("Number", FieldType::Text),
                    FieldDescriptor::required("Name", FieldType::Text),
                    FieldDescriptor::optional("Email", FieldType::Text),
                    FieldDescriptor::required(
                        "Segment",
                        FieldType::Enum(EnumType::CustomerSegment),
                    ),
                    FieldDescriptor::required("CustomerDate", FieldType::DateTime),
                ],
                foreign_keys: vec![],
            },
            EntityKind::Campaign => EntityDescriptor {
                kind: *self,
                table_name: "campaign",
                natural_key: Some("Number"),
                fields: vec![
                    FieldDescriptor::primary("Id"),
                    FieldDescriptor::required("Number", FieldType::Text),
                    FieldDescriptor::required("Title", FieldType::Text),
                    FieldDescriptor::required("Status", FieldType::Enum(EnumType::CampaignStatus)),
                    FieldDescriptor::required("CampaignDate", FieldType::Date),
                    FieldDescriptor::optional("EndDate", FieldType::Date),
                    FieldDescriptor::required("TargetAmount", FieldType::Amount),
                    FieldDescriptor::required("IsActive", FieldType::Boolean),
                    FieldDescriptor::foreign_key("CustomerId", true),
                ],
                foreign_keys: vec![ForeignKeyDescriptor {
                    local_field: "CustomerId",
                    referenced_entity: "Customer",
                    referenced_natural_key: "Number",
                }],
            },
            EntityKind::Budget => EntityDescriptor {
                kind: *self,
                table_name: "budget",
                natural_key: None,
                fields: vec![
                    FieldDescriptor::primary("Id"),
                    FieldDescriptor::foreign_key("CampaignId", false),
                    FieldDescriptor::required("Amount", FieldType::Amount),
                    FieldDescriptor::required("BudgetDate", FieldType::Date),
                    FieldDescriptor::required("Category", FieldType::Enum(EnumType::BudgetCategory)),
                    FieldDescriptor::optional("Notes", FieldType::Text),
                ],
                foreign_keys: vec![ForeignKeyDescriptor {
                    local_field: "CampaignId",
                    referenced_entity: "Campaign",
                    referenced_natural_key: "Number",
                }],
            },
            EntityKind::Expense => EntityDescriptor {
                kind: *self,
                table_name: "expense",
                natural_key: None,
                fields: vec![
                    FieldDescriptor::primary("Id"),
                    FieldDescriptor::foreign_key("CampaignId", false),
                    FieldDescriptor::required("Amount", FieldType::Amount),
                    FieldDescriptor::required("ExpenseDate", FieldType::Date),
                    FieldDescriptor::required(
                        "Category",
                        FieldType::Enum(EnumType::ExpenseCategory),
                    ),
                    FieldDescriptor::required("Vendor", FieldType::Text),
                    FieldDescriptor::required("IsApproved", FieldType::Boolean),
                    FieldDescriptor::required("Quantity", FieldType::Integer),
                ],
                foreign_keys: vec![ForeignKeyDescriptor {
                    local_field: "CampaignId",
                    referenced_entity: "Campaign",
                    referenced_natural_key: "Number",
                }],
            },
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==========================================
// FieldDescriptor - 字段描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub is_primary: bool,
    pub is_foreign_key: bool,
}

impl FieldDescriptor {
    pub fn primary(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Identifier,
            nullable: false,
            is_primary: true,
            is_foreign_key: false,
        }
    }

    pub fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
            is_primary: false,
            is_foreign_key: false,
        }
    }

    pub fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, field_type)
        }
    }

    pub fn foreign_key(name: &'static str, nullable: bool) -> Self {
        Self {
            name,
            field_type: FieldType::Identifier,
            nullable,
            is_primary: false,
            is_foreign_key: true,
        }
    }
}

// ==========================================
// ForeignKeyDescriptor - 外键描述
// ==========================================
// 子实体通过父实体的业务键（而非内部 ID）关联
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDescriptor {
    pub local_field: &'static str,
    pub referenced_entity: &'static str,
    pub referenced_natural_key: &'static str,
}

impl ForeignKeyDescriptor {
    /// 子文件中承载父业务键的约定列名,例如 "Campaign_Number"
    pub fn expected_key_column(&self) -> String {
        format!("{}_{}", self.referenced_entity, self.referenced_natural_key)
    }
}

// ==========================================
// EntityDescriptor - 实体描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table_name: &'static str,
    pub natural_key: Option<&'static str>,
    pub fields: Vec<FieldDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl EntityDescriptor {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// 按字段名查找（不区分大小写）
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn is_natural_key(&self, field_name: &str) -> bool {
        self.natural_key
            .map(|k| k.eq_ignore_ascii_case(field_name))
            .unwrap_or(false)
    }

    pub fn has_foreign_keys(&self) -> bool {
        !self.foreign_keys.is_empty()
    }
}
