// ==========================================
// 营销后台 - 实体操作注册表
// ==========================================
// 职责: 实体种类 → 类型化操作（暂存前处理 / 基线数据）
// 说明: 启动时构建一次,导入过程中只读
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::domain::import::StagedEntity;
use crate::domain::types::EnumType;
use crate::domain::value::TypedValue;
use crate::importer::error::{ImportError, ImportResult, RowError};
use chrono::NaiveDateTime;
use std::collections::HashMap;

// ==========================================
// EntityHandler Trait
// ==========================================
pub trait EntityHandler: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// 暂存前的实体级校验与规范化（字段已完成类型转换）
    ///
    /// # 参数
    /// - synthesized: 本行自动生成的字段名
    fn prepare_stage(
        &self,
        _entity: &mut StagedEntity,
        _synthesized: &[&str],
    ) -> Result<(), RowError> {
        Ok(())
    }

    /// 基线种子数据（无基线的实体返回空）
    fn baseline(&self, _descriptor: &EntityDescriptor, _now: NaiveDateTime) -> Vec<StagedEntity> {
        Vec::new()
    }
}

// ==========================================
// Customer
// ==========================================
struct CustomerHandler;

impl EntityHandler for CustomerHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::Customer
    }

    // 邮箱统一小写
    fn prepare_stage(
        &self,
        entity: &mut StagedEntity,
        _synthesized: &[&str],
    ) -> Result<(), RowError> {
        let normalized = entity
            .get("Email")
            .and_then(|v| v.as_text())
            .map(|email| email.trim().to_lowercase());
        if let Some(email) = normalized {
            entity.set("Email", TypedValue::Text(email));
        }
        Ok(())
    }

    fn baseline(&self, descriptor: &EntityDescriptor, now: NaiveDateTime) -> Vec<StagedEntity> {
        (1..=3)
            .map(|i| {
                let mut e = StagedEntity::new(descriptor, "baseline", 0);
                e.set("Number", TypedValue::Text(format!("CUS-BASE-{:02}", i)));
                e.set("Name", TypedValue::Text(format!("Baseline Customer {}", i)));
                e.set(
                    "Segment",
                    TypedValue::Enum {
                        enum_type: EnumType::CustomerSegment,
                        code: 0,
                    },
                );
                e.set("CustomerDate", TypedValue::DateTime(now));
                e
            })
            .collect()
    }
}

// ==========================================
// Campaign
// ==========================================
struct CampaignHandler;

impl EntityHandler for CampaignHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::Campaign
    }

    // 结束日期不得早于开始日期;开始日期为自动生成时收敛到结束日期
    fn prepare_stage(
        &self,
        entity: &mut StagedEntity,
        synthesized: &[&str],
    ) -> Result<(), RowError> {
        let (start, end) = match (entity.get("CampaignDate"), entity.get("EndDate")) {
            (Some(TypedValue::Date(start)), Some(TypedValue::Date(end))) => (*start, *end),
            _ => return Ok(()),
        };
        if end >= start {
            return Ok(());
        }
        if synthesized.contains(&"CampaignDate") {
            entity.set("CampaignDate", TypedValue::Date(end));
            return Ok(());
        }
        Err(RowError::InvalidDateRange {
            start_field: "CampaignDate".to_string(),
            end_field: "EndDate".to_string(),
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    fn baseline(&self, descriptor: &EntityDescriptor, now: NaiveDateTime) -> Vec<StagedEntity> {
        (1..=3)
            .map(|i| {
                let mut e = StagedEntity::new(descriptor, "baseline", 0);
                e.set("Number", TypedValue::Text(format!("CMP-BASE-{:02}", i)));
                e.set("Title", TypedValue::Text(format!("Baseline Campaign {}", i)));
                e.set(
                    "Status",
                    TypedValue::Enum {
                        enum_type: EnumType::CampaignStatus,
                        code: 0,
                    },
                );
                e.set("CampaignDate", TypedValue::Date(now.date()));
                e.set("TargetAmount", TypedValue::Decimal(1000.0));
                e.set("IsActive", TypedValue::Boolean(false));
                e
            })
            .collect()
    }
}

// ==========================================
// Budget / Expense（无基线,无额外规则）
// ==========================================
struct BudgetHandler;

impl EntityHandler for BudgetHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::Budget
    }
}

struct ExpenseHandler;

impl EntityHandler for ExpenseHandler {
    fn kind(&self) -> EntityKind {
        EntityKind::Expense
    }
}

// ==========================================
// EntityRegistry
// ==========================================
pub struct EntityRegistry {
    handlers: HashMap<EntityKind, Box<dyn EntityHandler>>,
}

impl EntityRegistry {
    pub fn builtin() -> Self {
        let handlers: Vec<Box<dyn EntityHandler>> = vec![
            Box::new(CustomerHandler),
            Box::new(CampaignHandler),
            Box::new(BudgetHandler),
            Box::new(ExpenseHandler),
        ];
        Self {
            handlers: handlers.into_iter().map(|h| (h.kind(), h)).collect(),
        }
    }

    pub fn handler(&self, kind: EntityKind) -> ImportResult<&dyn EntityHandler> {
        self.handlers
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| ImportError::InternalError(format!("实体 {} 未注册操作", kind)))
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
