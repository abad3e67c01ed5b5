// ==========================================
// 营销后台 - 外键解析器
// ==========================================
// 流程（按父实体业务键）:
// 1. 本批已暂存的父实体
// 2. 已落库的父实体
// 3. 触发一次基线种子写入,再查一次库
// 4. 仍未找到 → UnresolvedParentReference（仅拒绝该行）
// ==========================================

use crate::domain::import::{ForeignKeyBinding, RawRecord};
use crate::importer::baseline_seeder::BaselineSeeder;
use crate::importer::batch_context::BatchContext;
use crate::importer::entity_catalog::EntityCatalog;
use crate::importer::error::{CoercionError, RowError, RowFailure};
use crate::importer::field_mapper::{ForeignKeyColumn, ParentKeyColumn};
use crate::repository::EntityStore;
use tracing::debug;

pub struct ForeignKeyResolver<'a> {
    catalog: &'a EntityCatalog,
    store: &'a dyn EntityStore,
    seeder: &'a dyn BaselineSeeder,
}

impl<'a> ForeignKeyResolver<'a> {
    pub fn new(
        catalog: &'a EntityCatalog,
        store: &'a dyn EntityStore,
        seeder: &'a dyn BaselineSeeder,
    ) -> Self {
        Self {
            catalog,
            store,
            seeder,
        }
    }

    /// 解析一条外键
    ///
    /// # 返回
    /// - Ok(Some(binding)): 已找到父实体
    /// - Ok(None): 可空外键且未提供业务键
    /// - Err(Row): 行级错误
    /// - Err(Fatal): 父实体不在目录中 / 存储失败 / 取消
    pub async fn resolve(
        &self,
        record: &RawRecord,
        column: &ForeignKeyColumn,
        context: &mut BatchContext,
    ) -> Result<Option<ForeignKeyBinding>, RowFailure> {
        let fk = &column.fk;

        let key_column = match &column.key {
            ParentKeyColumn::Column { name, .. } => name,
            ParentKeyColumn::Absent if column.nullable => return Ok(None),
            ParentKeyColumn::Absent => {
                return Err(RowError::MissingParentKey {
                    parent: fk.referenced_entity.to_string(),
                    column: fk.expected_key_column(),
                }
                .into())
            }
            ParentKeyColumn::Ambiguous { column, reason } => {
                return Err(RowError::AmbiguousParentKey {
                    column: column.clone(),
                    reason: reason.clone(),
                }
                .into())
            }
        };

        let key = record.get(key_column).unwrap_or("").trim();
        if key.is_empty() {
            if column.nullable {
                return Ok(None);
            }
            return Err(CoercionError::RequiredFieldEmpty {
                field: fk.local_field.to_string(),
            }
            .into());
        }

        let parent = self.catalog.describe(fk.referenced_entity)?;
        let binding = |parent_id: String| ForeignKeyBinding {
            local_field: fk.local_field.to_string(),
            parent_kind: parent.kind,
            parent_id,
        };

        // 1. 本批已暂存
        if let Some(staged) = context.lookup(parent.kind, key) {
            return Ok(Some(binding(staged.id.clone())));
        }

        // 2. 已落库
        let existing = self.store.get_existing(parent, key).await?;
        context.check_cancelled()?;
        if let Some(existing) = existing {
            return Ok(Some(binding(existing.id)));
        }

        // 3. 基线种子 + 重查一次
        debug!(parent = %parent.kind, key, "父实体未找到,触发基线种子");
        let seeded = self
            .seeder
            .seed_baseline(parent.kind, self.store, context.staged_count(parent.kind))
            .await?;
        context.check_cancelled()?;
        context.report.add_seeded(parent.kind, seeded);

        let existing = self.store.get_existing(parent, key).await?;
        context.check_cancelled()?;
        if let Some(existing) = existing {
            return Ok(Some(binding(existing.id)));
        }

        // 4. 未解析
        Err(RowError::UnresolvedParentReference {
            parent: parent.name().to_string(),
            key: key.to_string(),
        }
        .into())
    }
}
