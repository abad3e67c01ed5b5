// ==========================================
// 营销后台 - 冲突处理器
// ==========================================
// 职责: 检测业务键冲突
// - 同批次内重复 → DuplicateNaturalKey
// - 与已落库数据重复 → NaturalKeyExists
// ==========================================

use crate::domain::entity::EntityDescriptor;
use crate::importer::batch_context::BatchContext;
use crate::importer::error::{RowError, RowFailure};
use crate::repository::EntityStore;

pub struct ConflictHandler;

impl ConflictHandler {
    /// 检测业务键冲突
    ///
    /// # 返回
    /// - Ok(()): 无冲突（或实体无业务键）
    /// - Err(Row): 冲突,该行拒绝
    /// - Err(Fatal): 查询失败
    pub async fn check(
        &self,
        descriptor: &EntityDescriptor,
        natural_key: Option<&str>,
        context: &BatchContext,
        store: &dyn EntityStore,
    ) -> Result<(), RowFailure> {
        let Some(key) = natural_key else {
            return Ok(());
        };

        if let Some(first) = context.lookup(descriptor.kind, key) {
            return Err(RowError::DuplicateNaturalKey {
                entity: descriptor.name().to_string(),
                key: key.to_string(),
                first_line: first.line,
            }
            .into());
        }

        let existing = store.get_existing(descriptor, key).await?;
        context.check_cancelled()?;
        if existing.is_some() {
            return Err(RowError::NaturalKeyExists {
                entity: descriptor.name().to_string(),
                key: key.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
