// ==========================================
// 营销后台 - 批次上下文
// ==========================================
// 职责: 单批导入的可变状态
// - 导入报告（诊断 + 计数）
// - 已暂存父实体索引（实体 + 业务键 → ID）
// - 取消信号
// ==========================================

use crate::domain::entity::EntityKind;
use crate::domain::import::ImportReport;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// 已暂存实体的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRef {
    pub id: String,
    pub line: u64,
}

pub struct BatchContext {
    pub report: ImportReport,
    staged: HashMap<EntityKind, HashMap<String, StagedRef>>,
    cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(batch_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            report: ImportReport::new(batch_id),
            staged: HashMap::new(),
            cancel,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.report.batch_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 取消检查点
    pub fn check_cancelled(&self) -> ImportResult<()> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 按业务键查找本批已暂存实体（精确匹配）
    pub fn lookup(&self, kind: EntityKind, natural_key: &str) -> Option<&StagedRef> {
        self.staged.get(&kind).and_then(|m| m.get(natural_key))
    }

    /// 登记已暂存实体;业务键已存在时保留首次登记
    pub fn register(&mut self, kind: EntityKind, natural_key: &str, staged: StagedRef) {
        self.staged
            .entry(kind)
            .or_default()
            .entry(natural_key.to_string())
            .or_insert(staged);
    }

    pub fn staged_count(&self, kind: EntityKind) -> usize {
        self.staged.get(&kind).map(|m| m.len()).unwrap_or(0)
    }
}
