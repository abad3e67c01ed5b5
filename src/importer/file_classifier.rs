// ==========================================
// 营销后台 - 文件分类器
// ==========================================
// 规则:
// - 表头含判别列（默认 "Type",不区分大小写）→ 子文件
// - 否则为父文件,实体由文件名决定（可带复数 s）
// - 子文件每行的判别值决定该行实体,必须是带外键的实体
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::importer::entity_catalog::EntityCatalog;
use crate::importer::error::{ImportError, ImportResult, RowError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileClass {
    Parent,
    Child,
}

pub struct FileClassifier {
    discriminator_column: String,
}

impl FileClassifier {
    pub fn new(discriminator_column: impl Into<String>) -> Self {
        Self {
            discriminator_column: discriminator_column.into(),
        }
    }

    /// 按表头分类（纯函数,结果只取决于表头）
    pub fn classify(&self, headers: &[String]) -> FileClass {
        if self.is_discriminator_present(headers) {
            FileClass::Child
        } else {
            FileClass::Parent
        }
    }

    pub fn is_discriminator(&self, column: &str) -> bool {
        column.trim().eq_ignore_ascii_case(&self.discriminator_column)
    }

    fn is_discriminator_present(&self, headers: &[String]) -> bool {
        headers.iter().any(|h| self.is_discriminator(h))
    }

    /// 父文件实体（由文件名决定）
    ///
    /// # 示例
    /// - "Campaign" / "campaigns" → Campaign
    ///
    /// # 错误
    /// - UnknownEntity: 文件名不对应任何实体
    pub fn parent_entity<'a>(
        &self,
        catalog: &'a EntityCatalog,
        file_stem: &str,
    ) -> ImportResult<&'a EntityDescriptor> {
        let stem = file_stem.trim();
        match catalog.describe(stem) {
            Ok(d) => Ok(d),
            Err(err) => {
                let singular = stem
                    .strip_suffix('s')
                    .or_else(|| stem.strip_suffix('S'))
                    .filter(|s| !s.is_empty());
                match singular {
                    Some(s) => catalog.describe(s).map_err(|_| ImportError::UnknownEntity {
                        name: stem.to_string(),
                    }),
                    None => Err(err),
                }
            }
        }
    }

    /// 子文件行实体（由判别值决定）
    ///
    /// # 错误
    /// - UnsupportedChildType: 未知实体,或该实体无外键
    pub fn child_entity(&self, discriminator_value: &str) -> Result<EntityKind, RowError> {
        EntityKind::from_name(discriminator_value)
            .filter(|k| k.descriptor().has_foreign_keys())
            .ok_or_else(|| RowError::UnsupportedChildType {
                value: discriminator_value.trim().to_string(),
            })
    }
}
