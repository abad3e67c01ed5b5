// ==========================================
// 营销后台 - 字段映射器
// ==========================================
// 职责: 表头列 → 实体字段,每个（文件, 实体）计算一次
// 规则:
// - 列名与字段名精确匹配（不区分大小写）
// - 允许 "<表名>_" 前缀
// - 子文件中 "Date" 映射为 "<实体>Date"
// - 主键列/外键 ID 列忽略（ID 由系统生成或由外键解析回写）
// - 多列映射到同一字段时取第一列并告警
// - 外键业务键列: 约定列 "<父实体>_<业务键>",缺失时可回退
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind, FieldDescriptor, ForeignKeyDescriptor};
use crate::importer::file_classifier::FileClass;

// ==========================================
// 映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldColumn {
    pub field: FieldDescriptor,
    pub column: String,
}

/// 父业务键所在列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentKeyColumn {
    Column { name: String, via_fallback: bool },
    Absent,
    Ambiguous { column: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyColumn {
    pub fk: ForeignKeyDescriptor,
    pub nullable: bool,
    pub key: ParentKeyColumn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub kind: EntityKind,
    pub fields: Vec<FieldColumn>,
    pub foreign_keys: Vec<ForeignKeyColumn>,
    /// 文件级告警（每个文件/实体一次）
    pub warnings: Vec<String>,
}

impl ColumnMapping {
    pub fn column_for(&self, field_name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|fc| fc.field.name.eq_ignore_ascii_case(field_name))
            .map(|fc| fc.column.as_str())
    }
}

// ==========================================
// FieldMapper
// ==========================================
pub struct FieldMapper {
    discriminator_column: String,
    fallback_column: Option<String>,
}

impl FieldMapper {
    pub fn new(discriminator_column: impl Into<String>, fallback_column: Option<String>) -> Self {
        Self {
            discriminator_column: discriminator_column.into(),
            fallback_column: fallback_column.filter(|c| !c.trim().is_empty()),
        }
    }

    /// 计算映射
    ///
    /// # 参数
    /// - descriptor: 目标实体
    /// - headers: 文件表头（已修剪）
    /// - class: 文件类别（子文件启用 Date 别名与回退列）
    pub fn map(
        &self,
        descriptor: &EntityDescriptor,
        headers: &[String],
        class: FileClass,
    ) -> ColumnMapping {
        let mut warnings = Vec::new();
        let foreign_keys = self.map_foreign_keys(descriptor, headers, class, &mut warnings);

        let reserved: Vec<&str> = foreign_keys
            .iter()
            .filter_map(|fkc| match &fkc.key {
                ParentKeyColumn::Column { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let expected: Vec<String> = descriptor
            .foreign_keys
            .iter()
            .map(|fk| fk.expected_key_column())
            .collect();

        let mut fields: Vec<FieldColumn> = Vec::new();
        let mut unmapped: Vec<&str> = Vec::new();

        for column in headers {
            let is_reserved = (class == FileClass::Child
                && column.eq_ignore_ascii_case(&self.discriminator_column))
                || reserved.iter().any(|r| r.eq_ignore_ascii_case(column))
                || expected.iter().any(|e| e.eq_ignore_ascii_case(column));
            if is_reserved {
                continue;
            }

            let Some(field) = match_field(descriptor, column, class) else {
                unmapped.push(column.as_str());
                continue;
            };

            // ID 列不接受输入
            if field.is_primary || field.is_foreign_key {
                continue;
            }

            if let Some(first) = fields.iter().find(|fc| fc.field.name == field.name) {
                warnings.push(format!(
                    "列 '{}' 与列 '{}' 都映射到字段 {}.{},使用第一列",
                    column,
                    first.column,
                    descriptor.name(),
                    field.name
                ));
                continue;
            }

            fields.push(FieldColumn {
                field: field.clone(),
                column: column.clone(),
            });
        }

        if !unmapped.is_empty() {
            warnings.push(format!(
                "以下列未映射到 {} 的任何字段,已忽略: {}",
                descriptor.name(),
                unmapped.join(", ")
            ));
        }

        ColumnMapping {
            kind: descriptor.kind,
            fields,
            foreign_keys,
            warnings,
        }
    }

    fn map_foreign_keys(
        &self,
        descriptor: &EntityDescriptor,
        headers: &[String],
        class: FileClass,
        warnings: &mut Vec<String>,
    ) -> Vec<ForeignKeyColumn> {
        let find_header = |name: &str| headers.iter().find(|h| h.eq_ignore_ascii_case(name));

        // 约定列缺失、需要回退的外键数
        let fallback_candidates = descriptor
            .foreign_keys
            .iter()
            .filter(|fk| find_header(&fk.expected_key_column()).is_none())
            .count();

        descriptor
            .foreign_keys
            .iter()
            .map(|fk| {
                let nullable = descriptor
                    .field(fk.local_field)
                    .map(|f| f.nullable)
                    .unwrap_or(false);
                let expected = fk.expected_key_column();

                let key = if let Some(column) = find_header(&expected) {
                    ParentKeyColumn::Column {
                        name: column.clone(),
                        via_fallback: false,
                    }
                } else {
                    self.fallback_key(descriptor, headers, class, fallback_candidates)
                };

                let key = match key {
                    ParentKeyColumn::Column {
                        name,
                        via_fallback: true,
                    } => {
                        warnings.push(format!(
                            "缺少列 '{}',使用回退列 '{}' 作为 {} 业务键",
                            expected, name, fk.referenced_entity
                        ));
                        ParentKeyColumn::Column {
                            name,
                            via_fallback: true,
                        }
                    }
                    // 可空外键: 回退有歧义时不使用回退,保持为空
                    ParentKeyColumn::Ambiguous { column, reason } if nullable => {
                        warnings.push(format!(
                            "回退列 '{}' 有歧义 ({}),可空外键 {} 保持为空",
                            column, reason, fk.local_field
                        ));
                        ParentKeyColumn::Absent
                    }
                    other => other,
                };

                ForeignKeyColumn {
                    fk: fk.clone(),
                    nullable,
                    key,
                }
            })
            .collect()
    }

    fn fallback_key(
        &self,
        descriptor: &EntityDescriptor,
        headers: &[String],
        class: FileClass,
        fallback_candidates: usize,
    ) -> ParentKeyColumn {
        if class != FileClass::Child {
            return ParentKeyColumn::Absent;
        }
        let Some(fallback) = self.fallback_column.as_deref() else {
            return ParentKeyColumn::Absent;
        };
        let Some(column) = headers.iter().find(|h| h.eq_ignore_ascii_case(fallback)) else {
            return ParentKeyColumn::Absent;
        };

        if let Some(field) = match_field(descriptor, column, class) {
            return ParentKeyColumn::Ambiguous {
                column: column.clone(),
                reason: format!("该列同时映射到 {}.{}", descriptor.name(), field.name),
            };
        }
        if fallback_candidates > 1 {
            return ParentKeyColumn::Ambiguous {
                column: column.clone(),
                reason: format!("{} 个外键共用该回退列", fallback_candidates),
            };
        }

        ParentKeyColumn::Column {
            name: column.clone(),
            via_fallback: true,
        }
    }
}

/// 列名 → 字段
fn match_field<'a>(
    descriptor: &'a EntityDescriptor,
    column: &str,
    class: FileClass,
) -> Option<&'a FieldDescriptor> {
    let column = column.trim();
    let unprefixed = strip_table_prefix(descriptor, column);

    for candidate in [Some(column), unprefixed].into_iter().flatten() {
        if let Some(field) = descriptor.field(candidate) {
            return Some(field);
        }
        if class == FileClass::Child && candidate.eq_ignore_ascii_case("Date") {
            if let Some(field) = descriptor.field(&format!("{}Date", descriptor.name())) {
                return Some(field);
            }
        }
    }
    None
}

fn strip_table_prefix<'a>(descriptor: &EntityDescriptor, column: &'a str) -> Option<&'a str> {
    [descriptor.name(), descriptor.table_name]
        .iter()
        .find_map(|prefix| {
            let len = prefix.len() + 1;
            if column.len() > len
                && column.is_char_boundary(len)
                && column[..len - 1].eq_ignore_ascii_case(prefix)
                && column.as_bytes()[len - 1] == b'_'
            {
                Some(&column[len..])
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn mapper() -> FieldMapper {
        FieldMapper::new("Type", Some("Number".to_string()))
    }

    #[test]
    fn test_exact_and_prefixed_columns() {
        let d = EntityKind::Campaign.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["number", "Campaign_Title", "campaign_status", "Id"]),
            FileClass::Parent,
        );
        assert_eq!(m.column_for("Number"), Some("number"));
        assert_eq!(m.column_for("Title"), Some("Campaign_Title"));
        assert_eq!(m.column_for("Status"), Some("campaign_status"));
        assert_eq!(m.column_for("Id"), None);
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_child_date_alias_and_expected_key() {
        let d = EntityKind::Budget.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["Type", "Campaign_Number", "Amount", "Date"]),
            FileClass::Child,
        );
        assert_eq!(m.column_for("BudgetDate"), Some("Date"));
        assert_eq!(
            m.foreign_keys[0].key,
            ParentKeyColumn::Column {
                name: "Campaign_Number".to_string(),
                via_fallback: false
            }
        );
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_date_alias_only_on_child_files() {
        let d = EntityKind::Campaign.descriptor();
        let m = mapper().map(&d, &headers(&["Number", "Date"]), FileClass::Parent);
        assert_eq!(m.column_for("CampaignDate"), None);
        assert_eq!(m.warnings.len(), 1);
    }

    #[test]
    fn test_fallback_column_with_warning() {
        let d = EntityKind::Budget.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["Type", "Number", "Amount"]),
            FileClass::Child,
        );
        assert_eq!(
            m.foreign_keys[0].key,
            ParentKeyColumn::Column {
                name: "Number".to_string(),
                via_fallback: true
            }
        );
        assert_eq!(m.warnings.len(), 1);
        assert!(m.warnings[0].contains("Campaign_Number"));
    }

    #[test]
    fn test_fallback_disabled() {
        let d = EntityKind::Budget.descriptor();
        let m = FieldMapper::new("Type", None).map(
            &d,
            &headers(&["Type", "Number", "Amount"]),
            FileClass::Child,
        );
        assert_eq!(m.foreign_keys[0].key, ParentKeyColumn::Absent);
    }

    #[test]
    fn test_fallback_on_own_field_is_ambiguous_for_optional_fk() {
        // Campaign 自身有 Number 字段,回退列有歧义;CustomerId 可空 → 保持为空
        let d = EntityKind::Campaign.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["Type", "Number", "Title"]),
            FileClass::Child,
        );
        assert_eq!(m.foreign_keys[0].key, ParentKeyColumn::Absent);
        assert_eq!(m.column_for("Number"), Some("Number"));
        assert!(m.warnings.iter().any(|w| w.contains("歧义")));
    }

    #[test]
    fn test_duplicate_mapping_first_wins() {
        let d = EntityKind::Budget.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["Type", "Campaign_Number", "Amount", "Budget_Amount"]),
            FileClass::Child,
        );
        assert_eq!(m.column_for("Amount"), Some("Amount"));
        assert_eq!(m.warnings.len(), 1);
        assert!(m.warnings[0].contains("Budget_Amount"));
    }

    #[test]
    fn test_unmapped_columns_single_warning() {
        let d = EntityKind::Budget.descriptor();
        let m = mapper().map(
            &d,
            &headers(&["Type", "Campaign_Number", "Amount", "Colour", "Size"]),
            FileClass::Child,
        );
        assert_eq!(m.warnings.len(), 1);
        assert!(m.warnings[0].contains("Colour, Size"));
    }
}
