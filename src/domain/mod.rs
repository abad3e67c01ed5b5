// ==========================================
// 营销后台 - 领域层
// ==========================================
// 职责: 实体描述符、字段类型、导入中间产物
// ==========================================

pub mod entity;
pub mod import;
pub mod types;
pub mod value;

pub use entity::{EntityDescriptor, EntityKind, FieldDescriptor, ForeignKeyDescriptor};
pub use import::{ForeignKeyBinding, ImportDiagnostic, ImportReport, RawRecord, StagedEntity};
pub use types::{DiagnosticLevel, EnumMember, EnumType, FieldType};
pub use value::{TypedValue, DATETIME_FORMAT, DATE_FORMAT};
