// ==========================================
// 营销后台 - 批量导入 Trait
// ==========================================
// 职责: 定义批量导入接口（不包含实现）
// ==========================================

use crate::domain::import::ImportReport;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ImportSource;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// ==========================================
// BatchImporter Trait
// ==========================================
// 用途: 导入主接口
// 实现者: TransactionalImporter
#[async_trait]
pub trait BatchImporter: Send + Sync {
    /// 原子导入一批文件
    ///
    /// # 参数
    /// - sources: 导入文件（按调用方顺序）
    /// - cancel: 取消信号
    ///
    /// # 返回
    /// - Ok(ImportReport): 已提交,报告含各实体写入数与告警
    /// - Err(Rejected): 存在错误,整批已回滚,报告含完整诊断
    /// - Err(Cancelled): 已取消,整批已回滚
    /// - Err: 存储/配置错误（已回滚）
    ///
    /// # 导入流程
    /// 1. 读取配置快照,开启事务
    /// 2. 文件分类
    /// 3. 父文件: 类型转换 + 默认值 + 暂存
    /// 4. 子文件: 同上 + 外键解析
    /// 5. 无错误则提交,否则回滚
    async fn import_batch(
        &self,
        sources: Vec<ImportSource>,
        cancel: CancellationToken,
    ) -> ImportResult<ImportReport>;
}
