// ==========================================
// 导入引擎集成测试
// ==========================================
// 测试目标: 分类 → 父实体 → 子实体 → 提交/回滚 全流程
// ==========================================


use campaign_backoffice::domain::EntityKind;
use campaign_backoffice::importer::{BatchImporter, ImportError, TransactionalImporter};
use campaign_backoffice::logging;
use campaign_backoffice::repository::{EntityStore, SqliteEntityStore};
use rusqlite::Connection;
use std::sync::atomic::Ordering;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

const CAMPAIGN_CSV: &str = "Number,Title\nCMP1,Spring\n";

fn rejected_report(
    result: Result<campaign_backoffice::ImportReport, ImportError>,
) -> campaign_backoffice::ImportReport {
    match result {
        Err(ImportError::Rejected { report }) => *report,
        other => panic!("应当整批回滚, 实际: {:?}", other),
    }
}

fn has_error(report: &campaign_backoffice::ImportReport, tag: &str) -> bool {
    report.errors.iter().any(|e| e.message.contains(tag))
}

// ==========================================
// 基本流程
// ==========================================

#[tokio::test]
async fn test_parent_and_child_commit_together() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, seeds) = create_test_importer(&db_path, test_config());

    let sources = vec![
        source("Campaign.csv", CAMPAIGN_CSV),
        source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP1,500\n"),
    ];
    let report = importer
        .import_batch(sources, CancellationToken::new())
        .await
        .expect("导入应当成功");

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.inserted(EntityKind::Campaign), 1);
    assert_eq!(report.inserted(EntityKind::Budget), 1);
    assert_eq!(report.total_inserted(), 2);
    assert_eq!(seeds.load(Ordering::SeqCst), 0);

    // 子实体外键指向本批父实体
    let conn = Connection::open(&db_path).unwrap();
    let (campaign_id, amount): (String, f64) = conn
        .query_row(
            "SELECT c.\"Id\", b.\"Amount\" FROM budget b JOIN campaign c ON b.\"CampaignId\" = c.\"Id\"",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(!campaign_id.is_empty());
    assert_eq!(amount, 500.0);
}

#[tokio::test]
async fn test_files_from_disk() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let sources = vec![
        write_file(&dir, "Campaigns.csv", CAMPAIGN_CSV),
        write_file(
            &dir,
            "lines.csv",
            "Type,Campaign_Number,Amount,Vendor\nExpense,CMP1,120.50,Acme\n",
        ),
    ];
    let report = importer
        .import_batch(sources, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.inserted(EntityKind::Campaign), 1);
    assert_eq!(report.inserted(EntityKind::Expense), 1);
    assert_eq!(count_rows(&db_path, "expense"), 1);
}

#[tokio::test]
async fn test_file_order_does_not_matter() {
    let children = "Type,Campaign_Number,Amount\nBudget,CMP1,500\nExpense,CMP1,80\n";

    let (_a, db_a) = create_test_db().unwrap();
    let (importer_a, _) = create_test_importer(&db_a, test_config());
    let forward = importer_a
        .import_batch(
            vec![source("Campaign.csv", CAMPAIGN_CSV), source("c.csv", children)],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let (_b, db_b) = create_test_db().unwrap();
    let (importer_b, _) = create_test_importer(&db_b, test_config());
    let reversed = importer_b
        .import_batch(
            vec![source("c.csv", children), source("Campaign.csv", CAMPAIGN_CSV)],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(forward.inserted_counts, reversed.inserted_counts);
    assert_eq!(total_entity_rows(&db_a), total_entity_rows(&db_b));
}

// ==========================================
// 外键解析
// ==========================================

#[tokio::test]
async fn test_unresolved_parent_rolls_back_everything() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, seeds) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP2,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
    assert!(has_error(&report, "UnresolvedParentReference"));
    assert_eq!(report.errors[0].line, Some(2));
    assert_eq!(report.total_inserted(), 0);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);

    // 种子数据随批次回滚
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_parent_from_previous_batch_resolves_without_seeding() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, seeds) = create_test_importer(&db_path, test_config());

    importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await
        .unwrap();

    let report = importer
        .import_batch(
            vec![source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP1,75.25\n")],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.inserted(EntityKind::Budget), 1);
    assert_eq!(seeds.load(Ordering::SeqCst), 0);
    assert_eq!(count_rows(&db_path, "campaign"), 1);
}

#[tokio::test]
async fn test_baseline_seed_satisfies_reference() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, seeds) = create_test_importer(&db_path, test_config());

    let report = importer
        .import_batch(
            vec![source(
                "children.csv",
                "Type,Campaign_Number,Amount\nBudget,CMP-BASE-01,100\nBudget,CMP-BASE-02,200\n",
            )],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.inserted(EntityKind::Budget), 2);
    assert_eq!(report.seeded_counts.get("Campaign"), Some(&3));
    // 第二行已能在库中查到,不再触发种子
    assert_eq!(seeds.load(Ordering::SeqCst), 1);
    assert_eq!(count_rows(&db_path, "campaign"), 3);
}

#[tokio::test]
async fn test_staged_parents_suppress_baseline_seed() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, seeds) = create_test_importer(&db_path, test_config());

    // 父文件暂存了与基线同名的键,子行引用另一个基线键
    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", "Number,Title\nCMP-BASE-02,Imported\n"),
                source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP-BASE-01,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
    assert!(has_error(&report, "UnresolvedParentReference"));
    assert!(report.seeded_counts.is_empty());
    assert_eq!(seeds.load(Ordering::SeqCst), 1);
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_baseline_key_unresolved_when_batch_has_parents() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP-BASE-01,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "UnresolvedParentReference"));
    assert_eq!(count_rows(&db_path, "campaign"), 0);
    assert_eq!(count_rows(&db_path, "budget"), 0);
}

#[tokio::test]
async fn test_fallback_column_emits_warning() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let report = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("children.csv", "Type,Number,Amount\nBudget,CMP1,500\n"),
            ],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.inserted(EntityKind::Budget), 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.file == "children.csv" && w.message.contains("Campaign_Number")));
}

#[tokio::test]
async fn test_disabled_fallback_reports_missing_key() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config().without_fallback());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("children.csv", "Type,Number,Amount\nBudget,CMP1,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "MissingParentKey"));
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_unsupported_child_type_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source(
                    "children.csv",
                    "Type,Campaign_Number,Amount\nCustomer,CMP1,1\nInvoice,CMP1,2\n",
                ),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert_eq!(
        report
            .errors
            .iter()
            .filter(|e| e.message.contains("UnsupportedChildType"))
            .count(),
        2
    );
}

// ==========================================
// 类型转换与默认值
// ==========================================

#[tokio::test]
async fn test_missing_amount_is_synthesized() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let report = importer
        .import_batch(
            vec![source("Campaign.csv", "Number,Title,TargetAmount\nCMP1,Spring,\n")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.inserted(EntityKind::Campaign), 1);

    let conn = Connection::open(&db_path).unwrap();
    let amount: f64 = conn
        .query_row("SELECT \"TargetAmount\" FROM campaign", [], |row| row.get(0))
        .unwrap();
    assert!(amount > 0.0);
}

#[tokio::test]
async fn test_negative_amount_rolls_back_batch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source(
                    "children.csv",
                    "Type,Campaign_Number,Amount\nBudget,CMP1,500\nBudget,CMP1,-50\n",
                ),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "NegativeAmountRejected"));
    assert_eq!(report.errors[0].line, Some(3));
    assert!(report.inserted_counts.is_empty());
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_synthesis_disabled_reports_required_field() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let mut config = test_config();
    config.synthesize_missing = false;
    let (importer, _) = create_test_importer(&db_path, config);

    let result = importer
        .import_batch(
            vec![source("Campaign.csv", CAMPAIGN_CSV)],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "RequiredFieldEmpty"));
}

#[tokio::test]
async fn test_all_field_errors_of_a_row_are_reported() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![source(
                "Campaign.csv",
                "Number,Title,TargetAmount,Status\nCMP1,Spring,abc,Unknown\n",
            )],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
    assert!(has_error(&report, "ConversionError"));
    assert!(has_error(&report, "InvalidEnumValue"));
}

#[tokio::test]
async fn test_end_date_before_start_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![source(
                "Campaign.csv",
                "Number,Title,CampaignDate,EndDate\nCMP1,Spring,2025-05-01,2025-04-01\n",
            )],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "InvalidDateRange"));
}

// ==========================================
// 业务键冲突
// ==========================================

#[tokio::test]
async fn test_duplicate_key_within_batch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![source("Campaign.csv", "Number,Title\nCMP1,Spring\nCMP1,Autumn\n")],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "DuplicateNaturalKey"));
    assert_eq!(report.errors[0].line, Some(3));
}

#[tokio::test]
async fn test_existing_key_across_batches() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await
        .unwrap();
    let result = importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "NaturalKeyExists"));
    assert_eq!(count_rows(&db_path, "campaign"), 1);
}

// ==========================================
// 批级错误
// ==========================================

#[tokio::test]
async fn test_unknown_entity_file_rejects_batch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("Invoice.csv", "Number,Total\nINV1,10\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "UnknownEntity"));
    assert_eq!(report.errors[0].file, "Invoice.csv");
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_ragged_row_is_structure_error() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![source("Campaign.csv", "Number,Title\nCMP1,Spring,extra\n")],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "FileStructureError"));
}

#[tokio::test]
async fn test_empty_file_is_structure_error() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(vec![source("Campaign.csv", "")], CancellationToken::new())
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "FileStructureError"));
}

#[tokio::test]
async fn test_missing_file_rejects_batch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let missing = campaign_backoffice::ImportSource::from_path(dir.path().join("Campaign.csv"));
    let result = importer
        .import_batch(vec![missing], CancellationToken::new())
        .await;

    let report = rejected_report(result);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_cancelled_batch_persists_nothing() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let token = CancellationToken::new();
    token.cancel();
    let result = importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], token)
        .await;

    assert!(matches!(result, Err(ImportError::Cancelled)));
    assert_eq!(total_entity_rows(&db_path), 0);
    assert_eq!(count_rows(&db_path, "import_batch"), 0);

    // 取消后导入器仍可使用
    let report = importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.total_inserted(), 1);
}

#[tokio::test]
async fn test_cancel_after_seeding_rolls_back_seeded_rows() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let token = CancellationToken::new();
    let store = SqliteEntityStore::new(&db_path).unwrap();
    let importer = TransactionalImporter::new(store, test_config())
        .with_seeder(Box::new(CancellingSeeder::new(token.clone())));

    let result = importer
        .import_batch(
            vec![source(
                "children.csv",
                "Type,Campaign_Number,Amount\nBudget,CMP-BASE-01,500\n",
            )],
            token,
        )
        .await;

    assert!(matches!(result, Err(ImportError::Cancelled)), "{:?}", result);
    assert_eq!(count_rows(&db_path, "campaign"), 0);
    assert_eq!(count_rows(&db_path, "budget"), 0);
    assert_eq!(count_rows(&db_path, "import_batch"), 0);
}

#[tokio::test]
async fn test_negative_zero_amount_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", CAMPAIGN_CSV),
                source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP1,-0.00\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    let report = rejected_report(result);
    assert!(has_error(&report, "NegativeAmountRejected"));
    assert_eq!(total_entity_rows(&db_path), 0);
}

// ==========================================
// 批次记录
// ==========================================

#[tokio::test]
async fn test_committed_batch_is_recorded() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let report = importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await
        .unwrap();
    let _ = importer
        .import_batch(vec![source("Campaign.csv", CAMPAIGN_CSV)], CancellationToken::new())
        .await;

    assert_eq!(count_rows(&db_path, "import_batch"), 1);
    let conn = Connection::open(&db_path).unwrap();
    let (batch_id, total): (String, i64) = conn
        .query_row(
            "SELECT batch_id, total_inserted FROM import_batch",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(batch_id, report.batch_id);
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_store_count_matches_report() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());

    let report = importer
        .import_batch(
            vec![
                source("Customer.csv", "Number,Name,Email\nCUS1,Ada,ADA@Example.com\n"),
                source("Campaign.csv", "Number,Title,Customer_Number\nCMP1,Spring,CUS1\n"),
            ],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let customer = EntityKind::Customer.descriptor();
    assert_eq!(
        importer.store().count(&customer).await.unwrap(),
        report.inserted(EntityKind::Customer)
    );

    let conn = Connection::open(&db_path).unwrap();
    let email: String = conn
        .query_row("SELECT \"Email\" FROM customer", [], |row| row.get(0))
        .unwrap();
    assert_eq!(email, "ada@example.com");
}
