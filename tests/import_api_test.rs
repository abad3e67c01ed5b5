// ==========================================
// 导入API集成测试
// ==========================================
// 测试目标: ImportApi + ConfigManager 覆写 + 批次串行
// ==========================================


use campaign_backoffice::api::{ApiError, ImportApi};
use campaign_backoffice::config::{config_keys, ConfigManager};
use campaign_backoffice::domain::EntityKind;
use campaign_backoffice::importer::{BatchImporter, ImportError, TransactionalImporter};
use campaign_backoffice::repository::SqliteEntityStore;
use std::sync::Arc;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_import_files_through_api() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Campaign.csv"), "Number,Title\nCMP1,Spring\n").unwrap();
    std::fs::write(
        dir.path().join("children.csv"),
        "Type,Campaign_Number,Amount\nBudget,CMP1,500\n",
    )
    .unwrap();

    let api = ImportApi::new(&db_path).unwrap();
    let files: Vec<String> = ["children.csv", "Campaign.csv"]
        .iter()
        .map(|f| dir.path().join(f).to_string_lossy().to_string())
        .collect();

    let response = api
        .import_files(&files, CancellationToken::new())
        .await
        .unwrap();

    assert!(response.committed);
    assert!(response.errors.is_empty());
    assert_eq!(response.inserted_counts.get("Campaign"), Some(&1));
    assert_eq!(response.inserted_counts.get("Budget"), Some(&1));
    assert_eq!(api.count_entities("Budget").await.unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_batch_returns_report() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();

    let result = api
        .import_sources(
            vec![
                source("Campaign.csv", "Number,Title\nCMP1,Spring\n"),
                source("children.csv", "Type,Campaign_Number,Amount\nBudget,CMP2,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(ApiError::ImportRejected { report }) => {
            assert_eq!(report.errors.len(), 1);
            assert!(report.inserted_counts.is_empty());
        }
        other => panic!("应当整批回滚, 实际: {:?}", other),
    }
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_delimiter_override_from_config_table() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();
    api.set_config(config_keys::DELIMITER, ";").unwrap();
    api.set_config(config_keys::DATE_FORMATS, r#"["%d.%m.%Y"]"#).unwrap();

    let response = api
        .import_sources(
            vec![source(
                "Campaign.csv",
                "Number;Title;CampaignDate\nCMP1;Spring;01.03.2025\n",
            )],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.inserted_counts.get("Campaign"), Some(&1));
}

#[tokio::test]
async fn test_fallback_disabled_via_config_table() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    let config = ConfigManager::from_connection(conn.clone());
    config
        .set_config_value(config_keys::NATURAL_KEY_FALLBACK_COLUMN, "")
        .unwrap();
    let importer = TransactionalImporter::new(SqliteEntityStore::from_connection(conn), config);

    let result = importer
        .import_batch(
            vec![
                source("Campaign.csv", "Number,Title\nCMP1,Spring\n"),
                source("children.csv", "Type,Number,Amount\nBudget,CMP1,500\n"),
            ],
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(ImportError::Rejected { report }) => {
            assert!(report
                .errors
                .iter()
                .any(|e| e.message.contains("MissingParentKey")));
        }
        other => panic!("应当整批回滚, 实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_config_value_aborts_before_import() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let api = ImportApi::new(&db_path).unwrap();
    api.set_config(config_keys::SYNTH_AMOUNT_MIN, "not-a-number").unwrap();

    let result = api
        .import_sources(
            vec![source("Campaign.csv", "Number,Title\nCMP1,Spring\n")],
            CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(ApiError::ConfigError(_))));
    assert_eq!(total_entity_rows(&db_path), 0);
}

#[tokio::test]
async fn test_concurrent_batches_are_serialized() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (importer, _) = create_test_importer(&db_path, test_config());
    let importer = Arc::new(importer);

    let a = {
        let importer = importer.clone();
        tokio::spawn(async move {
            importer
                .import_batch(
                    vec![source("Campaign.csv", "Number,Title\nCMP-A,Alpha\n")],
                    CancellationToken::new(),
                )
                .await
        })
    };
    let b = {
        let importer = importer.clone();
        tokio::spawn(async move {
            importer
                .import_batch(
                    vec![source("Campaign.csv", "Number,Title\nCMP-B,Beta\n")],
                    CancellationToken::new(),
                )
                .await
        })
    };

    let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(ra.unwrap().inserted(EntityKind::Campaign), 1);
    assert_eq!(rb.unwrap().inserted(EntityKind::Campaign), 1);
    assert_eq!(count_rows(&db_path, "campaign"), 2);
    assert_eq!(count_rows(&db_path, "import_batch"), 2);
}
