//! Engine integration tests against a live PostgreSQL database
//!
//! Set `CHADO_TEST_DATABASE_URL` to run; each test skips silently when it
//! is absent. Tests rebuild the schema, so they are serialized.

mod helpers;

use std::collections::BTreeMap;
use std::time::Duration;

use chado_common::Pagination;
use chado_engine::admin::{delete_organism, insert_organism, NewOrganism};
use chado_engine::db::{self, DbConfig};
use chado_engine::error::EngineError;
use chado_engine::export::{export, write_delimited};
use chado_engine::import::{import_batch, ResolverSet};
use chado_engine::query::{ParamValue, QueryEngine};
use chado_engine::record::{DelimitedMapper, Record};
use chado_engine::{EngineResult, SchemaRegistry};
use futures::StreamExt;
use serial_test::serial;

const TX_TIMEOUT: Duration = Duration::from_secs(30);

fn organism_param(name: &str) -> BTreeMap<String, ParamValue> {
    let mut params = BTreeMap::new();
    params.insert("organism".to_string(), ParamValue::Text(name.to_string()));
    params
}

async fn import_features(pool: &chado_engine::PgPool, input: &str) -> chado_engine::import::BatchResult {
    let registry = SchemaRegistry::builtin();
    let table = registry.describe("feature").unwrap();
    let records: Vec<Record> = DelimitedMapper::default()
        .to_records(table, input)
        .unwrap()
        .collect::<EngineResult<_>>()
        .unwrap();

    let mut conn = chado_engine::acquire(pool).await.unwrap();
    import_batch(table, records, &mut conn, &ResolverSet::builtin(), TX_TIMEOUT)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_validate_selects_matching_revision() {
    let Some(pool) = helpers::setup().await else {
        return;
    };
    let mut conn = chado_engine::acquire(&pool).await.unwrap();

    let version = SchemaRegistry::builtin().validate(&mut conn).await.unwrap();
    assert_eq!(version.as_str(), "1.31");
}

#[tokio::test]
#[serial]
async fn test_validate_reports_missing_table() {
    let Some(pool) = helpers::setup().await else {
        return;
    };
    sqlx::raw_sql("DROP TABLE featureloc CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    let mut conn = chado_engine::acquire(&pool).await.unwrap();
    let result = SchemaRegistry::builtin().validate(&mut conn).await;
    match result {
        Err(EngineError::SchemaMismatch { diff, .. }) => {
            assert!(diff.missing_tables.contains(&"featureloc".to_string()));
        },
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_import_batch_skips_unresolved_reference() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    let input = "uniquename\torganism_id\ttype_id\n\
                 FBgn0000001\tDrosophila melanogaster\tgene\n\
                 XXgn0000001\tUnknownus fake\tgene\n";
    let result = import_features(&pool, input).await;

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 1);
    assert!(matches!(
        result.failures[0].error,
        EngineError::UnresolvedReference { .. }
    ));
    assert_eq!(helpers::count_rows(&pool, "feature").await, 1);
}

#[tokio::test]
#[serial]
async fn test_import_batch_rolls_back_on_integrity_violation() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    // Both rows resolve, but they collide on the feature uniqueness
    // constraint; nothing may be persisted.
    let input = "uniquename\torganism_id\ttype_id\n\
                 FBgn0000001\tDmel\tgene\n\
                 FBgn0000001\tDmel\tgene\n";
    let registry = SchemaRegistry::builtin();
    let table = registry.describe("feature").unwrap();
    let records: Vec<Record> = DelimitedMapper::default()
        .to_records(table, input)
        .unwrap()
        .collect::<EngineResult<_>>()
        .unwrap();

    let mut conn = chado_engine::acquire(&pool).await.unwrap();
    let result = import_batch(table, records, &mut conn, &ResolverSet::builtin(), TX_TIMEOUT).await;

    match result {
        Err(EngineError::IntegrityViolation {
            table,
            record_index,
            ..
        }) => {
            assert_eq!(table, "feature");
            assert_eq!(record_index, 1);
        },
        other => panic!("expected IntegrityViolation, got {:?}", other.map(|_| ())),
    }
    assert_eq!(helpers::count_rows(&pool, "feature").await, 0);
}

#[tokio::test]
#[serial]
async fn test_query_pagination_is_duplicate_free_and_loss_free() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    let input = "uniquename\torganism_id\ttype_id\n\
                 ENSG01\tHomo sapiens\tgene\n\
                 ENSG02\tHomo sapiens\tgene\n\
                 ENSG03\tHomo sapiens\tgene\n\
                 ENSG04\tHomo sapiens\tgene\n\
                 ENSG05\tHomo sapiens\tgene\n";
    let result = import_features(&pool, input).await;
    assert_eq!(result.succeeded, 5);

    let registry = SchemaRegistry::builtin();
    let engine = QueryEngine::with_builtins(registry.latest()).unwrap();
    let params = organism_param("Homo sapiens");
    let mut conn = chado_engine::acquire(&pool).await.unwrap();

    let full = engine
        .run(
            "features_by_organism",
            &params,
            &mut conn,
            Pagination::new(1000, 0),
        )
        .await
        .unwrap();
    assert_eq!(full.len(), 5);

    let mut paged = Vec::new();
    for page in 0..3 {
        let records = engine
            .run(
                "features_by_organism",
                &params,
                &mut conn,
                Pagination::page(page, 2),
            )
            .await
            .unwrap();
        paged.extend(records);
    }
    assert_eq!(paged, full);
}

#[tokio::test]
#[serial]
async fn test_export_stream_matches_query_and_writes_delimited() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    let input = "uniquename\torganism_id\ttype_id\n\
                 ENSG01\tHomo sapiens\tgene\n\
                 ENSG02\tHomo sapiens\tgene\n\
                 ENSG03\tHomo sapiens\tgene\n";
    import_features(&pool, input).await;

    let registry = SchemaRegistry::builtin();
    let engine = QueryEngine::with_builtins(registry.latest()).unwrap();
    let template = engine.template("features_by_organism").unwrap();
    let params = organism_param("Homo sapiens");

    let mut conn = chado_engine::acquire(&pool).await.unwrap();
    let mut stream = export(template, &params, &mut conn).await.unwrap();

    let mut buffer = Vec::new();
    let rows = write_delimited(&mut stream, &mut buffer, '\t', true)
        .await
        .unwrap();
    assert_eq!(rows, 3);

    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "uniquename\tname\tfeature_type\tseqlen");
    assert!(lines[1].starts_with("ENSG01\t"));
    assert!(lines[1].ends_with("\tgene\t"));
}

#[tokio::test]
#[serial]
async fn test_export_early_close_releases_the_connection() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    let input = "uniquename\torganism_id\ttype_id\n\
                 ENSG01\tHomo sapiens\tgene\n\
                 ENSG02\tHomo sapiens\tgene\n";
    import_features(&pool, input).await;

    let registry = SchemaRegistry::builtin();
    let engine = QueryEngine::with_builtins(registry.latest()).unwrap();
    let template = engine.template("features_by_organism").unwrap();
    let params = organism_param("Homo sapiens");

    let mut conn = chado_engine::acquire(&pool).await.unwrap();
    {
        let mut stream = export(template, &params, &mut conn).await.unwrap();
        let first = stream.next().await;
        assert!(matches!(first, Some(Ok(_))));
        stream.close();
        assert!(stream.next().await.is_none());
    }

    // The abandoned cursor must not leave the connection unusable.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feature")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
#[serial]
async fn test_invalid_parameter_fails_before_execution() {
    let Some(pool) = helpers::setup().await else {
        return;
    };

    let registry = SchemaRegistry::builtin();
    let engine = QueryEngine::with_builtins(registry.latest()).unwrap();
    let template = engine.template("features_by_organism").unwrap();

    let mut params = BTreeMap::new();
    params.insert("organism".to_string(), ParamValue::Integer(9606));

    let mut conn = chado_engine::acquire(&pool).await.unwrap();
    let result = export(template, &params, &mut conn).await;
    assert!(matches!(
        result.map(|_| ()),
        Err(EngineError::InvalidParameter { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_admin_insert_and_delete_organism() {
    let Some(pool) = helpers::setup().await else {
        return;
    };
    let mut conn = chado_engine::acquire(&pool).await.unwrap();

    let organism = NewOrganism {
        genus: "Mus".to_string(),
        species: "musculus".to_string(),
        abbreviation: Some("Mmus".to_string()),
        common_name: Some("mouse".to_string()),
        ..Default::default()
    };
    let id = insert_organism(&mut conn, TX_TIMEOUT, organism.clone())
        .await
        .unwrap();
    assert!(id > 0);

    // Same genus/species violates the organism uniqueness constraint.
    let duplicate = insert_organism(&mut conn, TX_TIMEOUT, organism).await;
    assert!(matches!(
        duplicate,
        Err(EngineError::IntegrityViolation { .. })
    ));

    delete_organism(&mut conn, TX_TIMEOUT, "Mmus").await.unwrap();
    let gone = delete_organism(&mut conn, TX_TIMEOUT, "Mmus").await;
    assert!(matches!(gone, Err(EngineError::UnresolvedReference { .. })));
}

#[tokio::test]
#[serial]
async fn test_with_transaction_rolls_back_on_error() {
    let Some(pool) = helpers::setup().await else {
        return;
    };
    let mut conn = chado_engine::acquire(&pool).await.unwrap();

    let result: Result<(), EngineError> =
        db::with_transaction(&mut conn, TX_TIMEOUT, |tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO organism (genus, species) VALUES ('Rattus', 'norvegicus')",
                )
                .execute(&mut *tx)
                .await?;
                Err(EngineError::config("forced failure"))
            })
        })
        .await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organism WHERE genus = 'Rattus'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn test_transaction_timeout_surfaces_and_rolls_back() {
    let Some(pool) = helpers::setup().await else {
        return;
    };
    let mut conn = chado_engine::acquire(&pool).await.unwrap();

    let result: Result<(), EngineError> =
        db::with_transaction(&mut conn, Duration::from_millis(100), |tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO organism (genus, species) VALUES ('Danio', 'rerio')",
                )
                .execute(&mut *tx)
                .await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;
    assert!(matches!(result, Err(EngineError::TransactionTimeout { .. })));

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organism WHERE genus = 'Danio'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn test_pool_exhaustion_is_reported() {
    let Some(url) = std::env::var("CHADO_TEST_DATABASE_URL").ok() else {
        return;
    };
    let config = DbConfig {
        url,
        max_connections: 1,
        min_connections: 1,
        acquire_timeout_secs: 1,
        ..DbConfig::default()
    };
    let pool = chado_engine::create_pool(&config).await.unwrap();

    let _held = chado_engine::acquire(&pool).await.unwrap();
    let second = chado_engine::acquire(&pool).await;
    assert!(matches!(second, Err(EngineError::PoolExhausted { .. })));
}
