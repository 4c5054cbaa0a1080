mod common;

use color_eyre::Result;
use common::SALES_CSV;
use std::fs;
use tabviz::{
    ChartSpec, ChartType, DatasetService, Datastore, Domain, FsDatastore, NewDataset, Query,
    StoreError,
};
use tabviz::insights::{CategoryPerformance, DomainMetrics};
use tempfile::TempDir;

fn setup_service() -> (TempDir, DatasetService<FsDatastore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FsDatastore::new(temp_dir.path().join("datasets"));
    (temp_dir, DatasetService::new(store))
}

#[test]
fn test_upload_persists_record() -> Result<()> {
    let (_temp_dir, mut service) = setup_service();
    let record = service.upload(
        NewDataset::new("q1 sales", "sales.csv", SALES_CSV.as_bytes().to_vec())
            .with_description("first quarter"),
    )?;

    let path = service
        .store()
        .dir()
        .join(format!("dataset_{}.json", record.id));
    assert!(path.is_file());

    let stored = service.store().get(&record.id)?.expect("record on disk");
    assert_eq!(stored.name, "q1 sales");
    assert_eq!(stored.description.as_deref(), Some("first quarter"));
    assert_eq!(stored.domain, Domain::Ecommerce);
    assert_eq!(stored.dataset.row_count(), 5);
    assert_eq!(stored.suggested_charts.len(), 4);
    assert_eq!(stored.file_size, SALES_CSV.len() as u64);
    Ok(())
}

#[test]
fn test_insights_survive_store_round_trip() -> Result<()> {
    let (_temp_dir, mut service) = setup_service();
    let counted = service.upload(NewDataset::new(
        "catalog",
        "catalog.csv",
        b"product,category\npen,a\nink,a\ncap,b\n".to_vec(),
    ))?;
    let summed = service.upload(NewDataset::new(
        "sales",
        "sales.csv",
        SALES_CSV.as_bytes().to_vec(),
    ))?;

    for record in [&counted, &summed] {
        let stored = service.store().get(&record.id)?.expect("record on disk");
        assert_eq!(stored.insights, record.insights);
        assert_eq!(stored.suggested_charts, record.suggested_charts);
    }

    let report = service.insights(&counted.id)?;
    let DomainMetrics::Ecommerce(metrics) = &report.insights.key_metrics else {
        panic!("expected ecommerce metrics");
    };
    match &metrics.category_performance {
        Some(CategoryPerformance::Count(counts)) => {
            assert_eq!(counts.get("a"), Some(&2));
            assert_eq!(counts.get("b"), Some(&1));
        }
        other => panic!("expected category counts, got {:?}", other),
    }
    let json = serde_json::to_value(&report.insights)?;
    assert_eq!(json["key_metrics"]["ecommerce"]["category_performance"]["a"], 2);
    assert!(json["key_metrics"]["ecommerce"]["category_performance"]["a"].is_u64());

    let report = service.insights(&summed.id)?;
    let DomainMetrics::Ecommerce(metrics) = &report.insights.key_metrics else {
        panic!("expected ecommerce metrics");
    };
    assert!(matches!(
        metrics.category_performance,
        Some(CategoryPerformance::Revenue(_))
    ));
    Ok(())
}

#[test]
fn test_list_stats_query_chart_delete() -> Result<()> {
    let (_temp_dir, mut service) = setup_service();
    let record = service.upload(NewDataset::new(
        "sales",
        "sales.csv",
        SALES_CSV.as_bytes().to_vec(),
    ))?;

    let listed = service.list()?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].row_count, 5);

    let stats = service.stats(&record.id)?;
    assert_eq!(stats.total_rows, 5);

    let query = Query {
        limit: 2,
        search: Some("boston".to_string()),
        ..Query::default()
    };
    let page = service.query(&record.id, &query)?;
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.data.len(), 2);

    let chart = service.chart(&record.id, &ChartSpec::new(ChartType::Pie, "city"))?;
    assert_eq!(chart.labels.len(), 3);

    let report = service.insights(&record.id)?;
    assert_eq!(report.domain, Domain::Ecommerce);
    assert_eq!(report.insights.title, "E-commerce Analytics");

    service.delete(&record.id)?;
    assert!(service.list()?.is_empty());
    let err = service.stats(&record.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound(_))
    ));
    Ok(())
}

#[test]
fn test_list_skips_unreadable_files() -> Result<()> {
    let (_temp_dir, mut service) = setup_service();
    service.upload(NewDataset::new("ok", "ok.csv", b"a,b\n1,2\n".to_vec()))?;

    let dir = service.store().dir().to_path_buf();
    fs::write(dir.join("dataset_broken.json"), "{ not json")?;
    fs::write(dir.join("notes.txt"), "ignored")?;

    let listed = service.list()?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "ok");
    Ok(())
}

#[test]
fn test_failed_ingest_stores_nothing() -> Result<()> {
    let (_temp_dir, mut service) = setup_service();
    let result = service.upload(NewDataset::new("bad", "bad.json", b"{}".to_vec()));
    assert!(result.is_err());
    assert!(service.list()?.is_empty());
    Ok(())
}

#[test]
fn test_get_missing_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FsDatastore::new(temp_dir.path().join("never-created"));
    assert!(store.list()?.is_empty());
    assert!(store.get("0123456789abcdef")?.is_none());
    Ok(())
}
