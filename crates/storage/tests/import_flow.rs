//! End-to-end import flow: CSV file through the importer into SQLite.

use std::io::Write;

use billmap_core::{ClientId, RecordFilter, RecordStore, SiteDirectory, SiteId};
use billmap_import::CsvImporter;
use billmap_storage::SqliteStore;

async fn store_with_directory() -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
        .replace_sites(&[
            billmap_core::Site {
                id: SiteId(4),
                name: "Acme Corp".to_string(),
                url: "https://www.acme.com/".to_string(),
                client_id: ClientId(1),
            },
            billmap_core::Site {
                id: SiteId(9),
                name: "Globex".to_string(),
                url: "https://globex.example/".to_string(),
                client_id: ClientId(2),
            },
        ])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn import_file_reconcile_and_requery() {
    let store = store_with_directory().await;
    let sites = store.sites().await.unwrap();
    let importer = CsvImporter::new(&sites);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "Template Name,Previous date,Next Date,Name,Amount\n\
         INV-100,2024-01-01,2024-02-01,Acme Corp,\"$1,250.00\"\n\
         INV-200,2024-01-05,2024-02-05,Globex,300.00\n\
         INV-300,2024-01-07,2024-02-07,Mystery Inc,55.00\n"
    )
    .unwrap();

    let stats = importer.import_path(&store, file.path()).await.unwrap();
    assert_eq!(stats.added, 3);
    assert_eq!(stats.removed, 0);

    let rows = store.query(&RecordFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 3);

    let acme = store.find_by_template("INV-100").await.unwrap().unwrap();
    assert_eq!(acme.site_id, SiteId(4));
    assert_eq!(acme.amount.to_cents(), 125_000);

    let mystery = store.find_by_template("INV-300").await.unwrap().unwrap();
    assert_eq!(mystery.site_id, SiteId::NONE);

    // Second export drops INV-200 and reprices INV-100. Run it with an
    // explicit later stamp so both surviving rows read as changed.
    let second = "Template Name,Previous date,Next Date,Name,Amount\n\
                  INV-100,2024-02-01,2024-03-01,Acme Corp,\"$1,300.00\"\n\
                  INV-300,2024-01-07,2024-02-07,Mystery Inc,55.00\n";

    let stats = importer
        .import_reader(&store, second.as_bytes(), 1_800_000_000)
        .await
        .unwrap();
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.removed, 1);

    assert!(store.find_by_template("INV-200").await.unwrap().is_none());
    let acme = store.find_by_template("INV-100").await.unwrap().unwrap();
    assert_eq!(acme.amount.to_cents(), 130_000);
}

#[tokio::test]
async fn import_missing_file_is_unreadable() {
    let store = store_with_directory().await;
    let importer = CsvImporter::new(&[]);

    let result = importer
        .import_path(&store, std::path::Path::new("/nonexistent/billing.csv"))
        .await;
    assert!(matches!(
        result,
        Err(billmap_import::ImportError::FileUnreadable(_))
    ));
}

#[tokio::test]
async fn manual_mapping_survives_reimport() {
    let store = store_with_directory().await;
    let sites = store.sites().await.unwrap();
    let importer = CsvImporter::new(&sites);

    let csv = "Template Name,Previous date,Next Date,Name,Amount\n\
               INV-100,2024-01-01,2024-02-01,Mystery Inc,10.00\n";
    importer
        .import_reader(&store, csv.as_bytes(), 1_700_000_000)
        .await
        .unwrap();

    let record = store.find_by_template("INV-100").await.unwrap().unwrap();
    assert_eq!(record.site_id, SiteId::NONE);

    // Operator fixes the mapping by hand.
    assert_eq!(store.set_site_mapping(record.id, SiteId(9)).await.unwrap(), 1);

    // Re-import with a client name that would auto-map to site 4.
    let csv = "Template Name,Previous date,Next Date,Name,Amount\n\
               INV-100,2024-01-01,2024-02-01,Acme Corp,10.00\n";
    importer
        .import_reader(&store, csv.as_bytes(), 1_700_000_100)
        .await
        .unwrap();

    let record = store.find_by_template("INV-100").await.unwrap().unwrap();
    assert_eq!(record.site_id, SiteId(9));
    assert_eq!(record.client_name, "Acme Corp");
}
