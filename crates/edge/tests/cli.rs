use adapt::IndexedField;
use edge::{
    cli::{execute, run, Cli, Commands},
    db::{open_collection, Document, DocumentStore, SqliteDatabase},
    setting::{Settings, SETTINGS_FILE},
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

async fn collection() -> (TempDir, SqliteDatabase, DocumentStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join(SETTINGS_FILE),
        r#"
        [collection]
        name = "customers"
        indexes = ["FirstName", "Address.City"]
        "#,
    )
    .unwrap();

    let settings = Settings::load(dir.path()).unwrap();
    let db = SqliteDatabase::open(&settings.database).await.unwrap();
    let fields = settings
        .collection
        .indexes
        .iter()
        .map(|p| IndexedField::member(p.as_str()))
        .collect();
    let store = open_collection::<Document>(&db, &settings.collection.name, fields)
        .await
        .unwrap();
    (dir, db, store)
}

fn insert(doc: serde_json::Value) -> Commands {
    Commands::Insert {
        document: doc.to_string(),
    }
}

#[tokio::test]
async fn insert_find_and_remove_documents() {
    let (_dir, _db, store) = collection().await;

    let out = execute(&store, insert(json!({ "id": "a", "FirstName": "ann", "Address": { "City": "Oslo" } })))
        .await
        .unwrap();
    assert_eq!(out, json!({ "id": "a", "inserted": true }));
    execute(&store, insert(json!({ "id": "b", "FirstName": "bob", "Address": { "City": "Oslo" } })))
        .await
        .unwrap();

    let again = execute(&store, insert(json!({ "id": "a", "FirstName": "eve" })))
        .await
        .unwrap();
    assert_eq!(again["inserted"], json!(false));

    let oslo = execute(
        &store,
        Commands::Find {
            filter: json!({ "Address.City": "Oslo" }).to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(oslo.as_array().map(Vec::len), Some(2));

    let ann = execute(
        &store,
        Commands::FindOne {
            filter: json!({ "FirstName": "ann", "Address.City": "Oslo" }).to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(ann["id"], json!("a"));

    let removed = execute(&store, Commands::Remove { id: "a".into() }).await.unwrap();
    assert_eq!(removed["removed"], json!(true));

    let gone = execute(&store, Commands::Get { id: "a".into() }).await.unwrap();
    assert_eq!(gone, json!(null));

    let keys = execute(&store, Commands::Keys).await.unwrap();
    assert_eq!(keys, json!(["b"]));
}

#[tokio::test]
async fn generated_ids_are_reported() {
    let (_dir, _db, store) = collection().await;

    let out = execute(&store, insert(json!({ "FirstName": "ann" }))).await.unwrap();
    let id = out["id"].as_str().unwrap().to_string();

    let found = execute(&store, Commands::Get { id: id.clone() }).await.unwrap();
    assert_eq!(found["FirstName"], json!("ann"));
    assert_eq!(found["id"], json!(id));
}

#[tokio::test]
async fn numeric_ids_are_found_by_number_or_text() {
    let (_dir, _db, store) = collection().await;

    let out = execute(&store, insert(json!({ "id": 42, "FirstName": "ann" }))).await.unwrap();
    assert_eq!(out["id"], json!("42"));

    for filter in [json!({ "id": 42 }), json!({ "id": "42" })] {
        let found = execute(&store, Commands::Find { filter: filter.to_string() }).await.unwrap();
        assert_eq!(found.as_array().map(Vec::len), Some(1), "{filter}");
    }
    let got = execute(&store, Commands::Get { id: "42".into() }).await.unwrap();
    assert_eq!(got["FirstName"], json!("ann"));
}

#[tokio::test]
async fn bad_input_is_reported_not_stored() {
    let (_dir, _db, store) = collection().await;

    assert!(execute(&store, Commands::Insert { document: "{not json".into() }).await.is_err());
    assert!(execute(&store, insert(json!([1, 2]))).await.is_err());
    assert!(execute(&store, Commands::Find { filter: json!({ "Score": { "$gt": 1 } }).to_string() })
        .await
        .is_err());
    assert!(execute(&store, Commands::Find { filter: json!({ "Unindexed": 1 }).to_string() })
        .await
        .is_err());

    assert_eq!(execute(&store, Commands::Keys).await.unwrap(), json!([]));
}

#[tokio::test]
async fn run_reads_settings_from_the_directory() {
    let (dir, db, _store) = collection().await;
    db.close().await;

    let cli = Cli {
        dir: dir.path().to_path_buf(),
        command: insert(json!({ "id": "z", "FirstName": "zed" })),
    };
    run(cli).await.unwrap();

    let missing = Cli {
        dir: dir.path().join("nope"),
        command: Commands::Keys,
    };
    assert!(run(missing).await.is_err());
}
