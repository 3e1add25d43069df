// crates/edge/src/db/collection.rs

use super::sqlite::{SqliteDatabase, SqliteStore};
use crate::{Error, Result};
use adapt::{DataStore, IndexedField};
use domain::{IdSet, IndexValue, Record, StoreError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

/// A data store whose primary table and index tables live in one SQLite
/// database.
pub type Collection<T> = DataStore<
    T,
    SqliteStore<<T as Record>::Id, T>,
    SqliteStore<IndexValue, IdSet<<T as Record>::Id>>,
>;

pub type DocumentStore = Collection<Document>;

/// Schemaless JSON object identified by its `id` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub body: Map<String, Json>,
}

impl Document {
    /// Accepts any JSON object; a missing `id` is filled with a fresh v4 UUID
    /// and number or boolean ids are kept in their index-value text, the
    /// same form a query literal compiles to.
    pub fn from_json(value: Json) -> Result<Self> {
        let Json::Object(mut body) = value else {
            return Err(Error::InvalidDocument("a document must be a JSON object".into()));
        };
        let id = match body.remove("id") {
            None | Some(Json::Null) => Uuid::new_v4().to_string(),
            Some(Json::String(id)) => id,
            Some(scalar @ (Json::Number(_) | Json::Bool(_))) => {
                IndexValue::from_json(&scalar).to_string()
            }
            Some(other) => {
                return Err(Error::InvalidDocument(format!(
                    "`id` must be a string, number or boolean, found {other}"
                )))
            }
        };
        Ok(Self { id, body })
    }
}

impl Record for Document {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

/// Opens the collection `name`: records in table `name`, each index in
/// table `{name}_{index}`.
#[tracing::instrument(skip(db, fields), fields(indexes = fields.len()))]
pub async fn open_collection<T>(
    db: &SqliteDatabase,
    name: &str,
    fields: Vec<IndexedField<T>>,
) -> Result<Collection<T>>
where
    T: Record + Serialize + DeserializeOwned,
{
    let records = db.store::<T::Id, T>(name).await?;
    let store = DataStore::build(
        move || records,
        |index| {
            let db = db.clone();
            let table = format!("{name}_{index}");
            async move { db.store(table).await.map_err(StoreError::from) }
        },
        fields,
    )
    .await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_keep_their_id() {
        let doc = Document::from_json(json!({ "id": "c-1", "FirstName": "ann" })).unwrap();

        assert_eq!(doc.id, "c-1");
        assert_eq!(doc.body.get("FirstName"), Some(&json!("ann")));
        assert!(!doc.body.contains_key("id"));
    }

    #[test]
    fn missing_ids_are_generated() {
        let doc = Document::from_json(json!({ "FirstName": "ann" })).unwrap();
        assert!(Uuid::parse_str(&doc.id).is_ok());
    }

    #[test]
    fn numeric_ids_become_text() {
        let doc = Document::from_json(json!({ "id": 42 })).unwrap();
        assert_eq!(doc.id, "42");

        let whole = Document::from_json(json!({ "id": 42.0 })).unwrap();
        assert_eq!(whole.id, "42");
    }

    #[test]
    fn structured_ids_are_rejected() {
        assert!(matches!(
            Document::from_json(json!({ "id": { "a": 1 } })),
            Err(Error::InvalidDocument(_))
        ));
        assert!(Document::from_json(json!({ "id": [1] })).is_err());
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(Document::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn documents_serialize_flat() {
        let doc = Document::from_json(json!({ "id": "x", "Birth": { "Day": 3 } })).unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({ "id": "x", "Birth": { "Day": 3 } })
        );
    }
}
