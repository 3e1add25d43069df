//! Records and stores shared by the unit tests.

use crate::{DataStore, IndexedField, InMemoryDataStore};
use domain::Record;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Birth {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: u32,
    pub first_name: String,
    pub lastname: String,
    pub score: i32,
    pub birth: Birth,
}

impl Record for Person {
    type Id = u32;
    const ID_MEMBER: &'static str = "Id";

    fn id(&self) -> &u32 {
        &self.id
    }
}

pub fn person(i: u32) -> Person {
    Person {
        id: i,
        first_name: format!("firstname {i}"),
        lastname: format!("lastname {i}"),
        score: i as i32,
        birth: Birth {
            year: 1980 + i as i32,
            month: 1 + i % 12,
            day: 1 + i % 28,
        },
    }
}

pub fn person_fields() -> Vec<IndexedField<Person>> {
    vec![
        IndexedField::member("FirstName"),
        IndexedField::member("Lastname"),
        IndexedField::member("Birth.Day"),
    ]
}

/// In-memory store holding `person(0)` through `person(9)`.
pub async fn seeded_store() -> InMemoryDataStore<Person> {
    let store = DataStore::in_memory(person_fields()).await.unwrap();
    for i in 0..10 {
        assert!(store.insert(person(i)).await.unwrap());
    }
    store
}
