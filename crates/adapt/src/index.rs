use crate::{Error, Result};
use domain::{IndexName, IndexValue, MemberPath, StoreError};
use serde::Serialize;
use std::{collections::HashMap, fmt, future::Future, sync::Arc};
use tracing::debug;

type Projection<T> = Arc<dyn Fn(&T) -> Result<IndexValue> + Send + Sync>;

/// A record field maintained in a secondary index.
pub struct IndexedField<T> {
    path: MemberPath,
    name: IndexName,
    project: Projection<T>,
}

impl<T: Serialize + 'static> IndexedField<T> {
    /// Indexes the member at `path` of the record's serialized form.
    pub fn member(path: impl Into<MemberPath>) -> Self {
        let path = path.into();
        let walk = path.clone();
        Self::with_projection(
            path,
            Arc::new(move |record: &T| -> Result<IndexValue> {
                let doc = serde_json::to_value(record)?;
                Ok(IndexValue::project(&doc, &walk))
            }),
        )
    }
}

impl<T> IndexedField<T> {
    /// Indexes a caller-computed value under the name derived from `path`.
    pub fn computed<F>(path: impl Into<MemberPath>, project: F) -> Self
    where
        F: Fn(&T) -> IndexValue + Send + Sync + 'static,
    {
        Self::with_projection(path.into(), Arc::new(move |record: &T| -> Result<IndexValue> {
            Ok(project(record))
        }))
    }

    fn with_projection(path: MemberPath, project: Projection<T>) -> Self {
        let name = path.index_name();
        Self { path, name, project }
    }

    pub fn path(&self) -> &MemberPath {
        &self.path
    }

    pub fn name(&self) -> &IndexName {
        &self.name
    }

    pub fn project(&self, record: &T) -> Result<IndexValue> {
        (self.project)(record)
    }
}

impl<T> Clone for IndexedField<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            name: self.name.clone(),
            project: self.project.clone(),
        }
    }
}

impl<T> fmt::Debug for IndexedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedField")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One leaf store per index name.
#[derive(Debug)]
pub struct IndexStore<I> {
    stores: HashMap<IndexName, I>,
}

impl<I> IndexStore<I> {
    /// Opens a backing store for every field through `factory`.
    pub async fn build<T, F, Fut>(fields: &[IndexedField<T>], mut factory: F) -> Result<Self>
    where
        F: FnMut(IndexName) -> Fut,
        Fut: Future<Output = Result<I, StoreError>>,
    {
        let mut stores = HashMap::with_capacity(fields.len());
        for field in fields {
            let name = field.name();
            if stores.contains_key(name) {
                return Err(Error::DuplicateIndex(name.clone()));
            }
            let store = factory(name.clone()).await?;
            debug!(index = %name, "index store ready");
            stores.insert(name.clone(), store);
        }
        Ok(Self { stores })
    }

    pub fn get(&self, name: &IndexName) -> Option<&I> {
        self.stores.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &IndexName> {
        self.stores.keys()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{person, Person};
    use crate::store::InMemoryStore;
    use domain::IdSet;

    type Entries = InMemoryStore<IndexValue, IdSet<u32>>;

    #[test]
    fn member_fields_project_nested_values() {
        let day = IndexedField::<Person>::member("Birth.Day");
        let first = IndexedField::<Person>::member("FirstName");
        let record = person(3);

        assert_eq!(day.name().as_str(), "Birth.Day");
        assert_eq!(day.project(&record).unwrap(), IndexValue::new("4"));
        assert_eq!(first.project(&record).unwrap(), IndexValue::new("firstname 3"));
    }

    #[test]
    fn missing_members_project_to_null() {
        let field = IndexedField::<Person>::member("Birth.Era");
        assert!(field.project(&person(1)).unwrap().is_null());
    }

    #[test]
    fn computed_fields_use_the_given_path_as_name() {
        let field = IndexedField::computed("Initials", |p: &Person| {
            IndexValue::new(format!("{}{}", &p.first_name[..1], &p.lastname[..1]))
        });

        assert_eq!(field.path(), &MemberPath::parse("Initials"));
        assert_eq!(field.project(&person(0)).unwrap(), IndexValue::new("fl"));
    }

    #[tokio::test]
    async fn build_opens_one_store_per_field() {
        let fields = vec![
            IndexedField::<Person>::member("FirstName"),
            IndexedField::<Person>::member("Birth.Day"),
        ];
        let mut opened = Vec::new();

        let indexes = IndexStore::build(&fields, |name| {
            opened.push(name);
            async { Ok(Entries::new()) }
        })
        .await
        .unwrap();

        assert_eq!(indexes.len(), 2);
        assert!(indexes.get(&IndexName::from("Birth.Day")).is_some());
        assert!(indexes.get(&IndexName::from("Birth")).is_none());
        assert_eq!(opened, vec![IndexName::from("FirstName"), IndexName::from("Birth.Day")]);
    }

    #[tokio::test]
    async fn build_rejects_duplicate_names() {
        let fields = vec![
            IndexedField::<Person>::member("FirstName"),
            IndexedField::<Person>::computed("FirstName", |p: &Person| p.first_name.clone().into()),
        ];

        let err = IndexStore::build(&fields, |_| async { Ok(Entries::new()) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateIndex(name) if name.as_str() == "FirstName"));
    }

    #[tokio::test]
    async fn build_propagates_factory_failures() {
        let fields = vec![IndexedField::<Person>::member("FirstName")];

        let err = IndexStore::<Entries>::build(&fields, |_| async {
            Err(StoreError::backend("cannot open"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Store(StoreError::Backend(_))));
    }
}
