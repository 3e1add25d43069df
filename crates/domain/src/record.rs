use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, hash::Hash};

/// Bounds every record identifier satisfies.
pub trait RecordId:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> RecordId for T where
    T: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// A value stored in a data store. Identity is the identifier alone.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: RecordId;

    /// Name of the identifier member as it appears in predicates.
    const ID_MEMBER: &'static str = "id";

    fn id(&self) -> &Self::Id;
}

/// Identifiers sharing one index value. Updates return a new set so an
/// entry is always replaced whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    transparent,
    bound(serialize = "Id: Serialize", deserialize = "Id: DeserializeOwned + Eq + Hash")
)]
pub struct IdSet<Id>(HashSet<Id>);

impl<Id: Eq + Hash> PartialEq for IdSet<Id> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<Id: Eq + Hash> Eq for IdSet<Id> {}

impl<Id> Default for IdSet<Id> {
    fn default() -> Self {
        Self(HashSet::new())
    }
}

impl<Id: Eq + Hash + Clone> IdSet<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(id: Id) -> Self {
        Self(HashSet::from([id]))
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Id> {
        self.0.iter()
    }

    /// Copy of this set with `id` added.
    pub fn inserting(&self, id: Id) -> Self {
        let mut next = self.0.clone();
        next.insert(id);
        Self(next)
    }

    /// Copy of this set without `id`.
    pub fn removing(&self, id: &Id) -> Self {
        let mut next = self.0.clone();
        next.remove(id);
        Self(next)
    }
}

impl<Id: Eq + Hash> FromIterator<Id> for IdSet<Id> {
    fn from_iter<I: IntoIterator<Item = Id>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<Id> IntoIterator for IdSet<Id> {
    type Item = Id;
    type IntoIter = std::collections::hash_set::IntoIter<Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
