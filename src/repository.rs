//! Content repository boundary used to resolve embed targets.

use std::collections::HashMap;

/// Metadata about a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentInfo {
    pub id: i64,
    pub content_type_id: i64,
}

/// A location (tree node) pointing at a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub id: i64,
    pub content_info: ContentInfo,
}

/// Outcome of a repository lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// Read access to content objects and locations.
///
/// Implementations may block on I/O; timeouts and cancellation belong here,
/// the pipeline imposes none.
pub trait ContentRepository: Send + Sync {
    fn load_content_info(&self, content_id: i64) -> Lookup<ContentInfo>;

    fn load_location(&self, location_id: i64) -> Lookup<Location>;
}

/// HashMap-backed repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    contents: HashMap<i64, ContentInfo>,
    locations: HashMap<i64, i64>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a content object of the given type.
    pub fn with_content(mut self, content_id: i64, content_type_id: i64) -> Self {
        self.insert_content(content_id, content_type_id);
        self
    }

    /// Register a location pointing at `content_id`.
    pub fn with_location(mut self, location_id: i64, content_id: i64) -> Self {
        self.insert_location(location_id, content_id);
        self
    }

    pub fn insert_content(&mut self, content_id: i64, content_type_id: i64) {
        self.contents.insert(
            content_id,
            ContentInfo {
                id: content_id,
                content_type_id,
            },
        );
    }

    pub fn insert_location(&mut self, location_id: i64, content_id: i64) {
        self.locations.insert(location_id, content_id);
    }
}

impl ContentRepository for InMemoryRepository {
    fn load_content_info(&self, content_id: i64) -> Lookup<ContentInfo> {
        self.contents.get(&content_id).copied().into()
    }

    /// A location whose content object is missing is not found either.
    fn load_location(&self, location_id: i64) -> Lookup<Location> {
        let Some(content_id) = self.locations.get(&location_id) else {
            return Lookup::NotFound;
        };
        self.load_content_info(*content_id).map(|content_info| Location {
            id: location_id,
            content_info,
        })
    }
}
