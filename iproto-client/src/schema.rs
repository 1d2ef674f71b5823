//! Space and index name resolution.
//!
//! Names are resolved by selecting from the server's own metadata spaces
//! through their "name" index. Resolved ids are cached per connection and
//! only dropped by [`SchemaCache::clear`] or when the connection closes.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::session::Stream;
use iproto_protocol::{request, Key, RequestType, SelectOptions, Value};
use std::collections::HashMap;
use std::fmt;

/// System space holding space metadata.
pub const SPACE_SPACE_ID: u32 = 280;

/// System space holding index metadata.
pub const INDEX_SPACE_ID: u32 = 288;

/// The "name" index of both metadata spaces.
pub const NAME_INDEX_ID: u32 = 2;

/// A space or index given either by numeric id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Id(u32),
    Name(String),
}

impl From<u32> for Identifier {
    fn from(id: u32) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

impl From<&String> for Identifier {
    fn from(name: &String) -> Self {
        Identifier::Name(name.clone())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Name(name) => f.write_str(name),
        }
    }
}

/// Name to id cache for one connection.
///
/// Index names are only unique within a space, so index entries are keyed
/// by `(space_id, name)`.
#[derive(Debug, Default)]
pub struct SchemaCache {
    spaces: HashMap<String, u32>,
    indexes: HashMap<(u32, String), u32>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn space(&self, name: &str) -> Option<u32> {
        self.spaces.get(name).copied()
    }

    pub fn index(&self, space_id: u32, name: &str) -> Option<u32> {
        self.indexes.get(&(space_id, name.to_string())).copied()
    }

    pub fn insert_space(&mut self, name: impl Into<String>, id: u32) {
        self.spaces.insert(name.into(), id);
    }

    pub fn insert_index(&mut self, space_id: u32, name: impl Into<String>, id: u32) {
        self.indexes.insert((space_id, name.into()), id);
    }

    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty() && self.indexes.is_empty()
    }

    pub fn clear(&mut self) {
        self.spaces.clear();
        self.indexes.clear();
    }
}

impl<S: Stream> Connection<S> {
    /// Resolves a space to its numeric id.
    pub async fn resolve_space(
        &mut self,
        space: impl Into<Identifier>,
    ) -> Result<u32, ClientError> {
        let name = match space.into() {
            Identifier::Id(id) => return Ok(id),
            Identifier::Name(name) => name,
        };

        if let Some(id) = self.schema.space(&name) {
            tracing::debug!("Space cache hit: {} -> {}", name, id);
            return Ok(id);
        }

        tracing::debug!("Space cache miss: {}", name);
        let key = vec![Value::from(name.as_str())];
        let id = self
            .lookup_id(SPACE_SPACE_ID, key, 0)
            .await?
            .ok_or_else(|| ClientError::NotFound {
                kind: "space",
                name: name.clone(),
            })?;

        self.schema.insert_space(name, id);
        Ok(id)
    }

    /// Resolves an index of an already resolved space to its numeric id.
    pub async fn resolve_index(
        &mut self,
        space_id: u32,
        index: impl Into<Identifier>,
    ) -> Result<u32, ClientError> {
        let name = match index.into() {
            Identifier::Id(id) => return Ok(id),
            Identifier::Name(name) => name,
        };

        if let Some(id) = self.schema.index(space_id, &name) {
            tracing::debug!("Index cache hit: {}/{} -> {}", space_id, name, id);
            return Ok(id);
        }

        tracing::debug!("Index cache miss: {}/{}", space_id, name);
        let key = vec![Value::from(space_id), Value::from(name.as_str())];
        let id = self
            .lookup_id(INDEX_SPACE_ID, key, 1)
            .await?
            .ok_or_else(|| ClientError::NotFound {
                kind: "index",
                name: name.clone(),
            })?;

        self.schema.insert_index(space_id, name, id);
        Ok(id)
    }

    /// Selects from a metadata space by name and reads the id at `position`
    /// of the first tuple. `None` means no usable tuple came back.
    async fn lookup_id(
        &mut self,
        system_space: u32,
        key: Vec<Value>,
        position: usize,
    ) -> Result<Option<u32>, ClientError> {
        let body = request::select(
            system_space,
            NAME_INDEX_ID,
            Key::Composite(key),
            &SelectOptions::new(),
        );
        let response = self.execute(RequestType::Select, None, Some(body)).await?;
        if let Some(code) = response.error_code() {
            return Err(ClientError::ServerError {
                code,
                message: response.error_message().to_string(),
            });
        }

        let id = response
            .into_tuples()
            .into_iter()
            .next()
            .and_then(|tuple| match tuple {
                Value::Array(fields) => fields.get(position).and_then(Value::as_u64),
                _ => None,
            })
            .and_then(|id| u32::try_from(id).ok());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_conversions() {
        assert_eq!(Identifier::from(512u32), Identifier::Id(512));
        assert_eq!(
            Identifier::from("activities"),
            Identifier::Name("activities".to_string())
        );
        assert_eq!(Identifier::from(7u32).to_string(), "7");
        assert_eq!(Identifier::from("price").to_string(), "price");
    }

    #[test]
    fn test_cache_index_scoped_by_space() {
        let mut cache = SchemaCache::new();
        cache.insert_space("activities", 512);
        cache.insert_index(512, "primary", 0);
        cache.insert_index(513, "primary", 3);

        assert_eq!(cache.space("activities"), Some(512));
        assert_eq!(cache.space("users"), None);
        assert_eq!(cache.index(512, "primary"), Some(0));
        assert_eq!(cache.index(513, "primary"), Some(3));
        assert_eq!(cache.space_count(), 1);
        assert_eq!(cache.index_count(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.index(512, "primary"), None);
    }
}
