//! Snapshot and migration records, and the change taxonomy they carry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::{EntityDescriptor, PropertyDescriptor, RelationshipDescriptor};

/// Version of the on-disk snapshot/migration format.
pub const SCHEMA_VERSION: u32 = 1;

/// Cumulative recorded state of all entities plus migration history.
///
/// Replaced wholesale after each successful migration create/remove; the
/// single source of truth for the current recorded shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_migration: Option<String>,

    /// Applied migration ids, oldest first. Append-only.
    #[serde(default)]
    pub applied_migrations: Vec<String>,

    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
}

impl Snapshot {
    /// The empty snapshot written at project initialization.
    pub fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION,
            last_migration: None,
            applied_migrations: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Look up a recorded entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// One immutable diff record. Created once, written to storage, never
/// mutated; removable only as the most recent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub migration_id: String,
    pub changes: Vec<Change>,
}

impl Migration {
    pub fn new(
        name: impl Into<String>,
        migration_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION,
            timestamp,
            name: name.into(),
            migration_id: migration_id.into(),
            changes,
        }
    }
}

/// Old and new value of one tracked attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// A member added to an entity: either a scalar property or a navigation
/// relationship. Untagged on the wire; the two shapes are told apart by
/// their required keys (`declaredType` vs `targetEntityName`/`kind`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDescriptor {
    Property(PropertyDescriptor),
    Relationship(RelationshipDescriptor),
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        match self {
            FieldDescriptor::Property(p) => &p.name,
            FieldDescriptor::Relationship(r) => &r.name,
        }
    }
}

/// One atomic, typed entry describing a difference detected by the diff
/// engine. Closed set of five variants, discriminated by the wire `type`
/// tag. Relationship changes reuse the field shapes, keyed by the
/// relationship's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Change {
    EntityAdded {
        entity_name: String,
        entity: EntityDescriptor,
    },
    EntityRemoved {
        entity_name: String,
    },
    FieldAdded {
        entity_name: String,
        field: FieldDescriptor,
    },
    FieldRemoved {
        entity_name: String,
        field_name: String,
    },
    FieldModified {
        entity_name: String,
        field_name: String,
        /// Never empty: an unchanged field produces no `Change` at all.
        changed_attributes: BTreeMap<String, AttributeChange>,
    },
}

impl Change {
    /// Name of the entity this change belongs to.
    pub fn entity_name(&self) -> &str {
        match self {
            Change::EntityAdded { entity_name, .. }
            | Change::EntityRemoved { entity_name }
            | Change::FieldAdded { entity_name, .. }
            | Change::FieldRemoved { entity_name, .. }
            | Change::FieldModified { entity_name, .. } => entity_name,
        }
    }
}
