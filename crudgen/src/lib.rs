//! Crudgen core library.
//!
//! Models the UI/validation metadata of user-defined entities and tracks
//! how that metadata evolves over time: a convention resolver fills in
//! defaults for unconfigured properties, a diff engine compares the
//! recorded snapshot against the freshly scanned state, and a migration
//! store persists each diff as an immutable record while advancing the
//! cumulative snapshot. Downstream code generators consume the recorded
//! metadata; nothing in this crate applies migrations or touches a
//! database.

pub mod conventions;
pub mod descriptor;
pub mod diff;
pub mod errors;
pub mod migration;
pub mod store;

pub use conventions::resolve;
pub use descriptor::{
    DeclaredMember, EntityDescriptor, PropertyDescriptor, RelationKind, RelationshipDescriptor,
    SemanticType, SortSpec,
};
pub use diff::diff;
pub use errors::{DiffError, StoreError};
pub use migration::{AttributeChange, Change, FieldDescriptor, Migration, Snapshot, SCHEMA_VERSION};
pub use store::MigrationStore;
