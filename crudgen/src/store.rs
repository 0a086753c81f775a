//! Persistence for migrations and the cumulative snapshot.
//!
//! Layout under the workspace directory:
//!
//! ```text
//! <workspace>/snapshot.json
//! <workspace>/migrations/<migrationId>.json
//! ```
//!
//! All writes go through write-temp-then-rename so an interrupted
//! invocation cannot leave a torn file. There is no locking: concurrent
//! invocations against the same workspace can race (accepted limitation of
//! the single-invocation model).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::descriptor::EntityDescriptor;
use crate::errors::StoreError;
use crate::migration::{Change, Migration, Snapshot};

/// Migration names become part of file names and generated identifiers.
static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("name pattern is valid"));

/// File-backed store for one project workspace.
pub struct MigrationStore {
    workspace: PathBuf,
}

impl MigrationStore {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.workspace.join("migrations")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.workspace.join("snapshot.json")
    }

    fn migration_path(&self, migration_id: &str) -> PathBuf {
        self.migrations_dir().join(format!("{migration_id}.json"))
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot_path().exists() && self.migrations_dir().exists()
    }

    /// Create the workspace directories and an empty snapshot. Idempotent:
    /// an already-initialized workspace is left untouched and its snapshot
    /// returned.
    pub fn init(&self) -> Result<Snapshot, StoreError> {
        let migrations = self.migrations_dir();
        fs::create_dir_all(&migrations)
            .map_err(|e| StoreError::io("failed to create migrations directory", &migrations, e))?;

        if self.snapshot_path().exists() {
            return self.load_snapshot();
        }

        let snapshot = Snapshot::empty();
        self.save_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Read the authoritative snapshot. A malformed file is an error here,
    /// never skipped: everything downstream trusts this state.
    pub fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Err(StoreError::NotInitialized {
                workspace: self.workspace.clone(),
            });
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| StoreError::io("failed to read snapshot", &path, e))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
            what: "snapshot",
            path,
            source: e,
        })
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| StoreError::Serialization {
            what: "snapshot",
            path: self.snapshot_path(),
            source: e,
        })?;
        write_atomic(&self.snapshot_path(), &json)
    }

    /// Derive the migration id for `name` at `timestamp`: a fixed-width,
    /// string-sortable second-resolution stamp plus the name. Two creations
    /// in the same second with the same name collide, which
    /// [`create_migration`](Self::create_migration) treats as fatal.
    pub fn next_migration_id(name: &str, timestamp: DateTime<Utc>) -> String {
        format!("{}_{name}", timestamp.format("%Y%m%d%H%M%S"))
    }

    /// Reject names that would not survive as file names or identifiers.
    /// Runs before any I/O.
    pub fn validate_name(name: &str) -> Result<(), StoreError> {
        if MIGRATION_NAME.is_match(name) {
            Ok(())
        } else {
            Err(StoreError::InvalidName {
                name: name.to_string(),
            })
        }
    }

    /// Build and persist a migration record. The file is keyed by the
    /// derived id and is never overwritten: an existing file with the same
    /// id is a fatal error.
    pub fn create_migration(
        &self,
        name: &str,
        changes: Vec<Change>,
        timestamp: DateTime<Utc>,
    ) -> Result<(Migration, PathBuf), StoreError> {
        Self::validate_name(name)?;

        if !self.is_initialized() {
            return Err(StoreError::NotInitialized {
                workspace: self.workspace.clone(),
            });
        }

        let migration_id = Self::next_migration_id(name, timestamp);
        let path = self.migration_path(&migration_id);
        if path.exists() {
            return Err(StoreError::DuplicateMigrationId { id: migration_id });
        }

        let migration = Migration::new(name, migration_id, timestamp, changes);
        let json = serde_json::to_string_pretty(&migration).map_err(|e| StoreError::Serialization {
            what: "migration",
            path: path.clone(),
            source: e,
        })?;
        write_atomic(&path, &json)?;

        Ok((migration, path))
    }

    /// Remove the most recent migration: delete its file, pop its id and
    /// recompute `lastMigration`. Returns `false` without touching anything
    /// when no migration has been applied. The caller is responsible for
    /// saving the updated snapshot.
    pub fn remove_last(&self, snapshot: &mut Snapshot) -> Result<bool, StoreError> {
        let Some(last) = snapshot.applied_migrations.last().cloned() else {
            return Ok(false);
        };

        let path = self.migration_path(&last);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The applied list is authoritative; a missing file has
                // already been removed out of band.
                log::warn!("migration file {} was already missing", path.display());
            }
            Err(e) => return Err(StoreError::io("failed to delete migration", &path, e)),
        }

        snapshot.applied_migrations.pop();
        snapshot.last_migration = snapshot.applied_migrations.last().cloned();
        Ok(true)
    }

    /// Record a created migration on the snapshot: append its id and
    /// replace the entity list wholesale. Pure; the caller persists the
    /// returned value.
    pub fn advance_snapshot(
        snapshot: &Snapshot,
        migration_id: &str,
        new_entities: Vec<EntityDescriptor>,
    ) -> Snapshot {
        let mut advanced = snapshot.clone();
        advanced.applied_migrations.push(migration_id.to_string());
        advanced.last_migration = Some(migration_id.to_string());
        advanced.entities = new_entities;
        advanced
    }

    /// Read a single migration record by id. Strict parse.
    pub fn read_migration(&self, migration_id: &str) -> Result<Migration, StoreError> {
        let path = self.migration_path(migration_id);
        let content = fs::read_to_string(&path)
            .map_err(|e| StoreError::io("failed to read migration", &path, e))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
            what: "migration",
            path,
            source: e,
        })
    }

    /// List all stored migrations, oldest first (ids sort chronologically).
    /// A malformed file is skipped with a warning; listing is advisory,
    /// unlike the snapshot read.
    pub fn list_migrations(&self) -> Result<Vec<Migration>, StoreError> {
        let dir = self.migrations_dir();
        if !dir.exists() {
            return Err(StoreError::NotInitialized {
                workspace: self.workspace.clone(),
            });
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| StoreError::io("failed to read migrations directory", &dir, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut migrations = Vec::with_capacity(paths.len());
        for path in paths {
            let content = fs::read_to_string(&path)
                .map_err(|e| StoreError::io("failed to read migration", &path, e))?;
            match serde_json::from_str::<Migration>(&content) {
                Ok(migration) => migrations.push(migration),
                Err(err) => {
                    log::warn!("skipping malformed migration file {}: {err}", path.display());
                }
            }
        }
        Ok(migrations)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| StoreError::io("failed to write", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io("failed to finalize write of", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn store_in_tempdir() -> (tempfile::TempDir, MigrationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationStore::new(dir.path().join(".crudgen"));
        (dir, store)
    }

    #[test]
    fn init_creates_empty_snapshot_and_is_idempotent() {
        let (_dir, store) = store_in_tempdir();
        assert!(!store.is_initialized());

        let snapshot = store.init().unwrap();
        assert!(store.is_initialized());
        assert_eq!(snapshot, Snapshot::empty());

        // Second init keeps existing state.
        let mut modified = snapshot;
        modified.applied_migrations.push("x".to_string());
        store.save_snapshot(&modified).unwrap();
        let again = store.init().unwrap();
        assert_eq!(again.applied_migrations, vec!["x".to_string()]);
    }

    #[test]
    fn load_snapshot_errors_when_uninitialized() {
        let (_dir, store) = store_in_tempdir();
        assert!(matches!(
            store.load_snapshot(),
            Err(StoreError::NotInitialized { .. })
        ));
    }

    #[test]
    fn load_snapshot_rejects_malformed_file() {
        let (_dir, store) = store_in_tempdir();
        store.init().unwrap();
        fs::write(store.snapshot_path(), "{not json").unwrap();
        assert!(matches!(
            store.load_snapshot(),
            Err(StoreError::Serialization { what: "snapshot", .. })
        ));
    }

    #[test]
    fn migration_ids_sort_with_the_clock() {
        let earlier =
            MigrationStore::next_migration_id("zzz", stamp("2024-06-01T10:30:00Z"));
        let later = MigrationStore::next_migration_id("aaa", stamp("2024-06-01T10:30:01Z"));
        assert!(earlier < later, "{earlier} should sort before {later}");
        assert_eq!(earlier, "20240601103000_zzz");
    }

    #[test]
    fn name_validation_runs_before_io() {
        let (_dir, store) = store_in_tempdir();
        // Deliberately uninitialized: the name check must fire first.
        let err = store
            .create_migration("bad name!", Vec::new(), stamp("2024-06-01T10:30:00Z"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));

        for name in ["init", "add_avatar", "drop-legacy", "V2"] {
            MigrationStore::validate_name(name).unwrap();
        }
        for name in ["", "1st", "has space", "semi;colon", "_leading"] {
            assert!(MigrationStore::validate_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn create_migration_persists_and_never_overwrites() {
        let (_dir, store) = store_in_tempdir();
        store.init().unwrap();

        let at = stamp("2024-06-01T10:30:00Z");
        let (migration, path) = store.create_migration("init", Vec::new(), at).unwrap();
        assert_eq!(migration.migration_id, "20240601103000_init");
        assert!(path.exists());

        let reread = store.read_migration(&migration.migration_id).unwrap();
        assert_eq!(reread, migration);

        // Same second, same name: fatal collision, file untouched.
        let err = store.create_migration("init", Vec::new(), at).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMigrationId { .. }));
    }

    #[test]
    fn advance_snapshot_replaces_entities_wholesale() {
        let snapshot = Snapshot::empty();
        let entities = vec![EntityDescriptor::new("User")];
        let advanced = MigrationStore::advance_snapshot(&snapshot, "20240601103000_init", entities);

        assert_eq!(advanced.last_migration.as_deref(), Some("20240601103000_init"));
        assert_eq!(advanced.applied_migrations.len(), 1);
        assert_eq!(advanced.entities.len(), 1);
        // Original is untouched.
        assert!(snapshot.entities.is_empty());
    }

    #[test]
    fn remove_last_on_empty_history_is_a_noop() {
        // Scenario D.
        let (_dir, store) = store_in_tempdir();
        store.init().unwrap();

        let mut snapshot = store.load_snapshot().unwrap();
        let before = snapshot.clone();
        assert!(!store.remove_last(&mut snapshot).unwrap());
        assert_eq!(snapshot, before);
    }

    #[test]
    fn remove_last_pops_in_lifo_order() {
        let (_dir, store) = store_in_tempdir();
        store.init().unwrap();

        let mut snapshot = store.load_snapshot().unwrap();
        for (name, at) in [
            ("first", "2024-06-01T10:30:00Z"),
            ("second", "2024-06-01T10:30:05Z"),
        ] {
            let (migration, _) = store
                .create_migration(name, Vec::new(), stamp(at))
                .unwrap();
            snapshot =
                MigrationStore::advance_snapshot(&snapshot, &migration.migration_id, Vec::new());
        }

        assert!(store.remove_last(&mut snapshot).unwrap());
        assert_eq!(snapshot.last_migration.as_deref(), Some("20240601103000_first"));
        assert_eq!(snapshot.applied_migrations.len(), 1);
        assert!(!store.migration_path("20240601103005_second").exists());
        assert!(store.migration_path("20240601103000_first").exists());

        assert!(store.remove_last(&mut snapshot).unwrap());
        assert!(snapshot.last_migration.is_none());
        assert!(!store.remove_last(&mut snapshot).unwrap());
    }

    #[test]
    fn list_migrations_sorts_and_skips_malformed_files() {
        let (_dir, store) = store_in_tempdir();
        store.init().unwrap();

        store
            .create_migration("later", Vec::new(), stamp("2024-06-02T08:00:00Z"))
            .unwrap();
        store
            .create_migration("earlier", Vec::new(), stamp("2024-06-01T08:00:00Z"))
            .unwrap();
        fs::write(store.migrations_dir().join("19990101000000_junk.json"), "oops").unwrap();

        let listed = store.list_migrations().unwrap();
        let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["earlier", "later"]);
    }
}
