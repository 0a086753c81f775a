//! End-to-end cycle over the library surface: scan output is simulated as
//! raw descriptors, then resolved, diffed, recorded and rolled back.

use chrono::{DateTime, Utc};
use crudgen::{
    diff, resolve, Change, DeclaredMember, EntityDescriptor, MigrationStore, PropertyDescriptor,
    SemanticType, Snapshot,
};

fn ts(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn user_members() -> Vec<DeclaredMember> {
    vec![
        DeclaredMember::new("name", SemanticType::String),
        DeclaredMember::new("email", SemanticType::String),
        DeclaredMember::new("created_at", SemanticType::Date),
    ]
}

#[test]
fn full_migration_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = MigrationStore::new(dir.path().join(".crudgen"));

    store.init().unwrap();
    assert_eq!(store.load_snapshot().unwrap(), Snapshot::empty());

    // Cycle 1: the User entity appears.
    let raw = EntityDescriptor::new("User");
    let user = resolve(&raw, &user_members());
    assert_eq!(
        user.property("email").unwrap().field_type.as_deref(),
        Some("email")
    );
    assert_eq!(user.property("email").unwrap().max_length, Some(255));
    assert_eq!(user.property("created_at").unwrap().is_read_only, Some(true));

    let snapshot = store.load_snapshot().unwrap();
    let current = vec![user];
    let changes = diff(&snapshot.entities, &current).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], Change::EntityAdded { entity_name, .. } if entity_name == "User"));

    let (first, path) = store
        .create_migration("init", changes, ts("2024-06-01T10:00:00Z"))
        .unwrap();
    assert!(path.ends_with("migrations/20240601100000_init.json"));
    assert!(path.exists());

    let snapshot = MigrationStore::advance_snapshot(&snapshot, &first.migration_id, current);
    store.save_snapshot(&snapshot).unwrap();

    // Cycle 2: the email property is widened explicitly.
    let mut raw = EntityDescriptor::new("User");
    let mut email = PropertyDescriptor::new("email", SemanticType::String);
    email.max_length = Some(300);
    raw.properties.push(email);
    let current = vec![resolve(&raw, &user_members())];

    let snapshot = store.load_snapshot().unwrap();
    assert_eq!(snapshot.last_migration.as_deref(), Some("20240601100000_init"));

    let changes = diff(&snapshot.entities, &current).unwrap();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        Change::FieldModified {
            entity_name,
            field_name,
            changed_attributes,
        } => {
            assert_eq!(entity_name, "User");
            assert_eq!(field_name, "email");
            assert_eq!(changed_attributes.len(), 1);
            assert_eq!(changed_attributes["maxLength"].old, serde_json::json!(255));
            assert_eq!(changed_attributes["maxLength"].new, serde_json::json!(300));
        }
        other => panic!("expected FieldModified, got {other:?}"),
    }

    let (second, _) = store
        .create_migration("widen_email", changes, ts("2024-06-02T09:30:00Z"))
        .unwrap();
    let snapshot = MigrationStore::advance_snapshot(&snapshot, &second.migration_id, current);
    store.save_snapshot(&snapshot).unwrap();

    // History is listed oldest first and survives a round trip.
    let listed = store.list_migrations().unwrap();
    let ids: Vec<&str> = listed.iter().map(|m| m.migration_id.as_str()).collect();
    assert_eq!(ids, vec!["20240601100000_init", "20240602093000_widen_email"]);

    let reloaded = store.load_snapshot().unwrap();
    assert_eq!(reloaded.applied_migrations, vec![
        "20240601100000_init".to_string(),
        "20240602093000_widen_email".to_string(),
    ]);
    assert_eq!(reloaded.entities.len(), 1);
    assert_eq!(
        reloaded.entities[0].property("email").unwrap().max_length,
        Some(300)
    );

    // Roll back the most recent migration, last-in-first-out.
    let mut snapshot = reloaded;
    assert!(store.remove_last(&mut snapshot).unwrap());
    store.save_snapshot(&snapshot).unwrap();

    let after = store.load_snapshot().unwrap();
    assert_eq!(after.last_migration.as_deref(), Some("20240601100000_init"));
    assert!(store.read_migration("20240602093000_widen_email").is_err());
    assert_eq!(store.list_migrations().unwrap().len(), 1);
}

#[test]
fn unchanged_project_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = MigrationStore::new(dir.path().join(".crudgen"));
    store.init().unwrap();

    let user = resolve(&EntityDescriptor::new("User"), &user_members());
    let snapshot = store.load_snapshot().unwrap();
    let changes = diff(&snapshot.entities, &[user.clone()]).unwrap();
    let (migration, _) = store
        .create_migration("init", changes, ts("2024-06-01T10:00:00Z"))
        .unwrap();
    let snapshot = MigrationStore::advance_snapshot(&snapshot, &migration.migration_id, vec![user]);
    store.save_snapshot(&snapshot).unwrap();

    // Re-resolving the same raw state yields an empty diff: nothing to record.
    let again = resolve(&EntityDescriptor::new("User"), &user_members());
    let snapshot = store.load_snapshot().unwrap();
    assert!(diff(&snapshot.entities, &[again]).unwrap().is_empty());
}
