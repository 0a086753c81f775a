//! The diff engine: compares two full metadata states and emits a minimal,
//! structured change list.
//!
//! Pure and deterministic: entities and members are matched by name, output
//! is always sorted by name before emission, and the function either
//! returns the complete change list or an error, never a partial result.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{EntityDescriptor, PropertyDescriptor, RelationshipDescriptor};
use crate::errors::{DiffError, DiffSide};
use crate::migration::{AttributeChange, Change, FieldDescriptor};

/// Compare the previously recorded state against the freshly resolved
/// current state.
///
/// Emission order: added entities (sorted by name), removed entities
/// (sorted by name), then for each entity present on both sides (sorted by
/// name) its member changes: added, removed, modified properties, then
/// relationship changes in the same shape, each group sorted by name.
pub fn diff(
    previous: &[EntityDescriptor],
    current: &[EntityDescriptor],
) -> Result<Vec<Change>, DiffError> {
    let old = index_entities(previous, DiffSide::Previous)?;
    let new = index_entities(current, DiffSide::Current)?;

    // Validate member uniqueness up front so nothing is emitted on bad input.
    for entity in previous.iter().chain(current.iter()) {
        validate_members(entity)?;
    }

    let mut changes = Vec::new();

    for (name, entity) in &new {
        if !old.contains_key(name) {
            changes.push(Change::EntityAdded {
                entity_name: (*name).to_string(),
                entity: (*entity).clone(),
            });
        }
    }

    for name in old.keys() {
        if !new.contains_key(name) {
            changes.push(Change::EntityRemoved {
                entity_name: (*name).to_string(),
            });
        }
    }

    for (name, new_entity) in &new {
        if let Some(old_entity) = old.get(name) {
            diff_entity(old_entity, new_entity, &mut changes);
        }
    }

    Ok(changes)
}

/// Index a state by entity name. A `BTreeMap` keeps iteration sorted, which
/// is what makes the emission order deterministic.
fn index_entities<'a>(
    entities: &'a [EntityDescriptor],
    side: DiffSide,
) -> Result<BTreeMap<&'a str, &'a EntityDescriptor>, DiffError> {
    let mut index = BTreeMap::new();
    for entity in entities {
        if entity.name.is_empty() {
            return Err(DiffError::EmptyEntityName(side));
        }
        if index.insert(entity.name.as_str(), entity).is_some() {
            return Err(DiffError::DuplicateEntity {
                name: entity.name.clone(),
                side,
            });
        }
    }
    Ok(index)
}

fn validate_members(entity: &EntityDescriptor) -> Result<(), DiffError> {
    let mut seen = BTreeMap::new();
    for property in &entity.properties {
        if seen.insert(property.name.as_str(), ()).is_some() {
            return Err(DiffError::DuplicateProperty {
                entity: entity.name.clone(),
                property: property.name.clone(),
            });
        }
    }
    seen.clear();
    for relationship in &entity.relationships {
        if seen.insert(relationship.name.as_str(), ()).is_some() {
            return Err(DiffError::DuplicateRelationship {
                entity: entity.name.clone(),
                relationship: relationship.name.clone(),
            });
        }
    }
    Ok(())
}

fn diff_entity(old: &EntityDescriptor, new: &EntityDescriptor, changes: &mut Vec<Change>) {
    let old_properties: BTreeMap<&str, &PropertyDescriptor> =
        old.properties.iter().map(|p| (p.name.as_str(), p)).collect();
    let new_properties: BTreeMap<&str, &PropertyDescriptor> =
        new.properties.iter().map(|p| (p.name.as_str(), p)).collect();

    for (name, property) in &new_properties {
        if !old_properties.contains_key(name) {
            changes.push(Change::FieldAdded {
                entity_name: new.name.clone(),
                field: FieldDescriptor::Property((*property).clone()),
            });
        }
    }

    for name in old_properties.keys() {
        if !new_properties.contains_key(name) {
            changes.push(Change::FieldRemoved {
                entity_name: new.name.clone(),
                field_name: (*name).to_string(),
            });
        }
    }

    for (name, new_property) in &new_properties {
        if let Some(old_property) = old_properties.get(name) {
            let changed = diff_property(old_property, new_property);
            if !changed.is_empty() {
                changes.push(Change::FieldModified {
                    entity_name: new.name.clone(),
                    field_name: (*name).to_string(),
                    changed_attributes: changed,
                });
            }
        }
    }

    let old_relationships: BTreeMap<&str, &RelationshipDescriptor> = old
        .relationships
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    let new_relationships: BTreeMap<&str, &RelationshipDescriptor> = new
        .relationships
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();

    for (name, relationship) in &new_relationships {
        if !old_relationships.contains_key(name) {
            changes.push(Change::FieldAdded {
                entity_name: new.name.clone(),
                field: FieldDescriptor::Relationship((*relationship).clone()),
            });
        }
    }

    for name in old_relationships.keys() {
        if !new_relationships.contains_key(name) {
            changes.push(Change::FieldRemoved {
                entity_name: new.name.clone(),
                field_name: (*name).to_string(),
            });
        }
    }

    for (name, new_relationship) in &new_relationships {
        if let Some(old_relationship) = old_relationships.get(name) {
            let changed = diff_relationship(old_relationship, new_relationship);
            if !changed.is_empty() {
                changes.push(Change::FieldModified {
                    entity_name: new.name.clone(),
                    field_name: (*name).to_string(),
                    changed_attributes: changed,
                });
            }
        }
    }
}

/// The fixed set of property attributes the diff tracks. Anything outside
/// this set (listOrder, formOrder, declaredType, ...) never produces a
/// `FieldModified` on its own.
fn diff_property(
    old: &PropertyDescriptor,
    new: &PropertyDescriptor,
) -> BTreeMap<String, AttributeChange> {
    let mut changed = BTreeMap::new();
    track(&mut changed, "displayName", &old.display_name, &new.display_name);
    track(&mut changed, "helpText", &old.help_text, &new.help_text);
    track(&mut changed, "placeholder", &old.placeholder, &new.placeholder);
    track(&mut changed, "fieldType", &old.field_type, &new.field_type);
    track(&mut changed, "format", &old.format, &new.format);
    track(&mut changed, "isRequired", &old.is_required, &new.is_required);
    track(&mut changed, "isReadOnly", &old.is_read_only, &new.is_read_only);
    track(&mut changed, "isUnique", &old.is_unique, &new.is_unique);
    track(&mut changed, "minLength", &old.min_length, &new.min_length);
    track(&mut changed, "maxLength", &old.max_length, &new.max_length);
    track(&mut changed, "minValue", &old.min_value, &new.min_value);
    track(&mut changed, "maxValue", &old.max_value, &new.max_value);
    track(&mut changed, "showInList", &old.show_in_list, &new.show_in_list);
    track(&mut changed, "showInForm", &old.show_in_form, &new.show_in_form);
    track(&mut changed, "showInDetail", &old.show_in_detail, &new.show_in_detail);
    track(
        &mut changed,
        "requiredMessage",
        &old.required_message,
        &new.required_message,
    );
    track(
        &mut changed,
        "validationPattern",
        &old.validation_pattern,
        &new.validation_pattern,
    );
    track(
        &mut changed,
        "validationMessage",
        &old.validation_message,
        &new.validation_message,
    );
    changed
}

fn diff_relationship(
    old: &RelationshipDescriptor,
    new: &RelationshipDescriptor,
) -> BTreeMap<String, AttributeChange> {
    let mut changed = BTreeMap::new();
    track(
        &mut changed,
        "targetEntityName",
        &old.target_entity_name,
        &new.target_entity_name,
    );
    track(
        &mut changed,
        "foreignKeyName",
        &old.foreign_key_name,
        &new.foreign_key_name,
    );
    track(
        &mut changed,
        "inversePropertyName",
        &old.inverse_property_name,
        &new.inverse_property_name,
    );
    track(
        &mut changed,
        "joinTableName",
        &old.join_table_name,
        &new.join_table_name,
    );
    track(&mut changed, "kind", &old.kind, &new.kind);
    track(&mut changed, "isRequired", &old.is_required, &new.is_required);
    track(&mut changed, "showInList", &old.show_in_list, &new.show_in_list);
    track(&mut changed, "showInForm", &old.show_in_form, &new.show_in_form);
    changed
}

fn track<T: PartialEq + Serialize>(
    changed: &mut BTreeMap<String, AttributeChange>,
    attribute: &str,
    old: &T,
    new: &T,
) {
    if old != new {
        changed.insert(
            attribute.to_string(),
            AttributeChange {
                old: serde_json::to_value(old).unwrap_or(Value::Null),
                new: serde_json::to_value(new).unwrap_or(Value::Null),
            },
        );
    }
}
