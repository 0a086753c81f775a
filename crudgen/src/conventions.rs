//! Convention resolution: fills unset metadata with defaults derived from
//! member names and semantic types.
//!
//! Pure function, no I/O. Explicit configuration always wins; conventions
//! only touch values that are still unset (`None`, the empty string, or an
//! unconfigured tri-state boolean).

use crate::descriptor::{DeclaredMember, EntityDescriptor, PropertyDescriptor, SemanticType};

/// Default `maxLength` applied to string members.
pub const DEFAULT_MAX_LENGTH: u32 = 255;

/// Fallback UI widget when nothing more specific applies.
pub const DEFAULT_FIELD_TYPE: &str = "text";

/// Resolve an entity's metadata against the full list of its declared
/// members. Returns a fully resolved descriptor: every member not in
/// `ignored_property_names` is represented by exactly one property, and no
/// convention-touched attribute is left unset.
///
/// Idempotent: resolving an already-resolved entity is a no-op.
pub fn resolve(entity: &EntityDescriptor, declared_members: &[DeclaredMember]) -> EntityDescriptor {
    let mut resolved = entity.clone();

    if is_unset(&resolved.display_name) {
        resolved.display_name = Some(resolved.name.clone());
    }
    if is_unset(&resolved.plural_name) {
        // Naive suffixing, no irregular-plural handling. Known limitation.
        resolved.plural_name = Some(format!("{}s", resolved.name));
    }

    let mut configured = std::mem::take(&mut resolved.properties);
    let mut properties = Vec::with_capacity(declared_members.len());

    for member in declared_members {
        if resolved.ignored_property_names.contains(&member.name) {
            continue;
        }

        let mut property = match configured.iter().position(|p| p.name == member.name) {
            Some(index) => configured.remove(index),
            None => PropertyDescriptor::new(member.name.clone(), member.semantic_type),
        };

        // The semantic type is introspected fact, not configuration.
        property.declared_type = member.semantic_type;
        apply_property_conventions(&mut property);
        properties.push(property);
    }

    // Explicitly configured properties without a declared member (computed
    // columns and the like) keep their configuration and trail the member
    // list in their original order.
    for mut property in configured {
        apply_property_conventions(&mut property);
        properties.push(property);
    }

    resolved.properties = properties;
    resolved
}

fn apply_property_conventions(property: &mut PropertyDescriptor) {
    if is_unset(&property.display_name) {
        property.display_name = Some(property.name.clone());
    }

    match property.declared_type {
        SemanticType::String => {
            if is_unset(&property.field_type) {
                property.field_type = Some(if property.name.eq_ignore_ascii_case("email") {
                    "email".to_string()
                } else {
                    DEFAULT_FIELD_TYPE.to_string()
                });
            }
            if property.max_length.is_none() {
                property.max_length = Some(DEFAULT_MAX_LENGTH);
            }
        }
        SemanticType::Date => {
            if is_unset(&property.format) {
                property.format = Some("date".to_string());
            }
            if property.is_read_only.is_none() && is_timestamp_member(&property.name) {
                property.is_read_only = Some(true);
            }
        }
        _ => {}
    }

    if is_unset(&property.field_type) {
        property.field_type = Some(DEFAULT_FIELD_TYPE.to_string());
    }
    if property.is_read_only.is_none() {
        property.is_read_only = Some(false);
    }
}

/// An empty string counts as unset, the same as `None`.
fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

/// Members named `*CreatedAt` / `*UpdatedAt` are maintained by the system,
/// so their forms render them read-only. The match ignores case and
/// underscores so snake_case members (`created_at`) qualify too.
fn is_timestamp_member(name: &str) -> bool {
    let folded: String = name
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    folded.ends_with("createdat") || folded.ends_with("updatedat")
}
