//! Descriptor types for entity metadata, suitable for snapshot serialization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Semantic type tag for a declared member.
///
/// This is deliberately coarser than a Rust type: it only carries what the
/// convention resolver and the UI generator need to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    Date,
    Enum,
    #[default]
    Unknown,
}

impl SemanticType {
    /// True for members that hold text.
    pub fn is_textual(self) -> bool {
        matches!(self, SemanticType::String)
    }

    /// True for date/time members.
    pub fn is_temporal(self) -> bool {
        matches!(self, SemanticType::Date)
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            SemanticType::String => "string",
            SemanticType::Number => "number",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
            SemanticType::Enum => "enum",
            SemanticType::Unknown => "unknown",
        };
        write!(f, "{tag}")
    }
}

/// One declared member of the underlying type, as reported by the
/// introspection side (the source scanner). Input to convention resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMember {
    pub name: String,
    pub semantic_type: SemanticType,
}

impl DeclaredMember {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }
}

/// Metadata for a single entity field.
///
/// Every attribute except `name` and `declaredType` starts unset and is
/// either configured explicitly or filled by conventions. `Option::None`
/// and the empty string both count as "unset".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,

    /// Semantic type of the underlying member. Introspected, not configured.
    pub declared_type: SemanticType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unique: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub show_in_list: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_order: Option<u32>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub show_in_form: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_order: Option<u32>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub show_in_detail: bool,

    /// Tri-state: `None` means "not configured", which conventions may fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hidden: bool,

    /// UI widget tag ("text", "email", "number", ...). Guaranteed `Some`
    /// after convention resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    /// Display format tag ("date", "currency", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, declared_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            display_name: None,
            placeholder: None,
            help_text: None,
            is_required: false,
            required_message: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            validation_pattern: None,
            validation_message: None,
            is_unique: false,
            show_in_list: true,
            list_order: None,
            show_in_form: true,
            form_order: None,
            show_in_detail: true,
            is_read_only: None,
            is_hidden: false,
            field_type: None,
            format: None,
        }
    }
}

/// Relationship kind between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::OneToMany => "one-to-many",
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::ManyToMany => "many-to-many",
        };
        write!(f, "{label}")
    }
}

/// Metadata for a navigation relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDescriptor {
    pub name: String,

    pub target_entity_name: String,

    pub kind: RelationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_property_name: Option<String>,

    /// Only meaningful for many-to-many relationships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table_name: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_required: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub show_in_list: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub show_in_form: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hidden: bool,
}

impl RelationshipDescriptor {
    pub fn new(
        name: impl Into<String>,
        target_entity_name: impl Into<String>,
        kind: RelationKind,
    ) -> Self {
        Self {
            name: name.into(),
            target_entity_name: target_entity_name.into(),
            kind,
            foreign_key_name: None,
            inverse_property_name: None,
            join_table_name: None,
            is_required: false,
            show_in_list: true,
            show_in_form: true,
            is_hidden: false,
        }
    }
}

/// Default sort applied to entity lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub descending: bool,
}

/// Complete metadata for one entity.
///
/// `name` is the identity key: the diff engine matches entities across
/// snapshots by name, never by `type_identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub name: String,

    /// Opaque handle to the underlying declared type (e.g. source path plus
    /// struct name). Only the introspection side interprets it; it never
    /// participates in diffing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_identity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sort: Option<SortSpec>,

    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipDescriptor>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ignored_property_names: BTreeSet<String>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_identity: None,
            display_name: None,
            plural_name: None,
            description: None,
            icon: None,
            default_sort: None,
            properties: Vec::new(),
            relationships: Vec::new(),
            ignored_property_names: BTreeSet::new(),
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_true(b: &bool) -> bool {
    *b
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_serialization_skips_defaults() {
        let prop = PropertyDescriptor::new("title", SemanticType::String);
        let json = serde_json::to_value(&prop).unwrap();

        assert_eq!(json["name"], "title");
        assert_eq!(json["declaredType"], "string");
        // Defaulted flags are omitted from the wire format.
        assert!(json.get("isRequired").is_none());
        assert!(json.get("showInList").is_none());
        assert!(json.get("fieldType").is_none());
    }

    #[test]
    fn property_deserialization_fills_defaults() {
        let prop: PropertyDescriptor =
            serde_json::from_str(r#"{"name":"age","declaredType":"number"}"#).unwrap();

        assert_eq!(prop.name, "age");
        assert_eq!(prop.declared_type, SemanticType::Number);
        assert!(prop.show_in_list);
        assert!(prop.show_in_form);
        assert!(prop.show_in_detail);
        assert!(!prop.is_required);
        assert!(prop.is_read_only.is_none());
    }

    #[test]
    fn entity_lookup_by_name() {
        let mut entity = EntityDescriptor::new("User");
        entity
            .properties
            .push(PropertyDescriptor::new("email", SemanticType::String));
        entity.relationships.push(RelationshipDescriptor::new(
            "posts",
            "Post",
            RelationKind::OneToMany,
        ));

        assert!(entity.property("email").is_some());
        assert!(entity.property("missing").is_none());
        assert_eq!(
            entity.relationship("posts").unwrap().kind,
            RelationKind::OneToMany
        );
    }

    #[test]
    fn relation_kind_wire_tags() {
        let json = serde_json::to_string(&RelationKind::ManyToMany).unwrap();
        assert_eq!(json, r#""many_to_many""#);
    }
}
