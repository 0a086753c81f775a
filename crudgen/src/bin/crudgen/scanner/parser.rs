//! Rust source parser using syn to extract CrudEntity definitions.
//!
//! A struct deriving `CrudEntity` declares an entity. Struct- and
//! field-level `#[crud(...)]` attributes carry the explicit configuration;
//! everything left unset is filled later by convention resolution. The
//! parser therefore emits the *raw* descriptor together with the declared
//! member list, which is exactly the resolver's input shape.

use anyhow::{Context, Result};
use std::path::Path;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Field, Fields, GenericArgument, Lit, LitInt, LitStr, Meta, PathArguments, Type};

use crudgen::{
    DeclaredMember, EntityDescriptor, PropertyDescriptor, RelationKind, RelationshipDescriptor,
    SemanticType, SortSpec,
};

/// One parsed entity struct: raw descriptor plus declared members.
#[derive(Debug, Clone)]
pub struct ScannedEntity {
    pub descriptor: EntityDescriptor,
    pub members: Vec<DeclaredMember>,
    pub source_file: String,
    pub source_line: usize,
}

/// Parse a Rust file and extract all CrudEntity definitions.
pub fn parse_entity_file(path: &Path, relative_path: &str) -> Result<Vec<ScannedEntity>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_entities_in_source(&content, relative_path)
}

/// Parse entity definitions out of already-loaded source text.
pub fn parse_entities_in_source(content: &str, relative_path: &str) -> Result<Vec<ScannedEntity>> {
    let syntax = syn::parse_file(content)
        .with_context(|| format!("Failed to parse Rust source: {relative_path}"))?;

    let lines: Vec<&str> = content.lines().collect();
    let mut entities = Vec::new();

    for item in syntax.items {
        if let syn::Item::Struct(item_struct) = item
            && has_crud_entity_derive(&item_struct.attrs)
        {
            let struct_name = item_struct.ident.to_string();
            let line = find_struct_line(&lines, &struct_name).unwrap_or(1);
            let scanned = parse_struct(&item_struct, relative_path, line).with_context(|| {
                format!("Failed to parse entity '{struct_name}' in {relative_path}")
            })?;
            entities.push(scanned);
        }
    }

    Ok(entities)
}

/// Check if attributes include derive(CrudEntity)
fn has_crud_entity_derive(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("derive")
            && matches!(&attr.meta, Meta::List(list) if list.tokens.to_string().contains("CrudEntity"))
    })
}

/// Find the line number where a struct is defined
fn find_struct_line(lines: &[&str], struct_name: &str) -> Option<usize> {
    let pattern = format!("struct {struct_name}");
    lines
        .iter()
        .position(|line| line.contains(&pattern))
        .map(|index| index + 1)
}

fn parse_struct(
    item: &syn::ItemStruct,
    relative_path: &str,
    line: usize,
) -> syn::Result<ScannedEntity> {
    let entity_name = item.ident.to_string();
    let mut descriptor = EntityDescriptor::new(entity_name.clone());
    descriptor.type_identity = Some(format!("{relative_path}::{entity_name}"));

    parse_struct_attrs(&item.attrs, &mut descriptor)?;

    let mut members = Vec::new();
    if let Fields::Named(fields) = &item.fields {
        for field in &fields.named {
            let Some(parsed) = parse_field(field)? else {
                continue;
            };

            if let Some(relationship) = parsed.relation {
                descriptor.relationships.push(relationship);
                continue;
            }

            if parsed.ignored {
                descriptor.ignored_property_names.insert(parsed.name.clone());
                members.push(DeclaredMember::new(parsed.name, parsed.semantic_type));
                continue;
            }

            members.push(DeclaredMember::new(parsed.name, parsed.semantic_type));
            if let Some(property) = parsed.property {
                descriptor.properties.push(property);
            }
        }
    }

    Ok(ScannedEntity {
        descriptor,
        members,
        source_file: relative_path.to_string(),
        source_line: line,
    })
}

/// Parse struct-level #[crud(...)] attributes
fn parse_struct_attrs(attrs: &[Attribute], descriptor: &mut EntityDescriptor) -> syn::Result<()> {
    let mut sort_field: Option<String> = None;
    let mut sort_descending = false;

    for attr in attrs {
        if !attr.path().is_ident("crud") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("display") {
                descriptor.display_name = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("plural") {
                descriptor.plural_name = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("description") {
                descriptor.description = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("icon") {
                descriptor.icon = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("sort_by") {
                sort_field = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("sort_desc") {
                sort_descending = true;
            } else if meta.path.is_ident("ignore") {
                meta.parse_nested_meta(|inner| match inner.path.get_ident() {
                    Some(ident) => {
                        descriptor.ignored_property_names.insert(ident.to_string());
                        Ok(())
                    }
                    None => Err(inner.error("expected a member name")),
                })?;
            } else {
                return Err(meta.error("unknown crud entity attribute"));
            }
            Ok(())
        })?;
    }

    if let Some(field) = sort_field {
        descriptor.default_sort = Some(SortSpec {
            field,
            descending: sort_descending,
        });
    }
    Ok(())
}

struct ParsedField {
    name: String,
    semantic_type: SemanticType,
    ignored: bool,
    relation: Option<RelationshipDescriptor>,
    /// Present only when the field carries explicit property configuration.
    property: Option<PropertyDescriptor>,
}

fn parse_field(field: &Field) -> syn::Result<Option<ParsedField>> {
    let Some(ident) = &field.ident else {
        return Ok(None);
    };
    let name = ident.to_string();

    let mut semantic_type = semantic_type_of(&field.ty);
    let mut ignored = false;
    let mut relation: Option<RelationshipDescriptor> = None;
    let mut property = PropertyDescriptor::new(name.clone(), semantic_type);
    let mut configured = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("crud") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("relation") {
                relation = Some(parse_relation(&meta, &name, &field.ty)?);
            } else if meta.path.is_ident("ignore") {
                ignored = true;
            } else if meta.path.is_ident("semantic") {
                semantic_type = parse_semantic(&meta)?;
            } else if meta.path.is_ident("display") {
                property.display_name = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("placeholder") {
                property.placeholder = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("help") {
                property.help_text = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("required") {
                property.is_required = true;
                configured = true;
            } else if meta.path.is_ident("required_message") {
                property.required_message = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("min_length") {
                property.min_length = Some(parse_u32(&meta)?);
                configured = true;
            } else if meta.path.is_ident("max_length") {
                property.max_length = Some(parse_u32(&meta)?);
                configured = true;
            } else if meta.path.is_ident("min") {
                property.min_value = Some(parse_f64(&meta)?);
                configured = true;
            } else if meta.path.is_ident("max") {
                property.max_value = Some(parse_f64(&meta)?);
                configured = true;
            } else if meta.path.is_ident("pattern") {
                let pattern = parse_string(&meta)?;
                // Reject broken patterns here, before they reach a snapshot.
                regex::Regex::new(&pattern)
                    .map_err(|err| meta.error(format!("invalid validation pattern: {err}")))?;
                property.validation_pattern = Some(pattern);
                configured = true;
            } else if meta.path.is_ident("pattern_message") {
                property.validation_message = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("unique") {
                property.is_unique = true;
                configured = true;
            } else if meta.path.is_ident("readonly") {
                property.is_read_only = Some(true);
                configured = true;
            } else if meta.path.is_ident("hidden") {
                property.is_hidden = true;
                configured = true;
            } else if meta.path.is_ident("skip_list") {
                property.show_in_list = false;
                configured = true;
            } else if meta.path.is_ident("skip_form") {
                property.show_in_form = false;
                configured = true;
            } else if meta.path.is_ident("skip_detail") {
                property.show_in_detail = false;
                configured = true;
            } else if meta.path.is_ident("list_order") {
                property.list_order = Some(parse_u32(&meta)?);
                configured = true;
            } else if meta.path.is_ident("form_order") {
                property.form_order = Some(parse_u32(&meta)?);
                configured = true;
            } else if meta.path.is_ident("widget") {
                property.field_type = Some(parse_string(&meta)?);
                configured = true;
            } else if meta.path.is_ident("format") {
                property.format = Some(parse_string(&meta)?);
                configured = true;
            } else {
                return Err(meta.error("unknown crud field attribute"));
            }
            Ok(())
        })?;
    }

    // A semantic override also applies to the explicit descriptor.
    property.declared_type = semantic_type;

    Ok(Some(ParsedField {
        name,
        semantic_type,
        ignored,
        relation,
        property: configured.then_some(property),
    }))
}

/// Parse `relation(...)`. Kind and target fall back to inference from the
/// field's Rust type: `Vec<T>` reads as one-to-many of `T`, anything else
/// as many-to-one.
fn parse_relation(
    meta: &ParseNestedMeta,
    field_name: &str,
    ty: &Type,
) -> syn::Result<RelationshipDescriptor> {
    let mut kind: Option<RelationKind> = None;
    let mut target: Option<String> = None;
    let mut foreign_key: Option<String> = None;
    let mut inverse: Option<String> = None;
    let mut join_table: Option<String> = None;
    let mut required = false;
    let mut hidden = false;
    let mut skip_list = false;
    let mut skip_form = false;

    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("kind") {
                kind = Some(parse_kind(&inner)?);
            } else if inner.path.is_ident("target") {
                target = Some(parse_string(&inner)?);
            } else if inner.path.is_ident("foreign_key") {
                foreign_key = Some(parse_string(&inner)?);
            } else if inner.path.is_ident("inverse") {
                inverse = Some(parse_string(&inner)?);
            } else if inner.path.is_ident("join_table") {
                join_table = Some(parse_string(&inner)?);
            } else if inner.path.is_ident("required") {
                required = true;
            } else if inner.path.is_ident("hidden") {
                hidden = true;
            } else if inner.path.is_ident("skip_list") {
                skip_list = true;
            } else if inner.path.is_ident("skip_form") {
                skip_form = true;
            } else {
                return Err(inner.error("unknown relation attribute"));
            }
            Ok(())
        })?;
    }

    let (inferred_kind, inferred_target) = infer_relation(ty);
    let kind = kind.or(inferred_kind).ok_or_else(|| {
        meta.error("relation kind could not be inferred; add kind = \"...\"")
    })?;
    let target = target.or(inferred_target).ok_or_else(|| {
        meta.error("relation target could not be inferred; add target = \"...\"")
    })?;

    if join_table.is_some() && kind != RelationKind::ManyToMany {
        return Err(meta.error("join_table is only valid on many_to_many relations"));
    }

    let mut relationship = RelationshipDescriptor::new(field_name, target, kind);
    relationship.foreign_key_name = foreign_key;
    relationship.inverse_property_name = inverse;
    relationship.join_table_name = join_table;
    relationship.is_required = required;
    relationship.is_hidden = hidden;
    relationship.show_in_list = !skip_list;
    relationship.show_in_form = !skip_form;
    Ok(relationship)
}

fn infer_relation(ty: &Type) -> (Option<RelationKind>, Option<String>) {
    if let Some(inner) = generic_inner(ty, "Vec") {
        (Some(RelationKind::OneToMany), type_name(inner))
    } else if let Some(inner) = generic_inner(ty, "Option") {
        (Some(RelationKind::ManyToOne), type_name(inner))
    } else {
        (Some(RelationKind::ManyToOne), type_name(ty))
    }
}

/// Map a Rust field type to its semantic tag. `Option<T>` reads as `T`.
fn semantic_type_of(ty: &Type) -> SemanticType {
    let ty = generic_inner(ty, "Option").unwrap_or(ty);
    match ty {
        Type::Reference(reference) => semantic_type_of(&reference.elem),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return SemanticType::Unknown;
            };
            match segment.ident.to_string().as_str() {
                "String" | "str" => SemanticType::String,
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" | "f32" | "f64" => SemanticType::Number,
                "bool" => SemanticType::Boolean,
                "DateTime" | "NaiveDate" | "NaiveDateTime" | "NaiveTime" => SemanticType::Date,
                _ => SemanticType::Unknown,
            }
        }
        _ => SemanticType::Unknown,
    }
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(path) = ty
        && let Some(segment) = path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner);
    }
    None
}

fn type_name(ty: &Type) -> Option<String> {
    if let Type::Path(path) = ty {
        path.path.segments.last().map(|s| s.ident.to_string())
    } else {
        None
    }
}

fn parse_string(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn parse_u32(meta: &ParseNestedMeta) -> syn::Result<u32> {
    let lit: LitInt = meta.value()?.parse()?;
    lit.base10_parse()
}

fn parse_f64(meta: &ParseNestedMeta) -> syn::Result<f64> {
    let lit: Lit = meta.value()?.parse()?;
    match lit {
        Lit::Int(lit) => lit.base10_parse(),
        Lit::Float(lit) => lit.base10_parse(),
        other => Err(syn::Error::new(other.span(), "expected a numeric literal")),
    }
}

fn parse_semantic(meta: &ParseNestedMeta) -> syn::Result<SemanticType> {
    let value = parse_string(meta)?;
    match value.as_str() {
        "string" => Ok(SemanticType::String),
        "number" => Ok(SemanticType::Number),
        "boolean" => Ok(SemanticType::Boolean),
        "date" => Ok(SemanticType::Date),
        "enum" => Ok(SemanticType::Enum),
        other => Err(meta.error(format!("unknown semantic type '{other}'"))),
    }
}

fn parse_kind(meta: &ParseNestedMeta) -> syn::Result<RelationKind> {
    let value = parse_string(meta)?;
    match value.as_str() {
        "one_to_one" => Ok(RelationKind::OneToOne),
        "one_to_many" => Ok(RelationKind::OneToMany),
        "many_to_one" => Ok(RelationKind::ManyToOne),
        "many_to_many" => Ok(RelationKind::ManyToMany),
        other => Err(meta.error(format!("unknown relation kind '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> ScannedEntity {
        let mut entities = parse_entities_in_source(source, "src/models.rs").unwrap();
        assert_eq!(entities.len(), 1);
        entities.remove(0)
    }

    #[test]
    fn plain_struct_without_derive_is_skipped() {
        let entities =
            parse_entities_in_source("pub struct Plain { pub id: String }", "src/lib.rs").unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn derive_yields_members_with_semantic_types() {
        let scanned = parse_one(
            r#"
            #[derive(Debug, CrudEntity)]
            pub struct User {
                pub name: String,
                pub age: Option<u32>,
                pub active: bool,
                pub joined_at: DateTime<Utc>,
                pub settings: Settings,
            }
            "#,
        );

        assert_eq!(scanned.descriptor.name, "User");
        assert_eq!(
            scanned.descriptor.type_identity.as_deref(),
            Some("src/models.rs::User")
        );
        assert_eq!(scanned.source_line, 3);

        let types: Vec<(&str, SemanticType)> = scanned
            .members
            .iter()
            .map(|m| (m.name.as_str(), m.semantic_type))
            .collect();
        assert_eq!(
            types,
            vec![
                ("name", SemanticType::String),
                ("age", SemanticType::Number),
                ("active", SemanticType::Boolean),
                ("joined_at", SemanticType::Date),
                ("settings", SemanticType::Unknown),
            ]
        );

        // Nothing was configured, so the raw descriptor carries no properties.
        assert!(scanned.descriptor.properties.is_empty());
    }

    #[test]
    fn entity_attributes_are_captured() {
        let scanned = parse_one(
            r#"
            #[derive(CrudEntity)]
            #[crud(display = "Member", plural = "People", icon = "user", sort_by = "name", sort_desc, ignore(password_hash))]
            pub struct Person {
                pub name: String,
                pub password_hash: String,
            }
            "#,
        );

        let descriptor = &scanned.descriptor;
        assert_eq!(descriptor.display_name.as_deref(), Some("Member"));
        assert_eq!(descriptor.plural_name.as_deref(), Some("People"));
        assert_eq!(descriptor.icon.as_deref(), Some("user"));
        let sort = descriptor.default_sort.as_ref().unwrap();
        assert_eq!(sort.field, "name");
        assert!(sort.descending);
        assert!(descriptor.ignored_property_names.contains("password_hash"));
        // Ignored members are still declared.
        assert_eq!(scanned.members.len(), 2);
    }

    #[test]
    fn field_attributes_become_explicit_configuration() {
        let scanned = parse_one(
            r#"
            #[derive(CrudEntity)]
            pub struct Article {
                #[crud(display = "Headline", required, max_length = 120, placeholder = "Enter a headline")]
                pub title: String,
                #[crud(widget = "textarea", skip_list)]
                pub body: String,
                #[crud(min = 0, max = 5)]
                pub rating: f64,
                #[crud(semantic = "enum")]
                pub status: ArticleStatus,
                pub plain: String,
            }
            "#,
        );

        let descriptor = &scanned.descriptor;
        assert_eq!(descriptor.properties.len(), 4);

        let title = descriptor.property("title").unwrap();
        assert_eq!(title.display_name.as_deref(), Some("Headline"));
        assert!(title.is_required);
        assert_eq!(title.max_length, Some(120));
        assert_eq!(title.placeholder.as_deref(), Some("Enter a headline"));
        assert!(title.field_type.is_none());

        let body = descriptor.property("body").unwrap();
        assert_eq!(body.field_type.as_deref(), Some("textarea"));
        assert!(!body.show_in_list);

        let rating = descriptor.property("rating").unwrap();
        assert_eq!(rating.min_value, Some(0.0));
        assert_eq!(rating.max_value, Some(5.0));

        let status = descriptor.property("status").unwrap();
        assert_eq!(status.declared_type, SemanticType::Enum);
        let status_member = scanned.members.iter().find(|m| m.name == "status").unwrap();
        assert_eq!(status_member.semantic_type, SemanticType::Enum);

        // Unconfigured fields stay synthesis-only.
        assert!(descriptor.property("plain").is_none());
        assert_eq!(scanned.members.len(), 5);
    }

    #[test]
    fn field_level_ignore_joins_the_ignore_set() {
        let scanned = parse_one(
            r#"
            #[derive(CrudEntity)]
            pub struct Account {
                pub email: String,
                #[crud(ignore)]
                pub internal_state: String,
            }
            "#,
        );

        assert!(scanned
            .descriptor
            .ignored_property_names
            .contains("internal_state"));
        assert_eq!(scanned.members.len(), 2);
    }

    #[test]
    fn relations_are_parsed_and_inferred() {
        let scanned = parse_one(
            r#"
            #[derive(CrudEntity)]
            pub struct Post {
                pub title: String,
                #[crud(relation(foreign_key = "author_id", inverse = "posts", required))]
                pub author: User,
                #[crud(relation)]
                pub comments: Vec<Comment>,
                #[crud(relation(kind = "many_to_many", target = "Tag", join_table = "post_tags"))]
                pub tags: Vec<Tag>,
            }
            "#,
        );

        let descriptor = &scanned.descriptor;
        assert_eq!(descriptor.relationships.len(), 3);
        // Relation fields are not declared members.
        assert_eq!(scanned.members.len(), 1);

        let author = descriptor.relationship("author").unwrap();
        assert_eq!(author.target_entity_name, "User");
        assert_eq!(author.kind, RelationKind::ManyToOne);
        assert_eq!(author.foreign_key_name.as_deref(), Some("author_id"));
        assert_eq!(author.inverse_property_name.as_deref(), Some("posts"));
        assert!(author.is_required);

        let comments = descriptor.relationship("comments").unwrap();
        assert_eq!(comments.kind, RelationKind::OneToMany);
        assert_eq!(comments.target_entity_name, "Comment");

        let tags = descriptor.relationship("tags").unwrap();
        assert_eq!(tags.kind, RelationKind::ManyToMany);
        assert_eq!(tags.join_table_name.as_deref(), Some("post_tags"));
    }

    #[test]
    fn join_table_requires_many_to_many() {
        let err = parse_entities_in_source(
            r#"
            #[derive(CrudEntity)]
            pub struct Post {
                #[crud(relation(join_table = "post_users"))]
                pub owner: User,
            }
            "#,
            "src/models.rs",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Post"));
    }

    #[test]
    fn invalid_validation_pattern_is_rejected() {
        let err = parse_entities_in_source(
            r#"
            #[derive(CrudEntity)]
            pub struct User {
                #[crud(pattern = "([unclosed")]
                pub code: String,
            }
            "#,
            "src/models.rs",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("User"));
    }
}
