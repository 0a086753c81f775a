//! Entity scanning: the introspection side of the tool.
//!
//! Discovers Rust files containing `CrudEntity` derives, parses them into
//! raw descriptors plus declared-member lists, and hands the result to
//! convention resolution. The diff engine only ever sees the resolved
//! output; a file that fails to parse contributes zero entities and a
//! warning here at the boundary.

mod discovery;
mod parser;

pub use discovery::{discover_entities, DiscoveredFile};
pub use parser::{parse_entity_file, parse_entities_in_source, ScannedEntity};

use anyhow::{Context, Result};
use crudgen::EntityDescriptor;

use crate::context::ProjectContext;
use crate::output::OutputManager;

/// Scan the project and return the fully resolved current entity state.
pub fn scan_current_entities(
    ctx: &ProjectContext,
    output: &OutputManager,
) -> Result<Vec<EntityDescriptor>> {
    output.progress("Discovering entity types");
    let discovered = discover_entities(&ctx.project_root, &ctx.scan_dirs())
        .context("Failed to discover entity files")?;
    output.clear_line();

    let mut resolved = Vec::new();
    for file in &discovered {
        match parse_entity_file(&file.path, &file.relative_path) {
            Ok(scanned) => {
                for entity in scanned {
                    output.verbose(&format!(
                        "{} ({}:{})",
                        entity.descriptor.name, entity.source_file, entity.source_line
                    ));
                    resolved.push(crudgen::resolve(&entity.descriptor, &entity.members));
                }
            }
            Err(err) => {
                log::warn!("skipping {}: {err:#}", file.relative_path);
                output.warning(&format!("Skipping {}: {err}", file.relative_path));
            }
        }
    }

    Ok(resolved)
}
