use anyhow::{Context, Result};
use clap::Subcommand;

use crudgen::{diff, EntityDescriptor};

use crate::commands::migrate::format_change;
use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;
use crate::scanner::scan_current_entities;
use crate::theme::ICONS;
use crate::utils::count_label;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Pending Changes",
        commands: &[
            "crudgen schema diff               # Preview changes for all entities",
            "crudgen schema diff User          # Preview changes for one entity",
        ],
    },
    ExampleGroup {
        title: "Recorded State",
        commands: &["crudgen schema show               # Summarize the current snapshot"],
    },
];

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Show what a 'migrate create' would record, without writing anything
    #[command(name = "diff")]
    Diff {
        /// Entity to check (all entities if omitted)
        entity: Option<String>,
    },

    /// Summarize the recorded snapshot
    #[command(name = "show")]
    Show,
}

pub fn handle_schema_commands(command: SchemaCommands, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    if !ctx.is_initialized() {
        output.error("crudgen is not initialized in this project.");
        output.info("Run 'crudgen init' first to initialize.");
        anyhow::bail!("Project not initialized");
    }

    match command {
        SchemaCommands::Diff { entity } => handle_diff(&ctx, entity.as_deref(), output),
        SchemaCommands::Show => handle_show(&ctx, output),
    }
}

fn handle_diff(ctx: &ProjectContext, entity: Option<&str>, output: &OutputManager) -> Result<()> {
    output.heading("Pending Schema Changes");

    let store = ctx.store();
    let snapshot = store.load_snapshot().context("Failed to load snapshot")?;
    let current = scan_current_entities(ctx, output)?;

    let (previous, current): (Vec<EntityDescriptor>, Vec<EntityDescriptor>) = match entity {
        Some(name) => (
            filter_entity(&snapshot.entities, name),
            filter_entity(&current, name),
        ),
        None => (snapshot.entities, current),
    };

    if let Some(name) = entity
        && previous.is_empty()
        && current.is_empty()
    {
        output.warning(&format!("Entity '{name}' is neither recorded nor declared"));
        return Ok(());
    }

    let changes = diff(&previous, &current).context("Failed to compute schema diff")?;

    if changes.is_empty() {
        output.success("No pending changes");
        output.info("The snapshot already matches your entities");
        return Ok(());
    }

    for change in &changes {
        output.bullet(&format_change(change));
    }

    output.info(&format!("{} pending", count_label(changes.len(), "change")));
    output.info("Run 'crudgen migrate create --name <name>' to record them");

    Ok(())
}

fn filter_entity(entities: &[EntityDescriptor], name: &str) -> Vec<EntityDescriptor> {
    entities.iter().filter(|e| e.name == name).cloned().collect()
}

fn handle_show(ctx: &ProjectContext, output: &OutputManager) -> Result<()> {
    let store = ctx.store();
    let snapshot = store.load_snapshot().context("Failed to load snapshot")?;

    output.heading("Snapshot");
    output.key_value("Format version", &snapshot.version.to_string());
    output.key_value(
        "Last migration",
        snapshot.last_migration.as_deref().unwrap_or("(none)"),
    );
    output.key_value(
        "Applied migrations",
        &snapshot.applied_migrations.len().to_string(),
    );

    if snapshot.entities.is_empty() {
        output.info("No entities recorded yet");
        return Ok(());
    }

    output.heading("Entities");
    for entity in &snapshot.entities {
        let props = entity.properties.len();
        let label = if props == 1 { "property" } else { "properties" };
        output.bullet(&format!(
            "{} ({props} {label}, {})",
            entity.name,
            count_label(entity.relationships.len(), "relationship"),
        ));

        for relationship in &entity.relationships {
            output.indented(
                ICONS.arrow,
                &format!(
                    "{} {} {}",
                    relationship.name, relationship.kind, relationship.target_entity_name
                ),
            );
        }
    }

    Ok(())
}
