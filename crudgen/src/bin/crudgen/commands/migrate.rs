use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{Attribute, Cell, Table};
use serde::Serialize;

use crudgen::{diff, Change, FieldDescriptor, Migration, MigrationStore};

use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay};
use crate::scanner::scan_current_entities;
use crate::utils::{count_label, format_datetime};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Record Changes",
        commands: &[
            "crudgen migrate create --name init         # Record the initial baseline",
            "crudgen migrate create --name add_avatar   # Record detected schema changes",
        ],
    },
    ExampleGroup {
        title: "History",
        commands: &[
            "crudgen migrate list                       # Show recorded migrations",
            "crudgen migrate list --output json         # Machine-readable listing",
            "crudgen migrate remove                     # Drop the most recent migration",
        ],
    },
];

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Detect schema changes and record them as a new migration
    #[command(name = "create")]
    Create {
        /// Name for the migration (e.g., add_avatar, drop-legacy)
        #[arg(short, long)]
        name: String,
    },

    /// Remove the most recent migration (last-in-first-out)
    #[command(name = "remove")]
    Remove,

    /// List recorded migrations
    #[command(name = "list")]
    List,
}

pub fn handle_migrate_commands(command: MigrateCommands, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    if !ctx.is_initialized() {
        output.error("crudgen is not initialized in this project.");
        output.info("Run 'crudgen init' first to initialize.");
        anyhow::bail!("Project not initialized");
    }

    match command {
        MigrateCommands::Create { name } => handle_create(&ctx, &name, output),
        MigrateCommands::Remove => handle_remove(&ctx, output),
        MigrateCommands::List => handle_list(&ctx, output),
    }
}

fn handle_create(ctx: &ProjectContext, name: &str, output: &OutputManager) -> Result<()> {
    output.heading("Create Migration");
    output.bullet(&format!("Migration name: {name}"));

    let store = ctx.store();
    let snapshot = store.load_snapshot().context("Failed to load snapshot")?;

    let current = scan_current_entities(ctx, output)?;
    if current.is_empty() && snapshot.entities.is_empty() {
        output.warning("No CrudEntity types found in project");
        output.info("Make sure your entities use #[derive(CrudEntity)]");
        return Ok(());
    }
    output.success(&format!(
        "Resolved {}",
        count_label(current.len(), "entity schema")
    ));

    output.heading("Detecting Changes");
    let changes = diff(&snapshot.entities, &current).context("Failed to compute schema diff")?;

    if changes.is_empty() {
        output.success("No schema changes detected");
        output.info("Your entities match the recorded snapshot");
        return Ok(());
    }

    for change in &changes {
        output.bullet(&format_change(change));
    }
    output.info(&format!("{} detected", count_label(changes.len(), "change")));

    output.heading("Recording Migration");
    let (migration, path) = store
        .create_migration(name, changes, Utc::now())
        .context("Failed to write migration")?;

    let advanced = MigrationStore::advance_snapshot(&snapshot, &migration.migration_id, current);
    store
        .save_snapshot(&advanced)
        .context("Failed to save snapshot")?;

    output.success(&format!("Created: {}", path.display()));
    output.bullet(&format!("Migration id: {}", migration.migration_id));
    output.bullet(&format!(
        "Snapshot now tracks {}",
        count_label(advanced.entities.len(), "entity")
    ));

    output.info("Next steps:");
    output.bullet("Review the migration file and commit it");
    output.bullet("Run 'crudgen schema show' to inspect the recorded state");

    Ok(())
}

fn handle_remove(ctx: &ProjectContext, output: &OutputManager) -> Result<()> {
    output.heading("Remove Last Migration");

    let store = ctx.store();
    let mut snapshot = store.load_snapshot().context("Failed to load snapshot")?;
    let last = snapshot.last_migration.clone();

    if store
        .remove_last(&mut snapshot)
        .context("Failed to remove migration")?
    {
        store
            .save_snapshot(&snapshot)
            .context("Failed to save snapshot")?;

        output.success(&format!(
            "Removed: {}",
            last.as_deref().unwrap_or("(unknown)")
        ));
        match snapshot.last_migration.as_deref() {
            Some(id) => output.bullet(&format!("Latest migration is now {id}")),
            None => output.bullet("No migrations remain"),
        }
    } else {
        output.info("No migrations to remove");
    }

    Ok(())
}

fn handle_list(ctx: &ProjectContext, output: &OutputManager) -> Result<()> {
    let store = ctx.store();
    let migrations = store
        .list_migrations()
        .context("Failed to list migrations")?;

    if migrations.is_empty() {
        output.info("No migrations recorded yet");
        return Ok(());
    }

    let listing = MigrationListing::from_migrations(&migrations);
    output.display(&listing)
}

#[derive(Serialize)]
struct MigrationListing {
    migrations: Vec<MigrationSummary>,
}

#[derive(Serialize)]
struct MigrationSummary {
    id: String,
    name: String,
    created: String,
    changes: usize,
}

impl MigrationListing {
    fn from_migrations(migrations: &[Migration]) -> Self {
        Self {
            migrations: migrations
                .iter()
                .map(|m| MigrationSummary {
                    id: m.migration_id.clone(),
                    name: m.name.clone(),
                    created: format_datetime(m.timestamp),
                    changes: m.changes.len(),
                })
                .collect(),
        }
    }
}

impl TableDisplay for MigrationListing {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = Table::new();
        if options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }

        table.set_header(vec![
            Cell::new("Id").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
            Cell::new("Changes").add_attribute(Attribute::Bold),
        ]);

        for row in &self.migrations {
            table.add_row(vec![
                Cell::new(&row.id),
                Cell::new(&row.name),
                Cell::new(&row.created),
                Cell::new(row.changes.to_string()),
            ]);
        }

        table
    }

    fn to_compact(&self) -> String {
        format!("Migrations: {}", self.migrations.len())
    }
}

/// One-line rendering of a change for console output.
pub fn format_change(change: &Change) -> String {
    match change {
        Change::EntityAdded { entity_name, entity } => {
            let props = entity.properties.len();
            let label = if props == 1 { "property" } else { "properties" };
            format!(
                "+ entity {entity_name} ({props} {label}, {})",
                count_label(entity.relationships.len(), "relationship"),
            )
        }
        Change::EntityRemoved { entity_name } => format!("- entity {entity_name}"),
        Change::FieldAdded { entity_name, field } => match field {
            FieldDescriptor::Property(property) => {
                format!("+ {entity_name}.{}: {}", property.name, property.declared_type)
            }
            FieldDescriptor::Relationship(relationship) => format!(
                "+ {entity_name}.{} -> {} ({})",
                relationship.name, relationship.target_entity_name, relationship.kind
            ),
        },
        Change::FieldRemoved {
            entity_name,
            field_name,
        } => format!("- {entity_name}.{field_name}"),
        Change::FieldModified {
            entity_name,
            field_name,
            changed_attributes,
        } => {
            let attrs: Vec<&str> = changed_attributes.keys().map(String::as_str).collect();
            format!("~ {entity_name}.{field_name} ({})", attrs.join(", "))
        }
    }
}
