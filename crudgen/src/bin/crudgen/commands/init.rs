use anyhow::{Context, Result};
use clap::Args;

use crate::context::{CrudgenConfig, ProjectContext};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Initialize a Project",
    commands: &[
        "crudgen init                  # Create the .crudgen workspace",
        "crudgen init --force          # Rewrite config.toml with defaults",
    ],
}];

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config.toml with defaults
    #[arg(long)]
    pub force: bool,
}

pub fn handle_init(args: InitArgs, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;

    output.heading("Initialize crudgen");
    output.bullet(&format!("Project root: {}", ctx.project_root.display()));

    if ctx.is_initialized() && !args.force {
        output.info("crudgen is already initialized in this project.");
        output.info("Use --force to rewrite config.toml with defaults.");
        return Ok(());
    }

    let store = ctx.store();
    store
        .init()
        .context("Failed to initialize the metadata workspace")?;
    output.success(&format!("Workspace: {}", ctx.workspace_dir.display()));

    if !ctx.config_path.exists() || args.force {
        let config = CrudgenConfig::default();
        let toml_text =
            toml::to_string_pretty(&config).context("Failed to serialize default config")?;
        std::fs::write(&ctx.config_path, toml_text)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;
        output.success(&format!("Config: {}", ctx.config_path.display()));
    }

    output.info("Next steps:");
    output.bullet("Annotate your structs with #[derive(CrudEntity)] and #[crud(...)]");
    output.bullet("Run 'crudgen migrate create --name init' to record the baseline");

    Ok(())
}
