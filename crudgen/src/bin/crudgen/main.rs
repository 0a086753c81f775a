mod commands;
mod context;
mod examples;
mod output;
mod scanner;
mod theme;
mod utils;

use anyhow::Result;
use clap::{
    builder::{
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
        Styles,
    },
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
};
use colored::{control::ShouldColorize, Color as ThemeColor, Colorize};
use std::fmt::Write;

use commands::{
    init::{handle_init, InitArgs},
    migrate::{handle_migrate_commands, MigrateCommands},
    schema::{handle_schema_commands, SchemaCommands},
};
use examples::{command_examples, ExampleGroup};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[(
    context::WORKSPACE_ENV,
    "Override the metadata workspace directory (default: .crudgen)",
)];

#[derive(Parser)]
#[command(name = "crudgen")]
#[command(version = "0.1.0")]
#[command(
    about = "Entity metadata versioning and migration tool",
    long_about = r#"Tracks the evolving shape of your entities - names, properties,
relationships and their UI/validation metadata - the way a schema
migration tool tracks database schema:

• Scans annotated Rust structs for the current entity shapes
• Fills unconfigured metadata with naming/type conventions
• Diffs against the recorded snapshot and stores immutable migrations
• Feeds downstream admin-UI code generation

Commands:
  init      Initialize crudgen in a project
  migrate   Record and manage schema migrations
  schema    Inspect pending changes and the recorded snapshot
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize crudgen in the current project
    Init(InitArgs),

    /// Record and manage schema migrations
    #[command(subcommand)]
    Migrate(MigrateCommands),

    /// Inspect pending changes and the recorded snapshot
    #[command(subcommand)]
    Schema(SchemaCommands),
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        match command.try_get_matches() {
            Ok(matches) => {
                Cli::from_arg_matches(&matches).expect("Failed to parse CLI arguments")
            }
            Err(err) => err.exit(),
        }
    }
}

fn build_cli_command() -> Command {
    let use_color = ShouldColorize::from_env().should_colorize();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command()
        .after_long_help(appendix)
        .styles(help_styles())
        .color(if use_color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let heading = stylize("Examples:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = stylize(group.title, theme.primary, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(ICONS.arrow, theme.secondary, false, use_color);
            let command_text = stylize(command, theme.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let env_heading = stylize("Environment Variables:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, theme.key, true, use_color);
        let value_text = stylize(description, theme.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let tip_heading = stylize("Tip:", theme.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'crudgen <command> --help' to view examples for each command.",
        theme.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if use_color {
        let styled = text.color(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    } else {
        text.to_string()
    }
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.secondary))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli.command, &output) {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    match command {
        Commands::Init(args) => handle_init(args, output),
        Commands::Migrate(command) => handle_migrate_commands(command, output),
        Commands::Schema(command) => handle_schema_commands(command, output),
    }
}
