//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use deckforge_pptx::{
    BuildReport, ContentPlan, DeckBuilder, LibraryStatus, Settings, ShapeInfo, SlotKind,
    TemplateLibrary,
};

/// Settings file looked up in the working directory
pub const DEFAULT_CONFIG: &str = "deckforge.toml";

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "deckforge")]
#[command(author, version, about = "Build slide decks from a template library", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./deckforge.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line values that win over the settings file
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Primary template library
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Pristine library backup
    #[arg(long, global = true)]
    pub backup: Option<PathBuf>,

    /// Slot catalog TOML
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Output deck
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a deck from a content plan
    Build {
        /// Content plan JSON file
        plan: PathBuf,

        /// Treat the plan file as raw model output (code fences, trailing commas)
        #[arg(long)]
        raw: bool,

        /// Library slide prepended when the plan has a presentation title
        #[arg(long)]
        title_slide: Option<u32>,

        /// Do not write the plan copy next to the deck
        #[arg(long)]
        no_plan: bool,

        /// Report format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the slides, shapes and slots of the template library
    Inspect {
        /// Only this slide
        #[arg(short, long)]
        slide: Option<u32>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the template description handed to the plan generator
    Describe {
        /// Write to this file instead of stdout
        #[arg(long)]
        to: Option<PathBuf>,
    },

    /// Check library health, and optionally a content plan against it
    Check {
        /// Content plan JSON file
        plan: Option<PathBuf>,

        /// Treat the plan file as raw model output
        #[arg(long)]
        raw: bool,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Restore the primary library from its backup
    Restore,
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_deref(), &cli.overrides)?;
    debug!("Settings: {:?}", settings);

    match cli.command {
        Commands::Build {
            plan,
            raw,
            title_slide,
            no_plan,
            format,
        } => {
            let mut settings = settings;
            if title_slide.is_some() {
                settings.library.title_slide = title_slide;
            }
            if no_plan {
                settings.output.save_plan = false;
            }
            build_command(settings, &plan, raw, format)?;
        }
        Commands::Inspect { slide, format } => {
            inspect_command(&settings, slide, format)?;
        }
        Commands::Describe { to } => {
            describe_command(&settings, to.as_deref())?;
        }
        Commands::Check { plan, raw, format } => {
            check_command(&settings, plan.as_deref(), raw, format)?;
        }
        Commands::Restore => {
            restore_command(&settings)?;
        }
    }

    Ok(())
}

/// Install the log subscriber on stderr
///
/// `RUST_LOG` wins; otherwise engine messages at info, or debug with `-v`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "deckforge=debug" } else { "deckforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Resolve settings from the config file and command-line overrides
pub fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => Settings::from_file(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load settings: {}", DEFAULT_CONFIG))?,
        None => Settings::default(),
    };

    if let Some(library) = &overrides.library {
        settings.library.path = library.clone();
    }
    if let Some(backup) = &overrides.backup {
        settings.library.backup = Some(backup.clone());
    }
    if let Some(catalog) = &overrides.catalog {
        settings.library.catalog = Some(catalog.clone());
    }
    if let Some(output) = &overrides.output {
        settings.output.path = output.clone();
    }
    settings.validate()?;

    Ok(settings)
}

/// Read a content plan, cleaning model output first when `raw` is set
pub fn read_plan(path: &Path, raw: bool) -> Result<ContentPlan> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read content plan: {}", path.display()))?;
    let plan = if raw {
        ContentPlan::from_model_response(&content)
    } else {
        ContentPlan::from_json(&content)
    };
    plan.with_context(|| format!("Failed to parse content plan: {}", path.display()))
}

/// Execute the build command
pub fn build_command(
    settings: Settings,
    plan_path: &Path,
    raw: bool,
    format: OutputFormat,
) -> Result<BuildReport> {
    let plan = read_plan(plan_path, raw)?;
    let report = DeckBuilder::new(settings)
        .build(&plan)
        .with_context(|| format!("Failed to build deck from {}", plan_path.display()))?;

    match format {
        OutputFormat::Text => {
            if let Some(notice) = report.status.notice() {
                println!("{}", notice);
            }
            println!("Built: {}", report.output.display());
            println!("  {} slides", report.slides);
            if let Some(path) = &report.plan_path {
                println!("  Plan: {}", path.display());
            }
            if !report.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &report.warnings {
                    println!("  {}", warning);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "output": report.output,
                "plan": report.plan_path,
                "slides": report.slides,
                "library_restored": report.status.was_restored(),
                "backup_usable": report.status.backup_usable(),
                "warnings": report.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(report)
}

#[derive(Debug, Serialize)]
struct SlideSummary<'a> {
    index: u32,
    part: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    category: &'a str,
    title_slot: Option<&'a str>,
    slots: BTreeMap<&'a str, SlotSummary>,
    shapes: &'a [ShapeInfo],
}

#[derive(Debug, Serialize)]
struct SlotSummary {
    kind: SlotKind,
    target: String,
}

/// Open the library through the recovery guard
fn open_library(settings: &Settings) -> Result<(TemplateLibrary, LibraryStatus)> {
    let (library, status) = DeckBuilder::new(settings.clone())
        .open_library()
        .with_context(|| {
            format!(
                "Failed to open template library: {}",
                settings.library.path.display()
            )
        })?;
    if let Some(notice) = status.notice() {
        eprintln!("{}", notice);
    }
    Ok((library, status))
}

/// Execute the inspect command
pub fn inspect_command(settings: &Settings, slide: Option<u32>, format: OutputFormat) -> Result<()> {
    let (library, _) = open_library(settings)?;

    let templates = match slide {
        Some(index) => vec![library.resolve(index)?],
        None => library.templates().iter().collect(),
    };

    let summaries: Vec<SlideSummary> = templates
        .into_iter()
        .map(|t| SlideSummary {
            index: t.slide_index,
            part: &t.part_name,
            category: &t.category,
            title_slot: t.title_slot.as_deref(),
            slots: t
                .slots
                .iter()
                .map(|(id, def)| {
                    (
                        id.as_str(),
                        SlotSummary {
                            kind: def.kind,
                            target: def.target.to_string(),
                        },
                    )
                })
                .collect(),
            shapes: &t.shapes,
        })
        .collect();

    match format {
        OutputFormat::Text => {
            println!(
                "Template library: {} ({} slides)",
                settings.library.path.display(),
                library.slide_count()
            );
            for summary in &summaries {
                println!();
                print!("Slide {} ({})", summary.index, summary.part);
                if !summary.category.is_empty() {
                    print!(" [{}]", summary.category);
                }
                println!();

                for shape in summary.shapes {
                    let indent = if shape.group.is_some() { "      " } else { "    " };
                    let mut flags = Vec::new();
                    if let Some(ph) = &shape.placeholder {
                        flags.push(format!("placeholder={}", ph));
                    }
                    if let Some((rows, cols)) = shape.table {
                        flags.push(format!("table={}x{}", rows, cols));
                    }
                    if shape.hidden {
                        flags.push("hidden".to_string());
                    }
                    println!(
                        "{}#{} {:?} '{}' {}",
                        indent,
                        shape.id,
                        shape.kind,
                        shape.name,
                        flags.join(" ")
                    );
                }
                for (id, slot) in &summary.slots {
                    println!("    slot {} -> {} ({})", id, slot.target, slot.kind);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}

/// Execute the describe command
pub fn describe_command(settings: &Settings, to: Option<&Path>) -> Result<()> {
    let (library, _) = open_library(settings)?;
    let json = library.describe().to_json()?;

    match to {
        Some(path) => {
            deckforge_pptx::write_atomic(path, json.as_bytes())
                .with_context(|| format!("Failed to write description: {}", path.display()))?;
            println!("Created: {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// One problem found by `check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanIssue {
    /// 1-based plan entry
    pub position: usize,
    pub slide_index: u32,
    pub message: String,
    /// Whether the build would fail on it
    pub fatal: bool,
}

/// Compare a content plan with the library without building anything
pub fn check_plan(plan: &ContentPlan, library: &TemplateLibrary) -> Vec<PlanIssue> {
    let mut issues = Vec::new();

    for (i, entry) in plan.entries.iter().enumerate() {
        let position = i + 1;
        let Ok(template) = library.resolve(entry.slide_index) else {
            issues.push(PlanIssue {
                position,
                slide_index: entry.slide_index,
                message: format!(
                    "unknown slide_index (library has {} slides)",
                    library.slide_count()
                ),
                fatal: true,
            });
            continue;
        };

        if entry.slide_title.is_some() && template.title_slot.is_none() {
            issues.push(PlanIssue {
                position,
                slide_index: entry.slide_index,
                message: "slide_title given but the slide has no title slot".to_string(),
                fatal: false,
            });
        }

        for (slot_id, value) in &entry.slots {
            let message = match template.slot(slot_id) {
                None => Some(format!("slot '{}' does not exist and will be ignored", slot_id)),
                Some(def) => {
                    let checked = match def.kind {
                        SlotKind::Text => value.text_lines().map(|lines| {
                            let words: usize =
                                lines.iter().map(|l| l.split_whitespace().count()).sum();
                            if def.max_items.is_some_and(|max| lines.len() > max as usize) {
                                Some(format!(
                                    "slot '{}' has {} items, at most {} fit",
                                    slot_id,
                                    lines.len(),
                                    def.max_items.unwrap_or_default()
                                ))
                            } else if def.max_words.is_some_and(|max| words > max as usize) {
                                Some(format!(
                                    "slot '{}' has {} words, at most {} fit",
                                    slot_id,
                                    words,
                                    def.max_words.unwrap_or_default()
                                ))
                            } else {
                                None
                            }
                        }),
                        SlotKind::Toggle => value.visibility().map(|_| None),
                    };
                    match checked {
                        Ok(message) => message,
                        Err(reason) => Some(format!("slot '{}': {}", slot_id, reason)),
                    }
                }
            };
            if let Some(message) = message {
                issues.push(PlanIssue {
                    position,
                    slide_index: entry.slide_index,
                    message,
                    fatal: false,
                });
            }
        }
    }

    issues
}

/// Execute the check command
pub fn check_command(
    settings: &Settings,
    plan_path: Option<&Path>,
    raw: bool,
    format: OutputFormat,
) -> Result<Vec<PlanIssue>> {
    let builder = DeckBuilder::new(settings.clone());
    builder
        .guard()
        .check_output_path(&settings.output.path)
        .context("Output path is not usable")?;
    let (library, status) = open_library(settings)?;

    let issues = match plan_path {
        Some(path) => check_plan(&read_plan(path, raw)?, &library),
        None => Vec::new(),
    };

    match format {
        OutputFormat::Text => {
            println!(
                "Template library OK: {} ({} slides)",
                settings.library.path.display(),
                library.slide_count()
            );
            if let Some(path) = plan_path {
                if issues.is_empty() {
                    println!("Content plan OK: {}", path.display());
                } else {
                    println!("Content plan: {}", path.display());
                    for issue in &issues {
                        let level = if issue.fatal { "error" } else { "warning" };
                        println!(
                            "  {}: entry {} (slide_index {}): {}",
                            level, issue.position, issue.slide_index, issue.message
                        );
                    }
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "library": settings.library.path,
                "slides": library.slide_count(),
                "backup_usable": status.backup_usable(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    let fatal = issues.iter().filter(|i| i.fatal).count();
    if fatal > 0 {
        anyhow::bail!("Content plan has {} fatal issue(s)", fatal);
    }
    Ok(issues)
}

/// Execute the restore command
pub fn restore_command(settings: &Settings) -> Result<()> {
    let guard = DeckBuilder::new(settings.clone()).guard();
    guard.restore().with_context(|| {
        format!(
            "Failed to restore {} from {}",
            guard.primary().display(),
            guard.backup().display()
        )
    })?;

    let library = TemplateLibrary::load(guard.primary())?;
    println!(
        "Restored: {} ({} slides)",
        guard.primary().display(),
        library.slide_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "deckforge",
            "--library",
            "lib.pptx",
            "build",
            "plan.json",
            "--raw",
            "-o",
            "out.pptx",
        ])
        .unwrap();
        assert_eq!(cli.overrides.library, Some(PathBuf::from("lib.pptx")));
        assert_eq!(cli.overrides.output, Some(PathBuf::from("out.pptx")));
        assert!(matches!(
            cli.command,
            Commands::Build { raw: true, .. }
        ));
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            library: Some(PathBuf::from("a.pptx")),
            backup: None,
            catalog: Some(PathBuf::from("slots.toml")),
            output: Some(PathBuf::from("deck.pptx")),
        };
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("deckforge.toml");
        fs::write(&config, "[library]\npath = \"lib.pptx\"\n").unwrap();

        let settings = load_settings(Some(&config), &overrides).unwrap();
        assert_eq!(settings.library.path, PathBuf::from("a.pptx"));
        assert_eq!(settings.library.catalog, Some(PathBuf::from("slots.toml")));
        assert_eq!(settings.output.path, PathBuf::from("deck.pptx"));
        assert_eq!(settings.backup_path(), PathBuf::from("a.backup.pptx"));
    }
}
