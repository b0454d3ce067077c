//! Integration tests for the deckforge CLI
//!
//! These tests drive the command functions against the fixture library:
//! config file -> plan -> deck on disk.

use std::fs;
use std::path::Path;

use deckforge_cli::{
    build_command, check_command, check_plan, describe_command, load_settings, restore_command,
    OutputFormat, Overrides,
};
use deckforge_pptx::test_utils::{library_fixture, output_slide, shape_text, write_library};
use deckforge_pptx::{ContentPlan, Settings, TemplateLibrary};
use tempfile::TempDir;

fn workspace() -> (TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    write_library(dir.path());
    let config = dir.path().join("deckforge.toml");
    fs::write(
        &config,
        r#"
[library]
path = "library.pptx"
catalog = "slots.toml"
title_slide = 1

[output]
path = "output/deck.pptx"
"#,
    )
    .unwrap();
    let settings = load_settings(Some(&config), &Overrides::default()).unwrap();
    (dir, settings)
}

fn write_plan(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const PLAN: &str = r#"{
  "presentation_title": "Quarterly Review",
  "slides": [
    {"slide_index": 3, "slide_title": "Q3 Results", "slots": {"bullets": "Revenue up\nCosts flat", "cell": "Q3"}},
    {"slide_index": 3, "slide_title": "Q4 Results", "slots": {"picture": false}, "source_section": "2.1"}
  ]
}"#;

#[test]
fn test_build_from_config() {
    let (dir, settings) = workspace();
    let plan = write_plan(dir.path(), "plan.json", PLAN);

    let report = build_command(settings, &plan, false, OutputFormat::Text).unwrap();
    assert_eq!(report.slides, 3);
    assert!(report.warnings.is_empty());
    assert_eq!(report.output, dir.path().join("output/deck.pptx"));
    assert!(dir.path().join("output/deck.plan.json").exists());

    let deck = fs::read(&report.output).unwrap();
    assert_eq!(
        shape_text(&output_slide(&deck, 1), "Title 1").unwrap(),
        "Quarterly Review"
    );
    let q3 = output_slide(&deck, 2);
    assert_eq!(shape_text(&q3, "Titre 1").unwrap(), "Q3 Results");
    assert_eq!(shape_text(&q3, "ZoneTexte 8").unwrap(), "Revenue up\nCosts flat");
    assert_eq!(
        shape_text(&output_slide(&deck, 3), "Titre 1").unwrap(),
        "Q4 Results"
    );

    // The backup is seeded on the first run
    assert_eq!(
        fs::read(dir.path().join("library.backup.pptx")).unwrap(),
        library_fixture()
    );
}

#[test]
fn test_build_raw_model_response() {
    let (dir, settings) = workspace();
    let plan = write_plan(
        dir.path(),
        "response.txt",
        "```json\n[\n  {\"slide_index\": 2, \"slots\": {\"title\": \"Agenda\",},},\n]\n```\n",
    );

    assert!(build_command(settings.clone(), &plan, false, OutputFormat::Json).is_err());

    let report = build_command(settings, &plan, true, OutputFormat::Json).unwrap();
    assert_eq!(report.slides, 1);
    let deck = fs::read(&report.output).unwrap();
    assert_eq!(shape_text(&output_slide(&deck, 1), "Title 1").unwrap(), "Agenda");
}

#[test]
fn test_build_invalid_plan_writes_nothing() {
    let (dir, settings) = workspace();
    let plan = write_plan(dir.path(), "plan.json", r#"[{"slide_index": 12}]"#);

    let err = build_command(settings, &plan, false, OutputFormat::Text).unwrap_err();
    assert!(format!("{:#}", err).contains("unknown slide_index 12"));
    assert!(!dir.path().join("output").join("deck.pptx").exists());
}

#[test]
fn test_overrides() {
    let (dir, _) = workspace();
    let overrides = Overrides {
        output: Some(dir.path().join("elsewhere.pptx")),
        ..Overrides::default()
    };
    let settings = load_settings(Some(&dir.path().join("deckforge.toml")), &overrides).unwrap();
    let plan = write_plan(dir.path(), "plan.json", r#"[{"slide_index": 2}]"#);

    let report = build_command(settings, &plan, false, OutputFormat::Text).unwrap();
    assert_eq!(report.output, dir.path().join("elsewhere.pptx"));
    assert!(report.output.exists());
}

#[test]
fn test_check_plan_issues() {
    let (dir, settings) = workspace();
    let library = TemplateLibrary::load_with_catalog(
        &settings.library.path,
        Some(&deckforge_pptx::SlotCatalog::from_file(dir.path().join("slots.toml")).unwrap()),
    )
    .unwrap();

    let plan = ContentPlan::from_json(
        r#"[
            {"slide_index": 3, "slots": {"bullets": "a\nb\nc\nd\ne\nf", "picture": "perhaps", "nope": "x"}},
            {"slide_index": 8}
        ]"#,
    )
    .unwrap();

    let issues = check_plan(&plan, &library);
    let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
    assert_eq!(issues.len(), 4, "{:?}", messages);
    assert!(messages[0].contains("6 items, at most 5"));
    assert!(messages[1].contains("'nope'"));
    assert!(messages[2].contains("'picture'"));
    assert!(issues[3].fatal);
    assert_eq!(issues[3].position, 2);
}

#[test]
fn test_check_command() {
    let (dir, settings) = workspace();
    let good = write_plan(dir.path(), "good.json", PLAN);
    let bad = write_plan(dir.path(), "bad.json", r#"[{"slide_index": 8}]"#);

    assert!(check_command(&settings, None, false, OutputFormat::Text)
        .unwrap()
        .is_empty());
    assert!(check_command(&settings, Some(&good), false, OutputFormat::Json)
        .unwrap()
        .is_empty());
    assert!(check_command(&settings, Some(&bad), false, OutputFormat::Text).is_err());
}

#[test]
fn test_check_with_unusable_backup() {
    let (dir, settings) = workspace();
    fs::write(dir.path().join("library.backup.pptx"), b"not a deck").unwrap();
    let plan = write_plan(dir.path(), "plan.json", PLAN);

    assert!(check_command(&settings, Some(&plan), false, OutputFormat::Json)
        .unwrap()
        .is_empty());

    let report = build_command(settings, &plan, false, OutputFormat::Json).unwrap();
    assert!(!report.status.backup_usable());
    assert_eq!(
        fs::read(dir.path().join("library.backup.pptx")).unwrap(),
        b"not a deck"
    );
}

#[test]
fn test_describe_to_file() {
    let (dir, settings) = workspace();
    let target = dir.path().join("context/slides.json");

    describe_command(&settings, Some(&target)).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(json["slides"].as_array().unwrap().len(), 3);
    assert_eq!(json["slides"][2]["slots"]["picture"]["kind"], "toggle");
}

#[test]
fn test_restore_command() {
    let (dir, settings) = workspace();
    fs::write(dir.path().join("library.backup.pptx"), library_fixture()).unwrap();
    fs::write(&settings.library.path, b"damaged").unwrap();

    restore_command(&settings).unwrap();
    assert_eq!(fs::read(&settings.library.path).unwrap(), library_fixture());
}
