//! Recovery guard and builder tests
//!
//! Every test works on its own temporary directory holding a primary
//! library, its backup and the output folder.

use std::path::{Path, PathBuf};

use deckforge_pptx::test_utils::{library_fixture, library_without, output_slide, shape_text};
use deckforge_pptx::{
    sha256_hex, ContentPlan, ContentPlanEntry, DeckBuilder, LibraryStatus, RecoveryGuard, Settings,
};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn primary(&self) -> PathBuf {
        self.path("library.pptx")
    }

    fn backup(&self) -> PathBuf {
        self.path("library.backup.pptx")
    }

    fn output(&self) -> PathBuf {
        self.path("out/deck.pptx")
    }

    fn with_library(self) -> Self {
        std::fs::write(self.primary(), library_fixture()).unwrap();
        std::fs::write(self.backup(), library_fixture()).unwrap();
        self
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.library.path = self.primary();
        settings.output.path = self.output();
        settings
    }

    fn builder(&self) -> DeckBuilder {
        DeckBuilder::new(self.settings())
    }
}

fn digest(path: &Path) -> String {
    sha256_hex(&std::fs::read(path).unwrap())
}

fn q3_plan() -> ContentPlan {
    ContentPlan::new(vec![
        ContentPlanEntry {
            slide_title: Some("Q3 Results".to_string()),
            ..ContentPlanEntry::new(3)
        },
        ContentPlanEntry::new(2).with_slot("title", "Outlook"),
    ])
}

// =============================================================================
// PART 1: RECOVERY GUARD
// =============================================================================

mod guard {
    use super::*;

    #[test]
    fn test_healthy_primary() {
        let ws = Workspace::new().with_library();
        let guard = RecoveryGuard::new(ws.primary(), ws.backup());
        assert_eq!(
            guard.ensure_healthy().unwrap(),
            LibraryStatus::Healthy { slides: 3 }
        );
    }

    #[test]
    fn test_truncated_primary_is_restored() {
        let ws = Workspace::new().with_library();
        let backup_digest = digest(&ws.backup());
        let bytes = library_fixture();
        std::fs::write(ws.primary(), &bytes[..bytes.len() / 2]).unwrap();

        let status = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap();
        assert!(status.was_restored());
        assert_eq!(status.slides(), 3);

        assert_eq!(digest(&ws.primary()), backup_digest);
        assert_eq!(digest(&ws.backup()), backup_digest);
    }

    #[test]
    fn test_primary_missing_slide_part_is_restored() {
        let ws = Workspace::new().with_library();
        std::fs::write(ws.primary(), library_without("ppt/slides/slide3.xml")).unwrap();

        let status = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap();
        let LibraryStatus::Restored { reason, .. } = status else {
            panic!("expected a restore, got {:?}", status);
        };
        assert!(reason.contains("slide 3"));
    }

    #[test]
    fn test_deleted_primary_is_restored() {
        let ws = Workspace::new().with_library();
        std::fs::remove_file(ws.primary()).unwrap();

        let status = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap();
        assert!(status.was_restored());
        assert!(ws.primary().exists());
    }

    #[test]
    fn test_missing_backup_is_seeded() {
        let ws = Workspace::new().with_library();
        std::fs::remove_file(ws.backup()).unwrap();

        let status = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap();
        assert_eq!(status, LibraryStatus::BackupSeeded { slides: 3 });
        assert_eq!(digest(&ws.backup()), digest(&ws.primary()));
    }

    #[test]
    fn test_unusable_backup_is_reported() {
        let ws = Workspace::new().with_library();
        std::fs::write(ws.backup(), b"PK\x03\x04 truncated").unwrap();

        let status = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap();
        let LibraryStatus::BackupUnusable { slides, reason } = &status else {
            panic!("expected an unusable backup, got {:?}", status);
        };
        assert_eq!(*slides, 3);
        assert!(!reason.is_empty());
        assert!(!status.backup_usable());
        assert!(status.notice().unwrap().contains("Backup library is unusable"));

        // The backup is reported, never overwritten
        assert_eq!(std::fs::read(ws.backup()).unwrap(), b"PK\x03\x04 truncated");
    }

    #[test]
    fn test_short_backup_is_refused() {
        let ws = Workspace::new().with_library();
        let guard = RecoveryGuard::new(ws.primary(), ws.backup()).with_expected_slides(Some(5));

        let err = guard.ensure_healthy().unwrap_err();
        assert_eq!(err.code(), "DECK002");
        assert!(err.to_string().contains("expected at least 5"));
    }

    #[test]
    fn test_damaged_pair_fails() {
        let ws = Workspace::new().with_library();
        std::fs::write(ws.primary(), b"garbage").unwrap();
        std::fs::write(ws.backup(), b"garbage").unwrap();

        let err = RecoveryGuard::new(ws.primary(), ws.backup())
            .ensure_healthy()
            .unwrap_err();
        assert!(err.to_string().contains("no usable backup"));
        assert_eq!(std::fs::read(ws.primary()).unwrap(), b"garbage");
    }
}

// =============================================================================
// PART 2: BUILDER
// =============================================================================

mod builder {
    use super::*;

    #[test]
    fn test_build_writes_deck_and_plan() {
        let ws = Workspace::new().with_library();
        let report = ws.builder().build(&q3_plan()).unwrap();

        assert_eq!(report.output, ws.output());
        assert_eq!(report.slides, 2);
        assert!(report.warnings.is_empty());
        assert_eq!(report.status, LibraryStatus::Healthy { slides: 3 });

        let deck = std::fs::read(ws.output()).unwrap();
        assert_eq!(
            shape_text(&output_slide(&deck, 1), "Titre 1").unwrap(),
            "Q3 Results"
        );
        assert_eq!(
            shape_text(&output_slide(&deck, 2), "Title 1").unwrap(),
            "Outlook"
        );

        let plan_path = report.plan_path.unwrap();
        assert_eq!(plan_path, ws.path("out/deck.plan.json"));
        let saved = ContentPlan::from_file(&plan_path).unwrap();
        assert_eq!(saved, q3_plan());
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let ws = Workspace::new().with_library();
        ws.builder().build(&q3_plan()).unwrap();
        let first = std::fs::read(ws.output()).unwrap();

        ws.builder().build(&q3_plan()).unwrap();
        assert_eq!(std::fs::read(ws.output()).unwrap(), first);
    }

    #[test]
    fn test_library_is_never_modified() {
        let ws = Workspace::new().with_library();
        let before = digest(&ws.primary());
        ws.builder().build(&q3_plan()).unwrap();
        assert_eq!(digest(&ws.primary()), before);
    }

    #[test]
    fn test_failed_build_leaves_no_output() {
        let ws = Workspace::new().with_library();
        let plan = ContentPlan::new(vec![ContentPlanEntry::new(3), ContentPlanEntry::new(17)]);

        let err = ws.builder().build(&plan).unwrap_err();
        assert_eq!(err.code(), "DECK004");
        assert!(!ws.output().exists());
        assert!(!ws.path("out/deck.plan.json").exists());
    }

    #[test]
    fn test_failed_build_keeps_previous_output() {
        let ws = Workspace::new().with_library();
        ws.builder().build(&q3_plan()).unwrap();
        let previous = std::fs::read(ws.output()).unwrap();

        let plan = ContentPlan::new(vec![ContentPlanEntry::new(99)]);
        assert!(ws.builder().build(&plan).is_err());
        assert_eq!(std::fs::read(ws.output()).unwrap(), previous);
    }

    #[test]
    fn test_plan_copy_failure_keeps_deck() {
        let ws = Workspace::new().with_library();
        // A directory where the plan copy should go
        std::fs::create_dir_all(ws.path("out/deck.plan.json")).unwrap();

        let report = ws.builder().build(&q3_plan()).unwrap();
        assert!(report.plan_path.is_none());
        assert_eq!(report.slides, 2);
        assert!(ws.output().exists());
        assert!(ws.path("out/deck.plan.json").is_dir());
    }

    #[test]
    fn test_build_reports_unusable_backup() {
        let ws = Workspace::new().with_library();
        std::fs::write(ws.backup(), b"garbage").unwrap();

        let report = ws.builder().build(&q3_plan()).unwrap();
        assert!(!report.status.backup_usable());
        assert_eq!(report.status.slides(), 3);
        assert!(ws.output().exists());
    }

    #[test]
    fn test_build_self_heals_damaged_library() {
        let ws = Workspace::new().with_library();
        let backup_digest = digest(&ws.backup());
        std::fs::write(ws.primary(), b"PK\x03\x04 truncated").unwrap();

        let report = ws.builder().build(&q3_plan()).unwrap();
        assert!(report.status.was_restored());
        assert_eq!(report.slides, 2);
        assert_eq!(digest(&ws.primary()), backup_digest);
        assert_eq!(digest(&ws.backup()), backup_digest);
    }

    #[test]
    fn test_output_over_library_is_refused() {
        let ws = Workspace::new().with_library();
        let mut settings = ws.settings();
        settings.output.path = ws.backup();

        let err = DeckBuilder::new(settings).build(&q3_plan()).unwrap_err();
        assert_eq!(err.code(), "DECK008");
        assert_eq!(digest(&ws.backup()), digest(&ws.primary()));
    }

    #[test]
    fn test_title_slide() {
        let ws = Workspace::new().with_library();
        let mut settings = ws.settings();
        settings.library.title_slide = Some(1);
        settings.output.save_plan = false;

        let mut plan = q3_plan();
        plan.presentation_title = Some("Annual Review".to_string());

        let report = DeckBuilder::new(settings.clone()).build(&plan).unwrap();
        assert_eq!(report.slides, 3);
        assert!(report.plan_path.is_none());

        let deck = std::fs::read(ws.output()).unwrap();
        let title = output_slide(&deck, 1);
        assert_eq!(shape_text(&title, "Title 1").unwrap(), "Annual Review");
        assert_eq!(shape_text(&title, "Subtitle 2").unwrap(), "[DATE]");
        assert_eq!(
            shape_text(&output_slide(&deck, 2), "Titre 1").unwrap(),
            "Q3 Results"
        );

        // Untitled plans get no title slide
        let report = DeckBuilder::new(settings).build(&q3_plan()).unwrap();
        assert_eq!(report.slides, 2);
    }

    #[test]
    fn test_catalog_from_settings() {
        let ws = Workspace::new().with_library();
        std::fs::write(ws.path("slots.toml"), deckforge_pptx::test_utils::CATALOG).unwrap();
        let mut settings = ws.settings();
        settings.library.catalog = Some(ws.path("slots.toml"));

        let plan = ContentPlan::new(vec![ContentPlanEntry::new(3).with_slot("cell", "Q3")]);
        let report = DeckBuilder::new(settings).build(&plan).unwrap();
        assert!(report.warnings.is_empty());

        let deck = std::fs::read(ws.output()).unwrap();
        assert!(shape_text(&output_slide(&deck, 1), "Table 7")
            .unwrap()
            .contains("Q3"));
    }
}
