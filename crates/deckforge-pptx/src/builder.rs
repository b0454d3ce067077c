//! End-to-end deck generation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::assembler::DeckAssembler;
use crate::atomic::write_atomic;
use crate::catalog::SlotCatalog;
use crate::error::Result;
use crate::guard::{LibraryStatus, RecoveryGuard};
use crate::library::TemplateLibrary;
use crate::plan::ContentPlan;
use crate::rewriter::{apply, apply_entry};
use crate::settings::Settings;
use crate::slot::{SlotValue, SlotWarning};

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Written deck
    pub output: PathBuf,
    /// Written plan copy; `None` when disabled or when writing it failed
    pub plan_path: Option<PathBuf>,
    /// Slides in the output deck, title slide included
    pub slides: usize,
    /// Slot problems that did not stop the build
    pub warnings: Vec<SlotWarning>,
    /// Library health check outcome
    pub status: LibraryStatus,
}

/// Runs plan → deck with library recovery and atomic output
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    settings: Settings,
}

impl DeckBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Recovery guard for the configured library pair
    pub fn guard(&self) -> RecoveryGuard {
        RecoveryGuard::new(&self.settings.library.path, self.settings.backup_path())
            .with_expected_slides(self.settings.library.expected_slides)
    }

    /// Load the configured slot catalog, if any
    pub fn catalog(&self) -> Result<Option<SlotCatalog>> {
        self.settings
            .library
            .catalog
            .as_ref()
            .map(SlotCatalog::from_file)
            .transpose()
    }

    /// Check the library and load it with the configured catalog
    pub fn open_library(&self) -> Result<(TemplateLibrary, LibraryStatus)> {
        let guard = self.guard();
        let status = guard.ensure_healthy()?;
        if let Some(notice) = status.notice() {
            warn!("{}", notice);
        }
        let catalog = self.catalog()?;
        let library = guard.load(catalog.as_ref())?;
        Ok((library, status))
    }

    /// Build the deck for `plan` and write it to the configured output
    ///
    /// Nothing is written unless the whole deck was produced.
    pub fn build(&self, plan: &ContentPlan) -> Result<BuildReport> {
        let output = self.settings.output.path.clone();
        self.guard().check_output_path(&output)?;

        let (library, status) = self.open_library()?;
        let (bytes, slides, warnings) = self.render_counted(plan, &library)?;
        let plan_json = self
            .settings
            .output
            .save_plan
            .then(|| plan.to_json())
            .transpose()?;

        write_atomic(&output, &bytes)?;
        info!("Wrote {} slides to {}", slides, output.display());

        // The deck is in place; a missing plan copy only costs the record
        let plan_path = plan_json.and_then(|json| {
            let path = self.settings.plan_path();
            match write_atomic(&path, json.as_bytes()) {
                Ok(()) => {
                    info!("Saved content plan to {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("Could not save content plan to {}: {}", path.display(), e);
                    None
                }
            }
        });

        if !warnings.is_empty() {
            warn!("{} slot value(s) could not be applied", warnings.len());
        }

        Ok(BuildReport {
            output,
            plan_path,
            slides,
            warnings,
            status,
        })
    }

    /// Produce the deck bytes without touching the filesystem
    pub fn render(
        &self,
        plan: &ContentPlan,
        library: &TemplateLibrary,
    ) -> Result<(Vec<u8>, Vec<SlotWarning>)> {
        let (bytes, _, warnings) = self.render_counted(plan, library)?;
        Ok((bytes, warnings))
    }

    fn render_counted(
        &self,
        plan: &ContentPlan,
        library: &TemplateLibrary,
    ) -> Result<(Vec<u8>, usize, Vec<SlotWarning>)> {
        let mut deck = DeckAssembler::new()
            .with_title_slide(self.settings.library.title_slide)
            .assemble(plan, library)?;

        let mut warnings = Vec::new();
        for slide in deck.slides_mut() {
            let template = library.resolve(slide.slide_index)?;
            match slide.entry {
                Some(i) => warnings.extend(apply_entry(slide, &plan.entries[i], template)),
                None => {
                    let (Some(title), Some(slot)) =
                        (&plan.presentation_title, &template.title_slot)
                    else {
                        continue;
                    };
                    let values =
                        BTreeMap::from([(slot.clone(), SlotValue::Text(title.clone()))]);
                    warnings.extend(apply(slide, &values, template));
                }
            }
        }

        let slides = deck.len();
        Ok((deck.into_bytes()?, slides, warnings))
    }
}

/// Render a plan against a library with default settings
pub fn render(plan: &ContentPlan, library: &TemplateLibrary) -> Result<(Vec<u8>, Vec<SlotWarning>)> {
    DeckBuilder::new(Settings::default()).render(plan, library)
}
