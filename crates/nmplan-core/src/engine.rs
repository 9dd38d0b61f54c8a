use crate::config::{ImportConfig, Mode};
use crate::delete::deletion_target;
use crate::CoreError;
use nmplan_sandbox::import_profile;
use nmplan_schema::{filename_for, import_keyfile, resolve_imported, Resolution, Upsert};
use nmplan_store::Hierarchy;
use tracing::{debug, info};

/// Central orchestration engine for one import or deletion.
///
/// Every step that can fail (parsing, merging, resolution, naming, rendering)
/// runs before the first write, so an error leaves the hierarchy untouched.
pub struct Engine {
    config: ImportConfig,
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub id: String,
    /// Layer file name the definition was written to.
    pub filename: String,
    pub change: Upsert,
    pub resolution: Resolution,
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: String,
    pub files_changed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Imported(ImportOutcome),
    Deleted(DeleteOutcome),
}

impl Engine {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Run the configured operation, confining the process first if asked.
    pub fn run(&self) -> Result<Outcome, CoreError> {
        if self.config.confine {
            import_profile().install()?;
            debug!("syscall filter active");
        }
        match self.config.mode {
            Mode::Import => self.import().map(Outcome::Imported),
            Mode::Delete => self.delete().map(Outcome::Deleted),
        }
    }

    /// Merge the configured keyfile into the hierarchy.
    ///
    /// Re-importing a profile replaces the previous definition of the same id.
    pub fn import(&self) -> Result<ImportOutcome, CoreError> {
        info!("importing keyfile {}", self.config.keyfile.display());
        let mut hierarchy = Hierarchy::load(&self.config.root_dir)?;

        let def = import_keyfile(&self.config.keyfile, Some(hierarchy.definitions()))?;
        let id = def.id.clone();
        let filename = filename_for(&def)?;
        let (_, change) = hierarchy.upsert(def, &filename)?;

        let idx = hierarchy
            .definitions()
            .lookup(&id)
            .ok_or_else(|| CoreError::DefinitionNotFound(id.clone()))?;
        let resolution = resolve_imported(hierarchy.definitions_mut(), idx);

        let plan = hierarchy.plan()?;
        plan.apply()?;
        info!(
            "{} '{id}' in {filename} ({} file(s) changed)",
            match change {
                Upsert::Created => "created",
                Upsert::Updated => "updated",
            },
            plan.changes().len()
        );

        Ok(ImportOutcome {
            id,
            filename,
            change,
            resolution,
        })
    }

    /// Remove the definition the configured keyfile was imported as.
    pub fn delete(&self) -> Result<DeleteOutcome, CoreError> {
        info!("deleting definition of keyfile {}", self.config.keyfile.display());
        let mut hierarchy = Hierarchy::load(&self.config.root_dir)?;

        let id = deletion_target(&self.config.keyfile, hierarchy.definitions())?;
        if hierarchy.remove(&id).is_none() {
            return Err(CoreError::DefinitionNotFound(id));
        }

        let plan = hierarchy.plan()?;
        plan.apply()?;
        info!("removed '{id}' ({} file(s) changed)", plan.changes().len());

        Ok(DeleteOutcome {
            id,
            files_changed: plan.changes().len(),
        })
    }
}
