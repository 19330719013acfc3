//! Stage registry keyed by stable stage names.
//!
//! Every stage that can be described declaratively registers a constructor
//! taking [`StageArgs`]. The optional `only` argument is handled here, so
//! constructors only see their own arguments.
//!
//! # Example
//!
//! ```ignore
//! use framepipe_core::registry::default_registry;
//!
//! let stage = default_registry().build("DropColumns", &args)?;
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use framepipe_model::{PipelineError, Result, StageArgs};

use crate::encoding::{StatsEncoding, TargetEncoding};
use crate::stage::Stage;
use crate::stages::{
    AsType, Assign, CategoryCodes, Combinations, DropColumns, DropDuplicates, Query, RenameColumns,
    Select,
};

/// Builds a stage from its arguments.
pub type StageConstructor = fn(&StageArgs) -> Result<Stage>;

/// A registered stage constructor.
#[derive(Debug, Clone, Copy)]
pub struct StageEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub strategy: &'static str,
    constructor: StageConstructor,
}

/// Lookup of stage constructors by name.
#[derive(Debug, Default)]
pub struct StageRegistry {
    entries: BTreeMap<&'static str, StageEntry>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor; an existing entry with the same name is replaced.
    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        strategy: &'static str,
        constructor: StageConstructor,
    ) {
        self.entries.insert(
            name,
            StageEntry {
                name,
                description,
                strategy,
                constructor,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&StageEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Constructs the stage `name` and applies its `only` argument.
    ///
    /// # Errors
    ///
    /// `UnknownStage` for unregistered names, otherwise whatever the
    /// constructor or scope parsing reports.
    pub fn build(&self, name: &str, args: &StageArgs) -> Result<Stage> {
        let entry = self
            .get(name)
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))?;
        let scope = args.scope()?;
        let stage = (entry.constructor)(args)?;
        Ok(match scope {
            Some(scope) => stage.only(scope),
            None => stage,
        })
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &StageEntry> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static DEFAULT_REGISTRY: OnceLock<StageRegistry> = OnceLock::new();

/// Returns the registry with every stock stage, built on first access.
pub fn default_registry() -> &'static StageRegistry {
    DEFAULT_REGISTRY.get_or_init(build_default_registry)
}

fn build_default_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register(
        RenameColumns::NAME,
        "Rename columns by an old -> new mapping",
        "separated",
        RenameColumns::from_args,
    );
    registry.register(
        Select::NAME,
        "Keep the listed columns in the listed order",
        "separated",
        Select::from_args,
    );
    registry.register(
        DropColumns::NAME,
        "Drop the listed columns",
        "separated",
        DropColumns::from_args,
    );
    registry.register(
        AsType::NAME,
        "Cast columns to named dtypes",
        "separated",
        AsType::from_args,
    );
    registry.register(
        DropDuplicates::NAME,
        "Drop repeated rows, keeping the first",
        "separated",
        DropDuplicates::from_args,
    );
    registry.register(
        Combinations::NAME,
        "Arithmetic features from column pairs",
        "separated",
        Combinations::from_args,
    );
    registry.register(
        Query::NAME,
        "Keep rows matching a SQL predicate",
        "separated",
        Query::from_args,
    );
    registry.register(
        Assign::NAME,
        "Add columns from SQL formulas or scalars",
        "separated",
        Assign::from_args,
    );
    registry.register(
        CategoryCodes::NAME,
        "Category codes shared across all tables",
        "merged",
        CategoryCodes::from_args,
    );
    registry.register(
        StatsEncoding::NAME,
        "Group aggregates of a target from a reference table",
        "batch",
        StatsEncoding::from_args,
    );
    registry.register(
        TargetEncoding::NAME,
        "Smoothed target mean from a reference table",
        "batch",
        TargetEncoding::from_args,
    );
    registry
}
