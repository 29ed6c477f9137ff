//! YAML configuration of a benchmark scenario.
//!
//! ```yaml
//! name: small objects
//! sizes:
//!   - name: tiny
//!     size_min: 4 KiB
//!     size_max: 64 KiB
//!   - name: large
//!     size_min: 1 MiB
//!     size_max: 8 MiB
//!     weight: 1
//!     crud_profile: { creates: 1, reads: 4 }
//! initial_files:
//!   tiny: 100
//!   large: 10
//! crud_profile:
//!   creates: 6
//!   reads: 2
//!   updates: 1
//!   deletes: 1
//! operation_count: 5000
//! run_time: 5m
//! user_count: 8
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use serde::Deserialize;

use crate::scenario::{CrudProfile, Scenario, ScenarioError, SizeClass};

/// A scenario as read from a YAML file. See [`Scenario`] for the meaning of the fields.
#[derive(Debug, Deserialize)]
pub struct ScenarioConfig {
    /// Name of the scenario for identification in logs.
    pub name: String,
    /// Size classes, in the order they are primed.
    pub sizes: Vec<SizeConfig>,
    /// Objects per size class created while priming.
    #[serde(default)]
    pub initial_files: BTreeMap<String, usize>,
    /// Scenario-wide CRUD profile.
    #[serde(default)]
    pub crud_profile: Actions,

    /// Number of run phase jobs.
    #[serde(default = "default_operation_count")]
    pub operation_count: usize,
    /// Upper bound on the run phase duration, e.g. `5m`.
    #[serde(default, with = "humantime_serde")]
    pub run_time: Option<Duration>,
    /// Number of concurrent operations.
    #[serde(default = "default_user_count")]
    pub user_count: usize,

    /// Prefix of the container names.
    #[serde(default = "default_container_base")]
    pub container_base: String,
    /// Number of containers objects are spread over.
    #[serde(default = "default_container_count")]
    pub container_count: usize,

    /// Content template for post jobs.
    #[serde(default)]
    pub post_template: Option<String>,
    /// Delete objects created during the run afterwards.
    #[serde(default = "default_delete_after_run")]
    pub delete_after_run: bool,
    /// RNG seed for a reproducible job stream.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A size class of the scenario.
#[derive(Debug, Deserialize)]
pub struct SizeConfig {
    /// Label of the size class.
    pub name: String,
    /// Smallest object size, e.g. `4 KiB`.
    pub size_min: ByteSize,
    /// Largest object size.
    pub size_max: ByteSize,
    /// Selection weight relative to the other size classes.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Overrides the scenario-wide CRUD profile.
    #[serde(default)]
    pub crud_profile: Option<Actions>,
}

/// CRUD profile weights. Missing entries default to zero.
#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct Actions {
    #[serde(default)]
    pub creates: u32,
    #[serde(default)]
    pub reads: u32,
    #[serde(default)]
    pub updates: u32,
    #[serde(default)]
    pub deletes: u32,
    #[serde(default)]
    pub posts: u32,
}

impl Default for Actions {
    fn default() -> Self {
        let profile = CrudProfile::default();
        Self {
            creates: profile.create,
            reads: profile.read,
            updates: profile.update,
            deletes: profile.delete,
            posts: profile.post,
        }
    }
}

impl From<&Actions> for CrudProfile {
    fn from(actions: &Actions) -> Self {
        CrudProfile::new(
            actions.creates,
            actions.reads,
            actions.updates,
            actions.deletes,
            actions.posts,
        )
    }
}

fn default_operation_count() -> usize {
    1000
}

fn default_user_count() -> usize {
    4
}

fn default_container_base() -> String {
    "ssbench".to_owned()
}

fn default_container_count() -> usize {
    100
}

fn default_delete_after_run() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

impl ScenarioConfig {
    /// Reads and parses a YAML scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open scenario file {}", path.display()))?;
        serde_yaml::from_reader(file).context("failed to parse scenario YAML")
    }

    /// Parses a YAML scenario from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse scenario YAML")
    }

    /// Validates the configuration and turns it into a [`Scenario`].
    pub fn into_scenario(self) -> Result<Scenario, ScenarioError> {
        let mut builder = Scenario::builder(self.name)
            .crud_profile(CrudProfile::from(&self.crud_profile))
            .operation_count(self.operation_count)
            .user_count(self.user_count)
            .containers(self.container_base, self.container_count)
            .delete_after_run(self.delete_after_run);

        for size in &self.sizes {
            let mut size_class =
                SizeClass::new(&*size.name, size.size_min.as_u64(), size.size_max.as_u64())
                    .weight(size.weight);
            if let Some(actions) = &size.crud_profile {
                size_class = size_class.crud_profile(actions.into());
            }
            builder = builder.size_class(size_class);
        }
        for (name, count) in self.initial_files {
            builder = builder.initial_files(name, count);
        }
        if let Some(run_time) = self.run_time {
            builder = builder.run_time(run_time);
        }
        if let Some(template) = self.post_template {
            builder = builder.post_template(template);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }

        builder.build()
    }
}
