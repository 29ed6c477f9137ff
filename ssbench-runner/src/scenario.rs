//! A module for defining a [`Scenario`], the job stream of a benchmark run.

use std::time::Duration;

use rand::distr::Uniform;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;
use ssbench_core::{ContentTemplate, Job, Operation, TemplateError};
use thiserror::Error;

/// Errors that can occur when building a [`Scenario`].
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario declares no size classes.
    #[error("scenario has no size classes")]
    NoSizeClasses,

    /// A size class is declared twice.
    #[error("size class `{0}` is declared more than once")]
    DuplicateSizeClass(String),

    /// A size class has its minimum above its maximum.
    #[error("size class `{name}` has size_min {min} above size_max {max}")]
    InvalidSizeRange {
        /// Name of the size class.
        name: String,
        /// Minimum object size in bytes.
        min: u64,
        /// Maximum object size in bytes.
        max: u64,
    },

    /// Initial files were requested for an undeclared size class.
    #[error("initial files requested for unknown size class `{0}`")]
    UnknownSizeClass(String),

    /// A set of weights sums to zero.
    #[error("all weights of {0} are zero")]
    ZeroWeights(String),

    /// The scenario has no containers to put objects in.
    #[error("container_count must be at least 1")]
    NoContainers,

    /// The scenario has no concurrency.
    #[error("user_count must be at least 1")]
    NoUsers,

    /// The concurrency exceeds what the run phase can track.
    #[error("user_count must be at most {max}, got {0}", max = u32::MAX)]
    TooManyUsers(usize),

    /// The post template is invalid.
    #[error("invalid post template: {0}")]
    Template(#[from] TemplateError),
}

/// Relative weights of the operations dispatched during the run phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrudProfile {
    /// Weight of creations.
    pub create: u32,
    /// Weight of reads.
    pub read: u32,
    /// Weight of updates.
    pub update: u32,
    /// Weight of deletes.
    pub delete: u32,
    /// Weight of posts.
    pub post: u32,
}

impl CrudProfile {
    /// Creates a profile from create, read, update, delete and post weights.
    pub fn new(create: u32, read: u32, update: u32, delete: u32, post: u32) -> Self {
        Self {
            create,
            read,
            update,
            delete,
            post,
        }
    }

    /// Weights in the order of [`Operation::ALL`].
    fn weights(&self) -> [u32; 5] {
        [self.create, self.read, self.update, self.delete, self.post]
    }
}

impl Default for CrudProfile {
    fn default() -> Self {
        Self::new(1, 1, 1, 1, 0)
    }
}

/// A size class as declared on the [`ScenarioBuilder`].
#[derive(Clone, Debug)]
pub struct SizeClass {
    /// Label of the size class.
    pub name: String,
    /// Smallest object size in bytes.
    pub size_min: u64,
    /// Largest object size in bytes.
    pub size_max: u64,
    /// How often this size class is picked relative to the others.
    pub weight: u32,
    /// Overrides the scenario-wide CRUD profile for this size class.
    pub crud_profile: Option<CrudProfile>,
}

impl SizeClass {
    /// Creates a size class with weight 1 and no profile override.
    pub fn new(name: impl Into<String>, size_min: u64, size_max: u64) -> Self {
        Self {
            name: name.into(),
            size_min,
            size_max,
            weight: 1,
            crud_profile: None,
        }
    }

    /// Sets the selection weight.
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Overrides the scenario-wide CRUD profile.
    pub fn crud_profile(mut self, profile: CrudProfile) -> Self {
        self.crud_profile = Some(profile);
        self
    }
}

/// A builder for creating a [`Scenario`].
#[derive(Debug)]
pub struct ScenarioBuilder {
    name: String,
    seed: u64,
    sizes: Vec<SizeClass>,
    initial_files: Vec<(String, usize)>,
    crud_profile: CrudProfile,
    operation_count: usize,
    run_time: Option<Duration>,
    user_count: usize,
    container_base: String,
    container_count: usize,
    post_template: Option<String>,
    delete_after_run: bool,
}

impl ScenarioBuilder {
    /// Adds a size class.
    pub fn size_class(mut self, size_class: SizeClass) -> Self {
        self.sizes.push(size_class);
        self
    }

    /// Number of objects of the given size class to create while priming the store.
    pub fn initial_files(mut self, size_class: impl Into<String>, count: usize) -> Self {
        self.initial_files.push((size_class.into(), count));
        self
    }

    /// The ratio between creates, reads, updates, deletes and posts.
    pub fn crud_profile(mut self, profile: CrudProfile) -> Self {
        self.crud_profile = profile;
        self
    }

    /// Number of jobs dispatched during the run phase.
    pub fn operation_count(mut self, count: usize) -> Self {
        self.operation_count = count;
        self
    }

    /// Stops the run phase after this much time, even if jobs are left.
    pub fn run_time(mut self, run_time: Duration) -> Self {
        self.run_time = Some(run_time);
        self
    }

    /// The maximum number of concurrent operations, at most [`u32::MAX`].
    pub fn user_count(mut self, user_count: usize) -> Self {
        self.user_count = user_count;
        self
    }

    /// Containers are named `{base}_{index:06}` for `index` in `0..count`.
    pub fn containers(mut self, base: impl Into<String>, count: usize) -> Self {
        self.container_base = base.into();
        self.container_count = count;
        self
    }

    /// Template for the contents of post jobs, with a single `%d` placeholder.
    pub fn post_template(mut self, template: impl Into<String>) -> Self {
        self.post_template = Some(template.into());
        self
    }

    /// Whether objects created during the run are deleted afterwards.
    pub fn delete_after_run(mut self, delete: bool) -> Self {
        self.delete_after_run = delete;
        self
    }

    /// Seeds the RNG for a reproducible job stream.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validates the configuration and creates the scenario.
    pub fn build(self) -> Result<Scenario, ScenarioError> {
        if self.sizes.is_empty() {
            return Err(ScenarioError::NoSizeClasses);
        }
        if self.container_count == 0 {
            return Err(ScenarioError::NoContainers);
        }
        if self.user_count == 0 {
            return Err(ScenarioError::NoUsers);
        }
        if u32::try_from(self.user_count).is_err() {
            return Err(ScenarioError::TooManyUsers(self.user_count));
        }

        let mut sizes: Vec<SizeClassState> = Vec::with_capacity(self.sizes.len());
        for size_class in self.sizes {
            if sizes.iter().any(|s| s.name == size_class.name) {
                return Err(ScenarioError::DuplicateSizeClass(size_class.name));
            }

            let sizes_dist = Uniform::new_inclusive(size_class.size_min, size_class.size_max)
                .map_err(|_| ScenarioError::InvalidSizeRange {
                    name: size_class.name.clone(),
                    min: size_class.size_min,
                    max: size_class.size_max,
                })?;

            let profile = size_class.crud_profile.unwrap_or(self.crud_profile);
            let operations = WeightedIndex::new(profile.weights()).map_err(|_| {
                ScenarioError::ZeroWeights(format!("the CRUD profile of `{}`", size_class.name))
            })?;

            sizes.push(SizeClassState {
                name: size_class.name,
                weight: size_class.weight,
                sizes: sizes_dist,
                operations,
                initial_files: 0,
            });
        }

        for (name, count) in self.initial_files {
            let Some(size_class) = sizes.iter_mut().find(|s| s.name == name) else {
                return Err(ScenarioError::UnknownSizeClass(name));
            };
            size_class.initial_files += count;
        }

        let size_distribution = WeightedIndex::new(sizes.iter().map(|s| s.weight))
            .map_err(|_| ScenarioError::ZeroWeights("the size classes".to_owned()))?;

        let post_template = self
            .post_template
            .as_deref()
            .map(ContentTemplate::parse)
            .transpose()?;

        Ok(Scenario {
            name: self.name,
            rng: SmallRng::seed_from_u64(self.seed),
            sizes,
            size_distribution,
            operation_count: self.operation_count,
            run_time: self.run_time,
            user_count: self.user_count,
            container_base: self.container_base,
            container_count: self.container_count,
            post_template,
            delete_after_run: self.delete_after_run,
            object_counter: 0,
        })
    }
}

#[derive(Debug)]
struct SizeClassState {
    name: String,
    weight: u32,
    sizes: Uniform<u64>,
    operations: WeightedIndex<u32>,
    initial_files: usize,
}

/// Specification of a benchmark run, producing the jobs to dispatch.
///
/// Jobs for reads, updates, deletes and posts only carry a size class. They need to be completed
/// by [`RunState::fill_in_job`](ssbench_core::RunState::fill_in_job) before they can be executed.
#[derive(Debug)]
pub struct Scenario {
    name: String,
    /// The RNG driving all our distributions.
    rng: SmallRng,
    sizes: Vec<SizeClassState>,
    /// Picks a size class for every run job.
    size_distribution: WeightedIndex<u32>,

    operation_count: usize,
    run_time: Option<Duration>,
    user_count: usize,

    container_base: String,
    container_count: usize,
    post_template: Option<ContentTemplate>,
    delete_after_run: bool,

    /// Shared by all size classes so object names are unique within the scenario.
    object_counter: u64,
}

impl Scenario {
    /// Constructs a new scenario builder with the given name.
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.into(),
            seed: rand::random(),
            sizes: Vec::new(),
            initial_files: Vec::new(),
            crud_profile: CrudProfile::default(),
            operation_count: 1000,
            run_time: None,
            user_count: 4,
            container_base: "ssbench".to_owned(),
            container_count: 100,
            post_template: None,
            delete_after_run: true,
        }
    }

    /// Name of the scenario for identification in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of jobs dispatched during the run phase.
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    /// Upper bound on the duration of the run phase.
    pub fn run_time(&self) -> Option<Duration> {
        self.run_time
    }

    /// The maximum number of concurrent operations.
    pub fn user_count(&self) -> usize {
        self.user_count
    }

    /// Template for the contents of post jobs.
    pub fn post_template(&self) -> Option<&ContentTemplate> {
        self.post_template.as_ref()
    }

    /// Whether objects created during the run are deleted afterwards.
    pub fn delete_after_run(&self) -> bool {
        self.delete_after_run
    }

    /// Names of all containers objects are created in.
    pub fn containers(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.container_count).map(|index| self.container_name(index))
    }

    fn container_name(&self, index: usize) -> String {
        format!("{}_{index:06}", self.container_base)
    }

    fn create_job(&mut self, size_index: usize, container: String) -> Job {
        self.object_counter += 1;
        let size_class = &self.sizes[size_index];
        let name = format!("{}_{:06}", size_class.name, self.object_counter);
        let size = size_class.sizes.sample(&mut self.rng);

        Job::new(Operation::Create)
            .with_size_class(size_class.name.clone())
            .with_target(container, name)
            .with_size(size)
    }

    /// Returns the creations that prime the store before the run phase.
    ///
    /// Jobs are interleaved across size classes in declaration order, and containers are
    /// assigned round-robin.
    pub fn initial_jobs(&mut self) -> Vec<Job> {
        let mut remaining: Vec<_> = self.sizes.iter().map(|s| s.initial_files).collect();
        let mut jobs = Vec::with_capacity(remaining.iter().sum());

        while remaining.iter().any(|&count| count > 0) {
            for size_index in 0..remaining.len() {
                if remaining[size_index] == 0 {
                    continue;
                }
                remaining[size_index] -= 1;

                let container = self.container_name(jobs.len() % self.container_count);
                jobs.push(self.create_job(size_index, container));
            }
        }

        jobs
    }

    /// Returns the next job of the run phase.
    pub fn next_job(&mut self) -> Job {
        let size_index = self.size_distribution.sample(&mut self.rng);
        let op = Operation::ALL[self.sizes[size_index].operations.sample(&mut self.rng)];

        match op {
            Operation::Create => {
                let index = self.rng.random_range(0..self.container_count);
                let container = self.container_name(index);
                self.create_job(size_index, container)
            }
            Operation::Update => {
                let size_class = &self.sizes[size_index];
                let size = size_class.sizes.sample(&mut self.rng);
                Job::new(op)
                    .with_size_class(size_class.name.clone())
                    .with_size(size)
            }
            Operation::Read | Operation::Delete | Operation::Post => {
                Job::new(op).with_size_class(self.sizes[size_index].name.clone())
            }
        }
    }
}
