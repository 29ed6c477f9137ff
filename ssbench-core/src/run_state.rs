//! The shared registry of objects known to exist in the target store.
//!
//! [`RunState`] keeps one FIFO queue of [`ObjectInfo`]s per size class. Successful creations
//! append to the tail of their size class. Reads and updates rotate the head record to the tail so
//! repeated operations spread across all known objects. Deletes consume the head record for good.
//! Posts never touch the queues.
//!
//! All state sits behind a single mutex. Every operation holds it for its whole pop, rotate and
//! append sequence, so no caller can observe a record that is popped but not yet re-appended.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::records::{Job, ObjectInfo, Operation, OperationResult};
use crate::template::{ContentTemplate, TemplateError};

/// Initial value of the post counter. The first post fill renders `DEFAULT_POST_COUNTER + 1`.
pub const DEFAULT_POST_COUNTER: u64 = 1;

/// Registry of objects per size class, shared by all workers of a benchmark run.
#[derive(Debug)]
pub struct RunState {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Queues in the order their size class was first seen.
    objs_by_size: IndexMap<String, VecDeque<ObjectInfo>>,
    job_template: Option<ContentTemplate>,
    post_counter: u64,
}

impl RunState {
    /// Creates an empty registry without a job template.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                objs_by_size: IndexMap::new(),
                job_template: None,
                post_counter: DEFAULT_POST_COUNTER,
            }),
        }
    }

    /// Creates an empty registry that renders post contents from `template`.
    pub fn with_job_template(template: ContentTemplate) -> Self {
        let state = Self::new();
        state.lock().job_template = Some(template);
        state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves the queues consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parses and installs the template used for post contents.
    ///
    /// An empty string clears the template, after which post fills are absent again.
    pub fn set_job_template(&self, template: &str) -> Result<(), TemplateError> {
        let template = match template {
            "" => None,
            raw => Some(ContentTemplate::parse(raw)?),
        };
        self.lock().job_template = template;
        Ok(())
    }

    /// Removes the post content template.
    pub fn clear_job_template(&self) {
        self.lock().job_template = None;
    }

    /// Returns the currently installed post content template.
    pub fn job_template(&self) -> Option<ContentTemplate> {
        self.lock().job_template.clone()
    }

    /// Returns the current value of the post counter.
    pub fn post_counter(&self) -> u64 {
        self.lock().post_counter
    }

    /// Resets the post counter. The next post fill renders `value + 1`.
    pub fn reset_post_counter(&self, value: u64) {
        self.lock().post_counter = value;
    }

    /// Records the result of an operation performed while priming the store.
    ///
    /// Only successful creations are tracked. They are retained by cleanup extraction.
    pub fn ingest_initialization_result(&self, result: &OperationResult) {
        self.ingest(result, true);
    }

    /// Records the result of an operation performed during the timed run.
    ///
    /// Only successful creations are tracked. They are returned by cleanup extraction.
    pub fn ingest_run_result(&self, result: &OperationResult) {
        self.ingest(result, false);
    }

    fn ingest(&self, result: &OperationResult, initial: bool) {
        if result.op != Operation::Create {
            return;
        }
        if let Some(exception) = &result.exception {
            tracing::debug!(
                size_class = %result.size_class,
                container = %result.container,
                name = %result.name,
                %exception,
                "not tracking failed creation",
            );
            return;
        }

        let info = ObjectInfo::new(&*result.container, &*result.name, initial);
        self.lock()
            .objs_by_size
            .entry(result.size_class.clone())
            .or_default()
            .push_back(info);
    }

    /// Completes a job with a target object, or returns `None` if no valid target exists.
    ///
    /// - Creations are returned unchanged.
    /// - Deletes take the head object of the size class and do not return it to the pool.
    /// - Reads and updates take the head object and move it to the tail.
    /// - Posts ignore the pool. They are filled with empty container and name and contents
    ///   rendered from the job template, or are absent if no template is installed or the post
    ///   counter is exhausted.
    ///
    /// All other fields of the job are passed through untouched.
    pub fn fill_in_job(&self, mut job: Job) -> Option<Job> {
        match job.op {
            Operation::Create => Some(job),
            Operation::Post => {
                let mut inner = self.lock();
                let Inner {
                    job_template,
                    post_counter,
                    ..
                } = &mut *inner;
                let template = job_template.as_ref()?;
                let Some(next) = post_counter.checked_add(1) else {
                    tracing::warn!("post counter exhausted");
                    return None;
                };
                *post_counter = next;

                job.container = Some(String::new());
                job.name = Some(String::new());
                job.contents = Some(template.render(*post_counter));
                Some(job)
            }
            op @ (Operation::Read | Operation::Update | Operation::Delete) => {
                let size_class = job.size_class.as_deref()?;

                let mut inner = self.lock();
                let Some(queue) = inner.objs_by_size.get_mut(size_class) else {
                    tracing::trace!(size_class, %op, "no objects of unknown size class");
                    return None;
                };
                let Some(info) = queue.pop_front() else {
                    tracing::trace!(size_class, %op, "no objects left in size class");
                    return None;
                };

                job.container = Some(info.container.clone());
                job.name = Some(info.name.clone());
                if op != Operation::Delete {
                    queue.push_back(info);
                }
                Some(job)
            }
        }
    }

    /// Removes and returns every object created during the timed run.
    ///
    /// Size classes are visited in the order they were first seen and objects keep their queue
    /// order. Objects created while priming stay in place, in their original order. Calling this
    /// again only yields run objects ingested since the previous call.
    pub fn extract_cleanup_targets(&self) -> Vec<ObjectInfo> {
        let mut inner = self.lock();
        let mut targets = Vec::new();

        for queue in inner.objs_by_size.values_mut() {
            let (initial, run): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|info| info.initial);
            *queue = initial;
            targets.extend(run);
        }

        tracing::debug!(count = targets.len(), "extracted cleanup targets");
        targets
    }

    /// Returns the number of objects currently tracked for `size_class`.
    pub fn len(&self, size_class: &str) -> usize {
        self.lock()
            .objs_by_size
            .get(size_class)
            .map_or(0, VecDeque::len)
    }

    /// Returns `true` if no objects are tracked in any size class.
    pub fn is_empty(&self) -> bool {
        self.lock().objs_by_size.values().all(VecDeque::is_empty)
    }

    /// Returns all size classes seen so far, in first-seen order.
    pub fn size_classes(&self) -> Vec<String> {
        self.lock().objs_by_size.keys().cloned().collect()
    }

    /// Returns a copy of all queues, in first-seen order of their size classes.
    pub fn snapshot(&self) -> IndexMap<String, Vec<ObjectInfo>> {
        self.lock()
            .objs_by_size
            .iter()
            .map(|(size_class, queue)| (size_class.clone(), queue.iter().cloned().collect()))
            .collect()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
