//! Job descriptors and result records exchanged with the benchmark driver.
//!
//! Both [`Job`] and [`OperationResult`] serialize with the field names used by the rest of the
//! harness (`type`, `size_str`, `container`, `name`, ...). Fields this crate does not interpret
//! are kept in an open `extra` map, so a job passes through [`RunState::fill_in_job`] without
//! losing anything the caller attached to it.
//!
//! [`RunState::fill_in_job`]: crate::RunState::fill_in_job

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of storage operation a job or result refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Upload a new object.
    #[serde(rename = "upload_object")]
    Create,
    /// Download an existing object.
    #[serde(rename = "get_object")]
    Read,
    /// Overwrite an existing object with new contents.
    #[serde(rename = "update_object")]
    Update,
    /// Permanently remove an existing object.
    #[serde(rename = "delete_object")]
    Delete,
    /// Post synthetic contents that are not tracked afterwards.
    #[serde(rename = "post_object")]
    Post,
}

impl Operation {
    /// All operations, in CRUD profile order.
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::Post,
    ];

    /// Returns the wire name of this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "upload_object",
            Operation::Read => "get_object",
            Operation::Update => "update_object",
            Operation::Delete => "delete_object",
            Operation::Post => "post_object",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object believed to exist in the target store.
///
/// `initial` is `true` for objects created while priming the store. Those survive
/// [`RunState::extract_cleanup_targets`](crate::RunState::extract_cleanup_targets).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// The container holding the object.
    pub container: String,
    /// The object name within its container.
    pub name: String,
    /// Whether the object was created during the priming phase.
    pub initial: bool,
}

impl ObjectInfo {
    /// Creates a new object record.
    pub fn new(container: impl Into<String>, name: impl Into<String>, initial: bool) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
            initial,
        }
    }
}

/// A job descriptor, either partially specified by the caller or filled in by the registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The operation to perform.
    #[serde(rename = "type")]
    pub op: Operation,
    /// The size-class label. Required for everything except creations.
    #[serde(rename = "size_str", default, skip_serializing_if = "Option::is_none")]
    pub size_class: Option<String>,
    /// Target container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Target object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Payload size for creations and updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Synthetic contents of a post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    /// Caller-supplied fields that are echoed back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Job {
    /// Creates a bare job for the given operation.
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            size_class: None,
            container: None,
            name: None,
            size: None,
            contents: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the size-class label.
    pub fn with_size_class(mut self, size_class: impl Into<String>) -> Self {
        self.size_class = Some(size_class.into());
        self
    }

    /// Sets the target container and object name.
    pub fn with_target(mut self, container: impl Into<String>, name: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self.name = Some(name.into());
        self
    }

    /// Sets the payload size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Attaches an opaque caller-supplied field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The outcome of one storage operation, as reported by whoever executed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// The operation that was performed.
    #[serde(rename = "type")]
    pub op: Operation,
    /// The size-class label of the job.
    #[serde(rename = "size_str", default)]
    pub size_class: String,
    /// The container the operation targeted.
    #[serde(default)]
    pub container: String,
    /// The object name the operation targeted.
    #[serde(default)]
    pub name: String,
    /// Number of bytes transferred, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Present if the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Timing and other fields that only matter to statistics consumers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OperationResult {
    /// Creates a successful result for the given target.
    pub fn success(
        op: Operation,
        size_class: impl Into<String>,
        container: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            op,
            size_class: size_class.into(),
            container: container.into(),
            name: name.into(),
            size: None,
            exception: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the transferred size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Marks the result as failed.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Returns `true` if the result carries a failure marker.
    pub fn is_failure(&self) -> bool {
        self.exception.is_some()
    }
}
