//! Deployment lifecycle events.
//!
//! The deployer reports each step of a stack's deployment to an
//! [`EventSink`]. Event names are dotted, with the subject first.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// A stack's deployment started.
pub const STACK_STARTED: &str = "stack.started";
/// A new stack was created and stabilized.
pub const STACK_CREATED: &str = "stack.created";
/// A stack's deployment finished successfully.
pub const STACK_COMPLETED: &str = "stack.completed";
/// A stack's deployment failed.
pub const STACK_FAILED: &str = "stack.failed";
/// A change set was submitted.
pub const CHANGE_SET_CREATED: &str = "changeset.created";
/// A change set is ready and was left unexecuted.
pub const CHANGE_SET_PLANNED: &str = "changeset.planned";
/// A change set was executed and the update stabilized.
pub const CHANGE_SET_EXECUTED: &str = "changeset.executed";
/// A change set contained no changes.
pub const CHANGE_SET_EMPTY: &str = "changeset.empty";
/// A failed change set was deleted.
pub const CHANGE_SET_DELETED: &str = "changeset.deleted";
/// A scheduler run finished.
pub const RUN_COMPLETED: &str = "run.completed";
