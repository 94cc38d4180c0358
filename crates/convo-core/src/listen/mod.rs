//! Request/response waits over the push-based update stream.
//!
//! A caller registers a listener (kind + scope + optional predicate) and
//! suspends; the transport feeds every update through [`DispatchHook`], which
//! resolves at most one pending listener per update.

pub mod coordinator;
pub mod hook;
pub mod listener;
pub mod registry;
pub mod scope;

pub use coordinator::{ListenSpec, Raced, WaitCoordinator, WaitOutcome};
pub use hook::{DispatchHook, HookOutcome};
pub use listener::{Listener, ListenerKind, ListenerState, Predicate, UnallowedClick};
pub use registry::{
    Completed, Completion, DispatchResult, ListenerHandle, ListenerRegistry, Registration,
    UnallowedClickNotice,
};
pub use scope::{EventKey, Scope};
