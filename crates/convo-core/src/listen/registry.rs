//! The set of pending listeners and the matching pass over incoming updates.
//!
//! All state transitions (resolve, expire, cancel) happen under one lock and
//! remove the entry in the same critical section, so a listener leaves
//! `Pending` exactly once. Each transition is reported on the listener's
//! completion channel while the lock is still held; a receiver therefore sees
//! completions in commit order.
//!
//! Listeners registered together form a group: resolving one cancels the
//! rest of its group in the same critical section.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    domain::UserId,
    errors::Error,
    listen::{
        listener::{Listener, ListenerKind, ListenerState, UnallowedClick},
        scope::{EventKey, Scope},
    },
    messaging::types::IncomingUpdate,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    kind: ListenerKind,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }
}

/// Terminal transition of a listener.
#[derive(Clone, Debug)]
pub enum Completion {
    Resolved(IncomingUpdate),
    Cancelled,
    Expired,
}

impl Completion {
    pub fn state(&self) -> ListenerState {
        match self {
            Completion::Resolved(_) => ListenerState::Resolved,
            Completion::Cancelled => ListenerState::Cancelled,
            Completion::Expired => ListenerState::Expired,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Completed {
    pub handle: ListenerHandle,
    pub completion: Completion,
}

/// Listeners registered together share one completion channel and race:
/// the first to resolve cancels the others.
#[derive(Debug)]
pub struct Registration {
    pub handles: Vec<ListenerHandle>,
    pub completions: mpsc::UnboundedReceiver<Completed>,
}

/// A button press rejected on user identity by the closest pending listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnallowedClickNotice {
    pub handle: ListenerHandle,
    pub callback_id: String,
    pub user_id: UserId,
    pub text: Option<String>,
    pub show_alert: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchResult {
    Matched(ListenerHandle),
    Unallowed(UnallowedClickNotice),
    NoMatch,
}

struct Entry {
    handle: ListenerHandle,
    group: u64,
    listener: Listener,
    deadline: Option<Instant>,
    notify: mpsc::UnboundedSender<Completed>,
}

impl Entry {
    fn complete(self, completion: Completion) {
        // The waiter may already be gone; nothing to wake then.
        let _ = self.notify.send(Completed {
            handle: self.handle,
            completion,
        });
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    next_group: u64,
    /// Registration order.
    pending: Vec<Entry>,
    /// Lower bound on the earliest pending deadline; may be stale after removals.
    next_deadline: Option<Instant>,
}

impl RegistryState {
    fn take_where(&mut self, pred: impl FnMut(&Entry) -> bool) -> Vec<Entry> {
        let (taken, kept): (Vec<Entry>, Vec<Entry>) =
            std::mem::take(&mut self.pending).into_iter().partition(pred);
        self.pending = kept;
        taken
    }

    fn track_deadline(&mut self, deadline: Option<Instant>) {
        if let Some(d) = deadline {
            self.next_deadline = Some(self.next_deadline.map_or(d, |n| n.min(d)));
        }
    }

    /// Expire listeners past their deadline, but only scan once one is due.
    fn sweep_due(&mut self, now: Instant) -> usize {
        if self.next_deadline.is_some_and(|d| d <= now) {
            self.sweep(now)
        } else {
            0
        }
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.take_where(|e| e.deadline.is_some_and(|d| d <= now));
        let n = expired.len();
        for entry in expired {
            debug!(listener = entry.handle.id, "listener expired");
            entry.complete(Completion::Expired);
        }
        self.next_deadline = self.pending.iter().filter_map(|e| e.deadline).min();
        n
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panicking predicate must not take the whole registry down.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, listener: Listener, deadline: Option<Instant>) -> Result<Registration> {
        self.register_all(vec![listener], deadline)
    }

    /// Register a group of listeners in one critical section.
    ///
    /// Either all of them become pending or none do.
    pub fn register_all(
        &self,
        listeners: Vec<Listener>,
        deadline: Option<Instant>,
    ) -> Result<Registration> {
        if listeners.is_empty() {
            return Err(Error::InvalidScope("no listeners to register".to_string()));
        }
        if let Some(l) = listeners
            .iter()
            .find(|l| l.require_scope && l.scope.is_wildcard())
        {
            return Err(Error::InvalidScope(format!(
                "{:?} listener has no chat, user or message constraint",
                l.kind
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(listeners.len());

        let mut st = self.lock();
        st.sweep_due(Instant::now());
        st.next_group += 1;
        let group = st.next_group;
        st.track_deadline(deadline);
        for listener in listeners {
            st.next_id += 1;
            let handle = ListenerHandle {
                id: st.next_id,
                kind: listener.kind,
            };
            debug!(
                listener = handle.id,
                kind = ?handle.kind,
                scope = ?listener.scope,
                "listener registered"
            );
            st.pending.push(Entry {
                handle,
                group,
                listener,
                deadline,
                notify: tx.clone(),
            });
            handles.push(handle);
        }

        Ok(Registration {
            handles,
            completions: rx,
        })
    }

    /// Remove a pending listener. No-op once it has left `Pending`.
    pub fn cancel(&self, handle: ListenerHandle) -> bool {
        self.cancel_many(&[handle]) > 0
    }

    pub fn cancel_many(&self, handles: &[ListenerHandle]) -> usize {
        self.finish(handles, Completion::Cancelled)
    }

    /// Expire listeners now, regardless of their deadline.
    pub fn expire(&self, handles: &[ListenerHandle]) -> usize {
        self.finish(handles, Completion::Expired)
    }

    fn finish(&self, handles: &[ListenerHandle], completion: Completion) -> usize {
        let mut st = self.lock();
        let taken = st.take_where(|e| handles.contains(&e.handle));
        let n = taken.len();
        for entry in taken {
            debug!(listener = entry.handle.id, state = ?completion.state(), "listener finished");
            entry.complete(completion.clone());
        }
        n
    }

    /// Cancel every pending listener whose scope is covered by `scope`.
    pub fn cancel_all(&self, scope: &Scope) -> usize {
        let mut st = self.lock();
        let taken = st.take_where(|e| scope.covers(&e.listener.scope));
        let n = taken.len();
        for entry in taken {
            entry.complete(Completion::Cancelled);
        }
        if n > 0 {
            debug!(cancelled = n, ?scope, "cancelled listeners by scope");
        }
        n
    }

    pub fn sweep_expired(&self) -> usize {
        self.lock().sweep_due(Instant::now())
    }

    /// Match one update against the pending set.
    ///
    /// Resolves at most one listener: the earliest-registered one of the same
    /// kind whose scope and predicate accept the update. The other members of
    /// its registration group are cancelled along with it. Expired listeners
    /// are swept first and never match.
    pub fn dispatch(&self, update: &IncomingUpdate) -> DispatchResult {
        let kind = ListenerKind::of(update);
        let key = EventKey::of(update);

        let mut st = self.lock();
        st.sweep_due(Instant::now());

        let hit = st.pending.iter().position(|e| {
            e.handle.kind == kind && e.listener.scope.matches(&key) && e.listener.accepts(update)
        });
        if let Some(pos) = hit {
            let entry = st.pending.remove(pos);
            let handle = entry.handle;
            let group = entry.group;
            debug!(listener = handle.id, "listener resolved");
            entry.complete(Completion::Resolved(update.clone()));

            // Race losers leave before the next update can reach them.
            for sibling in st.take_where(|e| e.group == group) {
                debug!(listener = sibling.handle.id, "race sibling cancelled");
                sibling.complete(Completion::Cancelled);
            }
            return DispatchResult::Matched(handle);
        }

        let IncomingUpdate::Callback(q) = update else {
            return DispatchResult::NoMatch;
        };
        let closest = st.pending.iter().find(|e| {
            e.handle.kind == ListenerKind::CallbackQuery
                && e.listener.scope.matches_location(&key)
                && !e.listener.scope.accepts_user(key.user_id)
        });
        match closest {
            Some(Entry {
                handle,
                listener:
                    Listener {
                        unallowed: UnallowedClick::Alert { text, show_alert },
                        ..
                    },
                ..
            }) => DispatchResult::Unallowed(UnallowedClickNotice {
                handle: *handle,
                callback_id: q.callback_id.clone(),
                user_id: q.user_id,
                text: text.clone(),
                show_alert: *show_alert,
            }),
            _ => DispatchResult::NoMatch,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_pending(&self, handle: ListenerHandle) -> bool {
        self.lock().pending.iter().any(|e| e.handle == handle)
    }

    /// Periodically expire listeners past their deadline until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        registry.sweep_expired();
                    }
                }
            }
        })
    }
}
