use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    errors::Error,
    listen::{
        listener::{Listener, ListenerKind, Predicate},
        registry::{Completed, Completion, ListenerHandle, ListenerRegistry, Registration},
        scope::Scope,
    },
    messaging::types::IncomingUpdate,
    Result,
};

/// How a wait ended. Timeouts and cancellations are ordinary outcomes.
#[derive(Clone, Debug)]
pub enum WaitOutcome<T> {
    Resolved(T),
    Timeout,
    Cancelled,
}

impl<T> WaitOutcome<T> {
    pub fn resolved(self) -> Option<T> {
        match self {
            WaitOutcome::Resolved(v) => Some(v),
            WaitOutcome::Timeout | WaitOutcome::Cancelled => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitOutcome::Timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WaitOutcome<U> {
        match self {
            WaitOutcome::Resolved(v) => WaitOutcome::Resolved(f(v)),
            WaitOutcome::Timeout => WaitOutcome::Timeout,
            WaitOutcome::Cancelled => WaitOutcome::Cancelled,
        }
    }
}

/// The winner of a race.
#[derive(Clone, Debug)]
pub struct Raced {
    pub update: IncomingUpdate,
    pub kind: ListenerKind,
    pub handle: ListenerHandle,
}

/// One entry of a `listen_any` call.
#[derive(Clone)]
pub struct ListenSpec {
    pub kind: ListenerKind,
    pub scope: Scope,
    pub predicate: Option<Predicate>,
}

impl ListenSpec {
    pub fn new(kind: ListenerKind, scope: Scope) -> Self {
        Self {
            kind,
            scope,
            predicate: None,
        }
    }
}

enum Wake {
    Completed(Option<Completed>),
    Deadline,
    Cancelled,
}

/// Registers listeners and suspends the caller until they resolve.
#[derive(Clone)]
pub struct WaitCoordinator {
    registry: Arc<ListenerRegistry>,
}

impl WaitCoordinator {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Wait for one listener. `timeout: None` waits until resolved or cancelled.
    pub async fn wait_for(
        &self,
        listener: Listener,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome<IncomingUpdate>> {
        let outcome = self.wait_inner(vec![listener], timeout, None).await?;
        Ok(outcome.map(|r| r.update))
    }

    pub async fn wait_for_until_cancelled(
        &self,
        listener: Listener,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome<IncomingUpdate>> {
        let outcome = self.wait_inner(vec![listener], timeout, Some(cancel)).await?;
        Ok(outcome.map(|r| r.update))
    }

    /// Register all listeners together and return the first to resolve.
    ///
    /// Every other listener in the set is cancelled before this returns.
    pub async fn race_first(
        &self,
        listeners: Vec<Listener>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome<Raced>> {
        self.wait_inner(listeners, timeout, None).await
    }

    pub async fn race_first_until_cancelled(
        &self,
        listeners: Vec<Listener>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome<Raced>> {
        self.wait_inner(listeners, timeout, Some(cancel)).await
    }

    pub async fn listen(
        &self,
        kind: ListenerKind,
        scope: Scope,
        predicate: Option<Predicate>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome<IncomingUpdate>> {
        let listener = Listener::new(kind, scope).with_predicate(predicate);
        self.wait_for(listener, timeout).await
    }

    pub async fn listen_any(
        &self,
        specs: Vec<ListenSpec>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome<(IncomingUpdate, ListenerKind)>> {
        let listeners = specs
            .into_iter()
            .map(|s| Listener::new(s.kind, s.scope).with_predicate(s.predicate))
            .collect();
        let outcome = self.race_first(listeners, timeout).await?;
        Ok(outcome.map(|r| (r.update, r.kind)))
    }

    /// Cancel every pending listener covered by `scope`; each waiter sees `Cancelled`.
    pub fn cancel_all(&self, scope: &Scope) -> usize {
        self.registry.cancel_all(scope)
    }

    /// Callback-style wait: run `handler` with the matched update in a new task.
    ///
    /// The handler is not called on timeout or cancellation.
    pub fn next_step<F, Fut>(
        &self,
        listener: Listener,
        timeout: Option<Duration>,
        handler: F,
    ) -> JoinHandle<Result<WaitOutcome<()>>>
    where
        F: FnOnce(IncomingUpdate) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let coordinator = self.clone();
        tokio::spawn(async move {
            match coordinator.wait_for(listener, timeout).await? {
                WaitOutcome::Resolved(update) => {
                    handler(update).await;
                    Ok(WaitOutcome::Resolved(()))
                }
                WaitOutcome::Timeout => Ok(WaitOutcome::Timeout),
                WaitOutcome::Cancelled => Ok(WaitOutcome::Cancelled),
            }
        })
    }

    /// Register listeners now and return a handle to wait on later.
    ///
    /// Lets a caller register before sending the prompt it expects an answer
    /// to. A zero `timeout` registers nothing and the wait reports `Timeout`.
    pub fn begin(
        &self,
        listeners: Vec<Listener>,
        timeout: Option<Duration>,
    ) -> Result<PendingWait<'_>> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Ok(PendingWait {
                registry: &self.registry,
                handles: Vec::new(),
                completions: None,
                deadline: None,
            });
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let Registration {
            handles,
            completions,
        } = self.registry.register_all(listeners, deadline)?;
        Ok(PendingWait {
            registry: &self.registry,
            handles,
            completions: Some(completions),
            deadline,
        })
    }

    async fn wait_inner(
        &self,
        listeners: Vec<Listener>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<WaitOutcome<Raced>> {
        self.begin(listeners, timeout)?.finish(cancel).await
    }
}

/// Registered listeners not yet waited on.
///
/// Dropping it (or the future waiting on it) cancels whatever is still pending.
pub struct PendingWait<'a> {
    registry: &'a ListenerRegistry,
    handles: Vec<ListenerHandle>,
    completions: Option<UnboundedReceiver<Completed>>,
    deadline: Option<Instant>,
}

impl PendingWait<'_> {
    pub fn handles(&self) -> &[ListenerHandle] {
        &self.handles
    }

    pub async fn wait(self) -> Result<WaitOutcome<Raced>> {
        self.finish(None).await
    }

    pub async fn wait_until_cancelled(
        self,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome<Raced>> {
        self.finish(Some(cancel)).await
    }

    async fn finish(mut self, cancel: Option<&CancellationToken>) -> Result<WaitOutcome<Raced>> {
        let Some(mut completions) = self.completions.take() else {
            return Ok(WaitOutcome::Timeout);
        };

        // Deadline and cancellation are checked first; a resolution that
        // committed earlier still wins because it is queued ahead of our own
        // transition.
        let wake = tokio::select! {
            biased;
            _ = cancelled(cancel) => Wake::Cancelled,
            _ = until(self.deadline) => Wake::Deadline,
            done = completions.recv() => Wake::Completed(done),
        };

        let first = match wake {
            Wake::Completed(done) => done,
            Wake::Deadline => {
                self.registry.expire(&self.handles);
                first_queued(&mut completions)
            }
            Wake::Cancelled => {
                self.registry.cancel_many(&self.handles);
                first_queued(&mut completions)
            }
        };

        // Losers leave the pending set before the winner is handed back.
        self.registry.cancel_many(&self.handles);

        let Some(first) = first else {
            warn!("listener completion channel closed without a result");
            return Ok(WaitOutcome::Cancelled);
        };

        match first.completion {
            Completion::Resolved(update) => {
                let kind = ListenerKind::of(&update);
                let registered = self.handles.iter().any(|h| *h == first.handle);
                if !registered || first.handle.kind() != kind {
                    return Err(Error::UnexpectedEventKind(format!(
                        "listener {} ({:?}) resolved with a {:?} update",
                        first.handle.id(),
                        first.handle.kind(),
                        kind
                    )));
                }
                debug!(listener = first.handle.id(), ?kind, "wait resolved");
                Ok(WaitOutcome::Resolved(Raced {
                    update,
                    kind,
                    handle: first.handle,
                }))
            }
            Completion::Expired => Ok(WaitOutcome::Timeout),
            Completion::Cancelled => Ok(WaitOutcome::Cancelled),
        }
    }
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.registry.cancel_many(&self.handles);
        }
    }
}

fn first_queued(completions: &mut UnboundedReceiver<Completed>) -> Option<Completed> {
    completions.try_recv().ok()
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending().await,
    }
}
