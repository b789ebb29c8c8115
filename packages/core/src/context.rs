//! Processing context: cancellation, deadlines and the published file system.
//!
//! A [`Context`] is an immutable value. Every `with_*` call derives a new
//! child context; the parent is never modified. A file system published on
//! a child is visible to that child's descendants only, and a child binding
//! shadows the parent's for the same lineage.
//!
//! Cancelling a context cancels every context derived from it. Cancelling
//! a child leaves the parent running.
//!
//! ```rust,ignore
//! use unifs_core::Context;
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! let ctx = ctx.with_file_system(fs);
//!
//! let fs = ctx.file_system().expect("published above");
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{Error, FileSystemRef};

/// Shared cancellation state, linked parent to children.
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancelState>>>,
}

impl CancelState {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        let children: Vec<_> = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn child(self: &Arc<Self>) -> Arc<CancelState> {
        let child = Arc::new(CancelState::new());
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            child.cancelled.store(true, Ordering::SeqCst);
        } else {
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        child
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Clone)]
struct Inner {
    file_system: Option<FileSystemRef>,
    deadline: Option<Instant>,
    cancel: Arc<CancelState>,
}

/// Explicit processing context passed through resolution and every
/// file system operation.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

/// Cancels the context returned alongside it by [`Context::with_cancel`].
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Cancel the context and all of its descendants.
    pub fn cancel(&self) {
        self.state.cancel();
    }
}

impl Context {
    /// The root context: never cancelled, no deadline, nothing published.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                file_system: None,
                deadline: None,
                cancel: Arc::new(CancelState::new()),
            }),
        }
    }

    fn derive(&self, f: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = (*self.inner).clone();
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Derive a context that carries `fs`.
    pub fn with_file_system(&self, fs: FileSystemRef) -> Self {
        self.derive(|inner| inner.file_system = Some(fs))
    }

    /// The nearest file system published on this context's lineage.
    pub fn file_system(&self) -> Option<FileSystemRef> {
        self.inner.file_system.clone()
    }

    /// Derive a cancellable context.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let state = self.inner.cancel.child();
        let handle = CancelHandle {
            state: state.clone(),
        };
        (self.derive(|inner| inner.cancel = state), handle)
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// A deadline later than the parent's has no effect.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(|inner| {
            inner.deadline = Some(match inner.deadline {
                Some(current) => current.min(deadline),
                None => deadline,
            })
        })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Why the context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if self.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// `Err` with [`err`](Self::err) when the context is done.
    pub fn check(&self) -> Result<(), Error> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or past its deadline.
    pub async fn done(&self) -> Error {
        tokio::select! {
            _ = self.inner.cancel.cancelled() => Error::Cancelled,
            _ = sleep_until(self.inner.deadline) => Error::DeadlineExceeded,
        }
    }

    /// Drive `fut` unless the context finishes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field(
                "file_system",
                &self.inner.file_system.as_ref().map(|fs| fs.name()),
            )
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Publish `fs` on a derived context.
pub fn inject(ctx: &Context, fs: FileSystemRef) -> Context {
    ctx.with_file_system(fs)
}

/// Look up the file system published on `ctx`.
pub fn retrieve(ctx: &Context) -> Option<FileSystemRef> {
    ctx.file_system()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFileSystem;
    use std::sync::Arc;

    fn named(name: &'static str) -> FileSystemRef {
        Arc::new(MemoryFileSystem::named(name))
    }

    #[test]
    fn background_has_nothing_published() {
        let ctx = Context::background();
        assert!(ctx.file_system().is_none());
        assert!(ctx.err().is_none());
    }

    #[test]
    fn child_sees_binding_parent_does_not() {
        let root = Context::background();
        let child = root.with_file_system(named("a"));
        let grandchild = child.with_timeout(Duration::from_secs(60));

        assert!(root.file_system().is_none());
        assert_eq!(child.file_system().unwrap().name(), "a");
        assert_eq!(grandchild.file_system().unwrap().name(), "a");
    }

    #[test]
    fn nested_binding_shadows_without_mutating_outer() {
        let outer = Context::background().with_file_system(named("outer"));
        let inner = outer.with_file_system(named("inner"));
        let sibling = outer.with_file_system(named("sibling"));

        assert_eq!(outer.file_system().unwrap().name(), "outer");
        assert_eq!(inner.file_system().unwrap().name(), "inner");
        assert_eq!(sibling.file_system().unwrap().name(), "sibling");
    }

    #[test]
    fn inject_and_retrieve_mirror_methods() {
        let ctx = inject(&Context::background(), named("m"));
        assert_eq!(retrieve(&ctx).unwrap().name(), "m");
    }

    #[test]
    fn cancel_propagates_down_not_up() {
        let (parent, cancel_parent) = Context::background().with_cancel();
        let (child, cancel_child) = parent.with_cancel();
        let (grandchild, _) = child.with_cancel();

        cancel_child.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());

        let (other, _) = parent.with_cancel();
        cancel_parent.cancel();
        assert!(other.is_cancelled());
        assert!(matches!(other.err(), Some(Error::Cancelled)));
    }

    #[test]
    fn child_of_cancelled_context_starts_cancelled() {
        let (parent, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let (child, _) = parent.with_cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn deadline_never_extends() {
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let later = ctx.with_timeout(Duration::from_secs(100));
        assert_eq!(ctx.deadline(), later.deadline());
    }

    #[tokio::test]
    async fn run_returns_future_result() {
        let ctx = Context::background();
        let value = ctx.run(async { Ok::<_, Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn run_fails_fast_when_cancelled() {
        let (ctx, cancel) = Context::background().with_cancel();
        let task = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.run(async {
                    std::future::pending::<()>().await;
                    Ok::<_, Error>(())
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn run_fails_on_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(async {
                std::future::pending::<()>().await;
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }
}
