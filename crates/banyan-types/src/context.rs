//! Request context: principal carrier plus cooperative cancellation.
//!
//! Every long-running kernel operation and every lifecycle callback takes a
//! [`Context`]. It plays two roles:
//!
//! - **Ambient identity**: privileged operations read the acting
//!   [`Principal`] from the context. Absence of a principal is a security
//!   error at the call site, never an anonymous fallback.
//! - **Cooperative cancellation**: cloned contexts share one cancellation
//!   flag. [`Context::cancel`] flips it; blocking work observes it either
//!   synchronously via [`Context::is_cancelled`] or asynchronously via
//!   [`Context::cancelled`].
//!
//! Deadlines are not part of the context; the kernel bounds individual
//! lifecycle calls with timeouts at the call site.
//!
//! # Example
//!
//! ```
//! use banyan_types::{Context, Principal};
//!
//! let ctx = Context::new().with_principal(Principal::system("dev"));
//! assert_eq!(ctx.principal().unwrap().id(), "dev");
//!
//! let child = ctx.clone();
//! ctx.cancel();
//! assert!(child.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::Principal;

/// Shared cancellation state for a context tree.
#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Request-scoped value carrier.
///
/// Cloning is cheap (two `Arc` bumps). Clones share the cancellation flag;
/// the principal is fixed per clone and replaced, not mutated, by
/// [`with_principal`](Self::with_principal).
#[derive(Debug, Clone, Default)]
pub struct Context {
    principal: Option<Arc<Principal>>,
    cancel: Arc<CancelState>,
}

impl Context {
    /// Creates an empty context: no principal, not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context carrying the given principal.
    ///
    /// Cancellation state is shared with `self`, so cancelling either
    /// context cancels both.
    #[must_use]
    pub fn with_principal(&self, principal: Principal) -> Self {
        Self {
            principal: Some(Arc::new(principal)),
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Returns the principal carried by this context, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    /// Marks this context (and every clone sharing its state) as cancelled.
    ///
    /// Idempotent; waiters blocked in [`cancelled`](Self::cancelled) are
    /// woken.
    pub fn cancel(&self) {
        self.cancel.cancelled.store(true, Ordering::SeqCst);
        self.cancel.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves when the context is cancelled.
    ///
    /// Returns immediately if cancellation already happened. Intended for
    /// `tokio::select!` against in-flight work.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.cancel.notify.notified();
            // Re-check after registering the waiter so a cancel between the
            // first check and registration cannot be missed.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_context_has_no_principal() {
        let ctx = Context::new();
        assert!(ctx.principal().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn with_principal_carries_identity() {
        let ctx = Context::new().with_principal(Principal::new("alice", "user", ["admin"]));

        let p = ctx.principal().expect("principal present");
        assert_eq!(p.id(), "alice");
        assert_eq!(p.roles(), ["admin"]);
    }

    #[test]
    fn with_principal_replaces_previous() {
        let ctx = Context::new()
            .with_principal(Principal::new("a", "user", Vec::<String>::new()))
            .with_principal(Principal::new("b", "user", Vec::<String>::new()));

        assert_eq!(ctx.principal().unwrap().id(), "b");
    }

    #[test]
    fn cancellation_is_shared_across_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();
        let derived = ctx.with_principal(Principal::system("sys"));

        ctx.cancel();

        assert!(clone.is_cancelled());
        assert!(derived.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let ctx = Context::new();
        ctx.cancel();
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_if_already_cancelled() {
        let ctx = Context::new();
        ctx.cancel();
        ctx.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_waiter() {
        let ctx = Context::new();
        let waiter = ctx.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter woke")
            .expect("task succeeded");
    }
}
