//! Ambient namespace frames used for implicit connection resolution.
//!
//! Code that wants its database calls routed by namespace enters a frame for
//! its module path, either synchronously with [`enter_namespace`] (or the
//! [`namespace_scope!`](crate::namespace_scope) macro) or across an async
//! future with [`scope_namespace`]. The resolver then walks the frames from
//! the innermost outwards, see
//! [`NamespaceResolver::find_namespace_connection_name`](crate::NamespaceResolver::find_namespace_connection_name).
//!
//! Async code must run inside [`scope_namespace`]: a [`NamespaceGuard`]
//! held across an `.await` is only detached from the thread while the task is
//! suspended when the task is wrapped in a scope. Outside a scope the frame
//! stays on the thread and is visible to whatever else the executor polls
//! there.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

tokio::task_local! {
    static TASK_FRAMES: Vec<String>;
}

thread_local! {
    static THREAD_FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    // Thread frame depth at the start of the current task poll.
    static POLL_BASE: Cell<Option<usize>> = const { Cell::new(None) };
}

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
struct Frame {
    id: u64,
    namespace: String,
}

/// Guard that removes the namespace frame it pushed on drop.
///
/// Guards may be dropped in any order; each removes only its own frame. The
/// guard is `!Send` so it cannot be held across an `.await` in a spawned
/// task; use [`scope_namespace`] for async code.
#[must_use = "the namespace frame is popped as soon as the guard is dropped"]
pub struct NamespaceGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        // The frame is absent if the owning task was dropped while suspended.
        let _ = THREAD_FRAMES.try_with(|frames| {
            let mut frames = frames.borrow_mut();
            if let Some(pos) = frames.iter().rposition(|frame| frame.id == self.id) {
                frames.remove(pos);
            }
        });
    }
}

/// Enters a namespace frame for synchronous flows.
pub fn enter_namespace(namespace: impl Into<String>) -> NamespaceGuard {
    let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
    let frame = Frame {
        id,
        namespace: namespace.into(),
    };
    THREAD_FRAMES.with(|frames| frames.borrow_mut().push(frame));
    NamespaceGuard {
        id,
        _not_send: PhantomData,
    }
}

/// Runs `f` with `namespace` entered as the innermost frame.
pub fn with_namespace<T>(namespace: impl Into<String>, f: impl FnOnce() -> T) -> T {
    let _guard = enter_namespace(namespace);
    f()
}

/// Scopes a namespace frame across an async future.
///
/// The frames active where `scope_namespace` is called (task or thread) are
/// captured immediately, so a future handed to `tokio::spawn` keeps the
/// context of the code that spawned it. Nested scopes see their parents.
pub fn scope_namespace<F>(namespace: &str, fut: F) -> impl Future<Output = F::Output> + use<F>
where
    F: Future,
{
    let mut frames = current_frames(usize::MAX);
    frames.reverse();
    frames.push(namespace.to_string());
    TASK_FRAMES.scope(
        frames,
        PollBase {
            inner: Box::pin(fut),
            suspended: Vec::new(),
        },
    )
}

/// Returns the active namespace frames, innermost first, at most `limit` of
/// them.
///
/// Inside a [`scope_namespace`] future, synchronous frames entered by the task
/// come before the task's own frames.
pub fn current_frames(limit: usize) -> Vec<String> {
    let task_frames = TASK_FRAMES.try_with(|frames| frames.clone()).ok();
    THREAD_FRAMES.with(|thread_frames| {
        let thread_frames = thread_frames.borrow();
        let (base, task_frames) = match task_frames {
            Some(task_frames) => (POLL_BASE.with(Cell::get).unwrap_or(0), task_frames),
            None => (0, Vec::new()),
        };
        thread_frames[base.min(thread_frames.len())..]
            .iter()
            .rev()
            .map(|frame| frame.namespace.clone())
            .chain(task_frames.into_iter().rev())
            .take(limit)
            .collect()
    })
}

/// Innermost active namespace, if any.
pub fn current_namespace() -> Option<String> {
    current_frames(1).pop()
}

/// Separates the task's synchronous frames from the thread it is polled on.
///
/// Frames pushed by the task during a poll are taken off the thread when the
/// poll returns and put back at the start of the next one, so nothing the
/// task entered is visible while it is suspended, and frames of whatever
/// drives the task are not mistaken for the task's own.
struct PollBase<F> {
    inner: Pin<Box<F>>,
    suspended: Vec<Frame>,
}

impl<F: Future> Future for PollBase<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let base = THREAD_FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let base = frames.len();
            frames.append(&mut this.suspended);
            base
        });
        let previous = POLL_BASE.with(|slot| slot.replace(Some(base)));
        let out = this.inner.as_mut().poll(cx);
        POLL_BASE.with(|slot| slot.set(previous));
        THREAD_FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            if frames.len() > base {
                this.suspended = frames.split_off(base);
            }
        });
        out
    }
}

/// Enters a namespace frame for the calling module (`module_path!()`), or for
/// the given namespace expression. Bind the result to keep the frame alive:
///
/// ```
/// let _scope = conn_registry::namespace_scope!();
/// assert_eq!(
///     conn_registry::context::current_namespace().as_deref(),
///     Some(module_path!())
/// );
/// ```
#[macro_export]
macro_rules! namespace_scope {
    () => {
        $crate::context::enter_namespace(module_path!())
    };
    ($namespace:expr) => {
        $crate::context::enter_namespace($namespace)
    };
}
