//! Ambient deadline/priority carried through a call chain without a global.

use std::future::Future;

use crate::deadline::Deadline;
use crate::priority::Priority;

/// A snapshot of the ambient deadline/priority in effect for the current call.
///
/// `None` in either field means "nothing ambient set" rather than "expired" or
/// "normal" — the caller of [`CallContext::current`] decides the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    pub deadline: Option<Deadline>,
    pub priority: Option<Priority>,
}

impl CallContext {
    pub fn new(deadline: Option<Deadline>, priority: Option<Priority>) -> Self {
        Self { deadline, priority }
    }

    /// Returns a copy of this context with `deadline` replaced.
    pub fn with_deadline(self, deadline: Deadline) -> Self {
        Self { deadline: Some(deadline), ..self }
    }

    /// Returns a copy of this context with `priority` replaced.
    pub fn with_priority(self, priority: Priority) -> Self {
        Self { priority: Some(priority), ..self }
    }
}

tokio::task_local! {
    static CONTEXT: CallContext;
}

impl CallContext {
    /// The context installed by the nearest enclosing [`CallContext::scope`],
    /// or an empty context if none is installed.
    pub fn current() -> Self {
        CONTEXT.try_with(|ctx| *ctx).unwrap_or_default()
    }

    /// Runs `fut` with `self` installed as the ambient context.
    ///
    /// The previous context, if any, is restored the moment `fut` completes
    /// or is dropped — task-local scoping does this structurally, with no
    /// explicit reset step required.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CONTEXT.scope(self, fut).await
    }
}
