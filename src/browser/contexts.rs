//! Bounded stack of nested browsing contexts.
//!
//! The archive page lives in the main context. A reaction's detail page opens on
//! top of it and a molecule profile opens on top of that. Contexts are opened and
//! closed strictly LIFO; [`ContextStack::unwind_to`] restores a known depth after
//! any failure, closing whatever else the browser has opened in the meantime.

use crate::browser::{ContextId, Session};
use crate::error::{BrowserError, Result};
use std::time::Duration;

/// Only the archive page is open
pub const MAIN_DEPTH: usize = 1;
/// Archive page plus one reaction detail page
pub const DETAIL_DEPTH: usize = 2;
/// Archive page, detail page, and one molecule profile
pub const PROFILE_DEPTH: usize = 3;

#[derive(Debug, Clone)]
pub struct ContextStack {
    handles: Vec<ContextId>,
}

impl ContextStack {
    /// Adopt the session's first context as the main context and switch to it
    pub fn attach<S: Session>(session: &mut S) -> Result<Self> {
        let main = session
            .contexts()?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::SessionLost("Session has no open contexts".to_string()))?;
        session.switch_to(&main)?;

        Ok(Self { handles: vec![main] })
    }

    pub fn depth(&self) -> usize {
        self.handles.len()
    }

    pub fn main(&self) -> &ContextId {
        &self.handles[0]
    }

    pub fn top(&self) -> &ContextId {
        &self.handles[self.handles.len() - 1]
    }

    /// Wait for a context opened on top of the current stack and switch into it.
    ///
    /// Exactly `depth + 1` contexts must be open; anything else is a timeout.
    pub fn open_newest<S: Session>(&mut self, session: &mut S, timeout: Duration) -> Result<()> {
        if self.depth() >= PROFILE_DEPTH {
            return Err(BrowserError::TabOperationFailed(format!(
                "Context stack is full at depth {}",
                self.depth()
            )));
        }

        session.wait_for_context_count(self.depth() + 1, timeout)?;
        let newest = session
            .contexts()?
            .pop()
            .ok_or_else(|| BrowserError::SessionLost("All contexts disappeared".to_string()))?;
        if self.handles.contains(&newest) {
            return Err(BrowserError::TabOperationFailed(format!("No new context above {}", self.top())));
        }

        session.switch_to(&newest)?;
        self.handles.push(newest);

        Ok(())
    }

    /// Close the top context and switch back to the one below it
    pub fn close_top<S: Session>(&mut self, session: &mut S) -> Result<()> {
        if self.depth() <= MAIN_DEPTH {
            return Err(BrowserError::TabOperationFailed("The main context is never closed".to_string()));
        }

        let top = self.top().clone();
        session.switch_to(&top)?;
        session.close_current()?;
        self.handles.pop();
        session.switch_to(self.top())
    }

    /// Close every context above `depth`, including ones the stack never adopted,
    /// and switch to the context left on top.
    ///
    /// Fails with [`BrowserError::SessionLost`] when the main context itself is gone.
    pub fn unwind_to<S: Session>(&mut self, session: &mut S, depth: usize) -> Result<()> {
        let depth = depth.clamp(MAIN_DEPTH, self.depth());
        self.handles.truncate(depth);

        let open = session.contexts()?;
        if !open.contains(self.main()) {
            return Err(BrowserError::SessionLost(format!("Main context {} was closed", self.main())));
        }

        for context in open.iter().rev().filter(|c| !self.handles.contains(c)) {
            let closed = session.switch_to(context).and_then(|_| session.close_current());
            if let Err(e) = closed {
                log::warn!("Could not close leftover context {}: {}", context, e);
            }
        }

        session.switch_to(self.top())?;

        let remaining = session.contexts()?.len();
        if remaining != self.depth() {
            return Err(BrowserError::TabOperationFailed(format!(
                "{} contexts open after unwinding to depth {}",
                remaining,
                self.depth()
            )));
        }

        Ok(())
    }

    /// Check that the stack and the session agree on the depth
    pub fn verify<S: Session>(&self, session: &mut S, expected: usize) -> Result<()> {
        debug_assert_eq!(self.depth(), expected, "context stack depth drifted");

        let open = session.contexts()?.len();
        if self.depth() != expected || open != expected {
            return Err(BrowserError::TabOperationFailed(format!(
                "Expected {} open contexts, stack holds {} and session reports {}",
                expected,
                self.depth(),
                open
            )));
        }

        Ok(())
    }
}
