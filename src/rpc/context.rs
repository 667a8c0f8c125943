//! Per-call context carried from the transport to the dispatch logic.
//!
//! The transport knows who is on the other end of the connection but not,
//! at the time it reads the raw message, which handler will run. It therefore
//! registers late permission checkers here; the engine evaluates them against
//! the handler's [`HandlerOptions`] once the handler is found.

use super::errata::Errata;
use super::handler::HandlerOptions;

type PermissionChecker = Box<dyn Fn(&HandlerOptions, &mut Errata) + Send + Sync>;

/// Call context holding the permission checker chain.
#[derive(Default)]
pub struct Context {
    checkers: Vec<PermissionChecker>,
}

impl Context {
    /// Creates a context with no checkers; every call is allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a permission checker. Checkers run in registration order.
    pub fn add_permission_checker<F>(&mut self, checker: F)
    where
        F: Fn(&HandlerOptions, &mut Errata) + Send + Sync + 'static,
    {
        self.checkers.push(Box::new(checker));
    }

    /// Number of registered checkers.
    #[must_use]
    pub fn checker_count(&self) -> usize {
        self.checkers.len()
    }

    /// Runs every checker and returns the accumulated diagnostics.
    ///
    /// Evaluation does not stop at the first failure.
    #[must_use]
    pub fn check_for_permissions(&self, options: &HandlerOptions) -> Errata {
        let mut errata = Errata::new();
        for checker in &self.checkers {
            checker(options, &mut errata);
        }
        errata
    }

    /// Decides whether a handler with `options` may run.
    ///
    /// Unrestricted handlers bypass the checkers entirely.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics of every failing checker.
    pub fn authorize(&self, options: &HandlerOptions) -> Result<(), Errata> {
        if !options.restricted {
            return Ok(());
        }
        let errata = self.check_for_permissions(options);
        if errata.is_ok() {
            Ok(())
        } else {
            Err(errata)
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("checkers", &self.checkers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn empty_context_allows_everything() {
        let ctx = Context::new();
        assert!(ctx.authorize(&HandlerOptions::RESTRICTED).is_ok());
    }

    #[test]
    fn every_checker_runs_and_diagnostics_accumulate() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut ctx = Context::new();

        let counter = Arc::clone(&runs);
        ctx.add_permission_checker(move |_, errata| {
            counter.fetch_add(1, Ordering::SeqCst);
            errata.push(1, "first denial");
        });
        let counter = Arc::clone(&runs);
        ctx.add_permission_checker(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&runs);
        ctx.add_permission_checker(move |_, errata| {
            counter.fetch_add(1, Ordering::SeqCst);
            errata.push(2, "second denial");
        });

        let errata = ctx.authorize(&HandlerOptions::RESTRICTED).unwrap_err();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        let codes: Vec<i32> = errata.iter().map(|a| a.code).collect();
        assert_eq!(codes, vec![1, 2]);
    }

    #[test]
    fn unrestricted_handlers_skip_checkers() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut ctx = Context::new();
        ctx.add_permission_checker(move |_, errata| {
            counter.fetch_add(1, Ordering::SeqCst);
            errata.push(1, "denied");
        });

        assert!(ctx.authorize(&HandlerOptions::UNRESTRICTED).is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn checkers_see_the_policy() {
        let mut ctx = Context::new();
        ctx.add_permission_checker(|options, errata| {
            if options.restricted {
                errata.push(10, "restricted API");
            }
        });
        assert_eq!(ctx.check_for_permissions(&HandlerOptions::RESTRICTED).len(), 1);
        assert!(ctx
            .check_for_permissions(&HandlerOptions::UNRESTRICTED)
            .is_ok());
        assert_eq!(ctx.checker_count(), 1);
    }
}
