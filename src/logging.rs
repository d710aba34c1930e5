//! Logging setup with a reloadable filter.
//!
//! The filter sits behind `tracing_subscriber::reload` so bulk operations
//! can lower verbosity for their own lifetime only.

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Reload handle for the installed filter.
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Directive applied while a [`QuietGuard`] is alive.
const QUIET_DIRECTIVE: &str = "warn";

/// Runtime control over the log filter.
#[derive(Debug, Clone)]
pub struct LogControl {
    handle: Option<FilterHandle>,
    directive: Arc<str>,
}

/// Initializes the logging subsystem and returns its control handle.
pub fn init_logging(level: &str) -> LogControl {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let directive = filter.to_string();
    let (filter_layer, handle) = reload::Layer::new(filter);

    // Ignored when a subscriber is already installed (tests).
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .try_init();

    LogControl::from_handle(handle, directive)
}

impl LogControl {
    /// Wraps an existing reload handle whose filter was built from `directive`.
    #[must_use]
    pub fn from_handle(handle: FilterHandle, directive: impl Into<Arc<str>>) -> Self {
        Self {
            handle: Some(handle),
            directive: directive.into(),
        }
    }

    /// A control that never touches any filter.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            handle: None,
            directive: Arc::from(""),
        }
    }

    /// Lowers verbosity to warnings until the returned guard is dropped.
    #[must_use = "verbosity is restored as soon as the guard is dropped"]
    pub fn quiet(&self) -> QuietGuard {
        let previous = Arc::clone(&self.directive);

        if let Some(handle) = &self.handle
            && handle.reload(EnvFilter::new(QUIET_DIRECTIVE)).is_ok()
        {
            return QuietGuard {
                handle: Some(handle.clone()),
                previous,
            };
        }

        QuietGuard {
            handle: None,
            previous,
        }
    }
}

/// Restores the previous filter directive on drop.
#[derive(Debug)]
pub struct QuietGuard {
    handle: Option<FilterHandle>,
    previous: Arc<str>,
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.reload(EnvFilter::new(&*self.previous));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(handle: &FilterHandle) -> String {
        handle.with_current(ToString::to_string).unwrap()
    }

    #[test]
    fn test_quiet_guard_restores_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("debug"));
        let control = LogControl::from_handle(handle.clone(), "debug");

        {
            let _guard = control.quiet();
            assert_eq!(current(&handle), "warn");
        }
        assert_eq!(current(&handle), "debug");
        drop(layer);
    }

    #[test]
    fn test_quiet_guard_restores_after_panic() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let control = LogControl::from_handle(handle.clone(), "info");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = control.quiet();
            panic!("validation blew up");
        }));
        assert!(result.is_err());
        assert_eq!(current(&handle), "info");
        drop(layer);
    }

    #[test]
    fn test_clones_share_the_directive() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("debug"));
        let control = LogControl::from_handle(handle.clone(), String::from("debug"));
        let copy = control.clone();

        {
            let _guard = copy.quiet();
            assert_eq!(current(&handle), "warn");
        }
        assert_eq!(current(&handle), "debug");
        assert!(Arc::ptr_eq(&control.directive, &copy.directive));
        drop(layer);
    }

    #[test]
    fn test_disabled_control_is_noop() {
        let control = LogControl::disabled();
        let guard = control.quiet();
        assert!(guard.handle.is_none());
    }
}
