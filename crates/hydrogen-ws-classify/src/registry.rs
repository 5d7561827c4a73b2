//! Global handler registration for classified errors — "a globally
//! registered handler receives every classified event for logging and
//! aggregate statistics" (spec §4.10).

use std::sync::{OnceLock, RwLock};

use tracing::warn;

use crate::classifier::ClassifiedError;

pub type ClassifierHandler = Box<dyn Fn(&ClassifiedError) + Send + Sync>;

static HANDLER: OnceLock<RwLock<Option<ClassifierHandler>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<ClassifierHandler>> {
    HANDLER.get_or_init(|| RwLock::new(None))
}

/// Replaces the process-wide classified-error handler. Only one handler is
/// supported at a time, matching the spec's "a globally registered handler"
/// (singular).
pub fn register_handler(handler: ClassifierHandler) {
    *slot().write().expect("classifier handler lock poisoned") = Some(handler);
}

pub(crate) fn dispatch(err: &ClassifiedError) {
    if let Some(handler) = slot().read().expect("classifier handler lock poisoned").as_ref() {
        handler(err);
    } else {
        warn!(category = ?err.category, severity = ?err.severity, action = ?err.action, "{}", err.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorCategory, ErrorSeverity, RecoveryAction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn registered_handler_receives_dispatched_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        register_handler(Box::new(move |_err| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        dispatch(&ClassifiedError {
            category: ErrorCategory::Timeout,
            severity: ErrorSeverity::Warning,
            action: RecoveryAction::Retry,
            message: "test".into(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
