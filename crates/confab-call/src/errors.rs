//! Fatal/soft error routing for a call.
//!
//! Fatal errors (transport, session, non-transient media) feed the view
//! model's blocking error screen through a first-error-wins latch; publish
//! errors and transient media errors stay soft and merely inform the UI.

use std::sync::{Arc, Mutex, PoisonError};

use confab_core::{Behavior, CallError, ErrorLatch};

/// Shared error sink for one call.
#[derive(Clone)]
pub struct ErrorSink {
    latch: Arc<Mutex<ErrorLatch>>,
    fatal: Behavior<Option<CallError>>,
    soft: Behavior<Option<CallError>>,
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self {
            latch: Arc::new(Mutex::new(ErrorLatch::new())),
            fatal: Behavior::new(None),
            soft: Behavior::new(None),
        }
    }

    /// Record an error, routing it by fatality.
    pub fn record(&self, error: CallError) {
        if error.is_fatal() {
            let retained = {
                let mut latch = self.latch.lock().unwrap_or_else(PoisonError::into_inner);
                latch.record(error.clone())
            };
            if retained {
                self.fatal.set(Some(error));
            }
        } else {
            tracing::warn!(code = error.code(), %error, "soft call error");
            self.soft.set(Some(error));
        }
    }

    /// The retained fatal error, if any. Drives the blocking error screen.
    pub fn fatal(&self) -> &Behavior<Option<CallError>> {
        &self.fatal
    }

    /// The most recent soft error, if any.
    pub fn soft(&self) -> &Behavior<Option<CallError>> {
        &self.soft
    }
}

#[cfg(test)]
mod tests {
    use confab_core::{MediaError, PublishError, SessionError};

    use super::*;

    #[test]
    fn fatal_errors_latch_first_wins() {
        let sink = ErrorSink::new();
        sink.record(MediaError::ServerAtCapacity.into());
        sink.record(SessionError::JoinFailed("later".into()).into());

        assert_eq!(sink.fatal().get(), Some(CallError::Media(MediaError::ServerAtCapacity)));
    }

    #[test]
    fn soft_errors_do_not_touch_fatal_stream() {
        let sink = ErrorSink::new();
        sink.record(PublishError::NoTracksRequested.into());

        assert_eq!(sink.fatal().get(), None);
        assert_eq!(sink.soft().get(), Some(CallError::Publish(PublishError::NoTracksRequested)));
    }
}
