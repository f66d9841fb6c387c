//! Static transport discovery and auth fakes.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use confab_call::ports::{FocusDiscovery, SfuAuthPort};
use confab_core::{Transport, TransportError};
use url::Url;

use crate::log::EventLog;

/// Build a transport addressing `service` for the shared test call room.
#[allow(clippy::panic, reason = "test helper with literal inputs")]
pub fn test_transport(service: &str) -> Transport {
    let url = Url::parse(service).unwrap_or_else(|e| panic!("invalid test url {service}: {e}"));
    Transport::new(url, "!call:example.org")
}

/// A [`FocusDiscovery`] returning a fixed answer.
pub struct StaticDiscovery(Result<Vec<Transport>, TransportError>);

impl StaticDiscovery {
    /// Discovery advertising `foci`.
    pub fn advertising(foci: Vec<Transport>) -> Self {
        Self(Ok(foci))
    }

    /// Discovery that always fails.
    pub fn failing(error: TransportError) -> Self {
        Self(Err(error))
    }
}

#[async_trait]
impl FocusDiscovery for StaticDiscovery {
    async fn well_known_foci(&self, _domain: &str) -> Result<Vec<Transport>, TransportError> {
        self.0.clone()
    }
}

/// A counting [`SfuAuthPort`].
pub struct StaticAuth {
    log: EventLog,
    calls: AtomicUsize,
    fail: Mutex<Option<TransportError>>,
}

impl StaticAuth {
    /// Auth that always succeeds.
    pub fn new(log: EventLog) -> Self {
        Self { log, calls: AtomicUsize::new(0), fail: Mutex::new(None) }
    }

    /// Number of token exchanges performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next exchange fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl SfuAuthPort for StaticAuth {
    async fn exchange_token(&self, transport: &Transport) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail.lock().unwrap_or_else(PoisonError::into_inner).take() {
            self.log.record(format!("auth.exchange failed {transport}"));
            return Err(error);
        }
        self.log.record(format!("auth.exchange {transport}"));
        Ok(())
    }
}
