//! Scripted messaging-protocol session.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use confab_call::ports::{CallIntent, SessionPort};
use confab_core::{Membership, SessionError, SessionStatus, Transport};
use tokio::sync::watch;

use crate::log::EventLog;

/// A [`SessionPort`] whose roster and status are driven by the test.
pub struct ScriptedSession {
    log: EventLog,
    roster: watch::Sender<Vec<Membership>>,
    status: watch::Sender<SessionStatus>,
    fail_join: Mutex<Option<SessionError>>,
}

impl ScriptedSession {
    /// Empty roster, disconnected status.
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            roster: watch::Sender::new(Vec::new()),
            status: watch::Sender::new(SessionStatus::Disconnected),
            fail_join: Mutex::new(None),
        }
    }

    /// Replace the roster. Retained even while nothing subscribes yet.
    pub fn set_roster(&self, roster: Vec<Membership>) {
        self.roster.send_replace(roster);
    }

    /// Set the homeserver session status. Retained even while nothing
    /// subscribes yet.
    pub fn set_status(&self, status: SessionStatus) {
        self.status.send_replace(status);
    }

    /// Make the next `join` fail with `error`.
    pub fn fail_next_join(&self, error: SessionError) {
        *self.fail_join.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl SessionPort for ScriptedSession {
    fn roster(&self) -> watch::Receiver<Vec<Membership>> {
        self.roster.subscribe()
    }

    fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    async fn join(&self, transport: &Transport) -> Result<(), SessionError> {
        if let Some(error) = self.fail_join.lock().unwrap_or_else(PoisonError::into_inner).take() {
            self.log.record(format!("session.join failed {transport}"));
            return Err(error);
        }
        self.log.record(format!("session.join {transport}"));
        Ok(())
    }

    async fn leave(&self) -> Result<(), SessionError> {
        self.log.record("session.leave");
        Ok(())
    }

    async fn update_call_intent(&self, intent: CallIntent) -> Result<(), SessionError> {
        self.log.record(format!("session.intent {intent:?}"));
        Ok(())
    }
}
