//! The connection manager: one live connection per distinct transport.
//!
//! The manager owns every [`Connection`] exclusively. It diffs the
//! required-transport set against the live map, priming and connecting
//! new transports and closing ones no longer referenced by any
//! membership. All of that runs inside one serialized reconcile task, so
//! a connection is never created and torn down concurrently.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use confab_core::{Behavior, MediaConnectionState, Scope, Transport};
use tokio::sync::watch;

use crate::{
    errors::ErrorSink,
    ports::{MediaConnector, MediaRoom, RemoteParticipant, SfuAuthPort},
};

/// A live binding to one transport's media room.
///
/// Cheap to clone; the manager retains exclusive ownership of the
/// lifecycle, everything else holds references.
#[derive(Clone)]
pub struct Connection {
    transport: Transport,
    room: Arc<dyn MediaRoom>,
}

impl Connection {
    /// The transport this connection binds to.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The underlying media room handle.
    pub fn room(&self) -> &Arc<dyn MediaRoom> {
        &self.room
    }

    /// Connection state of the underlying room.
    pub fn state(&self) -> watch::Receiver<MediaConnectionState> {
        self.room.state()
    }

    /// Live remote participants in the underlying room.
    pub fn participants(&self) -> watch::Receiver<Vec<RemoteParticipant>> {
        self.room.participants()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.transport == other.transport && Arc::ptr_eq(&self.room, &other.room)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("transport", &self.transport).finish_non_exhaustive()
    }
}

type ConnectionMap = Arc<Mutex<BTreeMap<Transport, Connection>>>;

/// Maintains the set of active connections as the required transports
/// change.
pub struct ConnectionManager {
    connections: Behavior<Vec<Connection>>,
    map: ConnectionMap,
}

impl ConnectionManager {
    /// Start managing connections for the given required-transport set.
    ///
    /// Bound to `scope`: ending the scope closes every remaining
    /// connection (best-effort, in the background).
    pub fn new(
        scope: &Scope,
        connector: Arc<dyn MediaConnector>,
        auth: Arc<dyn SfuAuthPort>,
        required: watch::Receiver<Vec<Transport>>,
        errors: ErrorSink,
    ) -> Self {
        let connections = Behavior::new(Vec::new());
        let map: ConnectionMap = Arc::new(Mutex::new(BTreeMap::new()));

        let live = connections.clone();
        let state = Arc::clone(&map);
        scope.reconcile(required, move |wanted: Vec<Transport>| {
            let connector = Arc::clone(&connector);
            let auth = Arc::clone(&auth);
            let errors = errors.clone();
            let live = live.clone();
            let state = Arc::clone(&state);
            async move {
                reconcile_connections(&wanted, &state, &*connector, &*auth, &errors).await;
                live.set(current_in_order(&wanted, &state));
                None
            }
        });

        let state = Arc::clone(&map);
        scope.on_end(move || {
            let stale: Vec<Connection> = {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *guard).into_values().collect()
            };
            if stale.is_empty() {
                return;
            }
            tokio::spawn(async move {
                for connection in stale {
                    connection.room.close().await;
                }
            });
        });

        Self { connections, map }
    }

    /// Active connections, in required-transport order.
    pub fn connections(&self) -> &Behavior<Vec<Connection>> {
        &self.connections
    }

    /// The connection for a transport, if one is live.
    pub fn connection_for(&self, transport: &Transport) -> Option<Connection> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).get(transport).cloned()
    }
}

async fn reconcile_connections(
    wanted: &[Transport],
    state: &ConnectionMap,
    connector: &dyn MediaConnector,
    auth: &dyn SfuAuthPort,
    errors: &ErrorSink,
) {
    let stale: Vec<Connection> = {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let keys: Vec<Transport> =
            guard.keys().filter(|t| !wanted.contains(t)).cloned().collect();
        keys.into_iter().filter_map(|k| guard.remove(&k)).collect()
    };
    for connection in &stale {
        tracing::info!(transport = %connection.transport, "closing unreferenced connection");
        connection.room.close().await;
    }

    for transport in wanted {
        let exists = {
            let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            guard.contains_key(transport)
        };
        if exists {
            continue;
        }

        if let Err(e) = auth.exchange_token(transport).await {
            errors.record(e.into());
            continue;
        }
        match connector.connect(transport).await {
            Ok(room) => {
                tracing::info!(%transport, "media connection established");
                let connection = Connection { transport: transport.clone(), room };
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(transport.clone(), connection);
            },
            Err(e) => {
                errors.record(e.into());
            },
        }
    }
}

fn current_in_order(wanted: &[Transport], state: &ConnectionMap) -> Vec<Connection> {
    let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    wanted.iter().filter_map(|t| guard.get(t).cloned()).collect()
}
