//! Local transport resolution.
//!
//! Which SFU should *we* publish through? The chain, highest priority
//! first: developer override, `.well-known` discovered foci for the
//! homeserver domain, static local configuration. When the
//! use-oldest-member mode is active and the oldest roster member resolves
//! a transport, that substitutes for the locally preferred one. A resolved
//! transport is primed with one token-exchange round trip before it is
//! advertised; priming failure is a typed error, never a silent retry.

use confab_core::{Membership, Transport, TransportError};
use serde::{Deserialize, Serialize};

use crate::ports::{FocusDiscovery, SfuAuthPort};

/// Static transport configuration for this client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Homeserver domain used for `.well-known` discovery.
    pub homeserver_domain: String,
    /// Statically configured fallback foci, preferred-first.
    #[serde(default)]
    pub static_foci: Vec<Transport>,
    /// Developer-tool override; beats everything else when set.
    #[serde(default)]
    pub developer_override: Option<Transport>,
    /// Substitute the oldest roster member's transport when available.
    #[serde(default)]
    pub use_oldest_member: bool,
}

/// Resolve and prime the local member's outgoing transport.
pub async fn resolve_local_transport(
    config: &TransportConfig,
    discovery: &dyn FocusDiscovery,
    auth: &dyn SfuAuthPort,
    oldest: Option<&Membership>,
) -> Result<Transport, TransportError> {
    let preferred = preferred_transport(config, discovery).await?;

    let resolved = if config.use_oldest_member {
        match oldest.and_then(|m| m.transport(None)) {
            Some(inherited) => {
                tracing::debug!(%inherited, "following oldest member's transport");
                inherited
            },
            None => preferred,
        }
    } else {
        preferred
    };

    auth.exchange_token(&resolved).await?;
    Ok(resolved)
}

async fn preferred_transport(
    config: &TransportConfig,
    discovery: &dyn FocusDiscovery,
) -> Result<Transport, TransportError> {
    if let Some(transport) = &config.developer_override {
        tracing::debug!(%transport, "using developer transport override");
        return Ok(transport.clone());
    }

    match discovery.well_known_foci(&config.homeserver_domain).await {
        Ok(foci) => {
            if let Some(first) = foci.into_iter().next() {
                return Ok(first);
            }
        },
        Err(e) => {
            // Discovery failure falls through to static configuration;
            // only a fully empty chain is an error.
            tracing::warn!(domain = %config.homeserver_domain, error = %e, "focus discovery failed");
        },
    }

    config
        .static_foci
        .first()
        .cloned()
        .ok_or_else(|| TransportError::NoTransport { domain: config.homeserver_domain.clone() })
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use confab_core::{DeviceId, TransportSelector, UserId};
    use url::Url;

    use super::*;

    fn transport(service: &str) -> Transport {
        Transport::new(Url::parse(service).expect("valid test url"), "!call:example.org")
    }

    struct FixedDiscovery(Result<Vec<Transport>, TransportError>);

    #[async_trait]
    impl FocusDiscovery for FixedDiscovery {
        async fn well_known_foci(&self, _domain: &str) -> Result<Vec<Transport>, TransportError> {
            self.0.clone()
        }
    }

    struct CountingAuth {
        calls: AtomicUsize,
        primed: Mutex<Vec<Transport>>,
        fail: bool,
    }

    impl CountingAuth {
        fn ok() -> Self {
            Self { calls: AtomicUsize::new(0), primed: Mutex::new(Vec::new()), fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), primed: Mutex::new(Vec::new()), fail: true }
        }
    }

    #[async_trait]
    impl SfuAuthPort for CountingAuth {
        async fn exchange_token(&self, transport: &Transport) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::AuthRejected {
                    transport: transport.clone(),
                    status: 403,
                });
            }
            self.primed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(transport.clone());
            Ok(())
        }
    }

    fn config(domain: &str) -> TransportConfig {
        TransportConfig { homeserver_domain: domain.into(), ..TransportConfig::default() }
    }

    #[tokio::test]
    async fn developer_override_beats_discovery() {
        let mut cfg = config("example.org");
        cfg.developer_override = Some(transport("https://dev.example.org"));
        let discovery = FixedDiscovery(Ok(vec![transport("https://discovered.example.org")]));
        let auth = CountingAuth::ok();

        let resolved = resolve_local_transport(&cfg, &discovery, &auth, None)
            .await
            .expect("resolves");
        assert_eq!(resolved, transport("https://dev.example.org"));
    }

    #[tokio::test]
    async fn discovery_beats_static_config() {
        let mut cfg = config("example.org");
        cfg.static_foci = vec![transport("https://static.example.org")];
        let discovery = FixedDiscovery(Ok(vec![transport("https://discovered.example.org")]));
        let auth = CountingAuth::ok();

        let resolved = resolve_local_transport(&cfg, &discovery, &auth, None)
            .await
            .expect("resolves");
        assert_eq!(resolved, transport("https://discovered.example.org"));
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_to_static_config() {
        let mut cfg = config("example.org");
        cfg.static_foci = vec![transport("https://static.example.org")];
        let discovery = FixedDiscovery(Err(TransportError::Discovery {
            domain: "example.org".into(),
            reason: "timeout".into(),
        }));
        let auth = CountingAuth::ok();

        let resolved = resolve_local_transport(&cfg, &discovery, &auth, None)
            .await
            .expect("resolves");
        assert_eq!(resolved, transport("https://static.example.org"));
    }

    #[tokio::test]
    async fn empty_chain_is_a_typed_error() {
        let cfg = config("example.org");
        let discovery = FixedDiscovery(Ok(vec![]));
        let auth = CountingAuth::ok();

        let result = resolve_local_transport(&cfg, &discovery, &auth, None).await;
        assert_eq!(
            result,
            Err(TransportError::NoTransport { domain: "example.org".into() })
        );
        // No transport resolved, so nothing was primed.
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oldest_member_substitutes_when_mode_active() {
        let mut cfg = config("example.org");
        cfg.use_oldest_member = true;
        cfg.static_foci = vec![transport("https://static.example.org")];
        let discovery = FixedDiscovery(Ok(vec![]));
        let auth = CountingAuth::ok();

        let oldest = Membership {
            user_id: UserId::new("@old:example.org"),
            device_id: DeviceId::new("D0"),
            event_id: "$ev0".into(),
            selector: TransportSelector::Declared(transport("https://oldest.example.org")),
        };

        let resolved = resolve_local_transport(&cfg, &discovery, &auth, Some(&oldest))
            .await
            .expect("resolves");
        assert_eq!(resolved, transport("https://oldest.example.org"));
    }

    #[tokio::test]
    async fn oldest_member_mode_falls_back_to_preferred() {
        let mut cfg = config("example.org");
        cfg.use_oldest_member = true;
        cfg.static_foci = vec![transport("https://static.example.org")];
        let discovery = FixedDiscovery(Ok(vec![]));
        let auth = CountingAuth::ok();

        let resolved = resolve_local_transport(&cfg, &discovery, &auth, None)
            .await
            .expect("resolves");
        assert_eq!(resolved, transport("https://static.example.org"));
    }

    #[tokio::test]
    async fn priming_failure_surfaces_as_typed_error() {
        let mut cfg = config("example.org");
        cfg.static_foci = vec![transport("https://static.example.org")];
        let discovery = FixedDiscovery(Ok(vec![]));
        let auth = CountingAuth::failing();

        let result = resolve_local_transport(&cfg, &discovery, &auth, None).await;
        assert!(matches!(result, Err(TransportError::AuthRejected { status: 403, .. })));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }
}
