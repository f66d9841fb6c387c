//! The call view model: one object composing everything the UI renders.
//!
//! Construction wires the full pipeline inside one [`Scope`]:
//!
//! 1. the session roster is epoch-stamped as it arrives;
//! 2. the local transport is resolved (and re-resolved when following the
//!    oldest member) and unioned with the roster's required transports;
//! 3. a [`ConnectionManager`] keeps one live connection per transport;
//! 4. the [`LocalMembership`] machine binds to whichever connection serves
//!    the local transport;
//! 5. media participants from every connection are paired with the roster
//!    into tagged participants, which feed spotlight selection, sound
//!    pulses, and the layout engine.
//!
//! Ending the view model's scope tears all of it down in order.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use confab_call::{
    Connection, ConnectionManager, DeviceIntent, ErrorSink, LocalMemberState, LocalMembership,
    PublishState, TaggedParticipant, TransportConfig,
    ports::{DevicePort, FocusDiscovery, MediaConnector, RemoteParticipant, SessionPort, SfuAuthPort},
    resolve::resolve_local_transport,
    roster::{pair_participants, required_transports},
};
use confab_core::{
    Behavior, CallError, Epoch, EpochCounter, Membership, ParticipantId, Scope, Transport,
};
use tokio::{sync::broadcast, time::Instant};

use crate::{
    layout::{
        Layout, LayoutInput, MediaItem, SortingBin, TileId, TileStore, natural_mode, select_layout,
    },
    mode::{ModePreference, VideoMode},
    reactions::{ActiveReaction, ReactionBoard},
    sounds::{SoundGate, SoundKind},
    spotlight::select_spotlight,
    widget::{WidgetNotification, WidgetPort, WidgetRequest},
    window::{WindowMode, classify},
};

/// How often expired reactions are swept off the board.
const REACTION_SWEEP: Duration = Duration::from_millis(500);

/// How long the header/footer controls stay visible after the last
/// interaction.
const CONTROLS_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything external the view model talks to.
pub struct CallPorts {
    /// The messaging-protocol session.
    pub session: Arc<dyn SessionPort>,
    /// `.well-known` focus discovery.
    pub discovery: Arc<dyn FocusDiscovery>,
    /// SFU token exchange.
    pub auth: Arc<dyn SfuAuthPort>,
    /// Media room factory.
    pub connector: Arc<dyn MediaConnector>,
    /// Local capture devices.
    pub devices: Arc<dyn DevicePort>,
    /// Host-widget channel, when embedded.
    pub widget: Option<Arc<dyn WidgetPort>>,
}

/// Static configuration for one call.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Transport resolution configuration.
    pub transport: TransportConfig,
    /// The local member's `user:device` identity.
    pub local_id: ParticipantId,
    /// Device intent at construction; also what a lifted force-mute
    /// restores.
    pub default_intent: DeviceIntent,
    /// Whether picture-in-picture layouts are allowed.
    pub pip_enabled: bool,
}

/// The rendered arrangement plus the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSnapshot {
    /// The arrangement to render.
    pub layout: Layout,
    /// Tile-store generation; bumps exactly when tile assignment changed.
    pub generation: u64,
    /// The resolved grid/spotlight mode.
    pub mode: VideoMode,
    /// The classified window mode.
    pub window: WindowMode,
}

impl Default for LayoutSnapshot {
    fn default() -> Self {
        Self {
            layout: Layout::Grid { tiles: Vec::new() },
            generation: 0,
            mode: VideoMode::Grid,
            window: WindowMode::Normal,
        }
    }
}

/// Audio routing entry: one media connection and the participants heard
/// through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRoute {
    /// The transport carrying this audio.
    pub transport: Transport,
    /// Participants whose audio arrives over this connection.
    pub participants: Vec<ParticipantId>,
}

/// The composed call state, ready for a renderer.
pub struct CallViewModel {
    scope: Scope,
    membership: Arc<LocalMembership>,
    manager: Arc<ConnectionManager>,
    errors: ErrorSink,
    participants: Behavior<Epoch<Vec<TaggedParticipant>>>,
    participant_count: Behavior<usize>,
    audio_routes: Behavior<Vec<AudioRoute>>,
    raised_hands: Behavior<HashMap<ParticipantId, Instant>>,
    spotlight: Behavior<Option<ParticipantId>>,
    layout: Behavior<LayoutSnapshot>,
    reactions: Behavior<HashMap<ParticipantId, ActiveReaction>>,
    board: Arc<Mutex<ReactionBoard>>,
    viewport: Behavior<(u32, u32)>,
    visible_tiles: Behavior<usize>,
    pip_enabled: Behavior<bool>,
    mode_pref: Arc<Mutex<ModePreference>>,
    mode_nudge: Behavior<u64>,
    interaction_nudge: Behavior<u64>,
    show_header: Behavior<bool>,
    show_footer: Behavior<bool>,
    audio_switch_available: Behavior<bool>,
    sounds: broadcast::Sender<SoundKind>,
    widget: Option<Arc<dyn WidgetPort>>,
}

impl CallViewModel {
    /// Compose a call view model inside a child of `parent`.
    pub fn new(parent: &Scope, config: CallConfig, ports: CallPorts) -> Self {
        let scope = parent.child();
        let errors = ErrorSink::new();

        let roster = Self::stamped_roster(&scope, &*ports.session);
        let local_transport =
            Self::resolved_transport(&scope, &config.transport, &ports, &roster, &errors);

        let roster_required = scope.derive(&roster, |r| required_transports(&r.value));
        let required = scope.derive2(&roster_required, &local_transport, |req, local| {
            let mut all = req.clone();
            if let Some(transport) = local {
                if !all.contains(transport) {
                    all.push(transport.clone());
                }
            }
            all
        });

        let manager = Arc::new(ConnectionManager::new(
            &scope,
            Arc::clone(&ports.connector),
            Arc::clone(&ports.auth),
            required.watch(),
            errors.clone(),
        ));

        let local_connection =
            scope.derive2(manager.connections(), &local_transport, |conns, local| {
                local.as_ref().and_then(|t| conns.iter().find(|c| c.transport() == t).cloned())
            });
        let membership = Arc::new(LocalMembership::new(
            &scope,
            Arc::clone(&ports.session),
            Arc::clone(&ports.devices),
            local_connection.watch(),
            config.default_intent,
            errors.clone(),
        ));

        let (participants, audio_routes) =
            Self::paired_participants(&scope, &manager, &roster, config.local_id.clone());
        let participant_count = scope.derive(&participants, |p| p.value.len());
        let raised_hands = Behavior::new(HashMap::new());
        let stamped_spotlight = Self::spotlight_task(&scope, &participants, config.local_id.clone());
        let spotlight = scope.derive(&stamped_spotlight, |s| s.value.clone());
        let sounds = Self::sound_task(&scope, &participants, &raised_hands);
        let (board, reactions) = Self::reaction_task(&scope);

        let viewport = Behavior::new((1280u32, 720u32));
        let visible_tiles = Behavior::new(0usize);
        let pip_enabled = Behavior::new(config.pip_enabled);
        let mode_pref = Arc::new(Mutex::new(ModePreference::new()));
        let mode_nudge = Behavior::new(0u64);
        let layout = Self::layout_task(
            &scope,
            &participants,
            &stamped_spotlight,
            &raised_hands,
            membership.state(),
            &viewport,
            &visible_tiles,
            &pip_enabled,
            &mode_nudge,
            Arc::clone(&mode_pref),
        );

        let interaction_nudge = Behavior::new(0u64);
        let controls = Self::controls_task(&scope, &interaction_nudge);
        let show_header = scope.derive2(&controls, &layout, |visible, snapshot| {
            *visible && !matches!(snapshot.window, WindowMode::Pip | WindowMode::Flat)
        });
        let show_footer = scope.derive2(&controls, &layout, |visible, snapshot| {
            *visible && snapshot.window != WindowMode::Pip
        });
        let audio_switch_available = Behavior::new(false);

        if let Some(widget) = &ports.widget {
            Self::widget_relay(&scope, widget, &membership);
        }

        Self {
            scope,
            membership,
            manager,
            errors,
            participants,
            participant_count,
            audio_routes,
            raised_hands,
            spotlight,
            layout,
            reactions,
            board,
            viewport,
            visible_tiles,
            pip_enabled,
            mode_pref,
            mode_nudge,
            interaction_nudge,
            show_header,
            show_footer,
            audio_switch_available,
            sounds,
            widget: ports.widget,
        }
    }

    fn stamped_roster(
        scope: &Scope,
        session: &dyn SessionPort,
    ) -> Behavior<Epoch<Vec<Membership>>> {
        let cell = Behavior::new(Epoch { epoch: 0, value: Vec::new() });
        let sink = cell.clone();
        let mut rx = session.roster();
        scope.spawn(async move {
            let mut counter = EpochCounter::new();
            loop {
                let value = rx.borrow_and_update().clone();
                sink.set(counter.stamp(value));
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        cell
    }

    fn resolved_transport(
        scope: &Scope,
        config: &TransportConfig,
        ports: &CallPorts,
        roster: &Behavior<Epoch<Vec<Membership>>>,
        errors: &ErrorSink,
    ) -> Behavior<Option<Transport>> {
        let cell = Behavior::new(None);

        // When not following the oldest member, the key never changes and
        // resolution runs exactly once.
        let key = if config.use_oldest_member {
            scope.derive(roster, |r| r.value.first().cloned())
        } else {
            scope.derive(roster, |_| None)
        };

        let cfg = config.clone();
        let discovery = Arc::clone(&ports.discovery);
        let auth = Arc::clone(&ports.auth);
        let errors = errors.clone();
        let sink = cell.clone();
        scope.reconcile(key.watch(), move |oldest: Option<Membership>| {
            let cfg = cfg.clone();
            let discovery = Arc::clone(&discovery);
            let auth = Arc::clone(&auth);
            let errors = errors.clone();
            let sink = sink.clone();
            async move {
                match resolve_local_transport(&cfg, &*discovery, &*auth, oldest.as_ref()).await {
                    Ok(transport) => {
                        tracing::info!(%transport, "local transport resolved");
                        sink.set_if_changed(Some(transport));
                    },
                    Err(e) => errors.record(e.into()),
                }
                None
            }
        });
        cell
    }

    #[allow(clippy::type_complexity)]
    fn paired_participants(
        scope: &Scope,
        manager: &ConnectionManager,
        roster: &Behavior<Epoch<Vec<Membership>>>,
        local_id: ParticipantId,
    ) -> (Behavior<Epoch<Vec<TaggedParticipant>>>, Behavior<Vec<AudioRoute>>) {
        let cell = Behavior::new(Epoch { epoch: 0, value: Vec::new() });
        let routes_cell = Behavior::new(Vec::new());
        let sink = cell.clone();
        let routes_sink = routes_cell.clone();
        let mut conns_rx = manager.connections().watch();
        let mut roster_rx = roster.watch();
        scope.spawn(async move {
            loop {
                let conns = conns_rx.borrow_and_update().clone();
                let mut feeds: Vec<_> = conns.iter().map(Connection::participants).collect();
                let stamped = roster_rx.borrow_and_update().clone();

                let mut media: Vec<RemoteParticipant> = Vec::new();
                let mut routes: Vec<AudioRoute> = Vec::new();
                for (conn, rx) in conns.iter().zip(feeds.iter_mut()) {
                    let present = rx.borrow_and_update().clone();
                    routes.push(AudioRoute {
                        transport: conn.transport().clone(),
                        participants: present.iter().map(|p| p.identity.clone()).collect(),
                    });
                    media.extend(present);
                }
                routes_sink.set_if_changed(routes);
                let tagged = stamped.map_inner(|r| pair_participants(&r, &local_id, &media));
                sink.set_if_changed(tagged);

                let media_changed = async {
                    if feeds.is_empty() {
                        futures::future::pending::<()>().await;
                    } else {
                        let waits = feeds.iter_mut().map(|rx| Box::pin(rx.changed()));
                        let _ = futures::future::select_all(waits).await;
                    }
                };
                tokio::select! {
                    changed = conns_rx.changed() => if changed.is_err() { break },
                    changed = roster_rx.changed() => if changed.is_err() { break },
                    () = media_changed => {},
                }
            }
        });
        (cell, routes_cell)
    }

    /// Sticky spotlight selection, stamped with the participant epoch it
    /// was derived from so downstream consumers can pair the two.
    fn spotlight_task(
        scope: &Scope,
        participants: &Behavior<Epoch<Vec<TaggedParticipant>>>,
        local_id: ParticipantId,
    ) -> Behavior<Epoch<Option<ParticipantId>>> {
        let cell = Behavior::new(Epoch { epoch: 0, value: None });
        let sink = cell.clone();
        let mut rx = participants.watch();
        scope.spawn(async move {
            let mut previous: Option<ParticipantId> = None;
            loop {
                let tagged = rx.borrow_and_update().clone();
                let remotes: Vec<ParticipantId> = tagged
                    .value
                    .iter()
                    .filter(|p| matches!(p, TaggedParticipant::Remote { .. }))
                    .map(TaggedParticipant::participant_id)
                    .collect();
                let speaking: HashSet<ParticipantId> = tagged
                    .value
                    .iter()
                    .filter_map(|p| match p {
                        TaggedParticipant::Remote { membership, participant: Some(m) }
                            if m.speaking =>
                        {
                            Some(membership.participant_id())
                        },
                        _ => None,
                    })
                    .collect();

                let next = select_spotlight(previous.as_ref(), &remotes, &speaking, &local_id);
                previous = Some(next.clone());
                sink.set_if_changed(Epoch { epoch: tagged.epoch, value: Some(next) });

                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        cell
    }

    fn sound_task(
        scope: &Scope,
        participants: &Behavior<Epoch<Vec<TaggedParticipant>>>,
        raised_hands: &Behavior<HashMap<ParticipantId, Instant>>,
    ) -> broadcast::Sender<SoundKind> {
        let (tx, _) = broadcast::channel(32);
        let sender = tx.clone();
        let mut rx = participants.watch();
        let mut raised_rx = raised_hands.watch();
        scope.spawn(async move {
            let mut gate = SoundGate::new();
            let mut known: HashSet<ParticipantId> = HashSet::new();
            let mut sharing: HashSet<ParticipantId> = HashSet::new();
            let mut raised: HashSet<ParticipantId> = HashSet::new();
            let mut first = true;
            loop {
                let tagged = rx.borrow_and_update().clone();
                let now_raised: HashSet<ParticipantId> =
                    raised_rx.borrow_and_update().keys().cloned().collect();
                let count = tagged.value.len();
                let now = tokio::time::Instant::now();
                let current: HashSet<ParticipantId> =
                    tagged.value.iter().map(TaggedParticipant::participant_id).collect();
                let now_sharing: HashSet<ParticipantId> = tagged
                    .value
                    .iter()
                    .filter_map(|p| match p {
                        TaggedParticipant::Remote { membership, participant: Some(m) }
                            if m.screen_sharing =>
                        {
                            Some(membership.participant_id())
                        },
                        _ => None,
                    })
                    .collect();

                // The very first snapshot is the state we walked in on, not
                // a join burst.
                if !first {
                    if current.difference(&known).next().is_some()
                        && gate.admit(SoundKind::Join, count, now)
                    {
                        let _ = sender.send(SoundKind::Join);
                    }
                    if known.difference(&current).next().is_some()
                        && gate.admit(SoundKind::Leave, count, now)
                    {
                        let _ = sender.send(SoundKind::Leave);
                    }
                    if now_sharing.difference(&sharing).next().is_some()
                        && gate.admit(SoundKind::ScreenShare, count, now)
                    {
                        let _ = sender.send(SoundKind::ScreenShare);
                    }
                    if now_raised.difference(&raised).next().is_some()
                        && gate.admit(SoundKind::HandRaise, count, now)
                    {
                        let _ = sender.send(SoundKind::HandRaise);
                    }
                }
                first = false;
                known = current;
                sharing = now_sharing;
                raised = now_raised;

                tokio::select! {
                    changed = rx.changed() => if changed.is_err() { break },
                    changed = raised_rx.changed() => if changed.is_err() { break },
                }
            }
        });
        tx
    }

    #[allow(clippy::type_complexity)]
    fn reaction_task(
        scope: &Scope,
    ) -> (Arc<Mutex<ReactionBoard>>, Behavior<HashMap<ParticipantId, ActiveReaction>>) {
        let board = Arc::new(Mutex::new(ReactionBoard::new()));
        let cell = Behavior::new(HashMap::new());

        let sweeper = Arc::clone(&board);
        let sink = cell.clone();
        scope.spawn(async move {
            let mut tick = tokio::time::interval(REACTION_SWEEP);
            loop {
                tick.tick().await;
                let active = {
                    let mut board = sweeper.lock().unwrap_or_else(PoisonError::into_inner);
                    board.expire(tokio::time::Instant::now());
                    board.active().clone()
                };
                sink.set_if_changed(active);
            }
        });
        (board, cell)
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_task(
        scope: &Scope,
        participants: &Behavior<Epoch<Vec<TaggedParticipant>>>,
        spotlight: &Behavior<Epoch<Option<ParticipantId>>>,
        raised_hands: &Behavior<HashMap<ParticipantId, Instant>>,
        local_state: &Behavior<LocalMemberState>,
        viewport: &Behavior<(u32, u32)>,
        visible_tiles: &Behavior<usize>,
        pip_enabled: &Behavior<bool>,
        mode_nudge: &Behavior<u64>,
        mode_pref: Arc<Mutex<ModePreference>>,
    ) -> Behavior<LayoutSnapshot> {
        let cell = Behavior::new(LayoutSnapshot::default());
        let sink = cell.clone();
        let mut parts_rx = participants.watch();
        let mut spot_rx = spotlight.watch();
        let mut raised_rx = raised_hands.watch();
        let mut local_rx = local_state.watch();
        let mut view_rx = viewport.watch();
        let mut vis_rx = visible_tiles.watch();
        let mut pip_rx = pip_enabled.watch();
        let mut nudge_rx = mode_nudge.watch();
        scope.spawn(async move {
            let mut store = TileStore::new();
            loop {
                let tagged = parts_rx.borrow_and_update().clone();
                let stamped_spot = spot_rx.borrow_and_update().clone();
                let raised = raised_rx.borrow_and_update().clone();
                let local_sharing = local_rx.borrow_and_update().screen_sharing;
                let (width, height) = *view_rx.borrow_and_update();
                let visible = *vis_rx.borrow_and_update();
                let pip = *pip_rx.borrow_and_update();
                let _ = *nudge_rx.borrow_and_update();

                // Participants and spotlight arrive on separate cells; only
                // arrange once both reflect the same roster epoch. A
                // mismatch is transient and the lagging cell wakes the
                // select below.
                if let Some((participants, sticky)) = Epoch::combine(&tagged, &stamped_spot) {
                    let media = media_items(participants, &raised, local_sharing);
                    let natural = natural_mode(&media);
                    let mode = {
                        let mut pref = mode_pref.lock().unwrap_or_else(PoisonError::into_inner);
                        pref.current(natural)
                    };
                    let window = classify(width, height);
                    let input = LayoutInput {
                        window,
                        mode,
                        pip_enabled: pip,
                        visible_tiles: visible,
                        spotlight: sticky.as_ref(),
                        media: &media,
                    };
                    let (arranged, next) = select_layout(&input, &store);
                    store = next;
                    sink.set_if_changed(LayoutSnapshot {
                        layout: arranged,
                        generation: store.generation(),
                        mode,
                        window,
                    });
                }

                tokio::select! {
                    changed = parts_rx.changed() => if changed.is_err() { break },
                    changed = spot_rx.changed() => if changed.is_err() { break },
                    changed = raised_rx.changed() => if changed.is_err() { break },
                    changed = local_rx.changed() => if changed.is_err() { break },
                    changed = view_rx.changed() => if changed.is_err() { break },
                    changed = vis_rx.changed() => if changed.is_err() { break },
                    changed = pip_rx.changed() => if changed.is_err() { break },
                    changed = nudge_rx.changed() => if changed.is_err() { break },
                }
            }
        });
        cell
    }

    /// Header/footer visibility: shown on interaction, hidden again after
    /// a quiet period.
    fn controls_task(scope: &Scope, interaction: &Behavior<u64>) -> Behavior<bool> {
        let cell = Behavior::new(true);
        let sink = cell.clone();
        let mut rx = interaction.watch();
        scope.spawn(async move {
            loop {
                let _ = *rx.borrow_and_update();
                sink.set_if_changed(true);
                tokio::select! {
                    () = tokio::time::sleep(CONTROLS_TIMEOUT) => {
                        sink.set_if_changed(false);
                        if rx.changed().await.is_err() {
                            break;
                        }
                    },
                    changed = rx.changed() => if changed.is_err() { break },
                }
            }
        });
        cell
    }

    fn widget_relay(scope: &Scope, widget: &Arc<dyn WidgetPort>, membership: &Arc<LocalMembership>) {
        let mut requests = widget.requests();
        let member = Arc::clone(membership);
        let notify = Arc::clone(widget);
        scope.spawn(async move {
            loop {
                match requests.recv().await {
                    Ok(WidgetRequest::JoinCall) => {
                        member.start_tracks();
                        member.request_join_and_publish();
                    },
                    Ok(WidgetRequest::HangupCall) => {
                        member.request_disconnect();
                        notify.notify(WidgetNotification::HungUp).await;
                    },
                    Ok(WidgetRequest::DeviceMute { audio_enabled, video_enabled }) => {
                        member.set_audio_enabled(audio_enabled);
                        member.set_video_enabled(video_enabled);
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "widget requests lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let notify = Arc::clone(widget);
        let mut state_rx = membership.state().watch();
        let mut intent_rx = membership.intent().watch();
        scope.spawn(async move {
            let mut was_publishing = false;
            let mut last_intent: Option<DeviceIntent> = None;
            loop {
                let state = state_rx.borrow_and_update().clone();
                let intent = *intent_rx.borrow_and_update();

                let publishing = state.publish == PublishState::Publishing;
                if publishing && !was_publishing {
                    notify.notify(WidgetNotification::Joined).await;
                }
                was_publishing = publishing;

                if last_intent != Some(intent) {
                    if last_intent.is_some() {
                        notify
                            .notify(WidgetNotification::DeviceMute {
                                audio_enabled: intent.audio_enabled,
                                video_enabled: intent.video_enabled,
                            })
                            .await;
                    }
                    last_intent = Some(intent);
                }

                tokio::select! {
                    changed = state_rx.changed() => if changed.is_err() { break },
                    changed = intent_rx.changed() => if changed.is_err() { break },
                }
            }
        });
    }

    /// Request local track creation (lobby preview).
    pub fn start_tracks(&self) {
        self.membership.start_tracks();
    }

    /// Join the call: create tracks if not yet requested, join the session,
    /// publish.
    pub fn join(&self) {
        self.membership.start_tracks();
        self.membership.request_join_and_publish();
    }

    /// Hang up: unpublish, release devices, leave the session.
    pub fn hangup(&self) {
        self.membership.request_disconnect();
        if let Some(widget) = &self.widget {
            let widget = Arc::clone(widget);
            self.scope.spawn(async move {
                widget.notify(WidgetNotification::HungUp).await;
            });
        }
    }

    /// Enable or disable the microphone.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.membership.set_audio_enabled(enabled);
    }

    /// Enable or disable the camera.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.membership.set_video_enabled(enabled);
    }

    /// Impose or lift a force-mute condition.
    pub fn set_force_muted(&self, muted: bool) {
        self.membership.set_force_muted(muted);
    }

    /// Start sharing the screen, or stop an active share.
    pub fn toggle_screen_share(&self) {
        let wanted = self.membership.screen_share_requested().get();
        self.membership.set_screen_share_enabled(!wanted);
    }

    /// Replace the raised-hands map, as parsed by the protocol layer.
    pub fn set_raised_hands(&self, raised: HashMap<ParticipantId, Instant>) {
        self.raised_hands.set_if_changed(raised);
    }

    /// Record a tap or hover anywhere on the call surface; keeps the
    /// header/footer controls visible.
    pub fn register_interaction(&self) {
        self.interaction_nudge.update(|n| *n += 1);
    }

    /// Report whether the platform can switch audio output devices.
    pub fn set_audio_output_switch_available(&self, available: bool) {
        self.audio_switch_available.set_if_changed(available);
    }

    /// Report the viewport size in CSS pixels.
    pub fn set_viewport(&self, width: u32, height: u32) {
        self.viewport.set_if_changed((width, height));
    }

    /// Renderer feedback: how many tiles actually fit on screen.
    pub fn report_visible_tiles(&self, count: usize) {
        self.visible_tiles.set_if_changed(count);
    }

    /// Allow or forbid picture-in-picture layouts.
    pub fn set_pip_enabled(&self, enabled: bool) {
        self.pip_enabled.set_if_changed(enabled);
    }

    /// Record an explicit grid/spotlight selection.
    pub fn set_video_mode(&self, mode: VideoMode) {
        {
            let mut pref = self.mode_pref.lock().unwrap_or_else(PoisonError::into_inner);
            pref.select(mode);
        }
        self.mode_nudge.update(|n| *n += 1);
    }

    /// Observe a reaction event. Returns whether it was accepted.
    pub fn observe_reaction(&self, id: ParticipantId, kind: impl Into<String>) -> bool {
        let accepted = {
            let mut board = self.board.lock().unwrap_or_else(PoisonError::into_inner);
            board.observe(id, kind, tokio::time::Instant::now())
        };
        if accepted {
            let active =
                self.board.lock().unwrap_or_else(PoisonError::into_inner).active().clone();
            self.reactions.set_if_changed(active);
        }
        accepted
    }

    /// Composite local member state.
    pub fn local_state(&self) -> &Behavior<LocalMemberState> {
        self.membership.state()
    }

    /// Current device intent.
    pub fn intent(&self) -> &Behavior<DeviceIntent> {
        self.membership.intent()
    }

    /// Tagged participants, epoch-stamped with their roster snapshot.
    pub fn participants(&self) -> &Behavior<Epoch<Vec<TaggedParticipant>>> {
        &self.participants
    }

    /// Number of participants, the local member included.
    pub fn participant_count(&self) -> &Behavior<usize> {
        &self.participant_count
    }

    /// Audio routing: one entry per live connection with the participants
    /// heard through it.
    pub fn audio_routes(&self) -> &Behavior<Vec<AudioRoute>> {
        &self.audio_routes
    }

    /// The raised-hands map, keyed by participant identity.
    pub fn raised_hands(&self) -> &Behavior<HashMap<ParticipantId, Instant>> {
        &self.raised_hands
    }

    /// Whether the header should be rendered.
    pub fn show_header(&self) -> &Behavior<bool> {
        &self.show_header
    }

    /// Whether the footer should be rendered.
    pub fn show_footer(&self) -> &Behavior<bool> {
        &self.show_footer
    }

    /// Whether an audio-output switch control should be offered.
    pub fn audio_output_switch_available(&self) -> &Behavior<bool> {
        &self.audio_switch_available
    }

    /// Active connections, in required-transport order.
    pub fn connections(&self) -> &Behavior<Vec<Connection>> {
        self.manager.connections()
    }

    /// The current spotlight target.
    pub fn spotlight(&self) -> &Behavior<Option<ParticipantId>> {
        &self.spotlight
    }

    /// The current layout snapshot.
    pub fn layout(&self) -> &Behavior<LayoutSnapshot> {
        &self.layout
    }

    /// Active reactions per participant.
    pub fn reactions(&self) -> &Behavior<HashMap<ParticipantId, ActiveReaction>> {
        &self.reactions
    }

    /// Subscribe to sound-effect pulses.
    pub fn sounds(&self) -> broadcast::Receiver<SoundKind> {
        self.sounds.subscribe()
    }

    /// The retained fatal error, if any.
    pub fn fatal_error(&self) -> &Behavior<Option<CallError>> {
        self.errors.fatal()
    }

    /// The most recent soft error, if any.
    pub fn soft_error(&self) -> &Behavior<Option<CallError>> {
        self.errors.soft()
    }

    /// End the call: tears down connections, devices, and every task.
    pub fn end(&self) {
        self.scope.end();
    }
}

/// Map tagged participants to layout media items.
///
/// Every participant gets a camera tile (avatar tile while waiting for
/// media); a screen-sharing participant additionally gets a presenter
/// tile. A raised hand promotes a silent tile ahead of plain video.
fn media_items(
    participants: &[TaggedParticipant],
    raised: &HashMap<ParticipantId, Instant>,
    local_screen_share: bool,
) -> Vec<MediaItem> {
    let mut items = Vec::new();
    for participant in participants {
        match participant {
            TaggedParticipant::Local { membership } => {
                items.push(MediaItem {
                    id: TileId::new("local"),
                    participant: membership.participant_id(),
                    bin: SortingBin::SelfTile,
                    screen_share: false,
                });
                if local_screen_share {
                    items.push(MediaItem {
                        id: TileId::new("local:screen"),
                        participant: membership.participant_id(),
                        bin: SortingBin::Presenter,
                        screen_share: true,
                    });
                }
            },
            TaggedParticipant::Remote { membership, participant } => {
                let id = membership.participant_id();
                let bin = match participant {
                    Some(media) if media.speaking => SortingBin::Speaker,
                    _ if raised.contains_key(&id) => SortingBin::HandRaised,
                    Some(media) if media.has_video => SortingBin::Video,
                    _ => SortingBin::NoVideo,
                };
                items.push(MediaItem {
                    id: TileId::new(id.to_string()),
                    participant: id.clone(),
                    bin,
                    screen_share: false,
                });
                if let Some(media) = participant {
                    if media.screen_sharing {
                        items.push(MediaItem {
                            id: TileId::new(format!("{id}:screen")),
                            participant: id,
                            bin: SortingBin::Presenter,
                            screen_share: true,
                        });
                    }
                }
            },
        }
    }
    items
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use confab_core::{DeviceId, TransportSelector, UserId};
    use url::Url;

    use super::*;

    fn member(user: &str, device: &str) -> Membership {
        Membership {
            user_id: UserId::new(user),
            device_id: DeviceId::new(device),
            event_id: format!("$ev-{user}"),
            selector: TransportSelector::Declared(confab_core::Transport::new(
                Url::parse("https://sfu.example.org").expect("valid test url"),
                "!call:example.org",
            )),
        }
    }

    fn remote_media(user: &str, device: &str, speaking: bool, sharing: bool) -> RemoteParticipant {
        RemoteParticipant {
            identity: ParticipantId::new(UserId::new(user), DeviceId::new(device)),
            speaking,
            has_video: true,
            screen_sharing: sharing,
        }
    }

    #[test]
    fn media_items_map_bins_and_screen_shares() {
        let tagged = vec![
            TaggedParticipant::Local { membership: member("@me:x", "LOCAL") },
            TaggedParticipant::Remote {
                membership: member("@talker:x", "D1"),
                participant: Some(remote_media("@talker:x", "D1", true, false)),
            },
            TaggedParticipant::Remote {
                membership: member("@sharer:x", "D2"),
                participant: Some(remote_media("@sharer:x", "D2", false, true)),
            },
            TaggedParticipant::Remote {
                membership: member("@waiting:x", "D3"),
                participant: None,
            },
        ];

        let items = media_items(&tagged, &HashMap::new(), false);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].bin, SortingBin::SelfTile);
        assert_eq!(items[1].bin, SortingBin::Speaker);
        assert_eq!(items[2].bin, SortingBin::Video);
        assert!(items[3].screen_share);
        assert_eq!(items[3].bin, SortingBin::Presenter);
        assert_eq!(items[4].bin, SortingBin::NoVideo);
    }

    #[tokio::test]
    async fn raised_hands_and_local_shares_get_their_own_bins() {
        let tagged = vec![
            TaggedParticipant::Local { membership: member("@me:x", "LOCAL") },
            TaggedParticipant::Remote {
                membership: member("@quiet:x", "D1"),
                participant: Some(remote_media("@quiet:x", "D1", false, false)),
            },
        ];
        let raised: HashMap<ParticipantId, Instant> = [(
            ParticipantId::new(UserId::new("@quiet:x"), DeviceId::new("D1")),
            Instant::now(),
        )]
        .into_iter()
        .collect();

        let items = media_items(&tagged, &raised, true);
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].id, TileId::new("local:screen"));
        assert_eq!(items[1].bin, SortingBin::Presenter);
        assert!(items[1].screen_share);
        assert_eq!(items[2].bin, SortingBin::HandRaised);
    }

    #[test]
    fn default_layout_snapshot_is_an_empty_grid() {
        let snapshot = LayoutSnapshot::default();
        assert_eq!(snapshot.layout, Layout::Grid { tiles: Vec::new() });
        assert_eq!(snapshot.generation, 0);
    }
}
