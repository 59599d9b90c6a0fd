use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use pairmatch_core::{
    CardId, CardPack, ControllerConfig, Dealer, DeferredUnflip, GameState, GameStatus, Intent, PairCount, PlayerId,
    Reconciliation, Scores, reconcile, reduce,
};
use pairmatch_protocol::{
    Cursor, IntentEnvelope, PeerId, PresenceMap, PresenceRecord, Room, RoomCode, RoomConfig, RoomStatus,
    RoomUpdate,
};
use web_time::Instant;

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    /// Seat played by this role, fixed for the life of the room.
    pub const fn seat(self) -> PlayerId {
        match self {
            Self::Host => PlayerId::One,
            Self::Guest => PlayerId::Two,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Syncing,
    Authoritative,
    Mirroring,
    Closed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionConfig {
    pub controller: ControllerConfig,
    pub monitor: MonitorConfig,
}

type Inbox<T> = Rc<RefCell<VecDeque<T>>>;

/// Drives one side of a networked game over a [`RoomGateway`].
///
/// The host is the only peer whose engine output reaches the room document.
/// The guest forwards its intents through `Room::guest_inputs`, shows single
/// flips optimistically in an overlay and replaces its state wholesale with
/// whatever the host publishes.
///
/// Gateway callbacks only queue; nothing changes until [`pump`](Self::pump)
/// or [`poll_presence`](Self::poll_presence) is called from the event loop.
pub struct OnlineController<G> {
    gateway: G,
    role: Role,
    peer_id: PeerId,
    room_code: RoomCode,
    room_config: RoomConfig,
    config: SessionConfig,
    connection: ConnectionState,
    room: Option<Room>,
    confirmed: Option<GameState>,
    overlay: Option<GameState>,
    awaiting_seq: Option<u64>,
    second_flip_in_flight: bool,
    state_inbox: Inbox<Option<Room>>,
    presence_inbox: Inbox<PresenceMap>,
    subscriptions: Vec<Subscription>,
    dealer: Dealer,
    unflip: DeferredUnflip,
    next_input_seq: u64,
    outbox: Vec<IntentEnvelope>,
    applied_input_seq: u64,
    config_dirty: bool,
    monitor: DisconnectMonitor,
    opponent: Option<PeerId>,
    presence: PresenceMap,
    connection_error: Option<GatewayError>,
    room_closed: bool,
}

impl<G: RoomGateway + PresenceChannel> OnlineController<G> {
    /// Opens a lobby with a freshly dealt board.
    pub fn host(
        gateway: G,
        peer_id: impl Into<PeerId>,
        room_code: RoomCode,
        room_config: RoomConfig,
        config: SessionConfig,
    ) -> Self {
        let mut dealer = Dealer::from_config(config.controller.seed);
        let cards = dealer.deal(&room_config.game);
        let game = GameState::new(room_config.game.clone(), cards);
        Self::build(gateway, Role::Host, peer_id.into(), room_code, room_config, config, dealer, Some(game))
    }

    /// Opens a lobby with a board prepared by the caller.
    pub fn host_with_game(
        gateway: G,
        peer_id: impl Into<PeerId>,
        room_code: RoomCode,
        room_config: RoomConfig,
        game: GameState,
        config: SessionConfig,
    ) -> Self {
        let dealer = Dealer::from_config(config.controller.seed);
        Self::build(gateway, Role::Host, peer_id.into(), room_code, room_config, config, dealer, Some(game))
    }

    pub fn guest(gateway: G, peer_id: impl Into<PeerId>, room_code: RoomCode, config: SessionConfig) -> Self {
        let dealer = Dealer::from_config(config.controller.seed);
        Self::build(
            gateway,
            Role::Guest,
            peer_id.into(),
            room_code,
            RoomConfig::default(),
            config,
            dealer,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        gateway: G,
        role: Role,
        peer_id: PeerId,
        room_code: RoomCode,
        room_config: RoomConfig,
        config: SessionConfig,
        dealer: Dealer,
        game: Option<GameState>,
    ) -> Self {
        let monitor = DisconnectMonitor::new(config.monitor.clone());
        Self {
            gateway,
            role,
            peer_id,
            room_code,
            room_config,
            config,
            connection: ConnectionState::Disconnected,
            room: None,
            confirmed: game,
            overlay: None,
            awaiting_seq: None,
            second_flip_in_flight: false,
            state_inbox: Rc::default(),
            presence_inbox: Rc::default(),
            subscriptions: Vec::new(),
            dealer,
            unflip: DeferredUnflip::default(),
            next_input_seq: 0,
            outbox: Vec::new(),
            applied_input_seq: 0,
            config_dirty: false,
            monitor,
            opponent: None,
            presence: PresenceMap::new(),
            connection_error: None,
            room_closed: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self.role, Role::Host)
    }

    /// What the UI should draw: the optimistic overlay when there is one.
    pub fn game_state(&self) -> Option<&GameState> {
        self.overlay.as_ref().or(self.confirmed.as_ref())
    }

    /// Last state confirmed by the authority, without local guesses.
    pub fn confirmed_state(&self) -> Option<&GameState> {
        self.confirmed.as_ref()
    }

    pub fn scores(&self) -> Option<Scores> {
        self.confirmed.as_ref().map(GameState::scores)
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn room_status(&self) -> Option<RoomStatus> {
        self.room.as_ref().map(|room| room.status)
    }

    pub fn room_config(&self) -> &RoomConfig {
        self.room.as_ref().map_or(&self.room_config, |room| &room.config)
    }

    pub fn connection_error(&self) -> Option<&GatewayError> {
        self.connection_error.as_ref()
    }

    pub fn room_closed(&self) -> bool {
        self.room_closed
    }

    pub fn opponent_disconnected(&self) -> bool {
        self.opponent
            .as_deref()
            .is_some_and(|peer| self.monitor.is_disconnected(peer))
    }

    pub fn opponent_presence(&self) -> Option<&PresenceRecord> {
        self.presence.get(self.opponent.as_deref()?)
    }

    /// The opponent went silent on its own turn and the authority may move the game on.
    pub fn can_force_resolve(&self) -> bool {
        let Some(state) = self.confirmed.as_ref() else {
            return false;
        };
        self.connection == ConnectionState::Authoritative
            && self.opponent_disconnected()
            && state.status() == GameStatus::Playing
            && state.current_player() != self.role.seat()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.unflip.due_at()
    }

    /// Connects, subscribes and announces this peer; also used to resume after a failure.
    pub fn enter(&mut self) -> Result<()> {
        if self.connection == ConnectionState::Closed {
            return Err(GatewayError::Closed);
        }
        self.connection = ConnectionState::Connecting;
        log::info!("{:?} {} connecting to room {}", self.role, self.peer_id, self.room_code);
        if let Err(err) = self.gateway.connect() {
            self.connection = ConnectionState::Disconnected;
            return Err(self.fail(err));
        }
        self.connection_error = None;

        // the room exists once, a resume never writes it again
        if self.role == Role::Host
            && self.room.is_none()
            && let Some(game) = self.confirmed.clone()
        {
            let room = Room::new(
                self.room_code.clone(),
                self.peer_id.clone(),
                self.room_config.clone(),
                game,
            );
            if let Err(err) = self.write(RoomUpdate::Create(room.clone())) {
                self.connection = ConnectionState::Disconnected;
                return Err(err);
            }
            self.room = Some(room);
        }

        self.subscribe();
        self.connection = ConnectionState::Syncing;

        match self.role {
            // resuming, the echo decides who is ahead
            Role::Host => Ok(()),
            Role::Guest => {
                self.write(RoomUpdate::GuestJoined {
                    guest_id: self.peer_id.clone(),
                })?;
                if self.outbox.is_empty() {
                    Ok(())
                } else {
                    self.write(RoomUpdate::GuestInputs(self.outbox.clone()))
                }
            }
        }
    }

    /// Explicit user-triggered reconnect; there is no automatic retry.
    pub fn retry(&mut self) -> Result<()> {
        log::info!("Retrying connection to room {}", self.room_code);
        self.enter()
    }

    /// Tears the session down: callbacks and timers go first so nothing stale can fire.
    pub fn leave(&mut self) {
        if self.connection == ConnectionState::Closed {
            return;
        }
        self.teardown();
        let farewell = match self.role {
            Role::Host => RoomUpdate::Close,
            Role::Guest => RoomUpdate::GuestLeft,
        };
        if self.room.is_some()
            && !self.room_closed
            && let Err(err) = self.gateway.set_state(farewell)
        {
            log::warn!("Could not announce leaving room {}: {err}", self.room_code);
        }
        self.gateway.disconnect();
        log::info!("{:?} {} left room {}", self.role, self.peer_id, self.room_code);
    }

    /// Processes queued room snapshots and due timers; returns whether the view changed.
    pub fn pump(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Some(room) = self.next_room() {
            changed |= self.receive(room, now);
        }
        if let Some(pair) = self.unflip.take_due(now) {
            changed |= self.resolve_mismatch(pair);
        }
        changed
    }

    /// Publishes this peer's heartbeat and cursor.
    pub fn heartbeat(&mut self, now_ms: u64, cursor: Option<Cursor>) -> Result<()> {
        if self.connection == ConnectionState::Closed {
            return Err(GatewayError::Closed);
        }
        let record = PresenceRecord::heartbeat(self.peer_id.clone(), now_ms).with_cursor(cursor);
        self.gateway.publish_presence(record).map_err(|err| self.fail(err))
    }

    /// Feeds queued presence into the monitor and runs a liveness check.
    ///
    /// Returns whether the opponent-disconnected flag changed.
    pub fn poll_presence(&mut self, now_ms: u64) -> bool {
        let before = self.opponent_disconnected();
        while let Some(presence) = self.next_presence() {
            for change in self.monitor.observe(&presence, now_ms) {
                log::debug!("Liveness change in room {}: {change:?}", self.room_code);
            }
            self.presence = presence;
        }
        for change in self.monitor.check(now_ms) {
            log::debug!("Liveness change in room {}: {change:?}", self.room_code);
        }
        before != self.opponent_disconnected()
    }

    /// Wholesale replacement with an authoritative snapshot; regressions are dropped.
    pub fn set_full_game_state(&mut self, game: GameState) -> Reconciliation {
        let outcome = reconcile(self.confirmed.as_ref(), &game);
        match outcome {
            Reconciliation::Applied => {
                log::trace!(
                    "Applied game state round {} revision {}",
                    game.round(),
                    game.revision()
                );
                self.confirmed = Some(game);
                // forwarded inputs stay in flight until acknowledged
                self.overlay = None;
            }
            Reconciliation::Unchanged => {
                log::trace!("Game state unchanged, nothing to apply");
            }
            Reconciliation::Stale => {}
        }
        outcome
    }

    /// Single entry point for UI intents; returns whether the intent was taken.
    pub fn dispatch(&mut self, intent: Intent, now: Instant) -> bool {
        match self.connection {
            ConnectionState::Authoritative => {
                let changed = self.apply_as_authority(&intent, self.role.seat(), now);
                if changed {
                    self.publish();
                }
                changed
            }
            ConnectionState::Mirroring => self.forward(intent),
            other => {
                log::debug!("Ignoring {intent:?} while {other:?}");
                false
            }
        }
    }

    pub fn flip_card(&mut self, card_id: CardId, now: Instant) -> bool {
        self.dispatch(Intent::Flip { card_id }, now)
    }

    pub fn reset_game(&mut self, now: Instant) -> bool {
        self.dispatch(Intent::Reset, now)
    }

    pub fn initialize_game(&mut self, pair_count: PairCount, card_pack: CardPack, now: Instant) -> bool {
        self.dispatch(
            Intent::Initialize {
                pair_count,
                card_pack,
            },
            now,
        )
    }

    pub fn start_game_with_first_player(&mut self, player: PlayerId, now: Instant) -> bool {
        self.dispatch(Intent::StartWithFirstPlayer { player }, now)
    }

    pub fn end_game_early(&mut self, now: Instant) -> bool {
        self.dispatch(Intent::EndEarly, now)
    }

    pub fn trigger_game_finish(&mut self, now: Instant) -> bool {
        self.dispatch(Intent::TriggerFinish, now)
    }

    pub fn force_resolve_turn(&mut self, now: Instant) -> bool {
        self.dispatch(Intent::ForceResolve, now)
    }

    pub fn update_player_name(&mut self, player: PlayerId, name: impl Into<String>, now: Instant) -> bool {
        self.dispatch(
            Intent::RenamePlayer {
                player,
                name: name.into(),
            },
            now,
        )
    }

    pub fn update_player_color(&mut self, player: PlayerId, color: impl Into<String>, now: Instant) -> bool {
        self.dispatch(
            Intent::RecolorPlayer {
                player,
                color: color.into(),
            },
            now,
        )
    }

    fn receive(&mut self, room: Option<Room>, now: Instant) -> bool {
        if self.connection == ConnectionState::Closed {
            return false;
        }
        let Some(room) = room else {
            return self.room_gone();
        };
        if room.room_code != self.room_code {
            log::warn!("Ignoring snapshot of room {} in room {}", room.room_code, self.room_code);
            return false;
        }
        match self.role {
            Role::Host => self.receive_as_host(room, now),
            Role::Guest => self.receive_as_guest(room),
        }
    }

    fn receive_as_host(&mut self, room: Room, now: Instant) -> bool {
        let mut changed = false;
        let mut needs_publish = false;

        if self.connection == ConnectionState::Syncing {
            self.connection = ConnectionState::Authoritative;
            log::info!("Hosting room {} as authoritative peer", self.room_code);
            self.applied_input_seq = self.applied_input_seq.max(room.applied_input_seq);
            match reconcile(self.confirmed.as_ref(), &room.game) {
                Reconciliation::Applied => {
                    changed |= self.adopt(room.game.clone(), now);
                }
                Reconciliation::Stale => needs_publish = true,
                Reconciliation::Unchanged => {}
            }
        } else if self.confirmed.as_ref() != Some(&room.game) {
            log::trace!("Document lags local state in room {}", self.room_code);
        }

        self.track_opponent(room.guest_id.clone());

        let inputs: Vec<IntentEnvelope> = room
            .unapplied_inputs()
            .filter(|input| input.seq > self.applied_input_seq)
            .cloned()
            .collect();
        let guest = room.guest_id.clone();
        self.room = Some(room);

        for input in inputs {
            self.applied_input_seq = input.seq;
            needs_publish = true;
            if guest.as_deref() != Some(input.from.as_str()) {
                log::warn!("Dropping input {} from non-member {}", input.seq, input.from);
                continue;
            }
            log::trace!("Applying guest input {}: {:?}", input.seq, input.intent);
            changed |= self.apply_as_authority(&input.intent, Role::Guest.seat(), now);
        }

        if needs_publish {
            self.publish();
        }
        changed
    }

    fn receive_as_guest(&mut self, room: Room) -> bool {
        let mut changed = false;

        if self.connection == ConnectionState::Syncing {
            // keep numbering above anything a previous guest used
            self.next_input_seq = self.next_input_seq.max(room.applied_input_seq);
            if room.guest_id.as_deref() == Some(self.peer_id.as_str()) {
                self.connection = ConnectionState::Mirroring;
                log::info!("Joined room {} as mirroring peer", self.room_code);
            }
        } else if room.guest_id.as_deref() != Some(self.peer_id.as_str()) {
            log::warn!("Seat in room {} taken over by {:?}", self.room_code, room.guest_id);
            self.room_closed = true;
            self.teardown();
            self.gateway.disconnect();
            return true;
        }

        self.track_opponent(Some(room.host_id.clone()));
        self.outbox.retain(|input| input.seq > room.applied_input_seq);

        changed |= self.set_full_game_state(room.game.clone()).has_update();
        if self
            .awaiting_seq
            .is_some_and(|seq| room.applied_input_seq >= seq)
        {
            changed |= self.overlay.is_some();
            self.clear_overlay();

        }
        self.room = Some(room);
        changed
    }

    fn room_gone(&mut self) -> bool {
        if self.room.is_none() {
            return false;
        }
        log::info!("Room {} closed", self.room_code);
        self.room_closed = true;
        self.teardown();
        self.gateway.disconnect();
        true
    }

    /// Host-side state replacement on resume; restarts the unflip timer if a mismatch is open.
    fn adopt(&mut self, game: GameState, now: Instant) -> bool {
        self.unflip.cancel();
        let pending = game.pending_cards();
        if let [first, second] = pending.as_slice() {
            self.unflip
                .schedule(now, self.config.controller.mismatch_delay, (*first, *second));
        }
        self.set_full_game_state(game).has_update()
    }

    fn permits(&self, state: &GameState, intent: &Intent, seat: PlayerId) -> bool {
        match intent {
            Intent::Flip { .. } => state.current_player() == seat,
            Intent::ForceResolve => seat == self.role.seat() && self.can_force_resolve(),
            Intent::RenamePlayer { player, .. } | Intent::RecolorPlayer { player, .. } => *player == seat,
            _ => true,
        }
    }

    fn apply_as_authority(&mut self, intent: &Intent, seat: PlayerId, now: Instant) -> bool {
        let Some(state) = self.confirmed.as_ref() else {
            return false;
        };
        if !self.permits(state, intent, seat) {
            log::debug!("Rejecting {intent:?} from seat {seat}");
            return false;
        }
        if intent.replaces_board() && self.unflip.cancel() {
            log::debug!("Cancelled pending unflip for new board");
        }
        let Some(state) = self.confirmed.as_mut() else {
            return false;
        };
        let effect = match reduce(state, intent, &mut self.dealer) {
            Ok(effect) => effect,
            Err(err) => {
                log::warn!("Ignoring {intent:?} from seat {seat}: {err}");
                return false;
            }
        };
        if let Some(pair) = effect.pending_unflip() {
            self.unflip
                .schedule(now, self.config.controller.mismatch_delay, pair);
        }
        if matches!(intent, Intent::ForceResolve | Intent::EndEarly) {
            self.unflip.cancel();
        }
        if matches!(intent, Intent::Initialize { .. }) && self.room_config.game != *state.config() {
            self.room_config.game = state.config().clone();
            self.config_dirty = true;
        }
        effect.has_update()
    }

    fn forward(&mut self, intent: Intent) -> bool {
        let seat = self.role.seat();
        let Some(view) = self.game_state() else {
            return false;
        };

        let mut optimistic = None;
        let mut second_flip = false;
        match &intent {
            Intent::Flip { card_id } => {
                if view.current_player() != seat {
                    log::debug!("Ignoring flip of {card_id}, not our turn");
                    return false;
                }
                if !view.can_flip(*card_id) || self.second_flip_in_flight {
                    log::debug!("Ignoring flip of {card_id}, card unavailable or pair in flight");
                    return false;
                }
                if view.pending_cards().is_empty() {
                    let mut overlay = view.clone();
                    overlay.reveal(*card_id);
                    optimistic = Some(overlay);
                } else {
                    second_flip = true;
                }
            }
            Intent::ForceResolve => {
                log::debug!("Only the authoritative peer can force a turn");
                return false;
            }
            Intent::RenamePlayer { player, .. } | Intent::RecolorPlayer { player, .. } if *player != seat => {
                log::debug!("Ignoring change to seat {player}, not ours");
                return false;
            }
            _ => {}
        }

        let seq = self.next_input_seq + 1;
        self.outbox.push(IntentEnvelope {
            seq,
            from: self.peer_id.clone(),
            intent,
        });
        if self.write(RoomUpdate::GuestInputs(self.outbox.clone())).is_err() {
            self.outbox.pop();
            return false;
        }

        self.next_input_seq = seq;
        self.awaiting_seq = Some(seq);
        self.second_flip_in_flight |= second_flip;
        if let Some(overlay) = optimistic {
            self.overlay = Some(overlay);
        }
        true
    }

    fn resolve_mismatch(&mut self, pair: (CardId, CardId)) -> bool {
        let Some(state) = self.confirmed.as_mut() else {
            return false;
        };
        if !state.unflip_pending() {
            return false;
        }
        log::trace!("Turned {pair:?} back down in room {}", self.room_code);
        if self.connection == ConnectionState::Authoritative {
            self.publish();
        }
        true
    }

    /// Pushes every host-owned field; failures only raise the connection-error flag.
    fn publish(&mut self) {
        if self.config_dirty {
            if self.write(RoomUpdate::Config(self.room_config.clone())).is_err() {
                return;
            }
            self.config_dirty = false;
        }
        let Some(game) = self.confirmed.clone() else {
            return;
        };
        let update = RoomUpdate::Authoritative {
            status: game.status().into(),
            game,
            applied_input_seq: self.applied_input_seq,
        };
        let _ = self.write(update);
    }

    fn write(&mut self, update: RoomUpdate) -> Result<()> {
        self.gateway.set_state(update).map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: GatewayError) -> GatewayError {
        log::error!("Room {} transport failure: {err}", self.room_code);
        self.connection_error = Some(err.clone());
        err
    }

    fn subscribe(&mut self) {
        self.subscriptions.clear();
        let inbox = Rc::clone(&self.state_inbox);
        let state = self.gateway.subscribe_to_state(Box::new(move |room: Option<&Room>| {
            inbox.borrow_mut().push_back(room.cloned());
        }));
        let inbox = Rc::clone(&self.presence_inbox);
        let presence = self.gateway.subscribe_to_presence(Box::new(move |presence: &PresenceMap| {
            inbox.borrow_mut().push_back(presence.clone());
        }));
        self.subscriptions = vec![state, presence];
    }

    fn teardown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.unflip.cancel();
        self.state_inbox.borrow_mut().clear();
        self.presence_inbox.borrow_mut().clear();
        self.monitor.clear();
        self.opponent = None;
        self.connection = ConnectionState::Closed;
    }

    fn track_opponent(&mut self, opponent: Option<PeerId>) {
        if self.opponent == opponent {
            return;
        }
        if let Some(previous) = self.opponent.take() {
            self.monitor.unwatch(&previous);
        }
        if let Some(peer) = &opponent {
            self.monitor.watch(peer);
        }
        self.opponent = opponent;
    }

    fn clear_overlay(&mut self) {
        self.overlay = None;
        self.awaiting_seq = None;
        self.second_flip_in_flight = false;
    }

    fn next_room(&self) -> Option<Option<Room>> {
        self.state_inbox.borrow_mut().pop_front()
    }

    fn next_presence(&self) -> Option<PresenceMap> {
        self.presence_inbox.borrow_mut().pop_front()
    }
}
