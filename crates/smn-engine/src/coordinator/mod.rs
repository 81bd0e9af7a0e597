//! # smn-engine::coordinator
//!
//! The coordinator (spec.md §4): owns the virtual clock, drives the
//! Setup → Init → Running → (Tick)* → Stopping → Stopped lifecycle, and
//! enforces the UPDATE_Y/UPDATE_X barrier for every tick. Mirrors the
//! teacher's `Simulation` struct in shape — clock, event queue, one
//! `CoordinatorState` tagged enum instead of a loose `SimulationState` flag
//! — but its "step" is the whole two-phase tick protocol, not a single
//! popped event.

pub mod failure;
pub mod tick;

use crate::graph::{self, BlockKey, UpdateGraph};
use crate::ids::IdGen;
use crate::queue::{EventQueue, FireReason, Firing};
use crate::registry::{Liveness, NodeRegistry};
use crate::report::{FinishReason, ReportEvent, ReportSink};
use crate::transport::{Endpoint, RecvOutcome, Transport, TransportEvent};
use failure::{Deadline, RetryTracker};
use fxhash::FxHashMap;
use smn_proto::{AckStatus, Frame, Payload};
use smn_types::{
    config::SystemConfig,
    errors::{ConfigError, NodeError, ProtocolError, RunError, TimeoutError},
    id::{BlockLocalId, NodeId},
    time::SimTime,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A handle a caller holds onto to request early termination of a running
/// coordinator from another thread. Cheap to clone; the coordinator only
/// observes it between ticks and between phases within a tick.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// The coordinator's current phase (spec.md §4). `Tick` owns the
/// in-progress wave partition so a run can be inspected mid-tick (by a test,
/// or a future debugging surface) without threading extra state through
/// every method.
pub enum CoordinatorState {
    Setup,
    Init,
    Running,
    Tick(Box<tick::TickWorkspace>),
    Stopping,
    Stopped,
    Errored,
}

/// The System Management Node's coordinator: the single authority over
/// virtual time, node liveness, and the update graph for one run.
pub struct Coordinator {
    state: CoordinatorState,
    registry: NodeRegistry,
    queue: EventQueue,
    graph: UpdateGraph,
    config: SystemConfig,
    transport: Box<dyn Transport>,
    report: Box<dyn ReportSink>,
    endpoints: FxHashMap<NodeId, Endpoint>,
    clock: SimTime,
    cancel: Arc<AtomicBool>,
    /// Irregular firings requested by nodes (via `SIM_EVENT` or an ack's
    /// `next_event_time`) during the tick currently in flight, drained into
    /// the event queue at the end of that tick (spec.md §4.5 step 6).
    pending_irregular: Vec<(NodeId, BlockLocalId, SimTime)>,
}

impl Coordinator {
    /// Validates `config`, builds the frozen registry and update graph, and
    /// returns the coordinator alongside a `CancelHandle`. `endpoints` maps
    /// each declared node to the address its transport backend should
    /// resolve; a node absent from the map registers as `Endpoint::Broker`.
    pub fn new(
        config: SystemConfig,
        endpoints: FxHashMap<NodeId, Endpoint>,
        transport: Box<dyn Transport>,
        report: Box<dyn ReportSink>,
    ) -> Result<(Self, CancelHandle), ConfigError> {
        config.validate()?;
        let mut id_gen = IdGen::new();
        let registry = NodeRegistry::from_config(&config, &mut id_gen);
        let graph = UpdateGraph::build(&registry, &config)?;
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = CancelHandle(cancel.clone());
        let coordinator = Self {
            state: CoordinatorState::Setup,
            registry,
            queue: EventQueue::new(),
            graph,
            config,
            transport,
            report,
            endpoints,
            clock: smn_types::time::SIM_EPOCH,
            cancel,
            pending_irregular: Vec::new(),
        };
        Ok((coordinator, handle))
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Drives the run to completion: setup, init handshake, the tick loop,
    /// and the stopping handshake. Returns the terminal `FinishReason`; a
    /// run that errors mid-tick still broadcasts `SIM_TERM` before
    /// returning, per spec.md §4.6.
    pub fn run(&mut self) -> FinishReason {
        if let Err(err) = self.do_setup() {
            return self.enter_errored(err);
        }
        self.state = CoordinatorState::Init;
        if let Err(err) = self.do_init() {
            return self.enter_errored(err);
        }
        self.populate_initial_schedule();
        self.state = CoordinatorState::Running;

        loop {
            if self.cancel.load(Ordering::Relaxed) || self.queue.is_empty() {
                break;
            }
            if let Err(err) = self.run_one_tick() {
                return self.enter_errored(err);
            }
            if self.clock >= self.config.final_time || self.queue.is_empty() {
                break;
            }
        }

        self.do_stopping();
        self.state = CoordinatorState::Stopped;
        let reason = FinishReason::Completed;
        self.report.write(ReportEvent::Finished {
            reason: reason.clone(),
        });
        reason
    }

    fn enter_errored(&mut self, err: RunError) -> FinishReason {
        let (kind, node) = classify_run_error(&err);
        if matches!(err, RunError::Node(_)) {
            if let Some(id) = node {
                ::metrics::counter!(
                    smn_types::metrics::MET_NODE_ERRORED,
                    smn_types::metrics::LBL_NODE => id.to_string()
                )
                .increment(1);
            }
        }
        self.transport.broadcast(tick::term_frame(self.clock));
        self.state = CoordinatorState::Errored;
        let reason = FinishReason::Errored {
            kind,
            node,
            tick: self.clock,
        };
        self.report.write(ReportEvent::Finished {
            reason: reason.clone(),
        });
        reason
    }

    /// Establishes the transport-level endpoint mapping for every declared
    /// node (spec.md §4.2). Protocol-level registration (the block-catalog
    /// handshake) happens in `do_init`, folded into the `SIM_INIT`/ack
    /// exchange rather than a separate `SYS_OPENPORT` round-trip, since
    /// ports and connections are already resolved statically from
    /// `SystemConfig` (see DESIGN.md).
    fn do_setup(&mut self) -> Result<(), RunError> {
        for node_id in self.registry.ids() {
            let endpoint = self
                .endpoints
                .get(&node_id)
                .cloned()
                .unwrap_or(Endpoint::Broker);
            self.transport.register(node_id, endpoint)?;
        }
        Ok(())
    }

    /// Sends `SIM_INIT` to every node and waits for an ack carrying its
    /// confirmed block catalog (spec.md §4.3). A missed `init_deadline` is
    /// terminal with no resend, per spec.md §4.6's table.
    fn do_init(&mut self) -> Result<(), RunError> {
        let atom_nanos = self.config.time_unit.atom_nanos();
        let mut targets: FxHashMap<NodeId, u64> = FxHashMap::default();
        for node_id in self.registry.ids() {
            let node = self.registry.get(node_id).expect("node id from ids()");
            let block_ids: Vec<BlockLocalId> = node.blocks.iter().map(|b| b.local_id).collect();
            let mask = tick::ids_to_mask(block_ids.clone());
            self.transport
                .send(node_id, tick::init_frame(0, node_id, atom_nanos, block_ids))?;
            targets.insert(node_id, mask);
        }

        let init_deadline = self.config.deadlines.init;
        let frame_for = move |node_id: NodeId, mask: u64| {
            tick::init_frame(0, node_id, atom_nanos, tick::mask_to_ids(mask))
        };
        let acked = self.collect_acks(targets, init_deadline, 1, "INIT", &frame_for)?;

        for (node_id, mask) in acked {
            let name = self
                .registry
                .get(node_id)
                .expect("node id from collect_acks pending set")
                .name
                .clone();
            let declared = tick::mask_to_ids(mask);
            self.registry.register(&name, &declared)?;
            self.registry.set_liveness(node_id, Liveness::Ready);
        }
        assert!(
            self.registry.all_registered(),
            "collect_acks returned without every INIT target registered"
        );
        self.registry.close_setup();
        Ok(())
    }

    /// Seeds the event queue with each periodic block's first firing at
    /// `t = 0`. Event-only blocks (`period == 0`) are never auto-scheduled;
    /// they fire only via trigger expansion or a node-requested event.
    fn populate_initial_schedule(&mut self) {
        for node_id in self.registry.ids() {
            let node = self.registry.get(node_id).expect("node id from ids()");
            for block in &node.blocks {
                if block.period > 0 {
                    self.queue.push(
                        0,
                        block.tiebreak_rank,
                        Firing {
                            node_id,
                            local_id: block.local_id,
                            reason: FireReason::Periodic,
                        },
                    );
                }
            }
        }
    }

    /// Runs one full tick: pop the ready set, expand triggers to a fixed
    /// point, partition into waves, drive UPDATE_Y wave by wave, broadcast
    /// UPDATE_X, then reschedule (spec.md §4.5).
    fn run_one_tick(&mut self) -> Result<(), RunError> {
        let (now, firings) = self
            .queue
            .pop_ready()
            .expect("caller checked the queue is non-empty");
        self.clock = now;
        self.report.write(ReportEvent::TickStarted { t: now });
        ::metrics::counter!(smn_types::metrics::MET_TICKS_STARTED).increment(1);

        let mut fired: Vec<BlockKey> = firings.iter().map(|f| (f.node_id, f.local_id)).collect();
        fired.sort();
        fired.dedup();

        graph::expand_triggers(&mut fired, &self.registry, &self.graph.connections)
            .map_err(|e| RunError::DependencyCycle(e.to_string()))?;

        let waves = graph::build_wave_dag(&fired, &self.registry, &self.graph.connections)
            .map_err(|e| RunError::DependencyCycle(e.to_string()))?;

        self.state = CoordinatorState::Tick(Box::new(tick::TickWorkspace::new(
            now,
            fired.clone(),
            waves.clone(),
        )));

        let y_deadline = self.config.deadlines.y;
        for wave in &waves {
            let targets = tick::group_by_node(wave);
            for (node_id, mask) in &targets {
                self.transport.send(*node_id, tick::y_frame(now, *node_id, *mask))?;
            }
            let targets_map: FxHashMap<NodeId, u64> = targets.into_iter().collect();
            let frame_for = move |node_id: NodeId, mask: u64| tick::y_frame(now, node_id, mask);
            self.collect_acks(targets_map, y_deadline, 2, "UPDATE_Y", &frame_for)?;
        }

        let x_deadline = self.config.deadlines.x;
        let mut x_targets: FxHashMap<NodeId, u64> = FxHashMap::default();
        for (node_id, local_id) in &fired {
            let wants_x = self
                .registry
                .get(*node_id)
                .map(|n| n.needs_state_update)
                .unwrap_or(false);
            if wants_x {
                *x_targets.entry(*node_id).or_insert(0) |= 1u64 << *local_id;
            }
        }
        for (node_id, mask) in &x_targets {
            self.transport.send(*node_id, tick::x_frame(now, *node_id, *mask))?;
        }
        let frame_for = move |node_id: NodeId, mask: u64| tick::x_frame(now, node_id, mask);
        self.collect_acks(x_targets, x_deadline, 2, "UPDATE_X", &frame_for)?;

        self.reschedule(now, &fired);

        ::metrics::counter!(smn_types::metrics::MET_TICKS_COMPLETED).increment(1);
        ::metrics::counter!(smn_types::metrics::MET_BLOCKS_FIRED).increment(fired.len() as u64);
        ::metrics::counter!(smn_types::metrics::MET_WAVES_EXECUTED).increment(waves.len() as u64);
        self.report.write(ReportEvent::TickCompleted {
            t: now,
            fired_count: fired.len(),
            waves: waves.len(),
        });
        self.state = CoordinatorState::Running;
        Ok(())
    }

    /// Pushes each fired periodic block's next firing, then drains the
    /// irregular firings accumulated during this tick's ack collection,
    /// discarding any whose requested time has already passed
    /// (spec.md §4.5 step 6, §4.4).
    fn reschedule(&mut self, now: SimTime, fired: &[BlockKey]) {
        for (node_id, local_id) in fired {
            let Some(node) = self.registry.get(*node_id) else {
                continue;
            };
            let Some(block) = node.block(*local_id) else {
                continue;
            };
            if block.period > 0 {
                if let Ok(next) = smn_types::time::checked_add(now, block.period) {
                    self.queue.push(
                        next,
                        block.tiebreak_rank,
                        Firing {
                            node_id: *node_id,
                            local_id: *local_id,
                            reason: FireReason::Periodic,
                        },
                    );
                }
            }
        }

        for (node_id, local_id, fire_time) in std::mem::take(&mut self.pending_irregular) {
            if fire_time <= now {
                self.report.write(ReportEvent::LateEvent {
                    node: node_id,
                    local_id,
                    requested: fire_time,
                    now,
                });
                ::metrics::counter!(
                    smn_types::metrics::MET_LATE_EVENTS,
                    smn_types::metrics::LBL_NODE => node_id.to_string()
                )
                .increment(1);
                continue;
            }
            let rank = self
                .registry
                .get(node_id)
                .and_then(|n| n.block(local_id))
                .map(|b| b.tiebreak_rank)
                .unwrap_or(0);
            self.queue.push(
                fire_time,
                rank,
                Firing {
                    node_id,
                    local_id,
                    reason: FireReason::Irregular,
                },
            );
        }
    }

    /// Broadcasts `SIM_TERM` and drains the transport for up to
    /// `term_deadline`, best-effort: a node that never replies does not
    /// change the outcome (spec.md §4.6).
    fn do_stopping(&mut self) {
        self.state = CoordinatorState::Stopping;
        self.transport.broadcast(tick::term_frame(self.clock));
        let deadline = Deadline::from_now(self.config.deadlines.term);
        while !deadline.is_expired() {
            let poll = deadline.remaining().min(Duration::from_millis(50));
            let _ = self.transport.recv(poll);
        }
    }

    /// Waits for an ack from every node in `pending`, resending via
    /// `frame_for` on a missed deadline up to `max_strikes - 1` times before
    /// escalating the node to `TimedOut` and failing the run
    /// (spec.md §4.6). Any `SIM_EVENT` or acks carrying `next_event_time`
    /// observed along the way are queued in `pending_irregular`. Returns
    /// the mask every node actually acknowledged.
    fn collect_acks(
        &mut self,
        mut pending: FxHashMap<NodeId, u64>,
        deadline_dur: Duration,
        max_strikes: u32,
        phase: &'static str,
        frame_for: &dyn Fn(NodeId, u64) -> Frame,
    ) -> Result<FxHashMap<NodeId, u64>, RunError> {
        let mut retry = RetryTracker::new();
        let mut deadline = Deadline::from_now(deadline_dur);
        let mut acked: FxHashMap<NodeId, u64> = FxHashMap::default();

        while !pending.is_empty() {
            if deadline.is_expired() {
                let stuck: Vec<(NodeId, u64)> = pending.iter().map(|(n, m)| (*n, *m)).collect();
                for (node, mask) in stuck {
                    let strikes = retry.record_resend(node);
                    if strikes < max_strikes {
                        self.report.write(ReportEvent::YResend {
                            node,
                            t: self.clock,
                        });
                        ::metrics::counter!(
                            smn_types::metrics::MET_Y_RESENDS,
                            smn_types::metrics::LBL_NODE => node.to_string(),
                            smn_types::metrics::LBL_PHASE => phase
                        )
                        .increment(1);
                        let _ = self.transport.send(node, frame_for(node, mask));
                    } else {
                        return Err(self.escalate_timeout(node, phase, strikes - 1));
                    }
                }
                deadline = Deadline::from_now(deadline_dur);
                continue;
            }

            let poll = deadline.remaining().min(Duration::from_millis(50));
            match self.transport.recv(poll) {
                RecvOutcome::Timeout => continue,
                RecvOutcome::Event(TransportEvent::Down { node_id }) => {
                    if pending.contains_key(&node_id) {
                        let strikes = retry.resend_count(node_id);
                        return Err(self.escalate_timeout(node_id, phase, strikes));
                    }
                }
                RecvOutcome::Event(TransportEvent::Message { node_id, frame }) => {
                    self.handle_incoming(node_id, frame, &mut pending, &mut acked)?;
                }
            }
        }

        Ok(acked)
    }

    fn escalate_timeout(&mut self, node: NodeId, phase: &'static str, resends: u32) -> RunError {
        self.registry.set_liveness(node, Liveness::TimedOut);
        self.queue.remove_node(node);
        self.report.write(ReportEvent::NodeTimedOut { id: node });
        ::metrics::counter!(
            smn_types::metrics::MET_NODE_TIMED_OUT,
            smn_types::metrics::LBL_NODE => node.to_string(),
            smn_types::metrics::LBL_PHASE => phase
        )
        .increment(1);
        TimeoutError::DeadlineMissed {
            node,
            phase,
            resends,
        }
        .into()
    }

    /// Classifies one incoming frame during an ack-collection phase: an
    /// expected ack is removed from `pending`; a duplicate of an already-
    /// acked mask is discarded; a node-requested future firing is queued;
    /// an error frame or an out-of-phase frame terminates the run
    /// (spec.md §4.1, §7).
    fn handle_incoming(
        &mut self,
        node_id: NodeId,
        frame: Frame,
        pending: &mut FxHashMap<NodeId, u64>,
        acked: &mut FxHashMap<NodeId, u64>,
    ) -> Result<(), RunError> {
        match frame.payload {
            Payload::Ack {
                status,
                next_event_time,
            } => {
                if let Some(expected_mask) = pending.remove(&node_id) {
                    if frame.mask != expected_mask {
                        return Err(
                            ProtocolError::UnexpectedAckMask(node_id, frame.mask, expected_mask)
                                .into(),
                        );
                    }
                    if status == AckStatus::Error {
                        return Err(NodeError {
                            node: node_id,
                            info: "node reported AckStatus::Error".to_string(),
                        }
                        .into());
                    }
                    acked.insert(node_id, frame.mask);
                    if let Some(net) = next_event_time {
                        for local_id in tick::mask_to_ids(frame.mask) {
                            self.pending_irregular.push((node_id, local_id, net as SimTime));
                        }
                    }
                } else if acked.get(&node_id) != Some(&frame.mask) && self.registry.get(node_id).is_none() {
                    return Err(ProtocolError::UnregisteredAck(node_id).into());
                }
                // Otherwise: a duplicate of an already-processed ack, or a
                // stray ack from a different phase — discarded.
            }
            Payload::Event { local_id, fire_time } => {
                self.pending_irregular
                    .push((node_id, local_id, fire_time as SimTime));
            }
            Payload::Error { info } => {
                return Err(NodeError {
                    node: node_id,
                    info,
                }
                .into());
            }
            Payload::Term => {
                // A node that has already shut down replying in-flight;
                // harmless this late in a run.
            }
            Payload::Init { .. } | Payload::Y | Payload::X => {
                return Err(ProtocolError::OutOfPhase {
                    node: node_id,
                    expected: "ack",
                    got: "init/y/x",
                }
                .into());
            }
            Payload::OpenPort { .. } | Payload::RequestConnect { .. } => {
                return Err(ProtocolError::OutOfPhase {
                    node: node_id,
                    expected: "ack",
                    got: "openport/requestconnect",
                }
                .into());
            }
        }
        Ok(())
    }
}

fn classify_run_error(err: &RunError) -> (String, Option<NodeId>) {
    match err {
        RunError::Transport(_) => ("transport".to_string(), None),
        RunError::Protocol(e) => (
            "protocol".to_string(),
            match e {
                ProtocolError::UnexpectedAckMask(n, ..) => Some(*n),
                ProtocolError::UnregisteredAck(n) => Some(*n),
                ProtocolError::OutOfPhase { node, .. } => Some(*node),
            },
        ),
        RunError::Timeout(TimeoutError::DeadlineMissed { node, .. }) => {
            ("timeout".to_string(), Some(*node))
        }
        RunError::Node(e) => ("node_error".to_string(), Some(e.node)),
        RunError::Registration(_) => ("registration".to_string(), None),
        RunError::Codec(_) => ("codec".to_string(), None),
        RunError::DependencyCycle(_) => ("dependency_cycle".to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ChannelReportSink;
    use smn_proto::MsgKind;
    use smn_types::config::{BlockSpec, ConnectionSpec, Deadlines, NodeSpec, PortDirection, PortSpec};
    use smn_types::time::TimeUnit;
    use std::collections::VecDeque;
    use std::collections::HashSet as StdHashSet;

    /// A deterministic in-process `Transport` test double: `send` answers
    /// synchronously with the ack a correctly-behaving node would return,
    /// unless the target node is in `misbehaving`, in which case the
    /// message is swallowed and no ack ever arrives.
    struct LoopbackTransport {
        registered: StdHashSet<NodeId>,
        incoming: VecDeque<TransportEvent>,
        misbehaving: StdHashSet<NodeId>,
    }

    impl LoopbackTransport {
        fn new(misbehaving: StdHashSet<NodeId>) -> Self {
            Self {
                registered: StdHashSet::new(),
                incoming: VecDeque::new(),
                misbehaving,
            }
        }
    }

    impl Transport for LoopbackTransport {
        fn register(
            &mut self,
            node_id: NodeId,
            _endpoint: Endpoint,
        ) -> Result<(), smn_types::errors::TransportError> {
            self.registered.insert(node_id);
            Ok(())
        }

        fn send(
            &mut self,
            node_id: NodeId,
            frame: Frame,
        ) -> Result<(), smn_types::errors::TransportError> {
            if self.misbehaving.contains(&node_id) {
                return Ok(());
            }
            let ack = match frame.payload {
                Payload::Init { block_ids, .. } => Frame {
                    msg_type: MsgKind::Ack,
                    sim_time: frame.sim_time,
                    node_id: frame.node_id,
                    mask: tick::ids_to_mask(block_ids),
                    payload: Payload::Ack {
                        status: AckStatus::Ok,
                        next_event_time: None,
                    },
                },
                Payload::Y | Payload::X => Frame {
                    msg_type: MsgKind::Ack,
                    sim_time: frame.sim_time,
                    node_id: frame.node_id,
                    mask: frame.mask,
                    payload: Payload::Ack {
                        status: AckStatus::Ok,
                        next_event_time: None,
                    },
                },
                _ => return Ok(()),
            };
            self.incoming
                .push_back(TransportEvent::Message { node_id, frame: ack });
            Ok(())
        }

        fn broadcast(&mut self, frame: Frame) {
            let ids: Vec<NodeId> = self.registered.iter().copied().collect();
            for id in ids {
                let _ = self.send(id, frame.clone());
            }
        }

        fn recv(&mut self, _deadline: Duration) -> RecvOutcome {
            match self.incoming.pop_front() {
                Some(event) => RecvOutcome::Event(event),
                None => RecvOutcome::Timeout,
            }
        }
    }

    fn fast_deadlines() -> Deadlines {
        Deadlines {
            init: Duration::from_millis(200),
            y: Duration::from_millis(200),
            x: Duration::from_millis(200),
            term: Duration::from_millis(20),
        }
    }

    fn periodic_node(name: &str, period: SimTime) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            needs_state_update: true,
            ports: vec![],
            blocks: vec![BlockSpec {
                local_id: 0,
                period,
                feedthrough_inputs: vec![],
                triggering_inputs: vec![],
                output_ports: vec![],
                internal_deps: vec![],
            }],
        }
    }

    #[test]
    fn single_periodic_node_ticks_through_final_time() {
        let config = SystemConfig {
            name: "single".into(),
            nodes: vec![periodic_node("a", 1000)],
            connections: vec![],
            time_unit: TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: fast_deadlines(),
        };
        let transport = Box::new(LoopbackTransport::new(StdHashSet::new()));
        let (sink, rx) = ChannelReportSink::new(64);
        let (mut coordinator, _cancel) =
            Coordinator::new(config, FxHashMap::default(), transport, Box::new(sink)).unwrap();

        let reason = coordinator.run();
        assert!(matches!(reason, FinishReason::Completed));

        let starts: Vec<SimTime> = rx
            .try_iter()
            .filter_map(|e| match e {
                ReportEvent::TickStarted { t } => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0, 1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn feedthrough_tick_completes_in_two_waves() {
        let config = SystemConfig {
            name: "ft".into(),
            nodes: vec![
                NodeSpec {
                    name: "A".into(),
                    needs_state_update: true,
                    ports: vec![PortSpec {
                        name: "y".into(),
                        direction: PortDirection::Output,
                    }],
                    blocks: vec![BlockSpec {
                        local_id: 0,
                        period: 1000,
                        feedthrough_inputs: vec![],
                        triggering_inputs: vec![],
                        output_ports: vec!["y".into()],
                        internal_deps: vec![],
                    }],
                },
                NodeSpec {
                    name: "B".into(),
                    needs_state_update: true,
                    ports: vec![PortSpec {
                        name: "u".into(),
                        direction: PortDirection::Input,
                    }],
                    blocks: vec![BlockSpec {
                        local_id: 0,
                        period: 1000,
                        feedthrough_inputs: vec!["u".into()],
                        triggering_inputs: vec![],
                        output_ports: vec![],
                        internal_deps: vec![],
                    }],
                },
            ],
            connections: vec![ConnectionSpec {
                src_node: "A".into(),
                src_port: "y".into(),
                dst_node: "B".into(),
                dst_port: "u".into(),
            }],
            time_unit: TimeUnit::Microseconds,
            final_time: 1000,
            deadlines: fast_deadlines(),
        };
        let transport = Box::new(LoopbackTransport::new(StdHashSet::new()));
        let (sink, rx) = ChannelReportSink::new(64);
        let (mut coordinator, _cancel) =
            Coordinator::new(config, FxHashMap::default(), transport, Box::new(sink)).unwrap();

        assert!(matches!(coordinator.run(), FinishReason::Completed));

        let waves: Vec<usize> = rx
            .try_iter()
            .filter_map(|e| match e {
                ReportEvent::TickCompleted { waves, .. } => Some(waves),
                _ => None,
            })
            .collect();
        assert_eq!(waves, vec![2, 2]);
    }

    #[test]
    fn unresponsive_node_times_out_and_errors_the_run() {
        let config = SystemConfig {
            name: "stuck".into(),
            nodes: vec![periodic_node("a", 1000)],
            connections: vec![],
            time_unit: TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: Deadlines {
                init: Duration::from_millis(10),
                y: Duration::from_millis(10),
                x: Duration::from_millis(10),
                term: Duration::from_millis(10),
            },
        };
        let mut misbehaving = StdHashSet::new();
        misbehaving.insert(0u32);
        let transport = Box::new(LoopbackTransport::new(misbehaving));
        let (sink, _rx) = ChannelReportSink::new(64);
        let (mut coordinator, _cancel) =
            Coordinator::new(config, FxHashMap::default(), transport, Box::new(sink)).unwrap();

        let reason = coordinator.run();
        assert!(matches!(reason, FinishReason::Errored { .. }));
    }

    #[test]
    fn duplicate_ack_with_identical_mask_is_a_noop() {
        let config = SystemConfig {
            name: "dup".into(),
            nodes: vec![periodic_node("a", 1000)],
            connections: vec![],
            time_unit: TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: fast_deadlines(),
        };
        let transport = Box::new(LoopbackTransport::new(StdHashSet::new()));
        let (sink, _rx) = ChannelReportSink::new(64);
        let (mut coordinator, _cancel) =
            Coordinator::new(config, FxHashMap::default(), transport, Box::new(sink)).unwrap();
        coordinator.do_setup().unwrap();
        coordinator.registry.close_setup();

        let mut pending: FxHashMap<NodeId, u64> = FxHashMap::default();
        pending.insert(0, 0b1);
        let mut acked: FxHashMap<NodeId, u64> = FxHashMap::default();
        let ack = Frame {
            msg_type: MsgKind::Ack,
            sim_time: 0,
            node_id: 0,
            mask: 0b1,
            payload: Payload::Ack {
                status: AckStatus::Ok,
                next_event_time: None,
            },
        };

        coordinator
            .handle_incoming(0, ack.clone(), &mut pending, &mut acked)
            .unwrap();
        assert_eq!(acked.get(&0), Some(&0b1));
        assert!(pending.is_empty());

        // The same ack arriving again (mask already removed from `pending`)
        // must be discarded rather than erroring or double-counting.
        coordinator
            .handle_incoming(0, ack, &mut pending, &mut acked)
            .unwrap();
        assert_eq!(acked.get(&0), Some(&0b1));
    }

    #[test]
    fn irregular_event_is_scheduled_unless_already_late() {
        let config = SystemConfig {
            name: "irregular".into(),
            nodes: vec![periodic_node("d", 0)],
            connections: vec![],
            time_unit: TimeUnit::Microseconds,
            final_time: 5000,
            deadlines: fast_deadlines(),
        };
        let transport = Box::new(LoopbackTransport::new(StdHashSet::new()));
        let (sink, rx) = ChannelReportSink::new(64);
        let (mut coordinator, _cancel) =
            Coordinator::new(config, FxHashMap::default(), transport, Box::new(sink)).unwrap();

        // A future-dated request at t=1500 while the clock reads t=1000
        // (spec.md §8 scenario 6) is queued for later delivery...
        coordinator.clock = 1000;
        coordinator.pending_irregular.push((0, 0, 1500));
        coordinator.reschedule(1000, &[]);
        let (fire_time, firings) = coordinator.queue.pop_ready().unwrap();
        assert_eq!(fire_time, 1500);
        assert_eq!(firings[0].node_id, 0);
        assert!(matches!(firings[0].reason, FireReason::Irregular));

        // ...while a request whose time has already passed is discarded as
        // a `LateEvent` rather than silently scheduled in the past (I1).
        coordinator.clock = 2000;
        coordinator.pending_irregular.push((0, 0, 1999));
        coordinator.reschedule(2000, &[]);
        assert!(coordinator.queue.is_empty());
        let late = rx
            .try_iter()
            .any(|e| matches!(e, ReportEvent::LateEvent { requested: 1999, now: 2000, .. }));
        assert!(late, "expected a LateEvent report for the past-dated request");
    }
}
