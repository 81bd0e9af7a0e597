//! # smn-engine::report
//!
//! The report bus (spec.md §4.7, §6): structured progress/diagnostic events
//! the coordinator writes to an external consumer. No backpressure: the
//! sink must accept or drop, exactly as the teacher's `TelemetryBus` never
//! blocks the simulation loop on a slow consumer.

use smn_types::id::NodeId;
use smn_types::time::SimTime;
use std::sync::Arc;

/// Why a run finished (spec.md §6, §7).
#[derive(Debug, Clone)]
pub enum FinishReason {
    Completed,
    Errored {
        kind: String,
        node: Option<NodeId>,
        tick: SimTime,
    },
}

/// A structured event emitted by the coordinator (spec.md §6, §4.7).
#[derive(Debug, Clone)]
pub enum ReportEvent {
    TickStarted {
        t: SimTime,
    },
    TickCompleted {
        t: SimTime,
        fired_count: usize,
        waves: usize,
    },
    LateEvent {
        node: NodeId,
        local_id: u16,
        requested: SimTime,
        now: SimTime,
    },
    YResend {
        node: NodeId,
        t: SimTime,
    },
    NodeTimedOut {
        id: NodeId,
    },
    NodeError {
        id: NodeId,
        info: String,
    },
    Finished {
        reason: FinishReason,
    },
}

/// The sink the coordinator writes reports to (spec.md §4.7): a single
/// `write` operation, no return value, no backpressure onto the scheduler.
pub trait ReportSink: Send + Sync {
    fn write(&self, event: ReportEvent);
}

/// A sink that forwards every event to a bounded `crossbeam-channel`,
/// dropping on a full channel rather than blocking the coordinator —
/// mirroring `TelemetryBus::send_snapshot`'s `try_send`-and-drop contract.
pub struct ChannelReportSink {
    tx: crossbeam_channel::Sender<ReportEvent>,
}

impl ChannelReportSink {
    /// Returns the sink plus the receiver end for the external consumer.
    pub fn new(capacity: usize) -> (Self, crossbeam_channel::Receiver<ReportEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelReportSink {
    fn write(&self, event: ReportEvent) {
        let _ = self.tx.try_send(event);
    }
}

/// A sink that forwards every event through `tracing`, at the level the
/// ambient logging convention for this codebase assigns per spec.md §4.7's
/// informal severity grouping: lifecycle/tick events at `info`, late events
/// and resends at `warn`, node failures at `error`.
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn write(&self, event: ReportEvent) {
        match event {
            ReportEvent::TickStarted { t } => {
                tracing::info!(t, "tick started");
            }
            ReportEvent::TickCompleted {
                t,
                fired_count,
                waves,
            } => {
                tracing::info!(t, fired_count, waves, "tick completed");
            }
            ReportEvent::LateEvent {
                node,
                local_id,
                requested,
                now,
            } => {
                tracing::warn!(node, local_id, requested, now, "late event discarded");
            }
            ReportEvent::YResend { node, t } => {
                tracing::warn!(node, t, "resending SIM_Y after missed ack");
            }
            ReportEvent::NodeTimedOut { id } => {
                tracing::error!(node = id, "node timed out");
            }
            ReportEvent::NodeError { id, info } => {
                tracing::error!(node = id, info = %info, "node reported an error");
            }
            ReportEvent::Finished { reason } => match reason {
                FinishReason::Completed => tracing::info!("run finished: completed"),
                FinishReason::Errored { kind, node, tick } => {
                    tracing::error!(kind = %kind, node = ?node, tick, "run finished: errored")
                }
            },
        }
    }
}

/// Fans one event out to several sinks — useful when a run should both log
/// via `tracing` and publish to an external consumer channel.
pub struct FanoutReportSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutReportSink {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }
}

impl ReportSink for FanoutReportSink {
    fn write(&self, event: ReportEvent) {
        for sink in &self.sinks {
            sink.write(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_drops_rather_than_blocks_when_full() {
        let (sink, rx) = ChannelReportSink::new(1);
        sink.write(ReportEvent::TickStarted { t: 0 });
        sink.write(ReportEvent::TickStarted { t: 1000 }); // dropped, capacity 1
        let first = rx.try_recv().unwrap();
        assert!(matches!(first, ReportEvent::TickStarted { t: 0 }));
        assert!(rx.try_recv().is_err());
    }
}
