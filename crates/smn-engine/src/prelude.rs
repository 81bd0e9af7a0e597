//! # smn-engine::prelude
//!
//! Re-exports the types other crates in this workspace reach for most
//! often, so `smn-cli` doesn't need to know this crate's internal module
//! layout.

pub use crate::{
    coordinator::{CancelHandle, Coordinator, CoordinatorState},
    graph::{BlockKey, ConnectionIndex, UpdateGraph},
    queue::{EventQueue, FireReason, Firing},
    registry::{Liveness, NodeRecord, NodeRegistry},
    report::{
        ChannelReportSink, FanoutReportSink, FinishReason, ReportEvent, ReportSink,
        TracingReportSink,
    },
    transport::{broker::BrokerTransport, nameserver::NameServerTransport, Endpoint, Transport},
    EngineError,
};

pub use smn_types::{self, config::*, errors::*, id::*, metrics::*, time::*};
pub use smn_proto::{self, AckStatus, Frame, MsgKind, Payload};
