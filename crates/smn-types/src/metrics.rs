//! # smn-types::metrics
//!
//! Defines constants for metric names and labels.
//! Centralizing these constants prevents typos and ensures consistency
//! between the engine (where metrics are emitted) and consumers (external
//! dashboards scraping via `metrics-exporter-prometheus`).

// --- Metric Names ---
pub const MET_TICKS_STARTED: &str = "smn_ticks_started_total";
pub const MET_TICKS_COMPLETED: &str = "smn_ticks_completed_total";
pub const MET_BLOCKS_FIRED: &str = "smn_blocks_fired_total";
pub const MET_WAVES_EXECUTED: &str = "smn_waves_executed_total";
pub const MET_Y_RESENDS: &str = "smn_update_y_resends_total";
pub const MET_NODE_TIMED_OUT: &str = "smn_node_timed_out_total";
pub const MET_NODE_ERRORED: &str = "smn_node_errored_total";
pub const MET_LATE_EVENTS: &str = "smn_late_events_total";
pub const MET_ACK_DUPLICATE: &str = "smn_duplicate_acks_total";
pub const MET_TICK_DURATION_HISTO: &str = "smn_tick_wall_duration_ms";
pub const MET_NODES_READY_GAUGE: &str = "smn_nodes_ready";

// --- Label Keys ---
pub const LBL_NODE: &str = "node";
pub const LBL_PHASE: &str = "phase";
pub const LBL_REASON: &str = "reason";
