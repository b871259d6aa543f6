//! Desglose - Request-level plugin performance profiler
//!
//! This library attributes the wall-clock time of a single request to
//! host-framework, theme, or plugin code by classifying the call stack at
//! every host interruption point, and appends a per-request summary
//! record to a shared newline-delimited JSON log. Attribution is lag-one:
//! each interval is billed to the category decided at the previous
//! interruption, because a call's duration is only knowable in arrears.

pub mod aggregator;
pub mod classifier;
pub mod context;
pub mod enablement;
pub mod profiler;
pub mod record;
pub mod recorder;
pub mod scheduler;
pub mod stack;
