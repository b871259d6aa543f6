//! Host request context and probe interface
//!
//! The profiler never reads ambient host state. Everything it consumes is
//! either collected once into an immutable [`RequestContext`] before
//! profiling starts, or pulled through the read-only [`HostProbe`] trait
//! the host implements. The host registers the profiler's tick/finalize
//! callbacks with its own interruption machinery; granularity is bounded
//! by how often the host interrupts execution, not by wall-clock
//! precision.

use std::path::PathBuf;
use std::time::Instant;

use crate::stack::StackFrame;

/// Immutable identity of the request being profiled, collected once by
/// the host glue before profiling starts.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request URL (path + query)
    pub url: String,
    /// Client address, forwarded-for aware (see [`resolve_client_ip`])
    pub client_ip: String,
    /// Absolute path of the executing entry script
    pub entry_script: PathBuf,
    /// Host process id
    pub pid: u32,
}

/// Per-tick execution mode signals supplied by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionFlags {
    /// A themed front-end render is in flight
    pub themed_render: bool,
    /// The request is a background job
    pub background_job: bool,
    /// The request targets an admin screen
    pub admin: bool,
}

/// Read-only signals the profiler consumes from the host runtime.
pub trait HostProbe {
    /// High-resolution wall clock.
    fn now(&self) -> Instant;

    /// Call stack at the current interruption point, innermost frame
    /// first per host convention.
    fn call_stack(&self) -> Vec<StackFrame>;

    /// Execution mode flags as currently known to the host.
    fn execution_flags(&self) -> ExecutionFlags;

    /// Peak memory usage of the request so far, in bytes.
    fn memory_peak_bytes(&self) -> u64;

    /// Number of data-store queries issued so far.
    fn query_count(&self) -> u64;
}

/// Pick the client address, preferring the first hop of a comma-separated
/// forwarded-for header over the socket's remote address.
pub fn resolve_client_ip(remote_addr: &str, forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| remote_addr.to_string())
}
