// Integration test utilities
//
// Scripted host probe driving the profiler deterministically: tests
// advance the clock and swap the reported call stack between ticks.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use desglose::context::{ExecutionFlags, HostProbe};
use desglose::stack::StackFrame;

#[derive(Debug)]
struct ProbeState {
    base: Instant,
    offset: Cell<Duration>,
    stack: RefCell<Vec<StackFrame>>,
    flags: Cell<ExecutionFlags>,
    memory_peak: Cell<u64>,
    queries: Cell<u64>,
}

/// Cloned handles share state, so one clone can be handed to the
/// profiler while the test keeps another to script with.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    state: Rc<ProbeState>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            state: Rc::new(ProbeState {
                base: Instant::now(),
                offset: Cell::new(Duration::ZERO),
                stack: RefCell::new(Vec::new()),
                flags: Cell::new(ExecutionFlags {
                    themed_render: true,
                    ..ExecutionFlags::default()
                }),
                memory_peak: Cell::new(0),
                queries: Cell::new(0),
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.state.offset.set(self.state.offset.get() + by);
    }

    pub fn set_stack(&self, frames: Vec<StackFrame>) {
        *self.state.stack.borrow_mut() = frames;
    }

    pub fn set_flags(&self, flags: ExecutionFlags) {
        self.state.flags.set(flags);
    }

    pub fn set_memory_peak(&self, bytes: u64) {
        self.state.memory_peak.set(bytes);
    }

    pub fn set_queries(&self, count: u64) {
        self.state.queries.set(count);
    }
}

impl HostProbe for ScriptedProbe {
    fn now(&self) -> Instant {
        self.state.base + self.state.offset.get()
    }

    fn call_stack(&self) -> Vec<StackFrame> {
        self.state.stack.borrow().clone()
    }

    fn execution_flags(&self) -> ExecutionFlags {
        self.state.flags.get()
    }

    fn memory_peak_bytes(&self) -> u64 {
        self.state.memory_peak.get()
    }

    fn query_count(&self) -> u64 {
        self.state.queries.get()
    }
}
