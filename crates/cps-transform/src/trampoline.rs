//! The trampoline variant (spec §4.5, §5 / spec_full.md §5).
//!
//! The default lowerer encodes "invoke continuation function `name` with
//! value `value`" as a direct call: `name(value)` or `name()`. Every such
//! invocation is a tail call, and on a recursive program like
//! `original_source/tak.py`'s `cps_tak` the native call stack grows without
//! bound. The trampoline variant redirects the same invocations through an
//! external scheduler (`original_source/scheduler.py`): `schedule(name,
//! value)` appends a pending call to a queue instead of performing it, and
//! the bundled runtime's `run()` loop drains the queue, bounding the native
//! stack to the scheduler's own frame.
//!
//! This is the one seam the original's `trampoline.py` describes as a
//! subclass overriding a single method (`invoke_continuation`) on
//! `transformer`. Rust has no subclassing; the Lowerer takes a
//! `&dyn ContinuationEncoder` instead and calls through it at exactly the
//! sites that invoke a continuation function, never at sites that call a
//! user CPS function directly (`t_Call`'s CPS branch always emits a plain
//! call — see `lower::Lowerer::lower_cps_call`).

use crate::ir::{CallNode, Cont, IrNode};

/// The runtime source bundled with trampolined output (spec_full.md §5.1).
/// Grounded on `original_source/scheduler.py`: a FIFO task queue where
/// `schedule` enqueues and `run` drains it to completion.
pub const SCHEDULER_RUNTIME: &str = include_str!("../runtime/scheduler.py");

pub trait ContinuationEncoder {
    /// Builds the node that invokes continuation function `name`, optionally
    /// carrying one value. `value` is `Some` only for the `Return` path
    /// (spec §4.2 `t_Return`); every other site — the tail jump into a
    /// freshly built `kfN`/`wkfN` — invokes with none.
    fn invoke(&self, name: &str, value: Option<&str>) -> IrNode;
}

/// Direct encoding: `name(value)` / `name()`, a plain tail call.
pub struct Direct;

impl ContinuationEncoder for Direct {
    fn invoke(&self, name: &str, value: Option<&str>) -> IrNode {
        let mut vars = vec![name.to_string()];
        vars.extend(value.map(str::to_string));
        IrNode::Call(CallNode { vars, k: Cont::null() })
    }
}

/// Trampolined encoding: `schedule(name, value)` / `schedule(name)`, which
/// enqueues the call instead of performing it.
pub struct Trampoline;

impl ContinuationEncoder for Trampoline {
    fn invoke(&self, name: &str, value: Option<&str>) -> IrNode {
        let mut vars = vec!["schedule".to_string(), name.to_string()];
        vars.extend(value.map(str::to_string));
        IrNode::Call(CallNode { vars, k: Cont::null() })
    }
}
