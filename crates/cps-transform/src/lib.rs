//! Continuation-passing-style source-to-source transformer.
//!
//! Pipeline: [`ast::parse_source`] → [`lower::lower_module`] →
//! [`scope::analyze`] → [`emit::emit_module`]. [`transform`] wires the four
//! stages together for one file's worth of surface source.

pub mod ast;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lower;
pub mod scope;
pub mod trampoline;

pub use error::{ErrorKind, TransformError, TransformResult};
pub use trampoline::SCHEDULER_RUNTIME;

use trampoline::{ContinuationEncoder, Direct, Trampoline};

/// Default prefix identifying a "CPS" function or call by name
/// (spec §4.2.1, `name_is_cps`).
pub const DEFAULT_CPS_PREFIX: &str = "cps_";

#[derive(Debug, Clone)]
pub struct Options {
    /// Functions and calls whose name starts with this prefix are treated
    /// as CPS (spec §4.1). Defaults to `"cps_"`.
    pub cps_prefix: String,
    /// Emit the trampolined variant: continuation invocations go through
    /// `schedule`/`run` instead of calling directly (spec §4.5).
    pub trampoline: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cps_prefix: DEFAULT_CPS_PREFIX.to_string(),
            trampoline: false,
        }
    }
}

/// Transforms one file's surface source into its CPS-lowered form.
///
/// Parse failures, unsupported constructs, and IR invariant violations all
/// come back as a single fatal [`TransformError`] — there is no partial
/// output for a file that fails (spec §7).
pub fn transform(source: &str, options: &Options) -> TransformResult<String> {
    let module = ast::parse_source(source)?;

    let encoder: Box<dyn ContinuationEncoder> = if options.trampoline {
        Box::new(Trampoline)
    } else {
        Box::new(Direct)
    };

    let tree = lower::lower_module(&module, source, &options.cps_prefix, encoder.as_ref())?;
    scope::analyze(&tree);

    let mut writer = emit::Writer::new();
    emit::emit_module(&tree, &mut writer);
    let body = writer.into_source();

    if options.trampoline {
        Ok(format!("\nfrom scheduler import schedule, run\n\n{body}\nrun()\n"))
    } else {
        Ok(body)
    }
}
