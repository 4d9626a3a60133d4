//! Engine: one-shot compile-and-run of a source program.
//!
//! Owns the cross-cutting services the lowerer consumes and drives the
//! pipeline: read the source into a syntax tree, lower it into a fresh JIT
//! module around a synthetic float64 entry function, finalise the module,
//! and invoke the entry.

use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use tracing::{debug, trace};

use crate::env::Env;
use crate::error::Error;
use crate::lower::Lowerer;
use crate::reader::{self, SourceLoc};
use crate::syntax::{pprint, Node, NodeKind};
use crate::types::TypeRegistry;

/// Name the synthetic entry function is declared under.
const ENTRY_NAME: &str = "__entry";

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunOutput {
    /// The entry function's result.
    pub value: f64,
    /// Generated IR listing, one function per block of text.
    pub ir: String,
}

pub struct Engine {
    env: Env,
    types: TypeRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            env: Env::new(),
            types: TypeRegistry::new(),
        }
    }

    /// Compile `source` and invoke its entry point.
    pub fn run(&mut self, source: &str) -> Result<RunOutput, Error> {
        self.env.clear();

        let nodes = reader::read_str(source).map_err(Error::Compile)?;
        debug!(forms = nodes.len(), "parsed source");
        let program = wrap_program(nodes);
        trace!(tree = %pprint(&program, true), "syntax tree");

        let mut module = new_module().map_err(Error::Backend)?;
        let (entry_id, ir) = {
            let mut lowerer = Lowerer::new(&mut module, &mut self.env, &mut self.types);
            let entry_id = lowerer
                .emit_entry(ENTRY_NAME, &program)
                .map_err(Error::Compile)?;
            (entry_id, lowerer.ir_text())
        };

        module
            .finalize_definitions()
            .map_err(|e| Error::Backend(e.to_string()))?;
        let code = module.get_finalized_function(entry_id);
        debug!("invoking entry");
        // Signature fixed by entry synthesis: extern "C" fn() -> f64.
        let entry: extern "C" fn() -> f64 = unsafe { std::mem::transmute(code) };
        let value = entry();
        Ok(RunOutput { value, ir })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn new_module() -> Result<JITModule, String> {
    let mut flags = settings::builder();
    flags
        .set("use_colocated_libcalls", "false")
        .map_err(|e| e.to_string())?;
    flags.set("is_pic", "false").map_err(|e| e.to_string())?;
    let isa = cranelift_native::builder()
        .map_err(|e| e.to_string())?
        .finish(settings::Flags::new(flags))
        .map_err(|e| e.to_string())?;
    let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    Ok(JITModule::new(builder))
}

/// A multi-form file lowers as a sequence of its forms.
fn wrap_program(mut nodes: Vec<Node>) -> Node {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        let loc = nodes.first().map(|n| n.loc).unwrap_or_else(SourceLoc::start);
        Node::new(NodeKind::List(nodes), loc)
    }
}
