//! The CPS intermediate representation (spec §3).
//!
//! Nodes are built bottom-up during lowering and are immutable thereafter
//! except for a `FunctionDef`'s `assigned`/`captured` sets, which the two
//! scope-analysis passes populate in place — hence the `RefCell<IndexSet<_>>`
//! rather than plain `IndexSet<_>` on those two fields (spec §3.4).

use std::cell::RefCell;

use indexmap::IndexSet;
use ruff_python_ast::{BoolOp, CmpOp, Operator};

/// "What to do with the value this expression produces" (spec §3.1).
///
/// - Live: `name` is a fresh `vN`, `exp` is the node that consumes it.
/// - Dead: `name` is the sentinel `"_"`, `exp` runs but discards the value.
/// - Null: `name` is empty, `exp` is `None` — tail position, no successor.
#[derive(Debug, Clone)]
pub struct Cont {
    pub name: String,
    pub exp: Option<Box<IrNode>>,
}

impl Cont {
    pub fn null() -> Self {
        Cont {
            name: String::new(),
            exp: None,
        }
    }

    /// A dead continuation wrapping an already-built node, for call sites
    /// that construct the `exp` directly rather than through
    /// `Lowerer::dead_cont` (spec §3.1).
    pub fn dead(exp: IrNode) -> Self {
        Cont {
            name: "_".to_string(),
            exp: Some(Box::new(exp)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_dead(&self) -> bool {
        self.name == "_"
    }

    pub fn is_live(&self) -> bool {
        !self.name.is_empty() && self.name != "_"
    }
}

/// An attribute-access assignment target, flattened to `a.b.c` (spec §4.2,
/// "Assign"). Built by walking an `Attribute` chain down to its `Name` base.
#[derive(Debug, Clone)]
pub struct AttributePath {
    pub base: String,
    pub path: Vec<String>,
}

impl AttributePath {
    pub fn render(&self) -> String {
        let mut parts = vec![self.base.clone()];
        parts.extend(self.path.iter().cloned());
        parts.join(".")
    }
}

/// The target of an `Assign` node: either a bare name or an attribute chain
/// (spec §4.2: "Target may be a `Name` or an `Attribute` chain").
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Attribute(AttributePath),
}

impl AssignTarget {
    pub fn render(&self) -> String {
        match self {
            AssignTarget::Name(name) => name.clone(),
            AssignTarget::Attribute(path) => path.render(),
        }
    }
}

#[derive(Debug)]
pub struct ModuleNode {
    pub body: Box<IrNode>,
}

#[derive(Debug)]
pub struct ExpressionNode {
    pub body: Box<IrNode>,
    pub k: Cont,
}

#[derive(Debug)]
pub struct SequenceNode {
    pub exp: Box<IrNode>,
    pub k: Cont,
}

/// A function parameter: just a name in this surface-language subset
/// (spec_full.md §2, "Function parameters").
pub type Formal = String;

#[derive(Debug)]
pub struct FunctionDefNode {
    pub name: String,
    /// Distinguishes transformer-generated continuation functions
    /// (`kfN`/`wkfN`) from user functions (spec §3.2).
    pub is_kfun: bool,
    pub formals: Vec<Formal>,
    pub decorators: Vec<String>,
    pub body: Box<IrNode>,
    pub k: Cont,
    /// Names assigned anywhere in this function's body (pass 1).
    pub assigned: RefCell<IndexSet<String>>,
    /// Names this function (always a kfun in practice) must declare
    /// `captured` because they resolve to an enclosing user function's
    /// locals (pass 2).
    pub captured: RefCell<IndexSet<String>>,
}

#[derive(Debug)]
pub struct IfNode {
    pub test_var: String,
    pub body: Box<IrNode>,
    pub orelse: Option<Box<IrNode>>,
}

#[derive(Debug)]
pub struct ReturnNode {
    pub var: String,
}

#[derive(Debug)]
pub struct BinOpNode {
    pub vars: [String; 2],
    pub op: Operator,
    pub k: Cont,
}

#[derive(Debug)]
pub struct BoolOpNode {
    pub vars: Vec<String>,
    pub op: BoolOp,
    pub k: Cont,
}

#[derive(Debug)]
pub struct CompareNode {
    pub vars: Vec<String>,
    pub ops: Vec<CmpOp>,
    pub k: Cont,
}

#[derive(Debug)]
pub struct AssignNode {
    pub var: String,
    pub target: AssignTarget,
    pub k: Cont,
}

#[derive(Debug)]
pub struct CallNode {
    /// `vars[0]` is the callee, `vars[1..]` the arguments — all simple
    /// identifiers (spec §3.2: "Call(vars=[fun, arg0, ...])").
    pub vars: Vec<String>,
    pub k: Cont,
}

#[derive(Debug)]
pub struct AttributeNode {
    pub var: String,
    pub name: String,
    pub k: Cont,
}

#[derive(Debug)]
pub struct NameNode {
    pub id: String,
    pub k: Cont,
}

#[derive(Debug)]
pub struct NumNode {
    pub literal: String,
    pub k: Cont,
}

#[derive(Debug)]
pub struct PrintNode {
    pub vars: Vec<String>,
    pub k: Cont,
}

/// An expression used in statement context: its dead continuation already
/// ran the expression for effect, and this node itself emits a `pass`
/// (spec §3.2: "`Expr()` (statement wrapper, emits `pass`)").
#[derive(Debug)]
pub struct ExprNode {
    pub k: Cont,
}

/// An unmodified fragment of the input AST, re-emitted verbatim.
#[derive(Debug)]
pub struct VerbatimNode {
    pub source: String,
    pub k: Cont,
}

#[derive(Debug)]
pub enum IrNode {
    Module(ModuleNode),
    Expression(ExpressionNode),
    Sequence(SequenceNode),
    FunctionDef(FunctionDefNode),
    If(IfNode),
    Return(ReturnNode),
    BinOp(BinOpNode),
    BoolOp(BoolOpNode),
    Compare(CompareNode),
    Assign(AssignNode),
    Call(CallNode),
    Attribute(AttributeNode),
    Name(NameNode),
    Num(NumNode),
    Print(PrintNode),
    Expr(ExprNode),
    Verbatim(VerbatimNode),
}

impl IrNode {
    /// The node's own continuation, if it has a straight-line successor
    /// (`If`/`Return`/`Module` have none: their "successor" is encoded
    /// structurally, not through a chain).
    pub fn cont(&self) -> Option<&Cont> {
        match self {
            IrNode::Expression(n) => Some(&n.k),
            IrNode::Sequence(n) => Some(&n.k),
            IrNode::FunctionDef(n) => Some(&n.k),
            IrNode::BinOp(n) => Some(&n.k),
            IrNode::BoolOp(n) => Some(&n.k),
            IrNode::Compare(n) => Some(&n.k),
            IrNode::Assign(n) => Some(&n.k),
            IrNode::Call(n) => Some(&n.k),
            IrNode::Attribute(n) => Some(&n.k),
            IrNode::Name(n) => Some(&n.k),
            IrNode::Num(n) => Some(&n.k),
            IrNode::Print(n) => Some(&n.k),
            IrNode::Expr(n) => Some(&n.k),
            IrNode::Verbatim(n) => Some(&n.k),
            IrNode::Module(_) | IrNode::If(_) | IrNode::Return(_) => None,
        }
    }

    /// The operand variable names carried directly on this node (spec §3.3
    /// invariant 1: every entry here is a simple identifier). `Verbatim`
    /// carries none — its payload is an opaque source fragment, not operand
    /// slots.
    pub fn vars(&self) -> &[String] {
        match self {
            IrNode::BinOp(n) => &n.vars,
            IrNode::BoolOp(n) => &n.vars,
            IrNode::Compare(n) => &n.vars,
            IrNode::Assign(n) => std::slice::from_ref(&n.var),
            IrNode::Call(n) => &n.vars,
            IrNode::Attribute(n) => std::slice::from_ref(&n.var),
            IrNode::Name(_) => &[],
            IrNode::Num(_) => &[],
            IrNode::Print(n) => &n.vars,
            IrNode::Return(n) => std::slice::from_ref(&n.var),
            IrNode::If(n) => std::slice::from_ref(&n.test_var),
            _ => &[],
        }
    }

    /// Owned child subtrees — `If`'s branches, a `FunctionDef`'s body, a
    /// container's wrapped body. Distinct from following `k.exp`, which is
    /// a chain, not ownership (spec §9, "cyclic ownership").
    pub fn subs(&self) -> Vec<&IrNode> {
        match self {
            IrNode::Module(n) => vec![&n.body],
            IrNode::Expression(n) => vec![&n.body],
            IrNode::Sequence(n) => vec![&n.exp],
            IrNode::FunctionDef(n) => vec![&n.body],
            IrNode::If(n) => {
                let mut v = vec![n.body.as_ref()];
                if let Some(orelse) = &n.orelse {
                    v.push(orelse.as_ref());
                }
                v
            }
            _ => Vec::new(),
        }
    }
}

/// Mints fresh, globally-unique-within-one-run names: `vN` for live
/// continuations, `kfN`/`wkfN` for continuation functions (spec §3.3
/// invariant 2). Scoped to one `Lowerer` instance rather than process-wide
/// (spec §9, "an implementation should scope it to one transformer
/// instance to permit parallel per-file transforms").
#[derive(Debug, Default)]
pub struct NameGen {
    var_counter: u32,
    kf_counter: u32,
}

impl NameGen {
    pub fn fresh_var(&mut self) -> String {
        let name = format!("v{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    pub fn fresh_kf(&mut self) -> String {
        let name = format!("kf{}", self.kf_counter);
        self.kf_counter += 1;
        name
    }

    pub fn fresh_wkf(&mut self) -> String {
        let name = format!("wkf{}", self.kf_counter);
        self.kf_counter += 1;
        name
    }
}
