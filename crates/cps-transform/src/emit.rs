//! The emitter (spec §4.3): walks a lowered, scope-analyzed IR tree back
//! into surface source text.
//!
//! Mirrors `original_source/transform.py`'s `writer`/`Node.emit_all`: a
//! chain of nodes linked through `k.exp` is walked *iteratively*, never
//! recursively (spec §9, "the chain can be arbitrarily long — walk it with
//! a loop"), while a node's owned substructure (an `If`'s branches, a
//! `FunctionDef`'s body) is walked with ordinary recursion.

use ruff_python_ast::{BoolOp, CmpOp, Operator};

use crate::ir::{Cont, IrNode};

const INDENT: &str = "    ";

pub struct Writer {
    buf: String,
    level: usize,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            buf: String::new(),
            level: 0,
        }
    }

    fn indent(&mut self) {
        self.level += 1;
    }

    fn dedent(&mut self) {
        self.level -= 1;
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.level {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn into_source(self) -> String {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits a whole lowered module.
pub fn emit_module(module: &IrNode, w: &mut Writer) {
    match module {
        IrNode::Module(m) => emit_chain(&m.body, w),
        other => emit_chain(other, w),
    }
}

/// Follows the `k.exp` chain starting at `node`, emitting each link in
/// turn. This loop is the one place that walks a chain — every recursive
/// call below descends into owned substructure only, never into `k.exp`.
fn emit_chain(node: &IrNode, w: &mut Writer) {
    let mut current = node;
    loop {
        emit_one(current, w);
        match current.cont() {
            Some(Cont { exp: Some(next), .. }) => current = next,
            _ => break,
        }
    }
}

/// Assignment prefix for a node's own continuation: `"vN = "` for a live
/// continuation, `"_ = "` for a dead one (its name is the literal `"_"`,
/// which is itself a non-empty prefix — spec §3.1), and nothing in tail
/// position.
fn prefix(k: &Cont) -> String {
    if k.name.is_empty() {
        String::new()
    } else {
        format!("{} = ", k.name)
    }
}

fn emit_one(node: &IrNode, w: &mut Writer) {
    match node {
        IrNode::Module(m) => emit_chain(&m.body, w),
        IrNode::Expression(e) => emit_one(&e.body, w),
        IrNode::Sequence(s) => emit_chain(&s.exp, w),
        IrNode::FunctionDef(def) => {
            let formals = def.formals.join(", ");
            w.line(&format!("def {} ({}):", def.name, formals));
            w.indent();
            let captured = def.captured.borrow();
            if !captured.is_empty() {
                let names: Vec<&str> = captured.iter().map(String::as_str).collect();
                w.line(&format!("nonlocal {}", names.join(", ")));
            }
            drop(captured);
            emit_chain(&def.body, w);
            w.dedent();
        }
        IrNode::If(if_node) => {
            w.line(&format!("if {}:", if_node.test_var));
            w.indent();
            emit_chain(&if_node.body, w);
            w.dedent();
            if let Some(orelse) = &if_node.orelse {
                w.line("else:");
                w.indent();
                emit_chain(orelse, w);
                w.dedent();
            }
        }
        IrNode::Return(ret) => {
            w.line(&format!("return {}", ret.var));
        }
        IrNode::BinOp(binop) => {
            w.line(&format!(
                "{}{} {} {}",
                prefix(&binop.k),
                binop.vars[0],
                bin_op_symbol(binop.op),
                binop.vars[1]
            ));
        }
        IrNode::BoolOp(boolop) => {
            let joiner = format!(" {} ", bool_op_word(boolop.op));
            w.line(&format!("{}{}", prefix(&boolop.k), boolop.vars.join(&joiner)));
        }
        IrNode::Compare(cmp) => {
            let mut parts = Vec::new();
            for i in 0..cmp.ops.len() {
                parts.push(cmp.vars[i].clone());
                parts.push(cmp_op_symbol(cmp.ops[i]).to_string());
            }
            parts.push(cmp.vars[cmp.vars.len() - 1].clone());
            w.line(&format!("{}{}", prefix(&cmp.k), parts.join(" ")));
        }
        IrNode::Assign(assign) => {
            w.line(&format!("{} = {}", assign.target.render(), assign.var));
        }
        IrNode::Call(call) => {
            let args = call.vars[1..].join(", ");
            w.line(&format!("{}{} ({})", prefix(&call.k), call.vars[0], args));
        }
        IrNode::Attribute(attr) => {
            w.line(&format!("{}{}.{}", prefix(&attr.k), attr.var, attr.name));
        }
        IrNode::Name(name) => {
            w.line(&format!("{}{}", prefix(&name.k), name.id));
        }
        IrNode::Num(num) => {
            w.line(&format!("{}{}", prefix(&num.k), num.literal));
        }
        IrNode::Print(print) => {
            w.line(&format!("print ({})", print.vars.join(", ")));
        }
        IrNode::Expr(_) => {
            w.line("pass");
        }
        IrNode::Verbatim(verbatim) => {
            for line in verbatim.source.split('\n') {
                w.line(line);
            }
        }
    }
}

fn bin_op_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mult => "*",
        Operator::MatMult => "@",
        Operator::Div => "/",
        Operator::Mod => "%",
        Operator::Pow => "**",
        Operator::LShift => "<<",
        Operator::RShift => ">>",
        Operator::BitOr => "|",
        Operator::BitXor => "^",
        Operator::BitAnd => "&",
        Operator::FloorDiv => "//",
    }
}

fn bool_op_word(op: BoolOp) -> &'static str {
    match op {
        BoolOp::And => "and",
        BoolOp::Or => "or",
    }
}

fn cmp_op_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        CmpOp::Is => "is",
        CmpOp::IsNot => "is not",
        CmpOp::In => "in",
        CmpOp::NotIn => "not in",
    }
}
