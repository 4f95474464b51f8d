//! The CPS lowerer (spec §4.2): `lower(node, k) -> ir_node`.
//!
//! Each per-kind lowering rule receives the continuation it must feed and
//! returns an IR node whose chain ultimately invokes that continuation.
//! Operands are linearized left-to-right through [`Lowerer::lower_operands`]
//! so that every call/operator argument ends up a simple identifier
//! (spec §3.3 invariant 1).

use ruff_python_ast::{self as ast, Expr, ModModule, Stmt};
use ruff_text_size::Ranged;

use crate::ast::{callee_is_cps, callee_is_print, expr_kind, is_cps_manual_decorator, stmt_kind};
use crate::error::{TransformError, TransformResult};
use crate::ir::{
    AssignNode, AssignTarget, AttributeNode, AttributePath, BinOpNode, BoolOpNode, CallNode, CompareNode, Cont,
    ExprNode, FunctionDefNode, IfNode, IrNode, ModuleNode, NameGen, NameNode, NumNode, PrintNode, VerbatimNode,
};
use crate::trampoline::ContinuationEncoder;

type Build<'a> = Box<dyn FnOnce(&mut Lowerer<'a>, String) -> TransformResult<IrNode> + 'a>;
type DeadBuild<'a> = Box<dyn FnOnce(&mut Lowerer<'a>) -> TransformResult<IrNode> + 'a>;
type Finish<'a> = Box<dyn FnOnce(&mut Lowerer<'a>, Vec<String>) -> TransformResult<IrNode> + 'a>;

pub struct Lowerer<'a> {
    source: &'a str,
    cps_prefix: &'a str,
    names: NameGen,
    encoder: &'a dyn ContinuationEncoder,
}

/// Lowers a whole module with the null (tail) continuation, matching
/// `original_source/transform.py`'s `dofile`: `t.t_exp(exp, NullCont)`.
pub fn lower_module<'a>(
    module: &'a ModModule,
    source: &'a str,
    cps_prefix: &'a str,
    encoder: &'a dyn ContinuationEncoder,
) -> TransformResult<IrNode> {
    let mut lowerer = Lowerer {
        source,
        cps_prefix,
        names: NameGen::default(),
        encoder,
    };
    let body = lowerer.lower_stmts(module.body.clone(), Cont::null())?;
    Ok(IrNode::Module(ModuleNode { body: Box::new(body) }))
}

impl<'a> Lowerer<'a> {
    fn make_cont(&mut self, build: Build<'a>) -> TransformResult<Cont> {
        let name = self.names.fresh_var();
        let exp = build(self, name.clone())?;
        Ok(Cont {
            name,
            exp: Some(Box::new(exp)),
        })
    }

    fn dead_cont(&mut self, build: DeadBuild<'a>) -> TransformResult<Cont> {
        let exp = build(self)?;
        Ok(Cont {
            name: "_".to_string(),
            exp: Some(Box::new(exp)),
        })
    }

    /// Linearizes operands left-to-right (spec §4.2, "Operand
    /// linearization"): lowers `remaining[0]` into a fresh-var continuation
    /// that recurses on the rest, finally invoking `finish` with every
    /// operand reduced to a simple name. Operands are owned (cloned or
    /// moved out of the parse tree by callers), so this carries no borrow
    /// tied to any one AST node's lifetime.
    fn lower_operands(
        &mut self,
        mut acc: Vec<String>,
        mut remaining: Vec<Expr>,
        finish: Finish<'a>,
    ) -> TransformResult<IrNode> {
        if remaining.is_empty() {
            return finish(self, acc);
        }
        let rest: Vec<Expr> = remaining.split_off(1);
        let first = remaining.into_iter().next().expect("non-empty");
        let cont = self.make_cont(Box::new(move |lowerer, var| {
            acc.push(var);
            lowerer.lower_operands(acc, rest, finish)
        }))?;
        self.lower_expr_owned(first, cont)
    }

    /// `t_sequence`: an implied sequence of statements sharing one tail
    /// continuation, each non-final statement run for its (dead) effect.
    fn lower_stmts(&mut self, mut stmts: Vec<Stmt>, k: Cont) -> TransformResult<IrNode> {
        if stmts.is_empty() {
            return Err(TransformError::structural("empty statement sequence"));
        }
        if stmts.len() == 1 {
            return self.lower_stmt(stmts.pop().expect("len == 1"), k);
        }
        let rest = stmts.split_off(1);
        let first = stmts.into_iter().next().expect("len >= 1");
        let cont = self.dead_cont(Box::new(move |lowerer| lowerer.lower_stmts(rest, k)))?;
        self.lower_stmt(first, cont)
    }

    fn lower_stmt(&mut self, stmt: Stmt, k: Cont) -> TransformResult<IrNode> {
        match stmt {
            Stmt::Assign(assign) => self.lower_assign(assign, k),
            Stmt::Return(ret) => self.lower_return(ret),
            Stmt::If(if_stmt) => self.lower_if(if_stmt, k),
            Stmt::While(while_stmt) => self.lower_while(while_stmt, k),
            Stmt::FunctionDef(def) => self.lower_function_def(def, k),
            Stmt::Expr(expr_stmt) => self.lower_expr_stmt(expr_stmt, k),
            Stmt::Import(_) | Stmt::ImportFrom(_) | Stmt::ClassDef(_) => Ok(self.verbatim_stmt(&stmt, k)),
            Stmt::Pass(_) => self.lower_pass(k),
            other => Err(TransformError::unsupported(stmt_kind(&other))),
        }
    }

    fn lower_pass(&mut self, k: Cont) -> TransformResult<IrNode> {
        Ok(IrNode::Expr(ExprNode { k }))
    }

    /// Import/ImportFrom have no decorators, so `stmt.range()` is the whole
    /// statement; a ClassDef's `range()` excludes its decorators the same
    /// way a FunctionDef's does (see `full_def_range`), so that case is
    /// widened to include them.
    fn verbatim_stmt(&self, stmt: &Stmt, k: Cont) -> IrNode {
        let range = match stmt {
            Stmt::ClassDef(class) => {
                let start = class
                    .decorator_list
                    .first()
                    .map(|d| d.range().start())
                    .unwrap_or_else(|| class.range().start());
                ruff_text_size::TextRange::new(start, class.range().end())
            }
            other => other.range(),
        };
        IrNode::Verbatim(VerbatimNode {
            source: self.source[range].to_string(),
            k,
        })
    }

    /// `t_Assign`: require exactly one target (§4.2: "any other arity is
    /// fatal"). A single `Tuple`/`List` target is destructuring, which is
    /// Non-goals territory and therefore `UnsupportedConstruct`, not a
    /// silent pass-through (spec_full.md §2).
    fn lower_assign(&mut self, mut assign: ast::StmtAssign, k: Cont) -> TransformResult<IrNode> {
        if assign.targets.len() != 1 {
            return Err(TransformError::structural(format!(
                "assignment with {} targets (expected exactly one)",
                assign.targets.len()
            )));
        }
        let target_expr = assign.targets.pop().expect("len == 1");
        if matches!(target_expr, Expr::Tuple(_) | Expr::List(_)) {
            return Err(TransformError::unsupported("destructuring assignment"));
        }
        let target = self.flatten_assign_target(&target_expr)?;
        let value = *assign.value;
        let cont = self.make_cont(Box::new(move |_, var| Ok(IrNode::Assign(AssignNode { var, target, k }))))?;
        self.lower_expr_owned(value, cont)
    }

    fn flatten_assign_target(&self, target: &Expr) -> TransformResult<AssignTarget> {
        match target {
            Expr::Name(name) => Ok(AssignTarget::Name(name.id.to_string())),
            Expr::Attribute(_) => {
                let mut path = Vec::new();
                let mut current = target;
                loop {
                    match current {
                        Expr::Attribute(attr) => {
                            path.push(attr.attr.to_string());
                            current = &attr.value;
                        }
                        Expr::Name(name) => {
                            path.reverse();
                            return Ok(AssignTarget::Attribute(AttributePath {
                                base: name.id.to_string(),
                                path,
                            }));
                        }
                        other => {
                            return Err(TransformError::structural(format!(
                                "attribute chain terminating in {}, not a Name",
                                expr_kind(other)
                            )));
                        }
                    }
                }
            }
            other => Err(TransformError::structural(format!(
                "assignment target {} is neither a Name nor an Attribute chain",
                expr_kind(other)
            ))),
        }
    }

    /// `t_Return`: "return" == "feed the result to the continuation". The
    /// encoded invocation goes through the continuation encoder so the
    /// trampoline variant can redirect it through `schedule` (spec §4.5).
    fn lower_return(&mut self, ret: ast::StmtReturn) -> TransformResult<IrNode> {
        let value = *ret
            .value
            .ok_or_else(|| TransformError::unsupported("bare `return` with no value"))?;
        let cont = self.make_cont(Box::new(|lowerer, var| Ok(lowerer.encoder.invoke("k", Some(&var)))))?;
        self.lower_expr_owned(value, cont)
    }

    fn lower_bin_op(&mut self, binop: ast::ExprBinOp, k: Cont) -> TransformResult<IrNode> {
        let op = binop.op;
        let operands = vec![*binop.left, *binop.right];
        self.lower_operands(
            Vec::new(),
            operands,
            Box::new(move |_, vars| {
                let [left, right]: [String; 2] = vars.try_into().expect("exactly two operands");
                Ok(IrNode::BinOp(BinOpNode {
                    vars: [left, right],
                    op,
                    k,
                }))
            }),
        )
    }

    fn lower_bool_op(&mut self, boolop: ast::ExprBoolOp, k: Cont) -> TransformResult<IrNode> {
        let op = boolop.op;
        self.lower_operands(
            Vec::new(),
            boolop.values.into(),
            Box::new(move |_, vars| Ok(IrNode::BoolOp(BoolOpNode { vars, op, k }))),
        )
    }

    fn lower_compare(&mut self, cmp: ast::ExprCompare, k: Cont) -> TransformResult<IrNode> {
        let ops: Vec<ast::CmpOp> = cmp.ops.into_vec();
        let mut operands = vec![*cmp.left];
        operands.extend(cmp.comparators.into_vec());
        self.lower_operands(
            Vec::new(),
            operands,
            Box::new(move |_, vars| Ok(IrNode::Compare(CompareNode { vars, ops, k }))),
        )
    }

    fn lower_attribute(&mut self, attr: ast::ExprAttribute, k: Cont) -> TransformResult<IrNode> {
        let name = attr.attr.to_string();
        let cont = self.make_cont(Box::new(move |_, var| Ok(IrNode::Attribute(AttributeNode { var, name, k }))))?;
        self.lower_expr_owned(*attr.value, cont)
    }

    fn lower_name(&mut self, name: ast::ExprName, k: Cont) -> TransformResult<IrNode> {
        Ok(IrNode::Name(NameNode {
            id: name.id.to_string(),
            k,
        }))
    }

    fn lower_num(&self, num: ast::ExprNumberLiteral, k: Cont) -> TransformResult<IrNode> {
        Ok(IrNode::Num(NumNode {
            literal: self.source[num.range()].to_string(),
            k,
        }))
    }

    /// `t_If`: tail position needs no continuation function; non-tail
    /// position reifies the rest of the computation as `kfN` (spec §4.2).
    fn lower_if(&mut self, if_stmt: ast::StmtIf, k: Cont) -> TransformResult<IrNode> {
        if k.is_null() {
            return self.lower_if_branches(if_stmt.test, if_stmt.body, if_stmt.elif_else_clauses, Cont::null());
        }
        let kf_name = self.names.fresh_kf();
        let kf_for_call = kf_name.clone();
        let call_kf = self.dead_cont(Box::new(move |lowerer| Ok(lowerer.encoder.invoke(&kf_for_call, None))))?;
        let body = self.lower_if_branches(if_stmt.test, if_stmt.body, if_stmt.elif_else_clauses, call_kf)?;
        self.cont_as_function(kf_name, k, body)
    }

    fn lower_if_branches(
        &mut self,
        test: Box<Expr>,
        body: Vec<Stmt>,
        elif_else: Box<[ast::ElifElseClause]>,
        k: Cont,
    ) -> TransformResult<IrNode> {
        let lowered_body = self.lower_stmts(body, k.clone())?;
        let orelse = self.lower_elif_else(elif_else.into_vec(), k)?;
        let cont = self.make_cont(Box::new(move |_, tvar| {
            Ok(IrNode::If(IfNode {
                test_var: tvar,
                body: Box::new(lowered_body),
                orelse: Some(Box::new(orelse)),
            }))
        }))?;
        self.lower_expr_owned(*test, cont)
    }

    /// `elif`/`else` clauses are flattened to a nested `If`/`orelse` chain;
    /// a bare `else` (or no clause at all) becomes `Expr` (`pass`), per
    /// spec §4.2's "if absent, it lowers to `Expr` (`pass`)" rule for
    /// `while`'s `orelse`, applied identically here.
    fn lower_elif_else(&mut self, mut clauses: Vec<ast::ElifElseClause>, k: Cont) -> TransformResult<IrNode> {
        if clauses.is_empty() {
            return self.lower_pass(k);
        }
        let rest = clauses.split_off(1);
        let clause = clauses.into_iter().next().expect("len >= 1");
        match clause.test {
            Some(test) => {
                let body = self.lower_stmts(clause.body, k.clone())?;
                let orelse = self.lower_elif_else(rest, k)?;
                let cont = self.make_cont(Box::new(move |_, tvar| {
                    Ok(IrNode::If(IfNode {
                        test_var: tvar,
                        body: Box::new(body),
                        orelse: Some(Box::new(orelse)),
                    }))
                }))?;
                self.lower_expr_owned(test, cont)
            }
            None => self.lower_stmts(clause.body, k),
        }
    }

    /// `t_While`: two fresh names, `wkfM` (the loop body/test dispatcher)
    /// and `kfN` (the loop's continuation). `wkfM()` is the entry call.
    fn lower_while(&mut self, while_stmt: ast::StmtWhile, k: Cont) -> TransformResult<IrNode> {
        let wkf_name = self.names.fresh_wkf();
        let kf_name = self.names.fresh_kf();

        let wkf_for_body = wkf_name.clone();
        let call_wkf = self.dead_cont(Box::new(move |lowerer| Ok(lowerer.encoder.invoke(&wkf_for_body, None))))?;
        let kf_for_else = kf_name.clone();
        let call_kf = self.dead_cont(Box::new(move |lowerer| Ok(lowerer.encoder.invoke(&kf_for_else, None))))?;

        let body = self.lower_stmts(while_stmt.body, call_wkf)?;
        let orelse = if while_stmt.orelse.is_empty() {
            self.lower_pass(call_kf)?
        } else {
            self.lower_stmts(while_stmt.orelse, call_kf)?
        };
        let cont = self.make_cont(Box::new(move |_, tvar| {
            Ok(IrNode::If(IfNode {
                test_var: tvar,
                body: Box::new(body),
                orelse: Some(Box::new(orelse)),
            }))
        }))?;
        let wkf_body = self.lower_expr_owned(*while_stmt.test, cont)?;

        let wkf_for_entry = wkf_name.clone();
        let entry = self.encoder.invoke(&wkf_for_entry, None);
        let wkf_def = self.cont_as_function(wkf_name, Cont::dead(wkf_body), entry)?;

        self.cont_as_function(kf_name, k, wkf_def)
    }

    /// `cont_as_function` (spec §4.2.2): reifies `k`'s pending expression
    /// as the body of a fresh `FunctionDef`, taking `k.name` as its sole
    /// formal when `k` is live. The surrounding chain is dead, and its
    /// expression is `entry` — typically a call that jumps into the
    /// function just defined.
    fn cont_as_function(&mut self, name: String, k: Cont, entry: IrNode) -> TransformResult<IrNode> {
        let formals = if k.is_live() { vec![k.name.clone()] } else { Vec::new() };
        let body = k
            .exp
            .ok_or_else(|| TransformError::structural("continuation-as-function with no body"))?;
        Ok(IrNode::FunctionDef(FunctionDefNode {
            name,
            is_kfun: true,
            formals,
            decorators: Vec::new(),
            body,
            k: Cont::dead(entry),
            assigned: Default::default(),
            captured: Default::default(),
        }))
    }

    /// `t_Call`: a CPS call packages the continuation as a local function
    /// and passes it as the first argument; a plain call linearizes
    /// operands and keeps `k` as its own continuation.
    fn lower_call(&mut self, call: ast::ExprCall, k: Cont) -> TransformResult<IrNode> {
        if callee_is_print(&call.func) {
            return self.lower_print(call, k);
        }
        if callee_is_cps(&call.func, self.cps_prefix) {
            self.lower_cps_call(call, k)
        } else {
            self.lower_plain_call(call, k)
        }
    }

    fn call_args(call: &ast::ExprCall) -> TransformResult<Vec<Expr>> {
        if !call.arguments.keywords.is_empty() {
            return Err(TransformError::unsupported("keyword arguments"));
        }
        if call.arguments.args.iter().any(|a| matches!(a, Expr::Starred(_))) {
            return Err(TransformError::unsupported("starred call arguments"));
        }
        Ok(call.arguments.args.to_vec())
    }

    fn lower_plain_call(&mut self, call: ast::ExprCall, k: Cont) -> TransformResult<IrNode> {
        let args = Self::call_args(&call)?;
        let func = *call.func;
        self.lower_operands(
            Vec::new(),
            args,
            Box::new(move |lowerer, arg_vars| {
                let cont = lowerer.make_cont(Box::new(move |_, fun_var| {
                    let mut vars = vec![fun_var];
                    vars.extend(arg_vars);
                    Ok(IrNode::Call(CallNode { vars, k }))
                }))?;
                lowerer.lower_expr_owned(func, cont)
            }),
        )
    }

    /// A CPS call reifies the rest of the computation (`k`) as `kfN` and
    /// invokes the callee with `kfN` prepended to the argument list — a
    /// genuine function call, not a continuation invocation, so it bypasses
    /// the continuation encoder even in trampoline mode (spec §4.5).
    fn lower_cps_call(&mut self, call: ast::ExprCall, k: Cont) -> TransformResult<IrNode> {
        let args = Self::call_args(&call)?;
        let kf_name = self.names.fresh_kf();
        let func = *call.func;
        let kf_for_call = kf_name.clone();
        let inner = self.lower_operands(
            vec![kf_for_call],
            args,
            Box::new(move |lowerer, vars| {
                let cont = lowerer.make_cont(Box::new(move |_, fun_var| {
                    let mut full = vec![fun_var];
                    full.extend(vars);
                    Ok(IrNode::Call(CallNode {
                        vars: full,
                        k: Cont::null(),
                    }))
                }))?;
                lowerer.lower_expr_owned(func, cont)
            }),
        )?;
        self.cont_as_function(kf_name, k, inner)
    }

    fn lower_print(&mut self, call: ast::ExprCall, k: Cont) -> TransformResult<IrNode> {
        let args = Self::call_args(&call)?;
        self.lower_operands(
            Vec::new(),
            args,
            Box::new(move |_, vars| Ok(IrNode::Print(PrintNode { vars, k }))),
        )
    }

    /// `t_FunctionDef`: not-`cps_`-prefixed defs and `cps_manual`-decorated
    /// defs pass through as `Verbatim`; otherwise prepend the `k` formal
    /// and lower the body with the null continuation.
    fn lower_function_def(&mut self, def: ast::StmtFunctionDef, k: Cont) -> TransformResult<IrNode> {
        if !def.name.id.starts_with(self.cps_prefix) {
            return Ok(IrNode::Verbatim(VerbatimNode {
                source: self.source[full_def_range(&def)].to_string(),
                k,
            }));
        }
        if def.decorator_list.iter().any(|d| is_cps_manual_decorator(&d.expression)) {
            return Ok(IrNode::Verbatim(VerbatimNode {
                source: render_manual_function(self.source, &def),
                k,
            }));
        }

        let params = &def.parameters;
        if !params.posonlyargs.is_empty() || !params.kwonlyargs.is_empty() {
            return Err(TransformError::unsupported("positional-only or keyword-only parameters"));
        }
        if params.vararg.is_some() {
            return Err(TransformError::unsupported("*args"));
        }
        if params.kwarg.is_some() {
            return Err(TransformError::unsupported("**kwargs"));
        }
        if params.args.iter().any(|p| p.default.is_some()) {
            return Err(TransformError::unsupported("parameter defaults"));
        }

        let mut formals = vec!["k".to_string()];
        formals.extend(params.args.iter().map(|p| p.parameter.name.id.to_string()));

        // Carried for fidelity with the source def's structure; any
        // remaining decorator is not re-emitted (matching
        // `original_source/transform.py`'s `t_FunctionDef`, which stores
        // `decorator_list` on the node but never prints it).
        let decorators = def
            .decorator_list
            .iter()
            .map(|d| self.source[d.expression.range()].to_string())
            .collect();

        let body = self.lower_stmts(def.body, Cont::null())?;
        Ok(IrNode::FunctionDef(FunctionDefNode {
            name: def.name.id.to_string(),
            is_kfun: false,
            formals,
            decorators,
            body: Box::new(body),
            k,
            assigned: Default::default(),
            captured: Default::default(),
        }))
    }

    /// `t_Expr`: an expression in statement context runs for effect through
    /// a dead continuation, and itself emits `pass` (spec §3.2).
    fn lower_expr_stmt(&mut self, stmt: ast::StmtExpr, k: Cont) -> TransformResult<IrNode> {
        let value = *stmt.value;
        let cont = self.dead_cont(Box::new(move |_| Ok(IrNode::Expr(ExprNode { k }))))?;
        self.lower_expr_owned(value, cont)
    }

    fn lower_expr_owned(&mut self, expr: Expr, k: Cont) -> TransformResult<IrNode> {
        match expr {
            Expr::NumberLiteral(num) => self.lower_num(num, k),
            Expr::Name(name) => self.lower_name(name, k),
            Expr::BinOp(binop) => self.lower_bin_op(binop, k),
            Expr::BoolOp(boolop) => self.lower_bool_op(boolop, k),
            Expr::Compare(cmp) => self.lower_compare(cmp, k),
            Expr::Attribute(attr) => self.lower_attribute(attr, k),
            Expr::Call(call) => self.lower_call(call, k),
            other => Err(TransformError::unsupported(expr_kind(&other))),
        }
    }
}

/// `StmtFunctionDef::range()` covers `def ... : <body>` only — decorators
/// sit in `decorator_list` with their own, earlier ranges. A verbatim
/// passthrough that ignored this would silently drop `@whatever` from any
/// untouched, non-CPS-prefixed function.
fn full_def_range(def: &ast::StmtFunctionDef) -> ruff_text_size::TextRange {
    let start = def
        .decorator_list
        .first()
        .map(|d| d.range().start())
        .unwrap_or_else(|| def.range().start());
    ruff_text_size::TextRange::new(start, def.range().end())
}

/// Renders a `cps_manual`-decorated function verbatim with the decorator
/// line(s) dropped (spec §4.2: "strip that decorator, re-emit verbatim").
fn render_manual_function(source: &str, def: &ast::StmtFunctionDef) -> String {
    let header_start = def
        .decorator_list
        .first()
        .map(|d| d.range().start())
        .unwrap_or_else(|| def.range().start());
    let header_end = def.range().start();
    let header = &source[usize::from(header_start)..usize::from(header_end)];
    let def_and_body = &source[def.range()];
    let kept_decorators: String = header
        .lines()
        .filter(|line| !line.trim_start().starts_with('@') || !line.contains("cps_manual"))
        .map(|line| format!("{line}\n"))
        .collect();
    format!("{kept_decorators}{def_and_body}")
}
