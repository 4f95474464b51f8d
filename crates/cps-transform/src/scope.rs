//! Two-pass scope analysis (spec §3.4): which names a continuation function
//! must declare `nonlocal` to reach an enclosing user function's locals.
//!
//! Pass 1 collects, per user `FunctionDef`, the names it assigns directly
//! (`find_locals` in `original_source/transform.py`). Pass 2 walks again and,
//! for every `Name` reference that resolves to some enclosing user
//! function's assigned set, records it as `captured` on the *innermost
//! enclosing kfun* — not on whichever function frame happens to be nearest,
//! the way the original's `find_nonlocals` does it.
//!
//! The original treats `kfunp` (is-a-continuation-function) asymmetrically:
//! pass 1 skips kfun frames when extending the local environment, but pass 2
//! pushes a frame for every `FunctionDef`, kfun or not. That mismatch means
//! a `Name` used directly inside the user function it belongs to (no
//! intervening kfun) still gets flagged nonlocal-of-itself. Both passes here
//! treat kfuns uniformly as transparent: a stack of enclosing *user*
//! functions drives the "is this name a local somewhere above me" search in
//! both passes, and a separate stack of enclosing kfuns says where to record
//! the capture, if anywhere.

use crate::ir::{AssignTarget, FunctionDefNode, IrNode};

/// Runs both passes over a fully-lowered tree in place.
pub fn analyze(root: &IrNode) {
    let mut user_stack: Vec<&FunctionDefNode> = Vec::new();
    collect_assigned(root, &mut user_stack);

    let mut user_stack: Vec<&FunctionDefNode> = Vec::new();
    let mut kfun_stack: Vec<&FunctionDefNode> = Vec::new();
    mark_captured(root, &mut user_stack, &mut kfun_stack);
}

/// Pass 1: record every name a user function assigns directly in its own
/// body (not through a nested user function — those get their own frame).
fn collect_assigned<'n>(node: &'n IrNode, user_stack: &mut Vec<&'n FunctionDefNode>) {
    let mut current = Some(node);
    while let Some(n) = current {
        if let IrNode::Assign(assign) = n {
            if let AssignTarget::Name(name) = &assign.target {
                if let Some(enclosing) = user_stack.last() {
                    enclosing.assigned.borrow_mut().insert(name.clone());
                }
            }
        }

        if let IrNode::FunctionDef(def) = n {
            if !def.is_kfun {
                user_stack.push(def);
                for sub in n.subs() {
                    collect_assigned(sub, user_stack);
                }
                user_stack.pop();
                current = n.cont().and_then(|k| k.exp.as_deref());
                continue;
            }
        }

        for sub in n.subs() {
            collect_assigned(sub, user_stack);
        }
        current = n.cont().and_then(|k| k.exp.as_deref());
    }
}

/// Pass 2: for every `Name` reference, search enclosing user functions
/// (innermost first) for one that assigned this name directly. If found and
/// at least one kfun lies between the reference and that user function,
/// the innermost such kfun must declare the name `captured` (emitted as
/// `nonlocal`, spec §4.2 `FunctionDef`).
fn mark_captured<'n>(
    node: &'n IrNode,
    user_stack: &mut Vec<&'n FunctionDefNode>,
    kfun_stack: &mut Vec<&'n FunctionDefNode>,
) {
    let mut current = Some(node);
    while let Some(n) = current {
        if let IrNode::Name(name_node) = n {
            let is_local_above = user_stack
                .iter()
                .rev()
                .any(|f| f.assigned.borrow().contains(&name_node.id));
            if is_local_above {
                if let Some(kfun) = kfun_stack.last() {
                    kfun.captured.borrow_mut().insert(name_node.id.clone());
                }
            }
        }

        if let IrNode::FunctionDef(def) = n {
            if def.is_kfun {
                kfun_stack.push(def);
                for sub in n.subs() {
                    mark_captured(sub, user_stack, kfun_stack);
                }
                kfun_stack.pop();
                current = n.cont().and_then(|k| k.exp.as_deref());
                continue;
            } else {
                user_stack.push(def);
                let saved_kfuns = std::mem::take(kfun_stack);
                for sub in n.subs() {
                    mark_captured(sub, user_stack, kfun_stack);
                }
                *kfun_stack = saved_kfuns;
                user_stack.pop();
                current = n.cont().and_then(|k| k.exp.as_deref());
                continue;
            }
        }

        for sub in n.subs() {
            mark_captured(sub, user_stack, kfun_stack);
        }
        current = n.cont().and_then(|k| k.exp.as_deref());
    }
}
