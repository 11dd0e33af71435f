//! Optimizer
//!
//! In-place-shaped AST transform, grounded directly on `optimize.py`'s
//! `Optimizer(NodeTransformer)`: children are folded first (bottom-up),
//! then the current node is matched against a fixed table of
//! compiler-synthesized opcodes and replaced when its operands are
//! constant enough. Only `FunctionCall` nodes with `always_builtin`
//! set are ever folded — a user's own procedure call is never
//! rewritten regardless of its name matching an opcode by coincidence.

use crate::ast::Node;

pub fn optimize(node: Node) -> Node {
    match node {
        Node::Program(body) => Node::Program(optimize_body(body)),
        Node::Block(body) => Node::Block(optimize_body(body)),
        Node::FunctionDeclaration { name, params, body, attributes } => {
            if attributes.iter().any(|a| a == "nooptimize") {
                Node::FunctionDeclaration { name, params, body, attributes }
            } else {
                Node::FunctionDeclaration {
                    name,
                    params,
                    body: Box::new(optimize(*body)),
                    attributes,
                }
            }
        }
        Node::Clone { site, inner_block, synthesized_parent_block } => Node::Clone {
            site,
            inner_block: Box::new(optimize(*inner_block)),
            synthesized_parent_block: Box::new(optimize(*synthesized_parent_block)),
        },
        Node::FunctionCall { name, args, always_builtin } => {
            let args: Vec<Node> = optimize_body(args);
            fold_call(name, args, always_builtin)
        }
        leaf => leaf,
    }
}

fn optimize_body(body: Vec<Node>) -> Vec<Node> {
    body.into_iter().map(optimize).collect()
}

fn fold_call(name: String, args: Vec<Node>, always_builtin: bool) -> Node {
    if !always_builtin {
        return Node::function_call(name, args, always_builtin);
    }
    if let Some(folded) = try_fold(&name, &args) {
        return folded;
    }
    let node = Node::function_call(name, args, always_builtin);
    if node.is_boolean() {
        canonicalize_boolean(&node)
    } else {
        node
    }
}

fn canonicalize_boolean(node: &Node) -> Node {
    if node.value_of_boolean() {
        Node::boolean_true()
    } else {
        Node::boolean_false()
    }
}

fn try_fold(name: &str, args: &[Node]) -> Option<Node> {
    match name {
        "operator_add" | "operator_subtract" | "operator_multiply" | "operator_divide" | "operator_mod" => {
            fold_numeric(name, args)
        }
        "operator_gt" | "operator_lt" | "operator_equals" => fold_comparison(name, args),
        "operator_and" | "operator_or" => fold_logic(name, args),
        "control_if" => fold_control_if(args),
        "control_if_else" => fold_control_if_else(args),
        "control_repeat_until" => fold_repeat_until(args),
        "control_repeat" => fold_repeat(args),
        _ => None,
    }
}

fn fold_numeric(name: &str, args: &[Node]) -> Option<Node> {
    if args.len() != 2 {
        return None;
    }
    let (Node::Number(a), Node::Number(b)) = (&args[0], &args[1]) else {
        return None;
    };
    let result = match name {
        "operator_add" => a + b,
        "operator_subtract" => a - b,
        "operator_multiply" => a * b,
        "operator_divide" => a / b,
        "operator_mod" => py_mod(*a, *b),
        _ => unreachable!(),
    };
    Some(Node::Number(result))
}

fn fold_comparison(name: &str, args: &[Node]) -> Option<Node> {
    if args.len() != 2 {
        return None;
    }
    let (Node::Number(a), Node::Number(b)) = (&args[0], &args[1]) else {
        return None;
    };
    let result = match name {
        "operator_gt" => a > b,
        "operator_lt" => a < b,
        "operator_equals" => a == b,
        _ => unreachable!(),
    };
    Some(boolean_node(result))
}

fn fold_logic(name: &str, args: &[Node]) -> Option<Node> {
    if args.len() != 2 || !args[0].is_boolean() || !args[1].is_boolean() {
        return None;
    }
    let a = args[0].value_of_boolean();
    let b = args[1].value_of_boolean();
    let result = if name == "operator_and" { a && b } else { a || b };
    Some(boolean_node(result))
}

fn fold_control_if(args: &[Node]) -> Option<Node> {
    if args.len() != 2 || !args[0].is_boolean() {
        return None;
    }
    Some(if args[0].value_of_boolean() { args[1].clone() } else { Node::Block(vec![]) })
}

fn fold_control_if_else(args: &[Node]) -> Option<Node> {
    if args.len() != 3 || !args[0].is_boolean() {
        return None;
    }
    Some(if args[0].value_of_boolean() { args[1].clone() } else { args[2].clone() })
}

fn fold_repeat_until(args: &[Node]) -> Option<Node> {
    if args.len() != 2 || !args[0].is_boolean() {
        return None;
    }
    Some(if args[0].value_of_boolean() {
        Node::Block(vec![])
    } else {
        Node::function_call("control_forever", vec![args[1].clone()], true)
    })
}

fn fold_repeat(args: &[Node]) -> Option<Node> {
    if args.len() != 2 {
        return None;
    }
    let Node::Number(times) = &args[0] else {
        return None;
    };
    if *times < 1.0 {
        return Some(Node::Block(vec![]));
    }
    if *times >= 10.0 {
        return None;
    }
    let count = *times as usize;
    Some(Node::Block(vec![args[1].clone(); count]))
}

fn boolean_node(value: bool) -> Node {
    if value {
        Node::boolean_true()
    } else {
        Node::boolean_false()
    }
}

/// Python's `%`: result takes the divisor's sign (floor division),
/// unlike Rust's `%` which takes the dividend's sign.
fn py_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Node>) -> Node {
        Node::function_call(name, args, true)
    }

    #[test]
    fn folds_numeric_operators() {
        let node = call("operator_add", vec![Node::Number(2.0), Node::Number(3.0)]);
        assert_eq!(optimize(node), Node::Number(5.0));
    }

    #[test]
    fn does_not_fold_user_calls_even_with_matching_names() {
        let node = Node::function_call("operator_add", vec![Node::Number(2.0), Node::Number(3.0)], false);
        assert_eq!(optimize(node.clone()), node);
    }

    #[test]
    fn folds_comparison_into_encoded_boolean() {
        let node = call("operator_gt", vec![Node::Number(2.0), Node::Number(1.0)]);
        let result = optimize(node);
        assert!(result.is_boolean());
        assert!(result.value_of_boolean());
    }

    #[test]
    fn folds_logic_over_encoded_booleans() {
        let node = call("operator_and", vec![Node::boolean_true(), Node::boolean_false()]);
        let result = optimize(node);
        assert!(!result.value_of_boolean());
    }

    #[test]
    fn control_if_picks_the_live_branch() {
        let then_branch = Node::Block(vec![Node::Number(1.0)]);
        let node = call("control_if", vec![Node::boolean_true(), then_branch.clone()]);
        assert_eq!(optimize(node), then_branch);

        let node = call("control_if", vec![Node::boolean_false(), Node::Block(vec![Node::Number(1.0)])]);
        assert_eq!(optimize(node), Node::Block(vec![]));
    }

    #[test]
    fn repeat_until_true_is_empty_and_false_is_forever() {
        let body = Node::Block(vec![Node::Number(1.0)]);
        let done = call("control_repeat_until", vec![Node::boolean_true(), body.clone()]);
        assert_eq!(optimize(done), Node::Block(vec![]));

        let forever = call("control_repeat_until", vec![Node::boolean_false(), body.clone()]);
        assert_eq!(optimize(forever), call("control_forever", vec![body]));
    }

    #[test]
    fn repeat_unrolls_small_constant_counts_and_leaves_large_ones() {
        let body = Node::Number(1.0);
        let small = call("control_repeat", vec![Node::Number(3.0), body.clone()]);
        assert_eq!(optimize(small), Node::Block(vec![body.clone(), body.clone(), body.clone()]));

        let large = call("control_repeat", vec![Node::Number(20.0), body.clone()]);
        assert_eq!(optimize(large.clone()), large);

        let zero = call("control_repeat", vec![Node::Number(0.0), body]);
        assert_eq!(optimize(zero), Node::Block(vec![]));
    }

    #[test]
    fn nested_not_canonicalizes_bottom_up() {
        // !!!true -> false, expressed as the canonical 2-level encoding.
        let triple_not = Node::function_call(
            "operator_not",
            vec![Node::function_call(
                "operator_not",
                vec![Node::function_call("operator_not", vec![], true)],
                true,
            )],
            true,
        );
        let result = optimize(triple_not);
        assert!(result.is_boolean());
        assert!(!result.value_of_boolean());
    }

    #[test]
    fn nooptimize_attribute_skips_folding_inside_the_function() {
        let unfoldable_add = call("operator_add", vec![Node::Number(1.0), Node::Number(2.0)]);
        let decl = Node::FunctionDeclaration {
            name: "f".into(),
            params: vec![],
            body: Box::new(Node::Block(vec![unfoldable_add.clone()])),
            attributes: vec!["nooptimize".into()],
        };
        let optimized = optimize(decl);
        match optimized {
            Node::FunctionDeclaration { body, .. } => match *body {
                Node::Block(stmts) => assert_eq!(stmts[0], unfoldable_add),
                _ => panic!("expected Block"),
            },
            _ => panic!("expected FunctionDeclaration"),
        }
    }
}
