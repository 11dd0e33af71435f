//! AST
//!
//! A single tagged sum rather than a class hierarchy, per the node
//! variants of the data model. Deep-copy falls out of `#[derive(Clone)]`
//! since every variant owns its children (no shared mutable state, no
//! cycles); `dump` is a structural pretty-printer in the spirit of
//! `nodes.py`'s `Node.dump`.

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Program(Vec<Node>),
    Block(Vec<Node>),
    Number(f64),
    String(String),
    Identifier(String),
    ListIdentifier(String),
    FunctionCall {
        name: String,
        args: Vec<Node>,
        always_builtin: bool,
    },
    VariableDeclaration {
        name: String,
        is_const: bool,
        is_array: bool,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<String>,
        body: Box<Node>,
        attributes: Vec<String>,
    },
    Clone {
        /// Stamped at parse time so the lowerer can key the clone
        /// discriminator sentinel (`IdKey::CloneSite`) on source
        /// occurrence rather than structural content — two textually
        /// identical `clone { ... }` statements must still get
        /// distinct sentinels. Not part of structural equality.
        site: u64,
        inner_block: Box<Node>,
        synthesized_parent_block: Box<Node>,
    },
    Custom(String),
    /// Carried through the AST for structural completeness; the
    /// preprocessor expands macros at the token level before the
    /// parser ever runs, so this variant is never constructed by
    /// `parser` itself (see `DESIGN.md`).
    Macro {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
}

impl Node {
    pub fn variable_declaration(name: impl Into<String>, is_const: bool, is_array: bool) -> Result<Node> {
        if is_const && is_array {
            return Err(CompileError::record("a variable cannot be both const and an array"));
        }
        Ok(Node::VariableDeclaration {
            name: name.into(),
            is_const,
            is_array,
        })
    }

    pub fn function_call(name: impl Into<String>, args: Vec<Node>, always_builtin: bool) -> Node {
        Node::FunctionCall {
            name: name.into(),
            args,
            always_builtin,
        }
    }

    /// `true` → `operator_not()`.
    pub fn boolean_true() -> Node {
        Node::function_call("operator_not", vec![], true)
    }

    /// `false` → `operator_not(operator_not())`.
    pub fn boolean_false() -> Node {
        Node::function_call("operator_not", vec![Node::boolean_true()], true)
    }

    /// Recognizes the `operator_not`-chain boolean encoding.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Node::FunctionCall { name, args, .. } if name == "operator_not" && args.len() <= 1
        )
    }

    /// Decodes a node produced by `boolean_true`/`boolean_false`.
    /// Panics (a programmer error, not a pipeline error) if `self` is
    /// not in the encoded-boolean shape; callers should check
    /// `is_boolean` first.
    pub fn value_of_boolean(&self) -> bool {
        match self {
            Node::FunctionCall { name, args, .. } if name == "operator_not" => args.is_empty(),
            _ => panic!("value_of_boolean called on a non-boolean node"),
        }
    }

    pub fn dump(&self) -> String {
        self.dump_indented(0)
    }

    fn dump_indented(&self, indent: usize) -> String {
        const STEP: &str = " |  ";
        let pad = STEP.repeat(indent);
        let child_pad = STEP.repeat(indent + 1);
        match self {
            Node::Program(body) => format!("{pad}Program {{\n{}{pad}}}\n", dump_list(body, indent + 1)),
            Node::Block(body) => format!("{pad}Block {{\n{}{pad}}}\n", dump_list(body, indent + 1)),
            Node::Number(n) => format!("{pad}Number {n}\n"),
            Node::String(s) => format!("{pad}String {s}\n"),
            Node::Identifier(name) => format!("{pad}Identifier {name}\n"),
            Node::ListIdentifier(name) => format!("{pad}ListIdentifier {name}\n"),
            Node::FunctionCall { name, args, always_builtin } => format!(
                "{pad}FunctionCall {{\n{child_pad}[str] {name}\n{child_pad}[bool] {always_builtin}\n{}{pad}}}\n",
                dump_list(args, indent + 1)
            ),
            Node::VariableDeclaration { name, is_const, is_array } => format!(
                "{pad}VariableDeclaration {{\n{child_pad}[str] {name}\n{child_pad}[bool] {is_const}\n{child_pad}[bool] {is_array}\n{pad}}}\n"
            ),
            Node::FunctionDeclaration { name, params, body, attributes } => format!(
                "{pad}FunctionDeclaration {{\n{child_pad}[str] {name}\n{}{}{}{pad}}}\n",
                dump_str_list(params, indent + 1),
                dump_str_list(attributes, indent + 1),
                body.dump_indented(indent + 1),
            ),
            Node::Clone { inner_block, .. } => {
                format!("{pad}Clone {{\n{}{pad}}}\n", inner_block.dump_indented(indent + 1))
            }
            Node::Custom(name) => format!("{pad}Custom {name}\n"),
            Node::Macro { name, params, body } => format!(
                "{pad}Macro {{\n{child_pad}[str] {name}\n{}{}{pad}}}\n",
                dump_str_list(params, indent + 1),
                dump_list(body, indent + 1),
            ),
        }
    }
}

fn dump_list(nodes: &[Node], indent: usize) -> String {
    const STEP: &str = " |  ";
    let pad = STEP.repeat(indent);
    let mut result = format!("{pad}[\n");
    for node in nodes {
        result.push_str(&node.dump_indented(indent + 1));
    }
    result.push_str(&format!("{pad}]\n"));
    result
}

fn dump_str_list(items: &[String], indent: usize) -> String {
    const STEP: &str = " |  ";
    let pad = STEP.repeat(indent);
    let child_pad = STEP.repeat(indent + 1);
    let mut result = format!("{pad}[\n");
    for item in items {
        result.push_str(&format!("{child_pad}{item}\n"));
    }
    result.push_str(&format!("{pad}]\n"));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_const_array() {
        assert!(Node::variable_declaration("a", true, true).is_err());
    }

    #[test]
    fn allows_const_or_array_alone() {
        assert!(Node::variable_declaration("a", true, false).is_ok());
        assert!(Node::variable_declaration("a", false, true).is_ok());
    }

    #[test]
    fn boolean_roundtrip() {
        for b in [true, false] {
            let encoded = if b { Node::boolean_true() } else { Node::boolean_false() };
            assert!(encoded.is_boolean());
            assert_eq!(encoded.value_of_boolean(), b);
        }
    }

    #[test]
    fn clone_is_a_structural_deep_copy() {
        let node = Node::Program(vec![Node::Number(1.0), Node::String("x".into())]);
        let copy = node.clone();
        assert_eq!(node, copy);
    }

    #[test]
    fn dump_nests_child_blocks() {
        let node = Node::Program(vec![Node::Number(2.0)]);
        let text = node.dump();
        assert!(text.starts_with("Program {"));
        assert!(text.contains("Number 2"));
    }
}
