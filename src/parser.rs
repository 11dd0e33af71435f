//! Parser
//!
//! Recursive descent over the token stream, producing a `Program`.
//! The precedence ladder, the `sign_to_english`/`inverse_sign` style
//! comparison rewriting, and the overall statement/expression method
//! split are grounded directly on the original implementation's
//! hand-written descent (`parse.py`): `parse_and_expression` →
//! `parse_or_expression` → `parse_comparison_expression` →
//! `parse_join_expression` → `parse_additive_expression` →
//! `parse_multiplicative_expression` → `parse_subscript_expression` →
//! `parse_factor`.
//!
//! Everything involving lists (array literals, `->` ranges, list
//! concatenation, `for (v = seq)`, indexed assignment, `delete`) has
//! no counterpart in that original — it did not have arrays — and is
//! built fresh from the desugaring rules, injecting synthetic
//! declarations and statements into the enclosing body via a small
//! per-statement pending stack rather than mutating the body in place.

use crate::ast::Node;
use crate::error::{CompileError, Result};
use crate::scope::{ParserFunction, ParserScopeArena, ParserVariable, ScopeIndex};
use crate::token::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Node> {
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    parser.skip_statement_ends();
    while !parser.check_kind(TokenKind::Eof) {
        parser.parse_statement_into(&mut body)?;
        parser.skip_statement_ends();
    }
    Ok(Node::Program(body))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    scopes: ParserScopeArena,
    scope: ScopeIndex,
    /// One frame per in-flight statement. Expression-level desugaring
    /// (array literals, ranges, concatenation) pushes the statements it
    /// needs onto the top frame; `parse_statement_into` drains the
    /// frame into the enclosing body ahead of the statement itself.
    pending_stack: Vec<Vec<Node>>,
    site_counter: u64,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let scopes = ParserScopeArena::new();
        let scope = scopes.root();
        Self {
            tokens,
            pos: 0,
            scopes,
            scope,
            pending_stack: Vec::new(),
            site_counter: 0,
        }
    }

    // -- token stream -----------------------------------------------

    fn peek_at(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .unwrap_or_else(|| self.tokens.last().expect("token stream always ends in EOF"))
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn advance(&mut self) -> Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        let tok = self.tokens[idx].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_kw(&self, kw: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().lexeme == kw
    }

    fn check_op(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.peek().kind == kind && self.peek().lexeme == lexeme
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check_kind(kind) {
            Ok(self.advance())
        } else {
            Err(CompileError::parse(format!(
                "expected {} but found {}",
                kind,
                self.peek().desc()
            )))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<Token> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(CompileError::parse(format!(
                "expected \"{}\" but found {}",
                kw,
                self.peek().desc()
            )))
        }
    }

    fn skip_statement_ends(&mut self) {
        while self.check_kind(TokenKind::StatementEnd) {
            self.advance();
        }
    }

    fn expect_statement_end(&mut self) -> Result<()> {
        if self.check_kind(TokenKind::StatementEnd) {
            self.skip_statement_ends();
            return Ok(());
        }
        if matches!(self.peek().kind, TokenKind::BlockEnd | TokenKind::Eof) {
            return Ok(());
        }
        Err(CompileError::parse(format!(
            "expected statement end but found {}",
            self.peek().desc()
        )))
    }

    // -- bookkeeping --------------------------------------------------

    fn alloc_site(&mut self) -> u64 {
        let site = self.site_counter;
        self.site_counter += 1;
        site
    }

    fn fresh_scratch_name(&mut self, prefix: &str) -> String {
        format!("__{}_{}__", prefix, self.alloc_site())
    }

    fn push_pending(&mut self, node: Node) {
        self.pending_stack
            .last_mut()
            .expect("pending frame active while parsing a statement")
            .push(node);
    }

    fn negate(&self, node: Node) -> Node {
        if node.is_boolean() {
            if node.value_of_boolean() {
                Node::boolean_false()
            } else {
                Node::boolean_true()
            }
        } else {
            Node::function_call("operator_not", vec![node], true)
        }
    }

    // -- statements ---------------------------------------------------

    /// Parses one logical statement, draining any synthetic statements
    /// it required ahead of its own node(s) into `body`.
    fn parse_statement_into(&mut self, body: &mut Vec<Node>) -> Result<()> {
        self.pending_stack.push(Vec::new());
        let nodes = self.parse_statement();
        let pending = self.pending_stack.pop().expect("frame just pushed");
        let nodes = nodes?;
        body.extend(pending);
        body.extend(nodes);
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<Vec<Node>> {
        if self.check_kind(TokenKind::BlockStart) {
            return Ok(vec![self.parse_block_as_node()?]);
        }
        if self.check_kind(TokenKind::Keyword) {
            match self.peek().lexeme.as_str() {
                "var" | "const" | "array" => return self.parse_declaration_statement(),
                "if" => return Ok(vec![self.parse_if_statement()?]),
                "while" | "until" => return Ok(vec![self.parse_repeat_statement()?]),
                "for" => return Ok(vec![self.parse_for_statement()?]),
                "function" | "attribute" => return Ok(vec![self.parse_function_declaration()?]),
                "clone" => return Ok(vec![self.parse_clone_statement()?]),
                "delete" => return Ok(vec![self.parse_delete_statement()?]),
                _ => {}
            }
        }
        if self.check_kind(TokenKind::Identifier) {
            if self.peek_at(1).kind == TokenKind::Assignment {
                return self.parse_assignment_statement();
            }
            if self.peek_at(1).kind == TokenKind::SubscriptLeft {
                return self.parse_indexed_assignment_statement();
            }
        }
        let expr = self.parse_and_expression()?;
        self.expect_statement_end()?;
        Ok(vec![expr])
    }

    fn parse_declaration_statement(&mut self) -> Result<Vec<Node>> {
        let mut is_const = false;
        let mut is_array = false;
        loop {
            if !self.check_kind(TokenKind::Keyword) {
                break;
            }
            match self.peek().lexeme.as_str() {
                "const" => {
                    is_const = true;
                    self.advance();
                }
                "array" => {
                    is_array = true;
                    self.advance();
                }
                "var" => {
                    self.advance();
                }
                _ => break,
            }
        }
        let name_tok = self.expect(TokenKind::Identifier)?;
        let name = name_tok.lexeme;
        self.scopes.declare_variable(self.scope, name.clone(), ParserVariable { is_const, is_array })?;
        let decl = Node::variable_declaration(name.clone(), is_const, is_array)?;

        if is_array {
            if self.check_op(TokenKind::Assignment, "=") {
                self.advance();
                let list_node = Node::ListIdentifier(name);
                let mut out = vec![decl];
                out.extend(self.parse_array_literal_contents(list_node)?);
                self.expect_statement_end()?;
                return Ok(out);
            }
            self.expect_statement_end()?;
            return Ok(vec![decl]);
        }

        if self.check_op(TokenKind::Assignment, "=") {
            self.advance();
            let value = self.parse_and_expression()?;
            self.expect_statement_end()?;
            let set = Node::function_call("data_setvariableto", vec![Node::Identifier(name), value], true);
            return Ok(vec![decl, set]);
        }

        if is_const {
            return Err(CompileError::parse("const declaration requires an initializer"));
        }
        self.expect_statement_end()?;
        Ok(vec![decl])
    }

    fn parse_assignment_statement(&mut self) -> Result<Vec<Node>> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        let name = name_tok.lexeme;
        let var = self
            .scopes
            .resolve_variable(self.scope, &name)
            .cloned()
            .ok_or_else(|| CompileError::parse(format!("assignment to undeclared identifier \"{}\"", name)))?;
        let op_tok = self.expect(TokenKind::Assignment)?;
        let rhs = self.parse_and_expression()?;
        self.expect_statement_end()?;

        if var.is_array {
            let target = Node::ListIdentifier(name.clone());
            let source = match rhs {
                Node::ListIdentifier(_) => rhs,
                _ => {
                    return Err(CompileError::parse(format!(
                        "cannot assign a non-list value to list \"{}\"",
                        name
                    )))
                }
            };
            let clear = match op_tok.lexeme.as_str() {
                "=" => true,
                "+=" => false,
                other => {
                    return Err(CompileError::parse(format!(
                        "operator \"{}\" is not valid on a list",
                        other
                    )))
                }
            };
            return Ok(self.desugar_list_copy(target, source, clear));
        }

        let target = Node::Identifier(name);
        let stmt = match op_tok.lexeme.as_str() {
            "=" => Node::function_call("data_setvariableto", vec![target, rhs], true),
            "+=" => Node::function_call("data_changevariableby", vec![target, rhs], true),
            "-=" => compound_assign(target, "operator_subtract", rhs),
            "*=" => compound_assign(target, "operator_multiply", rhs),
            "/=" => compound_assign(target, "operator_divide", rhs),
            "%=" => compound_assign(target, "operator_mod", rhs),
            other => return Err(CompileError::parse(format!("unknown assignment operator \"{}\"", other))),
        };
        Ok(vec![stmt])
    }

    fn parse_indexed_assignment_statement(&mut self) -> Result<Vec<Node>> {
        let base = self.parse_identifier()?;
        self.expect(TokenKind::SubscriptLeft)?;
        let index = self.parse_join_expression()?;
        self.expect(TokenKind::SubscriptRight)?;
        let op_tok = self.expect(TokenKind::Assignment)?;
        if op_tok.lexeme != "=" {
            return Err(CompileError::parse("only \"=\" is supported for indexed assignment"));
        }
        let value = self.parse_and_expression()?;
        self.expect_statement_end()?;
        match base {
            Node::ListIdentifier(_) => Ok(vec![Node::function_call("data_replaceitemoflist", vec![base, index, value], true)]),
            _ => Err(CompileError::parse("indexed assignment target must be a list")),
        }
    }

    fn parse_delete_statement(&mut self) -> Result<Node> {
        self.expect_kw("delete")?;
        let base = self.parse_identifier()?;
        self.expect(TokenKind::SubscriptLeft)?;
        let index = self.parse_join_expression()?;
        self.expect(TokenKind::SubscriptRight)?;
        self.expect_statement_end()?;
        match base {
            Node::ListIdentifier(_) => Ok(Node::function_call("data_deleteoflist", vec![base, index], true)),
            _ => Err(CompileError::parse("delete target must be a list")),
        }
    }

    fn parse_block_as_node(&mut self) -> Result<Node> {
        self.expect(TokenKind::BlockStart)?;
        let saved = self.scope;
        self.scope = self.scopes.push_child(saved);
        let mut body = Vec::new();
        self.skip_statement_ends();
        while !self.check_kind(TokenKind::BlockEnd) {
            self.parse_statement_into(&mut body)?;
            self.skip_statement_ends();
        }
        self.expect(TokenKind::BlockEnd)?;
        self.scope = saved;
        Ok(Node::Block(body))
    }

    /// `if`/`while`/`until` bodies accept either a `{ ... }` block or a
    /// single bare statement; either way the result is wrapped as a
    /// `Block` in its own child scope.
    fn parse_block_or_single_statement(&mut self) -> Result<Node> {
        if self.check_kind(TokenKind::BlockStart) {
            return self.parse_block_as_node();
        }
        let saved = self.scope;
        self.scope = self.scopes.push_child(saved);
        let mut body = Vec::new();
        let result = self.parse_statement_into(&mut body);
        self.scope = saved;
        result?;
        Ok(Node::Block(body))
    }

    fn parse_if_statement(&mut self) -> Result<Node> {
        self.expect_kw("if")?;
        self.expect(TokenKind::LeftParen)?;
        let cond = self.parse_and_expression()?;
        self.expect(TokenKind::RightParen)?;
        let then_branch = self.parse_block_or_single_statement()?;
        if self.check_kw("else") {
            self.advance();
            let else_branch = if self.check_kw("if") {
                self.parse_if_statement()?
            } else {
                self.parse_block_or_single_statement()?
            };
            return Ok(Node::function_call("control_if_else", vec![cond, then_branch, else_branch], true));
        }
        Ok(Node::function_call("control_if", vec![cond, then_branch], true))
    }

    fn parse_repeat_statement(&mut self) -> Result<Node> {
        let is_while = self.check_kw("while");
        self.advance();
        self.expect(TokenKind::LeftParen)?;
        let cond = self.parse_and_expression()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_block_or_single_statement()?;
        let until_cond = if is_while { self.negate(cond) } else { cond };
        Ok(Node::function_call("control_repeat_until", vec![until_cond, body], true))
    }

    fn parse_for_statement(&mut self) -> Result<Node> {
        self.expect_kw("for")?;
        self.expect(TokenKind::LeftParen)?;
        let var_tok = self.expect(TokenKind::Identifier)?;
        let var_name = var_tok.lexeme;
        let assign_tok = self.expect(TokenKind::Assignment)?;
        if assign_tok.lexeme != "=" {
            return Err(CompileError::parse("for (v = seq) requires \"=\""));
        }
        let seq_expr = self.parse_and_expression()?;
        self.expect(TokenKind::RightParen)?;
        let seq = match seq_expr {
            Node::ListIdentifier(_) => seq_expr,
            _ => return Err(CompileError::parse("for (v = seq) requires seq to be a list")),
        };

        let saved = self.scope;
        self.scope = self.scopes.push_child(saved);
        self.scopes
            .declare_variable(self.scope, var_name.clone(), ParserVariable { is_const: false, is_array: false })?;
        let idx_name = self.fresh_scratch_name("for_idx");
        self.scopes
            .declare_variable(self.scope, idx_name.clone(), ParserVariable { is_const: false, is_array: false })?;
        let body = self.parse_block_or_single_statement()?;
        self.scope = saved;

        let idx_ident = Node::Identifier(idx_name.clone());
        let var_ident = Node::Identifier(var_name.clone());
        let mut loop_body_stmts = vec![
            Node::function_call("data_changevariableby", vec![idx_ident.clone(), Node::Number(1.0)], true),
            Node::function_call(
                "data_setvariableto",
                vec![var_ident, Node::function_call("data_itemoflist", vec![idx_ident.clone(), seq.clone()], true)],
                true,
            ),
        ];
        match body {
            Node::Block(inner) => loop_body_stmts.extend(inner),
            other => loop_body_stmts.push(other),
        }
        let cond = Node::function_call(
            "operator_equals",
            vec![idx_ident.clone(), Node::function_call("data_lengthoflist", vec![seq], true)],
            true,
        );
        let repeat = Node::function_call("control_repeat_until", vec![cond, Node::Block(loop_body_stmts)], true);

        Ok(Node::Block(vec![
            Node::variable_declaration(var_name, false, false)?,
            Node::variable_declaration(idx_name, false, false)?,
            Node::function_call("data_setvariableto", vec![idx_ident, Node::Number(0.0)], true),
            repeat,
        ]))
    }

    fn parse_attribute_clause(&mut self) -> Result<Vec<String>> {
        self.expect_kw("attribute")?;
        self.expect(TokenKind::LeftParen)?;
        let mut names = Vec::new();
        if !self.check_kind(TokenKind::RightParen) {
            loop {
                let tok = self.expect(TokenKind::Identifier)?;
                names.push(tok.lexeme);
                if self.check_kind(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(names)
    }

    fn parse_function_declaration(&mut self) -> Result<Node> {
        let mut attributes = Vec::new();
        while self.check_kw("attribute") {
            attributes.extend(self.parse_attribute_clause()?);
        }
        self.expect_kw("function")?;
        let name_tok = self.expect(TokenKind::Identifier)?;
        let name = name_tok.lexeme;
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check_kind(TokenKind::RightParen) {
            loop {
                let p = self.expect(TokenKind::Identifier)?;
                params.push(p.lexeme);
                if self.check_kind(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        while self.check_kw("attribute") {
            attributes.extend(self.parse_attribute_clause()?);
        }

        self.scopes
            .declare_function(self.scope, name.clone(), ParserFunction { params: params.clone() })?;

        // Suppress a *second* scope for the body: params and body
        // locals share one record so parameter bindings are visible.
        let saved = self.scope;
        self.scope = self.scopes.push_child(saved);
        for p in &params {
            self.scopes
                .declare_variable(self.scope, p.clone(), ParserVariable { is_const: false, is_array: false })?;
        }
        self.expect(TokenKind::BlockStart)?;
        let mut body = Vec::new();
        self.skip_statement_ends();
        while !self.check_kind(TokenKind::BlockEnd) {
            self.parse_statement_into(&mut body)?;
            self.skip_statement_ends();
        }
        self.expect(TokenKind::BlockEnd)?;
        self.scope = saved;

        Ok(Node::FunctionDeclaration {
            name,
            params,
            body: Box::new(Node::Block(body)),
            attributes,
        })
    }

    fn parse_clone_statement(&mut self) -> Result<Node> {
        self.expect_kw("clone")?;
        let site = self.alloc_site();
        let body = self.parse_block_or_single_statement()?;

        let discriminator = || Node::Custom("__clone_discriminator__".to_string());
        let sentinel = Node::Number(site as f64);

        let synthesized_parent_block = Node::Block(vec![
            Node::function_call("data_setvariableto", vec![discriminator(), sentinel.clone()], true),
            Node::function_call(
                "control_create_clone_of",
                vec![Node::function_call("control_create_clone_of_menu", vec![Node::Custom("_myself_".to_string())], true)],
                true,
            ),
        ]);
        let inner_block = Node::Block(vec![Node::function_call(
            "control_if",
            vec![Node::function_call("operator_equals", vec![discriminator(), sentinel], true), body],
            true,
        )]);

        Ok(Node::Clone {
            site,
            inner_block: Box::new(inner_block),
            synthesized_parent_block: Box::new(synthesized_parent_block),
        })
    }

    // -- array / list desugaring ---------------------------------------

    fn parse_array_literal_contents(&mut self, list_node: Node) -> Result<Vec<Node>> {
        self.expect(TokenKind::SubscriptLeft)?;
        let mut stmts = vec![Node::function_call("data_deletealloflist", vec![list_node.clone()], true)];
        if !self.check_kind(TokenKind::SubscriptRight) {
            loop {
                let element = self.parse_and_expression()?;
                stmts.push(Node::function_call("data_addtolist", vec![list_node.clone(), element], true));
                if self.check_kind(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::SubscriptRight)?;
        Ok(stmts)
    }

    /// A standalone `[a, b, …]` appearing inside an expression: a
    /// fresh list is declared and populated as synthetic statements,
    /// and the expression evaluates to that list's identifier.
    fn parse_array_literal_expression(&mut self) -> Result<Node> {
        let name = self.fresh_scratch_name("array");
        self.scopes
            .declare_variable(self.scope, name.clone(), ParserVariable { is_const: false, is_array: true })
            .expect("fresh scratch name never collides");
        let list_node = Node::ListIdentifier(name.clone());
        self.push_pending(Node::variable_declaration(name, false, true).expect("array decl is valid"));
        for stmt in self.parse_array_literal_contents(list_node.clone())? {
            self.push_pending(stmt);
        }
        Ok(list_node)
    }

    fn desugar_range(&mut self, lo: Node, hi: Node) -> Node {
        let list_name = self.fresh_scratch_name("range");
        let idx_name = self.fresh_scratch_name("range_idx");
        self.scopes
            .declare_variable(self.scope, list_name.clone(), ParserVariable { is_const: false, is_array: true })
            .expect("fresh scratch name never collides");
        self.scopes
            .declare_variable(self.scope, idx_name.clone(), ParserVariable { is_const: false, is_array: false })
            .expect("fresh scratch name never collides");
        let list_node = Node::ListIdentifier(list_name.clone());
        let idx_node = Node::Identifier(idx_name.clone());

        self.push_pending(Node::variable_declaration(list_name, false, true).expect("array decl is valid"));
        self.push_pending(Node::variable_declaration(idx_name, false, false).expect("scalar decl is valid"));
        self.push_pending(Node::function_call("data_deletealloflist", vec![list_node.clone()], true));
        self.push_pending(Node::function_call("data_setvariableto", vec![idx_node.clone(), lo], true));
        let body = Node::Block(vec![
            Node::function_call("data_addtolist", vec![list_node.clone(), idx_node.clone()], true),
            Node::function_call("data_changevariableby", vec![idx_node.clone(), Node::Number(1.0)], true),
        ]);
        let cond = Node::function_call("operator_gt", vec![idx_node, hi], true);
        self.push_pending(Node::function_call("control_repeat_until", vec![cond, body], true));
        list_node
    }

    fn desugar_concat(&mut self, left: Node, right: Node) -> Node {
        let list_name = self.fresh_scratch_name("concat");
        let idx_name = self.fresh_scratch_name("concat_idx");
        self.scopes
            .declare_variable(self.scope, list_name.clone(), ParserVariable { is_const: false, is_array: true })
            .expect("fresh scratch name never collides");
        self.scopes
            .declare_variable(self.scope, idx_name.clone(), ParserVariable { is_const: false, is_array: false })
            .expect("fresh scratch name never collides");
        let list_node = Node::ListIdentifier(list_name.clone());
        let idx_node = Node::Identifier(idx_name.clone());

        self.push_pending(Node::variable_declaration(list_name, false, true).expect("array decl is valid"));
        self.push_pending(Node::variable_declaration(idx_name, false, false).expect("scalar decl is valid"));
        self.push_pending(Node::function_call("data_deletealloflist", vec![list_node.clone()], true));
        for source in [left, right] {
            self.push_pending(Node::function_call("data_setvariableto", vec![idx_node.clone(), Node::Number(1.0)], true));
            let body = Node::Block(vec![
                Node::function_call(
                    "data_addtolist",
                    vec![list_node.clone(), Node::function_call("data_itemoflist", vec![idx_node.clone(), source.clone()], true)],
                    true,
                ),
                Node::function_call("data_changevariableby", vec![idx_node.clone(), Node::Number(1.0)], true),
            ]);
            let cond = Node::function_call(
                "operator_gt",
                vec![idx_node.clone(), Node::function_call("data_lengthoflist", vec![source], true)],
                true,
            );
            self.push_pending(Node::function_call("control_repeat_until", vec![cond, body], true));
        }
        list_node
    }

    fn desugar_list_copy(&mut self, target: Node, source: Node, clear: bool) -> Vec<Node> {
        let idx_name = self.fresh_scratch_name("copy_idx");
        self.scopes
            .declare_variable(self.scope, idx_name.clone(), ParserVariable { is_const: false, is_array: false })
            .expect("fresh scratch name never collides");
        let idx_ident = Node::Identifier(idx_name.clone());

        let mut stmts = vec![Node::variable_declaration(idx_name, false, false).expect("scalar decl is valid")];
        if clear {
            stmts.push(Node::function_call("data_deletealloflist", vec![target.clone()], true));
        }
        stmts.push(Node::function_call("data_setvariableto", vec![idx_ident.clone(), Node::Number(1.0)], true));
        let cond = Node::function_call(
            "operator_gt",
            vec![idx_ident.clone(), Node::function_call("data_lengthoflist", vec![source.clone()], true)],
            true,
        );
        let body = Node::Block(vec![
            Node::function_call(
                "data_addtolist",
                vec![target, Node::function_call("data_itemoflist", vec![idx_ident.clone(), source], true)],
                true,
            ),
            Node::function_call("data_changevariableby", vec![idx_ident, Node::Number(1.0)], true),
        ]);
        stmts.push(Node::function_call("control_repeat_until", vec![cond, body], true));
        stmts
    }

    fn combine_maybe_list(&mut self, left: Node, right: Node, scalar_opcode: &'static str) -> Result<Node> {
        match (&left, &right) {
            (Node::ListIdentifier(_), Node::ListIdentifier(_)) => Ok(self.desugar_concat(left, right)),
            (Node::ListIdentifier(_), _) | (_, Node::ListIdentifier(_)) => {
                Err(CompileError::parse("cannot mix a list and a scalar in this operator"))
            }
            _ => Ok(Node::function_call(scalar_opcode, vec![left, right], true)),
        }
    }

    // -- expressions ----------------------------------------------------

    fn parse_left_assoc(&mut self, ops: &[&str], next_level: fn(&mut Parser) -> Result<Node>) -> Result<Node> {
        let mut left = next_level(self)?;
        loop {
            let matches_op = matches!(self.peek().kind, TokenKind::Operator | TokenKind::Compare) && ops.contains(&self.peek().lexeme.as_str());
            if !matches_op {
                break;
            }
            let op = self.advance().lexeme;
            let right = next_level(self)?;
            left = Node::function_call(sign_opcode(&op), vec![left, right], true);
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Node> {
        self.parse_left_assoc(&["&&"], Parser::parse_or_expression)
    }

    fn parse_or_expression(&mut self) -> Result<Node> {
        self.parse_left_assoc(&["||"], Parser::parse_comparison_expression)
    }

    fn parse_comparison_expression(&mut self) -> Result<Node> {
        let mut inverse = false;
        if self.check_op(TokenKind::Operator, "!") {
            self.advance();
            inverse = true;
        }
        if self.check_kind(TokenKind::LeftParen) {
            self.advance();
            let inner = self.parse_and_expression()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(if inverse { self.negate(inner) } else { inner });
        }
        if self.check_kw("true") {
            self.advance();
            return Ok(if inverse { Node::boolean_false() } else { Node::boolean_true() });
        }
        if self.check_kw("false") {
            self.advance();
            return Ok(if inverse { Node::boolean_true() } else { Node::boolean_false() });
        }

        let left = self.parse_range_expression()?;
        if self.check_kind(TokenKind::Compare) {
            let op = self.advance().lexeme;
            let right = self.parse_range_expression()?;
            let (a, b, opcode, flip) = match op.as_str() {
                "==" => (left, right, "operator_equals", false),
                "!=" => (left, right, "operator_equals", true),
                ">" => (left, right, "operator_gt", false),
                "<" => (left, right, "operator_lt", false),
                "<=" => (left, right, "operator_gt", true),
                ">=" => (left, right, "operator_lt", true),
                "in" => (right, left, "operator_contains", false),
                "contains" => (left, right, "operator_contains", false),
                other => return Err(CompileError::parse(format!("unknown comparison operator \"{}\"", other))),
            };
            if flip {
                inverse = !inverse;
            }
            let node = Node::function_call(opcode, vec![a, b], true);
            return Ok(if inverse { self.negate(node) } else { node });
        }
        Ok(if inverse { self.negate(left) } else { left })
    }

    /// `->` range: not present in the original language (it had no
    /// arrays). Sits between comparison and join per the precedence
    /// ladder and desugars into a fresh list.
    fn parse_range_expression(&mut self) -> Result<Node> {
        let left = self.parse_join_expression()?;
        if self.check_op(TokenKind::Operator, "->") {
            self.advance();
            let right = self.parse_join_expression()?;
            return Ok(self.desugar_range(left, right));
        }
        Ok(left)
    }

    fn parse_join_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_additive_expression()?;
        while self.check_op(TokenKind::Operator, "..") {
            self.advance();
            let right = self.parse_additive_expression()?;
            left = self.combine_maybe_list(left, right, "operator_join")?;
        }
        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            if self.check_op(TokenKind::Operator, "+") {
                self.advance();
                let right = self.parse_multiplicative_expression()?;
                left = self.combine_maybe_list(left, right, "operator_add")?;
            } else if self.check_op(TokenKind::Operator, "-") {
                self.advance();
                let right = self.parse_multiplicative_expression()?;
                left = Node::function_call("operator_subtract", vec![left, right], true);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Node> {
        self.parse_left_assoc(&["*", "/", "%"], Parser::parse_subscript_expression)
    }

    fn parse_subscript_expression(&mut self) -> Result<Node> {
        let mut base = self.parse_factor()?;
        while self.check_kind(TokenKind::SubscriptLeft) {
            self.advance();
            let index = self.parse_join_expression()?;
            self.expect(TokenKind::SubscriptRight)?;
            base = match base {
                Node::ListIdentifier(_) => Node::function_call("data_itemoflist", vec![index, base], true),
                other => Node::function_call("operator_letter_of", vec![index, other], true),
            };
        }
        Ok(base)
    }

    fn parse_factor(&mut self) -> Result<Node> {
        let mut multiplier = 1.0_f64;
        loop {
            if self.check_op(TokenKind::Operator, "+") {
                self.advance();
            } else if self.check_op(TokenKind::Operator, "-") {
                multiplier = -multiplier;
                self.advance();
            } else {
                break;
            }
        }
        match self.peek().kind {
            TokenKind::Integer => {
                let tok = self.advance();
                Ok(Node::Number(parse_integer_literal(&tok.lexeme)? * multiplier))
            }
            TokenKind::Float => {
                let tok = self.advance();
                Ok(Node::Number(parse_float_literal(&tok.lexeme)? * multiplier))
            }
            _ => {
                let base = self.parse_factor_base()?;
                if (multiplier - 1.0).abs() > f64::EPSILON {
                    Ok(Node::function_call("operator_multiply", vec![Node::Number(multiplier), base], true))
                } else {
                    Ok(base)
                }
            }
        }
    }

    fn parse_factor_base(&mut self) -> Result<Node> {
        match self.peek().kind {
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_join_expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::String => {
                let tok = self.advance();
                Ok(Node::String(tok.lexeme))
            }
            TokenKind::SubscriptLeft => self.parse_array_literal_expression(),
            TokenKind::Identifier => self.parse_identifier_or_call(),
            _ => Err(CompileError::parse(format!("unexpected token {}", self.peek().desc()))),
        }
    }

    fn parse_identifier(&mut self) -> Result<Node> {
        let tok = self.expect(TokenKind::Identifier)?;
        let name = tok.lexeme;
        let is_list = self.scopes.resolve_variable(self.scope, &name).map(|v| v.is_array).unwrap_or(false);
        Ok(if is_list { Node::ListIdentifier(name) } else { Node::Identifier(name) })
    }

    fn parse_identifier_or_call(&mut self) -> Result<Node> {
        if self.peek_at(1).kind == TokenKind::LeftParen {
            self.parse_function_call()
        } else {
            self.parse_identifier()
        }
    }

    fn parse_function_call(&mut self) -> Result<Node> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        let name = name_tok.lexeme;
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        if !self.check_kind(TokenKind::RightParen) {
            loop {
                args.push(self.parse_join_expression()?);
                if self.check_kind(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        // `print` is sugar for the stage runtime's say bubble; rewritten
        // here rather than left for the lowerer so a shadowing user
        // function named `print` is impossible to express by accident.
        if name == "print" {
            return Ok(Node::function_call("looks_say", args, true));
        }
        Ok(Node::function_call(name, args, false))
    }
}

fn compound_assign(target: Node, opcode: &'static str, rhs: Node) -> Node {
    Node::function_call(
        "data_setvariableto",
        vec![target.clone(), Node::function_call(opcode, vec![target, rhs], true)],
        true,
    )
}

fn sign_opcode(op: &str) -> &'static str {
    match op {
        "&&" => "operator_and",
        "||" => "operator_or",
        "*" => "operator_multiply",
        "/" => "operator_divide",
        "%" => "operator_mod",
        other => panic!("no opcode mapping for operator \"{}\"", other),
    }
}

fn parse_integer_literal(lexeme: &str) -> Result<f64> {
    if let Some(rest) = lexeme.strip_prefix("0b") {
        return i64::from_str_radix(rest, 2)
            .map(|v| v as f64)
            .map_err(|_| CompileError::parse(format!("invalid binary integer literal \"{}\"", lexeme)));
    }
    if let Some(rest) = lexeme.strip_prefix("0o") {
        return i64::from_str_radix(rest, 8)
            .map(|v| v as f64)
            .map_err(|_| CompileError::parse(format!("invalid octal integer literal \"{}\"", lexeme)));
    }
    if let Some(rest) = lexeme.strip_prefix("0x") {
        return i64::from_str_radix(rest, 16)
            .map(|v| v as f64)
            .map_err(|_| CompileError::parse(format!("invalid hexadecimal integer literal \"{}\"", lexeme)));
    }
    lexeme
        .parse::<f64>()
        .map_err(|_| CompileError::parse(format!("invalid integer literal \"{}\"", lexeme)))
}

fn parse_float_literal(lexeme: &str) -> Result<f64> {
    let mut s = lexeme.to_string();
    if s.starts_with('.') {
        s = format!("0{}", s);
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s.parse::<f64>().map_err(|_| CompileError::parse(format!("invalid float literal \"{}\"", lexeme)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_source(src: &str) -> Result<Node> {
        parse(lexer::tokenize(src).unwrap())
    }

    #[test]
    fn declares_and_initializes_a_scalar() {
        let program = parse_source("var x = 1;").unwrap();
        match program {
            Node::Program(body) => {
                assert_eq!(body.len(), 2);
                assert!(matches!(body[0], Node::VariableDeclaration { .. }));
                assert!(matches!(&body[1], Node::FunctionCall { name, .. } if name == "data_setvariableto"));
            }
            _ => panic!("expected Program"),
        }
    }

    #[test]
    fn boolean_literals_encode_without_a_native_type() {
        let program = parse_source("var x = true;").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[1] {
                assert!(args[1].is_boolean());
                assert!(args[1].value_of_boolean());
            } else {
                panic!("expected data_setvariableto");
            }
        }
    }

    #[test]
    fn inverse_comparison_rewrites_to_not_of_the_flipped_operator() {
        let program = parse_source("var x = 1 != 2;").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[1] {
                match &args[1] {
                    Node::FunctionCall { name, args: inner, .. } => {
                        assert_eq!(name, "operator_not");
                        assert!(matches!(&inner[0], Node::FunctionCall { name, .. } if name == "operator_equals"));
                    }
                    _ => panic!("expected operator_not wrapper"),
                }
            }
        }
    }

    #[test]
    fn in_swaps_operands_into_operator_contains() {
        let program = parse_source("var hay = \"abc\"; var x = \"a\" in hay;").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[3] {
                match &args[1] {
                    Node::FunctionCall { name, args: inner, .. } => {
                        assert_eq!(name, "operator_contains");
                        assert_eq!(inner[0], Node::Identifier("hay".to_string()));
                    }
                    _ => panic!("expected operator_contains"),
                }
            }
        }
    }

    #[test]
    fn if_else_lowers_to_control_if_else() {
        let program = parse_source("if (true) { var x = 1; } else { var y = 2; }").unwrap();
        if let Node::Program(body) = program {
            assert!(matches!(&body[0], Node::FunctionCall { name, .. } if name == "control_if_else"));
        }
    }

    #[test]
    fn while_negates_condition_for_repeat_until() {
        let program = parse_source("var i = 0; while (i < 10) { i += 1; }").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { name, args, .. } = &body[2] {
                assert_eq!(name, "control_repeat_until");
                assert!(matches!(&args[0], Node::FunctionCall { name, .. } if name == "operator_not"));
            }
        }
    }

    #[test]
    fn array_literal_declaration_desugars_to_add_to_list_calls() {
        let program = parse_source("array xs = [1, 2, 3];").unwrap();
        if let Node::Program(body) = program {
            // declaration, delete_all, add x3
            assert_eq!(body.len(), 5);
            assert!(matches!(&body[1], Node::FunctionCall { name, .. } if name == "data_deletealloflist"));
            assert!(matches!(&body[2], Node::FunctionCall { name, .. } if name == "data_addtolist"));
        }
    }

    #[test]
    fn subscript_on_array_uses_item_of_list() {
        let program = parse_source("array xs = [1]; var x = xs[0];").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = body.last().unwrap() {
                assert!(matches!(&args[1], Node::FunctionCall { name, .. } if name == "data_itemoflist"));
            }
        }
    }

    #[test]
    fn subscript_on_scalar_uses_letter_of() {
        let program = parse_source("var s = \"hi\"; var c = s[0];").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = body.last().unwrap() {
                assert!(matches!(&args[1], Node::FunctionCall { name, .. } if name == "operator_letter_of"));
            }
        }
    }

    #[test]
    fn for_over_non_list_is_a_parse_error() {
        let err = parse_source("var s = 1; for (v = s) { }").unwrap_err();
        assert_eq!(err.category, crate::error::Category::Parse);
    }

    #[test]
    fn for_over_list_declares_index_and_repeats() {
        let program = parse_source("array xs = [1,2]; for (v = xs) { }").unwrap();
        if let Node::Program(body) = program {
            assert!(matches!(body.last().unwrap(), Node::Block(_)));
        }
    }

    #[test]
    fn function_declaration_carries_attributes_and_params() {
        let program = parse_source("attribute(nooptimize) function f(a, b) { var c = a; }").unwrap();
        if let Node::Program(body) = program {
            match &body[0] {
                Node::FunctionDeclaration { name, params, attributes, .. } => {
                    assert_eq!(name, "f");
                    assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
                    assert_eq!(attributes, &vec!["nooptimize".to_string()]);
                }
                _ => panic!("expected FunctionDeclaration"),
            }
        }
    }

    #[test]
    fn clone_statement_builds_discriminator_guard_and_parent_block() {
        let program = parse_source("clone { var x = 1; }").unwrap();
        if let Node::Program(body) = program {
            match &body[0] {
                Node::Clone { inner_block, synthesized_parent_block, .. } => {
                    assert!(matches!(**inner_block, Node::Block(_)));
                    assert!(matches!(**synthesized_parent_block, Node::Block(_)));
                }
                _ => panic!("expected Clone"),
            }
        }
    }

    #[test]
    fn unary_minus_on_literal_folds_into_the_number() {
        let program = parse_source("var x = -5;").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[1] {
                assert_eq!(args[1], Node::Number(-5.0));
            }
        }
    }

    #[test]
    fn unary_minus_on_call_wraps_in_multiply() {
        let program = parse_source("function f() { } var x = -f();").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[2] {
                assert!(matches!(&args[1], Node::FunctionCall { name, .. } if name == "operator_multiply"));
            }
        }
    }

    #[test]
    fn radix_and_leading_dot_literals_normalize() {
        let program = parse_source("var a = 0xFF; var b = .5;").unwrap();
        if let Node::Program(body) = program {
            if let Node::FunctionCall { args, .. } = &body[1] {
                assert_eq!(args[1], Node::Number(255.0));
            }
            if let Node::FunctionCall { args, .. } = &body[3] {
                assert_eq!(args[1], Node::Number(0.5));
            }
        }
    }

    #[test]
    fn print_rewrites_to_looks_say() {
        let program = parse_source("print(\"hi\");").unwrap();
        if let Node::Program(body) = program {
            assert!(matches!(&body[0], Node::FunctionCall { name, always_builtin: true, .. } if name == "looks_say"));
        }
    }
}
