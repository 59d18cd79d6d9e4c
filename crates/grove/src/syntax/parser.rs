//
// syntax/parser.rs
//
// Error-tolerant recursive-descent parser. Each top-level item is parsed as
// an independent chunk so unchanged items can be reused across edits.
//

use std::ops::Range;
use std::sync::Arc;

use super::kind::SyntaxKind;
use super::lexer::{lex, Token};
use super::tree::{GreenElement, GreenNode, GreenToken, SyntaxTree};

/// Parse a whole source text. Never fails; unparsable spans become `Error`
/// nodes and absent pieces become empty `Missing` nodes.
pub fn parse(text: &str) -> SyntaxTree {
    let tokens = lex(text);
    let items = split_chunks(&tokens)
        .into_iter()
        .map(|range| {
            let chunk = &tokens[range];
            (chunk[0].start, parse_chunk(text, chunk))
        })
        .collect();
    SyntaxTree::new(Arc::from(text), file_node(items, text.len() as u32))
}

/// Split a token stream into top-level chunks: every token that opens a
/// line in column 0 starts a new chunk.
pub(crate) fn split_chunks(tokens: &[Token]) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate().skip(1) {
        if token.line_start && token.col == 0 {
            chunks.push(start..i);
            start = i;
        }
    }
    if start < tokens.len() {
        chunks.push(start..tokens.len());
    }
    chunks
}

/// Parse one chunk into a single top-level green node.
pub(crate) fn parse_chunk(text: &str, tokens: &[Token]) -> Arc<GreenNode> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        bounds: vec![0],
        allow: 0,
        builder: Builder::new(text),
    };
    parser.item();
    parser.builder.finish()
}

pub(crate) fn file_node(items: Vec<(u32, Arc<GreenNode>)>, len: u32) -> Arc<GreenNode> {
    Arc::new(GreenNode {
        kind: SyntaxKind::File,
        len,
        children: items
            .into_iter()
            .map(|(offset, node)| (offset, GreenElement::Node(node)))
            .collect(),
    })
}

// ============================================================================
// Green tree builder
// ============================================================================

struct Builder<'t> {
    text: &'t str,
    parents: Vec<(SyntaxKind, usize)>,
    /// Finished children with absolute start offsets
    children: Vec<(u32, GreenElement)>,
    last_end: u32,
}

impl<'t> Builder<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text,
            parents: Vec::new(),
            children: Vec::new(),
            last_end: 0,
        }
    }

    fn checkpoint(&self) -> usize {
        self.children.len()
    }

    fn start_node(&mut self, kind: SyntaxKind) {
        self.parents.push((kind, self.children.len()));
    }

    fn start_node_at(&mut self, checkpoint: usize, kind: SyntaxKind) {
        self.parents.push((kind, checkpoint));
    }

    fn token(&mut self, token: &Token) {
        let text = &self.text[token.start as usize..token.end as usize];
        self.children.push((
            token.start,
            GreenElement::Token(Arc::new(GreenToken {
                kind: token.kind,
                text: text.into(),
            })),
        ));
        self.last_end = token.end;
    }

    fn finish_node(&mut self) {
        let Some((kind, first)) = self.parents.pop() else {
            return;
        };
        let kids: Vec<(u32, GreenElement)> = self.children.drain(first..).collect();
        let start = kids.first().map(|(s, _)| *s).unwrap_or(self.last_end);
        let end = kids
            .last()
            .map(|(s, element)| s + element.len())
            .unwrap_or(start);
        let children = kids
            .into_iter()
            .map(|(s, element)| (s - start, element))
            .collect();
        self.children.push((
            start,
            GreenElement::Node(Arc::new(GreenNode {
                kind,
                len: end - start,
                children,
            })),
        ));
    }

    fn finish(mut self) -> Arc<GreenNode> {
        while !self.parents.is_empty() {
            self.finish_node();
        }
        if self.children.len() == 1 {
            if let Some((_, GreenElement::Node(node))) = self.children.pop() {
                return node;
            }
        }
        self.start_node_at(0, SyntaxKind::Error);
        self.finish_node();
        match self.children.pop() {
            Some((_, GreenElement::Node(node))) => node,
            _ => Arc::new(GreenNode {
                kind: SyntaxKind::Error,
                len: 0,
                children: Vec::new(),
            }),
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Tokens that close an enclosing construct and must never be swallowed as
/// junk by a block.
fn is_closer(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::RParen
            | SyntaxKind::RBracket
            | SyntaxKind::RBrace
            | SyntaxKind::Comma
            | SyntaxKind::ThenKw
            | SyntaxKind::ElseKw
            | SyntaxKind::InKw
            | SyntaxKind::OfKw
    )
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Layout columns; a token opening a line at or left of the innermost
    /// column ends the current construct.
    bounds: Vec<u32>,
    /// Token index exempt from the offside check (first token of a block item)
    allow: usize,
    builder: Builder<'t>,
}

impl<'t> Parser<'t> {
    // ------------------------------------------------------------------
    // Token access
    // ------------------------------------------------------------------

    fn offside(&self, index: usize) -> bool {
        let token = &self.tokens[index];
        let bound = self.bounds.last().copied().unwrap_or(0);
        token.line_start && token.col <= bound && index != self.allow
    }

    fn nth(&self, n: usize) -> Option<&Token> {
        let index = self.pos + n;
        if index < self.tokens.len() && !self.offside(index) {
            Some(&self.tokens[index])
        } else {
            None
        }
    }

    fn current(&self) -> Option<&Token> {
        self.nth(0)
    }

    fn raw(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn kind(&self) -> Option<SyntaxKind> {
        self.current().map(|t| t.kind)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.kind() == Some(kind)
    }

    fn nth_at(&self, n: usize, kind: SyntaxKind) -> bool {
        self.nth(n).is_some_and(|t| t.kind == kind)
    }

    fn nth_text(&self, n: usize) -> Option<&'t str> {
        let text: &'t str = self.builder.text;
        let token = self.nth(n)?;
        Some(&text[token.start as usize..token.end as usize])
    }

    fn at_operator(&self, op: &str) -> bool {
        self.at(SyntaxKind::Operator) && self.nth_text(0) == Some(op)
    }

    /// `n`-th token exists and directly touches the one before it.
    fn nth_tight(&self, n: usize, kind: SyntaxKind) -> bool {
        self.nth(n).is_some_and(|t| t.kind == kind && !t.spaced_before)
    }

    fn bump(&mut self) {
        if let Some(token) = self.tokens.get(self.pos) {
            self.builder.token(token);
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind) {
        if !self.eat(kind) {
            self.missing();
        }
    }

    fn missing(&mut self) {
        self.builder.start_node(SyntaxKind::Missing);
        self.builder.finish_node();
    }

    fn node(&mut self, kind: SyntaxKind) {
        self.builder.start_node(kind);
        self.bump();
        self.builder.finish_node();
    }

    fn at_top_level(&self) -> bool {
        self.bounds.len() == 1
    }

    /// Close a declaration. At top level any leftover tokens of the chunk
    /// are attached as a trailing error node.
    fn finish_decl(&mut self) {
        if self.at_top_level() && self.pos < self.tokens.len() {
            self.builder.start_node(SyntaxKind::Error);
            while self.pos < self.tokens.len() {
                self.bump();
            }
            self.builder.finish_node();
        }
        self.builder.finish_node();
    }

    /// Wrap non-offside tokens up to the next closer in an error node.
    fn junk(&mut self) {
        self.builder.start_node(SyntaxKind::Error);
        while let Some(token) = self.current() {
            if is_closer(token.kind) {
                break;
            }
            self.bump();
        }
        self.builder.finish_node();
    }

    // ------------------------------------------------------------------
    // Top-level items
    // ------------------------------------------------------------------

    fn item(&mut self) {
        match self.kind() {
            Some(SyntaxKind::ModuleKw) => self.module_declaration(),
            Some(SyntaxKind::PortKw) if self.nth_at(1, SyntaxKind::ModuleKw) => {
                self.module_declaration()
            }
            Some(SyntaxKind::PortKw) => self.port_annotation(),
            Some(SyntaxKind::ImportKw) => self.import_clause(),
            Some(SyntaxKind::TypeKw) if self.nth_at(1, SyntaxKind::AliasKw) => self.type_alias(),
            Some(SyntaxKind::TypeKw) => self.type_declaration(),
            Some(SyntaxKind::InfixKw) => self.infix_declaration(),
            Some(SyntaxKind::LowerIdent) if self.nth_at(1, SyntaxKind::Colon) => {
                self.type_annotation()
            }
            Some(SyntaxKind::LowerIdent) => self.value_declaration(),
            _ => {
                self.builder.start_node(SyntaxKind::Error);
                while self.pos < self.tokens.len() {
                    self.bump();
                }
                self.builder.finish_node();
            }
        }
    }

    fn module_declaration(&mut self) {
        self.builder.start_node(SyntaxKind::ModuleDeclaration);
        self.eat(SyntaxKind::PortKw);
        self.bump();
        self.module_name();
        if self.at(SyntaxKind::ExposingKw) {
            self.exposing_list();
        } else {
            self.missing();
        }
        self.finish_decl();
    }

    fn module_name(&mut self) {
        if !self.at(SyntaxKind::UpperIdent) {
            self.missing();
            return;
        }
        self.builder.start_node(SyntaxKind::ModuleName);
        self.qualified_upper();
        self.builder.finish_node();
    }

    /// `Upper(.Upper)*` with no whitespace around the dots.
    fn qualified_upper(&mut self) {
        self.bump();
        while self.nth_tight(0, SyntaxKind::Dot) && self.nth_tight(1, SyntaxKind::UpperIdent) {
            self.bump();
            self.bump();
        }
    }

    fn import_clause(&mut self) {
        self.builder.start_node(SyntaxKind::ImportClause);
        self.bump();
        self.module_name();
        if self.at(SyntaxKind::AsKw) {
            self.builder.start_node(SyntaxKind::AsClause);
            self.bump();
            self.expect(SyntaxKind::UpperIdent);
            self.builder.finish_node();
        }
        if self.at(SyntaxKind::ExposingKw) {
            self.exposing_list();
        }
        self.finish_decl();
    }

    fn exposing_list(&mut self) {
        self.builder.start_node(SyntaxKind::ExposingList);
        self.bump();
        if !self.eat(SyntaxKind::LParen) {
            self.missing();
            self.builder.finish_node();
            return;
        }
        if !self.eat(SyntaxKind::DoubleDot) {
            loop {
                self.exposed_item();
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
        }
        self.expect(SyntaxKind::RParen);
        self.builder.finish_node();
    }

    fn exposed_item(&mut self) {
        match self.kind() {
            Some(SyntaxKind::LowerIdent) => self.node(SyntaxKind::ExposedValue),
            Some(SyntaxKind::UpperIdent) => {
                self.builder.start_node(SyntaxKind::ExposedType);
                self.bump();
                if self.at(SyntaxKind::LParen) {
                    self.builder.start_node(SyntaxKind::ExposedConstructors);
                    self.bump();
                    self.expect(SyntaxKind::DoubleDot);
                    self.expect(SyntaxKind::RParen);
                    self.builder.finish_node();
                }
                self.builder.finish_node();
            }
            Some(SyntaxKind::LParen) => {
                self.builder.start_node(SyntaxKind::ExposedOperator);
                self.bump();
                self.expect(SyntaxKind::Operator);
                self.expect(SyntaxKind::RParen);
                self.builder.finish_node();
            }
            _ => self.missing(),
        }
    }

    fn type_annotation(&mut self) {
        self.builder.start_node(SyntaxKind::TypeAnnotation);
        self.bump();
        self.bump();
        self.type_expr();
        self.finish_decl();
    }

    fn port_annotation(&mut self) {
        self.builder.start_node(SyntaxKind::PortAnnotation);
        self.bump();
        self.expect(SyntaxKind::LowerIdent);
        self.expect(SyntaxKind::Colon);
        self.type_expr();
        self.finish_decl();
    }

    fn value_declaration(&mut self) {
        self.builder.start_node(SyntaxKind::ValueDeclaration);
        if self.at(SyntaxKind::LowerIdent) {
            self.builder.start_node(SyntaxKind::FunctionDeclarationLeft);
            self.bump();
            while self.can_start_atom_pattern() {
                self.atom_pattern();
            }
            self.builder.finish_node();
        } else {
            self.pattern();
        }
        self.expect(SyntaxKind::Equals);
        self.expr();
        self.finish_decl();
    }

    fn type_declaration(&mut self) {
        self.builder.start_node(SyntaxKind::TypeDeclaration);
        self.bump();
        self.expect(SyntaxKind::UpperIdent);
        while self.at(SyntaxKind::LowerIdent) {
            self.node(SyntaxKind::TypeVariable);
        }
        // A declaration with no variants at all is a primitive (`type Int`)
        if self.eat(SyntaxKind::Equals) {
            self.union_variant();
            while self.eat(SyntaxKind::Pipe) {
                self.union_variant();
            }
        } else if self.current().is_some() {
            self.missing();
        }
        self.finish_decl();
    }

    fn union_variant(&mut self) {
        if !self.at(SyntaxKind::UpperIdent) {
            self.missing();
            return;
        }
        self.builder.start_node(SyntaxKind::UnionVariant);
        self.bump();
        while self.can_start_type_atom() {
            self.type_atom();
        }
        self.builder.finish_node();
    }

    fn type_alias(&mut self) {
        self.builder.start_node(SyntaxKind::TypeAliasDeclaration);
        self.bump();
        self.bump();
        self.expect(SyntaxKind::UpperIdent);
        while self.at(SyntaxKind::LowerIdent) {
            self.node(SyntaxKind::TypeVariable);
        }
        self.expect(SyntaxKind::Equals);
        self.type_expr();
        self.finish_decl();
    }

    fn infix_declaration(&mut self) {
        self.builder.start_node(SyntaxKind::InfixDeclaration);
        self.bump();
        self.expect(SyntaxKind::LowerIdent);
        self.expect(SyntaxKind::Number);
        self.expect(SyntaxKind::LParen);
        self.expect(SyntaxKind::Operator);
        self.expect(SyntaxKind::RParen);
        self.expect(SyntaxKind::Equals);
        if self.at(SyntaxKind::LowerIdent) {
            self.node(SyntaxKind::ValueRef);
        } else {
            self.missing();
        }
        self.finish_decl();
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn can_start_type_atom(&self) -> bool {
        matches!(
            self.kind(),
            Some(SyntaxKind::LowerIdent)
                | Some(SyntaxKind::UpperIdent)
                | Some(SyntaxKind::LBrace)
                | Some(SyntaxKind::LParen)
        )
    }

    fn type_expr(&mut self) {
        self.builder.start_node(SyntaxKind::TypeExpression);
        self.type_app();
        while self.eat(SyntaxKind::Arrow) {
            self.type_app();
        }
        self.builder.finish_node();
    }

    fn type_app(&mut self) {
        if self.at(SyntaxKind::UpperIdent) {
            self.builder.start_node(SyntaxKind::TypeRef);
            self.qualified_upper();
            while self.can_start_type_atom() {
                self.type_atom();
            }
            self.builder.finish_node();
        } else if self.can_start_type_atom() {
            self.type_atom();
        } else {
            self.missing();
        }
    }

    fn type_atom(&mut self) {
        match self.kind() {
            Some(SyntaxKind::LowerIdent) => self.node(SyntaxKind::TypeVariable),
            Some(SyntaxKind::UpperIdent) => {
                self.builder.start_node(SyntaxKind::TypeRef);
                self.qualified_upper();
                self.builder.finish_node();
            }
            Some(SyntaxKind::LBrace) => self.record_type(),
            Some(SyntaxKind::LParen) => self.paren_type(),
            _ => self.missing(),
        }
    }

    fn paren_type(&mut self) {
        if self.nth_at(1, SyntaxKind::RParen) {
            self.builder.start_node(SyntaxKind::UnitType);
            self.bump();
            self.bump();
            self.builder.finish_node();
            return;
        }
        let checkpoint = self.builder.checkpoint();
        self.bump();
        let inner = self.builder.checkpoint();
        self.type_app();
        while self.eat(SyntaxKind::Arrow) {
            self.type_app();
        }
        if self.at(SyntaxKind::Comma) {
            self.builder.start_node_at(inner, SyntaxKind::TypeExpression);
            self.builder.finish_node();
            self.builder.start_node_at(checkpoint, SyntaxKind::TupleType);
            while self.eat(SyntaxKind::Comma) {
                self.type_expr();
            }
        } else {
            // grouping parens: the chain itself becomes the node
            self.builder.start_node_at(checkpoint, SyntaxKind::TypeExpression);
        }
        self.expect(SyntaxKind::RParen);
        self.builder.finish_node();
    }

    fn record_type(&mut self) {
        self.builder.start_node(SyntaxKind::RecordType);
        self.bump();
        if self.eat(SyntaxKind::RBrace) {
            self.builder.finish_node();
            return;
        }
        if self.at(SyntaxKind::LowerIdent) && self.nth_at(1, SyntaxKind::Pipe) {
            self.bump();
            self.bump();
        }
        loop {
            self.builder.start_node(SyntaxKind::FieldType);
            self.expect(SyntaxKind::LowerIdent);
            self.expect(SyntaxKind::Colon);
            self.type_expr();
            self.builder.finish_node();
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::RBrace);
        self.builder.finish_node();
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// A `-` directly attached to the following atom.
    fn at_negation(&self) -> bool {
        self.at_operator("-")
            && self.nth(1).is_some_and(|next| {
                !next.spaced_before
                    && matches!(
                        next.kind,
                        SyntaxKind::LowerIdent
                            | SyntaxKind::UpperIdent
                            | SyntaxKind::Number
                            | SyntaxKind::LParen
                    )
            })
    }

    fn can_start_atom(&self) -> bool {
        match self.kind() {
            Some(
                SyntaxKind::LowerIdent
                | SyntaxKind::UpperIdent
                | SyntaxKind::Number
                | SyntaxKind::StringLit
                | SyntaxKind::CharLit
                | SyntaxKind::LParen
                | SyntaxKind::LBracket
                | SyntaxKind::LBrace,
            ) => true,
            Some(SyntaxKind::Dot) => self.nth_tight(1, SyntaxKind::LowerIdent),
            Some(SyntaxKind::Operator) => self.at_negation(),
            _ => false,
        }
    }

    fn can_start_operand(&self) -> bool {
        matches!(
            self.kind(),
            Some(SyntaxKind::LetKw)
                | Some(SyntaxKind::CaseKw)
                | Some(SyntaxKind::IfKw)
                | Some(SyntaxKind::Backslash)
        ) || self.can_start_atom()
    }

    fn can_start_argument(&self) -> bool {
        match self.kind() {
            Some(SyntaxKind::Operator) => {
                self.at_negation() && self.current().is_some_and(|t| t.spaced_before)
            }
            Some(SyntaxKind::Dot) => {
                self.current().is_some_and(|t| t.spaced_before) && self.can_start_atom()
            }
            _ => self.can_start_atom(),
        }
    }

    fn expr(&mut self) {
        if !self.can_start_operand() {
            self.missing();
            return;
        }
        let checkpoint = self.builder.checkpoint();
        self.operand();
        if self.at(SyntaxKind::Operator) {
            // Operator precedence is resolved later from infix declarations,
            // so a chain stays flat here.
            self.builder.start_node_at(checkpoint, SyntaxKind::BinOp);
            while self.at(SyntaxKind::Operator) {
                self.node(SyntaxKind::OperatorRef);
                if self.can_start_operand() {
                    self.operand();
                } else {
                    self.missing();
                    break;
                }
            }
            self.builder.finish_node();
        }
    }

    fn operand(&mut self) {
        match self.kind() {
            Some(SyntaxKind::LetKw) => self.let_in(),
            Some(SyntaxKind::CaseKw) => self.case_of(),
            Some(SyntaxKind::IfKw) => self.if_else(),
            Some(SyntaxKind::Backslash) => self.lambda(),
            _ => self.call(),
        }
    }

    fn call(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.postfix_atom();
        if self.can_start_argument() {
            self.builder.start_node_at(checkpoint, SyntaxKind::Call);
            while self.can_start_argument() {
                self.postfix_atom();
            }
            self.builder.finish_node();
        }
    }

    fn postfix_atom(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.atom();
        while self.nth_tight(0, SyntaxKind::Dot) && self.nth_tight(1, SyntaxKind::LowerIdent) {
            self.builder.start_node_at(checkpoint, SyntaxKind::FieldAccess);
            self.bump();
            self.bump();
            self.builder.finish_node();
        }
    }

    fn atom(&mut self) {
        match self.kind() {
            Some(SyntaxKind::LowerIdent) => self.node(SyntaxKind::ValueRef),
            Some(SyntaxKind::UpperIdent) => self.qualified_reference(),
            Some(SyntaxKind::Number | SyntaxKind::StringLit | SyntaxKind::CharLit) => {
                self.node(SyntaxKind::Literal)
            }
            Some(SyntaxKind::LParen) => self.paren_expr(),
            Some(SyntaxKind::LBracket) => self.list(),
            Some(SyntaxKind::LBrace) => self.record(),
            Some(SyntaxKind::Dot) => {
                self.builder.start_node(SyntaxKind::FieldAccessor);
                self.bump();
                self.expect(SyntaxKind::LowerIdent);
                self.builder.finish_node();
            }
            Some(SyntaxKind::Operator) if self.at_negation() => {
                self.builder.start_node(SyntaxKind::Negate);
                self.bump();
                self.postfix_atom();
                self.builder.finish_node();
            }
            _ => self.missing(),
        }
    }

    /// `Mod.Sub.Ctor` or `Mod.Sub.value`
    fn qualified_reference(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.bump();
        let mut kind = SyntaxKind::ConstructorRef;
        while self.nth_tight(0, SyntaxKind::Dot) {
            if self.nth_tight(1, SyntaxKind::UpperIdent) {
                self.bump();
                self.bump();
            } else if self.nth_tight(1, SyntaxKind::LowerIdent) {
                self.bump();
                self.bump();
                kind = SyntaxKind::ValueRef;
                break;
            } else {
                break;
            }
        }
        self.builder.start_node_at(checkpoint, kind);
        self.builder.finish_node();
    }

    fn paren_expr(&mut self) {
        if self.nth_at(1, SyntaxKind::RParen) {
            self.builder.start_node(SyntaxKind::Unit);
            self.bump();
            self.bump();
            self.builder.finish_node();
            return;
        }
        if self.nth_at(1, SyntaxKind::Operator) && self.nth_at(2, SyntaxKind::RParen) {
            self.builder.start_node(SyntaxKind::OperatorFunction);
            self.bump();
            self.node(SyntaxKind::OperatorRef);
            self.bump();
            self.builder.finish_node();
            return;
        }
        let checkpoint = self.builder.checkpoint();
        self.bump();
        self.expr();
        if self.at(SyntaxKind::Comma) {
            self.builder.start_node_at(checkpoint, SyntaxKind::Tuple);
            while self.eat(SyntaxKind::Comma) {
                self.expr();
            }
        } else {
            self.builder.start_node_at(checkpoint, SyntaxKind::Parenthesized);
        }
        self.expect(SyntaxKind::RParen);
        self.builder.finish_node();
    }

    fn list(&mut self) {
        self.builder.start_node(SyntaxKind::List);
        self.bump();
        if !self.at(SyntaxKind::RBracket) {
            self.expr();
            while self.eat(SyntaxKind::Comma) {
                self.expr();
            }
        }
        self.expect(SyntaxKind::RBracket);
        self.builder.finish_node();
    }

    fn record(&mut self) {
        if self.nth_at(1, SyntaxKind::LowerIdent) && self.nth_at(2, SyntaxKind::Pipe) {
            self.builder.start_node(SyntaxKind::RecordUpdate);
            self.bump();
            self.node(SyntaxKind::ValueRef);
            self.bump();
        } else {
            self.builder.start_node(SyntaxKind::Record);
            self.bump();
            if self.eat(SyntaxKind::RBrace) {
                self.builder.finish_node();
                return;
            }
        }
        loop {
            self.builder.start_node(SyntaxKind::RecordField);
            self.expect(SyntaxKind::LowerIdent);
            self.expect(SyntaxKind::Equals);
            self.expr();
            self.builder.finish_node();
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::RBrace);
        self.builder.finish_node();
    }

    fn let_in(&mut self) {
        self.builder.start_node(SyntaxKind::LetIn);
        self.bump();
        if let Some(first) = self.current().copied() {
            if first.kind != SyntaxKind::InKw {
                self.block(first.col, |p| p.let_item(), |kind| kind == SyntaxKind::InKw);
            }
        }
        self.expect(SyntaxKind::InKw);
        self.expr();
        self.builder.finish_node();
    }

    fn let_item(&mut self) {
        if self.at(SyntaxKind::LowerIdent) && self.nth_at(1, SyntaxKind::Colon) {
            self.type_annotation();
        } else {
            self.value_declaration();
        }
    }

    fn case_of(&mut self) {
        self.builder.start_node(SyntaxKind::CaseOf);
        self.bump();
        self.expr();
        self.expect(SyntaxKind::OfKw);
        if let Some(first) = self.current().copied() {
            if !is_closer(first.kind) {
                self.block(first.col, |p| p.case_branch(), |_| false);
            }
        }
        self.builder.finish_node();
    }

    fn case_branch(&mut self) {
        self.builder.start_node(SyntaxKind::CaseBranch);
        self.pattern();
        self.expect(SyntaxKind::Arrow);
        self.expr();
        self.builder.finish_node();
    }

    /// Layout block whose items start in column `col`. The first item may
    /// follow the opening keyword on the same line; later ones must open a
    /// line exactly at `col`.
    fn block(&mut self, col: u32, item: fn(&mut Self), stop: fn(SyntaxKind) -> bool) {
        self.bounds.push(col);
        let mut first = true;
        while let Some(token) = self.raw().copied() {
            if stop(token.kind) || is_closer(token.kind) {
                break;
            }
            let starts_item = first || (token.line_start && token.col == col);
            if starts_item {
                first = false;
                self.allow = self.pos;
                let before = self.pos;
                item(self);
                if self.pos == before {
                    self.builder.start_node(SyntaxKind::Error);
                    self.bump();
                    self.builder.finish_node();
                }
            } else if token.line_start && token.col < col {
                break;
            } else {
                self.junk();
            }
        }
        self.bounds.pop();
    }

    fn if_else(&mut self) {
        self.builder.start_node(SyntaxKind::IfElse);
        self.bump();
        self.expr();
        self.expect(SyntaxKind::ThenKw);
        self.expr();
        self.expect(SyntaxKind::ElseKw);
        self.expr();
        self.builder.finish_node();
    }

    fn lambda(&mut self) {
        self.builder.start_node(SyntaxKind::Lambda);
        self.bump();
        if !self.can_start_atom_pattern() {
            self.missing();
        }
        while self.can_start_atom_pattern() {
            self.atom_pattern();
        }
        self.expect(SyntaxKind::Arrow);
        self.expr();
        self.builder.finish_node();
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn can_start_atom_pattern(&self) -> bool {
        match self.kind() {
            Some(
                SyntaxKind::LowerIdent
                | SyntaxKind::Underscore
                | SyntaxKind::UpperIdent
                | SyntaxKind::Number
                | SyntaxKind::StringLit
                | SyntaxKind::CharLit
                | SyntaxKind::LParen
                | SyntaxKind::LBracket
                | SyntaxKind::LBrace,
            ) => true,
            Some(SyntaxKind::Operator) => {
                self.at_operator("-") && self.nth_tight(1, SyntaxKind::Number)
            }
            _ => false,
        }
    }

    fn pattern(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.cons_pattern();
        while self.at(SyntaxKind::AsKw) {
            self.builder.start_node_at(checkpoint, SyntaxKind::AsPattern);
            self.bump();
            self.expect(SyntaxKind::LowerIdent);
            self.builder.finish_node();
        }
    }

    fn cons_pattern(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.app_pattern();
        if self.at_operator("::") {
            self.builder.start_node_at(checkpoint, SyntaxKind::ConsPattern);
            self.bump();
            self.cons_pattern();
            self.builder.finish_node();
        }
    }

    fn app_pattern(&mut self) {
        if self.at(SyntaxKind::UpperIdent) {
            self.builder.start_node(SyntaxKind::ConstructorPattern);
            self.qualified_upper();
            while self.can_start_atom_pattern() {
                self.atom_pattern();
            }
            self.builder.finish_node();
        } else {
            self.atom_pattern();
        }
    }

    fn atom_pattern(&mut self) {
        match self.kind() {
            Some(SyntaxKind::LowerIdent) => self.node(SyntaxKind::VarPattern),
            Some(SyntaxKind::Underscore) => self.node(SyntaxKind::WildcardPattern),
            Some(SyntaxKind::UpperIdent) => {
                self.builder.start_node(SyntaxKind::ConstructorPattern);
                self.qualified_upper();
                self.builder.finish_node();
            }
            Some(SyntaxKind::Number | SyntaxKind::StringLit | SyntaxKind::CharLit) => {
                self.node(SyntaxKind::LiteralPattern)
            }
            Some(SyntaxKind::Operator) if self.can_start_atom_pattern() => {
                self.builder.start_node(SyntaxKind::LiteralPattern);
                self.bump();
                self.bump();
                self.builder.finish_node();
            }
            Some(SyntaxKind::LParen) => {
                if self.nth_at(1, SyntaxKind::RParen) {
                    self.builder.start_node(SyntaxKind::UnitPattern);
                    self.bump();
                    self.bump();
                    self.builder.finish_node();
                    return;
                }
                let checkpoint = self.builder.checkpoint();
                self.bump();
                self.pattern();
                if self.at(SyntaxKind::Comma) {
                    self.builder.start_node_at(checkpoint, SyntaxKind::TuplePattern);
                    while self.eat(SyntaxKind::Comma) {
                        self.pattern();
                    }
                } else {
                    self.builder.start_node_at(checkpoint, SyntaxKind::ParenPattern);
                }
                self.expect(SyntaxKind::RParen);
                self.builder.finish_node();
            }
            Some(SyntaxKind::LBracket) => {
                self.builder.start_node(SyntaxKind::ListPattern);
                self.bump();
                if !self.at(SyntaxKind::RBracket) {
                    self.pattern();
                    while self.eat(SyntaxKind::Comma) {
                        self.pattern();
                    }
                }
                self.expect(SyntaxKind::RBracket);
                self.builder.finish_node();
            }
            Some(SyntaxKind::LBrace) => {
                self.builder.start_node(SyntaxKind::RecordPattern);
                self.bump();
                if !self.at(SyntaxKind::RBrace) {
                    loop {
                        if !self.eat(SyntaxKind::LowerIdent) {
                            self.missing();
                            break;
                        }
                        if !self.eat(SyntaxKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(SyntaxKind::RBrace);
                self.builder.finish_node();
            }
            _ => self.missing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tree::SyntaxNode;

    /// S-expression dump of the interior nodes, for compact assertions.
    fn dump(node: SyntaxNode<'_>) -> String {
        let kids: Vec<String> = node.child_nodes().map(dump).collect();
        if kids.is_empty() {
            format!("{:?}", node.kind())
        } else {
            format!("{:?}({})", node.kind(), kids.join(" "))
        }
    }

    fn top(text: &str) -> Vec<String> {
        let tree = parse(text);
        tree.root().child_nodes().map(dump).collect()
    }

    fn has_errors(text: &str) -> bool {
        let tree = parse(text);
        let found = tree
            .root()
            .descendants()
            .any(|n| matches!(n.kind(), SyntaxKind::Error | SyntaxKind::Missing));
        found
    }

    #[test]
    fn test_module_header_and_imports() {
        let items = top("module Main exposing (main, Msg(..), (|>))\nimport Html as H exposing (..)\n");
        assert_eq!(
            items[0],
            "ModuleDeclaration(ModuleName ExposingList(ExposedValue ExposedType(ExposedConstructors) ExposedOperator))"
        );
        assert_eq!(items[1], "ImportClause(ModuleName AsClause ExposingList)");
    }

    #[test]
    fn test_hierarchical_module_name() {
        let tree = parse("import Platform.Cmd as Cmd\n");
        let name = tree
            .root()
            .descendants()
            .find(|n| n.kind() == SyntaxKind::ModuleName)
            .unwrap();
        assert_eq!(name.text(), "Platform.Cmd");
    }

    #[test]
    fn test_function_with_let() {
        let text = "f x =\n    let\n        y = x\n        z = y\n    in\n    z\n";
        let items = top(text);
        assert_eq!(
            items[0],
            "ValueDeclaration(FunctionDeclarationLeft(VarPattern) LetIn(ValueDeclaration(FunctionDeclarationLeft ValueRef) ValueDeclaration(FunctionDeclarationLeft ValueRef) ValueRef))"
        );
        assert!(!has_errors(text));
    }

    #[test]
    fn test_single_line_let() {
        let items = top("f x = let x = 1 in x");
        assert_eq!(
            items[0],
            "ValueDeclaration(FunctionDeclarationLeft(VarPattern) LetIn(ValueDeclaration(FunctionDeclarationLeft Literal) ValueRef))"
        );
    }

    #[test]
    fn test_case_branches_use_layout() {
        let text = "f x =\n    case x of\n        Just y ->\n            y\n\n        Nothing ->\n            0\n";
        let items = top(text);
        assert_eq!(
            items[0],
            "ValueDeclaration(FunctionDeclarationLeft(VarPattern) CaseOf(ValueRef CaseBranch(ConstructorPattern(VarPattern) ValueRef) CaseBranch(ConstructorPattern Literal)))"
        );
        assert!(!has_errors(text));
    }

    #[test]
    fn test_nested_case_in_parens() {
        let text = "f x = (case x of\n    A -> 1\n    B -> 2) + 1";
        assert!(!has_errors(text));
        let items = top(text);
        assert!(items[0].contains("BinOp(Parenthesized(CaseOf"));
    }

    #[test]
    fn test_binop_chain_is_flat() {
        let items = top("x = a + b * c |> f");
        assert_eq!(
            items[0],
            "ValueDeclaration(FunctionDeclarationLeft BinOp(ValueRef OperatorRef ValueRef OperatorRef ValueRef OperatorRef ValueRef))"
        );
    }

    #[test]
    fn test_calls_fields_and_accessors() {
        let items = top("x = List.map .name model.people");
        assert_eq!(
            items[0],
            "ValueDeclaration(FunctionDeclarationLeft Call(ValueRef FieldAccessor FieldAccess(ValueRef)))"
        );
    }

    #[test]
    fn test_negation() {
        assert_eq!(
            top("x = f -1")[0],
            "ValueDeclaration(FunctionDeclarationLeft Call(ValueRef Negate(Literal)))"
        );
        assert_eq!(
            top("x = a - 1")[0],
            "ValueDeclaration(FunctionDeclarationLeft BinOp(ValueRef OperatorRef Literal))"
        );
    }

    #[test]
    fn test_records() {
        assert_eq!(
            top("x = { r | a = 1, b = 2 }")[0],
            "ValueDeclaration(FunctionDeclarationLeft RecordUpdate(ValueRef RecordField(Literal) RecordField(Literal)))"
        );
        assert_eq!(
            top("x = {}")[0],
            "ValueDeclaration(FunctionDeclarationLeft Record)"
        );
    }

    #[test]
    fn test_lambda_and_patterns() {
        assert_eq!(
            top("f = \\(a, _) { b } -> a")[0],
            "ValueDeclaration(FunctionDeclarationLeft Lambda(TuplePattern(VarPattern WildcardPattern) RecordPattern ValueRef))"
        );
        assert_eq!(
            top("f l = case l of\n    x :: rest as all -> x")[0],
            "ValueDeclaration(FunctionDeclarationLeft(VarPattern) CaseOf(ValueRef CaseBranch(AsPattern(ConsPattern(VarPattern VarPattern)) ValueRef)))"
        );
    }

    #[test]
    fn test_type_declarations() {
        let items = top("type Msg a\n    = Inc Int\n    | Set (Maybe a) { x : Int }\n");
        assert_eq!(
            items[0],
            "TypeDeclaration(TypeVariable UnionVariant(TypeRef) UnionVariant(TypeExpression(TypeRef(TypeVariable)) RecordType(FieldType(TypeExpression(TypeRef)))))"
        );
        let items = top("type alias Model = { a | count : Int }");
        assert_eq!(
            items[0],
            "TypeAliasDeclaration(TypeExpression(RecordType(FieldType(TypeExpression(TypeRef)))))"
        );
    }

    #[test]
    fn test_annotation_with_arrows() {
        assert_eq!(
            top("f : (a -> b) -> List a -> ( Int, () )")[0],
            "TypeAnnotation(TypeExpression(TypeExpression(TypeVariable TypeVariable) TypeRef(TypeVariable) TupleType(TypeExpression(TypeRef) TypeExpression(UnitType))))"
        );
    }

    #[test]
    fn test_primitive_type_declaration() {
        assert_eq!(top("type Int")[0], "TypeDeclaration");
        assert!(!has_errors("type Int\ntype List a\n"));
        assert!(has_errors("type Foo Bar"));
    }

    #[test]
    fn test_infix_declaration() {
        assert_eq!(
            top("infix left 0 (|>) = apR")[0],
            "InfixDeclaration(ValueRef)"
        );
    }

    #[test]
    fn test_errors_are_contained_to_their_chunk() {
        let text = "a = (\nb = 1\n)\nc = 2\n";
        let items = top(text);
        assert_eq!(items.len(), 4);
        assert!(items[0].contains("Missing"));
        assert_eq!(items[1], "ValueDeclaration(FunctionDeclarationLeft Literal)");
        assert_eq!(items[2], "Error");
        assert_eq!(items[3], "ValueDeclaration(FunctionDeclarationLeft Literal)");
    }

    #[test]
    fn test_trailing_tokens_become_error_node() {
        let items = top("x = 1 )");
        assert_eq!(items[0], "ValueDeclaration(FunctionDeclarationLeft Literal Error)");
    }

    #[test]
    fn test_missing_body() {
        let items = top("x =\ny = 2");
        assert_eq!(items[0], "ValueDeclaration(FunctionDeclarationLeft Missing)");
    }

    #[test]
    fn test_ranges_cover_source() {
        let text = "module A exposing (..)\n\nfoo = \"\"\n";
        let tree = parse(text);
        let decl = tree
            .root()
            .child_nodes()
            .find(|n| n.kind() == SyntaxKind::ValueDeclaration)
            .unwrap();
        assert_eq!(decl.text(), "foo = \"\"");
        assert_eq!(tree.root().range().end as usize, text.len());
    }

    #[test]
    fn test_garbage_never_panics() {
        for text in ["", ")", "let", "case of", "type", "type X Y", "x = \\ ->", "{- open", "f = [1,", "x = (,)"] {
            let tree = parse(text);
            assert_eq!(tree.root().range().end as usize, text.len());
        }
    }
}
