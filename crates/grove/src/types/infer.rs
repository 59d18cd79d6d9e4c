//
// types/infer.rs
//
// Inference walk over one top-level declaration: expressions, patterns and
// let blocks
//

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::forest::SourceFile;
use crate::resolve::Symbol;
use crate::syntax::ast;
use crate::syntax::{NodeId, SyntaxKind, SyntaxNode, TextRange};

use super::print::TypePrinter;
use super::ty::{Constraint, Type, TypeVar};
use super::unify::{Scheme, Subst, UnifyError};
use super::{Assoc, DeclInference, TypeChecker, TypeError, TypeErrorKind};

pub(super) struct Infer<'c, 'a> {
    pub(super) checker: &'c TypeChecker<'a>,
    /// File whose names are being resolved; swapped while expanding an
    /// alias declared elsewhere
    pub(super) file: &'a SourceFile,
    pub(super) subst: Subst,
    pub(super) alias_depth: u32,
    /// Bindings keyed by their declaring node
    locals: HashMap<NodeId, Scheme>,
    types: HashMap<NodeId, Type>,
    errors: Vec<TypeError>,
    /// The declaration being inferred and its own (monomorphic) type
    current: Option<(NodeId, Type)>,
}

/// Infer `decl`, a top-level value declaration of `file`.
pub(super) fn infer_declaration<'a>(
    checker: &TypeChecker<'a>,
    file: &'a SourceFile,
    decl: SyntaxNode<'a>,
) -> DeclInference {
    let mut cx = Infer::new(checker, file);
    cx.subst.enter();
    let own = cx.declared_type(decl);
    cx.current = Some((decl.id(), own.clone()));
    cx.value_declaration(decl, &own);
    cx.subst.exit();
    cx.finish(own)
}

struct OperatorInfo {
    precedence: u32,
    assoc: Assoc,
    ty: Type,
}

enum OpTree {
    Leaf(usize),
    Apply(usize, Box<OpTree>, Box<OpTree>),
}

impl<'c, 'a> Infer<'c, 'a> {
    pub(super) fn new(checker: &'c TypeChecker<'a>, file: &'a SourceFile) -> Self {
        Self {
            checker,
            file,
            subst: Subst::new(),
            alias_depth: 0,
            locals: HashMap::new(),
            types: HashMap::new(),
            errors: Vec::new(),
            current: None,
        }
    }

    fn finish(self, own: Type) -> DeclInference {
        let ty = self.subst.zonk(&own);
        let types = self
            .types
            .iter()
            .map(|(id, ty)| (*id, self.subst.zonk(ty)))
            .collect();
        DeclInference {
            ty,
            types,
            errors: self.errors,
        }
    }

    /// The annotation of `decl` with rigid variables, or a fresh variable.
    fn declared_type(&mut self, decl: SyntaxNode<'a>) -> Type {
        match ast::annotation_for(decl).and_then(|a| a.child(SyntaxKind::TypeExpression)) {
            Some(annotation) => self.convert(annotation, &mut HashMap::new(), true),
            None => self.subst.fresh(),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Unify `expected` with `found`, reporting a failure at `range`.
    fn expect(&mut self, expected: &Type, found: &Type, range: TextRange) -> bool {
        match self.subst.unify(expected, found) {
            Ok(()) => true,
            Err(err) => {
                let shown = self.show(&[expected, found]);
                let (kind, message) = match err {
                    UnifyError::Occurs => (
                        TypeErrorKind::InfiniteType,
                        format!(
                            "Infinite type: `{}` would have to contain itself in `{}`",
                            shown[0], shown[1]
                        ),
                    ),
                    _ => (
                        TypeErrorKind::Mismatch,
                        format!(
                            "Type mismatch: expected `{}`, but found `{}`",
                            shown[0], shown[1]
                        ),
                    ),
                };
                self.error(range, kind, message);
                false
            }
        }
    }

    fn error(&mut self, range: TextRange, kind: TypeErrorKind, message: String) {
        // one report per range; follow-on failures add nothing
        if self.errors.iter().any(|e| e.range == range) {
            return;
        }
        log::trace!("type error at {:?}: {}", range, message);
        self.errors.push(TypeError {
            range,
            message,
            kind,
        });
    }

    fn show(&self, types: &[&Type]) -> Vec<String> {
        let mut printer = TypePrinter::new(self.checker.resolver(), Some(self.file));
        types
            .iter()
            .map(|ty| printer.print(&self.subst.zonk(ty)))
            .collect()
    }

    fn row(&mut self) -> Option<TypeVar> {
        match self.subst.fresh() {
            Type::Var(var) => Some(var),
            _ => None,
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn value_declaration(&mut self, decl: SyntaxNode<'a>, expected: &Type) {
        let params = ast::declaration_params(decl);
        let param_types: Vec<Type> = params.iter().map(|_| self.subst.fresh()).collect();
        let ret = self.subst.fresh();
        if !params.is_empty() {
            let shape = Type::function(param_types.clone(), ret.clone());
            let head = decl
                .child(SyntaxKind::FunctionDeclarationLeft)
                .map(|left| left.range())
                .unwrap_or_else(|| decl.range());
            self.expect(expected, &shape, head);
        }
        for (param, ty) in params.iter().zip(&param_types) {
            self.pattern(*param, ty.clone());
        }
        let Some(body) = ast::declaration_body(decl) else {
            return;
        };
        let body_ty = self.expr(body);
        let target = if params.is_empty() { expected } else { &ret };
        self.expect(target, &body_ty, body.range());
    }

    fn let_in(&mut self, node: SyntaxNode<'a>) -> Type {
        let decls: Vec<SyntaxNode<'a>> = node.children_of(SyntaxKind::ValueDeclaration).collect();

        self.subst.enter();
        let mut named: Vec<(NodeId, Type)> = Vec::new();
        for decl in &decls {
            if ast::name_token(*decl).is_some() {
                let own = self.declared_type(*decl);
                self.locals.insert(decl.id(), Scheme::mono(own.clone()));
                named.push((decl.id(), own));
            }
        }
        for decl in &decls {
            let own = named
                .iter()
                .find(|(id, _)| *id == decl.id())
                .map(|(_, ty)| ty.clone());
            match own {
                Some(own) => self.value_declaration(*decl, &own),
                None => self.destructuring(*decl),
            }
        }
        self.subst.exit();

        for (id, own) in &named {
            let scheme = self.subst.generalize(own);
            self.types.insert(*id, scheme.ty.clone());
            self.locals.insert(*id, scheme);
        }
        match expr_after(node, SyntaxKind::InKw) {
            Some(body) => self.expr(body),
            None => self.subst.fresh(),
        }
    }

    /// `( a, b ) = pair` inside a let block.
    fn destructuring(&mut self, decl: SyntaxNode<'a>) {
        let Some(pattern) = decl.child_nodes().find(|c| c.kind().is_pattern()) else {
            return;
        };
        let ty = match ast::declaration_body(decl) {
            Some(body) => self.expr(body),
            None => self.subst.fresh(),
        };
        self.pattern(pattern, ty);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self, node: SyntaxNode<'a>) -> Type {
        let ty = match node.kind() {
            SyntaxKind::ValueRef | SyntaxKind::ConstructorRef => self.reference(node),
            SyntaxKind::OperatorFunction => match node.child(SyntaxKind::OperatorRef) {
                Some(op) => self.operator(op).ty,
                None => self.subst.fresh(),
            },
            SyntaxKind::Literal => match node.children().next() {
                Some(token) => self.literal(token),
                None => self.subst.fresh(),
            },
            SyntaxKind::FieldAccess => self.field_access(node),
            SyntaxKind::FieldAccessor => match node.child(SyntaxKind::LowerIdent) {
                Some(name) => {
                    let field = self.subst.fresh();
                    let record = Type::Record {
                        fields: IndexMap::from([(name.text().to_string(), field.clone())]),
                        row: self.row(),
                    };
                    Type::function(vec![record], field)
                }
                None => self.subst.fresh(),
            },
            SyntaxKind::Call => self.call(node),
            SyntaxKind::BinOp => self.binop(node),
            SyntaxKind::Negate => match node.child_nodes().next() {
                Some(inner) => {
                    let ty = self.expr(inner);
                    let number = self.subst.fresh_constrained(Constraint::Number);
                    self.expect(&number, &ty, inner.range());
                    ty
                }
                None => self.subst.fresh(),
            },
            SyntaxKind::Parenthesized => match node.child_nodes().next() {
                Some(inner) => self.expr(inner),
                None => self.subst.fresh(),
            },
            SyntaxKind::Tuple => {
                let items: Vec<SyntaxNode<'a>> = node.child_nodes().collect();
                Type::Tuple(items.into_iter().map(|item| self.expr(item)).collect())
            }
            SyntaxKind::Unit => Type::Unit,
            SyntaxKind::List => {
                let element = self.subst.fresh();
                for item in node.child_nodes() {
                    let ty = self.expr(item);
                    self.expect(&element, &ty, item.range());
                }
                Type::list(element)
            }
            SyntaxKind::Record => {
                let fields = self.record_fields(node);
                Type::Record {
                    fields: fields.into_iter().map(|(name, ty, _)| (name, ty)).collect(),
                    row: None,
                }
            }
            SyntaxKind::RecordUpdate => self.record_update(node),
            SyntaxKind::LetIn => self.let_in(node),
            SyntaxKind::CaseOf => self.case_of(node),
            SyntaxKind::IfElse => self.if_else(node),
            SyntaxKind::Lambda => {
                let patterns: Vec<SyntaxNode<'a>> =
                    node.child_nodes().filter(|c| c.kind().is_pattern()).collect();
                let params: Vec<Type> = patterns.iter().map(|_| self.subst.fresh()).collect();
                for (pattern, ty) in patterns.iter().zip(&params) {
                    self.pattern(*pattern, ty.clone());
                }
                let body = match expr_after(node, SyntaxKind::Arrow) {
                    Some(body) => self.expr(body),
                    None => self.subst.fresh(),
                };
                Type::function(params, body)
            }
            _ => self.subst.fresh(),
        };
        self.types.insert(node.id(), ty.clone());
        ty
    }

    fn reference(&mut self, node: SyntaxNode<'a>) -> Type {
        let checker = self.checker;
        match checker.resolver().resolve_reference(self.file, node) {
            Some(symbol) => self.symbol_type(&symbol),
            // unresolved names stay unconstrained
            None => self.subst.fresh(),
        }
    }

    fn symbol_type(&mut self, symbol: &Symbol) -> Type {
        if symbol.uri == self.file.uri {
            if let Some((id, own)) = &self.current {
                if *id == symbol.node {
                    return own.clone();
                }
            }
            if symbol.local {
                return match self.locals.get(&symbol.node).cloned() {
                    Some(scheme) => self.subst.instantiate_scheme(&scheme),
                    None => self.subst.fresh(),
                };
            }
        }
        match self.checker.symbol_type(symbol) {
            Some(ty) => self.subst.instantiate(&ty),
            None => self.subst.fresh(),
        }
    }

    fn literal(&mut self, token: SyntaxNode<'a>) -> Type {
        match token.kind() {
            SyntaxKind::Number => {
                let text = token.text();
                let hex = text.starts_with("0x") || text.starts_with("0X");
                if !hex && text.contains(['.', 'e', 'E']) {
                    Type::float()
                } else {
                    self.subst.fresh_constrained(Constraint::Number)
                }
            }
            SyntaxKind::StringLit => Type::string(),
            SyntaxKind::CharLit => Type::char(),
            _ => self.subst.fresh(),
        }
    }

    fn field_access(&mut self, node: SyntaxNode<'a>) -> Type {
        let (Some(target), Some(name)) = (node.child_nodes().next(), node.child(SyntaxKind::LowerIdent))
        else {
            return self.subst.fresh();
        };
        let target_ty = self.expr(target);
        let field = self.subst.fresh();
        let record = Type::Record {
            fields: IndexMap::from([(name.text().to_string(), field.clone())]),
            row: self.row(),
        };
        self.expect(&record, &target_ty, target.range());
        field
    }

    /// `(name, type, value range)` of each field of a record literal or
    /// update.
    fn record_fields(&mut self, node: SyntaxNode<'a>) -> Vec<(String, Type, TextRange)> {
        let mut out = Vec::new();
        for field in node.children_of(SyntaxKind::RecordField) {
            let Some(name) = field.child(SyntaxKind::LowerIdent) else {
                continue;
            };
            let (ty, range) = match expr_after(field, SyntaxKind::Equals) {
                Some(value) => (self.expr(value), value.range()),
                None => (self.subst.fresh(), field.range()),
            };
            self.types.insert(field.id(), ty.clone());
            out.push((name.text().to_string(), ty, range));
        }
        out
    }

    fn record_update(&mut self, node: SyntaxNode<'a>) -> Type {
        let base = node.child(SyntaxKind::ValueRef);
        let base_ty = match base {
            Some(base) => self.expr(base),
            None => self.subst.fresh(),
        };
        let values = self.record_fields(node);
        let slots: Vec<Type> = values.iter().map(|_| self.subst.fresh()).collect();
        let shape = Type::Record {
            fields: values
                .iter()
                .zip(&slots)
                .map(|((name, _, _), slot)| (name.clone(), slot.clone()))
                .collect(),
            row: self.row(),
        };
        let base_range = base.map(|b| b.range()).unwrap_or_else(|| node.range());
        if self.expect(&shape, &base_ty, base_range) {
            for ((_, ty, range), slot) in values.iter().zip(&slots) {
                self.expect(slot, ty, *range);
            }
        }
        base_ty
    }

    fn call(&mut self, node: SyntaxNode<'a>) -> Type {
        let mut parts = node.child_nodes();
        let Some(callee) = parts.next() else {
            return self.subst.fresh();
        };
        let callee_ty = self.expr(callee);
        let args: Vec<(Type, TextRange)> = parts.map(|arg| (self.expr(arg), arg.range())).collect();
        self.apply(callee_ty, &args, node.range())
    }

    /// Apply a function type to arguments one at a time, reporting each
    /// mismatch at its argument.
    fn apply(&mut self, callee: Type, args: &[(Type, TextRange)], whole: TextRange) -> Type {
        let mut current = callee;
        for (arg, range) in args {
            match self.subst.resolve(&current) {
                Type::Function { params, ret } => {
                    let Some((first, rest)) = params.split_first() else {
                        return *ret;
                    };
                    self.expect(first, arg, *range);
                    current = Type::function(rest.to_vec(), *ret);
                }
                Type::Var(var) if !var.rigid => {
                    let ret = self.subst.fresh();
                    let shape = Type::function(vec![arg.clone()], ret.clone());
                    self.expect(&current, &shape, whole);
                    current = ret;
                }
                other => {
                    let shown = self.show(&[&other]);
                    self.error(
                        whole,
                        TypeErrorKind::NotAFunction,
                        format!(
                            "This value is not a function, but it is given an argument: its type is `{}`",
                            shown[0]
                        ),
                    );
                    return self.subst.fresh();
                }
            }
        }
        current
    }

    fn operator(&mut self, op: SyntaxNode<'a>) -> OperatorInfo {
        let checker = self.checker;
        let info = checker
            .resolver()
            .resolve_reference(self.file, op)
            .and_then(|symbol| checker.infix_info(&symbol));
        let (precedence, assoc, ty) = match info {
            Some(info) => (
                info.precedence,
                info.assoc,
                info.ty.map(|ty| self.subst.instantiate(&ty)),
            ),
            None => (9, Assoc::Left, None),
        };
        let ty = ty.unwrap_or_else(|| self.subst.fresh());
        self.types.insert(op.id(), ty.clone());
        OperatorInfo {
            precedence,
            assoc,
            ty,
        }
    }

    /// A flat operator chain, grouped by the precedence and associativity
    /// of each operator's infix declaration.
    fn binop(&mut self, node: SyntaxNode<'a>) -> Type {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        for child in node.child_nodes() {
            if child.kind() == SyntaxKind::OperatorRef {
                ops.push(child);
            } else {
                operands.push(child);
            }
        }
        let typed: Vec<(Type, TextRange)> = operands
            .iter()
            .map(|operand| (self.expr(*operand), operand.range()))
            .collect();
        let infos: Vec<OperatorInfo> = ops.iter().map(|op| self.operator(*op)).collect();
        if typed.len() != infos.len() + 1 {
            return self.subst.fresh();
        }
        let mut next = 0;
        let tree = climb(&infos, &mut next, 0);
        self.eval_ops(&tree, &typed, &infos).0
    }

    fn eval_ops(
        &mut self,
        tree: &OpTree,
        operands: &[(Type, TextRange)],
        infos: &[OperatorInfo],
    ) -> (Type, TextRange) {
        match tree {
            OpTree::Leaf(i) => operands[*i].clone(),
            OpTree::Apply(op, lhs, rhs) => {
                let left = self.eval_ops(lhs, operands, infos);
                let right = self.eval_ops(rhs, operands, infos);
                let range = TextRange::new(left.1.start, right.1.end);
                let ty = self.apply(infos[*op].ty.clone(), &[left, right], range);
                (ty, range)
            }
        }
    }

    fn case_of(&mut self, node: SyntaxNode<'a>) -> Type {
        let scrutinee = match node.child_nodes().find(|c| c.kind().is_expression()) {
            Some(expr) => self.expr(expr),
            None => self.subst.fresh(),
        };
        let result = self.subst.fresh();
        for branch in node.children_of(SyntaxKind::CaseBranch) {
            if let Some(pattern) = branch.child_nodes().find(|c| c.kind().is_pattern()) {
                self.pattern(pattern, scrutinee.clone());
            }
            if let Some(body) = expr_after(branch, SyntaxKind::Arrow) {
                let ty = self.expr(body);
                self.expect(&result, &ty, body.range());
            }
        }
        result
    }

    fn if_else(&mut self, node: SyntaxNode<'a>) -> Type {
        let parts: Vec<SyntaxNode<'a>> = node
            .child_nodes()
            .filter(|c| c.kind().is_expression())
            .collect();
        if let Some(condition) = parts.first() {
            let ty = self.expr(*condition);
            self.expect(&Type::bool(), &ty, condition.range());
        }
        let then_ty = match parts.get(1) {
            Some(branch) => self.expr(*branch),
            None => self.subst.fresh(),
        };
        if let Some(branch) = parts.get(2) {
            let else_ty = self.expr(*branch);
            self.expect(&then_ty, &else_ty, branch.range());
        }
        then_ty
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    /// Bind the names of `node` and constrain it to match `expected`.
    fn pattern(&mut self, node: SyntaxNode<'a>, expected: Type) {
        self.types.insert(node.id(), expected.clone());
        let range = node.range();
        match node.kind() {
            SyntaxKind::VarPattern => {
                self.locals.insert(node.id(), Scheme::mono(expected));
            }
            SyntaxKind::AsPattern => {
                if let Some(inner) = node.child_nodes().next() {
                    self.pattern(inner, expected.clone());
                }
                if let Some(alias) = node.children_of(SyntaxKind::LowerIdent).last() {
                    self.types.insert(alias.id(), expected.clone());
                    self.locals.insert(alias.id(), Scheme::mono(expected));
                }
            }
            SyntaxKind::ParenPattern => {
                if let Some(inner) = node.child_nodes().next() {
                    self.pattern(inner, expected);
                }
            }
            SyntaxKind::TuplePattern => {
                let items: Vec<SyntaxNode<'a>> = node.child_nodes().collect();
                let slots: Vec<Type> = items.iter().map(|_| self.subst.fresh()).collect();
                self.expect(&expected, &Type::Tuple(slots.clone()), range);
                for (item, slot) in items.into_iter().zip(slots) {
                    self.pattern(item, slot);
                }
            }
            SyntaxKind::UnitPattern => {
                self.expect(&expected, &Type::Unit, range);
            }
            SyntaxKind::ListPattern => {
                let element = self.subst.fresh();
                self.expect(&expected, &Type::list(element.clone()), range);
                for item in node.child_nodes() {
                    self.pattern(item, element.clone());
                }
            }
            SyntaxKind::ConsPattern => {
                let element = self.subst.fresh();
                let list = Type::list(element.clone());
                self.expect(&expected, &list, range);
                let mut parts = node.child_nodes();
                if let Some(head) = parts.next() {
                    self.pattern(head, element);
                }
                if let Some(tail) = parts.next() {
                    self.pattern(tail, list);
                }
            }
            SyntaxKind::LiteralPattern => {
                let token = node.children().find(|c| {
                    matches!(
                        c.kind(),
                        SyntaxKind::Number | SyntaxKind::StringLit | SyntaxKind::CharLit
                    )
                });
                let ty = match token {
                    Some(token) => self.literal(token),
                    None => self.subst.fresh(),
                };
                self.expect(&expected, &ty, range);
            }
            SyntaxKind::RecordPattern => {
                let mut fields = IndexMap::new();
                for token in node.children_of(SyntaxKind::LowerIdent) {
                    let ty = self.subst.fresh();
                    self.types.insert(token.id(), ty.clone());
                    self.locals.insert(token.id(), Scheme::mono(ty.clone()));
                    fields.insert(token.text().to_string(), ty);
                }
                let shape = Type::Record {
                    fields,
                    row: self.row(),
                };
                self.expect(&expected, &shape, range);
            }
            SyntaxKind::ConstructorPattern => self.constructor_pattern(node, expected),
            _ => {}
        }
    }

    fn constructor_pattern(&mut self, node: SyntaxNode<'a>, expected: Type) {
        let args: Vec<SyntaxNode<'a>> = node
            .child_nodes()
            .filter(|c| c.kind().is_pattern())
            .collect();
        let checker = self.checker;
        let Some(symbol) = checker.resolver().resolve_reference(self.file, node) else {
            for arg in args {
                let ty = self.subst.fresh();
                self.pattern(arg, ty);
            }
            return;
        };
        let (params, result) = match self.symbol_type(&symbol) {
            Type::Function { params, ret } => (params, *ret),
            other => (Vec::new(), other),
        };
        if params.len() != args.len() {
            self.error(
                node.range(),
                TypeErrorKind::Arity,
                format!(
                    "The `{}` constructor needs {} argument{}, but the pattern has {}",
                    symbol.name,
                    params.len(),
                    if params.len() == 1 { "" } else { "s" },
                    args.len()
                ),
            );
            for arg in args {
                let ty = self.subst.fresh();
                self.pattern(arg, ty);
            }
            return;
        }
        self.expect(&expected, &result, node.range());
        for (arg, param) in args.into_iter().zip(params) {
            self.pattern(arg, param);
        }
    }
}

fn climb(infos: &[OperatorInfo], next: &mut usize, min: u32) -> OpTree {
    let mut lhs = OpTree::Leaf(*next);
    while *next < infos.len() && infos[*next].precedence >= min {
        let op = *next;
        *next += 1;
        let precedence = infos[op].precedence;
        let rhs_min = match infos[op].assoc {
            Assoc::Right => precedence,
            Assoc::Left | Assoc::Non => precedence + 1,
        };
        let rhs = climb(infos, next, rhs_min);
        lhs = OpTree::Apply(op, Box::new(lhs), Box::new(rhs));
    }
    lhs
}

/// First expression child following a `token` child.
fn expr_after(node: SyntaxNode<'_>, token: SyntaxKind) -> Option<SyntaxNode<'_>> {
    node.children()
        .skip_while(|c| c.kind() != token)
        .skip(1)
        .find(|c| c.kind().is_expression())
}
