//
// types/mod.rs
//
// Lightweight type inference: one inference pass per top-level value
// declaration, cached for the lifetime of a checker
//

mod annotation;
mod infer;
pub mod print;
pub mod ty;
pub mod unify;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tower_lsp::lsp_types::Url;

use crate::forest::{Forest, SourceFile};
use crate::resolve::{Resolver, Symbol, SymbolKind};
use crate::syntax::ast;
use crate::syntax::{NodeId, SyntaxKind, SyntaxNode, TextRange};

pub use print::TypePrinter;
pub use ty::{Constraint, Type, TypeVar};

use infer::Infer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    Mismatch,
    InfiniteType,
    /// Constructor pattern with the wrong number of arguments
    Arity,
    NotAFunction,
}

/// A type error found while inferring a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub range: TextRange,
    pub message: String,
    pub kind: TypeErrorKind,
}

/// Result of inferring one top-level declaration.
#[derive(Debug, Clone, Default)]
pub struct DeclInference {
    /// Type of the declaration itself
    pub ty: Type,
    /// Types of the expressions and patterns inside it
    pub types: HashMap<NodeId, Type>,
    pub errors: Vec<TypeError>,
}

impl Default for Type {
    fn default() -> Self {
        Type::unknown()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    Non,
}

/// Precedence, associativity and function type of an infix operator.
#[derive(Debug, Clone)]
pub struct InfixInfo {
    pub precedence: u32,
    pub assoc: Assoc,
    pub ty: Option<Type>,
}

/// Entry point to the analysis of one forest snapshot.
pub struct Program<'a> {
    forest: &'a Forest,
}

impl<'a> Program<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self { forest }
    }

    pub fn forest(&self) -> &'a Forest {
        self.forest
    }

    pub fn get_source_file(&self, uri: &Url) -> Option<&'a SourceFile> {
        self.forest.get_by_uri(uri)
    }

    pub fn get_type_checker(&self) -> TypeChecker<'a> {
        TypeChecker::new(self.forest)
    }
}

/// Answers type queries against one forest snapshot.
///
/// Inference results are cached per declaration; a checker must be dropped
/// once the forest changes.
pub struct TypeChecker<'a> {
    resolver: Resolver<'a>,
    decls: RefCell<HashMap<(Url, NodeId), Rc<DeclInference>>>,
    in_progress: RefCell<HashSet<(Url, NodeId)>>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self {
            resolver: Resolver::new(forest),
            decls: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn forest(&self) -> &'a Forest {
        self.resolver.forest()
    }

    /// Inference of the top-level value declaration `decl` of `uri`.
    ///
    /// `None` while that declaration is itself being inferred (mutual
    /// recursion without annotations); callers fall back to a fresh
    /// variable.
    pub fn infer_declaration(&self, uri: &Url, decl: NodeId) -> Option<Rc<DeclInference>> {
        let key = (uri.clone(), decl);
        if let Some(hit) = self.decls.borrow().get(&key) {
            return Some(hit.clone());
        }
        let file = self.forest().get_by_uri(uri)?;
        let node = file.tree.node(decl);
        if node.kind() != SyntaxKind::ValueDeclaration {
            return None;
        }
        if !self.in_progress.borrow_mut().insert(key.clone()) {
            return None;
        }
        let result = Rc::new(infer::infer_declaration(self, file, node));
        self.in_progress.borrow_mut().remove(&key);
        self.decls.borrow_mut().insert(key, result.clone());
        Some(result)
    }

    /// Type of the node `node` of `uri`: an expression, pattern, binding
    /// token, declaration or annotation. Nodes outside any value
    /// declaration get [`Type::unknown`].
    pub fn find_type(&self, uri: &Url, node: NodeId) -> Type {
        self.try_find_type(uri, node).unwrap_or_else(Type::unknown)
    }

    fn try_find_type(&self, uri: &Url, id: NodeId) -> Option<Type> {
        let file = self.forest().get_by_uri(uri)?;
        let node = file.tree.node(id);
        let top = ast::top_level_item(node)?;
        match top.kind() {
            SyntaxKind::ValueDeclaration => {
                let inference = self.infer_declaration(uri, top.id())?;
                if id == top.id() {
                    return Some(inference.ty.clone());
                }
                if let Some(ty) = inference.types.get(&id) {
                    return Some(ty.clone());
                }
                // a name token stands for what it names
                let parent = node.parent()?;
                match parent.kind() {
                    SyntaxKind::FunctionDeclarationLeft => {
                        let decl = parent.parent()?;
                        if decl.id() == top.id() {
                            Some(inference.ty.clone())
                        } else {
                            inference.types.get(&decl.id()).cloned()
                        }
                    }
                    _ => inference.types.get(&parent.id()).cloned(),
                }
            }
            SyntaxKind::TypeAnnotation | SyntaxKind::PortAnnotation => {
                self.annotation_type(file, top)
            }
            _ => None,
        }
    }

    /// Declared or inferred type of a symbol, with variables that callers
    /// instantiate afresh.
    pub fn symbol_type(&self, symbol: &Symbol) -> Option<Type> {
        let file = self.forest().get_by_uri(&symbol.uri)?;
        let node = file.tree.node(symbol.node);
        match symbol.kind {
            SymbolKind::Function if symbol.local => self.try_find_type(&symbol.uri, symbol.node),
            SymbolKind::Function => match node.kind() {
                SyntaxKind::ValueDeclaration => match ast::annotation_for(node) {
                    Some(annotation) => self.annotation_type(file, annotation),
                    None => self
                        .infer_declaration(&symbol.uri, symbol.node)
                        .map(|inference| inference.ty.clone()),
                },
                SyntaxKind::PortAnnotation => self.annotation_type(file, node),
                _ => None,
            },
            SymbolKind::UnionConstructor => self.constructor_type(file, node),
            SymbolKind::TypeAlias => self.record_constructor_type(file, node),
            SymbolKind::Operator => self.infix_info(symbol).and_then(|info| info.ty),
            SymbolKind::Field => {
                let ty = node.child(SyntaxKind::TypeExpression)?;
                let mut cx = Infer::new(self, file);
                Some(cx.convert(ty, &mut HashMap::new(), true))
            }
            _ => None,
        }
    }

    /// Written type of an annotation, variables keeping their names.
    fn annotation_type(&self, file: &'a SourceFile, annotation: SyntaxNode<'a>) -> Option<Type> {
        let ty = annotation.child(SyntaxKind::TypeExpression)?;
        let mut cx = Infer::new(self, file);
        Some(cx.convert(ty, &mut HashMap::new(), true))
    }

    /// `Just : a -> Maybe a` from `type Maybe a = Just a | Nothing`.
    fn constructor_type(&self, file: &'a SourceFile, variant: SyntaxNode<'a>) -> Option<Type> {
        let decl = variant.parent()?;
        let name = ast::name_of(decl)?;
        let mut cx = Infer::new(self, file);
        let mut vars = HashMap::new();
        let mut params = Vec::new();
        for param in decl.children_of(SyntaxKind::TypeVariable) {
            if let Some(var) = ast::name_of(param) {
                let ty = cx.subst.named(var, true);
                vars.insert(var.to_string(), ty.clone());
                params.push(ty);
            }
        }
        let args: Vec<Type> = variant
            .child_nodes()
            .map(|arg| cx.convert(arg, &mut vars, true))
            .collect();
        Some(Type::function(
            args,
            Type::Union {
                module: file.module_name.clone(),
                name: name.to_string(),
                args: params,
            },
        ))
    }

    /// `Model : Int -> String -> Model` from a record type alias.
    fn record_constructor_type(&self, file: &'a SourceFile, alias: SyntaxNode<'a>) -> Option<Type> {
        let mut cx = Infer::new(self, file);
        let args: Vec<Type> = alias
            .children_of(SyntaxKind::TypeVariable)
            .filter_map(ast::name_of)
            .map(|name| cx.subst.named(name, true))
            .collect();
        let record = cx.expand_alias(&file.uri, alias.id(), args);
        let fields: Vec<Type> = match &record {
            Type::Record { fields, row: None } => fields.values().cloned().collect(),
            _ => return None,
        };
        Some(Type::function(fields, record))
    }

    /// Precedence, associativity and function type of the operator
    /// declared by `symbol`.
    pub fn infix_info(&self, symbol: &Symbol) -> Option<InfixInfo> {
        if symbol.kind != SymbolKind::Operator {
            return None;
        }
        let file = self.forest().get_by_uri(&symbol.uri)?;
        let decl = file.tree.node(symbol.node);
        let assoc = match decl.child(SyntaxKind::LowerIdent).map(|t| t.text()) {
            Some("right") => Assoc::Right,
            Some("non") => Assoc::Non,
            _ => Assoc::Left,
        };
        let precedence = decl
            .child(SyntaxKind::Number)
            .and_then(|n| n.text().parse().ok())
            .unwrap_or(9);
        let ty = decl
            .child(SyntaxKind::ValueRef)
            .and_then(|f| self.resolver.resolve_reference(file, f))
            .and_then(|f| self.symbol_type(&f));
        Some(InfixInfo {
            precedence,
            assoc,
            ty,
        })
    }

    /// Type errors of every top-level declaration of `uri`, in source
    /// order. One declaration's errors never stop the others from being
    /// checked.
    pub fn declaration_errors(&self, uri: &Url) -> Vec<TypeError> {
        let Some(file) = self.forest().get_by_uri(uri) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for decl in file.tree.root().children_of(SyntaxKind::ValueDeclaration) {
            if let Some(inference) = self.infer_declaration(uri, decl.id()) {
                out.extend(inference.errors.iter().cloned());
            }
        }
        out
    }

    /// Render `ty` as it would be written in `context`.
    pub fn type_to_string(&self, ty: &Type, context: &Url) -> String {
        let mut printer = TypePrinter::new(&self.resolver, self.forest().get_by_uri(context));
        printer.print(ty)
    }
}
