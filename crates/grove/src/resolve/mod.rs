//
// resolve/mod.rs
//
// Scope resolution across the forest: from a name occurrence to the
// declaration it refers to
//

pub mod imports;
pub mod references;
pub mod scope;
pub mod symbol;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tower_lsp::lsp_types::{Position, Url};

use crate::forest::{Forest, SourceFile};
use crate::syntax::ast;
use crate::syntax::{SyntaxKind, SyntaxNode};

pub use imports::{FileScope, ImportEntry, Namespace};
pub use symbol::{Reference, ReferenceKind, Symbol, SymbolKind};

use scope::Binding;

/// Resolves names against one snapshot of the forest.
///
/// Per-file scopes are cached for the lifetime of the resolver, so a
/// resolver must not outlive the forest state it was created for.
pub struct Resolver<'a> {
    forest: &'a Forest,
    scopes: RefCell<HashMap<Url, Rc<FileScope>>>,
}

impl<'a> Resolver<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self {
            forest,
            scopes: RefCell::new(HashMap::new()),
        }
    }

    pub fn forest(&self) -> &'a Forest {
        self.forest
    }

    pub fn file_scope(&self, uri: &Url) -> Option<Rc<FileScope>> {
        if let Some(scope) = self.scopes.borrow().get(uri) {
            return Some(scope.clone());
        }
        let file = self.forest.get_by_uri(uri)?;
        let scope = Rc::new(FileScope::build(file));
        self.scopes.borrow_mut().insert(uri.clone(), scope.clone());
        Some(scope)
    }

    fn module_scope(&self, module: &str) -> Option<(&'a SourceFile, Rc<FileScope>)> {
        let file = self.forest.get_by_module_name(module)?;
        Some((file, self.file_scope(&file.uri)?))
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Declaration referred to by the name at `position`, if any.
    pub fn resolve_definition(&self, uri: &Url, position: Position) -> Option<Symbol> {
        let file = self.forest.get_by_uri(uri)?;
        let offset = file.tree.offset(position);
        self.resolve_at_offset(file, offset)
    }

    pub fn resolve_at_offset(&self, file: &'a SourceFile, offset: u32) -> Option<Symbol> {
        let token = file.tree.token_at(offset)?;
        self.resolve_token(file, token)
    }

    /// Classify a name token by its parent node and resolve it.
    pub fn resolve_token(&self, file: &'a SourceFile, token: SyntaxNode<'a>) -> Option<Symbol> {
        if !matches!(
            token.kind(),
            SyntaxKind::LowerIdent | SyntaxKind::UpperIdent | SyntaxKind::Operator
        ) {
            return None;
        }
        let parent = token.parent()?;
        match parent.kind() {
            SyntaxKind::ValueRef
            | SyntaxKind::ConstructorRef
            | SyntaxKind::ConstructorPattern
            | SyntaxKind::TypeRef => self.resolve_qualified(file, parent, token),
            SyntaxKind::OperatorRef => self.resolve_operator(file, token.text()),
            SyntaxKind::FunctionDeclarationLeft => {
                let decl = parent.parent()?;
                self.declaration_symbol(file, decl)
            }
            SyntaxKind::TypeAnnotation => match ast::declaration_for(parent) {
                Some(decl) => self.declaration_symbol(file, decl),
                None if is_top_level(parent) => self
                    .file_scope(&file.uri)?
                    .top_level(Namespace::Value, token.text())
                    .cloned(),
                None => None,
            },
            SyntaxKind::PortAnnotation
            | SyntaxKind::TypeDeclaration
            | SyntaxKind::TypeAliasDeclaration
            | SyntaxKind::UnionVariant
            | SyntaxKind::InfixDeclaration => {
                // only the declared name, not e.g. the associativity of an infix
                if ast::name_token(parent) == Some(token) {
                    self.declaration_symbol(file, parent)
                } else {
                    None
                }
            }
            SyntaxKind::VarPattern | SyntaxKind::AsPattern | SyntaxKind::RecordPattern => {
                scope::binding_at(token).map(|b| binding_symbol(file, b))
            }
            SyntaxKind::TypeVariable => self.resolve_type_variable(file, parent),
            SyntaxKind::FieldType => field_declaration(file, parent),
            SyntaxKind::FieldAccess | SyntaxKind::FieldAccessor | SyntaxKind::RecordField => {
                self.resolve_field(file, parent, token.text())
            }
            SyntaxKind::ExposedValue | SyntaxKind::ExposedType | SyntaxKind::ExposedOperator => {
                self.resolve_exposed(file, parent, token.text())
            }
            SyntaxKind::ModuleName => {
                let holder = parent.parent()?;
                match holder.kind() {
                    SyntaxKind::ModuleDeclaration => Some(Symbol::module(file)),
                    SyntaxKind::ImportClause => self.resolve_module(parent.text()),
                    _ => None,
                }
            }
            SyntaxKind::AsClause => {
                let clause = parent.parent()?;
                let module = clause.child(SyntaxKind::ModuleName)?;
                self.resolve_module(module.text())
            }
            _ => None,
        }
    }

    /// Resolve a reference node (`ValueRef`, `ConstructorRef`,
    /// `ConstructorPattern`, `TypeRef` or `OperatorRef`) by its final name.
    pub fn resolve_reference(&self, file: &'a SourceFile, node: SyntaxNode<'a>) -> Option<Symbol> {
        match node.kind() {
            SyntaxKind::OperatorRef => {
                let op = node.child(SyntaxKind::Operator)?;
                self.resolve_operator(file, op.text())
            }
            _ => {
                let (_, name) = ast::qualified_parts(node);
                self.resolve_qualified(file, node, name?)
            }
        }
    }

    // ========================================================================
    // Lookup by category
    // ========================================================================

    fn resolve_qualified(
        &self,
        file: &'a SourceFile,
        node: SyntaxNode<'a>,
        token: SyntaxNode<'a>,
    ) -> Option<Symbol> {
        let (segments, name) = ast::qualified_parts(node);
        let name = name?;
        let qualifier = (!segments.is_empty()).then(|| {
            segments
                .iter()
                .map(|s| s.text())
                .collect::<Vec<_>>()
                .join(".")
        });
        if token != name {
            // A leading segment followed by more path is a module qualifier,
            // named by the segments up to the one under the cursor
            let clicked = segments.iter().position(|s| *s == token)?;
            let prefix = segments[..=clicked]
                .iter()
                .map(|s| s.text())
                .collect::<Vec<_>>()
                .join(".");
            return self
                .resolve_qualifier(file, &prefix)
                .or_else(|| self.resolve_module(&prefix));
        }
        let namespace = match node.kind() {
            SyntaxKind::ValueRef => Namespace::Value,
            SyntaxKind::TypeRef => Namespace::Type,
            _ => Namespace::Constructor,
        };
        match qualifier {
            Some(qualifier) => self.resolve_in_qualified_module(file, &qualifier, namespace, name.text()),
            None => {
                if namespace == Namespace::Value {
                    if let Some(binding) = scope::find_local(node, name.text()) {
                        return Some(binding_symbol(file, binding));
                    }
                }
                self.resolve_unqualified(file, namespace, name.text())
            }
        }
    }

    /// Own top-level declarations first, then everything the imports
    /// expose: explicit exposing lists before wildcards, later imports
    /// before earlier ones.
    pub fn resolve_unqualified(
        &self,
        file: &SourceFile,
        namespace: Namespace,
        name: &str,
    ) -> Option<Symbol> {
        let scope = self.file_scope(&file.uri)?;
        if let Some(symbol) = scope.top_level(namespace, name) {
            return Some(symbol.clone());
        }
        let explicit = scope
            .imports
            .iter()
            .rev()
            .filter(|i| matches!(i.exposing, Some(ref e) if !e.is_all()));
        let wildcard = scope
            .imports
            .iter()
            .rev()
            .filter(|i| matches!(i.exposing, Some(ref e) if e.is_all()));
        for import in explicit.chain(wildcard) {
            let Some((_, target)) = self.module_scope(&import.module) else {
                continue;
            };
            if let Some(symbol) = target.exported(namespace, name) {
                if import.exposes(namespace, symbol) {
                    return Some(symbol.clone());
                }
            }
        }
        None
    }

    /// `Q.name`: the last import whose qualifier is `Q` decides, filtered by
    /// the target module's own exposing list.
    pub fn resolve_in_qualified_module(
        &self,
        file: &SourceFile,
        qualifier: &str,
        namespace: Namespace,
        name: &str,
    ) -> Option<Symbol> {
        let import = self.import_for_qualifier(file, qualifier)?;
        let (_, target) = self.module_scope(&import.module)?;
        target.exported(namespace, name).cloned()
    }

    pub fn import_for_qualifier(&self, file: &SourceFile, qualifier: &str) -> Option<ImportEntry> {
        let scope = self.file_scope(&file.uri)?;
        scope
            .imports
            .iter()
            .rev()
            .find(|i| i.qualifier == qualifier)
            .cloned()
    }

    fn resolve_qualifier(&self, file: &SourceFile, qualifier: &str) -> Option<Symbol> {
        let import = self.import_for_qualifier(file, qualifier)?;
        self.resolve_module(&import.module)
    }

    pub fn resolve_module(&self, module: &str) -> Option<Symbol> {
        let file = self.forest.get_by_module_name(module)?;
        Some(Symbol::module(file))
    }

    pub fn resolve_operator(&self, file: &SourceFile, op: &str) -> Option<Symbol> {
        self.resolve_unqualified(file, Namespace::Operator, op)
    }

    fn resolve_exposed(
        &self,
        file: &'a SourceFile,
        item: SyntaxNode<'a>,
        name: &str,
    ) -> Option<Symbol> {
        let namespace = match item.kind() {
            SyntaxKind::ExposedValue => Namespace::Value,
            SyntaxKind::ExposedOperator => Namespace::Operator,
            _ => Namespace::Type,
        };
        let holder = item.ancestors().find(|n| {
            matches!(
                n.kind(),
                SyntaxKind::ModuleDeclaration | SyntaxKind::ImportClause
            )
        })?;
        if holder.kind() == SyntaxKind::ModuleDeclaration {
            return self
                .file_scope(&file.uri)?
                .top_level(namespace, name)
                .cloned();
        }
        let module = holder.child(SyntaxKind::ModuleName)?;
        let (_, target) = self.module_scope(module.text())?;
        target.exported(namespace, name).cloned()
    }

    fn resolve_type_variable(
        &self,
        file: &'a SourceFile,
        variable: SyntaxNode<'a>,
    ) -> Option<Symbol> {
        let name = ast::name_token(variable)?;
        let owner = variable.ancestors().find(|n| {
            matches!(
                n.kind(),
                SyntaxKind::TypeDeclaration
                    | SyntaxKind::TypeAliasDeclaration
                    | SyntaxKind::TypeAnnotation
                    | SyntaxKind::PortAnnotation
            )
        })?;
        let declaring = match owner.kind() {
            // parameters of the type are its direct children
            SyntaxKind::TypeDeclaration | SyntaxKind::TypeAliasDeclaration => owner
                .children_of(SyntaxKind::TypeVariable)
                .find(|v| ast::name_of(*v) == Some(name.text()))?,
            // an annotation binds a variable at its first occurrence
            _ => owner
                .descendants()
                .filter(|n| n.kind() == SyntaxKind::TypeVariable)
                .find(|v| ast::name_of(*v) == Some(name.text()))?,
        };
        let token = ast::name_token(declaring)?;
        Some(Symbol::new(SymbolKind::TypeVariable, file, declaring, token).local())
    }

    /// Symbol for a declaration node of `file`: a top-level item, a let
    /// declaration, or a union variant.
    pub fn declaration_symbol(&self, file: &'a SourceFile, decl: SyntaxNode<'a>) -> Option<Symbol> {
        let name = ast::name_token(decl)?;
        let symbol = match decl.kind() {
            SyntaxKind::ValueDeclaration | SyntaxKind::PortAnnotation => {
                let symbol = Symbol::new(SymbolKind::Function, file, decl, name);
                if is_top_level(decl) {
                    symbol
                } else {
                    symbol.local()
                }
            }
            SyntaxKind::TypeDeclaration => Symbol::new(SymbolKind::UnionType, file, decl, name),
            SyntaxKind::TypeAliasDeclaration => Symbol::new(SymbolKind::TypeAlias, file, decl, name),
            SyntaxKind::UnionVariant => {
                let owner = decl.parent().and_then(ast::name_token)?;
                Symbol::new(SymbolKind::UnionConstructor, file, decl, name).with_parent(owner.text())
            }
            SyntaxKind::InfixDeclaration => Symbol::new(SymbolKind::Operator, file, decl, name),
            _ => return None,
        };
        Some(symbol)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Resolve a record field label to the record type alias declaring it.
    ///
    /// The record type of the accessed expression comes from inference;
    /// the alias whose field set matches it best is the declaration. A
    /// record literal field with no matching alias declares itself.
    fn resolve_field(
        &self,
        file: &'a SourceFile,
        holder: SyntaxNode<'a>,
        name: &str,
    ) -> Option<Symbol> {
        let checker = crate::types::TypeChecker::new(self.forest);
        let target = match holder.kind() {
            SyntaxKind::FieldAccess => holder.child_nodes().next(),
            SyntaxKind::RecordField => holder.parent(),
            _ => None,
        };
        let fields: Vec<String> = target
            .map(|t| checker.find_type(&file.uri, t.id()))
            .and_then(|ty| ty.record_fields())
            .unwrap_or_else(|| vec![name.to_string()]);

        let mut best: Option<(usize, Symbol)> = None;
        for (alias_file, alias) in self.visible_record_aliases(file) {
            let Some(record) = alias_record(alias) else {
                continue;
            };
            let declared: Vec<SyntaxNode<'a>> =
                record.children_of(SyntaxKind::FieldType).collect();
            let names: Vec<&str> = declared.iter().filter_map(|f| ast::name_of(*f)).collect();
            if !names.contains(&name) || !fields.iter().all(|f| names.contains(&f.as_str())) {
                continue;
            }
            // fewer extra fields is a closer match
            let extra = names.len() - fields.len().min(names.len());
            if best.as_ref().is_some_and(|(e, _)| *e <= extra) {
                continue;
            }
            let field = declared
                .into_iter()
                .find(|f| ast::name_of(*f) == Some(name))
                .and_then(|f| field_declaration(alias_file, f));
            if let Some(field) = field {
                best = Some((extra, field));
            }
        }
        if let Some((_, symbol)) = best {
            return Some(symbol);
        }
        if holder.kind() == SyntaxKind::RecordField
            && holder.parent().is_some_and(|p| p.kind() == SyntaxKind::Record)
        {
            let token = holder.child(SyntaxKind::LowerIdent)?;
            return Some(Symbol::new(SymbolKind::Field, file, holder, token).local());
        }
        None
    }

    /// Record type aliases declared by `file` or exposed to it by imports.
    fn visible_record_aliases(&self, file: &'a SourceFile) -> Vec<(&'a SourceFile, SyntaxNode<'a>)> {
        let mut out = Vec::new();
        let Some(scope) = self.file_scope(&file.uri) else {
            return out;
        };
        let mut sources: Vec<(&'a SourceFile, bool)> = vec![(file, false)];
        for import in &scope.imports {
            if let Some(target) = self.forest.get_by_module_name(&import.module) {
                sources.push((target, true));
            }
        }
        for (source, exported_only) in sources {
            let Some(source_scope) = self.file_scope(&source.uri) else {
                continue;
            };
            for item in source.tree.root().children_of(SyntaxKind::TypeAliasDeclaration) {
                let Some(name) = ast::name_of(item) else {
                    continue;
                };
                if exported_only && !source_scope.exposing.exposes_type(name) {
                    continue;
                }
                if out.iter().any(|(f, n)| f.uri == source.uri && *n == item) {
                    continue;
                }
                out.push((source, item));
            }
        }
        out
    }

    // ========================================================================
    // Completion support
    // ========================================================================

    /// Values visible at `offset`: locals (nearest first), own top-levels,
    /// then values exposed by imports.
    pub fn visible_values(&self, file: &'a SourceFile, offset: u32) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = Vec::new();
        let push = |symbol: Symbol, out: &mut Vec<Symbol>| {
            if !out.iter().any(|s| s.name == symbol.name) {
                out.push(symbol);
            }
        };
        let node = file
            .tree
            .token_at(offset)
            .unwrap_or_else(|| file.tree.root());
        for binding in scope::visible_locals(node) {
            push(binding_symbol(file, binding), &mut out);
        }
        let Some(scope) = self.file_scope(&file.uri) else {
            return out;
        };
        for namespace in [Namespace::Value, Namespace::Constructor] {
            let mut own: Vec<&Symbol> = scope.all(namespace).collect();
            own.sort_by(|a, b| a.name.cmp(&b.name));
            for symbol in own {
                push(symbol.clone(), &mut out);
            }
        }
        for import in scope.imports.iter().rev() {
            let Some(exposing) = &import.exposing else {
                continue;
            };
            let Some((_, target)) = self.module_scope(&import.module) else {
                continue;
            };
            for namespace in [Namespace::Value, Namespace::Constructor] {
                let mut exposed: Vec<&Symbol> = target
                    .all(namespace)
                    .filter(|s| imports::exposes(&target.exposing, namespace, s))
                    .filter(|s| imports::exposes(exposing, namespace, s))
                    .collect();
                exposed.sort_by(|a, b| a.name.cmp(&b.name));
                for symbol in exposed {
                    push(symbol.clone(), &mut out);
                }
            }
        }
        out
    }

    /// Module qualifiers usable in `file`, e.g. `List`, `Cmd`, `H`.
    pub fn qualifiers(&self, file: &SourceFile) -> Vec<ImportEntry> {
        let Some(scope) = self.file_scope(&file.uri) else {
            return Vec::new();
        };
        let mut out: Vec<ImportEntry> = Vec::new();
        for import in scope.imports.iter().rev() {
            if !out.iter().any(|i| i.qualifier == import.qualifier) {
                out.push(import.clone());
            }
        }
        out
    }

    /// Exported symbols of the module `qualifier` names in `file`.
    pub fn qualified_members(&self, file: &SourceFile, qualifier: &str) -> Vec<Symbol> {
        let Some(import) = self.import_for_qualifier(file, qualifier) else {
            return Vec::new();
        };
        let Some((_, target)) = self.module_scope(&import.module) else {
            return Vec::new();
        };
        let mut out: Vec<Symbol> = [Namespace::Value, Namespace::Constructor, Namespace::Type]
            .into_iter()
            .flat_map(|ns| {
                let target = &target;
                target
                    .all(ns)
                    .filter(move |s| imports::exposes(&target.exposing, ns, s))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out.dedup_by(|a, b| a.name == b.name && a.kind == b.kind);
        out
    }
}

fn is_top_level(node: SyntaxNode<'_>) -> bool {
    node.parent().is_some_and(|p| p.kind() == SyntaxKind::File)
}

pub(crate) fn binding_symbol(file: &SourceFile, binding: Binding<'_>) -> Symbol {
    Symbol {
        kind: SymbolKind::Function,
        name: binding.name.to_string(),
        uri: file.uri.clone(),
        module: file.module_name.clone(),
        node: binding.node.id(),
        range: binding.node.range(),
        name_range: binding.name_range,
        parent: None,
        local: true,
    }
}

/// The record type of a record type alias body.
pub(crate) fn alias_record(alias: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    alias
        .child(SyntaxKind::TypeExpression)?
        .child(SyntaxKind::RecordType)
}

fn field_declaration(file: &SourceFile, field: SyntaxNode<'_>) -> Option<Symbol> {
    let token = field.child(SyntaxKind::LowerIdent)?;
    let owner = field
        .ancestors()
        .find(|n| n.kind() == SyntaxKind::TypeAliasDeclaration)
        .and_then(ast::name_of);
    let symbol = Symbol::new(SymbolKind::Field, file, field, token);
    Some(match owner {
        Some(owner) => symbol.with_parent(owner),
        None => symbol.local(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///project/src/{}", name)).unwrap()
    }

    fn forest(files: &[(&str, &str)]) -> Forest {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        for (name, text) in files {
            forest.set_text(uri(name), true, true, text);
        }
        forest
    }

    /// Resolve the `nth` occurrence of `needle` in file `name`.
    fn resolve(forest: &Forest, name: &str, needle: &str, nth: usize) -> Option<Symbol> {
        let file = forest.get_by_uri(&uri(name)).unwrap();
        let offset = file
            .text()
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i as u32)
            .unwrap();
        Resolver::new(forest).resolve_at_offset(file, offset)
    }

    #[test]
    fn test_cross_file_definition() {
        let forest = forest(&[
            ("App.elm", "module App exposing (foo)\nfoo = \"\"\n"),
            ("Main.elm", "import App exposing (foo)\nbar = foo\n"),
        ]);
        let symbol = resolve(&forest, "Main.elm", "foo", 1).unwrap();
        assert_eq!(symbol.uri, uri("App.elm"));
        assert_eq!(symbol.kind, SymbolKind::Function);
        let app = forest.get_by_uri(&uri("App.elm")).unwrap();
        let start = app.text().find("foo =").unwrap() as u32;
        assert_eq!(symbol.range.start, start);
        assert_eq!(&app.text()[symbol.range.start as usize..symbol.range.end as usize], "foo = \"\"");
    }

    #[test]
    fn test_let_binding_shadows_parameter() {
        let forest = forest(&[("Main.elm", "f x = let x = 1 in x\n")]);
        let symbol = resolve(&forest, "Main.elm", "x", 2).unwrap();
        let file = forest.get_by_uri(&uri("Main.elm")).unwrap();
        assert_eq!(file.tree.node(symbol.node).kind(), SyntaxKind::ValueDeclaration);
        assert!(symbol.local);
    }

    #[test]
    fn test_alias_shadowing_last_import_wins() {
        let forest = forest(&[
            ("Foo.elm", "module Foo exposing (..)\nbar = 1\n"),
            ("FooExtra.elm", "module FooExtra exposing (..)\nbar = 2\n"),
            ("Main.elm", "import Foo as F\nimport FooExtra as F\nx = F.bar\n"),
        ]);
        let symbol = resolve(&forest, "Main.elm", "bar", 0).unwrap();
        assert_eq!(symbol.module, "FooExtra");
    }

    #[test]
    fn test_alias_shadowing_is_strict() {
        let forest = forest(&[
            ("Foo.elm", "module Foo exposing (..)\nbar = 1\n"),
            ("FooExtra.elm", "module FooExtra exposing (..)\nbaz = 2\n"),
            ("Main.elm", "import Foo as F\nimport FooExtra as F\nx = F.bar\n"),
        ]);
        assert!(resolve(&forest, "Main.elm", "bar", 0).is_none());
    }

    #[test]
    fn test_exposing_list_gating() {
        let forest = forest(&[
            ("M.elm", "module M exposing (shown)\nshown = 1\nhidden = 2\nuse = hidden\n"),
            (
                "Main.elm",
                "import M exposing (shown, hidden)\na = hidden\nb = M.hidden\nc = M.shown\n",
            ),
        ]);
        assert!(resolve(&forest, "Main.elm", "hidden", 1).is_none());
        assert!(resolve(&forest, "Main.elm", "hidden", 2).is_none());
        assert_eq!(resolve(&forest, "Main.elm", "shown", 1).unwrap().module, "M");
        // a module always sees its own declarations
        assert_eq!(resolve(&forest, "M.elm", "hidden", 1).unwrap().module, "M");
    }

    #[test]
    fn test_explicit_exposing_beats_wildcard() {
        let forest = forest(&[
            ("A.elm", "module A exposing (..)\nvalue = 1\n"),
            ("B.elm", "module B exposing (..)\nvalue = 2\n"),
            ("Main.elm", "import A exposing (value)\nimport B exposing (..)\nx = value\n"),
        ]);
        assert_eq!(resolve(&forest, "Main.elm", "value", 1).unwrap().module, "A");
    }

    #[test]
    fn test_implicit_imports() {
        let forest = forest(&[(
            "Main.elm",
            "x = Just (List.map identity [ 1 + 2 ])\ny : Cmd msg\ny = Cmd.none\n",
        )]);
        assert_eq!(resolve(&forest, "Main.elm", "Just", 0).unwrap().module, "Maybe");
        assert_eq!(resolve(&forest, "Main.elm", "map", 0).unwrap().module, "List");
        assert_eq!(resolve(&forest, "Main.elm", "identity", 0).unwrap().module, "Basics");
        let plus = resolve(&forest, "Main.elm", "+", 0).unwrap();
        assert_eq!(plus.kind, SymbolKind::Operator);
        assert_eq!(resolve(&forest, "Main.elm", "Cmd", 0).unwrap().module, "Platform.Cmd");
        assert_eq!(resolve(&forest, "Main.elm", "none", 0).unwrap().module, "Platform.Cmd");
    }

    #[test]
    fn test_qualifier_segment_resolves_to_module() {
        let forest = forest(&[("Main.elm", "x = List.map\n")]);
        let symbol = resolve(&forest, "Main.elm", "List", 0).unwrap();
        assert_eq!(symbol.kind, SymbolKind::Module);
        assert_eq!(symbol.name, "List");
    }

    #[test]
    fn test_each_qualifier_segment_names_its_own_module() {
        let forest = forest(&[("Main.elm", "import Platform.Cmd\nx = Platform.Cmd.none\n")]);
        let outer = resolve(&forest, "Main.elm", "Platform", 1).unwrap();
        assert_eq!(outer.kind, SymbolKind::Module);
        assert_eq!(outer.name, "Platform");
        let inner = resolve(&forest, "Main.elm", "Cmd", 1).unwrap();
        assert_eq!(inner.kind, SymbolKind::Module);
        assert_eq!(inner.name, "Platform.Cmd");
    }

    #[test]
    fn test_constructor_needs_exposed_constructors() {
        let forest = forest(&[
            ("Shape.elm", "module Shape exposing (Shape(..), Hidden)\ntype Shape = Circle\ntype Hidden = Secret\n"),
            ("Main.elm", "import Shape exposing (..)\na = Circle\nb = Secret\n"),
        ]);
        assert_eq!(
            resolve(&forest, "Main.elm", "Circle", 0).unwrap().kind,
            SymbolKind::UnionConstructor
        );
        assert!(resolve(&forest, "Main.elm", "Secret", 0).is_none());
    }

    #[test]
    fn test_type_variables_bind_at_first_occurrence() {
        let forest = forest(&[("Main.elm", "f : a -> List a\nf x = [ x ]\n")]);
        let first = resolve(&forest, "Main.elm", "a", 0).unwrap();
        let second = resolve(&forest, "Main.elm", "a", 1).unwrap();
        assert_eq!(first.kind, SymbolKind::TypeVariable);
        assert!(first.same_as(&second));
    }

    #[test]
    fn test_field_resolves_to_alias() {
        let forest = forest(&[(
            "Main.elm",
            "type alias Model = { count : Int, name : String }\n\nget : Model -> Int\nget model = model.count\n",
        )]);
        let symbol = resolve(&forest, "Main.elm", "count", 1).unwrap();
        assert_eq!(symbol.kind, SymbolKind::Field);
        assert_eq!(symbol.parent.as_deref(), Some("Model"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let forest = forest(&[("Main.elm", "f x = let y = x in y\n")]);
        let a = resolve(&forest, "Main.elm", "y", 1);
        let b = resolve(&forest, "Main.elm", "y", 1);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_visible_values_include_locals_and_imports() {
        let forest = forest(&[("Main.elm", "f arg =\n    arg\n")]);
        let file = forest.get_by_uri(&uri("Main.elm")).unwrap();
        let offset = file.text().rfind("arg").unwrap() as u32;
        let names: Vec<String> = Resolver::new(&forest)
            .visible_values(file, offset)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names[0], "arg");
        assert!(names.contains(&"f".to_string()));
        assert!(names.contains(&"identity".to_string()));
        assert!(names.contains(&"Just".to_string()));
    }
}
