//
// resolve/imports.rs
//
// Module-level scope of a file: its own top-level declarations and the
// imports (implicit and explicit) that make other modules visible
//

use std::collections::HashMap;

use crate::forest::SourceFile;
use crate::syntax::ast::{self, ExposedItem, ExposedKind, Exposing};
use crate::syntax::{NodeId, SyntaxKind, TextRange};

use super::symbol::{Symbol, SymbolKind};

/// Name spaces a reference can be looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Lower-case values: functions, ports
    Value,
    /// Union constructors and record alias constructors
    Constructor,
    /// Union types and type aliases
    Type,
    Operator,
}

/// Imports every file receives without writing them.
///
/// `(module, alias, exposed items)`; `None` exposes everything.
const IMPLICIT_IMPORTS: &[(&str, Option<&str>, Option<&[&str]>)] = &[
    ("Basics", None, None),
    ("List", None, Some(&["List", "(::)"])),
    ("Maybe", None, Some(&["Maybe(..)"])),
    ("Result", None, Some(&["Result(..)"])),
    ("String", None, Some(&["String"])),
    ("Char", None, Some(&["Char"])),
    ("Tuple", None, Some(&[])),
    ("Debug", None, Some(&[])),
    ("Platform", None, Some(&["Program"])),
    ("Platform.Cmd", Some("Cmd"), Some(&["Cmd"])),
    ("Platform.Sub", Some("Sub"), Some(&["Sub"])),
];

/// One import in effect for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module: String,
    /// Prefix qualified references use: the alias, or the module name
    pub qualifier: String,
    pub exposing: Option<Exposing>,
    /// The `import` clause, `None` for implicit imports
    pub clause: Option<NodeId>,
    pub range: Option<TextRange>,
}

impl ImportEntry {
    fn explicit(import: ast::Import) -> Self {
        Self {
            qualifier: import.qualifier().to_string(),
            module: import.module,
            exposing: import.exposing,
            clause: Some(import.node),
            range: Some(import.range),
        }
    }

    fn implicit(module: &str, alias: Option<&str>, exposed: Option<&[&str]>) -> Self {
        let exposing = match exposed {
            None => Exposing::All,
            Some(items) => Exposing::Items(items.iter().map(|item| implicit_item(item)).collect()),
        };
        Self {
            module: module.to_string(),
            qualifier: alias.unwrap_or(module).to_string(),
            exposing: Some(exposing),
            clause: None,
            range: None,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.clause.is_none()
    }

    /// Whether this import's exposing list names `name` in `namespace`.
    /// Constructors are checked through their owning type.
    pub fn exposes(&self, namespace: Namespace, symbol: &Symbol) -> bool {
        let Some(exposing) = &self.exposing else {
            return false;
        };
        exposes(exposing, namespace, symbol)
    }
}

fn implicit_item(text: &str) -> ExposedItem {
    let (name, kind) = if let Some(op) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        (op, ExposedKind::Operator)
    } else if let Some(ty) = text.strip_suffix("(..)") {
        (ty, ExposedKind::Type { constructors: true })
    } else if text.starts_with(char::is_uppercase) {
        (text, ExposedKind::Type { constructors: false })
    } else {
        (text, ExposedKind::Value)
    };
    ExposedItem {
        name: name.to_string(),
        kind,
        node: NodeId(0),
        range: TextRange::default(),
    }
}

/// Whether `exposing` makes `symbol` visible in `namespace`.
pub fn exposes(exposing: &Exposing, namespace: Namespace, symbol: &Symbol) -> bool {
    match namespace {
        Namespace::Value => exposing.exposes_value(&symbol.name),
        Namespace::Type => exposing.exposes_type(&symbol.name),
        Namespace::Operator => exposing.exposes_operator(&symbol.name),
        Namespace::Constructor => match (&symbol.kind, &symbol.parent) {
            (SymbolKind::UnionConstructor, Some(owner)) => exposing.exposes_constructors_of(owner),
            (SymbolKind::TypeAlias, _) => exposing.exposes_type(&symbol.name),
            _ => false,
        },
    }
}

/// Top-level declarations and imports of one file.
#[derive(Debug, Clone)]
pub struct FileScope {
    pub module: String,
    pub exposing: Exposing,
    values: HashMap<String, Symbol>,
    constructors: HashMap<String, Symbol>,
    types: HashMap<String, Symbol>,
    operators: HashMap<String, Symbol>,
    /// Implicit imports first, then explicit ones in source order
    pub imports: Vec<ImportEntry>,
}

impl FileScope {
    pub fn build(file: &SourceFile) -> Self {
        let mut scope = FileScope {
            module: file.module_name.clone(),
            exposing: file.exposing.clone(),
            values: HashMap::new(),
            constructors: HashMap::new(),
            types: HashMap::new(),
            operators: HashMap::new(),
            imports: Vec::new(),
        };

        for item in file.tree.root().child_nodes() {
            match item.kind() {
                SyntaxKind::ValueDeclaration | SyntaxKind::PortAnnotation => {
                    if let Some(name) = ast::name_token(item) {
                        let symbol = Symbol::new(SymbolKind::Function, file, item, name);
                        scope.values.entry(symbol.name.clone()).or_insert(symbol);
                    }
                }
                SyntaxKind::TypeDeclaration => {
                    let Some(name) = ast::name_token(item) else {
                        continue;
                    };
                    let type_name = name.text();
                    for variant in item.children_of(SyntaxKind::UnionVariant) {
                        if let Some(ctor) = ast::name_token(variant) {
                            let symbol =
                                Symbol::new(SymbolKind::UnionConstructor, file, variant, ctor)
                                    .with_parent(type_name);
                            scope.constructors.entry(symbol.name.clone()).or_insert(symbol);
                        }
                    }
                    let symbol = Symbol::new(SymbolKind::UnionType, file, item, name);
                    scope.types.entry(symbol.name.clone()).or_insert(symbol);
                }
                SyntaxKind::TypeAliasDeclaration => {
                    let Some(name) = ast::name_token(item) else {
                        continue;
                    };
                    let symbol = Symbol::new(SymbolKind::TypeAlias, file, item, name);
                    if is_record_alias(item) {
                        scope
                            .constructors
                            .entry(symbol.name.clone())
                            .or_insert_with(|| symbol.clone());
                    }
                    scope.types.entry(symbol.name.clone()).or_insert(symbol);
                }
                SyntaxKind::InfixDeclaration => {
                    if let Some(op) = ast::name_token(item) {
                        let symbol = Symbol::new(SymbolKind::Operator, file, item, op);
                        scope.operators.entry(symbol.name.clone()).or_insert(symbol);
                    }
                }
                _ => {}
            }
        }

        scope.imports = IMPLICIT_IMPORTS
            .iter()
            .filter(|(module, _, _)| *module != file.module_name)
            .map(|(module, alias, exposed)| ImportEntry::implicit(module, *alias, *exposed))
            .chain(ast::imports(&file.tree).into_iter().map(ImportEntry::explicit))
            .collect();
        scope
    }

    fn table(&self, namespace: Namespace) -> &HashMap<String, Symbol> {
        match namespace {
            Namespace::Value => &self.values,
            Namespace::Constructor => &self.constructors,
            Namespace::Type => &self.types,
            Namespace::Operator => &self.operators,
        }
    }

    /// Own top-level declaration, whether exposed or not.
    pub fn top_level(&self, namespace: Namespace, name: &str) -> Option<&Symbol> {
        self.table(namespace).get(name)
    }

    /// Declaration visible to importers of this module.
    pub fn exported(&self, namespace: Namespace, name: &str) -> Option<&Symbol> {
        self.top_level(namespace, name)
            .filter(|symbol| exposes(&self.exposing, namespace, symbol))
    }

    /// Every top-level declaration in `namespace`, in no particular order.
    pub fn all(&self, namespace: Namespace) -> impl Iterator<Item = &Symbol> {
        self.table(namespace).values()
    }

    /// Explicit imports only.
    pub fn explicit_imports(&self) -> impl Iterator<Item = &ImportEntry> {
        self.imports.iter().filter(|i| !i.is_implicit())
    }
}

/// `type alias X = { ... }` also declares a record constructor `X`.
pub fn is_record_alias(alias: crate::syntax::SyntaxNode<'_>) -> bool {
    alias
        .child(SyntaxKind::TypeExpression)
        .is_some_and(|body| {
            let mut parts = body.child_nodes();
            matches!(parts.next().map(|n| n.kind()), Some(SyntaxKind::RecordType))
                && parts.next().is_none()
        })
}
