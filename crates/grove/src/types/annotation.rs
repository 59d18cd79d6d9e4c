//
// types/annotation.rs
//
// Converting written types (annotations, variants, aliases) into `Type`
//

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::resolve::SymbolKind;
use crate::syntax::ast;
use crate::syntax::{SyntaxKind, SyntaxNode};

use super::infer::Infer;
use super::ty::Type;

/// Aliases expanding into aliases stop here; a cycle yields a variable.
const MAX_ALIAS_DEPTH: u32 = 32;

impl<'c, 'a> Infer<'c, 'a> {
    /// Convert a type node. `vars` maps variable names already seen in the
    /// same annotation; `rigid` marks new variables as annotation-bound.
    pub(super) fn convert(
        &mut self,
        node: SyntaxNode<'a>,
        vars: &mut HashMap<String, Type>,
        rigid: bool,
    ) -> Type {
        match node.kind() {
            SyntaxKind::TypeExpression => {
                let mut parts: Vec<Type> = node
                    .child_nodes()
                    .map(|part| self.convert(part, vars, rigid))
                    .collect();
                match parts.pop() {
                    Some(ret) => Type::function(parts, ret),
                    None => self.subst.fresh(),
                }
            }
            SyntaxKind::TypeVariable => match ast::name_of(node) {
                Some(name) => self.variable(name, vars, rigid),
                None => self.subst.fresh(),
            },
            SyntaxKind::TypeRef => self.type_ref(node, vars, rigid),
            SyntaxKind::RecordType => {
                let mut fields = IndexMap::new();
                for field in node.children_of(SyntaxKind::FieldType) {
                    let (Some(name), Some(ty)) = (
                        field.child(SyntaxKind::LowerIdent),
                        field.child(SyntaxKind::TypeExpression),
                    ) else {
                        continue;
                    };
                    let ty = self.convert(ty, vars, rigid);
                    fields.insert(name.text().to_string(), ty);
                }
                let row = node
                    .child(SyntaxKind::LowerIdent)
                    .map(|row| self.variable(row.text(), vars, rigid));
                match row {
                    Some(Type::Var(row)) => Type::Record {
                        fields,
                        row: Some(row),
                    },
                    _ => Type::Record { fields, row: None },
                }
            }
            SyntaxKind::TupleType => Type::Tuple(
                node.child_nodes()
                    .map(|item| self.convert(item, vars, rigid))
                    .collect(),
            ),
            SyntaxKind::UnitType => Type::Unit,
            _ => self.subst.fresh(),
        }
    }

    fn variable(&mut self, name: &str, vars: &mut HashMap<String, Type>, rigid: bool) -> Type {
        if let Some(ty) = vars.get(name) {
            return ty.clone();
        }
        let ty = self.subst.named(name, rigid);
        vars.insert(name.to_string(), ty.clone());
        ty
    }

    fn type_ref(
        &mut self,
        node: SyntaxNode<'a>,
        vars: &mut HashMap<String, Type>,
        rigid: bool,
    ) -> Type {
        let args: Vec<Type> = node
            .child_nodes()
            .map(|arg| self.convert(arg, vars, rigid))
            .collect();
        let checker = self.checker;
        let Some(symbol) = checker.resolver().resolve_reference(self.file, node) else {
            return self.subst.fresh();
        };
        match symbol.kind {
            SymbolKind::UnionType => Type::Union {
                module: symbol.module,
                name: symbol.name,
                args,
            },
            SymbolKind::TypeAlias => self.expand_alias(&symbol.uri, symbol.node, args),
            _ => self.subst.fresh(),
        }
    }

    /// Body of a type alias with its parameters replaced by `args`.
    pub(super) fn expand_alias(
        &mut self,
        uri: &tower_lsp::lsp_types::Url,
        alias: crate::syntax::NodeId,
        args: Vec<Type>,
    ) -> Type {
        let checker = self.checker;
        let Some(file) = checker.forest().get_by_uri(uri) else {
            return self.subst.fresh();
        };
        if self.alias_depth >= MAX_ALIAS_DEPTH {
            log::debug!("alias expansion too deep in {}", uri);
            return self.subst.fresh();
        }
        let alias = file.tree.node(alias);
        let Some(body) = alias.child(SyntaxKind::TypeExpression) else {
            return self.subst.fresh();
        };
        let mut params: HashMap<String, Type> = HashMap::new();
        let mut args = args.into_iter();
        for param in alias.children_of(SyntaxKind::TypeVariable) {
            let Some(name) = ast::name_of(param) else {
                continue;
            };
            let ty = args.next().unwrap_or_else(|| self.subst.fresh());
            params.insert(name.to_string(), ty);
        }

        let saved = std::mem::replace(&mut self.file, file);
        self.alias_depth += 1;
        let ty = self.convert(body, &mut params, false);
        self.alias_depth -= 1;
        self.file = saved;
        ty
    }
}

#[cfg(test)]
mod tests {
    use crate::core_modules;
    use crate::forest::Forest;
    use crate::syntax::SyntaxKind;
    use crate::types::TypeChecker;
    use tower_lsp::lsp_types::Url;

    fn annotation_of(text: &str, name: &str) -> String {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        let uri = Url::parse("file:///p/src/Main.elm").unwrap();
        forest.set_text(uri.clone(), true, true, text);
        let file = forest.get_by_uri(&uri).unwrap();
        let annotation = file
            .tree
            .root()
            .children_of(SyntaxKind::TypeAnnotation)
            .find(|a| crate::syntax::ast::name_of(*a) == Some(name))
            .unwrap();
        let checker = TypeChecker::new(&forest);
        let ty = checker.find_type(&uri, annotation.id());
        checker.type_to_string(&ty, &uri)
    }

    #[test]
    fn test_alias_expands_with_arguments() {
        let text = "type alias Pair a = ( a, a )\n\nswap : Pair Int -> Pair Int\nswap p = p\n";
        assert_eq!(annotation_of(text, "swap"), "( Int, Int ) -> ( Int, Int )");
    }

    #[test]
    fn test_record_rows_and_grouping() {
        let text = "get : { r | name : String } -> (String -> a) -> Maybe a\nget r f = Nothing\n";
        assert_eq!(
            annotation_of(text, "get"),
            "{ r | name : String } -> (String -> a) -> Maybe a"
        );
    }

    #[test]
    fn test_recursive_alias_terminates() {
        let text = "type alias Loop = Loop\n\nx : Loop\nx = x\n";
        let printed = annotation_of(text, "x");
        assert_eq!(printed.len(), 1);
    }
}
