//
// types/print.rs
//
// Rendering types the way they would be written in the context file
//

use std::collections::{HashMap, HashSet};

use crate::forest::SourceFile;
use crate::resolve::{Namespace, Resolver};

use super::ty::{Type, TypeVar, VarId};

/// Prints several types with one shared variable naming, so that `a` in
/// an expected type and `a` in a found type are the same variable.
pub struct TypePrinter<'r, 'a> {
    resolver: &'r Resolver<'a>,
    context: Option<&'a SourceFile>,
    names: HashMap<VarId, String>,
    used: HashSet<String>,
    next_letter: usize,
}

impl<'r, 'a> TypePrinter<'r, 'a> {
    pub fn new(resolver: &'r Resolver<'a>, context: Option<&'a SourceFile>) -> Self {
        Self {
            resolver,
            context,
            names: HashMap::new(),
            used: HashSet::new(),
            next_letter: 0,
        }
    }

    pub fn print(&mut self, ty: &Type) -> String {
        let mut out = String::new();
        self.write(ty, &mut out);
        out
    }

    fn write(&mut self, ty: &Type, out: &mut String) {
        match ty {
            Type::Var(var) => {
                let name = self.var_name(var);
                out.push_str(&name);
            }
            Type::Unit => out.push_str("()"),
            Type::Function { params, ret } => {
                for param in params {
                    self.write_wrapped(param, matches!(param, Type::Function { .. }), out);
                    out.push_str(" -> ");
                }
                self.write(ret, out);
            }
            Type::Record { fields, row } => {
                if fields.is_empty() && row.is_none() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                if let Some(row) = row {
                    let name = self.var_name(row);
                    out.push_str(&name);
                    out.push_str(" | ");
                }
                for (i, (name, field)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(" : ");
                    self.write(field, out);
                }
                out.push_str(" }");
            }
            Type::Union { module, name, args } => {
                out.push_str(&self.qualify(module, name));
                for arg in args {
                    out.push(' ');
                    let wrap = matches!(arg, Type::Function { .. })
                        || matches!(arg, Type::Union { args, .. } if !args.is_empty());
                    self.write_wrapped(arg, wrap, out);
                }
            }
            Type::Tuple(items) => {
                out.push_str("( ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(item, out);
                }
                out.push_str(" )");
            }
        }
    }

    fn write_wrapped(&mut self, ty: &Type, wrap: bool, out: &mut String) {
        if wrap {
            out.push('(');
            self.write(ty, out);
            out.push(')');
        } else {
            self.write(ty, out);
        }
    }

    fn var_name(&mut self, var: &TypeVar) -> String {
        if let Some(name) = self.names.get(&var.id) {
            return name.clone();
        }
        let base = match (&var.constraint, &var.name) {
            (_, Some(name)) if var.rigid => Some(name.clone()),
            (Some(constraint), _) => Some(constraint.name().to_string()),
            _ => None,
        };
        let name = match base {
            Some(base) => {
                let mut candidate = base.clone();
                let mut n = 1;
                while self.used.contains(&candidate) {
                    candidate = format!("{}{}", base, n);
                    n += 1;
                }
                candidate
            }
            None => loop {
                let candidate = letter_name(self.next_letter);
                self.next_letter += 1;
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            },
        };
        self.used.insert(name.clone());
        self.names.insert(var.id, name.clone());
        name
    }

    /// `name` when it is visible unqualified in the context file, else the
    /// shortest qualifier an import offers, else the full module path.
    fn qualify(&self, module: &str, name: &str) -> String {
        let Some(file) = self.context else {
            return name.to_string();
        };
        if file.module_name == module {
            return name.to_string();
        }
        let unqualified = self
            .resolver
            .resolve_unqualified(file, Namespace::Type, name)
            .is_some_and(|symbol| symbol.module == module);
        if unqualified {
            return name.to_string();
        }
        let qualifier = self.resolver.file_scope(&file.uri).and_then(|scope| {
            scope
                .imports
                .iter()
                .rev()
                .find(|i| i.module == module)
                .map(|i| i.qualifier.clone())
        });
        format!("{}.{}", qualifier.as_deref().unwrap_or(module), name)
    }
}

/// `a`..`z`, then `a1`..`z1`, and so on.
fn letter_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    match index / 26 {
        0 => letter.to_string(),
        n => format!("{}{}", letter, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules;
    use crate::forest::Forest;
    use crate::types::ty::Constraint;
    use tower_lsp::lsp_types::Url;

    fn var(id: VarId, constraint: Option<Constraint>) -> Type {
        Type::Var(TypeVar {
            id,
            constraint,
            name: None,
            rigid: false,
        })
    }

    fn print_in(text: &str, ty: &Type) -> String {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        let uri = Url::parse("file:///p/src/Main.elm").unwrap();
        forest.set_text(uri.clone(), true, true, text);
        let resolver = Resolver::new(&forest);
        let mut printer = TypePrinter::new(&resolver, forest.get_by_uri(&uri));
        printer.print(ty)
    }

    #[test]
    fn test_functions_and_vars() {
        let ty = Type::function(
            vec![
                Type::function(vec![var(7, None)], var(9, None)),
                Type::list(var(7, None)),
            ],
            Type::list(var(9, None)),
        );
        assert_eq!(print_in("x = 1\n", &ty), "(a -> b) -> List a -> List b");
    }

    #[test]
    fn test_constrained_vars_keep_their_class() {
        let ty = Type::function(
            vec![var(1, Some(Constraint::Number)), var(2, Some(Constraint::Number))],
            var(1, Some(Constraint::Number)),
        );
        assert_eq!(print_in("x = 1\n", &ty), "number -> number1 -> number");
    }

    #[test]
    fn test_union_args_and_records() {
        let maybe = Type::union("Maybe", "Maybe", vec![Type::list(Type::int())]);
        assert_eq!(print_in("x = 1\n", &maybe), "Maybe (List Int)");
        let record = Type::Record {
            fields: [("name".to_string(), Type::string())].into_iter().collect(),
            row: None,
        };
        assert_eq!(print_in("x = 1\n", &record), "{ name : String }");
        let tuple = Type::Tuple(vec![Type::int(), Type::Unit]);
        assert_eq!(print_in("x = 1\n", &tuple), "( Int, () )");
    }

    #[test]
    fn test_qualifies_by_context_imports() {
        let cmd = Type::union("Platform.Cmd", "Cmd", vec![var(0, None)]);
        assert_eq!(print_in("x = 1\n", &cmd), "Cmd a");
        let task = Type::union("Task", "Task", Vec::new());
        assert_eq!(print_in("import Task as T\nx = 1\n", &task), "T.Task");
        assert_eq!(print_in("x = 1\n", &task), "Task.Task");
    }
}
