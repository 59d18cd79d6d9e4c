//
// types/ty.rs
//
// Type representation
//

use indexmap::IndexMap;

pub type VarId = u32;

/// Built-in type classes a type variable can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    Number,
    Comparable,
    Appendable,
    /// Both comparable and appendable
    CompAppend,
}

impl Constraint {
    /// Constraint implied by a type variable's name (`number`, `comparable1`).
    pub fn from_var_name(name: &str) -> Option<Self> {
        let base = name.trim_end_matches(|c: char| c.is_ascii_digit() || c == '_');
        match base {
            "number" => Some(Constraint::Number),
            "comparable" => Some(Constraint::Comparable),
            "appendable" => Some(Constraint::Appendable),
            "compappend" => Some(Constraint::CompAppend),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constraint::Number => "number",
            Constraint::Comparable => "comparable",
            Constraint::Appendable => "appendable",
            Constraint::CompAppend => "compappend",
        }
    }

    /// The constraint satisfying both, if any type can.
    pub fn combine(self, other: Constraint) -> Option<Constraint> {
        use Constraint::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Number, Comparable) | (Comparable, Number) => Some(Number),
            (Comparable, Appendable) | (Appendable, Comparable) => Some(CompAppend),
            (CompAppend, Comparable | Appendable) | (Comparable | Appendable, CompAppend) => {
                Some(CompAppend)
            }
            _ => None,
        }
    }

    /// Whether a variable restricted by `self` may stand where `required` is
    /// demanded.
    pub fn implies(self, required: Constraint) -> bool {
        self.combine(required) == Some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeVar {
    pub id: VarId,
    pub constraint: Option<Constraint>,
    /// Name written in an annotation, if any
    pub name: Option<String>,
    /// Bound by an annotation: may not be unified with anything but itself
    pub rigid: bool,
}

/// An inferred or declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Var(TypeVar),
    Unit,
    /// `a -> b -> c` is `Function { params: [a, b], ret: c }`
    Function { params: Vec<Type>, ret: Box<Type> },
    Record {
        fields: IndexMap<String, Type>,
        /// Extension variable of `{ r | ... }`
        row: Option<TypeVar>,
    },
    Union {
        module: String,
        name: String,
        args: Vec<Type>,
    },
    Tuple(Vec<Type>),
}

impl Type {
    /// Build a function type, flattening a function-typed result into the
    /// parameter list.
    pub fn function(mut params: Vec<Type>, ret: Type) -> Type {
        if params.is_empty() {
            return ret;
        }
        match ret {
            Type::Function {
                params: more,
                ret: inner,
            } => {
                params.extend(more);
                Type::Function { params, ret: inner }
            }
            ret => Type::Function {
                params,
                ret: Box::new(ret),
            },
        }
    }

    /// Placeholder for a node no inference pass has a type for.
    pub fn unknown() -> Type {
        Type::Var(TypeVar {
            id: VarId::MAX,
            constraint: None,
            name: None,
            rigid: false,
        })
    }

    pub fn union(module: &str, name: &str, args: Vec<Type>) -> Type {
        Type::Union {
            module: module.to_string(),
            name: name.to_string(),
            args,
        }
    }

    pub fn int() -> Type {
        Type::union("Basics", "Int", Vec::new())
    }

    pub fn float() -> Type {
        Type::union("Basics", "Float", Vec::new())
    }

    pub fn bool() -> Type {
        Type::union("Basics", "Bool", Vec::new())
    }

    pub fn string() -> Type {
        Type::union("String", "String", Vec::new())
    }

    pub fn char() -> Type {
        Type::union("Char", "Char", Vec::new())
    }

    pub fn list(element: Type) -> Type {
        Type::union("List", "List", vec![element])
    }

    pub fn is_union(&self, module: &str, name: &str) -> bool {
        matches!(self, Type::Union { module: m, name: n, .. } if m == module && n == name)
    }

    /// Field names of a record type, in declaration order.
    pub fn record_fields(&self) -> Option<Vec<String>> {
        match self {
            Type::Record { fields, .. } => Some(fields.keys().cloned().collect()),
            _ => None,
        }
    }

    /// Number of arguments a value of this type accepts.
    pub fn arity(&self) -> usize {
        match self {
            Type::Function { params, .. } => params.len(),
            _ => 0,
        }
    }

    /// Every type variable, in first-occurrence order, without duplicates.
    pub fn vars(&self) -> Vec<TypeVar> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<TypeVar>) {
        fn push(var: &TypeVar, out: &mut Vec<TypeVar>) {
            if !out.iter().any(|v| v.id == var.id) {
                out.push(var.clone());
            }
        }
        match self {
            Type::Var(var) => push(var, out),
            Type::Unit => {}
            Type::Function { params, ret } => {
                for param in params {
                    param.collect_vars(out);
                }
                ret.collect_vars(out);
            }
            Type::Record { fields, row } => {
                if let Some(row) = row {
                    push(row, out);
                }
                for field in fields.values() {
                    field.collect_vars(out);
                }
            }
            Type::Union { args, .. } => {
                for arg in args {
                    arg.collect_vars(out);
                }
            }
            Type::Tuple(items) => {
                for item in items {
                    item.collect_vars(out);
                }
            }
        }
    }

    /// Replace variables by id.
    pub fn map_vars(&self, f: &mut impl FnMut(&TypeVar) -> Type) -> Type {
        match self {
            Type::Var(var) => f(var),
            Type::Unit => Type::Unit,
            Type::Function { params, ret } => Type::function(
                params.iter().map(|p| p.map_vars(f)).collect(),
                ret.map_vars(f),
            ),
            Type::Record { fields, row } => {
                let fields: IndexMap<String, Type> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.map_vars(f)))
                    .collect();
                match row.as_ref().map(|row| f(row)) {
                    None => Type::Record { fields, row: None },
                    Some(Type::Var(row)) => Type::Record {
                        fields,
                        row: Some(row),
                    },
                    // the row was solved to a concrete record: merge it
                    Some(Type::Record {
                        fields: more,
                        row,
                    }) => {
                        let mut merged = more;
                        for (name, ty) in fields {
                            merged.insert(name, ty);
                        }
                        Type::Record {
                            fields: merged,
                            row,
                        }
                    }
                    Some(_) => Type::Record { fields, row: None },
                }
            }
            Type::Union { module, name, args } => Type::Union {
                module: module.clone(),
                name: name.clone(),
                args: args.iter().map(|a| a.map_vars(f)).collect(),
            },
            Type::Tuple(items) => Type::Tuple(items.iter().map(|i| i.map_vars(f)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(id: VarId) -> Type {
        Type::Var(TypeVar {
            id,
            constraint: None,
            name: None,
            rigid: false,
        })
    }

    #[test]
    fn test_function_flattens_result() {
        let f = Type::function(vec![var(0)], Type::function(vec![var(1)], var(2)));
        assert_eq!(f.arity(), 2);
        assert_eq!(Type::function(Vec::new(), Type::int()), Type::int());
    }

    #[test]
    fn test_constraint_lattice() {
        use Constraint::*;
        assert_eq!(Number.combine(Comparable), Some(Number));
        assert_eq!(Appendable.combine(Comparable), Some(CompAppend));
        assert_eq!(Number.combine(Appendable), None);
        assert!(Number.implies(Comparable));
        assert!(!Comparable.implies(Number));
        assert_eq!(Constraint::from_var_name("comparable2"), Some(Comparable));
        assert_eq!(Constraint::from_var_name("numbers"), None);
    }

    #[test]
    fn test_vars_in_first_occurrence_order() {
        let ty = Type::function(vec![var(3), Type::list(var(1))], var(3));
        let ids: Vec<VarId> = ty.vars().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
