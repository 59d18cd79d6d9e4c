//
// types/unify.rs
//
// Substitution, unification and let-generalization
//

use std::collections::HashMap;

use indexmap::IndexMap;

use super::ty::{Constraint, Type, TypeVar, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyError {
    Mismatch,
    /// A variable would have to contain itself
    Occurs,
    /// A concrete type does not satisfy a variable's constraint
    Constraint(Constraint),
    /// An annotation variable was asked to be something specific
    Rigid,
}

#[derive(Debug, Clone)]
struct VarInfo {
    constraint: Option<Constraint>,
    name: Option<String>,
    rigid: bool,
    level: u32,
}

/// A polymorphic type: `vars` are instantiated afresh at every use.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub vars: Vec<VarId>,
    pub ty: Type,
}

impl Scheme {
    pub fn mono(ty: Type) -> Self {
        Self {
            vars: Vec::new(),
            ty,
        }
    }
}

/// Mutable solver state for one inference pass.
#[derive(Debug, Default)]
pub struct Subst {
    bindings: HashMap<VarId, Type>,
    vars: Vec<VarInfo>,
    level: u32,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.level += 1;
    }

    pub fn exit(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    fn new_var(&mut self, constraint: Option<Constraint>, name: Option<String>, rigid: bool) -> Type {
        let id = self.vars.len() as VarId;
        self.vars.push(VarInfo {
            constraint,
            name: name.clone(),
            rigid,
            level: self.level,
        });
        Type::Var(TypeVar {
            id,
            constraint,
            name,
            rigid,
        })
    }

    pub fn fresh(&mut self) -> Type {
        self.new_var(None, None, false)
    }

    pub fn fresh_constrained(&mut self, constraint: Constraint) -> Type {
        self.new_var(Some(constraint), None, false)
    }

    /// Variable written as `name` in an annotation.
    pub fn named(&mut self, name: &str, rigid: bool) -> Type {
        self.new_var(Constraint::from_var_name(name), Some(name.to_string()), rigid)
    }

    /// Current metadata of a variable.
    fn var(&self, id: VarId) -> Option<TypeVar> {
        let info = self.vars.get(id as usize)?;
        Some(TypeVar {
            id,
            constraint: info.constraint,
            name: info.name.clone(),
            rigid: info.rigid,
        })
    }

    fn is_rigid(&self, id: VarId) -> bool {
        self.vars.get(id as usize).is_some_and(|v| v.rigid)
    }

    fn constraint(&self, id: VarId) -> Option<Constraint> {
        self.vars.get(id as usize).and_then(|v| v.constraint)
    }

    /// Follow bindings at the head of `ty`; records absorb solved rows.
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Var(var) = &current {
            let next = match self.bindings.get(&var.id) {
                Some(bound) => bound.clone(),
                None => break,
            };
            current = next;
        }
        let Type::Record {
            fields,
            row: Some(row),
        } = &current
        else {
            return current;
        };
        let Some(bound) = self.bindings.get(&row.id) else {
            return current;
        };
        let mut fields = fields.clone();
        match self.resolve(bound) {
            Type::Record {
                fields: more,
                row: tail,
            } => {
                for (name, field) in more {
                    fields.entry(name).or_insert(field);
                }
                Type::Record { fields, row: tail }
            }
            Type::Var(tail) => Type::Record {
                fields,
                row: Some(tail),
            },
            _ => Type::Record { fields, row: None },
        }
    }

    /// Apply the substitution everywhere inside `ty`.
    pub fn zonk(&self, ty: &Type) -> Type {
        let resolved = self.resolve(ty);
        resolved.map_vars(&mut |var| match self.bindings.get(&var.id) {
            Some(bound) => self.zonk(bound),
            None => self
                .var(var.id)
                .map(Type::Var)
                .unwrap_or_else(|| Type::Var(var.clone())),
        })
    }

    fn occurs(&self, id: VarId, ty: &Type) -> bool {
        self.zonk(ty).vars().iter().any(|v| v.id == id)
    }

    /// Pull every free variable of `ty` down to `level` so it is not
    /// generalized beyond the binding it escaped into.
    fn adjust_levels(&mut self, ty: &Type, level: u32) {
        for var in self.zonk(ty).vars() {
            if let Some(info) = self.vars.get_mut(var.id as usize) {
                info.level = info.level.min(level);
            }
        }
    }

    fn bind(&mut self, id: VarId, ty: Type) -> Result<(), UnifyError> {
        if let Type::Var(other) = ty.clone() {
            if other.id == id {
                return Ok(());
            }
            let mine = self.constraint(id);
            let theirs = self.constraint(other.id);
            if self.is_rigid(other.id) {
                if let Some(required) = mine {
                    if !theirs.is_some_and(|c| c.implies(required)) {
                        return Err(UnifyError::Constraint(required));
                    }
                }
            } else {
                let combined = match (mine, theirs) {
                    (Some(a), Some(b)) => Some(a.combine(b).ok_or(UnifyError::Constraint(a))?),
                    (a, b) => a.or(b),
                };
                let level = self.level_of(id).min(self.level_of(other.id));
                if let Some(info) = self.vars.get_mut(other.id as usize) {
                    info.constraint = combined;
                    info.level = level;
                }
            }
            self.bindings.insert(id, ty);
            return Ok(());
        }
        if self.occurs(id, &ty) {
            return Err(UnifyError::Occurs);
        }
        if let Some(constraint) = self.constraint(id) {
            self.satisfy(&ty, constraint)?;
        }
        let level = self.level_of(id);
        self.adjust_levels(&ty, level);
        self.bindings.insert(id, ty);
        Ok(())
    }

    fn level_of(&self, id: VarId) -> u32 {
        self.vars.get(id as usize).map(|v| v.level).unwrap_or(0)
    }

    /// Require `ty` to belong to `constraint`.
    pub fn satisfy(&mut self, ty: &Type, constraint: Constraint) -> Result<(), UnifyError> {
        use Constraint::*;
        let fail = Err(UnifyError::Constraint(constraint));
        match self.resolve(ty) {
            Type::Var(var) => {
                let current = self.constraint(var.id);
                if self.is_rigid(var.id) {
                    return if current.is_some_and(|c| c.implies(constraint)) {
                        Ok(())
                    } else {
                        fail
                    };
                }
                let combined = match current {
                    Some(c) => c.combine(constraint).ok_or(UnifyError::Constraint(constraint))?,
                    None => constraint,
                };
                if let Some(info) = self.vars.get_mut(var.id as usize) {
                    info.constraint = Some(combined);
                }
                Ok(())
            }
            t if t.is_union("Basics", "Int") || t.is_union("Basics", "Float") => {
                if matches!(constraint, Number | Comparable) {
                    Ok(())
                } else {
                    fail
                }
            }
            t if t.is_union("String", "String") => {
                if constraint == Number {
                    fail
                } else {
                    Ok(())
                }
            }
            t if t.is_union("Char", "Char") => {
                if constraint == Comparable {
                    Ok(())
                } else {
                    fail
                }
            }
            Type::Union { module, name, args } if module == "List" && name == "List" => {
                match (constraint, args.first()) {
                    (Appendable, _) => Ok(()),
                    (Comparable | CompAppend, Some(element)) => self.satisfy(element, Comparable),
                    _ => fail,
                }
            }
            Type::Tuple(items) if constraint == Comparable => {
                for item in &items {
                    self.satisfy(item, Comparable)?;
                }
                Ok(())
            }
            _ => fail,
        }
    }

    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), UnifyError> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        match (a, b) {
            (Type::Var(x), Type::Var(y)) if x.id == y.id => Ok(()),
            (Type::Var(x), other) if !self.is_rigid(x.id) => self.bind(x.id, other),
            (other, Type::Var(y)) if !self.is_rigid(y.id) => self.bind(y.id, other),
            (Type::Var(_), _) | (_, Type::Var(_)) => Err(UnifyError::Rigid),
            (Type::Unit, Type::Unit) => Ok(()),
            (
                Type::Function {
                    params: p1,
                    ret: r1,
                },
                Type::Function {
                    params: p2,
                    ret: r2,
                },
            ) => {
                let n = p1.len().min(p2.len());
                for (x, y) in p1.iter().zip(&p2) {
                    self.unify(x, y)?;
                }
                // partial application: the longer side keeps its extra params
                if p1.len() > n {
                    self.unify(&Type::function(p1[n..].to_vec(), *r1), &r2)
                } else if p2.len() > n {
                    self.unify(&r1, &Type::function(p2[n..].to_vec(), *r2))
                } else {
                    self.unify(&r1, &r2)
                }
            }
            (
                Type::Union {
                    module: m1,
                    name: n1,
                    args: a1,
                },
                Type::Union {
                    module: m2,
                    name: n2,
                    args: a2,
                },
            ) if m1 == m2 && n1 == n2 && a1.len() == a2.len() => {
                for (x, y) in a1.iter().zip(&a2) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (Type::Tuple(x), Type::Tuple(y)) if x.len() == y.len() => {
                for (a, b) in x.iter().zip(&y) {
                    self.unify(a, b)?;
                }
                Ok(())
            }
            (Type::Record { fields: f1, row: r1 }, Type::Record { fields: f2, row: r2 }) => {
                self.unify_records(f1, r1, f2, r2)
            }
            _ => Err(UnifyError::Mismatch),
        }
    }

    fn unify_records(
        &mut self,
        f1: IndexMap<String, Type>,
        r1: Option<TypeVar>,
        f2: IndexMap<String, Type>,
        r2: Option<TypeVar>,
    ) -> Result<(), UnifyError> {
        for (name, t1) in &f1 {
            if let Some(t2) = f2.get(name) {
                self.unify(t1, t2)?;
            }
        }
        let only1: IndexMap<String, Type> = f1
            .iter()
            .filter(|(name, _)| !f2.contains_key(*name))
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect();
        let only2: IndexMap<String, Type> = f2
            .iter()
            .filter(|(name, _)| !f1.contains_key(*name))
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect();

        match (r1, r2) {
            (None, None) => {
                if only1.is_empty() && only2.is_empty() {
                    Ok(())
                } else {
                    Err(UnifyError::Mismatch)
                }
            }
            (Some(r1), None) => {
                if !only1.is_empty() {
                    return Err(UnifyError::Mismatch);
                }
                self.bind_row(&r1, only2, None)
            }
            (None, Some(r2)) => {
                if !only2.is_empty() {
                    return Err(UnifyError::Mismatch);
                }
                self.bind_row(&r2, only1, None)
            }
            (Some(r1), Some(r2)) if r1.id == r2.id => {
                if only1.is_empty() && only2.is_empty() {
                    Ok(())
                } else {
                    Err(UnifyError::Mismatch)
                }
            }
            (Some(r1), Some(r2)) => {
                let tail = match self.fresh() {
                    Type::Var(tail) => tail,
                    _ => return Err(UnifyError::Mismatch),
                };
                self.bind_row(&r1, only2, Some(tail.clone()))?;
                self.bind_row(&r2, only1, Some(tail))
            }
        }
    }

    /// Solve a row variable to `fields` extended by `tail`.
    fn bind_row(
        &mut self,
        row: &TypeVar,
        fields: IndexMap<String, Type>,
        tail: Option<TypeVar>,
    ) -> Result<(), UnifyError> {
        if fields.is_empty() {
            if let Some(tail) = tail {
                return self.unify(&Type::Var(row.clone()), &Type::Var(tail));
            }
        }
        if self.is_rigid(row.id) {
            return Err(UnifyError::Rigid);
        }
        self.bind(row.id, Type::Record { fields, row: tail })
    }

    /// Quantify the variables of `ty` created inside the current level.
    pub fn generalize(&self, ty: &Type) -> Scheme {
        let ty = self.zonk(ty);
        let vars = ty
            .vars()
            .into_iter()
            .filter(|v| self.level_of(v.id) > self.level)
            .map(|v| v.id)
            .collect();
        Scheme { vars, ty }
    }

    pub fn instantiate_scheme(&mut self, scheme: &Scheme) -> Type {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let mut fresh: HashMap<VarId, Type> = HashMap::new();
        let ty = self.zonk(&scheme.ty);
        ty.map_vars(&mut |var| {
            if !scheme.vars.contains(&var.id) {
                return Type::Var(var.clone());
            }
            fresh
                .entry(var.id)
                .or_insert_with(|| self.new_var(var.constraint, None, false))
                .clone()
        })
    }

    /// Fresh copy of a closed type from another declaration: every variable
    /// becomes a new flexible one.
    pub fn instantiate(&mut self, ty: &Type) -> Type {
        let mut fresh: HashMap<VarId, Type> = HashMap::new();
        ty.map_vars(&mut |var| {
            fresh
                .entry(var.id)
                .or_insert_with(|| self.new_var(var.constraint, None, false))
                .clone()
        })
    }
}
