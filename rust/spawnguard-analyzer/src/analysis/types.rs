//! Resolved type information handed over by the type checker.
//!
//! Only the parts the resolver needs are modelled: enough structure to follow
//! a named type to its underlying form, read a struct's field order, and tell
//! an interface apart from a concrete type.

use crate::analysis::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fully qualified name of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypePath {
    pub module: String,
    pub name: String,
}

impl TypePath {
    pub fn new(module: &str, name: &str) -> Self {
        Self { module: module.to_string(), name: name.to_string() }
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// A resolved type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ty {
    /// Declared type, possibly instantiated: Pair[int, string]
    Named {
        path: TypePath,
        #[serde(default)]
        args: Vec<Ty>,
    },
    Pointer { elem: Box<Ty> },
    /// Struct with fields in declaration order
    Struct { fields: Vec<FieldDecl> },
    /// Method set with no fixed implementation
    Interface {
        #[serde(default)]
        methods: Vec<String>,
    },
    Func,
    Slice { elem: Box<Ty> },
    Array { elem: Box<Ty>, len: u64 },
    Map { key: Box<Ty>, value: Box<Ty> },
    /// Predeclared type: int, string, error, ...
    Basic { name: String },
    /// Type parameter of a generic declaration
    Param { name: String },
}

impl Ty {
    pub fn named(module: &str, name: &str) -> Self {
        Ty::Named { path: TypePath::new(module, name), args: Vec::new() }
    }

    pub fn pointer(elem: Ty) -> Self {
        Ty::Pointer { elem: Box::new(elem) }
    }

    /// Strip any number of pointer indirections.
    pub fn deref(&self) -> &Ty {
        let mut cur = self;
        while let Ty::Pointer { elem } = cur {
            cur = elem;
        }
        cur
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Named { path, args } if args.is_empty() => write!(f, "{}", path),
            Ty::Named { path, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}[{}]", path, args.join(", "))
            }
            Ty::Pointer { elem } => write!(f, "*{}", elem),
            Ty::Struct { fields } => {
                let fields: Vec<&str> = fields.iter().map(|fd| fd.name.as_str()).collect();
                write!(f, "struct{{{}}}", fields.join("; "))
            }
            Ty::Interface { methods } => write!(f, "interface{{{}}}", methods.join("; ")),
            Ty::Func => write!(f, "func"),
            Ty::Slice { elem } => write!(f, "[]{}", elem),
            Ty::Array { elem, len } => write!(f, "[{}]{}", len, elem),
            Ty::Map { key, value } => write!(f, "map[{}]{}", key, value),
            Ty::Basic { name } | Ty::Param { name } => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Ty,
}

/// A named type declaration: `type Name[T] underlying`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub module: String,
    pub name: String,
    #[serde(default)]
    pub generic_params: Vec<String>,
    pub underlying: Ty,
    #[serde(default)]
    pub span: Span,
}

impl TypeDecl {
    pub fn path(&self) -> TypePath {
        TypePath::new(&self.module, &self.name)
    }
}

/// Type declarations visible to one unit, keyed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    decls: HashMap<TypePath, TypeDecl>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_decls<'a>(decls: impl IntoIterator<Item = &'a TypeDecl>) -> Self {
        let mut table = Self::new();
        for decl in decls {
            table.insert(decl.clone());
        }
        table
    }

    pub fn insert(&mut self, decl: TypeDecl) {
        self.decls.insert(decl.path(), decl);
    }

    pub fn get(&self, path: &TypePath) -> Option<&TypeDecl> {
        self.decls.get(path)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Follow named types (instantiations collapse to their origin) down to
    /// the first non-named form. `None` when a name is not declared here or
    /// the chain never bottoms out.
    pub fn underlying<'a>(&'a self, ty: &'a Ty) -> Option<&'a Ty> {
        let mut cur = ty;
        for _ in 0..=self.decls.len() {
            match cur {
                Ty::Named { path, .. } => cur = &self.decls.get(path)?.underlying,
                Ty::Param { .. } => return None,
                other => return Some(other),
            }
        }
        None
    }

    /// Field list of a struct-shaped type, looking through names.
    pub fn struct_fields<'a>(&'a self, ty: &'a Ty) -> Option<&'a [FieldDecl]> {
        match self.underlying(ty)? {
            Ty::Struct { fields } => Some(fields),
            _ => None,
        }
    }

    /// Whether the value's static type dispatches dynamically. Pointers are
    /// looked through. `None` when the type cannot be resolved.
    pub fn is_interface(&self, ty: &Ty) -> Option<bool> {
        self.underlying(ty.deref())
            .map(|u| matches!(u, Ty::Interface { .. }))
    }
}
