// SPDX-License-Identifier: Apache-2.0

//! Descriptor of an instrumented native function.

use std::fmt;

use crate::paths::Path;
use crate::types::{PathContext, TypeDesc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    /// Source module (translation unit) the function lives in.
    pub module: String,
    /// Mangled symbol name.
    pub name: String,
    /// Demangled name, when available.
    pub demangled: Option<String>,
    /// Full function type.
    pub ty: TypeDesc,
}

impl Function {
    pub fn new(module: impl Into<String>, name: impl Into<String>, ty: TypeDesc) -> Function {
        assert!(
            matches!(ty, TypeDesc::Function { .. }),
            "function descriptor requires a function type, got {}",
            ty
        );
        Function { module: module.into(), name: name.into(), demangled: None, ty }
    }

    pub fn with_demangled(mut self, demangled: impl Into<String>) -> Function {
        self.demangled = Some(demangled.into());
        self
    }

    /// All probeable paths of this function's signature.
    pub fn paths(&self) -> Vec<Path> {
        self.ty.paths(PathContext::Function)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.demangled {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_enumerate_signature() {
        let f = Function::new(
            "add.cpp",
            "_Z3addii",
            TypeDesc::function(TypeDesc::int(32), vec![TypeDesc::int(32), TypeDesc::int(32)]),
        )
        .with_demangled("add(int, int)");
        let encodings: Vec<String> = f.paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(encodings.len(), 7);
        assert_eq!(encodings[0], "Z.T-i32");
        assert_eq!(f.to_string(), "add(int, int)");
    }
}
