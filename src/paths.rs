// SPDX-License-Identifier: Apache-2.0

//! Access paths naming a probeable location in a function signature: the
//! result or an argument, through dereferences, struct fields and integer
//! bit-halves, down to a typed leaf.
//!
//! The string encoding (`Z.`, `A<i>.`, `S<i>.`, `L.`, `R.`, `D.`, `T-<ty>`)
//! is the stable identity of a path; structural equality coincides with it.

use std::fmt;

use crate::types::TypeDesc;
use crate::value::NumericDomain;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    /// Typed leaf, `T-<ty>`.
    Leaf(TypeDesc),
    /// Function result, `Z.`.
    Result(Box<Path>),
    /// Function argument `i`, `A<i>.`.
    Argument(usize, Box<Path>),
    /// Struct element `i`, `S<i>.`.
    StructElem(usize, Box<Path>),
    /// Lower half of a split integer, `L.`.
    SplitLeft(Box<Path>),
    /// Upper half of a split integer, `R.`.
    SplitRight(Box<Path>),
    /// Pointer dereference, `D.`.
    Deref(Box<Path>),
}

impl Path {
    /// The leaf type this path bottoms out in.
    pub fn leaf_type(&self) -> &TypeDesc {
        match self {
            Path::Leaf(ty) => ty,
            Path::Result(p)
            | Path::Argument(_, p)
            | Path::StructElem(_, p)
            | Path::SplitLeft(p)
            | Path::SplitRight(p)
            | Path::Deref(p) => p.leaf_type(),
        }
    }

    /// Whether this path probes the function result rather than an argument.
    pub fn is_result(&self) -> bool {
        matches!(self, Path::Result(_))
    }

    /// Numeric domain of the leaf. Panics on non-numeric leaves, which the
    /// path enumeration never produces.
    pub fn domain(&self) -> NumericDomain {
        match self.leaf_type() {
            TypeDesc::Int { .. } => NumericDomain::Integer,
            TypeDesc::Real { .. } => NumericDomain::Real,
            ty => panic!("path leaf {} has no numeric domain", ty),
        }
    }

    /// Bit width of the numeric leaf.
    pub fn leaf_bits(&self) -> u32 {
        match self.leaf_type() {
            TypeDesc::Int { bits } | TypeDesc::Real { bits } => *bits,
            ty => panic!("path leaf {} has no bit width", ty),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Leaf(ty) => write!(f, "T-{}", ty),
            Path::Result(p) => write!(f, "Z.{}", p),
            Path::Argument(i, p) => write!(f, "A{}.{}", i, p),
            Path::StructElem(i, p) => write!(f, "S{}.{}", i, p),
            Path::SplitLeft(p) => write!(f, "L.{}", p),
            Path::SplitRight(p) => write!(f, "R.{}", p),
            Path::Deref(p) => write!(f, "D.{}", p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result_leaf(ty: TypeDesc) -> Path {
        Path::Result(Box::new(Path::Leaf(ty)))
    }

    #[test]
    fn encoding_round_trips_identity() {
        let a = Path::Argument(
            1,
            Box::new(Path::Deref(Box::new(Path::StructElem(
                0,
                Box::new(Path::Leaf(TypeDesc::real(64))),
            )))),
        );
        assert_eq!(a.to_string(), "A1.D.S0.T-f64");
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, result_leaf(TypeDesc::real(64)));
    }

    #[test]
    fn leaf_accessors() {
        let p = Path::Result(Box::new(Path::SplitLeft(Box::new(Path::Leaf(
            TypeDesc::int(16),
        )))));
        assert!(p.is_result());
        assert_eq!(p.leaf_type(), &TypeDesc::int(16));
        assert_eq!(p.domain(), NumericDomain::Integer);
        assert_eq!(p.leaf_bits(), 16);
        assert!(!result_leaf(TypeDesc::real(32)).domain().eq(&NumericDomain::Integer));
    }
}
