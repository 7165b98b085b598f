// SPDX-License-Identifier: Apache-2.0

//! Type descriptors for instrumented functions and the context-sensitive
//! enumeration of probeable access paths.

use std::fmt;

use crate::paths::Path;

/// Where in a function signature a type is being enumerated from. Primitive
/// argument values are passed by copy and cannot be observed after the call,
/// so they yield no paths in `Arg` position; behind a pointer they can.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathContext {
    Function,
    Result,
    Arg,
    Dereffed,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Void,
    Int { bits: u32 },
    Real { bits: u32 },
    Pointer(Box<TypeDesc>),
    Array { elem: Box<TypeDesc>, len: usize },
    Struct { name: String, elems: Vec<TypeDesc> },
    Function { ret: Box<TypeDesc>, args: Vec<TypeDesc> },
    Unknown,
}

impl TypeDesc {
    pub fn int(bits: u32) -> TypeDesc {
        TypeDesc::Int { bits }
    }

    pub fn real(bits: u32) -> TypeDesc {
        TypeDesc::Real { bits }
    }

    pub fn function(ret: TypeDesc, args: Vec<TypeDesc>) -> TypeDesc {
        TypeDesc::Function { ret: Box::new(ret), args }
    }

    /// All probeable access paths reachable from this type in the given
    /// context.
    pub fn paths(&self, ctx: PathContext) -> Vec<Path> {
        match self {
            TypeDesc::Void | TypeDesc::Unknown => Vec::new(),
            // Arrays carry no element probes yet.
            // TODO: enumerate fixed-length array elements like struct fields.
            TypeDesc::Array { .. } => Vec::new(),
            TypeDesc::Int { bits } => {
                if ctx == PathContext::Arg {
                    return Vec::new();
                }
                let mut out = vec![Path::Leaf(self.clone())];
                if matches!(bits, 16 | 32 | 64) {
                    let half = TypeDesc::int(bits / 2);
                    for p in half.paths(ctx) {
                        out.push(Path::SplitLeft(Box::new(p)));
                    }
                    for p in half.paths(ctx) {
                        out.push(Path::SplitRight(Box::new(p)));
                    }
                }
                out
            }
            TypeDesc::Real { .. } => {
                if ctx == PathContext::Arg {
                    Vec::new()
                } else {
                    vec![Path::Leaf(self.clone())]
                }
            }
            TypeDesc::Pointer(pointee) => {
                if ctx != PathContext::Arg {
                    return Vec::new();
                }
                pointee
                    .paths(PathContext::Dereffed)
                    .into_iter()
                    .map(|p| Path::Deref(Box::new(p)))
                    .collect()
            }
            TypeDesc::Struct { elems, .. } => {
                let mut out = Vec::new();
                for (i, elem) in elems.iter().enumerate() {
                    for p in elem.paths(ctx) {
                        out.push(Path::StructElem(i, Box::new(p)));
                    }
                }
                out
            }
            TypeDesc::Function { ret, args } => {
                if ctx != PathContext::Function {
                    return Vec::new();
                }
                let mut out = Vec::new();
                for p in ret.paths(PathContext::Result) {
                    out.push(Path::Result(Box::new(p)));
                }
                for (i, arg) in args.iter().enumerate() {
                    for p in arg.paths(PathContext::Arg) {
                        out.push(Path::Argument(i, Box::new(p)));
                    }
                }
                out
            }
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Int { bits } => write!(f, "i{}", bits),
            TypeDesc::Real { bits } => write!(f, "f{}", bits),
            TypeDesc::Pointer(pointee) => write!(f, "{}*", pointee),
            TypeDesc::Array { elem, len } => write!(f, "[{} x {}]", len, elem),
            TypeDesc::Struct { name, .. } => write!(f, "struct {}", name),
            TypeDesc::Function { ret, args } => {
                write!(f, "{}(", ret)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            TypeDesc::Unknown => write!(f, "unknown"),
        }
    }
}
