// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Function signatures, bound type variables, handles, and metadata.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use trellis_repr::{ScalarType, TypeSignature};

use crate::names::{CatalogSchemaName, NamespaceSpecifier, QualifiedFunctionName};

/// The kind of a function.
///
/// Every consumer matches on this exhaustively; there is no implicit
/// subtyping between kinds. The one sanctioned crossover is that an
/// aggregate may be *adapted* for use as a window function, which the
/// specialization layer handles explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionKind {
    /// A scalar function: one output row per input row.
    Scalar,
    /// An aggregate function: one output row per group.
    Aggregate,
    /// A window function: one output row per input row, computed over a
    /// window frame.
    Window,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionKind::Scalar => f.write_str("scalar"),
            FunctionKind::Aggregate => f.write_str("aggregate"),
            FunctionKind::Window => f.write_str("window"),
        }
    }
}

/// A type variable declared by a generic signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVariableConstraint {
    /// The variable's name, unique within its signature.
    pub name: String,
}

impl TypeVariableConstraint {
    /// Constructs a constraint for the named variable.
    pub fn new(name: impl Into<String>) -> TypeVariableConstraint {
        TypeVariableConstraint { name: name.into() }
    }
}

impl fmt::Display for TypeVariableConstraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The declared shape of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    /// The function's qualified name.
    pub name: QualifiedFunctionName,
    /// The function's kind.
    pub kind: FunctionKind,
    /// The type variables this signature declares, in declaration order.
    /// Empty for monomorphic signatures.
    pub type_variable_constraints: Vec<TypeVariableConstraint>,
    /// The declared return type.
    pub return_type: TypeSignature,
    /// The declared argument types, in order.
    pub argument_types: Vec<TypeSignature>,
    /// Whether the final argument may be repeated zero or more times.
    pub variadic: bool,
}

impl Signature {
    /// Constructs a monomorphic signature of the given kind.
    pub fn exact(
        name: QualifiedFunctionName,
        kind: FunctionKind,
        argument_types: Vec<ScalarType>,
        return_type: ScalarType,
    ) -> Signature {
        Signature {
            name,
            kind,
            type_variable_constraints: Vec::new(),
            return_type: return_type.into(),
            argument_types: argument_types.into_iter().map(Into::into).collect(),
            variadic: false,
        }
    }

    /// Constructs a generic signature of the given kind.
    pub fn generic(
        name: QualifiedFunctionName,
        kind: FunctionKind,
        type_variables: Vec<&str>,
        argument_types: Vec<TypeSignature>,
        return_type: TypeSignature,
    ) -> Signature {
        Signature {
            name,
            kind,
            type_variable_constraints: type_variables
                .into_iter()
                .map(TypeVariableConstraint::new)
                .collect(),
            return_type,
            argument_types,
            variadic: false,
        }
    }

    /// Marks the final argument as variadic.
    pub fn with_variadic(mut self) -> Signature {
        self.variadic = true;
        self
    }

    /// Reports whether this signature is monomorphic: it declares no type
    /// variables, so it binds by (possibly coerced) equality alone.
    pub fn is_exact(&self) -> bool {
        self.type_variable_constraints.is_empty()
    }
}

impl fmt::Display for Signature {
    /// Renders the signature as `name(arg, ...):ret`.
    ///
    /// This rendering doubles as the deterministic tie-break key for
    /// otherwise interchangeable overloads, so it must be a total,
    /// injective function of the signature's types.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_variable_constraints.is_empty() {
            write!(
                f,
                "<{}>",
                self.type_variable_constraints.iter().join(",")
            )?;
        }
        write!(f, "({}", self.argument_types.iter().join(","))?;
        if self.variadic {
            f.write_str("...")?;
        }
        write!(f, "):{}", self.return_type)
    }
}

/// Type variable assignments produced by a successful signature binding.
///
/// Immutable once produced: the binder builds a fresh value per candidate
/// probe and publishes it only on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundVariables {
    bindings: BTreeMap<String, ScalarType>,
}

impl BoundVariables {
    /// Constructs an empty set of bindings.
    pub fn new() -> BoundVariables {
        BoundVariables::default()
    }

    /// Returns the type bound to the named variable, if any.
    pub fn type_variable(&self, name: &str) -> Option<&ScalarType> {
        self.bindings.get(name)
    }

    /// Binds `name` to `typ`, replacing any previous binding.
    pub fn set_type_variable(&mut self, name: impl Into<String>, typ: ScalarType) {
        self.bindings.insert(name.into(), typ);
    }

    /// Reports whether no variables are bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Substitutes `bound`'s assignments into `signature`, producing the
/// bound form used for handles and specialization keys.
///
/// The bound form declares no type variables of its own; every variable
/// the declared signature mentions must be present in `bound` (the binder
/// guarantees this by assigning `unknown` to variables whose only uses
/// were untyped arguments).
pub fn apply_bound_variables(signature: &Signature, bound: &BoundVariables) -> Signature {
    let lookup = |name: &str| bound.type_variable(name).cloned();
    Signature {
        name: signature.name.clone(),
        kind: signature.kind,
        type_variable_constraints: Vec::new(),
        return_type: signature.return_type.substitute(&lookup),
        argument_types: signature
            .argument_types
            .iter()
            .map(|typ| typ.substitute(&lookup))
            .collect(),
        variadic: signature.variadic,
    }
}

/// The identity a dynamic namespace's backing catalog assigns to one of
/// its functions: the qualified name plus the declared argument types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId {
    /// The function's qualified name.
    pub name: QualifiedFunctionName,
    /// The declared argument types.
    pub argument_types: Vec<TypeSignature>,
}

impl FunctionId {
    /// Derives the identity of the function a signature describes.
    pub fn from_signature(signature: &Signature) -> FunctionId {
        FunctionId {
            name: signature.name.clone(),
            argument_types: signature.argument_types.clone(),
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name, self.argument_types.iter().join(","))
    }
}

/// An opaque reference to a resolved function.
///
/// A handle names a function without carrying its implementation; the
/// specialization layer turns a handle back into an executable
/// implementation on demand. Handles compare structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionHandle {
    /// A function in the ambient (built-in) namespace, identified by its
    /// fully bound signature.
    Static {
        /// The bound signature.
        signature: Signature,
    },
    /// A function in a dynamic namespace, identified by the id its
    /// backing catalog assigned.
    Dynamic {
        /// The namespace that issued the handle.
        namespace: CatalogSchemaName,
        /// The catalog-assigned function identity.
        id: FunctionId,
        /// The catalog-assigned version, if the catalog versions its
        /// functions.
        version: Option<u64>,
    },
}

impl FunctionHandle {
    /// Returns the namespace that owns this handle.
    pub fn namespace(&self) -> NamespaceSpecifier {
        match self {
            FunctionHandle::Static { .. } => NamespaceSpecifier::Ambient,
            FunctionHandle::Dynamic { namespace, .. } => {
                NamespaceSpecifier::Catalog(namespace.clone())
            }
        }
    }

    /// Returns the bound signature, for static handles.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            FunctionHandle::Static { signature } => Some(signature),
            FunctionHandle::Dynamic { .. } => None,
        }
    }
}

impl fmt::Display for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionHandle::Static { signature } => signature.fmt(f),
            FunctionHandle::Dynamic { id, version, .. } => {
                id.fmt(f)?;
                if let Some(version) = version {
                    write!(f, "@{}", version)?;
                }
                Ok(())
            }
        }
    }
}

/// Descriptive metadata for a resolved function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionMetadata {
    /// The function's qualified name.
    pub name: QualifiedFunctionName,
    /// The declared argument types.
    pub argument_types: Vec<TypeSignature>,
    /// The declared return type.
    pub return_type: TypeSignature,
    /// The function's kind.
    pub kind: FunctionKind,
    /// Whether the function always produces the same output for the same
    /// input.
    pub deterministic: bool,
    /// Whether the function is invoked on `NULL` input rather than
    /// short-circuiting to `NULL`.
    pub called_on_null_input: bool,
}
