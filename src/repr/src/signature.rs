// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scalar::ScalarType;

/// A declared type, as written in a function signature.
///
/// Unlike [`ScalarType`], a `TypeSignature` may mention type variables
/// declared by the enclosing signature, possibly nested inside container
/// types, as in `element_at(map(K, V), K): V`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeSignature {
    /// A fully concrete type.
    Concrete(ScalarType),
    /// A reference to a type variable declared by the enclosing signature.
    Variable(String),
    /// An array whose element type is itself a declared type.
    Array(Box<TypeSignature>),
    /// A map whose key and value types are themselves declared types.
    Map {
        /// The declared key type.
        key: Box<TypeSignature>,
        /// The declared value type.
        value: Box<TypeSignature>,
    },
}

impl TypeSignature {
    /// Constructs a type variable reference.
    pub fn variable(name: impl Into<String>) -> TypeSignature {
        TypeSignature::Variable(name.into())
    }

    /// Constructs an array descriptor over the given element descriptor.
    pub fn array(element: TypeSignature) -> TypeSignature {
        TypeSignature::Array(Box::new(element))
    }

    /// Constructs a map descriptor over the given key and value
    /// descriptors.
    pub fn map(key: TypeSignature, value: TypeSignature) -> TypeSignature {
        TypeSignature::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Reports whether this descriptor mentions no type variables.
    pub fn is_concrete(&self) -> bool {
        match self {
            TypeSignature::Concrete(_) => true,
            TypeSignature::Variable(_) => false,
            TypeSignature::Array(element) => element.is_concrete(),
            TypeSignature::Map { key, value } => key.is_concrete() && value.is_concrete(),
        }
    }

    /// Returns the names of the type variables mentioned by this
    /// descriptor, in order of first appearance, without duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeSignature::Concrete(_) => (),
            TypeSignature::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            TypeSignature::Array(element) => element.collect_variables(out),
            TypeSignature::Map { key, value } => {
                key.collect_variables(out);
                value.collect_variables(out);
            }
        }
    }

    /// Converts this descriptor to a [`ScalarType`], if it is fully
    /// concrete.
    pub fn to_scalar(&self) -> Option<ScalarType> {
        match self {
            TypeSignature::Concrete(typ) => Some(typ.clone()),
            TypeSignature::Variable(_) => None,
            TypeSignature::Array(element) => Some(ScalarType::array(element.to_scalar()?)),
            TypeSignature::Map { key, value } => {
                Some(ScalarType::map(key.to_scalar()?, value.to_scalar()?))
            }
        }
    }

    /// Rewrites this descriptor by replacing each type variable with the
    /// type returned by `lookup`, leaving variables for which `lookup`
    /// returns `None` in place.
    ///
    /// Containers whose contents become fully concrete collapse to
    /// [`TypeSignature::Concrete`], so descriptors that denote the same
    /// type compare equal.
    pub fn substitute<F>(&self, lookup: &F) -> TypeSignature
    where
        F: Fn(&str) -> Option<ScalarType>,
    {
        let out = match self {
            TypeSignature::Concrete(typ) => TypeSignature::Concrete(typ.clone()),
            TypeSignature::Variable(name) => match lookup(name) {
                Some(typ) => TypeSignature::Concrete(typ),
                None => TypeSignature::Variable(name.clone()),
            },
            TypeSignature::Array(element) => TypeSignature::array(element.substitute(lookup)),
            TypeSignature::Map { key, value } => {
                TypeSignature::map(key.substitute(lookup), value.substitute(lookup))
            }
        };
        match out.to_scalar() {
            Some(typ) => TypeSignature::Concrete(typ),
            None => out,
        }
    }
}

impl From<ScalarType> for TypeSignature {
    fn from(typ: ScalarType) -> TypeSignature {
        TypeSignature::Concrete(typ)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeSignature::Concrete(typ) => typ.fmt(f),
            TypeSignature::Variable(name) => f.write_str(name),
            TypeSignature::Array(element) => write!(f, "array({})", element),
            TypeSignature::Map { key, value } => write!(f, "map({}, {})", key, value),
        }
    }
}
