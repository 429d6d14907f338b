// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The type oracle boundary and the built-in coercion table.
//!
//! Resolution consults the type system exclusively through the
//! [`TypeOracle`] trait: canonicalizing declared descriptors, and
//! answering "does type A implicitly coerce to type B". The shipped
//! [`TypeRegistry`] implements the subset of the production coercion
//! matrix the built-in catalog needs; deployments with richer type
//! systems supply their own oracle.

use std::fmt;

use trellis_repr::{ScalarType, TypeSignature};

/// The resolution engine's view of the type system.
pub trait TypeOracle: fmt::Debug + Send + Sync {
    /// Canonicalizes a declared descriptor to a concrete type, or `None`
    /// if the descriptor still mentions unresolved type variables.
    fn resolve_type(&self, descriptor: &TypeSignature) -> Option<ScalarType>;

    /// Reports whether a value of type `from` implicitly coerces to type
    /// `to`. Reflexive; `unknown` coerces to anything.
    fn is_coercible(&self, from: &ScalarType, to: &ScalarType) -> bool;

    /// Reports whether coercing `from` to `to` changes only the value's
    /// representation, leaving comparison and ordering semantics intact
    /// (e.g. a `varchar` length widening).
    fn is_type_only_coercion(&self, from: &ScalarType, to: &ScalarType) -> bool;
}

/// The built-in, table-driven [`TypeOracle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeRegistry;

impl TypeRegistry {
    /// Constructs the built-in oracle.
    pub fn new() -> TypeRegistry {
        TypeRegistry
    }

    fn can_cast_implicit(&self, from: &ScalarType, to: &ScalarType) -> bool {
        use ScalarType::*;
        if from == to || from.is_unknown() {
            return true;
        }
        match (from, to) {
            (Int16, Int32 | Int64 | Numeric | Float32 | Float64) => true,
            (Int32, Int64 | Numeric | Float64) => true,
            (Int64, Numeric | Float64) => true,
            (Float32, Float64) => true,
            (Numeric, Float64) => true,
            (Date, Timestamp) => true,
            (VarChar { .. }, String) => true,
            (
                VarChar {
                    max_length: Some(from_len),
                },
                VarChar { max_length: to_len },
            ) => to_len.map_or(true, |to_len| to_len >= *from_len),
            // Container coercion is elementwise.
            (Array(from_element), Array(to_element)) => {
                self.can_cast_implicit(from_element, to_element)
            }
            (
                Map {
                    key: from_key,
                    value: from_value,
                },
                Map {
                    key: to_key,
                    value: to_value,
                },
            ) => {
                self.can_cast_implicit(from_key, to_key)
                    && self.can_cast_implicit(from_value, to_value)
            }
            _ => false,
        }
    }
}

impl TypeOracle for TypeRegistry {
    fn resolve_type(&self, descriptor: &TypeSignature) -> Option<ScalarType> {
        descriptor.to_scalar()
    }

    fn is_coercible(&self, from: &ScalarType, to: &ScalarType) -> bool {
        self.can_cast_implicit(from, to)
    }

    fn is_type_only_coercion(&self, from: &ScalarType, to: &ScalarType) -> bool {
        use ScalarType::*;
        if from == to {
            return true;
        }
        match (from, to) {
            (VarChar { .. }, String) => true,
            (
                VarChar {
                    max_length: Some(from_len),
                },
                VarChar { max_length: to_len },
            ) => to_len.map_or(true, |to_len| to_len >= *from_len),
            (Array(from_element), Array(to_element)) => {
                self.is_type_only_coercion(from_element, to_element)
            }
            (
                Map {
                    key: from_key,
                    value: from_value,
                },
                Map {
                    key: to_key,
                    value: to_value,
                },
            ) => {
                self.is_type_only_coercion(from_key, to_key)
                    && self.is_type_only_coercion(from_value, to_value)
            }
            _ => false,
        }
    }
}
