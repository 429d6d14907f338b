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

/// The type of a concrete SQL value.
///
/// The set of types here is intentionally smaller than a full SQL type
/// system; the resolution engine only needs enough structure to exercise
/// coercion, container unification, and the `unknown` special case. The
/// full production type catalog plugs in behind the `TypeOracle` trait in
/// `trellis-func`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarType {
    /// The type of `TRUE` and `FALSE`.
    Bool,
    /// A 16-bit signed integer.
    Int16,
    /// A 32-bit signed integer.
    Int32,
    /// A 64-bit signed integer.
    Int64,
    /// A 32-bit floating point number.
    Float32,
    /// A 64-bit floating point number.
    Float64,
    /// An arbitrary-precision decimal number.
    Numeric,
    /// A date without a time component.
    Date,
    /// A time without a date component.
    Time,
    /// A date and time, without a timezone.
    Timestamp,
    /// A span of time.
    Interval,
    /// A variable-length byte string.
    Bytes,
    /// A variable-length string with no declared length bound.
    String,
    /// A variable-length string with an optional declared maximum length.
    VarChar {
        /// The maximum number of characters, if declared.
        max_length: Option<u32>,
    },
    /// A universally unique identifier.
    Uuid,
    /// The type of an untyped `NULL` literal.
    ///
    /// No value other than `NULL` ever has this type. During resolution it
    /// matches any declared parameter type without constraining type
    /// variables.
    Unknown,
    /// A variable-length array with elements of a uniform type.
    Array(Box<ScalarType>),
    /// A map with keys and values of uniform types.
    Map {
        /// The key type.
        key: Box<ScalarType>,
        /// The value type.
        value: Box<ScalarType>,
    },
}

impl ScalarType {
    /// Reports whether this is [`ScalarType::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, ScalarType::Unknown)
    }

    /// Constructs an array type with the given element type.
    pub fn array(element: ScalarType) -> ScalarType {
        ScalarType::Array(Box::new(element))
    }

    /// Constructs a map type with the given key and value types.
    pub fn map(key: ScalarType, value: ScalarType) -> ScalarType {
        ScalarType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Reports whether `self` and `other` have the same base type,
    /// ignoring type modifiers like `varchar` lengths.
    pub fn base_eq(&self, other: &ScalarType) -> bool {
        use ScalarType::*;
        match (self, other) {
            (VarChar { .. }, VarChar { .. }) => true,
            (Array(a), Array(b)) => a.base_eq(b),
            (
                Map {
                    key: ak, value: av, ..
                },
                Map {
                    key: bk, value: bv, ..
                },
            ) => ak.base_eq(bk) && av.base_eq(bv),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarType::Bool => f.write_str("boolean"),
            ScalarType::Int16 => f.write_str("smallint"),
            ScalarType::Int32 => f.write_str("integer"),
            ScalarType::Int64 => f.write_str("bigint"),
            ScalarType::Float32 => f.write_str("real"),
            ScalarType::Float64 => f.write_str("double"),
            ScalarType::Numeric => f.write_str("numeric"),
            ScalarType::Date => f.write_str("date"),
            ScalarType::Time => f.write_str("time"),
            ScalarType::Timestamp => f.write_str("timestamp"),
            ScalarType::Interval => f.write_str("interval"),
            ScalarType::Bytes => f.write_str("bytea"),
            ScalarType::String => f.write_str("string"),
            ScalarType::VarChar { max_length: None } => f.write_str("varchar"),
            ScalarType::VarChar {
                max_length: Some(n),
            } => write!(f, "varchar({})", n),
            ScalarType::Uuid => f.write_str("uuid"),
            ScalarType::Unknown => f.write_str("unknown"),
            ScalarType::Array(element) => write!(f, "array({})", element),
            ScalarType::Map { key, value } => write!(f, "map({}, {})", key, value),
        }
    }
}
