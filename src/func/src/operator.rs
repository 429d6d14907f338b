// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! SQL operators, modeled as hidden functions in the ambient namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::names::QualifiedFunctionName;

/// The prefix under which operators register their backing functions.
/// Names with this prefix are unwritable in SQL, so operator functions
/// can never collide with user-visible function names.
pub(crate) const OPERATOR_PREFIX: &str = "$operator$";

/// A SQL operator that resolves through the function machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorType {
    /// Binary `+`.
    Add,
    /// Binary `-`.
    Subtract,
    /// Binary `*`.
    Multiply,
    /// Binary `/`.
    Divide,
    /// Binary `%`.
    Modulus,
    /// Unary `-`.
    Negate,
    /// `=`.
    Equal,
    /// `<>`.
    NotEqual,
    /// `<`.
    LessThan,
    /// `<=`.
    LessThanOrEqual,
    /// `>`.
    GreaterThan,
    /// `>=`.
    GreaterThanOrEqual,
    /// `CAST(x AS t)`.
    Cast,
}

impl OperatorType {
    /// All operators, for registration and introspection.
    pub const ALL: &'static [OperatorType] = &[
        OperatorType::Add,
        OperatorType::Subtract,
        OperatorType::Multiply,
        OperatorType::Divide,
        OperatorType::Modulus,
        OperatorType::Negate,
        OperatorType::Equal,
        OperatorType::NotEqual,
        OperatorType::LessThan,
        OperatorType::LessThanOrEqual,
        OperatorType::GreaterThan,
        OperatorType::GreaterThanOrEqual,
        OperatorType::Cast,
    ];

    fn mangled(&self) -> &'static str {
        match self {
            OperatorType::Add => "add",
            OperatorType::Subtract => "subtract",
            OperatorType::Multiply => "multiply",
            OperatorType::Divide => "divide",
            OperatorType::Modulus => "modulus",
            OperatorType::Negate => "negate",
            OperatorType::Equal => "equal",
            OperatorType::NotEqual => "not_equal",
            OperatorType::LessThan => "less_than",
            OperatorType::LessThanOrEqual => "less_than_or_equal",
            OperatorType::GreaterThan => "greater_than",
            OperatorType::GreaterThanOrEqual => "greater_than_or_equal",
            OperatorType::Cast => "cast",
        }
    }

    /// The ambient-namespace function name this operator resolves
    /// through.
    pub fn function_name(&self) -> QualifiedFunctionName {
        QualifiedFunctionName::builtin(format!("{}{}", OPERATOR_PREFIX, self.mangled()))
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperatorType::Add => f.write_str("+"),
            OperatorType::Subtract => f.write_str("-"),
            OperatorType::Multiply => f.write_str("*"),
            OperatorType::Divide => f.write_str("/"),
            OperatorType::Modulus => f.write_str("%"),
            OperatorType::Negate => f.write_str("-"),
            OperatorType::Equal => f.write_str("="),
            OperatorType::NotEqual => f.write_str("<>"),
            OperatorType::LessThan => f.write_str("<"),
            OperatorType::LessThanOrEqual => f.write_str("<="),
            OperatorType::GreaterThan => f.write_str(">"),
            OperatorType::GreaterThanOrEqual => f.write_str(">="),
            OperatorType::Cast => f.write_str("CAST"),
        }
    }
}

/// The flavor of cast a [`crate::registry::FunctionRegistry::lookup_cast`]
/// call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastType {
    /// A cast that raises an error on conversion failure.
    Cast,
    /// A cast that yields `NULL` on conversion failure.
    TryCast,
}

impl CastType {
    /// The ambient-namespace function name this cast resolves through.
    pub fn cast_name(&self) -> QualifiedFunctionName {
        match self {
            CastType::Cast => OperatorType::Cast.function_name(),
            CastType::TryCast => {
                QualifiedFunctionName::builtin(format!("{}try_cast", OPERATOR_PREFIX))
            }
        }
    }

    /// Reports whether this cast is itself an operator, in which case a
    /// missing implementation reports as an operator error rather than a
    /// plain missing function.
    pub fn is_operator_type(&self) -> bool {
        matches!(self, CastType::Cast)
    }
}

#[cfg(test)]
mod tests {
    use super::{CastType, OperatorType};

    #[test]
    fn test_operator_function_names_are_hidden_names() {
        for op in OperatorType::ALL {
            let name = op.function_name();
            assert!(name.item.starts_with("$operator$"), "{}", name);
        }
        assert_eq!(
            CastType::Cast.cast_name(),
            OperatorType::Cast.function_name()
        );
        assert!(CastType::Cast.is_operator_type());
        assert!(!CastType::TryCast.is_operator_type());
    }
}
