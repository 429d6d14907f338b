// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Errors produced by function resolution and namespace registration.

use std::error::Error;
use std::fmt;

use itertools::Itertools;

use trellis_repr::ScalarType;

use crate::names::{CatalogSchemaName, CatalogSchemaPrefix, QualifiedFunctionName};
use crate::operator::OperatorType;
use crate::sig::Signature;

/// An error terminal for one resolution request.
///
/// Every variant reflects either a query author error (wrong name or
/// types) or a misconfiguration; none is a transient fault, so callers
/// must not retry. The one passthrough is [`ResolutionError::Catalog`],
/// which surfaces a dynamic namespace's backing-catalog failure
/// unchanged so that "truly absent" stays distinguishable from "catalog
/// unavailable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No candidate bound, even with coercion, or no namespace claims the
    /// name.
    FunctionNotFound {
        /// The name as presented by the caller.
        name: QualifiedFunctionName,
        /// The actual argument types presented.
        arg_types: Vec<ScalarType>,
        /// Every candidate's declared signature, for diagnostics.
        candidates: Vec<Signature>,
    },
    /// Two or more irreducible candidates survived disambiguation.
    AmbiguousFunctionCall {
        /// The name as presented by the caller.
        name: QualifiedFunctionName,
        /// The actual argument types presented.
        arg_types: Vec<ScalarType>,
        /// The surviving candidates' bound signatures.
        candidates: Vec<Signature>,
    },
    /// The signature resolves, but no runtime implementation can be
    /// built for it.
    FunctionImplementationMissing {
        /// The signature that failed to specialize.
        signature: Box<Signature>,
    },
    /// Operator resolution failed; carries the operator identity and
    /// argument types for diagnostics.
    OperatorNotFound {
        /// The operator.
        op: OperatorType,
        /// The actual argument types presented.
        arg_types: Vec<ScalarType>,
        /// For casts, the requested result type.
        return_type: Option<ScalarType>,
    },
    /// No registered namespace claims the qualified name.
    NamespaceNotFound {
        /// The name whose namespace could not be routed.
        name: QualifiedFunctionName,
    },
    /// The textual name was neither bare nor a full
    /// catalog.schema.function reference.
    InvalidFunctionName {
        /// The offending name.
        name: String,
    },
    /// A dynamic namespace was asked for functions outside a transaction.
    TransactionRequired {
        /// The namespace that requires a transaction.
        namespace: CatalogSchemaName,
    },
    /// A dynamic namespace's backing catalog failed; surfaced unchanged.
    Catalog(CatalogError),
    /// A registration-time configuration defect.
    Registration(FunctionRegistrationError),
}

impl ResolutionError {
    fn fmt_arg_types(arg_types: &[ScalarType]) -> String {
        arg_types.iter().join(", ")
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FunctionNotFound {
                name,
                arg_types,
                candidates,
            } => {
                if candidates.is_empty() {
                    write!(f, "function {} not registered", name)
                } else {
                    write!(
                        f,
                        "unexpected parameters ({}) for function {}; expected: {}",
                        Self::fmt_arg_types(arg_types),
                        name,
                        candidates.iter().join(", "),
                    )
                }
            }
            Self::AmbiguousFunctionCall {
                name,
                arg_types,
                candidates,
            } => write!(
                f,
                "could not choose a best candidate for function {}({}); \
                 explicit type casts must be added; candidates: {}",
                name,
                Self::fmt_arg_types(arg_types),
                candidates.iter().join(", "),
            ),
            Self::FunctionImplementationMissing { signature } => {
                write!(f, "no implementation found for {}", signature)
            }
            Self::OperatorNotFound {
                op: OperatorType::Cast,
                arg_types,
                return_type: Some(return_type),
            } => match arg_types.as_slice() {
                [from] => write!(f, "cannot cast {} to {}", from, return_type),
                _ => write!(
                    f,
                    "cannot cast ({}) to {}",
                    Self::fmt_arg_types(arg_types),
                    return_type
                ),
            },
            Self::OperatorNotFound {
                op,
                arg_types,
                return_type,
            } => {
                write!(
                    f,
                    "operator {} cannot be applied to {}",
                    op,
                    Self::fmt_arg_types(arg_types),
                )?;
                if let Some(return_type) = return_type {
                    write!(f, " returning {}", return_type)?;
                }
                Ok(())
            }
            Self::NamespaceNotFound { name } => {
                write!(f, "cannot find function namespace for function {}", name)
            }
            Self::InvalidFunctionName { name } => write!(
                f,
                "non-builtin functions must be referenced by three parts \
                 (catalog.schema.function), found: {}",
                name
            ),
            Self::TransactionRequired { namespace } => write!(
                f,
                "function namespace {} requires a transaction",
                namespace
            ),
            Self::Catalog(e) => e.fmt(f),
            Self::Registration(e) => e.fmt(f),
        }
    }
}

impl Error for ResolutionError {}

impl From<CatalogError> for ResolutionError {
    fn from(e: CatalogError) -> ResolutionError {
        ResolutionError::Catalog(e)
    }
}

impl From<FunctionRegistrationError> for ResolutionError {
    fn from(e: FunctionRegistrationError) -> ResolutionError {
        ResolutionError::Registration(e)
    }
}

/// A configuration defect detected while registering namespaces or
/// functions. Fatal at load time; never recoverable at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRegistrationError {
    /// The exact prefix is already claimed by another namespace.
    NamespaceAlreadyRegistered {
        /// The contested prefix.
        prefix: CatalogSchemaPrefix,
    },
    /// A factory with this name is already registered.
    FactoryAlreadyRegistered {
        /// The contested factory name.
        name: String,
    },
    /// No factory with this name is registered.
    FactoryNotFound {
        /// The requested factory name.
        name: String,
    },
    /// The namespace already declares a function with this signature.
    DuplicateSignature {
        /// The duplicated signature.
        signature: Box<Signature>,
    },
    /// The name would be served by both an aggregate and a
    /// scalar-or-window function.
    MixedFunctionKinds {
        /// The contested name.
        name: QualifiedFunctionName,
    },
}

impl fmt::Display for FunctionRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NamespaceAlreadyRegistered { prefix } => write!(
                f,
                "a function namespace is already registered for prefix {}",
                prefix
            ),
            Self::FactoryAlreadyRegistered { name } => write!(
                f,
                "function namespace factory {} is already registered",
                name
            ),
            Self::FactoryNotFound { name } => {
                write!(f, "no function namespace factory named {}", name)
            }
            Self::DuplicateSignature { signature } => {
                write!(f, "function {} is already registered", signature)
            }
            Self::MixedFunctionKinds { name } => write!(
                f,
                "{} is registered as both an aggregate and a scalar or window function",
                name
            ),
        }
    }
}

impl Error for FunctionRegistrationError {}

/// A failure reported by a dynamic namespace's backing catalog.
///
/// These originate outside this crate and pass through resolution
/// unreinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The backing catalog could not be reached or timed out.
    Unavailable {
        /// The namespace whose catalog failed.
        namespace: CatalogSchemaName,
        /// The transport layer's own description of the failure.
        detail: String,
    },
    /// The backing catalog returned data this crate cannot interpret.
    Corrupt {
        /// The namespace whose catalog failed.
        namespace: CatalogSchemaName,
        /// A description of the malformed response.
        detail: String,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unavailable { namespace, detail } => {
                write!(f, "function catalog {} unavailable: {}", namespace, detail)
            }
            Self::Corrupt { namespace, detail } => write!(
                f,
                "function catalog {} returned malformed data: {}",
                namespace, detail
            ),
        }
    }
}

impl Error for CatalogError {}

#[cfg(test)]
mod tests {
    use trellis_repr::ScalarType;

    use super::ResolutionError;
    use crate::names::QualifiedFunctionName;
    use crate::operator::OperatorType;
    use crate::sig::{FunctionKind, Signature};

    #[test]
    fn test_not_found_messages() {
        let name = QualifiedFunctionName::builtin("foo");
        let empty = ResolutionError::FunctionNotFound {
            name: name.clone(),
            arg_types: vec![ScalarType::Int32],
            candidates: vec![],
        };
        assert_eq!(empty.to_string(), "function foo not registered");

        let with_candidates = ResolutionError::FunctionNotFound {
            name: name.clone(),
            arg_types: vec![ScalarType::Int32, ScalarType::String],
            candidates: vec![Signature::exact(
                name,
                FunctionKind::Scalar,
                vec![ScalarType::String],
                ScalarType::Int32,
            )],
        };
        assert_eq!(
            with_candidates.to_string(),
            "unexpected parameters (integer, string) for function foo; \
             expected: foo(string):integer"
        );
    }

    #[test]
    fn test_cast_not_found_message() {
        let e = ResolutionError::OperatorNotFound {
            op: OperatorType::Cast,
            arg_types: vec![ScalarType::Uuid],
            return_type: Some(ScalarType::Int32),
        };
        assert_eq!(e.to_string(), "cannot cast uuid to integer");
    }
}
