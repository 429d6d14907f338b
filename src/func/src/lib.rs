// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Function resolution and specialization for Trellis's SQL layer.
//!
//! Given a possibly-qualified function name and the types of the
//! arguments at a call site, this crate deterministically selects the
//! concrete scalar, aggregate, or window function the call binds to,
//! across the built-in function catalog and any number of registered
//! dynamic (catalog-hosted) function namespaces.
//!
//! The pieces, bottom up:
//!
//!   * [`typeconv`]: the [`TypeOracle`](typeconv::TypeOracle) boundary
//!     to the type system, and the built-in coercion table.
//!   * [`binder`]: unification of one declared signature against actual
//!     argument types, producing bound type variables.
//!   * [`resolver`]: the three-phase overload search with its
//!     specificity and null-handling tie-breaks.
//!   * [`builtins`]: the ambient namespace, its registration rules, and
//!     the two-level specialization cache that builds each
//!     implementation at most once.
//!   * [`invoked`]: dynamic namespaces over an external function
//!     catalog, with transaction-scoped views.
//!   * [`registry`]: the [`FunctionRegistry`] facade the planner and
//!     execution layers talk to.
//!
//! Everything is safe for concurrent use from many simultaneous query
//! compilations; see the individual modules for the specific guarantees.

pub mod binder;
pub mod builtins;
pub mod cache;
pub mod error;
pub mod implementation;
pub mod invoked;
pub mod names;
pub mod namespace;
pub mod operator;
pub mod registry;
pub mod resolver;
pub mod sig;
pub mod typeconv;

pub use crate::error::{CatalogError, FunctionRegistrationError, ResolutionError};
pub use crate::implementation::{
    AggregateImplementation, FunctionImplementation, ScalarImplementation, WindowImplementation,
};
pub use crate::names::{
    CatalogSchemaName, CatalogSchemaPrefix, NamespaceSpecifier, PartialFunctionName,
    QualifiedFunctionName,
};
pub use crate::namespace::{FunctionNamespace, FunctionNamespaceFactory, NamespaceTransactionId};
pub use crate::operator::{CastType, OperatorType};
pub use crate::registry::{FunctionRegistry, TransactionId};
pub use crate::sig::{
    BoundVariables, FunctionHandle, FunctionId, FunctionKind, FunctionMetadata, Signature,
    TypeVariableConstraint,
};
