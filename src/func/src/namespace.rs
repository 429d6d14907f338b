// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The function namespace abstraction.
//!
//! A namespace serves the functions for a range of qualified names,
//! claimed by catalog/schema prefix. The built-in namespace is compiled
//! in; dynamic namespaces front an external catalog and are registered
//! from configuration via [`FunctionNamespaceFactory`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ResolutionError;
use crate::implementation::{
    AggregateImplementation, ScalarImplementation, WindowImplementation,
};
use crate::names::QualifiedFunctionName;
use crate::resolver::FunctionCandidate;
use crate::sig::{FunctionHandle, FunctionMetadata, Signature};

/// Identifies one transaction's view of one namespace's catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceTransactionId(Uuid);

impl NamespaceTransactionId {
    /// Issues a fresh transaction id.
    pub fn new() -> NamespaceTransactionId {
        NamespaceTransactionId(Uuid::new_v4())
    }
}

impl Default for NamespaceTransactionId {
    fn default() -> NamespaceTransactionId {
        NamespaceTransactionId::new()
    }
}

impl fmt::Display for NamespaceTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A manager serving the functions of one namespace.
///
/// Implementations must be safe for concurrent use: many query
/// compilations resolve functions simultaneously, with no coordinator.
pub trait FunctionNamespace: Send + Sync {
    /// Opens an isolated view of the namespace's catalog for one logical
    /// transaction.
    ///
    /// Namespaces without transactional state issue an id and otherwise
    /// ignore it.
    fn begin_transaction(&self) -> NamespaceTransactionId {
        NamespaceTransactionId::new()
    }

    /// Ends a transaction, discarding its view.
    fn commit(&self, _txn: NamespaceTransactionId) {}

    /// Aborts a transaction, discarding its view. Equivalent to
    /// [`FunctionNamespace::commit`]: function metadata supports
    /// snapshot reads only, so there is nothing to roll back.
    fn abort(&self, _txn: NamespaceTransactionId) {}

    /// Returns the declared functions sharing `name`.
    fn get_functions(
        &self,
        txn: Option<NamespaceTransactionId>,
        name: &QualifiedFunctionName,
    ) -> Result<Vec<FunctionCandidate>, ResolutionError>;

    /// Converts a fully bound signature produced by overload resolution
    /// into this namespace's opaque handle for the function.
    fn get_function_handle(
        &self,
        txn: Option<NamespaceTransactionId>,
        signature: &Signature,
    ) -> Result<FunctionHandle, ResolutionError>;

    /// Returns the metadata for a previously issued handle. Usable
    /// outside any transaction context.
    fn get_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, ResolutionError>;

    /// Builds (or returns the cached) scalar implementation for a handle.
    fn get_scalar_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, ResolutionError>;

    /// Builds (or returns the cached) aggregate implementation for a
    /// handle.
    fn get_aggregate_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError>;

    /// Builds (or returns the cached) window implementation for a
    /// handle.
    fn get_window_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<WindowImplementation>, ResolutionError>;
}

/// Creates [`FunctionNamespace`] instances from configuration
/// properties. Factories are registered once by name; configuration then
/// instantiates namespaces and assigns them prefixes.
pub trait FunctionNamespaceFactory: Send + Sync {
    /// The factory's unique name, as referenced by configuration.
    fn name(&self) -> &str;

    /// Instantiates a namespace from configuration properties.
    fn create(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn FunctionNamespace>, ResolutionError>;
}

/// Derives the metadata a [`FunctionCandidate`] advertises once its
/// signature has been resolved; shared by namespaces that keep richer
/// per-function records.
pub(crate) fn candidate_metadata(
    signature: &Signature,
    deterministic: bool,
    called_on_null_input: bool,
) -> FunctionMetadata {
    FunctionMetadata {
        name: signature.name.clone(),
        argument_types: signature.argument_types.clone(),
        return_type: signature.return_type.clone(),
        kind: signature.kind,
        deterministic,
        called_on_null_input,
    }
}

/// Convenience used by namespaces when a handle cannot be served because
/// the signature kind does not admit the requested implementation.
pub(crate) fn implementation_missing(signature: &Signature) -> ResolutionError {
    ResolutionError::FunctionImplementationMissing {
        signature: Box::new(signature.clone()),
    }
}
