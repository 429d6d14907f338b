// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Dynamic function namespaces backed by an external catalog.
//!
//! A dynamic namespace serves functions defined in a remote catalog
//! (for instance, SQL-defined routines stored in a metadata service).
//! Fetches are cache-fronted with a configurable TTL shared across
//! transactions, and each logical transaction additionally pins the
//! catalog view it first observed: within one transaction, a name's
//! candidate list and the handles assigned to them never change, no
//! matter what the backing catalog does meanwhile. Commit and abort
//! both simply discard the transaction's view; function metadata
//! supports snapshot reads only.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use trellis_repr::{ScalarType, TypeSignature};

use crate::cache::TtlCache;
use crate::error::{CatalogError, ResolutionError};
use crate::implementation::{
    AggregateImplementation, ScalarImplementation, WindowImplementation,
};
use crate::names::{CatalogSchemaName, QualifiedFunctionName};
use crate::namespace::{
    candidate_metadata, implementation_missing, FunctionNamespace, NamespaceTransactionId,
};
use crate::resolver::FunctionCandidate;
use crate::sig::{
    FunctionHandle, FunctionId, FunctionKind, FunctionMetadata, Signature,
};

/// Cache configuration for a dynamic namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceCacheConfig {
    /// How long a fetched candidate list stays fresh.
    pub function_cache_ttl: Duration,
    /// How long fetched metadata and implementations stay fresh.
    pub instance_cache_ttl: Duration,
    /// The maximum number of entries per cache.
    pub cache_capacity: usize,
}

impl Default for NamespaceCacheConfig {
    fn default() -> NamespaceCacheConfig {
        NamespaceCacheConfig {
            function_cache_ttl: Duration::from_secs(5 * 60),
            instance_cache_ttl: Duration::from_secs(8 * 60 * 60),
            cache_capacity: 1000,
        }
    }
}

/// A function served by a dynamic namespace's backing catalog.
///
/// Dynamic namespaces host scalar functions with concrete signatures;
/// aggregates and window functions remain built-in concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFunction {
    /// The declared (monomorphic, scalar) signature.
    pub signature: Signature,
    /// The catalog-assigned version, if the catalog versions functions.
    pub version: Option<u64>,
    /// Whether the function is deterministic.
    pub deterministic: bool,
    /// Whether the function is invoked on `NULL` input.
    pub called_on_null_input: bool,
    /// The function's SQL definition.
    pub body: String,
}

impl DynamicFunction {
    /// The catalog-assigned identity of this function.
    pub fn id(&self) -> FunctionId {
        FunctionId::from_signature(&self.signature)
    }

    /// The handle this namespace issues for the function.
    pub fn handle(&self, namespace: &CatalogSchemaName) -> FunctionHandle {
        FunctionHandle::Dynamic {
            namespace: namespace.clone(),
            id: self.id(),
            version: self.version,
        }
    }

    /// The metadata this function advertises.
    pub fn metadata(&self) -> FunctionMetadata {
        candidate_metadata(&self.signature, self.deterministic, self.called_on_null_input)
    }

    fn candidate(&self) -> FunctionCandidate {
        FunctionCandidate {
            signature: self.signature.clone(),
            called_on_null_input: self.called_on_null_input,
        }
    }
}

/// The transport to a dynamic namespace's backing catalog.
///
/// Failures surface to resolution callers unchanged (wrapped only as
/// [`ResolutionError::Catalog`]), so "function absent" and "catalog
/// unreachable" remain distinguishable. Timeout and retry policy belong
/// to the implementation.
pub trait FunctionCatalogClient: Send + Sync {
    /// Fetches the functions sharing `name`.
    fn fetch_functions(
        &self,
        name: &QualifiedFunctionName,
    ) -> Result<Vec<DynamicFunction>, CatalogError>;

    /// Fetches the metadata for a previously issued handle.
    fn fetch_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, CatalogError>;

    /// Fetches the implementation for a previously issued handle.
    fn fetch_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, CatalogError>;
}

/// One transaction's pinned view of the namespace's catalog: the
/// candidate lists it has observed and the handles assigned to them.
/// Multiple resolution calls within one transaction may interleave, so
/// both maps carry their own locks.
#[derive(Default)]
struct FunctionCollection {
    functions: Mutex<HashMap<QualifiedFunctionName, Arc<Vec<DynamicFunction>>>>,
    handles: Mutex<HashMap<FunctionId, FunctionHandle>>,
}

impl FunctionCollection {
    fn load_and_get<F>(
        &self,
        name: &QualifiedFunctionName,
        namespace: &CatalogSchemaName,
        fetch: F,
    ) -> Result<Arc<Vec<DynamicFunction>>, ResolutionError>
    where
        F: FnOnce() -> Result<Arc<Vec<DynamicFunction>>, ResolutionError>,
    {
        let mut functions = self.functions.lock().expect("poisoned");
        if let Some(existing) = functions.get(name) {
            return Ok(Arc::clone(existing));
        }
        let fetched = fetch()?;
        functions.insert(name.clone(), Arc::clone(&fetched));

        let mut handles = self.handles.lock().expect("poisoned");
        for function in fetched.iter() {
            handles.insert(function.id(), function.handle(namespace));
        }
        Ok(fetched)
    }

    fn handle(&self, id: &FunctionId) -> Option<FunctionHandle> {
        self.handles.lock().expect("poisoned").get(id).cloned()
    }
}

/// A function namespace backed by an external catalog.
pub struct DynamicFunctionNamespace {
    namespace: CatalogSchemaName,
    client: Arc<dyn FunctionCatalogClient>,
    functions: TtlCache<QualifiedFunctionName, Arc<Vec<DynamicFunction>>>,
    metadata_by_handle: TtlCache<FunctionHandle, FunctionMetadata>,
    implementation_by_handle: TtlCache<FunctionHandle, Arc<ScalarImplementation>>,
    transactions: Mutex<HashMap<NamespaceTransactionId, Arc<FunctionCollection>>>,
}

impl DynamicFunctionNamespace {
    /// Constructs a namespace over the given backing catalog client.
    pub fn new(
        namespace: CatalogSchemaName,
        client: Arc<dyn FunctionCatalogClient>,
        config: NamespaceCacheConfig,
    ) -> DynamicFunctionNamespace {
        DynamicFunctionNamespace {
            namespace,
            client,
            functions: TtlCache::new(config.cache_capacity, config.function_cache_ttl),
            metadata_by_handle: TtlCache::new(config.cache_capacity, config.instance_cache_ttl),
            implementation_by_handle: TtlCache::new(
                config.cache_capacity,
                config.instance_cache_ttl,
            ),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// The namespace's name.
    pub fn namespace(&self) -> &CatalogSchemaName {
        &self.namespace
    }

    /// Fetches candidates through the shared cache, populating the
    /// handle metadata cache as a side effect so later out-of-transaction
    /// metadata lookups need no further catalog round trip.
    fn fetch_functions(
        &self,
        name: &QualifiedFunctionName,
    ) -> Result<Arc<Vec<DynamicFunction>>, ResolutionError> {
        self.functions.get_or_try_build(name, || {
            debug!(
                namespace = %self.namespace,
                %name,
                "fetching functions from backing catalog"
            );
            let functions = self.client.fetch_functions(name)?;
            for function in &functions {
                self.metadata_by_handle
                    .insert(function.handle(&self.namespace), function.metadata());
            }
            Ok(Arc::new(functions))
        })
    }

    fn collection(
        &self,
        txn: Option<NamespaceTransactionId>,
    ) -> Result<Arc<FunctionCollection>, ResolutionError> {
        let txn = txn.ok_or_else(|| ResolutionError::TransactionRequired {
            namespace: self.namespace.clone(),
        })?;
        self.transactions
            .lock()
            .expect("poisoned")
            .get(&txn)
            .cloned()
            .ok_or_else(|| ResolutionError::TransactionRequired {
                namespace: self.namespace.clone(),
            })
    }

    /// The signature shape reported when a handle names a function this
    /// namespace cannot serve in the requested kind.
    fn kind_mismatch(&self, id: &FunctionId, kind: FunctionKind) -> ResolutionError {
        implementation_missing(&Signature {
            name: id.name.clone(),
            kind,
            type_variable_constraints: Vec::new(),
            return_type: TypeSignature::Concrete(ScalarType::Unknown),
            argument_types: id.argument_types.clone(),
            variadic: false,
        })
    }
}

impl fmt::Debug for DynamicFunctionNamespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DynamicFunctionNamespace")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl FunctionNamespace for DynamicFunctionNamespace {
    fn begin_transaction(&self) -> NamespaceTransactionId {
        let txn = NamespaceTransactionId::new();
        self.transactions
            .lock()
            .expect("poisoned")
            .insert(txn, Arc::new(FunctionCollection::default()));
        debug!(namespace = %self.namespace, %txn, "began namespace transaction");
        txn
    }

    fn commit(&self, txn: NamespaceTransactionId) {
        // Transactional writes are not supported; committing a snapshot
        // view just stops remembering it.
        self.transactions.lock().expect("poisoned").remove(&txn);
        debug!(namespace = %self.namespace, %txn, "committed namespace transaction");
    }

    fn abort(&self, txn: NamespaceTransactionId) {
        self.transactions.lock().expect("poisoned").remove(&txn);
        debug!(namespace = %self.namespace, %txn, "aborted namespace transaction");
    }

    fn get_functions(
        &self,
        txn: Option<NamespaceTransactionId>,
        name: &QualifiedFunctionName,
    ) -> Result<Vec<FunctionCandidate>, ResolutionError> {
        let collection = self.collection(txn)?;
        let functions =
            collection.load_and_get(name, &self.namespace, || self.fetch_functions(name))?;
        Ok(functions.iter().map(DynamicFunction::candidate).collect())
    }

    fn get_function_handle(
        &self,
        txn: Option<NamespaceTransactionId>,
        signature: &Signature,
    ) -> Result<FunctionHandle, ResolutionError> {
        let collection = self.collection(txn)?;
        let id = FunctionId::from_signature(signature);
        collection
            .handle(&id)
            .ok_or_else(|| implementation_missing(signature))
    }

    fn get_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, ResolutionError> {
        self.metadata_by_handle.get_or_try_build(handle, || {
            debug!(namespace = %self.namespace, %handle, "fetching metadata from backing catalog");
            Ok(self.client.fetch_function_metadata(handle)?)
        })
    }

    fn get_scalar_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, ResolutionError> {
        self.implementation_by_handle.get_or_try_build(handle, || {
            debug!(
                namespace = %self.namespace,
                %handle,
                "fetching implementation from backing catalog"
            );
            Ok(self.client.fetch_implementation(handle)?)
        })
    }

    fn get_aggregate_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError> {
        match handle {
            FunctionHandle::Dynamic { id, .. } => {
                Err(self.kind_mismatch(id, FunctionKind::Aggregate))
            }
            FunctionHandle::Static { signature } => Err(implementation_missing(signature)),
        }
    }

    fn get_window_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<WindowImplementation>, ResolutionError> {
        match handle {
            FunctionHandle::Dynamic { id, .. } => Err(self.kind_mismatch(id, FunctionKind::Window)),
            FunctionHandle::Static { signature } => Err(implementation_missing(signature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use trellis_repr::ScalarType;

    use super::{
        DynamicFunction, DynamicFunctionNamespace, FunctionCatalogClient, NamespaceCacheConfig,
    };
    use crate::error::CatalogError;
    use crate::implementation::ScalarImplementation;
    use crate::names::{CatalogSchemaName, QualifiedFunctionName};
    use crate::namespace::FunctionNamespace;
    use crate::sig::{FunctionHandle, FunctionKind, FunctionMetadata, Signature};

    fn ns_name() -> CatalogSchemaName {
        CatalogSchemaName::new("analytics", "ml")
    }

    fn predict_name() -> QualifiedFunctionName {
        QualifiedFunctionName::qualified("analytics", "ml", "predict")
    }

    /// A backing catalog serving one versioned function, counting
    /// fetches.
    struct CountingClient {
        version: AtomicUsize,
        function_fetches: AtomicUsize,
        metadata_fetches: AtomicUsize,
    }

    impl CountingClient {
        fn new() -> CountingClient {
            CountingClient {
                version: AtomicUsize::new(1),
                function_fetches: AtomicUsize::new(0),
                metadata_fetches: AtomicUsize::new(0),
            }
        }

        fn bump_version(&self) {
            self.version.fetch_add(1, Ordering::SeqCst);
        }

        fn function(&self) -> DynamicFunction {
            DynamicFunction {
                signature: Signature::exact(
                    predict_name(),
                    FunctionKind::Scalar,
                    vec![ScalarType::Float64],
                    ScalarType::Float64,
                ),
                version: Some(self.version.load(Ordering::SeqCst) as u64),
                deterministic: true,
                called_on_null_input: false,
                body: "RETURN x * 2".into(),
            }
        }
    }

    impl FunctionCatalogClient for CountingClient {
        fn fetch_functions(
            &self,
            _name: &QualifiedFunctionName,
        ) -> Result<Vec<DynamicFunction>, CatalogError> {
            self.function_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.function()])
        }

        fn fetch_function_metadata(
            &self,
            _handle: &FunctionHandle,
        ) -> Result<FunctionMetadata, CatalogError> {
            self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.function().metadata())
        }

        fn fetch_implementation(
            &self,
            _handle: &FunctionHandle,
        ) -> Result<Arc<ScalarImplementation>, CatalogError> {
            let function = self.function();
            Ok(Arc::new(ScalarImplementation {
                signature: function.signature,
                called_on_null_input: false,
                body: Some(function.body),
            }))
        }
    }

    fn namespace_with(
        client: Arc<CountingClient>,
        config: NamespaceCacheConfig,
    ) -> DynamicFunctionNamespace {
        DynamicFunctionNamespace::new(ns_name(), client, config)
    }

    #[test]
    fn test_shared_cache_fronts_the_catalog() {
        let client = Arc::new(CountingClient::new());
        let namespace = namespace_with(Arc::clone(&client), NamespaceCacheConfig::default());

        let txn1 = namespace.begin_transaction();
        let txn2 = namespace.begin_transaction();
        namespace.get_functions(Some(txn1), &predict_name()).unwrap();
        namespace.get_functions(Some(txn2), &predict_name()).unwrap();
        namespace.get_functions(Some(txn1), &predict_name()).unwrap();

        // Both transactions observe the shared outer cache: one fetch.
        assert_eq!(client.function_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transactions_pin_their_view() {
        let client = Arc::new(CountingClient::new());
        let config = NamespaceCacheConfig {
            function_cache_ttl: Duration::from_millis(10),
            ..NamespaceCacheConfig::default()
        };
        let namespace = namespace_with(Arc::clone(&client), config);

        let txn1 = namespace.begin_transaction();
        let v1 = namespace.get_functions(Some(txn1), &predict_name()).unwrap();

        // The catalog changes and the shared cache expires.
        client.bump_version();
        thread::sleep(Duration::from_millis(30));

        let txn2 = namespace.begin_transaction();
        let v2 = namespace.get_functions(Some(txn2), &predict_name()).unwrap();
        // A fresh transaction refetches...
        assert_eq!(client.function_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(v2.len(), 1);
        assert_eq!(v1.len(), 1);

        // ...while the first transaction still sees the view it pinned.
        let signature = &v1[0].signature;
        let handle1 = namespace
            .get_function_handle(Some(txn1), signature)
            .unwrap();
        match handle1 {
            FunctionHandle::Dynamic { version, .. } => assert_eq!(version, Some(1)),
            other => panic!("expected dynamic handle, got {:?}", other),
        }
        let handle2 = namespace
            .get_function_handle(Some(txn2), signature)
            .unwrap();
        match handle2 {
            FunctionHandle::Dynamic { version, .. } => assert_eq!(version, Some(2)),
            other => panic!("expected dynamic handle, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_does_not_invalidate_other_transactions() {
        let client = Arc::new(CountingClient::new());
        let namespace = namespace_with(Arc::clone(&client), NamespaceCacheConfig::default());

        let txn1 = namespace.begin_transaction();
        let txn2 = namespace.begin_transaction();
        let functions = namespace.get_functions(Some(txn2), &predict_name()).unwrap();
        namespace.get_functions(Some(txn1), &predict_name()).unwrap();

        namespace.abort(txn1);

        // txn2's handle remains obtainable and serviceable.
        let handle = namespace
            .get_function_handle(Some(txn2), &functions[0].signature)
            .unwrap();
        let metadata = namespace.get_function_metadata(&handle).unwrap();
        assert_eq!(metadata.name, predict_name());

        // txn1's view is gone.
        assert!(namespace
            .get_functions(Some(txn1), &predict_name())
            .is_err());
    }

    #[test]
    fn test_metadata_populated_as_fetch_side_effect() {
        let client = Arc::new(CountingClient::new());
        let namespace = namespace_with(Arc::clone(&client), NamespaceCacheConfig::default());

        let txn = namespace.begin_transaction();
        let functions = namespace.get_functions(Some(txn), &predict_name()).unwrap();
        let handle = namespace
            .get_function_handle(Some(txn), &functions[0].signature)
            .unwrap();
        namespace.commit(txn);

        // Metadata by handle works outside any transaction and without a
        // further catalog round trip.
        let metadata = namespace.get_function_metadata(&handle).unwrap();
        assert_eq!(metadata.kind, FunctionKind::Scalar);
        assert_eq!(client.metadata_fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_catalog_errors_pass_through() {
        struct FailingClient;
        impl FunctionCatalogClient for FailingClient {
            fn fetch_functions(
                &self,
                _name: &QualifiedFunctionName,
            ) -> Result<Vec<DynamicFunction>, CatalogError> {
                Err(CatalogError::Unavailable {
                    namespace: ns_name(),
                    detail: "connection refused".into(),
                })
            }
            fn fetch_function_metadata(
                &self,
                _handle: &FunctionHandle,
            ) -> Result<FunctionMetadata, CatalogError> {
                unreachable!()
            }
            fn fetch_implementation(
                &self,
                _handle: &FunctionHandle,
            ) -> Result<Arc<ScalarImplementation>, CatalogError> {
                unreachable!()
            }
        }

        let namespace =
            DynamicFunctionNamespace::new(ns_name(), Arc::new(FailingClient), Default::default());
        let txn = namespace.begin_transaction();
        let err = namespace
            .get_functions(Some(txn), &predict_name())
            .unwrap_err();
        // Not reinterpreted as FunctionNotFound.
        assert!(matches!(
            err,
            crate::error::ResolutionError::Catalog(CatalogError::Unavailable { .. })
        ));
    }
}
