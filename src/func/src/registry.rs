// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The function registry: routing, resolution, and specialization.
//!
//! A [`FunctionRegistry`] is a constructed context object owning the
//! built-in namespace, the registered dynamic namespaces, and the
//! per-transaction catalog views; nothing here lives in ambient global
//! state, so tests construct fresh registries at will.
//!
//! Bare function names resolve against the built-in namespace and
//! nowhere else. Resolving a bare name against whichever namespace
//! happens to be registered would make common built-ins ambiguous and
//! their meaning dependent on configuration order, so explicit
//! catalog.schema qualification is required to reach a dynamic
//! namespace.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use trellis_repr::ScalarType;

use crate::builtins::{BuiltinFunction, BuiltinFunctionNamespace};
use crate::error::{FunctionRegistrationError, ResolutionError};
use crate::implementation::{
    AggregateImplementation, ScalarImplementation, WindowImplementation,
};
use crate::names::{
    CatalogSchemaName, CatalogSchemaPrefix, NamespaceSpecifier, PartialFunctionName,
    QualifiedFunctionName,
};
use crate::namespace::{FunctionNamespace, FunctionNamespaceFactory, NamespaceTransactionId};
use crate::operator::{CastType, OperatorType};
use crate::resolver;
use crate::sig::{FunctionHandle, FunctionKind, FunctionMetadata, Signature};
use crate::typeconv::{TypeOracle, TypeRegistry};

/// Identifies one logical transaction, as issued by the engine's
/// transaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Issues a fresh transaction id. Production transaction ids arrive
    /// from the transaction manager; this is for tests and tools.
    pub fn new() -> TransactionId {
        TransactionId(Uuid::new_v4())
    }

    /// Wraps an externally issued id.
    pub fn from_uuid(uuid: Uuid) -> TransactionId {
        TransactionId(uuid)
    }
}

impl Default for TransactionId {
    fn default() -> TransactionId {
        TransactionId::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The namespace transactions one logical transaction has touched.
#[derive(Default)]
struct TransactionScope {
    namespaces: Vec<(Arc<dyn FunctionNamespace>, NamespaceTransactionId)>,
}

/// The process-wide function resolution context.
pub struct FunctionRegistry {
    oracle: Arc<dyn TypeOracle>,
    builtin: Arc<BuiltinFunctionNamespace>,
    namespaces: RwLock<BTreeMap<CatalogSchemaPrefix, Arc<dyn FunctionNamespace>>>,
    factories: RwLock<BTreeMap<String, Arc<dyn FunctionNamespaceFactory>>>,
    transactions: Mutex<HashMap<TransactionId, TransactionScope>>,
}

impl FunctionRegistry {
    /// Constructs a registry over the built-in type oracle and built-in
    /// function catalog.
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::with_oracle(Arc::new(TypeRegistry::new()))
    }

    /// Constructs a registry over a caller-supplied type oracle.
    pub fn with_oracle(oracle: Arc<dyn TypeOracle>) -> FunctionRegistry {
        let builtin = Arc::new(BuiltinFunctionNamespace::with_default_catalog(Arc::clone(
            &oracle,
        )));
        FunctionRegistry {
            oracle,
            builtin,
            namespaces: RwLock::new(BTreeMap::new()),
            factories: RwLock::new(BTreeMap::new()),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// The registry's type oracle.
    pub fn oracle(&self) -> &Arc<dyn TypeOracle> {
        &self.oracle
    }

    /// Registers additional built-in functions.
    pub fn register_builtin_functions(
        &self,
        functions: Vec<BuiltinFunction>,
    ) -> Result<(), FunctionRegistrationError> {
        self.builtin.register_builtin_functions(functions)
    }

    /// Registers a namespace to serve the given prefix. Append-only:
    /// once this returns, every subsequent `resolve` on any thread
    /// observes the namespace.
    pub fn register_namespace(
        &self,
        prefix: CatalogSchemaPrefix,
        namespace: Arc<dyn FunctionNamespace>,
    ) -> Result<(), FunctionRegistrationError> {
        let mut namespaces = self.namespaces.write().expect("poisoned");
        if namespaces.contains_key(&prefix) {
            return Err(FunctionRegistrationError::NamespaceAlreadyRegistered { prefix });
        }
        namespaces.insert(prefix.clone(), namespace);
        debug!(%prefix, "registered function namespace");
        Ok(())
    }

    /// Registers a namespace factory by its name.
    pub fn register_namespace_factory(
        &self,
        factory: Arc<dyn FunctionNamespaceFactory>,
    ) -> Result<(), FunctionRegistrationError> {
        let mut factories = self.factories.write().expect("poisoned");
        let name = factory.name().to_string();
        if factories.contains_key(&name) {
            return Err(FunctionRegistrationError::FactoryAlreadyRegistered { name });
        }
        factories.insert(name, factory);
        Ok(())
    }

    /// Instantiates a namespace from a registered factory and assigns it
    /// the given prefixes.
    pub fn load_namespace(
        &self,
        factory_name: &str,
        prefixes: Vec<CatalogSchemaPrefix>,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), ResolutionError> {
        let factory = self
            .factories
            .read()
            .expect("poisoned")
            .get(factory_name)
            .cloned()
            .ok_or_else(|| FunctionRegistrationError::FactoryNotFound {
                name: factory_name.to_string(),
            })?;
        let namespace = factory.create(properties)?;
        for prefix in prefixes {
            self.register_namespace(prefix, Arc::clone(&namespace))?;
        }
        Ok(())
    }

    /// Registers a transaction issued by the transaction manager.
    /// Registration is lazy elsewhere too, so this is optional; it
    /// exists so tools can pre-announce transactions.
    pub fn begin_transaction(&self) -> TransactionId {
        let txn = TransactionId::new();
        self.transactions
            .lock()
            .expect("poisoned")
            .insert(txn, TransactionScope::default());
        txn
    }

    /// Ends a transaction, discarding every namespace view it opened.
    pub fn commit_transaction(&self, txn: TransactionId) {
        if let Some(scope) = self.transactions.lock().expect("poisoned").remove(&txn) {
            for (namespace, handle) in scope.namespaces {
                namespace.commit(handle);
            }
        }
    }

    /// Aborts a transaction, discarding every namespace view it opened.
    pub fn abort_transaction(&self, txn: TransactionId) {
        if let Some(scope) = self.transactions.lock().expect("poisoned").remove(&txn) {
            for (namespace, handle) in scope.namespaces {
                namespace.abort(handle);
            }
        }
    }

    /// Resolves a function call to a handle, using implicit coercions
    /// where necessary.
    pub fn resolve_function(
        &self,
        txn: Option<TransactionId>,
        name: &PartialFunctionName,
        arg_types: &[ScalarType],
    ) -> Result<FunctionHandle, ResolutionError> {
        let qualified = name.to_qualified()?;
        self.resolve_qualified(txn, &qualified, arg_types)
    }

    /// Resolves an already-qualified function call to a handle.
    pub fn resolve_qualified(
        &self,
        txn: Option<TransactionId>,
        name: &QualifiedFunctionName,
        arg_types: &[ScalarType],
    ) -> Result<FunctionHandle, ResolutionError> {
        let namespace = self.serving_namespace(name)?;
        let ns_txn = match (&name.namespace, txn) {
            (NamespaceSpecifier::Catalog(_), Some(txn)) => {
                Some(self.namespace_transaction(txn, &namespace))
            }
            _ => None,
        };

        let candidates = namespace.get_functions(ns_txn, name)?;
        let signature =
            resolver::resolve_function_candidates(&*self.oracle, name, &candidates, arg_types)?;
        namespace.get_function_handle(ns_txn, &signature)
    }

    /// Looks up a built-in function whose argument types are already
    /// fully concrete. No coercion search is attempted.
    pub fn lookup_function(
        &self,
        name: &str,
        arg_types: &[ScalarType],
    ) -> Result<FunctionHandle, ResolutionError> {
        let qualified = QualifiedFunctionName::builtin(name);
        let candidates = self.builtin.candidates(&qualified);
        let signature = resolver::lookup_function_candidates(
            &*self.oracle,
            &qualified,
            &candidates,
            arg_types,
        )?;
        self.builtin.get_function_handle(None, &signature)
    }

    /// Resolves an operator invocation, reporting misses as
    /// [`ResolutionError::OperatorNotFound`].
    pub fn resolve_operator(
        &self,
        op: OperatorType,
        arg_types: &[ScalarType],
    ) -> Result<FunctionHandle, ResolutionError> {
        match self.resolve_qualified(None, &op.function_name(), arg_types) {
            Err(ResolutionError::FunctionNotFound { .. }) => {
                Err(ResolutionError::OperatorNotFound {
                    op,
                    arg_types: arg_types.to_vec(),
                    return_type: None,
                })
            }
            other => other,
        }
    }

    /// Looks up the cast function from one concrete type to another,
    /// proving that an implementation exists.
    pub fn lookup_cast(
        &self,
        cast: CastType,
        from: &ScalarType,
        to: &ScalarType,
    ) -> Result<FunctionHandle, ResolutionError> {
        let signature = Signature::exact(
            cast.cast_name(),
            FunctionKind::Scalar,
            vec![from.clone()],
            to.clone(),
        );
        match self.builtin.scalar_implementation(&signature) {
            Ok(_) => Ok(FunctionHandle::Static { signature }),
            Err(ResolutionError::FunctionImplementationMissing { .. })
                if cast.is_operator_type() =>
            {
                Err(ResolutionError::OperatorNotFound {
                    op: OperatorType::Cast,
                    arg_types: vec![from.clone()],
                    return_type: Some(to.clone()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the metadata for a previously resolved handle.
    pub fn get_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, ResolutionError> {
        self.namespace_for_handle(handle)?
            .get_function_metadata(handle)
    }

    /// Returns the scalar implementation for a handle, building it on
    /// first use.
    pub fn get_scalar_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, ResolutionError> {
        self.namespace_for_handle(handle)?
            .get_scalar_implementation(handle)
    }

    /// Returns the aggregate implementation for a handle, building it on
    /// first use.
    pub fn get_aggregate_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError> {
        self.namespace_for_handle(handle)?
            .get_aggregate_implementation(handle)
    }

    /// Returns the window implementation for a handle, building it on
    /// first use. Aggregate handles yield a window adapter.
    pub fn get_window_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<WindowImplementation>, ResolutionError> {
        self.namespace_for_handle(handle)?
            .get_window_implementation(handle)
    }

    /// Enumerates the non-hidden built-in functions.
    pub fn list_functions(&self) -> Vec<FunctionMetadata> {
        self.builtin.list_functions()
    }

    /// Enumerates the signatures registered under operator names.
    pub fn list_operators(&self) -> Vec<Signature> {
        self.builtin.list_operators()
    }

    /// Routes a qualified name to the namespace serving it.
    ///
    /// Ambient names go to the built-in namespace, always and only.
    /// Qualified names go to the registered prefix that includes them
    /// and is not itself included by another matching prefix (the most
    /// specific match).
    fn serving_namespace(
        &self,
        name: &QualifiedFunctionName,
    ) -> Result<Arc<dyn FunctionNamespace>, ResolutionError> {
        match &name.namespace {
            NamespaceSpecifier::Ambient => {
                Ok(Arc::clone(&self.builtin) as Arc<dyn FunctionNamespace>)
            }
            NamespaceSpecifier::Catalog(target) => self.serving_catalog_namespace(target, name),
        }
    }

    fn serving_catalog_namespace(
        &self,
        target: &CatalogSchemaName,
        name: &QualifiedFunctionName,
    ) -> Result<Arc<dyn FunctionNamespace>, ResolutionError> {
        let namespaces = self.namespaces.read().expect("poisoned");
        let mut best: Option<(&CatalogSchemaPrefix, &Arc<dyn FunctionNamespace>)> = None;
        for (prefix, namespace) in namespaces.iter() {
            if prefix.includes(target)
                && best.map_or(true, |(best_prefix, _)| best_prefix.includes_prefix(prefix))
            {
                best = Some((prefix, namespace));
            }
        }
        best.map(|(_, namespace)| Arc::clone(namespace))
            .ok_or_else(|| ResolutionError::NamespaceNotFound { name: name.clone() })
    }

    fn namespace_for_handle(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<dyn FunctionNamespace>, ResolutionError> {
        match handle {
            FunctionHandle::Static { .. } => {
                Ok(Arc::clone(&self.builtin) as Arc<dyn FunctionNamespace>)
            }
            FunctionHandle::Dynamic { namespace, id, .. } => {
                self.serving_catalog_namespace(namespace, &id.name)
            }
        }
    }

    /// Returns the namespace-level transaction for `txn` within
    /// `namespace`, opening it on first touch. A transaction id unknown
    /// to the registry acquires a scope lazily, since ids are issued
    /// externally.
    fn namespace_transaction(
        &self,
        txn: TransactionId,
        namespace: &Arc<dyn FunctionNamespace>,
    ) -> NamespaceTransactionId {
        let mut transactions = self.transactions.lock().expect("poisoned");
        let scope = transactions.entry(txn).or_default();
        for (existing, handle) in &scope.namespaces {
            if Arc::ptr_eq(existing, namespace) {
                return *handle;
            }
        }
        let handle = namespace.begin_transaction();
        scope.namespaces.push((Arc::clone(namespace), handle));
        handle
    }
}

impl Default for FunctionRegistry {
    fn default() -> FunctionRegistry {
        FunctionRegistry::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("builtin", &self.builtin)
            .field(
                "namespaces",
                &self.namespaces.read().expect("poisoned").len(),
            )
            .finish()
    }
}
