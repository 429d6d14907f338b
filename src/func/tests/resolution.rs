// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! End-to-end resolution through the public registry surface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trellis_func::builtins::FunctionListBuilder;
use trellis_func::invoked::{
    DynamicFunction, DynamicFunctionNamespace, FunctionCatalogClient, NamespaceCacheConfig,
};
use trellis_func::{
    CatalogError, CatalogSchemaName, FunctionHandle, FunctionKind, FunctionMetadata,
    FunctionNamespace, FunctionNamespaceFactory, FunctionRegistry, PartialFunctionName,
    QualifiedFunctionName, ResolutionError, ScalarImplementation, Signature,
};
use trellis_repr::ScalarType;

fn ml_namespace() -> CatalogSchemaName {
    CatalogSchemaName::new("analytics", "ml")
}

/// A backing catalog serving `predict(double): double` and
/// `predict(string): string`, counting fetches.
struct MlCatalogClient {
    fetches: AtomicUsize,
}

impl MlCatalogClient {
    fn new() -> MlCatalogClient {
        MlCatalogClient {
            fetches: AtomicUsize::new(0),
        }
    }

    fn function(&self, arg: ScalarType, ret: ScalarType) -> DynamicFunction {
        DynamicFunction {
            signature: Signature::exact(
                QualifiedFunctionName::qualified("analytics", "ml", "predict"),
                FunctionKind::Scalar,
                vec![arg],
                ret,
            ),
            version: Some(1),
            deterministic: true,
            called_on_null_input: false,
            body: "RETURN model_eval(x)".into(),
        }
    }
}

impl FunctionCatalogClient for MlCatalogClient {
    fn fetch_functions(
        &self,
        _name: &QualifiedFunctionName,
    ) -> Result<Vec<DynamicFunction>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            self.function(ScalarType::Float64, ScalarType::Float64),
            self.function(ScalarType::String, ScalarType::String),
        ])
    }

    fn fetch_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, CatalogError> {
        match handle {
            FunctionHandle::Dynamic { .. } => {
                Ok(self.function(ScalarType::Float64, ScalarType::Float64).metadata())
            }
            FunctionHandle::Static { .. } => Err(CatalogError::Corrupt {
                namespace: ml_namespace(),
                detail: "static handle sent to dynamic catalog".into(),
            }),
        }
    }

    fn fetch_implementation(
        &self,
        _handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, CatalogError> {
        let function = self.function(ScalarType::Float64, ScalarType::Float64);
        Ok(Arc::new(ScalarImplementation {
            signature: function.signature,
            called_on_null_input: false,
            body: Some(function.body),
        }))
    }
}

fn registry_with_ml_namespace() -> (FunctionRegistry, Arc<MlCatalogClient>) {
    let registry = FunctionRegistry::new();
    let client = Arc::new(MlCatalogClient::new());
    let namespace = Arc::new(DynamicFunctionNamespace::new(
        ml_namespace(),
        Arc::clone(&client) as Arc<dyn FunctionCatalogClient>,
        NamespaceCacheConfig::default(),
    ));
    registry
        .register_namespace("analytics".parse().unwrap(), namespace)
        .unwrap();
    (registry, client)
}

#[test]
fn test_dynamic_resolution_within_a_transaction() {
    let (registry, client) = registry_with_ml_namespace();
    let txn = registry.begin_transaction();
    let name: PartialFunctionName = "analytics.ml.predict".parse().unwrap();

    let handle = registry
        .resolve_function(Some(txn), &name, &[ScalarType::Float64])
        .unwrap();
    match &handle {
        FunctionHandle::Dynamic { namespace, id, .. } => {
            assert_eq!(*namespace, ml_namespace());
            assert_eq!(id.name.item, "predict");
        }
        other => panic!("expected dynamic handle, got {:?}", other),
    }

    // Repeated resolutions in the same transaction reuse the pinned
    // view.
    registry
        .resolve_function(Some(txn), &name, &[ScalarType::String])
        .unwrap();
    assert_eq!(client.fetches.load(Ordering::SeqCst), 1);

    // The implementation round-trips through the namespace.
    let implementation = registry.get_scalar_implementation(&handle).unwrap();
    assert_eq!(implementation.body.as_deref(), Some("RETURN model_eval(x)"));

    registry.commit_transaction(txn);

    // Metadata lookups by handle work after commit, outside any
    // transaction.
    let metadata = registry.get_function_metadata(&handle).unwrap();
    assert_eq!(metadata.kind, FunctionKind::Scalar);
}

#[test]
fn test_dynamic_resolution_with_coercion() {
    let (registry, _client) = registry_with_ml_namespace();
    let txn = registry.begin_transaction();
    let name: PartialFunctionName = "analytics.ml.predict".parse().unwrap();

    // bigint coerces to double but not to string.
    let handle = registry
        .resolve_function(Some(txn), &name, &[ScalarType::Int64])
        .unwrap();
    match handle {
        FunctionHandle::Dynamic { id, .. } => {
            assert_eq!(
                id.argument_types,
                vec![ScalarType::Float64.into()],
            );
        }
        other => panic!("expected dynamic handle, got {:?}", other),
    }
    registry.abort_transaction(txn);
}

#[test]
fn test_dynamic_resolution_requires_transaction() {
    let (registry, _client) = registry_with_ml_namespace();
    let name: PartialFunctionName = "analytics.ml.predict".parse().unwrap();

    let err = registry
        .resolve_function(None, &name, &[ScalarType::Float64])
        .unwrap_err();
    assert!(matches!(err, ResolutionError::TransactionRequired { .. }));
}

#[test]
fn test_two_part_names_are_rejected() {
    let registry = FunctionRegistry::new();
    let name = PartialFunctionName {
        catalog: Some("analytics".into()),
        schema: None,
        item: "predict".into(),
    };
    let err = registry
        .resolve_function(None, &name, &[ScalarType::Float64])
        .unwrap_err();
    assert!(matches!(err, ResolutionError::InvalidFunctionName { .. }));
}

/// A factory producing namespaces over [`MlCatalogClient`].
struct MlNamespaceFactory;

impl FunctionNamespaceFactory for MlNamespaceFactory {
    fn name(&self) -> &str {
        "ml-metadata"
    }

    fn create(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn FunctionNamespace>, ResolutionError> {
        let catalog = properties.get("catalog").cloned().unwrap_or_default();
        let schema = properties.get("schema").cloned().unwrap_or_default();
        Ok(Arc::new(DynamicFunctionNamespace::new(
            CatalogSchemaName::new(catalog, schema),
            Arc::new(MlCatalogClient::new()),
            NamespaceCacheConfig::default(),
        )))
    }
}

#[test]
fn test_factory_loading() {
    let registry = FunctionRegistry::new();
    registry
        .register_namespace_factory(Arc::new(MlNamespaceFactory))
        .unwrap();

    // A second factory under the same name is a configuration defect.
    let err = registry
        .register_namespace_factory(Arc::new(MlNamespaceFactory))
        .unwrap_err();
    assert!(matches!(
        err,
        trellis_func::FunctionRegistrationError::FactoryAlreadyRegistered { .. }
    ));

    let mut properties = BTreeMap::new();
    properties.insert("catalog".to_string(), "analytics".to_string());
    properties.insert("schema".to_string(), "ml".to_string());
    registry
        .load_namespace(
            "ml-metadata",
            vec!["analytics.ml".parse().unwrap()],
            &properties,
        )
        .unwrap();

    let txn = registry.begin_transaction();
    let name: PartialFunctionName = "analytics.ml.predict".parse().unwrap();
    assert!(registry
        .resolve_function(Some(txn), &name, &[ScalarType::Float64])
        .is_ok());

    let err = registry
        .load_namespace("no-such-factory", vec!["other".parse().unwrap()], &properties)
        .unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::Registration(
            trellis_func::FunctionRegistrationError::FactoryNotFound { .. }
        )
    ));
}

#[test]
fn test_builtin_registration_and_listing() {
    let registry = FunctionRegistry::new();
    let visible = Signature::exact(
        QualifiedFunctionName::builtin("reverse"),
        FunctionKind::Scalar,
        vec![ScalarType::String],
        ScalarType::String,
    );
    registry
        .register_builtin_functions(
            FunctionListBuilder::new()
                .scalar(visible.clone(), "reverse a string")
                .build(),
        )
        .unwrap();

    let functions = registry.list_functions();
    assert!(functions.iter().any(|f| f.name.item == "reverse"));

    let name: PartialFunctionName = "reverse".parse().unwrap();
    let handle = registry
        .resolve_function(None, &name, &[ScalarType::String])
        .unwrap();
    assert_eq!(handle.signature(), Some(&visible));
}

#[test]
fn test_window_and_aggregate_surface() {
    let registry = FunctionRegistry::new();

    let name: PartialFunctionName = "sum".parse().unwrap();
    let handle = registry
        .resolve_function(None, &name, &[ScalarType::Int64])
        .unwrap();

    let aggregate = registry.get_aggregate_implementation(&handle).unwrap();
    assert_eq!(aggregate.intermediate_type, ScalarType::Int64);

    // The same aggregate handle serves as a window function through the
    // adapter.
    let window = registry.get_window_implementation(&handle).unwrap();
    match &*window {
        trellis_func::WindowImplementation::AggregateAdapter(adapted) => {
            assert!(Arc::ptr_eq(adapted, &aggregate));
        }
        other => panic!("expected aggregate adapter, got {:?}", other),
    }

    // A scalar request against an aggregate handle cannot be served.
    assert!(matches!(
        registry.get_scalar_implementation(&handle),
        Err(ResolutionError::FunctionImplementationMissing { .. })
    ));

    // Native window functions specialize directly.
    let name: PartialFunctionName = "row_number".parse().unwrap();
    let handle = registry.resolve_function(None, &name, &[]).unwrap();
    let window = registry.get_window_implementation(&handle).unwrap();
    assert!(matches!(
        &*window,
        trellis_func::WindowImplementation::Native { .. }
    ));
}
