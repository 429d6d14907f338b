// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Concurrency guarantees: single-flight specialization, linearizable
//! registration, and transaction isolation under parallel load.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use trellis_func::builtins::{BuiltinFunction, SpecializeFn};
use trellis_func::invoked::{
    DynamicFunction, DynamicFunctionNamespace, FunctionCatalogClient, NamespaceCacheConfig,
};
use trellis_func::{
    CatalogError, CatalogSchemaName, FunctionHandle, FunctionImplementation, FunctionKind,
    FunctionMetadata, FunctionRegistry, PartialFunctionName, QualifiedFunctionName,
    ScalarImplementation, Signature,
};
use trellis_repr::ScalarType;

fn counting_builtin(
    name: &str,
    builds: Arc<AtomicUsize>,
) -> (Signature, BuiltinFunction) {
    let signature = Signature::exact(
        QualifiedFunctionName::builtin(name),
        FunctionKind::Scalar,
        vec![ScalarType::Int64],
        ScalarType::Int64,
    );
    let specialize: SpecializeFn = {
        let declared = signature.clone();
        Arc::new(move |bound, _arity| {
            builds.fetch_add(1, Ordering::SeqCst);
            // Simulate an expensive specialization so concurrent misses
            // genuinely overlap.
            thread::sleep(std::time::Duration::from_millis(10));
            let signature = trellis_func::sig::apply_bound_variables(&declared, bound);
            Ok(FunctionImplementation::Scalar(Arc::new(
                ScalarImplementation {
                    signature,
                    called_on_null_input: false,
                    body: None,
                },
            )))
        })
    };
    let function = BuiltinFunction::new(signature.clone(), specialize);
    (signature, function)
}

#[test]
fn test_concurrent_specialization_builds_once() {
    let registry = Arc::new(FunctionRegistry::new());
    let builds = Arc::new(AtomicUsize::new(0));
    let (signature, function) = counting_builtin("probe", Arc::clone(&builds));
    registry.register_builtin_functions(vec![function]).unwrap();

    let handle = FunctionHandle::Static { signature };
    let barrier = Arc::new(Barrier::new(8));
    let mut threads = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let handle = handle.clone();
        let barrier = Arc::clone(&barrier);
        threads.push(thread::spawn(move || {
            barrier.wait();
            registry.get_scalar_implementation(&handle).unwrap()
        }));
    }

    let implementations: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for implementation in &implementations[1..] {
        assert!(Arc::ptr_eq(&implementations[0], implementation));
    }
}

#[test]
fn test_independent_keys_build_independently() {
    let registry = Arc::new(FunctionRegistry::new());
    let builds = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    let mut functions = Vec::new();
    for i in 0..4 {
        let (signature, function) =
            counting_builtin(&format!("probe{}", i), Arc::clone(&builds));
        functions.push(function);
        handles.push(FunctionHandle::Static { signature });
    }
    registry.register_builtin_functions(functions).unwrap();

    let threads: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.get_scalar_implementation(&handle).unwrap())
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(builds.load(Ordering::SeqCst), 4);
}

#[test]
fn test_registration_is_linearizable_with_routing() {
    #[derive(Debug)]
    struct EchoClient;
    impl FunctionCatalogClient for EchoClient {
        fn fetch_functions(
            &self,
            name: &QualifiedFunctionName,
        ) -> Result<Vec<DynamicFunction>, CatalogError> {
            Ok(vec![DynamicFunction {
                signature: Signature::exact(
                    name.clone(),
                    FunctionKind::Scalar,
                    vec![ScalarType::Int64],
                    ScalarType::Int64,
                ),
                version: None,
                deterministic: true,
                called_on_null_input: false,
                body: "RETURN x".into(),
            }])
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

    let registry = Arc::new(FunctionRegistry::new());
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let catalog = format!("catalog{}", i);
                let namespace = Arc::new(DynamicFunctionNamespace::new(
                    CatalogSchemaName::new(&catalog, "s"),
                    Arc::new(EchoClient),
                    NamespaceCacheConfig::default(),
                ));
                registry
                    .register_namespace(catalog.parse().unwrap(), namespace)
                    .unwrap();
                // Registration has returned: routing must observe the
                // namespace immediately, from any thread.
                let txn = registry.begin_transaction();
                let name: PartialFunctionName =
                    format!("{}.s.f", catalog).parse().unwrap();
                registry
                    .resolve_function(Some(txn), &name, &[ScalarType::Int64])
                    .unwrap();
                registry.commit_transaction(txn);
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    // Every namespace remains routable afterwards.
    for i in 0..8 {
        let txn = registry.begin_transaction();
        let name: PartialFunctionName = format!("catalog{}.s.f", i).parse().unwrap();
        assert!(registry
            .resolve_function(Some(txn), &name, &[ScalarType::Int64])
            .is_ok());
        registry.abort_transaction(txn);
    }
}

#[test]
fn test_transaction_isolation_under_parallel_resolution() {
    struct VersionedClient {
        version: AtomicUsize,
    }
    impl FunctionCatalogClient for VersionedClient {
        fn fetch_functions(
            &self,
            name: &QualifiedFunctionName,
        ) -> Result<Vec<DynamicFunction>, CatalogError> {
            let version = self.version.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(vec![DynamicFunction {
                signature: Signature::exact(
                    name.clone(),
                    FunctionKind::Scalar,
                    vec![ScalarType::Int64],
                    ScalarType::Int64,
                ),
                version: Some(version),
                deterministic: true,
                called_on_null_input: false,
                body: "RETURN x".into(),
            }])
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

    let registry = Arc::new(FunctionRegistry::new());
    // A zero-TTL outer cache forces every transaction to refetch, so
    // each pinned view carries a distinct version.
    let namespace = Arc::new(DynamicFunctionNamespace::new(
        CatalogSchemaName::new("c", "s"),
        Arc::new(VersionedClient {
            version: AtomicUsize::new(0),
        }),
        NamespaceCacheConfig {
            function_cache_ttl: std::time::Duration::ZERO,
            ..NamespaceCacheConfig::default()
        },
    ));
    registry
        .register_namespace("c".parse().unwrap(), namespace)
        .unwrap();

    let name: PartialFunctionName = "c.s.f".parse().unwrap();
    let version_of = |handle: &FunctionHandle| match handle {
        FunctionHandle::Dynamic { version, .. } => version.unwrap(),
        other => panic!("expected dynamic handle, got {:?}", other),
    };

    // Parallel part: within one transaction the view is pinned, no
    // matter how resolutions interleave across threads.
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let name = name.clone();
            thread::spawn(move || {
                let txn = registry.begin_transaction();
                let first = registry
                    .resolve_function(Some(txn), &name, &[ScalarType::Int64])
                    .unwrap();
                // Re-resolving in the same transaction yields the
                // identical handle, even though the backing catalog
                // advances on every fetch.
                let second = registry
                    .resolve_function(Some(txn), &name, &[ScalarType::Int64])
                    .unwrap();
                assert_eq!(first, second);
                registry.commit_transaction(txn);
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    // Sequential part: distinct transactions observe independent views.
    let txn1 = registry.begin_transaction();
    let handle1 = registry
        .resolve_function(Some(txn1), &name, &[ScalarType::Int64])
        .unwrap();

    let txn2 = registry.begin_transaction();
    let handle2 = registry
        .resolve_function(Some(txn2), &name, &[ScalarType::Int64])
        .unwrap();
    assert_ne!(version_of(&handle1), version_of(&handle2));

    // Aborting one transaction leaves the other's view untouched.
    registry.abort_transaction(txn2);
    let handle1_again = registry
        .resolve_function(Some(txn1), &name, &[ScalarType::Int64])
        .unwrap();
    assert_eq!(handle1, handle1_again);
    registry.commit_transaction(txn1);
}
