// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The built-in function namespace.
//!
//! This namespace hosts the ambient functions compiled into the engine:
//! every bare function name resolves here and nowhere else. Functions
//! register once at catalog-load time into an immutable multimap, and a
//! two-level cache turns resolved signatures into executable
//! implementations: signatures map to specialization keys, and keys map
//! to built implementations, each built at most once per distinct key.
//!
//! Repeated specialization of the same signature under memory pressure
//! from the calling runtime has been observed to degrade steady-state
//! throughput; the caches convert an O(calls) cost into an O(distinct
//! signatures) cost.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::debug;

use trellis_repr::{ScalarType, TypeSignature};

use crate::binder::SignatureBinder;
use crate::cache::TtlCache;
use crate::error::{FunctionRegistrationError, ResolutionError};
use crate::implementation::{
    AggregateImplementation, FunctionImplementation, ScalarImplementation, WindowImplementation,
};
use crate::names::QualifiedFunctionName;
use crate::namespace::{
    candidate_metadata, implementation_missing, FunctionNamespace, NamespaceTransactionId,
};
use crate::operator::{CastType, OperatorType};
use crate::resolver::FunctionCandidate;
use crate::sig::{
    apply_bound_variables, BoundVariables, FunctionHandle, FunctionKind, FunctionMetadata,
    Signature,
};
use crate::typeconv::TypeOracle;

/// The maximum number of entries each specialization cache retains.
const SPECIALIZATION_CACHE_CAPACITY: usize = 1000;

/// How long a specialization cache entry lives after it is written.
const SPECIALIZATION_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Builds the implementation for one fully bound invocation of a
/// built-in function.
pub type SpecializeFn = Arc<
    dyn Fn(&BoundVariables, usize) -> Result<FunctionImplementation, ResolutionError>
        + Send
        + Sync,
>;

/// One function compiled into the built-in namespace.
#[derive(Clone)]
pub struct BuiltinFunction {
    signature: Signature,
    deterministic: bool,
    called_on_null_input: bool,
    hidden: bool,
    description: String,
    specialize: SpecializeFn,
}

impl BuiltinFunction {
    /// Constructs a built-in function with the given specialization
    /// routine. The function defaults to deterministic, not called on
    /// null input, and visible.
    pub fn new(signature: Signature, specialize: SpecializeFn) -> BuiltinFunction {
        BuiltinFunction {
            signature,
            deterministic: true,
            called_on_null_input: false,
            hidden: false,
            description: String::new(),
            specialize,
        }
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> BuiltinFunction {
        self.description = description.into();
        self
    }

    /// Hides the function from [`BuiltinFunctionNamespace::list_functions`].
    pub fn with_hidden(mut self, hidden: bool) -> BuiltinFunction {
        self.hidden = hidden;
        self
    }

    /// Marks the function as invoked on `NULL` input.
    pub fn with_called_on_null_input(mut self, called: bool) -> BuiltinFunction {
        self.called_on_null_input = called;
        self
    }

    /// Marks the function as non-deterministic.
    pub fn with_deterministic(mut self, deterministic: bool) -> BuiltinFunction {
        self.deterministic = deterministic;
        self
    }

    /// The declared signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Whether the function is hidden from introspection.
    pub fn is_hidden(&self) -> bool {
        self.hidden
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

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("signature", &self.signature)
            .field("deterministic", &self.deterministic)
            .field("called_on_null_input", &self.called_on_null_input)
            .field("hidden", &self.hidden)
            .field("specialize", &"<omitted>")
            .finish()
    }
}

/// Identifies one specialization of one built-in function: the declaring
/// function, the resolved type variables, and the bound arity.
#[derive(Clone)]
pub struct SpecializedFunctionKey {
    function: Arc<BuiltinFunction>,
    bound_variables: BoundVariables,
    arity: usize,
}

impl SpecializedFunctionKey {
    /// The declaring function.
    pub fn function(&self) -> &Arc<BuiltinFunction> {
        &self.function
    }

    /// The resolved type variables.
    pub fn bound_variables(&self) -> &BoundVariables {
        &self.bound_variables
    }
}

impl PartialEq for SpecializedFunctionKey {
    fn eq(&self, other: &SpecializedFunctionKey) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
            && self.bound_variables == other.bound_variables
            && self.arity == other.arity
    }
}

impl Eq for SpecializedFunctionKey {}

impl Hash for SpecializedFunctionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.function.signature.hash(state);
        self.bound_variables.hash(state);
        self.arity.hash(state);
    }
}

impl fmt::Debug for SpecializedFunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SpecializedFunctionKey")
            .field("function", &self.function.signature)
            .field("bound_variables", &self.bound_variables)
            .field("arity", &self.arity)
            .finish()
    }
}

/// An immutable multimap from qualified name to the functions sharing
/// it. Registration builds a fresh map so concurrent readers always see
/// a consistent snapshot.
#[derive(Debug, Default, Clone)]
struct FunctionMap {
    functions: BTreeMap<QualifiedFunctionName, Vec<Arc<BuiltinFunction>>>,
}

impl FunctionMap {
    /// Returns a copy of `self` extended with `new`, validating that no
    /// signature is duplicated and that no name mixes aggregates with
    /// scalar or window functions.
    fn with_functions(
        &self,
        new: Vec<BuiltinFunction>,
    ) -> Result<FunctionMap, FunctionRegistrationError> {
        let mut functions = self.functions.clone();
        for function in new {
            let entry = functions
                .entry(function.signature.name.clone())
                .or_default();
            if entry.iter().any(|f| f.signature == function.signature) {
                return Err(FunctionRegistrationError::DuplicateSignature {
                    signature: Box::new(function.signature),
                });
            }
            entry.push(Arc::new(function));
        }

        for (name, entry) in &functions {
            let aggregates = entry
                .iter()
                .filter(|f| f.signature.kind == FunctionKind::Aggregate)
                .count();
            if aggregates != 0 && aggregates != entry.len() {
                return Err(FunctionRegistrationError::MixedFunctionKinds {
                    name: name.clone(),
                });
            }
        }

        Ok(FunctionMap { functions })
    }

    fn get(&self, name: &QualifiedFunctionName) -> &[Arc<BuiltinFunction>] {
        self.functions.get(name).map_or(&[], |fs| fs.as_slice())
    }

    fn list(&self) -> impl Iterator<Item = &Arc<BuiltinFunction>> {
        self.functions.values().flatten()
    }
}

/// The namespace serving the ambient (built-in) functions.
pub struct BuiltinFunctionNamespace {
    oracle: Arc<dyn TypeOracle>,
    functions: RwLock<Arc<FunctionMap>>,
    specialized_key_cache: TtlCache<Signature, SpecializedFunctionKey>,
    scalar_cache: TtlCache<SpecializedFunctionKey, Arc<ScalarImplementation>>,
    aggregate_cache: TtlCache<SpecializedFunctionKey, Arc<AggregateImplementation>>,
    window_cache: TtlCache<SpecializedFunctionKey, Arc<WindowImplementation>>,
}

impl BuiltinFunctionNamespace {
    /// Constructs an empty namespace. Most callers want
    /// [`BuiltinFunctionNamespace::with_default_catalog`].
    pub fn new(oracle: Arc<dyn TypeOracle>) -> BuiltinFunctionNamespace {
        BuiltinFunctionNamespace {
            oracle,
            functions: RwLock::new(Arc::new(FunctionMap::default())),
            specialized_key_cache: TtlCache::new(
                SPECIALIZATION_CACHE_CAPACITY,
                SPECIALIZATION_CACHE_TTL,
            ),
            scalar_cache: TtlCache::new(SPECIALIZATION_CACHE_CAPACITY, SPECIALIZATION_CACHE_TTL),
            aggregate_cache: TtlCache::new(
                SPECIALIZATION_CACHE_CAPACITY,
                SPECIALIZATION_CACHE_TTL,
            ),
            window_cache: TtlCache::new(SPECIALIZATION_CACHE_CAPACITY, SPECIALIZATION_CACHE_TTL),
        }
    }

    /// Constructs a namespace preloaded with the standard built-in
    /// catalog.
    pub fn with_default_catalog(oracle: Arc<dyn TypeOracle>) -> BuiltinFunctionNamespace {
        let namespace = BuiltinFunctionNamespace::new(oracle);
        namespace
            .register_builtin_functions(BUILTIN_CATALOG.clone())
            .expect("the static builtin catalog is internally consistent");
        namespace
    }

    /// Registers additional built-in functions. Append-only; once
    /// registration returns, every subsequent resolution observes the
    /// new functions.
    pub fn register_builtin_functions(
        &self,
        functions: Vec<BuiltinFunction>,
    ) -> Result<(), FunctionRegistrationError> {
        let mut guard = self.functions.write().expect("poisoned");
        let count = functions.len();
        let next = guard.with_functions(functions)?;
        *guard = Arc::new(next);
        debug!(count, "registered builtin functions");
        Ok(())
    }

    fn function_map(&self) -> Arc<FunctionMap> {
        Arc::clone(&self.functions.read().expect("poisoned"))
    }

    /// The candidates sharing `name`, for the overload resolver.
    pub fn candidates(&self, name: &QualifiedFunctionName) -> Vec<FunctionCandidate> {
        self.function_map()
            .get(name)
            .iter()
            .map(|f| f.candidate())
            .collect()
    }

    /// Enumerates the non-hidden registered functions.
    pub fn list_functions(&self) -> Vec<FunctionMetadata> {
        self.function_map()
            .list()
            .filter(|f| !f.hidden)
            .map(|f| f.metadata())
            .collect()
    }

    /// Enumerates the signatures registered under operator names.
    pub fn list_operators(&self) -> Vec<Signature> {
        self.function_map()
            .list()
            .filter(|f| OPERATOR_NAMES.contains(&f.signature.name))
            .map(|f| f.signature.clone())
            .collect()
    }

    /// Maps a caller-supplied exact signature to the specialization key
    /// of the declaring function.
    ///
    /// The first pass requires an exact, non-coercive match against both
    /// the argument types and the return type. The second pass admits
    /// type-only coercions on the arguments and return type
    /// simultaneously, recovering generic instantiations the stricter
    /// binder misses (a `varchar` length widening, for instance).
    pub fn specialized_function_key(
        &self,
        signature: &Signature,
    ) -> Result<SpecializedFunctionKey, ResolutionError> {
        self.specialized_key_cache
            .get_or_try_build(signature, || self.do_specialized_function_key(signature))
    }

    fn do_specialized_function_key(
        &self,
        signature: &Signature,
    ) -> Result<SpecializedFunctionKey, ResolutionError> {
        let map = self.function_map();
        let candidates = map.get(&signature.name);

        let mut actual = Vec::with_capacity(signature.argument_types.len());
        for typ in &signature.argument_types {
            match self.oracle.resolve_type(typ) {
                Some(typ) => actual.push(typ),
                None => return Err(implementation_missing(signature)),
            }
        }
        let return_type = self
            .oracle
            .resolve_type(&signature.return_type)
            .ok_or_else(|| implementation_missing(signature))?;

        for candidate in candidates {
            let binder = SignatureBinder::new(&*self.oracle, &candidate.signature, false);
            if let Some(bound) = binder.bind_variables_with_return_type(&actual, &return_type) {
                return Ok(SpecializedFunctionKey {
                    function: Arc::clone(candidate),
                    bound_variables: bound,
                    arity: actual.len(),
                });
            }
        }

        // Second pass: admit representational coercions that the
        // non-coercive binder rejects, but nothing stronger.
        for candidate in candidates {
            let binder = SignatureBinder::new(&*self.oracle, &candidate.signature, true);
            let Some(bound) = binder.bind_variables_with_return_type(&actual, &return_type) else {
                continue;
            };
            let bound_signature = apply_bound_variables(&candidate.signature, &bound);

            let bound_return = match self.oracle.resolve_type(&bound_signature.return_type) {
                Some(typ) => typ,
                None => continue,
            };
            if !self.oracle.is_type_only_coercion(&bound_return, &return_type) {
                continue;
            }

            let mut type_only = true;
            for (i, actual_type) in actual.iter().enumerate() {
                let last = bound_signature.argument_types.len() - 1;
                let expected = &bound_signature.argument_types[i.min(last)];
                match self.oracle.resolve_type(expected) {
                    Some(expected)
                        if self.oracle.is_type_only_coercion(actual_type, &expected) => {}
                    _ => {
                        type_only = false;
                        break;
                    }
                }
            }
            if !type_only {
                continue;
            }

            return Ok(SpecializedFunctionKey {
                function: Arc::clone(candidate),
                bound_variables: bound,
                arity: actual.len(),
            });
        }

        Err(implementation_missing(signature))
    }

    /// Builds (or fetches) the scalar implementation for a fully bound
    /// signature.
    pub fn scalar_implementation(
        &self,
        signature: &Signature,
    ) -> Result<Arc<ScalarImplementation>, ResolutionError> {
        if signature.kind != FunctionKind::Scalar || !signature.is_exact() {
            return Err(implementation_missing(signature));
        }
        let key = self.specialized_function_key(signature)?;
        self.scalar_cache.get_or_try_build(&key, || {
            match (key.function.specialize)(&key.bound_variables, key.arity)? {
                FunctionImplementation::Scalar(implementation) => Ok(implementation),
                _ => Err(implementation_missing(signature)),
            }
        })
    }

    /// Builds (or fetches) the aggregate implementation for a fully
    /// bound signature.
    pub fn aggregate_implementation(
        &self,
        signature: &Signature,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError> {
        if signature.kind != FunctionKind::Aggregate || !signature.is_exact() {
            return Err(implementation_missing(signature));
        }
        let key = self.specialized_function_key(signature)?;
        self.aggregate_implementation_for_key(&key, signature)
    }

    fn aggregate_implementation_for_key(
        &self,
        key: &SpecializedFunctionKey,
        signature: &Signature,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError> {
        self.aggregate_cache.get_or_try_build(key, || {
            match (key.function.specialize)(&key.bound_variables, key.arity)? {
                FunctionImplementation::Aggregate(implementation) => Ok(implementation),
                _ => Err(implementation_missing(signature)),
            }
        })
    }

    /// Builds (or fetches) the window implementation for a fully bound
    /// signature. An aggregate-kind signature yields the aggregate
    /// implementation wrapped in a window adapter.
    pub fn window_implementation(
        &self,
        signature: &Signature,
    ) -> Result<Arc<WindowImplementation>, ResolutionError> {
        if !matches!(
            signature.kind,
            FunctionKind::Window | FunctionKind::Aggregate
        ) || !signature.is_exact()
        {
            return Err(implementation_missing(signature));
        }
        let key = self.specialized_function_key(signature)?;
        self.window_cache.get_or_try_build(&key, || {
            if key.function.signature.kind == FunctionKind::Aggregate {
                let aggregate = self.aggregate_implementation_for_key(&key, signature)?;
                return Ok(Arc::new(WindowImplementation::AggregateAdapter(aggregate)));
            }
            match (key.function.specialize)(&key.bound_variables, key.arity)? {
                FunctionImplementation::Window(implementation) => Ok(implementation),
                _ => Err(implementation_missing(signature)),
            }
        })
    }
}

impl fmt::Debug for BuiltinFunctionNamespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BuiltinFunctionNamespace")
            .field("functions", &self.function_map().list().count())
            .finish()
    }
}

impl FunctionNamespace for BuiltinFunctionNamespace {
    fn get_functions(
        &self,
        _txn: Option<NamespaceTransactionId>,
        name: &QualifiedFunctionName,
    ) -> Result<Vec<FunctionCandidate>, ResolutionError> {
        Ok(self.candidates(name))
    }

    fn get_function_handle(
        &self,
        _txn: Option<NamespaceTransactionId>,
        signature: &Signature,
    ) -> Result<FunctionHandle, ResolutionError> {
        Ok(FunctionHandle::Static {
            signature: signature.clone(),
        })
    }

    fn get_function_metadata(
        &self,
        handle: &FunctionHandle,
    ) -> Result<FunctionMetadata, ResolutionError> {
        match handle {
            FunctionHandle::Static { signature } => {
                let key = self.specialized_function_key(signature)?;
                Ok(candidate_metadata(
                    signature,
                    key.function.deterministic,
                    key.function.called_on_null_input,
                ))
            }
            FunctionHandle::Dynamic { id, .. } => Err(ResolutionError::NamespaceNotFound {
                name: id.name.clone(),
            }),
        }
    }

    fn get_scalar_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<ScalarImplementation>, ResolutionError> {
        match handle {
            FunctionHandle::Static { signature } => self.scalar_implementation(signature),
            FunctionHandle::Dynamic { id, .. } => Err(ResolutionError::NamespaceNotFound {
                name: id.name.clone(),
            }),
        }
    }

    fn get_aggregate_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<AggregateImplementation>, ResolutionError> {
        match handle {
            FunctionHandle::Static { signature } => self.aggregate_implementation(signature),
            FunctionHandle::Dynamic { id, .. } => Err(ResolutionError::NamespaceNotFound {
                name: id.name.clone(),
            }),
        }
    }

    fn get_window_implementation(
        &self,
        handle: &FunctionHandle,
    ) -> Result<Arc<WindowImplementation>, ResolutionError> {
        match handle {
            FunctionHandle::Static { signature } => self.window_implementation(signature),
            FunctionHandle::Dynamic { id, .. } => Err(ResolutionError::NamespaceNotFound {
                name: id.name.clone(),
            }),
        }
    }
}

/// Builds the default specialization routine for a scalar function.
fn specialize_scalar(declared: &Signature, called_on_null_input: bool) -> SpecializeFn {
    let declared = declared.clone();
    Arc::new(move |bound, _arity| {
        let signature = apply_bound_variables(&declared, bound);
        Ok(FunctionImplementation::Scalar(Arc::new(
            ScalarImplementation {
                signature,
                called_on_null_input,
                body: None,
            },
        )))
    })
}

/// Builds the default specialization routine for an aggregate function
/// with the given intermediate state descriptor.
fn specialize_aggregate(declared: &Signature, intermediate: TypeSignature) -> SpecializeFn {
    let declared = declared.clone();
    Arc::new(move |bound, _arity| {
        let signature = apply_bound_variables(&declared, bound);
        let intermediate_type = intermediate
            .substitute(&|name| bound.type_variable(name).cloned())
            .to_scalar()
            .ok_or_else(|| implementation_missing(&signature))?;
        Ok(FunctionImplementation::Aggregate(Arc::new(
            AggregateImplementation {
                signature,
                intermediate_type,
            },
        )))
    })
}

/// Builds the default specialization routine for a window function.
fn specialize_window(declared: &Signature) -> SpecializeFn {
    let declared = declared.clone();
    Arc::new(move |bound, _arity| {
        let signature = apply_bound_variables(&declared, bound);
        Ok(FunctionImplementation::Window(Arc::new(
            WindowImplementation::Native { signature },
        )))
    })
}

/// Incrementally assembles a list of built-in functions for
/// registration.
#[derive(Debug, Default)]
pub struct FunctionListBuilder {
    functions: Vec<BuiltinFunction>,
}

impl FunctionListBuilder {
    /// Constructs an empty builder.
    pub fn new() -> FunctionListBuilder {
        FunctionListBuilder::default()
    }

    /// Adds a scalar function with the default specialization routine.
    pub fn scalar(self, signature: Signature, description: &str) -> FunctionListBuilder {
        let specialize = specialize_scalar(&signature, false);
        self.push(BuiltinFunction::new(signature, specialize).with_description(description))
    }

    /// Adds a scalar function that is invoked on `NULL` input.
    pub fn scalar_called_on_null_input(
        self,
        signature: Signature,
        description: &str,
    ) -> FunctionListBuilder {
        let specialize = specialize_scalar(&signature, true);
        self.push(
            BuiltinFunction::new(signature, specialize)
                .with_called_on_null_input(true)
                .with_description(description),
        )
    }

    /// Adds an aggregate function with the given intermediate state
    /// descriptor.
    pub fn aggregate(
        self,
        signature: Signature,
        intermediate: TypeSignature,
        description: &str,
    ) -> FunctionListBuilder {
        let specialize = specialize_aggregate(&signature, intermediate);
        self.push(BuiltinFunction::new(signature, specialize).with_description(description))
    }

    /// Adds a window function.
    pub fn window(self, signature: Signature, description: &str) -> FunctionListBuilder {
        let specialize = specialize_window(&signature);
        self.push(BuiltinFunction::new(signature, specialize).with_description(description))
    }

    /// Adds a hidden scalar backing a monomorphic operator.
    pub fn operator(
        self,
        op: OperatorType,
        args: Vec<ScalarType>,
        ret: ScalarType,
    ) -> FunctionListBuilder {
        let signature = Signature::exact(op.function_name(), FunctionKind::Scalar, args, ret);
        let specialize = specialize_scalar(&signature, false);
        self.push(BuiltinFunction::new(signature, specialize).with_hidden(true))
    }

    /// Adds a hidden scalar backing a generic operator.
    pub fn generic_operator(
        self,
        op: OperatorType,
        type_variables: Vec<&str>,
        args: Vec<TypeSignature>,
        ret: TypeSignature,
    ) -> FunctionListBuilder {
        let signature = Signature::generic(
            op.function_name(),
            FunctionKind::Scalar,
            type_variables,
            args,
            ret,
        );
        let specialize = specialize_scalar(&signature, false);
        self.push(BuiltinFunction::new(signature, specialize).with_hidden(true))
    }

    /// Adds a hidden scalar backing a monomorphic cast.
    pub fn cast(self, cast: CastType, from: ScalarType, to: ScalarType) -> FunctionListBuilder {
        let signature =
            Signature::exact(cast.cast_name(), FunctionKind::Scalar, vec![from], to);
        let specialize = specialize_scalar(&signature, false);
        self.push(BuiltinFunction::new(signature, specialize).with_hidden(true))
    }

    /// Adds a hidden scalar backing the generic identity cast.
    pub fn identity_cast(self, cast: CastType) -> FunctionListBuilder {
        let signature = Signature::generic(
            cast.cast_name(),
            FunctionKind::Scalar,
            vec!["T"],
            vec![TypeSignature::variable("T")],
            TypeSignature::variable("T"),
        );
        let specialize = specialize_scalar(&signature, false);
        self.push(BuiltinFunction::new(signature, specialize).with_hidden(true))
    }

    /// Adds a fully custom function.
    pub fn push(mut self, function: BuiltinFunction) -> FunctionListBuilder {
        self.functions.push(function);
        self
    }

    /// Finishes the list.
    pub fn build(self) -> Vec<BuiltinFunction> {
        self.functions
    }
}

/// The set of ambient names reserved for operators.
static OPERATOR_NAMES: Lazy<BTreeSet<QualifiedFunctionName>> = Lazy::new(|| {
    let mut names: BTreeSet<_> = OperatorType::ALL
        .iter()
        .map(|op| op.function_name())
        .collect();
    names.insert(CastType::TryCast.cast_name());
    names
});

/// The standard built-in catalog.
///
/// Deliberately modest: enough scalars, aggregates, windows, operators,
/// and casts to serve the planner's common cases. The full production
/// registration list lives with the function bodies, not here.
static BUILTIN_CATALOG: Lazy<Vec<BuiltinFunction>> = Lazy::new(|| {
    use FunctionKind::{Aggregate, Scalar, Window};
    use ScalarType::{Bool, Float64, Int32, Int64, Numeric, String as Str};

    let name = |s: &str| QualifiedFunctionName::builtin(s);
    let exact = |n: &str, args: Vec<ScalarType>, ret: ScalarType, kind: FunctionKind| {
        Signature::exact(name(n), kind, args, ret)
    };
    let var = TypeSignature::variable;

    FunctionListBuilder::new()
        // Scalars.
        .scalar(exact("abs", vec![Int32], Int32, Scalar), "absolute value")
        .scalar(exact("abs", vec![Int64], Int64, Scalar), "absolute value")
        .scalar(exact("abs", vec![Float64], Float64, Scalar), "absolute value")
        .scalar(exact("ceil", vec![Float64], Float64, Scalar), "round up")
        .scalar(exact("floor", vec![Float64], Float64, Scalar), "round down")
        .scalar(exact("length", vec![Str], Int32, Scalar), "string length")
        .scalar(exact("lower", vec![Str], Str, Scalar), "lowercase")
        .scalar(exact("upper", vec![Str], Str, Scalar), "uppercase")
        .scalar(
            Signature::exact(name("concat"), Scalar, vec![Str, Str], Str).with_variadic(),
            "concatenate strings",
        )
        .scalar_called_on_null_input(
            Signature::generic(
                name("coalesce"),
                Scalar,
                vec!["T"],
                vec![var("T")],
                var("T"),
            )
            .with_variadic(),
            "first non-null argument",
        )
        .scalar(
            Signature::generic(
                name("element_at"),
                Scalar,
                vec!["K", "V"],
                vec![TypeSignature::map(var("K"), var("V")), var("K")],
                var("V"),
            ),
            "map element lookup",
        )
        .scalar(
            Signature::generic(
                name("cardinality"),
                Scalar,
                vec!["T"],
                vec![TypeSignature::array(var("T"))],
                TypeSignature::Concrete(Int64),
            ),
            "array length",
        )
        .scalar(
            Signature::generic(name("greatest"), Scalar, vec!["T"], vec![var("T")], var("T"))
                .with_variadic(),
            "largest argument",
        )
        .scalar(
            Signature::generic(name("least"), Scalar, vec!["T"], vec![var("T")], var("T"))
                .with_variadic(),
            "smallest argument",
        )
        // Aggregates.
        .aggregate(
            Signature::generic(
                name("count"),
                Aggregate,
                vec!["T"],
                vec![var("T")],
                TypeSignature::Concrete(Int64),
            ),
            TypeSignature::Concrete(Int64),
            "count of non-null inputs",
        )
        .aggregate(
            exact("sum", vec![Int64], Int64, Aggregate),
            TypeSignature::Concrete(Int64),
            "sum",
        )
        .aggregate(
            exact("sum", vec![Float64], Float64, Aggregate),
            TypeSignature::Concrete(Float64),
            "sum",
        )
        .aggregate(
            exact("sum", vec![Numeric], Numeric, Aggregate),
            TypeSignature::Concrete(Numeric),
            "sum",
        )
        .aggregate(
            exact("avg", vec![Float64], Float64, Aggregate),
            TypeSignature::Concrete(Float64),
            "average",
        )
        .aggregate(
            Signature::generic(name("max"), Aggregate, vec!["T"], vec![var("T")], var("T")),
            var("T"),
            "maximum",
        )
        .aggregate(
            Signature::generic(name("min"), Aggregate, vec!["T"], vec![var("T")], var("T")),
            var("T"),
            "minimum",
        )
        .aggregate(
            exact("bool_and", vec![Bool], Bool, Aggregate),
            TypeSignature::Concrete(Bool),
            "logical conjunction",
        )
        // Windows.
        .window(exact("row_number", vec![], Int64, Window), "row number")
        .window(exact("rank", vec![], Int64, Window), "rank with gaps")
        .window(exact("dense_rank", vec![], Int64, Window), "rank without gaps")
        .window(
            Signature::generic(name("lead"), Window, vec!["T"], vec![var("T")], var("T")),
            "value from a following row",
        )
        .window(
            Signature::generic(name("lag"), Window, vec!["T"], vec![var("T")], var("T")),
            "value from a preceding row",
        )
        .window(
            Signature::generic(
                name("first_value"),
                Window,
                vec!["T"],
                vec![var("T")],
                var("T"),
            ),
            "first value in frame",
        )
        // Arithmetic operators.
        .operator(OperatorType::Add, vec![Int32, Int32], Int32)
        .operator(OperatorType::Add, vec![Int64, Int64], Int64)
        .operator(OperatorType::Add, vec![Float64, Float64], Float64)
        .operator(OperatorType::Add, vec![Numeric, Numeric], Numeric)
        .operator(OperatorType::Subtract, vec![Int32, Int32], Int32)
        .operator(OperatorType::Subtract, vec![Int64, Int64], Int64)
        .operator(OperatorType::Subtract, vec![Float64, Float64], Float64)
        .operator(OperatorType::Subtract, vec![Numeric, Numeric], Numeric)
        .operator(OperatorType::Multiply, vec![Int32, Int32], Int32)
        .operator(OperatorType::Multiply, vec![Int64, Int64], Int64)
        .operator(OperatorType::Multiply, vec![Float64, Float64], Float64)
        .operator(OperatorType::Divide, vec![Int32, Int32], Int32)
        .operator(OperatorType::Divide, vec![Int64, Int64], Int64)
        .operator(OperatorType::Divide, vec![Float64, Float64], Float64)
        .operator(OperatorType::Modulus, vec![Int32, Int32], Int32)
        .operator(OperatorType::Modulus, vec![Int64, Int64], Int64)
        .operator(OperatorType::Negate, vec![Int32], Int32)
        .operator(OperatorType::Negate, vec![Int64], Int64)
        .operator(OperatorType::Negate, vec![Float64], Float64)
        // Comparison operators.
        .generic_operator(
            OperatorType::Equal,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        .generic_operator(
            OperatorType::NotEqual,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        .generic_operator(
            OperatorType::LessThan,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        .generic_operator(
            OperatorType::LessThanOrEqual,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        .generic_operator(
            OperatorType::GreaterThan,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        .generic_operator(
            OperatorType::GreaterThanOrEqual,
            vec!["T"],
            vec![var("T"), var("T")],
            TypeSignature::Concrete(Bool),
        )
        // Casts.
        .identity_cast(CastType::Cast)
        .cast(CastType::Cast, ScalarType::Int16, Int32)
        .cast(CastType::Cast, Int32, Int64)
        .cast(CastType::Cast, Int64, Numeric)
        .cast(CastType::Cast, Int64, Float64)
        .cast(CastType::Cast, Numeric, Float64)
        .cast(CastType::Cast, ScalarType::Float32, Float64)
        .cast(CastType::Cast, ScalarType::Date, ScalarType::Timestamp)
        .cast(
            CastType::Cast,
            ScalarType::VarChar { max_length: None },
            Str,
        )
        .cast(CastType::Cast, Str, Int64)
        .cast(CastType::TryCast, Str, Int64)
        .cast(CastType::TryCast, Str, Float64)
        .build()
});
