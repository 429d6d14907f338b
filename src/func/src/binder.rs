// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Binding of declared signatures against actual argument types.
//!
//! This is a restricted unification over the parametric type lattice: a
//! declared argument descriptor either names a concrete type, a type
//! variable, or a container over further descriptors, and each position
//! of the call unifies independently against the corresponding actual
//! type. Binding is all-or-nothing and side-effect free; the overload
//! resolver probes many candidates per call and a failed probe must leak
//! nothing.

use trellis_repr::{ScalarType, TypeSignature};

use crate::sig::{apply_bound_variables, BoundVariables, Signature};
use crate::typeconv::TypeOracle;

/// Unifies one declared signature against actual argument types.
#[derive(Debug)]
pub struct SignatureBinder<'a> {
    oracle: &'a dyn TypeOracle,
    declared: &'a Signature,
    allow_coercion: bool,
}

impl<'a> SignatureBinder<'a> {
    /// Constructs a binder for one candidate signature.
    pub fn new(
        oracle: &'a dyn TypeOracle,
        declared: &'a Signature,
        allow_coercion: bool,
    ) -> SignatureBinder<'a> {
        SignatureBinder {
            oracle,
            declared,
            allow_coercion,
        }
    }

    /// Binds the declared signature's type variables against the actual
    /// argument types, or returns `None` if the signature does not
    /// accept them.
    pub fn bind_variables(&self, actual: &[ScalarType]) -> Option<BoundVariables> {
        self.bind_impl(actual, None)
    }

    /// Like [`SignatureBinder::bind_variables`], but additionally unifies
    /// the declared return type against a known target return type. Used
    /// when resolving from a caller-supplied exact signature rather than
    /// purely from arguments.
    pub fn bind_variables_with_return_type(
        &self,
        actual: &[ScalarType],
        return_type: &ScalarType,
    ) -> Option<BoundVariables> {
        self.bind_impl(actual, Some(return_type))
    }

    /// Binds and substitutes, producing the bound signature.
    ///
    /// A variadic tail is expanded to the call's arity, so the bound
    /// signature records exactly the parameter types this call binds to.
    pub fn bind(&self, actual: &[ScalarType]) -> Option<Signature> {
        let bound = self.bind_variables(actual)?;
        let mut signature = apply_bound_variables(self.declared, &bound);
        if signature.variadic {
            if let Some(last) = signature.argument_types.last().cloned() {
                while signature.argument_types.len() < actual.len() {
                    signature.argument_types.push(last.clone());
                }
            }
            signature.argument_types.truncate(actual.len());
            signature.variadic = false;
        }
        Some(signature)
    }

    fn bind_impl(
        &self,
        actual: &[ScalarType],
        return_type: Option<&ScalarType>,
    ) -> Option<BoundVariables> {
        if !self.arity_matches(actual.len()) {
            return None;
        }

        let mut bound = BoundVariables::new();
        for (i, actual_type) in actual.iter().enumerate() {
            let declared = self.declared_at(i);
            if !self.unify(declared, actual_type, &mut bound, self.allow_coercion) {
                return None;
            }
        }
        if let Some(return_type) = return_type {
            if !self.unify(
                &self.declared.return_type,
                return_type,
                &mut bound,
                self.allow_coercion,
            ) {
                return None;
            }
        }

        // A variable whose only uses were untyped arguments has no
        // binding yet; default it to unknown so substitution is total.
        for constraint in &self.declared.type_variable_constraints {
            if bound.type_variable(&constraint.name).is_none() {
                bound.set_type_variable(&constraint.name, ScalarType::Unknown);
            }
        }

        Some(bound)
    }

    fn arity_matches(&self, actual_len: usize) -> bool {
        let declared_len = self.declared.argument_types.len();
        if self.declared.variadic {
            // The trailing variadic parameter matches zero or more
            // actuals.
            declared_len > 0 && actual_len >= declared_len - 1
        } else {
            actual_len == declared_len
        }
    }

    fn declared_at(&self, i: usize) -> &TypeSignature {
        let last = self.declared.argument_types.len() - 1;
        &self.declared.argument_types[i.min(last)]
    }

    /// Unifies one declared descriptor against one actual type,
    /// accumulating variable bindings. Descriptors nested inside
    /// containers unify without coercion: implicit casts do not reach
    /// through `array` or `map` element positions.
    fn unify(
        &self,
        declared: &TypeSignature,
        actual: &ScalarType,
        bound: &mut BoundVariables,
        allow_coercion: bool,
    ) -> bool {
        if actual.is_unknown() && allow_coercion {
            // An untyped argument matches anything and is tracked as
            // unresolved rather than bound.
            return true;
        }
        match declared {
            TypeSignature::Concrete(declared_type) => {
                declared_type == actual
                    || (allow_coercion && self.oracle.is_coercible(actual, declared_type))
            }
            TypeSignature::Variable(name) => match bound.type_variable(name).cloned() {
                None => {
                    bound.set_type_variable(name, actual.clone());
                    true
                }
                Some(previous) => {
                    if previous == *actual {
                        true
                    } else if allow_coercion && self.oracle.is_coercible(actual, &previous) {
                        true
                    } else if allow_coercion && self.oracle.is_coercible(&previous, actual) {
                        // Narrow the binding to the common type without
                        // failing the match.
                        bound.set_type_variable(name, actual.clone());
                        true
                    } else {
                        false
                    }
                }
            },
            TypeSignature::Array(declared_element) => match actual {
                ScalarType::Array(actual_element) => {
                    self.unify(declared_element, actual_element, bound, false)
                }
                _ => false,
            },
            TypeSignature::Map {
                key: declared_key,
                value: declared_value,
            } => match actual {
                ScalarType::Map {
                    key: actual_key,
                    value: actual_value,
                } => {
                    self.unify(declared_key, actual_key, bound, false)
                        && self.unify(declared_value, actual_value, bound, false)
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use trellis_repr::{ScalarType, TypeSignature};

    use super::SignatureBinder;
    use crate::names::QualifiedFunctionName;
    use crate::sig::{FunctionKind, Signature};
    use crate::typeconv::TypeRegistry;

    fn scalar_sig(args: Vec<ScalarType>, ret: ScalarType) -> Signature {
        Signature::exact(
            QualifiedFunctionName::builtin("f"),
            FunctionKind::Scalar,
            args,
            ret,
        )
    }

    fn generic_sig(
        vars: Vec<&str>,
        args: Vec<TypeSignature>,
        ret: TypeSignature,
    ) -> Signature {
        Signature::generic(
            QualifiedFunctionName::builtin("f"),
            FunctionKind::Scalar,
            vars,
            args,
            ret,
        )
    }

    #[test]
    fn test_exact_bind() {
        let oracle = TypeRegistry::new();
        let sig = scalar_sig(vec![ScalarType::Int32, ScalarType::String], ScalarType::Bool);

        let binder = SignatureBinder::new(&oracle, &sig, false);
        assert!(binder
            .bind_variables(&[ScalarType::Int32, ScalarType::String])
            .is_some());
        // Coercible but not equal: rejected without coercion.
        assert!(binder
            .bind_variables(&[ScalarType::Int16, ScalarType::String])
            .is_none());
        // Arity mismatch.
        assert!(binder.bind_variables(&[ScalarType::Int32]).is_none());

        let coercing = SignatureBinder::new(&oracle, &sig, true);
        assert!(coercing
            .bind_variables(&[ScalarType::Int16, ScalarType::String])
            .is_some());
        assert!(coercing
            .bind_variables(&[ScalarType::Timestamp, ScalarType::String])
            .is_none());
    }

    #[test]
    fn test_generic_bind_repeated_variable() {
        let oracle = TypeRegistry::new();
        let sig = generic_sig(
            vec!["T"],
            vec![TypeSignature::variable("T"), TypeSignature::variable("T")],
            TypeSignature::variable("T"),
        );

        let binder = SignatureBinder::new(&oracle, &sig, false);
        let bound = binder
            .bind_variables(&[ScalarType::Int64, ScalarType::Int64])
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::Int64));
        // Without coercion a repeated variable requires identical types.
        assert!(binder
            .bind_variables(&[ScalarType::Int32, ScalarType::Int64])
            .is_none());

        // With coercion the binding narrows to the common type.
        let coercing = SignatureBinder::new(&oracle, &sig, true);
        let bound = coercing
            .bind_variables(&[ScalarType::Int32, ScalarType::Int64])
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::Int64));
        let bound = coercing
            .bind_variables(&[ScalarType::Int64, ScalarType::Int32])
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::Int64));
    }

    #[test]
    fn test_container_unification_is_exact() {
        let oracle = TypeRegistry::new();
        let sig = generic_sig(
            vec!["T"],
            vec![TypeSignature::array(TypeSignature::variable("T"))],
            TypeSignature::variable("T"),
        );
        let binder = SignatureBinder::new(&oracle, &sig, true);

        let bound = binder
            .bind_variables(&[ScalarType::array(ScalarType::String)])
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::String));
        // No implicit coercion from a non-array.
        assert!(binder.bind_variables(&[ScalarType::String]).is_none());

        let concrete_elem = generic_sig(
            vec![],
            vec![TypeSignature::array(TypeSignature::Concrete(
                ScalarType::Int64,
            ))],
            TypeSignature::Concrete(ScalarType::Int64),
        );
        let binder = SignatureBinder::new(&oracle, &concrete_elem, true);
        // Coercion does not reach inside the container.
        assert!(binder
            .bind_variables(&[ScalarType::array(ScalarType::Int32)])
            .is_none());
        assert!(binder
            .bind_variables(&[ScalarType::array(ScalarType::Int64)])
            .is_some());
    }

    #[test]
    fn test_unknown_matches_anything_under_coercion() {
        let oracle = TypeRegistry::new();
        let sig = scalar_sig(vec![ScalarType::Timestamp], ScalarType::Bool);

        assert!(SignatureBinder::new(&oracle, &sig, true)
            .bind_variables(&[ScalarType::Unknown])
            .is_some());
        assert!(SignatureBinder::new(&oracle, &sig, false)
            .bind_variables(&[ScalarType::Unknown])
            .is_none());

        // A variable whose only use is an untyped argument defaults to
        // unknown rather than constraining the call.
        let generic = generic_sig(
            vec!["T"],
            vec![TypeSignature::variable("T")],
            TypeSignature::variable("T"),
        );
        let bound = SignatureBinder::new(&oracle, &generic, true)
            .bind_variables(&[ScalarType::Unknown])
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::Unknown));
    }

    #[test]
    fn test_variadic_arity() {
        let oracle = TypeRegistry::new();
        let sig = generic_sig(
            vec!["T"],
            vec![
                TypeSignature::Concrete(ScalarType::String),
                TypeSignature::variable("T"),
            ],
            TypeSignature::variable("T"),
        )
        .with_variadic();
        let binder = SignatureBinder::new(&oracle, &sig, false);

        // The trailing variadic parameter matches zero or more actuals.
        assert!(binder.bind_variables(&[ScalarType::String]).is_some());
        assert!(binder
            .bind_variables(&[ScalarType::String, ScalarType::Int32])
            .is_some());
        assert!(binder
            .bind_variables(&[
                ScalarType::String,
                ScalarType::Int32,
                ScalarType::Int32,
                ScalarType::Int32
            ])
            .is_some());
        // Extra actuals unify against the same variable.
        assert!(binder
            .bind_variables(&[ScalarType::String, ScalarType::Int32, ScalarType::Int64])
            .is_none());
        assert!(binder.bind_variables(&[]).is_none());
    }

    #[test]
    fn test_bind_with_return_type() {
        let oracle = TypeRegistry::new();
        let sig = generic_sig(
            vec!["T", "R"],
            vec![TypeSignature::variable("T")],
            TypeSignature::variable("R"),
        );
        let binder = SignatureBinder::new(&oracle, &sig, false);

        let bound = binder
            .bind_variables_with_return_type(&[ScalarType::Int32], &ScalarType::String)
            .unwrap();
        assert_eq!(bound.type_variable("T"), Some(&ScalarType::Int32));
        assert_eq!(bound.type_variable("R"), Some(&ScalarType::String));

        let concrete_return = scalar_sig(vec![ScalarType::Int32], ScalarType::Bool);
        let binder = SignatureBinder::new(&oracle, &concrete_return, false);
        assert!(binder
            .bind_variables_with_return_type(&[ScalarType::Int32], &ScalarType::Int32)
            .is_none());
    }

    fn base_type() -> impl Strategy<Value = ScalarType> {
        prop_oneof![
            Just(ScalarType::Bool),
            Just(ScalarType::Int16),
            Just(ScalarType::Int32),
            Just(ScalarType::Int64),
            Just(ScalarType::Float64),
            Just(ScalarType::String),
            Just(ScalarType::Timestamp),
        ]
    }

    proptest! {
        /// A monomorphic signature over exactly the actual types always
        /// binds without coercion, and binding is deterministic.
        #[test]
        fn prop_identity_signature_binds(args in proptest::collection::vec(base_type(), 0..5)) {
            let oracle = TypeRegistry::new();
            let sig = scalar_sig(args.clone(), ScalarType::Bool);
            let binder = SignatureBinder::new(&oracle, &sig, false);
            let first = binder.bind(&args);
            let second = binder.bind(&args);
            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
        }

        /// Arity mismatches never bind for non-variadic signatures.
        #[test]
        fn prop_arity_mismatch_never_binds(
            args in proptest::collection::vec(base_type(), 0..4),
            extra in base_type(),
        ) {
            let oracle = TypeRegistry::new();
            let sig = scalar_sig(args.clone(), ScalarType::Bool);
            let mut too_many = args;
            too_many.push(extra);
            let binder = SignatureBinder::new(&oracle, &sig, true);
            prop_assert!(binder.bind_variables(&too_many).is_none());
        }
    }
}
