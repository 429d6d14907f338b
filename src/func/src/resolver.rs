// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Overload resolution over a set of candidate signatures.
//!
//! Resolution runs in three phases, first success winning: exact binding
//! of monomorphic candidates, exact binding of generic candidates, then
//! coercion-permitting binding of every candidate. The first two phases
//! sidestep the cost and ambiguity risk of coercion search whenever an
//! exactly matching signature exists; the third recovers common cases
//! (an untyped `NULL` literal, a widening numeric literal) without
//! silently guessing between semantically different overloads.

use trellis_repr::ScalarType;

use crate::binder::SignatureBinder;
use crate::error::ResolutionError;
use crate::names::QualifiedFunctionName;
use crate::sig::{FunctionKind, Signature};
use crate::typeconv::TypeOracle;

/// One declared function, paired with the metadata resolution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCandidate {
    /// The declared signature.
    pub signature: Signature,
    /// Whether the function is invoked on `NULL` input.
    pub called_on_null_input: bool,
}

/// The outcome of matching one candidate set at one coercion level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one candidate survived; its bound signature.
    Match(Signature),
    /// No candidate binds.
    NoMatch,
    /// Two or more irreducible candidates survived; their bound
    /// signatures, in discovery order.
    Ambiguous(Vec<Signature>),
}

/// A candidate that survived binding against a specific call.
#[derive(Debug, Clone)]
struct ApplicableFunction {
    declared: Signature,
    bound: Signature,
    called_on_null_input: bool,
}

/// Resolves a call against `candidates`, running all three phases.
pub fn resolve_function_candidates(
    oracle: &dyn TypeOracle,
    name: &QualifiedFunctionName,
    candidates: &[FunctionCandidate],
    actual: &[ScalarType],
) -> Result<Signature, ResolutionError> {
    match lookup_function_candidates(oracle, name, candidates, actual) {
        Ok(signature) => return Ok(signature),
        Err(ResolutionError::FunctionNotFound { .. }) => (),
        Err(e) => return Err(e),
    }

    match match_function(oracle, candidates, actual, true) {
        MatchOutcome::Match(signature) => Ok(signature),
        MatchOutcome::Ambiguous(bound) => Err(ambiguous(name, actual, bound)),
        MatchOutcome::NoMatch => Err(not_found(name, candidates, actual)),
    }
}

/// Resolves a call against `candidates` using the exact phases only.
///
/// This is the lookup variant for call sites whose argument types are
/// already fully concrete: no coercion search is attempted, and a miss is
/// simply `FunctionNotFound`.
pub fn lookup_function_candidates(
    oracle: &dyn TypeOracle,
    name: &QualifiedFunctionName,
    candidates: &[FunctionCandidate],
    actual: &[ScalarType],
) -> Result<Signature, ResolutionError> {
    let monomorphic: Vec<FunctionCandidate> = candidates
        .iter()
        .filter(|c| c.signature.is_exact())
        .cloned()
        .collect();
    match match_function(oracle, &monomorphic, actual, false) {
        MatchOutcome::Match(signature) => return Ok(signature),
        MatchOutcome::Ambiguous(bound) => return Err(ambiguous(name, actual, bound)),
        MatchOutcome::NoMatch => (),
    }

    let generic: Vec<FunctionCandidate> = candidates
        .iter()
        .filter(|c| !c.signature.is_exact())
        .cloned()
        .collect();
    match match_function(oracle, &generic, actual, false) {
        MatchOutcome::Match(signature) => Ok(signature),
        MatchOutcome::Ambiguous(bound) => Err(ambiguous(name, actual, bound)),
        MatchOutcome::NoMatch => Err(not_found(name, candidates, actual)),
    }
}

/// Matches `candidates` at one coercion level, disambiguating ties when
/// coercion is allowed.
pub fn match_function(
    oracle: &dyn TypeOracle,
    candidates: &[FunctionCandidate],
    actual: &[ScalarType],
    coercion_allowed: bool,
) -> MatchOutcome {
    let applicable = identify_applicable_functions(oracle, candidates, actual, coercion_allowed);
    if applicable.is_empty() {
        return MatchOutcome::NoMatch;
    }

    let survivors = if coercion_allowed {
        select_most_specific_functions(oracle, applicable, actual)
    } else {
        applicable
    };

    let mut survivors = survivors.into_iter();
    match (survivors.next(), survivors.next()) {
        (Some(only), None) => MatchOutcome::Match(only.bound),
        (Some(first), Some(second)) => MatchOutcome::Ambiguous(
            [first, second]
                .into_iter()
                .chain(survivors)
                .map(|f| f.bound)
                .collect(),
        ),
        (None, _) => MatchOutcome::NoMatch,
    }
}

fn identify_applicable_functions(
    oracle: &dyn TypeOracle,
    candidates: &[FunctionCandidate],
    actual: &[ScalarType],
    allow_coercion: bool,
) -> Vec<ApplicableFunction> {
    let mut applicable = Vec::new();
    for candidate in candidates {
        let binder = SignatureBinder::new(oracle, &candidate.signature, allow_coercion);
        if let Some(bound) = binder.bind(actual) {
            applicable.push(ApplicableFunction {
                declared: candidate.signature.clone(),
                bound,
                called_on_null_input: candidate.called_on_null_input,
            });
        }
    }
    applicable
}

fn select_most_specific_functions(
    oracle: &dyn TypeOracle,
    applicable: Vec<ApplicableFunction>,
    actual: &[ScalarType],
) -> Vec<ApplicableFunction> {
    let mut representatives = reduce_to_most_specific(oracle, &applicable);
    if representatives.len() <= 1 {
        return representatives;
    }

    if !actual.iter().any(ScalarType::is_unknown) {
        // Fully typed call: the remaining representatives are a genuine
        // ambiguity.
        return representatives;
    }

    // Prefer functions that only cast the unresolved arguments, nothing
    // else.
    let unknown_only: Vec<ApplicableFunction> = applicable
        .iter()
        .filter(|f| only_casts_unknown(oracle, f, actual))
        .cloned()
        .collect();
    if !unknown_only.is_empty() {
        representatives = unknown_only;
        if representatives.len() == 1 {
            return representatives;
        }
    }

    // If every representative returns the same type and none is invoked
    // on the null inputs in question, the candidates are semantically
    // interchangeable for this call; pick one by a fixed total order so
    // repeated resolutions agree.
    if return_type_is_the_same(oracle, &representatives)
        && representatives
            .iter()
            .all(|f| returns_null_on_given_input_types(f, actual))
    {
        let selected = representatives
            .into_iter()
            .max_by(|a, b| a.bound.to_string().cmp(&b.bound.to_string()));
        return selected.into_iter().collect();
    }

    representatives
}

/// Reduces the applicable set to its most specific representatives: a
/// minimal antichain under the dominance relation, built by a stable
/// pairwise scan in discovery order.
fn reduce_to_most_specific(
    oracle: &dyn TypeOracle,
    applicable: &[ApplicableFunction],
) -> Vec<ApplicableFunction> {
    let mut representatives: Vec<ApplicableFunction> = Vec::new();

    for current in applicable {
        let mut found = false;
        for i in 0..representatives.len() {
            let current_dominates = is_more_specific_than(oracle, current, &representatives[i]);
            let representative_dominates =
                is_more_specific_than(oracle, &representatives[i], current);
            if current_dominates {
                representatives[i] = current.clone();
            }
            if current_dominates || representative_dominates {
                found = true;
                break;
            }
        }
        if !found {
            representatives.push(current.clone());
        }
    }

    representatives
}

/// One function is more specific than another if a call already bound for
/// it could also be legally re-bound against the other's declared
/// signature under coercion.
fn is_more_specific_than(
    oracle: &dyn TypeOracle,
    left: &ApplicableFunction,
    right: &ApplicableFunction,
) -> bool {
    let mut bound_types = Vec::with_capacity(left.bound.argument_types.len());
    for typ in &left.bound.argument_types {
        match oracle.resolve_type(typ) {
            Some(typ) => bound_types.push(typ),
            None => return false,
        }
    }
    SignatureBinder::new(oracle, &right.declared, true)
        .bind_variables(&bound_types)
        .is_some()
}

/// Reports whether `function`'s bound argument types differ from the
/// actual types only at unknown positions.
fn only_casts_unknown(
    oracle: &dyn TypeOracle,
    function: &ApplicableFunction,
    actual: &[ScalarType],
) -> bool {
    for (bound, actual_type) in function.bound.argument_types.iter().zip(actual) {
        if actual_type.is_unknown() {
            continue;
        }
        match oracle.resolve_type(bound) {
            Some(bound_type) if bound_type == *actual_type => (),
            _ => return false,
        }
    }
    true
}

fn return_type_is_the_same(oracle: &dyn TypeOracle, functions: &[ApplicableFunction]) -> bool {
    let mut return_types = functions
        .iter()
        .map(|f| oracle.resolve_type(&f.bound.return_type));
    match return_types.next() {
        None => true,
        Some(first) => first.is_some() && return_types.all(|t| t == first),
    }
}

/// Reports whether the function returns `NULL` whenever any of the
/// unknown-typed arguments of this call is `NULL`.
///
/// Aggregate and window functions uniformly skip nulls under SQL
/// semantics. For scalars, this consults the function-level
/// `called_on_null_input` flag, but only at unknown-typed argument
/// positions. That conflation of function-level metadata with a
/// per-call check is a known approximation; tightening it would
/// silently change overload selection for existing queries, so it
/// stays.
fn returns_null_on_given_input_types(function: &ApplicableFunction, actual: &[ScalarType]) -> bool {
    if function.bound.kind != FunctionKind::Scalar {
        return true;
    }
    for actual_type in actual {
        if actual_type.is_unknown() && function.called_on_null_input {
            return false;
        }
    }
    true
}

fn ambiguous(
    name: &QualifiedFunctionName,
    actual: &[ScalarType],
    candidates: Vec<Signature>,
) -> ResolutionError {
    ResolutionError::AmbiguousFunctionCall {
        name: name.clone(),
        arg_types: actual.to_vec(),
        candidates,
    }
}

fn not_found(
    name: &QualifiedFunctionName,
    candidates: &[FunctionCandidate],
    actual: &[ScalarType],
) -> ResolutionError {
    ResolutionError::FunctionNotFound {
        name: name.clone(),
        arg_types: actual.to_vec(),
        candidates: candidates.iter().map(|c| c.signature.clone()).collect(),
    }
}
