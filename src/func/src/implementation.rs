// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Executable function implementations, as produced by specialization.
//!
//! Implementations are descriptors handed to the execution layer; how a
//! function actually evaluates is not this crate's concern. What matters
//! here is that each implementation is built at most once per distinct
//! bound signature and shared thereafter, so implementations are always
//! passed around as `Arc`s.

use std::fmt;
use std::sync::Arc;

use trellis_repr::ScalarType;

use crate::sig::Signature;

/// The executable form of a scalar function, specialized to one fully
/// bound signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarImplementation {
    /// The bound signature this implementation was specialized for.
    pub signature: Signature,
    /// Whether the function must be invoked on `NULL` input.
    pub called_on_null_input: bool,
    /// The SQL definition, for catalog-hosted functions defined in SQL.
    pub body: Option<String>,
}

/// The executable form of an aggregate function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateImplementation {
    /// The bound signature this implementation was specialized for.
    pub signature: Signature,
    /// The type of the aggregate's intermediate accumulation state.
    pub intermediate_type: ScalarType,
}

/// The executable form of a window function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowImplementation {
    /// A natively declared window function.
    Native {
        /// The bound signature this implementation was specialized for.
        signature: Signature,
    },
    /// An aggregate adapted to run over a window frame. Any aggregate is
    /// usable as a window function under standard SQL semantics.
    AggregateAdapter(Arc<AggregateImplementation>),
}

impl WindowImplementation {
    /// The bound signature this implementation was specialized for.
    pub fn signature(&self) -> &Signature {
        match self {
            WindowImplementation::Native { signature } => signature,
            WindowImplementation::AggregateAdapter(aggregate) => &aggregate.signature,
        }
    }
}

/// A specialized implementation of any kind.
#[derive(Clone)]
pub enum FunctionImplementation {
    /// A scalar implementation.
    Scalar(Arc<ScalarImplementation>),
    /// An aggregate implementation.
    Aggregate(Arc<AggregateImplementation>),
    /// A window implementation.
    Window(Arc<WindowImplementation>),
}

impl FunctionImplementation {
    /// The bound signature this implementation was specialized for.
    pub fn signature(&self) -> &Signature {
        match self {
            FunctionImplementation::Scalar(s) => &s.signature,
            FunctionImplementation::Aggregate(a) => &a.signature,
            FunctionImplementation::Window(w) => w.signature(),
        }
    }
}

impl fmt::Debug for FunctionImplementation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            FunctionImplementation::Scalar(_) => "Scalar",
            FunctionImplementation::Aggregate(_) => "Aggregate",
            FunctionImplementation::Window(_) => "Window",
        };
        f.debug_struct("FunctionImplementation")
            .field("kind", &kind)
            .field("signature", self.signature())
            .finish()
    }
}
