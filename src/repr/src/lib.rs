// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Core type representations for Trellis's SQL layer.
//!
//! This crate defines the value-level vocabulary that the function
//! resolution machinery in `trellis-func` speaks:
//!
//!   * [`ScalarType`] describes a concrete SQL type, like `bigint` or
//!     `array(double)`.
//!   * [`TypeSignature`] describes a *declared* type as it appears in a
//!     function signature, which may mention signature-level type
//!     variables, like the `T` in `coalesce(T, T): T`.
//!
//! Everything here is an immutable value object: cheap to clone, compared
//! structurally, and never mutated after construction.

mod scalar;
mod signature;

pub use crate::scalar::ScalarType;
pub use crate::signature::TypeSignature;
