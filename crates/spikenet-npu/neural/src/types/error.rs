// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for spikenet operations

use core::fmt;

/// Error types for spikenet operations
///
/// Build-time variants abort network construction. Nothing in the per-cycle
/// path returns these; run-time lookups use sentinels instead.
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// A layer shape has a zero dimension or no dimensions
    ZeroSizedLayer(String),

    /// A layer shape with an unsupported rank (only 1D, 2D and 4D are valid)
    InvalidShape { layer: String, shape: Vec<usize> },

    DuplicateLayer(String),

    /// A named cross-reference that could not be resolved at build time
    MissingReference { owner: String, reference: String },

    /// A connection pattern that cannot connect the given layer shapes
    MalformedPattern { connection: String, reason: String },

    ArraySizeMismatch { expected: usize, actual: usize },

    LayerNotFound(String),

    UnknownVariable(String),

    InvalidBackend(String),

    /// Weight snapshot does not match the network it is applied to
    WeightFileMismatch(String),

    SerializationError(String),

    InvalidParameter(String),

    ComputationError(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ZeroSizedLayer(name) => write!(f, "Layer '{}' has a zero-sized shape", name),
            NetError::InvalidShape { layer, shape } => {
                write!(f, "Layer '{}' has unsupported shape {:?} (expected 1D, 2D or 4D)", layer, shape)
            }
            NetError::DuplicateLayer(name) => write!(f, "Duplicate layer name: {}", name),
            NetError::MissingReference { owner, reference } => {
                write!(f, "'{}' references unknown layer '{}'", owner, reference)
            }
            NetError::MalformedPattern { connection, reason } => {
                write!(f, "Malformed connection pattern for {}: {}", connection, reason)
            }
            NetError::ArraySizeMismatch { expected, actual } => {
                write!(f, "Array size mismatch: expected {}, got {}", expected, actual)
            }
            NetError::LayerNotFound(name) => write!(f, "Layer not found: {}", name),
            NetError::UnknownVariable(name) => write!(f, "Unknown variable: {}", name),
            NetError::InvalidBackend(msg) => write!(f, "Invalid backend: {}", msg),
            NetError::WeightFileMismatch(msg) => write!(f, "Weight file mismatch: {}", msg),
            NetError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            NetError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            NetError::ComputationError(msg) => write!(f, "Computation error: {}", msg),
        }
    }
}

impl std::error::Error for NetError {}

pub type Result<T> = core::result::Result<T, NetError>;
pub type Error = NetError;
