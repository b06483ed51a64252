/// File utilities
pub mod files;

/// Tensor Utilities
pub mod tensors;

/// Utilities for token and label lookups
pub mod classes;
