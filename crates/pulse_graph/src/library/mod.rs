// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.

pub mod math;
pub mod signal;

use crate::node::NodeRegistry;

/// Create a registry holding every built-in node type
pub fn create_standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    signal::register_signal_nodes(&mut registry);
    math::register_math_nodes(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = create_standard_registry();
        assert_eq!(registry.len(), 11);
        assert!(registry.contains("sig_lfo"));
        assert!(registry.contains("math_op"));
        assert!(registry.contains("math_const"));
    }
}
