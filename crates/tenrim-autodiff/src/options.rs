//! Options shared by the gradient and Hessian-vector builders

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for [`gradient`](crate::gradient) and
/// [`hessian_vector_product`](crate::hessian_vector_product)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RiemannianOptions {
    /// Graph scope label and tracing span field
    pub name: String,

    /// Check that the function does not depend on the TT representation
    pub debug: bool,

    /// Log the extra cost of the invariance check when it is enabled
    pub debug_advisory: bool,
}

impl Default for RiemannianOptions {
    fn default() -> Self {
        Self {
            name: "riemannian".to_string(),
            debug: true,
            debug_advisory: true,
        }
    }
}

impl RiemannianOptions {
    /// Set the scope label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable the invariance check
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable the overhead advisory
    pub fn with_debug_advisory(mut self, advisory: bool) -> Self {
        self.debug_advisory = advisory;
        self
    }
}
