//! Per-route authorization decision.
//!
//! The gate only answers allow or deny; redirects and rendering belong to the
//! HTTP layer.

use thiserror::Error;

use crate::domain::types::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("route requires `{required}` but request is `{actual}`")]
pub struct Denied {
    pub required: Capability,
    pub actual: Capability,
}

pub fn authorize(required: Capability, actual: Capability) -> Result<(), Denied> {
    if actual >= required {
        Ok(())
    } else {
        Err(Denied { required, actual })
    }
}
