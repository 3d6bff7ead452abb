//! Application core: the orchestrator and the ports it drives.
//!
//! Everything here is hardware-agnostic.  Network stacks are reached only
//! through the **port traits** in [`ports`], so the full lifecycle can be
//! exercised on the host against mocks.

pub mod credentials;
pub mod ports;
pub mod service;
