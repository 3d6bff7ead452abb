//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock collaborators.  All tests run on the host (x86_64) with no
//! real hardware required.

mod adapter_flow_tests;
mod mock_net;
mod stack_flow_tests;
