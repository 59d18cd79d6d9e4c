//
// lib.rs
//
// Library root. The binary in main.rs only starts the server; benches and
// integration tests use the modules directly.
//

pub mod backend;
pub mod config;
pub mod core_modules;
pub mod diagnostics;
pub mod fixes;
pub mod forest;
pub mod handlers;
pub mod module_index;
pub mod resolve;
pub mod state;
pub mod syntax;
pub mod types;
pub mod utf16;
pub mod workspace;

// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
