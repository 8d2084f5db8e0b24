// Library surface for the binary and for headless/integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod timeline;
pub mod ui;
