// Lectern - lib.rs
//
// Library entry point: the platform layer of the Lectern presentation app,
// exposed for the CLI driver and for integration testing.

pub mod app;
pub mod platform;
pub mod util;
