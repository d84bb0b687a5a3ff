// Lectern - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: util, standard library, directories, image, regex crates.
// Must NOT depend on: app.

pub mod config;
pub mod host;
pub mod launcher;
pub mod process;
pub mod resources;
pub mod screensaver;
