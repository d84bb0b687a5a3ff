// Lectern - app/mod.rs
//
// Application layer: the debounce primitive and the document file watcher.
// Dependencies: util.
// Must NOT depend on: platform specifics.

pub mod debounce;
pub mod watcher;
