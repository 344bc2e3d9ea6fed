//! Purpose: Shared library crate used by the `quill` CLI and tests.
//! Exports: `core` (record store, error modeling), `config_paths`, `request`, `editor`.
//! Role: Internal library backing the binary; not a stable public SDK.
//! Invariants: All persistent state flows through `core::store::Store`.
//! Invariants: Collaborator modules never touch the store file directly.
pub mod config_paths;
pub mod core;
pub mod editor;
pub mod request;
