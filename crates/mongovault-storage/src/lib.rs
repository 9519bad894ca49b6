//! Concrete storage implementations.
//! Connection records use AES-GCM with keys sourced from the OS keyring (or test
//! doubles); folders and favorites are plain JSON documents.

pub mod json_document;
pub mod key_provider;
pub mod secure_file_store;
