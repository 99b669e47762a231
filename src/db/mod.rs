//! Storage layer (local JSON files).

pub mod token_file;

pub use token_file::TokenStore;
