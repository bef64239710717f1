//! Shared types, error model, and configuration for ModuleMap.
//!
//! This crate is the foundation depended on by all other ModuleMap crates.
//! It provides:
//! - [`ModuleMapError`] — the unified error type
//! - Domain types ([`CrawlSnapshot`], [`PageStructure`], [`Module`])
//! - Configuration ([`AppConfig`], [`CrawlOptions`], [`ExtractOptions`])

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, CompletionModel, CrawlOptions, DefaultsConfig, ExtractOptions,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ModuleMapError, Result};
pub use types::{
    CodeBlock, CrawlSnapshot, Heading, ListBlock, ListItem, ListKind, Module, NestedList,
    PageMetadata, PageStructure, TableBlock,
};
