//! Versioned template registry for promptforge
//!
//! Stores prompt templates with immutable version history, resolves which
//! version is current (repairing pointer drift instead of crashing), and
//! serves reads through a TTL cache that degrades to pass-through when its
//! backend is unavailable.

pub mod admin;
pub mod cache;
pub mod entities;
pub mod error;
pub mod resolver;
pub mod service;
pub mod store;

pub use admin::{AdminOps, TemplateSeed};
pub use cache::{CacheBackend, CacheError, CacheKey, MemoryCache, PromptCache, ResolvedSource};
pub use entities::{RenderedPrompt, Template, TemplateKey, TenantScope, Version, VersionId};
pub use error::{RegistryError, Result};
pub use resolver::{Resolved, resolve_current};
pub use service::PromptService;
pub use store::{MemoryStore, TemplateStore};

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
