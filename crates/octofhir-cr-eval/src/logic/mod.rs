//! Logic loading: content providers, translation and caching

pub mod cache;
pub mod content;
pub mod elm;
pub mod translator;

pub use cache::{CacheStats, LibraryCache};
pub use content::{
    BundleContentProvider, ContentProvider, ELM_JSON_CONTENT_TYPE, StoreContentProvider,
    library_resource,
};
pub use translator::{CompiledDefinition, CompiledLibrary, TranslationError, literal_value, translate};
