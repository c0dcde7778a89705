// Service exports
pub mod cache;
pub mod semantic;
pub mod shared;

pub use cache::{CacheError, CacheKey, CacheService, CacheStats, LocalCache, MAX_TTL};
pub use semantic::{HttpSemanticAnalyzer, SemanticAnalyzer, SemanticError};
pub use shared::{RedisSharedCache, SharedCache};
