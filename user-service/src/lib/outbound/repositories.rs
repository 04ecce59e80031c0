pub mod fallback;
pub mod memory;
pub mod postgres;

pub use fallback::FallbackUserRepository;
pub use fallback::StorageMode;
pub use memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
