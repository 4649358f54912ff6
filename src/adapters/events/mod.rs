//! Event publisher adapters.

mod in_memory;
mod redis_publisher;

pub use in_memory::InMemoryEventPublisher;
pub use redis_publisher::RedisEventPublisher;
