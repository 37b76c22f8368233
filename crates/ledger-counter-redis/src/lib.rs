mod counter;
mod scale;

pub use counter::{RedisCounter, RedisCounterBuilder};
