pub mod distance;
pub mod pool;
