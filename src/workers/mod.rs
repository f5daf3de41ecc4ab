pub mod pool;
pub mod reconciler;
pub mod transcoder;
