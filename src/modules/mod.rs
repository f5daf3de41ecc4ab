pub mod progress;
pub mod video;
