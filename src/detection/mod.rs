pub mod classifier;
pub mod engine;
pub mod instagram;
pub mod tiktok;
pub mod youtube;

pub use classifier::Classifier;
pub use engine::DetectionEngine;
pub use instagram::InstagramClassifier;
pub use tiktok::TikTokClassifier;
pub use youtube::YouTubeClassifier;
