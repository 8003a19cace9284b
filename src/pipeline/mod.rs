pub mod decode;
pub mod orchestrator;
pub mod provider;
pub mod recognizer;

// Re-exports for convenience
pub use decode::{decode_image_bytes, decode_image_payload};
pub use orchestrator::{FrameProcessor, to_pixel_landmarks};
pub use provider::{LandmarkProvider, PooledProvider, ProviderPool};
pub use recognizer::{ProviderConfig, create_ort_provider};
