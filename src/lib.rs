pub mod config;
pub mod error;
pub mod gesture;
pub mod model_download;
pub mod pipeline;
pub mod server;
pub mod types;

pub use config::Config;
pub use error::{DecodeError, ProcessError};
pub use gesture::{FistClassifier, FistThresholds, GeometricFeatures, classify};
pub use pipeline::{FrameProcessor, LandmarkProvider, ProviderPool};
pub use server::GestureService;
pub use types::{Frame, FrameResult, HandPose, Landmark, PixelLandmark};
