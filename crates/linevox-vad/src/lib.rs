pub mod constants;
pub mod detector;
pub mod energy;
pub mod params;

pub use constants::*;
pub use detector::{DetectorConfig, FrameDecision, SpeechDetector, VadState};
pub use energy::EnergyAnalyzer;
pub use params::RuntimeParameters;
