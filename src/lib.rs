#![recursion_limit = "256"]

pub mod anchors;
pub mod boxes;
pub mod config;
pub mod debug;
pub mod error;
pub mod filter;
pub mod inference;
pub mod labels;
pub mod layer;
pub mod levels;
pub mod matching;
pub mod proposals;
pub mod sampler;
pub mod tensor_ops;
pub mod training;
pub mod unmap;

pub use config::{AnchorGridConfig, AnchorLayerConfig, AnchorTargetConfig, LevelConfig};
pub use error::AnchorError;
pub use inference::Detections;
pub use labels::Label;
pub use layer::AnchorLayer;
pub use proposals::{Phase, ProposalSampler, Proposals, Unsampled};
pub use sampler::{IndexSampler, RandomSampler};
pub use training::EncodedTargets;
