//! Stage contract, concrete stages and the runtime pipeline that chains them.

pub mod bitswap_stage;
pub mod chain;
pub mod factory;
pub mod stage;
pub mod zstd_stage;


pub use bitswap_stage::BitswapStage;
pub use chain::{Pipeline, PipelineDescriptor, StageDescriptor};
pub use factory::build_stage;
pub use stage::{Stage, StageContext};
pub use zstd_stage::ZstdStage;
