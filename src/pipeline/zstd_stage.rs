// In: src/pipeline/zstd_stage.rs

//! The zstd compressor stage; a thin adapter over `kernels::zstd`.

use crate::config::ZstdConfig;
use crate::error::BitswapError;
use crate::kernels::zstd;
use crate::pipeline::stage::{Stage, StageContext};

pub const NAME: &str = "zstd";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZstdStage {
    config: ZstdConfig,
}

impl ZstdStage {
    pub fn new(config: ZstdConfig) -> Result<Self, BitswapError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_config(config: &str) -> Result<Self, BitswapError> {
        Self::new(ZstdConfig::default().apply_minors(config)?)
    }

    pub fn level(&self) -> i32 {
        self.config.level
    }
}

impl Stage for ZstdStage {
    fn name(&self) -> String {
        NAME.to_string()
    }

    fn config(&self) -> String {
        self.config.to_minors()
    }

    fn is_compressor(&self) -> bool {
        true
    }

    fn max_encoded_size(&self, input_bytes: usize) -> usize {
        zstd::max_encoded_len(input_bytes)
    }

    fn encode(&self, input: &[u8], output: &mut Vec<u8>, _ctx: &StageContext) -> Result<(), BitswapError> {
        zstd::encode(input, output, self.config.level)
    }

    fn decode(&self, input: &[u8], output: &mut Vec<u8>, _ctx: &StageContext) -> Result<(), BitswapError> {
        zstd::decode(input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoxelType;

    #[test]
    fn test_zstd_stage_contract() {
        let stage = ZstdStage::from_config("level=9").unwrap();
        assert_eq!(stage.name(), "zstd");
        assert_eq!(stage.config(), "level=9");
        assert!(stage.is_compressor());
        assert!(stage.max_encoded_size(100) > 100);

        let ctx = StageContext::flat(VoxelType::UInt8, 4096);
        let input = vec![3u8; 4096];
        let mut enc = Vec::new();
        stage.encode(&input, &mut enc, &ctx).unwrap();
        assert!(enc.len() <= stage.max_encoded_size(input.len()));
        let mut dec = Vec::new();
        stage.decode(&enc, &mut dec, &ctx).unwrap();
        assert_eq!(dec, input);
    }
}
