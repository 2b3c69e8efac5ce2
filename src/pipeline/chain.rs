// In: src/pipeline/chain.rs

//! A runtime-composed chain of stages.
//!
//! A pipeline is written as stage strings joined by `->`, for example
//! `bitswap1->zstd(level=3)`. Filters come first; at most one compressor may
//! follow, and only in last position. The same chain can be described as a
//! JSON `PipelineDescriptor` for embedding in an external header.

use serde::{Deserialize, Serialize};

use crate::error::BitswapError;
use crate::pipeline::factory::{build_named, build_stage};
use crate::pipeline::stage::{Stage, StageContext};

/// Separates stages in a pipeline string.
pub const STAGE_SEPARATOR: &str = "->";

/// Serializable description of one stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: String,
    pub config: String,
}

/// Serializable description of a whole pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineDescriptor {
    pub stages: Vec<StageDescriptor>,
}

impl PipelineDescriptor {
    pub fn to_json(&self) -> Result<String, BitswapError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, BitswapError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Validates the ordering rules and takes ownership of `stages`.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, BitswapError> {
        if stages.is_empty() {
            return Err(BitswapError::InvalidConfig("empty pipeline".to_string()));
        }
        let last = stages.len() - 1;
        for (i, stage) in stages.iter().enumerate() {
            if stage.is_compressor() && i != last {
                return Err(BitswapError::InvalidConfig(format!(
                    "compressor '{}' must be the last stage",
                    stage.name()
                )));
            }
        }
        Ok(Self { stages })
    }

    /// Parses `stage->stage->...`.
    pub fn parse(text: &str) -> Result<Self, BitswapError> {
        let stages = text
            .split(STAGE_SEPARATOR)
            .map(build_stage)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stages)
    }

    pub fn from_descriptor(descriptor: &PipelineDescriptor) -> Result<Self, BitswapError> {
        let stages = descriptor
            .stages
            .iter()
            .map(|d| build_named(&d.name, &d.config))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stages)
    }

    pub fn descriptor(&self) -> PipelineDescriptor {
        PipelineDescriptor {
            stages: self
                .stages
                .iter()
                .map(|s| StageDescriptor {
                    name: s.name(),
                    config: s.config(),
                })
                .collect(),
        }
    }

    /// Canonical pipeline string; parses back to an identical pipeline.
    pub fn name(&self) -> String {
        self.stages
            .iter()
            .map(|s| format!("{}({})", s.name(), s.config()))
            .collect::<Vec<_>>()
            .join(STAGE_SEPARATOR)
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    pub fn is_compressor(&self) -> bool {
        self.stages.iter().any(|s| s.is_compressor())
    }

    pub fn max_encoded_size(&self, input_bytes: usize) -> usize {
        self.stages
            .iter()
            .fold(input_bytes, |n, s| s.max_encoded_size(n))
    }

    /// Runs every stage in order.
    pub fn encode(&self, input: &[u8], ctx: &StageContext) -> Result<Vec<u8>, BitswapError> {
        let mut buf = input.to_vec();
        for stage in &self.stages {
            let mut out = Vec::with_capacity(stage.max_encoded_size(buf.len()));
            stage
                .encode(&buf, &mut out, ctx)
                .map_err(|e| e.in_stage(stage.name()))?;
            log::debug!("{}: {} -> {} bytes", stage.name(), buf.len(), out.len());
            buf = out;
        }
        Ok(buf)
    }

    /// Runs every stage's decode in reverse order. `ctx` describes the raw,
    /// fully decoded buffer.
    pub fn decode(&self, input: &[u8], ctx: &StageContext) -> Result<Vec<u8>, BitswapError> {
        let mut buf = input.to_vec();
        for stage in self.stages.iter().rev() {
            let mut out = Vec::with_capacity(ctx.num_bytes());
            stage
                .decode(&buf, &mut out, ctx)
                .map_err(|e| e.in_stage(stage.name()))?;
            buf = out;
        }
        Ok(buf)
    }
}
