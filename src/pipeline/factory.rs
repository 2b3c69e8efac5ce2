// In: src/pipeline/factory.rs

//! Builds stages from their textual form, `name` or `name(k=v,...)`.

use crate::error::BitswapError;
use crate::pipeline::bitswap_stage::{self, BitswapStage};
use crate::pipeline::stage::Stage;
use crate::pipeline::zstd_stage::{self, ZstdStage};

/// Plane widths a `bitswap<P>` stage name may carry.
pub const BITSWAP_PLANE_WIDTHS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Splits `name(config)` into its parts; a bare `name` has an empty config.
pub fn split_stage(text: &str) -> Result<(&str, &str), BitswapError> {
    let text = text.trim();
    match text.find('(') {
        None => Ok((text, "")),
        Some(open) => {
            let inner = text[open + 1..].strip_suffix(')').ok_or_else(|| {
                BitswapError::InvalidConfig(format!("unbalanced parentheses in '{}'", text))
            })?;
            Ok((text[..open].trim(), inner))
        }
    }
}

/// Every stage name the factory knows.
pub fn known_stages() -> Vec<String> {
    BITSWAP_PLANE_WIDTHS
        .iter()
        .map(|p| format!("{}{}", bitswap_stage::NAME_PREFIX, p))
        .chain(std::iter::once(zstd_stage::NAME.to_string()))
        .collect()
}

/// Builds a stage from a name and its config string.
pub fn build_named(name: &str, config: &str) -> Result<Box<dyn Stage>, BitswapError> {
    if name == zstd_stage::NAME {
        return Ok(Box::new(ZstdStage::from_config(config)?));
    }
    if known_stages().iter().any(|k| k == name) {
        return Ok(Box::new(BitswapStage::from_name(name, config)?));
    }
    Err(BitswapError::UnknownStage(name.to_string()))
}

/// Builds a stage from `name` or `name(k=v,...)`.
pub fn build_stage(text: &str) -> Result<Box<dyn Stage>, BitswapError> {
    let (name, config) = split_stage(text)?;
    build_named(name, config)
}
