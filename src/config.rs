// In: src/config.rs

//! Configuration for the bitswap stages.
//!
//! Every stage is configured by a small serde struct. On the wire (inside a
//! pipeline string such as `bitswap4(n_threads=2)->zstd(level=5)`) the same
//! settings travel as comma separated `key=value` pairs, called "minors"
//! here. `parse_minors` and `format_minors` are the shared codec for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BitswapError;

//==================================================================================
// I. Config-String Codec
//==================================================================================

/// Separates `key=value` pairs inside a stage config.
pub const PAIR_SEPARATOR: char = ',';
/// Separates a key from its value.
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Splits `"k1=v1,k2=v2"` into ordered pairs. Whitespace around keys and
/// values is ignored; an empty string yields no pairs.
///
/// # Errors
/// `InvalidConfig` for a pair without `=`, an empty key, or a repeated key.
pub fn parse_minors(config: &str) -> Result<Vec<(String, String)>, BitswapError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for item in config.split(PAIR_SEPARATOR) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = item.split_once(KEY_VALUE_SEPARATOR).ok_or_else(|| {
            BitswapError::InvalidConfig(format!("expected key=value, got '{}'", item))
        })?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(BitswapError::InvalidConfig(format!("empty key in '{}'", item)));
        }
        if pairs.iter().any(|(k, _)| k == key) {
            return Err(BitswapError::InvalidConfig(format!("duplicate key '{}'", key)));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

/// Inverse of [`parse_minors`].
pub fn format_minors<K: AsRef<str>, V: fmt::Display>(pairs: &[(K, V)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}{}{}", k.as_ref(), KEY_VALUE_SEPARATOR, v))
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, BitswapError> {
    value
        .parse()
        .map_err(|_| BitswapError::InvalidConfig(format!("invalid value '{}' for '{}'", value, key)))
}

//==================================================================================
// II. Bitswap Stage Configuration
//==================================================================================

/// Which kernel family a bitswap stage may use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Vectorisation {
    /// **Default:** SSE2 lanes when the CPU has them, the scalar kernel otherwise.
    #[default]
    Auto,
    /// Always the scalar reference kernel.
    Scalar,
    /// The vector algorithm on array-backed lanes, on any CPU.
    Portable,
}

impl fmt::Display for Vectorisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vectorisation::Auto => "auto",
            Vectorisation::Scalar => "scalar",
            Vectorisation::Portable => "portable",
        };
        f.write_str(s)
    }
}

impl FromStr for Vectorisation {
    type Err = BitswapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Vectorisation::Auto),
            "scalar" => Ok(Vectorisation::Scalar),
            "portable" => Ok(Vectorisation::Portable),
            other => Err(BitswapError::InvalidConfig(format!(
                "unknown vectorisation '{}'",
                other
            ))),
        }
    }
}

/// Settings of one bitplane reorder stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitswapConfig {
    /// Bits per plane. Must divide the element width at encode time.
    #[serde(default = "default_plane_width")]
    pub num_bits_per_plane: u32,

    /// Worker threads; 1 runs on the calling thread.
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,

    #[serde(default)]
    pub vectorisation: Vectorisation,
}

impl Default for BitswapConfig {
    fn default() -> Self {
        Self {
            num_bits_per_plane: default_plane_width(),
            n_threads: default_n_threads(),
            vectorisation: Vectorisation::default(),
        }
    }
}

fn default_plane_width() -> u32 {
    1
}

fn default_n_threads() -> usize {
    1
}

/// Largest element width any stage handles.
const MAX_TYPE_WIDTH: u32 = 64;

/// Upper bound on `n_threads`; every call builds its own pool.
pub const MAX_THREADS: usize = 256;

impl BitswapConfig {
    pub fn new(num_bits_per_plane: u32) -> Self {
        Self {
            num_bits_per_plane,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    pub fn with_vectorisation(mut self, vectorisation: Vectorisation) -> Self {
        self.vectorisation = vectorisation;
        self
    }

    /// Checks everything that does not depend on the element type.
    pub fn validate(&self) -> Result<(), BitswapError> {
        let p = self.num_bits_per_plane;
        if p == 0 || p > MAX_TYPE_WIDTH || !p.is_power_of_two() {
            return Err(BitswapError::InvalidPlaneWidth {
                plane_width: p,
                type_width: MAX_TYPE_WIDTH,
            });
        }
        if self.n_threads == 0 || self.n_threads > MAX_THREADS {
            return Err(BitswapError::InvalidThreadCount(self.n_threads as i64));
        }
        Ok(())
    }

    /// Applies the pairs of a config string on top of `self`.
    pub fn apply_minors(mut self, config: &str) -> Result<Self, BitswapError> {
        for (key, value) in parse_minors(config)? {
            match key.as_str() {
                "num_bits_per_plane" => self.num_bits_per_plane = parse_value(&key, &value)?,
                "n_threads" => {
                    let n: i64 = parse_value(&key, &value)?;
                    if n < 1 || n > MAX_THREADS as i64 {
                        return Err(BitswapError::InvalidThreadCount(n));
                    }
                    self.n_threads = n as usize;
                }
                "vectorisation" => self.vectorisation = value.parse()?,
                other => {
                    return Err(BitswapError::InvalidConfig(format!(
                        "unknown bitswap option '{}'",
                        other
                    )))
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// `num_bits_per_plane=<P>,n_threads=<n>,vectorisation=<v>`
    pub fn to_minors(&self) -> String {
        format_minors(&[
            ("num_bits_per_plane", self.num_bits_per_plane.to_string()),
            ("n_threads", self.n_threads.to_string()),
            ("vectorisation", self.vectorisation.to_string()),
        ])
    }
}

//==================================================================================
// III. Zstd Stage Configuration
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdConfig {
    #[serde(default = "default_zstd_level")]
    pub level: i32,
}

impl Default for ZstdConfig {
    fn default() -> Self {
        Self {
            level: default_zstd_level(),
        }
    }
}

fn default_zstd_level() -> i32 {
    3
}

impl ZstdConfig {
    pub fn validate(&self) -> Result<(), BitswapError> {
        let range = zstd::compression_level_range();
        if !range.contains(&self.level) {
            return Err(BitswapError::InvalidConfig(format!(
                "zstd level {} outside {}..={}",
                self.level,
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }

    pub fn apply_minors(mut self, config: &str) -> Result<Self, BitswapError> {
        for (key, value) in parse_minors(config)? {
            match key.as_str() {
                "level" => self.level = parse_value(&key, &value)?,
                other => {
                    return Err(BitswapError::InvalidConfig(format!(
                        "unknown zstd option '{}'",
                        other
                    )))
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn to_minors(&self) -> String {
        format_minors(&[("level", self.level)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minors_basic() {
        let pairs = parse_minors(" n_threads = 4 ,vectorisation=scalar").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("n_threads".to_string(), "4".to_string()),
                ("vectorisation".to_string(), "scalar".to_string())
            ]
        );
        assert!(parse_minors("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_minors_rejects_malformed() {
        assert!(matches!(parse_minors("n_threads"), Err(BitswapError::InvalidConfig(_))));
        assert!(matches!(parse_minors("=3"), Err(BitswapError::InvalidConfig(_))));
        assert!(matches!(parse_minors("a=1,a=2"), Err(BitswapError::InvalidConfig(_))));
    }

    #[test]
    fn test_bitswap_config_roundtrip() {
        let config = BitswapConfig::new(4)
            .with_threads(3)
            .with_vectorisation(Vectorisation::Portable);
        let text = config.to_minors();
        assert_eq!(text, "num_bits_per_plane=4,n_threads=3,vectorisation=portable");
        let parsed = BitswapConfig::default().apply_minors(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_bitswap_config_errors() {
        let base = BitswapConfig::default();
        assert!(matches!(
            base.apply_minors("n_threads=0"),
            Err(BitswapError::InvalidThreadCount(0))
        ));
        assert!(matches!(
            base.apply_minors("n_threads=-2"),
            Err(BitswapError::InvalidThreadCount(-2))
        ));
        assert!(matches!(
            base.apply_minors("n_threads=100000"),
            Err(BitswapError::InvalidThreadCount(100000))
        ));
        assert!(base.apply_minors("n_threads=256").is_ok());
        assert!(matches!(
            BitswapConfig::new(1).with_threads(MAX_THREADS + 1).validate(),
            Err(BitswapError::InvalidThreadCount(257))
        ));
        assert!(matches!(
            base.apply_minors("num_bits_per_plane=3"),
            Err(BitswapError::InvalidPlaneWidth { .. })
        ));
        assert!(matches!(
            base.apply_minors("vectorisation=avx"),
            Err(BitswapError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.apply_minors("colour=red"),
            Err(BitswapError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_defaults() {
        let config: BitswapConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BitswapConfig::default());
        let config: BitswapConfig =
            serde_json::from_str(r#"{"num_bits_per_plane": 8, "vectorisation": "scalar"}"#).unwrap();
        assert_eq!(config.num_bits_per_plane, 8);
        assert_eq!(config.vectorisation, Vectorisation::Scalar);
        assert_eq!(config.n_threads, 1);
    }

    #[test]
    fn test_zstd_config() {
        let config = ZstdConfig::default().apply_minors("level=7").unwrap();
        assert_eq!(config.level, 7);
        assert_eq!(config.to_minors(), "level=7");
        assert!(ZstdConfig::default().apply_minors("level=1000").is_err());
        assert!(ZstdConfig::default().apply_minors("level=x").is_err());
    }
}
