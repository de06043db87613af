//! Command-line interface for the `nss-pipe` tool.
//!
//! Values merge from defaults, a `.nss.toml` dotfile, `NSS_` environment
//! variables and command-line flags, in increasing order of precedence.

#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![allow(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]
#![allow(
    unfulfilled_lint_expectations,
    reason = "derive macros conditionally generate items"
)]

use clap::Parser;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use super::PipeError;
use crate::{
    config::{DEFAULT_HIGH_WATER_MARK, StreamConfig},
    framing::DEFAULT_MAX_FRAME_LENGTH,
    identity::{KeyPair, PublicKey},
};

/// Where the pipe obtains its TCP connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Accept a single connection on this address.
    Listen(String),
    /// Connect to this address.
    Connect(String),
}

/// Runtime configuration for `nss-pipe`.
#[expect(
    missing_docs,
    reason = "OrthoConfig derive macro generates items that cannot be documented"
)]
#[derive(Parser, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[command(name = "nss-pipe", about = "Pipe stdio over a not-secret stream")]
#[ortho_config(prefix = "NSS_")]
pub struct PipeConfig {
    /// Address to accept a single connection on.
    #[arg(long)]
    pub listen: Option<String>,
    /// Address to connect to.
    #[arg(long)]
    pub connect: Option<String>,
    /// Width of the frame length prefix in bits (8, 16, 24 or 32).
    #[ortho_config(default = 32)]
    #[arg(long, default_value_t = 32)]
    pub framing_bits: u8,
    /// Hex-encoded 32-byte public key; generated when absent.
    #[arg(long)]
    pub public_key: Option<String>,
    /// Buffered bytes after which writes wait for the peer to drain.
    #[ortho_config(default = DEFAULT_HIGH_WATER_MARK)]
    #[arg(long, default_value_t = DEFAULT_HIGH_WATER_MARK)]
    pub high_water_mark: usize,
    /// Largest frame, in bytes, accepted from or sent to the peer.
    #[ortho_config(default = DEFAULT_MAX_FRAME_LENGTH)]
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,
}

impl PipeConfig {
    /// Resolve the single endpoint the pipe should use.
    ///
    /// # Errors
    /// Returns [`PipeError::Endpoint`] unless exactly one of `listen` and
    /// `connect` is set.
    pub fn endpoint(&self) -> Result<Endpoint, PipeError> {
        match (&self.listen, &self.connect) {
            (Some(addr), None) => Ok(Endpoint::Listen(addr.clone())),
            (None, Some(addr)) => Ok(Endpoint::Connect(addr.clone())),
            _ => Err(PipeError::Endpoint),
        }
    }

    /// Build the stream options described by this configuration.
    ///
    /// # Errors
    /// Returns [`PipeError::Config`] for an unsupported framing width, a
    /// malformed public key, or a zero high-water mark or frame limit.
    pub fn stream_config(&self) -> Result<StreamConfig, PipeError> {
        let mut config = StreamConfig::default()
            .with_framing_size_bits(self.framing_bits)?
            .with_high_water_mark(self.high_water_mark)?
            .with_max_frame_length(self.max_frame_length)?;
        if let Some(hex_key) = &self.public_key {
            let public_key: PublicKey = hex_key.parse()?;
            config = config.with_key_pair(KeyPair::new(public_key));
        }
        Ok(config)
    }
}
