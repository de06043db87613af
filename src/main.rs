//! Binary entry point for the `nss-pipe` tool.
//!
//! The runtime logic lives in `not_secret_stream::pipe`, so this binary only
//! delegates to the library.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> { not_secret_stream::pipe::run().await }
