use std::convert::Infallible;

use clap::Args;

/// Print the version of this tool
#[derive(Args, Debug, Clone)]
pub struct Version;

#[async_trait::async_trait]
impl crate::cli::op::Op for Version {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(format!(
            "{} {} ({})",
            env!("CARGO_BIN_NAME"),
            env!("CARGO_PKG_VERSION"),
            if cfg!(debug_assertions) { "debug" } else { "release" }
        ))
    }
}
