use std::path::PathBuf;

use clap::{Args, Subcommand};

use common::layout::Layout;
use common::metadata::{
    attribute_to_string, filter_attributes, parse_attribute_value, MessagePackBackend,
    MetadataBackend, MetadataError, ParsedValue,
};
use common::reference::ReferenceError;

use super::NodeTarget;
use crate::cli::op::{ContextError, Op, OpContext};

crate::command_enum! {
    (Dump, Dump),
    (Get, Get),
    (Set, Set),
}

// Rename the generated Command to MetadataCommand for clarity
pub type MetadataCommand = Command;

/// Read and write node attributes
#[derive(Args, Debug, Clone)]
pub struct Metadata {
    #[command(subcommand)]
    pub command: MetadataCommand,
}

#[async_trait::async_trait]
impl Op for Metadata {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataOpError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("invalid node: {0}")]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("invalid attribute pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("no attribute matches '{0}'")]
    NoMatch(String),
}

/// On-disk path of the node `target` addresses
fn node_path(ctx: &OpContext, target: &NodeTarget) -> Result<PathBuf, MetadataOpError> {
    let root = ctx.storage_root(target.root.as_ref())?;
    let (space_id, node_id) = target.ids()?;
    Ok(Layout::new(root).node_path(&space_id, &node_id))
}

fn render(attributes: &[(&str, &[u8])]) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!("{}={}", name, attribute_to_string(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print every attribute of a node
#[derive(Args, Debug, Clone)]
pub struct Dump {
    #[command(flatten)]
    pub target: NodeTarget,
}

#[async_trait::async_trait]
impl Op for Dump {
    type Error = MetadataOpError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let path = node_path(ctx, &self.target)?;
        let attributes = MessagePackBackend::new().all(&path).await?;
        Ok(render(&filter_attributes(&attributes, None)?))
    }
}

/// Print the attributes whose name matches a pattern
#[derive(Args, Debug, Clone)]
pub struct Get {
    #[command(flatten)]
    pub target: NodeTarget,

    /// Attribute name or shell-style pattern, e.g. `user.oc.*`
    #[arg(short, long)]
    pub attribute: String,
}

#[async_trait::async_trait]
impl Op for Get {
    type Error = MetadataOpError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let path = node_path(ctx, &self.target)?;
        let attributes = MessagePackBackend::new().all(&path).await?;
        let selected = filter_attributes(&attributes, Some(&self.attribute))?;
        if selected.is_empty() {
            return Err(MetadataOpError::NoMatch(self.attribute.clone()));
        }
        Ok(render(&selected))
    }
}

/// Write a single attribute
#[derive(Args, Debug, Clone)]
pub struct Set {
    #[command(flatten)]
    pub target: NodeTarget,

    /// Attribute name
    #[arg(short, long)]
    pub attribute: String,

    /// Value; prefix with `0s` for base64 or `0x` for hex
    #[arg(long)]
    pub value: String,
}

#[async_trait::async_trait]
impl Op for Set {
    type Error = MetadataOpError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let path = node_path(ctx, &self.target)?;
        let value = match parse_attribute_value(&self.value) {
            ParsedValue::Decoded(value) => value,
            ParsedValue::Raw { value, reason } => {
                tracing::warn!(attribute = %self.attribute, reason = %reason, "storing value verbatim");
                value
            }
        };

        MessagePackBackend::new()
            .set(&path, &self.attribute, &value)
            .await?;
        Ok(format!(
            "{}={}",
            self.attribute,
            attribute_to_string(&value)
        ))
    }
}
