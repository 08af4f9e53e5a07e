use clap::{Args, Subcommand};

use common::events::{Event, EventPublisher, PublishError, DEFAULT_RESUME_STEP};

use crate::cli::op::{ContextError, Op, OpContext};

crate::command_enum! {
    (Resume, Resume),
}

// Rename the generated Command to PostprocessingCommand for clarity
pub type PostprocessingCommand = Command;

/// Drive the postprocessing of uploads
#[derive(Args, Debug, Clone)]
pub struct Postprocessing {
    #[command(subcommand)]
    pub command: PostprocessingCommand,
}

#[async_trait::async_trait]
impl Op for Postprocessing {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Resume postprocessing of an upload, or of every upload in a step
#[derive(Args, Debug, Clone)]
#[command(visible_alias = "restart")]
pub struct Resume {
    /// Upload to resume; all uploads in --step if unset
    #[arg(short, long)]
    pub upload_id: Option<String>,

    /// Resume every upload waiting in this step. Ignored with --upload-id
    #[arg(short, long, default_value = DEFAULT_RESUME_STEP)]
    pub step: String,

    /// Restart the upload from the first step instead of resuming it
    #[arg(short, long, requires = "upload_id")]
    pub restart: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl Resume {
    fn event(&self) -> Event {
        match (&self.upload_id, self.restart) {
            (Some(upload_id), true) => Event::restart(upload_id.clone()),
            _ => Event::resume(self.upload_id.clone(), Some(self.step.clone())),
        }
    }
}

#[async_trait::async_trait]
impl Op for Resume {
    type Error = ResumeError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let event = self.event();
        let name = event.name();
        let id = ctx.publisher()?.publish(event).await?;
        tracing::info!(event = name, %id, "published postprocessing event");
        Ok(format!("Published {} event {}", name, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        resume: Resume,
    }

    fn parse(args: &[&str]) -> Result<Resume, clap::Error> {
        let mut argv = vec!["resume"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).map(|cli| cli.resume)
    }

    #[test]
    fn test_resume_step_by_default() {
        match parse(&[]).unwrap().event() {
            Event::ResumePostprocessing { upload_id, step, .. } => {
                assert_eq!(upload_id, None);
                assert_eq!(step.as_deref(), Some("finished"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_upload_id_ignores_step() {
        match parse(&["-u", "upload-1", "-s", "virusscan"]).unwrap().event() {
            Event::ResumePostprocessing { upload_id, step, .. } => {
                assert_eq!(upload_id.as_deref(), Some("upload-1"));
                assert_eq!(step, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_restart() {
        let event = parse(&["-u", "upload-1", "--restart"]).unwrap().event();
        assert_eq!(event.name(), "RestartPostprocessing");
        assert!(parse(&["--restart"]).is_err());
    }
}
