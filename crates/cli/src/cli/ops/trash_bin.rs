use clap::{Args, Subcommand};

use common::events::{Event, EventPublisher, PublishError};
use common::reference::{Reference, ReferenceError, ResourceId};
use common::trash::{RecycleItem, RestoreError, RestoreOutcome, RestorePolicy, TrashRestoreResolver};
use dfs_cli::HttpGateway;

use crate::cli::op::{prompt, ContextError, Op, OpContext};

crate::command_enum! {
    (List, List),
    (Restore, Restore),
    (RestoreAll, RestoreAll),
    (PurgeExpired, PurgeExpired),
}

// Rename the generated Command to TrashBinCommand for clarity
pub type TrashBinCommand = Command;

/// Manage the trash-bins of spaces through the storage gateway
#[derive(Args, Debug, Clone)]
pub struct TrashBin {
    #[command(subcommand)]
    pub command: TrashBinCommand,
}

#[async_trait::async_trait]
impl Op for TrashBin {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

const EMPTY_TRASH: &str = "The trash-bin is empty. Nothing to restore";

#[derive(Debug, thiserror::Error)]
pub enum TrashBinError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error("failed to read answer: {0}")]
    Prompt(#[from] std::io::Error),
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// Some items of a batch failed; carries the report of the whole batch
    #[error("{0}")]
    Incomplete(String),
}

/// Space id argument shared by the trash-bin commands
#[derive(Args, Debug, Clone)]
pub struct SpaceArg {
    /// Space to work on, as `[storage$]space`
    pub space: String,
}

impl SpaceArg {
    fn reference(&self) -> Result<Reference, ReferenceError> {
        Ok(Reference::space_root(self.space.parse::<ResourceId>()?))
    }
}

fn resolver(ctx: &OpContext, policy: RestorePolicy) -> Result<TrashRestoreResolver<HttpGateway>, ContextError> {
    Ok(TrashRestoreResolver::new(ctx.gateway()?)
        .with_policy(policy)
        .with_max_rename_attempts(ctx.config.max_rename_attempts)
        .with_cancellation(ctx.cancel.clone()))
}

/// Print a list of all trash-bin items of a space
#[derive(Args, Debug, Clone)]
pub struct List {
    #[command(flatten)]
    pub space: SpaceArg,
}

#[async_trait::async_trait]
impl Op for List {
    type Error = TrashBinError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let space = self.space.reference()?;
        tracing::info!(space = %self.space.space, "listing trash-bin items");
        let items = resolver(ctx, RestorePolicy::default())?.list(&space).await?;
        if items.is_empty() {
            return Ok(EMPTY_TRASH.to_string());
        }
        Ok(format!("{}\nUse an itemID to restore an item.", items_table(&items)))
    }
}

/// Restore a trash-bin item by id
#[derive(Args, Debug, Clone)]
pub struct Restore {
    #[command(flatten)]
    pub space: SpaceArg,

    /// Key of the item, as shown by `trash-bin list`
    pub item_id: String,

    /// What to do if the original location is taken: skip, replace
    ///  or keep-both
    #[arg(short, long, default_value = "skip")]
    pub option: RestorePolicy,
}

#[async_trait::async_trait]
impl Op for Restore {
    type Error = TrashBinError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let space = self.space.reference()?;
        tracing::info!(space = %self.space.space, key = %self.item_id, option = %self.option, "restoring trash-bin item");
        let (item, outcome) = resolver(ctx, self.option)?
            .restore_by_key(&space, &self.item_id)
            .await?;
        Ok(outcome_line(&item, &outcome))
    }
}

/// Restore all trash-bin items of a space
#[derive(Args, Debug, Clone)]
pub struct RestoreAll {
    #[command(flatten)]
    pub space: SpaceArg,

    /// What to do if an original location is taken: skip, replace
    ///  or keep-both
    #[arg(short, long, default_value = "skip")]
    pub option: RestorePolicy,

    /// Assume yes to the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Continue,
    Abort,
    Show,
    Again,
}

impl Answer {
    fn parse(answer: &str) -> Self {
        match answer {
            "" | "y" | "yes" => Answer::Continue,
            "n" | "no" => Answer::Abort,
            "s" => Answer::Show,
            _ => Answer::Again,
        }
    }
}

#[async_trait::async_trait]
impl Op for RestoreAll {
    type Error = TrashBinError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let space = self.space.reference()?;
        let resolver = resolver(ctx, self.option)?;
        let items = resolver.list(&space).await?;
        if items.is_empty() {
            return Ok(EMPTY_TRASH.to_string());
        }

        if !self.yes {
            let question = format!(
                "Found {} items that could be restored, continue (Y/n), show the items list (s): ",
                items.len()
            );
            loop {
                match Answer::parse(&prompt(&question).await?) {
                    Answer::Continue => break,
                    Answer::Abort => return Ok("Aborted".to_string()),
                    Answer::Show => println!("{}", items_table(&items)),
                    Answer::Again => {}
                }
            }
        }

        tracing::info!(space = %self.space.space, option = %self.option, count = items.len(), "restoring all trash-bin items");
        let report = resolver.restore_all(&space, items).await;

        let mut lines: Vec<String> = report
            .restored
            .iter()
            .map(|(item, dst)| outcome_line(item, &RestoreOutcome::Restored(dst.clone())))
            .chain(
                report
                    .skipped
                    .iter()
                    .map(|(item, dst)| outcome_line(item, &RestoreOutcome::Skipped(dst.clone()))),
            )
            .chain(
                report
                    .failed
                    .iter()
                    .map(|(item, e)| format!("itemID: '{}', path: '{}', failed: {}", item.key, item.path, e)),
            )
            .collect();
        if report.cancelled {
            lines.push("Interrupted before every item was handled".to_string());
        }

        let output = lines.join("\n");
        if report.failed.is_empty() {
            Ok(output)
        } else {
            Err(TrashBinError::Incomplete(format!(
                "{}\n{} of {} items could not be restored",
                output,
                report.failed.len(),
                report.total()
            )))
        }
    }
}

/// Ask the postprocessing service to purge expired trash-bin items
#[derive(Args, Debug, Clone)]
pub struct PurgeExpired {}

#[async_trait::async_trait]
impl Op for PurgeExpired {
    type Error = TrashBinError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let event = Event::purge_trash_bin();
        let name = event.name();
        let id = ctx.publisher()?.publish(event).await?;
        Ok(format!("Published {} event {}", name, id))
    }
}

fn outcome_line(item: &RecycleItem, outcome: &RestoreOutcome) -> String {
    match outcome {
        RestoreOutcome::Restored(dst) => format!(
            "itemID: '{}', path: '{}', restored as '{}'",
            item.key, item.path, dst.path
        ),
        RestoreOutcome::Skipped(dst) => format!(
            "itemID: '{}', path: '{}', skipped, '{}' already exists",
            item.key, item.path, dst.path
        ),
    }
}

/// Render items as a table with a total count footer
fn items_table(items: &[RecycleItem]) -> String {
    let header = ["itemID", "path", "type", "delete at"];
    let rows: Vec<[String; 4]> = items
        .iter()
        .map(|item| {
            [
                item.key.clone(),
                item.path.clone(),
                item.kind.to_string(),
                item.deleted_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: [&str; 4]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(header)];
    lines.push(widths.map(|w| "-".repeat(w)).join("-+-"));
    for row in &rows {
        lines.push(render([&row[0], &row[1], &row[2], &row[3]]));
    }
    lines.push(format!("total count: {}", items.len()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::trash::ItemKind;

    fn item(key: &str, path: &str, kind: ItemKind) -> RecycleItem {
        RecycleItem {
            key: key.to_string(),
            path: path.to_string(),
            kind,
            deleted_at: chrono::Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        }
    }

    #[test]
    fn test_items_table() {
        let table = items_table(&[
            item("k1", "/report.pdf", ItemKind::File),
            item("k22", "/docs", ItemKind::Folder),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "itemID | path        | type   | delete at");
        assert_eq!(lines[2], "k1     | /report.pdf | file   | 2024-05-06T07:08:09Z");
        assert_eq!(lines[3], "k22    | /docs       | folder | 2024-05-06T07:08:09Z");
        assert_eq!(lines[4], "total count: 2");
    }

    #[test]
    fn test_outcome_line() {
        let item = item("k1", "/report.pdf", ItemKind::File);
        let space = Reference::space_root(ResourceId::space("space-1"));
        assert_eq!(
            outcome_line(&item, &RestoreOutcome::Restored(space.with_path("./report (1).pdf"))),
            "itemID: 'k1', path: '/report.pdf', restored as './report (1).pdf'"
        );
    }

    #[test]
    fn test_answers() {
        assert_eq!(Answer::parse(""), Answer::Continue);
        assert_eq!(Answer::parse("y"), Answer::Continue);
        assert_eq!(Answer::parse("n"), Answer::Abort);
        assert_eq!(Answer::parse("s"), Answer::Show);
        assert_eq!(Answer::parse("maybe"), Answer::Again);
    }

    #[test]
    fn test_space_arg() {
        let arg = SpaceArg {
            space: "storage$space-1".to_string(),
        };
        assert_eq!(arg.reference().unwrap().resource_id.space_id, "space-1");
        assert!(SpaceArg { space: String::new() }.reference().is_err());
    }
}
