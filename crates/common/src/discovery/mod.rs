//! Path discovery
//!
//! Produces the on-disk entries that make up a scope (whole tree, one
//!  space or one resource) as a channel of paths. Three strategies are
//!  available and all of them yield the same set of paths:
//!
//! - **[`Strategy::Glob`]**: one blocking task expanding a single shell
//!   pattern. Cheapest, slowest on large trees.
//! - **[`Strategy::GlobWorkers`]**: the pattern is split in two; one pool
//!   of workers expands the first level, a second pool expands the rest
//!   below each result. Output order is unspecified.
//! - **[`Strategy::List`]**: plain directory listing by a pool of workers
//!   sharing a bounded task queue. Does not depend on glob semantics.
//!
//! The channel closes once every producer is done. Unreadable
//!  directories below the scope's base are logged and skipped.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use crate::layout::{Layout, Scope};

mod glob;
mod list;
mod workers;

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("scope root {path} is unreadable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] ::glob::PatternError),
    #[error("unknown discovery strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Glob,
    GlobWorkers,
    List,
}

impl FromStr for Strategy {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "glob" => Ok(Strategy::Glob),
            "workers" => Ok(Strategy::GlobWorkers),
            "list" => Ok(Strategy::List),
            other => Err(DiscoveryError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Glob => write!(f, "glob"),
            Strategy::GlobWorkers => write!(f, "workers"),
            Strategy::List => write!(f, "list"),
        }
    }
}

/// Finds the entries of a scope below a storage root
#[derive(Debug, Clone)]
pub struct Discovery {
    layout: Layout,
    workers: usize,
    cancel: CancellationToken,
}

impl Discovery {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            workers: DEFAULT_WORKERS,
            cancel: CancellationToken::new(),
        }
    }

    /// Size of each worker pool, and the task queue depth of
    ///  [`Strategy::List`]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Start discovering `scope` and return the receiving end of the
    ///  result channel.
    ///
    /// Producers run on the blocking thread pool, so this must be called
    ///  from within a tokio runtime. A single resource is always expanded
    ///  with [`Strategy::Glob`].
    pub fn discover(
        &self,
        scope: &Scope,
        strategy: Strategy,
    ) -> Result<flume::Receiver<PathBuf>, DiscoveryError> {
        let plan = self.layout.plan(scope);
        ::glob::Pattern::new(&plan.pattern())?;

        if let Err(source) = std::fs::read_dir(&plan.base) {
            return Err(DiscoveryError::RootUnreadable {
                path: plan.base,
                source,
            });
        }

        let strategy = if scope.is_resource() {
            Strategy::Glob
        } else {
            strategy
        };
        tracing::debug!(
            base = %plan.base.display(),
            pattern = %plan.pattern(),
            strategy = %strategy,
            "starting discovery"
        );

        let (tx, rx) = flume::unbounded();
        let cancel = self.cancel.clone();
        match strategy {
            Strategy::Glob => glob::spawn(plan, tx, cancel),
            Strategy::GlobWorkers => workers::spawn(plan, self.workers, tx, cancel),
            Strategy::List => list::spawn(plan, self.workers, tx, cancel),
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::testkit::LayoutFixture;

    async fn collect(rx: flume::Receiver<PathBuf>) -> BTreeSet<PathBuf> {
        let mut out = BTreeSet::new();
        while let Ok(path) = rx.recv_async().await {
            out.insert(path);
        }
        out
    }

    #[test]
    fn test_strategy_names() {
        for strategy in [Strategy::Glob, Strategy::GlobWorkers, Strategy::List] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("fast".parse::<Strategy>().is_err());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let fixture = LayoutFixture::new();
        let discovery = Discovery::new(fixture.layout());
        let result = discovery.discover(
            &Scope::Space {
                space_id: "missing-space".to_string(),
            },
            Strategy::List,
        );
        assert!(matches!(result, Err(DiscoveryError::RootUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_resource_scope_finds_revisions() {
        let fixture = LayoutFixture::new();
        let space = "ssss1111-0000";
        fixture.space(space, "Personal");
        let file = fixture.file(space, space, "file0000-0001", "a.txt", 3);
        let other = fixture.file(space, space, "file0000-0002", "b.txt", 3);
        fixture.revision(space, &file, "2024-01-01T00:00:00.000000001Z", "blob-1", 3);
        fixture.revision(space, &other, "2024-01-01T00:00:00.000000001Z", "blob-2", 3);

        let discovery = Discovery::new(fixture.layout());
        let scope = Scope::Resource {
            space_id: space.to_string(),
            node_id: file.clone(),
        };
        // Forced to glob regardless of the requested strategy
        let paths = collect(discovery.discover(&scope, Strategy::List).unwrap()).await;

        let names: BTreeSet<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        let leaf = crate::layout::pathify(&file, 4, 2)
            .rsplit('/')
            .next()
            .unwrap()
            .to_string();
        assert!(names.iter().all(|name| name.starts_with(&leaf)));
        assert!(names.contains(&format!("{}.REV.2024-01-01T00:00:00.000000001Z", leaf)));
        assert!(names.contains(&format!("{}.mpk", leaf)));
    }

    #[tokio::test]
    async fn test_cancelled_discovery_yields_nothing() {
        let fixture = LayoutFixture::new();
        let space = "ssss1111-0000";
        fixture.space(space, "Personal");
        fixture.file(space, space, "file0000-0001", "a.txt", 3);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let discovery = Discovery::new(fixture.layout()).with_cancellation(cancel);
        for strategy in [Strategy::Glob, Strategy::GlobWorkers, Strategy::List] {
            let paths = collect(discovery.discover(&Scope::Tree, strategy).unwrap()).await;
            assert!(paths.is_empty(), "{} produced paths", strategy);
        }
    }
}
