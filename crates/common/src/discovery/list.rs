use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::layout::{ScopePlan, Segment};

enum ListTask {
    Visit { dir: PathBuf, depth: usize },
    Stop,
}

/// Shared state of the listing pool
struct Pool {
    segments: Vec<Segment>,
    tasks: flume::Sender<ListTask>,
    /// Tasks queued or in progress
    pending: AtomicUsize,
    workers: usize,
    out: flume::Sender<PathBuf>,
    cancel: CancellationToken,
}

/// Recursive directory listing by a fixed pool of workers.
///
/// Directories to descend into are queued on a bounded task queue; when
///  the queue is full the worker descends itself. The worker that
///  finishes the last pending task tells the others to stop.
pub(super) fn spawn(
    plan: ScopePlan,
    workers: usize,
    out: flume::Sender<PathBuf>,
    cancel: CancellationToken,
) {
    if plan.segments.is_empty() {
        return;
    }

    let (tasks, rx) = flume::bounded(workers);
    let pool = Arc::new(Pool {
        segments: plan.segments,
        tasks,
        pending: AtomicUsize::new(1),
        workers,
        out,
        // Stops the pool when the consumer goes away, without touching
        //  the caller's token
        cancel: cancel.child_token(),
    });

    if pool
        .tasks
        .try_send(ListTask::Visit {
            dir: plan.base,
            depth: 0,
        })
        .is_err()
    {
        return;
    }

    for _ in 0..workers {
        let pool = pool.clone();
        let rx = rx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(task) = rx.recv() {
                match task {
                    ListTask::Stop => break,
                    ListTask::Visit { dir, depth } => {
                        pool.visit(&dir, depth);
                        if pool.finish() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Pool {
    /// Mark a task as done. Returns true if it was the last one, in
    ///  which case every other worker has been told to stop.
    fn finish(&self) -> bool {
        if self.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
            return false;
        }
        for _ in 1..self.workers {
            let _ = self.tasks.send(ListTask::Stop);
        }
        true
    }

    fn visit(&self, dir: &Path, depth: usize) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(segment) = self.segments.get(depth) else {
            return;
        };
        let last = depth + 1 == self.segments.len();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        for entry in entries {
            if self.cancel.is_cancelled() {
                return;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "failed to read directory entry");
                    continue;
                }
            };
            if !segment.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            if last {
                if self.out.send(path).is_err() {
                    self.cancel.cancel();
                    return;
                }
                continue;
            }

            // Follows symlinks, like glob does for intermediate levels
            if !path.is_dir() {
                continue;
            }
            self.pending.fetch_add(1, Ordering::AcqRel);
            match self.tasks.try_send(ListTask::Visit {
                dir: path,
                depth: depth + 1,
            }) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(ListTask::Visit { dir, depth })) => {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    self.visit(&dir, depth);
                }
                Err(_) => {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                }
            }
        }
    }
}
