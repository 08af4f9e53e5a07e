use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use super::glob::expand;
use crate::layout::{pattern_below, ScopePlan, Segment};

/// Levels expanded by the second pool, i.e. the node shards
const TAIL_LEVELS: usize = 4;

/// Two pool glob expansion.
///
/// The leading levels of the plan are globbed once to produce seeds.
///  The first pool expands one more level below every seed; each result
///  is queued to the second pool, which expands the remaining levels.
pub(super) fn spawn(
    plan: ScopePlan,
    workers: usize,
    out: flume::Sender<PathBuf>,
    cancel: CancellationToken,
) {
    let ScopePlan { base, segments } = plan;
    if segments.is_empty() {
        return;
    }

    let tail = TAIL_LEVELS.min(segments.len() - 1);
    let head = segments.len() - tail;
    let seed_segments: Vec<Segment> = segments[..head - 1].to_vec();
    let first_level: Vec<Segment> = vec![segments[head - 1].clone()];
    let rest: Vec<Segment> = segments[head..].to_vec();

    let (seed_tx, seed_rx) = flume::bounded::<PathBuf>(workers);

    {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            if seed_segments.is_empty() {
                let _ = seed_tx.send(base);
                return;
            }
            let pattern = pattern_below(&base, &seed_segments);
            expand(&pattern, &cancel, |seed| seed_tx.send(seed).is_ok());
        });
    }

    // Without remaining levels the first pool emits directly
    let second = if rest.is_empty() {
        None
    } else {
        Some(flume::bounded::<PathBuf>(workers))
    };
    let first_out = match &second {
        Some((tx, _)) => tx.clone(),
        None => out.clone(),
    };

    for _ in 0..workers {
        let seed_rx = seed_rx.clone();
        let tx = first_out.clone();
        let level = first_level.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            for seed in seed_rx.iter() {
                let pattern = pattern_below(&seed, &level);
                if !expand(&pattern, &cancel, |path| tx.send(path).is_ok()) {
                    break;
                }
            }
        });
    }
    drop(seed_rx);
    drop(first_out);

    if let Some((second_tx, second_rx)) = second {
        drop(second_tx);
        for _ in 0..workers {
            let rx = second_rx.clone();
            let out = out.clone();
            let rest = rest.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                for dir in rx.iter() {
                    let pattern = pattern_below(&dir, &rest);
                    if !expand(&pattern, &cancel, |path| out.send(path).is_ok()) {
                        break;
                    }
                }
            });
        }
    }
}
