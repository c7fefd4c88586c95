//! Export driver.
//!
//! Iterates a frame range, runs each track's chain, composites, and streams
//! the result to an [`ExportSink`]. Tracks whose chains are seek-safe (no
//! sequential-only state) render their frames in parallel; any track
//! carrying sequential-only effects is evaluated on a single strictly
//! increasing stream. Cancellation is honored only at frame boundaries and
//! aborts the sink so partial segments are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::chain::executor::{
    ChainExecutor, ChainLimits, CompiledChain, FrameSource, compile_chain,
};
use crate::compositor::composite::{TrackFrame, composite};
use crate::effects::registry::EffectRegistry;
use crate::foundation::core::{Frame, FrameIndex, FrameRange};
use crate::foundation::error::{MoshError, MoshResult};
use crate::state::store::StateStore;
use crate::track::Track;

/// Receives exported frames in order.
///
/// The encode layer implements this; no container or codec logic lives in
/// this crate.
pub trait ExportSink {
    /// Write the next composited frame.
    fn write_frame(&mut self, frame: &Frame) -> MoshResult<()>;
    /// Finalize the output after the last frame.
    fn finish(&mut self) -> MoshResult<()>;
    /// Discard everything written so far (cancellation or error).
    fn abort(&mut self);
}

/// Shared cancellation flag, checked at frame boundaries only.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Export threading and chunking configuration.
#[derive(Clone, Debug)]
pub struct ExportThreading {
    /// Render seek-safe tracks with a rayon pool.
    pub parallel: bool,
    /// Frames handled per scheduling chunk.
    pub chunk_size: usize,
    /// Worker count; `None` uses the rayon default.
    pub threads: Option<usize>,
}

impl Default for ExportThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Outcome counters for one export run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Frames in the requested range.
    pub frames_total: u64,
    /// Frames actually written to the sink.
    pub frames_written: u64,
    /// Whether the run ended by cancellation (sink aborted).
    pub cancelled: bool,
}

/// One track plus the source supplying its input frames.
pub struct ExportJob<'a> {
    /// Track whose chain is rendered.
    pub track: &'a Track,
    /// Source frames for the track.
    pub source: &'a dyn FrameSource,
}

/// Render and composite `range`, streaming frames to `sink`.
#[tracing::instrument(skip_all, fields(frames = range.len_frames(), tracks = jobs.len()))]
pub fn export_range(
    registry: &EffectRegistry,
    jobs: &[ExportJob<'_>],
    range: FrameRange,
    seed: u64,
    limits: &ChainLimits,
    threading: &ExportThreading,
    sink: &mut dyn ExportSink,
    cancel: &CancelToken,
) -> MoshResult<ExportStats> {
    if range.is_empty() {
        return Err(MoshError::validation("export range must be non-empty"));
    }
    if jobs.is_empty() {
        return Err(MoshError::validation("export requires at least one track"));
    }

    let mut run = || -> MoshResult<ExportStats> {
        let chains: Vec<CompiledChain> = jobs
            .iter()
            .map(|job| compile_chain(registry, job.track.chain(), limits))
            .collect::<MoshResult<_>>()?;

        // Sequential-only tracks keep a live executor + state store across
        // the whole run; each owns its (track, instance) state exclusively.
        let mut streams: Vec<Option<(ChainExecutor<'_>, StateStore)>> = chains
            .iter()
            .map(|chain| {
                (!chain.is_seek_safe())
                    .then(|| (ChainExecutor::new(registry, *limits, seed), StateStore::new()))
            })
            .collect();

        let pool = threading
            .parallel
            .then(|| build_thread_pool(threading.threads))
            .transpose()?;

        let mut stats = ExportStats {
            frames_total: range.len_frames(),
            ..ExportStats::default()
        };
        let chunk_size = threading.chunk_size.max(1) as u64;

        let mut chunk_start = range.start.0;
        while chunk_start < range.end.0 {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(stats);
            }
            let chunk_end = (chunk_start + chunk_size).min(range.end.0);
            debug!(chunk_start, chunk_end, "exporting chunk");

            // Per-job chain outputs for the chunk, job-major.
            let mut outputs: Vec<Vec<Frame>> = Vec::with_capacity(jobs.len());
            for (idx, job) in jobs.iter().enumerate() {
                let chain = &chains[idx];
                let frames = match (&mut streams[idx], &pool) {
                    // Sequential stream: strict increasing order, state
                    // reconstructed by replay on the first frame if the
                    // range starts mid-timeline.
                    (Some((executor, store)), _) => {
                        let mut frames = Vec::with_capacity((chunk_end - chunk_start) as usize);
                        for f in chunk_start..chunk_end {
                            frames.push(executor.apply_chain_replaying(
                                job.source,
                                chain,
                                FrameIndex(f),
                                &job.track.id,
                                store,
                            )?);
                        }
                        frames
                    }
                    // Seek-safe chain with a pool: one worker per frame.
                    (None, Some(pool)) => pool.install(|| {
                        (chunk_start..chunk_end)
                            .into_par_iter()
                            .map_init(
                                || ChainExecutor::new(registry, *limits, seed),
                                |executor, f| -> MoshResult<Frame> {
                                    let input = job.source.frame_at(FrameIndex(f))?;
                                    let mut scratch = StateStore::new();
                                    executor.apply_chain(
                                        &input,
                                        chain,
                                        FrameIndex(f),
                                        &job.track.id,
                                        &mut scratch,
                                    )
                                },
                            )
                            .collect::<MoshResult<Vec<Frame>>>()
                    })?,
                    // Seek-safe chain, single stream.
                    (None, None) => {
                        let mut executor = ChainExecutor::new(registry, *limits, seed);
                        let mut scratch = StateStore::new();
                        let mut frames = Vec::with_capacity((chunk_end - chunk_start) as usize);
                        for f in chunk_start..chunk_end {
                            let input = job.source.frame_at(FrameIndex(f))?;
                            frames.push(executor.apply_chain(
                                &input,
                                chain,
                                FrameIndex(f),
                                &job.track.id,
                                &mut scratch,
                            )?);
                        }
                        frames
                    }
                };
                outputs.push(frames);
            }

            // Compositor barrier: all tracks' frames for an index must exist
            // before blending.
            for (offset, _) in (chunk_start..chunk_end).enumerate() {
                if cancel.is_cancelled() {
                    stats.cancelled = true;
                    return Ok(stats);
                }
                let layers: Vec<TrackFrame<'_>> = jobs
                    .iter()
                    .zip(&outputs)
                    .map(|(job, frames)| TrackFrame {
                        track: job.track,
                        frame: frames[offset].clone(),
                    })
                    .collect();
                let frame = composite(&layers)?;
                sink.write_frame(&frame)?;
                stats.frames_written += 1;
            }

            chunk_start = chunk_end;
        }

        Ok(stats)
    };

    match run() {
        Ok(stats) if stats.cancelled => {
            sink.abort();
            info!(written = stats.frames_written, "export cancelled; sink aborted");
            Ok(stats)
        }
        Ok(stats) => {
            sink.finish()?;
            info!(written = stats.frames_written, "export finished");
            Ok(stats)
        }
        Err(e) => {
            sink.abort();
            Err(e)
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> MoshResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MoshError::validation(
            "export threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| MoshError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/export.rs"]
mod tests;
