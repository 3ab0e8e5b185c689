use crate::composition::model::CompositionDescriptor;
use crate::driver::client::{Driver, DriverOpts};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{DriveError, DriveResult};
use crate::protocol::channel::{PageChannel, PageFactory};
use crate::render::frame::FrameRGBA;
use std::sync::mpsc;
use std::time::Instant;

/// What to render and how to spread it over pages.
#[derive(Clone, Debug)]
pub struct RenderJob {
    /// Composition id.
    pub composition: String,
    /// Props payload (JSON object) replacing the resolved props from discovery.
    pub props: Option<String>,
    /// Frames to render. Defaults to the whole composition.
    pub range: Option<FrameRange>,
    /// Page instances rendering in parallel.
    pub workers: usize,
    /// Frames each worker may have in flight ahead of the sink.
    pub channel_capacity: usize,
    /// Per-page driver options.
    pub driver: DriverOpts,
}

impl RenderJob {
    /// Render the whole of `composition` on one page.
    pub fn new(composition: impl Into<String>) -> Self {
        Self {
            composition: composition.into(),
            props: None,
            range: None,
            workers: 1,
            channel_capacity: 4,
            driver: DriverOpts::default(),
        }
    }
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Total frames in the requested range.
    pub frames_total: u64,
    /// Frames delivered to the sink.
    pub frames_rendered: u64,
    /// Page instances used.
    pub workers: usize,
}

/// A resolved job: the descriptor every worker locks onto and the frames to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderPlan {
    /// Descriptor passed to `remotion_setBundleMode`.
    pub descriptor: CompositionDescriptor,
    /// Frames to render, inside `[0, durationInFrames)`.
    pub range: FrameRange,
}

impl RenderPlan {
    /// Stream parameters for a sink.
    pub fn sink_config(&self) -> DriveResult<SinkConfig> {
        Ok(SinkConfig {
            width: self.descriptor.composition_width,
            height: self.descriptor.composition_height,
            fps: self.descriptor.frame_rate()?,
        })
    }
}

/// Discover the job's composition on `driver` and resolve its frame range.
pub fn plan_job<C: PageChannel>(
    driver: &mut Driver<C>,
    job: &RenderJob,
) -> DriveResult<RenderPlan> {
    driver.enter_evaluation()?;
    let comp = driver.find_composition(&job.composition)?;
    let descriptor = CompositionDescriptor::from_composition(&comp, job.props.as_deref())?;
    let full = descriptor.frame_range();
    let range = job.range.unwrap_or(full);
    if range.is_empty() {
        return Err(DriveError::validation("render range must be non-empty"));
    }
    if range.end.0 > full.end.0 {
        return Err(DriveError::out_of_range(format!(
            "render range {}..{} exceeds '{}' ({} frames)",
            range.start, range.end, comp.id, comp.duration_in_frames
        )));
    }
    Ok(RenderPlan { descriptor, range })
}

/// Render one frame on a fresh page.
pub fn render_frame<F: PageFactory>(
    factory: &F,
    job: &RenderJob,
    frame: FrameIndex,
) -> DriveResult<FrameRGBA> {
    let mut driver = Driver::new(factory.open()?, job.driver);
    let plan = plan_job(&mut driver, job)?;
    driver.enter_composition(&plan.descriptor)?;
    driver.render_frame(frame)
}

type FrameMsg = DriveResult<(FrameIndex, FrameRGBA)>;

/// Render a frame range over `job.workers` pages and stream frames into a sink.
///
/// Frame `i` goes to worker `(i - start) % workers`. Each worker owns its page and a bounded
/// channel; frames are pulled from the owning channel in timeline order, so the sink receives
/// strictly increasing indices. The first error seen in timeline order aborts the job.
pub fn render_range<F: PageFactory>(
    factory: &F,
    job: &RenderJob,
    sink: &mut dyn FrameSink,
) -> DriveResult<RenderStats> {
    let plan = {
        let mut driver = Driver::new(factory.open()?, job.driver);
        plan_job(&mut driver, job)?
    };
    let cfg = plan.sink_config()?;
    let frames_total = plan.range.len_frames();
    let workers = job.workers.max(1).min(frames_total as usize);
    let cap = job.channel_capacity.max(1);
    let started = Instant::now();
    tracing::info!(
        composition = %plan.descriptor.composition_name,
        start = plan.range.start.0,
        end = plan.range.end.0,
        workers,
        "render started"
    );

    let frames_rendered = std::thread::scope(|scope| -> DriveResult<u64> {
        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            receivers.push(rx);
            let plan = &plan;
            let opts = job.driver;
            handles.push(scope.spawn(move || {
                if let Err(e) = drive_worker(factory, plan, opts, worker, workers, &tx) {
                    tracing::debug!(worker, error = %e, "render worker failed");
                    let _ = tx.send(Err(e));
                }
            }));
        }

        sink.begin(cfg)?;
        let mut pushed = 0u64;
        for (i, idx) in (plan.range.start.0..plan.range.end.0).enumerate() {
            let idx = FrameIndex(idx);
            let owner = i % workers;
            let (got, frame) = receivers[owner]
                .recv()
                .map_err(|_| {
                    DriveError::Other(anyhow::anyhow!(
                        "render worker {owner} exited before delivering frame {idx}"
                    ))
                })??;
            if got != idx {
                return Err(DriveError::Other(anyhow::anyhow!(
                    "render worker {owner} delivered frame {got}, expected {idx}"
                )));
            }
            sink.push_frame(idx, &frame)?;
            pushed += 1;
        }
        sink.end()?;

        for h in handles {
            h.join()
                .map_err(|_| DriveError::Other(anyhow::anyhow!("render worker panicked")))?;
        }
        Ok(pushed)
    })?;

    tracing::info!(
        frames = frames_rendered,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "render finished"
    );
    Ok(RenderStats {
        frames_total,
        frames_rendered,
        workers,
    })
}

fn drive_worker<F: PageFactory>(
    factory: &F,
    plan: &RenderPlan,
    opts: DriverOpts,
    worker: usize,
    workers: usize,
    tx: &mpsc::SyncSender<FrameMsg>,
) -> DriveResult<()> {
    let mut driver = Driver::new(factory.open()?, opts);
    driver.enter_composition(&plan.descriptor)?;
    for idx in plan.range.strided(worker as u64, workers as u64) {
        let frame = driver.render_frame(idx)?;
        if tx.send(Ok((idx, frame))).is_err() {
            // receiver gone: the job was aborted elsewhere
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/pipeline.rs"]
mod tests;
