// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render pipeline.
//!
//! A `Renderer` owns the histogram and the worker state for one frame
//! and remembers how far it got.  Each call to `run` picks up from
//! there: it iterates some sub-batches, and once the requested quality
//! is reached (or output is forced) it log-scales and density-filters
//! the histogram, downsamples it through the spatial filter, and color
//! corrects it into the caller's buffer.
//!
//! Changing the genome with `set_genome` names how much of that work
//! has to be redone, from nothing at all to a full restart.

use crate::accum::{downsample, write_image, Bucket, ColorCorrection, Histogram};
use crate::density::{apply_log_scale, DensityFilter, LogScale};
use crate::error::{ErrorReport, RenderError, Result};
use crate::genome::Genome;
use crate::interpolate::interpolate_at;
use crate::isaac::IsaacRng;
use crate::iterator::{iterate, Camera, IterState, IterStats, Point, XformSelector};
use crate::planes::PlaneMapper;
use crate::settings::RenderSettings;
use crate::spatial::SpatialFilter;
use crate::temporal::TemporalFilter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `render_progressive` gives up after this many failed runs in a row.
pub const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// How far the current frame has got.  Ordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessState {
    /// Nothing done yet.
    None,
    /// Iterations under way.
    IterStarted,
    /// The histogram is complete.
    IterDone,
    /// Density estimation is done.
    FilterDone,
    /// The image is ready.
    AccumDone,
}

/// What a genome change invalidates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessAction {
    /// Nothing to redo.
    Nothing,
    /// Only the color correction changed.
    AccumOnly,
    /// Brightness or density estimation changed.
    FilterAndAccum,
    /// Iterate further into the existing histogram.
    KeepIterating,
    /// Start the frame over.
    FullRender,
}

/// How a call to `run` ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// The image was written.
    Ok,
    /// The callback or the abort flag stopped the run.
    Abort,
    /// See `error_report`.
    Error,
}

/// Stage named in progress reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderStage {
    /// Chaos game.
    Iterating,
    /// Density estimation.
    DensityFiltering,
    /// Color correction into the output buffer.
    FinalAccumulation,
}

/// Progress reports from `run`.  Returning false aborts the run.
pub trait RenderCallback {
    /// Called with the percentage done and an estimate of the time left.
    fn progress(&mut self, genome: &Genome, percent: f64, stage: RenderStage, eta_ms: f64) -> bool;
}

impl<F> RenderCallback for F
where
    F: FnMut(&Genome, f64, RenderStage, f64) -> bool,
{
    fn progress(&mut self, genome: &Genome, percent: f64, stage: RenderStage, eta_ms: f64) -> bool {
        self(genome, percent, stage, eta_ms)
    }
}

/// Counters for the current frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    /// Samples plotted.
    pub iterations: usize,
    /// Samples dropped for leaving the plane.
    pub bad_values: usize,
    /// Time spent iterating.
    pub iter_time: Duration,
    /// Time spent in density estimation.
    pub filter_time: Duration,
    /// Time spent in final accumulation.
    pub accum_time: Duration,
}

impl RenderStats {
    /// Sum of the stage times.
    pub fn total_time(&self) -> Duration {
        self.iter_time + self.filter_time + self.accum_time
    }
}

/// What an image writer may want to embed in the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageComments {
    /// Genome name and render parameters.
    pub summary: String,
    /// Samples dropped.
    pub bad_vals: usize,
    /// Samples plotted.
    pub num_iters: usize,
    /// Wall time for the frame.
    pub runtime: Duration,
}

struct Worker {
    state: IterState,
    samples: Vec<Point>,
}

/// The genome of the temporal sample being iterated.
struct TemporalSample {
    index: usize,
    genome: Genome,
    selector: XformSelector,
    camera: Camera,
    weight: f64,
}

struct Frame {
    time: f64,
    genome: Genome,
    mapper: PlaneMapper,
    spatial: SpatialFilter,
    temporal: TemporalFilter,
    density: Option<DensityFilter>,
    histogram: Histogram,
    total_iters: usize,
    done_iters: usize,
    sample: Option<TemporalSample>,
}

fn genome_at(keyframes: &[Genome], time: f64) -> Genome {
    if keyframes.len() == 1 {
        return keyframes[0].clone();
    }
    let mut genome = Genome::new();
    interpolate_at(keyframes, time, 0.0, &mut genome);
    genome
}

fn total_iterations(genome: &Genome) -> usize {
    let scale = genome.scale();
    let iters = genome.quality * scale * scale * (genome.width * genome.height) as f64;
    (iters.ceil() as usize).max(1)
}

/// Whether two genomes can share a histogram.
fn same_geometry(a: &Genome, b: &Genome) -> bool {
    a.width == b.width
        && a.height == b.height
        && a.supersample == b.supersample
        && a.pixels_per_unit == b.pixels_per_unit
        && a.pixel_aspect_ratio == b.pixel_aspect_ratio
        && a.zoom == b.zoom
        && a.center_x == b.center_x
        && a.center_y == b.center_y
        && a.rotate == b.rotate
        && a.spatial_filter_type == b.spatial_filter_type
        && a.spatial_filter_radius == b.spatial_filter_radius
        && a.temporal_samples == b.temporal_samples
        && a.temporal_filter_type == b.temporal_filter_type
        && a.temporal_filter_width == b.temporal_filter_width
        && a.temporal_filter_exp == b.temporal_filter_exp
}

fn load_sample(keyframes: &[Genome], frame: &Frame, index: usize) -> Result<TemporalSample> {
    let genome = if frame.temporal.len() > 1 {
        let t = frame.time + frame.temporal.deltas[index];
        let mut genome = genome_at(keyframes, t).with_motion(t);
        genome.update_camera_matrix();
        genome
    } else {
        frame.genome.with_motion(frame.time)
    };
    let selector = XformSelector::new(&genome).ok_or_else(|| {
        RenderError::InvalidGenome(format!("no xform has a positive weight at time {}", genome.time))
    })?;
    let camera = Camera::from_genome(&genome);
    trace!("temporal sample {} of {}", index + 1, frame.temporal.len());
    Ok(TemporalSample {
        index,
        genome,
        selector,
        camera,
        weight: frame.temporal.weights[index],
    })
}

/// Runs one sub-batch on every worker and bins the results in worker
/// order, so the histogram only depends on the seed and thread count.
fn run_sub_batch(
    frame: &mut Frame,
    workers: &mut [Worker],
    keyframes: &[Genome],
    abort: &AtomicBool,
) -> Result<IterStats> {
    let samples = frame.temporal.len();
    let per_sample = (frame.total_iters + samples - 1) / samples;
    let index = (frame.done_iters / per_sample).min(samples - 1);
    if frame.sample.as_ref().map_or(true, |s| s.index != index) {
        frame.sample = Some(load_sample(keyframes, frame, index)?);
        for w in workers.iter_mut() {
            w.state.restart();
        }
    }

    let sample_end = ((index + 1) * per_sample).min(frame.total_iters);
    let batch_cap: usize = workers.iter().map(|w| w.samples.len()).sum();
    let batch = sample_end.saturating_sub(frame.done_iters).min(batch_cap);
    let n = workers.len();
    let (base, extra) = (batch / n, batch % n);

    let sample = match frame.sample {
        Some(ref sample) => sample,
        None => return Ok(IterStats::default()),
    };
    let fuse = sample.genome.fuse_count;

    let results = crossbeam::scope(|s| {
        let handles: Vec<_> = workers
            .iter_mut()
            .enumerate()
            .map(|(t, w)| {
                let count = (base + if t < extra { 1 } else { 0 }).min(w.samples.len());
                let (genome, selector, camera) = (&sample.genome, &sample.selector, &sample.camera);
                s.spawn(move |_| {
                    iterate(
                        genome,
                        selector,
                        camera,
                        fuse,
                        &mut w.state,
                        &mut w.samples[..count],
                        abort,
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
    })
    .map_err(|_| RenderError::WorkerPanic)?;

    let mut stats = IterStats::default();
    for (w, result) in workers.iter().zip(results) {
        let s = result.map_err(|_| RenderError::WorkerPanic)?;
        frame.histogram.bin(
            &w.samples[..s.iterations],
            &frame.mapper,
            &sample.genome.palette,
            sample.genome.palette_mode,
            sample.weight,
        );
        stats.iterations += s.iterations;
        stats.bad_values += s.bad_values;
    }
    frame.done_iters += stats.iterations;
    Ok(stats)
}

/// Renders genomes into caller-supplied byte buffers.
pub struct Renderer {
    settings: RenderSettings,
    keyframes: Vec<Genome>,
    stale: bool,
    state: ProcessState,
    frame: Option<Frame>,
    workers: Vec<Worker>,
    filtered: Vec<Bucket>,
    abort: Arc<AtomicBool>,
    callback: Option<Box<dyn RenderCallback>>,
    stats: RenderStats,
    errors: ErrorReport,
    failures: usize,
}

impl Renderer {
    /// A renderer with no genome.
    pub fn new(settings: RenderSettings) -> Renderer {
        Renderer {
            settings,
            keyframes: Vec::new(),
            stale: false,
            state: ProcessState::None,
            frame: None,
            workers: Vec::new(),
            filtered: Vec::new(),
            abort: Arc::new(AtomicBool::new(false)),
            callback: None,
            stats: RenderStats::default(),
            errors: ErrorReport::new(),
            failures: 0,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// New settings take effect with the next frame.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
        self.state = ProcessState::None;
    }

    /// Installs a progress callback.
    pub fn set_callback<C: RenderCallback + 'static>(&mut self, callback: C) {
        self.callback = Some(Box::new(callback));
    }

    /// Removes the progress callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Renders a single genome from now on.  `action` says how much of
    /// the current frame the change invalidates.
    pub fn set_genome(&mut self, genome: Genome, action: ProcessAction) {
        self.set_keyframes(vec![genome], action);
    }

    /// Renders frames interpolated between `keyframes`, which are
    /// sorted by time.  With temporal samples each frame is motion
    /// blurred across neighbouring times.
    pub fn set_keyframes(&mut self, mut keyframes: Vec<Genome>, action: ProcessAction) {
        keyframes.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.keyframes = keyframes;
        self.stale = true;
        self.state = match action {
            ProcessAction::Nothing => self.state,
            ProcessAction::AccumOnly => self.state.min(ProcessState::FilterDone),
            ProcessAction::FilterAndAccum => self.state.min(ProcessState::IterDone),
            ProcessAction::KeepIterating => self.state.min(ProcessState::IterStarted),
            ProcessAction::FullRender => ProcessState::None,
        };
    }

    /// How far the current frame has got.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Counters for the current frame.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Percentage of the frame's iterations done.
    pub fn progress(&self) -> f64 {
        match self.frame {
            Some(ref f) if self.state != ProcessState::None => {
                100.0 * (f.done_iters as f64 / f.total_iters as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// The genome being rendered, once a frame has started.
    pub fn current_genome(&self) -> Option<&Genome> {
        self.frame.as_ref().map(|f| &f.genome)
    }

    /// Bytes `run` needs for a whole image at the current genome's size.
    pub fn final_buffer_size(&self) -> usize {
        let genome = match self.frame {
            Some(ref f) if !self.stale => Some(&f.genome),
            _ => self.keyframes.first(),
        };
        genome.map_or(0, |g| {
            self.settings.output_format().frame_size(g.width, g.height)
        })
    }

    /// Statistics to embed in the written image.
    pub fn image_comments(&self) -> ImageComments {
        ImageComments {
            summary: self
                .current_genome()
                .map(Genome::summary)
                .unwrap_or_default(),
            bad_vals: self.stats.bad_values,
            num_iters: self.stats.iterations,
            runtime: self.stats.total_time(),
        }
    }

    /// Errors since the last `clear_errors`.
    pub fn error_report(&self) -> &ErrorReport {
        &self.errors
    }

    /// Empties the error report.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Runs that returned `RenderStatus::Error` since the last success.
    pub fn consecutive_failures(&self) -> usize {
        self.failures
    }

    /// Asks a running `run` to stop at the next safe point.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// A flag other threads can raise to abort the current run.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Advances the frame at `time`.
    ///
    /// `sub_batches` limits how many sub-batches are iterated; 0 means
    /// until the frame's quality is reached.  Output is written once
    /// iteration is complete, or on every call with `force_output`.
    /// The image lands `row_offset` rows into `out`.
    pub fn run(
        &mut self,
        out: &mut [u8],
        time: f64,
        sub_batches: usize,
        force_output: bool,
        row_offset: usize,
    ) -> RenderStatus {
        self.abort.store(false, Ordering::SeqCst);
        match self.run_stages(out, time, sub_batches, force_output, row_offset) {
            Ok(status) => {
                self.failures = 0;
                status
            }
            Err(err) => {
                error!("render failed: {}", err);
                self.errors.push_error(&err);
                self.failures += 1;
                RenderStatus::Error
            }
        }
    }

    fn run_stages(
        &mut self,
        out: &mut [u8],
        time: f64,
        sub_batches: usize,
        force_output: bool,
        row_offset: usize,
    ) -> Result<RenderStatus> {
        self.settings.validate()?;
        if self.keyframes.is_empty() {
            return Err(RenderError::InvalidGenome("no genome to render".to_string()));
        }

        let same_frame = self.frame.as_ref().map_or(false, |f| f.time == time);
        if !same_frame {
            self.state = ProcessState::None;
        } else if self.stale && self.state != ProcessState::None {
            self.refresh()?;
        }
        if self.state == ProcessState::None {
            self.prepare(time)?;
            self.state = ProcessState::IterStarted;
        }
        self.stale = false;

        if self.state == ProcessState::IterStarted {
            let started = Instant::now();
            let finished = self.iterate_batches(sub_batches);
            self.stats.iter_time += started.elapsed();
            if !finished? {
                debug!("aborted after {} iterations", self.stats.iterations);
                return Ok(RenderStatus::Abort);
            }
            if let Some(ref f) = self.frame {
                if f.done_iters >= f.total_iters {
                    self.state = ProcessState::IterDone;
                }
            }
        }

        if self.state < ProcessState::IterDone && !force_output {
            return Ok(RenderStatus::Ok);
        }
        if self.aborted() {
            return Ok(RenderStatus::Abort);
        }

        if self.state < ProcessState::FilterDone {
            let started = Instant::now();
            self.filter()?;
            self.stats.filter_time += started.elapsed();
            if self.state == ProcessState::IterDone {
                self.state = ProcessState::FilterDone;
            }
            if !self.report(RenderStage::DensityFiltering, 100.0, 0.0) {
                return Ok(RenderStatus::Abort);
            }
        }

        let started = Instant::now();
        self.accumulate(out, row_offset)?;
        self.stats.accum_time += started.elapsed();
        if self.state == ProcessState::FilterDone {
            self.state = ProcessState::AccumDone;
            info!(
                "frame at {} done: {} iterations, {} bad values, {:?}",
                time,
                self.stats.iterations,
                self.stats.bad_values,
                self.stats.total_time()
            );
        }
        if !self.report(RenderStage::FinalAccumulation, 100.0, 0.0) {
            return Ok(RenderStatus::Abort);
        }
        Ok(RenderStatus::Ok)
    }

    /// Builds everything the frame at `time` needs and clears the stats.
    fn prepare(&mut self, time: f64) -> Result<()> {
        self.frame = None;
        self.filtered = Vec::new();
        self.stats = RenderStats::default();

        let mut genome = genome_at(&self.keyframes, time);
        genome.check()?;
        genome.update_camera_matrix();

        let spatial = SpatialFilter::new(
            genome.spatial_filter_type,
            genome.spatial_filter_radius,
            genome.supersample,
            genome.pixel_aspect_ratio,
        )?;
        let density = if DensityFilter::enabled(&genome) {
            Some(DensityFilter::from_genome(&genome)?)
        } else {
            None
        };
        let mapper = PlaneMapper::new(&genome, spatial.gutter())?;
        let histogram = Histogram::new(mapper.integral_plane.0, mapper.integral_plane.1)?;
        let temporal = TemporalFilter::new(
            genome.temporal_filter_type,
            genome.temporal_samples,
            genome.temporal_filter_width,
            genome.temporal_filter_exp,
        );
        let total_iters = total_iterations(&genome);

        let mut master = IsaacRng::from_u64(self.settings.seed ^ time.to_bits());
        let batch = self.settings.sub_batch_size;
        self.workers = (0..self.settings.threads)
            .map(|_| Worker {
                state: IterState::new(IsaacRng::child(&mut master)),
                samples: vec![Point::default(); batch],
            })
            .collect();

        debug!(
            "frame at {}: {}x{} histogram, {} iterations over {} temporal samples, {} threads",
            time,
            mapper.integral_plane.0,
            mapper.integral_plane.1,
            total_iters,
            temporal.len(),
            self.workers.len()
        );

        self.frame = Some(Frame {
            time,
            genome,
            mapper,
            spatial,
            temporal,
            density,
            histogram,
            total_iters,
            done_iters: 0,
            sample: None,
        });
        Ok(())
    }

    /// Picks up a genome change that keeps the histogram usable.
    fn refresh(&mut self) -> Result<()> {
        let frame = match self.frame.as_mut() {
            Some(frame) => frame,
            None => {
                self.state = ProcessState::None;
                return Ok(());
            }
        };
        let mut genome = genome_at(&self.keyframes, frame.time);
        if !same_geometry(&frame.genome, &genome) {
            debug!("camera or filters changed, starting over");
            self.state = ProcessState::None;
            return Ok(());
        }
        genome.check()?;
        genome.update_camera_matrix();
        frame.density = if DensityFilter::enabled(&genome) {
            Some(DensityFilter::from_genome(&genome)?)
        } else {
            None
        };
        frame.total_iters = total_iterations(&genome);
        frame.sample = None;
        frame.genome = genome;
        if frame.done_iters < frame.total_iters && self.state > ProcessState::IterStarted {
            self.state = ProcessState::IterStarted;
        }
        Ok(())
    }

    /// Returns false when aborted.
    fn iterate_batches(&mut self, sub_batches: usize) -> Result<bool> {
        let started = Instant::now();
        let mut batch = 0;
        loop {
            if sub_batches != 0 && batch >= sub_batches {
                return Ok(true);
            }
            let (done, total) = match self.frame {
                Some(ref f) => (f.done_iters, f.total_iters),
                None => return Ok(true),
            };
            if done >= total {
                return Ok(true);
            }
            if self.aborted() {
                return Ok(false);
            }

            let stats = match self.frame.as_mut() {
                Some(frame) => run_sub_batch(frame, &mut self.workers, &self.keyframes, &self.abort)?,
                None => return Ok(true),
            };
            self.stats.iterations += stats.iterations;
            self.stats.bad_values += stats.bad_values;
            batch += 1;
            if stats.bad_values > 0 {
                warn!("{} bad values in sub-batch {}", stats.bad_values, batch);
            }
            trace!("sub-batch {}: {} iterations", batch, stats.iterations);

            let done = done + stats.iterations;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_secs() as f64 * 1e3 + f64::from(elapsed.subsec_nanos()) / 1e6;
            let eta_ms = if done > 0 {
                elapsed_ms * total.saturating_sub(done) as f64 / done as f64
            } else {
                0.0
            };
            let percent = 100.0 * (done as f64 / total as f64).min(1.0);
            if !self.report(RenderStage::Iterating, percent, eta_ms) {
                return Ok(false);
            }
            if stats.iterations == 0 {
                return Ok(!self.aborted());
            }
        }
    }

    /// Log scales the histogram, with density estimation when the
    /// genome asks for it.
    fn filter(&mut self) -> Result<()> {
        let threads = self.settings.threads;
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| RenderError::InvalidGenome("no frame to filter".to_string()))?;
        let (w, h) = (frame.genome.width, frame.genome.height);
        let quality = frame.done_iters as f64 / (w * h) as f64;
        let scale = LogScale::new(
            frame.genome.brightness,
            frame.genome.supersample,
            frame.mapper.area(w, h),
            quality,
            frame.temporal.sum_filt,
        );
        let (hw, hh) = (frame.mapper.integral_plane.0, frame.mapper.integral_plane.1);
        let cells = frame.histogram.cells();
        self.filtered = match frame.density {
            Some(ref de) => de.apply(cells, hw, hh, scale, threads)?,
            None => apply_log_scale(cells, hw, scale, threads)?,
        };
        Ok(())
    }

    /// Spatially filters and color corrects into `out`.
    fn accumulate(&mut self, out: &mut [u8], row_offset: usize) -> Result<()> {
        let threads = self.settings.threads;
        let format = self.settings.output_format();
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| RenderError::InvalidGenome("no frame to accumulate".to_string()))?;
        let (w, h) = (frame.genome.width, frame.genome.height);
        let needed = (row_offset + h) * format.stride(w);
        if out.len() < needed {
            return Err(RenderError::OutputTooSmall {
                got: out.len(),
                needed,
            });
        }
        let image = downsample(
            &self.filtered,
            frame.mapper.integral_plane.0,
            &frame.spatial,
            w,
            h,
            threads,
        )?;
        let cc = ColorCorrection::from_genome(&frame.genome);
        write_image(&image, w, h, &cc, &format, out, row_offset, threads)
    }

    /// Tells the callback; false means stop.
    fn report(&mut self, stage: RenderStage, percent: f64, eta_ms: f64) -> bool {
        let keep_going = match (self.callback.as_mut(), self.frame.as_ref()) {
            (Some(cb), Some(frame)) => cb.progress(&frame.genome, percent, stage, eta_ms),
            _ => true,
        };
        if !keep_going {
            self.abort();
        }
        !self.aborted()
    }
}

/// Drives `renderer` to completion, handing every intermediate image to
/// `on_preview` with the percentage done.  `on_preview` returning false
/// stops early with `RenderStatus::Abort`.  After
/// `MAX_CONSECUTIVE_FAILURES` failed runs in a row the collected errors
/// are returned.
pub fn render_progressive<F>(
    renderer: &mut Renderer,
    out: &mut [u8],
    time: f64,
    sub_batches: usize,
    mut on_preview: F,
) -> std::result::Result<RenderStatus, ErrorReport>
where
    F: FnMut(&[u8], f64) -> bool,
{
    let sub_batches = sub_batches.max(1);
    loop {
        match renderer.run(out, time, sub_batches, true, 0) {
            RenderStatus::Error => {
                if renderer.consecutive_failures() >= MAX_CONSECUTIVE_FAILURES {
                    error!(
                        "giving up after {} failed runs",
                        renderer.consecutive_failures()
                    );
                    return Err(renderer.error_report().clone());
                }
                warn!("run failed, retrying");
            }
            RenderStatus::Abort => return Ok(RenderStatus::Abort),
            RenderStatus::Ok => {
                let done = renderer.state() == ProcessState::AccumDone;
                let keep_going = on_preview(out, renderer.progress());
                if done {
                    return Ok(RenderStatus::Ok);
                }
                if !keep_going {
                    return Ok(RenderStatus::Abort);
                }
            }
        }
    }
}
