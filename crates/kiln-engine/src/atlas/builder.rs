use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::source::{FrameCanvas, SharedSource};
use crate::time::{MonotonicTime, TimeSource};

use super::config::AtlasConfig;
use super::error::AtlasError;
use super::packer::{pack, PackItem, Placement};
use super::request::{FrameOptions, FrameRequest};
use super::sheet::{Animation, AtlasImage, FrameLocation, SpriteSheet};

/// Progress notification emitted by [`AtlasBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// Emitted after every step with the current progress in `0.0..=1.0`.
    Progress(f32),
    /// The new sprite sheet is available from `AtlasBuilder::sprite_sheet`.
    Complete,
    Failed(AtlasError),
}

/// Result of one build step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BuildStatus {
    InProgress(f32),
    Complete,
}

/// Packs queued frames into sprite sheet images.
///
/// Frames are queued with [`add_frame`](Self::add_frame), then drawn either in
/// one go with [`build`](Self::build) or in time-boxed steps: call
/// [`begin_build`](Self::begin_build) and [`step`](Self::step) manually, or
/// hand the builder to a [`FrameClock`](crate::time::FrameClock) with
/// [`AtlasBuilder::build_async`].
///
/// Starting a build drains the queue, so frame indices restart at 0 for the
/// next batch. At most one build is in progress at a time.
pub struct AtlasBuilder {
    config: AtlasConfig,

    queue: Vec<FrameRequest>,
    animations: Vec<Animation>,
    next_sequence: u64,

    build: Option<BuildState>,
    next_build_id: u64,
    progress: f32,
    /// Build whose clock continuation was dropped while the builder was
    /// borrowed. Aborted on the next mutable call.
    orphaned: Rc<Cell<Option<u64>>>,
    /// Measures step budgets.
    time: Box<dyn TimeSource>,

    sheet: Option<SpriteSheet>,
    listeners: Vec<Box<dyn FnMut(&BuildEvent)>>,
}

impl AtlasBuilder {
    pub fn new() -> Self {
        Self::with_config(AtlasConfig::default())
    }

    pub fn with_config(config: AtlasConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            animations: Vec::new(),
            next_sequence: 0,
            build: None,
            next_build_id: 0,
            progress: -1.0,
            orphaned: Rc::new(Cell::new(None)),
            time: Box::new(MonotonicTime::new()),
            sheet: None,
            listeners: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Settings changes apply to the next build, not one in progress.
    #[inline]
    pub fn config_mut(&mut self) -> &mut AtlasConfig {
        &mut self.config
    }

    /// Replaces the time source step budgets are measured against.
    ///
    /// Pass the clock's [`ManualTime`](crate::time::ManualTime) handle to make
    /// clock-driven slicing deterministic.
    pub fn set_time_source(&mut self, time: impl TimeSource + 'static) {
        self.time = Box::new(time);
    }

    // ── queue ─────────────────────────────────────────────────────────────

    /// Queues `source` at its natural bounds and scale 1.
    pub fn add_frame(&mut self, source: SharedSource) -> Option<usize> {
        self.add_frame_with(source, FrameOptions::default())
    }

    /// Queues a frame and returns its index in the next sprite sheet.
    ///
    /// Returns `None`, leaving the builder untouched, when no drawable
    /// rectangle can be resolved or the scale is not positive.
    pub fn add_frame_with(&mut self, source: SharedSource, options: FrameOptions) -> Option<usize> {
        let FrameOptions { source_rect, scale, setup } = options;

        let scale = scale.unwrap_or(1.0);
        if !(scale.is_finite() && scale > 0.0) {
            log::warn!("AtlasBuilder: frame scale {scale} is not positive, skipping");
            return None;
        }

        let source_rect = match source_rect {
            Some(rect) => Some(rect),
            None => match source.try_borrow() {
                Ok(src) => src.bounds(),
                Err(_) => {
                    log::warn!("AtlasBuilder: source is borrowed elsewhere, cannot query bounds");
                    None
                }
            },
        };
        let Some(source_rect) = source_rect.filter(|r| r.is_drawable()) else {
            log::warn!("AtlasBuilder: source rectangle could not be determined, skipping frame");
            return None;
        };

        let frame_index = self.queue.len();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.queue.push(FrameRequest { source, source_rect, scale, setup, frame_index, sequence });
        Some(frame_index)
    }

    /// Frames waiting for the next build.
    #[inline]
    pub fn queued(&self) -> &[FrameRequest] {
        &self.queue
    }

    /// Defines a named frame sequence for the next sprite sheet.
    pub fn add_animation(
        &mut self,
        name: impl Into<String>,
        frames: Vec<usize>,
        next: Option<String>,
        speed: Option<f32>,
    ) {
        let name = name.into();
        self.animations.retain(|a| a.name != name);
        self.animations.push(Animation { name, frames, next, speed });
    }

    // ── events ────────────────────────────────────────────────────────────

    /// Registers a callback for [`BuildEvent`]s.
    ///
    /// Callbacks run while the builder is borrowed and must not call back into it.
    pub fn add_event_listener(&mut self, listener: impl FnMut(&BuildEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: BuildEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// `-1.0` when no build is in progress or has completed since the last
    /// reset, otherwise the fraction of frames drawn.
    pub fn progress(&self) -> f32 {
        if self.build.is_some() && self.live_build().is_none() {
            -1.0
        } else {
            self.progress
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.live_build().is_some()
    }

    /// Last successfully built sheet.
    #[inline]
    pub fn sprite_sheet(&self) -> Option<&SpriteSheet> {
        self.sheet.as_ref()
    }

    /// Drops the last built sheet.
    pub fn clear(&mut self) {
        self.sheet = None;
    }

    pub(crate) fn active_build(&self) -> Option<u64> {
        self.live_build().map(|b| b.id)
    }

    pub(crate) fn orphan_flag(&self) -> Rc<Cell<Option<u64>>> {
        Rc::clone(&self.orphaned)
    }

    fn live_build(&self) -> Option<&BuildState> {
        self.build.as_ref().filter(|b| self.orphaned.get() != Some(b.id))
    }

    fn reap_orphaned(&mut self) {
        if self.build.is_some() && self.live_build().is_none() {
            self.orphaned.set(None);
            self.abort(AtlasError::BuildAborted);
        }
    }

    /// Drawing budget for one clock-driven step: `time_slice * interval`.
    pub(crate) fn step_budget(&self, interval_ms: f64) -> Duration {
        let slice = self.build.as_ref().map_or(self.config.time_slice(), |b| b.config.time_slice());
        Duration::from_nanos((slice * interval_ms * 1_000_000.0).round() as u64)
    }

    // ── building ──────────────────────────────────────────────────────────

    /// Builds every queued frame before returning.
    ///
    /// A frame whose source is borrowed elsewhere fails the whole build with
    /// [`AtlasError::SourceBusy`].
    pub fn build(&mut self) -> Result<&SpriteSheet, AtlasError> {
        self.begin_build()?;
        loop {
            match self.step(Duration::MAX) {
                Ok(BuildStatus::InProgress(_)) => {}
                Ok(BuildStatus::Complete) => break,
                Err(err) => {
                    self.abort(err.clone());
                    return Err(err);
                }
            }
        }
        self.sheet.as_ref().ok_or(AtlasError::NotRunning)
    }

    /// Starts a build to be driven by [`step`](Self::step).
    ///
    /// Packing happens here, so an oversized frame fails immediately and the
    /// drained queue is discarded.
    pub fn begin_build(&mut self) -> Result<u64, AtlasError> {
        self.reap_orphaned();
        if self.build.is_some() {
            log::warn!("AtlasBuilder: build requested while another is running");
            return Err(AtlasError::AlreadyRunning);
        }

        let id = self.next_build_id;
        self.next_build_id += 1;

        let requests = std::mem::take(&mut self.queue);
        let animations = std::mem::take(&mut self.animations);

        match BuildState::begin(id, self.config.clone(), requests, animations) {
            Ok(state) => {
                log::info!(
                    "AtlasBuilder: build {id} started ({} frames, {} images)",
                    state.total,
                    state.image_sizes.len()
                );
                self.build = Some(state);
                self.progress = 0.0;
                Ok(id)
            }
            Err(err) => {
                log::warn!("AtlasBuilder: build {id} failed: {err}");
                self.progress = -1.0;
                self.emit(BuildEvent::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Draws queued frames until `budget` is spent. Always draws at least one
    /// frame when any remain.
    ///
    /// A frame whose source or setup target is borrowed elsewhere ends the
    /// step with [`AtlasError::SourceBusy`]; the build keeps running and the
    /// frame is retried by the next step.
    pub fn step(&mut self, budget: Duration) -> Result<BuildStatus, AtlasError> {
        self.reap_orphaned();
        let Some(state) = self.build.as_mut() else {
            return Err(AtlasError::NotRunning);
        };

        let started = self.time.now();
        let drawn_before = state.drawn;
        let mut busy = None;
        while !state.is_done() {
            if let Err(frame) = state.draw_next() {
                busy = Some(frame);
                break;
            }
            if self.time.now().saturating_sub(started) >= budget {
                break;
            }
        }

        let progress = state.progress();
        let advanced = state.drawn > drawn_before;
        self.progress = progress;

        if let Some(frame) = busy {
            log::debug!("AtlasBuilder: source of frame {frame} is busy, pausing build");
            if advanced {
                self.emit(BuildEvent::Progress(progress));
            }
            return Err(AtlasError::SourceBusy { frame });
        }
        self.emit(BuildEvent::Progress(progress));

        if !self.build.as_ref().is_some_and(BuildState::is_done) {
            return Ok(BuildStatus::InProgress(progress));
        }

        if let Some(state) = self.build.take() {
            let id = state.id;
            let sheet = state.finish();
            log::info!(
                "AtlasBuilder: build {id} complete ({} frames in {} images)",
                sheet.frame_count(),
                sheet.images().len()
            );
            self.sheet = Some(sheet);
        }
        self.progress = 1.0;
        self.emit(BuildEvent::Complete);
        Ok(BuildStatus::Complete)
    }

    /// Aborts the build in progress, discarding partially drawn images.
    ///
    /// A clock continuation driving it removes itself on its next tick.
    pub fn stop(&mut self) {
        self.abort(AtlasError::BuildAborted);
    }

    fn abort(&mut self, reason: AtlasError) {
        let Some(state) = self.build.take() else {
            return;
        };
        log::info!(
            "AtlasBuilder: build {} aborted at {}/{} frames: {reason}",
            state.id,
            state.drawn,
            state.total
        );
        self.progress = -1.0;
        self.emit(BuildEvent::Failed(reason));
    }
}

impl Default for AtlasBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AtlasBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasBuilder")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("running", &self.is_running())
            .field("progress", &self.progress())
            .field("has_sheet", &self.sheet.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything an in-progress build needs. Owned by exactly one builder.
struct BuildState {
    id: u64,
    config: AtlasConfig,
    /// Frames still to draw, in packing order.
    pending: VecDeque<(FrameRequest, Placement)>,
    image_sizes: Vec<(u32, u32)>,
    images: Vec<AtlasImage>,
    frames: Vec<Option<FrameLocation>>,
    animations: Vec<Animation>,
    drawn: usize,
    total: usize,
}

impl BuildState {
    fn begin(
        id: u64,
        config: AtlasConfig,
        requests: Vec<FrameRequest>,
        animations: Vec<Animation>,
    ) -> Result<Self, AtlasError> {
        let items: Vec<PackItem> = requests
            .iter()
            .map(|r| {
                let (w, h) = r.extent(config.scale());
                PackItem::new(w, h)
            })
            .collect();

        let plan = pack(&items, config.limits())?;

        let total = requests.len();
        let mut slots: Vec<Option<FrameRequest>> = requests.into_iter().map(Some).collect();
        let pending = plan
            .draw_order
            .iter()
            .filter_map(|&i| slots[i].take().map(|req| (req, plan.placements[i])))
            .collect();

        Ok(Self {
            id,
            config,
            pending,
            image_sizes: plan.images,
            images: Vec::new(),
            frames: vec![None; total],
            animations,
            drawn: 0,
            total,
        })
    }

    /// Draws the next frame.
    ///
    /// A frame whose setup target or source is borrowed elsewhere goes back
    /// to the front of the queue and its index is returned.
    fn draw_next(&mut self) -> Result<(), usize> {
        let Some((request, placement)) = self.pending.pop_front() else {
            return Ok(());
        };

        while self.images.len() <= placement.image {
            let index = self.images.len();
            let (w, h) = self.image_sizes[index];
            self.images.push(AtlasImage::new(index, w, h));
        }

        let ready = request.setup.as_ref().is_none_or(|setup| setup.run());
        if ready {
            if let Ok(source) = request.source.try_borrow() {
                let scale = request.scale * self.config.scale();
                let mut canvas = FrameCanvas::new(&mut self.images[placement.image].pixels, placement.rect);
                source.draw(request.source_rect, scale, &mut canvas);

                let reg = source.registration();
                self.frames[request.frame_index] =
                    Some(FrameLocation { image: placement.image, rect: placement.rect, reg_x: reg.x, reg_y: reg.y });
                self.drawn += 1;
                return Ok(());
            }
        }

        let frame = request.frame_index;
        self.pending.push_front((request, placement));
        Err(frame)
    }

    fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.drawn as f32 / self.total as f32
        }
    }

    fn finish(self) -> SpriteSheet {
        let frames = self.frames.into_iter().flatten().collect();
        SpriteSheet::new(self.images, frames, self.animations)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use image::Rgba;

    use super::*;
    use crate::atlas::FrameSetup;
    use crate::coords::{PixelRect, Rect, Vec2};
    use crate::source::{shared, FrameCanvas, FrameSource};
    use crate::time::ManualTime;

    /// Solid-colour source with optional bounds.
    struct Swatch {
        bounds: Option<Rect>,
        color: Rgba<u8>,
        reg: Vec2,
        draws: Rc<Cell<usize>>,
    }

    impl Swatch {
        fn new(w: f32, h: f32) -> Self {
            Self {
                bounds: Some(Rect::new(0.0, 0.0, w, h)),
                color: Rgba([255, 255, 255, 255]),
                reg: Vec2::zero(),
                draws: Rc::new(Cell::new(0)),
            }
        }
    }

    impl FrameSource for Swatch {
        fn bounds(&self) -> Option<Rect> {
            self.bounds
        }

        fn registration(&self) -> Vec2 {
            self.reg
        }

        fn draw(&self, _source_rect: Rect, _scale: f32, canvas: &mut FrameCanvas<'_>) {
            self.draws.set(self.draws.get() + 1);
            for y in 0..canvas.height() {
                for x in 0..canvas.width() {
                    canvas.put_pixel(x, y, self.color);
                }
            }
        }
    }

    /// Source whose every draw costs `cost_ms` of manual time.
    struct Costly {
        time: ManualTime,
        cost_ms: u64,
    }

    impl FrameSource for Costly {
        fn bounds(&self) -> Option<Rect> {
            Some(Rect::new(0.0, 0.0, 4.0, 4.0))
        }

        fn draw(&self, _source_rect: Rect, _scale: f32, _canvas: &mut FrameCanvas<'_>) {
            self.time.advance_ms(self.cost_ms);
        }
    }

    fn swatch(w: f32, h: f32) -> SharedSource {
        shared(Swatch::new(w, h))
    }

    fn assert_no_overlaps(sheet: &SpriteSheet) {
        let frames = sheet.frames();
        for (i, a) in frames.iter().enumerate() {
            let img = sheet.image(a.image).unwrap();
            assert!(a.rect.fits_within(img.width(), img.height()));
            for b in &frames[i + 1..] {
                if a.image == b.image {
                    assert!(!a.rect.overlaps(b.rect), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    // ── add_frame ─────────────────────────────────────────────────────────

    #[test]
    fn indices_are_sequential_and_addressable() {
        let mut builder = AtlasBuilder::new();
        let sizes = [(10.0, 20.0), (30.0, 5.0), (7.0, 7.0)];
        let indices: Vec<usize> = sizes
            .iter()
            .map(|&(w, h)| builder.add_frame(swatch(w, h)).unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let sheet = builder.build().unwrap();
        assert_eq!(sheet.frame_count(), 3);
        for (i, &(w, h)) in indices.iter().zip(&sizes) {
            let rect = sheet.frame(*i).unwrap().rect;
            assert_eq!((rect.width, rect.height), (w as u32, h as u32));
        }
    }

    #[test]
    fn undeterminable_rect_is_skipped() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(4.0, 4.0));

        let mut blank = Swatch::new(1.0, 1.0);
        blank.bounds = None;
        assert_eq!(builder.add_frame(shared(blank)), None);
        assert_eq!(builder.add_frame(swatch(0.0, 5.0)), None);
        assert_eq!(builder.queued().len(), 1);

        assert_eq!(builder.add_frame(swatch(2.0, 2.0)), Some(1));
    }

    #[test]
    fn explicit_rect_and_scale() {
        let mut builder = AtlasBuilder::new();
        let mut blank = Swatch::new(1.0, 1.0);
        blank.bounds = None;
        let src = shared(blank);

        let opts = FrameOptions::default().rect(Rect::new(5.0, 5.0, 10.0, 4.0)).scale(1.5);
        assert_eq!(builder.add_frame_with(src.clone(), opts), Some(0));
        assert_eq!(builder.add_frame_with(src.clone(), FrameOptions::default().scale(0.0)), None);
        assert_eq!(builder.add_frame_with(src, FrameOptions::default().scale(-1.0)), None);

        let req = &builder.queued()[0];
        assert_eq!(req.extent(1.0), (15, 6));
        assert_eq!(req.extent(2.0), (30, 12));
    }

    #[test]
    fn global_scale_multiplies_frame_scale() {
        let mut builder = AtlasBuilder::new();
        builder.config_mut().set_scale(2.0).unwrap();
        builder.add_frame_with(swatch(10.0, 10.0), FrameOptions::default().scale(1.5));
        let sheet = builder.build().unwrap();
        assert_eq!(sheet.frame(0).unwrap().rect, PixelRect::new(0, 0, 30, 30));
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn many_frames_respect_limits() {
        let mut builder = AtlasBuilder::new();
        builder.config_mut().set_max_width(64).unwrap();
        builder.config_mut().set_max_height(64).unwrap();
        for i in 0..40 {
            builder.add_frame(swatch(5.0 + (i % 7) as f32 * 3.0, 4.0 + (i % 5) as f32 * 4.0));
        }

        let sheet = builder.build().unwrap();
        assert_eq!(sheet.frame_count(), 40);
        assert!(sheet.images().len() > 1);
        for img in sheet.images() {
            assert!(img.width() <= 64 && img.height() <= 64);
        }
        assert_no_overlaps(sheet);
    }

    #[test]
    fn frames_are_drawn_into_their_rects() {
        let mut builder = AtlasBuilder::new();
        let mut red = Swatch::new(3.0, 2.0);
        red.color = Rgba([255, 0, 0, 255]);
        builder.add_frame(swatch(5.0, 5.0));
        builder.add_frame(shared(red));

        let sheet = builder.build().unwrap();
        let loc = *sheet.frame(1).unwrap();
        let pixels = &sheet.image(loc.image).unwrap().pixels;
        assert_eq!(*pixels.get_pixel(loc.rect.x, loc.rect.y), Rgba([255, 0, 0, 255]));
        assert_eq!(*pixels.get_pixel(loc.rect.right() - 1, loc.rect.bottom() - 1), Rgba([255, 0, 0, 255]));
        // Padding column between the two frames stays clear.
        assert_eq!(*pixels.get_pixel(loc.rect.x - 1, loc.rect.y), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn registration_is_carried_over() {
        let mut builder = AtlasBuilder::new();
        let mut src = Swatch::new(8.0, 8.0);
        src.reg = Vec2::new(4.0, 7.5);
        builder.add_frame(shared(src));

        let loc = *builder.build().unwrap().frame(0).unwrap();
        assert_eq!((loc.reg_x, loc.reg_y), (4.0, 7.5));
    }

    #[test]
    fn oversized_frame_fails_build() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(10.0, 10.0));
        builder.build().unwrap();

        builder.add_frame(swatch(10.0, 10.0));
        builder.add_frame(swatch(3000.0, 3000.0));
        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            AtlasError::DimensionsExceeded {
                frame: 1,
                width: 3000,
                height: 3000,
                max_width: 2048,
                max_height: 2048,
            }
        );

        assert!(!builder.is_running());
        assert_eq!(builder.progress(), -1.0);
        assert!(builder.queued().is_empty());
        // The earlier sheet survives.
        assert_eq!(builder.sprite_sheet().unwrap().frame_count(), 1);
    }

    #[test]
    fn empty_build_completes() {
        let mut builder = AtlasBuilder::new();
        let sheet = builder.build().unwrap();
        assert_eq!(sheet.frame_count(), 0);
        assert!(sheet.images().is_empty());
        assert_eq!(builder.progress(), 1.0);
    }

    #[test]
    fn indices_restart_for_next_batch() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(4.0, 4.0));
        builder.add_frame(swatch(4.0, 4.0));
        builder.build().unwrap();

        assert_eq!(builder.add_frame(swatch(6.0, 6.0)), Some(0));
        assert_eq!(builder.queued()[0].sequence(), 2);
        assert_eq!(builder.build().unwrap().frame_count(), 1);
    }

    #[test]
    fn animations_reach_the_sheet() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(4.0, 4.0));
        builder.add_frame(swatch(4.0, 4.0));
        builder.add_animation("spin", vec![0, 1], None, Some(0.5));
        builder.add_animation("spin", vec![1, 0], Some("spin".into()), None);

        let sheet = builder.build().unwrap();
        assert_eq!(sheet.animations().len(), 1);
        let spin = sheet.animation("spin").unwrap();
        assert_eq!(spin.frames, vec![1, 0]);
        assert_eq!(spin.next.as_deref(), Some("spin"));
    }

    // ── setup ─────────────────────────────────────────────────────────────

    #[test]
    fn setup_reconfigures_shared_source_per_frame() {
        let src = shared(Swatch::new(4.0, 4.0));
        let mut builder = AtlasBuilder::new();
        let colors = [Rgba([255, 0, 0, 255]), Rgba([0, 255, 0, 255]), Rgba([0, 0, 255, 255])];

        for color in colors {
            let setup = FrameSetup::new(src.clone(), color, |s: &mut Swatch, c| s.color = *c);
            builder.add_frame_with(src.clone(), FrameOptions::default().setup(setup));
        }

        let sheet = builder.build().unwrap();
        for (i, color) in colors.iter().enumerate() {
            let loc = sheet.frame(i).unwrap();
            let px = sheet.image(loc.image).unwrap().pixels.get_pixel(loc.rect.x, loc.rect.y);
            assert_eq!(px, color);
        }
        assert_eq!(src.borrow().draws.get(), 3);
    }

    // ── stepping ──────────────────────────────────────────────────────────

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let mut builder = AtlasBuilder::new();
        assert_eq!(builder.progress(), -1.0);
        for _ in 0..4 {
            builder.add_frame(swatch(6.0, 6.0));
        }

        builder.begin_build().unwrap();
        assert_eq!(builder.progress(), 0.0);

        let mut seen = Vec::new();
        loop {
            match builder.step(Duration::ZERO).unwrap() {
                BuildStatus::InProgress(p) => seen.push(p),
                BuildStatus::Complete => break,
            }
        }
        // Zero budget still draws one frame per step.
        assert_eq!(seen, vec![0.25, 0.5, 0.75]);
        assert_eq!(builder.progress(), 1.0);
        assert_eq!(builder.step(Duration::ZERO), Err(AtlasError::NotRunning));
    }

    #[test]
    fn build_during_build_is_rejected_and_harmless() {
        let frames = [(12.0, 8.0), (5.0, 9.0), (20.0, 3.0), (7.0, 7.0)];

        let mut reference = AtlasBuilder::new();
        for &(w, h) in &frames {
            reference.add_frame(swatch(w, h));
        }
        let expected = reference.build().unwrap().clone();

        let mut builder = AtlasBuilder::new();
        for &(w, h) in &frames {
            builder.add_frame(swatch(w, h));
        }
        builder.begin_build().unwrap();
        builder.step(Duration::ZERO).unwrap();

        assert_eq!(builder.build().unwrap_err(), AtlasError::AlreadyRunning);
        assert_eq!(builder.begin_build(), Err(AtlasError::AlreadyRunning));
        assert!(builder.is_running());

        while builder.step(Duration::ZERO).unwrap() != BuildStatus::Complete {}
        assert_eq!(builder.sprite_sheet().unwrap(), &expected);
    }

    #[test]
    fn stop_discards_partial_state() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(4.0, 4.0));
        builder.build().unwrap();
        let previous = builder.sprite_sheet().unwrap().clone();

        builder.add_frame(swatch(8.0, 8.0));
        builder.add_frame(swatch(8.0, 8.0));
        builder.begin_build().unwrap();
        builder.step(Duration::ZERO).unwrap();
        builder.stop();

        assert!(!builder.is_running());
        assert_eq!(builder.progress(), -1.0);
        assert_eq!(builder.sprite_sheet(), Some(&previous));
        assert_eq!(builder.step(Duration::ZERO), Err(AtlasError::NotRunning));

        // Stopping again is a no-op.
        builder.stop();
    }

    #[test]
    fn events_follow_build_lifecycle() {
        let mut builder = AtlasBuilder::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        builder.add_event_listener(move |e| sink.borrow_mut().push(e.clone()));

        builder.add_frame(swatch(4.0, 4.0));
        builder.add_frame(swatch(4.0, 4.0));
        builder.begin_build().unwrap();
        builder.step(Duration::ZERO).unwrap();
        builder.step(Duration::ZERO).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![BuildEvent::Progress(0.5), BuildEvent::Progress(1.0), BuildEvent::Complete]
        );

        builder.add_frame(swatch(4000.0, 1.0));
        assert!(builder.build().is_err());
        assert!(matches!(
            events.borrow().last(),
            Some(BuildEvent::Failed(AtlasError::DimensionsExceeded { .. }))
        ));
    }

    #[test]
    fn step_stops_when_budget_is_spent() {
        let time = ManualTime::new();
        let mut builder = AtlasBuilder::new();
        builder.set_time_source(time.clone());
        for _ in 0..9 {
            builder.add_frame(shared(Costly { time: time.clone(), cost_ms: 4 }));
        }

        builder.begin_build().unwrap();
        let mut seen = Vec::new();
        loop {
            match builder.step(Duration::from_millis(10)).unwrap() {
                BuildStatus::InProgress(p) => seen.push(p),
                BuildStatus::Complete => break,
            }
        }
        // Three 4 ms draws reach the 10 ms budget.
        assert_eq!(seen, vec![3.0 / 9.0, 6.0 / 9.0]);
        assert_eq!(time.now(), Duration::from_millis(36));
    }

    // ── busy sources ──────────────────────────────────────────────────────

    #[test]
    fn busy_source_fails_synchronous_build() {
        let mut builder = AtlasBuilder::new();
        builder.add_frame(swatch(4.0, 4.0));
        builder.build().unwrap();
        let previous = builder.sprite_sheet().unwrap().clone();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        builder.add_event_listener(move |e| sink.borrow_mut().push(e.clone()));

        let src = shared(Swatch::new(4.0, 4.0));
        builder.add_frame(swatch(6.0, 6.0));
        builder.add_frame(src.clone());
        {
            let _held = src.borrow_mut();
            assert_eq!(builder.build().unwrap_err(), AtlasError::SourceBusy { frame: 1 });
        }

        assert!(!builder.is_running());
        assert_eq!(builder.progress(), -1.0);
        assert_eq!(builder.sprite_sheet(), Some(&previous));
        assert_eq!(
            events.borrow().last(),
            Some(&BuildEvent::Failed(AtlasError::SourceBusy { frame: 1 }))
        );
        assert_eq!(src.borrow().draws.get(), 0);
    }

    #[test]
    fn busy_setup_target_fails_build_without_panicking() {
        let src = shared(Swatch::new(4.0, 4.0));
        let mut builder = AtlasBuilder::new();
        let setup = FrameSetup::new(src.clone(), Rgba([0, 0, 255, 255]), |s: &mut Swatch, c| s.color = *c);
        builder.add_frame_with(src.clone(), FrameOptions::default().setup(setup));

        let _held = src.borrow();
        assert_eq!(builder.build().unwrap_err(), AtlasError::SourceBusy { frame: 0 });
        assert!(!builder.is_running());
    }

    #[test]
    fn busy_source_is_retried_by_next_step() {
        let mut red = Swatch::new(4.0, 4.0);
        red.color = Rgba([255, 0, 0, 255]);
        let src = shared(red);

        let mut builder = AtlasBuilder::new();
        builder.add_frame(src.clone());
        builder.begin_build().unwrap();

        {
            let _held = src.borrow_mut();
            assert_eq!(builder.step(Duration::MAX), Err(AtlasError::SourceBusy { frame: 0 }));
        }
        assert!(builder.is_running());
        assert_eq!(builder.progress(), 0.0);

        assert_eq!(builder.step(Duration::MAX), Ok(BuildStatus::Complete));
        let sheet = builder.sprite_sheet().unwrap();
        let loc = sheet.frame(0).unwrap();
        assert_eq!(*sheet.image(0).unwrap().pixels.get_pixel(loc.rect.x, loc.rect.y), Rgba([255, 0, 0, 255]));
    }
}
