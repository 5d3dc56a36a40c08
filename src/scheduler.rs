//! Render loop controller: owns the program, paces frames against the
//! tier's target rate, debounces backing-store resizes and rebuilds
//! everything when the graphics context comes back after a loss.
//!
//! The controller never touches a clock or a timer itself. The host feeds it
//! millisecond timestamps from its frame callback and its resize timer, which
//! keeps every transition reproducible in tests.

use crate::controls::{ControlState, FrameUniforms};
use crate::error::{FailureSurface, RenderError};
use crate::look::LookControls;
use crate::quality::{QualitySettings, QualityTier};
use crate::shader::{self, ShaderMode, ShaderSources};

/// Resize events closer together than this collapse into one reallocation.
pub const RESIZE_DEBOUNCE_MS: f64 = 150.0;
/// Ceiling on device pixels per logical pixel.
pub const MAX_DEVICE_PIXEL_RATIO: f64 = 2.5;

/// The seam between scheduling and the graphics API.
pub trait GraphicsDevice {
    type Program;

    fn mode(&self) -> ShaderMode;
    fn build_program(&mut self, sources: &ShaderSources) -> Result<Self::Program, RenderError>;
    fn release_program(&mut self, program: Self::Program);
    fn resize_backing(&mut self, size: BackingSize);
    fn draw(&mut self, program: &Self::Program, frame: &FrameUniforms);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Compiling,
    Ready,
    Rendering,
    ContextLost,
    Failed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    ContextLost,
    Paced,
    NotReady,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    Skipped(SkipReason),
}

/// Layout box of the drawing surface in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub logical_width: f64,
    pub logical_height: f64,
    pub device_pixel_ratio: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackingSize {
    pub width: u32,
    pub height: u32,
}

impl BackingSize {
    pub fn for_surface(surface: &SurfaceSize, pixel_ratio: f32) -> Self {
        let dpr = (surface.device_pixel_ratio * pixel_ratio as f64).min(MAX_DEVICE_PIXEL_RATIO);
        let side = |logical: f64| {
            let px = (logical * dpr).floor();
            if px.is_finite() && px >= 1.0 {
                px.min(u32::MAX as f64) as u32
            } else {
                1
            }
        };
        Self {
            width: side(surface.logical_width),
            height: side(surface.logical_height),
        }
    }
}

/// Drops callbacks that arrive sooner than the target frame interval.
#[derive(Clone, Debug)]
pub struct FramePacer {
    interval_ms: f64,
    last_frame: Option<f64>,
}

impl FramePacer {
    pub fn new(interval_ms: f64) -> Self {
        Self { interval_ms, last_frame: None }
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
    }

    /// True when a frame should be drawn at `now`. The remainder of the
    /// elapsed time is carried so the average rate holds at the target.
    pub fn ready(&mut self, now: f64) -> bool {
        let Some(last) = self.last_frame else {
            self.last_frame = Some(now);
            return true;
        };
        let elapsed = now - last;
        if elapsed < self.interval_ms {
            return false;
        }
        self.last_frame = Some(now - elapsed % self.interval_ms);
        true
    }
}

/// Coalesces bursts of resize events into one, fired once the surface has
/// been quiet for the debounce window.
#[derive(Clone, Debug, Default)]
pub struct ResizeDebouncer {
    pending: Option<(SurfaceSize, f64)>,
}

impl ResizeDebouncer {
    pub fn schedule(&mut self, surface: SurfaceSize, now: f64) {
        self.pending = Some((surface, now + RESIZE_DEBOUNCE_MS));
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.map(|(_, deadline)| deadline)
    }

    pub fn poll(&mut self, now: f64) -> Option<SurfaceSize> {
        match self.pending {
            Some((surface, deadline)) if now >= deadline => {
                self.pending = None;
                Some(surface)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

pub struct RenderLoop<D: GraphicsDevice> {
    device: D,
    tier: QualityTier,
    settings: QualitySettings,
    look: LookControls,
    state: LoopState,
    program: Option<D::Program>,
    controls: ControlState,
    visible: bool,
    time_origin: f64,
    pacer: FramePacer,
    resize: ResizeDebouncer,
    surface: Option<SurfaceSize>,
    backing: Option<BackingSize>,
    failure: Option<RenderError>,
}

impl<D: GraphicsDevice> RenderLoop<D> {
    pub fn new(device: D, tier: QualityTier, look: LookControls) -> Self {
        let settings = tier.settings();
        Self {
            device,
            tier,
            settings,
            look,
            state: LoopState::Uninitialized,
            program: None,
            controls: ControlState::default(),
            visible: true,
            time_origin: 0.0,
            pacer: FramePacer::new(settings.frame_interval_ms()),
            resize: ResizeDebouncer::default(),
            surface: None,
            backing: None,
            failure: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn failure_surface(&self) -> FailureSurface {
        self.failure
            .as_ref()
            .map(FailureSurface::from_error)
            .unwrap_or_default()
    }

    pub fn backing_size(&self) -> Option<BackingSize> {
        self.backing
    }

    /// Compiles the program and sizes the backing store right away. A
    /// compile or link failure is terminal.
    pub fn start(&mut self, now: f64, surface: SurfaceSize) -> Result<(), RenderError> {
        if self.state != LoopState::Uninitialized {
            return Ok(());
        }
        log::info!(
            "starting renderer: tier={} mode={}",
            self.tier,
            self.device.mode().name()
        );
        self.surface = Some(surface);
        self.initialize(now)
    }

    /// Records the terminal capability failure reported by the host before
    /// a device could be created.
    pub fn fail(&mut self, error: RenderError) {
        log::error!("renderer failed: {}", error);
        self.release();
        self.resize.cancel();
        self.failure = Some(error);
        self.state = LoopState::Failed;
    }

    fn initialize(&mut self, now: f64) -> Result<(), RenderError> {
        self.state = LoopState::Compiling;
        let sources = shader::assemble(self.device.mode(), &self.settings, &self.look);
        match self.device.build_program(&sources) {
            Ok(program) => {
                self.program = Some(program);
                self.state = LoopState::Ready;
                self.time_origin = now;
                self.pacer.reset();
                if let Some(surface) = self.surface {
                    self.apply_surface(surface);
                }
                Ok(())
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    fn release(&mut self) {
        if let Some(program) = self.program.take() {
            self.device.release_program(program);
        }
    }

    fn apply_surface(&mut self, surface: SurfaceSize) {
        let size = BackingSize::for_surface(&surface, self.settings.pixel_ratio);
        log::debug!("backing store resized to {}x{}", size.width, size.height);
        self.device.resize_backing(size);
        self.backing = Some(size);
    }

    pub fn set_controls(&mut self, controls: ControlState) {
        self.controls = controls.sanitized();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Handles one display frame callback.
    pub fn on_animation_frame(&mut self, now: f64) -> FrameOutcome {
        match self.state {
            LoopState::Ready | LoopState::Rendering => {}
            LoopState::ContextLost => return FrameOutcome::Skipped(SkipReason::ContextLost),
            _ => return FrameOutcome::Skipped(SkipReason::NotReady),
        }
        if !self.visible {
            return FrameOutcome::Skipped(SkipReason::Hidden);
        }
        let (Some(program), Some(backing)) = (self.program.as_ref(), self.backing) else {
            return FrameOutcome::Skipped(SkipReason::NotReady);
        };
        if !self.pacer.ready(now) {
            return FrameOutcome::Skipped(SkipReason::Paced);
        }

        let frame = FrameUniforms {
            time: ((now - self.time_origin) / 1000.0).max(0.0) as f32,
            resolution: [backing.width as f32, backing.height as f32],
            controls: self.controls,
        };
        self.device.draw(program, &frame);
        self.state = LoopState::Rendering;
        FrameOutcome::Drawn
    }

    /// Queues a resize; returns the deadline the host should poll at.
    pub fn on_resize(&mut self, now: f64, surface: SurfaceSize) -> Option<f64> {
        if matches!(self.state, LoopState::Stopped | LoopState::Failed) {
            return None;
        }
        self.resize.schedule(surface, now);
        self.resize.deadline()
    }

    pub fn next_resize_deadline(&self) -> Option<f64> {
        self.resize.deadline()
    }

    /// Applies a debounced resize if its window has elapsed. Returns the new
    /// backing size when one was allocated.
    pub fn poll_resize(&mut self, now: f64) -> Option<BackingSize> {
        if matches!(self.state, LoopState::Stopped | LoopState::Failed) {
            return None;
        }
        let surface = self.resize.poll(now)?;
        self.surface = Some(surface);
        match self.state {
            LoopState::Ready | LoopState::Rendering => {
                self.apply_surface(surface);
                self.backing
            }
            // applied by the next initialization
            _ => None,
        }
    }

    pub fn on_context_lost(&mut self) {
        if !matches!(self.state, LoopState::Ready | LoopState::Rendering) {
            return;
        }
        log::warn!("graphics context lost; rendering paused");
        self.release();
        self.state = LoopState::ContextLost;
    }

    /// Full reinitialization, equivalent to a fresh load.
    pub fn on_context_restored(&mut self, now: f64) -> Result<(), RenderError> {
        if self.state != LoopState::ContextLost {
            return Ok(());
        }
        log::info!("graphics context restored; rebuilding program");
        self.initialize(now)
    }

    /// Releases the program and disarms every entry point.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.release();
        self.resize.cancel();
        self.state = LoopState::Stopped;
        log::info!("renderer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct MockDevice {
        fail_compile: bool,
        next_id: u32,
        live: Vec<u32>,
        builds: usize,
        draws: Vec<FrameUniforms>,
        resizes: Vec<BackingSize>,
    }

    impl GraphicsDevice for MockDevice {
        type Program = u32;

        fn mode(&self) -> ShaderMode {
            ShaderMode::Modern
        }

        fn build_program(&mut self, sources: &ShaderSources) -> Result<u32, RenderError> {
            assert!(sources.fragment.contains("FRAG_COLOR"));
            self.builds += 1;
            if self.fail_compile {
                return Err(RenderError::shader_compile(
                    crate::error::ShaderStage::Fragment,
                    "ERROR: 0:12: 'x' : undeclared identifier",
                ));
            }
            self.next_id += 1;
            self.live.push(self.next_id);
            Ok(self.next_id)
        }

        fn release_program(&mut self, program: u32) {
            self.live.retain(|&p| p != program);
        }

        fn resize_backing(&mut self, size: BackingSize) {
            self.resizes.push(size);
        }

        fn draw(&mut self, program: &u32, frame: &FrameUniforms) {
            assert!(self.live.contains(program));
            self.draws.push(*frame);
        }
    }

    fn surface(w: f64, h: f64) -> SurfaceSize {
        SurfaceSize { logical_width: w, logical_height: h, device_pixel_ratio: 1.0 }
    }

    fn started(tier: QualityTier) -> RenderLoop<MockDevice> {
        let mut lp = RenderLoop::new(MockDevice::default(), tier, LookControls::DEFAULT);
        lp.start(0.0, surface(800.0, 600.0)).unwrap();
        lp
    }

    #[test]
    fn start_sizes_backing_store_immediately() {
        let lp = started(QualityTier::Medium);
        assert_eq!(lp.state(), LoopState::Ready);
        assert_eq!(lp.device().resizes, vec![BackingSize { width: 680, height: 510 }]);
    }

    #[test]
    fn first_frame_starts_rendering() {
        let mut lp = started(QualityTier::Medium);
        lp.set_controls(ControlState::new(2.0, 0.05, -0.05, 0.5));
        assert_eq!(lp.on_animation_frame(500.0), FrameOutcome::Drawn);
        assert_eq!(lp.state(), LoopState::Rendering);
        let frame = lp.device().draws[0];
        assert_eq!(frame.time, 0.5);
        assert_eq!(frame.resolution, [680.0, 510.0]);
        assert_eq!(frame.controls, ControlState::new(2.0, 0.05, -0.05, 0.5));
    }

    #[test]
    fn frame_stamped_before_start_clamps_time_to_zero() {
        let mut lp = RenderLoop::new(MockDevice::default(), QualityTier::Medium, LookControls::DEFAULT);
        lp.start(100.0, surface(800.0, 600.0)).unwrap();
        // display callbacks may carry a timestamp slightly older than the start clock
        assert_eq!(lp.on_animation_frame(99.5), FrameOutcome::Drawn);
        assert_eq!(lp.device().draws[0].time, 0.0);
    }

    #[test]
    fn resize_burst_reallocates_once() {
        let mut lp = started(QualityTier::Medium);
        for i in 0..10 {
            let t = 1000.0 + i as f64 * 5.0;
            lp.on_resize(t, surface(400.0 + i as f64, 300.0));
        }
        let last = 1045.0;
        assert_eq!(lp.next_resize_deadline(), Some(last + RESIZE_DEBOUNCE_MS));
        assert_eq!(lp.poll_resize(last + 100.0), None);
        assert_eq!(lp.poll_resize(last + RESIZE_DEBOUNCE_MS - 1.0), None);
        assert!(lp.poll_resize(last + RESIZE_DEBOUNCE_MS).is_some());
        assert_eq!(lp.poll_resize(last + 1000.0), None);
        // one at start, one for the burst
        assert_eq!(lp.device().resizes.len(), 2);
        assert_eq!(lp.backing_size(), Some(BackingSize { width: 347, height: 255 }));
    }

    #[test]
    fn pacing_caps_draws_at_target_rate() {
        let mut lp = started(QualityTier::Low);
        assert_eq!(lp.tier().settings().target_fps, 30);
        let mut t = 0.0;
        while t <= 1005.0 {
            lp.on_animation_frame(t);
            t += 8.0;
        }
        let draws = lp.device().draws.len();
        assert!(draws <= 31, "{draws} draws");
        assert!(draws >= 29, "{draws} draws");
    }

    #[test]
    fn hidden_tab_skips_draws() {
        let mut lp = started(QualityTier::Ultra);
        lp.set_visible(false);
        assert_eq!(lp.on_animation_frame(16.0), FrameOutcome::Skipped(SkipReason::Hidden));
        lp.set_visible(true);
        assert_eq!(lp.on_animation_frame(32.0), FrameOutcome::Drawn);
    }

    #[test]
    fn context_loss_and_restore_do_not_leak() {
        let mut lp = started(QualityTier::High);
        lp.on_animation_frame(0.0);
        lp.on_context_lost();
        assert_eq!(lp.state(), LoopState::ContextLost);
        assert!(lp.device().live.is_empty());
        assert_eq!(lp.on_animation_frame(100.0), FrameOutcome::Skipped(SkipReason::ContextLost));
        assert_eq!(lp.device().draws.len(), 1);

        lp.on_context_restored(5000.0).unwrap();
        assert_eq!(lp.state(), LoopState::Ready);
        assert_eq!(lp.device().builds, 2);
        assert_eq!(lp.device().live.len(), 1);
        assert_eq!(lp.on_animation_frame(5000.0), FrameOutcome::Drawn);
        // time origin restarts with the new context
        assert_eq!(lp.device().draws[1].time, 0.0);

        for _ in 0..3 {
            lp.on_context_lost();
            lp.on_context_restored(6000.0).unwrap();
        }
        assert_eq!(lp.device().live.len(), 1);
    }

    #[test]
    fn compile_failure_is_terminal() {
        let device = MockDevice { fail_compile: true, ..Default::default() };
        let mut lp = RenderLoop::new(device, QualityTier::Medium, LookControls::DEFAULT);
        assert!(lp.start(0.0, surface(640.0, 480.0)).is_err());
        assert_eq!(lp.state(), LoopState::Failed);
        assert_eq!(lp.on_animation_frame(16.0), FrameOutcome::Skipped(SkipReason::NotReady));
        lp.on_context_lost();
        lp.on_context_restored(100.0).unwrap();
        assert_eq!(lp.device().builds, 1);
        assert!(lp.device().draws.is_empty());

        let surface = lp.failure_surface();
        assert!(!surface.graphics_unsupported);
        assert!(surface.shader_error.unwrap().contains("undeclared identifier"));
    }

    #[test]
    fn unsupported_is_reported() {
        let mut lp = RenderLoop::new(MockDevice::default(), QualityTier::Low, LookControls::DEFAULT);
        lp.fail(RenderError::Unsupported);
        assert_eq!(lp.state(), LoopState::Failed);
        assert!(lp.failure_surface().graphics_unsupported);
        assert!(lp.start(0.0, surface(10.0, 10.0)).is_ok());
        assert_eq!(lp.device().builds, 0);
    }

    #[test]
    fn stop_disarms_everything() {
        let mut lp = started(QualityTier::High);
        lp.on_resize(10.0, surface(100.0, 100.0));
        lp.stop();
        assert_eq!(lp.state(), LoopState::Stopped);
        assert!(lp.device().live.is_empty());
        assert_eq!(lp.next_resize_deadline(), None);
        assert_eq!(lp.poll_resize(1000.0), None);
        assert_eq!(lp.on_animation_frame(1000.0), FrameOutcome::Skipped(SkipReason::NotReady));
        assert_eq!(lp.on_resize(1001.0, surface(50.0, 50.0)), None);
        lp.on_context_lost();
        assert_eq!(lp.state(), LoopState::Stopped);
        assert_eq!(lp.device().resizes.len(), 1);
        assert!(lp.device().draws.is_empty());
    }

    #[test]
    fn resize_while_lost_applies_on_restore() {
        let mut lp = started(QualityTier::Medium);
        lp.on_context_lost();
        lp.on_resize(10.0, surface(100.0, 100.0));
        assert_eq!(lp.poll_resize(200.0), None);
        lp.on_context_restored(300.0).unwrap();
        assert_eq!(lp.backing_size(), Some(BackingSize { width: 85, height: 85 }));
    }

    #[test]
    fn device_pixel_ratio_is_capped() {
        let retina = SurfaceSize { logical_width: 100.0, logical_height: 50.0, device_pixel_ratio: 3.0 };
        assert_eq!(
            BackingSize::for_surface(&retina, 1.4),
            BackingSize { width: 250, height: 125 }
        );
        assert_eq!(
            BackingSize::for_surface(&surface(0.0, 0.2), 1.0),
            BackingSize { width: 1, height: 1 }
        );
    }

    proptest! {
        #[test]
        fn backing_never_exceeds_cap(
            w in 0.0f64..4000.0,
            h in 0.0f64..4000.0,
            dpr in 0.25f64..4.0,
            tier in 0usize..5,
        ) {
            let ratio = QualityTier::ALL[tier].settings().pixel_ratio;
            let s = SurfaceSize { logical_width: w, logical_height: h, device_pixel_ratio: dpr };
            let b = BackingSize::for_surface(&s, ratio);
            prop_assert!(b.width >= 1 && b.height >= 1);
            prop_assert!(b.width as f64 <= (w * MAX_DEVICE_PIXEL_RATIO).floor().max(1.0));
            prop_assert!(b.height as f64 <= (h * MAX_DEVICE_PIXEL_RATIO).floor().max(1.0));
        }
    }
}
