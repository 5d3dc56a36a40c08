//! Browser mount: canvas, context probing, frame callback, event wiring
//! and teardown. Every callback holds a weak handle to its mount, so
//! dropping the view (or calling `stop`) leaves nothing scheduled.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Once;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Event, EventTarget, HtmlCanvasElement, WebGl2RenderingContext, WebGlContextAttributes,
    WebGlPowerPreference, WebGlRenderingContext,
};

use crate::controls::{ControlState, FrameUniforms};
use crate::error::{FailureSurface, RenderError};
use crate::gl::{probe_context, CompiledProgram, GlDevice};
use crate::look::LookControls;
use crate::quality::{classify, ContextHints, DeviceSignals, QualityTier};
use crate::scheduler::{
    BackingSize, GraphicsDevice, LoopState, RenderLoop, SurfaceSize, RESIZE_DEBOUNCE_MS,
};
use crate::shader::{ShaderMode, ShaderSources};

static LOGGING: Once = Once::new();

fn install_logging() {
    LOGGING.call_once(|| {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        let _ = console_log::init_with_level(log::Level::Info);
    });
}

/// GL device bound to the canvas whose backing store it resizes.
struct CanvasSurface {
    canvas: HtmlCanvasElement,
    gl: GlDevice,
}

impl GraphicsDevice for CanvasSurface {
    type Program = CompiledProgram;

    fn mode(&self) -> ShaderMode {
        self.gl.mode()
    }

    fn build_program(&mut self, sources: &ShaderSources) -> Result<CompiledProgram, RenderError> {
        self.gl.build(sources)
    }

    fn release_program(&mut self, program: CompiledProgram) {
        self.gl.release(program)
    }

    fn resize_backing(&mut self, size: BackingSize) {
        self.canvas.set_width(size.width);
        self.canvas.set_height(size.height);
        self.gl.viewport(size.width, size.height);
    }

    fn draw(&mut self, program: &CompiledProgram, frame: &FrameUniforms) {
        self.gl.draw(program, frame)
    }
}

fn context_attributes(hints: ContextHints) -> WebGlContextAttributes {
    let attrs = WebGlContextAttributes::new();
    attrs.set_alpha(false);
    attrs.set_antialias(hints.antialias);
    attrs.set_preserve_drawing_buffer(false);
    attrs.set_fail_if_major_performance_caveat(false);
    attrs.set_power_preference(if hints.low_power {
        WebGlPowerPreference::LowPower
    } else {
        WebGlPowerPreference::HighPerformance
    });
    attrs
}

fn open_context(
    canvas: &HtmlCanvasElement,
    mode: ShaderMode,
    attrs: &WebGlContextAttributes,
) -> Option<glow::Context> {
    let request = |id: &str| canvas.get_context_with_context_options(id, attrs).ok().flatten();
    match mode {
        ShaderMode::Modern => request("webgl2")?
            .dyn_into::<WebGl2RenderingContext>()
            .ok()
            .map(glow::Context::from_webgl2_context),
        ShaderMode::Legacy => ["webgl", "experimental-webgl"]
            .into_iter()
            .find_map(|id| request(id)?.dyn_into::<WebGlRenderingContext>().ok())
            .map(glow::Context::from_webgl1_context),
    }
}

fn device_signals(window: &web_sys::Window) -> DeviceSignals {
    let navigator = window.navigator();
    let ua = navigator.user_agent().unwrap_or_default();
    let cores = navigator.hardware_concurrency();
    let cores = (cores.is_finite() && cores > 0.0).then_some(cores as u32);
    let memory_gb = js_sys::Reflect::get(&navigator, &JsValue::from_str("deviceMemory"))
        .ok()
        .and_then(|v| v.as_f64())
        .map(|v| v as f32);
    let (width, height) = match window.screen() {
        Ok(screen) => (
            screen.width().ok().map(|w| w.max(0) as u32),
            screen.height().ok().map(|h| h.max(0) as u32),
        ),
        Err(_) => (None, None),
    };
    DeviceSignals::from_user_agent(&ua, cores, memory_gb, width, height)
}

fn now(window: &web_sys::Window) -> f64 {
    window.performance().map(|p| p.now()).unwrap_or_default()
}

fn surface_of(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> SurfaceSize {
    SurfaceSize {
        logical_width: canvas.client_width() as f64,
        logical_height: canvas.client_height() as f64,
        device_pixel_ratio: window.device_pixel_ratio(),
    }
}

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

struct Mount {
    window: web_sys::Window,
    canvas: HtmlCanvasElement,
    tier: QualityTier,
    render_loop: Option<RenderLoop<CanvasSurface>>,
    unsupported: bool,
    listeners: Vec<Listener>,
    frame_callback: Option<Closure<dyn FnMut(f64)>>,
    frame_request: Option<i32>,
    resize_callback: Option<Closure<dyn FnMut()>>,
    resize_timer: Option<i32>,
}

impl Mount {
    fn request_frame(&mut self) {
        let Some(callback) = self.frame_callback.as_ref() else {
            return;
        };
        match self.window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            Ok(id) => self.frame_request = Some(id),
            Err(err) => log::error!("requestAnimationFrame failed: {:?}", err),
        }
    }

    fn arm_resize_timer(&mut self, delay_ms: f64) {
        if let Some(id) = self.resize_timer.take() {
            self.window.clear_timeout_with_handle(id);
        }
        let Some(callback) = self.resize_callback.as_ref() else {
            return;
        };
        let delay = delay_ms.ceil().max(0.0) as i32;
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay)
        {
            Ok(id) => self.resize_timer = Some(id),
            Err(err) => log::error!("setTimeout failed: {:?}", err),
        }
    }

    fn on_frame(&mut self, timestamp: f64) {
        self.frame_request = None;
        let Some(render_loop) = self.render_loop.as_mut() else {
            return;
        };
        render_loop.on_animation_frame(timestamp);
        if !matches!(render_loop.state(), LoopState::Failed | LoopState::Stopped) {
            self.request_frame();
        }
    }

    fn on_resize_event(&mut self) {
        let surface = surface_of(&self.window, &self.canvas);
        let now = now(&self.window);
        let Some(render_loop) = self.render_loop.as_mut() else {
            return;
        };
        if render_loop.on_resize(now, surface).is_some() {
            self.arm_resize_timer(RESIZE_DEBOUNCE_MS);
        }
    }

    fn on_resize_timer(&mut self) {
        self.resize_timer = None;
        let now = now(&self.window);
        let Some(render_loop) = self.render_loop.as_mut() else {
            return;
        };
        render_loop.poll_resize(now);
        // timers may fire a hair early against the frame clock
        if let Some(deadline) = render_loop.next_resize_deadline() {
            self.arm_resize_timer(deadline - now);
        }
    }

    fn teardown(&mut self) {
        if let Some(id) = self.frame_request.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        if let Some(id) = self.resize_timer.take() {
            self.window.clear_timeout_with_handle(id);
        }
        for listener in self.listeners.drain(..) {
            let _ = listener.target.remove_event_listener_with_callback(
                listener.kind,
                listener.callback.as_ref().unchecked_ref(),
            );
        }
        if let Some(render_loop) = self.render_loop.as_mut() {
            render_loop.stop();
        }
        self.frame_callback = None;
        self.resize_callback = None;
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn listen(
    mount: &Weak<RefCell<Mount>>,
    target: EventTarget,
    kind: &'static str,
    mut handler: impl FnMut(&mut Mount, &Event) + 'static,
) -> Result<Listener, JsValue> {
    let weak = mount.clone();
    let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        if let Some(mount) = weak.upgrade() {
            handler(&mut mount.borrow_mut(), &event);
        }
    });
    target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
    Ok(Listener { target, kind, callback })
}

/// The accretion disk view mounted on a host canvas.
#[wasm_bindgen]
pub struct AccretionDiskView {
    mount: Rc<RefCell<Mount>>,
}

#[wasm_bindgen]
impl AccretionDiskView {
    /// Mounts on `canvas`, picking the quality tier from device signals.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement) -> Result<AccretionDiskView, JsValue> {
        install_logging();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let signals = device_signals(&window);
        let tier = classify(&signals);
        log::info!("device {:?} classified as {}", signals.device_class(), tier);
        Self::mount(window, canvas, tier, LookControls::for_device(&signals))
    }

    /// Mounts with a forced tier (`ultra-low`, `low`, `medium`, `high`, `ultra`).
    #[wasm_bindgen(js_name = withTier)]
    pub fn with_tier(canvas: HtmlCanvasElement, tier: &str) -> Result<AccretionDiskView, JsValue> {
        install_logging();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let tier: QualityTier = tier.parse().map_err(|e: String| JsValue::from_str(&e))?;
        let look = LookControls::for_device(&device_signals(&window));
        Self::mount(window, canvas, tier, look)
    }

    /// Compiles the program, sizes the canvas and starts the frame loop.
    pub fn start(&self) -> Result<(), JsValue> {
        let weak = Rc::downgrade(&self.mount);
        let mut mount = self.mount.borrow_mut();
        let now = now(&mount.window);
        let surface = surface_of(&mount.window, &mount.canvas);
        let Some(render_loop) = mount.render_loop.as_mut() else {
            return Ok(());
        };
        if render_loop.state() != LoopState::Uninitialized {
            return Ok(());
        }
        if render_loop.start(now, surface).is_err() {
            return Ok(());
        }

        let document = mount.window.document().ok_or_else(|| JsValue::from_str("no document"))?;
        let visible = |doc: &web_sys::Document| doc.visibility_state() == web_sys::VisibilityState::Visible;
        if let Some(render_loop) = mount.render_loop.as_mut() {
            render_loop.set_visible(visible(&document));
        }

        let window_target: EventTarget = mount.window.clone().into();
        let document_target: EventTarget = document.clone().into();
        let canvas_target: EventTarget = mount.canvas.clone().into();
        let listeners = vec![
            listen(&weak, window_target, "resize", |m, _| m.on_resize_event())?,
            listen(&weak, document_target, "visibilitychange", move |m, _| {
                let shown = visible(&document);
                if let Some(render_loop) = m.render_loop.as_mut() {
                    render_loop.set_visible(shown);
                }
            })?,
            listen(&weak, canvas_target.clone(), "webglcontextlost", |m, event| {
                event.prevent_default();
                if let Some(render_loop) = m.render_loop.as_mut() {
                    render_loop.on_context_lost();
                }
            })?,
            listen(&weak, canvas_target, "webglcontextrestored", |m, _| {
                let now = now(&m.window);
                if let Some(render_loop) = m.render_loop.as_mut() {
                    // failures are recorded on the loop and surfaced through shader_error
                    let _ = render_loop.on_context_restored(now);
                }
            })?,
        ];
        mount.listeners = listeners;

        let frame_weak = weak.clone();
        mount.frame_callback = Some(Closure::new(move |timestamp: f64| {
            if let Some(mount) = frame_weak.upgrade() {
                mount.borrow_mut().on_frame(timestamp);
            }
        }));
        mount.resize_callback = Some(Closure::new(move || {
            if let Some(mount) = weak.upgrade() {
                mount.borrow_mut().on_resize_timer();
            }
        }));
        mount.request_frame();
        Ok(())
    }

    /// Latest control snapshot; read by the next drawn frame.
    #[wasm_bindgen(js_name = setControls)]
    pub fn set_controls(&self, camera_zoom: f32, view_yaw: f32, view_pitch: f32, hover_intensity: f32) {
        if let Some(render_loop) = self.mount.borrow_mut().render_loop.as_mut() {
            render_loop.set_controls(ControlState::new(camera_zoom, view_yaw, view_pitch, hover_intensity));
        }
    }

    /// Removes listeners, cancels the pending frame and resize timer, and
    /// releases the program.
    pub fn stop(&self) {
        self.mount.borrow_mut().teardown();
        log::info!("accretion disk view torn down");
    }

    #[wasm_bindgen(getter, js_name = graphicsUnsupported)]
    pub fn graphics_unsupported(&self) -> bool {
        self.failure().graphics_unsupported
    }

    #[wasm_bindgen(getter, js_name = shaderError)]
    pub fn shader_error(&self) -> Option<String> {
        self.failure().shader_error
    }

    #[wasm_bindgen(getter)]
    pub fn tier(&self) -> String {
        self.mount.borrow().tier.to_string()
    }
}

impl AccretionDiskView {
    fn mount(
        window: web_sys::Window,
        canvas: HtmlCanvasElement,
        tier: QualityTier,
        look: LookControls,
    ) -> Result<AccretionDiskView, JsValue> {
        let attrs = context_attributes(tier.context_hints());
        let probed = probe_context(|mode| open_context(&canvas, mode, &attrs));
        let (render_loop, unsupported) = match probed {
            Ok((gl, mode)) => {
                let device = CanvasSurface { canvas: canvas.clone(), gl: GlDevice::new(gl, mode) };
                (Some(RenderLoop::new(device, tier, look)), false)
            }
            Err(err) => {
                log::error!("{}", err);
                (None, true)
            }
        };

        let mount = Rc::new(RefCell::new(Mount {
            window,
            canvas,
            tier,
            render_loop,
            unsupported,
            listeners: Vec::new(),
            frame_callback: None,
            frame_request: None,
            resize_callback: None,
            resize_timer: None,
        }));
        Ok(AccretionDiskView { mount })
    }

    fn failure(&self) -> FailureSurface {
        let mount = self.mount.borrow();
        if mount.unsupported {
            return FailureSurface::from_error(&RenderError::Unsupported);
        }
        mount
            .render_loop
            .as_ref()
            .map(RenderLoop::failure_surface)
            .unwrap_or_default()
    }
}
