// Window bootstrap and main loop.
//
// `run` owns the event loop, window, surface and swapchain; applications
// implement `AppHooks` and get called back at the standard points of the
// frame cycle. Every hook has a default, so a minimal app only writes
// `render`.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::backend::{
    AcquireOutcome, FrameController, RenderDevice, Surface, Swapchain,
};
use crate::config::Config;
use crate::input::InputState;
use crate::timer::StepTimer;

/// Device-side state that survives swapchain recreation.
pub struct GraphicsContext {
    pub device: Arc<RenderDevice>,
    pub frames: FrameController,
}

/// Application callbacks driven by the main loop.
pub trait AppHooks {
    /// One-time setup after the device and swapchain exist.
    fn init(&mut self, _gfx: &mut GraphicsContext, _swapchain: &Swapchain) -> Result<()> {
        Ok(())
    }

    /// Per-frame simulation step, before any recording.
    fn update(&mut self, _timer: &StepTimer, _input: &InputState) {}

    /// Record this frame's commands into `cmd` targeting `image_index`.
    fn render(
        &mut self,
        gfx: &mut GraphicsContext,
        swapchain: &Swapchain,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<()>;

    /// The swapchain was recreated; size-dependent resources are stale.
    fn resized(&mut self, _gfx: &mut GraphicsContext, _swapchain: &Swapchain) -> Result<()> {
        Ok(())
    }

    /// Raw window events, after the built-in handlers have seen them.
    fn window_event(&mut self, _event: &WindowEvent) {}

    /// Teardown while the device is still alive. The GPU is idle when this
    /// runs.
    fn destroy(&mut self, _gfx: &mut GraphicsContext) {}
}

/// Create a window per the config and drive `hooks` until exit.
pub fn run<H: AppHooks>(config: Config, hooks: H) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut runner = Runner::new(config, hooks);
    event_loop.run_app(&mut runner)?;

    if let Some(error) = runner.error.take() {
        return Err(error);
    }
    Ok(())
}

struct Runner<H: AppHooks> {
    config: Config,
    hooks: H,

    window: Option<Arc<Window>>,
    gfx: Option<GraphicsContext>,
    surface: Option<Surface>,
    swapchain: Option<Swapchain>,

    timer: StepTimer,
    input: InputState,

    is_fullscreen: bool,
    needs_resize: bool,
    is_minimized: bool,
    shown_fps: u32,

    // First fatal error; the loop exits and `run` rethrows it.
    error: Option<anyhow::Error>,
}

impl<H: AppHooks> Runner<H> {
    fn new(config: Config, hooks: H) -> Self {
        let is_fullscreen = config.window.fullscreen;
        Self {
            config,
            hooks,
            window: None,
            gfx: None,
            surface: None,
            swapchain: None,
            timer: StepTimer::new(),
            input: InputState::new(),
            is_fullscreen,
            needs_resize: false,
            is_minimized: false,
            shown_fps: 0,
            error: None,
        }
    }

    fn init_graphics(&mut self, window: Arc<Window>) -> Result<()> {
        log::info!("Initializing graphics...");

        let display_handle = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let window_handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();

        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let device = RenderDevice::new(
            &self.config.window.title,
            enable_validation,
            Some(display_handle),
        )?;

        // Safety: the window Arc is held by the runner for as long as the
        // surface lives.
        let surface = unsafe { Surface::new(&device, display_handle, window_handle) }?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(
            device.clone(),
            &surface,
            size.width,
            size.height,
            self.config.preferred_present_mode(),
        )?;

        let frames = FrameController::new(device.clone(), self.config.graphics.frame_count)?;

        let mut gfx = GraphicsContext { device, frames };
        self.hooks.init(&mut gfx, &swapchain)?;

        self.gfx = Some(gfx);
        self.surface = Some(surface);
        self.swapchain = Some(swapchain);

        log::info!("Graphics initialized");
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        let (Some(window), Some(gfx), Some(surface)) =
            (&self.window, &mut self.gfx, &self.surface)
        else {
            return Ok(());
        };

        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            self.is_minimized = true;
            return Ok(());
        }
        self.is_minimized = false;

        // Drain the GPU, then drop the old swapchain before creating its
        // replacement: the surface supports only one at a time.
        gfx.frames.flush()?;
        self.swapchain = None;

        let swapchain = Swapchain::new(
            gfx.device.clone(),
            surface,
            size.width,
            size.height,
            self.config.preferred_present_mode(),
        )?;

        self.hooks.resized(gfx, &swapchain)?;
        self.swapchain = Some(swapchain);
        self.needs_resize = false;
        Ok(())
    }

    fn render_frame(&mut self) -> Result<bool> {
        if self.is_minimized {
            return Ok(false);
        }

        if self.needs_resize {
            self.recreate_swapchain()?;
            if self.is_minimized || self.needs_resize {
                return Ok(false);
            }
        }

        // In fixed-timestep mode one frame may owe several update steps.
        let mut steps = 0;
        self.timer.tick(|| steps += 1);
        for _ in 0..steps {
            self.hooks.update(&self.timer, &self.input);
        }

        let (Some(gfx), Some(swapchain)) = (&mut self.gfx, &self.swapchain) else {
            return Ok(false);
        };

        let (image_index, suboptimal) = match gfx.frames.acquire(swapchain)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                self.needs_resize = true;
                return Ok(false);
            }
        };
        if suboptimal {
            self.needs_resize = true;
        }

        let cmd = gfx.frames.begin_frame()?;
        self.hooks.render(gfx, swapchain, cmd, image_index)?;
        gfx.frames.submit(cmd)?;

        if gfx.frames.present(swapchain, image_index)? {
            self.needs_resize = true;
        }

        Ok(true)
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            self.needs_resize = true;
        }
    }

    fn update_title(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let fps = self.timer.frames_per_second();
        if fps == self.shown_fps {
            return;
        }
        self.shown_fps = fps;

        if let Some(ref window) = self.window {
            let mode = if self.is_fullscreen {
                "fullscreen"
            } else {
                "windowed"
            };
            window.set_title(&format!(
                "{} - {} FPS [{}]",
                self.config.window.title, fps, mode
            ));
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("Fatal error: {:?}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }
}

impl<H: AppHooks> ApplicationHandler for Runner<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::from(e).context("Failed to create window"));
                return;
            }
        };

        if let Err(e) = self.init_graphics(window.clone()) {
            self.fail(event_loop, e);
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        self.input.handle_window_event(&event);

        match &event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    self.is_minimized = false;
                    self.needs_resize = true;
                }
            }

            WindowEvent::RedrawRequested => {
                match self.render_frame() {
                    Ok(rendered) => {
                        if rendered {
                            self.update_title();
                        }
                    }
                    Err(e) => {
                        self.fail(event_loop, e);
                        return;
                    }
                }
            }

            WindowEvent::KeyboardInput { event: key, .. } => {
                if key.state.is_pressed() {
                    if let PhysicalKey::Code(code) = key.physical_key {
                        match code {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => {
                                self.toggle_fullscreen();
                            }
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }

        self.hooks.window_event(&event);
    }

    /// Continuous redraws: request the next frame as soon as we go idle.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("Cleaning up graphics resources...");

        // Swapchain before surface; hooks run first, with the GPU drained.
        if let Some(mut gfx) = self.gfx.take() {
            if let Err(e) = gfx.frames.flush() {
                log::error!("Failed to drain GPU on exit: {}", e);
            }
            self.hooks.destroy(&mut gfx);
            drop(gfx);
        }
        self.swapchain = None;
        self.surface = None;

        log::info!("Cleanup complete");
    }
}
