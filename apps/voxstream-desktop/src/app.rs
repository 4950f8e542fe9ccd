use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};
use voxstream_engine::{Engine, EngineConfig};
use voxstream_render_wgpu::WgpuBackend;
use voxstream_tools::EngineInspector;

use crate::explorer::ExplorerFeed;

const DOUBLE_CLICK: Duration = Duration::from_millis(400);
const DOUBLE_CLICK_SLOP: f32 = 4.0;
const CULLING_STEP: f32 = 25.0;
const TITLE_INTERVAL: Duration = Duration::from_millis(500);

/// Pointer state for drags and double clicks.
#[derive(Default)]
struct Pointer {
    position: Vec2,
    orbiting: bool,
    panning: bool,
    last_click: Option<(Instant, Vec2)>,
}

impl Pointer {
    /// Record a left press; true when it completes a double click.
    fn click(&mut self, now: Instant) -> bool {
        let double = self.last_click.is_some_and(|(at, pos)| {
            now.duration_since(at) <= DOUBLE_CLICK && pos.distance(self.position) <= DOUBLE_CLICK_SLOP
        });
        self.last_click = if double { None } else { Some((now, self.position)) };
        double
    }
}

pub struct Settings {
    pub config: EngineConfig,
    pub seed: u64,
    pub feed_interval: Duration,
}

struct Running {
    window: Arc<Window>,
    engine: Engine<WgpuBackend>,
    _feed: ExplorerFeed,
}

pub struct App {
    settings: Settings,
    running: Option<Running>,
    pointer: Pointer,
    last_title: Instant,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            running: None,
            pointer: Pointer::default(),
            last_title: Instant::now(),
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
        let attrs = Window::default_attributes()
            .with_title("voxstream")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("voxstream_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        let size = window.inner_size();
        let mut backend = WgpuBackend::new(
            surface,
            &adapter,
            device,
            queue,
            size.width,
            size.height,
            self.settings.config.chunk.chunk_size,
        );
        let lod = &self.settings.config.lod;
        backend.set_fog(lod.medium_distance, lod.culling_distance);

        let mut engine = Engine::new(self.settings.config.clone(), backend)?;
        engine.resize(size.width, size.height);
        engine.set_pick_listener(|hit| tracing::info!(?hit, "voxel selected"));

        let feed = ExplorerFeed::spawn(
            engine.feed_handle(),
            self.settings.seed,
            self.settings.feed_interval,
        );

        Ok(Running {
            window,
            engine,
            _feed: feed,
        })
    }

    fn handle_key(engine: &mut Engine<WgpuBackend>, key: KeyCode) {
        match key {
            KeyCode::KeyF => {
                let following = engine.camera_settings().following;
                engine.set_camera_following(!following);
            }
            KeyCode::KeyC => {
                let enabled = engine.culling_enabled();
                engine.set_culling_enabled(!enabled);
            }
            KeyCode::BracketLeft | KeyCode::BracketRight => {
                let step = if key == KeyCode::BracketLeft {
                    -CULLING_STEP
                } else {
                    CULLING_STEP
                };
                let distance = engine.culling_distance() + step;
                match engine.set_culling_distance(distance) {
                    Ok(()) => {
                        let medium = engine.config().lod.medium_distance;
                        engine.backend_mut().set_fog(medium.min(distance), distance);
                    }
                    Err(e) => tracing::warn!("{e}"),
                }
            }
            KeyCode::KeyR => engine.reset_camera_to_default(),
            KeyCode::Home => {
                let bounds = EngineInspector::summary(engine).bounds;
                if !engine.request_center_on(bounds) {
                    tracing::debug!("nothing to center on");
                }
            }
            _ => {}
        }
    }

    fn update_title(&mut self) {
        let Some(running) = &self.running else {
            return;
        };
        if self.last_title.elapsed() < TITLE_INTERVAL {
            return;
        }
        self.last_title = Instant::now();
        let engine = &running.engine;
        let settings = engine.camera_settings();
        running.window.set_title(&format!(
            "voxstream | {} | follow={}{} culling={} ({:.0})",
            engine.stats().summary(),
            if settings.following { "on" } else { "off" },
            if settings.user_controlled { " (user)" } else { "" },
            if engine.culling_enabled() { "on" } else { "off" },
            engine.culling_distance(),
        ));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(e) => {
                tracing::error!("startup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let engine = &mut running.engine;

        match event {
            WindowEvent::CloseRequested => {
                engine.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => engine.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => Self::handle_key(engine, key),
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                let delta = position - self.pointer.position;
                self.pointer.position = position;
                if delta != Vec2::ZERO {
                    if self.pointer.orbiting {
                        engine.camera_mut().orbit(delta.x, -delta.y);
                    } else if self.pointer.panning {
                        engine.camera_mut().pan(delta.x, delta.y);
                    }
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => {
                        self.pointer.orbiting = pressed;
                        if pressed && self.pointer.click(Instant::now()) {
                            let size = running.window.inner_size();
                            let viewport = Vec2::new(size.width as f32, size.height as f32);
                            engine.pick(self.pointer.position, viewport);
                        }
                    }
                    MouseButton::Right => self.pointer.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                if lines != 0.0 {
                    engine.camera_mut().zoom(0.9_f32.powf(lines));
                }
            }
            WindowEvent::RedrawRequested => {
                let report = engine.tick(Instant::now());
                if report.rendered {
                    tracing::trace!(?report, "frame");
                }
                self.update_title();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}
