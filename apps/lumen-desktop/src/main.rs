use std::cell::RefCell;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context as _;
use clap::Parser;
use glam::{Mat4, Vec3, Vec4};
use glow::HasContext;
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use lumen_common::log::CLIENT;
use lumen_input::{Clock, Event, EventDispatcher, InputState, KeyCode};
use lumen_render::{CameraController, ControllerConfig};
use lumen_render_gl::{BASIC_FRAGMENT, BASIC_VERTEX, ShaderRegistry};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::raw_window_handle::HasWindowHandle;
use winit::window::{Window, WindowId};

const SCENE_SHADER: &str = "basic";
const LIGHT_DIRECTION: Vec3 = Vec3::new(-0.4, -1.0, -0.3);
const CLEAR_COLOR: Vec4 = Vec4::new(0.08, 0.09, 0.11, 1.0);
/// Cubes per side of the demo grid.
const GRID: i32 = 5;
const GRID_SPACING: f32 = 3.0;

#[derive(Parser)]
#[command(name = "lumen-desktop", about = "Fly camera over an OpenGL scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Window title
    #[arg(long, default_value = "lumen")]
    title: String,

    /// Window width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Disable vertical sync
    #[arg(long)]
    no_vsync: bool,

    /// Controller tuning as JSON
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
struct WindowProps {
    title: String,
    width: u32,
    height: u32,
    vsync: bool,
}

impl From<&Cli> for WindowProps {
    fn from(cli: &Cli) -> Self {
        Self {
            title: cli.title.clone(),
            width: cli.width.max(1),
            height: cli.height.max(1),
            vsync: !cli.no_vsync,
        }
    }
}

/// Everything tied to the GL context. Fields drop in declaration order, so
/// GL objects are released while the context and window are still alive.
struct GlState {
    mesh: Mesh,
    registry: ShaderRegistry<glow::Context>,
    gl: Rc<glow::Context>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

impl GlState {
    fn create(event_loop: &ActiveEventLoop, props: &WindowProps) -> anyhow::Result<Self> {
        let attributes = Window::default_attributes()
            .with_title(props.title.clone())
            .with_inner_size(PhysicalSize::new(props.width, props.height));
        let template = ConfigTemplateBuilder::new().with_depth_size(24);

        let (window, config) = DisplayBuilder::new()
            .with_window_attributes(Some(attributes))
            .build(event_loop, template, |configs| {
                configs
                    .reduce(|best, c| {
                        if c.num_samples() > best.num_samples() { c } else { best }
                    })
                    .expect("display offered no GL configs")
            })
            .map_err(|e| anyhow::anyhow!("creating GL display: {e}"))?;
        let window = window.context("display builder returned no window")?;

        let raw_window = window.window_handle()?.as_raw();
        let display = config.display();
        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(4, 5))))
            .build(Some(raw_window));
        let surface_attributes = window.build_surface_attributes(Default::default())?;

        // SAFETY: `raw_window` belongs to `window`, which is stored alongside
        // the context and surface and dropped after both.
        let (not_current, surface) = unsafe {
            let not_current = display.create_context(&config, &context_attributes)?;
            let surface = display.create_window_surface(&config, &surface_attributes)?;
            (not_current, surface)
        };
        let context = not_current.make_current(&surface)?;

        if props.vsync {
            let interval = SwapInterval::Wait(NonZeroU32::MIN);
            if let Err(e) = surface.set_swap_interval(&context, interval) {
                tracing::warn!(target: CLIENT, "vsync unavailable: {e}");
            }
        }

        // SAFETY: the context was made current on this thread above.
        let gl = Rc::new(unsafe {
            glow::Context::from_loader_function_cstr(|name| display.get_proc_address(name).cast())
        });
        unsafe { gl.enable(glow::DEPTH_TEST) };

        let mut registry = ShaderRegistry::new(Rc::clone(&gl));
        registry.create_shader_from_source(SCENE_SHADER, BASIC_VERTEX, BASIC_FRAGMENT)?;
        let mesh = Mesh::cube(Rc::clone(&gl))?;

        tracing::info!(
            target: CLIENT,
            width = props.width,
            height = props.height,
            "GL context ready"
        );
        Ok(Self {
            mesh,
            registry,
            gl,
            surface,
            context,
            window,
        })
    }

    fn resize(&self, width: u32, height: u32) {
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return;
        };
        self.surface.resize(&self.context, w, h);
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn render(&self, view_projection: Mat4) -> anyhow::Result<()> {
        unsafe {
            self.gl
                .clear_color(CLEAR_COLOR.x, CLEAR_COLOR.y, CLEAR_COLOR.z, CLEAR_COLOR.w);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        if let Some(shader) = self.registry.get_shader(SCENE_SHADER) {
            shader.bind();
            shader.upload_mat4("u_view_projection", view_projection);
            shader.upload_float3("u_light_direction", LIGHT_DIRECTION.normalize());
            shader.upload_float("u_ambient", 0.2);
            for (model, color) in grid_instances() {
                shader.upload_mat4("u_model", model);
                shader.upload_float4("u_color", color);
                self.mesh.draw();
            }
            shader.unbind();
        }

        self.surface.swap_buffers(&self.context)?;
        Ok(())
    }
}

/// Interleaved position/normal vertex buffer.
struct Mesh {
    gl: Rc<glow::Context>,
    vertex_array: glow::VertexArray,
    buffer: glow::Buffer,
    vertex_count: i32,
}

impl Mesh {
    fn cube(gl: Rc<glow::Context>) -> anyhow::Result<Self> {
        let vertices = cube_vertices();
        let stride = (FLOATS_PER_VERTEX * size_of::<f32>()) as i32;
        unsafe {
            let vertex_array = gl.create_vertex_array().map_err(anyhow::Error::msg)?;
            let buffer = gl.create_buffer().map_err(anyhow::Error::msg)?;
            gl.bind_vertex_array(Some(vertex_array));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&vertices),
                glow::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, stride / 2);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(Self {
                gl,
                vertex_array,
                buffer,
                vertex_count: (vertices.len() / FLOATS_PER_VERTEX) as i32,
            })
        }
    }

    fn draw(&self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.vertex_array));
            self.gl.draw_arrays(glow::TRIANGLES, 0, self.vertex_count);
            self.gl.bind_vertex_array(None);
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vertex_array);
            self.gl.delete_buffer(self.buffer);
        }
    }
}

const FLOATS_PER_VERTEX: usize = 6;

/// Unit cube centred on the origin, two counter-clockwise triangles per face.
fn cube_vertices() -> Vec<f32> {
    let faces = [
        (Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_X, Vec3::Z),
        (Vec3::Y, Vec3::X),
        (Vec3::NEG_Y, Vec3::X),
        (Vec3::Z, Vec3::X),
        (Vec3::NEG_Z, Vec3::NEG_X),
    ];
    let mut vertices = Vec::with_capacity(faces.len() * 6 * FLOATS_PER_VERTEX);
    for (normal, u) in faces {
        // u x v == normal, so (u, v) winds counter-clockwise seen from outside.
        let v = normal.cross(u);
        let corner = |su: f32, sv: f32| (normal + u * su + v * sv) * 0.5;
        let quad = [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ];
        for position in quad {
            vertices.extend_from_slice(&position.to_array());
            vertices.extend_from_slice(&normal.to_array());
        }
    }
    vertices
}

/// Model matrix and colour for each cube of the demo grid on the y = 0 plane.
fn grid_instances() -> impl Iterator<Item = (Mat4, Vec4)> {
    let half = (GRID - 1) as f32 * 0.5;
    (0..GRID).flat_map(move |row| {
        (0..GRID).map(move |col| {
            let x = (col as f32 - half) * GRID_SPACING;
            let z = (row as f32 - half) * GRID_SPACING;
            let t = (row * GRID + col) as f32 / (GRID * GRID - 1) as f32;
            let color = Vec4::new(0.3 + 0.6 * t, 0.55, 0.9 - 0.6 * t, 1.0);
            (Mat4::from_translation(Vec3::new(x, 0.0, z)), color)
        })
    })
}

/// Feed one translated event to the input state and the camera controller.
/// Returns `false` when the event asks the application to quit.
fn route_event<C: Clock>(
    input: &mut InputState,
    controller: &mut CameraController<C>,
    event: &Event,
) -> bool {
    input.handle_event(event);
    controller.on_event(event);
    !matches!(
        event,
        Event::WindowClosed
            | Event::KeyPressed {
                key: KeyCode::Escape,
                ..
            }
    )
}

struct DesktopApp {
    props: WindowProps,
    gl: Option<GlState>,
    dispatcher: EventDispatcher,
    pending: Rc<RefCell<Vec<Event>>>,
    input: InputState,
    controller: CameraController,
    failure: Option<anyhow::Error>,
}

impl DesktopApp {
    fn new(props: WindowProps, config: Option<ControllerConfig>) -> Self {
        let pending = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        let queue = Rc::clone(&pending);
        dispatcher.set_callback(move |event: &Event| queue.borrow_mut().push(*event));

        let aspect = props.width as f32 / props.height as f32;
        let mut controller = CameraController::new(45.0, aspect, 0.1, 1000.0);
        if let Some(config) = config {
            controller.set_config(config);
        }
        // Tilt down towards the grid.
        controller.camera_mut().rotate(25.0, 0.0);

        Self {
            props,
            gl: None,
            dispatcher,
            pending,
            input: InputState::new(),
            controller,
            failure: None,
        }
    }

    fn redraw(&mut self) {
        let dt = self.controller.on_update(&self.input);
        let Some(state) = &self.gl else {
            return;
        };
        if let Err(e) = state.render(self.controller.camera().view_projection_matrix()) {
            tracing::error!(target: CLIENT, "frame failed: {e}");
        }
        tracing::trace!(target: CLIENT, dt, "frame");
        state.window.request_redraw();
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gl.is_some() {
            return;
        }
        match GlState::create(event_loop, &self.props) {
            Ok(state) => {
                let size = state.window.inner_size();
                self.controller.on_resize(size.width, size.height);
                state.resize(size.width, size.height);
                self.gl = Some(state);
            }
            Err(e) => {
                tracing::error!(target: CLIENT, "failed to create GL window: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::RedrawRequested = event {
            self.redraw();
            return;
        }

        self.dispatcher.dispatch_window_event(&event);
        let events = std::mem::take(&mut *self.pending.borrow_mut());
        for event in &events {
            if !route_event(&mut self.input, &mut self.controller, event) {
                tracing::info!(target: CLIENT, "exit requested");
                event_loop.exit();
            }
            if let (Event::WindowResized { width, height }, Some(state)) = (event, &self.gl) {
                state.resize(*width, *height);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.gl {
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release GL objects while the context is still current.
        self.gl = None;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    lumen_common::log::init(cli.verbose);
    tracing::info!(target: CLIENT, "lumen-desktop starting");

    let config = cli
        .config
        .as_ref()
        .map(|path| {
            ControllerConfig::load(path)
                .with_context(|| format!("loading controller config {}", path.display()))
        })
        .transpose()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DesktopApp::new(WindowProps::from(&cli), config);
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use lumen_input::{InputSource, ManualClock, MouseButton};
    use lumen_render::Camera;

    use super::*;

    fn controller() -> CameraController<ManualClock> {
        CameraController::with_clock(
            Camera::default(),
            ControllerConfig::default(),
            ManualClock::new(),
        )
    }

    #[test]
    fn window_props_follow_cli() {
        let cli = Cli::try_parse_from([
            "lumen-desktop", "--title", "demo", "--width", "0", "--no-vsync",
        ])
        .unwrap();
        let props = WindowProps::from(&cli);
        assert_eq!(props.title, "demo");
        assert_eq!(props.width, 1);
        assert_eq!(props.height, 720);
        assert!(!props.vsync);
    }

    #[test]
    fn routed_events_reach_input_and_camera() {
        let mut input = InputState::new();
        let mut controller = controller();

        let pressed = Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        };
        assert!(route_event(&mut input, &mut controller, &pressed));
        assert!(route_event(
            &mut input,
            &mut controller,
            &Event::MouseButtonPressed(MouseButton::Left)
        ));
        assert!(input.is_key_down(KeyCode::KeyW));
        assert!(input.is_mouse_down(MouseButton::Left));

        let resized = Event::WindowResized {
            width: 800,
            height: 400,
        };
        assert!(route_event(&mut input, &mut controller, &resized));
        assert_eq!(controller.camera().projection().aspect_ratio(), 2.0);
    }

    #[test]
    fn close_and_escape_stop_the_app() {
        let mut input = InputState::new();
        let mut controller = controller();
        assert!(!route_event(&mut input, &mut controller, &Event::WindowClosed));
        let escape = Event::KeyPressed {
            key: KeyCode::Escape,
            repeat: false,
        };
        assert!(!route_event(&mut input, &mut controller, &escape));
    }

    #[test]
    fn dispatcher_feeds_the_pending_queue() {
        let pending = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        let queue = Rc::clone(&pending);
        dispatcher.set_callback(move |event: &Event| queue.borrow_mut().push(*event));

        assert!(dispatcher.dispatch(&Event::WindowFocused(true)));
        assert_eq!(*pending.borrow(), [Event::WindowFocused(true)]);
    }

    #[test]
    fn cube_has_outward_counter_clockwise_faces() {
        let vertices = cube_vertices();
        assert_eq!(vertices.len(), 36 * FLOATS_PER_VERTEX);

        for triangle in vertices.chunks(3 * FLOATS_PER_VERTEX) {
            let p = |i: usize| Vec3::from_slice(&triangle[i * FLOATS_PER_VERTEX..]);
            let normal = Vec3::from_slice(&triangle[3..]);
            let winding = (p(1) - p(0)).cross(p(2) - p(0));
            assert!(winding.dot(normal) > 0.0);
            for i in 0..3 {
                assert!(p(i).abs().max_element() <= 0.5 + f32::EPSILON);
                assert!((p(i).dot(normal) - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn grid_is_centred() {
        let instances: Vec<_> = grid_instances().collect();
        assert_eq!(instances.len(), (GRID * GRID) as usize);
        let centre: Vec3 = instances
            .iter()
            .map(|(model, _)| model.w_axis.truncate())
            .sum::<Vec3>()
            / instances.len() as f32;
        assert!(centre.length() < 1e-5);
    }
}
