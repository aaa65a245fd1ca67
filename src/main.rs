mod camera;
mod config_loader;
mod error;
mod render;
mod scene;
mod time;
mod transform;
mod utility;
mod vulkan;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use ash::vk;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ultraviolet::{Vec2, Vec3};
use winit::dpi::{self, PhysicalSize};
use winit::event::{
    DeviceEvent, ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent,
};
use winit::event_loop::EventLoop;
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use camera::Camera;
use config_loader::ConfigFileLoader;
use error::RendererResult;
use render::VoxelRenderer;
use scene::{Scene, VoxelMesh};
use time::Time;
use transform::Transform;
use vulkan::command_pool::CommandPool;
use vulkan::context::Context;
use vulkan::frame::{
    AcquireOutcome, FrameBackend, FramePacer, FrameSlot, PresentOutcome, MAX_FRAMES_IN_FLIGHT,
};
use vulkan::swapchain::SwapchainContainer;

// Rust will drop these fields in the order they are declared
struct VoxelApp {
    renderer: VoxelRenderer,

    scene: Scene,
    camera: Camera,

    command_buffers: Vec<vk::CommandBuffer>,
    frame_slots: Vec<FrameSlot>,

    command_pool: CommandPool,
    swapchain: SwapchainContainer,
    context: Arc<Context>,

    window: Window,
}

impl VoxelApp {
    pub fn new(event_loop: &EventLoop<()>) -> anyhow::Result<Self> {
        let mut config_loader = ConfigFileLoader::new("settings.json");
        let config = config_loader.load_config().clone();

        let window = WindowBuilder::new()
            .with_title("Voxel Cuboids")
            .with_inner_size(dpi::LogicalSize {
                width: config.window_width,
                height: config.window_height,
            })
            .build(event_loop)
            .context("could not create window")?;

        let context = Arc::new(Context::new(event_loop, &window)?);

        let swapchain = SwapchainContainer::new(
            context.clone(),
            window.inner_size(),
            config.present_mode.into(),
        )?;

        let command_pool = CommandPool::new(context.clone())?;

        let command_buffers = {
            let allocate_info = vk::CommandBufferAllocateInfo::builder()
                .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32)
                .command_pool(*command_pool)
                .level(vk::CommandBufferLevel::PRIMARY);

            unsafe { context.device.allocate_command_buffers(&allocate_info) }
                .map_err(error::RendererError::from)?
        };

        let frame_slots = FrameSlot::create_all(&context)?;

        let renderer = VoxelRenderer::new(
            context.clone(),
            &swapchain,
            PathBuf::from(&config.shader_dir),
        )?;

        let window_size = window.inner_size();
        let camera = Camera::new(window_size.width as f32 / window_size.height as f32);

        let mut scene = Scene::new();
        build_demo_scene(&mut scene);
        info!("demo scene with {} voxels", scene.len());
        scene.rebuild(&context, &command_pool)?;

        Ok(Self {
            renderer,
            scene,
            camera,
            command_buffers,
            frame_slots,
            command_pool,
            swapchain,
            context,
            window,
        })
    }

    pub fn main_loop(mut self, event_loop: EventLoop<()>) -> ! {
        let mut pacer = FramePacer::new();
        let mut time = Time::new();
        let mut pressed_keys: HashSet<VirtualKeyCode> = HashSet::new();
        let mut mouse_captured = false;

        event_loop.run(move |event, _, control_flow| {
            control_flow.set_poll();

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(PhysicalSize { width, height }) => {
                        if width > 0 && height > 0 {
                            self.camera.update_aspect_ratio(width as f32 / height as f32);
                        }
                        pacer.request_resize();
                    }
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                virtual_keycode: Some(keycode),
                                state,
                                ..
                            },
                        ..
                    } => match (keycode, state) {
                        (VirtualKeyCode::Escape, ElementState::Pressed) => {
                            control_flow.set_exit();
                        }
                        (keycode, ElementState::Pressed) => {
                            pressed_keys.insert(keycode);
                        }
                        (keycode, ElementState::Released) => {
                            pressed_keys.remove(&keycode);
                        }
                    },
                    WindowEvent::MouseInput { button, state, .. } => {
                        if button == MouseButton::Right {
                            mouse_captured = state == ElementState::Pressed;
                            if mouse_captured {
                                self.window
                                    .set_cursor_grab(CursorGrabMode::Confined)
                                    .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked))
                                    .ok();
                            } else {
                                self.window.set_cursor_grab(CursorGrabMode::None).ok();
                            }
                            self.window.set_cursor_visible(!mouse_captured);
                        }
                    }
                    _ => {}
                },
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta: (dx, dy) },
                    ..
                } => {
                    if mouse_captured {
                        self.camera
                            .apply_mouse_delta(Vec2::new(dx as f32, dy as f32));
                    }
                }
                Event::MainEventsCleared => {
                    self.window.request_redraw();
                }
                Event::RedrawRequested(_window_id) => {
                    time.update();
                    let keys: Vec<_> = pressed_keys.iter().copied().collect();
                    self.camera.apply_movement(&keys, time.delta_seconds());

                    // A minimized window has no surface to render to.
                    let window_size = self.window.inner_size();
                    if window_size.width == 0 || window_size.height == 0 {
                        return;
                    }

                    match pacer.tick(&mut self) {
                        Ok(_) => {
                            if let Some(fps) = time.count_frame() {
                                info!("{fps:.1} fps");
                            }
                        }
                        Err(e) => {
                            error!("fatal renderer error: {e}");
                            control_flow.set_exit_with_code(1);
                        }
                    }
                }
                _ => (),
            }
        });
    }
}

impl FrameBackend for VoxelApp {
    type Error = error::RendererError;

    fn wait_slot_reusable(&mut self, slot: usize) -> RendererResult<()> {
        unsafe {
            self.context.device.wait_for_fences(
                std::slice::from_ref(&self.frame_slots[slot].in_flight),
                true,
                u64::MAX,
            )
        }?;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        let acquire_result = unsafe {
            self.swapchain.loader.acquire_next_image(
                self.swapchain.inner,
                u64::MAX,
                self.frame_slots[slot].image_available,
                vk::Fence::null(),
            )
        };

        match acquire_result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn begin_slot(&mut self, slot: usize) -> RendererResult<()> {
        unsafe {
            self.context
                .device
                .reset_fences(std::slice::from_ref(&self.frame_slots[slot].in_flight))
        }?;
        Ok(())
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        let device = &self.context.device;

        self.renderer.update_camera(slot, &self.camera)?;

        let command_buffer = self.command_buffers[slot];
        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }?;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }?;

        self.renderer.record(
            command_buffer,
            image_index as usize,
            slot,
            &self.swapchain,
            &self.scene,
        );

        unsafe { device.end_command_buffer(command_buffer) }?;

        let frame_slot = &self.frame_slots[slot];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(std::slice::from_ref(&frame_slot.image_available))
            .wait_dst_stage_mask(std::slice::from_ref(
                &vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            ))
            .command_buffers(std::slice::from_ref(&command_buffer))
            .signal_semaphores(std::slice::from_ref(&frame_slot.render_finished))
            .build();

        unsafe {
            device.queue_submit(
                self.context.queue,
                std::slice::from_ref(&submit_info),
                frame_slot.in_flight,
            )
        }?;
        Ok(())
    }

    fn present_image(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(std::slice::from_ref(&self.frame_slots[slot].render_finished))
            .swapchains(std::slice::from_ref(&self.swapchain.inner))
            .image_indices(std::slice::from_ref(&image_index));

        let result = unsafe {
            self.swapchain
                .loader
                .queue_present(self.context.queue, &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(PresentOutcome::Presented { suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn recreate_surface(&mut self) -> RendererResult<()> {
        self.swapchain.recreate(self.window.inner_size())?;
        self.renderer.resize(&self.swapchain)
    }
}

impl Drop for VoxelApp {
    fn drop(&mut self) {
        let device = &self.context.device;

        if unsafe { device.device_wait_idle() }.is_err() {
            return;
        }
        unsafe { device.free_command_buffers(*self.command_pool, &self.command_buffers) };
    }
}

fn build_demo_scene(scene: &mut Scene) {
    // ground slab
    scene.add_voxel_with(
        VoxelMesh::new(12.0, 12.0, 0.4, Vec3::new(0.25, 0.3, 0.3)),
        Transform::from_translation(Vec3::new(-6.0, -0.4, -6.0)),
    );

    // a small stack of colored cubes
    scene.add_voxel_with(
        VoxelMesh::unit_cube(Vec3::new(0.9, 0.2, 0.2)),
        Transform::from_translation(Vec3::new(-1.5, 0.0, 0.0)),
    );
    scene.add_voxel_with(
        VoxelMesh::unit_cube(Vec3::new(0.2, 0.8, 0.3)),
        Transform::from_translation(Vec3::new(-1.5, 1.0, 0.0)),
    );
    scene.add_voxel_with(
        VoxelMesh::new(2.0, 1.0, 1.0, Vec3::new(0.2, 0.4, 0.9)),
        Transform::from_translation(Vec3::new(0.5, 0.0, -1.0)),
    );

    // a rotated pillar
    scene.add_voxel_with(
        VoxelMesh::new(0.5, 0.5, 3.0, Vec3::new(0.9, 0.8, 0.2)),
        Transform {
            translation: Vec3::new(2.5, 0.0, 1.5),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_4, 0.0),
            scale: Vec3::one(),
        },
    );

    // a scaled cube
    scene.add_voxel_with(
        VoxelMesh::unit_cube(Vec3::new(0.7, 0.4, 0.8)),
        Transform {
            translation: Vec3::new(-3.5, 0.0, 2.0),
            rotation: Vec3::zero(),
            scale: Vec3::new(1.5, 0.5, 1.5),
        },
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let event_loop = EventLoop::new();
    let app = VoxelApp::new(&event_loop)?;
    app.main_loop(event_loop)
}

pub fn find_memorytype_index(
    memory_req: &vk::MemoryRequirements,
    memory_prop: &vk::PhysicalDeviceMemoryProperties,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_prop.memory_types[..memory_prop.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            (memory_req.memory_type_bits & (1 << index)) != 0
                && memory_type.property_flags & flags == flags
        })
        .map(|(index, _memory_type)| index as u32)
}
