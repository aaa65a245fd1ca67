pub mod depth_buffer;
pub mod descriptor;
pub mod pipeline;
pub mod render_pass;

use std::{path::PathBuf, sync::Arc};

use ash::vk;

use crate::camera::Camera;
use crate::error::RendererResult;
use crate::scene::Scene;
use crate::vulkan::{context::Context, swapchain::SwapchainContainer};

use self::depth_buffer::DepthBuffer;
use self::descriptor::CameraDescriptors;

/// Owns everything between the swapchain and the scene: render pass,
/// pipeline, depth buffer, framebuffers and the per-slot camera uniforms.
pub struct VoxelRenderer {
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,

    depth_buffer: DepthBuffer,
    framebuffers: Vec<vk::Framebuffer>,

    camera_descriptors: CameraDescriptors,

    context: Arc<Context>,
}

impl VoxelRenderer {
    pub fn new(
        context: Arc<Context>,
        swapchain: &SwapchainContainer,
        shader_dir: PathBuf,
    ) -> RendererResult<Self> {
        let device = &context.device;

        let depth_buffer = DepthBuffer::new(context.clone(), swapchain.extent)?;

        let render_pass = render_pass::create_render_pass(
            device,
            swapchain.surface_format.format,
            depth_buffer.format,
        )?;

        let camera_descriptors = CameraDescriptors::new(context.clone())?;

        let (pipeline, pipeline_layout) = pipeline::create_pipeline(
            device,
            &shader_dir,
            render_pass,
            camera_descriptors.layout(),
        )?;

        let framebuffers = create_framebuffers(device, render_pass, swapchain, depth_buffer.view)?;

        Ok(Self {
            render_pass,
            pipeline,
            pipeline_layout,
            depth_buffer,
            framebuffers,
            camera_descriptors,
            context,
        })
    }

    /// Rebuilds everything sized to the swapchain. The pipeline survives
    /// because viewport and scissor are dynamic. The new resources are
    /// built before the old ones are destroyed, so a failure here leaves
    /// `self` holding only live handles for `Drop`.
    pub fn resize(&mut self, swapchain: &SwapchainContainer) -> RendererResult<()> {
        let device = &self.context.device;

        let depth_buffer = DepthBuffer::new(self.context.clone(), swapchain.extent)?;
        let framebuffers =
            create_framebuffers(device, self.render_pass, swapchain, depth_buffer.view)?;

        // The swapchain recreation already waited for device idle.
        for &framebuffer in self.framebuffers.iter() {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }

        self.depth_buffer = depth_buffer;
        self.framebuffers = framebuffers;
        Ok(())
    }

    pub fn update_camera(&self, slot: usize, camera: &Camera) -> RendererResult<()> {
        self.camera_descriptors.write_camera(slot, camera)
    }

    /// Records the voxel pass into an already-begun command buffer.
    pub fn record(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
        slot: usize,
        swapchain: &SwapchainContainer,
        scene: &Scene,
    ) {
        let device = &self.context.device;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: swapchain.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            )
        };

        unsafe {
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.pipeline)
        };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: swapchain.extent.width as f32,
            height: swapchain.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: swapchain.extent,
        };
        unsafe { device.cmd_set_viewport(command_buffer, 0, std::slice::from_ref(&viewport)) };
        unsafe { device.cmd_set_scissor(command_buffer, 0, std::slice::from_ref(&scissor)) };

        let descriptor_set = self.camera_descriptors.set(slot);
        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                std::slice::from_ref(&descriptor_set),
                &[],
            )
        };

        // An empty scene still clears the frame.
        if let Some(buffers) = scene.buffers() {
            if scene.index_count() > 0 {
                unsafe {
                    device.cmd_bind_vertex_buffers(
                        command_buffer,
                        0,
                        std::slice::from_ref(&buffers.vertex_buffer.inner),
                        &[0],
                    )
                };
                unsafe {
                    device.cmd_bind_index_buffer(
                        command_buffer,
                        buffers.index_buffer.inner,
                        0,
                        vk::IndexType::UINT32,
                    )
                };
                unsafe {
                    device.cmd_draw_indexed(command_buffer, scene.index_count(), 1, 0, 0, 0)
                };
            }
        }

        unsafe { device.cmd_end_render_pass(command_buffer) };
    }
}

fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    swapchain: &SwapchainContainer,
    depth_view: vk::ImageView,
) -> RendererResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(swapchain.imageviews.len());

    for &swapchain_image_view in swapchain.imageviews.iter() {
        let attachments = [swapchain_image_view, depth_view];

        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(swapchain.extent.width)
            .height(swapchain.extent.height)
            .layers(1);

        match unsafe { device.create_framebuffer(&create_info, None) } {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                for &framebuffer in framebuffers.iter() {
                    unsafe { device.destroy_framebuffer(framebuffer, None) };
                }
                return Err(e.into());
            }
        }
    }

    Ok(framebuffers)
}

impl Drop for VoxelRenderer {
    fn drop(&mut self) {
        let device = &self.context.device;

        for &framebuffer in self.framebuffers.iter() {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }
        unsafe { device.destroy_pipeline(self.pipeline, None) };
        unsafe { device.destroy_pipeline_layout(self.pipeline_layout, None) };
        unsafe { device.destroy_render_pass(self.render_pass, None) };
    }
}
