use std::sync::Arc;

use ash::vk;
use ultraviolet::Mat4;

use crate::camera::Camera;
use crate::error::RendererResult;
use crate::vulkan::buffer::Buffer;
use crate::vulkan::context::Context;
use crate::vulkan::frame::MAX_FRAMES_IN_FLIGHT;

/// Matches the uniform block at binding 0 of the vertex shader. `Mat4` is
/// 16-byte aligned, so the layout is std140-compatible as is.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CameraUniform {
    pub view: Mat4,
    pub proj: Mat4,
}

/// One host-visible camera uniform buffer and descriptor set per frame
/// slot, so a frame still in flight never sees the next frame's camera.
pub struct CameraDescriptors {
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
    buffers: Vec<Buffer>,

    context: Arc<Context>,
}

impl CameraDescriptors {
    pub fn new(context: Arc<Context>) -> RendererResult<Self> {
        let device = &context.device;

        let layout = {
            let bindings = [vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_count(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .build()];

            let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
            unsafe { device.create_descriptor_set_layout(&create_info, None) }?
        };

        let pool = {
            let pool_sizes = [vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: MAX_FRAMES_IN_FLIGHT as u32,
            }];

            let create_info = vk::DescriptorPoolCreateInfo::builder()
                .max_sets(MAX_FRAMES_IN_FLIGHT as u32)
                .pool_sizes(&pool_sizes);
            unsafe { device.create_descriptor_pool(&create_info, None) }?
        };

        let buffers = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                Buffer::new(
                    context.clone(),
                    std::mem::size_of::<CameraUniform>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .collect::<RendererResult<Vec<_>>>()?;

        let sets = {
            let layouts = [layout; MAX_FRAMES_IN_FLIGHT];
            let allocate_info = vk::DescriptorSetAllocateInfo::builder()
                .descriptor_pool(pool)
                .set_layouts(&layouts);

            unsafe { device.allocate_descriptor_sets(&allocate_info) }?
        };

        for (set, buffer) in sets.iter().zip(buffers.iter()) {
            let buffer_info = vk::DescriptorBufferInfo {
                buffer: buffer.inner,
                offset: 0,
                range: std::mem::size_of::<CameraUniform>() as vk::DeviceSize,
            };

            let write_set = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .buffer_info(std::slice::from_ref(&buffer_info))
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER);

            unsafe { device.update_descriptor_sets(std::slice::from_ref(&write_set), &[]) };
        }

        Ok(Self {
            layout,
            pool,
            sets,
            buffers,
            context,
        })
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn set(&self, slot: usize) -> vk::DescriptorSet {
        self.sets[slot]
    }

    pub fn write_camera(&self, slot: usize, camera: &Camera) -> RendererResult<()> {
        let uniform = CameraUniform {
            view: camera.view_matrix(),
            proj: camera.projection_matrix(),
        };
        self.buffers[slot].copy_data(std::slice::from_ref(&uniform))
    }
}

impl Drop for CameraDescriptors {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
        unsafe { device.destroy_descriptor_set_layout(self.layout, None) };
    }
}
