use std::{ops::Deref, sync::Arc};

use ash::vk;
use tracing::debug;

use crate::error::{RendererError, RendererResult};
use crate::find_memorytype_index;

use super::command_pool::CommandPool;
use super::context::Context;

pub struct Buffer {
    pub inner: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    context: Arc<Context>,
}

impl Buffer {
    pub fn new(
        context: Arc<Context>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_property_flags: vk::MemoryPropertyFlags,
    ) -> RendererResult<Buffer> {
        let device = &context.device;

        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&create_info, None) }?;

        let memory_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memorytype_index = match find_memorytype_index(
            &memory_requirements,
            &context.device_memory_properties,
            memory_property_flags,
        ) {
            Some(index) => index,
            None => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(RendererError::NoSuitableMemoryType);
            }
        };

        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(memory_requirements.size)
            .memory_type_index(memorytype_index);

        let memory = match unsafe { device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.destroy_buffer(buffer, None) };
            unsafe { device.free_memory(memory, None) };
            return Err(e.into());
        }

        Ok(Self {
            inner: buffer,
            memory,
            size: memory_requirements.size,
            context,
        })
    }

    /// Copies `data` into this buffer through a mapped pointer. The buffer
    /// must be host-visible.
    pub fn copy_data<T: Copy>(&self, data: &[T]) -> RendererResult<()> {
        let device = &self.context.device;

        let ptr = unsafe {
            device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        }? as *mut T;

        unsafe { ptr.copy_from_nonoverlapping(data.as_ptr(), data.len()) };
        unsafe { device.unmap_memory(self.memory) };
        Ok(())
    }

    /// Stages `data` through a host-visible buffer into a new device-local
    /// buffer with `TRANSFER_DST | usage`, blocking until the copy has
    /// finished. The staging buffer is released before returning, on both
    /// the success and the error path.
    pub fn upload<T: Copy>(
        context: &Arc<Context>,
        command_pool: &CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> RendererResult<Buffer> {
        let size = (std::mem::size_of::<T>() * data.len()) as vk::DeviceSize;

        let staging = Buffer::new(
            context.clone(),
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.copy_data(data)?;

        let destination = Buffer::new(
            context.clone(),
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        copy_buffer_blocking(context, command_pool, &staging, &destination, size)?;

        debug!(bytes = size, ?usage, "uploaded buffer to device-local memory");
        Ok(destination)
    }
}

fn copy_buffer_blocking(
    context: &Arc<Context>,
    command_pool: &CommandPool,
    src: &Buffer,
    dst: &Buffer,
    size: vk::DeviceSize,
) -> RendererResult<()> {
    let device = &context.device;

    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_buffer_count(1)
        .command_pool(**command_pool)
        .level(vk::CommandBufferLevel::PRIMARY);

    let command_buffer = unsafe { device.allocate_command_buffers(&allocate_info) }?[0];

    let result = (|| -> RendererResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            device.cmd_copy_buffer(command_buffer, src.inner, dst.inner, std::slice::from_ref(&region))
        };

        unsafe { device.end_command_buffer(command_buffer) }?;

        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(std::slice::from_ref(&command_buffer))
            .build();
        unsafe { device.queue_submit(context.queue, &[submit_info], vk::Fence::null()) }?;
        unsafe { device.queue_wait_idle(context.queue) }?;
        Ok(())
    })();

    unsafe { device.free_command_buffers(**command_pool, std::slice::from_ref(&command_buffer)) };
    result
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe { device.destroy_buffer(self.inner, None) };
        unsafe { device.free_memory(self.memory, None) };
    }
}

impl Deref for Buffer {
    type Target = vk::Buffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
