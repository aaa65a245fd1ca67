use std::sync::Arc;

use ash::vk;

use crate::error::{RendererError, RendererResult};
use crate::find_memorytype_index;
use crate::vulkan::context::Context;

/// Device-local depth attachment, recreated whenever the swapchain changes
/// extent.
pub struct DepthBuffer {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,

    context: Arc<Context>,
}

impl DepthBuffer {
    pub fn new(context: Arc<Context>, extent: vk::Extent2D) -> RendererResult<Self> {
        let device = &context.device;
        let format = find_depth_format(&context)?;

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.create_image(&create_info, None) }?;

        let memory_requirements = unsafe { device.get_image_memory_requirements(image) };

        let memorytype_index = match find_memorytype_index(
            &memory_requirements,
            &context.device_memory_properties,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Some(index) => index,
            None => {
                unsafe { device.destroy_image(image, None) };
                return Err(RendererError::NoSuitableMemoryType);
            }
        };

        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(memory_requirements.size)
            .memory_type_index(memorytype_index);

        let memory = match unsafe { device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe { device.destroy_image(image, None) };
            unsafe { device.free_memory(memory, None) };
            return Err(e.into());
        }

        let view = {
            let create_info = vk::ImageViewCreateInfo::builder()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(image);

            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => view,
                Err(e) => {
                    unsafe { device.destroy_image(image, None) };
                    unsafe { device.free_memory(memory, None) };
                    return Err(e.into());
                }
            }
        };

        Ok(Self {
            image,
            view,
            memory,
            format,
            context,
        })
    }
}

fn find_depth_format(context: &Context) -> RendererResult<vk::Format> {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    candidates
        .into_iter()
        .find(|&format| {
            let properties = unsafe {
                context
                    .instance
                    .get_physical_device_format_properties(context.physical_device, format)
            };
            properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or(RendererError::Vulkan(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe { device.destroy_image_view(self.view, None) };
        unsafe { device.destroy_image(self.image, None) };
        unsafe { device.free_memory(self.memory, None) };
    }
}
