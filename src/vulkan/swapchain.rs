use std::sync::Arc;

use ash::vk::{self, SwapchainCreateInfoKHR};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::error::RendererResult;

use super::context::Context;

pub struct SwapchainContainer {
    pub loader: ash::extensions::khr::Swapchain,
    pub inner: vk::SwapchainKHR,

    pub images: Vec<vk::Image>,
    pub imageviews: Vec<vk::ImageView>,

    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,

    present_mode: vk::PresentModeKHR,

    context: Arc<Context>,
}

impl SwapchainContainer {
    pub fn new(
        context: Arc<Context>,
        window_size: PhysicalSize<u32>,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> RendererResult<Self> {
        let capabilities = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_capabilities(context.physical_device, context.surface)
        }?;

        let formats = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_formats(context.physical_device, context.surface)
        }?;

        let present_modes = unsafe {
            context
                .surface_loader
                .get_physical_device_surface_present_modes(context.physical_device, context.surface)
        }?;

        let surface_format = formats
            .into_iter()
            .min_by_key(|fmt| match (fmt.format, fmt.color_space) {
                (vk::Format::B8G8R8A8_SRGB, _) => 1,
                (vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR) => 2,
                (_, _) => 3,
            })
            .ok_or(vk::Result::ERROR_FORMAT_NOT_SUPPORTED)?;

        // FIFO is the only mode Vulkan guarantees to be available.
        let present_mode = present_modes
            .into_iter()
            .find(|&pm| pm == preferred_present_mode)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let swapchain_extent = surface_extent(&capabilities, window_size);
        let num_images = capabilities.min_image_count.max(2);

        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&context.instance, &context.device);

        let create_info = SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(num_images)
            .image_color_space(surface_format.color_space)
            .image_format(surface_format.format)
            .image_extent(swapchain_extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }?;
        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }?;
        let imageviews = create_image_views(&context.device, &images, surface_format.format)?;

        debug!(
            format = ?surface_format.format,
            ?present_mode,
            width = swapchain_extent.width,
            height = swapchain_extent.height,
            "created swapchain"
        );

        Ok(Self {
            loader: swapchain_loader,
            inner: swapchain,
            images,
            imageviews,
            surface_format,
            extent: swapchain_extent,

            present_mode,

            context,
        })
    }

    pub fn recreate(&mut self, window_size: PhysicalSize<u32>) -> RendererResult<()> {
        let device = &self.context.device;

        unsafe { device.device_wait_idle() }?;

        let capabilities = unsafe {
            self.context
                .surface_loader
                .get_physical_device_surface_capabilities(
                    self.context.physical_device,
                    self.context.surface,
                )
        }?;

        let num_images = capabilities.min_image_count.max(2);
        let swapchain_extent = surface_extent(&capabilities, window_size);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.context.surface)
            .min_image_count(num_images)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(swapchain_extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(self.inner);

        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None) }?;
        let images = unsafe { self.loader.get_swapchain_images(swapchain) }?;
        let imageviews = create_image_views(device, &images, self.surface_format.format)?;

        // The device is idle, so the old swapchain is no longer in use.
        for &imageview in self.imageviews.iter() {
            unsafe { device.destroy_image_view(imageview, None) };
        }
        unsafe { self.loader.destroy_swapchain(self.inner, None) };

        self.inner = swapchain;
        self.extent = swapchain_extent;
        self.images = images;
        self.imageviews = imageviews;

        debug!(
            width = swapchain_extent.width,
            height = swapchain_extent.height,
            "recreated swapchain"
        );

        Ok(())
    }
}

fn surface_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: PhysicalSize<u32>,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_size.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_size.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RendererResult<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::builder()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(image);

            let view = unsafe { device.create_image_view(&create_info, None) }?;
            Ok(view)
        })
        .collect()
}

impl Drop for SwapchainContainer {
    fn drop(&mut self) {
        for &imageview in self.imageviews.iter() {
            unsafe { self.context.device.destroy_image_view(imageview, None) };
        }
        unsafe { self.loader.destroy_swapchain(self.inner, None) };
    }
}
