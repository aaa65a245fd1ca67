pub mod buffer;
pub mod command_pool;
pub mod context;
pub mod frame;
pub mod swapchain;
pub mod window_settings;
