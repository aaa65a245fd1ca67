use std::{ffi::CStr, io::Cursor, path::Path};

use ash::{util::read_spv, vk};

use crate::error::{RendererError, RendererResult};
use crate::scene::Vertex;

/// Builds the voxel graphics pipeline from precompiled SPIR-V in
/// `shader_dir`. Viewport and scissor are dynamic state, so the pipeline
/// survives swapchain recreation.
pub fn create_pipeline(
    device: &ash::Device,
    shader_dir: &Path,
    render_pass: vk::RenderPass,
    camera_set_layout: vk::DescriptorSetLayout,
) -> RendererResult<(vk::Pipeline, vk::PipelineLayout)> {
    let vert_shader_code = load_spirv(&shader_dir.join("voxel.vert.spv"))?;
    let frag_shader_code = load_spirv(&shader_dir.join("voxel.frag.spv"))?;

    let vertex_shader_module = {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&vert_shader_code);
        unsafe { device.create_shader_module(&create_info, None) }?
    };

    let fragment_shader_module = {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&frag_shader_code);
        unsafe { device.create_shader_module(&create_info, None) }?
    };

    let result = build_pipeline(
        device,
        vertex_shader_module,
        fragment_shader_module,
        render_pass,
        camera_set_layout,
    );

    unsafe { device.destroy_shader_module(vertex_shader_module, None) };
    unsafe { device.destroy_shader_module(fragment_shader_module, None) };

    result
}

fn load_spirv(path: &Path) -> RendererResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|e| RendererError::Shader {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    read_spv(&mut Cursor::new(&bytes)).map_err(|e| RendererError::Shader {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn build_pipeline(
    device: &ash::Device,
    vertex_shader_module: vk::ShaderModule,
    fragment_shader_module: vk::ShaderModule,
    render_pass: vk::RenderPass,
    camera_set_layout: vk::DescriptorSetLayout,
) -> RendererResult<(vk::Pipeline, vk::PipelineLayout)> {
    let shader_entry_name = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .module(vertex_shader_module)
            .name(shader_entry_name)
            .stage(vk::ShaderStageFlags::VERTEX)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .module(fragment_shader_module)
            .name(shader_entry_name)
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .build(),
    ];

    let vertex_input_binding_descriptions = Vertex::binding_descriptions();
    let vertex_input_attribute_descriptions = Vertex::attribute_descriptions();

    let vertex_input_state_create_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&vertex_input_binding_descriptions)
        .vertex_attribute_descriptions(&vertex_input_attribute_descriptions);

    let input_assembly_state_create_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    // Actual values come from cmd_set_viewport / cmd_set_scissor.
    let viewport_state_create_info = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state_create_info =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let rasterization_state_create_info = vk::PipelineRasterizationStateCreateInfo::builder()
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0)
        .polygon_mode(vk::PolygonMode::FILL);

    let multisample_state_create_info = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state_create_info = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
        .max_depth_bounds(1.0)
        .min_depth_bounds(0.0);

    let color_blend_attachment_states = [vk::PipelineColorBlendAttachmentState {
        blend_enable: 0,
        src_color_blend_factor: vk::BlendFactor::ONE,
        dst_color_blend_factor: vk::BlendFactor::ZERO,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }];

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
        .attachments(&color_blend_attachment_states);

    let layout = {
        let layout_create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(std::slice::from_ref(&camera_set_layout));
        unsafe { device.create_pipeline_layout(&layout_create_info, None) }?
    };

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state_create_info)
        .input_assembly_state(&input_assembly_state_create_info)
        .viewport_state(&viewport_state_create_info)
        .dynamic_state(&dynamic_state_create_info)
        .rasterization_state(&rasterization_state_create_info)
        .multisample_state(&multisample_state_create_info)
        .depth_stencil_state(&depth_stencil_state_create_info)
        .color_blend_state(&color_blend_state)
        .layout(layout)
        .render_pass(render_pass);

    let pipeline = unsafe {
        device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&create_info),
            None,
        )
    }
    .map_err(|(_, e)| {
        unsafe { device.destroy_pipeline_layout(layout, None) };
        e
    })?[0];

    Ok((pipeline, layout))
}
