// Render pass, framebuffer and pipeline construction.
//
// A `Pass` bundles a pipeline with the layout it was built against and owns
// both, so tearing down a pass can never strand its layout.

use ash::vk;
use std::ffi::CStr;

use super::RenderDevice;
use crate::error::DeviceResult;
use crate::mesh::Vertex;

const SHADER_ENTRY: &CStr = c"main";

/// Render pass for color + depth rendering into swapchain images.
pub fn create_render_pass(
    device: &RenderDevice,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> DeviceResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_attachment_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let depth_attachment_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .depth_stencil_attachment(&depth_attachment_ref);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = &[color_attachment, depth_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    let render_pass = unsafe { device.device.create_render_pass(&render_pass_info, None) }?;
    Ok(render_pass)
}

/// One framebuffer per swapchain image, sharing the depth attachment.
pub fn create_framebuffers(
    device: &RenderDevice,
    image_views: &[vk::ImageView],
    depth_image_view: vk::ImageView,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> DeviceResult<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&image_view| {
            let attachments = &[image_view, depth_image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer =
                unsafe { device.device.create_framebuffer(&framebuffer_info, None) }?;
            Ok(framebuffer)
        })
        .collect()
}

/// Vertex input for the standard interleaved mesh vertex.
pub fn vertex_input_desc() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let binding = vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(std::mem::size_of::<Vertex>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX);

    let attribute = |location: u32, format: vk::Format, offset: u32| {
        vk::VertexInputAttributeDescription::default()
            .binding(0)
            .location(location)
            .format(format)
            .offset(offset)
    };

    let attributes = vec![
        attribute(0, vk::Format::R32G32B32_SFLOAT, 0),  // position
        attribute(1, vk::Format::R32G32B32_SFLOAT, 12), // normal
        attribute(2, vk::Format::R32G32_SFLOAT, 24),    // texcoord
        attribute(3, vk::Format::R32G32B32_SFLOAT, 32), // tangent
    ];

    (vec![binding], attributes)
}

/// Vertex input for position-only screen-space geometry.
pub fn position_only_input_desc() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let binding = vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(std::mem::size_of::<[f32; 2]>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX);

    let attribute = vk::VertexInputAttributeDescription::default()
        .binding(0)
        .location(0)
        .format(vk::Format::R32G32_SFLOAT)
        .offset(0);

    (vec![binding], vec![attribute])
}

/// Everything a graphics pass needs beyond the shaders themselves.
pub struct GraphicsPassDesc<'a> {
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
    pub vertex_input: (
        Vec<vk::VertexInputBindingDescription>,
        Vec<vk::VertexInputAttributeDescription>,
    ),
    pub set_layouts: &'a [vk::DescriptorSetLayout],
    pub push_constant_ranges: &'a [vk::PushConstantRange],
    pub depth_test: bool,
}

/// A pipeline bound together with the layout it owns.
///
/// Set layouts are handles owned by a `DescriptorArena`; the pass only
/// records them in its pipeline layout.
pub struct Pass {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
}

impl Pass {
    pub fn graphics(device: &RenderDevice, desc: &GraphicsPassDesc) -> DeviceResult<Self> {
        let layout = Self::create_layout(device, desc.set_layouts, desc.push_constant_ranges)?;

        let vert_stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(desc.vertex_shader)
            .name(SHADER_ENTRY);

        let frag_stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(desc.fragment_shader)
            .name(SHADER_ENTRY);

        let shader_stages = &[vert_stage, frag_stage];

        let (bindings, attributes) = &desc.vertex_input;
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(bindings)
            .vertex_attribute_descriptions(attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(desc.extent.width as f32)
            .height(desc.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(desc.extent);

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(viewports)
            .scissors(scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);

        let color_blend_attachments = &[color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(desc.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(pipelines, e)| {
            unsafe {
                for pipeline in pipelines {
                    device.device.destroy_pipeline(pipeline, None);
                }
                device.device.destroy_pipeline_layout(layout, None);
            }
            e
        })?;

        Ok(Self {
            pipeline: pipelines[0],
            layout,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }

    pub fn compute(
        device: &RenderDevice,
        shader: vk::ShaderModule,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> DeviceResult<Self> {
        let layout = Self::create_layout(device, set_layouts, push_constant_ranges)?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader)
            .name(SHADER_ENTRY);

        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);

        let pipelines = unsafe {
            device
                .device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(pipelines, e)| {
            unsafe {
                for pipeline in pipelines {
                    device.device.destroy_pipeline(pipeline, None);
                }
                device.device.destroy_pipeline_layout(layout, None);
            }
            e
        })?;

        Ok(Self {
            pipeline: pipelines[0],
            layout,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }

    fn create_layout(
        device: &RenderDevice,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> DeviceResult<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }?;
        Ok(layout)
    }

    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }

    /// Bind the pipeline and any descriptor sets in one go.
    pub fn apply(&self, device: &RenderDevice, cmd: vk::CommandBuffer, sets: &[vk::DescriptorSet]) {
        unsafe {
            device
                .device
                .cmd_bind_pipeline(cmd, self.bind_point, self.pipeline);
            if !sets.is_empty() {
                device.device.cmd_bind_descriptor_sets(
                    cmd,
                    self.bind_point,
                    self.layout,
                    0,
                    sets,
                    &[],
                );
            }
        }
    }

    pub fn destroy(self, device: &RenderDevice) {
        unsafe {
            device.device.destroy_pipeline(self.pipeline, None);
            device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
