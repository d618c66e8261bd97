use crate::{
    data_structures::{model::Vertex, stars::Star, texture::Texture},
    pipelines::basic::{RenderPipelineParams, depth_state, mk_render_pipeline},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StarUniform {
    /// Twinkle speed, fade flag.
    pub params: [f32; 4],
}

impl StarUniform {
    pub fn new(speed: f32, fade: bool) -> Self {
        Self {
            params: [speed, fade as u32 as f32, 0.0, 0.0],
        }
    }
}

impl Vertex for Star {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Star>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

pub fn stars_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("stars_bind_group_layout"),
    })
}

/// Additive, depth-tested but not depth-writing point sprites.
pub fn mk_stars_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    mirrored: bool,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    let additive = wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    };
    let color = Some(wgpu::ColorTargetState {
        format: Texture::HDR_FORMAT,
        blend: Some(additive),
        write_mask: wgpu::ColorWrites::ALL,
    });
    let mask = Some(wgpu::ColorTargetState {
        format: Texture::HDR_FORMAT,
        blend: None,
        write_mask: wgpu::ColorWrites::empty(),
    });
    let main_targets = [color.clone(), mask];
    let mirror_targets = [color];

    mk_render_pipeline(
        device,
        layout,
        shader,
        RenderPipelineParams {
            label: if mirrored {
                "Mirrored Stars Pipeline"
            } else {
                "Stars Pipeline"
            },
            vs_entry: "vs_main",
            fs_entry: if mirrored { "fs_mirror" } else { "fs_main" },
            vertex_layouts: &[Star::desc()],
            targets: if mirrored {
                &mirror_targets
            } else {
                &main_targets
            },
            depth: Some(depth_state(false)),
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_mode: None,
            front_face: wgpu::FrontFace::Ccw,
            sample_count,
        },
    )
}
