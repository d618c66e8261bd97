use crate::{
    data_structures::{
        model::{self, Vertex},
        texture::Texture,
        transform::TransformRaw,
    },
    pipelines::{PipelineKey, Shading},
};

/// Everything about a pipeline that is not its layout or shader module.
pub struct RenderPipelineParams<'a> {
    pub label: &'a str,
    pub vs_entry: &'a str,
    pub fs_entry: &'a str,
    pub vertex_layouts: &'a [wgpu::VertexBufferLayout<'a>],
    pub targets: &'a [Option<wgpu::ColorTargetState>],
    pub depth: Option<wgpu::DepthStencilState>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub sample_count: u32,
}

/// Pipeline for one mesh material variant, see [`PipelineKey`].
pub fn mk_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let blend = if key.transparent {
        Some(wgpu::BlendState::ALPHA_BLENDING)
    } else {
        Some(wgpu::BlendState::REPLACE)
    };
    let color = Some(wgpu::ColorTargetState {
        format: Texture::HDR_FORMAT,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    });
    let main_targets = [color.clone(), color.clone()];
    let mirror_targets = [color];

    let fs_entry = match (key.shading, key.mirrored) {
        (Shading::Basic, false) => "fs_basic",
        (Shading::Basic, true) => "fs_basic_mirror",
        (Shading::Phong, false) => "fs_phong",
        (Shading::Phong, true) => "fs_phong_mirror",
        // The mirror pass skips reflectors.
        (Shading::Reflector, _) => "fs_reflector",
    };
    let label = format!("{:?} Pipeline", key);

    mk_render_pipeline(
        device,
        layout,
        shader,
        RenderPipelineParams {
            label: &label,
            vs_entry: "vs_main",
            fs_entry,
            vertex_layouts: &[model::ModelVertex::desc(), TransformRaw::desc()],
            targets: if key.mirrored {
                &mirror_targets
            } else {
                &main_targets
            },
            depth: Some(depth_state(!key.transparent)),
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: key.side.cull_mode(),
            // Mirroring flips the winding of every triangle.
            front_face: if key.mirrored {
                wgpu::FrontFace::Cw
            } else {
                wgpu::FrontFace::Ccw
            },
            sample_count: key.sample_count,
        },
    )
}

pub fn depth_state(depth_write_enabled: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: Texture::DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    params: RenderPipelineParams,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(params.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(params.vs_entry),
            buffers: params.vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(params.fs_entry),
            targets: params.targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: params.topology,
            strip_index_format: None,
            front_face: params.front_face,
            cull_mode: params.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: params.depth,
        multisample: wgpu::MultisampleState {
            count: params.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
