use draw_submit::{
    Assets, BindingMap, Drawable, EngineSettings, GpuBuffer, Handle, MaterialParams, Mesh,
    PipelineSpec, RenderTarget, ShaderSet, SubmitEngine, SubmitError, Texture,
};
use draw_submit::submit::pipeline::VertexLayoutSpec;

const TEST_SHADER: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

struct Gpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Negotiate a device the way an embedding application would, requesting the
/// optional fast-path features only when the adapter has them. Returns `None`
/// on machines without any usable adapter so the suite skips instead of
/// failing.
fn gpu() -> Option<Gpu> {
    draw_submit::init_logging();

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;

    let adapter_features = adapter.features();
    let mut required_features = wgpu::Features::empty();
    for feature in [
        // wgpu 27 removed `Features::MULTI_DRAW_INDIRECT` (plain multi-draw is now
        // baseline); only `INDIRECT_FIRST_INSTANCE` remains a requestable feature here.
        wgpu::Features::INDIRECT_FIRST_INSTANCE,
        wgpu::Features::TEXTURE_BINDING_ARRAY,
        wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
    ] {
        if adapter_features.contains(feature) {
            required_features |= feature;
        }
    }

    let required_limits = if required_features.contains(wgpu::Features::TEXTURE_BINDING_ARRAY) {
        wgpu::Limits {
            max_binding_array_elements_per_shader_stage: 256,
            ..wgpu::Limits::default()
        }
    } else {
        wgpu::Limits::default()
    };

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("TestDevice"),
        required_features,
        required_limits,
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .ok()?;

    Some(Gpu { device, queue })
}

fn settings(frames_in_flight: u32) -> EngineSettings {
    EngineSettings {
        frames_in_flight,
        bindless_capacity: 64,
        ..EngineSettings::default()
    }
}

fn register_shader(gpu: &Gpu, assets: &mut Assets) -> Handle<ShaderSet> {
    let module = gpu
        .device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("TestShader"),
            source: wgpu::ShaderSource::Wgsl(TEST_SHADER.into()),
        });
    assets
        .shaders
        .insert(ShaderSet::new(module, "vs_main", "fs_main"))
}

fn register_triangle(gpu: &Gpu, assets: &mut Assets, indexed: bool) -> Handle<Mesh> {
    let vertices: [[f32; 3]; 3] = [[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]];
    let indices: [u32; 3] = [0, 1, 2];
    assets.meshes.insert(Mesh::from_vertices(
        &gpu.device,
        &vertices,
        indexed.then_some(&indices[..]),
    ))
}

fn register_texture(gpu: &Gpu, assets: &mut Assets) -> Handle<Texture> {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("TestTexture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    assets.textures.insert(Texture::new(texture))
}

fn pipeline_spec(shader: Handle<ShaderSet>) -> PipelineSpec {
    let mut spec = PipelineSpec::new(
        shader,
        VertexLayoutSpec::vertex(
            12,
            vec![wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: 0,
            }],
        ),
    )
    .with_label("test pipeline");
    spec.depth = draw_submit::submit::DepthSpec {
        test: false,
        write: false,
        compare: wgpu::CompareFunction::Always,
    };
    spec
}

struct Offscreen {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Offscreen {
    fn new(gpu: &Gpu) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("OffscreenTarget"),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    fn target(&self) -> RenderTarget<'_> {
        RenderTarget {
            color_views: vec![&self.view],
            color_formats: vec![wgpu::TextureFormat::Rgba8UnormSrgb],
            depth_view: None,
            depth_format: None,
            sample_count: 1,
            extent: (64, 64),
            clear_color: Some(wgpu::Color::BLACK),
            clear_depth: None,
        }
    }
}

#[test]
fn engine_rejects_zero_frames_in_flight() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let result = SubmitEngine::new(&gpu.device, &gpu.queue, settings(0));
    assert!(matches!(result, Err(SubmitError::NoFramesInFlight)));
}

#[test]
fn slot_ring_returns_to_start_after_n_advances() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let offscreen = Offscreen::new(&gpu);

    let frames = 3;
    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(frames)).unwrap();
    assert_eq!(engine.active_slot(), 0);

    for i in 0..frames as usize {
        engine.stage(Drawable::new(mesh, pipeline_spec(shader)));
        let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
        assert_eq!(frame.slot, i);
        gpu.queue.submit(Some(frame.commands));
    }

    assert_eq!(engine.active_slot(), 0);
}

#[test]
fn shared_mesh_and_pipeline_collapse_to_one_run() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    let k = 7;
    engine.stage_many((0..k).map(|_| Drawable::new(mesh, pipeline_spec(shader))));

    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let stats = engine.last_frame_stats();
    assert_eq!(stats.drawables, k);
    assert_eq!(stats.pipeline_groups, 1);
    // One multi-draw covering all K parameter records, not K separate runs.
    assert_eq!(stats.mesh_runs, 1);
    assert_eq!(stats.parameter_records, k);
    assert_eq!(frame.draws, k);
}

#[test]
fn example_scene_builds_expected_tables_and_batches() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh_a = register_triangle(&gpu, &mut assets, true);
    let mesh_b = register_triangle(&gpu, &mut assets, true);
    let t1 = register_texture(&gpu, &mut assets);
    let t2 = register_texture(&gpu, &mut assets);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    engine.stage(Drawable::new(mesh_a, pipeline_spec(shader)).with_textures(vec![t1, t2]));
    engine.stage(Drawable::new(mesh_a, pipeline_spec(shader)).with_textures(vec![t1, t2]));
    engine.stage(Drawable::new(mesh_b, pipeline_spec(shader)).with_textures(vec![t1]));

    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let stats = engine.last_frame_stats();
    // T1 and T2 for the mesh-A key, T1 again for the mesh-B key: no
    // deduplication across keys.
    assert_eq!(stats.bindless_entries, 3);
    assert_eq!(stats.pipeline_groups, 1);
    assert_eq!(stats.mesh_runs, 2);
    assert_eq!(stats.parameter_records, 3);
}

#[test]
fn repeat_content_hits_the_set_cache() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let uniform = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("TestUniform"),
        size: 64,
        usage: wgpu::BufferUsages::UNIFORM,
        mapped_at_creation: false,
    });
    let buffer = assets.buffers.insert(GpuBuffer::new(uniform));
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    let stage_frame = |engine: &SubmitEngine| {
        engine.stage(
            Drawable::new(mesh, pipeline_spec(shader))
                .with_bindings(BindingMap::new().uniform(0, buffer))
                .with_material(MaterialParams::white()),
        );
    };

    stage_frame(&engine);
    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));
    assert_eq!(engine.last_frame_stats().set_cache_misses, 1);

    stage_frame(&engine);
    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let stats = engine.last_frame_stats();
    assert_eq!(stats.set_cache_hits, 1);
    assert_eq!(stats.set_cache_misses, 0);
}

#[test]
fn changed_binding_misses_the_set_cache() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let make_buffer = || {
        gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TestUniform"),
            size: 64,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        })
    };
    let buffer_a = assets.buffers.insert(GpuBuffer::new(make_buffer()));
    let buffer_b = assets.buffers.insert(GpuBuffer::new(make_buffer()));
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    engine.stage(
        Drawable::new(mesh, pipeline_spec(shader))
            .with_bindings(BindingMap::new().uniform(0, buffer_a)),
    );
    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    // Same slot, same shape, different buffer: a fresh set must be built.
    engine.stage(
        Drawable::new(mesh, pipeline_spec(shader))
            .with_bindings(BindingMap::new().uniform(0, buffer_b)),
    );
    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let stats = engine.last_frame_stats();
    assert_eq!(stats.set_cache_hits, 0);
    assert_eq!(stats.set_cache_misses, 1);
}

#[test]
fn mixed_index_modes_split_runs() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let indexed = register_triangle(&gpu, &mut assets, true);
    let plain = register_triangle(&gpu, &mut assets, false);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    engine.stage(Drawable::new(indexed, pipeline_spec(shader)));
    engine.stage(Drawable::new(plain, pipeline_spec(shader)));

    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let stats = engine.last_frame_stats();
    assert_eq!(stats.mesh_runs, 2);
    assert_eq!(stats.parameter_records, 2);
}

#[test]
fn reset_clears_the_pipeline_cache() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    engine.stage(Drawable::new(mesh, pipeline_spec(shader)));
    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    let cache = engine.pipeline_cache();
    assert_eq!(cache.lock().unwrap().len(), 1);

    engine.reset();
    assert!(cache.lock().unwrap().is_empty());
}

#[test]
fn mismatched_attachment_counts_are_fatal() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let assets = Assets::new();
    let offscreen = Offscreen::new(&gpu);
    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    let mut target = offscreen.target();
    target.color_formats.push(wgpu::TextureFormat::Rgba8Unorm);

    let result = engine.advance_and_record(&assets, &target);
    assert!(matches!(
        result,
        Err(SubmitError::AttachmentMismatch { .. })
    ));
}

#[test]
fn missing_vertex_stage_is_fatal() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let module = gpu
        .device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("FragmentOnlyShader"),
            source: wgpu::ShaderSource::Wgsl(TEST_SHADER.into()),
        });
    let shader = assets.shaders.insert(ShaderSet {
        module,
        vertex_entry: None,
        fragment_entry: Some("fs_main".to_owned()),
    });
    let mesh = register_triangle(&gpu, &mut assets, true);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();
    engine.stage(Drawable::new(mesh, pipeline_spec(shader)));

    let result = engine.advance_and_record(&assets, &offscreen.target());
    assert!(matches!(
        result,
        Err(SubmitError::MissingVertexStage { .. })
    ));
}

#[test]
fn concurrent_staging_keeps_every_drawable() {
    let Some(gpu) = gpu() else {
        eprintln!("no adapter available; skipping");
        return;
    };

    let mut assets = Assets::new();
    let shader = register_shader(&gpu, &mut assets);
    let mesh = register_triangle(&gpu, &mut assets, true);
    let offscreen = Offscreen::new(&gpu);

    let engine = SubmitEngine::new(&gpu.device, &gpu.queue, settings(2)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                engine.stage_many((0..25).map(|_| Drawable::new(mesh, pipeline_spec(shader))));
            });
        }
    });

    assert_eq!(engine.staged_len(), 100);

    let frame = engine.advance_and_record(&assets, &offscreen.target()).unwrap();
    gpu.queue.submit(Some(frame.commands));

    assert_eq!(engine.last_frame_stats().drawables, 100);
    assert_eq!(engine.staged_len(), 0);
}
