use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::asset::Assets;
use crate::settings::{EngineSettings, Viewport};
use crate::submit::drawable::Drawable;
use crate::submit::error::SubmitError;
use crate::submit::internal::batches::{partition, BatchItem, PipelineGroup};
use crate::submit::internal::bindings::{BindingCache, SetKey};
use crate::submit::internal::bindless::{BindlessTable, TableKey, TextureBinding};
use crate::submit::internal::buffers::create_frame_layout;
use crate::submit::internal::frame::FrameSlot;
use crate::submit::internal::indirect::FrameCommands;
use crate::submit::internal::pipeline::{PipelineCache, PipelineKey};
use crate::submit::objects::FrameUniform;
use crate::submit::pipeline::TargetInfo;

/// Pipeline cache shareable between engine instances; locking is the
/// cache's own concern, external to the per-engine state.
pub type SharedPipelineCache = Arc<Mutex<PipelineCache>>;

/// Attachments the recorded pass draws into. Created and owned by the
/// caller; the engine brackets exactly one render pass over it.
pub struct RenderTarget<'a> {
    pub color_views: Vec<&'a wgpu::TextureView>,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_view: Option<&'a wgpu::TextureView>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
    pub extent: (u32, u32),
    /// `Some` clears the color attachments at pass begin, `None` loads.
    pub clear_color: Option<wgpu::Color>,
    pub clear_depth: Option<f32>,
}

impl RenderTarget<'_> {
    pub fn info(&self) -> TargetInfo {
        TargetInfo {
            color_formats: self.color_formats.clone(),
            depth_format: self.depth_format,
            sample_count: self.sample_count,
        }
    }
}

/// The finished command sequence for one frame. The caller submits it and
/// treats `slot` as in flight until that submission completes.
pub struct RecordedFrame {
    pub commands: wgpu::CommandBuffer,
    /// Logical draws recorded (one per staged drawable that survived).
    pub draws: u32,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitStats {
    pub drawables: u32,
    pub pipeline_groups: u32,
    pub mesh_runs: u32,
    /// Render-pass draw commands actually recorded. Equals `mesh_runs` when
    /// multi-draw is available, `parameter_records` otherwise.
    pub draw_calls: u32,
    pub parameter_records: u32,
    pub bindless_entries: u32,
    pub set_cache_hits: u32,
    pub set_cache_misses: u32,
}

/// Frame orchestrator: owns the slot ring, the caches and command
/// recording.
///
/// `stage` may be called from any thread at any time and keeps working while
/// a frame records. `advance_and_record` and `reset` are single-consumer
/// operations: a reentrant or overlapping call is caller misuse and panics
/// rather than corrupting the ring.
pub struct SubmitEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    settings: EngineSettings,
    multi_draw: bool,
    frame_layout: Arc<wgpu::BindGroupLayout>,
    pipelines: SharedPipelineCache,
    staged: Mutex<Vec<Drawable>>,
    state: Mutex<EngineState>,
    was_reset: AtomicBool,
}

/// Everything `advance_and_record` mutates, kept behind one lock so staging
/// never has to wait on recording.
struct EngineState {
    slots: Vec<FrameSlot>,
    active: usize,
    frame_index: u64,
    bindings: BindingCache,
    textures: TextureBinding,
    jitter_rng: SmallRng,
    stats: SubmitStats,
}

impl SubmitEngine {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: EngineSettings,
    ) -> Result<Self, SubmitError> {
        Self::with_pipeline_cache(
            device,
            queue,
            settings,
            Arc::new(Mutex::new(PipelineCache::new())),
        )
    }

    /// Construct with an externally supplied pipeline cache, shared with
    /// other engine instances on the same device.
    pub fn with_pipeline_cache(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: EngineSettings,
        pipelines: SharedPipelineCache,
    ) -> Result<Self, SubmitError> {
        let settings = settings.validate();
        if settings.frames_in_flight == 0 {
            return Err(SubmitError::NoFramesInFlight);
        }

        let frame_layout = create_frame_layout(device);
        let slots = (0..settings.frames_in_flight)
            .map(|_| {
                FrameSlot::new(
                    device,
                    frame_layout.clone(),
                    settings.initial_object_capacity,
                    settings.initial_draw_capacity,
                )
            })
            .collect();

        // wgpu 27 removed `Features::MULTI_DRAW_INDIRECT`: plain multi-draw-indirect
        // is now baseline (gated only by `DownlevelFlags::INDIRECT_EXECUTION`), so at
        // the device-feature level it is always available. The remaining feature-level
        // gate for the intended capability is `INDIRECT_FIRST_INSTANCE`.
        let multi_draw = device
            .features()
            .contains(wgpu::Features::INDIRECT_FIRST_INSTANCE);
        if !multi_draw {
            log::warn!("Multi-draw indirect not supported; draws degrade to direct calls");
        }

        let state = EngineState {
            slots,
            active: 0,
            frame_index: 0,
            bindings: BindingCache::new(device),
            textures: TextureBinding::new(device, settings.bindless_capacity),
            jitter_rng: SmallRng::seed_from_u64(settings.jitter_seed),
            stats: SubmitStats::default(),
        };

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            settings,
            multi_draw,
            frame_layout,
            pipelines,
            staged: Mutex::new(Vec::new()),
            state: Mutex::new(state),
            was_reset: AtomicBool::new(false),
        })
    }

    /// Append one drawable to the currently accumulating frame.
    pub fn stage(&self, drawable: Drawable) {
        self.check_reset_misuse();
        self.staged
            .lock()
            .expect("staging queue poisoned")
            .push(drawable);
    }

    /// Append several drawables; they stay contiguous and ordered even when
    /// other producers interleave their own calls.
    pub fn stage_many(&self, drawables: impl IntoIterator<Item = Drawable>) {
        self.check_reset_misuse();
        self.staged
            .lock()
            .expect("staging queue poisoned")
            .extend(drawables);
    }

    pub fn staged_len(&self) -> usize {
        self.staged.lock().expect("staging queue poisoned").len()
    }

    pub fn active_slot(&self) -> usize {
        self.state.lock().expect("engine state poisoned").active
    }

    pub fn frames_in_flight(&self) -> usize {
        self.settings.frames_in_flight as usize
    }

    pub fn last_frame_stats(&self) -> SubmitStats {
        self.state.lock().expect("engine state poisoned").stats
    }

    pub fn pipeline_cache(&self) -> SharedPipelineCache {
        self.pipelines.clone()
    }

    /// Drop all cached pipelines, layouts and binding sets. Handles obtained
    /// earlier must not be reused afterwards; staging must wait for the next
    /// `advance_and_record`.
    pub fn reset(&self) {
        let mut state = self
            .state
            .try_lock()
            .expect("reset may not overlap advance_and_record");

        let mut staged = self.staged.lock().expect("staging queue poisoned");
        if !staged.is_empty() {
            log::warn!("Discarding {} staged drawables on reset", staged.len());
            staged.clear();
        }
        drop(staged);

        state.bindings.reset();
        self.pipelines
            .lock()
            .expect("pipeline cache poisoned")
            .reset();
        state.textures.reset();
        self.was_reset.store(true, Ordering::Release);
    }

    /// Take the staged drawables, rotate the slot ring and record one frame.
    ///
    /// Returns the finished command buffer; the caller submits it and
    /// arranges GPU/host synchronization for the named slot. Staging may
    /// continue concurrently; the pending swap happens before any
    /// processing.
    pub fn advance_and_record(
        &self,
        assets: &Assets,
        target: &RenderTarget<'_>,
    ) -> Result<RecordedFrame, SubmitError> {
        let mut state = self
            .state
            .try_lock()
            .expect("advance_and_record is not reentrant");
        let state = &mut *state;

        if target.color_views.len() != target.color_formats.len() {
            return Err(SubmitError::AttachmentMismatch {
                expected: target.color_formats.len(),
                got: target.color_views.len(),
            });
        }

        let mut taken = mem::take(&mut *self.staged.lock().expect("staging queue poisoned"));
        self.was_reset.store(false, Ordering::Release);

        let slot_index = state.active;
        state.active = (state.active + 1) % state.slots.len();
        state.frame_index += 1;

        // Retire the previous frame's untouched cache generation before this
        // slot's resources are rewritten.
        state.bindings.end_frame();

        let mut target_info = target.info();
        if target_info.sample_count == 0 {
            target_info.sample_count = self.settings.sample_count;
        }

        // Bindless table first: it stamps every drawable's base offset, and
        // the table bind group must exist before any draw that samples it.
        let table = BindlessTable::build(&mut taken);
        let table_group = match &mut state.textures {
            TextureBinding::Table(binder) => Some(binder.update(&self.device, assets, &table)?),
            TextureBinding::Classic(_) => None,
        };

        let ResolvedFrame {
            items,
            pipelines,
            sets,
        } = self.resolve_drawables(state, assets, &taken, &target_info)?;

        let groups = partition(&items, !state.textures.is_table());

        // Classic mode binds each run's textures directly; resolve those
        // groups up front so recording stays immutable.
        let run_texture_groups = self.resolve_run_textures(state, assets, &taken, &groups);

        let jitter = [
            state.jitter_rng.gen::<f32>() - 0.5,
            state.jitter_rng.gen::<f32>() - 0.5,
        ];
        let uniform = FrameUniform::new(jitter, state.frame_index as u32, taken.len() as u32);

        let slot = &mut state.slots[slot_index];
        log::trace!(
            "Rewriting slot {} (last used on frame {})",
            slot_index,
            slot.last_used_frame
        );
        slot.last_used_frame = state.frame_index;
        slot.storage
            .upload(&self.device, &self.queue, &taken, uniform);

        let commands = FrameCommands::build(assets, &groups);
        slot.indirect.upload(&self.device, &self.queue, &commands);

        let binding_stats = state.bindings.take_stats();
        let mut stats = SubmitStats {
            drawables: taken.len() as u32,
            pipeline_groups: groups.len() as u32,
            mesh_runs: groups.iter().map(|g| g.runs.len() as u32).sum(),
            draw_calls: 0,
            parameter_records: (commands.indexed.len() + commands.plain.len()) as u32,
            bindless_entries: table.len() as u32,
            set_cache_hits: binding_stats.set_hits,
            set_cache_misses: binding_stats.set_misses,
        };

        let slot = &state.slots[slot_index];
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("SubmitEncoder"),
            });

        {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
                .color_views
                .iter()
                .map(|view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: match target.clear_color {
                                Some(color) => wgpu::LoadOp::Clear(color),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();

            let depth_stencil_attachment =
                target
                    .depth_view
                    .map(|view| wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: match target.clear_depth {
                                Some(depth) => wgpu::LoadOp::Clear(depth),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SubmitPass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let viewport = self
                .settings
                .viewport
                .unwrap_or_else(|| Viewport::full(target.extent.0, target.extent.1));
            pass.set_viewport(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                0.0,
                1.0,
            );
            let (sx, sy, sw, sh) = viewport.scissor();
            let sx = sx.min(target.extent.0);
            let sy = sy.min(target.extent.1);
            pass.set_scissor_rect(
                sx,
                sy,
                sw.min(target.extent.0 - sx),
                sh.min(target.extent.1 - sy),
            );

            pass.set_bind_group(0, slot.storage.bind_group(), &[]);
            if let Some(table_group) = &table_group {
                pass.set_bind_group(2, table_group.as_ref(), &[]);
            }

            let mut run_cursor = 0usize;
            for group in &groups {
                pass.set_pipeline(pipelines[group.pipeline as usize].as_ref());

                for run in &group.runs {
                    let run_commands = commands.runs[run_cursor];
                    let textures_group = run_texture_groups[run_cursor].clone();
                    run_cursor += 1;

                    if run_commands.count == 0 {
                        continue;
                    }
                    let Some(mesh) = assets.meshes.get(run.mesh) else {
                        continue;
                    };

                    pass.set_bind_group(1, sets[run.set as usize].as_ref(), &[]);
                    if let Some(textures_group) = &textures_group {
                        pass.set_bind_group(2, textures_group.as_ref(), &[]);
                    }

                    pass.set_vertex_buffer(0, mesh.vertex_buffer().slice(..));
                    if let Some(indices) = mesh.indices() {
                        pass.set_index_buffer(indices.buffer.slice(..), indices.format);
                    }

                    if self.multi_draw {
                        if run_commands.indexed {
                            pass.multi_draw_indexed_indirect(
                                slot.indirect.indexed(),
                                run_commands.byte_offset(),
                                run_commands.count,
                            );
                        } else {
                            pass.multi_draw_indirect(
                                slot.indirect.plain(),
                                run_commands.byte_offset(),
                                run_commands.count,
                            );
                        }
                        stats.draw_calls += 1;
                    } else {
                        // Same parameter records, replayed as direct calls.
                        for i in 0..run_commands.count {
                            let record_index = (run_commands.first + i) as usize;
                            if run_commands.indexed {
                                let record = commands.indexed[record_index];
                                pass.draw_indexed(
                                    record.first_index..record.first_index + record.index_count,
                                    record.base_vertex,
                                    record.first_instance..record.first_instance + 1,
                                );
                            } else {
                                let record = commands.plain[record_index];
                                pass.draw(
                                    record.first_vertex..record.first_vertex + record.vertex_count,
                                    record.first_instance..record.first_instance + 1,
                                );
                            }
                            stats.draw_calls += 1;
                        }
                    }
                }
            }
        }

        let draws = stats.parameter_records;
        state.stats = stats;

        Ok(RecordedFrame {
            commands: encoder.finish(),
            draws,
            slot: slot_index,
        })
    }

    fn check_reset_misuse(&self) {
        if self.was_reset.load(Ordering::Acquire) {
            debug_assert!(
                false,
                "staged a drawable after reset without an intervening advance_and_record"
            );
            log::warn!("Staging after reset; handles cached before the reset are stale");
        }
    }

    fn resolve_drawables(
        &self,
        state: &mut EngineState,
        assets: &Assets,
        taken: &[Drawable],
        target_info: &TargetInfo,
    ) -> Result<ResolvedFrame, SubmitError> {
        let texture_layout_key = state.textures.layout_key();

        let mut pipelines = Vec::new();
        let mut pipeline_ids: HashMap<PipelineKey, u32> = HashMap::new();
        let mut sets = Vec::new();
        let mut set_ids: HashMap<SetKey, u32> = HashMap::new();
        let mut table_ids: HashMap<TableKey, u32> = HashMap::new();
        let mut items = Vec::with_capacity(taken.len());

        for drawable in taken {
            let layout_key = drawable.bindings.layout_key();
            let layout = state.bindings.resolve_layout(&self.device, &layout_key);

            let set_key = SetKey {
                mesh: drawable.mesh,
                bindings: drawable.bindings.clone(),
            };
            let set = match set_ids.get(&set_key) {
                Some(&id) => id,
                None => {
                    let set = state.bindings.resolve_set(
                        &self.device,
                        assets,
                        set_key.clone(),
                        &layout,
                    )?;
                    let id = sets.len() as u32;
                    sets.push(set);
                    set_ids.insert(set_key, id);
                    id
                }
            };

            let resolved = drawable.pipeline.resolve(target_info)?;
            let pipeline_key = PipelineKey {
                spec: resolved,
                bindings: layout_key,
                textures: texture_layout_key.clone(),
            };
            let pipeline = match pipeline_ids.get(&pipeline_key) {
                Some(&id) => id,
                None => {
                    let handle = self
                        .pipelines
                        .lock()
                        .expect("pipeline cache poisoned")
                        .resolve(
                            &self.device,
                            assets,
                            pipeline_key.clone(),
                            &self.frame_layout,
                            &layout,
                            state.textures.layout(),
                        )?;
                    let id = pipelines.len() as u32;
                    pipelines.push(handle);
                    pipeline_ids.insert(pipeline_key, id);
                    id
                }
            };

            let table_key: TableKey = (drawable.mesh, drawable.textures.clone());
            let next_table_id = table_ids.len() as u32;
            let table_slot = *table_ids.entry(table_key).or_insert(next_table_id);

            items.push(BatchItem {
                pipeline,
                mesh: drawable.mesh,
                set,
                table_slot,
            });
        }

        Ok(ResolvedFrame {
            items,
            pipelines,
            sets,
        })
    }

    fn resolve_run_textures(
        &self,
        state: &mut EngineState,
        assets: &Assets,
        taken: &[Drawable],
        groups: &[PipelineGroup],
    ) -> Vec<Option<Arc<wgpu::BindGroup>>> {
        let TextureBinding::Classic(binder) = &mut state.textures else {
            return groups
                .iter()
                .flat_map(|group| group.runs.iter().map(|_| None))
                .collect();
        };

        groups
            .iter()
            .flat_map(|group| group.runs.iter())
            .map(|run| {
                let first = run.objects.first().copied()? as usize;
                let textures = &taken.get(first)?.textures;
                Some(binder.bind_group_for_run(&self.device, assets, textures))
            })
            .collect()
    }
}

struct ResolvedFrame {
    items: Vec<BatchItem>,
    pipelines: Vec<Arc<wgpu::RenderPipeline>>,
    sets: Vec<Arc<wgpu::BindGroup>>,
}
