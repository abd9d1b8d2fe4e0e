use crate::asset::{Handle, Mesh};

/// Per-drawable grouping facts, densified by the orchestrator: `pipeline`,
/// `set` and `table_slot` are first-seen-order ids for the resolved pipeline,
/// binding set and bindless key respectively.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchItem {
    pub pipeline: u32,
    pub mesh: Handle<Mesh>,
    pub set: u32,
    pub table_slot: u32,
}

/// A contiguous run of drawables sharing mesh and binding set (and bindless
/// key, in classic texture mode), drawn with one indirect multi-draw call.
#[derive(Debug, Clone)]
pub(crate) struct MeshRun {
    pub mesh: Handle<Mesh>,
    pub set: u32,
    pub table_slot: u32,
    /// Storage-buffer slots of the run's objects, in staged order.
    pub objects: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct PipelineGroup {
    pub pipeline: u32,
    pub runs: Vec<MeshRun>,
}

/// Stable partition of the taken drawables.
///
/// Groups appear in first-seen pipeline order and keep staged order inside;
/// within a group, maximal contiguous runs share (mesh, set). When
/// `split_textures` is set (classic texture binding) runs also split on the
/// bindless key, because the textures are bound per run instead of indexed
/// per object.
pub(crate) fn partition(items: &[BatchItem], split_textures: bool) -> Vec<PipelineGroup> {
    let mut groups: Vec<PipelineGroup> = Vec::new();
    let mut group_of_pipeline: Vec<Option<usize>> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let pipeline = item.pipeline as usize;
        if group_of_pipeline.len() <= pipeline {
            group_of_pipeline.resize(pipeline + 1, None);
        }

        let group_index = *group_of_pipeline[pipeline].get_or_insert_with(|| {
            groups.push(PipelineGroup {
                pipeline: item.pipeline,
                runs: Vec::new(),
            });
            groups.len() - 1
        });

        let runs = &mut groups[group_index].runs;
        let extend = runs.last().is_some_and(|run| {
            run.mesh == item.mesh
                && run.set == item.set
                && (!split_textures || run.table_slot == item.table_slot)
        });

        if extend {
            runs.last_mut().expect("run").objects.push(index as u32);
        } else {
            runs.push(MeshRun {
                mesh: item.mesh,
                set: item.set,
                table_slot: item.table_slot,
                objects: vec![index as u32],
            });
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pipeline: u32, mesh: u32, set: u32, table_slot: u32) -> BatchItem {
        BatchItem {
            pipeline,
            mesh: Handle::new(mesh),
            set,
            table_slot,
        }
    }

    #[test]
    fn shared_pipeline_and_mesh_collapse_to_one_run() {
        let items = vec![item(0, 0, 0, 0); 5];
        let groups = partition(&items, false);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].runs.len(), 1);
        assert_eq!(groups[0].runs[0].objects, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn groups_follow_first_seen_pipeline_order() {
        let items = vec![
            item(1, 0, 0, 0),
            item(0, 0, 0, 0),
            item(1, 0, 0, 0),
            item(0, 0, 0, 0),
        ];
        let groups = partition(&items, false);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pipeline, 1);
        assert_eq!(groups[1].pipeline, 0);
        // Staged relative order is preserved inside each group.
        assert_eq!(groups[0].runs[0].objects, vec![0, 2]);
        assert_eq!(groups[1].runs[0].objects, vec![1, 3]);
    }

    #[test]
    fn mesh_change_splits_runs() {
        let items = vec![
            item(0, 0, 0, 0),
            item(0, 0, 0, 0),
            item(0, 1, 1, 1),
            item(0, 0, 0, 0),
        ];
        let groups = partition(&items, false);

        assert_eq!(groups.len(), 1);
        let runs = &groups[0].runs;
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].objects, vec![0, 1]);
        assert_eq!(runs[1].objects, vec![2]);
        assert_eq!(runs[2].objects, vec![3]);
    }

    #[test]
    fn binding_set_change_splits_runs() {
        let items = vec![item(0, 0, 0, 0), item(0, 0, 1, 0)];
        let groups = partition(&items, false);

        assert_eq!(groups[0].runs.len(), 2);
    }

    #[test]
    fn texture_split_only_applies_in_classic_mode() {
        let items = vec![item(0, 0, 0, 0), item(0, 0, 0, 1)];

        let table_mode = partition(&items, false);
        assert_eq!(table_mode[0].runs.len(), 1);

        let classic_mode = partition(&items, true);
        assert_eq!(classic_mode[0].runs.len(), 2);
    }

    #[test]
    fn object_slots_match_staged_indices() {
        let items = vec![item(0, 0, 0, 0), item(1, 1, 1, 0), item(0, 0, 0, 0)];
        let groups = partition(&items, false);

        assert_eq!(groups[0].runs[0].objects, vec![0, 2]);
        assert_eq!(groups[1].runs[0].objects, vec![1]);
    }
}
