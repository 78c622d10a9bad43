use crate::{
    BatchConfig, BlendFunc, CommandParams, CommandQueue, FrameListener, Program, ProgramState,
    SkeletonBatch, TextureHandle, Triangles, Vertex,
};
use glam::Mat4;

fn empty_batch() -> SkeletonBatch {
    SkeletonBatch::with_config(BatchConfig {
        initial_commands: 4,
        ..BatchConfig::default()
    })
}

fn texture(id: u32) -> TextureHandle {
    TextureHandle::new(id).unwrap()
}

fn quad(batch: &mut SkeletonBatch) -> Triangles {
    let vertices = batch.allocate_vertices(4);
    let indices = batch.allocate_indices(6);
    batch
        .indices_mut(indices)
        .copy_from_slice(&[0, 1, 2, 2, 3, 0]);
    Triangles { vertices, indices }
}

fn params(texture: TextureHandle, triangles: Triangles) -> CommandParams<'static> {
    CommandParams {
        global_order: 0.0,
        texture,
        program_state: None,
        blend_func: BlendFunc::ALPHA_PREMULTIPLIED,
        triangles,
        model_view: Mat4::IDENTITY,
        flags: 0,
    }
}

#[test]
fn vertex_growth_follows_doubling_rule() {
    let mut batch = empty_batch();

    let first = batch.allocate_vertices(100);
    assert_eq!(first.offset(), 0);
    assert_eq!(batch.stats().vertex_capacity, 201);
    assert_eq!(batch.stats().used_vertices, 100);

    let second = batch.allocate_vertices(50);
    assert_eq!(second.offset(), 100);
    assert_eq!(batch.stats().vertex_capacity, 201);
    assert_eq!(batch.stats().used_vertices, 150);

    batch.allocate_vertices(60);
    assert_eq!(batch.stats().vertex_capacity, (201 + 60) * 2 + 1);
    assert_eq!(batch.stats().used_vertices, 210);
}

#[test]
fn index_growth_follows_doubling_rule() {
    let mut batch = empty_batch();
    batch.allocate_indices(6);
    assert_eq!(batch.stats().index_capacity, 13);
    batch.allocate_indices(7);
    assert_eq!(batch.stats().index_capacity, 13);
    batch.allocate_indices(1);
    assert_eq!(batch.stats().index_capacity, 29);
}

#[test]
fn usage_never_exceeds_capacity() {
    let mut batch = empty_batch();
    for n in [1, 7, 300, 2, 4096, 0, 33] {
        batch.allocate_vertices(n);
        batch.allocate_indices(n * 3 / 2);
        let stats = batch.stats();
        assert!(stats.used_vertices <= stats.vertex_capacity);
        assert!(stats.used_indices <= stats.index_capacity);
    }
}

#[test]
fn growth_preserves_written_values() {
    let mut batch = empty_batch();
    let range = batch.allocate_vertices(3);
    for (i, v) in batch.vertices_mut(range).iter_mut().enumerate() {
        v.position = [i as f32, 1.0, 0.0];
        v.color = [255, 0, 0, 255];
    }
    let indices = batch.allocate_indices(3);
    batch.indices_mut(indices).copy_from_slice(&[2, 1, 0]);

    batch.allocate_vertices(1000);
    batch.allocate_indices(1000);

    let vertices = batch.vertices(range);
    assert_eq!(vertices[2].position, [2.0, 1.0, 0.0]);
    assert_eq!(vertices[0].color, [255, 0, 0, 255]);
    assert_eq!(batch.indices(indices), &[2, 1, 0]);
}

#[test]
fn deallocate_trims_back_the_last_allocation() {
    let mut batch = empty_batch();
    batch.allocate_vertices(10);
    batch.deallocate_vertices(4);
    assert_eq!(batch.allocate_vertices(1).offset(), 6);

    batch.allocate_indices(12);
    batch.deallocate_indices(12);
    assert_eq!(batch.stats().used_indices, 0);
}

#[test]
#[should_panic]
fn over_release_panics() {
    let mut batch = empty_batch();
    batch.allocate_vertices(2);
    batch.deallocate_vertices(3);
}

#[test]
fn reset_keeps_capacity_and_rewinds() {
    let mut batch = empty_batch();
    batch.allocate_vertices(100);
    batch.allocate_indices(150);
    batch.next_free_command();
    let generation = batch.generation();

    batch.after_draw();

    let stats = batch.stats();
    assert_eq!(stats.used_vertices, 0);
    assert_eq!(stats.used_indices, 0);
    assert_eq!(stats.commands_in_use, 0);
    assert_eq!(stats.vertex_capacity, 201);
    assert_eq!(stats.index_capacity, 301);
    assert_eq!(batch.generation(), generation + 1);
    assert_eq!(batch.allocate_vertices(5).offset(), 0);
}

#[test]
#[should_panic]
fn range_from_previous_frame_is_rejected() {
    let mut batch = empty_batch();
    let range = batch.allocate_vertices(4);
    batch.reset();
    let _ = batch.vertices(range);
}

#[test]
fn command_pool_grows_past_initial_size() {
    let mut batch = SkeletonBatch::new();
    assert_eq!(batch.stats().command_capacity, 10000);
    for _ in 0..10000 {
        batch.next_free_command();
    }
    assert_eq!(batch.stats().command_capacity, 10000);
    let id = batch.next_free_command();
    assert_eq!(id.index(), 10000);
    assert_eq!(batch.stats().command_capacity, 20001);
}

#[test]
fn add_command_submits_and_binds_uniforms() {
    let mut batch = empty_batch();
    let mut queue = CommandQueue::new();
    let projection = Mat4::orthographic_rh(0.0, 800.0, 0.0, 600.0, -1.0, 1.0);
    let triangles = quad(&mut batch);

    let id = batch.add_command(&mut queue, projection, params(texture(9), triangles));

    assert_eq!(queue.drain_sorted(), vec![id]);
    let command = batch.command(id);
    assert_eq!(command.texture, Some(texture(9)));
    assert_eq!(command.triangles, triangles);
    assert_eq!(command.projection(), Some(projection));
    assert_eq!(
        command.pipeline().map(ProgramState::batch_id),
        Some(batch.default_program_state().batch_id())
    );
}

#[test]
fn pipeline_state_is_reused_until_program_changes() {
    let mut batch = empty_batch();
    let mut queue = CommandQueue::new();
    let two_color = ProgramState::new(Program::two_color());

    for _ in 0..3 {
        let triangles = quad(&mut batch);
        batch.add_command(&mut queue, Mat4::IDENTITY, params(texture(1), triangles));
        batch.reset();
    }
    assert_eq!(batch.stats().pipeline_rebuilds, 1);

    let triangles = quad(&mut batch);
    let with_program = CommandParams {
        program_state: Some(&two_color),
        ..params(texture(1), triangles)
    };
    batch.add_command(&mut queue, Mat4::IDENTITY, with_program);
    assert_eq!(batch.stats().pipeline_rebuilds, 2);
}

#[test]
fn contiguous_draws_with_same_state_merge() {
    let mut batch = empty_batch();
    let mut queue = CommandQueue::new();
    let first = quad(&mut batch);
    let id = batch.add_command(&mut queue, Mat4::IDENTITY, params(texture(1), first));

    let second = quad(&mut batch);
    assert!(batch.try_merge(id, &params(texture(1), second)));

    let merged = batch.command(id).triangles;
    assert_eq!(merged.vertices.len(), 8);
    assert_eq!(merged.indices.len(), 12);
    assert_eq!(
        batch.indices(merged.indices),
        &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
    );

    let third = quad(&mut batch);
    assert!(!batch.try_merge(id, &params(texture(2), third)));
}

#[test]
fn default_vertex_is_zeroed() {
    let v = Vertex::default();
    assert_eq!(v.color, [0; 4]);
    assert_eq!(v.uv, [0.0; 2]);
}
