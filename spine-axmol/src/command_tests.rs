use crate::{
    BlendFactor, BlendFunc, BlendMode, CommandId, CommandQueue, Program, ProgramKind,
    ProgramState, RenderQueue, SkeletonCommand, TextureHandle, Triangles, UNIFORM_NAME_MVP_MATRIX,
    UNIFORM_NAME_TEXTURE, UniformLocation, UniformValue, blend_func_for,
};
use glam::Mat4;
use std::sync::Arc;

#[test]
fn slot_blend_modes_map_like_the_engine() {
    let normal = BlendFunc::ALPHA_NON_PREMULTIPLIED;
    assert_eq!(blend_func_for(BlendMode::Normal, true, normal), normal);
    assert_eq!(
        blend_func_for(BlendMode::Additive, true, normal),
        BlendFunc::new(BlendFactor::One, BlendFactor::One)
    );
    assert_eq!(
        blend_func_for(BlendMode::Additive, false, normal),
        BlendFunc::ADDITIVE
    );
    assert_eq!(
        blend_func_for(BlendMode::Multiply, false, normal),
        BlendFunc::new(BlendFactor::DstColor, BlendFactor::OneMinusSrcAlpha)
    );
    assert_eq!(
        blend_func_for(BlendMode::Screen, true, normal),
        BlendFunc::new(BlendFactor::One, BlendFactor::OneMinusSrcColor)
    );
}

#[test]
fn builtin_programs_are_shared_and_expose_uniforms() {
    let a = Program::position_texture_color();
    let b = Program::position_texture_color();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(
        a.uniform_location(UNIFORM_NAME_MVP_MATRIX).map(UniformLocation::index),
        Some(0)
    );
    assert!(a.uniform_location(UNIFORM_NAME_TEXTURE).is_some());
    assert!(a.uniform_location("u_missing").is_none());
    assert_eq!(Program::two_color().kind, ProgramKind::TwoColor);
}

#[test]
fn cloned_program_state_keeps_batch_id() {
    let state = ProgramState::new(Program::two_color());
    let other = ProgramState::new(Program::two_color());
    assert_eq!(state.clone().batch_id(), state.batch_id());
    assert_ne!(state.batch_id(), other.batch_id());
}

#[test]
fn update_pipeline_rebuilds_only_on_new_batch_id() {
    let state = ProgramState::new(Program::position_texture_color());
    let mut command = SkeletonCommand::default();
    assert!(command.update_pipeline(&state));
    assert!(!command.update_pipeline(&state.clone()));
    assert!(command.update_pipeline(&ProgramState::new(Program::position_texture_color())));
}

#[test]
fn bind_writes_projection_and_texture() {
    let state = ProgramState::new(Program::position_texture_color());
    let texture = TextureHandle::new(5).unwrap();
    let mut command = SkeletonCommand::default();
    command.bind(Mat4::IDENTITY, texture);
    assert_eq!(command.projection(), None);

    command.update_pipeline(&state);
    let projection = Mat4::from_scale(glam::Vec3::new(2.0, 2.0, 1.0));
    command.bind(projection, texture);
    assert_eq!(command.projection(), Some(projection));
    let pipeline = command.pipeline().unwrap();
    let loc = pipeline.uniform_location(UNIFORM_NAME_TEXTURE).unwrap();
    assert_eq!(
        pipeline.uniform(loc),
        Some(&UniformValue::Texture { unit: 0, texture })
    );
}

#[test]
fn queue_sorts_by_global_order_stably() {
    let mut queue = CommandQueue::new();
    queue.add_command(1.0, CommandId(0));
    queue.add_command(-2.0, CommandId(1));
    queue.add_command(1.0, CommandId(2));
    queue.add_command(0.0, CommandId(3));
    assert_eq!(queue.len(), 4);
    assert_eq!(
        queue.drain_sorted(),
        vec![CommandId(1), CommandId(3), CommandId(0), CommandId(2)]
    );
    assert!(queue.is_empty());
}

#[test]
fn material_id_tracks_texture_and_blend() {
    let state = ProgramState::new(Program::position_texture_color());
    let t1 = TextureHandle::new(1).unwrap();
    let t2 = TextureHandle::new(2).unwrap();
    let mut a = SkeletonCommand::default();
    let mut b = SkeletonCommand::default();
    a.update_pipeline(&state);
    b.update_pipeline(&state);

    a.init(0.0, t1, BlendFunc::ALPHA_PREMULTIPLIED, Triangles::default(), Mat4::IDENTITY, 0);
    b.init(0.0, t1, BlendFunc::ALPHA_PREMULTIPLIED, Triangles::default(), Mat4::IDENTITY, 0);
    assert_eq!(a.material_id(), b.material_id());

    b.init(0.0, t2, BlendFunc::ALPHA_PREMULTIPLIED, Triangles::default(), Mat4::IDENTITY, 0);
    assert_ne!(a.material_id(), b.material_id());
    b.init(0.0, t1, BlendFunc::ADDITIVE, Triangles::default(), Mat4::IDENTITY, 0);
    assert_ne!(a.material_id(), b.material_id());
}
