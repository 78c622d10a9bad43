//! Draw commands, blend functions and the program state they carry to the engine renderer.

use crate::{BlendMode, IndexRange, TextureHandle, VertexRange};
use glam::Mat4;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

pub const UNIFORM_NAME_MVP_MATRIX: &str = "u_MVPMatrix";
pub const UNIFORM_NAME_TEXTURE: &str = "u_tex0";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    pub const DISABLE: Self = Self::new(BlendFactor::One, BlendFactor::Zero);
    pub const ALPHA_PREMULTIPLIED: Self = Self::new(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
    pub const ALPHA_NON_PREMULTIPLIED: Self =
        Self::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    pub const ADDITIVE: Self = Self::new(BlendFactor::SrcAlpha, BlendFactor::One);

    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::ALPHA_PREMULTIPLIED
    }
}

/// Blend function for a slot blend mode. `normal` is the renderer's own blend function.
pub fn blend_func_for(mode: BlendMode, pma: bool, normal: BlendFunc) -> BlendFunc {
    match mode {
        BlendMode::Normal => normal,
        BlendMode::Additive => BlendFunc::new(
            if pma {
                BlendFactor::One
            } else {
                BlendFactor::SrcAlpha
            },
            BlendFactor::One,
        ),
        BlendMode::Multiply => BlendFunc::new(BlendFactor::DstColor, BlendFactor::OneMinusSrcAlpha),
        BlendMode::Screen => BlendFunc::new(BlendFactor::One, BlendFactor::OneMinusSrcColor),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ProgramKind {
    PositionTextureColor,
    TwoColor,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct UniformLocation(usize);

impl UniformLocation {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A shader program as far as command submission is concerned: its kind and uniform layout.
#[derive(Debug, PartialEq, Eq)]
pub struct Program {
    pub kind: ProgramKind,
    uniforms: Vec<&'static str>,
}

static POSITION_TEXTURE_COLOR: LazyLock<Arc<Program>> =
    LazyLock::new(|| Arc::new(Program::new(ProgramKind::PositionTextureColor)));
static TWO_COLOR: LazyLock<Arc<Program>> =
    LazyLock::new(|| Arc::new(Program::new(ProgramKind::TwoColor)));

impl Program {
    fn new(kind: ProgramKind) -> Self {
        Self {
            kind,
            uniforms: vec![UNIFORM_NAME_MVP_MATRIX, UNIFORM_NAME_TEXTURE],
        }
    }

    pub fn position_texture_color() -> Arc<Program> {
        Arc::clone(&POSITION_TEXTURE_COLOR)
    }

    pub fn two_color() -> Arc<Program> {
        Arc::clone(&TWO_COLOR)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|u| *u == name)
            .map(UniformLocation)
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Texture { unit: u32, texture: TextureHandle },
}

static NEXT_BATCH_ID: AtomicU32 = AtomicU32::new(1);

/// Uniform values bound to a program.
///
/// Clones share the batch id of the state they were cloned from; commands use it to decide
/// whether their cached pipeline state is still current.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramState {
    program: Arc<Program>,
    batch_id: u32,
    values: Vec<Option<UniformValue>>,
}

impl ProgramState {
    pub fn new(program: Arc<Program>) -> Self {
        let values = vec![None; program.uniform_count()];
        Self {
            program,
            batch_id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
            values,
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn batch_id(&self) -> u32 {
        self.batch_id
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.program.uniform_location(name)
    }

    pub fn set_uniform(&mut self, location: UniformLocation, value: Mat4) {
        self.values[location.0] = Some(UniformValue::Mat4(value));
    }

    pub fn set_texture(&mut self, location: UniformLocation, unit: u32, texture: TextureHandle) {
        self.values[location.0] = Some(UniformValue::Texture { unit, texture });
    }

    pub fn uniform(&self, location: UniformLocation) -> Option<&UniformValue> {
        self.values.get(location.0)?.as_ref()
    }
}

/// Index into the command pool of a [`SkeletonBatch`](crate::SkeletonBatch).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

impl CommandId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Geometry of one draw: indices are relative to the start of `vertices`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Triangles {
    pub vertices: VertexRange,
    pub indices: IndexRange,
}

/// A pooled triangles command. Fields are overwritten on every use; the pipeline state survives
/// across frames so it can be reused when the same program draws again.
#[derive(Clone, Debug, Default)]
pub struct SkeletonCommand {
    pub global_order: f32,
    pub texture: Option<TextureHandle>,
    pub blend_func: BlendFunc,
    pub triangles: Triangles,
    pub model_view: Mat4,
    pub flags: u32,
    pipeline: Option<ProgramState>,
    loc_mvp: Option<UniformLocation>,
    loc_texture: Option<UniformLocation>,
    material_id: u64,
}

impl SkeletonCommand {
    pub(crate) fn init(
        &mut self,
        global_order: f32,
        texture: TextureHandle,
        blend_func: BlendFunc,
        triangles: Triangles,
        model_view: Mat4,
        flags: u32,
    ) {
        self.global_order = global_order;
        self.texture = Some(texture);
        self.blend_func = blend_func;
        self.triangles = triangles;
        self.model_view = model_view;
        self.flags = flags;

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        texture.hash(&mut hasher);
        blend_func.hash(&mut hasher);
        self.pipeline.as_ref().map(ProgramState::batch_id).hash(&mut hasher);
        self.material_id = hasher.finish();
    }

    /// Replaces the cached pipeline state with a clone of `state` unless it already came from a
    /// state with the same batch id. Returns whether it was rebuilt.
    pub(crate) fn update_pipeline(&mut self, state: &ProgramState) -> bool {
        if self
            .pipeline
            .as_ref()
            .is_some_and(|current| current.batch_id == state.batch_id)
        {
            return false;
        }
        let pipeline = state.clone();
        self.loc_mvp = pipeline.uniform_location(UNIFORM_NAME_MVP_MATRIX);
        self.loc_texture = pipeline.uniform_location(UNIFORM_NAME_TEXTURE);
        self.pipeline = Some(pipeline);
        true
    }

    /// Writes the projection and texture uniforms of the cached pipeline state.
    pub(crate) fn bind(&mut self, projection: Mat4, texture: TextureHandle) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if let Some(loc) = self.loc_mvp {
            pipeline.set_uniform(loc, projection);
        }
        if let Some(loc) = self.loc_texture {
            pipeline.set_texture(loc, 0, texture);
        }
    }

    pub fn pipeline(&self) -> Option<&ProgramState> {
        self.pipeline.as_ref()
    }

    /// Projection matrix bound at submission.
    pub fn projection(&self) -> Option<Mat4> {
        match self.pipeline.as_ref()?.uniform(self.loc_mvp?)? {
            UniformValue::Mat4(m) => Some(*m),
            UniformValue::Texture { .. } => None,
        }
    }

    /// Commands with equal material ids can be drawn in one call.
    pub fn material_id(&self) -> u64 {
        self.material_id
    }

    pub fn vertex_count(&self) -> usize {
        self.triangles.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.triangles.indices.len()
    }
}

/// The engine renderer's command queue.
pub trait RenderQueue {
    fn add_command(&mut self, global_order: f32, command: CommandId);
}

/// Records submitted commands and yields them in global order, stable within an order.
#[derive(Debug, Default, Clone)]
pub struct CommandQueue {
    entries: Vec<(f32, CommandId)>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Takes every queued command, sorted by global order.
    pub fn drain_sorted(&mut self) -> Vec<CommandId> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        entries.into_iter().map(|(_, id)| id).collect()
    }
}

impl RenderQueue for CommandQueue {
    fn add_command(&mut self, global_order: f32, command: CommandId) {
        self.entries.push((global_order, command));
    }
}
