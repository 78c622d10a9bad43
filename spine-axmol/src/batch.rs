//! Frame arena for skeleton geometry plus the pool of reusable draw commands.

use crate::{
    BlendFunc, CommandId, Program, ProgramState, RenderQueue, SkeletonCommand, TextureHandle,
    Triangles,
};
use glam::Mat4;
use std::fmt;
use std::marker::PhantomData;

const INITIAL_COMMANDS: usize = 10000;

/// Largest vertex count a single command may address with 16-bit indices.
pub const MAX_COMMAND_VERTICES: usize = u16::MAX as usize + 1;

/// Vertex layout shared by every skeleton draw.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub dark_color: [u8; 4],
    pub uv: [f32; 2],
}

/// A sub-allocation of one of the batch buffers, valid for the frame it was allocated in.
pub struct Range<T> {
    offset: u32,
    len: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

pub type VertexRange = Range<Vertex>;
pub type IndexRange = Range<u16>;

impl<T> Range<T> {
    fn new(offset: usize, len: usize, generation: u32) -> Self {
        Self {
            offset: offset as u32,
            len: len as u32,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.offset() + self.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Keeps the first `len` elements.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len as u32);
    }

    fn as_range(&self) -> std::ops::Range<usize> {
        self.offset()..self.end()
    }
}

impl<T> Clone for Range<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Range<T> {}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl<T> PartialEq for Range<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.len == other.len && self.generation == other.generation
    }
}

impl<T> Eq for Range<T> {}

impl<T> fmt::Debug for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Initial sizes of the batch buffers and command pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct BatchConfig {
    pub initial_commands: usize,
    pub initial_vertices: usize,
    pub initial_indices: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_commands: INITIAL_COMMANDS,
            initial_vertices: 0,
            initial_indices: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub vertex_capacity: usize,
    pub index_capacity: usize,
    pub used_vertices: usize,
    pub used_indices: usize,
    pub command_capacity: usize,
    pub commands_in_use: usize,
    pub pipeline_rebuilds: u64,
}

/// Called by the engine once a frame has been fully drawn.
pub trait FrameListener {
    fn after_draw(&mut self);
}

/// Everything [`SkeletonBatch::add_command`] needs besides the projection.
#[derive(Clone, Copy, Debug)]
pub struct CommandParams<'a> {
    pub global_order: f32,
    pub texture: TextureHandle,
    /// `None` draws with the batch's default program.
    pub program_state: Option<&'a ProgramState>,
    pub blend_func: BlendFunc,
    pub triangles: Triangles,
    pub model_view: Mat4,
    pub flags: u32,
}

/// Shared per-frame storage for all skeletons drawn in a frame.
///
/// Buffers only grow; [`reset`](Self::reset) rewinds them (and the command cursor) once the
/// frame's commands have been consumed. Ranges handed out before a reset must not be used after.
pub struct SkeletonBatch {
    vertices: Vec<Vertex>,
    used_vertices: usize,
    indices: Vec<u16>,
    used_indices: usize,
    commands: Vec<SkeletonCommand>,
    next_free_command: usize,
    program_state: ProgramState,
    generation: u32,
    pipeline_rebuilds: u64,
}

impl Default for SkeletonBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SkeletonBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkeletonBatch")
            .field("stats", &self.stats())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl SkeletonBatch {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        let mut commands = Vec::new();
        commands.resize_with(config.initial_commands, SkeletonCommand::default);
        Self {
            vertices: vec![Vertex::default(); config.initial_vertices],
            used_vertices: 0,
            indices: vec![0; config.initial_indices],
            used_indices: 0,
            commands,
            next_free_command: 0,
            program_state: ProgramState::new(Program::position_texture_color()),
            generation: 0,
            pipeline_rebuilds: 0,
        }
    }

    /// Program state used by commands submitted without one.
    pub fn default_program_state(&self) -> &ProgramState {
        &self.program_state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn allocate_vertices(&mut self, count: usize) -> VertexRange {
        if self.vertices.len() - self.used_vertices < count {
            let capacity = (self.vertices.len() + count) * 2 + 1;
            log::debug!(
                "growing skeleton vertex buffer {} -> {capacity}",
                self.vertices.len()
            );
            self.vertices.resize(capacity, Vertex::default());
        }
        let range = Range::new(self.used_vertices, count, self.generation);
        self.used_vertices += count;
        range
    }

    /// Returns the last `count` allocated vertices to the arena.
    pub fn deallocate_vertices(&mut self, count: usize) {
        assert!(
            count <= self.used_vertices,
            "releasing {count} vertices with {} in use",
            self.used_vertices
        );
        self.used_vertices -= count;
    }

    pub fn allocate_indices(&mut self, count: usize) -> IndexRange {
        if self.indices.len() - self.used_indices < count {
            let capacity = (self.indices.len() + count) * 2 + 1;
            log::debug!(
                "growing skeleton index buffer {} -> {capacity}",
                self.indices.len()
            );
            self.indices.resize(capacity, 0);
        }
        let range = Range::new(self.used_indices, count, self.generation);
        self.used_indices += count;
        range
    }

    /// Returns the last `count` allocated indices to the arena.
    pub fn deallocate_indices(&mut self, count: usize) {
        assert!(
            count <= self.used_indices,
            "releasing {count} indices with {} in use",
            self.used_indices
        );
        self.used_indices -= count;
    }

    fn check_generation<T>(&self, range: &Range<T>) {
        assert_eq!(
            range.generation, self.generation,
            "range from frame {} used in frame {}",
            range.generation, self.generation
        );
    }

    pub fn vertices(&self, range: VertexRange) -> &[Vertex] {
        self.check_generation(&range);
        &self.vertices[range.as_range()]
    }

    pub fn vertices_mut(&mut self, range: VertexRange) -> &mut [Vertex] {
        self.check_generation(&range);
        &mut self.vertices[range.as_range()]
    }

    pub fn indices(&self, range: IndexRange) -> &[u16] {
        self.check_generation(&range);
        &self.indices[range.as_range()]
    }

    pub fn indices_mut(&mut self, range: IndexRange) -> &mut [u16] {
        self.check_generation(&range);
        &mut self.indices[range.as_range()]
    }

    pub fn next_free_command(&mut self) -> CommandId {
        if self.commands.len() <= self.next_free_command {
            let capacity = self.commands.len() * 2 + 1;
            log::debug!(
                "growing skeleton command pool {} -> {capacity}",
                self.commands.len()
            );
            self.commands.resize_with(capacity, SkeletonCommand::default);
        }
        let id = CommandId(self.next_free_command);
        self.next_free_command += 1;
        id
    }

    pub fn command(&self, id: CommandId) -> &SkeletonCommand {
        &self.commands[id.0]
    }

    pub fn command_mut(&mut self, id: CommandId) -> &mut SkeletonCommand {
        &mut self.commands[id.0]
    }

    /// Commands handed out since the last reset, in submission order.
    pub fn commands_in_use(&self) -> impl Iterator<Item = (CommandId, &SkeletonCommand)> {
        self.commands[..self.next_free_command]
            .iter()
            .enumerate()
            .map(|(i, c)| (CommandId(i), c))
    }

    /// Fills a pooled command and submits it to `queue`.
    ///
    /// The command's cached pipeline state is rebuilt only when the program state differs from
    /// the one it was last built from; the projection and texture are bound every time.
    pub fn add_command(
        &mut self,
        queue: &mut dyn RenderQueue,
        projection: Mat4,
        params: CommandParams<'_>,
    ) -> CommandId {
        let id = self.next_free_command();
        let state = params.program_state.unwrap_or(&self.program_state);
        let command = &mut self.commands[id.0];
        if command.update_pipeline(state) {
            self.pipeline_rebuilds += 1;
            log::trace!(
                "rebuilt pipeline state of command {} for batch id {}",
                id.0,
                state.batch_id()
            );
        }
        command.bind(projection, params.texture);
        command.init(
            params.global_order,
            params.texture,
            params.blend_func,
            params.triangles,
            params.model_view,
            params.flags,
        );
        queue.add_command(params.global_order, id);
        id
    }

    /// Appends `params.triangles` to command `id` when both draw with the same state and the
    /// geometry directly follows the command's. Merged indices are rebased onto the command's
    /// vertex range.
    pub fn try_merge(&mut self, id: CommandId, params: &CommandParams<'_>) -> bool {
        let state = params.program_state.unwrap_or(&self.program_state);
        let command = &self.commands[id.0];
        let triangles = params.triangles;
        let same_state = command.texture == Some(params.texture)
            && command.blend_func == params.blend_func
            && command.global_order == params.global_order
            && command.model_view == params.model_view
            && command.flags == params.flags
            && command.pipeline().map(ProgramState::batch_id) == Some(state.batch_id());
        let current = command.triangles;
        if !same_state
            || current.vertices.generation != self.generation
            || current.vertices.end() != triangles.vertices.offset()
            || current.indices.end() != triangles.indices.offset()
            || current.vertices.len() + triangles.vertices.len() > MAX_COMMAND_VERTICES
        {
            return false;
        }

        let base = current.vertices.len() as u16;
        for index in self.indices_mut(triangles.indices) {
            *index += base;
        }
        let merged = &mut self.commands[id.0].triangles;
        merged.vertices.len += triangles.vertices.len;
        merged.indices.len += triangles.indices.len;
        true
    }

    /// Rewinds the arena and the command pool; capacity is kept.
    pub fn reset(&mut self) {
        self.next_free_command = 0;
        self.used_vertices = 0;
        self.used_indices = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats {
            vertex_capacity: self.vertices.len(),
            index_capacity: self.indices.len(),
            used_vertices: self.used_vertices,
            used_indices: self.used_indices,
            command_capacity: self.commands.len(),
            commands_in_use: self.next_free_command,
            pipeline_rebuilds: self.pipeline_rebuilds,
        }
    }
}

impl FrameListener for SkeletonBatch {
    fn after_draw(&mut self) {
        self.reset();
    }
}
