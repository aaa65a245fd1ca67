pub mod batch;
mod vertex;
mod voxel_mesh;

pub use vertex::*;
pub use voxel_mesh::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;
use tracing::info;
use ultraviolet::Vec3;

use crate::error::RendererResult;
use crate::transform::Transform;
use crate::vulkan::buffer::Buffer;
use crate::vulkan::command_pool::CommandPool;
use crate::vulkan::context::Context;

/// Scene-assigned voxel identity. Handles are handed out monotonically
/// and never reused within a session.
pub type VoxelHandle = u32;

pub struct Voxel {
    pub mesh: VoxelMesh,
    pub transform: Transform,
}

/// The merged, GPU-resident batch buffers. The scene exclusively owns
/// their memory; rendering only borrows the handles for binding.
pub struct SceneBuffers {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
}

pub struct Scene {
    voxels: BTreeMap<VoxelHandle, Voxel>,
    next_handle: VoxelHandle,

    buffers: Option<SceneBuffers>,
    index_count: u32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            voxels: BTreeMap::new(),
            next_handle: 0,
            buffers: None,
            index_count: 0,
        }
    }

    /// Unit white cube at the given position.
    pub fn add_voxel(&mut self, position: Vec3) -> VoxelHandle {
        self.add_voxel_with(
            VoxelMesh::unit_cube(Vec3::one()),
            Transform::from_translation(position),
        )
    }

    pub fn add_voxel_with(&mut self, mesh: VoxelMesh, transform: Transform) -> VoxelHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.voxels.insert(handle, Voxel { mesh, transform });
        handle
    }

    pub fn remove_voxel(&mut self, handle: VoxelHandle) -> Option<Voxel> {
        self.voxels.remove(&handle)
    }

    pub fn transform_mut(&mut self, handle: VoxelHandle) -> Option<&mut Transform> {
        self.voxels.get_mut(&handle).map(|voxel| &mut voxel.transform)
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn buffers(&self) -> Option<&SceneBuffers> {
        self.buffers.as_ref()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Merges every voxel into fresh batch buffers, replacing the previous
    /// ones wholesale. Must only be called while no submitted frame still
    /// references the old buffers; the device-idle wait below makes any
    /// call site safe at the cost of a full stall.
    pub fn rebuild(&mut self, context: &Arc<Context>, command_pool: &CommandPool) -> RendererResult<()> {
        let batch = batch::merge(self.voxels.values());

        // The old buffers may still be bound by in-flight command buffers.
        unsafe { context.device.device_wait_idle() }?;
        self.buffers = None;
        self.index_count = 0;

        if batch.is_empty() {
            info!("rebuilt scene batch: empty scene, draw count 0");
            return Ok(());
        }

        let vertex_buffer = Buffer::upload(
            context,
            command_pool,
            &batch.vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = Buffer::upload(
            context,
            command_pool,
            &batch.indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        self.index_count = batch.index_count();
        self.buffers = Some(SceneBuffers {
            vertex_buffer,
            index_buffer,
        });

        info!(
            voxels = self.voxels.len(),
            vertices = batch.vertices.len(),
            indices = batch.indices.len(),
            "rebuilt scene batch buffers"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_monotonic_and_never_reused() {
        let mut scene = Scene::new();
        let a = scene.add_voxel(Vec3::zero());
        let b = scene.add_voxel(Vec3::unit_x());
        assert!(b > a);

        scene.remove_voxel(a);
        let c = scene.add_voxel(Vec3::unit_y());
        assert!(c > b, "removal must not recycle handles");
    }

    #[test]
    fn transform_of_a_live_voxel_can_be_mutated() {
        let mut scene = Scene::new();
        let handle = scene.add_voxel(Vec3::zero());

        scene.transform_mut(handle).unwrap().translation = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(
            scene.transform_mut(handle).unwrap().translation,
            Vec3::new(1.0, 2.0, 3.0)
        );

        scene.remove_voxel(handle);
        assert!(scene.transform_mut(handle).is_none());
    }

    #[test]
    fn a_new_scene_draws_nothing() {
        let scene = Scene::new();
        assert!(scene.is_empty());
        assert_eq!(scene.index_count(), 0);
        assert!(scene.buffers().is_none());
    }
}
