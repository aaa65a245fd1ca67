use crate::transform::Transform;

use super::voxel_mesh::{INDICES_PER_VOXEL, VERTICES_PER_VOXEL};
use super::{Vertex, Voxel};

/// Host-side result of merging every voxel into one vertex and one index
/// sequence. Object `i` (in iteration order) owns vertex block
/// `[8i, 8i+8)` and index block `[36i, 36i+36)`; its indices are offset
/// by `8i` so they address its own block inside the merged buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl BatchData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Merges the voxels in iteration order, baking each voxel's transform
/// into its vertex positions. Color and texture coordinates pass through
/// verbatim. O(n) in the number of voxels.
pub fn merge<'a>(voxels: impl ExactSizeIterator<Item = &'a Voxel>) -> BatchData {
    let count = voxels.len();
    let mut vertices = Vec::with_capacity(count * VERTICES_PER_VOXEL);
    let mut indices = Vec::with_capacity(count * INDICES_PER_VOXEL);

    for (i, voxel) in voxels.enumerate() {
        let base_vertex = (i * VERTICES_PER_VOXEL) as u32;

        for local in voxel.mesh.vertices() {
            vertices.push(transformed_vertex(local, &voxel.transform));
        }
        for &local_index in voxel.mesh.indices() {
            indices.push(local_index + base_vertex);
        }
    }

    BatchData { vertices, indices }
}

fn transformed_vertex(local: &Vertex, transform: &Transform) -> Vertex {
    let position = transform.transform_point(local.position.into());
    Vertex {
        position: [position.x, position.y, position.z],
        color: local.color,
        tex_coord: local.tex_coord,
    }
}

#[cfg(test)]
mod tests {
    use ultraviolet::Vec3;

    use crate::scene::VoxelMesh;

    use super::*;

    fn voxel_at(position: Vec3) -> Voxel {
        Voxel {
            mesh: VoxelMesh::unit_cube(Vec3::one()),
            transform: Transform::from_translation(position),
        }
    }

    #[test]
    fn counts_scale_with_the_number_of_voxels() {
        for k in 0..5 {
            let voxels: Vec<_> = (0..k).map(|i| voxel_at(Vec3::new(i as f32, 0.0, 0.0))).collect();
            let batch = merge(voxels.iter());
            assert_eq!(batch.vertices.len(), k * VERTICES_PER_VOXEL);
            assert_eq!(batch.indices.len(), k * INDICES_PER_VOXEL);
            assert_eq!(batch.index_count(), (k * INDICES_PER_VOXEL) as u32);
        }
    }

    #[test]
    fn every_index_addresses_the_merged_vertex_range() {
        let voxels: Vec<_> = (0..7).map(|i| voxel_at(Vec3::new(0.0, i as f32, 0.0))).collect();
        let batch = merge(voxels.iter());
        let vertex_count = batch.vertices.len() as u32;
        assert!(batch.indices.iter().all(|&i| i < vertex_count));
    }

    #[test]
    fn each_voxel_owns_its_own_index_block() {
        let voxels: Vec<_> = (0..4).map(|i| voxel_at(Vec3::new(i as f32, 0.0, 0.0))).collect();
        let batch = merge(voxels.iter());

        for (i, block) in batch.indices.chunks(INDICES_PER_VOXEL).enumerate() {
            let lo = (i * VERTICES_PER_VOXEL) as u32;
            let hi = lo + VERTICES_PER_VOXEL as u32;
            assert!(
                block.iter().all(|&index| index >= lo && index < hi),
                "voxel {i} references vertices outside [{lo}, {hi})"
            );
        }
    }

    #[test]
    fn transforms_are_baked_and_attributes_pass_through() {
        let mesh = VoxelMesh::new(1.0, 1.0, 1.0, Vec3::new(0.3, 0.6, 0.9));
        let transform = Transform {
            translation: Vec3::new(2.0, -1.0, 4.0),
            rotation: Vec3::zero(),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let voxel = Voxel {
            mesh: mesh.clone(),
            transform: transform.clone(),
        };

        let batch = merge(std::slice::from_ref(&voxel).iter());
        for (merged, local) in batch.vertices.iter().zip(mesh.vertices()) {
            let expected = transform.transform_point(local.position.into());
            assert_eq!(merged.position, [expected.x, expected.y, expected.z]);
            assert_eq!(merged.color, local.color);
            assert_eq!(merged.tex_coord, local.tex_coord);
        }
    }

    #[test]
    fn merging_twice_yields_identical_output() {
        let voxels: Vec<_> = (0..3).map(|i| voxel_at(Vec3::new(i as f32, 1.0, -2.0))).collect();
        let first = merge(voxels.iter());
        let second = merge(voxels.iter());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_scene_yields_a_zero_draw() {
        let voxels: Vec<Voxel> = Vec::new();
        let batch = merge(voxels.iter());
        assert!(batch.is_empty());
        assert_eq!(batch.index_count(), 0);
    }

    #[test]
    fn two_unit_cubes_end_to_end() {
        let voxels = vec![voxel_at(Vec3::new(0.0, 1.0, 0.0)), voxel_at(Vec3::new(5.0, 0.0, 0.0))];
        let batch = merge(voxels.iter());

        assert_eq!(batch.vertices.len(), 16);
        assert_eq!(batch.indices.len(), 72);
        // Vertex 0 of the second voxel: local (0,0,0) translated to (5,0,0).
        assert_eq!(batch.vertices[8].position, [5.0, 0.0, 0.0]);
    }
}
