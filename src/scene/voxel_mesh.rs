use ultraviolet::Vec3;

use super::Vertex;

/// Local vertex count of a single cuboid. The batch builder's offset
/// arithmetic depends on these exact values.
pub const VERTICES_PER_VOXEL: usize = 8;
pub const INDICES_PER_VOXEL: usize = 36;

/// Fixed-topology cuboid mesh: 8 corner vertices and 12 triangles
/// (2 per face), wound so every face points outward.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelMesh {
    vertices: [Vertex; VERTICES_PER_VOXEL],
    indices: [u32; INDICES_PER_VOXEL],
}

impl VoxelMesh {
    /// Cuboid spanning [0,length] x [0,height] x [0,width] with a uniform
    /// vertex color.
    pub fn new(length: f32, width: f32, height: f32, color: Vec3) -> Self {
        let (l, w, h) = (length, width, height);
        let color = [color.x, color.y, color.z];
        let corner = |x: f32, y: f32, z: f32| Vertex {
            position: [x, y, z],
            color,
            tex_coord: [0.0, 0.0],
        };

        let vertices = [
            corner(0.0, 0.0, 0.0), // 0
            corner(0.0, 0.0, w),   // 1
            corner(0.0, h, 0.0),   // 2
            corner(0.0, h, w),     // 3
            corner(l, 0.0, 0.0),   // 4
            corner(l, 0.0, w),     // 5
            corner(l, h, 0.0),     // 6
            corner(l, h, w),       // 7
        ];

        #[rustfmt::skip]
        let indices = [
            0, 2, 4,  2, 6, 4, // -z face
            3, 0, 1,  3, 2, 0, // -x face
            7, 1, 5,  7, 3, 1, // +z face
            6, 5, 4,  6, 7, 5, // +x face
            3, 6, 2,  3, 7, 6, // +y face
            0, 5, 1,  0, 4, 5, // -y face
        ];

        Self { vertices, indices }
    }

    pub fn unit_cube(color: Vec3) -> Self {
        Self::new(1.0, 1.0, 1.0, color)
    }

    pub fn vertices(&self) -> &[Vertex; VERTICES_PER_VOXEL] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32; INDICES_PER_VOXEL] {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_stay_within_the_local_vertex_block() {
        let mesh = VoxelMesh::unit_cube(Vec3::one());
        assert!(mesh
            .indices()
            .iter()
            .all(|&i| (i as usize) < VERTICES_PER_VOXEL));
    }

    #[test]
    fn every_corner_is_referenced() {
        let mesh = VoxelMesh::new(2.0, 3.0, 4.0, Vec3::one());
        for corner in 0..VERTICES_PER_VOXEL as u32 {
            assert!(
                mesh.indices().contains(&corner),
                "corner {corner} is not referenced by any triangle"
            );
        }
    }

    #[test]
    fn dimensions_parameterize_the_corners() {
        let mesh = VoxelMesh::new(2.0, 3.0, 4.0, Vec3::one());
        // vertex 7 is the (l, h, w) corner
        assert_eq!(mesh.vertices()[7].position, [2.0, 4.0, 3.0]);
        assert_eq!(mesh.vertices()[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn color_is_applied_to_all_vertices() {
        let mesh = VoxelMesh::unit_cube(Vec3::new(0.2, 0.4, 0.6));
        assert!(mesh
            .vertices()
            .iter()
            .all(|v| v.color == [0.2, 0.4, 0.6]));
    }

    #[test]
    fn winding_points_every_face_outward() {
        let mesh = VoxelMesh::new(1.0, 2.0, 3.0, Vec3::one());
        let center = [0.5, 1.5, 1.0];

        for triangle in mesh.indices().chunks(3) {
            let p = |i: usize| mesh.vertices()[triangle[i] as usize].position;
            let (a, b, c) = (p(0), p(1), p(2));

            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let normal = [
                ab[1] * ac[2] - ab[2] * ac[1],
                ab[2] * ac[0] - ab[0] * ac[2],
                ab[0] * ac[1] - ab[1] * ac[0],
            ];
            let centroid = [
                (a[0] + b[0] + c[0]) / 3.0 - center[0],
                (a[1] + b[1] + c[1]) / 3.0 - center[1],
                (a[2] + b[2] + c[2]) / 3.0 - center[2],
            ];
            let dot =
                normal[0] * centroid[0] + normal[1] * centroid[1] + normal[2] * centroid[2];
            assert!(
                dot > 0.0,
                "triangle {:?} faces inward (dot = {dot})",
                triangle
            );
        }
    }
}
