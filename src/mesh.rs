// CPU-side mesh data and procedural generators.
//
// The GPU half (device-local vertex/index buffers staged through the upload
// pool) lives in `backend::mesh`; everything here is plain data the backend
// only needs as bytes, a stride and a count.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2, tangent: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            texcoord: texcoord.to_array(),
            tangent: tangent.to_array(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn from_floats(
        px: f32, py: f32, pz: f32,
        nx: f32, ny: f32, nz: f32,
        tx: f32, ty: f32, tz: f32,
        u: f32, v: f32,
    ) -> Self {
        Self {
            position: [px, py, pz],
            normal: [nx, ny, nz],
            texcoord: [u, v],
            tangent: [tx, ty, tz],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn vertex_stride() -> usize {
        std::mem::size_of::<Vertex>()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Axis-aligned box centered on the origin, 24 vertices / 36 indices.
pub fn generate_cube(extents: Vec3) -> MeshData {
    let w2 = 0.5 * extents.x;
    let h2 = 0.5 * extents.y;
    let d2 = 0.5 * extents.z;

    let v = vec![
        // Front face.
        Vertex::from_floats(-w2, -h2, -d2, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0, 0.0, 1.0),
        Vertex::from_floats(-w2, h2, -d2, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0, 0.0, 0.0),
        Vertex::from_floats(w2, h2, -d2, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0, 1.0, 0.0),
        Vertex::from_floats(w2, -h2, -d2, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0, 1.0, 1.0),
        // Back face.
        Vertex::from_floats(-w2, -h2, d2, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 1.0),
        Vertex::from_floats(w2, -h2, d2, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, 0.0, 1.0),
        Vertex::from_floats(w2, h2, d2, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, 0.0, 0.0),
        Vertex::from_floats(-w2, h2, d2, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0),
        // Top face.
        Vertex::from_floats(-w2, h2, -d2, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0),
        Vertex::from_floats(-w2, h2, d2, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
        Vertex::from_floats(w2, h2, d2, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0),
        Vertex::from_floats(w2, h2, -d2, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0),
        // Bottom face.
        Vertex::from_floats(-w2, -h2, -d2, 0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 1.0, 1.0),
        Vertex::from_floats(w2, -h2, -d2, 0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0),
        Vertex::from_floats(w2, -h2, d2, 0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0),
        Vertex::from_floats(-w2, -h2, d2, 0.0, -1.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0),
        // Left face.
        Vertex::from_floats(-w2, -h2, d2, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0),
        Vertex::from_floats(-w2, h2, d2, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0),
        Vertex::from_floats(-w2, h2, -d2, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 1.0, 0.0),
        Vertex::from_floats(-w2, -h2, -d2, -1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 1.0, 1.0),
        // Right face.
        Vertex::from_floats(w2, -h2, -d2, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0),
        Vertex::from_floats(w2, h2, -d2, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0),
        Vertex::from_floats(w2, h2, d2, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0),
        Vertex::from_floats(w2, -h2, d2, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0),
    ];

    let mut i = Vec::with_capacity(36);
    for face in 0..6u32 {
        let base = face * 4;
        i.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData { vertices: v, indices: i }
}

/// Single quad. With `xz` it lies in the xz plane facing +y, otherwise in the
/// xy plane facing +z.
pub fn generate_quad(extents: Vec2, xz: bool) -> MeshData {
    let vertices = if xz {
        vec![
            Vertex::from_floats(extents.x, 0.0, extents.y, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::from_floats(extents.x, 0.0, -extents.y, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            Vertex::from_floats(-extents.x, 0.0, -extents.y, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0),
            Vertex::from_floats(-extents.x, 0.0, extents.y, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0),
        ]
    } else {
        vec![
            Vertex::from_floats(extents.x, extents.y, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::from_floats(extents.x, -extents.y, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            Vertex::from_floats(-extents.x, -extents.y, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0),
            Vertex::from_floats(-extents.x, extents.y, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0),
        ]
    };

    MeshData {
        vertices,
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

/// Subdivided plane with an arbitrary facing direction. `divisions` counts
/// vertices per axis, so both components must be at least 2.
pub fn generate_plane(dims: Vec2, divisions: (u32, u32), normal: Vec3) -> MeshData {
    let (div_x, div_y) = divisions;
    assert!(div_x >= 2 && div_y >= 2, "plane needs at least 2x2 vertices");

    let nw = normal.normalize();
    let t = if nw.x.abs() > 0.1 { Vec3::Y } else { Vec3::X };
    let nu = t.cross(nw).normalize();
    let nv = nw.cross(nu);

    let half = 0.5 * dims;
    let dxy = dims / Vec2::new(div_x as f32 - 1.0, div_y as f32 - 1.0);
    let duv = Vec2::new(div_x as f32 - 1.0, div_y as f32 - 1.0).recip();

    let mut vertices = Vec::with_capacity((div_x * div_y) as usize);
    for i in 0..div_y {
        let y = half.y - i as f32 * dxy.y;
        for j in 0..div_x {
            let x = half.x - j as f32 * dxy.x;
            let p = nu * x + nv * y;
            let uv = Vec2::new(j as f32, i as f32) * duv;
            vertices.push(Vertex::new(p, -nw, uv, nu));
        }
    }

    let mut indices = Vec::with_capacity(6 * ((div_x - 1) * (div_y - 1)) as usize);
    for i in 0..div_y - 1 {
        for j in 0..div_x - 1 {
            let row = i * div_x;
            indices.extend_from_slice(&[
                row + j,
                row + j + 1,
                row + div_x + j,
                row + div_x + j,
                row + j + 1,
                row + div_x + j + 1,
            ]);
        }
    }
    indices.reverse();

    MeshData { vertices, indices }
}

/// UV sphere centered on the origin.
pub fn generate_sphere(radius: f32, slices: u32, stacks: u32) -> MeshData {
    assert!(slices >= 3 && stacks >= 2, "sphere needs at least 3 slices and 2 stacks");

    let mut vertices = Vec::with_capacity(((slices + 1) * (stacks + 1)) as usize);
    for stack in 0..=stacks {
        let phi = std::f32::consts::PI * stack as f32 / stacks as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for slice in 0..=slices {
            let theta = std::f32::consts::TAU * slice as f32 / slices as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let n = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
            let tangent = Vec3::new(-sin_theta, 0.0, cos_theta);
            let uv = Vec2::new(
                slice as f32 / slices as f32,
                stack as f32 / stacks as f32,
            );
            vertices.push(Vertex::new(n * radius, n, uv, tangent));
        }
    }

    let ring = slices + 1;
    let mut indices = Vec::with_capacity((6 * slices * stacks) as usize);
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * ring + slice;
            let b = a + ring;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    MeshData { vertices, indices }
}

/// Position-only quad covering `[-extents, extents]`, for screen-space passes.
pub fn generate_fullscreen_quad(extents: Vec2) -> (Vec<[f32; 2]>, Vec<u32>) {
    let positions = vec![
        [extents.x, extents.y],
        [extents.x, -extents.y],
        [-extents.x, -extents.y],
        [-extents.x, extents.y],
    ];
    (positions, vec![0, 1, 2, 2, 3, 0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_indices_in_bounds(mesh: &MeshData) {
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn cube_has_expected_topology() {
        let cube = generate_cube(Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_indices_in_bounds(&cube);

        // Every vertex sits on the box surface and has a unit axis normal.
        for v in &cube.vertices {
            assert!(v.position[0].abs() <= 1.0);
            assert!(v.position[1].abs() <= 2.0);
            assert!(v.position[2].abs() <= 3.0);
            let n = Vec3::from_array(v.normal);
            assert_relative_eq!(n.length(), 1.0);
        }
    }

    #[test]
    fn quad_faces_up_in_xz_mode() {
        let quad = generate_quad(Vec2::splat(1.0), true);
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(quad.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
        assert!(quad.vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn plane_grid_counts() {
        let plane = generate_plane(Vec2::new(10.0, 10.0), (4, 3), Vec3::Y);
        assert_eq!(plane.vertices.len(), 12);
        assert_eq!(plane.indices.len(), 6 * 3 * 2);
        assert_indices_in_bounds(&plane);
    }

    #[test]
    fn plane_normals_oppose_facing() {
        let plane = generate_plane(Vec2::splat(2.0), (2, 2), Vec3::new(0.0, 2.0, 0.0));
        for v in &plane.vertices {
            let n = Vec3::from_array(v.normal);
            assert_relative_eq!(n.y, -1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = generate_sphere(2.5, 16, 8);
        assert_eq!(sphere.vertices.len(), 17 * 9);
        assert_eq!(sphere.indices.len() as u32, 6 * 16 * 8);
        assert_indices_in_bounds(&sphere);

        for v in &sphere.vertices {
            let p = Vec3::from_array(v.position);
            assert_relative_eq!(p.length(), 2.5, epsilon = 1e-4);
            assert_relative_eq!(Vec3::from_array(v.normal).length(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn mesh_data_byte_views() {
        let quad = generate_quad(Vec2::splat(1.0), false);
        assert_eq!(quad.vertex_bytes().len(), 4 * MeshData::vertex_stride());
        assert_eq!(quad.index_bytes().len(), 6 * 4);
        assert_eq!(quad.index_count(), 6);
    }

    #[test]
    fn fullscreen_quad_is_position_only() {
        let (positions, indices) = generate_fullscreen_quad(Vec2::splat(1.0));
        assert_eq!(positions.len(), 4);
        assert_eq!(indices.len(), 6);
        assert!(positions.iter().all(|p| p[0].abs() == 1.0 && p[1].abs() == 1.0));
    }
}
