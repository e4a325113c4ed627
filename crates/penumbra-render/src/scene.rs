//! Minimal triangle scenes.

use glam::Vec3;
use penumbra_core::math::Aabb;

/// Indexed triangle mesh with precomputed bounds.
#[derive(Clone, Debug)]
pub struct Mesh {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    bounds: Aabb,
    /// Base color used by the shading pass.
    pub albedo: Vec3,
}

impl Mesh {
    /// Build a mesh. Triangles referencing missing vertices are dropped.
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        let count = positions.len() as u32;
        let triangles = triangles
            .into_iter()
            .filter(|t| t.iter().all(|&i| i < count))
            .collect();
        let bounds = Aabb::from_points(positions.iter().copied());
        Self {
            positions,
            triangles,
            bounds,
            albedo: Vec3::splat(0.8),
        }
    }

    /// Horizontal square at height `center.y`, facing up.
    pub fn plane(center: Vec3, half_extent: f32) -> Self {
        let e = half_extent;
        let positions = vec![
            center + Vec3::new(-e, 0.0, -e),
            center + Vec3::new(e, 0.0, -e),
            center + Vec3::new(e, 0.0, e),
            center + Vec3::new(-e, 0.0, e),
        ];
        Self::new(positions, vec![[0, 2, 1], [0, 3, 2]])
    }

    /// Axis-aligned box.
    pub fn cuboid(center: Vec3, half_size: Vec3) -> Self {
        let corners = Aabb::new(center - half_size, center + half_size).corners();
        // Corner bit 0 = +x, bit 1 = +y, bit 2 = +z; outward counter-clockwise faces.
        let faces: [[u32; 4]; 6] = [
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
            [0, 2, 3, 1], // -z
            [4, 5, 7, 6], // +z
        ];
        let triangles = faces
            .iter()
            .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
            .collect();
        Self::new(corners.to_vec(), triangles)
    }

    /// Set the base color.
    #[must_use]
    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Iterate over triangles as vertex positions.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.triangles.iter().map(|&[a, b, c]| {
            [
                self.positions[a as usize],
                self.positions[b as usize],
                self.positions[c as usize],
            ]
        })
    }
}

/// Meshes lit by one directional light.
#[derive(Clone, Debug)]
pub struct Scene {
    pub meshes: Vec<Mesh>,
    /// Direction towards the light.
    pub light_direction: Vec3,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            light_direction: Vec3::ONE.normalize(),
        }
    }
}

impl Scene {
    /// Create an empty scene with the default light.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh.
    #[must_use]
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Set the light direction (towards the light).
    #[must_use]
    pub fn with_light(mut self, direction: Vec3) -> Self {
        self.light_direction = direction;
        self
    }

    /// Ground plane with a floating slab and a few pillars.
    pub fn demo() -> Self {
        let mut scene = Self::new()
            .with_mesh(Mesh::plane(Vec3::ZERO, 40.0).with_albedo(Vec3::new(0.75, 0.72, 0.65)))
            .with_mesh(
                Mesh::cuboid(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.5, 0.15, 1.0))
                    .with_albedo(Vec3::new(0.8, 0.3, 0.25)),
            );
        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            let base = Vec3::new(angle.cos() * 5.0, 1.0, angle.sin() * 5.0);
            scene = scene.with_mesh(
                Mesh::cuboid(base, Vec3::new(0.3, 1.0, 0.3)).with_albedo(Vec3::new(0.3, 0.5, 0.8)),
            );
        }
        scene
    }

    /// Bounds of every mesh.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for mesh in &self.meshes {
            let b = mesh.bounds();
            bounds.expand_to_include(b.min);
            bounds.expand_to_include(b.max);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_has_twelve_outward_triangles() {
        let mesh = Mesh::cuboid(Vec3::ZERO, Vec3::ONE);
        assert_eq!(mesh.triangle_count(), 12);
        for [a, b, c] in mesh.triangles() {
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "inward face at {centroid}");
        }
    }

    #[test]
    fn plane_faces_up() {
        let mesh = Mesh::plane(Vec3::new(0.0, -1.0, 0.0), 2.0);
        for [a, b, c] in mesh.triangles() {
            assert!((b - a).cross(c - a).y > 0.0);
        }
        assert_eq!(mesh.bounds().min.y, -1.0);
    }

    #[test]
    fn invalid_indices_are_dropped() {
        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2], [0, 1, 3]]);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn default_light_points_up_diagonally() {
        let scene = Scene::new();
        assert!((scene.light_direction - Vec3::ONE.normalize()).length() < 1e-6);
        assert!(Scene::demo().bounds().contains_point(Vec3::new(0.0, 2.0, 0.0)));
    }
}
