//! Isosurface extraction with marching cubes.
//!
//! Vertices are placed on the cell edges where the field crosses the iso
//! value and are shared between neighbouring cells. Normals are accumulated
//! from the adjacent faces and point towards lower field values.

#![allow(clippy::unreadable_literal, clippy::too_many_arguments)]

use crate::{bounds::Bounds, volume::Volume};

use glam::{Mat3, Vec3};

/// A regular grid of scalar samples with an affine placement in the world.
///
/// This is the bridge between the voxel stages and the surface extractor:
/// anything that can be sampled on a grid can be contoured.
pub trait ScalarField {
    /// Number of samples along the column, row and slice axes.
    fn dimensions(&self) -> [usize; 3];

    fn value(&self, column: usize, row: usize, slice: usize) -> f32;

    /// Linear part and translation of the index to world mapping.
    fn index_to_world(&self) -> (Mat3, Vec3);
}

impl ScalarField for Volume {
    fn dimensions(&self) -> [usize; 3] {
        let (depth, height, width) = self.dim();
        [width, height, depth]
    }

    #[inline]
    fn value(&self, column: usize, row: usize, slice: usize) -> f32 {
        f32::from(self.data[[slice, row, column]])
    }

    fn index_to_world(&self) -> (Mat3, Vec3) {
        (self.index_to_world_matrix(), self.origin)
    }
}

/// Triangle mesh with optional per-vertex normals.
#[derive(Clone, Debug, Default)]
pub struct SurfaceMesh {
    pub positions: Vec<Vec3>,
    /// Either empty or one normal per position.
    pub normals: Vec<Vec3>,
    /// Every 3 consecutive indices form a counter-clockwise triangle.
    pub indices: Vec<u32>,
}

impl SurfaceMesh {
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Bounds of the vertices referenced by triangles.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.indices.iter().map(|&i| self.positions[i as usize]))
    }
}

/// Marching cubes contour filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceExtractor {
    pub iso_value: f32,
    pub compute_normals: bool,
}

impl Default for SurfaceExtractor {
    fn default() -> Self {
        Self {
            iso_value: 100.0,
            compute_normals: true,
        }
    }
}

impl SurfaceExtractor {
    pub fn new(iso_value: f32) -> Self {
        Self {
            iso_value,
            ..Self::default()
        }
    }

    /// Contour `field` at the iso value. Grids with fewer than two samples
    /// along any axis give an empty mesh.
    pub fn extract(&self, field: &impl ScalarField) -> SurfaceMesh {
        let [nx, ny, nz] = field.dimensions();
        if nx < 2 || ny < 2 || nz < 2 {
            return SurfaceMesh::default();
        }

        let mut mesh = SurfaceMesh::default();
        let size = [nx, ny, nz];
        // Vertex index per edge axis for two consecutive z layers.
        let mut slab_inds: Vec<[u32; 3]> = vec![[0; 3]; nx * ny * 2];
        let mut vs = [0.0_f32; 8];
        let mut edge_indices = [0_u32; 12];
        let iso = self.iso_value;

        for z in 0..nz - 1 {
            for y in 0..ny - 1 {
                for x in 0..nx - 1 {
                    vs[0] = field.value(x, y, z) - iso;
                    vs[1] = field.value(x + 1, y, z) - iso;
                    vs[2] = field.value(x, y + 1, z) - iso;
                    vs[3] = field.value(x + 1, y + 1, z) - iso;
                    vs[4] = field.value(x, y, z + 1) - iso;
                    vs[5] = field.value(x + 1, y, z + 1) - iso;
                    vs[6] = field.value(x, y + 1, z + 1) - iso;
                    vs[7] = field.value(x + 1, y + 1, z + 1) - iso;

                    let config_n = vs
                        .iter()
                        .enumerate()
                        .fold(0_usize, |acc, (bit, v)| acc | (usize::from(*v < 0.0) << bit));

                    if config_n == 0 || config_n == 255 {
                        continue;
                    }

                    let mut edge = |va: f32, vb: f32, axis: usize, x: usize, y: usize, z: usize| {
                        compute_edge(&mut slab_inds, &mut mesh, va, vb, axis, x, y, z, &size);
                    };

                    // Edges along x
                    if y == 0 && z == 0 {
                        edge(vs[0], vs[1], 0, x, y, z);
                    }
                    if z == 0 {
                        edge(vs[2], vs[3], 0, x, y + 1, z);
                    }
                    if y == 0 {
                        edge(vs[4], vs[5], 0, x, y, z + 1);
                    }
                    edge(vs[6], vs[7], 0, x, y + 1, z + 1);

                    // Edges along y
                    if x == 0 && z == 0 {
                        edge(vs[0], vs[2], 1, x, y, z);
                    }
                    if z == 0 {
                        edge(vs[1], vs[3], 1, x + 1, y, z);
                    }
                    if x == 0 {
                        edge(vs[4], vs[6], 1, x, y, z + 1);
                    }
                    edge(vs[5], vs[7], 1, x + 1, y, z + 1);

                    // Edges along z
                    if x == 0 && y == 0 {
                        edge(vs[0], vs[4], 2, x, y, z);
                    }
                    if y == 0 {
                        edge(vs[1], vs[5], 2, x + 1, y, z);
                    }
                    if x == 0 {
                        edge(vs[2], vs[6], 2, x, y + 1, z);
                    }
                    edge(vs[3], vs[7], 2, x + 1, y + 1, z);

                    let slab = |x: usize, y: usize, z: usize| slab_inds[slab_index(x, y, z, &size)];
                    edge_indices[0] = slab(x, y, z)[0];
                    edge_indices[1] = slab(x, y + 1, z)[0];
                    edge_indices[2] = slab(x, y, z + 1)[0];
                    edge_indices[3] = slab(x, y + 1, z + 1)[0];
                    edge_indices[4] = slab(x, y, z)[1];
                    edge_indices[5] = slab(x + 1, y, z)[1];
                    edge_indices[6] = slab(x, y, z + 1)[1];
                    edge_indices[7] = slab(x + 1, y, z + 1)[1];
                    edge_indices[8] = slab(x, y, z)[2];
                    edge_indices[9] = slab(x + 1, y, z)[2];
                    edge_indices[10] = slab(x, y + 1, z)[2];
                    edge_indices[11] = slab(x + 1, y + 1, z)[2];

                    let config = MC_TRIS[config_n];
                    let n_triangles = (config & 0xF) as usize;
                    for t in 0..n_triangles {
                        let corner = |c: usize| {
                            let e = ((config >> (4 + 4 * (3 * t + c))) & 0xF) as usize;
                            edge_indices[e]
                        };
                        // Reversed so faces look towards lower values.
                        let (a, b, c) = (corner(0), corner(2), corner(1));
                        mesh.indices.extend_from_slice(&[a, b, c]);
                        accumulate_normal(&mut mesh, a, b, c);
                    }
                }
            }
        }

        self.place_in_world(&mut mesh, field.index_to_world());
        mesh
    }

    /// Maps grid-space vertices and normals through the field's affine.
    fn place_in_world(&self, mesh: &mut SurfaceMesh, (linear, translation): (Mat3, Vec3)) {
        for p in &mut mesh.positions {
            *p = linear * *p + translation;
        }

        if self.compute_normals {
            let normal_matrix = if linear.determinant().abs() > f32::EPSILON {
                linear.inverse().transpose()
            } else {
                Mat3::IDENTITY
            };
            for n in &mut mesh.normals {
                *n = (normal_matrix * *n).normalize_or_zero();
            }
        } else {
            mesh.normals.clear();
        }

        // A mirroring affine flips the winding.
        if linear.determinant() < 0.0 {
            for t in mesh.indices.chunks_exact_mut(3) {
                t.swap(1, 2);
            }
        }
    }
}

/// Index into the two-layer slab, reusing memory between z layers.
#[inline]
fn slab_index(x: usize, y: usize, z: usize, size: &[usize; 3]) -> usize {
    size[0] * size[1] * (z % 2) + y * size[0] + x
}

/// Creates the vertex where the surface crosses an edge, if it does.
#[inline]
fn compute_edge(
    slab_inds: &mut [[u32; 3]],
    mesh: &mut SurfaceMesh,
    va: f32,
    vb: f32,
    axis: usize,
    x: usize,
    y: usize,
    z: usize,
    size: &[usize; 3],
) {
    if (va < 0.0) == (vb < 0.0) {
        return;
    }
    let mut v = Vec3::new(x as f32, y as f32, z as f32);
    v[axis] += va / (va - vb);
    let idx = mesh.positions.len() as u32;
    slab_inds[slab_index(x, y, z, size)][axis] = idx;
    mesh.positions.push(v);
    mesh.normals.push(Vec3::ZERO);
}

/// Adds the geometric normal of triangle (a, b, c) to its three vertices.
#[inline]
fn accumulate_normal(mesh: &mut SurfaceMesh, a: u32, b: u32, c: u32) {
    let va = mesh.positions[a as usize];
    let vb = mesh.positions[b as usize];
    let vc = mesh.positions[c as usize];
    let n = (vb - va).cross(vc - va);
    mesh.normals[a as usize] += n;
    mesh.normals[b as usize] += n;
    mesh.normals[c as usize] += n;
}

/// Triangle configurations, one per corner sign pattern.
///
/// Bits `[3:0]` hold the triangle count (0-5); each following nibble is the
/// cell edge (0-11) of one triangle corner.
#[rustfmt::skip]
static MC_TRIS: [u64; 256] = [
    0, 33793, 36945, 159668546,
    18961, 144771090, 5851666, 595283255635,
    20913, 67640146, 193993474, 655980856339,
    88782242, 736732689667, 797430812739, 194554754,
    26657, 104867330, 136709522, 298069416227,
    109224258, 8877909667, 318136408323, 1567994331701604,
    189884450, 350847647843, 559958167731, 3256298596865604,
    447393122899, 651646838401572, 2538311371089956, 737032694307,
    29329, 43484162, 91358498, 374810899075,
    158485010, 178117478419, 88675058979, 433581536604804,
    158486962, 649105605635, 4866906995, 3220959471609924,
    649165714851, 3184943915608436, 570691368417972, 595804498035,
    124295042, 431498018963, 508238522371, 91518530,
    318240155763, 291789778348404, 1830001131721892, 375363605923,
    777781811075, 1136111028516116, 3097834205243396, 508001629971,
    2663607373704004, 680242583802939237, 333380770766129845, 179746658,
    42545, 138437538, 93365810, 713842853011,
    73602098, 69575510115, 23964357683, 868078761575828,
    28681778, 713778574611, 250912709379, 2323825233181284,
    302080811955, 3184439127991172, 1694042660682596, 796909779811,
    176306722, 150327278147, 619854856867, 1005252473234484,
    211025400963, 36712706, 360743481544788, 150627258963,
    117482600995, 1024968212107700, 2535169275963444, 4734473194086550421,
    628107696687956, 9399128243, 5198438490361643573, 194220594,
    104474994, 566996932387, 427920028243, 2014821863433780,
    492093858627, 147361150235284, 2005882975110676, 9671606099636618005,
    777701008947, 3185463219618820, 482784926917540, 2900953068249785909,
    1754182023747364, 4274848857537943333, 13198752741767688709, 2015093490989156,
    591272318771, 2659758091419812, 1531044293118596, 298306479155,
    408509245114388, 210504348563, 9248164405801223541, 91321106,
    2660352816454484, 680170263324308757, 8333659837799955077, 482966828984116,
    4274926723105633605, 3184439197724820, 192104450, 15217,
    45937, 129205250, 129208402, 529245952323,
    169097138, 770695537027, 382310500883, 2838550742137652,
    122763026, 277045793139, 81608128403, 1991870397907988,
    362778151475, 2059003085103236, 2132572377842852, 655681091891,
    58419234, 239280858627, 529092143139, 1568257451898804,
    447235128115, 679678845236084, 2167161349491220, 1554184567314086709,
    165479003923, 1428768988226596, 977710670185060, 10550024711307499077,
    1305410032576132, 11779770265620358997, 333446212255967269, 978168444447012,
    162736434, 35596216627, 138295313843, 891861543990356,
    692616541075, 3151866750863876, 100103641866564, 6572336607016932133,
    215036012883, 726936420696196, 52433666, 82160664963,
    2588613720361524, 5802089162353039525, 214799000387, 144876322,
    668013605731, 110616894681956, 1601657732871812, 430945547955,
    3156382366321172, 7644494644932993285, 3928124806469601813, 3155990846772900,
    339991010498708, 10743689387941597493, 5103845475, 105070898,
    3928064910068824213, 156265010, 1305138421793636, 27185,
    195459938, 567044449971, 382447549283, 2175279159592324,
    443529919251, 195059004769796, 2165424908404116, 1554158691063110021,
    504228368803, 1436350466655236, 27584723588724, 1900945754488837749,
    122971970, 443829749251, 302601798803, 108558722,
    724700725875, 43570095105972, 2295263717447940, 2860446751369014181,
    2165106202149444, 69275726195, 2860543885641537797, 2165106320445780,
    2280890014640004, 11820349930268368933, 8721082628082003989, 127050770,
    503707084675, 122834978, 2538193642857604, 10129,
    801441490467, 2923200302876740, 1443359556281892, 2901063790822564949,
    2728339631923524, 7103874718248233397, 12775311047932294245, 95520290,
    2623783208098404, 1900908618382410757, 137742672547, 2323440239468964,
    362478212387, 727199575803140, 73425410, 34337,
    163101314, 668566030659, 801204361987, 73030562,
    591509145619, 162574594, 100608342969108, 5553,
    724147968595, 1436604830452292, 176259090, 42001,
    143955266, 2385, 18433, 0,
];

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ball(n: usize, radius: f32) -> Volume {
        let center = (n as f32 - 1.0) / 2.0;
        let data = Array3::from_shape_fn((n, n, n), |(k, j, i)| {
            let p = Vec3::new(i as f32, j as f32, k as f32) - Vec3::splat(center);
            if p.length() <= radius { 255 } else { 0 }
        });
        Volume::new(data, (1.0, 1.0, 1.0))
    }

    #[test]
    fn uniform_field_has_no_surface() {
        let volume = Volume::new(Array3::from_elem((3, 3, 3), 255), (1.0, 1.0, 1.0));
        assert!(SurfaceExtractor::default().extract(&volume).is_empty());
        let volume = Volume::new(Array3::zeros((3, 3, 3)), (1.0, 1.0, 1.0));
        assert!(SurfaceExtractor::default().extract(&volume).is_empty());
    }

    #[test]
    fn too_small_grid_is_empty() {
        let volume = Volume::new(Array3::from_elem((1, 4, 4), 255), (1.0, 1.0, 1.0));
        assert!(SurfaceExtractor::default().extract(&volume).is_empty());
    }

    #[test]
    fn single_corner_gives_one_triangle() {
        let mut data = Array3::zeros((2, 2, 2));
        data[[0, 0, 0]] = 255;
        let mesh = SurfaceExtractor::default().extract(&Volume::new(data, (1.0, 1.0, 1.0)));
        assert_eq!(mesh.num_triangles(), 1);
        assert_eq!(mesh.num_vertices(), 3);
        // The face looks away from the bright corner.
        for n in &mesh.normals {
            assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.0, "normal {n:?}");
        }
    }

    #[test]
    fn flat_boundary_shares_vertices() {
        // Bright below slice 2, dark above: a plane at z = 1.5 (iso 100
        // between 0 and 255 sits at 100/255 of the way from bright to dark).
        let data = Array3::from_shape_fn((4, 3, 3), |(k, _, _)| if k < 2 { 255 } else { 0 });
        let mesh = SurfaceExtractor::default().extract(&Volume::new(data, (1.0, 1.0, 1.0)));

        assert_eq!(mesh.num_vertices(), 9);
        assert_eq!(mesh.num_triangles(), 8);
        let expected_z = 1.0 + 155.0 / 255.0;
        for p in &mesh.positions {
            assert!((p.z - expected_z).abs() < 1e-5, "vertex {p:?} off the plane");
        }
        for n in &mesh.normals {
            assert!((*n - Vec3::Z).length() < 1e-5, "normal {n:?} should face the dark side");
        }
    }

    #[test]
    fn ball_normals_point_outwards() {
        let n = 16;
        let volume = ball(n, 5.0);
        let mesh = SurfaceExtractor::default().extract(&volume);
        assert!(mesh.num_triangles() > 100);
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.num_vertices()));

        let center = Vec3::splat((n as f32 - 1.0) / 2.0);
        for normal in &mesh.normals {
            assert!((normal.length() - 1.0).abs() < 1e-3);
        }
        let outward = mesh
            .positions
            .iter()
            .zip(&mesh.normals)
            .filter(|(p, n)| (**p - center).dot(**n) > 0.0)
            .count();
        assert!(outward as f32 > 0.95 * mesh.num_vertices() as f32);

        // Faces wind counter-clockwise seen from outside.
        let ccw = mesh
            .triangles()
            .filter(|t| {
                let [a, b, c] = t.map(|i| mesh.positions[i as usize]);
                let face = (b - a).cross(c - a);
                face.dot((a + b + c) / 3.0 - center) > 0.0
            })
            .count();
        assert!(ccw as f32 > 0.95 * mesh.num_triangles() as f32);
    }

    #[test]
    fn vertices_follow_volume_geometry() {
        let mut volume = ball(12, 4.0);
        volume.spacing = (0.5, 0.5, 2.0);
        volume.origin = Vec3::new(100.0, -50.0, 10.0);
        let mesh = SurfaceExtractor::default().extract(&volume);
        let bounds = volume.bounds().unwrap();
        let surface = mesh.bounds().unwrap();
        assert!(bounds.contains(surface.min, 1e-4));
        assert!(bounds.contains(surface.max, 1e-4));
        // Stretched four times along z relative to x.
        let size = surface.size();
        assert!((size.z / size.x - 4.0).abs() < 0.5);
    }

    #[test]
    fn normals_follow_anisotropic_spacing() {
        // Slanted boundary i + k = 8, slices four times further apart than
        // columns.
        let data = Array3::from_shape_fn((10, 4, 10), |(k, _, i)| if i + k < 8 { 255 } else { 0 });
        let volume = Volume::new(data, (1.0, 1.0, 4.0));
        let mesh = SurfaceExtractor::default().extract(&volume);
        assert!(!mesh.is_empty());
        assert!(mesh.has_normals());

        // Planes transform with the inverse transpose: (1, 0, 1) becomes
        // (1, 0, 1/4), not (1, 0, 4).
        let expected = Vec3::new(1.0, 0.0, 0.25).normalize();
        for n in &mesh.normals {
            assert!(n.dot(expected) > 0.999, "normal {n:?}");
        }

        let mut face_sums = vec![Vec3::ZERO; mesh.num_vertices()];
        for t in mesh.triangles() {
            let [a, b, c] = t.map(|i| mesh.positions[i as usize]);
            let face = (b - a).cross(c - a);
            for i in t {
                face_sums[i as usize] += face;
            }
        }
        for (n, sum) in mesh.normals.iter().zip(&face_sums) {
            assert!(n.dot(sum.normalize()) > 0.99, "normal {n:?} against faces {sum:?}");
        }
    }

    #[test]
    fn mirrored_geometry_keeps_outward_winding() {
        let mut volume = ball(12, 4.0);
        volume.direction = Mat3::from_cols(Vec3::X, Vec3::Y, -Vec3::Z);
        let mesh = SurfaceExtractor::default().extract(&volume);
        let center = volume.index_to_world(5.5, 5.5, 5.5);
        let ccw = mesh
            .triangles()
            .filter(|t| {
                let [a, b, c] = t.map(|i| mesh.positions[i as usize]);
                (b - a).cross(c - a).dot((a + b + c) / 3.0 - center) > 0.0
            })
            .count();
        assert!(ccw as f32 > 0.95 * mesh.num_triangles() as f32);
    }

    #[test]
    fn normals_can_be_skipped() {
        let extractor = SurfaceExtractor {
            compute_normals: false,
            ..SurfaceExtractor::default()
        };
        let mesh = extractor.extract(&ball(10, 3.0));
        assert!(!mesh.is_empty());
        assert!(!mesh.has_normals());
    }
}
