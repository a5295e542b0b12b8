use super::data::{DispInfo, DispVert};
use crate::data::Vector;
use crate::{Error, Result};
use cgmath::{InnerSpace, Vector3};
use itertools::Itertools;

/// World-space distance under which boundary vertices of neighbouring
/// displacements are considered the same point.
const COINCIDENT_EPSILON: f32 = 0.01;

/// A displacement patch turned into a renderable triangle mesh: a regular
/// `side x side` grid of positions, normals, tangents and alphas plus a
/// triangle index buffer.
#[derive(Debug, Clone)]
pub struct TriangulatedDisplacement {
    pub positions: Vec<Vector>,
    pub normals: Vec<Vector>,
    pub tangents: Vec<Vector>,
    pub alphas: Vec<f32>,
    pub indices: Vec<u32>,
    side: usize,
    neighbor_candidates: Vec<u16>,
}

impl TriangulatedDisplacement {
    /// Builds the mesh for one displacement. `face_corners` are the base
    /// face's corners in winding order; `texture_vecs` are the face's
    /// texture projection axes, used to derive tangents.
    pub(crate) fn new(
        info: &DispInfo,
        face_corners: [Vector; 4],
        texture_vecs: [[f32; 4]; 2],
        displacement_vertices: &[DispVert],
    ) -> Result<Self> {
        if !(2..=4).contains(&info.power) {
            return Err(Error::InvalidBody(format!(
                "displacement has power {} outside the supported 2..=4",
                info.power
            )));
        }

        let side = info.side();
        let vertex_count = side * side;
        if displacement_vertices.len() != vertex_count {
            return Err(Error::InvalidBody(format!(
                "displacement of power {} needs {} vertices but {} were supplied",
                info.power,
                vertex_count,
                displacement_vertices.len()
            )));
        }

        let corners = rotate_to_start(face_corners, info.start_position);
        let [c0, c1, c2, c3] = corners.map(Vector3::from);

        let mut positions = Vec::with_capacity(vertex_count);
        let mut alphas = Vec::with_capacity(vertex_count);
        for y in 0..side {
            let t = y as f32 / (side - 1) as f32;
            let row_start = c0 + (c3 - c0) * t;
            let row_end = c1 + (c2 - c1) * t;

            for x in 0..side {
                let s = x as f32 / (side - 1) as f32;
                let vertex = &displacement_vertices[y * side + x];

                let base = row_start + (row_end - row_start) * s;
                let offset = Vector3::from(vertex.vec) * vertex.dist;
                positions.push(Vector::from(base + offset));
                alphas.push(vertex.alpha);
            }
        }

        let indices = build_indices(side);
        let normals = accumulate_normals(&positions, &indices);
        let tangents = accumulate_tangents(&positions, &normals, &indices, texture_vecs);

        Ok(TriangulatedDisplacement {
            positions,
            normals,
            tangents,
            alphas,
            indices,
            side,
            neighbor_candidates: info.neighbor_indices().sorted_unstable().dedup().collect(),
        })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn boundary_vertex_indices(&self) -> impl Iterator<Item = usize> {
        let side = self.side;
        (0..side * side).filter(move |i| {
            let x = i % side;
            let y = i / side;
            x == 0 || y == 0 || x == side - 1 || y == side - 1
        })
    }
}

fn rotate_to_start(corners: [Vector; 4], start_position: Vector) -> [Vector; 4] {
    let start = Vector3::from(start_position);
    let closest = corners
        .iter()
        .enumerate()
        .map(|(i, &corner)| (i, (Vector3::from(corner) - start).magnitude2()))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0);

    [
        corners[closest],
        corners[(closest + 1) % 4],
        corners[(closest + 2) % 4],
        corners[(closest + 3) % 4],
    ]
}

/// Grid triangulation with the engine's zig-zag split: the diagonal of each
/// cell alternates with the parity of `x + y`, keeping the winding of the
/// base face.
fn build_indices(side: usize) -> Vec<u32> {
    let cells = side - 1;
    let mut indices = Vec::with_capacity(cells * cells * 6);

    for y in 0..cells {
        for x in 0..cells {
            let i00 = (y * side + x) as u32;
            let i10 = i00 + 1;
            let i01 = i00 + side as u32;
            let i11 = i01 + 1;

            if (x + y) % 2 == 0 {
                indices.extend_from_slice(&[i00, i11, i01, i00, i10, i11]);
            } else {
                indices.extend_from_slice(&[i00, i10, i01, i01, i10, i11]);
            }
        }
    }

    indices
}

fn accumulate_normals(positions: &[Vector], indices: &[u32]) -> Vec<Vector> {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let normal = (Vector3::from(positions[b]) - Vector3::from(positions[a]))
            .cross(Vector3::from(positions[c]) - Vector3::from(positions[a]));

        sums[a] += normal;
        sums[b] += normal;
        sums[c] += normal;
    }

    sums.into_iter().map(|sum| Vector::from(normalize_or_zero(sum))).collect()
}

fn accumulate_tangents(
    positions: &[Vector],
    normals: &[Vector],
    indices: &[u32],
    texture_vecs: [[f32; 4]; 2],
) -> Vec<Vector> {
    let s_axis = Vector3::new(texture_vecs[0][0], texture_vecs[0][1], texture_vecs[0][2]);
    let t_axis = Vector3::new(texture_vecs[1][0], texture_vecs[1][1], texture_vecs[1][2]);
    let uv = |position: &Vector| {
        let p = Vector3::from(*position);
        (p.dot(s_axis) + texture_vecs[0][3], p.dot(t_axis) + texture_vecs[1][3])
    };

    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let edge1 = Vector3::from(positions[b]) - Vector3::from(positions[a]);
        let edge2 = Vector3::from(positions[c]) - Vector3::from(positions[a]);
        let (ua, va) = uv(&positions[a]);
        let (ub, vb) = uv(&positions[b]);
        let (uc, vc) = uv(&positions[c]);
        let (du1, dv1) = (ub - ua, vb - va);
        let (du2, dv2) = (uc - ua, vc - va);

        let determinant = du1 * dv2 - du2 * dv1;
        if determinant.abs() < 1e-8 {
            continue;
        }

        let tangent = (edge1 * dv2 - edge2 * dv1) / determinant;
        sums[a] += tangent;
        sums[b] += tangent;
        sums[c] += tangent;
    }

    sums.into_iter()
        .zip(normals)
        .map(|(sum, &normal)| {
            let normal = Vector3::from(normal);
            let candidate = if sum.magnitude2() > 1e-12 { sum } else { s_axis };
            // Gram-Schmidt against the vertex normal
            Vector::from(normalize_or_zero(candidate - normal * normal.dot(candidate)))
        })
        .collect()
}

fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > 1e-12 {
        v.normalize()
    } else {
        Vector3::new(0.0, 0.0, 0.0)
    }
}

/// Averages normals and tangents across coincident boundary vertices of
/// neighbouring displacements. Runs over the full collection once; the
/// owning parser guards against repeat invocations.
pub(crate) fn smooth_neighbouring_displacements(displacements: &mut [TriangulatedDisplacement]) {
    let epsilon_squared = COINCIDENT_EPSILON * COINCIDENT_EPSILON;
    let mut updates: Vec<Vec<(usize, Vector3<f32>, Vector3<f32>)>> =
        vec![Vec::new(); displacements.len()];

    for current in 0..displacements.len() {
        let neighbors: Vec<usize> = displacements[current]
            .neighbor_candidates
            .iter()
            .map(|&index| index as usize)
            .filter(|&index| index != current && index < displacements.len())
            .collect();
        if neighbors.is_empty() {
            continue;
        }

        for vertex in displacements[current].boundary_vertex_indices() {
            let position = Vector3::from(displacements[current].positions[vertex]);
            let mut normal_sum = Vector3::from(displacements[current].normals[vertex]);
            let mut tangent_sum = Vector3::from(displacements[current].tangents[vertex]);
            let mut coincident = 1u32;

            for &neighbor in &neighbors {
                for other in displacements[neighbor].boundary_vertex_indices() {
                    let other_position = Vector3::from(displacements[neighbor].positions[other]);
                    if (other_position - position).magnitude2() < epsilon_squared {
                        normal_sum += Vector3::from(displacements[neighbor].normals[other]);
                        tangent_sum += Vector3::from(displacements[neighbor].tangents[other]);
                        coincident += 1;
                    }
                }
            }

            if coincident > 1 {
                updates[current].push((
                    vertex,
                    normalize_or_zero(normal_sum),
                    normalize_or_zero(tangent_sum),
                ));
            }
        }
    }

    for (displacement, updates) in displacements.iter_mut().zip(updates) {
        for (vertex, normal, tangent) in updates {
            displacement.normals[vertex] = normal.into();
            displacement.tangents[vertex] = tangent.into();
        }
    }
}
