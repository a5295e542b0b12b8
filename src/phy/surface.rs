use super::data::{
    CompactEdge, CompactSurfaceHeader, CompactTriangle, Ledge, LedgeNode, ModelType, Solid,
    SurfaceHeader,
};
use crate::data::{Vector, Vector4};
use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use ahash::AHashMap;

/// Parses solids from each surface in `data`, which must start at the first
/// surface header. Returns the solids together with the total number of
/// bytes consumed, so the caller can locate the text section that follows
/// the surfaces in both .phy files and the BSP physics lump.
pub fn parse_surfaces(data: &[u8], solid_count: usize) -> Result<(Vec<Solid>, usize)> {
    let view = OffsetDataView::new(data);

    let mut solids = Vec::with_capacity(solid_count);
    let mut offset = 0i64;
    for _ in 0..solid_count {
        let surface_header: SurfaceHeader =
            view.parse_struct(offset, "failed to parse surface header")?;

        let body = view.with_absolute_offset((offset + SurfaceHeader::SIZE as i64) as usize)?;
        solids.append(&mut parse_surface(&surface_header, &body)?);

        offset += surface_header.size as i64 + 4;
    }

    Ok((solids, offset as usize))
}

fn parse_surface(surface_header: &SurfaceHeader, data: &OffsetDataView) -> Result<Vec<Solid>> {
    match ModelType::try_from(surface_header.model_type) {
        Ok(ModelType::IvpCompactSurface) => parse_compact_surface(data),
        Ok(other) => Err(Error::InvalidBody(format!(
            "unsupported surface model type {other:?}"
        ))),
        Err(_) => Err(Error::InvalidBody(format!(
            "unrecognised surface model type {}",
            surface_header.model_type
        ))),
    }
}

fn parse_compact_surface(data: &OffsetDataView) -> Result<Vec<Solid>> {
    let (surface_header, header_offset) = data
        .parse_struct_with_offset::<CompactSurfaceHeader>(
            0,
            "failed to parse compact surface header",
        )?;

    let root_node = header_offset as i64
        + CompactSurfaceHeader::MASS_CENTRE_OFFSET as i64
        + surface_header.offset_ledgetree_root as i64;

    let node_data = data.with_absolute_offset(0)?;

    let mut solids = Vec::new();
    let mut node_offsets = vec![root_node];

    while let Some(next) = node_offsets.pop() {
        let (node, node_offset) =
            node_data.parse_struct_with_offset::<LedgeNode>(next, "failed to parse ledge node")?;

        if node.is_terminal() {
            let (ledge, ledge_offset) = node_data.parse_struct_with_offset::<Ledge>(
                node_offset as i64 + node.compact_ledge_offset as i64,
                "failed to parse ledge",
            )?;

            solids.push(parse_ledge(
                &ledge,
                surface_header.mass_centre.xyz(),
                &data.with_absolute_offset(ledge_offset)?,
            )?);
        } else {
            // right pushed first so the left child is processed first
            node_offsets.push(node_offset as i64 + node.right_node_offset as i64);
            node_offsets.push(node_offset as i64 + LedgeNode::SIZE as i64);
        }
    }

    Ok(solids)
}

fn parse_ledge(ledge: &Ledge, centre_of_mass: Vector, data: &OffsetDataView) -> Result<Solid> {
    if ledge.triangles_count < 0 {
        return Err(Error::InvalidBody(format!(
            "ledge has a negative triangle count ({})",
            ledge.triangles_count
        )));
    }

    let triangles: Vec<CompactTriangle> = data.parse_array(
        Ledge::SIZE as i64,
        ledge.triangles_count as usize,
        "failed to parse triangle array",
    )?;

    let mut indices = Vec::with_capacity(triangles.len() * 3);
    let mut remapped_indices = AHashMap::new();
    let mut max_vertex_index = 0u16;

    for triangle in &triangles {
        for edge in &triangle.edges {
            indices.push(remap_index(edge, &mut remapped_indices, &mut max_vertex_index));
        }
    }

    let shared_vertex_buffer: Vec<Vector4> = data.parse_array(
        ledge.point_offset as i64,
        max_vertex_index as usize + 1,
        "failed to parse vertex array",
    )?;

    let mut vertices = vec![Vector4::default(); remapped_indices.len()];
    for (&source_index, &dest_index) in &remapped_indices {
        vertices[dest_index as usize] = shared_vertex_buffer[source_index as usize];
    }

    Ok(Solid {
        vertices,
        indices,
        centre_of_mass,
        bone_index: ledge.bone_index,
    })
}

fn remap_index(
    edge: &CompactEdge,
    remapped_indices: &mut AHashMap<u16, u16>,
    max_index: &mut u16,
) -> u16 {
    let index = edge.start_point_index();
    if let Some(&remapped) = remapped_indices.get(&index) {
        return remapped;
    }

    *max_index = (*max_index).max(index);

    let remapped = remapped_indices.len() as u16;
    remapped_indices.insert(index, remapped);

    remapped
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::Vector4;

    fn push_vector4(buffer: &mut Vec<u8>, v: Vector4) {
        for component in [v.x, v.y, v.z, v.w] {
            buffer.extend_from_slice(&component.to_le_bytes());
        }
    }

    fn terminal_node(compact_ledge_offset: i32) -> Vec<u8> {
        let mut node = Vec::new();
        node.extend_from_slice(&0i32.to_le_bytes()); // terminal
        node.extend_from_slice(&compact_ledge_offset.to_le_bytes());
        node.extend_from_slice(&[0; 24]); // centre, radius, box sizes
        node
    }

    fn ledge(point_offset: i32, bone_index: i32, edges: &[[u16; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&point_offset.to_le_bytes());
        bytes.extend_from_slice(&bone_index.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(edges.len() as i16).to_le_bytes());
        bytes.extend_from_slice(&0i16.to_le_bytes());
        for triangle in edges {
            bytes.extend_from_slice(&0u32.to_le_bytes());
            for &start in triangle {
                bytes.extend_from_slice(&(start as u32).to_le_bytes());
            }
        }
        bytes
    }

    /// One compact surface holding one terminal ledge over `pool` points.
    /// Returns the full surface bytes (header included).
    pub(crate) fn single_ledge_surface(
        mass_centre: Vector4,
        bone_index: i32,
        edges: &[[u16; 3]],
        pool: &[Vector4],
    ) -> Vec<u8> {
        let mut body = Vec::new();

        // compact surface header at body offset 0
        body.extend_from_slice(&0i32.to_le_bytes()); // surface_size
        push_vector4(&mut body, Vector4::default()); // drag axis areas + axis map size
        push_vector4(&mut body, mass_centre);
        push_vector4(&mut body, Vector4::default()); // rotation inertia
        body.extend_from_slice(&0f32.to_le_bytes()); // upper limit radius
        body.extend_from_slice(&0u32.to_le_bytes()); // packed byte size
        let ledgetree_root_at = body.len();
        body.extend_from_slice(&0i32.to_le_bytes()); // patched below
        body.extend_from_slice(&[0; 12]); // dummy

        let node_offset = body.len();
        let ledge_offset = node_offset + LedgeNode::SIZE;
        let pool_offset = ledge_offset + Ledge::SIZE + CompactTriangle::SIZE * edges.len();

        body.extend_from_slice(&terminal_node(
            (ledge_offset - node_offset) as i32,
        ));
        body.extend_from_slice(&ledge(
            (pool_offset - ledge_offset) as i32,
            bone_index,
            edges,
        ));
        for &point in pool {
            push_vector4(&mut body, point);
        }

        // the tree root is relative to the mass centre field
        let root = node_offset as i32 - CompactSurfaceHeader::MASS_CENTRE_OFFSET as i32;
        body[ledgetree_root_at..ledgetree_root_at + 4].copy_from_slice(&root.to_le_bytes());

        let mut surface = Vec::new();
        surface.extend_from_slice(&((body.len() + SurfaceHeader::SIZE - 4) as i32).to_le_bytes());
        surface.extend_from_slice(&0i32.to_le_bytes()); // id
        surface.extend_from_slice(&0i16.to_le_bytes()); // version
        surface.extend_from_slice(&0i16.to_le_bytes()); // model type: compact surface
        surface.extend_from_slice(&body);
        surface
    }

    fn pool_of(count: usize) -> Vec<Vector4> {
        (0..count)
            .map(|i| Vector4 {
                x: i as f32,
                y: i as f32 * 10.0,
                z: i as f32 * 100.0,
                w: 0.0,
            })
            .collect()
    }

    #[test]
    fn remap_is_dense_and_in_first_seen_order() {
        let pool = pool_of(8);
        let surface = single_ledge_surface(
            Vector4 {
                x: 1.0,
                y: 2.0,
                z: 3.0,
                w: 0.0,
            },
            3,
            &[[7, 7, 3]],
            &pool,
        );

        let (solids, consumed) = parse_surfaces(&surface, 1).unwrap();

        assert_eq!(consumed, surface.len());
        assert_eq!(1, solids.len());

        let solid = &solids[0];
        assert_eq!(vec![0, 0, 1], solid.indices);
        assert_eq!(2, solid.vertices.len());
        assert_eq!(pool[7], solid.vertices[0]);
        assert_eq!(pool[3], solid.vertices[1]);
        assert_eq!(
            Vector {
                x: 1.0,
                y: 2.0,
                z: 3.0
            },
            solid.centre_of_mass
        );
        assert_eq!(3, solid.bone_index);
    }

    #[test]
    fn dense_remap_covers_every_vertex() {
        let pool = pool_of(6);
        let surface = single_ledge_surface(
            Vector4::default(),
            0,
            &[[0, 2, 4], [4, 2, 5]],
            &pool,
        );

        let (solids, _) = parse_surfaces(&surface, 1).unwrap();
        let solid = &solids[0];

        let max = *solid.indices.iter().max().unwrap() as usize;
        assert_eq!(solid.vertices.len() - 1, max);
        for triangle in solid.indices.chunks(3) {
            assert!(triangle[0] != triangle[1]);
            assert!(triangle[1] != triangle[2]);
            assert!(triangle[0] != triangle[2]);
        }
    }

    #[test]
    fn rejects_non_compact_model_types() {
        let pool = pool_of(3);
        let mut surface = single_ledge_surface(Vector4::default(), 0, &[[0, 1, 2]], &pool);
        surface[10..12].copy_from_slice(&1i16.to_le_bytes()); // IVPMOPP

        assert!(matches!(
            parse_surfaces(&surface, 1),
            Err(Error::InvalidBody(_))
        ));
    }

    #[test]
    fn consumed_bytes_span_all_surfaces() {
        let pool = pool_of(3);
        let mut data = single_ledge_surface(Vector4::default(), 0, &[[0, 1, 2]], &pool);
        let first = data.len();
        data.extend_from_slice(&single_ledge_surface(
            Vector4::default(),
            1,
            &[[1, 0, 2]],
            &pool,
        ));

        let (solids, consumed) = parse_surfaces(&data, 2).unwrap();

        assert_eq!(2, solids.len());
        assert_eq!(first * 2, consumed);
        assert_eq!(data.len(), consumed);
        assert_eq!(1, solids[1].bone_index);
    }
}
