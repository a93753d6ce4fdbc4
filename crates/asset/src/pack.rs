//! Packer: deduplicates face corners into interleaved vertices and fan-triangulates faces.
//!
//! Fan triangulation is only correct for convex, planar polygons. Other polygons
//! still produce a well-formed index buffer, just not the intended surface.

use std::collections::{HashMap, hash_map::Entry};

use corelib::{Attribute, FormatError, FormatResult, VertexFormat};

use crate::{
    mesh::{IndexBuffer, ModelBuffers},
    obj::{Face, FaceVertexRef, ParseResult},
};

/// Largest vertex count addressable with 16-bit indices.
const MAX_U16_VERTICES: usize = u16::MAX as usize;

/// Index buffer element width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexWidth {
    /// 16-bit, widening to 32-bit when the vertex count requires it.
    #[default]
    Auto,
    /// 16-bit; fails with [`FormatError::IndexOverflow`] on large models.
    U16,
    U32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackOptions {
    pub index_width: IndexWidth,
}

/// Dedup key with a fixed arity; absent components use [`PackKey::ABSENT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PackKey {
    position: usize,
    texture: usize,
    normal: usize,
}

impl PackKey {
    const ABSENT: usize = usize::MAX;
}

impl From<&FaceVertexRef> for PackKey {
    fn from(v: &FaceVertexRef) -> Self {
        Self {
            position: v.position,
            texture: v.texture.unwrap_or(Self::ABSENT),
            normal: v.normal.unwrap_or(Self::ABSENT),
        }
    }
}

/// Pack parsed data with default options.
pub fn pack(parsed: &ParseResult) -> FormatResult<ModelBuffers> {
    pack_with(parsed, PackOptions::default())
}

/// Pack parsed data into interleaved vertices and triangle-list indices.
///
/// Distinct (position, texcoord, normal) combinations become distinct vertices,
/// numbered in first-seen order.
pub fn pack_with(parsed: &ParseResult, options: PackOptions) -> FormatResult<ModelBuffers> {
    let format = model_format(&parsed.faces)?;
    let stride = format.stride_floats();

    let mut unique: HashMap<PackKey, u32> = HashMap::new();
    let mut vertices: Vec<f32> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut face_indices: Vec<u32> = Vec::new();

    for face in &parsed.faces {
        face_indices.clear();
        for vref in &face.vertices {
            let index = match unique.entry(PackKey::from(vref)) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    let idx = u32::try_from(vertices.len() / stride).map_err(|_| {
                        FormatError::IndexOverflow {
                            vertices: vertices.len() / stride,
                        }
                    })?;
                    push_vertex(&mut vertices, parsed, vref, face.line)?;
                    *e.insert(idx)
                }
            };
            face_indices.push(index);
        }

        // Triangulate fan
        for tri in 1..face_indices.len().saturating_sub(1) {
            indices.push(face_indices[0]);
            indices.push(face_indices[tri]);
            indices.push(face_indices[tri + 1]);
        }
    }

    let indices = narrow_indices(indices, vertices.len() / stride, options.index_width)?;

    Ok(ModelBuffers {
        vertices,
        indices,
        format,
        material_library: parsed.material_library.clone(),
    })
}

/// The single format shared by every face corner; position-only for an empty model.
///
/// Also rejects faces with fewer than 3 corners and `v//vn` shaped corners.
fn model_format(faces: &[Face]) -> FormatResult<VertexFormat> {
    let Some(expected) = faces.first().map(Face::format) else {
        return Ok(VertexFormat::default());
    };
    for face in faces {
        if face.vertices.len() < 3 {
            return Err(FormatError::TooFewFaceVertices {
                line: face.line,
                found: face.vertices.len(),
            });
        }
        for vref in &face.vertices {
            if vref.texture.is_none() && vref.normal.is_some() {
                return Err(FormatError::InvalidVertexReference {
                    line: face.line,
                    token: vref.to_string(),
                });
            }
            let found = vref.format();
            if found != expected {
                return Err(FormatError::InconsistentVertexFormat {
                    line: face.line,
                    token: vref.to_string(),
                    expected,
                    found,
                });
            }
        }
    }
    Ok(expected)
}

fn push_vertex(
    out: &mut Vec<f32>,
    parsed: &ParseResult,
    vref: &FaceVertexRef,
    line: usize,
) -> FormatResult<()> {
    let position = lookup(&parsed.positions, vref.position, Attribute::Position, vref, line)?;
    out.extend_from_slice(position);
    if let Some(t) = vref.texture {
        out.extend_from_slice(lookup(&parsed.texcoords, t, Attribute::TextureCoord, vref, line)?);
    }
    if let Some(n) = vref.normal {
        out.extend_from_slice(lookup(&parsed.normals, n, Attribute::Normal, vref, line)?);
    }
    Ok(())
}

fn lookup<'a, const N: usize>(
    list: &'a [[f32; N]],
    index: usize,
    attribute: Attribute,
    vref: &FaceVertexRef,
    line: usize,
) -> FormatResult<&'a [f32; N]> {
    list.get(index).ok_or_else(|| FormatError::IndexOutOfRange {
        line,
        token: vref.to_string(),
        attribute,
        index: index as i64 + 1,
        declared: list.len(),
    })
}

fn narrow_indices(indices: Vec<u32>, vertex_count: usize, width: IndexWidth) -> FormatResult<IndexBuffer> {
    let fits_u16 = vertex_count <= MAX_U16_VERTICES;
    match width {
        IndexWidth::U32 => Ok(IndexBuffer::U32(indices)),
        IndexWidth::Auto if !fits_u16 => Ok(IndexBuffer::U32(indices)),
        IndexWidth::U16 if !fits_u16 => Err(FormatError::IndexOverflow {
            vertices: vertex_count,
        }),
        IndexWidth::Auto | IndexWidth::U16 => indices
            .into_iter()
            .map(|i| {
                u16::try_from(i).map_err(|_| FormatError::IndexOverflow {
                    vertices: vertex_count,
                })
            })
            .collect::<FormatResult<Vec<u16>>>()
            .map(IndexBuffer::U16),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::parse_obj;

    const TEXTURED_QUAD: &str = r#"
        v 0.0 0.0 0.0
        v 1.0 0.0 0.0
        v 1.0 1.0 0.0
        v 0.0 1.0 0.0
        vt 0.0 0.0
        vt 1.0 0.0
        vt 1.0 1.0
        vt 0.0 1.0
        vn 0.0 0.0 1.0
        vn 0.0 0.0 1.0
        vn 0.0 0.0 1.0
        vn 0.0 0.0 1.0
        f 1/1/1 2/2/2 3/3/3
        f 1/1/1 3/3/3 4/4/4
    "#;

    fn pack_str(src: &str) -> FormatResult<ModelBuffers> {
        pack(&parse_obj(src)?)
    }

    #[test]
    fn triangle_positions_only() {
        let model = pack_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").expect("pack");
        assert_eq!(model.format, VertexFormat::PositionOnly);
        assert_eq!(
            model.vertices,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(model.indices.to_u32_vec(), vec![0, 1, 2]);
        assert_eq!(model.stride_bytes(), 12);
        assert_eq!(model.texture_offset_bytes(), None);
        assert_eq!(model.normal_offset_bytes(), None);
    }

    #[test]
    fn textured_quad_reuses_shared_corners() {
        let model = pack_str(TEXTURED_QUAD).expect("pack");
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.indices, IndexBuffer::U16(vec![0, 1, 2, 0, 2, 3]));
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(model.stride_floats(), 8);
        assert_eq!(model.stride_bytes(), 32);
        assert_eq!(model.texture_offset_bytes(), Some(12));
        assert_eq!(model.normal_offset_bytes(), Some(20));
        // Third packed vertex: position 3, texcoord 3, normal 3.
        assert_eq!(
            &model.vertices[16..24],
            &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn position_texture_layout() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.25\nf 1/1 2/1 3/1\n";
        let model = pack_str(src).expect("pack");
        assert_eq!(model.format, VertexFormat::PositionTexture);
        assert_eq!(model.stride_floats(), 5);
        assert_eq!(&model.vertices[0..5], &[0.0, 0.0, 0.0, 0.5, 0.25]);
        assert_eq!(model.normal_offset_bytes(), None);
    }

    #[test]
    fn polygon_is_fan_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n";
        let model = pack_str(src).expect("pack");
        assert_eq!(
            model.indices.to_u32_vec(),
            vec![0, 1, 2, 0, 2, 3, 0, 3, 4]
        );
        assert_eq!(model.triangle_count(), 3);
    }

    #[test]
    fn triangle_only_counts() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nv 5 5 5\nf 1 2 3\nf 2 4 3\nf 3 2 1\n";
        let model = pack_str(src).expect("pack");
        assert_eq!(model.index_count(), 3 * 3);
        // Position 5 is never referenced.
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.vertices.len(), model.vertex_count() * model.stride_floats());
        let count = model.vertex_count() as u32;
        assert!(model.indices.to_u32_vec().iter().all(|&i| i < count));
    }

    #[test]
    fn same_position_with_different_texcoords_splits() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 1\nf 1/1 2/1 3/1\nf 1/2 3/1 2/1\n";
        let model = pack_str(src).expect("pack");
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.indices.to_u32_vec(), vec![0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn packing_is_deterministic() {
        let a = pack_str(TEXTURED_QUAD).expect("pack");
        let b = pack_str(TEXTURED_QUAD).expect("pack");
        assert_eq!(a.vertex_bytes(), b.vertex_bytes());
        assert_eq!(a.indices.as_bytes(), b.indices.as_bytes());
    }

    #[test]
    fn mtllib_does_not_change_buffers() {
        let with = pack_str(&format!("mtllib square.mtl\n{TEXTURED_QUAD}")).expect("pack");
        let without = pack_str(TEXTURED_QUAD).expect("pack");
        assert_eq!(with.material_library.as_deref(), Some("square.mtl"));
        assert_eq!(without.material_library, None);
        assert_eq!(with.vertices, without.vertices);
        assert_eq!(with.indices, without.indices);
    }

    #[test]
    fn mixing_faces_with_and_without_texcoords_fails() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/1\nf 1 2 3\n";
        let err = pack_str(src).unwrap_err();
        assert_eq!(
            err,
            FormatError::InconsistentVertexFormat {
                line: 6,
                token: "1".into(),
                expected: VertexFormat::PositionTexture,
                found: VertexFormat::PositionOnly,
            }
        );
    }

    #[test]
    fn dangling_reference_in_hand_built_input_fails() {
        let parsed = ParseResult {
            positions: vec![[0.0; 3]; 2],
            faces: vec![Face {
                line: 7,
                vertices: (0..3)
                    .map(|position| FaceVertexRef {
                        position,
                        texture: None,
                        normal: None,
                    })
                    .collect(),
            }],
            ..Default::default()
        };
        let err = pack(&parsed).unwrap_err();
        assert!(matches!(
            err,
            FormatError::IndexOutOfRange {
                line: 7,
                index: 3,
                declared: 2,
                attribute: Attribute::Position,
                ..
            }
        ));
    }

    fn corners(line: usize, texture: Option<usize>, normal: Option<usize>, count: usize) -> Face {
        Face {
            line,
            vertices: (0..count)
                .map(|position| FaceVertexRef {
                    position,
                    texture,
                    normal,
                })
                .collect(),
        }
    }

    #[test]
    fn normal_without_texcoord_in_hand_built_input_fails() {
        let parsed = ParseResult {
            positions: vec![[0.0; 3]; 3],
            normals: vec![[0.0, 0.0, 1.0]],
            faces: vec![corners(4, None, Some(0), 3)],
            ..Default::default()
        };
        let err = pack(&parsed).unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidVertexReference {
                line: 4,
                token: "1//1".into(),
            }
        );
    }

    #[test]
    fn two_corner_face_in_hand_built_input_fails() {
        let parsed = ParseResult {
            positions: vec![[0.0; 3]; 3],
            faces: vec![corners(2, None, None, 3), corners(9, None, None, 2)],
            ..Default::default()
        };
        let err = pack(&parsed).unwrap_err();
        assert_eq!(err, FormatError::TooFewFaceVertices { line: 9, found: 2 });
    }

    #[test]
    fn mixing_faces_with_and_without_normals_fails() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\nf 1/1 2/1 3/1\nf 1/1/1 2/1/1 3/1/1\n";
        let err = pack_str(src).unwrap_err();
        assert_eq!(
            err,
            FormatError::InconsistentVertexFormat {
                line: 7,
                token: "1/1/1".into(),
                expected: VertexFormat::PositionTexture,
                found: VertexFormat::PositionTextureNormal,
            }
        );
    }

    #[test]
    fn narrowing_never_truncates() {
        let err = narrow_indices(vec![0, 1, 70_000], 3, IndexWidth::Auto).unwrap_err();
        assert_eq!(err, FormatError::IndexOverflow { vertices: 3 });
        let ok = narrow_indices(vec![0, 1, 2], 3, IndexWidth::U16).expect("narrow");
        assert_eq!(ok, IndexBuffer::U16(vec![0, 1, 2]));
    }

    #[test]
    fn empty_model_packs_to_empty_buffers() {
        let model = pack_str("# nothing here\nmtllib a.mtl\n").expect("pack");
        assert!(model.is_empty());
        assert_eq!(model.vertex_count(), 0);
        assert_eq!(model.material_library.as_deref(), Some("a.mtl"));
    }

    fn strip(vertex_count: usize) -> ParseResult {
        ParseResult {
            positions: vec![[0.0; 3]; vertex_count],
            faces: (0..vertex_count - 2)
                .map(|i| Face {
                    line: i + 1,
                    vertices: (i..i + 3)
                        .map(|position| FaceVertexRef {
                            position,
                            texture: None,
                            normal: None,
                        })
                        .collect(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn index_width_auto_widens_past_u16() {
        let small = pack(&strip(MAX_U16_VERTICES)).expect("pack");
        assert_eq!(small.indices.width_bytes(), 2);

        let large = pack(&strip(MAX_U16_VERTICES + 1)).expect("pack");
        assert_eq!(large.indices.width_bytes(), 4);
        assert_eq!(large.vertex_count(), MAX_U16_VERTICES + 1);
        assert_eq!(
            large.indices.to_u32_vec().last().copied(),
            Some(MAX_U16_VERTICES as u32)
        );
    }

    #[test]
    fn forced_widths() {
        let options = PackOptions {
            index_width: IndexWidth::U16,
        };
        let err = pack_with(&strip(MAX_U16_VERTICES + 1), options).unwrap_err();
        assert_eq!(
            err,
            FormatError::IndexOverflow {
                vertices: MAX_U16_VERTICES + 1
            }
        );

        let options = PackOptions {
            index_width: IndexWidth::U32,
        };
        let model = pack_with(&strip(3), options).expect("pack");
        assert_eq!(model.indices, IndexBuffer::U32(vec![0, 1, 2]));
    }
}
