//! OBJ parser supporting positions, texture coordinates, normals, faces and `mtllib`.

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::Path,
    str::SplitWhitespace,
};

use anyhow::{Context, Result};
use corelib::{Attribute, FormatError, FormatResult, VertexFormat};

use crate::{
    mesh::ModelBuffers,
    pack::{PackOptions, pack, pack_with},
};

/// One corner of a face: 0-based indices into the raw attribute lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceVertexRef {
    pub position: usize,
    pub texture: Option<usize>,
    pub normal: Option<usize>,
}

impl FaceVertexRef {
    pub fn format(&self) -> VertexFormat {
        match (self.texture, self.normal) {
            (None, _) => VertexFormat::PositionOnly,
            (Some(_), None) => VertexFormat::PositionTexture,
            (Some(_), Some(_)) => VertexFormat::PositionTextureNormal,
        }
    }
}

/// Formats the reference back to its 1-based source form.
impl fmt::Display for FaceVertexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.position + 1)?;
        match (self.texture, self.normal) {
            (Some(t), Some(n)) => write!(f, "/{}/{}", t + 1, n + 1),
            (Some(t), None) => write!(f, "/{}", t + 1),
            (None, Some(n)) => write!(f, "//{}", n + 1),
            (None, None) => Ok(()),
        }
    }
}

/// A polygon of at least three corners sharing one [`VertexFormat`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Face {
    /// 1-based source line.
    pub line: usize,
    pub vertices: Vec<FaceVertexRef>,
}

impl Face {
    pub fn format(&self) -> VertexFormat {
        self.vertices
            .first()
            .map(FaceVertexRef::format)
            .unwrap_or_default()
    }
}

/// Raw attribute lists and faces, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseResult {
    pub positions: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub faces: Vec<Face>,
    pub material_library: Option<String>,
}

/// Load and pack an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>, options: PackOptions) -> Result<ModelBuffers> {
    let path = path.as_ref();
    log::info!("Loading OBJ model from {:?}", path);
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    let model = load_obj_from_reader(BufReader::new(file), options)
        .with_context(|| format!("Failed to load OBJ file: {}", path.display()))?;
    log::info!(
        "Loaded OBJ model: {} vertices, {} indices",
        model.vertex_count(),
        model.index_count()
    );
    log::debug!("Index buffer width: {} bytes", model.indices.width_bytes());
    Ok(model)
}

/// Load and pack an OBJ mesh from any [`Read`] implementation.
pub fn load_obj_from_reader<R: Read>(mut reader: R, options: PackOptions) -> Result<ModelBuffers> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .context("Failed to read OBJ data")?;
    let parsed = parse_obj(&contents)?;
    Ok(pack_with(&parsed, options)?)
}

/// Convenience helper to parse and pack an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> FormatResult<ModelBuffers> {
    pack(&parse_obj(contents)?)
}

/// Parse OBJ text into raw attribute lists and faces.
///
/// Face references must point at attributes declared on earlier lines; this
/// includes normal indices, so `f 1/1/1 ...` needs at least one `vn` line before
/// it. Unknown directives and `#` comments are skipped.
pub fn parse_obj(text: &str) -> FormatResult<ParseResult> {
    let mut parsed = ParseResult::default();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => {
                let p = parse_components::<3>(parts, "v", line_no, trimmed)?;
                parsed.positions.push(p);
            }
            "vt" => {
                let t = parse_components::<2>(parts, "vt", line_no, trimmed)?;
                parsed.texcoords.push(t);
            }
            "vn" => {
                let n = parse_components::<3>(parts, "vn", line_no, trimmed)?;
                parsed.normals.push(n);
            }
            "mtllib" => {
                // Filenames may contain spaces; keep the rest of the line verbatim.
                let name = trimmed[tag.len()..].trim();
                if !name.is_empty() {
                    parsed.material_library = Some(name.to_owned());
                }
            }
            "f" => {
                let face = parse_face(parts, &parsed, line_no)?;
                parsed.faces.push(face);
            }
            _ => {
                // Ignore other directives (o/g/s/usemtl/etc.)
            }
        }
    }

    Ok(parsed)
}

fn parse_components<const N: usize>(
    parts: SplitWhitespace<'_>,
    directive: &'static str,
    line_no: usize,
    text: &str,
) -> FormatResult<[f32; N]> {
    let malformed = || FormatError::MalformedVertex {
        line: line_no,
        directive,
        expected: N,
        text: text.to_owned(),
    };

    let fields: Vec<&str> = parts.collect();
    if fields.len() != N {
        return Err(malformed());
    }
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = field.parse::<f32>().map_err(|_| malformed())?;
    }
    Ok(out)
}

fn parse_face(parts: SplitWhitespace<'_>, parsed: &ParseResult, line_no: usize) -> FormatResult<Face> {
    let tokens: Vec<&str> = parts.collect();
    if tokens.len() < 3 {
        return Err(FormatError::TooFewFaceVertices {
            line: line_no,
            found: tokens.len(),
        });
    }

    let mut vertices: Vec<FaceVertexRef> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let vref = parse_face_vertex(token, parsed, line_no)?;
        if let Some(first) = vertices.first().map(FaceVertexRef::format) {
            if vref.format() != first {
                return Err(FormatError::InconsistentVertexFormat {
                    line: line_no,
                    token: token.to_owned(),
                    expected: first,
                    found: vref.format(),
                });
            }
        }
        vertices.push(vref);
    }

    Ok(Face {
        line: line_no,
        vertices,
    })
}

fn parse_face_vertex(token: &str, parsed: &ParseResult, line_no: usize) -> FormatResult<FaceVertexRef> {
    let mut fields = token.split('/');
    let (position, texture, normal, extra) =
        (fields.next(), fields.next(), fields.next(), fields.next());
    if extra.is_some() {
        return Err(FormatError::InvalidVertexReference {
            line: line_no,
            token: token.to_owned(),
        });
    }

    let resolve = |field: Option<&str>, attribute, declared| {
        field
            .map(|f| resolve_index(f, attribute, declared, token, line_no))
            .transpose()
    };

    let position = resolve(position, Attribute::Position, parsed.positions.len())?.ok_or_else(
        || FormatError::InvalidVertexReference {
            line: line_no,
            token: token.to_owned(),
        },
    )?;
    let texture = resolve(texture, Attribute::TextureCoord, parsed.texcoords.len())?;
    let normal = resolve(normal, Attribute::Normal, parsed.normals.len())?;

    Ok(FaceVertexRef {
        position,
        texture,
        normal,
    })
}

/// Convert a 1-based index field to a 0-based index into a list of `declared` items.
fn resolve_index(
    field: &str,
    attribute: Attribute,
    declared: usize,
    token: &str,
    line_no: usize,
) -> FormatResult<usize> {
    let raw = field
        .parse::<i64>()
        .map_err(|_| FormatError::InvalidVertexReference {
            line: line_no,
            token: token.to_owned(),
        })?;

    match usize::try_from(raw) {
        Ok(n) if (1..=declared).contains(&n) => Ok(n - 1),
        _ => Err(FormatError::IndexOutOfRange {
            line: line_no,
            token: token.to_owned(),
            attribute,
            index: raw,
            declared,
        }),
    }
}
