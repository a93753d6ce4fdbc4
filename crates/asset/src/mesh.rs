//! Packed model buffers handed to the rendering layer.

use corelib::{NORMAL_COMPONENTS, POSITION_COMPONENTS, TEXCOORD_COMPONENTS, VertexFormat};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Triangle-list indices, 16-bit when the vertex count allows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexBuffer {
    fn default() -> Self {
        Self::U16(Vec::new())
    }
}

impl IndexBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one index in bytes.
    pub fn width_bytes(&self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            Self::U16(v) => v.iter().map(|&i| u32::from(i)).collect(),
            Self::U32(v) => v.clone(),
        }
    }

    /// Raw bytes in native endianness, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One vertex attribute inside the interleaved buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader binding name.
    pub name: &'static str,
    /// Number of `f32` components.
    pub components: usize,
    pub offset_bytes: usize,
}

/// Interleaved vertex floats (position, [texcoord], [normal]) plus indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelBuffers {
    pub vertices: Vec<f32>,
    pub indices: IndexBuffer,
    pub format: VertexFormat,
    pub material_library: Option<String>,
}

impl ModelBuffers {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.stride_floats()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn stride_floats(&self) -> usize {
        self.format.stride_floats()
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_floats() * F32_BYTES
    }

    pub fn texture_offset_bytes(&self) -> Option<usize> {
        self.format.texture_offset_floats().map(|o| o * F32_BYTES)
    }

    pub fn normal_offset_bytes(&self) -> Option<usize> {
        self.format.normal_offset_floats().map(|o| o * F32_BYTES)
    }

    /// Attribute layout in buffer order, named for shader binding.
    pub fn attributes(&self) -> Vec<VertexAttribute> {
        let mut attrs = vec![VertexAttribute {
            name: "position",
            components: POSITION_COMPONENTS,
            offset_bytes: 0,
        }];
        if let Some(offset_bytes) = self.texture_offset_bytes() {
            attrs.push(VertexAttribute {
                name: "textureCoord",
                components: TEXCOORD_COMPONENTS,
                offset_bytes,
            });
        }
        if let Some(offset_bytes) = self.normal_offset_bytes() {
            attrs.push(VertexAttribute {
                name: "normal",
                components: NORMAL_COMPONENTS,
                offset_bytes,
            });
        }
        attrs
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Returns `true` if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}
