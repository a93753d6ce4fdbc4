//! Core shared types and errors (renderer-agnostic).

use std::fmt;

use thiserror::Error;

/// Floats per position (x, y, z).
pub const POSITION_COMPONENTS: usize = 3;
/// Floats per texture coordinate (u, v).
pub const TEXCOORD_COMPONENTS: usize = 2;
/// Floats per normal (nx, ny, nz).
pub const NORMAL_COMPONENTS: usize = 3;

/// Which optional attributes every vertex of a model carries.
///
/// Decided once for the whole model; faces may not disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// `v`
    #[default]
    PositionOnly,
    /// `v/vt`
    PositionTexture,
    /// `v/vt/vn`
    PositionTextureNormal,
}

impl VertexFormat {
    pub fn has_texture(self) -> bool {
        !matches!(self, Self::PositionOnly)
    }

    pub fn has_normal(self) -> bool {
        matches!(self, Self::PositionTextureNormal)
    }

    /// Distance between consecutive vertices, in floats.
    pub fn stride_floats(self) -> usize {
        let mut stride = POSITION_COMPONENTS;
        if self.has_texture() {
            stride += TEXCOORD_COMPONENTS;
        }
        if self.has_normal() {
            stride += NORMAL_COMPONENTS;
        }
        stride
    }

    /// Offset of the texture coordinate inside a vertex, in floats.
    pub fn texture_offset_floats(self) -> Option<usize> {
        self.has_texture().then_some(POSITION_COMPONENTS)
    }

    /// Offset of the normal inside a vertex, in floats.
    pub fn normal_offset_floats(self) -> Option<usize> {
        if !self.has_normal() {
            return None;
        }
        let texture = if self.has_texture() {
            TEXCOORD_COMPONENTS
        } else {
            0
        };
        Some(POSITION_COMPONENTS + texture)
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PositionOnly => "v",
            Self::PositionTexture => "v/vt",
            Self::PositionTextureNormal => "v/vt/vn",
        })
    }
}

/// A raw attribute stream of the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    TextureCoord,
    Normal,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Position => "position",
            Self::TextureCoord => "texture coordinate",
            Self::Normal => "normal",
        })
    }
}

/// Errors raised while parsing or packing a model. Line numbers are 1-based.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("line {line}: malformed `{directive}` directive, expected {expected} numeric fields: '{text}'")]
    MalformedVertex {
        line: usize,
        directive: &'static str,
        expected: usize,
        text: String,
    },

    #[error("line {line}: a face must have at least 3 vertices, found {found}")]
    TooFewFaceVertices { line: usize, found: usize },

    #[error("line {line}: a vertex can only be specified as v, v/t, or v/t/n, found '{token}'")]
    InvalidVertexReference { line: usize, token: String },

    #[error("line {line}: {attribute} index {index} in '{token}' is out of range ({declared} declared)")]
    IndexOutOfRange {
        line: usize,
        token: String,
        attribute: Attribute,
        index: i64,
        declared: usize,
    },

    #[error("line {line}: vertex '{token}' uses format {found}, but the model uses {expected}")]
    InconsistentVertexFormat {
        line: usize,
        token: String,
        expected: VertexFormat,
        found: VertexFormat,
    },

    #[error("{vertices} packed vertices do not fit in 16-bit indices (max {max})", max = u16::MAX)]
    IndexOverflow { vertices: usize },
}

impl FormatError {
    /// Source line the error points at, if it belongs to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedVertex { line, .. }
            | Self::TooFewFaceVertices { line, .. }
            | Self::InvalidVertexReference { line, .. }
            | Self::IndexOutOfRange { line, .. }
            | Self::InconsistentVertexFormat { line, .. } => Some(*line),
            Self::IndexOverflow { .. } => None,
        }
    }
}

pub type FormatResult<T> = Result<T, FormatError>;
