//! Asset loading/parsers.
//! OBJ text parser and GPU-buffer packer producing interleaved vertex data
//! plus a triangle-list index buffer.

pub mod mesh;
pub mod obj;
pub mod pack;

pub use corelib::{Attribute, FormatError, FormatResult, VertexFormat};
pub use mesh::{IndexBuffer, ModelBuffers, VertexAttribute};
pub use obj::{
    Face, FaceVertexRef, ParseResult, load_obj_from_path, load_obj_from_reader, load_obj_from_str,
    parse_obj,
};
pub use pack::{IndexWidth, PackOptions, pack, pack_with};
