//! Entry point for meshpack.
//! Loads an OBJ model, packs it for GPU upload and reports the buffer layout.

use anyhow::{Result, anyhow};
use asset::{IndexWidth, ModelBuffers, PackOptions};

fn parse_model_arg() -> Option<String> {
    // Accept: --model=<path>, or the first positional argument
    let mut positional = None;
    for arg in std::env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--model=") {
            return Some(val.to_string());
        }
        if positional.is_none() && !arg.starts_with("--") {
            positional = Some(arg);
        }
    }
    positional
}

fn parse_index_width_arg() -> IndexWidth {
    // Accept: --index-width=auto|16|32
    let mut width = IndexWidth::Auto;
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--index-width=") {
            width = match val.to_ascii_lowercase().as_str() {
                "auto" => IndexWidth::Auto,
                "16" | "u16" => IndexWidth::U16,
                "32" | "u32" => IndexWidth::U32,
                other => {
                    log::warn!("Unknown index width '{}', falling back to auto.", other);
                    IndexWidth::Auto
                }
            };
        }
    }
    width
}

fn parse_dump_arg() -> bool {
    // --dump[=on|off], off by default
    for arg in std::env::args() {
        if arg == "--dump" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--dump=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn report(model: &ModelBuffers) {
    log::info!(
        "format={} vertices={} indices={} triangles={} index_width={}B",
        model.format,
        model.vertex_count(),
        model.index_count(),
        model.triangle_count(),
        model.indices.width_bytes()
    );
    log::info!(
        "stride={}B texture_offset={:?} normal_offset={:?} material_library={:?}",
        model.stride_bytes(),
        model.texture_offset_bytes(),
        model.normal_offset_bytes(),
        model.material_library
    );
    for attr in model.attributes() {
        log::debug!(
            "attribute '{}': {} x f32 at offset {}",
            attr.name,
            attr.components,
            attr.offset_bytes
        );
    }
    if model.is_empty() {
        log::warn!("Model contains no triangles.");
    }
}

fn dump(model: &ModelBuffers) {
    for vertex in model.vertices.chunks(model.stride_floats()) {
        println!("v {:?}", vertex);
    }
    for tri in model.indices.to_u32_vec().chunks(3) {
        println!("t {:?}", tri);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = parse_model_arg().ok_or_else(|| {
        anyhow!("Usage: meshpack --model=<file.obj> [--index-width=auto|16|32] [--dump]")
    })?;
    let options = PackOptions {
        index_width: parse_index_width_arg(),
    };
    let show_dump = parse_dump_arg();
    log::info!(
        "Starting meshpack. model={}, index_width={:?}, dump={}",
        path,
        options.index_width,
        show_dump
    );

    let model = asset::load_obj_from_path(&path, options)?;
    report(&model);
    if show_dump {
        dump(&model);
    }

    Ok(())
}
