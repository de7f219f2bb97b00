//! cutline-export: Pure format serializers (sans-IO)
//!
//! Converts print lines, cutting lines and keyring holes into output
//! formats for the laser cutter. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, to_svg};
