//! Convert a layered, CSS-styled SVG drawing into a flat DXF drawing.
//!
//! The conversion runs in two steps:
//!
//! 1. [`Loader`] walks the SVG tree, accumulating transforms, cascaded styles
//!    and class names per branch, and produces a [`Document`] holding a flat
//!    list of [`Primitive`]s in absolute drawing coordinates (millimeters,
//!    Y axis up). Paths are flattened into polylines; embedded SVG images
//!    are loaded recursively.
//! 2. [`convert`] resolves each primitive to a layer, color, line type and
//!    line weight through a [`MappingResolver`] and writes DXF entities into
//!    a [`DrawingSink`], such as the bundled [`DxfDrawing`].
//!
//! Problems with individual elements never abort a conversion. They are
//! collected as warnings on the [`Document`] and the [`ConversionResult`].
//! The only fatal load error is a circular reference between SVG files.
//!
//! ```no_run
//! use std::path::Path;
//! use svg2dxf::{Pipeline, MappingResolver};
//!
//! let pipeline = Pipeline::new(MappingResolver::with_defaults());
//! let document = pipeline.load(Path::new("plan.svg"))?;
//! let result = pipeline.convert(&document, Path::new("plan.dxf"))?;
//! println!("{} entities on {} layers", result.written_entities, result.created_layers.len());
//! # Ok::<(), svg2dxf::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::single_match)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::convert;

pub mod color;
pub mod config;
pub mod dom;
pub mod dxf;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod path;
pub mod pipeline;
pub mod primitive;
pub mod simplify;
pub mod sink;
pub mod style;
pub mod synth;
pub mod transform;
pub mod units;

pub use crate::color::ColorSpec;
pub use crate::config::MappingConfig;
pub use crate::dxf::DxfDrawing;
pub use crate::error::{Error, SinkError};
pub use crate::loader::Loader;
pub use crate::mapping::{LayerAttributes, MappingResolver, MappingRule, Selector};
pub use crate::pipeline::{convert, ConversionResult, Pipeline};
pub use crate::primitive::{Document, DocumentSummary, Primitive, Shape, ViewBox};
pub use crate::sink::DrawingSink;
pub use crate::style::{Style, StyleCascade};
pub use crate::transform::Matrix;

/// A `CoordinatePair` consists of an x and y coordinate.
#[derive(Debug, PartialEq, Copy, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoordinatePair {
    pub x: f64,
    pub y: f64,
}

impl CoordinatePair {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: CoordinatePair) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl convert::From<(f64, f64)> for CoordinatePair {
    fn from(val: (f64, f64)) -> Self {
        Self { x: val.0, y: val.1 }
    }
}

/// A polyline is a vector of `CoordinatePair` instances.
pub type Polyline = Vec<CoordinatePair>;
