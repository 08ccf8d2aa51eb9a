/*!
`stretchybuzz` shapes text into positioned glyphs and stretches math glyphs
such as brackets and radicals to arbitrary sizes.

Shaping runs a harfbuzz-style pipeline over a [`UnicodeBuffer`] using a
[`ShapePlan`]. Font data is read through the [`Font`] trait; [`Face`]
implements it on top of `ttf-parser`. Stretching lives in [`stretch`].
*/

#![warn(missing_docs)]

mod buffer;
mod common;
mod complex;
mod face;
mod font;
mod math;
mod ot;
mod plan;
mod plan_cache;
mod shape;
mod unicode;

pub mod backend;

pub use crate::buffer::{
    Buffer, BufferFlags, ContentType, GlyphBuffer, GlyphInfo, GlyphPosition, GlyphPropsFlags,
    SerializeFlags, UnicodeBuffer,
};
pub use crate::common::{feature, script, Direction, Feature, Language, Script, Tag};
pub use crate::complex::{
    complex_categorize, layout_position, layout_substitute, ComplexShaper, ShaperData,
    ZeroWidthMarksMode, DEFAULT_SHAPER, MAX_COMBINING_MARKS, THAI_SHAPER,
};
pub use crate::face::Face;
pub use crate::font::{
    Font, GlyphExtents, MathGlyphConstruction, MathGlyphPart, MathGlyphVariant, Metric,
};
pub use crate::math::{stretch, stretch_max_orthogonal_advance, MAX_PARTS};
pub use crate::ot::{
    ComposeFn, DecomposeFn, FeatureFlags, FeatureMap, Map, MapBuilder, NormalizationMode,
    NormalizeContext,
};
pub use crate::plan::{ShapePlan, ShapePlanKey, ShapePlanner};
pub use crate::plan_cache::ShapePlanCache;
pub use crate::shape::{glyphs_closure, shape, shape_buffer, shape_with_plan};

/// Per-glyph feature bits.
pub type Mask = u32;
