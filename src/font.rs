use std::collections::BTreeSet;

use crate::buffer::{Buffer, GlyphPropsFlags};
use crate::plan::ShapePlan;

/// Glyph extents.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphExtents {
    /// Left side of glyph from origin.
    pub x_bearing: i32,
    /// Top side of glyph from origin.
    pub y_bearing: i32,
    /// Distance from left to right side.
    pub width: i32,
    /// Distance from top to bottom side.
    pub height: i32,
}

/// A pre-built size variant of a stretchable glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MathGlyphVariant {
    /// The variant glyph.
    pub glyph: u32,
    /// Advance along the stretch axis.
    pub advance: i32,
}

/// One part of a glyph assembly.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct MathGlyphPart {
    /// The part glyph.
    pub glyph: u32,
    /// Length of the connector at the start of the part.
    pub start_connector_length: i32,
    /// Length of the connector at the end of the part.
    pub end_connector_length: i32,
    /// Advance along the stretch axis.
    ///
    /// Positive values point rightward or upward.
    pub full_advance: i32,
    /// Whether the part may be repeated.
    pub is_extender: bool,
}

/// Everything a font knows about stretching one glyph along one axis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MathGlyphConstruction {
    /// Size variants, ordered from smallest to largest.
    pub variants: Vec<MathGlyphVariant>,
    /// Assembly parts, ordered from start to end.
    pub assembly: Option<Vec<MathGlyphPart>>,
}

/// Font-wide metrics.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    HorizontalAscender,
    HorizontalDescender,
    HorizontalLineGap,
    HorizontalClippingAscent,
    HorizontalClippingDescent,
    VerticalAscender,
    VerticalDescender,
    VerticalLineGap,
    XHeight,
    CapHeight,
    SubscriptEmXSize,
    SubscriptEmYSize,
    SubscriptEmXOffset,
    SubscriptEmYOffset,
    SuperscriptEmXSize,
    SuperscriptEmYSize,
    SuperscriptEmXOffset,
    SuperscriptEmYOffset,
    StrikeoutSize,
    StrikeoutOffset,
    UnderlineSize,
    UnderlineOffset,
}

/// Read-only access to the font data shaping and stretching consume.
///
/// Coordinates use a y-up convention: vertical advances are negative.
/// Every query has a fallback, so an implementation only needs the
/// glyph mapping and horizontal advances.
pub trait Font {
    /// Returns font units per EM.
    fn units_per_em(&self) -> i32;

    /// Returns the nominal glyph of a character.
    fn nominal_glyph(&self, c: char) -> Option<u32>;

    /// Returns the glyph of a character followed by a variation selector.
    fn variation_glyph(&self, _c: char, _variation: char) -> Option<u32> {
        None
    }

    /// Returns the horizontal advance of a glyph.
    fn glyph_h_advance(&self, glyph: u32) -> i32;

    /// Returns the vertical advance of a glyph.
    fn glyph_v_advance(&self, _glyph: u32) -> i32 {
        -self.units_per_em()
    }

    /// Returns the origin of a glyph in horizontal layout.
    fn glyph_h_origin(&self, _glyph: u32) -> (i32, i32) {
        (0, 0)
    }

    /// Returns the origin of a glyph in vertical layout.
    fn glyph_v_origin(&self, glyph: u32) -> (i32, i32) {
        let ascender = self
            .metric(Metric::HorizontalAscender)
            .unwrap_or(self.units_per_em());
        (self.glyph_h_advance(glyph) / 2, ascender)
    }

    /// Returns the horizontal kerning between two glyphs.
    fn glyph_h_kerning(&self, _left: u32, _right: u32) -> i32 {
        0
    }

    /// Returns the vertical kerning between two glyphs.
    fn glyph_v_kerning(&self, _left: u32, _right: u32) -> i32 {
        0
    }

    /// Returns glyph extents.
    fn glyph_extents(&self, _glyph: u32) -> Option<GlyphExtents> {
        None
    }

    /// Returns a glyph name.
    fn glyph_name(&self, _glyph: u32) -> Option<String> {
        None
    }

    /// Whether the font defines glyph classes.
    fn has_glyph_classes(&self) -> bool {
        false
    }

    /// Returns the class of a glyph as defined by the font.
    fn glyph_class(&self, _glyph: u32) -> GlyphPropsFlags {
        GlyphPropsFlags::empty()
    }

    /// Whether the font has a positioning table.
    fn has_positioning(&self) -> bool {
        false
    }

    /// Returns a font-wide metric.
    fn metric(&self, _metric: Metric) -> Option<i32> {
        None
    }

    /// Whether the font has math data.
    fn has_math_data(&self) -> bool {
        false
    }

    /// Returns the minimum overlap of connecting assembly parts.
    fn math_min_connector_overlap(&self, _horizontal: bool) -> i32 {
        0
    }

    /// Returns how to stretch a glyph along an axis.
    fn math_glyph_construction(
        &self,
        _glyph: u32,
        _horizontal: bool,
    ) -> Option<MathGlyphConstruction> {
        None
    }

    /// Called once before any substitution, ahead of glyph classes being
    /// assigned.
    fn substitute_start(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Applies substitution lookups for the mask bits set in the buffer.
    fn substitute(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Called once after the last substitution.
    fn substitute_finish(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Called once before default advances are assigned.
    fn position_start(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Applies positioning lookups for the mask bits set in the buffer.
    fn position(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Called once after positioning and mark zeroing, before fallback
    /// kerning.
    ///
    /// A layout engine resolves attachment offsets here.
    fn position_finish(&self, _plan: &ShapePlan, _buffer: &mut Buffer) {}

    /// Adds every glyph substitution can reach from `glyphs`.
    fn substitute_closure(&self, _plan: &ShapePlan, _glyphs: &mut BTreeSet<u32>) {}
}
