mod thai;

use crate::buffer::Buffer;
use crate::common::{script, Direction, Script};
use crate::font::Font;
use crate::ot::fallback;
use crate::ot::normalize::{ComposeFn, DecomposeFn, NormalizationMode};
use crate::plan::{ShapePlan, ShapePlanner};

pub use thai::THAI_SHAPER;

/// Longest run of marks the normalizer reorders.
pub const MAX_COMBINING_MARKS: usize = 32;

/// When mark advances get zeroed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZeroWidthMarksMode {
    /// Never.
    None,
    /// Right after default positioning, for glyphs the font classifies as marks.
    ByGdef,
    /// After complex positioning, for non-spacing marks.
    ByUnicode,
}

/// Data compiled once per plan and kept for the shaper's hooks.
pub type ShaperData = Box<dyn std::any::Any + Send + Sync>;

/// A script-specific strategy.
///
/// Every hook is optional; an absent hook does nothing. The strategy is
/// picked once when a plan is built and is stored in it.
pub struct ComplexShaper {
    /// Adds features before the common set.
    pub collect_features: Option<fn(&mut ShapePlanner)>,

    /// Adjusts features after the common set. Later requests win.
    pub override_features: Option<fn(&mut ShapePlanner)>,

    /// Builds strategy-private data, available through [`ShapePlan::data`].
    pub create_data: Option<fn(&ShapePlan) -> ShaperData>,

    /// Rewrites the text before normalization.
    pub preprocess_text: Option<fn(&ShapePlan, &dyn Font, &mut Buffer)>,

    /// How to normalize.
    pub normalization_mode: NormalizationMode,

    /// Overrides Unicode decomposition.
    pub decompose: Option<DecomposeFn>,

    /// Overrides Unicode composition.
    pub compose: Option<ComposeFn>,

    /// Sets per-glyph mask bits after the global mask is applied.
    pub setup_masks: Option<fn(&ShapePlan, &dyn Font, &mut Buffer)>,

    /// Applies substitutions.
    pub substitute: Option<fn(&ShapePlan, &dyn Font, &mut Buffer)>,

    /// Applies positioning. Only called for fonts with a positioning table.
    pub position: Option<fn(&ShapePlan, &dyn Font, &mut Buffer)>,

    /// When to zero mark advances.
    pub zero_width_marks: ZeroWidthMarksMode,

    /// Positions marks for fonts without a positioning table.
    pub fallback_position: Option<fn(&ShapePlan, &dyn Font, &mut Buffer)>,
}

impl std::fmt::Debug for ComplexShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ComplexShaper")
            .field("normalization_mode", &self.normalization_mode)
            .field("zero_width_marks", &self.zero_width_marks)
            .finish_non_exhaustive()
    }
}

/// Hands substitution to the font's layout engine.
pub fn layout_substitute(plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) {
    font.substitute(plan, buffer);
}

/// Hands positioning to the font's layout engine.
pub fn layout_position(plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) {
    font.position(plan, buffer);
}

/// The strategy for scripts without special needs.
pub static DEFAULT_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: None,
    normalization_mode: NormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    substitute: Some(layout_substitute),
    position: Some(layout_position),
    zero_width_marks: ZeroWidthMarksMode::ByUnicode,
    fallback_position: Some(fallback::position_marks),
};

/// Picks the strategy for a script.
pub fn complex_categorize(script: Script, _direction: Direction) -> &'static ComplexShaper {
    match script {
        script::THAI | script::LAO => &THAI_SHAPER,
        _ => &DEFAULT_SHAPER,
    }
}
