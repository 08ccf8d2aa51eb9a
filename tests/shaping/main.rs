mod pipeline;
mod plans;
mod stretch;

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use parking_lot::Mutex;
use stretchybuzz::{
    Buffer, BufferFlags, Font, GlyphBuffer, GlyphPropsFlags, MathGlyphConstruction,
    SerializeFlags, ShapePlan, Tag,
};

/// An in-memory font. Glyph ids are assigned in insertion order starting
/// at 1; glyph 0 is `.notdef`.
#[derive(Default)]
pub struct TestFont {
    glyphs: Vec<TestGlyph>,
    kerning: HashMap<(u32, u32), i32>,
    v_kerning: HashMap<(u32, u32), i32>,
    marks: Vec<u32>,
    singles: Vec<(Tag, u32, u32)>,
    positioning: bool,
    constructions: HashMap<(u32, bool), MathGlyphConstruction>,
    min_overlap: i32,
    events: Mutex<Vec<&'static str>>,
}

struct TestGlyph {
    name: String,
    c: Option<char>,
    h_advance: i32,
    v_advance: i32,
}

impl TestFont {
    pub const NOTDEF_ADVANCE: i32 = 300;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyph(mut self, c: char, name: &str, h_advance: i32) -> Self {
        self.push(Some(c), name, h_advance, -1000);
        self
    }

    pub fn unmapped(mut self, name: &str, h_advance: i32) -> Self {
        self.push(None, name, h_advance, -1000);
        self
    }

    pub fn vertical(mut self, c: char, name: &str, h_advance: i32, v_advance: i32) -> Self {
        self.push(Some(c), name, h_advance, v_advance);
        self
    }

    fn push(&mut self, c: Option<char>, name: &str, h_advance: i32, v_advance: i32) {
        self.glyphs.push(TestGlyph {
            name: name.to_string(),
            c,
            h_advance,
            v_advance,
        });
    }

    pub fn kern(mut self, left: &str, right: &str, value: i32) -> Self {
        let key = (self.gid(left), self.gid(right));
        self.kerning.insert(key, value);
        self
    }

    pub fn vkern(mut self, top: &str, bottom: &str, value: i32) -> Self {
        let key = (self.gid(top), self.gid(bottom));
        self.v_kerning.insert(key, value);
        self
    }

    /// Classifies a glyph as a mark. Every other glyph becomes a base once
    /// any glyph is classified.
    pub fn mark_class(mut self, name: &str) -> Self {
        let glyph = self.gid(name);
        self.marks.push(glyph);
        self
    }

    /// Layout hooks called so far, in order.
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    fn record(&self, event: &'static str) {
        self.events.lock().push(event);
    }

    /// Adds a single substitution applied where `feature` is enabled.
    pub fn single(mut self, feature: &str, from: &str, to: &str) -> Self {
        let rule = (Tag::from_bytes_lossy(feature.as_bytes()), self.gid(from), self.gid(to));
        self.singles.push(rule);
        self
    }

    pub fn with_positioning(mut self) -> Self {
        self.positioning = true;
        self
    }

    pub fn construction(mut self, glyph: &str, horizontal: bool, c: MathGlyphConstruction) -> Self {
        let key = (self.gid(glyph), horizontal);
        self.constructions.insert(key, c);
        self
    }

    pub fn min_overlap(mut self, n: i32) -> Self {
        self.min_overlap = n;
        self
    }

    pub fn gid(&self, name: &str) -> u32 {
        self.glyphs
            .iter()
            .position(|g| g.name == name)
            .map(|idx| idx as u32 + 1)
            .unwrap_or_else(|| panic!("no glyph named {}", name))
    }

    fn get(&self, glyph: u32) -> Option<&TestGlyph> {
        self.glyphs.get((glyph as usize).checked_sub(1)?)
    }
}

impl Font for TestFont {
    fn units_per_em(&self) -> i32 {
        1000
    }

    fn nominal_glyph(&self, c: char) -> Option<u32> {
        self.glyphs
            .iter()
            .position(|g| g.c == Some(c))
            .map(|idx| idx as u32 + 1)
    }

    fn glyph_h_advance(&self, glyph: u32) -> i32 {
        self.get(glyph).map_or(Self::NOTDEF_ADVANCE, |g| g.h_advance)
    }

    fn glyph_v_advance(&self, glyph: u32) -> i32 {
        self.get(glyph).map_or(-1000, |g| g.v_advance)
    }

    fn glyph_h_kerning(&self, left: u32, right: u32) -> i32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0)
    }

    fn glyph_v_kerning(&self, top: u32, bottom: u32) -> i32 {
        self.v_kerning.get(&(top, bottom)).copied().unwrap_or(0)
    }

    fn glyph_name(&self, glyph: u32) -> Option<String> {
        match self.get(glyph) {
            Some(g) => Some(g.name.clone()),
            None if glyph == 0 => Some(".notdef".to_string()),
            None => None,
        }
    }

    fn has_glyph_classes(&self) -> bool {
        !self.marks.is_empty()
    }

    fn glyph_class(&self, glyph: u32) -> GlyphPropsFlags {
        if self.marks.contains(&glyph) {
            GlyphPropsFlags::MARK
        } else {
            GlyphPropsFlags::BASE_GLYPH
        }
    }

    fn has_positioning(&self) -> bool {
        self.positioning
    }

    fn has_math_data(&self) -> bool {
        !self.constructions.is_empty()
    }

    fn math_min_connector_overlap(&self, _: bool) -> i32 {
        self.min_overlap
    }

    fn math_glyph_construction(&self, glyph: u32, horizontal: bool) -> Option<MathGlyphConstruction> {
        self.constructions.get(&(glyph, horizontal)).cloned()
    }

    fn substitute_start(&self, _: &ShapePlan, _: &mut Buffer) {
        self.record("substitute_start");
    }

    fn substitute(&self, plan: &ShapePlan, buffer: &mut Buffer) {
        self.record("substitute");
        for &(tag, from, to) in &self.singles {
            let (mask, _) = plan.ot_map().mask(tag);
            if mask == 0 {
                continue;
            }

            for info in buffer.glyph_infos_mut() {
                if info.glyph_id == from && info.mask() & mask != 0 {
                    info.glyph_id = to;
                }
            }
        }
    }

    fn substitute_finish(&self, _: &ShapePlan, _: &mut Buffer) {
        self.record("substitute_finish");
    }

    fn position_start(&self, _: &ShapePlan, _: &mut Buffer) {
        self.record("position_start");
    }

    fn position(&self, _: &ShapePlan, _: &mut Buffer) {
        self.record("position");
    }

    fn position_finish(&self, _: &ShapePlan, _: &mut Buffer) {
        self.record("position_finish");
    }

    fn substitute_closure(&self, plan: &ShapePlan, glyphs: &mut BTreeSet<u32>) {
        for &(tag, from, to) in &self.singles {
            if plan.ot_map().mask(tag).0 != 0 && glyphs.contains(&from) {
                glyphs.insert(to);
            }
        }
    }
}

/// A small Latin font with a few marks and brackets.
pub fn latin() -> TestFont {
    TestFont::new()
        .glyph(' ', "space", 250)
        .glyph('A', "A", 600)
        .glyph('V', "V", 600)
        .glyph('a', "a", 500)
        .glyph('b', "b", 500)
        .glyph('c', "c", 500)
        .glyph('\u{0301}', "acutecomb", 0)
        .glyph('\u{25CC}', "dottedcircle", 400)
        .glyph('(', "parenleft", 300)
        .glyph(')', "parenright", 300)
        .glyph('.', "period", 200)
        .glyph('0', "zero", 520)
        .unmapped("a.sc", 450)
        .kern("A", "V", 7)
}

struct Args {
    direction: Option<stretchybuzz::Direction>,
    language: Option<stretchybuzz::Language>,
    script: Option<stretchybuzz::Script>,
    features: Vec<String>,
    remove_default_ignorables: bool,
    preserve_default_ignorables: bool,
    no_glyph_names: bool,
    no_positions: bool,
    no_advances: bool,
    no_clusters: bool,
    bot: bool,
    eot: bool,
}

fn parse_args(args: Vec<std::ffi::OsString>) -> Result<Args, pico_args::Error> {
    let mut parser = pico_args::Arguments::from_vec(args);
    let args = Args {
        direction: parser.opt_value_from_str("--direction")?,
        language: parser.opt_value_from_str("--language")?,
        script: parser.opt_value_from_str("--script")?,
        features: parser
            .opt_value_from_fn("--features", parse_string_list)?
            .unwrap_or_default(),
        remove_default_ignorables: parser.contains("--remove-default-ignorables"),
        preserve_default_ignorables: parser.contains("--preserve-default-ignorables"),
        no_glyph_names: parser.contains("--no-glyph-names"),
        no_positions: parser.contains("--no-positions"),
        no_advances: parser.contains("--no-advances"),
        no_clusters: parser.contains("--no-clusters"),
        bot: parser.contains("--bot"),
        eot: parser.contains("--eot"),
    };

    let rest = parser.finish();
    assert!(rest.is_empty(), "unexpected arguments: {:?}", rest);

    Ok(args)
}

fn parse_string_list(s: &str) -> Result<Vec<String>, String> {
    Ok(s.split(',').map(|s| s.to_string()).collect())
}

/// Shapes `text` the way `hb-shape` would with the given options and
/// returns the glyph buffer.
pub fn shape_buffer(font: &TestFont, text: &str, options: &str) -> GlyphBuffer {
    shape_impl(font, text, options).0
}

/// Shapes `text` and serializes the result.
pub fn shape(font: &TestFont, text: &str, options: &str) -> String {
    let (glyph_buffer, format_flags) = shape_impl(font, text, options);
    glyph_buffer.serialize(font, format_flags)
}

fn shape_impl(font: &TestFont, text: &str, options: &str) -> (GlyphBuffer, SerializeFlags) {
    let args = options
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(std::ffi::OsString::from)
        .collect();
    let args = parse_args(args).unwrap();

    let mut buffer = stretchybuzz::UnicodeBuffer::new();
    buffer.push_str(text);

    if let Some(d) = args.direction {
        buffer.set_direction(d);
    }

    if let Some(lang) = args.language {
        buffer.set_language(lang);
    }

    if let Some(script) = args.script {
        buffer.set_script(script);
    }

    let mut buffer_flags = BufferFlags::default();
    buffer_flags.set(BufferFlags::BEGINNING_OF_TEXT, args.bot);
    buffer_flags.set(BufferFlags::END_OF_TEXT, args.eot);
    buffer_flags.set(BufferFlags::REMOVE_DEFAULT_IGNORABLES, args.remove_default_ignorables);
    buffer_flags.set(BufferFlags::PRESERVE_DEFAULT_IGNORABLES, args.preserve_default_ignorables);
    buffer.set_flags(buffer_flags);

    let mut features = Vec::new();
    for feature_str in args.features {
        let feature = stretchybuzz::Feature::from_str(&feature_str).unwrap();
        features.push(feature);
    }

    let glyph_buffer = stretchybuzz::shape(font, &features, buffer);

    let mut format_flags = SerializeFlags::default();
    if args.no_glyph_names {
        format_flags |= SerializeFlags::NO_GLYPH_NAMES;
    }

    if args.no_clusters {
        format_flags |= SerializeFlags::NO_CLUSTERS;
    }

    if args.no_positions {
        format_flags |= SerializeFlags::NO_POSITIONS;
    }

    if args.no_advances {
        format_flags |= SerializeFlags::NO_ADVANCES;
    }

    (glyph_buffer, format_flags)
}
