//! Stretching of math glyphs such as brackets, braces and radicals.
//!
//! Advances along the stretch axis are positive rightward and upward. The
//! returned buffers follow the font accessor convention instead: horizontal
//! advances are positive, vertical advances are negative.

use log::debug;
use smallvec::SmallVec;

use crate::buffer::{Buffer, ContentType, GlyphPosition};
use crate::font::{Font, MathGlyphPart};

/// The most glyphs an assembly may expand to.
pub const MAX_PARTS: usize = 2000;

// The parts of a construction, however they were obtained.
trait GlyphAssembly {
    fn is_horizontal(&self) -> bool;
    fn part_count(&self) -> usize;
    fn glyph(&self, i: usize) -> u32;
    fn start_connector_length(&self, i: usize) -> i32;
    fn end_connector_length(&self, i: usize) -> i32;
    fn full_advance(&self, i: usize) -> i32;
    fn is_extender(&self, i: usize) -> bool;
}

struct MathTableAssembly<'a> {
    horizontal: bool,
    parts: &'a [MathGlyphPart],
}

impl GlyphAssembly for MathTableAssembly<'_> {
    fn is_horizontal(&self) -> bool {
        self.horizontal
    }

    fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn glyph(&self, i: usize) -> u32 {
        self.parts[i].glyph
    }

    fn start_connector_length(&self, i: usize) -> i32 {
        self.parts[i].start_connector_length
    }

    fn end_connector_length(&self, i: usize) -> i32 {
        self.parts[i].end_connector_length
    }

    fn full_advance(&self, i: usize) -> i32 {
        self.parts[i].full_advance
    }

    fn is_extender(&self, i: usize) -> bool {
        self.parts[i].is_extender
    }
}

// Parts built from a Unicode construction have no connectors and take
// their advance from the font.
struct UnicodeAssembly<'a> {
    font: &'a dyn Font,
    horizontal: bool,
    parts: SmallVec<[(u32, bool); 5]>,
}

impl GlyphAssembly for UnicodeAssembly<'_> {
    fn is_horizontal(&self) -> bool {
        self.horizontal
    }

    fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn glyph(&self, i: usize) -> u32 {
        self.parts[i].0
    }

    fn start_connector_length(&self, _: usize) -> i32 {
        0
    }

    fn end_connector_length(&self, _: usize) -> i32 {
        0
    }

    fn full_advance(&self, i: usize) -> i32 {
        stretch_advance(self.font, self.horizontal, self.parts[i].0)
    }

    fn is_extender(&self, i: usize) -> bool {
        self.parts[i].1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct UnicodeConstruction {
    unicode: u32,
    horizontal: bool,
    extender: u32,
    start: u32,
    middle: u32,
    end: u32,
}

const fn construction(
    unicode: u32,
    horizontal: bool,
    extender: u32,
    start: u32,
    middle: u32,
    end: u32,
) -> UnicodeConstruction {
    UnicodeConstruction { unicode, horizontal, extender, start, middle, end }
}

// Sorted by codepoint, vertical before horizontal.
#[rustfmt::skip]
const UNICODE_CONSTRUCTIONS: &[UnicodeConstruction] = &[
    //           uni     horiz  ext     start   middle  end
    construction(0x0028, false, 0x239C, 0x239D, 0x0000, 0x239B), // LEFT PARENTHESIS
    construction(0x0029, false, 0x239F, 0x23A0, 0x0000, 0x239E), // RIGHT PARENTHESIS
    construction(0x005B, false, 0x23A2, 0x23A3, 0x0000, 0x23A1), // LEFT SQUARE BRACKET
    construction(0x005D, false, 0x23A5, 0x23A6, 0x0000, 0x23A4), // RIGHT SQUARE BRACKET
    construction(0x005F, true,  0x005F, 0x005F, 0x0000, 0x0000), // LOW LINE
    construction(0x007B, false, 0x23AA, 0x23A9, 0x23A8, 0x23A7), // LEFT CURLY BRACKET
    construction(0x007C, false, 0x007C, 0x007C, 0x0000, 0x0000), // VERTICAL BAR
    construction(0x007D, false, 0x23AA, 0x23AD, 0x23AC, 0x23AB), // RIGHT CURLY BRACKET
    construction(0x00AF, true,  0x00AF, 0x203E, 0x0000, 0x0000), // MACRON
    construction(0x2016, false, 0x2016, 0x2016, 0x0000, 0x0000), // DOUBLE VERTICAL LINE
    construction(0x203E, true,  0x203E, 0x203E, 0x0000, 0x0000), // OVERLINE
    construction(0x222B, false, 0x23AE, 0x2321, 0x0000, 0x2320), // INTEGRAL SIGN
    construction(0x2308, false, 0x23A2, 0x0000, 0x0000, 0x23A1), // LEFT CEILING
    construction(0x2309, false, 0x23A5, 0x0000, 0x0000, 0x23A4), // RIGHT CEILING
    construction(0x230A, false, 0x23A2, 0x23A3, 0x0000, 0x0000), // LEFT FLOOR
    construction(0x230B, false, 0x23A5, 0x23A6, 0x0000, 0x0000), // RIGHT FLOOR
    construction(0x23B0, false, 0x23AA, 0x23AD, 0x0000, 0x23A7), // \lmoustache
    construction(0x23B1, false, 0x23AA, 0x23A9, 0x0000, 0x23AB), // \rmoustache
];

fn find_unicode_construction(unicode: u32, horizontal: bool) -> Option<&'static UnicodeConstruction> {
    // `false < true`, so the derived order puts vertical rows first.
    UNICODE_CONSTRUCTIONS
        .binary_search_by_key(&(unicode, horizontal), |c| (c.unicode, c.horizontal))
        .ok()
        .map(|idx| &UNICODE_CONSTRUCTIONS[idx])
}

fn nominal_glyph(font: &dyn Font, u: u32) -> Option<u32> {
    font.nominal_glyph(char::from_u32(u)?)
}

// Resolves a construction's sub-characters to parts. Any missing glyph
// makes the whole construction unusable.
fn unicode_assembly<'a>(
    font: &'a dyn Font,
    unicode: u32,
    horizontal: bool,
) -> Option<UnicodeAssembly<'a>> {
    let construction = find_unicode_construction(unicode, horizontal)?;
    let extender = nominal_glyph(font, construction.extender)?;

    let mut parts = SmallVec::new();
    if construction.start != 0 {
        parts.push((nominal_glyph(font, construction.start)?, false));
        parts.push((extender, true));
    }

    if construction.middle != 0 {
        parts.push((nominal_glyph(font, construction.middle)?, false));
        parts.push((extender, true));
    }

    if construction.end != 0 {
        parts.push((nominal_glyph(font, construction.end)?, false));
    }

    Some(UnicodeAssembly { font, horizontal, parts })
}

#[inline]
fn stretch_advance(font: &dyn Font, horizontal: bool, glyph: u32) -> i32 {
    if horizontal {
        font.glyph_h_advance(glyph)
    } else {
        -font.glyph_v_advance(glyph)
    }
}

#[inline]
fn orthogonal_advance(font: &dyn Font, horizontal: bool, glyph: u32) -> i32 {
    if horizontal {
        -font.glyph_v_advance(glyph)
    } else {
        font.glyph_h_advance(glyph)
    }
}

fn assembly_max_orthogonal_advance(font: &dyn Font, assembly: &dyn GlyphAssembly) -> i32 {
    (0..assembly.part_count())
        .map(|i| orthogonal_advance(font, assembly.is_horizontal(), assembly.glyph(i)))
        .fold(0, i32::max)
}

fn set_single_glyph(font: &dyn Font, buffer: &mut Buffer, glyph: u32) {
    buffer.content_type = ContentType::Glyphs;
    buffer.have_positions = true;
    buffer.info[0].glyph_id = glyph;
    buffer.pos[0] = GlyphPosition {
        x_advance: font.glyph_h_advance(glyph),
        y_advance: font.glyph_v_advance(glyph),
        ..GlyphPosition::default()
    };
}

fn try_base_glyph(
    font: &dyn Font,
    buffer: &mut Buffer,
    horizontal: bool,
    target_size: i32,
    base_glyph: u32,
) -> bool {
    if stretch_advance(font, horizontal, base_glyph) >= target_size {
        set_single_glyph(font, buffer, base_glyph);
        return true;
    }

    false
}

// A glyph assembly is made of parts with start and end connectors. The end
// connector of part i overlaps the start connector of part i+1 by at least
// `min_overlap` and at most the shorter of the two connectors. Extenders are
// all repeated the same number of times.
//
// Parts are first laid out with the minimal overlap, which is the longest
// the assembly can get:
//
//   repeat * sum_ext + sum_non_ext + min_overlap >= target_size
//
// where the sums add up `full_advance - min_overlap` of extenders and of
// other parts. Overlaps are then grown from the middle outwards to get as
// close to the target as the connectors allow.
fn set_glyph_assembly(
    font: &dyn Font,
    buffer: &mut Buffer,
    assembly: &dyn GlyphAssembly,
    min_overlap: i32,
    target_size: i32,
) -> bool {
    let horizontal = assembly.is_horizontal();
    let part_count = assembly.part_count();
    let min_overlap = i64::from(min_overlap);
    let target_size = i64::from(target_size);

    let mut ext_count = 0i64;
    let mut sum_ext = 0i64;
    let mut sum_non_ext = 0i64;
    for i in 0..part_count {
        let advance = i64::from(assembly.full_advance(i)) - min_overlap;
        if assembly.is_extender(i) {
            sum_ext += advance;
            ext_count += 1;
        } else {
            sum_non_ext += advance;
        }
    }

    if sum_ext == 0 {
        debug!("assembly has no extender length");
        return false;
    }

    let mut repeat = 0i64;
    let needed = target_size - sum_non_ext - min_overlap;
    if needed > 0 {
        if sum_ext < 0 {
            debug!("assembly extenders shrink it");
            return false;
        }

        repeat = (needed + sum_ext - 1) / sum_ext;
    }

    let glyph_count = (part_count as i64 - ext_count) + repeat * ext_count;
    if glyph_count < 1 || glyph_count > MAX_PARTS as i64 {
        debug!("assembly of {} glyphs is out of bounds", glyph_count);
        return false;
    }

    let count = glyph_count as usize;
    let initial_cluster = buffer.info[0].cluster;
    if !buffer.set_length(count) {
        return false;
    }

    buffer.content_type = ContentType::Glyphs;
    buffer.have_positions = true;

    // Lay out with the minimal overlap, remembering the part of every glyph.
    let mut part_of: SmallVec<[usize; 16]> = SmallVec::with_capacity(count);
    buffer.pos[0] = GlyphPosition::default();
    for i in 0..part_count {
        let repeat_count = if assembly.is_extender(i) { repeat as usize } else { 1 };
        for _ in 0..repeat_count {
            let j = part_of.len();
            part_of.push(i);
            buffer.info[j].glyph_id = assembly.glyph(i);
            buffer.pos[j].x_advance = 0;
            buffer.pos[j].y_advance = 0;

            if j + 1 < count {
                let delta = assembly.full_advance(i) - min_overlap as i32;
                let prev = buffer.pos[j];
                buffer.pos[j + 1] = if horizontal {
                    GlyphPosition { x_offset: prev.x_offset + delta, ..GlyphPosition::default() }
                } else {
                    GlyphPosition { y_offset: prev.y_offset + delta, ..GlyphPosition::default() }
                };
            }
        }
    }

    let min_overlap = min_overlap as i32;
    let mut extra_size = (repeat * sum_ext + sum_non_ext + i64::from(min_overlap) - target_size) as i32;

    let steps = count / 2;
    if steps > 0 {
        let mut towards_start = (count - 1) / 2;
        let mut towards_end = count / 2;
        if towards_start == towards_end {
            // Odd count: the middle glyph stays put.
            towards_start -= 1;
            towards_end += 1;
        }

        let mut delta_sum = 0;
        for step in 0..steps {
            if extra_size > 0 {
                let mut delta = extra_size / 2;
                delta = delta.min(assembly.end_connector_length(part_of[towards_start]) - min_overlap);
                delta = delta.min(assembly.start_connector_length(part_of[towards_start + 1]) - min_overlap);
                delta = delta.min(assembly.end_connector_length(part_of[towards_end - 1]) - min_overlap);
                delta = delta.min(assembly.start_connector_length(part_of[towards_end]) - min_overlap);

                if towards_start + 1 == towards_end {
                    // Even count: both sides share the middle pair.
                    delta /= 2;
                }

                if delta > 0 {
                    delta_sum += delta;
                    extra_size -= 2 * delta;
                }
            }

            if horizontal {
                buffer.pos[towards_start].x_offset += delta_sum;
                buffer.pos[towards_end].x_offset -= delta_sum;
            } else {
                buffer.pos[towards_start].y_offset += delta_sum;
                buffer.pos[towards_end].y_offset -= delta_sum;
            }

            if step + 1 < steps {
                towards_start -= 1;
                towards_end += 1;
            }
        }
    }

    let last = count - 1;
    let max_orthogonal = assembly_max_orthogonal_advance(font, assembly);
    let last_advance = assembly.full_advance(part_of[last]);
    if horizontal {
        buffer.pos[last].x_advance = buffer.pos[last].x_offset - buffer.pos[0].x_offset + last_advance;
        buffer.pos[last].y_advance = -max_orthogonal;
    } else {
        buffer.pos[last].x_advance = max_orthogonal;
        buffer.pos[last].y_advance = -(buffer.pos[last].y_offset - buffer.pos[0].y_offset + last_advance);
    }

    // One cluster, with the top left glyph at the origin.
    let delta = if horizontal { -buffer.pos[0].x_offset } else { -buffer.pos[last].y_offset };
    for (info, pos) in buffer.info[..count].iter_mut().zip(&mut buffer.pos[..count]) {
        info.cluster = initial_cluster;
        if horizontal {
            pos.x_offset += delta;
        } else {
            pos.y_offset += delta;
        }
    }

    true
}

/// Stretches the single element of `buffer` to at least `target_size`
/// along the chosen axis.
///
/// A Unicode character is stretched with a built-in table of constructions
/// from Unicode bracket pieces, such as
///
/// ```text
///                           | LEFT PARENTHESIS UPPER HOOK (U+239B)
/// LEFT PARENTHESIS (U+0028) | LEFT PARENTHESIS EXTENSION  (U+239C)
///                           | LEFT PARENTHESIS LOWER HOOK (U+239D)
/// ```
///
/// A glyph is stretched with the font's math variants and assembly.
///
/// The base element is tried first, then larger variants, then an
/// assembly. When nothing reaches the target the best single glyph is
/// used. The buffer ends up holding either one glyph at the origin with
/// its own advances, or the assembly parts ordered left to right
/// (bottom to top when vertical) in the input's cluster; only the last
/// part carries the advance of the whole assembly.
///
/// Returns `false` without touching the buffer when it does not hold
/// exactly one element, or when a character has no glyph. Also returns
/// `false` after the single glyph fallback when the buffer could not grow
/// to hold an assembly; [`Buffer::is_successful`] is then `false` too.
pub fn stretch(font: &dyn Font, buffer: &mut Buffer, horizontal: bool, target_size: i32) -> bool {
    if buffer.content_type == ContentType::Invalid || buffer.len != 1 {
        return false;
    }

    if buffer.content_type == ContentType::Unicode {
        let base_unicode = buffer.info[0].glyph_id;
        let Some(base_glyph) = nominal_glyph(font, base_unicode) else {
            return false;
        };

        if try_base_glyph(font, buffer, horizontal, target_size, base_glyph) {
            return true;
        }

        if let Some(assembly) = unicode_assembly(font, base_unicode, horizontal) {
            if set_glyph_assembly(font, buffer, &assembly, 0, target_size) {
                return true;
            }
        }

        debug!("U+{:04X} stays at its base size", base_unicode);
        set_single_glyph(font, buffer, base_glyph);
        return buffer.successful;
    }

    let base_glyph = buffer.info[0].glyph_id;
    if try_base_glyph(font, buffer, horizontal, target_size, base_glyph) {
        return true;
    }

    let construction = if font.has_math_data() {
        font.math_glyph_construction(base_glyph, horizontal)
    } else {
        None
    };

    let Some(construction) = construction else {
        set_single_glyph(font, buffer, base_glyph);
        return true;
    };

    let mut glyph_variant = base_glyph;
    for variant in &construction.variants {
        glyph_variant = variant.glyph;
        if variant.advance >= target_size {
            set_single_glyph(font, buffer, glyph_variant);
            return true;
        }
    }

    if let Some(ref parts) = construction.assembly {
        let assembly = MathTableAssembly { horizontal, parts };
        let min_overlap = font.math_min_connector_overlap(horizontal);
        if set_glyph_assembly(font, buffer, &assembly, min_overlap, target_size) {
            return true;
        }
    }

    debug!("glyph {} falls back to variant {}", base_glyph, glyph_variant);
    set_single_glyph(font, buffer, glyph_variant);
    buffer.successful
}

/// Returns the orthogonal advance with the largest magnitude among all
/// results [`stretch`] can produce for the element of `buffer`, at any
/// target size.
///
/// Positive for horizontal stretching, negative or zero for vertical.
/// Returns 0 when the buffer does not hold exactly one element.
pub fn stretch_max_orthogonal_advance(font: &dyn Font, buffer: &Buffer, horizontal: bool) -> i32 {
    if buffer.content_type == ContentType::Invalid || buffer.len != 1 {
        return 0;
    }

    let mut max_advance = 0;

    if buffer.content_type == ContentType::Unicode {
        let base_unicode = buffer.info[0].glyph_id;
        if let Some(base_glyph) = nominal_glyph(font, base_unicode) {
            max_advance = max_advance.max(orthogonal_advance(font, horizontal, base_glyph));
        }

        if let Some(assembly) = unicode_assembly(font, base_unicode, horizontal) {
            max_advance = max_advance.max(assembly_max_orthogonal_advance(font, &assembly));
        }
    } else {
        let base_glyph = buffer.info[0].glyph_id;
        max_advance = max_advance.max(orthogonal_advance(font, horizontal, base_glyph));

        let construction = if font.has_math_data() {
            font.math_glyph_construction(base_glyph, horizontal)
        } else {
            None
        };

        if let Some(construction) = construction {
            for variant in &construction.variants {
                max_advance = max_advance.max(orthogonal_advance(font, horizontal, variant.glyph));
            }

            if let Some(ref parts) = construction.assembly {
                let assembly = MathTableAssembly { horizontal, parts };
                max_advance = max_advance.max(assembly_max_orthogonal_advance(font, &assembly));
            }
        }
    }

    if horizontal {
        max_advance
    } else {
        -max_advance
    }
}
