use log::trace;
use unicode_ccc::CanonicalCombiningClass;

use crate::buffer::{Buffer, BufferScratchFlags, GlyphPosition};
use crate::common::Direction;
use crate::font::{Font, GlyphExtents};
use crate::plan::ShapePlan;
use crate::unicode::{space, GeneralCategory};

fn recategorize_combining_class(u: u32, mut class: u8) -> u8 {
    use CanonicalCombiningClass as Class;

    if class >= 200 {
        return class;
    }

    // Thai / Lao need some per-character work.
    if u & !0xFF == 0x0E00 {
        if class == 0 {
            match u {
                0x0E31 | 0x0E34 | 0x0E35 | 0x0E36 | 0x0E37 | 0x0E47 | 0x0E4C | 0x0E4D | 0x0E4E => {
                    class = Class::AboveRight as u8
                }

                0x0EB1 | 0x0EB4 | 0x0EB5 | 0x0EB6 | 0x0EB7 | 0x0EBB | 0x0ECC | 0x0ECD => {
                    class = Class::Above as u8
                }

                0x0EBC => class = Class::Below as u8,

                _ => {}
            }
        } else if u == 0x0E3A {
            // Thai virama is below-right
            class = Class::BelowRight as u8;
        }
    }

    match class {
        // Hebrew
        10 => Class::Below as u8,         // sheva
        11 => Class::Below as u8,         // hataf segol
        12 => Class::Below as u8,         // hataf patah
        13 => Class::Below as u8,         // hataf qamats
        14 => Class::Below as u8,         // hiriq
        15 => Class::Below as u8,         // tsere
        16 => Class::Below as u8,         // segol
        17 => Class::Below as u8,         // patah
        18 => Class::Below as u8,         // qamats & qamats qatan
        20 => Class::Below as u8,         // qubuts
        22 => Class::Below as u8,         // meteg
        23 => Class::AttachedAbove as u8, // rafe
        24 => Class::AboveRight as u8,    // shin dot
        25 => Class::AboveLeft as u8,     // sin dot
        19 => Class::AboveLeft as u8,     // holam & holam haser for vav
        26 => Class::Above as u8,         // point varika
        21 => class,                      // dagesh

        // Arabic and Syriac
        27 => Class::Above as u8, // fathatan
        28 => Class::Above as u8, // dammatan
        30 => Class::Above as u8, // fatha
        31 => Class::Above as u8, // damma
        33 => Class::Above as u8, // shadda
        34 => Class::Above as u8, // sukun
        35 => Class::Above as u8, // superscript alef
        36 => Class::Above as u8, // superscript alaph
        29 => Class::Below as u8, // kasratan
        32 => Class::Below as u8, // kasra

        // Thai
        103 => Class::BelowRight as u8, // sara u / sara uu
        107 => Class::AboveRight as u8, // mai

        // Lao
        118 => Class::Below as u8, // sign u / sign uu
        122 => Class::Above as u8, // mai

        // Tibetan
        129 => Class::Below as u8, // sign aa
        130 => Class::Above as u8, // sign i
        132 => Class::Below as u8, // sign u

        _ => class,
    }
}

/// Maps script-specific fixed-position combining classes to the generic
/// above/below classes fallback positioning understands.
pub(crate) fn recategorize_marks(buffer: &mut Buffer) {
    let len = buffer.len;
    for info in &mut buffer.info[..len] {
        if info.general_category() == GeneralCategory::NonspacingMark {
            let class = recategorize_combining_class(info.glyph_id, info.modified_combining_class());
            info.set_modified_combining_class(class);
        }
    }
}

fn zero_mark_advances(buffer: &mut Buffer, start: usize, end: usize, adjust_offsets_when_zeroing: bool) {
    for (info, pos) in buffer.info[start..end].iter().zip(&mut buffer.pos[start..end]) {
        if info.general_category() == GeneralCategory::NonspacingMark {
            if adjust_offsets_when_zeroing {
                pos.x_offset -= pos.x_advance;
                pos.y_offset -= pos.y_advance;
            }
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

fn position_mark(
    font: &dyn Font,
    direction: Direction,
    glyph: u32,
    pos: &mut GlyphPosition,
    base_extents: &mut GlyphExtents,
    combining_class: CanonicalCombiningClass,
) {
    use CanonicalCombiningClass as Class;

    let Some(mark_extents) = font.glyph_extents(glyph) else {
        return;
    };

    let y_gap = font.units_per_em() / 16;
    pos.x_offset = 0;
    pos.y_offset = 0;

    // We don't position LEFT and RIGHT marks.

    // X positioning
    match combining_class {
        Class::DoubleBelow | Class::DoubleAbove if direction.is_horizontal() => {
            pos.x_offset += base_extents.x_bearing
                + if direction.is_forward() { base_extents.width } else { 0 }
                - mark_extents.width / 2
                - mark_extents.x_bearing;
        }

        Class::AttachedBelowLeft | Class::BelowLeft | Class::AboveLeft => {
            // Left align.
            pos.x_offset += base_extents.x_bearing - mark_extents.x_bearing;
        }

        Class::AttachedAboveRight | Class::BelowRight | Class::AboveRight => {
            // Right align.
            pos.x_offset += base_extents.x_bearing + base_extents.width
                - mark_extents.width
                - mark_extents.x_bearing;
        }

        _ => {
            // Center align.
            pos.x_offset += base_extents.x_bearing + (base_extents.width - mark_extents.width) / 2
                - mark_extents.x_bearing;
        }
    }

    let is_attached = matches!(
        combining_class,
        Class::AttachedBelowLeft
            | Class::AttachedBelow
            | Class::AttachedAbove
            | Class::AttachedAboveRight
    );

    // Y positioning.
    match combining_class {
        Class::DoubleBelow
        | Class::BelowLeft
        | Class::Below
        | Class::BelowRight
        | Class::AttachedBelowLeft
        | Class::AttachedBelow => {
            if !is_attached {
                // Add gap.
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing + base_extents.height - mark_extents.y_bearing;

            // Never shift up "below" marks.
            if (y_gap > 0) == (pos.y_offset > 0) {
                base_extents.height -= pos.y_offset;
                pos.y_offset = 0;
            }

            base_extents.height += mark_extents.height;
        }

        Class::DoubleAbove
        | Class::AboveLeft
        | Class::Above
        | Class::AboveRight
        | Class::AttachedAbove
        | Class::AttachedAboveRight => {
            if !is_attached {
                // Add gap.
                base_extents.y_bearing += y_gap;
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing - (mark_extents.y_bearing + mark_extents.height);

            // Don't shift down "above" marks too much.
            if (y_gap > 0) != (pos.y_offset > 0) {
                let correction = -pos.y_offset / 2;
                base_extents.y_bearing += correction;
                base_extents.height -= correction;
                pos.y_offset += correction;
            }

            base_extents.y_bearing -= mark_extents.height;
            base_extents.height += mark_extents.height;
        }

        _ => {}
    }
}

fn position_around_base(
    font: &dyn Font,
    buffer: &mut Buffer,
    base: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    let base_glyph = buffer.info[base].glyph_id;
    let base_pos = buffer.pos[base];

    let Some(mut base_extents) = font.glyph_extents(base_glyph) else {
        zero_mark_advances(buffer, base + 1, end, adjust_offsets_when_zeroing);
        return;
    };

    base_extents.y_bearing += base_pos.y_offset;
    base_extents.x_bearing = 0;

    // Use horizontal advance for horizontal positioning.
    // Also works for zero-ink glyphs.
    base_extents.width = font.glyph_h_advance(base_glyph);

    let direction = buffer.direction;
    let mut x_offset = 0;
    let mut y_offset = 0;
    if direction.is_forward() {
        x_offset -= base_pos.x_advance;
        y_offset -= base_pos.y_advance;
    }

    let mut last_combining_class: u8 = 255;
    let mut cluster_extents = base_extents;

    for (info, pos) in buffer.info[base + 1..end].iter().zip(&mut buffer.pos[base + 1..end]) {
        let this_combining_class = info.modified_combining_class();
        if this_combining_class != 0 {
            if last_combining_class != this_combining_class {
                last_combining_class = this_combining_class;
                cluster_extents = base_extents;
            }

            position_mark(
                font,
                direction,
                info.glyph_id,
                pos,
                &mut cluster_extents,
                conv_combining_class(this_combining_class),
            );

            pos.x_advance = 0;
            pos.y_advance = 0;
            pos.x_offset += x_offset;
            pos.y_offset += y_offset;
        } else if direction.is_forward() {
            x_offset -= pos.x_advance;
            y_offset -= pos.y_advance;
        } else {
            x_offset += pos.x_advance;
            y_offset += pos.y_advance;
        }
    }
}

fn position_cluster(
    font: &dyn Font,
    buffer: &mut Buffer,
    start: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    if end - start < 2 {
        return;
    }

    // Find the base glyph
    let mut i = start;
    while i < end {
        if !buffer.info[i].is_unicode_mark() {
            // Find mark glyphs
            let mut j = i + 1;
            while j < end && buffer.info[j].is_unicode_mark() {
                j += 1;
            }

            position_around_base(font, buffer, i, j, adjust_offsets_when_zeroing);
            i = j - 1;
        }
        i += 1;
    }
}

/// Positions non-spacing marks above or below their base from glyph
/// extents and combining classes.
pub fn position_marks(_: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) {
    let adjust_offsets_when_zeroing = buffer.direction.is_forward();

    let mut start = 0;
    let len = buffer.len;
    for i in 1..len {
        if !buffer.info[i].is_unicode_mark() {
            position_cluster(font, buffer, start, i, adjust_offsets_when_zeroing);
            start = i;
        }
    }

    position_cluster(font, buffer, start, len, adjust_offsets_when_zeroing);
}

/// Applies pair kerning from the font's kerning accessors.
///
/// Each pair's value is split: the left glyph's advance takes `value >> 1`,
/// the right glyph's advance and offset take the rest.
pub(crate) fn kern(plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) {
    let horizontal = buffer.direction.is_horizontal();
    let kern_mask = if horizontal { plan.kern_mask } else { plan.vkrn_mask };
    if kern_mask == 0 {
        return;
    }

    let len = buffer.len;
    if len < 2 {
        return;
    }

    let mut enabled = buffer.info[0].mask & kern_mask != 0;
    for i in 1..len {
        let next = buffer.info[i].mask & kern_mask != 0;
        if enabled && next {
            let (left, right) = (buffer.info[i - 1].glyph_id, buffer.info[i].glyph_id);
            if horizontal {
                let kern = font.glyph_h_kerning(left, right);
                if kern != 0 {
                    let kern1 = kern >> 1;
                    let kern2 = kern - kern1;
                    buffer.pos[i - 1].x_advance += kern1;
                    buffer.pos[i].x_advance += kern2;
                    buffer.pos[i].x_offset += kern2;
                }
            } else {
                let kern = font.glyph_v_kerning(left, right);
                if kern != 0 {
                    let kern1 = kern >> 1;
                    let kern2 = kern - kern1;
                    buffer.pos[i - 1].y_advance += kern1;
                    buffer.pos[i].y_advance += kern2;
                    buffer.pos[i].y_offset += kern2;
                }
            }
        }

        enabled = next;
    }

    trace!("applied fallback kerning");
}

/// Gives spaces that were mapped to the U+0020 glyph the width their
/// character calls for.
pub(crate) fn spaces(font: &dyn Font, buffer: &mut Buffer) {
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_SPACE_FALLBACK) {
        return;
    }

    let len = buffer.len;
    let horizontal = buffer.direction.is_horizontal();
    let upem = font.units_per_em();
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if !info.is_unicode_space() || info.is_ligated() {
            continue;
        }

        let space_type = info.space_fallback();
        let length = match space_type {
            space::SPACE_EM
            | space::SPACE_EM_2
            | space::SPACE_EM_3
            | space::SPACE_EM_4
            | space::SPACE_EM_5
            | space::SPACE_EM_6
            | space::SPACE_EM_16 => {
                let n = i32::from(space_type);
                Some((upem + n / 2) / n)
            }

            space::SPACE_4_EM_18 => Some((i64::from(upem) * 4 / 18) as i32),

            space::SPACE_FIGURE => ('0'..='9')
                .find_map(|u| font.nominal_glyph(u))
                .map(|glyph| glyph_advance(font, glyph, horizontal)),

            space::SPACE_PUNCTUATION => font
                .nominal_glyph('.')
                .or_else(|| font.nominal_glyph(','))
                .map(|glyph| glyph_advance(font, glyph, horizontal)),

            space::SPACE_NARROW => {
                // Half of the regular space.
                if horizontal {
                    pos.x_advance /= 2;
                } else {
                    pos.y_advance /= 2;
                }
                None
            }

            _ => None,
        };

        if let Some(length) = length {
            if horizontal {
                pos.x_advance = length;
            } else {
                pos.y_advance = -length;
            }
        }
    }
}

// Lengths along the text axis, always positive.
fn glyph_advance(font: &dyn Font, glyph: u32, horizontal: bool) -> i32 {
    if horizontal {
        font.glyph_h_advance(glyph)
    } else {
        -font.glyph_v_advance(glyph)
    }
}

fn conv_combining_class(n: u8) -> CanonicalCombiningClass {
    use CanonicalCombiningClass as Class;
    match n {
        1 => Class::Overlay,
        6 => Class::HanReading,
        7 => Class::Nukta,
        8 => Class::KanaVoicing,
        9 => Class::Virama,
        10 => Class::CCC10,
        11 => Class::CCC11,
        12 => Class::CCC12,
        13 => Class::CCC13,
        14 => Class::CCC14,
        15 => Class::CCC15,
        16 => Class::CCC16,
        17 => Class::CCC17,
        18 => Class::CCC18,
        19 => Class::CCC19,
        20 => Class::CCC20,
        21 => Class::CCC21,
        22 => Class::CCC22,
        23 => Class::CCC23,
        24 => Class::CCC24,
        25 => Class::CCC25,
        26 => Class::CCC26,
        27 => Class::CCC27,
        28 => Class::CCC28,
        29 => Class::CCC29,
        30 => Class::CCC30,
        31 => Class::CCC31,
        32 => Class::CCC32,
        33 => Class::CCC33,
        34 => Class::CCC34,
        35 => Class::CCC35,
        36 => Class::CCC36,
        84 => Class::CCC84,
        91 => Class::CCC91,
        103 => Class::CCC103,
        107 => Class::CCC107,
        118 => Class::CCC118,
        122 => Class::CCC122,
        129 => Class::CCC129,
        130 => Class::CCC130,
        132 => Class::CCC132,
        200 => Class::AttachedBelowLeft,
        202 => Class::AttachedBelow,
        214 => Class::AttachedAbove,
        216 => Class::AttachedAboveRight,
        218 => Class::BelowLeft,
        220 => Class::Below,
        222 => Class::BelowRight,
        224 => Class::Left,
        226 => Class::Right,
        228 => Class::AboveLeft,
        230 => Class::Above,
        232 => Class::AboveRight,
        233 => Class::DoubleBelow,
        234 => Class::DoubleAbove,
        240 => Class::IotaSubscript,
        _ => Class::NotReordered,
    }
}
