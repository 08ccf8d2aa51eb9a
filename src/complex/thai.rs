use super::{layout_position, layout_substitute, ComplexShaper, ZeroWidthMarksMode};
use crate::buffer::Buffer;
use crate::font::Font;
use crate::ot::normalize::NormalizationMode;
use crate::plan::ShapePlan;
use crate::unicode::GeneralCategory;

/// The strategy for Thai and Lao.
pub static THAI_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: Some(preprocess_text),
    normalization_mode: NormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    substitute: Some(layout_substitute),
    position: Some(layout_position),
    zero_width_marks: ZeroWidthMarksMode::ByGdef,
    fallback_position: None,
};

// Lao codepoints sit 0x80 above their Thai counterparts.
#[inline]
fn is_sara_am(u: u32) -> bool {
    (u & !0x0080) == 0x0E33
}

#[inline]
fn nikhahit_from_sara_am(u: u32) -> u32 {
    u - 0x0E33 + 0x0E4D
}

#[inline]
fn sara_aa_from_sara_am(u: u32) -> u32 {
    u - 1
}

#[inline]
fn is_above_base_mark(u: u32) -> bool {
    matches!(
        u & !0x0080,
        0x0E34..=0x0E37 | 0x0E47..=0x0E4E | 0x0E31 | 0x0E3B
    )
}

// Uniscribe decomposes SARA AM into NIKHAHIT + SARA AA and moves the
// NIKHAHIT backwards over any above-base marks:
//
// <0E14, 0E4B, 0E33> -> <0E14, 0E4D, 0E4B, 0E32>
fn preprocess_text(_: &ShapePlan, _: &dyn Font, buffer: &mut Buffer) {
    buffer.clear_output();
    let count = buffer.len;
    buffer.idx = 0;
    while buffer.idx < count {
        let u = buffer.cur(0).glyph_id;
        if !is_sara_am(u) {
            buffer.next_glyph();
            if !buffer.successful {
                break;
            }

            continue;
        }

        buffer.output_glyph(nikhahit_from_sara_am(u));
        buffer.replace_glyph(sara_aa_from_sara_am(u));
        if !buffer.successful {
            break;
        }

        // Make NIKHAHIT a zero-class mark for width zeroing.
        let end = buffer.out_len;
        buffer.out_info_mut()[end - 2].set_general_category(GeneralCategory::NonspacingMark);

        let mut start = end - 2;
        while start > 0 && is_above_base_mark(buffer.out_info()[start - 1].glyph_id) {
            start -= 1;
        }

        if start + 2 < end {
            // Move NIKHAHIT to the beginning.
            buffer.merge_out_clusters(start, end);
            buffer.out_info_mut()[start..end - 1].rotate_right(1);
        } else if start > 0 {
            // NIKHAHIT is combining, so it joins the previous cluster.
            buffer.merge_out_clusters(start - 1, end);
        }
    }

    buffer.swap_buffers();
}
