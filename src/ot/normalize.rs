use crate::buffer::{Buffer, BufferScratchFlags, GlyphInfo};
use crate::complex::MAX_COMBINING_MARKS;
use crate::font::Font;
use crate::plan::ShapePlan;
use crate::unicode::{self, space, CharExt};

/// State handed to a shaper's decompose and compose overrides.
pub struct NormalizeContext<'a> {
    /// The plan being executed.
    pub plan: &'a ShapePlan,
    pub(crate) buffer: &'a mut Buffer,
    pub(crate) font: &'a dyn Font,
    decompose: DecomposeFn,
    compose: ComposeFn,
}

/// Splits a character into up to two characters; a second half of `'\0'`
/// means a singleton decomposition.
pub type DecomposeFn = fn(&NormalizeContext, char) -> Option<(char, char)>;

/// Composes two characters into one.
pub type ComposeFn = fn(&NormalizeContext, char, char) -> Option<char>;

/// How eagerly text is normalized before glyph mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationMode {
    /// Only decompose what the font does not cover.
    None,
    /// Always decompose fully.
    Decomposed,
    /// Decompose, then recompose marks onto their base. Never composes
    /// base-to-base.
    ComposedDiacritics,
    /// Always fully decompose and then recompose back.
    ComposedDiacriticsNoShortCircuit,
    /// Pick a mode based on the font.
    Auto,
}

// Each grapheme is decomposed in a chain of 1:2 decompositions, marks
// reordered, and then recomposed if desired, like Unicode normalization.
// Decomposition and recomposition only happen if the font supports the
// resulting characters.
//
// For the composed modes, one-character clusters the font supports are left
// alone even though their NFC may differ.

fn decompose_unicode(_: &NormalizeContext, ab: char) -> Option<(char, char)> {
    unicode::decompose(ab)
}

fn compose_unicode(_: &NormalizeContext, a: char, b: char) -> Option<char> {
    unicode::compose(a, b)
}

fn set_glyph(info: &mut GlyphInfo, font: &dyn Font) {
    if let Some(glyph_id) = font.nominal_glyph(info.as_char()) {
        info.set_glyph_index(glyph_id);
    }
}

fn output_char(buffer: &mut Buffer, unichar: char, glyph: u32) {
    // The glyph index rides along in the copy of the current record.
    buffer.cur_mut(0).set_glyph_index(glyph);
    buffer.output_glyph(u32::from(unichar));
    let mut flags = buffer.scratch_flags;
    buffer.prev_mut().init_unicode_props(&mut flags);
    buffer.scratch_flags = flags;
}

fn next_char(buffer: &mut Buffer, glyph: u32) {
    buffer.cur_mut(0).set_glyph_index(glyph);
    buffer.next_glyph();
}

/// Returns 0 if didn't decompose, number of resulting characters otherwise.
fn decompose(ctx: &mut NormalizeContext, shortest: bool, ab: char) -> u32 {
    let Some((a, b)) = (ctx.decompose)(ctx, ab) else {
        return 0;
    };

    let a_glyph = ctx.font.nominal_glyph(a);
    let b_glyph = if b != '\0' {
        match ctx.font.nominal_glyph(b) {
            Some(glyph_id) => Some(glyph_id),
            None => return 0,
        }
    } else {
        None
    };

    if !shortest || a_glyph.is_none() {
        let ret = decompose(ctx, shortest, a);
        if ret != 0 {
            if let Some(b_glyph) = b_glyph {
                output_char(ctx.buffer, b, b_glyph);
                return ret + 1;
            }
            return ret;
        }
    }

    if let Some(a_glyph) = a_glyph {
        // Output a and b.
        output_char(ctx.buffer, a, a_glyph);
        if let Some(b_glyph) = b_glyph {
            output_char(ctx.buffer, b, b_glyph);
            return 2;
        }
        return 1;
    }

    0
}

fn decompose_current_character(ctx: &mut NormalizeContext, shortest: bool) {
    let u = ctx.buffer.cur(0).as_char();
    let glyph = ctx.font.nominal_glyph(u);

    if (!shortest || glyph.is_none()) && decompose(ctx, shortest, u) > 0 {
        ctx.buffer.skip_glyph();
        return;
    }

    if let Some(glyph) = glyph {
        next_char(ctx.buffer, glyph);
        return;
    }

    if ctx.buffer.cur(0).is_unicode_space() {
        let space_type = u.space_fallback();
        if space_type != space::NOT_SPACE {
            if let Some(space_glyph) = ctx.font.nominal_glyph(' ') {
                ctx.buffer.cur_mut(0).set_space_fallback(space_type);
                next_char(ctx.buffer, space_glyph);
                ctx.buffer.scratch_flags |= BufferScratchFlags::HAS_SPACE_FALLBACK;
                return;
            }
        }
    }

    // U+2011 is the only sensible character that is a no-break version of another character
    // and not a space.  The space ones are handled already.  Handle this lone one.
    if u == '\u{2011}' {
        if let Some(other_glyph) = ctx.font.nominal_glyph('\u{2010}') {
            next_char(ctx.buffer, other_glyph);
            return;
        }
    }

    // Insert a .notdef glyph if decomposition failed.
    next_char(ctx.buffer, 0);
}

fn handle_variation_selector_cluster(ctx: &mut NormalizeContext, end: usize) {
    let font = ctx.font;

    // If there's a variation selector we give up on normalization.
    let buffer = &mut *ctx.buffer;
    while buffer.idx < end - 1 && buffer.successful {
        if buffer.cur(1).as_char().is_variation_selector() {
            if let Some(glyph_id) = font.variation_glyph(buffer.cur(0).as_char(), buffer.cur(1).as_char()) {
                buffer.cur_mut(0).set_glyph_index(glyph_id);
                let unicode = buffer.cur(0).glyph_id;
                buffer.replace_glyphs(2, 1, &[unicode]);
            } else {
                // Just pass on the two characters separately, let GSUB do its magic.
                set_glyph(buffer.cur_mut(0), font);
                buffer.next_glyph();
                set_glyph(buffer.cur_mut(0), font);
                buffer.next_glyph();
            }

            // Skip any further variation selectors.
            while buffer.idx < end && buffer.cur(0).as_char().is_variation_selector() {
                set_glyph(buffer.cur_mut(0), font);
                buffer.next_glyph();
            }
        } else {
            set_glyph(buffer.cur_mut(0), font);
            buffer.next_glyph();
        }
    }

    if buffer.idx < end {
        set_glyph(buffer.cur_mut(0), font);
        buffer.next_glyph();
    }
}

fn decompose_multi_char_cluster(ctx: &mut NormalizeContext, end: usize, short_circuit: bool) {
    let has_variation_selector = ctx.buffer.info[ctx.buffer.idx..end]
        .iter()
        .any(|info| info.as_char().is_variation_selector());
    if has_variation_selector {
        handle_variation_selector_cluster(ctx, end);
        return;
    }

    while ctx.buffer.idx < end && ctx.buffer.successful {
        decompose_current_character(ctx, short_circuit);
    }
}

fn compare_combining_class(pa: &GlyphInfo, pb: &GlyphInfo) -> bool {
    pa.modified_combining_class() > pb.modified_combining_class()
}

/// Decomposes, reorders and recomposes the buffer, leaving each record's
/// glyph index in its scratch slot.
pub(crate) fn normalize(plan: &ShapePlan, buffer: &mut Buffer, font: &dyn Font) {
    if buffer.is_empty() {
        return;
    }

    let mut mode = plan.shaper.normalization_mode;
    if mode == NormalizationMode::Auto {
        mode = NormalizationMode::ComposedDiacritics;
    }

    let mut ctx = NormalizeContext {
        plan,
        buffer,
        font,
        decompose: plan.shaper.decompose.unwrap_or(decompose_unicode),
        compose: plan.shaper.compose.unwrap_or(compose_unicode),
    };

    let always_short_circuit = mode == NormalizationMode::None;
    let might_short_circuit = always_short_circuit
        || (mode != NormalizationMode::Decomposed
            && mode != NormalizationMode::ComposedDiacriticsNoShortCircuit);

    // First round, decompose
    let mut all_simple = true;
    {
        ctx.buffer.clear_output();
        let count = ctx.buffer.len;
        ctx.buffer.idx = 0;
        loop {
            let buffer = &mut *ctx.buffer;
            let mut end = buffer.idx + 1;
            while end < count && !buffer.info[end].is_unicode_mark() {
                end += 1;
            }

            if end < count {
                // Leave one base for the marks to cluster with.
                end -= 1;
            }

            // From idx to end are simple clusters.
            if might_short_circuit {
                let len = end - buffer.idx;
                let mut done = 0;
                while done < len {
                    let cur = buffer.cur_mut(done);
                    match font.nominal_glyph(cur.as_char()) {
                        Some(glyph_id) => cur.set_glyph_index(glyph_id),
                        None => break,
                    }
                    done += 1;
                }
                buffer.next_glyphs(done);
            }

            while ctx.buffer.idx < end && ctx.buffer.successful {
                decompose_current_character(&mut ctx, might_short_circuit);
            }

            if ctx.buffer.idx == count || !ctx.buffer.successful {
                break;
            }

            all_simple = false;

            // Find all the marks now.
            let buffer = &*ctx.buffer;
            end = buffer.idx + 1;
            while end < count && buffer.info[end].is_unicode_mark() {
                end += 1;
            }

            // idx to end is one non-simple cluster.
            decompose_multi_char_cluster(&mut ctx, end, always_short_circuit);

            if ctx.buffer.idx >= count || !ctx.buffer.successful {
                break;
            }
        }

        ctx.buffer.swap_buffers();
    }

    // Second round, reorder (inplace)
    if !all_simple {
        let buffer = &mut *ctx.buffer;
        let count = buffer.len;
        let mut i = 0;
        while i < count {
            if buffer.info[i].modified_combining_class() == 0 {
                i += 1;
                continue;
            }

            let mut end = i + 1;
            while end < count && buffer.info[end].modified_combining_class() != 0 {
                end += 1;
            }

            // We are going to do a O(n^2).  Only do this if the sequence is short.
            if end - i <= MAX_COMBINING_MARKS {
                buffer.sort(i, end, compare_combining_class);
            }

            i = end + 1;
        }
    }

    // Third round, recompose
    if !all_simple
        && ctx.buffer.successful
        && (mode == NormalizationMode::ComposedDiacritics
            || mode == NormalizationMode::ComposedDiacriticsNoShortCircuit)
    {
        // As noted in the comment earlier, we don't try to combine
        // ccc=0 chars with their previous Starter.

        let count = ctx.buffer.len;
        let mut starter = 0;
        ctx.buffer.clear_output();
        ctx.buffer.next_glyph();
        while ctx.buffer.idx < count && ctx.buffer.successful {
            // We don't try to compose a non-mark character with it's preceding starter.
            // Hangul fonts are not designed to mix-and-match pre-composed
            // syllables and Jamo.
            let cur = *ctx.buffer.cur(0);
            if cur.is_unicode_mark()
                // If there's anything between the starter and this char, they should have CCC
                // smaller than this character's.
                && (starter == ctx.buffer.out_len - 1
                    || ctx.buffer.prev().modified_combining_class() < cur.modified_combining_class())
            {
                let a = ctx.buffer.out_info()[starter].as_char();
                let b = cur.as_char();
                if let Some(composed) = (ctx.compose)(&ctx, a, b) {
                    if let Some(glyph_id) = font.nominal_glyph(composed) {
                        // Copy to out-buffer.
                        let buffer = &mut *ctx.buffer;
                        buffer.next_glyph();
                        if !buffer.successful {
                            return;
                        }

                        // Merge and remove the second composable.
                        buffer.merge_out_clusters(starter, buffer.out_len);
                        buffer.out_len -= 1;

                        // Modify starter and carry on.
                        let mut flags = buffer.scratch_flags;
                        let info = &mut buffer.out_info_mut()[starter];
                        info.glyph_id = u32::from(composed);
                        info.set_glyph_index(glyph_id);
                        info.init_unicode_props(&mut flags);
                        buffer.scratch_flags = flags;

                        continue;
                    }
                }
            }

            // Blocked, or doesn't compose.
            let buffer = &mut *ctx.buffer;
            buffer.next_glyph();

            if buffer.prev().modified_combining_class() == 0 {
                starter = buffer.out_len - 1;
            }
        }

        ctx.buffer.swap_buffers();
    }
}
