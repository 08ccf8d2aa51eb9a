use std::collections::BTreeSet;

use log::{debug, trace, warn};

use crate::buffer::{
    Buffer, BufferFlags, BufferScratchFlags, ContentType, GlyphBuffer, GlyphInfo,
    GlyphPropsFlags, UnicodeBuffer,
};
use crate::common::{Direction, Feature};
use crate::complex::ZeroWidthMarksMode;
use crate::font::Font;
use crate::ot::{fallback, normalize};
use crate::plan::ShapePlan;
use crate::unicode::{CharExt, GeneralCategory};

/// Shapes the buffer content using provided font and features.
///
/// Consumes the buffer. You can then run [`GlyphBuffer::clear`] to get the
/// [`UnicodeBuffer`] back without allocating a new one.
///
/// Unset segment properties are guessed from the text.
pub fn shape(font: &dyn Font, features: &[Feature], mut buffer: UnicodeBuffer) -> GlyphBuffer {
    buffer.guess_segment_properties();

    let plan = ShapePlan::new(
        buffer.0.direction,
        buffer.0.script,
        buffer.0.language.as_ref(),
        features,
    );

    match plan {
        Some(plan) => shape_with_plan(font, &plan, buffer),
        None => {
            debug!("no plan for {:?}, buffer left unshaped", buffer.0.direction);
            buffer.0.successful = false;
            GlyphBuffer(buffer.0)
        }
    }
}

/// Shapes the buffer content using the provided font and plan.
///
/// Consumes the buffer. You can then run [`GlyphBuffer::clear`] to get the
/// [`UnicodeBuffer`] back without allocating a new one.
///
/// Unset segment properties are guessed from the text; the direction must
/// then match the plan's, otherwise the buffer is left unshaped.
pub fn shape_with_plan(font: &dyn Font, plan: &ShapePlan, mut buffer: UnicodeBuffer) -> GlyphBuffer {
    buffer.guess_segment_properties();
    let mut buffer = buffer.0;
    if !shape_buffer(plan, font, &mut buffer) {
        buffer.successful = false;
    }

    GlyphBuffer(buffer)
}

/// Runs the shaping pipeline over a buffer in place.
///
/// The buffer must hold Unicode text in the plan's direction. Returns
/// `false` without touching the buffer otherwise, including when it was
/// already shaped. Returns `false` after shaping if memory ran out on the
/// way.
pub fn shape_buffer(plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) -> bool {
    match buffer.content_type {
        ContentType::Unicode => {}
        ContentType::Invalid if buffer.is_empty() => {
            buffer.content_type = ContentType::Glyphs;
            return true;
        }
        content_type => {
            warn!("cannot shape a buffer holding {:?}", content_type);
            return false;
        }
    }

    if buffer.direction != plan.direction {
        warn!(
            "buffer direction {:?} does not match the plan's {:?}",
            buffer.direction, plan.direction
        );
        return false;
    }

    let target_direction = buffer.direction;
    shape_internal(&mut ShapeContext {
        plan,
        font,
        buffer: &mut *buffer,
        target_direction,
    });

    buffer.content_type = ContentType::Glyphs;
    buffer.successful
}

/// Collects the glyphs shaping `buffer` may produce.
///
/// Starts from the nominal glyphs of the text, adds mirrored glyphs for
/// right-to-left text, and closes the set over the font's substitutions.
pub fn glyphs_closure(font: &dyn Font, features: &[Feature], mut buffer: UnicodeBuffer) -> BTreeSet<u32> {
    buffer.guess_segment_properties();

    let mut glyphs = BTreeSet::new();
    let Some(plan) = ShapePlan::new(
        buffer.0.direction,
        buffer.0.script,
        buffer.0.language.as_ref(),
        features,
    ) else {
        return glyphs;
    };

    let mirror = plan.direction.is_backward();
    for info in buffer.0.glyph_infos() {
        let c = info.as_char();
        glyphs.extend(font.nominal_glyph(c));
        if mirror {
            if let Some(m) = c.mirrored() {
                glyphs.extend(font.nominal_glyph(m));
            }
        }
    }

    loop {
        let before = glyphs.len();
        font.substitute_closure(&plan, &mut glyphs);
        if glyphs.len() == before {
            break;
        }
    }

    glyphs
}

struct ShapeContext<'a> {
    plan: &'a ShapePlan,
    font: &'a dyn Font,
    buffer: &'a mut Buffer,
    // Transient stuff
    target_direction: Direction,
}

// Pull it all together!
fn shape_internal(ctx: &mut ShapeContext) {
    ctx.buffer.scratch_flags = BufferScratchFlags::empty();
    ctx.buffer.clear_output();

    set_unicode_props(ctx.buffer);
    insert_dotted_circle(ctx.buffer, ctx.font);
    form_clusters(ctx.buffer);
    ensure_native_direction(ctx.buffer);
    trace!("prepared {} records", ctx.buffer.len);

    substitute_default(ctx);
    substitute_complex(ctx);
    trace!("substituted into {} glyphs", ctx.buffer.len);

    position(ctx);

    hide_default_ignorables(ctx.buffer, ctx.font);

    ctx.buffer.direction = ctx.target_direction;
}

fn set_unicode_props(buffer: &mut Buffer) {
    let len = buffer.len;
    for info in &mut buffer.info[..len] {
        info.var1 = 0;
        info.var2 = 0;
        info.init_unicode_props(&mut buffer.scratch_flags);
    }
}

fn insert_dotted_circle(buffer: &mut Buffer, font: &dyn Font) {
    if buffer.is_empty()
        || buffer.flags.contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
        || !buffer.flags.contains(BufferFlags::BEGINNING_OF_TEXT)
        || !buffer.info[0].is_unicode_mark()
    {
        return;
    }

    if font.nominal_glyph('\u{25CC}').is_none() {
        debug!("no dotted circle glyph for a leading mark");
        return;
    }

    let mut info = GlyphInfo {
        glyph_id: 0x25CC,
        mask: buffer.cur(0).mask,
        cluster: buffer.cur(0).cluster,
        var1: 0,
        var2: 0,
    };

    info.init_unicode_props(&mut buffer.scratch_flags);
    buffer.clear_output();
    buffer.output_info(info);

    while buffer.idx < buffer.len && buffer.successful {
        buffer.next_glyph();
    }

    buffer.swap_buffers();
}

fn form_clusters(buffer: &mut Buffer) {
    for i in 1..buffer.len {
        if buffer.info[i].general_category().is_mark() {
            buffer.merge_clusters(i - 1, i + 1);
        }
    }
}

fn ensure_native_direction(buffer: &mut Buffer) {
    let dir = buffer.direction;
    let hor = buffer.script.and_then(Direction::from_script).unwrap_or_default();

    if (dir.is_horizontal() && dir != hor && hor != Direction::Invalid)
        || (dir.is_vertical() && dir != Direction::TopToBottom)
    {
        buffer.reverse_clusters();
        buffer.direction = buffer.direction.reverse();
    }
}

fn substitute_default(ctx: &mut ShapeContext) {
    if let Some(func) = ctx.plan.shaper.preprocess_text {
        func(ctx.plan, ctx.font, ctx.buffer);
    }

    mirror_chars(ctx);

    normalize::normalize(ctx.plan, ctx.buffer, ctx.font);

    setup_masks(ctx);

    // This is unfortunate to go here, but necessary...
    if !ctx.font.has_positioning() {
        fallback::recategorize_marks(ctx.buffer);
    }

    map_glyphs_fast(ctx.buffer);
}

fn substitute_complex(ctx: &mut ShapeContext) {
    ctx.font.substitute_start(ctx.plan, ctx.buffer);

    if !ctx.font.has_glyph_classes() {
        synthesize_glyph_classes(ctx.buffer);
    } else {
        let len = ctx.buffer.len;
        for info in &mut ctx.buffer.info[..len] {
            info.set_glyph_props(ctx.font.glyph_class(info.glyph_id));
        }
    }

    if let Some(func) = ctx.plan.shaper.substitute {
        func(ctx.plan, ctx.font, ctx.buffer);
    }

    ctx.font.substitute_finish(ctx.plan, ctx.buffer);
}

fn mirror_chars(ctx: &mut ShapeContext) {
    if ctx.target_direction.is_forward() {
        return;
    }

    let rtlm_mask = ctx.plan.rtlm_mask;
    let len = ctx.buffer.len;
    for info in &mut ctx.buffer.info[..len] {
        match info.as_char().mirrored() {
            Some(c) if u32::from(c) != info.glyph_id => info.glyph_id = u32::from(c),
            _ => info.mask |= rtlm_mask,
        }
    }
}

fn setup_masks(ctx: &mut ShapeContext) {
    let global_mask = ctx.plan.ot_map.global_mask();
    ctx.buffer.reset_masks(global_mask);

    if let Some(func) = ctx.plan.shaper.setup_masks {
        func(ctx.plan, ctx.font, ctx.buffer);
    }

    for feature in &ctx.plan.user_features {
        if !feature.is_global() {
            let (mask, shift) = ctx.plan.ot_map.mask(feature.tag);
            ctx.buffer.set_masks(feature.value << shift, mask, feature.start, feature.end);
        }
    }
}

fn map_glyphs_fast(buffer: &mut Buffer) {
    // Normalization process sets up glyph_index(), we just copy it.
    let len = buffer.len;
    for info in &mut buffer.info[..len] {
        info.glyph_id = info.glyph_index();
    }
}

fn synthesize_glyph_classes(buffer: &mut Buffer) {
    let len = buffer.len;
    for info in &mut buffer.info[..len] {
        let class = if info.general_category() == GeneralCategory::NonspacingMark {
            GlyphPropsFlags::MARK
        } else {
            GlyphPropsFlags::BASE_GLYPH
        };

        info.set_glyph_props(class);
    }
}

fn position(ctx: &mut ShapeContext) {
    ctx.buffer.clear_positions();

    position_default(ctx);

    let fallback = !position_complex(ctx);

    if fallback {
        if let Some(func) = ctx.plan.shaper.fallback_position {
            func(ctx.plan, ctx.font, ctx.buffer);
        }
    }

    if ctx.buffer.direction.is_backward() {
        ctx.buffer.reverse();
    }

    if fallback {
        fallback::kern(ctx.plan, ctx.font, ctx.buffer);
    }

    fallback::spaces(ctx.font, ctx.buffer);
}

fn position_default(ctx: &mut ShapeContext) {
    ctx.font.position_start(ctx.plan, ctx.buffer);

    let len = ctx.buffer.len;
    let font = ctx.font;

    if ctx.buffer.direction.is_horizontal() {
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            pos.x_advance = font.glyph_h_advance(info.glyph_id);
            let (x, y) = font.glyph_h_origin(info.glyph_id);
            pos.x_offset -= x;
            pos.y_offset -= y;
        }
    } else {
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            pos.y_advance = font.glyph_v_advance(info.glyph_id);
            let (x, y) = font.glyph_v_origin(info.glyph_id);
            pos.x_offset -= x;
            pos.y_offset -= y;
        }
    }

    // Zeroing mark widths by class happens before complex positioning.
    if ctx.plan.shaper.zero_width_marks == ZeroWidthMarksMode::ByGdef {
        zero_mark_widths_by_gdef(ctx.buffer);
    }
}

// Returns whether the font positioned the glyphs.
fn position_complex(ctx: &mut ShapeContext) -> bool {
    let len = ctx.buffer.len;
    let font = ctx.font;
    let has_positioning = font.has_positioning();

    if has_positioning {
        // Change glyph origin to what the layout engine expects, apply, change it back.
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            let (x, y) = font.glyph_h_origin(info.glyph_id);
            pos.x_offset += x;
            pos.y_offset += y;
        }

        if let Some(func) = ctx.plan.shaper.position {
            func(ctx.plan, font, ctx.buffer);
        }

        let len = ctx.buffer.len;
        for (info, pos) in ctx.buffer.info[..len].iter().zip(&mut ctx.buffer.pos[..len]) {
            let (x, y) = font.glyph_h_origin(info.glyph_id);
            pos.x_offset -= x;
            pos.y_offset -= y;
        }
    }

    // Zeroing mark widths by category happens after complex positioning.
    if ctx.plan.shaper.zero_width_marks == ZeroWidthMarksMode::ByUnicode {
        zero_mark_widths_by_unicode(ctx.buffer);
    }

    font.position_finish(ctx.plan, ctx.buffer);

    has_positioning
}

fn zero_mark_widths_by_gdef(buffer: &mut Buffer) {
    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.is_mark() {
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

fn zero_mark_widths_by_unicode(buffer: &mut Buffer) {
    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        if info.is_unicode_mark() {
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

fn is_hidden(info: &GlyphInfo) -> bool {
    info.is_default_ignorable() && !info.is_ligated()
}

fn hide_default_ignorables(buffer: &mut Buffer, font: &dyn Font) {
    if !buffer.scratch_flags.contains(BufferScratchFlags::HAS_DEFAULT_IGNORABLES)
        || buffer.flags.contains(BufferFlags::PRESERVE_DEFAULT_IGNORABLES)
    {
        return;
    }

    if buffer.flags.contains(BufferFlags::REMOVE_DEFAULT_IGNORABLES) {
        buffer.delete_glyphs_inplace(is_hidden);
        return;
    }

    // The space glyph is assumed not to be gid0.
    let space = match font.nominal_glyph(' ') {
        Some(space) if space != 0 => space,
        _ => {
            debug!("no space glyph, default ignorables stay visible");
            return;
        }
    };

    let len = buffer.len;
    for (info, pos) in buffer.info[..len].iter_mut().zip(&mut buffer.pos[..len]) {
        if is_hidden(info) {
            info.glyph_id = space;
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}
