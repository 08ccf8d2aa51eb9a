use std::fmt::Write;

use crate::common::{Direction, Language, Script};
use crate::font::Font;
use crate::unicode::{CharExt, GeneralCategory};
use crate::{script, Mask};

// Buffers grow at most this many times over their input length.
const MAX_LEN_FACTOR: usize = 64;
const MAX_LEN_MIN: usize = 16384;

/// Holds the positions of the glyph in both horizontal and vertical directions.
///
/// All positions are relative to the current point.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphPosition {
    /// How much the line advances after drawing this glyph when setting
    /// text in horizontal direction.
    pub x_advance: i32,
    /// How much the line advances after drawing this glyph when setting
    /// text in vertical direction.
    pub y_advance: i32,
    /// How much the glyph moves on the X-axis before drawing it, this
    /// should not affect how much the line advances.
    pub x_offset: i32,
    /// How much the glyph moves on the Y-axis before drawing it, this
    /// should not affect how much the line advances.
    pub y_offset: i32,
    pub(crate) var: u32,
}

unsafe impl bytemuck::Zeroable for GlyphPosition {}
unsafe impl bytemuck::Pod for GlyphPosition {}

/// A glyph info.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GlyphInfo {
    /// A selected glyph.
    ///
    /// Holds a Unicode codepoint while the buffer content is Unicode.
    pub glyph_id: u32,
    pub(crate) mask: Mask,
    /// An index to the start of the grapheme cluster in the original string.
    pub cluster: u32,
    // Glyph index scratch during normalization.
    pub(crate) var1: u32,
    // Unicode props (low half) and glyph props (high half).
    pub(crate) var2: u32,
}

unsafe impl bytemuck::Zeroable for GlyphInfo {}
unsafe impl bytemuck::Pod for GlyphInfo {}

bitflags::bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct UnicodeProps: u16 {
        const GENERAL_CATEGORY  = 0x001F;
        const IGNORABLE         = 0x0020;
    }
}

bitflags::bitflags! {
    /// Glyph classes and layout history, as reported by GDEF or synthesized.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlyphPropsFlags: u16 {
        /// The glyph is a base glyph.
        const BASE_GLYPH    = 0x02;
        /// The glyph is a ligature.
        const LIGATURE      = 0x04;
        /// The glyph is a mark.
        const MARK          = 0x08;
        /// All class bits.
        const CLASS_MASK    = Self::BASE_GLYPH.bits() | Self::LIGATURE.bits() | Self::MARK.bits();

        /// The glyph was produced by a substitution.
        const SUBSTITUTED   = 0x10;
        /// The glyph was produced by a ligature substitution.
        const LIGATED       = 0x20;
        /// The glyph was produced by a multiple substitution.
        const MULTIPLIED    = 0x40;

        /// Bits kept when a layout engine replaces the class.
        const PRESERVE = Self::SUBSTITUTED.bits() | Self::LIGATED.bits() | Self::MULTIPLIED.bits();
    }
}

impl GlyphInfo {
    #[inline]
    pub(crate) fn as_char(&self) -> char {
        char::from_u32(self.glyph_id).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    #[inline]
    pub(crate) fn glyph_index(&self) -> u32 {
        self.var1
    }

    #[inline]
    pub(crate) fn set_glyph_index(&mut self, n: u32) {
        self.var1 = n;
    }

    #[inline]
    fn props(&self) -> &[u16; 2] {
        bytemuck::cast_ref(&self.var2)
    }

    #[inline]
    fn props_mut(&mut self) -> &mut [u16; 2] {
        bytemuck::cast_mut(&mut self.var2)
    }

    #[inline]
    pub(crate) fn unicode_props(&self) -> u16 {
        self.props()[0]
    }

    #[inline]
    pub(crate) fn set_unicode_props(&mut self, n: u16) {
        self.props_mut()[0] = n;
    }

    /// Returns the feature bits set on this glyph.
    ///
    /// Test them against [`Map::mask`](crate::Map::mask) to decide whether a
    /// lookup applies.
    #[inline]
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the glyph class and layout history flags.
    #[inline]
    pub fn glyph_props(&self) -> GlyphPropsFlags {
        GlyphPropsFlags::from_bits_truncate(self.props()[1])
    }

    /// Sets the glyph class and layout history flags.
    ///
    /// Layout engines call this when they substitute or ligate glyphs.
    #[inline]
    pub fn set_glyph_props(&mut self, props: GlyphPropsFlags) {
        self.props_mut()[1] = props.bits();
    }

    pub(crate) fn init_unicode_props(&mut self, scratch_flags: &mut BufferScratchFlags) {
        let u = self.as_char();
        let gc = u.general_category();
        let mut props = gc as u16;

        if u32::from(u) >= 0x80 {
            *scratch_flags |= BufferScratchFlags::HAS_NON_ASCII;

            if u.is_default_ignorable() {
                props |= UnicodeProps::IGNORABLE.bits();
                *scratch_flags |= BufferScratchFlags::HAS_DEFAULT_IGNORABLES;
            }

            if gc.is_mark() {
                props |= u16::from(u.combining_class()) << 8;
            }
        }

        if gc == GeneralCategory::SpaceSeparator {
            props |= u16::from(u.space_fallback()) << 8;
        }

        self.set_unicode_props(props);
    }

    #[inline]
    pub(crate) fn general_category(&self) -> GeneralCategory {
        let n = self.unicode_props() & UnicodeProps::GENERAL_CATEGORY.bits();
        GeneralCategory::from_u8(n as u8)
    }

    #[inline]
    pub(crate) fn set_general_category(&mut self, gc: GeneralCategory) {
        let n = (gc as u16) | (self.unicode_props() & 0xFF & !UnicodeProps::GENERAL_CATEGORY.bits());
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_unicode_mark(&self) -> bool {
        self.general_category() == GeneralCategory::NonspacingMark
    }

    #[inline]
    pub(crate) fn modified_combining_class(&self) -> u8 {
        if self.general_category().is_mark() {
            (self.unicode_props() >> 8) as u8
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn set_modified_combining_class(&mut self, mcc: u8) {
        if !self.general_category().is_mark() {
            return;
        }

        let n = (u16::from(mcc) << 8) | (self.unicode_props() & 0xFF);
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_unicode_space(&self) -> bool {
        self.general_category() == GeneralCategory::SpaceSeparator
    }

    #[inline]
    pub(crate) fn space_fallback(&self) -> u8 {
        if self.is_unicode_space() {
            (self.unicode_props() >> 8) as u8
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn set_space_fallback(&mut self, space: u8) {
        if self.is_unicode_space() {
            let n = (u16::from(space) << 8) | (self.unicode_props() & 0xFF);
            self.set_unicode_props(n);
        }
    }

    #[inline]
    pub(crate) fn is_default_ignorable(&self) -> bool {
        let n = self.unicode_props() & UnicodeProps::IGNORABLE.bits();
        n != 0 && !self.glyph_props().contains(GlyphPropsFlags::SUBSTITUTED)
    }

    #[inline]
    pub(crate) fn is_mark(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::MARK)
    }

    #[inline]
    pub(crate) fn is_ligated(&self) -> bool {
        self.glyph_props().contains(GlyphPropsFlags::LIGATED)
    }
}

bitflags::bitflags! {
    /// Flags for buffers.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        /// Indicates that special handling of the beginning of text paragraph can be applied to this buffer. Should usually be set, unless you are passing to the buffer only part of the text without the full context.
        const BEGINNING_OF_TEXT             = 1 << 1;
        /// Indicates that special handling of the end of text paragraph can be applied to this buffer, similar to [`BufferFlags::BEGINNING_OF_TEXT`].
        const END_OF_TEXT                   = 1 << 2;
        /// Indicates that characters with `Default_Ignorable` Unicode property should use the corresponding glyph from the font, instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.) This flag takes precedence over [`BufferFlags::REMOVE_DEFAULT_IGNORABLES`].
        const PRESERVE_DEFAULT_IGNORABLES   = 1 << 3;
        /// Indicates that characters with `Default_Ignorable` Unicode property should be removed from glyph string instead of hiding them (done by replacing them with the space glyph and zeroing the advance width.)
        const REMOVE_DEFAULT_IGNORABLES     = 1 << 4;
        /// Indicates that a dotted circle should not be inserted in the rendering of incorrect character sequences.
        const DO_NOT_INSERT_DOTTED_CIRCLE   = 1 << 5;
    }
}

bitflags::bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct BufferScratchFlags: u32 {
        const HAS_NON_ASCII             = 0x0000_0001;
        const HAS_DEFAULT_IGNORABLES    = 0x0000_0002;
        const HAS_SPACE_FALLBACK        = 0x0000_0004;
    }
}

bitflags::bitflags! {
    /// Flags used for serialization with [`GlyphBuffer::serialize`].
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SerializeFlags: u8 {
        /// Do not serialize glyph cluster.
        const NO_CLUSTERS       = 0b0000_0001;
        /// Do not serialize glyph position information.
        const NO_POSITIONS      = 0b0000_0010;
        /// Do no serialize glyph name.
        const NO_GLYPH_NAMES    = 0b0000_0100;
        /// Serialize glyph extents.
        const GLYPH_EXTENTS     = 0b0000_1000;
        /// Do not serialize glyph advances, glyph offsets will reflect absolute
        /// glyph positions.
        const NO_ADVANCES       = 0b0001_0000;
    }
}

/// What the records of a [`Buffer`] hold.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// Nothing was added yet.
    #[default]
    Invalid,
    /// Records hold Unicode codepoints.
    Unicode,
    /// Records hold glyph ids.
    Glyphs,
}

/// A buffer of glyph records, positions and segment properties.
///
/// During substitution the buffer keeps a second, output sequence. Glyphs
/// are consumed from the input at `idx` and appended to the output at
/// `out_len`; `swap_buffers` makes the output the new input.
#[derive(Clone, Debug)]
pub struct Buffer {
    // Information about how the text in the buffer should be treated.
    pub(crate) flags: BufferFlags,
    pub(crate) content_type: ContentType,
    pub(crate) direction: Direction,
    pub(crate) script: Option<Script>,
    pub(crate) language: Option<Language>,

    // Buffer contents.
    pub(crate) successful: bool,
    pub(crate) have_output: bool,
    pub(crate) have_separate_output: bool,
    pub(crate) have_positions: bool,

    pub(crate) idx: usize,
    pub(crate) len: usize,
    pub(crate) out_len: usize,

    pub(crate) info: Vec<GlyphInfo>,
    pub(crate) pos: Vec<GlyphPosition>,

    pub(crate) scratch_flags: BufferScratchFlags,
    pub(crate) max_len: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    /// Creates a new, empty buffer.
    pub fn new() -> Self {
        Buffer {
            flags: BufferFlags::empty(),
            content_type: ContentType::Invalid,
            direction: Direction::Invalid,
            script: None,
            language: None,
            successful: true,
            have_output: false,
            have_separate_output: false,
            have_positions: false,
            idx: 0,
            len: 0,
            out_len: 0,
            info: Vec::new(),
            pos: Vec::new(),
            scratch_flags: BufferScratchFlags::empty(),
            max_len: MAX_LEN_MIN,
        }
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer contains no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns what the records hold.
    #[inline]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the buffer direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sets the buffer direction.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Returns the buffer script.
    #[inline]
    pub fn script(&self) -> Option<Script> {
        self.script
    }

    /// Sets the buffer script.
    #[inline]
    pub fn set_script(&mut self, script: Script) {
        self.script = Some(script);
    }

    /// Returns the buffer language.
    #[inline]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Sets the buffer language.
    #[inline]
    pub fn set_language(&mut self, lang: Language) {
        self.language = Some(lang);
    }

    /// Returns the buffer flags.
    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Sets the buffer flags.
    #[inline]
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.flags = flags;
    }

    /// Returns `false` once an allocation failed.
    #[inline]
    pub fn is_successful(&self) -> bool {
        self.successful
    }

    /// Returns the records.
    #[inline]
    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.info[..self.len]
    }

    /// Returns mutable records.
    ///
    /// Used by layout engines plugged in through [`Font`].
    #[inline]
    pub fn glyph_infos_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info[..self.len]
    }

    /// Returns the positions.
    ///
    /// Empty unless the buffer has been positioned.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        if self.have_positions {
            &self.pos[..self.len]
        } else {
            &[]
        }
    }

    /// Returns mutable positions.
    #[inline]
    pub fn glyph_positions_mut(&mut self) -> &mut [GlyphPosition] {
        if self.have_positions {
            &mut self.pos[..self.len]
        } else {
            &mut []
        }
    }

    /// Appends a character with the given cluster.
    ///
    /// Ignored when the buffer already holds glyphs.
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        if self.content_type == ContentType::Glyphs {
            return;
        }

        self.content_type = ContentType::Unicode;
        self.push_info(u32::from(codepoint), cluster);
    }

    /// Appends all characters of a string, using byte offsets as clusters.
    pub fn push_str(&mut self, text: &str) {
        if !self.ensure(self.len + text.chars().count()) {
            return;
        }

        for (i, c) in text.char_indices() {
            self.add(c, i as u32);
        }
    }

    /// Appends a glyph id with the given cluster.
    ///
    /// Ignored when the buffer already holds characters.
    pub fn add_glyph(&mut self, glyph_id: u32, cluster: u32) {
        if self.content_type == ContentType::Unicode {
            return;
        }

        self.content_type = ContentType::Glyphs;
        self.push_info(glyph_id, cluster);
    }

    fn push_info(&mut self, glyph_id: u32, cluster: u32) {
        if !self.ensure(self.len + 1) {
            return;
        }

        self.info[self.len] = GlyphInfo {
            glyph_id,
            cluster,
            ..GlyphInfo::default()
        };
        self.len += 1;
    }

    /// Clears the contents and properties, keeping the allocation.
    pub fn clear(&mut self) {
        self.flags = BufferFlags::empty();
        self.content_type = ContentType::Invalid;
        self.direction = Direction::Invalid;
        self.script = None;
        self.language = None;
        self.successful = true;
        self.have_output = false;
        self.have_separate_output = false;
        self.have_positions = false;
        self.idx = 0;
        self.len = 0;
        self.out_len = 0;
        self.scratch_flags = BufferScratchFlags::empty();
    }

    /// Resets clusters to record indices.
    pub fn reset_clusters(&mut self) {
        for (i, info) in self.info[..self.len].iter_mut().enumerate() {
            info.cluster = i as u32;
        }
    }

    /// Fills unset segment properties from the content.
    ///
    /// The script comes from the first character that is neither Common,
    /// Inherited nor Unknown; the direction from that script.
    pub fn guess_segment_properties(&mut self) {
        if self.script.is_none() {
            for info in &self.info[..self.len] {
                match Script::from_char(info.as_char()) {
                    script::COMMON | script::INHERITED | script::UNKNOWN => {}
                    s => {
                        self.script = Some(s);
                        break;
                    }
                }
            }
        }

        if self.direction == Direction::Invalid {
            if let Some(script) = self.script {
                self.direction = Direction::from_script(script).unwrap_or_default();
            }

            if self.direction == Direction::Invalid {
                self.direction = Direction::LeftToRight;
            }
        }
    }

    /// Resizes the record arrays so at least `size` records fit.
    ///
    /// Returns `false` and marks the buffer unsuccessful when the
    /// allocation fails or the buffer would outgrow its limit.
    pub(crate) fn ensure(&mut self, size: usize) -> bool {
        if size <= self.info.len() {
            return true;
        }

        if !self.successful || size > self.max_len.max(self.len * MAX_LEN_FACTOR) {
            self.successful = false;
            return false;
        }

        let extra = size - self.info.len();
        if self.info.try_reserve(extra).is_err() || self.pos.try_reserve(extra).is_err() {
            self.successful = false;
            return false;
        }

        self.info.resize(size, GlyphInfo::default());
        self.pos.resize(size, GlyphPosition::default());
        true
    }

    /// Sets the number of records, zeroing new ones.
    pub(crate) fn set_length(&mut self, len: usize) -> bool {
        if !self.ensure(len) {
            return false;
        }

        for info in &mut self.info[self.len..len.max(self.len)] {
            *info = GlyphInfo::default();
        }
        for pos in &mut self.pos[self.len..len.max(self.len)] {
            *pos = GlyphPosition::default();
        }

        self.len = len;
        true
    }

    #[inline]
    pub(crate) fn cur(&self, i: usize) -> &GlyphInfo {
        &self.info[self.idx + i]
    }

    #[inline]
    pub(crate) fn cur_mut(&mut self, i: usize) -> &mut GlyphInfo {
        let idx = self.idx + i;
        &mut self.info[idx]
    }

    #[inline]
    pub(crate) fn prev(&self) -> &GlyphInfo {
        let idx = self.out_len.saturating_sub(1);
        &self.out_info()[idx]
    }

    #[inline]
    pub(crate) fn prev_mut(&mut self) -> &mut GlyphInfo {
        let idx = self.out_len.saturating_sub(1);
        &mut self.out_info_mut()[idx]
    }

    #[inline]
    pub(crate) fn out_info(&self) -> &[GlyphInfo] {
        if self.have_separate_output {
            bytemuck::cast_slice(self.pos.as_slice())
        } else {
            &self.info
        }
    }

    #[inline]
    pub(crate) fn out_info_mut(&mut self) -> &mut [GlyphInfo] {
        if self.have_separate_output {
            bytemuck::cast_slice_mut(self.pos.as_mut_slice())
        } else {
            &mut self.info
        }
    }

    pub(crate) fn clear_output(&mut self) {
        self.have_output = true;
        self.have_positions = false;

        self.idx = 0;
        self.out_len = 0;
        self.have_separate_output = false;
    }

    pub(crate) fn clear_positions(&mut self) {
        self.have_output = false;
        self.have_positions = true;

        self.out_len = 0;
        self.have_separate_output = false;

        for pos in &mut self.pos {
            *pos = GlyphPosition::default();
        }
    }

    fn make_room_for(&mut self, num_in: usize, num_out: usize) -> bool {
        if !self.ensure(self.out_len + num_out) {
            return false;
        }

        if !self.have_separate_output && self.out_len + num_out > self.idx + num_in {
            debug_assert!(self.have_output);

            self.have_separate_output = true;
            for i in 0..self.out_len {
                self.pos[i] = bytemuck::cast(self.info[i]);
            }
        }

        true
    }

    /// Copies the glyph at the input cursor to the output and advances.
    pub(crate) fn next_glyph(&mut self) {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(1, 1) {
                    return;
                }

                let out_len = self.out_len;
                self.out_info_mut()[out_len] = self.info[self.idx];
            }

            self.out_len += 1;
        }

        self.idx += 1;
    }

    pub(crate) fn next_glyphs(&mut self, n: usize) {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(n, n) {
                    return;
                }

                for i in 0..n {
                    let out_len = self.out_len + i;
                    self.out_info_mut()[out_len] = self.info[self.idx + i];
                }
            }

            self.out_len += n;
        }

        self.idx += n;
    }

    /// Drops the glyph at the input cursor.
    #[inline]
    pub(crate) fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    /// Appends a copy of the current glyph with a new id, without consuming input.
    pub(crate) fn output_glyph(&mut self, glyph_index: u32) {
        if !self.make_room_for(0, 1) {
            return;
        }

        if self.idx == self.len && self.out_len == 0 {
            return;
        }

        let out_len = self.out_len;
        if self.idx < self.len {
            self.out_info_mut()[out_len] = self.info[self.idx];
        } else {
            self.out_info_mut()[out_len] = self.out_info()[out_len - 1];
        }
        self.out_info_mut()[out_len].glyph_id = glyph_index;

        self.out_len += 1;
    }

    pub(crate) fn output_info(&mut self, glyph_info: GlyphInfo) {
        if !self.make_room_for(0, 1) {
            return;
        }

        let out_len = self.out_len;
        self.out_info_mut()[out_len] = glyph_info;
        self.out_len += 1;
    }

    /// Replaces the glyph at the input cursor and advances.
    pub(crate) fn replace_glyph(&mut self, glyph_index: u32) {
        if self.have_separate_output || self.out_len != self.idx {
            if !self.make_room_for(1, 1) {
                return;
            }

            let out_len = self.out_len;
            self.out_info_mut()[out_len] = self.info[self.idx];
        }

        let out_len = self.out_len;
        self.out_info_mut()[out_len].glyph_id = glyph_index;

        self.idx += 1;
        self.out_len += 1;
    }

    /// Consumes `num_in` input glyphs and outputs `glyph_data` in their place,
    /// all in one merged cluster.
    pub(crate) fn replace_glyphs(&mut self, num_in: usize, num_out: usize, glyph_data: &[u32]) {
        if !self.make_room_for(num_in, num_out) {
            return;
        }

        debug_assert!(self.idx + num_in <= self.len);

        self.merge_clusters(self.idx, self.idx + num_in);

        let orig_info = self.info[self.idx];
        for (i, &glyph) in glyph_data.iter().take(num_out).enumerate() {
            let ii = self.out_len + i;
            self.out_info_mut()[ii] = orig_info;
            self.out_info_mut()[ii].glyph_id = glyph;
        }

        self.idx += num_in;
        self.out_len += num_out;
    }

    /// Makes the output sequence the new input.
    pub(crate) fn swap_buffers(&mut self) {
        if !self.successful {
            self.have_output = false;
            self.have_separate_output = false;
            self.out_len = 0;
            self.idx = 0;
            return;
        }

        debug_assert!(self.have_output);
        self.next_glyphs(self.len - self.idx);

        if self.have_separate_output {
            // Swap info and pos buffers.
            let info: Vec<GlyphPosition> = bytemuck::cast_vec(std::mem::take(&mut self.info));
            let pos: Vec<GlyphInfo> = bytemuck::cast_vec(std::mem::take(&mut self.pos));
            self.pos = info;
            self.info = pos;
            self.have_separate_output = false;
        }

        self.len = self.out_len;

        self.have_output = false;
        self.out_len = 0;
        self.idx = 0;
    }

    /// Reverses records and positions in `start..end`.
    pub fn reverse_range(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    /// Reverses the whole buffer.
    pub fn reverse(&mut self) {
        if self.is_empty() {
            return;
        }

        self.reverse_range(0, self.len);
    }

    /// Reverses the order of clusters, keeping the order inside each cluster.
    pub fn reverse_clusters(&mut self) {
        if self.is_empty() {
            return;
        }

        let mut start = 0;
        for i in 1..self.len {
            if self.info[i - 1].cluster != self.info[i].cluster {
                self.reverse_range(start, i);
                start = i;
            }
        }

        self.reverse_range(start, self.len);
        self.reverse();
    }

    /// Gives every record in `start..end` (extended to whole clusters) the
    /// smallest cluster value among them.
    pub fn merge_clusters(&mut self, mut start: usize, mut end: usize) {
        if end - start < 2 {
            return;
        }

        let mut cluster = self.info[start].cluster;
        for info in &self.info[start + 1..end] {
            cluster = cluster.min(info.cluster);
        }

        // Extend end
        while end < self.len && self.info[end - 1].cluster == self.info[end].cluster {
            end += 1;
        }

        // Extend start
        while start > self.idx && self.info[start - 1].cluster == self.info[start].cluster {
            start -= 1;
        }

        // If we hit the start of buffer, continue in out-buffer.
        if self.have_output && self.idx == start && self.info[start].cluster != cluster {
            let start_cluster = self.info[start].cluster;
            let mut i = self.out_len;
            while i != 0 && self.out_info()[i - 1].cluster == start_cluster {
                self.out_info_mut()[i - 1].cluster = cluster;
                i -= 1;
            }
        }

        for info in &mut self.info[start..end] {
            info.cluster = cluster;
        }
    }

    /// Same as `merge_clusters`, over the output sequence.
    pub(crate) fn merge_out_clusters(&mut self, mut start: usize, mut end: usize) {
        if end - start < 2 {
            return;
        }

        let mut cluster = self.out_info()[start].cluster;
        for info in &self.out_info()[start + 1..end] {
            cluster = cluster.min(info.cluster);
        }

        // Extend start
        while start != 0 && self.out_info()[start - 1].cluster == self.out_info()[start].cluster {
            start -= 1;
        }

        // Extend end
        while end < self.out_len && self.out_info()[end - 1].cluster == self.out_info()[end].cluster {
            end += 1;
        }

        // If we hit the end of out-buffer, continue in buffer.
        if end == self.out_len {
            let end_cluster = self.out_info()[end - 1].cluster;
            let mut i = self.idx;
            while i < self.len && self.info[i].cluster == end_cluster {
                self.info[i].cluster = cluster;
                i += 1;
            }
        }

        for info in &mut self.out_info_mut()[start..end] {
            info.cluster = cluster;
        }
    }

    /// Stable insertion sort of `start..end`, merging the clusters of
    /// every moved record.
    pub(crate) fn sort(&mut self, start: usize, end: usize, cmp: impl Fn(&GlyphInfo, &GlyphInfo) -> bool) {
        debug_assert!(!self.have_positions);

        for i in start + 1..end {
            let mut j = i;
            while j > start && cmp(&self.info[j - 1], &self.info[i]) {
                j -= 1;
            }

            if i == j {
                continue;
            }

            // Move item i to occupy place for item j, shift what's in between.
            self.merge_clusters(j, i + 1);
            self.info[j..=i].rotate_right(1);
        }
    }

    /// Deletes records matching `filter` from a positioned buffer,
    /// merging their clusters into a neighbour.
    pub(crate) fn delete_glyphs_inplace(&mut self, filter: impl Fn(&GlyphInfo) -> bool) {
        // We can't use the out-buffer as we have positioning data.
        let mut j = 0;

        for i in 0..self.len {
            if filter(&self.info[i]) {
                // Merge clusters.
                let cluster = self.info[i].cluster;
                if i + 1 < self.len && cluster == self.info[i + 1].cluster {
                    // Cluster survives; do nothing.
                    continue;
                }

                if j != 0 {
                    // Merge cluster backward.
                    if cluster < self.info[j - 1].cluster {
                        let old_cluster = self.info[j - 1].cluster;
                        let mut k = j;
                        while k > 0 && self.info[k - 1].cluster == old_cluster {
                            self.info[k - 1].cluster = cluster;
                            k -= 1;
                        }
                    }
                    continue;
                }

                if i + 1 < self.len {
                    // Merge cluster forward.
                    self.merge_clusters(i, i + 2);
                }

                continue;
            }

            if j != i {
                self.info[j] = self.info[i];
                self.pos[j] = self.pos[i];
            }

            j += 1;
        }

        self.len = j;
    }

    /// Sets every record's mask.
    pub(crate) fn reset_masks(&mut self, mask: Mask) {
        for info in &mut self.info[..self.len] {
            info.mask = mask;
        }
    }

    /// Sets `value` under `mask` on records whose cluster is in
    /// `cluster_start..cluster_end`.
    pub(crate) fn set_masks(
        &mut self,
        mut value: Mask,
        mask: Mask,
        cluster_start: u32,
        cluster_end: u32,
    ) {
        if mask == 0 {
            return;
        }

        let not_mask = !mask;
        value &= mask;

        if cluster_start == 0 && cluster_end == u32::MAX {
            for info in &mut self.info[..self.len] {
                info.mask = (info.mask & not_mask) | value;
            }

            return;
        }

        for info in &mut self.info[..self.len] {
            if cluster_start <= info.cluster && info.cluster < cluster_end {
                info.mask = (info.mask & not_mask) | value;
            }
        }
    }

    /// Serializes the buffer into harfbuzz's text format.
    ///
    /// Glyph records print as `name=cluster@x,y+advance`; Unicode records
    /// as `U+XXXX=cluster`.
    pub fn serialize(&self, font: &dyn Font, flags: SerializeFlags) -> String {
        self.serialize_impl(font, flags).unwrap_or_default()
    }

    fn serialize_impl(&self, font: &dyn Font, flags: SerializeFlags) -> Result<String, std::fmt::Error> {
        let mut s = String::with_capacity(64);

        if self.content_type == ContentType::Unicode {
            for info in self.glyph_infos() {
                write!(&mut s, "U+{:04X}", info.glyph_id)?;
                if !flags.contains(SerializeFlags::NO_CLUSTERS) {
                    write!(&mut s, "={}", info.cluster)?;
                }
                s.push('|');
            }
            s.pop();
            return Ok(s);
        }

        let positions = self.glyph_positions();
        let mut x = 0;
        let mut y = 0;
        for (i, info) in self.glyph_infos().iter().enumerate() {
            if !flags.contains(SerializeFlags::NO_GLYPH_NAMES) {
                match font.glyph_name(info.glyph_id) {
                    Some(name) => s.push_str(&name),
                    None => write!(&mut s, "gid{}", info.glyph_id)?,
                }
            } else {
                write!(&mut s, "{}", info.glyph_id)?;
            }

            if !flags.contains(SerializeFlags::NO_CLUSTERS) {
                write!(&mut s, "={}", info.cluster)?;
            }

            let pos = positions.get(i).copied().unwrap_or_default();
            if !flags.contains(SerializeFlags::NO_POSITIONS) {
                if x + pos.x_offset != 0 || y + pos.y_offset != 0 {
                    write!(&mut s, "@{},{}", x + pos.x_offset, y + pos.y_offset)?;
                }

                if !flags.contains(SerializeFlags::NO_ADVANCES) {
                    write!(&mut s, "+{}", pos.x_advance)?;
                    if pos.y_advance != 0 {
                        write!(&mut s, ",{}", pos.y_advance)?;
                    }
                }
            }

            if flags.contains(SerializeFlags::GLYPH_EXTENTS) {
                let e = font.glyph_extents(info.glyph_id).unwrap_or_default();
                write!(&mut s, "<{},{},{},{}>", e.x_bearing, e.y_bearing, e.width, e.height)?;
            }

            if flags.contains(SerializeFlags::NO_ADVANCES) {
                x += pos.x_advance;
                y += pos.y_advance;
            }

            s.push('|');
        }

        // Remove last `|`.
        s.pop();

        Ok(s)
    }
}

/// A buffer that contains an input string ready for shaping.
#[derive(Clone, Debug, Default)]
pub struct UnicodeBuffer(pub(crate) Buffer);

impl UnicodeBuffer {
    /// Create a new `UnicodeBuffer`.
    #[inline]
    pub fn new() -> UnicodeBuffer {
        UnicodeBuffer(Buffer::new())
    }

    /// Returns the length of the data of the buffer.
    ///
    /// This corresponds to the number of unicode codepoints contained in the
    /// buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pushes a string to a buffer.
    #[inline]
    pub fn push_str(&mut self, str: &str) {
        self.0.push_str(str);
    }

    /// Appends a character to a buffer with the given cluster value.
    #[inline]
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        self.0.add(codepoint, cluster);
    }

    /// Set the text direction of the `Buffer`'s contents.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.0.set_direction(direction);
    }

    /// Returns the `Buffer`'s text direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.0.direction()
    }

    /// Set the script from an ISO15924 tag.
    #[inline]
    pub fn set_script(&mut self, script: Script) {
        self.0.set_script(script);
    }

    /// Get the ISO15924 script tag.
    #[inline]
    pub fn script(&self) -> Option<Script> {
        self.0.script()
    }

    /// Set the buffer language.
    #[inline]
    pub fn set_language(&mut self, lang: Language) {
        self.0.set_language(lang);
    }

    /// Get the buffer language.
    #[inline]
    pub fn language(&self) -> Option<&Language> {
        self.0.language()
    }

    /// Guess the segment properties (direction, language, script) for the
    /// current buffer.
    #[inline]
    pub fn guess_segment_properties(&mut self) {
        self.0.guess_segment_properties();
    }

    /// Set the flags for this buffer.
    #[inline]
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.0.set_flags(flags);
    }

    /// Get the flags for this buffer.
    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.0.flags()
    }

    /// Resets clusters.
    #[inline]
    pub fn reset_clusters(&mut self) {
        self.0.reset_clusters();
    }

    /// Clear the contents of the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Unwraps the low-level buffer.
    #[inline]
    pub fn into_inner(self) -> Buffer {
        self.0
    }
}

/// A buffer that contains the results of the shaping process.
#[derive(Clone, Debug)]
pub struct GlyphBuffer(pub(crate) Buffer);

impl GlyphBuffer {
    /// Returns the length of the data of the buffer.
    ///
    /// When called before shaping this is the number of unicode codepoints
    /// contained in the buffer. When called after shaping it returns the number
    /// of glyphs stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the glyph infos.
    #[inline]
    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        self.0.glyph_infos()
    }

    /// Get the glyph positions.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        self.0.glyph_positions()
    }

    /// Returns the direction the glyphs are laid out in.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.0.direction()
    }

    /// Borrows the low-level buffer.
    #[inline]
    pub fn as_buffer(&self) -> &Buffer {
        &self.0
    }

    /// Clears the content of the glyph buffer and returns an empty
    /// `UnicodeBuffer` reusing the existing allocation.
    #[inline]
    pub fn clear(mut self) -> UnicodeBuffer {
        self.0.clear();
        UnicodeBuffer(self.0)
    }

    /// Converts the glyph buffer content into a string.
    pub fn serialize(&self, font: &dyn Font, flags: SerializeFlags) -> String {
        self.0.serialize(font, flags)
    }
}
