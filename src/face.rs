use ttf_parser::gdef::GlyphClass;
use ttf_parser::GlyphId;

use crate::buffer::GlyphPropsFlags;
use crate::font::{Font, GlyphExtents, MathGlyphConstruction, MathGlyphPart, MathGlyphVariant, Metric};

// https://docs.microsoft.com/en-us/typography/opentype/spec/cmap#windows-platform-platform-id--3
const WINDOWS_SYMBOL_ENCODING: u16 = 0;
const WINDOWS_UNICODE_BMP_ENCODING: u16 = 1;
const WINDOWS_UNICODE_FULL_ENCODING: u16 = 10;

// https://docs.microsoft.com/en-us/typography/opentype/spec/name#platform-specific-encoding-and-language-ids-unicode-platform-platform-id--0
const UNICODE_1_0_ENCODING: u16 = 0;
const UNICODE_1_1_ENCODING: u16 = 1;
const UNICODE_ISO_ENCODING: u16 = 2;
const UNICODE_2_0_BMP_ENCODING: u16 = 3;
const UNICODE_2_0_FULL_ENCODING: u16 = 4;
const UNICODE_FULL_ENCODING: u16 = 6;

/// A font face handle.
///
/// Implements [`Font`] over the tables `ttf_parser` exposes.
#[derive(Clone)]
pub struct Face<'a> {
    ttfp_face: ttf_parser::Face<'a>,
    units_per_em: u16,
    pixels_per_em: Option<(u16, u16)>,
    prefered_cmap_encoding_subtable: Option<u16>,
}

impl<'a> AsRef<ttf_parser::Face<'a>> for Face<'a> {
    #[inline]
    fn as_ref(&self) -> &ttf_parser::Face<'a> {
        &self.ttfp_face
    }
}

impl<'a> Face<'a> {
    /// Creates a new `Face` from data.
    ///
    /// Data will be referenced, not owned.
    pub fn from_slice(data: &'a [u8], face_index: u32) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, face_index).ok()?;
        Some(Self::from_face(face))
    }

    /// Creates a new [`Face`] from [`ttf_parser::Face`].
    pub fn from_face(face: ttf_parser::Face<'a>) -> Self {
        Face {
            units_per_em: face.units_per_em(),
            pixels_per_em: None,
            prefered_cmap_encoding_subtable: find_best_cmap_subtable(&face),
            ttfp_face: face,
        }
    }

    /// Sets pixels per EM.
    ///
    /// Selects the raster strike used for glyph extents.
    ///
    /// `None` by default.
    #[inline]
    pub fn set_pixels_per_em(&mut self, ppem: Option<(u16, u16)>) {
        self.pixels_per_em = ppem;
    }

    fn glyph_id(glyph: u32) -> GlyphId {
        GlyphId(u16::try_from(glyph).unwrap_or(0))
    }

    fn nominal_glyph_impl(&self, mut c: u32) -> Option<GlyphId> {
        let subtable_idx = self.prefered_cmap_encoding_subtable?;
        let subtable = self.ttfp_face.tables().cmap?.subtables.get(subtable_idx)?;

        if subtable.platform_id == ttf_parser::PlatformId::Macintosh && c > 0x7F {
            c = unicode_to_macroman(c);
        }

        match subtable.glyph_index(c) {
            Some(gid) => Some(gid),
            None => {
                // For symbol-encoded OpenType fonts, we duplicate the
                // U+F000..F0FF range at U+0000..U+00FF.
                if subtable.platform_id == ttf_parser::PlatformId::Windows
                    && subtable.encoding_id == WINDOWS_SYMBOL_ENCODING
                    && c <= 0x00FF
                {
                    return self.nominal_glyph_impl(0xF000 + c);
                }

                None
            }
        }
    }

    fn glyph_advance(&self, glyph: GlyphId, is_vertical: bool) -> u32 {
        let face = &self.ttfp_face;
        if is_vertical {
            if face.tables().vmtx.is_some() {
                u32::from(face.glyph_ver_advance(glyph).unwrap_or(0))
            } else {
                (i32::from(face.ascender()) - i32::from(face.descender())) as u32
            }
        } else if face.tables().hmtx.is_some() {
            u32::from(face.glyph_hor_advance(glyph).unwrap_or(0))
        } else {
            u32::from(face.units_per_em())
        }
    }

    fn glyph_v_origin_y(&self, glyph: GlyphId) -> i32 {
        let face = &self.ttfp_face;
        if let Some(y) = face.glyph_y_origin(glyph) {
            return i32::from(y);
        }

        match self.glyph_extents(u32::from(glyph.0)) {
            Some(extents) => {
                if face.tables().vmtx.is_some() {
                    let bearing = face.glyph_ver_side_bearing(glyph).unwrap_or(0);
                    extents.y_bearing + i32::from(bearing)
                } else {
                    let advance = i32::from(face.ascender()) - i32::from(face.descender());
                    let diff = advance - -extents.height;
                    extents.y_bearing + (diff >> 1)
                }
            }
            None => i32::from(face.ascender()),
        }
    }
}

impl Font for Face<'_> {
    #[inline]
    fn units_per_em(&self) -> i32 {
        i32::from(self.units_per_em)
    }

    fn nominal_glyph(&self, c: char) -> Option<u32> {
        self.nominal_glyph_impl(u32::from(c)).map(|g| u32::from(g.0))
    }

    fn variation_glyph(&self, c: char, variation: char) -> Option<u32> {
        self.ttfp_face
            .glyph_variation_index(c, variation)
            .map(|g| u32::from(g.0))
    }

    fn glyph_h_advance(&self, glyph: u32) -> i32 {
        self.glyph_advance(Self::glyph_id(glyph), false) as i32
    }

    fn glyph_v_advance(&self, glyph: u32) -> i32 {
        -(self.glyph_advance(Self::glyph_id(glyph), true) as i32)
    }

    fn glyph_v_origin(&self, glyph: u32) -> (i32, i32) {
        (self.glyph_h_advance(glyph) / 2, self.glyph_v_origin_y(Self::glyph_id(glyph)))
    }

    fn glyph_h_kerning(&self, left: u32, right: u32) -> i32 {
        let Some(kern) = self.ttfp_face.tables().kern else {
            return 0;
        };

        let (left, right) = (Self::glyph_id(left), Self::glyph_id(right));
        kern.subtables
            .into_iter()
            .filter(|s| s.horizontal && !s.variable && !s.has_cross_stream && !s.has_state_machine)
            .filter_map(|s| s.glyphs_kerning(left, right))
            .map(i32::from)
            .sum()
    }

    fn glyph_extents(&self, glyph: u32) -> Option<GlyphExtents> {
        let glyph = Self::glyph_id(glyph);
        let pixels_per_em = match self.pixels_per_em {
            Some(ppem) => ppem.0,
            None => u16::MAX,
        };

        if let Some(img) = self.ttfp_face.glyph_raster_image(glyph, pixels_per_em) {
            // Only PNG strikes carry usable metrics.
            if img.format == ttf_parser::RasterImageFormat::PNG {
                // Zero height is accepted.
                if img.width == 0 {
                    return None;
                }

                let scale = f32::from(self.units_per_em) / f32::from(img.pixels_per_em);
                return Some(GlyphExtents {
                    x_bearing: (f32::from(img.x) * scale).round() as i32,
                    y_bearing: ((f32::from(img.y) + f32::from(img.height)) * scale).round() as i32,
                    width: (f32::from(img.width) * scale).round() as i32,
                    height: (-f32::from(img.height) * scale).round() as i32,
                });
            }
        }

        let glyf = self.ttfp_face.tables().glyf;
        let bbox = glyf.and_then(|glyf| glyf.bbox(glyph));

        // Empty glyph; zero extents.
        if glyf.is_some() && bbox.is_none() {
            return Some(GlyphExtents::default());
        }

        let bbox = bbox.or_else(|| self.ttfp_face.glyph_bounding_box(glyph))?;
        Some(GlyphExtents {
            x_bearing: i32::from(bbox.x_min),
            y_bearing: i32::from(bbox.y_max),
            width: i32::from(bbox.width()),
            height: i32::from(bbox.y_min) - i32::from(bbox.y_max),
        })
    }

    fn glyph_name(&self, glyph: u32) -> Option<String> {
        self.ttfp_face.glyph_name(Self::glyph_id(glyph)).map(str::to_string)
    }

    fn has_glyph_classes(&self) -> bool {
        self.ttfp_face
            .tables()
            .gdef
            .is_some_and(|gdef| gdef.has_glyph_classes())
    }

    fn glyph_class(&self, glyph: u32) -> GlyphPropsFlags {
        let Some(table) = self.ttfp_face.tables().gdef else {
            return GlyphPropsFlags::empty();
        };

        let glyph = Self::glyph_id(glyph);
        match table.glyph_class(glyph) {
            Some(GlyphClass::Base) => GlyphPropsFlags::BASE_GLYPH,
            Some(GlyphClass::Ligature) => GlyphPropsFlags::LIGATURE,
            Some(GlyphClass::Mark) => {
                let class = table.glyph_mark_attachment_class(glyph);
                GlyphPropsFlags::from_bits_retain((class << 8) | GlyphPropsFlags::MARK.bits())
            }
            _ => GlyphPropsFlags::empty(),
        }
    }

    fn has_positioning(&self) -> bool {
        self.ttfp_face.tables().gpos.is_some()
    }

    fn metric(&self, metric: Metric) -> Option<i32> {
        let tables = self.ttfp_face.tables();
        let os2 = tables.os2;
        let hhea = tables.hhea;
        let use_typo = os2.is_some_and(|os2| os2.use_typographic_metrics());

        let value = match metric {
            Metric::HorizontalAscender if !use_typo => hhea.ascender,
            Metric::HorizontalAscender => os2?.typographic_ascender(),
            Metric::HorizontalDescender if !use_typo => hhea.descender,
            Metric::HorizontalDescender => os2?.typographic_descender(),
            Metric::HorizontalLineGap if !use_typo => hhea.line_gap,
            Metric::HorizontalLineGap => os2?.typographic_line_gap(),
            Metric::HorizontalClippingAscent => os2?.windows_ascender(),
            Metric::HorizontalClippingDescent => os2?.windows_descender(),
            Metric::VerticalAscender => tables.vhea?.ascender,
            Metric::VerticalDescender => tables.vhea?.descender,
            Metric::VerticalLineGap => tables.vhea?.line_gap,
            Metric::XHeight => os2?.x_height()?,
            Metric::CapHeight => os2?.capital_height()?,
            Metric::SubscriptEmXSize => os2?.subscript_metrics().x_size,
            Metric::SubscriptEmYSize => os2?.subscript_metrics().y_size,
            Metric::SubscriptEmXOffset => os2?.subscript_metrics().x_offset,
            Metric::SubscriptEmYOffset => os2?.subscript_metrics().y_offset,
            Metric::SuperscriptEmXSize => os2?.superscript_metrics().x_size,
            Metric::SuperscriptEmYSize => os2?.superscript_metrics().y_size,
            Metric::SuperscriptEmXOffset => os2?.superscript_metrics().x_offset,
            Metric::SuperscriptEmYOffset => os2?.superscript_metrics().y_offset,
            Metric::StrikeoutSize => os2?.strikeout_metrics().thickness,
            Metric::StrikeoutOffset => os2?.strikeout_metrics().position,
            Metric::UnderlineSize => tables.post?.underline_metrics.thickness,
            Metric::UnderlineOffset => tables.post?.underline_metrics.position,
        };

        Some(i32::from(value))
    }

    fn has_math_data(&self) -> bool {
        self.ttfp_face.tables().math.is_some()
    }

    fn math_min_connector_overlap(&self, _horizontal: bool) -> i32 {
        self.ttfp_face
            .tables()
            .math
            .and_then(|math| math.variants)
            .map_or(0, |variants| i32::from(variants.min_connector_overlap))
    }

    fn math_glyph_construction(&self, glyph: u32, horizontal: bool) -> Option<MathGlyphConstruction> {
        let variants = self.ttfp_face.tables().math?.variants?;
        let constructions = if horizontal {
            variants.horizontal_constructions
        } else {
            variants.vertical_constructions
        };
        let construction = constructions.get(Self::glyph_id(glyph))?;

        let variants = construction
            .variants
            .into_iter()
            .map(|v| MathGlyphVariant {
                glyph: u32::from(v.variant_glyph.0),
                advance: i32::from(v.advance_measurement),
            })
            .collect();

        let assembly = construction.assembly.map(|assembly| {
            assembly
                .parts
                .into_iter()
                .map(|part| MathGlyphPart {
                    glyph: u32::from(part.glyph_id.0),
                    start_connector_length: i32::from(part.start_connector_length),
                    end_connector_length: i32::from(part.end_connector_length),
                    full_advance: i32::from(part.full_advance),
                    is_extender: part.part_flags.extender(),
                })
                .collect()
        });

        Some(MathGlyphConstruction { variants, assembly })
    }
}

fn find_best_cmap_subtable(face: &ttf_parser::Face) -> Option<u16> {
    use ttf_parser::PlatformId;

    // Symbol subtable.
    // Prefer symbol if available.
    // https://github.com/harfbuzz/harfbuzz/issues/1918
    find_cmap_subtable(face, PlatformId::Windows, WINDOWS_SYMBOL_ENCODING)
        // 32-bit subtables:
        .or_else(|| find_cmap_subtable(face, PlatformId::Windows, WINDOWS_UNICODE_FULL_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_FULL_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_2_0_FULL_ENCODING))
        // 16-bit subtables:
        .or_else(|| find_cmap_subtable(face, PlatformId::Windows, WINDOWS_UNICODE_BMP_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_2_0_BMP_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_ISO_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_1_1_ENCODING))
        .or_else(|| find_cmap_subtable(face, PlatformId::Unicode, UNICODE_1_0_ENCODING))
        // MacRoman subtable:
        .or_else(|| find_cmap_subtable(face, PlatformId::Macintosh, 0))
}

fn find_cmap_subtable(
    face: &ttf_parser::Face,
    platform_id: ttf_parser::PlatformId,
    encoding_id: u16,
) -> Option<u16> {
    face.tables()
        .cmap?
        .subtables
        .into_iter()
        .position(|s| s.platform_id == platform_id && s.encoding_id == encoding_id)
        .and_then(|i| u16::try_from(i).ok())
}

#[rustfmt::skip]
static UNICODE_TO_MACROMAN: &[u16] = &[
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1,
    0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8,
    0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3,
    0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC,
    0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF,
    0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8,
    0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202, 0x2211,
    0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8,
    0x00BF, 0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB,
    0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5, 0x0152, 0x0153,
    0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
    0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02,
    0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1,
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4,
    0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC,
    0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

fn unicode_to_macroman(c: u32) -> u32 {
    let u = c as u16;
    let Some(index) = UNICODE_TO_MACROMAN.iter().position(|m| *m == u) else {
        return 0;
    };
    (0x80 + index) as u32
}
