use stretchybuzz::{
    stretch, stretch_max_orthogonal_advance, Buffer, ContentType, MathGlyphConstruction,
    MathGlyphPart, MathGlyphVariant, MAX_PARTS,
};

use crate::TestFont;

fn glyph_ids(buffer: &Buffer) -> Vec<u32> {
    buffer.glyph_infos().iter().map(|i| i.glyph_id).collect()
}

fn unicode(c: char) -> Buffer {
    let mut buffer = Buffer::new();
    buffer.add(c, 0);
    buffer
}

fn glyph(id: u32) -> Buffer {
    let mut buffer = Buffer::new();
    buffer.add_glyph(id, 0);
    buffer
}

fn part(glyph: u32, connectors: i32, full_advance: i32, is_extender: bool) -> MathGlyphPart {
    MathGlyphPart {
        glyph,
        start_connector_length: connectors,
        end_connector_length: connectors,
        full_advance,
        is_extender,
    }
}

fn brackets() -> TestFont {
    TestFont::new()
        .vertical('(', "parenleft", 300, -100)
        .vertical('\u{239B}', "parenlefttp", 250, -100)
        .vertical('\u{239C}', "parenleftex", 400, -100)
        .vertical('\u{239D}', "parenleftbt", 250, -100)
        .glyph('\u{00AF}', "macron", 10)
        .glyph('\u{203E}', "overline", 10)
        .glyph('x', "x", 500)
}

#[test]
fn macron_is_assembled_horizontally() {
    let font = brackets();
    let mut buffer = unicode('\u{00AF}');
    assert!(stretch(&font, &mut buffer, true, 35));

    let (overline, macron) = (font.gid("overline"), font.gid("macron"));
    assert_eq!(glyph_ids(&buffer), vec![overline, macron, macron, macron]);
    assert_eq!(buffer.content_type(), ContentType::Glyphs);

    let offsets: Vec<_> = buffer.glyph_positions().iter().map(|p| p.x_offset).collect();
    assert_eq!(offsets, vec![0, 10, 20, 30]);

    let last = buffer.glyph_positions()[3];
    assert_eq!(last.x_advance, 40);
    assert_eq!(last.y_advance, -1000);
    assert!(buffer.glyph_positions()[..3].iter().all(|p| p.x_advance == 0));
}

#[test]
fn parenthesis_is_assembled_vertically() {
    let font = brackets();
    let mut buffer = unicode('(');
    assert!(stretch(&font, &mut buffer, false, 350));

    let (top, ext, bottom) = (font.gid("parenlefttp"), font.gid("parenleftex"), font.gid("parenleftbt"));
    assert_eq!(glyph_ids(&buffer), vec![bottom, ext, ext, top]);

    let offsets: Vec<_> = buffer.glyph_positions().iter().map(|p| p.y_offset).collect();
    assert_eq!(offsets, vec![-300, -200, -100, 0]);

    let last = buffer.glyph_positions()[3];
    assert_eq!(last.x_advance, 400);
    assert_eq!(last.y_advance, -400);
}

#[test]
fn base_glyph_is_enough() {
    let font = brackets();
    let mut buffer = unicode('(');
    assert!(stretch(&font, &mut buffer, false, 100));

    assert_eq!(glyph_ids(&buffer), vec![font.gid("parenleft")]);
    let pos = buffer.glyph_positions()[0];
    assert_eq!((pos.x_advance, pos.y_advance, pos.x_offset, pos.y_offset), (300, -100, 0, 0));
}

#[test]
fn character_without_construction_keeps_its_glyph() {
    let font = brackets();
    let mut buffer = unicode('x');
    assert!(stretch(&font, &mut buffer, true, 5000));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("x")]);
    assert_eq!(buffer.glyph_positions()[0].x_advance, 500);
}

#[test]
fn character_without_glyph_is_rejected() {
    let font = brackets();
    let mut buffer = unicode('y');
    assert!(!stretch(&font, &mut buffer, true, 10));
    assert_eq!(buffer.content_type(), ContentType::Unicode);
}

#[test]
fn only_single_elements_stretch() {
    let font = brackets();

    let mut empty = Buffer::new();
    assert!(!stretch(&font, &mut empty, true, 10));

    let mut two = Buffer::new();
    two.push_str("((");
    assert!(!stretch(&font, &mut two, false, 10));
    assert_eq!(two.len(), 2);
}

#[test]
fn larger_variant_is_picked() {
    let font = TestFont::new()
        .unmapped("brace", 100)
        .unmapped("brace.v1", 200)
        .unmapped("brace.v2", 300)
        .construction(
            "brace",
            true,
            MathGlyphConstruction {
                variants: vec![
                    MathGlyphVariant { glyph: 2, advance: 200 },
                    MathGlyphVariant { glyph: 3, advance: 300 },
                ],
                assembly: None,
            },
        );

    let mut buffer = glyph(font.gid("brace"));
    assert!(stretch(&font, &mut buffer, true, 250));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("brace.v2")]);
    assert_eq!(buffer.glyph_positions()[0].x_advance, 300);

    // Too large for every variant: the last one is used.
    let mut buffer = glyph(font.gid("brace"));
    assert!(stretch(&font, &mut buffer, true, 1000));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("brace.v2")]);
}

#[test]
fn extenders_repeat_to_the_target() {
    let font = TestFont::new()
        .unmapped("bar", 10)
        .unmapped("bar.ex", 10)
        .min_overlap(2)
        .construction(
            "bar",
            true,
            MathGlyphConstruction {
                variants: vec![],
                assembly: Some(vec![part(2, 5, 10, true)]),
            },
        );

    let mut buffer = glyph(font.gid("bar"));
    assert!(stretch(&font, &mut buffer, true, 25));

    assert_eq!(glyph_ids(&buffer), vec![2, 2, 2]);
    let offsets: Vec<_> = buffer.glyph_positions().iter().map(|p| p.x_offset).collect();
    assert_eq!(offsets, vec![0, 8, 16]);
    assert_eq!(buffer.glyph_positions()[2].x_advance, 26);
}

#[test]
fn overlaps_grow_towards_the_target() {
    let font = TestFont::new()
        .unmapped("arrow", 10)
        .unmapped("arrow.lft", 10)
        .unmapped("arrow.ex", 10)
        .unmapped("arrow.rt", 10)
        .min_overlap(1)
        .construction(
            "arrow",
            true,
            MathGlyphConstruction {
                variants: vec![],
                assembly: Some(vec![part(2, 4, 10, false), part(3, 4, 10, true), part(4, 4, 10, false)]),
            },
        );

    let mut buffer = glyph(font.gid("arrow"));
    buffer.glyph_infos_mut()[0].cluster = 7;
    assert!(stretch(&font, &mut buffer, true, 26));

    assert_eq!(glyph_ids(&buffer), vec![2, 3, 4]);
    let offsets: Vec<_> = buffer.glyph_positions().iter().map(|p| p.x_offset).collect();
    assert_eq!(offsets, vec![0, 8, 16]);
    assert_eq!(buffer.glyph_positions()[2].x_advance, 26);
    assert!(buffer.glyph_infos().iter().all(|i| i.cluster == 7));
}

#[test]
fn oversized_assemblies_fall_back() {
    let font = TestFont::new()
        .unmapped("line", 1)
        .unmapped("line.ex", 1)
        .construction(
            "line",
            true,
            MathGlyphConstruction {
                variants: vec![],
                assembly: Some(vec![part(2, 0, 1, true)]),
            },
        );

    let mut buffer = glyph(font.gid("line"));
    assert!(stretch(&font, &mut buffer, true, MAX_PARTS as i32 + 1));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("line")]);

    let mut buffer = glyph(font.gid("line"));
    assert!(stretch(&font, &mut buffer, true, MAX_PARTS as i32));
    assert_eq!(buffer.len(), MAX_PARTS);
}

#[test]
fn assembly_without_extender_length_falls_back() {
    let font = TestFont::new()
        .unmapped("dot", 5)
        .unmapped("dot.ex", 5)
        .construction(
            "dot",
            true,
            MathGlyphConstruction {
                variants: vec![],
                assembly: Some(vec![part(2, 0, 0, true)]),
            },
        );

    let mut buffer = glyph(font.gid("dot"));
    assert!(stretch(&font, &mut buffer, true, 50));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("dot")]);
}

#[test]
fn glyph_without_math_data_is_kept() {
    let font = brackets();
    let mut buffer = glyph(font.gid("x"));
    assert!(stretch(&font, &mut buffer, true, 5000));
    assert_eq!(glyph_ids(&buffer), vec![font.gid("x")]);
    assert_eq!(buffer.glyph_positions()[0].x_advance, 500);
}

#[test]
fn max_orthogonal_advance_of_characters() {
    let font = brackets();
    assert_eq!(stretch_max_orthogonal_advance(&font, &unicode('('), false), -400);
    assert_eq!(stretch_max_orthogonal_advance(&font, &unicode('\u{00AF}'), true), 1000);
    assert_eq!(stretch_max_orthogonal_advance(&font, &unicode('x'), false), -500);
}

#[test]
fn max_orthogonal_advance_of_glyphs() {
    let font = TestFont::new()
        .unmapped("brace", 100)
        .unmapped("brace.v1", 700)
        .unmapped("brace.ex", 300)
        .construction(
            "brace",
            false,
            MathGlyphConstruction {
                variants: vec![MathGlyphVariant { glyph: 2, advance: 2000 }],
                assembly: Some(vec![part(3, 0, 1000, true)]),
            },
        );

    assert_eq!(stretch_max_orthogonal_advance(&font, &glyph(1), false), -700);
    assert_eq!(stretch_max_orthogonal_advance(&font, &Buffer::new(), false), 0);
}
