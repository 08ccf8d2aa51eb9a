use std::str::FromStr;

use stretchybuzz::{
    feature, script, Buffer, ComplexShaper, Direction, Feature, FeatureFlags, Font, ShapePlan,
    ShapePlanner, ShaperData, UnicodeBuffer, ZeroWidthMarksMode, DEFAULT_SHAPER,
};

use crate::{latin, shape, shape_buffer, TestFont};

fn thai() -> TestFont {
    TestFont::new()
        .glyph('\u{0E14}', "do", 600)
        .glyph('\u{0E4B}', "maichattawa", 0)
        .glyph('\u{0E33}', "saraam", 500)
        .glyph('\u{0E4D}', "nikhahit", 0)
        .glyph('\u{0E32}', "saraaa", 450)
        .glyph('\u{0EB3}', "lao_saraam", 500)
        .glyph('\u{0EB2}', "lao_saraaa", 450)
        .glyph('\u{0ECD}', "lao_niggahita", 0)
}

#[test]
fn plain_text() {
    assert_eq!(shape(&latin(), "abc", ""), "a=0+500|b=1+500|c=2+500");
}

#[test]
fn fallback_kerning_splits_the_value() {
    assert_eq!(shape(&latin(), "AV", ""), "A=0+603|V=1@4,0+604");
}

#[test]
fn kerning_applies_to_a_base_and_its_mark() {
    let font = latin().kern("A", "acutecomb", 10);
    assert_eq!(shape(&font, "A\u{0301}", ""), "A=0+605|acutecomb=0@5,0+5");
}

#[test]
fn kerning_does_not_reach_across_a_mark() {
    assert_eq!(shape(&latin(), "A\u{0301}V", ""), "A=0+600|acutecomb=0+0|V=3+600");
}

#[test]
fn kerning_can_be_disabled() {
    assert_eq!(shape(&latin(), "AV", "--features=-kern"), "A=0+600|V=1+600");
}

#[test]
fn kerning_is_left_to_the_font_with_positioning() {
    let font = latin().with_positioning();
    assert_eq!(shape(&font, "AV", ""), "A=0+600|V=1+600");
}

#[test]
fn global_feature() {
    let font = latin().single("smcp", "a", "a.sc");
    assert_eq!(shape(&font, "aaa", "--features=smcp --no-positions"), "a.sc=0|a.sc=1|a.sc=2");
    assert_eq!(shape(&font, "aaa", "--no-positions"), "a=0|a=1|a=2");
}

#[test]
fn ranged_feature_leaves_other_clusters_alone() {
    let font = latin().single("smcp", "a", "a.sc");
    assert_eq!(shape(&font, "aaa", "--features=smcp[1:2] --no-positions"), "a=0|a.sc=1|a=2");
    assert_eq!(shape(&font, "aaa", "--features=smcp[1:] --no-positions"), "a=0|a.sc=1|a.sc=2");
}

#[test]
fn default_ignorables_are_hidden() {
    assert_eq!(shape(&latin(), "a\u{200B}b", ""), "a=0+500|space=1+0|b=4+500");
}

#[test]
fn default_ignorables_are_preserved() {
    assert_eq!(
        shape(&latin(), "a\u{200B}b", "--preserve-default-ignorables"),
        "a=0+500|.notdef=1+300|b=4+500"
    );
}

#[test]
fn default_ignorables_are_removed() {
    assert_eq!(
        shape(&latin(), "a\u{200B}b", "--remove-default-ignorables"),
        "a=0+500|b=4+500"
    );
}

#[test]
fn preserve_wins_over_remove() {
    assert_eq!(
        shape(&latin(), "a\u{200B}b", "--preserve-default-ignorables --remove-default-ignorables"),
        "a=0+500|.notdef=1+300|b=4+500"
    );
}

#[test]
fn ignorables_stay_without_a_space_glyph() {
    let font = TestFont::new().glyph('a', "a", 500);
    assert_eq!(shape(&font, "a\u{200B}", "--no-positions"), "a=0|.notdef=1");
}

#[test]
fn missing_glyph_is_notdef() {
    assert_eq!(shape(&latin(), "aZ", ""), "a=0+500|.notdef=1+300");
}

#[test]
fn marks_join_the_previous_cluster() {
    let glyph_buffer = shape_buffer(&latin(), "a\u{0301}b\u{0301}c", "");
    let clusters: Vec<_> = glyph_buffer.glyph_infos().iter().map(|i| i.cluster).collect();
    assert_eq!(clusters, vec![0, 0, 3, 3, 6]);
}

#[test]
fn marks_have_no_advance() {
    assert_eq!(
        shape(&latin(), "a\u{0301}", "--no-clusters"),
        "a+500|acutecomb+0"
    );
}

#[test]
fn clusters_are_monotonic() {
    let glyph_buffer = shape_buffer(&latin(), "ab\u{0301}\u{200B}c a", "");
    let clusters: Vec<_> = glyph_buffer.glyph_infos().iter().map(|i| i.cluster).collect();
    assert!(clusters.windows(2).all(|w| w[0] <= w[1]), "{:?}", clusters);
}

#[test]
fn dotted_circle_at_beginning_of_text() {
    assert_eq!(
        shape(&latin(), "\u{0301}a", "--bot --no-positions"),
        "dottedcircle=0|acutecomb=0|a=2"
    );
}

#[test]
fn no_dotted_circle_in_the_middle_of_text() {
    assert_eq!(shape(&latin(), "\u{0301}a", "--no-positions"), "acutecomb=0|a=2");
}

#[test]
fn no_dotted_circle_without_a_glyph() {
    let font = TestFont::new().glyph('a', "a", 500).glyph('\u{0301}', "acutecomb", 0);
    assert_eq!(shape(&font, "\u{0301}a", "--bot --no-positions"), "acutecomb=0|a=2");
}

#[test]
fn right_to_left_is_mirrored_and_reversed() {
    assert_eq!(
        shape(&latin(), "a(b", "--direction=rtl --no-positions"),
        "b=2|parenright=1|a=0"
    );
}

#[test]
fn em_space_falls_back_to_the_space_glyph() {
    assert_eq!(shape(&latin(), "a\u{2003}b", ""), "a=0+500|space=1+1000|b=4+500");
}

#[test]
fn figure_space_takes_the_digit_advance() {
    assert_eq!(shape(&latin(), "\u{2007}", ""), "space=0+520");
}

#[test]
fn glyph_ids_without_names() {
    assert_eq!(shape(&latin(), "ab", "--no-glyph-names --no-positions"), "4=0|5=1");
}

#[test]
fn thai_sara_am_is_split() {
    assert_eq!(
        shape(&thai(), "\u{0E14}\u{0E33}", "--no-positions"),
        "do=0|nikhahit=0|saraaa=0"
    );
}

#[test]
fn thai_nikhahit_moves_before_above_base_marks() {
    assert_eq!(
        shape(&thai(), "\u{0E14}\u{0E4B}\u{0E33}", "--no-positions"),
        "do=0|nikhahit=0|maichattawa=0|saraaa=0"
    );
}

#[test]
fn lao_sara_am_is_split() {
    assert_eq!(
        shape(&thai(), "\u{0EB3}", "--no-positions"),
        "lao_niggahita=0|lao_saraaa=0"
    );
}

#[test]
fn top_to_bottom_uses_vertical_metrics() {
    let font = latin().vertical('x', "x", 400, -800);
    assert_eq!(
        shape(&font, "ax", "--direction=ttb"),
        "a=0@-250,-1000+0,-1000|x=1@-200,-1000+0,-800"
    );
}

#[test]
fn vertical_kerning_splits_the_value() {
    let font = latin().vkern("a", "b", -20);
    assert_eq!(
        shape(&font, "ab", "--direction=ttb"),
        "a=0@-250,-1000+0,-1010|b=1@-250,-1010+0,-1010"
    );
    assert_eq!(shape(&font, "ab", "--direction=ltr"), "a=0+500|b=1+500");
}

#[test]
fn bottom_to_top_is_reversed() {
    assert_eq!(shape(&latin(), "abc", "--direction=btt --no-positions"), "c=2|b=1|a=0");
}

static CLASS_MARKS_SHAPER: ComplexShaper = ComplexShaper {
    zero_width_marks: ZeroWidthMarksMode::ByGdef,
    ..DEFAULT_SHAPER
};

#[test]
fn marks_are_zeroed_by_glyph_class() {
    let font = latin().mark_class("b");
    let plan = ShapePlan::with_shaper(
        Direction::LeftToRight,
        Some(script::LATIN),
        None,
        &CLASS_MARKS_SHAPER,
        &[],
    )
    .unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("abc");
    let glyph_buffer = stretchybuzz::shape_with_plan(&font, &plan, buffer);
    assert_eq!(
        glyph_buffer.serialize(&font, Default::default()),
        "a=0+500|b=1+0|c=2+500"
    );

    // The default strategy zeroes only nonspacing marks.
    assert_eq!(shape(&font, "abc", ""), "a=0+500|b=1+500|c=2+500");
}

#[test]
fn layout_hooks_run_in_order() {
    let font = latin().with_positioning();
    shape(&font, "ab", "");
    assert_eq!(
        font.events(),
        vec![
            "substitute_start",
            "substitute",
            "substitute_finish",
            "position_start",
            "position",
            "position_finish",
        ]
    );
}

#[test]
fn position_hooks_bracket_fallback_positioning() {
    let font = latin();
    shape(&font, "ab", "");
    assert_eq!(
        font.events(),
        vec!["substitute_start", "substitute", "substitute_finish", "position_start", "position_finish"]
    );
}

#[test]
fn glyph_buffers_are_not_shaped_again() {
    let font = latin();
    let plan = ShapePlan::new(Direction::LeftToRight, Some(script::LATIN), None, &[]).unwrap();

    let mut buffer = Buffer::new();
    buffer.set_direction(Direction::LeftToRight);
    buffer.add_glyph(4, 0);
    assert!(!stretchybuzz::shape_buffer(&plan, &font, &mut buffer));
    assert_eq!(buffer.glyph_infos()[0].glyph_id, 4);
}

#[test]
fn direction_must_match_the_plan() {
    let font = latin();
    let plan = ShapePlan::new(Direction::RightToLeft, None, None, &[]).unwrap();

    let mut buffer = Buffer::new();
    buffer.set_direction(Direction::LeftToRight);
    buffer.push_str("ab");
    assert!(!stretchybuzz::shape_buffer(&plan, &font, &mut buffer));
    assert_eq!(buffer.content_type(), stretchybuzz::ContentType::Unicode);

    let mut unicode = UnicodeBuffer::new();
    unicode.push_str("ab");
    unicode.set_direction(Direction::LeftToRight);
    assert!(!stretchybuzz::shape_with_plan(&font, &plan, unicode).as_buffer().is_successful());
}

#[test]
fn empty_buffer_shapes_to_nothing() {
    let font = latin();
    let plan = ShapePlan::new(Direction::LeftToRight, None, None, &[]).unwrap();
    let mut buffer = Buffer::new();
    assert!(stretchybuzz::shape_buffer(&plan, &font, &mut buffer));
    assert!(buffer.is_empty());
    assert_eq!(buffer.content_type(), stretchybuzz::ContentType::Glyphs);
}

#[test]
fn glyph_buffer_can_be_reused() {
    let font = latin();
    let glyph_buffer = shape_buffer(&font, "ab", "");
    let mut unicode = glyph_buffer.clear();
    assert!(unicode.is_empty());
    unicode.push_str("c");
    let glyph_buffer = stretchybuzz::shape(&font, &[], unicode);
    assert_eq!(glyph_buffer.serialize(&font, Default::default()), "c=0+500");
}

struct Replacement(char);

const MARKER: stretchybuzz::Tag = stretchybuzz::Tag::from_bytes(b"mrkr");

fn collect_marker(planner: &mut ShapePlanner) {
    planner.map.enable_feature(MARKER, FeatureFlags::empty(), 1);
}

fn create_replacement(_: &ShapePlan) -> ShaperData {
    Box::new(Replacement('.'))
}

fn replace_everything(plan: &ShapePlan, font: &dyn Font, buffer: &mut Buffer) {
    let Some(Replacement(c)) = plan.data::<Replacement>() else {
        return;
    };

    let glyph = font.nominal_glyph(*c).unwrap();
    for info in buffer.glyph_infos_mut() {
        info.glyph_id = glyph;
    }
}

static REPLACING_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_marker),
    create_data: Some(create_replacement),
    substitute: Some(replace_everything),
    ..DEFAULT_SHAPER
};

#[test]
fn custom_strategy() {
    let font = latin();
    let plan = ShapePlan::with_shaper(
        Direction::LeftToRight,
        Some(script::LATIN),
        None,
        &REPLACING_SHAPER,
        &[],
    )
    .unwrap();

    assert!(plan.ot_map().feature(MARKER).is_some());
    assert!(plan.data::<Replacement>().is_some());
    assert!(plan.data::<u32>().is_none());

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("ab");
    buffer.set_direction(Direction::LeftToRight);
    let glyph_buffer = stretchybuzz::shape_with_plan(&font, &plan, buffer);
    assert_eq!(glyph_buffer.serialize(&font, Default::default()), "period=0+200|period=1+200");
}

#[test]
fn closure_follows_enabled_substitutions() {
    let font = latin().single("smcp", "a", "a.sc");

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("a");
    let glyphs = stretchybuzz::glyphs_closure(&font, &[Feature::from_str("smcp").unwrap()], buffer);
    assert_eq!(glyphs.into_iter().collect::<Vec<_>>(), vec![font.gid("a"), font.gid("a.sc")]);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("a");
    let glyphs = stretchybuzz::glyphs_closure(&font, &[], buffer);
    assert_eq!(glyphs.into_iter().collect::<Vec<_>>(), vec![font.gid("a")]);
}

#[test]
fn closure_includes_mirrored_glyphs() {
    let font = latin();
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("(");
    buffer.set_direction(Direction::RightToLeft);
    let glyphs = stretchybuzz::glyphs_closure(&font, &[], buffer);
    assert_eq!(
        glyphs.into_iter().collect::<Vec<_>>(),
        vec![font.gid("parenleft"), font.gid("parenright")]
    );
}

#[test]
fn kern_feature_tag() {
    let plan = ShapePlan::new(Direction::LeftToRight, None, None, &[]).unwrap();
    assert!(plan.ot_map().feature(feature::KERNING).is_some());
}
