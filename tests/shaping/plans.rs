use std::str::FromStr;
use std::sync::Arc;

use stretchybuzz::backend::{BackendError, OtShaper, Shaper};
use stretchybuzz::{
    script, Buffer, Direction, Feature, Language, ShapePlan, ShapePlanCache, ShapePlanKey,
    UnicodeBuffer, DEFAULT_SHAPER, THAI_SHAPER,
};

use crate::latin;

#[test]
fn cached_plan_shapes_like_a_fresh_one() {
    let font = latin().single("smcp", "a", "a.sc");
    let features = [Feature::from_str("smcp[1:2]").unwrap()];
    let cache = ShapePlanCache::new();
    let key = ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), None, &features);

    let plan = cache.get_or_build(&key).unwrap();
    assert!(plan.matches(&key));
    assert!(Arc::ptr_eq(&plan, &cache.get_or_build(&key).unwrap()));

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("aaa");
    let cached = stretchybuzz::shape_with_plan(&font, &plan, buffer);

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("aaa");
    let fresh = stretchybuzz::shape(&font, &features, buffer);

    assert_eq!(
        cached.serialize(&font, Default::default()),
        fresh.serialize(&font, Default::default())
    );
}

#[test]
fn plans_keep_the_strategy_of_their_script() {
    let thai = ShapePlan::new(Direction::LeftToRight, Some(script::THAI), None, &[]).unwrap();
    let lao = ShapePlan::new(Direction::LeftToRight, Some(script::LAO), None, &[]).unwrap();
    let latin = ShapePlan::new(Direction::LeftToRight, Some(script::LATIN), None, &[]).unwrap();
    let unknown = ShapePlan::new(Direction::LeftToRight, None, None, &[]).unwrap();

    assert!(std::ptr::eq(thai.shaper(), &THAI_SHAPER));
    assert!(std::ptr::eq(lao.shaper(), &THAI_SHAPER));
    assert!(std::ptr::eq(latin.shaper(), &DEFAULT_SHAPER));
    assert!(std::ptr::eq(unknown.shaper(), &DEFAULT_SHAPER));
}

#[test]
fn keys_differ_by_language() {
    let cache = ShapePlanCache::new();
    let en = Language::from_str("en").unwrap();
    let tr = Language::from_str("tr").unwrap();

    let a = ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), Some(&en), &[]);
    let b = ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), Some(&tr), &[]);
    let a_plan = cache.get_or_build(&a).unwrap();
    let b_plan = cache.get_or_build(&b).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(!Arc::ptr_eq(&a_plan, &b_plan));
    assert!(!a_plan.matches(&b));
    assert_eq!(b_plan.language(), Some(&tr));
}

#[test]
fn invalid_direction_is_not_cached() {
    let cache = ShapePlanCache::new();
    let key = ShapePlanKey::new(Direction::Invalid, None, None, &[]);
    assert!(cache.get_or_build(&key).is_none());
    assert!(cache.is_empty());
}

#[test]
fn plans_are_shared_across_threads() {
    let font = latin();
    let cache = ShapePlanCache::new();
    let key = ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), None, &[]);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let plan = cache.get_or_build(&key).unwrap();
                    let mut buffer = UnicodeBuffer::new();
                    buffer.push_str("AV");
                    let glyphs = stretchybuzz::shape_with_plan(&font, &plan, buffer);
                    glyphs.serialize(&font, Default::default())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "A=0+603|V=1@4,0+604");
        }
    });

    assert_eq!(cache.len(), 1);
}

#[test]
fn built_in_backend_shapes() {
    let font = latin();
    let key = ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), None, &[]);
    let plan = key.build().unwrap();

    let mut buffer = Buffer::new();
    buffer.set_direction(Direction::LeftToRight);
    buffer.set_script(script::LATIN);
    buffer.push_str("ab");
    assert_eq!(OtShaper.shape(&plan, &font, &mut buffer), Ok(()));
    assert_eq!(buffer.glyph_infos()[0].glyph_id, font.gid("a"));

    // Already shaped.
    assert!(matches!(
        OtShaper.shape(&plan, &font, &mut buffer),
        Err(BackendError::Execute(_))
    ));
}
