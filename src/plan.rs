use log::trace;

use crate::common::{feature, Direction, Feature, Language, Script, Tag};
use crate::complex::{complex_categorize, ComplexShaper, ShaperData, DEFAULT_SHAPER};
use crate::ot::{FeatureFlags, Map, MapBuilder};
use crate::Mask;

/// Collects the features of a plan before compiling them.
///
/// Handed to a shaper's `collect_features` and `override_features` hooks.
pub struct ShapePlanner {
    /// Text direction.
    pub direction: Direction,
    /// Text script.
    pub script: Option<Script>,
    /// Text language.
    pub language: Option<Language>,
    /// The strategy the plan will use.
    pub shaper: &'static ComplexShaper,
    /// Feature requests so far.
    pub map: MapBuilder,
}

impl ShapePlanner {
    fn new(
        direction: Direction,
        script: Option<Script>,
        language: Option<&Language>,
        shaper: &'static ComplexShaper,
    ) -> Self {
        ShapePlanner {
            direction,
            script,
            language: language.cloned(),
            shaper,
            map: MapBuilder::new(),
        }
    }

    fn collect_features(&mut self, user_features: &[Feature]) {
        const COMMON_FEATURES: &[(Tag, FeatureFlags)] = &[
            (feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::GLOBAL),
            (feature::STANDARD_LIGATURES, FeatureFlags::GLOBAL),
            (feature::LOCALIZED_FORMS, FeatureFlags::GLOBAL),
            (feature::MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
            (feature::MARK_TO_MARK_POSITIONING, FeatureFlags::GLOBAL_MANUAL_JOINERS),
            (feature::REQUIRED_LIGATURES, FeatureFlags::GLOBAL),
        ];

        const HORIZONTAL_FEATURES: &[(Tag, FeatureFlags)] = &[
            (feature::CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
            (feature::CONTEXTUAL_LIGATURES, FeatureFlags::GLOBAL),
            (feature::CURSIVE_POSITIONING, FeatureFlags::GLOBAL),
            (feature::KERNING, FeatureFlags::GLOBAL_HAS_FALLBACK),
            (feature::REQUIRED_CONTEXTUAL_ALTERNATES, FeatureFlags::GLOBAL),
        ];

        const VERTICAL_FEATURES: &[(Tag, FeatureFlags)] = &[
            (feature::ALTERNATE_VERTICAL_METRICS, FeatureFlags::GLOBAL),
            (feature::VERTICAL_WRITING, FeatureFlags::GLOBAL),
            (feature::VERTICAL_KERNING, FeatureFlags::GLOBAL_HAS_FALLBACK),
            (feature::PROPORTIONAL_ALTERNATE_VERTICAL_METRICS, FeatureFlags::GLOBAL),
            (feature::VERTICAL_ALTERNATES_AND_ROTATION, FeatureFlags::GLOBAL),
        ];

        let empty = FeatureFlags::empty();

        match self.direction {
            Direction::LeftToRight => {
                self.map.enable_feature(feature::LEFT_TO_RIGHT_ALTERNATES, empty, 1);
                self.map.enable_feature(feature::LEFT_TO_RIGHT_MIRRORED_FORMS, empty, 1);
            }
            Direction::RightToLeft => {
                self.map.enable_feature(feature::RIGHT_TO_LEFT_ALTERNATES, empty, 1);
                self.map.add_feature(feature::RIGHT_TO_LEFT_MIRRORED_FORMS, empty, 1);
            }
            _ => {}
        }

        if let Some(func) = self.shaper.collect_features {
            func(self);
        }

        for &(tag, flags) in COMMON_FEATURES {
            self.map.add_feature(tag, flags, 1);
        }

        let features = if self.direction.is_horizontal() {
            HORIZONTAL_FEATURES
        } else {
            VERTICAL_FEATURES
        };

        for &(tag, flags) in features {
            self.map.add_feature(tag, flags, 1);
        }

        if let Some(func) = self.shaper.override_features {
            func(self);
        }

        for feature in user_features {
            let flags = if feature.is_global() { FeatureFlags::GLOBAL } else { empty };
            self.map.add_feature(feature.tag, flags, feature.value);
        }
    }

    fn compile(mut self, user_features: &[Feature]) -> Option<ShapePlan> {
        let ot_map = self.map.compile()?;

        let mut user_features_vec = Vec::new();
        user_features_vec.try_reserve(user_features.len()).ok()?;
        user_features_vec.extend_from_slice(user_features);

        let mut plan = ShapePlan {
            direction: self.direction,
            script: self.script,
            language: self.language,
            shaper: self.shaper,
            rtlm_mask: ot_map.one_mask(feature::RIGHT_TO_LEFT_MIRRORED_FORMS),
            kern_mask: ot_map.mask(feature::KERNING).0,
            vkrn_mask: ot_map.mask(feature::VERTICAL_KERNING).0,
            ot_map,
            data: None,
            user_features: user_features_vec,
        };

        if let Some(func) = plan.shaper.create_data {
            plan.data = Some(func(&plan));
        }

        trace!(
            "planned {:?} {:?} with {} features",
            plan.direction,
            plan.script,
            plan.ot_map.features().len()
        );

        Some(plan)
    }
}

/// A reusable plan for shaping a text buffer.
///
/// Immutable once built, so it can be shared between threads.
pub struct ShapePlan {
    pub(crate) direction: Direction,
    pub(crate) script: Option<Script>,
    pub(crate) language: Option<Language>,
    pub(crate) shaper: &'static ComplexShaper,
    pub(crate) ot_map: Map,
    pub(crate) data: Option<ShaperData>,

    pub(crate) rtlm_mask: Mask,
    pub(crate) kern_mask: Mask,
    pub(crate) vkrn_mask: Mask,

    pub(crate) user_features: Vec<Feature>,
}

impl ShapePlan {
    /// Returns a plan that can be used for shaping any buffer with the
    /// provided properties.
    ///
    /// The strategy is picked from the script. Returns `None` for an
    /// invalid direction or when memory runs out.
    pub fn new(
        direction: Direction,
        script: Option<Script>,
        language: Option<&Language>,
        user_features: &[Feature],
    ) -> Option<Self> {
        let shaper = match script {
            Some(script) => complex_categorize(script, direction),
            None => &DEFAULT_SHAPER,
        };

        Self::with_shaper(direction, script, language, shaper, user_features)
    }

    /// Like [`ShapePlan::new`], with an explicit strategy.
    pub fn with_shaper(
        direction: Direction,
        script: Option<Script>,
        language: Option<&Language>,
        shaper: &'static ComplexShaper,
        user_features: &[Feature],
    ) -> Option<Self> {
        if direction == Direction::Invalid {
            return None;
        }

        let mut planner = ShapePlanner::new(direction, script, language, shaper);
        planner.collect_features(user_features);
        planner.compile(user_features)
    }

    /// The direction the plan shapes in.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The script the plan shapes.
    #[inline]
    pub fn script(&self) -> Option<Script> {
        self.script
    }

    /// The language the plan shapes.
    #[inline]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// The chosen strategy.
    #[inline]
    pub fn shaper(&self) -> &'static ComplexShaper {
        self.shaper
    }

    /// The feature to mask table.
    #[inline]
    pub fn ot_map(&self) -> &Map {
        &self.ot_map
    }

    /// The caller's features.
    #[inline]
    pub fn user_features(&self) -> &[Feature] {
        &self.user_features
    }

    /// The strategy's private data, if it has data of type `T`.
    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    /// Whether the plan was built for these properties.
    pub fn matches(&self, key: &ShapePlanKey) -> bool {
        self.direction == key.direction
            && self.script == key.script
            && self.language == key.language
            && self.user_features == key.features
    }
}

impl std::fmt::Debug for ShapePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ShapePlan")
            .field("direction", &self.direction)
            .field("script", &self.script)
            .field("language", &self.language)
            .field("shaper", &self.shaper)
            .field("ot_map", &self.ot_map)
            .field("user_features", &self.user_features)
            .finish_non_exhaustive()
    }
}

/// Everything a plan is built from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapePlanKey {
    /// Text direction.
    pub direction: Direction,
    /// Text script.
    pub script: Option<Script>,
    /// Text language.
    pub language: Option<Language>,
    /// Caller features, in order.
    pub features: Vec<Feature>,
}

impl ShapePlanKey {
    /// Creates a key.
    pub fn new(
        direction: Direction,
        script: Option<Script>,
        language: Option<&Language>,
        features: &[Feature],
    ) -> Self {
        ShapePlanKey {
            direction,
            script,
            language: language.cloned(),
            features: features.to_vec(),
        }
    }

    /// Builds a plan for this key.
    pub fn build(&self) -> Option<ShapePlan> {
        ShapePlan::new(self.direction, self.script, self.language.as_ref(), &self.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::script;
    use crate::complex::THAI_SHAPER;
    use crate::ot::Map;

    #[test]
    fn shape_plan_is_send_and_sync() {
        fn ensure_send_and_sync<T: Send + Sync>() {}
        ensure_send_and_sync::<ShapePlan>();
    }

    #[test]
    fn invalid_direction_has_no_plan() {
        assert!(ShapePlan::new(Direction::Invalid, None, None, &[]).is_none());
    }

    #[test]
    fn ltr_features() {
        let plan = ShapePlan::new(Direction::LeftToRight, Some(script::LATIN), None, &[]).unwrap();
        let map = plan.ot_map();
        assert_eq!(map.one_mask(feature::LEFT_TO_RIGHT_MIRRORED_FORMS), Map::GLOBAL_BIT_MASK);
        assert_eq!(plan.rtlm_mask, 0);
        assert_eq!(plan.kern_mask, Map::GLOBAL_BIT_MASK);
        assert_eq!(plan.vkrn_mask, 0);
        assert!(map.feature(feature::VERTICAL_WRITING).is_none());
    }

    #[test]
    fn rtlm_is_not_global() {
        let plan = ShapePlan::new(Direction::RightToLeft, Some(script::ARABIC), None, &[]).unwrap();
        assert_ne!(plan.rtlm_mask, 0);
        assert_eq!(plan.rtlm_mask & plan.ot_map().global_mask(), 0);
        assert_ne!(plan.ot_map().one_mask(feature::RIGHT_TO_LEFT_ALTERNATES), 0);
    }

    #[test]
    fn vertical_features() {
        let plan = ShapePlan::new(Direction::TopToBottom, Some(script::HAN), None, &[]).unwrap();
        assert_eq!(plan.kern_mask, 0);
        assert_eq!(plan.vkrn_mask, Map::GLOBAL_BIT_MASK);
        assert!(plan.ot_map().feature(feature::VERTICAL_WRITING).is_some());
        assert!(plan.ot_map().feature(feature::CURSIVE_POSITIONING).is_none());
    }

    #[test]
    fn caller_can_disable_kerning() {
        let kern_off: Feature = "-kern".parse().unwrap();
        let plan = ShapePlan::new(Direction::LeftToRight, None, None, &[kern_off]).unwrap();
        assert_eq!(plan.kern_mask, 0);
    }

    #[test]
    fn ranged_feature_gets_own_bits() {
        let smcp: Feature = "smcp[2:4]".parse().unwrap();
        let plan = ShapePlan::new(Direction::LeftToRight, None, None, &[smcp]).unwrap();
        let (mask, shift) = plan.ot_map().mask(Tag::from_bytes(b"smcp"));
        assert_ne!(mask, 0);
        assert_ne!(mask, Map::GLOBAL_BIT_MASK);
        assert_eq!(plan.ot_map().global_mask() & mask, 0);
        assert!(shift >= 1);
    }

    #[test]
    fn strategy_follows_script() {
        let plan = ShapePlan::new(Direction::LeftToRight, Some(script::THAI), None, &[]).unwrap();
        assert!(std::ptr::eq(plan.shaper(), &THAI_SHAPER));
    }

    #[test]
    fn key_matches_its_plan() {
        let lang: Language = "th".parse().unwrap();
        let key = ShapePlanKey::new(Direction::LeftToRight, Some(script::THAI), Some(&lang), &[]);
        let plan = key.build().unwrap();
        assert!(plan.matches(&key));
        assert_eq!(plan.language(), Some(&lang));
    }
}
