use log::debug;

use crate::{Mask, Tag};

/// A compiled feature to mask table.
#[derive(Clone, Debug, Default)]
pub struct Map {
    global_mask: Mask,
    features: Vec<FeatureMap>,
}

/// The bits one feature owns in a glyph's mask.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeatureMap {
    /// The feature tag.
    pub tag: Tag,
    /// Position of the lowest bit.
    pub shift: u32,
    /// All bits of the feature.
    pub mask: Mask,
    /// The mask of value 1, for quick access.
    pub one_mask: Mask,
    /// Whether lookups may skip over ZWNJ when matching context.
    pub auto_zwnj: bool,
    /// Whether lookups may skip over ZWJ when matching input.
    pub auto_zwj: bool,
    /// Whether alternates are picked at random.
    pub random: bool,
}

impl Map {
    /// Maximum number of bits a single feature may own.
    pub const MAX_BITS: u32 = 8;
    /// Maximum value a single feature can carry.
    pub const MAX_VALUE: u32 = (1 << Self::MAX_BITS) - 1;

    /// The bit every glyph carries.
    pub const GLOBAL_BIT_SHIFT: u32 = Mask::BITS - 1;
    /// The mask of the bit every glyph carries.
    pub const GLOBAL_BIT_MASK: Mask = 1 << Self::GLOBAL_BIT_SHIFT;

    // Bit 0 is left alone for glyph flags.
    const FIRST_FREE_BIT: u32 = 1;

    /// Returns the mask every glyph starts with.
    #[inline]
    pub fn global_mask(&self) -> Mask {
        self.global_mask
    }

    /// Returns the mask and shift of a feature, or zeros when the feature
    /// got no bits.
    #[inline]
    pub fn mask(&self, feature_tag: Tag) -> (Mask, u32) {
        self.feature(feature_tag)
            .map_or((0, 0), |f| (f.mask, f.shift))
    }

    /// Returns the mask of value 1 for a feature.
    #[inline]
    pub fn one_mask(&self, feature_tag: Tag) -> Mask {
        self.feature(feature_tag).map_or(0, |f| f.one_mask)
    }

    /// Returns the bits of a feature.
    #[inline]
    pub fn feature(&self, feature_tag: Tag) -> Option<&FeatureMap> {
        self.features
            .binary_search_by_key(&feature_tag, |f| f.tag)
            .ok()
            .map(|idx| &self.features[idx])
    }

    /// Returns all features with allocated bits, sorted by tag.
    #[inline]
    pub fn features(&self) -> &[FeatureMap] {
        &self.features
    }
}

bitflags::bitflags! {
    /// Flags a feature is requested with.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct FeatureFlags: u32 {
        /// Feature applies to all characters; results in no mask allocated for it.
        const GLOBAL = 0x01;
        /// Has fallback implementation, so include mask bit even if feature not found.
        const HAS_FALLBACK = 0x02;
        /// Don't skip over ZWNJ when matching **context**.
        const MANUAL_ZWNJ = 0x04;
        /// Don't skip over ZWJ when matching **input**.
        const MANUAL_ZWJ = 0x08;
        /// If feature not found in LangSys, look for it in global feature list and pick one.
        const GLOBAL_SEARCH = 0x10;
        /// Randomly select a glyph from an AlternateSubstFormat1 subtable.
        const RANDOM = 0x20;

        /// A global feature with a fallback.
        const GLOBAL_HAS_FALLBACK = Self::GLOBAL.bits() | Self::HAS_FALLBACK.bits();
        /// Both joiners handled manually.
        const MANUAL_JOINERS = Self::MANUAL_ZWNJ.bits() | Self::MANUAL_ZWJ.bits();
        /// A global feature with both joiners handled manually.
        const GLOBAL_MANUAL_JOINERS = Self::GLOBAL.bits() | Self::MANUAL_JOINERS.bits();
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct FeatureInfo {
    tag: Tag,
    // sequence#, used for stable sorting only
    seq: usize,
    max_value: u32,
    flags: FeatureFlags,
    // for non-global features, what should the unset glyphs take
    default_value: u32,
}

/// Collects feature requests and compiles them into a [`Map`].
#[derive(Clone, Debug, Default)]
pub struct MapBuilder {
    feature_infos: Vec<FeatureInfo>,
}

impl MapBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a feature.
    pub fn add_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        if tag.is_null() {
            return;
        }

        let seq = self.feature_infos.len() + 1;
        self.feature_infos.push(FeatureInfo {
            tag,
            seq,
            max_value: value,
            flags,
            default_value: if flags.contains(FeatureFlags::GLOBAL) { value } else { 0 },
        });
    }

    /// Requests a global feature.
    #[inline]
    pub fn enable_feature(&mut self, tag: Tag, flags: FeatureFlags, value: u32) {
        self.add_feature(tag, flags | FeatureFlags::GLOBAL, value);
    }

    /// Turns a feature off for the whole buffer.
    #[inline]
    pub fn disable_feature(&mut self, tag: Tag) {
        self.add_feature(tag, FeatureFlags::GLOBAL, 0);
    }

    /// Allocates mask bits.
    ///
    /// Returns `None` when memory for the map cannot be reserved.
    pub fn compile(&mut self) -> Option<Map> {
        let mut map = Map {
            global_mask: Map::GLOBAL_BIT_MASK,
            features: Vec::new(),
        };

        // Sort features and merge duplicates.
        if !self.feature_infos.is_empty() {
            let feature_infos = &mut self.feature_infos;
            feature_infos.sort();

            let mut j = 0;
            for i in 1..feature_infos.len() {
                if feature_infos[i].tag != feature_infos[j].tag {
                    j += 1;
                    feature_infos[j] = feature_infos[i];
                } else {
                    if feature_infos[i].flags.contains(FeatureFlags::GLOBAL) {
                        feature_infos[j].flags |= FeatureFlags::GLOBAL;
                        feature_infos[j].max_value = feature_infos[i].max_value;
                        feature_infos[j].default_value = feature_infos[i].default_value;
                    } else {
                        feature_infos[j].flags.remove(FeatureFlags::GLOBAL);
                        feature_infos[j].max_value =
                            feature_infos[j].max_value.max(feature_infos[i].max_value);
                        // Inherit default_value from j
                    }

                    let f = feature_infos[i].flags & FeatureFlags::HAS_FALLBACK;
                    feature_infos[j].flags |= f;
                }
            }

            feature_infos.truncate(j + 1);
        }

        map.features.try_reserve(self.feature_infos.len()).ok()?;

        // Allocate bits now.
        let mut next_bit = Map::FIRST_FREE_BIT;

        for info in &self.feature_infos {
            let uses_global_bit = info.flags.contains(FeatureFlags::GLOBAL) && info.max_value == 1;
            let bits_needed = if uses_global_bit {
                0
            } else {
                // Limit bits per feature.
                Map::MAX_BITS.min(bit_storage(info.max_value))
            };

            if info.max_value == 0 {
                // Feature disabled.
                continue;
            }

            if next_bit + bits_needed > Map::GLOBAL_BIT_SHIFT {
                debug!("no mask bits left for feature '{}'", info.tag);
                continue;
            }

            let (shift, mask) = if uses_global_bit {
                (Map::GLOBAL_BIT_SHIFT, Map::GLOBAL_BIT_MASK)
            } else {
                let shift = next_bit;
                let mask = (1 << (next_bit + bits_needed)) - (1 << next_bit);
                next_bit += bits_needed;
                map.global_mask |= (info.default_value << shift) & mask;
                (shift, mask)
            };

            map.features.push(FeatureMap {
                tag: info.tag,
                shift,
                mask,
                one_mask: (1 << shift) & mask,
                auto_zwnj: !info.flags.contains(FeatureFlags::MANUAL_ZWNJ),
                auto_zwj: !info.flags.contains(FeatureFlags::MANUAL_ZWJ),
                random: info.flags.contains(FeatureFlags::RANDOM),
            });
        }

        // Done with these.
        self.feature_infos.clear();

        log::trace!(
            "compiled {} features, global mask {:#010x}",
            map.features.len(),
            map.global_mask
        );

        Some(map)
    }
}

#[inline]
fn bit_storage(v: u32) -> u32 {
    u32::BITS - v.leading_zeros()
}
