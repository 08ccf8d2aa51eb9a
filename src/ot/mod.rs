pub(crate) mod fallback;
mod map;
pub(crate) mod normalize;

pub use map::{FeatureFlags, FeatureMap, Map, MapBuilder};
pub use normalize::{ComposeFn, DecomposeFn, NormalizationMode, NormalizeContext};
