mod extractor;
mod normalize;
mod patch_embed;

pub use extractor::FeatureExtractor;
pub use normalize::normalize_rgba;
pub use patch_embed::PatchEmbed;
