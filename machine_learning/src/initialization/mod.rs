mod param_gen;
mod random;

pub use param_gen::ParamGen;
pub use random::RandWeightGen;
