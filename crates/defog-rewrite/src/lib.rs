//! Built-in pipeline stages for defog: conversion of raw parser output to
//! typed nodes, symbol collection, the deobfuscation rewrite rules, and the
//! terminal readonly stage.

pub mod codecs;
pub mod collect;
pub mod convert;
pub mod readonly;
pub mod rewrite;

pub use codecs::{Codec, Decoded};
pub use collect::collect_symbols;
pub use convert::ConvertStage;
pub use readonly::ReadonlyStage;
pub use rewrite::RewriteStage;

use defog_core::{EngineOptions, StageRegistry};

/// The registry holding the built-in stages. Hosts extend it with their own
/// stages before calling `run_stages`.
pub fn default_registry(opts: &EngineOptions) -> StageRegistry {
    let concat_order = opts.concat_order;
    let mut registry = StageRegistry::new();
    registry.register("convert", Box::new(|| Box::new(ConvertStage::new())));
    registry.register(
        "rewrite",
        Box::new(move || Box::new(RewriteStage::new(concat_order))),
    );
    registry.register("readonly", Box::new(|| Box::new(ReadonlyStage)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_default_stage_order() {
        let registry = default_registry(&EngineOptions::default());
        for name in defog_core::DEFAULT_STAGES {
            assert!(registry.contains(name), "missing default stage {name}");
        }
        assert!(!registry.contains("taint_analysis"));
    }
}
