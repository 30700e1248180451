//! GPT-2 adapter

use crate::config::{ExportedModule, ModelClasses, ModelTrtConfig, ModuleKind, VariantSpec};
use crate::runner::Seq2SeqTrt;

const GPT2_VOCAB_SIZE: usize = 50257;
const GPT2_MAX_LENGTH: usize = 1024;
const GPT2_EOS_TOKEN_ID: u32 = 50256;

const fn gpt2_variant(name: &'static str) -> VariantSpec {
    VariantSpec {
        name,
        vocab_size: GPT2_VOCAB_SIZE,
        max_length: GPT2_MAX_LENGTH,
        eos_token_id: GPT2_EOS_TOKEN_ID,
    }
}

pub const GPT2_VARIANTS: [VariantSpec; 4] = [
    gpt2_variant("gpt2"),
    gpt2_variant("gpt2-medium"),
    gpt2_variant("gpt2-large"),
    gpt2_variant("gpt2-xl"),
];

pub static GPT2_CONFIG: ModelTrtConfig = ModelTrtConfig {
    network_name: "GPT2",
    variants: &GPT2_VARIANTS,
};

pub static GPT2_MODEL_CLASSES: ModelClasses = ModelClasses {
    modules: &[ExportedModule {
        name: "decoder",
        kind: ModuleKind::Decoder,
    }],
};

pub const GPT2_DESCRIPTION: &str = "Runs TensorRT-style engine results for the GPT2 model.";

/// The GPT-2 runner
pub fn gpt2_trt() -> Seq2SeqTrt {
    Seq2SeqTrt::new(&GPT2_CONFIG, GPT2_DESCRIPTION, &GPT2_MODEL_CLASSES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt2_variants() {
        assert_eq!(
            GPT2_CONFIG.variant_names(),
            vec!["gpt2", "gpt2-medium", "gpt2-large", "gpt2-xl"]
        );
        assert_eq!(GPT2_CONFIG.default_variant().unwrap().name, "gpt2");
        let xl = GPT2_CONFIG.variant("gpt2-xl").unwrap();
        assert_eq!(xl.vocab_size, 50257);
        assert_eq!(xl.eos_token_id, 50256);
    }

    #[test]
    fn test_gpt2_runner_description() {
        let runner = gpt2_trt();
        assert_eq!(runner.config.network_name, "GPT2");
        assert!(runner.model_classes.decoder().is_some());
        let about = runner.command().get_about().map(|a| a.to_string());
        assert_eq!(about.as_deref(), Some(GPT2_DESCRIPTION));
    }
}
