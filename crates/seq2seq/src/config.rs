//! Network descriptions supplied by each adapter

use std::fmt;

use enginebench_runtime::DType;

/// One size variant of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub name: &'static str,
    pub vocab_size: usize,
    /// Longest token sequence the decoder accepts
    pub max_length: usize,
    pub eos_token_id: u32,
}

/// Network name and the variants it ships in
#[derive(Debug, Clone, Copy)]
pub struct ModelTrtConfig {
    pub network_name: &'static str,
    /// First entry is the default variant
    pub variants: &'static [VariantSpec],
}

impl ModelTrtConfig {
    pub fn variant(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn default_variant(&self) -> Option<&VariantSpec> {
        self.variants.first()
    }

    pub fn variant_names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.to_string()).collect()
    }
}

/// Role an exported module plays during generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Maps `[batch, len]` token ids to next-token logits
    Decoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportedModule {
    pub name: &'static str,
    pub kind: ModuleKind,
}

/// The set of modules a network exports as engines
#[derive(Debug, Clone, Copy)]
pub struct ModelClasses {
    pub modules: &'static [ExportedModule],
}

impl ModelClasses {
    pub fn decoder(&self) -> Option<&ExportedModule> {
        self.modules.iter().find(|m| m.kind == ModuleKind::Decoder)
    }
}

/// Engine output precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp32,
    Fp16,
}

impl Precision {
    pub fn from_fp16_flag(fp16: bool) -> Self {
        if fp16 {
            Self::Fp16
        } else {
            Self::Fp32
        }
    }

    pub fn dtype(self) -> DType {
        match self {
            Self::Fp32 => DType::F32,
            Self::Fp16 => DType::F16,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fp32 => write!(f, "fp32"),
            Self::Fp16 => write!(f, "fp16"),
        }
    }
}
