//! Engine export into the working directory

use std::fs;
use std::path::{Path, PathBuf};

use enginebench_runtime::{format, EngineBuilder, EngineManifest};
use tracing::{debug, info, warn};

use crate::config::{ExportedModule, ModelTrtConfig, ModuleKind, Precision, VariantSpec};
use crate::error::Result;

/// An engine file produced (or found) by [`export_module`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedEngine {
    pub module: &'static str,
    pub path: PathBuf,
    /// `true` when a compatible engine was already on disk
    pub reused: bool,
}

/// `<working_dir>/<network>/<variant>/<module>.engine`
pub fn engine_path(working_dir: &Path, network: &str, variant: &str, module: &str) -> PathBuf {
    working_dir
        .join(network)
        .join(variant)
        .join(format!("{}.engine", module))
}

fn module_manifest(
    config: &ModelTrtConfig,
    variant: &VariantSpec,
    module: &ExportedModule,
    max_batch: usize,
    precision: Precision,
) -> Result<EngineManifest> {
    let name = format!("{}-{}-{}", config.network_name, variant.name, module.name);
    let manifest = match module.kind {
        ModuleKind::Decoder => EngineBuilder::decoder(
            &name,
            variant.vocab_size,
            max_batch,
            variant.max_length,
            precision.dtype(),
        )?,
    };
    Ok(manifest)
}

/// Export `module` for `variant`, reusing an engine on disk when it matches
/// what would be built for `max_batch` and `precision`
pub fn export_module(
    working_dir: &Path,
    config: &ModelTrtConfig,
    variant: &VariantSpec,
    module: &ExportedModule,
    max_batch: usize,
    precision: Precision,
) -> Result<ExportedEngine> {
    let path = engine_path(working_dir, config.network_name, variant.name, module.name);
    let manifest = module_manifest(config, variant, module, max_batch, precision)?;

    if path.exists() {
        match fs::read(&path).map(|blob| format::decode(&blob)) {
            Ok(Ok(existing)) if existing == manifest => {
                debug!(path = %path.display(), "Reusing exported engine");
                return Ok(ExportedEngine {
                    module: module.name,
                    path,
                    reused: true,
                });
            }
            Ok(Ok(_)) => info!(path = %path.display(), "Exported engine is stale, rebuilding"),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Exported engine is unreadable, rebuilding"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read exported engine, rebuilding"),
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, format::encode(&manifest)?)?;
    info!(path = %path.display(), module = module.name, "Exported engine");

    Ok(ExportedEngine {
        module: module.name,
        path,
        reused: false,
    })
}

/// Delete exported engines and any directories left empty under `working_dir`
pub fn remove_exports(working_dir: &Path, engines: &[ExportedEngine]) -> Result<()> {
    for engine in engines {
        if engine.path.exists() {
            fs::remove_file(&engine.path)?;
            debug!(path = %engine.path.display(), "Removed exported engine");
        }

        let mut dir = engine.path.parent();
        while let Some(d) = dir {
            if d == working_dir || !d.starts_with(working_dir) {
                break;
            }
            // Stops at the first directory that still has content
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
    Ok(())
}
