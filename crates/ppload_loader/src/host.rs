//! The host compiler seam.

use std::path::Path;

use ppload_cache::CompiledUnit;
use ppload_diagnostics::SourceError;

/// The compiler whose units are being cached.
///
/// `compile` sees preprocessed text for family files and raw text otherwise.
/// Line numbers in returned errors refer to the origin file; the two agree
/// because preprocessing keeps lines in place.
pub trait Host: Send + Sync {
    /// The compiled form of one source file.
    type Unit: CompiledUnit + Send;

    /// Compiles `text`, read from `origin`, into a unit.
    fn compile(&self, text: &str, origin: &Path) -> Result<Self::Unit, SourceError>;
}
