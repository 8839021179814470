//! Commit - writes a rewritten module to its output path.
//!
//! An in-place rewrite (output equals input) is written to `<path>.temp`
//! first; the original is deleted and the temp file renamed into place only
//! after the module value has been released.

use crate::codec;
use crate::module::Module;
use crate::Result;
use std::path::{Path, PathBuf};

/// Commit `module` to `output_path`, swapping through a temp file when the
/// output overwrites the input.
pub fn commit_module(module: Module, input_path: &Path, output_path: &Path) -> Result<()> {
    if input_path == output_path {
        let temp_path = temp_path_for(output_path);
        codec::write(&module, &temp_path)?;
        drop(module);
        std::fs::remove_file(output_path)?;
        std::fs::rename(&temp_path, output_path)?;
        tracing::debug!(
            "renamed {} back to {}",
            temp_path.display(),
            output_path.display()
        );
    } else {
        codec::write(&module, output_path)?;
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_os_string();
    temp.push(".temp");
    PathBuf::from(temp)
}
