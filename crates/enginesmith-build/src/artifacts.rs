//! Copying build outputs into the plugin folders

use crate::error::BuildResult;
use crate::fs::FileSystem;
use std::path::Path;
use tracing::{debug, warn};

/// Copy `source` into the directory `target_dir`
///
/// A file is copied as is. A directory has every file below it copied
/// straight into `target_dir`, dropping the subdirectory structure; later
/// files overwrite earlier ones with the same name. A missing source copies
/// nothing. `target_dir` is created in every case. Returns the number of
/// files copied.
pub fn copy_artifacts(fs: &dyn FileSystem, source: &Path, target_dir: &Path) -> BuildResult<usize> {
    fs.create_dir_all(target_dir)?;

    if !fs.exists(source) {
        warn!(source = %source.display(), "nothing to copy");
        return Ok(0);
    }

    let files = if fs.is_dir(source) {
        fs.walk_files(source)?
    } else {
        vec![source.to_path_buf()]
    };

    let mut copied = 0;
    for file in &files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let destination = target_dir.join(name);
        debug!(from = %file.display(), to = %destination.display(), "copy");
        fs.copy(file, &destination)?;
        copied += 1;
    }

    Ok(copied)
}
