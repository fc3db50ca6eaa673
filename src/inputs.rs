use std::path::{Path, PathBuf};

use crate::{error::InputError, io_utils};

/// Checks the files handed to the process before any job is scheduled.
pub fn check_inputs(files: &[PathBuf], extension: &str) -> Result<(), InputError> {
    if files.is_empty() {
        return Err(InputError::NoFiles);
    }
    match files
        .iter()
        .find(|path| !io_utils::has_extension(path, extension))
    {
        Some(path) => Err(InputError::WrongExtension {
            path: path.clone(),
            extension: extension.trim_start_matches('.').to_string(),
        }),
        None => Ok(()),
    }
}

/// `dir/file.ext` -> `dir/<folder>`.
pub fn output_dir_for(input: &Path, folder: &str) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(folder)
}

/// `dir/file.ext` -> `dir/<folder>/file.ext`.
pub fn output_path_for(input: &Path, folder: &str) -> PathBuf {
    let dir = output_dir_for(input, folder);
    match input.file_name() {
        Some(name) => dir.join(name),
        None => dir,
    }
}
