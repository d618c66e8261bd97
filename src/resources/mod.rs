use std::path::{Path, PathBuf};

use anyhow::bail;

/**
 * This module contains all logic for locating external files and turning
 * composed scene data into GPU resources.
 */
pub mod gpu_scene;
pub mod texture;

/// Resolves a logical asset name to a file on disk.
///
/// Looks in `./assets` first, then next to the crate manifest, then in the
/// copy the build script places in `OUT_DIR`.
pub fn asset_path(file_name: &str) -> anyhow::Result<PathBuf> {
    let mut candidates = vec![Path::new("./").join("assets").join(file_name)];
    candidates.push(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("assets")
            .join(file_name),
    );
    if let Some(out_dir) = option_env!("OUT_DIR") {
        candidates.push(Path::new(out_dir).join("assets").join(file_name));
    }

    match candidates.into_iter().find(|path| path.is_file()) {
        Some(path) => Ok(path),
        None => bail!("asset '{}' not found in any assets/ directory", file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_assets_are_reported_by_name() {
        let err = asset_path("missing-clip.mp4").unwrap_err();
        assert!(err.to_string().contains("missing-clip.mp4"));
    }

    #[test]
    fn bundled_readme_resolves() {
        let path = asset_path("README.md").unwrap();
        assert!(path.ends_with("assets/README.md"));
    }
}
