//! Loading reference images via the `image` crate.

use crate::image::preprocess::Frame;
use crate::util::{AutoSceneError, AutoSceneResult};
use std::path::Path;

/// File extensions accepted as template sources (compared case-insensitively).
pub const TEMPLATE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Returns true when the path carries one of [`TEMPLATE_EXTENSIONS`].
pub fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            TEMPLATE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Decodes an image file into an RGB frame, dropping any alpha channel.
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> AutoSceneResult<Frame> {
    let img = image::open(path.as_ref()).map_err(|err| AutoSceneError::ImageIo {
        reason: format!("{}: {err}", path.as_ref().display()),
    })?;
    Ok(img.to_rgb8())
}
