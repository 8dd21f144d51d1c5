use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConvertError;
use crate::options::{merge_defaults, Orientation, PartialConversionOptions};
use crate::sizing::{resolve_image_size, resolve_page_size, Dimensions, ImageFile};

/// format the sink is initialized with; every page overrides it
pub const DEFAULT_PAGE_FORMAT: Dimensions = Dimensions::new(210.0, 297.0);

/// writes pages and images into an output document
///
/// All lengths are millimeters, image origins are the top-left corner of the page.
pub trait DocumentSink {
    fn init(&mut self, author: &str, default_format: Dimensions) -> Result<()>;

    fn add_page(&mut self, size: Dimensions, orientation: Orientation) -> Result<()>;

    /// draw an image on the current page; a zero width or height is scaled
    /// from the image's aspect ratio
    fn place_image(&mut self, path: &Path, x: f64, y: f64, size: Dimensions) -> Result<()>;

    /// commit the document to `output`
    fn finalize(&mut self, output: &Path) -> Result<()>;
}

/// observer for run progress
pub trait Progress {
    fn page_added(&mut self, index: usize, total: usize, path: &Path);

    fn writing(&mut self, output: &Path);

    fn finished(&mut self, output: &Path);
}

/// stack `images` into one document, one page per image, in order
pub fn assemble(
    images: &[PathBuf],
    options: PartialConversionOptions,
    sink: &mut dyn DocumentSink,
    progress: &mut dyn Progress,
) -> Result<()> {
    let opts = merge_defaults(options);
    if images.is_empty() {
        return Err(ConvertError::NoImages.into());
    }
    info!(
        images = images.len(),
        page_size = %opts.page_size,
        image_size = %opts.image_size,
        output = %opts.output.display(),
        "assembling document"
    );

    sink.init(&opts.author, DEFAULT_PAGE_FORMAT)?;

    for (i, path) in images.iter().enumerate() {
        let image = ImageFile::new(path);
        let page = resolve_page_size(&image, &opts)?;
        sink.add_page(page, Orientation::Portrait)?;
        let placement = resolve_image_size(&image, &opts)?;
        sink.place_image(path, 0.0, 0.0, placement)?;
        progress.page_added(i + 1, images.len(), path);
    }

    progress.writing(&opts.output);
    sink.finalize(&opts.output)?;
    progress.finished(&opts.output);
    Ok(())
}
