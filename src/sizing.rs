use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConvertError;
use crate::options::{ConversionOptions, ImageSizeSpec, Orientation, PageSizeSpec};
use crate::units::pixels_to_mm;

/// width and height in millimeters
///
/// A zero component in a placement size means "unconstrained on that axis";
/// the sink scales it from the image's aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self::new(self.height, self.width)
    }
}

/// an input image whose pixel size is read on first use and then kept
pub struct ImageFile {
    path: PathBuf,
    pixels: OnceCell<(u32, u32)>,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pixels: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (width, height) in pixels; only the image header is read
    pub fn pixel_dimensions(&self) -> Result<(u32, u32), ConvertError> {
        if let Some(dims) = self.pixels.get() {
            return Ok(*dims);
        }
        let dims = read_dimensions(&self.path).map_err(|source| ConvertError::ImageRead {
            path: self.path.clone(),
            source,
        })?;
        Ok(*self.pixels.get_or_init(|| dims))
    }

    pub fn native_size(&self) -> Result<Dimensions, ConvertError> {
        let (w, h) = self.pixel_dimensions()?;
        Ok(Dimensions::new(
            pixels_to_mm(f64::from(w)),
            pixels_to_mm(f64::from(h)),
        ))
    }
}

/// header dimensions, with the format taken from the file's magic bytes
fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

/// physical page size for one image
pub fn resolve_page_size(
    image: &ImageFile,
    options: &ConversionOptions,
) -> Result<Dimensions, ConvertError> {
    let dims = match options.page_size {
        PageSizeSpec::Image => image.native_size()?,
        PageSizeSpec::Explicit { width, height } => Dimensions::new(width, height),
        named => {
            let (w, h) = named
                .standard_mm()
                .ok_or_else(|| ConvertError::invalid_option("page size", named.to_string()))?;
            let portrait = Dimensions::new(w, h);
            match options.orientation {
                Orientation::Portrait => portrait,
                Orientation::Landscape => portrait.swapped(),
            }
        }
    };
    debug!(
        path = %image.path().display(),
        page_size = %options.page_size,
        width = dims.width,
        height = dims.height,
        "resolved page size"
    );
    Ok(dims)
}

/// size at which the image is drawn on its page
pub fn resolve_image_size(
    image: &ImageFile,
    options: &ConversionOptions,
) -> Result<Dimensions, ConvertError> {
    let page = resolve_page_size(image, options)?;
    let dims = match options.image_size {
        ImageSizeSpec::Image => image.native_size()?,
        ImageSizeSpec::Page => page,
        ImageSizeSpec::PageWidthLocked => Dimensions::new(page.width, 0.0),
        ImageSizeSpec::PageHeightLocked => Dimensions::new(0.0, page.height),
        ImageSizeSpec::Explicit { width, height } => Dimensions::new(width, height),
    };
    debug!(
        path = %image.path().display(),
        image_size = %options.image_size,
        width = dims.width,
        height = dims.height,
        "resolved image size"
    );
    Ok(dims)
}
