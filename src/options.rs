use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConvertError;

pub const DEFAULT_OUTPUT: &str = "000_outputFile.pdf";

/// physical page size, in millimeters when explicit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSizeSpec {
    /// page matches the image's native size
    #[default]
    Image,
    A4,
    A3,
    A2,
    A1,
    A0,
    Letter,
    Legal,
    Explicit { width: f64, height: f64 },
}

impl PageSizeSpec {
    /// portrait dimensions in millimeters for the named standard sizes
    pub fn standard_mm(self) -> Option<(f64, f64)> {
        match self {
            PageSizeSpec::A4 => Some((210.0, 297.0)),
            PageSizeSpec::A3 => Some((297.0, 420.0)),
            PageSizeSpec::A2 => Some((420.0, 594.0)),
            PageSizeSpec::A1 => Some((594.0, 841.0)),
            PageSizeSpec::A0 => Some((841.0, 1189.0)),
            PageSizeSpec::Letter => Some((216.0, 279.0)),
            PageSizeSpec::Legal => Some((216.0, 356.0)),
            PageSizeSpec::Image | PageSizeSpec::Explicit { .. } => None,
        }
    }
}

impl FromStr for PageSizeSpec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        let spec = match tag.as_str() {
            "image" | "native" => PageSizeSpec::Image,
            "a4" => PageSizeSpec::A4,
            "a3" => PageSizeSpec::A3,
            "a2" => PageSizeSpec::A2,
            "a1" => PageSizeSpec::A1,
            "a0" => PageSizeSpec::A0,
            "letter" => PageSizeSpec::Letter,
            "legal" => PageSizeSpec::Legal,
            _ => match parse_mm_pair(&tag) {
                Some((width, height)) if width > 0.0 && height > 0.0 => {
                    PageSizeSpec::Explicit { width, height }
                }
                _ => return Err(ConvertError::invalid_option("page size", s)),
            },
        };
        Ok(spec)
    }
}

impl fmt::Display for PageSizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSizeSpec::Image => f.write_str("image"),
            PageSizeSpec::A4 => f.write_str("A4"),
            PageSizeSpec::A3 => f.write_str("A3"),
            PageSizeSpec::A2 => f.write_str("A2"),
            PageSizeSpec::A1 => f.write_str("A1"),
            PageSizeSpec::A0 => f.write_str("A0"),
            PageSizeSpec::Letter => f.write_str("letter"),
            PageSizeSpec::Legal => f.write_str("legal"),
            PageSizeSpec::Explicit { width, height } => write!(f, "{width}x{height}mm"),
        }
    }
}

/// how the image is drawn on its page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ImageSizeSpec {
    /// native pixel size, regardless of the page
    #[default]
    Image,
    /// stretched to fill the page exactly
    Page,
    /// page width, height scaled by the sink
    PageWidthLocked,
    /// page height, width scaled by the sink
    PageHeightLocked,
    Explicit { width: f64, height: f64 },
}

impl FromStr for ImageSizeSpec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase().replace('_', "-");
        let spec = match tag.as_str() {
            "image" | "native" => ImageSizeSpec::Image,
            "page" => ImageSizeSpec::Page,
            "page-width" => ImageSizeSpec::PageWidthLocked,
            "page-height" => ImageSizeSpec::PageHeightLocked,
            _ => match parse_mm_pair(&tag) {
                Some((width, height)) if width >= 0.0 && height >= 0.0 => {
                    ImageSizeSpec::Explicit { width, height }
                }
                _ => return Err(ConvertError::invalid_option("image size", s)),
            },
        };
        Ok(spec)
    }
}

impl fmt::Display for ImageSizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSizeSpec::Image => f.write_str("image"),
            ImageSizeSpec::Page => f.write_str("page"),
            ImageSizeSpec::PageWidthLocked => f.write_str("page-width"),
            ImageSizeSpec::PageHeightLocked => f.write_str("page-height"),
            ImageSizeSpec::Explicit { width, height } => write!(f, "{width}x{height}mm"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// parse "WIDTHxHEIGHT" into a finite millimeter pair
fn parse_mm_pair(s: &str) -> Option<(f64, f64)> {
    let (w, h) = s.split_once('x')?;
    let w: f64 = w.trim().trim_end_matches("mm").parse().ok()?;
    let h: f64 = h.trim().trim_end_matches("mm").parse().ok()?;
    (w.is_finite() && h.is_finite()).then_some((w, h))
}

/// user-supplied options, any field may be missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConversionOptions {
    pub author: Option<String>,
    pub output: Option<PathBuf>,
    pub page_size: Option<PageSizeSpec>,
    pub image_size: Option<ImageSizeSpec>,
    pub orientation: Option<Orientation>,
}

/// fully resolved options for one conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    pub author: String,
    pub output: PathBuf,
    pub page_size: PageSizeSpec,
    pub image_size: ImageSizeSpec,
    pub orientation: Orientation,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            author: String::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            page_size: PageSizeSpec::Image,
            image_size: ImageSizeSpec::Image,
            orientation: Orientation::Portrait,
        }
    }
}

impl From<ConversionOptions> for PartialConversionOptions {
    fn from(opts: ConversionOptions) -> Self {
        Self {
            author: Some(opts.author),
            output: Some(opts.output),
            page_size: Some(opts.page_size),
            image_size: Some(opts.image_size),
            orientation: Some(opts.orientation),
        }
    }
}

/// fill every missing field from the defaults
pub fn merge_defaults(user: PartialConversionOptions) -> ConversionOptions {
    let defaults = ConversionOptions::default();
    ConversionOptions {
        author: user.author.unwrap_or(defaults.author),
        output: user.output.unwrap_or(defaults.output),
        page_size: user.page_size.unwrap_or(defaults.page_size),
        image_size: user.image_size.unwrap_or(defaults.image_size),
        orientation: user.orientation.unwrap_or(defaults.orientation),
    }
}
