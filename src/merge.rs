use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::assemble::DocumentSink;
use crate::error::ConvertError;
use crate::options::Orientation;
use crate::parse::{parse_jpeg_header, parse_png_header, PngInfo};
use crate::sizing::Dimensions;
use crate::units::{mm_to_pt, pixels_to_mm};

/// image data ready for embedding as an XObject
enum PreparedImage {
    Jpeg {
        width: u32,
        height: u32,
        components: u8,
        /// true if CMYK values need inversion
        invert_cmyk: bool,
        data: Vec<u8>,
    },
    PngPassthrough {
        info: PngInfo,
    },
    /// decoded pixel data compressed with deflate
    Compressed {
        width: u32,
        height: u32,
        color_channels: u8,
        color_compressed: Vec<u8>,
        alpha_compressed: Option<Vec<u8>>,
    },
}

impl PreparedImage {
    fn pixel_size(&self) -> (u32, u32) {
        match self {
            PreparedImage::Jpeg { width, height, .. }
            | PreparedImage::Compressed { width, height, .. } => (*width, *height),
            PreparedImage::PngPassthrough { info } => (info.width, info.height),
        }
    }
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut enc = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::fast());
    enc.write_all(bytes)?;
    Ok(enc.finish()?)
}

/// split interleaved color+alpha samples into two deflated planes
fn split_alpha(pixels: &[u8], color_channels: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let stride = color_channels + 1;
    let mut color = Vec::with_capacity(pixels.len() / stride * color_channels);
    let mut alpha = Vec::with_capacity(pixels.len() / stride);
    for px in pixels.chunks_exact(stride) {
        color.extend_from_slice(&px[..color_channels]);
        alpha.push(px[color_channels]);
    }
    Ok((deflate(&color)?, deflate(&alpha)?))
}

fn image_read_error(path: &Path, source: image::ImageError) -> ConvertError {
    ConvertError::ImageRead {
        path: path.to_path_buf(),
        source,
    }
}

fn prepare_image(path: &Path) -> Result<PreparedImage> {
    let data = std::fs::read(path).map_err(|e| image_read_error(path, e.into()))?;
    anyhow::ensure!(data.len() >= 4, "File too small: {}", path.display());

    // JPEG: passthrough
    if data[0] == 0xFF && data[1] == 0xD8 {
        let info = parse_jpeg_header(&data)
            .with_context(|| format!("Failed to parse JPEG header: {}", path.display()))?;
        anyhow::ensure!(
            matches!(info.components, 1 | 3 | 4),
            "Unsupported JPEG component count {} in {}",
            info.components,
            path.display()
        );
        // Adobe CMYK is stored inverted unless the transform flag is 0
        let invert_cmyk = info.components == 4 && info.adobe_color_transform != Some(0);
        return Ok(PreparedImage::Jpeg {
            width: info.width,
            height: info.height,
            components: info.components,
            invert_cmyk,
            data,
        });
    }

    // PNG: passthrough for opaque non-interlaced without tRNS
    if data.len() >= 8 && data[..8] == [137, 80, 78, 71, 13, 10, 26, 10] {
        let info = parse_png_header(&data)
            .with_context(|| format!("Failed to parse PNG header: {}", path.display()))?;
        if info.interlace != 0 || info.has_trns {
            return decode_generic_image(&data, path);
        }
        return match info.color_type {
            0 | 2 => Ok(PreparedImage::PngPassthrough { info }),
            3 => {
                anyhow::ensure!(
                    !info.plte_data.is_empty(),
                    "PNG palette image missing PLTE chunk: {}",
                    path.display()
                );
                Ok(PreparedImage::PngPassthrough { info })
            }
            4 | 6 => decode_alpha_png(&data, path),
            other => anyhow::bail!(
                "Unsupported PNG color type {} in {}",
                other,
                path.display()
            ),
        };
    }

    decode_generic_image(&data, path)
}

/// decode a PNG with an alpha channel down to 8 bit samples
fn decode_alpha_png(data: &[u8], path: &Path) -> Result<PreparedImage> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(data));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .with_context(|| format!("Failed to decode PNG: {}", path.display()))?;
    let buf_size = reader
        .output_buffer_size()
        .context("PNG output buffer size unknown")?;
    let mut buf = vec![0u8; buf_size];
    let frame = reader
        .next_frame(&mut buf)
        .with_context(|| format!("Failed to read PNG frame: {}", path.display()))?;
    let color_channels = match frame.color_type {
        png::ColorType::GrayscaleAlpha => 1,
        png::ColorType::Rgba => 3,
        other => anyhow::bail!("Unexpected PNG color type {:?} in {}", other, path.display()),
    };
    let (color_compressed, alpha_compressed) =
        split_alpha(&buf[..frame.buffer_size()], color_channels)?;

    Ok(PreparedImage::Compressed {
        width: frame.width,
        height: frame.height,
        color_channels: color_channels as u8,
        color_compressed,
        alpha_compressed: Some(alpha_compressed),
    })
}

/// decode any other format via the image crate
fn decode_generic_image(data: &[u8], path: &Path) -> Result<PreparedImage> {
    use image::GenericImageView;

    let img = image::load_from_memory(data).map_err(|e| image_read_error(path, e))?;
    let (width, height) = img.dimensions();
    let color = img.color();

    if color.has_alpha() {
        let rgba = img.into_rgba8();
        let (color_compressed, alpha_compressed) = split_alpha(rgba.as_raw(), 3)?;
        Ok(PreparedImage::Compressed {
            width,
            height,
            color_channels: 3,
            color_compressed,
            alpha_compressed: Some(alpha_compressed),
        })
    } else if color.channel_count() == 1 {
        Ok(PreparedImage::Compressed {
            width,
            height,
            color_channels: 1,
            color_compressed: deflate(img.into_luma8().as_raw())?,
            alpha_compressed: None,
        })
    } else {
        Ok(PreparedImage::Compressed {
            width,
            height,
            color_channels: 3,
            color_compressed: deflate(img.into_rgb8().as_raw())?,
            alpha_compressed: None,
        })
    }
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

fn image_dict(width: u32, height: u32, color_space: Object, bits: u8, filter: &str) -> Dictionary {
    dictionary! {
        "Type" => name("XObject"),
        "Subtype" => name("Image"),
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => bits as i64,
        "Filter" => name(filter),
    }
}

fn gray_or_rgb(channels: u8) -> Object {
    if channels == 1 {
        name("DeviceGray")
    } else {
        name("DeviceRGB")
    }
}

/// add the image XObject (and its soft mask) to `doc`
fn embed_image(doc: &mut Document, img: PreparedImage) -> ObjectId {
    match img {
        PreparedImage::Jpeg {
            width,
            height,
            components,
            invert_cmyk,
            data,
        } => {
            let color_space = match components {
                1 => name("DeviceGray"),
                3 => name("DeviceRGB"),
                _ => name("DeviceCMYK"),
            };
            let mut dict = image_dict(width, height, color_space, 8, "DCTDecode");
            if invert_cmyk {
                dict.set(
                    "Decode",
                    Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
                );
            }
            doc.add_object(Stream::new(dict, data))
        }
        PreparedImage::PngPassthrough { info } => {
            let (color_space, colors) = if info.color_type == 3 {
                let entries = (info.plte_data.len() / 3) as i64;
                let indexed = Object::Array(vec![
                    name("Indexed"),
                    name("DeviceRGB"),
                    Object::Integer(entries - 1),
                    Object::String(info.plte_data, lopdf::StringFormat::Hexadecimal),
                ]);
                (indexed, 1)
            } else {
                let channels = if info.color_type == 0 { 1 } else { 3 };
                (gray_or_rgb(channels), channels)
            };
            let mut dict = image_dict(
                info.width,
                info.height,
                color_space,
                info.bit_depth,
                "FlateDecode",
            );
            dict.set(
                "DecodeParms",
                dictionary! {
                    "Predictor" => 15,
                    "Colors" => colors as i64,
                    "BitsPerComponent" => info.bit_depth as i64,
                    "Columns" => info.width as i64,
                },
            );
            doc.add_object(Stream::new(dict, info.idat_data))
        }
        PreparedImage::Compressed {
            width,
            height,
            color_channels,
            color_compressed,
            alpha_compressed,
        } => {
            let mut dict = image_dict(
                width,
                height,
                gray_or_rgb(color_channels),
                8,
                "FlateDecode",
            );
            if let Some(alpha) = alpha_compressed {
                let smask = image_dict(width, height, name("DeviceGray"), 8, "FlateDecode");
                let smask_id = doc.add_object(Stream::new(smask, alpha));
                dict.set("SMask", smask_id);
            }
            doc.add_object(Stream::new(dict, color_compressed))
        }
    }
}

/// fill a zero axis from the pixel aspect ratio; both zero means native size
pub fn resolve_placement(size: Dimensions, pixels: (u32, u32)) -> Dimensions {
    let (px_w, px_h) = (f64::from(pixels.0), f64::from(pixels.1));
    if px_w == 0.0 || px_h == 0.0 {
        return size;
    }
    match (size.width == 0.0, size.height == 0.0) {
        (true, true) => Dimensions::new(pixels_to_mm(px_w), pixels_to_mm(px_h)),
        (true, false) => Dimensions::new(size.height * px_w / px_h, size.height),
        (false, true) => Dimensions::new(size.width, size.width * px_h / px_w),
        (false, false) => size,
    }
}

/// PDF date string for a UNIX timestamp: D:YYYYMMDDHHmmSSZ
fn pdf_date(secs: u64) -> String {
    let days = secs / 86400;
    let time_of_day = secs % 86400;
    // civil date from days since epoch
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}Z",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

fn literal(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), lopdf::StringFormat::Literal)
}

fn media_box(width_pt: f32, height_pt: f32) -> Object {
    Object::Array(vec![
        0.into(),
        0.into(),
        Object::Real(width_pt),
        Object::Real(height_pt),
    ])
}

struct OpenPage {
    width_pt: f32,
    height_pt: f32,
    operations: Vec<Operation>,
    xobjects: Dictionary,
}

/// document sink writing a PDF with lopdf
pub struct PdfSink {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<Object>,
    author: String,
    default_format: Dimensions,
    current: Option<OpenPage>,
}

impl PdfSink {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            author: String::new(),
            default_format: crate::assemble::DEFAULT_PAGE_FORMAT,
            current: None,
        }
    }

    fn close_page(&mut self) -> Result<()> {
        let Some(page) = self.current.take() else {
            return Ok(());
        };
        let content = Content {
            operations: page.operations,
        };
        let content_id = self.doc.add_object(Stream::new(
            dictionary! {},
            content.encode().context("Failed to encode content stream")?,
        ));
        let resources_id = self.doc.add_object(dictionary! {
            "XObject" => page.xobjects,
        });
        let page_id = self.doc.add_object(dictionary! {
            "Type" => name("Page"),
            "Parent" => self.pages_id,
            "MediaBox" => media_box(page.width_pt, page.height_pt),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        self.page_ids.push(page_id.into());
        Ok(())
    }

    fn write_trailer(&mut self) {
        let count = self.page_ids.len() as i64;
        let default_box = media_box(
            mm_to_pt(self.default_format.width) as f32,
            mm_to_pt(self.default_format.height) as f32,
        );
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => name("Pages"),
                "Kids" => std::mem::take(&mut self.page_ids),
                "Count" => count,
                "MediaBox" => default_box,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => name("Catalog"),
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = Dictionary::new();
        info.set(
            "Producer",
            literal(&format!("stackpdf {}", env!("CARGO_PKG_VERSION"))),
        );
        if let Ok(dur) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            info.set("CreationDate", literal(&pdf_date(dur.as_secs())));
        }
        if !self.author.is_empty() {
            info.set("Author", literal(&self.author));
        }
        let info_id = self.doc.add_object(Object::Dictionary(info));
        self.doc.trailer.set("Info", info_id);
    }
}

impl Default for PdfSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSink for PdfSink {
    fn init(&mut self, author: &str, default_format: Dimensions) -> Result<()> {
        self.author = author.to_string();
        self.default_format = default_format;
        Ok(())
    }

    fn add_page(&mut self, size: Dimensions, orientation: Orientation) -> Result<()> {
        self.close_page()?;
        let size = match orientation {
            Orientation::Portrait => size,
            Orientation::Landscape => size.swapped(),
        };
        anyhow::ensure!(
            size.width > 0.0 && size.height > 0.0,
            "Invalid page size {}x{}mm",
            size.width,
            size.height
        );
        self.current = Some(OpenPage {
            width_pt: mm_to_pt(size.width) as f32,
            height_pt: mm_to_pt(size.height) as f32,
            operations: Vec::new(),
            xobjects: Dictionary::new(),
        });
        Ok(())
    }

    fn place_image(&mut self, path: &Path, x: f64, y: f64, size: Dimensions) -> Result<()> {
        let page = self
            .current
            .as_mut()
            .with_context(|| format!("No page to place {} on", path.display()))?;
        let img = prepare_image(path)?;
        let placed = resolve_placement(size, img.pixel_size());
        let image_id = embed_image(&mut self.doc, img);

        let im_name = format!("Im{}", page.xobjects.len());
        page.xobjects.set(im_name.as_bytes().to_vec(), image_id);

        // PDF origin is bottom-left, placement origin is top-left
        let w = mm_to_pt(placed.width) as f32;
        let h = mm_to_pt(placed.height) as f32;
        let x_pt = mm_to_pt(x) as f32;
        let y_pt = page.height_pt - mm_to_pt(y) as f32 - h;
        debug!(path = %path.display(), w, h, x_pt, y_pt, "placing image");
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(h),
                    Object::Real(x_pt),
                    Object::Real(y_pt),
                ],
            ),
            Operation::new("Do", vec![Object::Name(im_name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn finalize(&mut self, output: &Path) -> Result<()> {
        self.close_page()?;
        self.write_trailer();

        if output == Path::new("-") {
            let stdout = std::io::stdout();
            let mut out = std::io::BufWriter::new(stdout.lock());
            self.doc
                .save_to(&mut out)
                .context("Failed to write PDF to stdout")?;
        } else {
            self.doc
                .save(output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
        }
        Ok(())
    }
}
