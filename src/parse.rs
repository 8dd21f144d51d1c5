use anyhow::{Context, Result};
use std::path::PathBuf;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp", "gif"];

/// pattern used when no inputs are given
pub const DEFAULT_PATTERN: &str = "*.jpg";

fn has_image_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn is_glob_pattern(s: &str) -> bool {
    s.contains(&['*', '?', '['][..])
}

/// expand inputs into an ordered image list
///
/// Files are kept in place, directories contribute their image files sorted
/// by name, and glob patterns contribute their matches sorted by name.
pub fn expand_image_paths(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&path)
                .with_context(|| format!("Cannot read directory: {}", path.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| has_image_extension(p))
                .collect();
            entries.sort();
            anyhow::ensure!(
                !entries.is_empty(),
                "No image files found in {}",
                path.display()
            );
            result.extend(entries);
        } else if !path.exists() && is_glob_pattern(input) {
            let mut matches = find_files(input)?;
            matches.sort();
            anyhow::ensure!(!matches.is_empty(), "No files match pattern {}", input);
            result.extend(matches);
        } else {
            result.push(path);
        }
    }
    Ok(result)
}

/// files matching a glob pattern, in the order the filesystem yields them
pub fn find_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern).with_context(|| format!("Invalid pattern: {}", pattern))?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.with_context(|| format!("Cannot read match for {}", pattern))?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    /// color transform flag from the Adobe APP14 marker, if present
    pub adobe_color_transform: Option<u8>,
}

/// parse JPEG markers up to the first SOF
pub fn parse_jpeg_header(data: &[u8]) -> Result<JpegInfo> {
    anyhow::ensure!(
        data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8,
        "Not a valid JPEG file"
    );
    let mut adobe_color_transform = None;
    let mut pos = 2;
    while pos + 4 < data.len() {
        if data[pos] != 0xFF {
            anyhow::bail!("Invalid JPEG marker at offset {}", pos);
        }
        let marker = data[pos + 1];
        // skip padding 0xFF bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // RST and standalone markers carry no length field
        if marker == 0x00 || (0xD0..=0xD9).contains(&marker) {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let payload = pos + 4;
        // APP14 "Adobe": transform byte is the last of a 12 byte payload
        if marker == 0xEE
            && len >= 14
            && payload + 12 <= data.len()
            && &data[payload..payload + 5] == b"Adobe"
        {
            adobe_color_transform = Some(data[payload + 11]);
        }
        // all SOF markers, excluding 0xC4=DHT, 0xC8=JPG, 0xCC=DAC
        if matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF) {
            anyhow::ensure!(pos + 2 + len <= data.len() && len >= 8, "Truncated SOF");
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]) as u32;
            return Ok(JpegInfo {
                width,
                height,
                components: data[pos + 9],
                adobe_color_transform,
            });
        }
        pos += 2 + len;
    }
    anyhow::bail!("No SOF marker found in JPEG")
}

pub struct PngInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub interlace: u8,
    pub has_trns: bool,
    pub idat_data: Vec<u8>,
    pub plte_data: Vec<u8>,
}

/// parse a PNG file to extract IHDR info and concatenated IDAT chunk data
pub fn parse_png_header(data: &[u8]) -> Result<PngInfo> {
    const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
    anyhow::ensure!(
        data.len() >= 8 && data[..8] == SIGNATURE,
        "Not a valid PNG file"
    );

    let mut pos = 8;
    let mut ihdr: Option<(u32, u32, u8, u8, u8)> = None;
    let mut has_trns = false;
    let mut idat_data = Vec::new();
    let mut plte_data = Vec::new();

    while pos + 8 <= data.len() {
        let chunk_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        let start = pos + 8;
        let chunk_end = start + chunk_len + 4; // +4 for CRC
        anyhow::ensure!(chunk_end <= data.len(), "Truncated PNG chunk");
        let body = &data[start..start + chunk_len];

        match chunk_type {
            b"IHDR" => {
                anyhow::ensure!(chunk_len >= 13, "Truncated IHDR");
                ihdr = Some((
                    u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
                    u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
                    body[8],
                    body[9],
                    body[12],
                ));
            }
            b"PLTE" => plte_data.extend_from_slice(body),
            b"tRNS" => has_trns = true,
            b"IDAT" => idat_data.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }

        pos = chunk_end;
    }

    let (width, height, bit_depth, color_type, interlace) =
        ihdr.context("No IHDR chunk found in PNG")?;
    anyhow::ensure!(!idat_data.is_empty(), "No IDAT chunks found in PNG");

    Ok(PngInfo {
        width,
        height,
        bit_depth,
        color_type,
        interlace,
        has_trns,
        idat_data,
        plte_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tmp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stackpdf_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn s(p: &std::path::Path) -> String {
        p.to_str().unwrap().to_string()
    }

    fn make_minimal_jpeg(width: u16, height: u16, components: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xFF, 0xD8]);
        let sof_len: u16 = 8 + 3 * components as u16;
        buf.extend_from_slice(&[0xFF, 0xC0]);
        buf.extend_from_slice(&sof_len.to_be_bytes());
        buf.push(8);
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&width.to_be_bytes());
        buf.push(components);
        for i in 0..components {
            buf.push(i + 1);
            buf.push(0x11);
            buf.push(0);
        }
        buf.extend_from_slice(&[0xFF, 0xD9]);
        buf
    }

    #[test]
    fn jpeg_header_rgb() {
        let info = parse_jpeg_header(&make_minimal_jpeg(640, 480, 3)).unwrap();
        assert_eq!((info.width, info.height, info.components), (640, 480, 3));
        assert_eq!(info.adobe_color_transform, None);
    }

    #[test]
    fn jpeg_header_adobe_marker_before_sof() {
        let mut buf = vec![0xFF, 0xD8, 0xFF, 0xEE];
        let mut app14 = b"Adobe".to_vec();
        app14.extend_from_slice(&[0, 100, 0, 0, 0, 0, 2]);
        buf.extend_from_slice(&((app14.len() + 2) as u16).to_be_bytes());
        buf.extend_from_slice(&app14);
        buf.extend_from_slice(&make_minimal_jpeg(32, 16, 4)[2..]);
        let info = parse_jpeg_header(&buf).unwrap();
        assert_eq!((info.width, info.height, info.components), (32, 16, 4));
        assert_eq!(info.adobe_color_transform, Some(2));
    }

    #[test]
    fn jpeg_header_sof2_progressive() {
        let mut buf = make_minimal_jpeg(1024, 768, 3);
        buf[3] = 0xC2;
        let info = parse_jpeg_header(&buf).unwrap();
        assert_eq!((info.width, info.height), (1024, 768));
    }

    #[test]
    fn jpeg_header_err_not_jpeg() {
        assert!(parse_jpeg_header(&[0x89, 0x50]).is_err());
        assert!(parse_jpeg_header(&[0xFF]).is_err());
    }

    #[test]
    fn jpeg_header_err_no_sof() {
        assert!(parse_jpeg_header(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }

    fn encode_png(width: u32, height: u32, color: png::ColorType) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let channels = match color {
                png::ColorType::Indexed => {
                    encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
                    encoder.set_trns(vec![0]);
                    1
                }
                png::ColorType::Grayscale => 1,
                png::ColorType::GrayscaleAlpha => 2,
                png::ColorType::Rgb => 3,
                png::ColorType::Rgba => 4,
            };
            let mut writer = encoder.write_header().unwrap();
            let pixels = vec![0u8; (width * height) as usize * channels];
            writer.write_image_data(&pixels).unwrap();
        }
        out
    }

    #[test]
    fn png_header_rgb() {
        let info = parse_png_header(&encode_png(16, 8, png::ColorType::Rgb)).unwrap();
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(info.color_type, 2);
        assert_eq!(info.bit_depth, 8);
        assert_eq!(info.interlace, 0);
        assert!(!info.has_trns);
        assert!(!info.idat_data.is_empty());
        assert!(info.plte_data.is_empty());
    }

    #[test]
    fn png_header_palette_with_transparency() {
        let info = parse_png_header(&encode_png(4, 4, png::ColorType::Indexed)).unwrap();
        assert_eq!(info.color_type, 3);
        assert_eq!(info.plte_data.len(), 6);
        assert!(info.has_trns);
    }

    #[test]
    fn png_header_err_not_png() {
        assert!(parse_png_header(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]).is_err());
        assert!(parse_png_header(&[137, 80, 78, 71]).is_err());
    }

    #[test]
    fn png_header_err_truncated_chunk() {
        let mut data = encode_png(4, 4, png::ColorType::Grayscale);
        data.truncate(30);
        assert!(parse_png_header(&data).is_err());
    }

    #[test]
    fn expand_paths_files_only() {
        let dir = tmp_dir("expand_files");
        let p1 = dir.join("b.png");
        let p2 = dir.join("a.jpg");
        std::fs::write(&p1, b"fake").unwrap();
        std::fs::write(&p2, b"fake").unwrap();
        let result = expand_image_paths(&[s(&p1), s(&p2)]).unwrap();
        // explicit files keep the caller's order
        assert_eq!(result, vec![p1, p2]);
    }

    #[test]
    fn expand_paths_directory() {
        let dir = tmp_dir("expand_dir");
        std::fs::write(dir.join("c.png"), b"fake").unwrap();
        std::fs::write(dir.join("a.JPG"), b"fake").unwrap();
        std::fs::write(dir.join("b.tiff"), b"fake").unwrap();
        std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();
        let result = expand_image_paths(&[s(&dir)]).unwrap();
        let names: Vec<_> = result
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.tiff", "c.png"]);
    }

    #[test]
    fn expand_paths_empty_dir() {
        let dir = tmp_dir("expand_empty");
        assert!(expand_image_paths(&[s(&dir)]).is_err());
    }

    #[test]
    fn expand_paths_glob_sorted() {
        let dir = tmp_dir("expand_glob");
        for name in ["03.jpg", "01.jpg", "02.jpg", "cover.png"] {
            let mut f = std::fs::File::create(dir.join(name)).unwrap();
            f.write_all(b"fake").unwrap();
        }
        let pattern = s(&dir.join("*.jpg"));
        let result = expand_image_paths(&[pattern]).unwrap();
        assert_eq!(
            result,
            vec![dir.join("01.jpg"), dir.join("02.jpg"), dir.join("03.jpg")]
        );
    }

    #[test]
    fn expand_paths_glob_without_matches() {
        let dir = tmp_dir("expand_glob_none");
        let pattern = s(&dir.join("*.jpg"));
        assert!(expand_image_paths(&[pattern]).is_err());
    }

    #[test]
    fn expand_paths_mixed() {
        let dir = tmp_dir("expand_mixed");
        let sub = dir.join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        let cover = dir.join("cover.png");
        std::fs::write(&cover, b"fake").unwrap();
        std::fs::write(sub.join("b.png"), b"fake").unwrap();
        std::fs::write(sub.join("a.png"), b"fake").unwrap();
        let result = expand_image_paths(&[s(&cover), s(&sub.join("*.png"))]).unwrap();
        assert_eq!(result, vec![cover, sub.join("a.png"), sub.join("b.png")]);
    }

    #[test]
    fn find_files_skips_directories() {
        let dir = tmp_dir("find_dirs");
        std::fs::create_dir_all(dir.join("d.jpg")).unwrap();
        std::fs::write(dir.join("e.jpg"), b"fake").unwrap();
        let found = find_files(&s(&dir.join("*.jpg"))).unwrap();
        assert_eq!(found, vec![dir.join("e.jpg")]);
    }
}
