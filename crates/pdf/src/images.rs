//! Embedded image extraction.
//!
//! Image XObjects are collected from a page's resources (descending into
//! form XObjects) and returned as self-contained files: JPEG and JPEG2000
//! streams pass through untouched, everything else is re-encoded as PNG.

use std::collections::HashSet;
use std::io::Cursor;

use crate::parser::backend::{LopdfBackend, PageId};
use crate::types::{ImageData, ImageFormat, ImageId};
use crate::PdfError;

/// Form XObjects nested deeper than this are not searched.
pub(crate) const MAX_FORM_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

/// Geometry of an unfiltered (or Flate-decoded) pixel stream.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PixelLayout {
    width: u32,
    height: u32,
    bits_per_component: u8,
    channels: u8,
    color_space: ColorSpace,
}

impl PixelLayout {
    /// Rows are padded to a whole byte.
    fn expected_byte_count(&self) -> usize {
        let bits_per_row =
            self.width as usize * self.channels as usize * self.bits_per_component as usize;
        bits_per_row.div_ceil(8) * self.height as usize
    }

    fn from_dict(dict: &lopdf::Dictionary) -> Option<Self> {
        let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
        let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
        let bits_per_component = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(8);
        if !matches!(bits_per_component, 1 | 2 | 4 | 8) {
            return None;
        }

        let (color_space, channels) = match dict.get(b"ColorSpace").ok()?.as_name().ok()? {
            b"DeviceGray" | b"CalGray" => (ColorSpace::Gray, 1),
            b"DeviceRGB" | b"CalRGB" => (ColorSpace::Rgb, 3),
            b"DeviceCMYK" => (ColorSpace::Cmyk, 4),
            _ => return None,
        };

        Some(PixelLayout {
            width,
            height,
            bits_per_component,
            channels,
            color_space,
        })
    }
}

/// Sniff an image format from its leading bytes. Only the encodings a PDF
/// image stream can carry whole are recognized.
pub fn detect_image_format(bytes: &[u8]) -> ImageFormat {
    const PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JP2: [u8; 8] = [0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' '];

    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        b if b.starts_with(&PNG) => ImageFormat::Png,
        b if b.starts_with(&JP2) => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

/// Format implied by a stream filter, when the filter is a complete codec.
pub fn format_from_pdf_filter(filter_name: &str) -> ImageFormat {
    match filter_name {
        "DCTDecode" => ImageFormat::Jpeg,
        "JPXDecode" => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

fn encode_png(layout: &PixelLayout, raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < layout.expected_byte_count() {
        return None;
    }
    let raw = &raw[..layout.expected_byte_count()];

    let pixels = if layout.bits_per_component < 8 {
        expand_packed_samples(raw, layout)
    } else {
        raw.to_vec()
    };

    let image = match layout.color_space {
        ColorSpace::Gray => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(
            layout.width,
            layout.height,
            pixels,
        )?),
        ColorSpace::Rgb => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            pixels,
        )?),
        ColorSpace::Cmyk => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            cmyk_to_rgb(&pixels),
        )?),
    };

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

/// Widen 1, 2 or 4-bit samples to 8 bits, scaling to the full range.
fn expand_packed_samples(raw: &[u8], layout: &PixelLayout) -> Vec<u8> {
    let samples_per_row = layout.width as usize * layout.channels as usize;
    let bytes_per_row = (samples_per_row * layout.bits_per_component as usize).div_ceil(8);
    let bpc = layout.bits_per_component;
    let per_byte = 8 / bpc as usize;
    let max_val = (1u16 << bpc) - 1;

    let mut out = Vec::with_capacity(samples_per_row * layout.height as usize);
    for row in raw.chunks_exact(bytes_per_row) {
        let samples = row.iter().flat_map(|&byte| {
            (0..per_byte).map(move |i| {
                let shift = 8 - bpc * (i as u8 + 1);
                let val = u16::from((byte >> shift) & max_val as u8);
                (val * 255 / max_val) as u8
            })
        });
        out.extend(samples.take(samples_per_row));
    }
    out
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = u16::from(px[3]);
            let channel = |c: u8| 255u16.saturating_sub((u16::from(c) + k).min(255)) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

fn decode_parms(dict: &lopdf::Dictionary) -> Option<&lopdf::Dictionary> {
    match dict.get(b"DecodeParms").ok()? {
        lopdf::Object::Dictionary(d) => Some(d),
        lopdf::Object::Array(arr) => arr.first().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

/// Decode a CCITT Group 4 stream into a PNG.
fn decode_ccitt(dict: &lopdf::Dictionary, raw: &[u8]) -> Option<Vec<u8>> {
    let parms = decode_parms(dict)?;
    let width = u16::try_from(parms.get(b"Columns").ok()?.as_i64().ok()?).ok()?;
    let height = parms
        .get(b"Rows")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u16::try_from(v).ok());
    let k = parms
        .get(b"K")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    // Only pure two-dimensional (Group 4) coding is supported.
    if k >= 0 {
        return None;
    }
    let black_is_1 = parms
        .get(b"BlackIs1")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    let bytes_per_row = usize::from(width).div_ceil(8);
    let mut pixels: Vec<u8> = Vec::new();
    let mut rows = 0u32;
    fax::decoder::decode_g4(raw.iter().copied(), width, height, |transitions| {
        pixels.extend(pack_row(transitions, width, !black_is_1));
        rows += 1;
    })?;
    if rows == 0 {
        return None;
    }

    let layout = PixelLayout {
        width: u32::from(width),
        height: rows,
        bits_per_component: 1,
        channels: 1,
        color_space: ColorSpace::Gray,
    };
    debug_assert_eq!(pixels.len(), bytes_per_row * rows as usize);
    encode_png(&layout, &pixels)
}

/// Pack fax colour transitions into a 1-bit row. Runs alternate white then
/// black starting at column 0; `white_is_1` selects the bit value for white.
fn pack_row(transitions: &[u16], width: u16, white_is_1: bool) -> Vec<u8> {
    let mut row = vec![if white_is_1 { 0xFF } else { 0x00 }; usize::from(width).div_ceil(8)];

    let mut paint_black = |start: u16, end: u16| {
        for col in start..end.min(width) {
            let mask = 1u8 << (7 - (col % 8));
            let byte = &mut row[usize::from(col / 8)];
            if white_is_1 {
                *byte &= !mask;
            } else {
                *byte |= mask;
            }
        }
    };

    let mut black = false;
    let mut prev = 0u16;
    for &pos in transitions {
        if black {
            paint_black(prev, pos);
        }
        prev = pos;
        black = !black;
    }
    if black {
        paint_black(prev, width);
    }
    row
}

fn filter_name(dict: &lopdf::Dictionary) -> Option<String> {
    let name = match dict.get(b"Filter").ok()? {
        lopdf::Object::Name(n) => n,
        // Chained filters: the last one decides the payload format.
        lopdf::Object::Array(arr) => arr.last()?.as_name().ok()?,
        _ => return None,
    };
    Some(String::from_utf8_lossy(name).into_owned())
}

/// Turn an image stream into file bytes, or `None` when the encoding is
/// not one we can write out.
fn image_bytes(stream: &lopdf::Stream) -> Option<(ImageFormat, Vec<u8>)> {
    let filter = filter_name(&stream.dict);

    if let Some(format) = filter
        .as_deref()
        .map(format_from_pdf_filter)
        .filter(|f| *f != ImageFormat::Unknown)
    {
        return Some((format, stream.content.clone()));
    }

    if filter.as_deref() == Some("CCITTFaxDecode") {
        return decode_ccitt(&stream.dict, &stream.content).map(|b| (ImageFormat::Png, b));
    }

    let bytes = stream.decompressed_content().ok().or_else(|| {
        filter.is_none().then(|| stream.content.clone())
    })?;
    match detect_image_format(&bytes) {
        ImageFormat::Unknown => {
            let layout = PixelLayout::from_dict(&stream.dict)?;
            encode_png(&layout, &bytes).map(|b| (ImageFormat::Png, b))
        }
        known => Some((known, bytes)),
    }
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> Option<&'a lopdf::Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

/// `Resources -> XObject` of a page or form dictionary. Pages may inherit
/// their resources from an ancestor in the page tree.
fn xobject_dict<'a>(
    doc: &'a lopdf::Document,
    dict: &'a lopdf::Dictionary,
) -> Option<&'a lopdf::Dictionary> {
    let mut current = dict;
    for _ in 0..32 {
        if let Ok(resources) = current.get(b"Resources") {
            let resources = resolve_dict(doc, resources)?;
            return resolve_dict(doc, resources.get(b"XObject").ok()?);
        }
        current = resolve_dict(doc, current.get(b"Parent").ok()?)?;
    }
    None
}

fn subtype(dict: &lopdf::Dictionary) -> Option<&[u8]> {
    dict.get(b"Subtype").ok()?.as_name().ok()
}

struct Collector<'a> {
    doc: &'a lopdf::Document,
    page_index: usize,
    seen: HashSet<lopdf::ObjectId>,
    images: Vec<ImageData>,
}

impl Collector<'_> {
    fn walk(&mut self, xobjects: &lopdf::Dictionary, depth: usize) {
        for (name, obj) in xobjects.iter() {
            if let lopdf::Object::Reference(id) = obj {
                if !self.seen.insert(*id) {
                    continue;
                }
            }
            let lopdf::Object::Stream(stream) = resolve(self.doc, obj) else {
                continue;
            };
            match subtype(&stream.dict) {
                Some(b"Image") => self.push(name, stream),
                Some(b"Form") if depth < MAX_FORM_DEPTH => {
                    if let Some(nested) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|r| resolve_dict(self.doc, r))
                        .and_then(|r| r.get(b"XObject").ok())
                        .and_then(|x| resolve_dict(self.doc, x))
                    {
                        self.walk(nested, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }

    fn push(&mut self, name: &[u8], stream: &lopdf::Stream) {
        let name = String::from_utf8_lossy(name);
        match image_bytes(stream) {
            Some((format, bytes)) => self.images.push(ImageData {
                id: ImageId::new(name),
                format,
                bytes,
            }),
            None => log::warn!(
                "page {}: skipping image {} with unsupported encoding {:?}",
                self.page_index,
                name,
                filter_name(&stream.dict)
            ),
        }
    }
}

/// Every extractable image on a page, in resource order. Each image stream
/// is reported once per page even if several forms reference it.
pub fn page_images(
    backend: &LopdfBackend,
    page_id: PageId,
    page_index: usize,
) -> Result<Vec<ImageData>, PdfError> {
    let doc = backend.raw_doc();
    let page = doc
        .get_object(page_id)
        .and_then(|o| o.as_dict())
        .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?;

    let mut collector = Collector {
        doc,
        page_index,
        seen: HashSet::new(),
        images: Vec::new(),
    };
    if let Some(xobjects) = xobject_dict(doc, page) {
        collector.walk(xobjects, 0);
    }
    Ok(collector.images)
}
