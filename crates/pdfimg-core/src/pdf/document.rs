//! lopdf-backed document: page tree, image XObjects, and original image bytes.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::raster::PageRasterizer;
use super::samples::{
    ColorSpace, DeviceSpace, FaxParams, SampleError, SampleLayout, ccitt_tiff, decode_samples,
};
use super::{EmbeddedImage, ImageRef, PageHandle, PdfBackend, PdfDocument, Result};
use crate::error::PdfError;

/// Upper bound when walking `/Parent` links for inherited resources.
const MAX_TREE_DEPTH: usize = 64;

/// Opens documents with lopdf. Page rendering goes through PDFium when the
/// `render` feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for LopdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>> {
        Ok(Box::new(LopdfDocument::load(path)?))
    }
}

/// A document opened with lopdf.
pub struct LopdfDocument {
    path: PathBuf,
    inner: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    /// Opened on the first render request.
    raster: OnceCell<std::result::Result<PageRasterizer, String>>,
}

impl LopdfDocument {
    /// Load a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let mut inner = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if inner.is_encrypted() {
            if inner.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted {} with empty password", path.display());
        }

        let pages: Vec<ObjectId> = inner.get_pages().into_values().collect();
        debug!("Loaded {} with {} pages", path.display(), pages.len());

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            pages,
            raster: OnceCell::new(),
        })
    }

    /// Get resources dictionary for a page, handling inheritance
    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut node_id = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let node = self.inner.get_dictionary(node_id).ok()?;

            if let Ok(resources) = node.get(b"Resources") {
                if let Ok((_, Object::Dictionary(dict))) = self.inner.dereference(resources) {
                    return Some(dict);
                }
            }

            match node.get(b"Parent") {
                Ok(Object::Reference(parent)) => node_id = *parent,
                _ => return None,
            }
        }
        None
    }

    /// Collect image XObjects from a resource dictionary, descending into
    /// Form XObjects once each.
    fn collect_images(
        &self,
        resources: &Dictionary,
        out: &mut Vec<ImageRef>,
        seen_forms: &mut HashSet<ObjectId>,
    ) -> Result<()> {
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(());
        };
        let (_, xobjects) = self
            .inner
            .dereference(xobjects)
            .map_err(|e| PdfError::ImageListing(e.to_string()))?;
        let xobjects = xobjects
            .as_dict()
            .map_err(|e| PdfError::ImageListing(e.to_string()))?;

        for (name, entry) in xobjects.iter() {
            let Object::Reference(id) = entry else {
                continue;
            };
            let Ok(Object::Stream(stream)) = self.inner.get_object(*id) else {
                trace!("XObject {} is not a stream", String::from_utf8_lossy(name));
                continue;
            };

            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => {
                    let reference = ImageRef::from(*id);
                    if !out.contains(&reference) {
                        out.push(reference);
                    }
                }
                Ok(b"Form") => {
                    if !seen_forms.insert(*id) {
                        continue;
                    }
                    if let Ok(nested) = stream.dict.get(b"Resources") {
                        if let Ok((_, Object::Dictionary(nested))) = self.inner.dereference(nested) {
                            self.collect_images(nested, out, seen_forms)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// A color space we can convert to gray or RGB.
    fn color_space(&self, object: &Object) -> Option<ColorSpace> {
        let (_, object) = self.inner.dereference(object).ok()?;
        if let Object::Array(family) = object {
            if let Ok(b"Indexed" | b"I") = family.first()?.as_name() {
                return self.indexed_space(family);
            }
        }
        self.device_space(object).map(ColorSpace::Device)
    }

    fn device_space(&self, object: &Object) -> Option<DeviceSpace> {
        let (_, object) = self.inner.dereference(object).ok()?;
        match object {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => Some(DeviceSpace::Gray),
                b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(DeviceSpace::Rgb),
                b"DeviceCMYK" | b"CMYK" => Some(DeviceSpace::Cmyk),
                _ => None,
            },
            Object::Array(family) => match family.first()?.as_name().ok()? {
                b"CalGray" => Some(DeviceSpace::Gray),
                b"CalRGB" => Some(DeviceSpace::Rgb),
                b"ICCBased" => {
                    let (_, profile) = self.inner.dereference(family.get(1)?).ok()?;
                    match profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok()? {
                        1 => Some(DeviceSpace::Gray),
                        3 => Some(DeviceSpace::Rgb),
                        4 => Some(DeviceSpace::Cmyk),
                        _ => None,
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// `[/Indexed base hival lookup]`, with the lookup as a string or stream.
    fn indexed_space(&self, family: &[Object]) -> Option<ColorSpace> {
        let base = self.device_space(family.get(1)?)?;
        let hival = u8::try_from(family.get(2)?.as_i64().ok()?).ok()?;
        let (_, lookup) = self.inner.dereference(family.get(3)?).ok()?;
        let palette = match lookup {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) if stream_filters(&stream.dict).is_empty() => {
                stream.content.clone()
            }
            Object::Stream(stream) => stream.decompressed_content().ok()?,
            _ => return None,
        };
        Some(ColorSpace::Indexed {
            base,
            hival,
            palette,
        })
    }

    /// Convert raw decoded samples to pixels and wrap them in a PNG.
    fn encode_samples(&self, reference: ImageRef, stream: &Stream, filtered: bool) -> Result<EmbeddedImage> {
        let unsupported = |reason: String| PdfError::UnsupportedImage { reference, reason };
        let dict = &stream.dict;

        let (Some(width), Some(height)) = (dimension(dict, b"Width"), dimension(dict, b"Height"))
        else {
            return Err(unsupported("missing or invalid dimensions".to_string()));
        };

        let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let color_space = if image_mask {
            ColorSpace::Device(DeviceSpace::Gray)
        } else {
            dict.get(b"ColorSpace")
                .ok()
                .and_then(|object| self.color_space(object))
                .ok_or_else(|| unsupported("unsupported color space".to_string()))?
        };
        let bits = if image_mask {
            1
        } else {
            dict.get(b"BitsPerComponent")
                .and_then(Object::as_i64)
                .unwrap_or(8)
        };
        let bits =
            u8::try_from(bits).map_err(|_| unsupported(format!("{bits} bits per component")))?;
        let inverted = matches!(color_space, ColorSpace::Device(_)) && decode_inverted(dict);

        let data = if filtered {
            stream
                .decompressed_content()
                .map_err(|e| unsupported(format!("cannot decode stream: {e}")))?
        } else {
            stream.content.clone()
        };

        let layout = SampleLayout {
            width,
            height,
            bits,
            color_space,
            inverted,
        };
        let image = decode_samples(&layout, &data).map_err(|e| match e {
            SampleError::Truncated { .. } => PdfError::ImageExtraction {
                reference,
                reason: e.to_string(),
            },
            SampleError::Unsupported(reason) => unsupported(reason),
        })?;

        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(EmbeddedImage::new(bytes, "png"))
    }

    /// Keep CCITT fax data as-is inside a TIFF container.
    fn encode_fax(&self, reference: ImageRef, stream: &Stream) -> Result<EmbeddedImage> {
        let dict = &stream.dict;
        let parms = dict
            .get(b"DecodeParms")
            .ok()
            .and_then(|object| self.inner.dereference(object).ok())
            .and_then(|(_, object)| match object {
                Object::Dictionary(parms) => Some(parms),
                Object::Array(list) => list
                    .first()
                    .and_then(|first| self.inner.dereference(first).ok())
                    .and_then(|(_, first)| first.as_dict().ok()),
                _ => None,
            });
        let empty = Dictionary::new();
        let parms = parms.unwrap_or(&empty);

        let columns = dimension(parms, b"Columns")
            .or_else(|| dimension(dict, b"Width"))
            .unwrap_or(1728);
        let rows = dimension(parms, b"Rows")
            .or_else(|| dimension(dict, b"Height"))
            .ok_or_else(|| PdfError::UnsupportedImage {
                reference,
                reason: "fax image without a row count".to_string(),
            })?;
        let k = parms.get(b"K").and_then(Object::as_i64).unwrap_or(0);
        let black_is_1 = matches!(parms.get(b"BlackIs1"), Ok(Object::Boolean(true)));

        let params = FaxParams {
            columns,
            rows,
            k,
            reversed: black_is_1 != decode_inverted(dict),
        };
        let bytes = ccitt_tiff(&params, &stream.content).map_err(|e| PdfError::UnsupportedImage {
            reference,
            reason: e.to_string(),
        })?;
        Ok(EmbeddedImage::new(bytes, "tiff"))
    }
}

/// A positive integer entry, such as an image dimension.
fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
}

/// Whether `/Decode` maps the first component from high to low.
fn decode_inverted(dict: &Dictionary) -> bool {
    let number = |object: &Object| match object {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    };
    match dict.get(b"Decode").and_then(Object::as_array) {
        Ok(range) => match (range.first().and_then(number), range.get(1).and_then(number)) {
            (Some(low), Some(high)) => low > high,
            _ => false,
        },
        Err(_) => false,
    }
}

/// Filter names of a stream, in application order.
fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, index: u32) -> Result<PageHandle> {
        let page_id = self
            .pages
            .get(index as usize)
            .ok_or(PdfError::InvalidPage(index))?;
        self.inner
            .get_dictionary(*page_id)
            .map_err(|_| PdfError::InvalidPage(index))?;
        Ok(PageHandle { index })
    }

    fn list_images(&self, page: &PageHandle) -> Result<Vec<ImageRef>> {
        let page_id = self
            .pages
            .get(page.index as usize)
            .ok_or(PdfError::InvalidPage(page.index))?;

        let mut images = Vec::new();
        if let Some(resources) = self.page_resources(*page_id) {
            self.collect_images(resources, &mut images, &mut HashSet::new())?;
        }

        debug!("Found {} images on page {}", images.len(), page.number());
        Ok(images)
    }

    fn extract_image(&self, image: ImageRef) -> Result<EmbeddedImage> {
        let stream = self
            .inner
            .get_object((image.object, image.generation))
            .and_then(Object::as_stream)
            .map_err(|e| PdfError::ImageExtraction {
                reference: image,
                reason: e.to_string(),
            })?;

        let filters = stream_filters(&stream.dict);
        let encoded = |extension: &str| -> Result<EmbeddedImage> {
            Ok(EmbeddedImage::new(stream.content.clone(), extension))
        };

        match filters.iter().map(Vec::as_slice).collect::<Vec<_>>().as_slice() {
            [b"DCTDecode"] => encoded("jpg"),
            [b"JPXDecode"] => encoded("jpx"),
            [b"JBIG2Decode"] => encoded("jb2"),
            [b"CCITTFaxDecode"] => self.encode_fax(image, stream),
            [] => self.encode_samples(image, stream, false),
            chain if chain.iter().all(|f| matches!(*f, b"FlateDecode" | b"LZWDecode")) => {
                self.encode_samples(image, stream, true)
            }
            chain => Err(PdfError::UnsupportedImage {
                reference: image,
                reason: format!(
                    "filter chain {:?}",
                    chain.iter().map(|f| String::from_utf8_lossy(f)).collect::<Vec<_>>()
                ),
            }),
        }
    }

    fn render_page(&self, page: &PageHandle, dpi: u32) -> Result<DynamicImage> {
        let rasterizer = self
            .raster
            .get_or_init(|| PageRasterizer::open(&self.path).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| PdfError::Render(e.clone()))?;
        rasterizer.render(page.index, dpi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_filters() {
        let mut dict = Dictionary::new();
        assert!(stream_filters(&dict).is_empty());

        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        assert_eq!(stream_filters(&dict), vec![b"DCTDecode".to_vec()]);

        dict.set(
            "Filter",
            Object::Array(vec![
                Object::Name(b"FlateDecode".to_vec()),
                Object::Name(b"DCTDecode".to_vec()),
            ]),
        );
        assert_eq!(
            stream_filters(&dict),
            vec![b"FlateDecode".to_vec(), b"DCTDecode".to_vec()]
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LopdfDocument::load(&dir.path().join("missing.pdf"));
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(LopdfBackend::new().open(&path).is_err());
    }
}
