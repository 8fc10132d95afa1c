//! Single-page artifact extraction
//!
//! The source format is detected from content, never from the file name.
//! Raster images are copied whole, PDFs are reduced to one page and TIFFs to
//! one frame. Scratch copies live in a temporary directory that is removed
//! when extraction returns, whatever the outcome.

use crate::error::ExtractError;
use image::{DynamicImage, ImageBuffer, ImageFormat};
use margin_domain::location::{page_artifact_key, page_prefix};
use margin_domain::traits::ObjectStore;
use margin_domain::{ObjectLocation, PageArtifact};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Formats a page can be extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// PNG image (single page)
    Png,
    /// JPEG image (single page)
    Jpeg,
    /// PDF document
    Pdf,
    /// TIFF image, possibly multi-frame
    Tiff,
}

impl DocumentFormat {
    /// Detect the format from the leading bytes
    ///
    /// Returns the detected MIME type (or `"unknown"`) when the format is not
    /// one we can split.
    pub fn detect(bytes: &[u8]) -> Result<Self, String> {
        let kind = infer::get(bytes).ok_or_else(|| "unknown".to_string())?;
        match kind.mime_type() {
            "image/png" => Ok(DocumentFormat::Png),
            "image/jpeg" => Ok(DocumentFormat::Jpeg),
            "application/pdf" => Ok(DocumentFormat::Pdf),
            "image/tiff" => Ok(DocumentFormat::Tiff),
            other => Err(other.to_string()),
        }
    }

    /// MIME type, used as the artifact's content type
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Png => "image/png",
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Tiff => "image/tiff",
        }
    }

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Png => "png",
            DocumentFormat::Jpeg => "jpg",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Tiff => "tif",
        }
    }
}

/// Writes single-page artifacts for flagged pages
pub struct PageExtractor<S> {
    store: S,
    output_bucket: String,
    scratch_dir: Option<PathBuf>,
}

impl<S> PageExtractor<S>
where
    S: ObjectStore,
    S::Error: Display,
{
    /// Create an extractor writing artifacts into `output_bucket`
    pub fn new(store: S, output_bucket: impl Into<String>) -> Self {
        Self {
            store,
            output_bucket: output_bucket.into(),
            scratch_dir: None,
        }
    }

    /// Place scratch copies under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    fn scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("margin-page-");
        match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    /// Extract page `page` (1-indexed) of `source` into the job's page area
    ///
    /// The artifact is written to
    /// `{job_prefix}/pages/{page}/page/{page}.{ext}` in the output bucket.
    pub fn extract_page(
        &self,
        source: &ObjectLocation,
        job_prefix: &str,
        page: u32,
    ) -> Result<PageArtifact, ExtractError> {
        let bytes = self
            .store
            .get(&source.bucket, &source.key)
            .map_err(|e| ExtractError::Store(e.to_string()))?
            .ok_or_else(|| ExtractError::SourceMissing(source.to_string()))?;

        let format = DocumentFormat::detect(&bytes).map_err(ExtractError::UnsupportedFormat)?;
        debug!(source = %source, format = format.mime_type(), page, "extracting page");

        let scratch = self.scratch()?;
        let local = scratch
            .path()
            .join(format!("source.{}", format.extension()));
        std::fs::write(&local, &bytes)?;

        let single = match format {
            DocumentFormat::Png | DocumentFormat::Jpeg => bytes,
            DocumentFormat::Pdf => extract_pdf_page(&local, scratch.path(), page)?,
            DocumentFormat::Tiff => extract_tiff_frame(&local, page)?,
        };
        drop(scratch);

        let key = page_artifact_key(job_prefix, page, format.extension());
        self.store
            .put(&self.output_bucket, &key, &single, format.mime_type())
            .map_err(|e| ExtractError::Store(e.to_string()))?;

        let prefix = ObjectLocation::new(self.output_bucket.clone(), page_prefix(job_prefix, page));
        let artifact = ObjectLocation::new(self.output_bucket.clone(), key);
        info!(artifact = %artifact, "page artifact written");

        Ok(PageArtifact {
            source: format!(
                "Review document {} page number {}",
                source.file_name(),
                page
            ),
            file_extension: format!(".{}", format.extension()),
            input_prefix: prefix.to_string(),
            output_prefix: prefix.to_string(),
            artifact_uri: artifact.to_string(),
            page_number: page,
            page_count: 1,
        })
    }
}

/// Keep only `page` of the PDF at `path`
fn extract_pdf_page(path: &Path, scratch: &Path, page: u32) -> Result<Vec<u8>, ExtractError> {
    let mut doc = lopdf::Document::load(path)?;
    let pages = doc.get_pages();
    if !pages.contains_key(&page) {
        return Err(ExtractError::PageOutOfRange {
            page,
            available: pages.len() as u32,
        });
    }

    let others: Vec<u32> = pages.keys().copied().filter(|&n| n != page).collect();
    doc.delete_pages(&others);
    doc.prune_objects();

    let out = scratch.join(format!("{}.pdf", page));
    doc.save(&out)?;
    Ok(std::fs::read(&out)?)
}

/// Extract frame `page - 1` of the TIFF at `path` as a standalone TIFF.
///
/// 8 and 16 bit gray and RGB(A) frames are decoded and re-encoded. Every other
/// layout (bilevel, palette, CMYK, gray with alpha) keeps its encoded strips
/// or tiles, written out under the tags that describe them.
fn extract_tiff_frame(path: &Path, page: u32) -> Result<Vec<u8>, ExtractError> {
    use tiff::decoder::{Decoder, DecodingResult};
    use tiff::ColorType;

    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    for seen in 1..page {
        if !decoder.more_images() {
            return Err(ExtractError::PageOutOfRange {
                page,
                available: seen,
            });
        }
        decoder.next_image()?;
    }

    let (width, height) = decoder.dimensions()?;
    let color_type = match decoder.colortype() {
        Ok(
            color_type @ (ColorType::Gray(8 | 16) | ColorType::RGB(8 | 16) | ColorType::RGBA(8 | 16)),
        ) => color_type,
        other => {
            debug!(page, color_type = ?other.ok(), "copying TIFF frame without decoding");
            return copy_tiff_frame(&mut decoder, path);
        }
    };
    let mismatch = || ExtractError::Tiff(format!("frame buffer does not match {}x{}", width, height));

    let frame = match (decoder.read_image()?, color_type) {
        (DecodingResult::U8(data), ColorType::Gray(8)) => DynamicImage::ImageLuma8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (DecodingResult::U8(data), ColorType::RGB(8)) => DynamicImage::ImageRgb8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (DecodingResult::U8(data), ColorType::RGBA(8)) => DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (DecodingResult::U16(data), ColorType::Gray(16)) => DynamicImage::ImageLuma16(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (DecodingResult::U16(data), ColorType::RGB(16)) => DynamicImage::ImageRgb16(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (DecodingResult::U16(data), ColorType::RGBA(16)) => DynamicImage::ImageRgba16(
            ImageBuffer::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        _ => return Err(mismatch()),
    };

    let mut out = Cursor::new(Vec::new());
    frame.write_to(&mut out, ImageFormat::Tiff)?;
    Ok(out.into_inner())
}

/// SHORT-valued tags carried over with copied frame data
const COPIED_SHORT_TAGS: [tiff::tags::Tag; 11] = [
    tiff::tags::Tag::BitsPerSample,
    tiff::tags::Tag::Compression,
    tiff::tags::Tag::PhotometricInterpretation,
    tiff::tags::Tag::FillOrder,
    tiff::tags::Tag::SamplesPerPixel,
    tiff::tags::Tag::PlanarConfiguration,
    tiff::tags::Tag::ResolutionUnit,
    tiff::tags::Tag::Predictor,
    tiff::tags::Tag::ColorMap,
    tiff::tags::Tag::ExtraSamples,
    tiff::tags::Tag::SampleFormat,
];

/// LONG-valued tags carried over with copied frame data. 292 and 293 are the
/// CCITT T.4 and T.6 option words.
const COPIED_LONG_TAGS: [tiff::tags::Tag; 7] = [
    tiff::tags::Tag::ImageWidth,
    tiff::tags::Tag::ImageLength,
    tiff::tags::Tag::RowsPerStrip,
    tiff::tags::Tag::TileWidth,
    tiff::tags::Tag::TileLength,
    tiff::tags::Tag::Unknown(292),
    tiff::tags::Tag::Unknown(293),
];

/// Write the decoder's current frame to a new single-frame TIFF, copying its
/// encoded strips (or tiles) byte for byte
fn copy_tiff_frame<R: Read + Seek>(
    decoder: &mut tiff::decoder::Decoder<R>,
    path: &Path,
) -> Result<Vec<u8>, ExtractError> {
    use tiff::decoder::ifd::Value;
    use tiff::encoder::{Rational, TiffEncoder};
    use tiff::tags::Tag;

    let (offsets_tag, counts_tag) = if decoder.find_tag(Tag::TileOffsets)?.is_some() {
        (Tag::TileOffsets, Tag::TileByteCounts)
    } else {
        (Tag::StripOffsets, Tag::StripByteCounts)
    };
    let offsets = decoder.get_tag_u64_vec(offsets_tag)?;
    let counts = decoder.get_tag_u64_vec(counts_tag)?;
    if offsets.len() != counts.len() {
        return Err(ExtractError::Tiff(format!(
            "{} data offsets but {} byte counts",
            offsets.len(),
            counts.len()
        )));
    }

    let mut source = File::open(path)?;
    let mut order = [0u8; 2];
    source.read_exact(&mut order)?;
    let native = if cfg!(target_endian = "little") { b"II" } else { b"MM" };
    let widest = decoder
        .find_tag_unsigned_vec::<u16>(Tag::BitsPerSample)?
        .and_then(|bits| bits.into_iter().max())
        .unwrap_or(1);
    if widest > 8 && &order != native {
        return Err(ExtractError::Tiff(format!(
            "cannot copy {}-bit samples across byte orders",
            widest
        )));
    }

    let mut chunks = Vec::with_capacity(offsets.len());
    for (&offset, &count) in offsets.iter().zip(&counts) {
        source.seek(SeekFrom::Start(offset))?;
        let mut chunk = Vec::new();
        (&mut source).take(count).read_to_end(&mut chunk)?;
        if chunk.len() as u64 != count {
            return Err(ExtractError::Tiff(format!(
                "frame data at offset {} is truncated",
                offset
            )));
        }
        chunks.push(chunk);
    }

    let too_large = |_| ExtractError::Tiff("frame does not fit a 32-bit TIFF".to_string());
    let mut out = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut out)?;
        let mut dir = encoder.new_directory()?;

        let mut new_offsets = Vec::with_capacity(chunks.len());
        let mut new_counts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            new_offsets.push(u32::try_from(dir.write_data(chunk.as_slice())?).map_err(too_large)?);
            new_counts.push(u32::try_from(chunk.len()).map_err(too_large)?);
        }
        dir.write_tag(offsets_tag, new_offsets.as_slice())?;
        dir.write_tag(counts_tag, new_counts.as_slice())?;

        for tag in COPIED_SHORT_TAGS {
            if let Some(values) = decoder.find_tag_unsigned_vec::<u16>(tag)? {
                dir.write_tag(tag, values.as_slice())?;
            }
        }
        for tag in COPIED_LONG_TAGS {
            if let Some(values) = decoder.find_tag_unsigned_vec::<u32>(tag)? {
                dir.write_tag(tag, values.as_slice())?;
            }
        }
        for tag in [Tag::XResolution, Tag::YResolution] {
            if let Some(Value::Rational(n, d)) = decoder.find_tag(tag)? {
                dir.write_tag(tag, Rational { n, d })?;
            }
        }
        if let Some(tables) = decoder.find_tag(Tag::JPEGTables)? {
            dir.write_tag(Tag::JPEGTables, tables.into_u8_vec()?.as_slice())?;
        }

        dir.finish()?;
    }
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Test documents generated in memory

    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};
    use tiff::tags::Tag;

    /// A PDF whose page `n` draws the text `Page n`
    pub fn pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for n in 1..=pages {
            let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// A grayscale TIFF whose frame `i` is filled with the value `i * 40`
    pub fn tiff(frames: u8) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        for i in 0..frames {
            let data = vec![i.saturating_mul(40); 16 * 16];
            encoder
                .write_image::<colortype::Gray8>(16, 16, &data)
                .unwrap();
        }
        buffer.into_inner()
    }

    /// Packed rows of bilevel frame `i`: 16x4 pixels, two bytes per row
    pub fn bilevel_rows(i: u8) -> Vec<u8> {
        (0..4).flat_map(|row| [0x11 * (i + 1), row]).collect()
    }

    /// A 1-bit, white-is-zero TIFF (fax style) with `frames` frames
    pub fn bilevel_tiff(frames: u8) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        for i in 0..frames {
            let rows = bilevel_rows(i);
            let mut dir = encoder.new_directory().unwrap();
            let offset = dir.write_data(rows.as_slice()).unwrap() as u32;
            dir.write_tag(Tag::ImageWidth, 16u32).unwrap();
            dir.write_tag(Tag::ImageLength, 4u32).unwrap();
            dir.write_tag(Tag::BitsPerSample, 1u16).unwrap();
            dir.write_tag(Tag::Compression, 1u16).unwrap();
            dir.write_tag(Tag::PhotometricInterpretation, 0u16).unwrap();
            dir.write_tag(Tag::StripOffsets, offset).unwrap();
            dir.write_tag(Tag::SamplesPerPixel, 1u16).unwrap();
            dir.write_tag(Tag::RowsPerStrip, 4u32).unwrap();
            dir.write_tag(Tag::StripByteCounts, rows.len() as u32).unwrap();
            dir.finish().unwrap();
        }
        buffer.into_inner()
    }

    /// Color map of [`palette_tiff`]: entry `n` is gray level `n`
    pub fn color_map() -> Vec<u16> {
        let ramp: Vec<u16> = (0..256u16).map(|n| n * 257).collect();
        [ramp.as_slice(), ramp.as_slice(), ramp.as_slice()].concat()
    }

    /// A single 4x2 frame of 8-bit palette indices
    pub fn palette_tiff() -> Vec<u8> {
        let indices: Vec<u8> = (0..8).map(|n| n * 30).collect();
        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        let mut dir = encoder.new_directory().unwrap();
        let offset = dir.write_data(indices.as_slice()).unwrap() as u32;
        dir.write_tag(Tag::ImageWidth, 4u32).unwrap();
        dir.write_tag(Tag::ImageLength, 2u32).unwrap();
        dir.write_tag(Tag::BitsPerSample, 8u16).unwrap();
        dir.write_tag(Tag::PhotometricInterpretation, 3u16).unwrap();
        dir.write_tag(Tag::StripOffsets, offset).unwrap();
        dir.write_tag(Tag::RowsPerStrip, 2u32).unwrap();
        dir.write_tag(Tag::StripByteCounts, indices.len() as u32).unwrap();
        dir.write_tag(Tag::ColorMap, color_map().as_slice()).unwrap();
        dir.finish().unwrap();
        buffer.into_inner()
    }

    /// A small PNG
    pub fn png() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }
}
