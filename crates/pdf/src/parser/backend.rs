use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{self, content::Content};

use crate::PdfError;

/// An object identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type ObjectId = (u32, u16);

pub type PageId = ObjectId;

/// A 2x3 affine matrix `[a, b, c, d, e, f]`, as taken by `cm` and `Tm`.
pub type Matrix = [f32; 6];

pub const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone, Default)]
pub struct BackendFontInfo {
    /// The resource key used by `Tf` (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// `BaseFont` from the font dictionary, if present.
    pub base_font: Option<String>,
    /// `Encoding` name from the font dictionary, if present.
    pub encoding: Option<String>,
    /// `Flags` from the font descriptor, if the font has one.
    pub descriptor_flags: Option<u32>,
}

/// Whose `Resources` dictionary names in a content stream resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOwner {
    Page(PageId),
    /// A Form XObject that carries its own `Resources`.
    Form(ObjectId),
}

/// A Form XObject painted with `Do`, decoded and ready to be walked.
#[derive(Debug, Clone)]
pub struct FormXObject {
    /// Where names used inside the form resolve. A form without its own
    /// `Resources` uses its caller's.
    pub owner: ResourceOwner,
    /// Form space to the caller's user space.
    pub matrix: Matrix,
    pub fonts: Vec<BackendFontInfo>,
    pub ops: Vec<ContentOp>,
}

/// A lopdf-independent PDF value, so the span extractor can be fed from a
/// mock backend in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// One content-stream operation.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Read an `f32` out of an `Integer` or `Real` operand.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// Stream objects keep their dictionary only.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(convert_dict(dict)),
        lopdf::Object::Stream(stream) => PdfValue::Dict(convert_dict(&stream.dict)),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

fn convert_dict(dict: &lopdf::Dictionary) -> Vec<(Vec<u8>, PdfValue)> {
    dict.iter()
        .map(|(k, v)| (k.clone(), convert_object(v)))
        .collect()
}

/// Best-effort decoding of raw PDF string bytes.
///
/// UTF-16BE with a BOM first, then UTF-8, then Latin-1 as the fallback.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let code_units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// The page decoder's view of a PDF library.
pub trait PdfBackend {
    /// 1-based page number to [`PageId`], in page order.
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Every font referenced by the page's resources.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError>;

    /// Raw content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;

    /// The Form XObject registered as `name` in `owner`'s resources.
    ///
    /// `Ok(None)` when the name is unknown or is not a form (an image, say);
    /// `Err` when the form exists but its content cannot be decoded.
    fn form_xobject(
        &self,
        owner: ResourceOwner,
        name: &[u8],
    ) -> Result<Option<FormXObject>, PdfError>;

    /// Decode the bytes of a text-showing operand, given the `Encoding` name
    /// of the current font.
    fn decode_text(&self, encoding: Option<&str>, bytes: &[u8]) -> String;
}

/// Parent hops followed when looking for inherited page resources.
const MAX_INHERITANCE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// [`PdfBackend`] backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Read and load a file. A missing or unreadable file is `Io`; bytes
    /// that do not parse as a PDF are `Open`.
    pub fn load_path(path: &Path) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::load_bytes(&bytes).map_err(|e| match e {
            PdfError::Open(msg) => PdfError::Open(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Open(e.to_string()))?;
        Self::checked(doc)
    }

    fn checked(doc: lopdf::Document) -> Result<Self, PdfError> {
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }
        Ok(Self { doc })
    }

    pub fn raw_doc(&self) -> &lopdf::Document {
        &self.doc
    }

    /// Text entries of the trailer's Info dictionary, keyed by name.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();

        let Ok(info_ref) = self.doc.trailer.get(b"Info") else {
            return meta;
        };
        let info_dict = match info_ref {
            lopdf::Object::Reference(id) => match self.doc.get_object(*id) {
                Ok(lopdf::Object::Dictionary(d)) => d,
                _ => return meta,
            },
            lopdf::Object::Dictionary(d) => d,
            _ => return meta,
        };

        for key in [&b"Title"[..], b"Author", b"Creator", b"Producer", b"Subject"] {
            let value = match info_dict.get(key) {
                Ok(lopdf::Object::String(bytes, _)) => decode_text_simple(bytes),
                Ok(lopdf::Object::Name(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                _ => continue,
            };
            meta.insert(String::from_utf8_lossy(key).into_owned(), value);
        }

        meta
    }

    /// The `Resources` of a page (inherited through `Parent` when the page
    /// has none) or of a form.
    fn resources(&self, owner: ResourceOwner) -> Option<&lopdf::Dictionary> {
        match owner {
            ResourceOwner::Page(id) => {
                let mut node = self.doc.get_object(id).ok()?.as_dict().ok()?;
                for _ in 0..MAX_INHERITANCE_DEPTH {
                    if let Ok(resources) = node.get(b"Resources") {
                        return self.resolve_dict(resources);
                    }
                    node = self.resolve_dict(node.get(b"Parent").ok()?)?;
                }
                None
            }
            ResourceOwner::Form(id) => {
                let stream = self.doc.get_object(id).ok()?.as_stream().ok()?;
                self.resolve_dict(stream.dict.get(b"Resources").ok()?)
            }
        }
    }

    fn font_info(&self, name: &[u8], font: &lopdf::Dictionary) -> BackendFontInfo {
        BackendFontInfo {
            name: name.to_vec(),
            base_font: name_entry(font, b"BaseFont"),
            encoding: name_entry(font, b"Encoding"),
            descriptor_flags: self.descriptor_flags(font),
        }
    }

    fn resource_fonts(&self, resources: &lopdf::Dictionary) -> Vec<BackendFontInfo> {
        let Some(fonts) = resources
            .get(b"Font")
            .ok()
            .and_then(|f| self.resolve_dict(f))
        else {
            return Vec::new();
        };
        fonts
            .iter()
            .filter_map(|(name, obj)| Some(self.font_info(name, self.resolve_dict(obj)?)))
            .collect()
    }

    /// `Flags` of the font descriptor referenced by a font dictionary.
    ///
    /// Type0 fonts keep their descriptor on the first descendant font.
    fn descriptor_flags(&self, font: &lopdf::Dictionary) -> Option<u32> {
        let descriptor = match font.get(b"FontDescriptor") {
            Ok(obj) => self.resolve_dict(obj)?,
            Err(_) => {
                let descendants = font.get(b"DescendantFonts").ok()?;
                let first: &lopdf::Object = match descendants {
                    lopdf::Object::Array(arr) => arr.first()?,
                    lopdf::Object::Reference(id) => {
                        self.doc.get_object(*id).ok()?.as_array().ok()?.first()?
                    }
                    _ => return None,
                };
                let descendant = self.resolve_dict(first)?;
                self.resolve_dict(descendant.get(b"FontDescriptor").ok()?)?
            }
        };
        let flags = descriptor.get(b"Flags").ok()?.as_i64().ok()?;
        u32::try_from(flags).ok()
    }

    fn resolve_dict<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Dictionary> {
        match obj {
            lopdf::Object::Dictionary(d) => Some(d),
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok(),
            _ => None,
        }
    }
}

fn name_entry(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
        let fonts_map = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page fonts: {}", e)))?;

        Ok(fonts_map
            .iter()
            .map(|(name, dict)| self.font_info(name, dict))
            .collect())
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn form_xobject(
        &self,
        owner: ResourceOwner,
        name: &[u8],
    ) -> Result<Option<FormXObject>, PdfError> {
        let Some(xobjects) = self
            .resources(owner)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| self.resolve_dict(x))
        else {
            return Ok(None);
        };
        let Ok(lopdf::Object::Reference(id)) = xobjects.get(name) else {
            return Ok(None);
        };
        let Ok(stream) = self.doc.get_object(*id).and_then(|o| o.as_stream()) else {
            return Ok(None);
        };
        if name_entry(&stream.dict, b"Subtype").as_deref() != Some("Form") {
            return Ok(None);
        }

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let ops = self.decode_content(&content)?;

        let matrix = match stream.dict.get(b"Matrix").map(convert_object) {
            Ok(PdfValue::Array(values)) => {
                let numbers: Vec<f32> = values.iter().filter_map(get_number_from_value).collect();
                Matrix::try_from(numbers).unwrap_or(IDENTITY_MATRIX)
            }
            _ => IDENTITY_MATRIX,
        };
        let owner = if stream.dict.has(b"Resources") {
            ResourceOwner::Form(*id)
        } else {
            owner
        };
        let fonts = match owner {
            ResourceOwner::Page(page) => self.page_fonts(page).unwrap_or_default(),
            ResourceOwner::Form(_) => self
                .resources(owner)
                .map(|r| self.resource_fonts(r))
                .unwrap_or_default(),
        };

        Ok(Some(FormXObject {
            owner,
            matrix,
            fonts,
            ops,
        }))
    }

    fn decode_text(&self, encoding: Option<&str>, bytes: &[u8]) -> String {
        // Identity-H/V fonts carry 2-byte codes that are usually Unicode.
        let identity = encoding.is_some_and(|enc| enc.contains("Identity"));
        if identity && bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&code_units);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }
}
