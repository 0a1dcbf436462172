//! Fonts for stamped text.
//!
//! [`FontAsset::Standard`] uses the built-in Helvetica with WinAnsi encoding
//! and needs no file, but it cannot show most Vietnamese letters.
//! [`FontAsset::TrueType`] embeds a TrueType font as a Type0 / CIDFontType2
//! font with Identity-H encoding and a ToUnicode CMap, so any glyph the font
//! has can be drawn and extracted again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::RenderError;

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const DEFAULT_WIDTH: u16 = 556;

/// A TrueType font file, loaded once and shared between renders.
#[derive(Debug)]
pub struct TrueTypeFont {
    data: Vec<u8>,
    base_font: String,
}

impl TrueTypeFont {
    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    fn face(&self) -> Result<ttf_parser::Face<'_>, RenderError> {
        ttf_parser::Face::parse(&self.data, 0).map_err(|e| RenderError::FontLoad(e.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub enum FontAsset {
    #[default]
    Standard,
    TrueType(Arc<TrueTypeFont>),
}

impl FontAsset {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path)
            .map_err(|e| RenderError::FontLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_ttf_bytes(data)
    }

    /// Validate and wrap TrueType font bytes.
    pub fn from_ttf_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| RenderError::FontLoad(e.to_string()))?;
        let base_font = face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|name| name.to_string())
            .map(|name| sanitize_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "AutolyEmbedded".to_string());
        if face.units_per_em() == 0 {
            return Err(RenderError::FontLoad("font has zero units per em".into()));
        }
        Ok(FontAsset::TrueType(Arc::new(TrueTypeFont { data, base_font })))
    }

    pub fn name(&self) -> &str {
        match self {
            FontAsset::Standard => "Helvetica",
            FontAsset::TrueType(font) => font.base_font(),
        }
    }

    /// Characters of `text` this font cannot draw, deduplicated and sorted.
    pub fn missing_chars(&self, text: &str) -> Vec<char> {
        let missing: BTreeSet<char> = match self {
            FontAsset::Standard => text.chars().filter(|c| win_ansi_byte(*c).is_none()).collect(),
            FontAsset::TrueType(font) => match font.face() {
                Ok(face) => text.chars().filter(|c| face.glyph_index(*c).is_none()).collect(),
                Err(_) => text.chars().collect(),
            },
        };
        missing.into_iter().collect()
    }

    /// Resolve glyphs for every character of `texts`, ready to encode and
    /// embed.
    pub(crate) fn prepare<'s, I>(&self, texts: I) -> Result<PreparedFont<'_>, RenderError>
    where
        I: IntoIterator<Item = &'s str>,
    {
        match self {
            FontAsset::Standard => Ok(PreparedFont::Standard),
            FontAsset::TrueType(font) => {
                let face = font.face()?;
                let units_per_em = f32::from(face.units_per_em());
                let mut glyphs = BTreeMap::new();
                for ch in texts.into_iter().flat_map(str::chars) {
                    if glyphs.contains_key(&ch) {
                        continue;
                    }
                    let glyph = face.glyph_index(ch).ok_or_else(|| RenderError::UnsupportedText {
                        field: String::new(),
                        font: font.base_font.clone(),
                        chars: ch.to_string(),
                    })?;
                    let advance = face.glyph_hor_advance(glyph).unwrap_or(0);
                    let width = (f32::from(advance) * 1000.0 / units_per_em).round() as u16;
                    glyphs.insert(ch, (glyph.0, width));
                }
                Ok(PreparedFont::TrueType {
                    font: font.as_ref(),
                    face,
                    glyphs,
                })
            }
        }
    }
}

/// PostScript names may only hold printable ASCII without delimiters.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect()
}

pub(crate) enum PreparedFont<'a> {
    Standard,
    TrueType {
        font: &'a TrueTypeFont,
        face: ttf_parser::Face<'a>,
        /// char -> (glyph id, advance in 1/1000 em)
        glyphs: BTreeMap<char, (u16, u16)>,
    },
}

impl PreparedFont<'_> {
    /// Width of `text` at `font_size`, in points.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = match self {
            PreparedFont::Standard => text.chars().map(|c| u32::from(helvetica_width(c))).sum(),
            PreparedFont::TrueType { glyphs, .. } => text
                .chars()
                .map(|c| glyphs.get(&c).map_or(0, |(_, w)| u32::from(*w)))
                .sum(),
        };
        units as f32 * font_size / 1000.0
    }

    /// The string operand for `Tj`.
    pub fn encode(&self, text: &str) -> Object {
        match self {
            PreparedFont::Standard => {
                let bytes = text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect();
                Object::String(bytes, StringFormat::Literal)
            }
            PreparedFont::TrueType { glyphs, .. } => {
                let bytes = text
                    .chars()
                    .flat_map(|c| glyphs.get(&c).map_or(0, |(g, _)| *g).to_be_bytes())
                    .collect();
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }

    /// Add the font objects to `doc` and return the font dictionary id.
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId, RenderError> {
        match self {
            PreparedFont::Standard => Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })),
            PreparedFont::TrueType { font, face, glyphs } => {
                Ok(embed_truetype(doc, font, face, glyphs))
            }
        }
    }
}

fn helvetica_width(c: char) -> u16 {
    match c as u32 {
        code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ => DEFAULT_WIDTH,
    }
}

/// WinAnsi code of `c`. Latin-1 maps straight through; 0x80..0xA0 holds
/// typographic punctuation instead of control codes.
fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn embed_truetype(
    doc: &mut Document,
    font: &TrueTypeFont,
    face: &ttf_parser::Face<'_>,
    glyphs: &BTreeMap<char, (u16, u16)>,
) -> ObjectId {
    let scale = 1000.0 / f32::from(face.units_per_em());
    let to_em = |v: i16| (f32::from(v) * scale).round() as i64;
    let bbox = face.global_bounding_box();
    let base_font = font.base_font.as_str();

    let mut file_stream = Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.clone(),
    );
    // Flate is deterministic; a failure only leaves the stream uncompressed.
    let _ = file_stream.compress();
    let file_id = doc.add_object(file_stream);

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_font.as_bytes().to_vec()),
        "Flags" => 32,
        "FontBBox" => vec![
            to_em(bbox.x_min).into(),
            to_em(bbox.y_min).into(),
            to_em(bbox.x_max).into(),
            to_em(bbox.y_max).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => to_em(face.ascender()),
        "Descent" => to_em(face.descender()),
        "CapHeight" => to_em(face.capital_height().unwrap_or(face.ascender())),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let by_glyph: BTreeMap<u16, (char, u16)> =
        glyphs.iter().map(|(c, (g, w))| (*g, (*c, *w))).collect();

    let widths: Vec<Object> = by_glyph
        .iter()
        .flat_map(|(g, (_, w))| {
            [
                Object::Integer(i64::from(*g)),
                Object::Array(vec![Object::Integer(i64::from(*w))]),
            ]
        })
        .collect();

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let cmap = to_unicode_cmap(by_glyph.iter().map(|(g, (c, _))| (*g, *c)));
    let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font_id.into()],
        "ToUnicode" => cmap_id,
    })
}

/// A ToUnicode CMap mapping two-byte glyph codes back to characters.
pub(crate) fn to_unicode_cmap(entries: impl Iterator<Item = (u16, char)>) -> String {
    let entries: Vec<(u16, char)> = entries.collect();
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    // At most 100 entries per bfchar block.
    for chunk in entries.chunks(100) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (glyph, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(out, "<{glyph:04X}> <{hex}>");
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}
