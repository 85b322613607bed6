//! Minimal sfnt (TrueType/OpenType) table plumbing: pulling one face out of a
//! collection and emptying the outlines of glyphs a document never shows.

use std::collections::BTreeSet;

use crate::font::FontLoadError;

const TTC_TAG: &[u8; 4] = b"ttcf";
const HEAD_CHECKSUM_ADJUSTMENT: usize = 8;
const HEAD_INDEX_TO_LOC_FORMAT: usize = 50;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

#[derive(Debug, Clone)]
struct Table {
    tag: [u8; 4],
    data: Vec<u8>,
}

/// An sfnt font program held as a list of owned tables.
#[derive(Debug, Clone)]
pub struct Sfnt {
    version: u32,
    tables: Vec<Table>,
}

fn malformed(what: &str) -> FontLoadError {
    FontLoadError::Malformed(what.to_string())
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, FontLoadError> {
    data.get(offset..offset + 2)
        .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
        .ok_or_else(|| malformed("unexpected end of font data"))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, FontLoadError> {
    data.get(offset..offset + 4)
        .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or_else(|| malformed("unexpected end of font data"))
}

impl Sfnt {
    /// Parses a standalone font, or face `index` of a collection.
    pub fn parse(data: &[u8], index: u32) -> Result<Self, FontLoadError> {
        let directory = if data.get(0..4) == Some(TTC_TAG.as_slice()) {
            let count = read_u32(data, 8)?;
            if index >= count {
                return Err(FontLoadError::IndexOutOfRange { index, count });
            }
            read_u32(data, 12 + 4 * index as usize)? as usize
        } else {
            0
        };
        let version = read_u32(data, directory)?;
        let num_tables = read_u16(data, directory + 4)? as usize;
        let mut tables = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let record = directory + 12 + i * 16;
            let tag_bytes = data
                .get(record..record + 4)
                .ok_or_else(|| malformed("truncated table directory"))?;
            let mut tag = [0u8; 4];
            tag.copy_from_slice(tag_bytes);
            let offset = read_u32(data, record + 8)? as usize;
            let length = read_u32(data, record + 12)? as usize;
            let body = data
                .get(offset..offset.saturating_add(length))
                .ok_or_else(|| malformed("table extends past end of file"))?;
            tables.push(Table {
                tag,
                data: body.to_vec(),
            });
        }
        tables.sort_by(|a, b| a.tag.cmp(&b.tag));
        Ok(Self { version, tables })
    }

    pub fn table(&self, tag: &[u8; 4]) -> Option<&[u8]> {
        self.tables
            .iter()
            .find(|table| &table.tag == tag)
            .map(|table| table.data.as_slice())
    }

    fn set_table(&mut self, tag: &[u8; 4], data: Vec<u8>) {
        match self.tables.iter_mut().find(|table| &table.tag == tag) {
            Some(table) => table.data = data,
            None => {
                self.tables.push(Table { tag: *tag, data });
                self.tables.sort_by(|a, b| a.tag.cmp(&b.tag));
            }
        }
    }

    fn glyph_offsets(&self) -> Result<Vec<usize>, FontLoadError> {
        let head = self.table(b"head").ok_or_else(|| malformed("missing head table"))?;
        let maxp = self.table(b"maxp").ok_or_else(|| malformed("missing maxp table"))?;
        let loca = self.table(b"loca").ok_or_else(|| malformed("missing loca table"))?;
        let long = read_u16(head, HEAD_INDEX_TO_LOC_FORMAT)? != 0;
        let glyph_count = read_u16(maxp, 4)? as usize;
        (0..=glyph_count)
            .map(|i| {
                if long {
                    read_u32(loca, i * 4).map(|v| v as usize)
                } else {
                    read_u16(loca, i * 2).map(|v| v as usize * 2)
                }
            })
            .collect()
    }

    /// Keeps outlines for `used` glyphs (plus `.notdef` and any composite
    /// components they reference) and empties every other glyph. Glyph ids are
    /// unchanged so the font's cmap stays valid.
    pub fn subset_glyphs(&mut self, used: &BTreeSet<u16>) -> Result<(), FontLoadError> {
        let offsets = self.glyph_offsets()?;
        let glyf = self
            .table(b"glyf")
            .ok_or_else(|| malformed("missing glyf table"))?;
        let glyph_count = offsets.len() - 1;
        let glyph = |id: usize| glyph_slice(glyf, &offsets, id);

        let mut keep: BTreeSet<u16> = BTreeSet::new();
        let mut pending: Vec<u16> = std::iter::once(0)
            .chain(used.iter().copied())
            .filter(|id| (*id as usize) < glyph_count)
            .collect();
        while let Some(id) = pending.pop() {
            if !keep.insert(id) {
                continue;
            }
            for component in composite_components(glyph(id as usize))? {
                if (component as usize) < glyph_count && !keep.contains(&component) {
                    pending.push(component);
                }
            }
        }

        let mut new_glyf = Vec::new();
        let mut new_loca = Vec::with_capacity((glyph_count + 1) * 4);
        for id in 0..glyph_count {
            new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());
            if keep.contains(&(id as u16)) {
                new_glyf.extend_from_slice(glyph(id));
                while new_glyf.len() % 4 != 0 {
                    new_glyf.push(0);
                }
            }
        }
        new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());

        let mut head = self
            .table(b"head")
            .ok_or_else(|| malformed("missing head table"))?
            .to_vec();
        if head.len() < HEAD_INDEX_TO_LOC_FORMAT + 2 {
            return Err(malformed("head table too short"));
        }
        head[HEAD_INDEX_TO_LOC_FORMAT..HEAD_INDEX_TO_LOC_FORMAT + 2]
            .copy_from_slice(&1u16.to_be_bytes());

        self.set_table(b"glyf", new_glyf);
        self.set_table(b"loca", new_loca);
        self.set_table(b"head", head);
        Ok(())
    }

    /// Serializes the tables with a fresh directory, checksums and
    /// `checkSumAdjustment`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_tables = self.tables.len() as u16;
        let mut entry_selector = 0u16;
        while (1u32 << (entry_selector + 1)) <= u32::from(num_tables) {
            entry_selector += 1;
        }
        let search_range = (1u16 << entry_selector) * 16;
        let range_shift = (num_tables * 16).saturating_sub(search_range);

        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&num_tables.to_be_bytes());
        out.extend_from_slice(&search_range.to_be_bytes());
        out.extend_from_slice(&entry_selector.to_be_bytes());
        out.extend_from_slice(&range_shift.to_be_bytes());

        let mut offset = 12 + 16 * self.tables.len();
        let mut head_offset = None;
        for table in &self.tables {
            let mut data = table.data.clone();
            if &table.tag == b"head" && data.len() >= HEAD_CHECKSUM_ADJUSTMENT + 4 {
                data[HEAD_CHECKSUM_ADJUSTMENT..HEAD_CHECKSUM_ADJUSTMENT + 4].fill(0);
                head_offset = Some(offset);
            }
            out.extend_from_slice(&table.tag);
            out.extend_from_slice(&checksum(&data).to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            offset += padded_len(data.len());
        }
        for table in &self.tables {
            let start = out.len();
            out.extend_from_slice(&table.data);
            if &table.tag == b"head" && table.data.len() >= HEAD_CHECKSUM_ADJUSTMENT + 4 {
                out[start + HEAD_CHECKSUM_ADJUSTMENT..start + HEAD_CHECKSUM_ADJUSTMENT + 4]
                    .fill(0);
            }
            out.resize(start + padded_len(table.data.len()), 0);
        }
        if let Some(head) = head_offset {
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&out));
            out[head + HEAD_CHECKSUM_ADJUSTMENT..head + HEAD_CHECKSUM_ADJUSTMENT + 4]
                .copy_from_slice(&adjustment.to_be_bytes());
        }
        out
    }
}

fn glyph_slice<'a>(glyf: &'a [u8], offsets: &[usize], id: usize) -> &'a [u8] {
    let start = offsets[id].min(glyf.len());
    let end = offsets[id + 1].clamp(start, glyf.len());
    &glyf[start..end]
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Glyph ids referenced by a composite glyph; empty for simple glyphs.
fn composite_components(glyph: &[u8]) -> Result<Vec<u16>, FontLoadError> {
    if glyph.len() < 10 {
        return Ok(Vec::new());
    }
    let contours = read_u16(glyph, 0)? as i16;
    if contours >= 0 {
        return Ok(Vec::new());
    }
    let mut components = Vec::new();
    let mut offset = 10;
    loop {
        let flags = read_u16(glyph, offset)?;
        components.push(read_u16(glyph, offset + 2)?);
        offset += 4;
        offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            offset += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            offset += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            offset += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(components)
}
