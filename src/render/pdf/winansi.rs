//! `WinAnsiEncoding` (Windows code page 1252), the single-byte encoding used
//! for the standard-14 fonts.

/// Code points for bytes 0x80..=0x9F; `None` marks undefined slots.
const HIGH_CONTROL_RANGE: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

const REPLACEMENT: u8 = b'?';

pub fn encode_char(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => HIGH_CONTROL_RANGE
            .iter()
            .position(|mapped| *mapped == Some(ch))
            .map(|index| 0x80 + index as u8),
    }
}

/// Encodes `text`, replacing characters outside the code page with `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|ch| *ch != '\n' && *ch != '\r')
        .map(|ch| if ch == '\t' { ' ' } else { ch })
        .map(|ch| encode_char(ch).unwrap_or(REPLACEMENT))
        .collect()
}

pub fn decode_byte(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(byte)),
        0x80..=0x9F => HIGH_CONTROL_RANGE[(byte - 0x80) as usize],
        _ => None,
    }
}
