//! WinAnsi (Windows-1252) encoding for the standard PDF fonts.
//!
//! Encoding never fails: characters outside the code page are substituted
//! with `?` and typographic spaces collapse to a plain space. Control and
//! zero-width characters have no visible substitute and are dropped.
//!
//! Document-information strings use PDF text-string encoding instead; see
//! [`encode_text_string`].

/// Byte written in place of an unsupported character.
pub const REPLACEMENT: u8 = b'?';

/// Encodes `text` for a WinAnsiEncoding font.
pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars().filter_map(encode_char).collect()
}

/// Encodes one character, `None` when it must be omitted.
pub fn encode_char(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E => Some(code as u8),
        0x09 => Some(b' '),
        0x00..=0x1F | 0x7F..=0x9F => None,
        0xA0..=0xFF => Some(code as u8),
        // zero-width space, joiners, word joiner, byte-order mark
        0x200B..=0x200D | 0x2060 | 0xFEFF => None,
        _ => Some(cp1252_extra(c).unwrap_or(REPLACEMENT)),
    }
}

/// Encodes an info-dictionary string (`/Title`) as UTF-16BE with a leading
/// byte-order mark. WinAnsi bytes would be read as PDFDocEncoding there,
/// which disagrees in 0x80..=0x9F.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xFE, 0xFF]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Inverse of [`encode_text_string`].
#[cfg(test)]
pub fn decode_text_string(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Characters that live in the 0x80..=0x9F block of CP1252, plus a few
/// look-alikes that the generation backend produces in French output.
fn cp1252_extra(c: char) -> Option<u8> {
    let byte = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        // narrow no-break space, thin space and friends
        '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' => b' ',
        '\u{2010}' | '\u{2011}' | '\u{2212}' => b'-',
        '\u{2032}' => b'\'',
        '\u{2033}' => b'"',
        '\u{25AA}' | '\u{25CF}' | '\u{2023}' => 0x95,
        '\u{2192}' => b'>',
        _ => return None,
    };
    Some(byte)
}
