//! Label-anchored search over document lines.
//!
//! Labels are stored folded (lowercase, no diacritics) and compared against
//! folded lines, so `Fecha de Emisión`, `FECHA DE EMISION` and
//! `fecha de emision` all anchor the same search.

/// Issue-date captions.
pub const ISSUE_DATE_LABELS: &[&str] = &[
    "fecha de emision",
    "fecha emision",
    "f. emision",
    "emitida el",
    "emision",
    "fecha",
];

/// Payment due-date captions.
pub const DUE_DATE_LABELS: &[&str] = &[
    "fecha de vencimiento",
    "fecha vencimiento",
    "vencimiento",
    "fecha de vto",
    "f. vto",
    "vto",
    "vence",
];

/// Grand-total captions.
pub const TOTAL_LABELS: &[&str] = &[
    "importe total",
    "total a pagar",
    "total factura",
    "total final",
    "total a cobrar",
    "monto total",
    "total",
];

/// Captions that name the issuing party.
pub const ISSUER_NAME_LABELS: &[&str] = &[
    "razon social",
    "denominacion",
    "emisor",
    "proveedor",
];

/// Captions that name the receiving party.
pub const RECIPIENT_NAME_LABELS: &[&str] = &[
    "razon social",
    "denominacion",
    "apellido y nombre",
    "receptor",
    "cliente",
    "senor",
];

/// Section headers that open the issuer's block.
pub const ISSUER_BLOCK_ANCHORS: &[&str] = &["emisor", "proveedor", "vendedor"];

/// Section headers that open the recipient's block.
pub const RECIPIENT_BLOCK_ANCHORS: &[&str] = &["receptor", "cliente", "comprador", "senor"];

/// Lowercase and strip Spanish diacritics.
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Split text into trimmed, whitespace-collapsed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.split(|c: char| c.is_whitespace() || c.is_control())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Whether the folded line contains any of the folded labels.
pub fn has_label(line: &str, labels: &[&str]) -> bool {
    let folded = fold(line);
    labels.iter().any(|label| folded.contains(label))
}

/// Find a value near the first usable label occurrence.
///
/// Scans lines in order; on a line carrying any label, tries `extract` on
/// that line and then on each of the next `lookahead` lines. The first
/// non-`None` result wins, so document order beats match quality.
pub fn find_near<T, F>(lines: &[String], labels: &[&str], lookahead: usize, extract: F) -> Option<T>
where
    F: Fn(&str) -> Option<T>,
{
    for (i, line) in lines.iter().enumerate() {
        if !has_label(line, labels) {
            continue;
        }
        let end = (i + 1 + lookahead).min(lines.len());
        if let Some(value) = lines[i..end].iter().find_map(|l| extract(l)) {
            return Some(value);
        }
    }
    None
}

/// Lines following the first anchor line, up to `len` lines including it.
pub fn find_block<'a>(lines: &'a [String], anchors: &[&str], len: usize) -> Option<&'a [String]> {
    let start = lines.iter().position(|line| has_label(line, anchors))?;
    let end = (start + len).min(lines.len());
    Some(&lines[start..end])
}
