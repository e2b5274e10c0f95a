//! Business-name heuristics.

use super::labels::{find_block, find_near};
use super::patterns::{LEGAL_SUFFIX, NAME_LABEL_PREFIX, NAME_STOPLIST, UPPERCASE_RUN};

/// Whether `s` plausibly is a legal or trade name.
///
/// True for a legal-entity suffix (`S.A.`, `S.R.L.`, `S.A.S.`, ...) or a run
/// of three or more capitals, unless the text carries a field-label token
/// such as `CUIT`, `IVA` or `Domicilio`.
pub fn looks_like_business_name(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() || NAME_STOPLIST.is_match(s) {
        return false;
    }
    LEGAL_SUFFIX.is_match(s) || UPPERCASE_RUN.is_match(s)
}

/// Name candidate from a line, with any leading caption removed.
pub fn pick_name(line: &str) -> Option<String> {
    if NAME_STOPLIST.is_match(line) {
        return None;
    }
    let stripped = NAME_LABEL_PREFIX.replace(line, "");
    let name = stripped.trim().trim_end_matches([':', '-', ',']).trim();
    if name.chars().count() < 3 || name.chars().count() > 120 {
        return None;
    }
    looks_like_business_name(name).then(|| name.to_string())
}

/// Name near a caption, then inside a party block.
pub fn find_name(
    lines: &[String],
    labels: &[&str],
    block_anchors: &[&str],
    lookahead: usize,
) -> Option<String> {
    find_near(lines, labels, lookahead, pick_name).or_else(|| {
        find_block(lines, block_anchors, 6)?
            .iter()
            .find_map(|line| pick_name(line))
    })
}

/// First plausible name among the header lines.
pub fn header_name(lines: &[String], header_lines: usize) -> Option<String> {
    lines.iter().take(header_lines).find_map(|line| pick_name(line))
}
