//! Locates the first self-contained HTML visual element in a text.
//!
//! Matching is ASCII case-insensitive and works on byte offsets. The earliest
//! opening tag decides the result: when it is not closed yet the scan reports
//! nothing, since the element is most likely still streaming in.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Video,
    Table,
    Iframe,
    Svg,
    Img,
}

impl VisualKind {
    pub const ALL: [VisualKind; 5] = [
        VisualKind::Video,
        VisualKind::Table,
        VisualKind::Iframe,
        VisualKind::Svg,
        VisualKind::Img,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            VisualKind::Video => "video",
            VisualKind::Table => "table",
            VisualKind::Iframe => "iframe",
            VisualKind::Svg => "svg",
            VisualKind::Img => "img",
        }
    }

    fn allows_self_closing(self) -> bool {
        matches!(self, VisualKind::Video | VisualKind::Iframe | VisualKind::Img)
    }
}

/// Byte range `start..end` of one visual element (`end` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HtmlVisualBlock {
    pub kind: VisualKind,
    pub start: usize,
    pub end: usize,
}

pub fn find_first_html_visual_block(text: &str) -> Option<HtmlVisualBlock> {
    let lower = text.to_ascii_lowercase();
    let (start, kind) = earliest_open_tag(&lower)?;
    let end = element_end(&lower, kind, start)?;
    Some(HtmlVisualBlock { kind, start, end })
}

/// Offset of a visual opening tag that has no end yet, if the earliest
/// candidate is one. Text from there on is not safe to segment.
pub fn find_unclosed_visual_start(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let (start, kind) = earliest_open_tag(&lower)?;
    match element_end(&lower, kind, start) {
        Some(_) => None,
        None => Some(start),
    }
}

fn earliest_open_tag(lower: &str) -> Option<(usize, VisualKind)> {
    let mut candidates: Vec<(usize, VisualKind)> = VisualKind::ALL
        .iter()
        .filter_map(|&kind| find_open_tag(lower, kind.tag(), 0).map(|start| (start, kind)))
        .collect();
    candidates.sort_by_key(|(start, _)| *start);
    candidates.into_iter().next()
}

/// Finds `<tag` followed by whitespace, `>`, `/` or the end of input.
fn find_open_tag(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let pattern = format!("<{tag}");
    let mut cursor = from;
    while let Some(offset) = lower[cursor..].find(&pattern) {
        let start = cursor + offset;
        let after = start + pattern.len();
        match lower.as_bytes().get(after) {
            None => return Some(start),
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            Some(_) => cursor = after,
        }
    }
    None
}

fn element_end(lower: &str, kind: VisualKind, start: usize) -> Option<usize> {
    let open_gt = start + lower[start..].find('>')?;
    if kind.allows_self_closing() && lower[start..open_gt].trim_end().ends_with('/') {
        return Some(open_gt + 1);
    }
    // An <img> without "/>" has no closing tag to wait for.
    if kind == VisualKind::Img {
        return None;
    }

    let tag = kind.tag();
    let closing = format!("</{tag}");
    let mut depth = 1usize;
    let mut cursor = open_gt + 1;
    loop {
        let close_start = cursor + lower[cursor..].find(&closing)?;
        if let Some(nested) = find_open_tag(lower, tag, cursor).filter(|&open| open < close_start) {
            depth += 1;
            cursor = nested + tag.len() + 1;
            continue;
        }
        let close_gt = close_start + lower[close_start..].find('>')?;
        depth -= 1;
        if depth == 0 {
            return Some(close_gt + 1);
        }
        cursor = close_gt + 1;
    }
}
