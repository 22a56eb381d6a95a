//! Splits one streamed content blob into speakable prose and visual segments.
//!
//! Visual elements (HTML video/table/iframe/svg/img and markdown tables) are
//! always emitted whole, bounded exactly at their open/close tags.
mod html;
mod table;

pub use html::{HtmlVisualBlock, VisualKind, find_first_html_visual_block, find_unclosed_visual_start};
pub use table::{MarkdownTableBlock, escape_html, find_first_markdown_table, markdown_table_to_sandbox_html};

/// MarkdownFlow fences that delimit fixed output; never speakable on their own.
const FIXED_MARKERS: [&str; 2] = ["===", "!==="];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Sandbox,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub value: String,
}

impl Segment {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            value: value.into(),
        }
    }

    pub fn sandbox(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Sandbox,
            value: value.into(),
        }
    }

    pub fn markdown(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Markdown,
            value: value.into(),
        }
    }

    pub fn is_visual(&self) -> bool {
        self.kind != SegmentKind::Text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Html(VisualKind),
    MarkdownTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualBoundary {
    pub kind: BoundaryKind,
    pub start: usize,
    pub end: usize,
}

/// Earliest HTML visual or markdown table in `text`.
pub fn find_first_visual_boundary(text: &str) -> Option<VisualBoundary> {
    let html = find_first_html_visual_block(text).map(|block| VisualBoundary {
        kind: BoundaryKind::Html(block.kind),
        start: block.start,
        end: block.end,
    });
    let table = find_first_markdown_table(text).map(|block| VisualBoundary {
        kind: BoundaryKind::MarkdownTable,
        start: block.start,
        end: block.end,
    });
    match (html, table) {
        (Some(html), Some(table)) if table.start < html.start => Some(table),
        (Some(html), _) => Some(html),
        (None, table) => table,
    }
}

pub fn segment_content(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = raw;
    while let Some(boundary) = find_first_visual_boundary(rest) {
        let before = &rest[..boundary.start];
        if !is_fixed_marker_only(before) {
            push_prose(&mut segments, before);
        }
        segments.push(visual_segment(boundary.kind, &rest[boundary.start..boundary.end]));
        rest = &rest[boundary.end..];
    }
    push_prose(&mut segments, rest);
    segments
}

/// Splits a partially streamed blob into the prefix that can be segmented now
/// and the tail starting at a visual element that has not closed yet.
///
/// A trailing run of fixed markers is held back too: until the next chunk
/// arrives it is unknown whether the markers lead into a visual.
pub fn split_settled(raw: &str) -> (&str, &str) {
    let settled_end = find_unclosed_visual_start(raw).unwrap_or(raw.len());
    let settled = &raw[..settled_end];

    let mut tail_start = 0;
    while let Some(boundary) = find_first_visual_boundary(&settled[tail_start..]) {
        tail_start += boundary.end;
    }
    if is_fixed_marker_only(&settled[tail_start..]) {
        return raw.split_at(tail_start);
    }
    raw.split_at(settled_end)
}

/// The prose segments, in order. These are the spans TTS is generated for.
pub fn speakable_text(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter(|segment| segment.kind == SegmentKind::Text)
        .map(|segment| segment.value.clone())
        .collect()
}

fn visual_segment(kind: BoundaryKind, value: &str) -> Segment {
    match kind {
        // The sandbox renderer mounts a root element, so bare tables get one.
        BoundaryKind::Html(VisualKind::Table) => Segment::sandbox(format!("<div>{value}</div>")),
        BoundaryKind::Html(_) => Segment::sandbox(value),
        BoundaryKind::MarkdownTable => match markdown_table_to_sandbox_html(value) {
            Some(html) => Segment::sandbox(html),
            None => Segment::markdown(value),
        },
    }
}

fn push_prose(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::text(text));
    }
}

fn is_fixed_marker_only(text: &str) -> bool {
    let mut saw_marker = false;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !FIXED_MARKERS.contains(&line) {
            return false;
        }
        saw_marker = true;
    }
    saw_marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prose_is_one_text_segment() {
        assert_eq!(
            segment_content("  Photosynthesis turns light into sugar.\n"),
            vec![Segment::text("Photosynthesis turns light into sugar.")]
        );
        assert!(segment_content(" \n\t ").is_empty());
    }

    #[test]
    fn test_splits_around_html_visuals() {
        let raw = "Look at this:\n<video src=\"a.mp4\"></video>\nThen this <img src=\"b.png\"/> ends.";
        assert_eq!(
            segment_content(raw),
            vec![
                Segment::text("Look at this:"),
                Segment::sandbox("<video src=\"a.mp4\"></video>"),
                Segment::text("Then this"),
                Segment::sandbox("<img src=\"b.png\"/>"),
                Segment::text("ends."),
            ]
        );
    }

    #[test]
    fn test_bare_html_table_is_wrapped() {
        let segments = segment_content("<table><tr><td>1</td></tr></table>");
        assert_eq!(
            segments,
            vec![Segment::sandbox("<div><table><tr><td>1</td></tr></table></div>")]
        );
    }

    #[test]
    fn test_markdown_table_becomes_sandbox_html() {
        let raw = "Scores below.\n\n| Name | Age |\n| --- | --- |\n| Alice | 25 |\n\nThat is all.";
        let segments = segment_content(raw);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::text("Scores below."));
        assert_eq!(segments[1].kind, SegmentKind::Sandbox);
        assert!(segments[1].value.contains("<td>Alice</td>"));
        assert_eq!(segments[2], Segment::text("That is all."));
    }

    #[test]
    fn test_earlier_markdown_table_beats_later_html() {
        let raw = "a | b\n--- | ---\n1 | 2\n\n<svg></svg>";
        let segments = segment_content(raw);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].value.starts_with("<div><table>"));
        assert_eq!(segments[1], Segment::sandbox("<svg></svg>"));
    }

    #[test]
    fn test_fixed_marker_before_visual_is_dropped() {
        let raw = "===\n<svg><circle/></svg>\nExplained.";
        assert_eq!(
            segment_content(raw),
            vec![Segment::sandbox("<svg><circle/></svg>"), Segment::text("Explained.")]
        );

        // Markers mixed with real prose stay speakable.
        let raw = "Note\n===\n<svg></svg>";
        assert_eq!(segment_content(raw)[0], Segment::text("Note\n==="));
    }

    #[test]
    fn test_unclosed_visual_is_held_back() {
        let raw = "Intro text <video src=\"a.mp4\">";
        let (settled, pending) = split_settled(raw);
        assert_eq!(settled, "Intro text ");
        assert_eq!(pending, "<video src=\"a.mp4\">");
        assert_eq!(segment_content(settled), vec![Segment::text("Intro text")]);

        assert_eq!(split_settled("done <img src=\"x\"/>"), ("done <img src=\"x\"/>", ""));
    }

    #[test]
    fn test_trailing_fixed_marker_is_held_back() {
        assert_eq!(split_settled("===\n"), ("", "===\n"));
        assert_eq!(split_settled("<svg></svg>\n!===\n"), ("<svg></svg>", "\n!===\n"));

        // Once a visual follows, the marker is dropped and nothing speakable remains before it.
        let (settled, pending) = split_settled("===\n<svg></svg>Real prose.");
        assert_eq!(pending, "");
        assert_eq!(
            segment_content(settled),
            vec![Segment::sandbox("<svg></svg>"), Segment::text("Real prose.")]
        );

        // Prose that merely ends with a marker line still settles.
        assert_eq!(split_settled("Note\n==="), ("Note\n===", ""));
    }

    #[test]
    fn test_unrenderable_markdown_table_falls_back_to_markdown() {
        assert_eq!(
            visual_segment(BoundaryKind::MarkdownTable, "| a |"),
            Segment::markdown("| a |")
        );
        assert_eq!(visual_segment(BoundaryKind::MarkdownTable, ""), Segment::markdown(""));
    }

    #[test]
    fn test_speakable_text_lists_prose_only() {
        let segments = segment_content("One.<svg></svg>Two.");
        assert_eq!(speakable_text(&segments), vec!["One.".to_string(), "Two.".to_string()]);
    }
}
