//! Markdown pipe tables: detection inside a larger text and rendering to
//! sandbox HTML.

/// Byte range of a markdown table block (`end` exclusive, without the
/// trailing newline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownTableBlock {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
            (true, true) => Align::Center,
            (true, false) => Align::Left,
            (false, true) => Align::Right,
            (false, false) => Align::None,
        }
    }

    fn style(self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("left"),
            Align::Center => Some("center"),
            Align::Right => Some("right"),
        }
    }
}

/// Finds the first header row + separator row + body rows block.
///
/// The block ends at the first blank line or the first line without a pipe.
pub fn find_first_markdown_table(text: &str) -> Option<MarkdownTableBlock> {
    let lines = line_spans(text);
    for i in 0..lines.len().saturating_sub(1) {
        let (start, header) = lines[i];
        if !is_header_row(header) || !is_separator_row(lines[i + 1].1) {
            continue;
        }
        let mut last = i + 1;
        for (j, (_, line)) in lines.iter().enumerate().skip(i + 2) {
            if line.trim().is_empty() || !line.contains('|') {
                break;
            }
            last = j;
        }
        let (last_start, last_line) = lines[last];
        return Some(MarkdownTableBlock {
            start,
            end: last_start + last_line.len(),
        });
    }
    None
}

/// Renders a markdown table as `<div><table>…</table></div>`.
///
/// Returns `None` for fewer than two lines, a missing pipe in either of the
/// first two lines, or a header without cells.
pub fn markdown_table_to_sandbox_html(markdown: &str) -> Option<String> {
    let lines: Vec<&str> = markdown.trim().lines().collect();
    if lines.len() < 2 || !lines[0].contains('|') || !lines[1].contains('|') {
        return None;
    }
    let header = split_row(lines[0]);
    if header.is_empty() {
        return None;
    }
    let aligns: Vec<Align> = split_row(lines[1]).into_iter().map(Align::parse).collect();
    let align_at = |index: usize| aligns.get(index).copied().unwrap_or(Align::None);

    let mut html = String::from("<div><table><thead><tr>");
    for (index, cell) in header.iter().enumerate() {
        push_cell(&mut html, "th", cell, align_at(index));
    }
    html.push_str("</tr></thead><tbody>");

    let body = lines[2..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_row(line))
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()));
    for cells in body {
        html.push_str("<tr>");
        for index in 0..header.len() {
            let cell = cells.get(index).copied().unwrap_or("");
            push_cell(&mut html, "td", cell, align_at(index));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    Some(html)
}

fn push_cell(html: &mut String, tag: &str, text: &str, align: Align) {
    match align.style() {
        Some(style) => html.push_str(&format!("<{tag} style=\"text-align: {style}\">")),
        None => html.push_str(&format!("<{tag}>")),
    }
    html.push_str(&escape_html(text));
    html.push_str(&format!("</{tag}>"));
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Trimmed cells of a pipe row, outer pipes removed. A row with no content
/// has no cells.
fn split_row(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split('|').map(str::trim).collect()
}

fn is_header_row(line: &str) -> bool {
    line.contains('|') && split_row(line).len() >= 2
}

fn is_separator_row(line: &str) -> bool {
    let cells = split_row(line);
    cells.len() >= 2 && cells.iter().all(|cell| is_separator_cell(cell))
}

/// `:?-{3,}:?` once whitespace is removed.
fn is_separator_cell(cell: &str) -> bool {
    let compact: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
    let body = compact.strip_prefix(':').unwrap_or(&compact);
    let body = body.strip_suffix(':').unwrap_or(body);
    body.len() >= 3 && body.bytes().all(|b| b == b'-')
}

/// Lines with their byte offsets, line terminators stripped.
fn line_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        spans.push((offset, line));
        offset += raw.len();
    }
    spans
}
