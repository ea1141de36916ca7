//! Flowchart block extraction and rendering
//!
//! The model emits its step list as a JSON array under a `FLOWCHART_JSON`
//! heading, usually inside a ```` ```json ```` fence. Extraction finds that
//! block, parses it and reports the byte range it occupied so the caller can
//! put the rendered flowchart in its place.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::ops::Range;
use std::sync::LazyLock;

/// Shape of a flowchart box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Process,
    Decision,
}

/// One node of the extracted step list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStep {
    pub id: String,
    pub label: String,
    pub kind: StepKind,
    /// Id of the following step. Not used for layout.
    pub next: Option<String>,
}

/// What was found under the heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowchartBlock {
    Steps(Vec<FlowStep>),
    /// The block exists but could not be parsed
    Malformed(String),
}

#[derive(Debug)]
pub struct Extraction {
    pub block: FlowchartBlock,
    /// Bytes of the source text the block occupied
    pub span: Range<usize>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    label: Value,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    next: Value,
}

impl RawStep {
    fn into_step(self, index: usize) -> FlowStep {
        let kind = match self.kind.as_deref().map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case("decision") => StepKind::Decision,
            _ => StepKind::Process,
        };
        FlowStep {
            id: value_to_string(self.id).unwrap_or_else(|| (index + 1).to_string()),
            label: value_to_string(self.label).unwrap_or_default(),
            kind,
            next: value_to_string(self.next),
        }
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ {0,3}#{1,6}[ \t]+FLOWCHART_JSON(?:[ \t]+#+)?[ \t]*\r?$").unwrap());

/// Find and parse the flowchart block. `None` when the text has no
/// `FLOWCHART_JSON` heading.
///
/// The first heading followed by an array or a code fence wins. When no
/// heading is, the first one is reported as malformed.
pub fn extract_flowchart(text: &str) -> Option<Extraction> {
    let mut headings = HEADING.find_iter(text).peekable();
    let first = *headings.peek()?;

    let heading = headings
        .find(|h| {
            let next = &text[skip_whitespace(text, h.end())..];
            next.starts_with('[') || next.starts_with("```")
        })
        .unwrap_or(first);

    Some(extract_at(text, heading.start(), heading.end()))
}

fn extract_at(text: &str, start: usize, heading_end: usize) -> Extraction {
    let mut cursor = skip_whitespace(text, heading_end);
    let fenced = text[cursor..].starts_with("```");
    if fenced {
        cursor = line_end(text, cursor);
        cursor = skip_whitespace(text, cursor);
    }

    if !text[cursor..].starts_with('[') {
        // Heading without an array: drop the heading (and the fence opener)
        let end = if fenced { closing_fence_end(text, cursor).unwrap_or(cursor) } else { heading_end };
        return Extraction {
            block: FlowchartBlock::Malformed("JSON array not found".to_string()),
            span: start..end,
        };
    }

    let Some(array_end) = matching_bracket(text, cursor) else {
        let end = if fenced {
            closing_fence_end(text, cursor).unwrap_or(text.len())
        } else {
            paragraph_end(text, cursor)
        };
        return Extraction {
            block: FlowchartBlock::Malformed("unterminated JSON array".to_string()),
            span: start..end,
        };
    };

    let json = &text[cursor..array_end];
    let mut end = array_end;
    if fenced {
        let after = skip_whitespace(text, end);
        if text[after..].starts_with("```") {
            end = line_end(text, after);
        }
    }

    let block = match serde_json::from_str::<Vec<RawStep>>(json) {
        Ok(raw) => FlowchartBlock::Steps(
            raw.into_iter().enumerate().map(|(i, step)| step.into_step(i)).collect(),
        ),
        Err(e) => {
            tracing::warn!("Error parsing flowchart JSON: {}", e);
            FlowchartBlock::Malformed(e.to_string())
        }
    };

    Extraction {
        block,
        span: start..end,
    }
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .find(|c: char| !c.is_whitespace())
        .map_or(text.len(), |offset| from + offset)
}

/// Index just past the end of the line containing `from`
fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |offset| from + offset + 1)
}

fn paragraph_end(text: &str, from: usize) -> usize {
    text[from..].find("\n\n").map_or(text.len(), |offset| from + offset)
}

fn closing_fence_end(text: &str, from: usize) -> Option<usize> {
    let offset = text[from..].find("```")?;
    Some(line_end(text, from + offset))
}

/// Index just past the `]` closing the array opened at `open`, skipping
/// brackets inside JSON strings
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Minimal HTML escaping for text nodes and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Vertical stack of boxes joined by arrows, in list order
pub fn render_flowchart(steps: &[FlowStep]) -> String {
    let mut html = String::from("<div class=\"flowchart-container\">\n<h3>Fluxo do Processo</h3>\n");

    for (i, step) in steps.iter().enumerate() {
        if i > 0 {
            html.push_str("<div class=\"flow-arrow\">↓</div>\n");
        }
        let class = match step.kind {
            StepKind::Process => "flow-step",
            StepKind::Decision => "flow-step decision",
        };
        html.push_str(&format!("<div class=\"{}\">{}</div>\n", class, escape_html(&step.label)));
    }

    html.push_str("</div>");
    html
}

/// Marker shown where the flowchart would have been
pub fn render_flowchart_error(message: &str) -> String {
    format!(
        "<div class=\"error\">Erro ao gerar fluxograma: {}</div>",
        escape_html(message)
    )
}

pub fn render_block(block: &FlowchartBlock) -> String {
    match block {
        FlowchartBlock::Steps(steps) => render_flowchart(steps),
        FlowchartBlock::Malformed(message) => render_flowchart_error(message),
    }
}
