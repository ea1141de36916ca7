//! HTML report rendering
//!
//! Turns the model's markdown answer into a styled, self-contained HTML page.
//! The `FLOWCHART_JSON` block is lifted out of the markdown, rendered as a
//! stack of boxes and put back where the block was.

pub mod flowchart;
pub mod template;

use chrono::{DateTime, Local};
use flowchart::{extract_flowchart, render_block, FlowStep, FlowchartBlock};
use pulldown_cmark::{html, Options, Parser};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stands in for the flowchart while the markdown is converted
const FLOWCHART_PLACEHOLDER: &str = "<!-- process-analyst:flowchart -->";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist report: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// The model's answer and the steps extracted from it
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub raw_text: String,
    pub extracted_steps: Vec<FlowStep>,
}

/// A report written to disk
#[derive(Debug, Clone)]
pub struct Report {
    pub path: PathBuf,
    pub html_content: String,
}

/// Body HTML of a report plus what was extracted on the way
pub fn render_body(raw_text: &str) -> (String, AnalysisResult) {
    let Some(extraction) = extract_flowchart(raw_text) else {
        let result = AnalysisResult {
            raw_text: raw_text.to_string(),
            extracted_steps: Vec::new(),
        };
        return (markdown_to_html(raw_text), result);
    };

    let markdown = format!(
        "{}\n\n{}\n\n{}",
        &raw_text[..extraction.span.start],
        FLOWCHART_PLACEHOLDER,
        &raw_text[extraction.span.end..]
    );
    let flowchart_html = render_block(&extraction.block);

    let mut body = markdown_to_html(&markdown);
    if body.contains(FLOWCHART_PLACEHOLDER) {
        body = body.replacen(FLOWCHART_PLACEHOLDER, &flowchart_html, 1);
    } else {
        // Block sat somewhere markdown does not pass raw HTML through
        body.push_str(&flowchart_html);
        body.push('\n');
    }

    let extracted_steps = match extraction.block {
        FlowchartBlock::Steps(steps) => steps,
        FlowchartBlock::Malformed(_) => Vec::new(),
    };

    (
        body,
        AnalysisResult {
            raw_text: raw_text.to_string(),
            extracted_steps,
        },
    )
}

/// CommonMark with tables
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// `Relatorio_Processo_<timestamp>.html`
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("Relatorio_Processo_{}.html", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// `dir/name`, or `dir/<stem>_N.<ext>` for the first N that is free
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    (1..)
        .map(|n| {
            if ext.is_empty() {
                dir.join(format!("{}_{}", stem, n))
            } else {
                dir.join(format!("{}_{}.{}", stem, n, ext))
            }
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Writes reports into one directory
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn render(&self, raw_text: &str) -> Result<Report, ReportError> {
        self.render_at(raw_text, Local::now())
    }

    /// Render and write the report as generated at `now`. The file appears
    /// under its final name only once it is complete.
    pub fn render_at(&self, raw_text: &str, now: DateTime<Local>) -> Result<Report, ReportError> {
        let (body, result) = render_body(raw_text);
        let html_content = template::report_document(&body, now);

        fs::create_dir_all(&self.output_dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        tmp.write_all(html_content.as_bytes())?;
        tmp.as_file().sync_all()?;

        let path = unique_path(&self.output_dir, &report_file_name(now));
        tmp.persist(&path)?;

        tracing::info!(
            "Report saved to {:?} ({} flowchart steps)",
            path,
            result.extracted_steps.len()
        );
        Ok(Report { path, html_content })
    }
}
