//! Post-processors applied, in declared `formats` order, to a fetched page.
//! Each is independent; the worker loop applies whichever the request asked
//! for. The markdown converter's overall shape (preprocess → convert →
//! postprocess) follows the teacher's markdown pipeline, simplified to a
//! single `htmd`-based pass since this crate does not own HTML rendering.

use htmd::HtmlToMarkdown;
use url::Url;

use crate::adapters::Llm;
use crate::domain::{ChangeStatus, ChangeTracking};
use crate::index::ResultIndex;

pub fn to_markdown(html: &str) -> anyhow::Result<String> {
    let converter = HtmlToMarkdown::builder().build();
    converter.convert(html).map_err(|e| anyhow::anyhow!("markdown conversion failed: {e}"))
}

#[must_use]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();
    let mut links = Vec::new();
    for fragment in html.split("href=\"").skip(1) {
        let Some(end) = fragment.find('"') else { continue };
        let raw = &fragment[..end];
        let absolute = match &base {
            Some(base) => base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        };
        if absolute.starts_with("http://") || absolute.starts_with("https://") {
            links.push(absolute);
        }
    }
    links
}

pub async fn run_json_extraction(
    llm: &dyn Llm,
    schema_or_prompt: &str,
    content: &str,
) -> Result<serde_json::Value, crate::adapters::LlmError> {
    llm.extract(schema_or_prompt, content).await
}

pub async fn run_summary(llm: &dyn Llm, content: &str) -> Result<String, crate::adapters::LlmError> {
    llm.summarize(content).await
}

/// Compares current markdown content against the most recently indexed
/// version for `(urlKey, tag)`; a `tag` partitions the comparison
/// namespace so independent change-tracking streams don't collide.
pub async fn run_change_tracking(
    index: &ResultIndex,
    url_key: &str,
    tag: Option<&str>,
    current_markdown: &str,
) -> anyhow::Result<ChangeTracking> {
    let namespaced_key = match tag {
        Some(tag) => format!("{url_key}#{tag}"),
        None => url_key.to_string(),
    };

    let previous = index.most_recent_for_change_tracking(&namespaced_key).await?;

    let status = match previous.as_ref().and_then(|d| d.formats.markdown.as_deref()) {
        None => ChangeStatus::New,
        Some(prev) if prev == current_markdown => ChangeStatus::Same,
        Some(_) => ChangeStatus::Changed,
    };

    let diff = match (&previous, status) {
        (Some(prev), ChangeStatus::Changed) => {
            prev.formats.markdown.as_deref().map(|prev_md| unified_diff(prev_md, current_markdown))
        }
        _ => None,
    };

    Ok(ChangeTracking {
        status,
        diff,
        json_diff: None,
        llm_diff: None,
    })
}

fn unified_diff(before: &str, after: &str) -> String {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = String::new();
    for line in &before_lines {
        if !after_lines.contains(line) {
            out.push_str("-");
            out.push_str(line);
            out.push('\n');
        }
    }
    for line in &after_lines {
        if !before_lines.contains(line) {
            out.push('+');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_absolute_and_relative_links() {
        let html = r#"<a href="/pricing">p</a><a href="https://other.com/x">x</a>"#;
        let links = extract_links(html, "https://example.com/start");
        assert!(links.contains(&"https://example.com/pricing".to_string()));
        assert!(links.contains(&"https://other.com/x".to_string()));
    }

    #[test]
    fn markdown_conversion_round_trips_text() {
        let md = to_markdown("<h1>Hi</h1><p>there</p>").unwrap();
        assert!(md.contains("Hi"));
        assert!(md.contains("there"));
    }
}
