//! Structural extraction from untrusted HTML.
//!
//! Script/style/nav/footer/header/aside/form elements are detached before
//! any text is read — they are always noise, never content. Body text
//! prefers paragraph elements; pages without qualifying paragraphs fall
//! back to all text of the best content container (article → main → body).

use scraper::{ElementRef, Html, Selector};

use crate::config::Limits;
use crate::text::{clip_chars, collapse_newlines};

pub(super) struct ExtractedPage {
    pub title: String,
    pub meta_description: String,
    /// Level-prefixed headings (`[H2] Watering schedule`), document order.
    pub headings: Vec<String>,
    pub body: String,
}

pub(super) fn extract_page(html: &str, limits: &Limits) -> ExtractedPage {
    let mut doc = Html::parse_document(html);
    strip_noise(&mut doc);

    let title = first_text(&doc, "title");
    let meta_description = meta_description(&doc);
    let headings = collect_headings(&doc, limits.max_headings);

    let body = body_text(&doc, limits.min_paragraph_chars);
    let body = collapse_newlines(&body);
    let body = clip_chars(&body, limits.page_content_chars).to_string();

    ExtractedPage {
        title,
        meta_description,
        headings,
        body,
    }
}

/// Title plus whole-page text, one line per text node. Used for saved
/// web-page snapshots, where structure does not matter but coverage does.
pub(super) fn extract_full_text(html: &str) -> (String, String) {
    let mut doc = Html::parse_document(html);
    strip_noise(&mut doc);

    let title = first_text(&doc, "title");

    let lines: Vec<&str> = doc
        .root_element()
        .text()
        .flat_map(|t| t.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    (title, lines.join("\n"))
}

fn strip_noise(doc: &mut Html) {
    let noise =
        Selector::parse("script, style, nav, footer, header, aside, form").expect("static selector");
    let ids: Vec<_> = doc.select(&noise).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn first_text(doc: &Html, selector: &str) -> String {
    let sel = Selector::parse(selector).expect("static selector");
    doc.select(&sel)
        .next()
        .map(|el| element_text(el))
        .unwrap_or_default()
}

fn meta_description(doc: &Html) -> String {
    let sel = Selector::parse(r#"meta[name="description"]"#).expect("static selector");
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn collect_headings(doc: &Html, max: usize) -> Vec<String> {
    let sel = Selector::parse("h1, h2, h3").expect("static selector");
    let mut headings = Vec::new();
    for el in doc.select(&sel) {
        let text = element_text(el);
        if text.chars().count() > 2 {
            let level = el.value().name().to_uppercase();
            headings.push(format!("[{level}] {text}"));
        }
        if headings.len() >= max {
            break;
        }
    }
    headings
}

fn body_text(doc: &Html, min_paragraph_chars: usize) -> String {
    let container_sel = Selector::parse("article, main, body").expect("static selector");

    // Selector matches are in tree order, so pick the preferred container
    // explicitly rather than taking the first match.
    let mut article = None;
    let mut main = None;
    let mut body = None;
    for el in doc.select(&container_sel) {
        match el.value().name() {
            "article" if article.is_none() => article = Some(el),
            "main" if main.is_none() => main = Some(el),
            "body" if body.is_none() => body = Some(el),
            _ => {}
        }
    }
    let Some(container) = article.or(main).or(body) else {
        return String::new();
    };

    let p_sel = Selector::parse("p").expect("static selector");
    let paragraphs: Vec<String> = container
        .select(&p_sel)
        .map(element_text)
        .filter(|t| t.chars().count() > min_paragraph_chars)
        .collect();

    if !paragraphs.is_empty() {
        return paragraphs.join("\n");
    }

    let lines: Vec<&str> = container
        .text()
        .flat_map(|t| t.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join("\n")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
