//! PDF rendering with HTML fallback.
//!
//! The export builds an HTML document and hands it to the renderer port.
//! When rendering fails the HTML itself becomes the stored artifact, so a
//! broken renderer degrades the format, never the job.

use sentra_types::DataCategory;
use serde_json::Value;
use thiserror::Error;

/// Field count at which a record switches from a table row to a card.
/// Wide tables are unreadable in paged output.
const CARD_THRESHOLD: usize = 4;

/// PDF rendering error.
#[derive(Debug, Error)]
pub enum PdfRenderError {
    #[error("no PDF renderer configured")]
    Unavailable,
    #[error("render failed: {0}")]
    Failed(String),
}

/// Renderer port: HTML in, PDF bytes out.
pub trait PdfRenderer: Send + Sync {
    /// Render an HTML document to PDF bytes.
    fn render(&self, html: &str) -> Result<Vec<u8>, PdfRenderError>;
}

/// Renderer used when no engine is configured; every job falls back to
/// the HTML artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePdfRenderer;

impl PdfRenderer for UnavailablePdfRenderer {
    fn render(&self, _html: &str) -> Result<Vec<u8>, PdfRenderError> {
        Err(PdfRenderError::Unavailable)
    }
}

/// Build the export HTML document.
pub fn render_export_html(title: &str, categories: &[(DataCategory, Value)]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    html.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         h1 { border-bottom: 2px solid #333; }\n\
         h2 { margin-top: 1.5em; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         th, td { border: 1px solid #999; padding: 4px 8px; text-align: left; }\n\
         .card { border: 1px solid #999; margin: 0.5em 0; padding: 0.5em 1em; }\n\
         dt { font-weight: bold; }\n\
         dd { margin: 0 0 0.5em 0; }\n\
         </style>\n</head>\n<body>\n",
    );
    html.push_str(&format!("<h1>{}</h1>\n", escape(title)));

    for (category, value) in categories {
        html.push_str(&format!("<h2>{}</h2>\n", escape(category.title())));
        render_value(&mut html, value);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_value(html: &mut String, value: &Value) {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let field_count = items
                .iter()
                .filter_map(Value::as_object)
                .map(|o| o.len())
                .max()
                .unwrap_or(0);
            if field_count <= CARD_THRESHOLD {
                render_table(html, items);
            } else {
                for item in items {
                    render_card(html, item);
                }
            }
        }
        Value::Array(items) => {
            html.push_str("<ul>\n");
            for item in items {
                html.push_str("<li>");
                render_value(html, item);
                html.push_str("</li>\n");
            }
            html.push_str("</ul>\n");
        }
        Value::Object(map) => {
            if map.len() <= CARD_THRESHOLD {
                render_table(html, std::slice::from_ref(value));
            } else {
                render_card(html, value);
            }
        }
        scalar => {
            html.push_str(&format!("<p>{}</p>\n", escape(&scalar_text(scalar))));
        }
    }
}

fn render_table(html: &mut String, records: &[Value]) {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        if let Some(obj) = record.as_object() {
            for key in obj.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    html.push_str("<table>\n<tr>");
    for header in &headers {
        html.push_str(&format!("<th>{}</th>", escape(header)));
    }
    html.push_str("</tr>\n");

    for record in records {
        let obj = match record.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        html.push_str("<tr>");
        for header in &headers {
            html.push_str("<td>");
            match obj.get(header) {
                Some(nested @ (Value::Object(_) | Value::Array(_))) => render_value(html, nested),
                Some(scalar) => html.push_str(&escape(&scalar_text(scalar))),
                None => {}
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

fn render_card(html: &mut String, record: &Value) {
    let obj = match record.as_object() {
        Some(obj) => obj,
        None => return,
    };
    html.push_str("<div class=\"card\">\n<dl>\n");
    for (key, value) in obj {
        html.push_str(&format!("<dt>{}</dt>\n<dd>", escape(key)));
        match value {
            nested @ (Value::Object(_) | Value::Array(_)) => render_value(html, nested),
            scalar => html.push_str(&escape(&scalar_text(scalar))),
        }
        html.push_str("</dd>\n");
    }
    html.push_str("</dl>\n</div>\n");
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_narrow_records_render_as_table() {
        let categories = vec![(
            DataCategory::Purchases,
            json!([{"id": 1, "item": "book", "price": 10}]),
        )];
        let html = render_export_html("Export", &categories);
        assert!(html.contains("<table>"));
        assert!(!html.contains("class=\"card\""));
    }

    #[test]
    fn test_wide_records_render_as_cards() {
        let categories = vec![(
            DataCategory::Profile,
            json!([{
                "a": 1, "b": 2, "c": 3, "d": 4, "e": 5
            }]),
        )];
        let html = render_export_html("Export", &categories);
        assert!(html.contains("class=\"card\""));
        assert!(html.contains("<dt>e</dt>"));
    }

    #[test]
    fn test_nested_structures_recurse() {
        let categories = vec![(
            DataCategory::Account,
            json!({"settings": {"theme": "dark"}, "id": 7}),
        )];
        let html = render_export_html("Export", &categories);
        assert!(html.contains("theme"));
        assert!(html.contains("dark"));
    }

    #[test]
    fn test_html_is_escaped() {
        let categories = vec![(
            DataCategory::Biography,
            json!("<script>alert(1)</script>"),
        )];
        let html = render_export_html("Export", &categories);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_unavailable_renderer_errors() {
        assert!(matches!(
            UnavailablePdfRenderer.render("<html></html>"),
            Err(PdfRenderError::Unavailable)
        ));
    }
}
