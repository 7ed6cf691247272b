//! Build-failure page served in place of the application.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

const PLACEHOLDER: &str = "{{diagnostics}}";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Build Error</title>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <style>
      body { margin: 0; font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; background: #f4f4f5; color: #18181b; }
      header { background: #18181b; color: #fafafa; padding: 12px 24px; font-weight: 600; }
      main { max-width: 960px; margin: 32px auto; padding: 0 24px; }
      h1 { color: #b91c1c; font-size: 28px; }
      .diagnostics { background: #fee2e2; border: 1px solid #fca5a5; border-radius: 4px; padding: 16px; font-family: ui-monospace, Menlo, Consolas, monospace; font-size: 14px; line-height: 1.5; overflow-x: auto; }
    </style>
  </head>
  <body>
    <header>reload</header>
    <main>
      <h1>Build Failed</h1>
      <p class="diagnostics">
        {{diagnostics}}
      </p>
    </main>
  </body>
</html>
"#;

/// Escape text for inclusion in HTML body content.
///
/// NUL bytes become U+FFFD.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            '\0' => escaped.push('\u{FFFD}'),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escaped diagnostics with line breaks turned into `<br>`.
pub fn format_diagnostics(diagnostics: &str) -> String {
    escape_html(diagnostics).replace('\n', "<br>")
}

/// Full HTML document for the given build output.
pub fn render(diagnostics: &str) -> String {
    TEMPLATE.replacen(PLACEHOLDER, &format_diagnostics(diagnostics), 1)
}

/// The page as a `200 OK` HTML response.
pub fn error_page_response(diagnostics: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        render(diagnostics),
    )
        .into_response()
}
