//! HTML directory listings.

use std::fmt::Write;

use crate::files::encode_segment;
use crate::files::resolver::DirEntry;

/// Builds the absolute, percent-encoded URL path for `segments`.
///
/// The root is `/`; a directory path ends with `/` when `trailing_slash`
/// is set.
pub fn url_path(segments: &[String], trailing_slash: bool) -> String {
    let mut path = String::from("/");
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push('/');
        }
        path.push_str(&encode_segment(segment));
    }
    if trailing_slash && !segments.is_empty() {
        path.push('/');
    }
    path
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the listing page for the directory at `segments`.
///
/// Links are absolute so they work whether or not the request carried a
/// trailing slash. Subdirectories are shown with a trailing `/`.
pub fn render(segments: &[String], entries: &[DirEntry]) -> String {
    let display_path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    };
    let title = escape_html(&display_path);

    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Index of {}</title>", title);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>Index of {}</h1>", title);
    html.push_str("<hr>\n<ul>\n");

    if let Some((_, parent)) = segments.split_last() {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">../</a></li>",
            url_path(parent, true)
        );
    }

    let mut child = segments.to_vec();
    for entry in entries {
        child.push(entry.name.clone());
        let suffix = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}{}</a></li>",
            url_path(&child, entry.is_dir),
            escape_html(&entry.name),
            suffix
        );
        child.pop();
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}
