//! Console rendering of the context window around a located node.

use std::io::{self, Write};

use crossterm::style::{Attribute, Color, ContentStyle, Stylize};

use crate::app::locate::strip_marker;
use crate::domain::model::{AnnotatedText, ContextSize, ContextWindow, NodeMatch, TargetId};
use crate::infra::highlight::{
    DEFAULT_THEME, HighlightLine, HighlightMode, HighlightResult, Highlighter,
};

const TARGET_GUTTER: &str = "==>";
const BLANK_GUTTER: &str = "   ";
const BLANK_ID_FIELD: &str = "     ";

/// Runtime options controlling how the window is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub size: ContextSize,
    pub theme: String,
    pub color: bool,
    pub fold_braces: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: ContextSize::default(),
            theme: DEFAULT_THEME.to_owned(),
            color: false,
            fold_braces: true,
        }
    }
}

/// One printed row, after marker stripping and brace folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub is_target: bool,
    pub marker: Option<u32>,
    pub code: String,
}

/// Turn the lines of `window` into printable rows.
///
/// With `fold_braces`, a lone `{` followed by a line holding only a marker
/// becomes a single row carrying that marker, and a following single bare
/// token (typically the form's head such as `if`) is appended to it.
pub fn build_rows(lines: &[String], window: &ContextWindow, fold_braces: bool) -> Vec<Row> {
    let end = window.range.end.min(lines.len());
    let mut rows = Vec::with_capacity(window.len());
    let mut index = window.range.start;

    while index < end {
        let raw = &lines[index];
        let (marker, code) = strip_marker(raw);
        let is_target = index == window.target;

        if fold_braces && code.trim() == "{" && index + 1 < end {
            let (next_marker, next_code) = strip_marker(&lines[index + 1]);
            if let (Some(next_marker), true) = (next_marker, next_code.trim().is_empty()) {
                let indent = &raw[..raw.len() - raw.trim_start().len()];
                let mut folded = Row {
                    is_target: is_target || index + 1 == window.target,
                    marker: Some(next_marker),
                    code: format!("{indent}{{"),
                };
                index += 2;

                if index < end {
                    let (head_marker, head_code) = strip_marker(&lines[index]);
                    let mut tokens = head_code.split_whitespace();
                    if let (None, Some(token), None) = (head_marker, tokens.next(), tokens.next())
                    {
                        folded.code.push_str(token);
                        folded.is_target |= index == window.target;
                        index += 1;
                    }
                }

                rows.push(folded);
                continue;
            }
        }

        rows.push(Row {
            is_target,
            marker,
            code,
        });
        index += 1;
    }

    rows
}

/// Prints the highlighted context window for a located node.
#[derive(Debug, Default)]
pub struct ContextRenderer {
    highlighter: Highlighter,
}

impl ContextRenderer {
    pub fn new() -> Self {
        Self {
            highlighter: Highlighter::new(),
        }
    }

    /// Render the window around `found` to `out` and return the window that
    /// was printed.
    pub fn render<W: Write>(
        &self,
        out: &mut W,
        source_name: &str,
        text: &AnnotatedText,
        found: &NodeMatch,
        target: TargetId,
        options: &RenderOptions,
    ) -> io::Result<ContextWindow> {
        let window = ContextWindow::around(found.line_index, text.len(), options.size);
        let mut rows = build_rows(text.lines(), &window, options.fold_braces);
        // A line can carry several labels; show the one that matched.
        for row in rows.iter_mut().filter(|row| row.is_target) {
            row.marker = Some(found.marker);
        }

        let codes: Vec<String> = rows.iter().map(|row| row.code.clone()).collect();
        let highlighted = if options.color {
            self.highlighter.highlight(&codes, &options.theme)
        } else {
            HighlightResult::plain(codes, options.theme.clone())
        };

        let painter = Painter {
            enabled: options.color,
        };
        let header = format!("Snippet from {source_name} (target id: {target})");
        let border = format!("+{}+", "-".repeat(header.chars().count() + 4));

        writeln!(out, "{}", painter.paint(&border, Color::Blue))?;
        writeln!(out, "|  {}  |", painter.paint(&header, Color::Blue))?;
        writeln!(out, "{}", painter.paint(&border, Color::Blue))?;

        for (row, line) in rows.iter().zip(&highlighted.lines) {
            let gutter = if row.is_target {
                painter.paint(TARGET_GUTTER, Color::Red)
            } else {
                BLANK_GUTTER.to_owned()
            };
            let id_field = match row.marker {
                Some(marker) => painter.paint(&format!("{marker:>4}:"), Color::Green),
                None => BLANK_ID_FIELD.to_owned(),
            };
            let code = match highlighted.mode {
                HighlightMode::Highlighted if painter.enabled => {
                    paint_line(line, row.is_target)
                }
                _ => line.text(),
            };
            writeln!(out, "{gutter}{id_field}{code}")?;
        }

        writeln!(out, "{}", painter.paint(&border, Color::Blue))?;

        tracing::debug!(
            start = window.range.start + 1,
            end = window.range.end,
            rows = rows.len(),
            language = highlighted.language.as_deref().unwrap_or("plain"),
            theme = %highlighted.theme,
            "rendered context"
        );
        Ok(window)
    }
}

struct Painter {
    enabled: bool,
}

impl Painter {
    fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_owned()
        }
    }
}

fn paint_line(line: &HighlightLine, emphasize: bool) -> String {
    line.spans
        .iter()
        .map(|span| {
            let mut style = ContentStyle::new();
            style.foreground_color = span.style.foreground.map(|rgb| Color::Rgb {
                r: rgb.r,
                g: rgb.g,
                b: rgb.b,
            });
            if span.style.attributes.bold || emphasize {
                style.attributes.set(Attribute::Bold);
            }
            if span.style.attributes.italic {
                style.attributes.set(Attribute::Italic);
            }
            if span.style.attributes.underline {
                style.attributes.set(Attribute::Underlined);
            }
            style.apply(span.content.as_str()).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::locate::NodeLocator;

    const SAMPLE: &str = "\
(song_select_panel /* ID: 0 */
   (focus /* ID: 1 */ play_button)
   (enter
      {
         /* ID: 41 */
         if
         {== $mode 1}
         {print \"ready\"} /* ID: 42 */
      }
   )
)";

    fn window_for(text: &AnnotatedText, target: usize, size: ContextSize) -> ContextWindow {
        ContextWindow::around(target, text.len(), size)
    }

    fn render_plain(text: &AnnotatedText, target: TargetId, options: &RenderOptions) -> String {
        let found = NodeLocator::default().locate(text, target).expect("located");
        let mut out = Vec::new();
        ContextRenderer::new()
            .render(&mut out, "menu.dta", text, &found, target, options)
            .expect("render");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn folds_brace_marker_and_head() {
        let text = AnnotatedText::from_text(SAMPLE);
        let window = window_for(&text, 4, ContextSize::default());
        let rows = build_rows(text.lines(), &window, true);

        assert_eq!(rows.len(), 9);
        assert_eq!(
            rows[3],
            Row {
                is_target: true,
                marker: Some(41),
                code: "      {if".into(),
            }
        );
        assert_eq!(rows[4].code, "         {== $mode 1}");
        assert_eq!(rows[5].marker, Some(42));
        assert_eq!(rows[5].code, "         {print \"ready\"}");
        assert_eq!(rows.iter().filter(|row| row.is_target).count(), 1);
    }

    #[test]
    fn folding_can_be_disabled() {
        let text = AnnotatedText::from_text(SAMPLE);
        let window = window_for(&text, 4, ContextSize::default());
        let rows = build_rows(text.lines(), &window, false);

        assert_eq!(rows.len(), text.len());
        assert_eq!(rows[4].marker, Some(41));
        assert_eq!(rows[4].code, "");
        assert!(rows[4].is_target);
    }

    #[test]
    fn brace_at_window_end_is_not_folded() {
        let text = AnnotatedText::from_text(SAMPLE);
        let window = ContextWindow {
            range: 0..4,
            target: 1,
        };
        let rows = build_rows(text.lines(), &window, true);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].code, "      {");
        assert_eq!(rows[3].marker, None);
    }

    #[test]
    fn plain_render_marks_target_row() {
        let text = AnnotatedText::from_text(SAMPLE);
        let output = render_plain(&text, 42, &RenderOptions::default());

        assert!(output.contains("|  Snippet from menu.dta (target id: 42)  |"));
        assert!(output.contains("==>  41:      {if"));
        assert!(output.contains("     42:         {print \"ready\"}"));
        assert!(!output.contains('\u{1b}'));
        assert!(!output.contains("/*"));
    }

    #[test]
    fn shared_line_shows_matched_label() {
        let text = AnnotatedText::from_text("(outer)\n   {set $x {+ $y 1 /* ID: 6 */} /* ID: 7 */}");
        let output = render_plain(&text, 8, &RenderOptions::default());
        assert!(output.contains("==>   7:   {set $x {+ $y 1 } }"));
    }

    #[test]
    fn window_is_clamped_near_document_edges() {
        let text = AnnotatedText::from_text(SAMPLE);
        let options = RenderOptions {
            size: ContextSize {
                before: 3,
                after: 3,
            },
            fold_braces: false,
            ..RenderOptions::default()
        };
        let output = render_plain(&text, 1, &options);

        // header (3) + rows + closing border
        let rows = output.lines().count() - 4;
        assert_eq!(rows, 4);
        assert!(output.lines().nth(3).is_some_and(|line| line.starts_with("==>   0:")));
    }

    #[test]
    fn colored_render_keeps_layout() {
        let text = AnnotatedText::from_text(SAMPLE);
        let options = RenderOptions {
            color: true,
            ..RenderOptions::default()
        };
        let output = render_plain(&text, 42, &options);
        let plain = render_plain(&text, 42, &RenderOptions::default());
        assert_eq!(output.lines().count(), plain.lines().count());
    }
}
