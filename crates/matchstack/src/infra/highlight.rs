//! Syntax highlighting for decompiled DTA script, built on top of syntect.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SyntectStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxDefinition, SyntaxReference, SyntaxSet, SyntaxSetBuilder};

pub const DEFAULT_THEME: &str = "base16-ocean.dark";
pub const DTA_SYNTAX_NAME: &str = "DTA";

static DTA_SYNTAX: &str = include_str!("../../assets/syntaxes/dta.sublime-syntax");

static DEFAULT_ASSETS: Lazy<(Arc<SyntaxSet>, Arc<ThemeSet>)> = Lazy::new(|| {
    let mut builder = SyntaxSetBuilder::new();
    builder.add_plain_text_syntax();
    match SyntaxDefinition::load_from_str(DTA_SYNTAX, true, Some("dta")) {
        Ok(definition) => builder.add(definition),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load embedded DTA syntax");
        }
    }

    (Arc::new(builder.build()), Arc::new(ThemeSet::load_defaults()))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightAttributes {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightStyle {
    pub foreground: Option<RgbColor>,
    pub attributes: HighlightAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub content: String,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightLine {
    pub spans: Vec<HighlightSpan>,
}

impl HighlightLine {
    /// Concatenated span contents without styling.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.content.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    Highlighted,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    pub lines: Vec<HighlightLine>,
    pub language: Option<String>,
    pub theme: String,
    pub mode: HighlightMode,
}

impl HighlightResult {
    pub fn plain(lines: Vec<String>, theme: String) -> Self {
        HighlightResult {
            lines: lines
                .into_iter()
                .map(|line| HighlightLine {
                    spans: vec![HighlightSpan {
                        content: line,
                        style: HighlightStyle::default(),
                    }],
                })
                .collect(),
            language: None,
            theme,
            mode: HighlightMode::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    syntax_set: Arc<SyntaxSet>,
    theme_set: Arc<ThemeSet>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        let assets = &*DEFAULT_ASSETS;
        Self {
            syntax_set: Arc::clone(&assets.0),
            theme_set: Arc::clone(&assets.1),
        }
    }

    pub fn available_themes(&self) -> Vec<String> {
        let mut themes: Vec<_> = self.theme_set.themes.keys().cloned().collect();
        themes.sort();
        themes
    }

    /// Highlight consecutive script lines. Parser state carries across lines
    /// so multi-line strings and comments are coloured correctly.
    pub fn highlight(&self, lines: &[String], theme: &str) -> HighlightResult {
        let resolved_theme = self.resolve_theme(theme);
        let theme_name = resolved_theme.name.to_string();

        let Some(syntax) = self.syntax_set.find_syntax_by_name(DTA_SYNTAX_NAME) else {
            tracing::debug!("DTA syntax unavailable, rendering plain text");
            return HighlightResult::plain(lines.to_vec(), theme_name);
        };

        match self.highlight_with_syntax(lines, resolved_theme.theme, syntax) {
            Ok(highlighted) => HighlightResult {
                lines: highlighted,
                language: Some(syntax.name.clone()),
                theme: theme_name,
                mode: HighlightMode::Highlighted,
            },
            Err(err) => {
                tracing::warn!(error = %err, "highlight failed");
                HighlightResult::plain(lines.to_vec(), theme_name)
            }
        }
    }

    fn highlight_with_syntax(
        &self,
        lines: &[String],
        theme: &Theme,
        syntax: &SyntaxReference,
    ) -> Result<Vec<HighlightLine>> {
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut result = Vec::with_capacity(lines.len());
        for line in lines {
            // The syntax is compiled for newline-terminated input.
            let terminated = format!("{line}\n");
            let segments = highlighter.highlight_line(&terminated, &self.syntax_set)?;
            let spans = segments
                .into_iter()
                .filter_map(|(style, text)| {
                    let content = text.strip_suffix('\n').unwrap_or(text);
                    (!content.is_empty()).then(|| HighlightSpan {
                        content: content.to_string(),
                        style: convert_style(style),
                    })
                })
                .collect();
            result.push(HighlightLine { spans });
        }
        Ok(result)
    }

    fn resolve_theme<'a>(&'a self, requested: &'a str) -> ResolvedTheme<'a> {
        if let Some(theme) = self.theme_set.themes.get(requested) {
            return ResolvedTheme {
                name: Cow::Borrowed(requested),
                theme,
            };
        }

        if let Some(name) = self
            .theme_set
            .themes
            .keys()
            .find(|name| name.eq_ignore_ascii_case(requested))
            .cloned()
        {
            if let Some(theme) = self.theme_set.themes.get(&name) {
                return ResolvedTheme {
                    name: Cow::Owned(name),
                    theme,
                };
            }
        }

        let fallback_name = if self.theme_set.themes.contains_key(DEFAULT_THEME) {
            DEFAULT_THEME.to_string()
        } else {
            self.theme_set
                .themes
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_THEME.to_string())
        };

        let theme = self
            .theme_set
            .themes
            .get(&fallback_name)
            .expect("fallback theme must exist");

        tracing::warn!(
            requested,
            fallback = %fallback_name,
            available = %self.available_themes().join(", "),
            "theme not found"
        );

        ResolvedTheme {
            name: Cow::Owned(fallback_name),
            theme,
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedTheme<'a> {
    name: Cow<'a, str>,
    theme: &'a Theme,
}

fn convert_style(style: SyntectStyle) -> HighlightStyle {
    let attributes = HighlightAttributes {
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
        underline: style.font_style.contains(FontStyle::UNDERLINE),
    };

    HighlightStyle {
        foreground: convert_color(style.foreground),
        attributes,
    }
}

fn convert_color(color: syntect::highlighting::Color) -> Option<RgbColor> {
    if color.a == 0 {
        None
    } else {
        Some(RgbColor {
            r: color.r,
            g: color.g,
            b: color.b,
        })
    }
}
