//! ANSI terminal backend.
//!
//! Renders [`Component`] trees to escape-coded text with crossterm styling.
//! Styles are resolved down the tree (each node's style merged over its
//! parent's) and every content leaf is written with its full effective
//! style, so output fragments can be concatenated freely.
//!
//! Side data (click, hover, insertion), shadows and fonts have no terminal
//! counterpart and are dropped.

use crossterm::style::{Attribute, Attributes, Color as TermColor, ContentStyle};

use crate::color::Color;
use crate::component::{Component, Content};
use crate::style::{Decoration, Style};

/// How colours reach the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// 24-bit `Rgb` escapes.
    #[default]
    TrueColor,
    /// Nearest of the 16 legacy colours.
    Legacy,
}

// ── Style → crossterm ─────────────────────────────────────────────────────────

/// Map a resolved [`Style`] to a crossterm [`ContentStyle`].
///
/// Only decorations that are explicitly on are set; an explicit off is the
/// terminal default once each leaf starts from a reset.
pub fn content_style(style: &Style, mode: ColorMode) -> ContentStyle {
    let mut out = ContentStyle::new();
    let mut attributes = Attributes::default();
    let on = style.decorations.enabled();

    if on.contains(Decoration::BOLD) {
        attributes.set(Attribute::Bold);
    }
    if on.contains(Decoration::ITALIC) {
        attributes.set(Attribute::Italic);
    }
    if on.contains(Decoration::UNDERLINED) {
        attributes.set(Attribute::Underlined);
    }
    if on.contains(Decoration::STRIKETHROUGH) {
        attributes.set(Attribute::CrossedOut);
    }
    if on.contains(Decoration::OBFUSCATED) {
        attributes.set(Attribute::SlowBlink);
    }
    out.attributes = attributes;

    if let Some(color) = style.color {
        out.foreground_color = Some(term_color(color, mode));
    }
    out
}

fn term_color(color: Color, mode: ColorMode) -> TermColor {
    match mode {
        ColorMode::TrueColor => TermColor::Rgb {
            r: color.red(),
            g: color.green(),
            b: color.blue(),
        },
        ColorMode::Legacy => legacy_color(color.nearest_legacy()),
    }
}

/// Palette index to the matching crossterm named colour.
fn legacy_color(idx: u8) -> TermColor {
    match idx {
        0 => TermColor::Black,
        1 => TermColor::DarkBlue,
        2 => TermColor::DarkGreen,
        3 => TermColor::DarkCyan,
        4 => TermColor::DarkRed,
        5 => TermColor::DarkMagenta,
        6 => TermColor::DarkYellow,
        7 => TermColor::Grey,
        8 => TermColor::DarkGrey,
        9 => TermColor::Blue,
        10 => TermColor::Green,
        11 => TermColor::Cyan,
        12 => TermColor::Red,
        13 => TermColor::Magenta,
        14 => TermColor::Yellow,
        _ => TermColor::White,
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Render one component tree.
pub fn render(component: &Component, mode: ColorMode) -> String {
    let mut out = String::new();
    write_component(&mut out, component, &Style::default(), mode);
    out
}

/// Render output entries, one per line.
pub fn render_lines(components: &[Component], mode: ColorMode) -> String {
    components
        .iter()
        .map(|c| render(c, mode))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_component(out: &mut String, component: &Component, parent: &Style, mode: ColorMode) {
    let style = parent.merge(&component.style);
    match &component.content {
        Content::Text(s) => write_styled(out, s, &style, mode),
        Content::Keybind(key) => write_styled(out, &format!("[{key}]"), &style, mode),
        Content::Translatable { key, fallback, args } => {
            write_styled(out, fallback.as_deref().unwrap_or(key), &style, mode);
            for arg in args {
                write_styled(out, " ", &style, mode);
                write_component(out, arg, &style, mode);
            }
        }
        Content::Score { name, objective } => {
            write_styled(out, &format!("{name}:{objective}"), &style, mode)
        }
        Content::Selector { pattern, .. } => write_styled(out, pattern, &style, mode),
        Content::Nbt { path, .. } => write_styled(out, path, &style, mode),
    }
    for child in &component.children {
        write_component(out, child, &style, mode);
    }
}

fn write_styled(out: &mut String, text: &str, style: &Style, mode: ColorMode) {
    use std::fmt::Write;

    if text.is_empty() {
        return;
    }
    let styled = content_style(style, mode).apply(text);
    // Writing into a String cannot fail.
    let _ = write!(out, "{styled}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
