//! Computed styles, style deltas and the inheritance fold.
//!
//! A [`Style`] is fully resolved: every field is a concrete value or absent.
//! A [`StyleDelta`] hangs off a markup node and holds one expression per
//! field; it is evaluated when the node is visited and folded over the
//! parent's style.

use bitflags::bitflags;

use crate::color::Color;
use crate::expr::{eval_expr, EvalContext, Expr};
use crate::value::Value;

bitflags! {
    /// The five boolean text decorations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Decoration: u8 {
        const BOLD          = 0b0000_0001;
        const ITALIC        = 0b0000_0010;
        const UNDERLINED    = 0b0000_0100;
        const STRIKETHROUGH = 0b0000_1000;
        const OBFUSCATED    = 0b0001_0000;
    }
}

impl Decoration {
    /// Flag for a single-letter code (`b i u s o`).
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'b' => Some(Self::BOLD),
            'i' => Some(Self::ITALIC),
            'u' => Some(Self::UNDERLINED),
            's' => Some(Self::STRIKETHROUGH),
            'o' => Some(Self::OBFUSCATED),
            _ => None,
        }
    }
}

/// Tri-state decoration set.
///
/// `set` records which flags carry a value at all; `on` records the value
/// for those flags.  A flag outside `set` is inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decorations {
    set: Decoration,
    on: Decoration,
}

impl Decorations {
    pub const NONE: Self = Self {
        set: Decoration::empty(),
        on: Decoration::empty(),
    };

    /// `Some(on)` if `flag` is set, else `None`.
    pub fn get(self, flag: Decoration) -> Option<bool> {
        self.set.contains(flag).then(|| self.on.contains(flag))
    }

    pub fn with(mut self, flag: Decoration, on: bool) -> Self {
        self.set |= flag;
        self.on.set(flag, on);
        self
    }

    pub fn is_empty(self) -> bool {
        self.set.is_empty()
    }

    /// Flags that are set and on.
    pub fn enabled(self) -> Decoration {
        self.set & self.on
    }

    /// Flags that are set and explicitly off.
    pub fn disabled(self) -> Decoration {
        self.set - self.on
    }

    /// `self` with every flag set in `over` replaced by `over`'s value.
    pub fn overlay(self, over: Self) -> Self {
        Self {
            set: self.set | over.set,
            on: (self.on - over.set) | (over.on & over.set),
        }
    }

    /// Flags of `self` whose state differs from `base`.
    pub fn diff(self, base: Self) -> Self {
        let mut out = Self::NONE;
        for flag in Decoration::all().iter() {
            if let Some(on) = self.get(flag) {
                if base.get(flag) != Some(on) {
                    out = out.with(flag, on);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickAction {
    OpenUrl,
    RunCommand,
    SuggestCommand,
    CopyToClipboard,
    ChangePage,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClickEvent {
    pub action: ClickAction,
    pub value: String,
}

/// A resolved style.  Absent fields are inherited from the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Style {
    pub color: Option<Color>,
    /// Shadow colour; its alpha channel carries the opacity.
    pub shadow: Option<Color>,
    pub font: Option<String>,
    pub decorations: Decorations,
    pub click: Option<ClickEvent>,
    pub hover: Option<String>,
    pub insertion: Option<String>,
}

impl Style {
    pub fn is_empty(&self) -> bool {
        *self == Style::default()
    }

    /// `self` overridden by every field present in `over`.
    pub fn merge(&self, over: &Style) -> Style {
        Style {
            color: over.color.or(self.color),
            shadow: over.shadow.or(self.shadow),
            font: over.font.clone().or_else(|| self.font.clone()),
            decorations: self.decorations.overlay(over.decorations),
            click: over.click.clone().or_else(|| self.click.clone()),
            hover: over.hover.clone().or_else(|| self.hover.clone()),
            insertion: over.insertion.clone().or_else(|| self.insertion.clone()),
        }
    }

    /// Fields of `self` that `base` does not already provide with the same
    /// value.
    pub fn diff(&self, base: &Style) -> Style {
        fn changed<T: PartialEq + Clone>(mine: &Option<T>, base: &Option<T>) -> Option<T> {
            match mine {
                Some(v) if base.as_ref() != Some(v) => Some(v.clone()),
                _ => None,
            }
        }
        Style {
            color: changed(&self.color, &base.color),
            shadow: changed(&self.shadow, &base.shadow),
            font: changed(&self.font, &base.font),
            decorations: self.decorations.diff(base.decorations),
            click: changed(&self.click, &base.click),
            hover: changed(&self.hover, &base.hover),
            insertion: changed(&self.insertion, &base.insertion),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_decoration(mut self, flag: Decoration, on: bool) -> Self {
        self.decorations = self.decorations.with(flag, on);
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }
}

// ── StyleDelta ────────────────────────────────────────────────────────────────

/// Per-node style, one expression per field.
///
/// Fields are evaluated at visit time, after the node's let-bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDelta {
    pub color: Option<Expr>,
    pub shadow: Option<Expr>,
    /// `0.0..=1.0`, default `1.0`.  Ignored without `shadow`.
    pub shadow_opacity: Option<Expr>,
    pub font: Option<Expr>,
    pub decorations: Vec<(Decoration, Expr)>,
    pub click: Option<(ClickAction, Expr)>,
    pub hover: Option<Expr>,
    pub insertion: Option<Expr>,
    /// Discard inherited fields before applying this delta.
    pub reset: bool,
}

impl StyleDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(mut self, e: Expr) -> Self {
        self.color = Some(e);
        self
    }

    pub fn shadow(mut self, color: Expr, opacity: Option<Expr>) -> Self {
        self.shadow = Some(color);
        self.shadow_opacity = opacity;
        self
    }

    pub fn font(mut self, e: Expr) -> Self {
        self.font = Some(e);
        self
    }

    pub fn decoration(mut self, flag: Decoration, e: Expr) -> Self {
        self.decorations.push((flag, e));
        self
    }

    pub fn click(mut self, action: ClickAction, e: Expr) -> Self {
        self.click = Some((action, e));
        self
    }

    pub fn hover(mut self, e: Expr) -> Self {
        self.hover = Some(e);
        self
    }

    pub fn insertion(mut self, e: Expr) -> Self {
        self.insertion = Some(e);
        self
    }

    pub fn reset(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Evaluate every present field.
    pub fn evaluate(&self, ctx: &dyn EvalContext) -> Style {
        let cx = ctx.coercion();
        let string = |e: &Expr| cx.as_str(&eval_expr(e, ctx));

        let shadow = self.shadow.as_ref().and_then(|e| {
            let color = to_color(&eval_expr(e, ctx), ctx)?;
            let opacity = self
                .shadow_opacity
                .as_ref()
                .map_or(1.0, |o| cx.as_float(&eval_expr(o, ctx)));
            let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
            Some(color.with_alpha(alpha))
        });

        let mut decorations = Decorations::NONE;
        for (flag, e) in &self.decorations {
            decorations = decorations.with(*flag, cx.as_bool(&eval_expr(e, ctx)));
        }

        Style {
            color: self.color.as_ref().and_then(|e| to_color(&eval_expr(e, ctx), ctx)),
            shadow,
            font: self.font.as_ref().map(string),
            decorations,
            click: self.click.as_ref().map(|(action, e)| ClickEvent {
                action: *action,
                value: string(e),
            }),
            hover: self.hover.as_ref().map(string),
            insertion: self.insertion.as_ref().map(string),
        }
    }

    /// Fold this delta over `parent`.  With `reset`, `root` replaces the
    /// inherited style.
    pub fn apply(&self, parent: &Style, root: &Style, ctx: &dyn EvalContext) -> Style {
        let own = self.evaluate(ctx);
        let inherited = if self.reset { root } else { parent };
        inherited.merge(&own)
    }
}

/// Integers are packed `0xRRGGBB`; anything else is parsed from its string
/// form.  Unparsable input is no colour.
fn to_color(v: &Value, ctx: &dyn EvalContext) -> Option<Color> {
    match v {
        Value::Null => None,
        Value::Int(n) => u32::try_from(*n).ok().map(Color::from_rgb),
        other => {
            let s = ctx.coercion().as_str(other);
            let color = Color::parse(&s);
            if color.is_none() {
                tracing::debug!(input = %s, "unrecognised colour");
            }
            color
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
