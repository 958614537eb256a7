//! Component construction interface.
//!
//! The renderer never builds platform objects itself; it asks a
//! [`ComponentFactory`].  [`TreeFactory`] is the in-crate implementation,
//! producing a plain [`Component`] tree that the [`ansi`](crate::ansi)
//! backend and the tests consume.

use crate::markup::NbtSource;
use crate::style::Style;

pub trait ComponentFactory {
    type Component;

    fn text(&self, content: &str) -> Self::Component;

    fn keybind(&self, key: &str) -> Self::Component;

    fn translatable(
        &self,
        key: &str,
        fallback: Option<&str>,
        args: Vec<Self::Component>,
    ) -> Self::Component;

    fn score(&self, name: &str, objective: &str) -> Self::Component;

    fn selector(&self, pattern: &str, separator: Option<&str>) -> Self::Component;

    fn nbt(
        &self,
        path: &str,
        source: &NbtSource,
        interpret: bool,
        separator: Option<&str>,
    ) -> Self::Component;

    /// Apply every present field of `style`, including side data.
    fn apply_style(&self, component: &mut Self::Component, style: &Style);

    fn append_children(&self, component: &mut Self::Component, children: Vec<Self::Component>);
}

// ── Component tree ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Keybind(String),
    Translatable {
        key: String,
        fallback: Option<String>,
        args: Vec<Component>,
    },
    Score {
        name: String,
        objective: String,
    },
    Selector {
        pattern: String,
        separator: Option<String>,
    },
    Nbt {
        path: String,
        source: NbtSource,
        interpret: bool,
        separator: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub content: Content,
    pub style: Style,
    pub children: Vec<Component>,
}

impl Component {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            style: Style::default(),
            children: Vec::new(),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(Content::Text(s.into()))
    }

    pub fn styled(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_children(mut self, children: Vec<Component>) -> Self {
        self.children = children;
        self
    }

    /// Text of this component followed by its children, unstyled.
    ///
    /// Non-text content renders as a readable placeholder: keybinds in
    /// brackets, translations as their fallback (else key), scores as
    /// `name:objective`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        match &self.content {
            Content::Text(s) => out.push_str(s),
            Content::Keybind(k) => {
                out.push('[');
                out.push_str(k);
                out.push(']');
            }
            Content::Translatable { key, fallback, args } => {
                out.push_str(fallback.as_deref().unwrap_or(key));
                for arg in args {
                    out.push(' ');
                    arg.write_plain(out);
                }
            }
            Content::Score { name, objective } => {
                out.push_str(name);
                out.push(':');
                out.push_str(objective);
            }
            Content::Selector { pattern, .. } => out.push_str(pattern),
            Content::Nbt { path, .. } => out.push_str(path),
        }
        for child in &self.children {
            child.write_plain(out);
        }
    }
}

/// Builds [`Component`] trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeFactory;

impl ComponentFactory for TreeFactory {
    type Component = Component;

    fn text(&self, content: &str) -> Component {
        Component::text(content)
    }

    fn keybind(&self, key: &str) -> Component {
        Component::new(Content::Keybind(key.to_owned()))
    }

    fn translatable(&self, key: &str, fallback: Option<&str>, args: Vec<Component>) -> Component {
        Component::new(Content::Translatable {
            key: key.to_owned(),
            fallback: fallback.map(str::to_owned),
            args,
        })
    }

    fn score(&self, name: &str, objective: &str) -> Component {
        Component::new(Content::Score {
            name: name.to_owned(),
            objective: objective.to_owned(),
        })
    }

    fn selector(&self, pattern: &str, separator: Option<&str>) -> Component {
        Component::new(Content::Selector {
            pattern: pattern.to_owned(),
            separator: separator.map(str::to_owned),
        })
    }

    fn nbt(&self, path: &str, source: &NbtSource, interpret: bool, separator: Option<&str>) -> Component {
        Component::new(Content::Nbt {
            path: path.to_owned(),
            source: source.clone(),
            interpret,
            separator: separator.map(str::to_owned),
        })
    }

    fn apply_style(&self, component: &mut Component, style: &Style) {
        component.style = component.style.merge(style);
    }

    fn append_children(&self, component: &mut Component, children: Vec<Component>) {
        component.children.extend(children);
    }
}
