//! Output builder.
//!
//! Terminal content is collected into a stack of sequence frames, one per
//! open non-terminal node.  Members of a frame are *runs*: consecutive
//! content sharing one resolved style.  Closing a frame splices its runs into
//! the parent, fusing across the boundary when the styles agree, so the
//! final output never re-emits a style that its neighbour already carries.
//!
//! Components are only materialized at flush time.  Each flushed entry is a
//! root `text("")` component styled with the slot's base style whose
//! children are the runs, styled by their diff against that base.

use crate::component::ComponentFactory;
use crate::style::Style;

// ── Slot ──────────────────────────────────────────────────────────────────────

/// Output context with its own base style and break handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub base: Style,
    /// Emitted as text for an explicit break.  `None` splits the output
    /// into a new top-level entry instead.
    pub line_break: Option<String>,
}

impl Slot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: Style::default(),
            line_break: None,
        }
    }

    /// Chat lines: breaks are newline characters.
    pub fn chat() -> Self {
        Self {
            line_break: Some("\n".to_owned()),
            ..Self::new("chat")
        }
    }

    /// Item lore: one entry per line, italic explicitly off.
    pub fn lore() -> Self {
        Self {
            base: Style::default().with_decoration(crate::style::Decoration::ITALIC, false),
            ..Self::new("lore")
        }
    }
}

// ── Runs ──────────────────────────────────────────────────────────────────────

enum Piece<C> {
    Text(String),
    Component(C),
}

struct Run<C> {
    style: Style,
    pieces: Vec<Piece<C>>,
}

impl<C> Run<C> {
    fn push(&mut self, piece: Piece<C>) {
        match (self.pieces.last_mut(), piece) {
            (Some(Piece::Text(prev)), Piece::Text(s)) => prev.push_str(&s),
            (_, piece) => self.pieces.push(piece),
        }
    }
}

type Frame<C> = Vec<Run<C>>;

fn append_run<C>(frame: &mut Frame<C>, run: Run<C>) {
    match frame.last_mut() {
        Some(last) if last.style == run.style => {
            for piece in run.pieces {
                last.push(piece);
            }
        }
        _ => frame.push(run),
    }
}

// ── OutputBuilder ─────────────────────────────────────────────────────────────

pub struct OutputBuilder<'f, F: ComponentFactory> {
    factory: &'f F,
    slot: Slot,
    /// Never empty; `frames[0]` is the root.
    frames: Vec<Frame<F::Component>>,
    results: Vec<F::Component>,
}

impl<'f, F: ComponentFactory> OutputBuilder<'f, F> {
    pub fn new(factory: &'f F, slot: Slot) -> Self {
        Self {
            factory,
            slot,
            frames: vec![Vec::new()],
            results: Vec::new(),
        }
    }

    pub fn factory(&self) -> &'f F {
        self.factory
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Open frames, root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a frame for a non-terminal node.
    pub fn enter(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Close the innermost frame, merging it into its parent.  The root
    /// frame is never closed.
    pub fn exit(&mut self) {
        if self.frames.len() < 2 {
            tracing::warn!("unbalanced output frame exit");
            return;
        }
        if let Some(child) = self.frames.pop() {
            if let Some(parent) = self.frames.last_mut() {
                for run in child {
                    append_run(parent, run);
                }
            }
        }
    }

    pub fn push_text(&mut self, text: &str, style: &Style) {
        if text.is_empty() {
            return;
        }
        self.push_piece(Piece::Text(text.to_owned()), style);
    }

    pub fn push_component(&mut self, component: F::Component, style: &Style) {
        self.push_piece(Piece::Component(component), style);
    }

    fn push_piece(&mut self, piece: Piece<F::Component>, style: &Style) {
        let run = Run {
            style: style.clone(),
            pieces: vec![piece],
        };
        if let Some(frame) = self.frames.last_mut() {
            append_run(frame, run);
        }
    }

    /// Explicit break.
    ///
    /// With a literal break string the string is emitted as plain text.
    /// Otherwise every open frame collapses into the root, the root is
    /// flushed as one entry, and the same number of frames is re-opened so
    /// the enclosing nodes keep writing into fresh frames.
    pub fn line_break(&mut self, style: &Style) {
        if let Some(brk) = self.slot.line_break.clone() {
            self.push_text(&brk, style);
            return;
        }
        let depth = self.frames.len();
        while self.frames.len() > 1 {
            self.exit();
        }
        self.flush_root();
        for _ in 1..depth {
            self.enter();
        }
    }

    /// Collapse and flush everything.  Always returns at least one entry.
    pub fn finish(mut self) -> Vec<F::Component> {
        while self.frames.len() > 1 {
            self.exit();
        }
        let has_content = self.frames.first().is_some_and(|root| !root.is_empty());
        if has_content || self.results.is_empty() {
            self.flush_root();
        }
        self.results
    }

    fn flush_root(&mut self) {
        let runs = self.frames.first_mut().map(std::mem::take).unwrap_or_default();
        let mut root = self.factory.text("");
        self.factory.apply_style(&mut root, &self.slot.base);
        let children: Vec<_> = runs.into_iter().map(|run| self.materialize(run)).collect();
        if !children.is_empty() {
            self.factory.append_children(&mut root, children);
        }
        self.results.push(root);
    }

    fn materialize(&self, run: Run<F::Component>) -> F::Component {
        let diff = run.style.diff(&self.slot.base);
        let mut pieces: Vec<_> = run
            .pieces
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(s) => self.factory.text(&s),
                Piece::Component(c) => c,
            })
            .collect();
        let mut component = if pieces.len() == 1 {
            pieces.remove(0)
        } else {
            let mut container = self.factory.text("");
            self.factory.append_children(&mut container, pieces);
            container
        };
        self.factory.apply_style(&mut component, &diff);
        component
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
