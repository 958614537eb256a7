//! Long-lived render engine.
//!
//! An [`Engine`] owns everything that outlives a single render: the
//! coercion rules, the field-accessor table, the text-services cache, the
//! slot definitions and the global bindings.  It is `Send + Sync`; each
//! [`Engine::render`] call builds its own [`Interpreter`], so one engine can
//! serve any number of concurrent renders.

use std::collections::HashMap;
use std::sync::Arc;

use crate::access::FieldAccessors;
use crate::component::ComponentFactory;
use crate::config::Config;
use crate::env::{Bindings, Environment, Layered};
use crate::markup::Node;
use crate::output::Slot;
use crate::render::{Interpreter, RenderError};
use crate::text::TextServices;
use crate::value::{Coercion, DefaultCoercion};

/// Slot used when a render names an unknown one.
pub const DEFAULT_SLOT: &str = "chat";

pub struct Engine {
    coercion: Arc<dyn Coercion>,
    accessors: Arc<FieldAccessors>,
    text: Arc<TextServices>,
    slots: HashMap<String, Slot>,
    globals: Bindings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut slots: Vec<_> = self.slots.keys().collect();
        slots.sort();
        f.debug_struct("Engine")
            .field("slots", &slots)
            .field("globals", &self.globals)
            .field("accessors", &self.accessors)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the built-in `chat` and `lore` slots and default coercion.
    pub fn new() -> Self {
        let mut slots = HashMap::new();
        for slot in [Slot::chat(), Slot::lore()] {
            slots.insert(slot.name.clone(), slot);
        }
        Self {
            coercion: Arc::new(DefaultCoercion),
            accessors: Arc::new(FieldAccessors::new()),
            text: Arc::new(TextServices::new()),
            slots,
            globals: Bindings::new(),
        }
    }

    /// Built-ins overlaid with the configured slots and bindings.
    pub fn from_config(config: &Config) -> Self {
        let mut engine = Self::new();
        for slot in config.slots() {
            engine.define_slot(slot.clone());
        }
        engine.globals.extend(&config.vars);
        engine
    }

    pub fn with_coercion(mut self, coercion: Arc<dyn Coercion>) -> Self {
        self.coercion = coercion;
        self
    }

    /// Shared accessor table; register native-type fields through it.
    pub fn accessors(&self) -> &Arc<FieldAccessors> {
        &self.accessors
    }

    pub fn text(&self) -> &Arc<TextServices> {
        &self.text
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Add or replace a slot.
    pub fn define_slot(&mut self, slot: Slot) {
        self.slots.insert(slot.name.clone(), slot);
    }

    pub fn globals(&self) -> &Bindings {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Bindings {
        &mut self.globals
    }

    /// Render `node` into `slot`.
    ///
    /// `env` takes precedence over the engine's globals.  An unknown slot
    /// name falls back to [`DEFAULT_SLOT`].
    #[tracing::instrument(skip_all, fields(slot = slot))]
    pub fn render<F: ComponentFactory>(
        &self,
        node: &Node,
        env: &dyn Environment,
        slot: &str,
        factory: &F,
    ) -> Result<Vec<F::Component>, RenderError> {
        let slot = match self.slots.get(slot) {
            Some(s) => s.clone(),
            None => {
                tracing::warn!(slot, "unknown slot, using {DEFAULT_SLOT}");
                self.slots.get(DEFAULT_SLOT).cloned().unwrap_or_else(Slot::chat)
            }
        };
        let env = Layered {
            top: env,
            base: &self.globals,
        };
        Interpreter::new(&env, &*self.coercion, &self.accessors, factory, slot).run(node)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
