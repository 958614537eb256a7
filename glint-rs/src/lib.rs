//! glint: a markup-and-expression runtime for styled rich text.
//!
//! A caller builds a markup tree ([`markup::Node`]), hands it to an
//! [`Engine`] with a variable environment, and receives a sequence of styled
//! components built through a [`ComponentFactory`].  Expressions inside the
//! tree are evaluated with total coercions, so a render never fails on bad
//! data: it degrades to null or empty output and logs.

pub mod access;
pub mod ansi;
pub mod color;
pub mod component;
pub mod config;
pub mod engine;
pub mod env;
pub mod expr;
pub mod intercept;
pub mod markup;
pub mod output;
pub mod render;
pub mod style;
pub mod text;
pub mod value;

pub use component::{Component, ComponentFactory, TreeFactory};
pub use engine::Engine;
pub use env::{Bindings, Environment};
pub use expr::Expr;
pub use markup::Node;
pub use render::RenderError;
pub use value::Value;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set, and only runs once per process.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
        }
    });
}
