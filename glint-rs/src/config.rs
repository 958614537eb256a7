//! Directive-style configuration.
//!
//! Recognises a small line-oriented command language:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/slot <name> [-b<break>] [-n] [-c<color>] [-f<flags>] [-F<font>]` | define an output slot |
//! | `/set <name>=<value>` or `/set <name> <value>` | seed a global binding |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! `/slot` options:
//!
//! - `-b<break>`: literal break string; `\n`, `\t` and `\\` are unescaped.
//! - `-n`: no literal break; breaks split the output into entries.
//! - `-c<color>`: base colour, any form [`Color::parse`] accepts.
//! - `-f<flags>`: base decorations from `b i u s o`; upper case sets the
//!   flag explicitly off.
//! - `-F<font>`: base font.
//!
//! Option values may be attached (`-cgold`) or separate (`-c gold`).
//! Loading never aborts: bad lines are reported and skipped.

use thiserror::Error;

use crate::color::Color;
use crate::env::Bindings;
use crate::output::Slot;
use crate::style::Decoration;
use crate::value::Value;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error on one configuration line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Slot definitions and global bindings.
#[derive(Debug, Default)]
pub struct Config {
    slots: Vec<Slot>,
    pub vars: Bindings,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration string.  Returns the config and the errors on
    /// recognised lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let tokens = split_args(args_str.trim());

            let result = match cmd {
                "slot" => parse_slot(&tokens).map(|slot| config.upsert_slot(slot)),
                "set" => parse_set(&tokens).map(|(name, value)| config.vars.set_static(name, value)),
                _ => Ok(()),
            };
            if let Err(message) = result {
                tracing::warn!(line = lineno, %message, "config line skipped");
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Slots in definition order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Add a slot, replacing any slot with the same name.
    pub fn upsert_slot(&mut self, slot: Slot) {
        match self.slots.iter_mut().find(|s| s.name == slot.name) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Tokenize a directive's arguments.
///
/// Whitespace separates tokens except inside double quotes.  A quoted
/// empty string (`""`) still yields an empty token, so `/set motd ""`
/// binds an empty value.  Backslash escapes only apply between quotes:
/// `\"` is a literal quote and any other escape is kept verbatim for
/// [`unescape`] to handle later.
fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    // `None` until a token starts; an opening quote starts one.
    let mut token: Option<String> = None;
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_whitespace() && !in_quotes {
            args.extend(token.take());
            continue;
        }
        let cur = token.get_or_insert_with(String::new);
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => match chars.next() {
                Some('"') => cur.push('"'),
                Some(other) => {
                    cur.push('\\');
                    cur.push(other);
                }
                None => {}
            },
            c => cur.push(c),
        }
    }
    args.extend(token);
    args
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ── /slot ─────────────────────────────────────────────────────────────────────

fn parse_slot(tokens: &[String]) -> Result<Slot, String> {
    let mut name: Option<String> = None;
    let mut slot = Slot::new("");

    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];

        if tok.starts_with('-') && tok.len() > 1 {
            let mut chars = tok[1..].chars();
            while let Some(ch) = chars.next() {
                match ch {
                    'n' => slot.line_break = None,
                    'b' | 'c' | 'f' | 'F' => {
                        let inline: String = chars.collect();
                        let value = if !inline.is_empty() {
                            inline
                        } else {
                            i += 1;
                            match tokens.get(i) {
                                Some(v) => v.clone(),
                                None => return Err(format!("/slot: -{ch} requires a value")),
                            }
                        };
                        match ch {
                            'b' => slot.line_break = Some(unescape(&value)),
                            'c' => {
                                let color = Color::parse(&value)
                                    .ok_or_else(|| format!("/slot: unrecognised colour '{value}'"))?;
                                slot.base.color = Some(color);
                            }
                            'f' => {
                                for code in value.chars() {
                                    let flag = Decoration::from_code(code)
                                        .ok_or_else(|| format!("/slot: unknown decoration flag '{code}'"))?;
                                    slot.base.decorations =
                                        slot.base.decorations.with(flag, code.is_ascii_lowercase());
                                }
                            }
                            _ => slot.base.font = Some(value),
                        }
                        break;
                    }
                    _ => {}
                }
            }
        } else if name.is_none() {
            name = Some(tok.clone());
        } else {
            return Err(format!("/slot: unexpected argument '{tok}'"));
        }

        i += 1;
    }

    slot.name = name.ok_or("/slot: requires a slot name")?;
    Ok(slot)
}

// ── /set ─────────────────────────────────────────────────────────────────────

/// Parse `/set <name>=<value>` or `/set <name> <value>`.
fn parse_set(tokens: &[String]) -> Result<(String, Value), String> {
    let Some(first) = tokens.first() else {
        return Err("/set: requires an argument".into());
    };

    let (name, value) = if let Some((name, value)) = first.split_once('=') {
        (name.to_owned(), value.to_owned())
    } else if tokens.len() >= 2 {
        (first.clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("/set: missing value for '{first}'"));
    };

    if name.is_empty() {
        return Err("/set: variable name cannot be empty".into());
    }
    Ok((name, scalar(&value)))
}

/// Integers, floats and `true`/`false` are typed; anything else is a string.
fn scalar(s: &str) -> Value {
    if let Ok(n) = s.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(b) = s.parse::<bool>() {
        Value::Bool(b)
    } else {
        match s.parse::<f64>() {
            Ok(x) if x.is_finite() => Value::Float(x),
            _ => Value::Str(s.to_owned()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
