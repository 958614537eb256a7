use proptest::prelude::*;

use glint::color::Color;
use glint::config::Config;
use glint::expr::{evaluate, substring, Op};
use glint::{Bindings, Expr, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        "\\PC{0,12}".prop_map(Value::Str),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

fn eval_with(expr: &Expr, name: &str, v: Value) -> Value {
    evaluate(expr, &Bindings::new().with(name, v))
}

proptest! {
    /// Every coercion is total: no input panics, and sequence coercion of a
    /// scalar always wraps exactly one value.
    #[test]
    fn coercions_are_total(v in value()) {
        let _ = v.as_int();
        let _ = v.as_float();
        let _ = v.as_bool();
        let _ = v.as_str();
        let list = v.as_list();
        match &v {
            Value::List(items) => prop_assert_eq!(list.len(), items.len()),
            Value::Map(map) => prop_assert_eq!(list.len(), map.len()),
            _ => prop_assert_eq!(list.len(), 1),
        }
    }

    /// Integer strings coerce back to the integer they print.
    #[test]
    fn integer_strings_round_trip(n in any::<i64>()) {
        prop_assert_eq!(Value::Str(n.to_string()).as_int(), n);
    }

    /// Operators never panic, whatever the operand kinds.
    #[test]
    fn infix_is_total(l in value(), r in value()) {
        for op in [Op::Add, Op::Sub, Op::Mul, Op::Div, Op::Mod, Op::Pow, Op::Concat,
                   Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge, Op::And, Op::Or, Op::Coalesce] {
            let env = Bindings::new().with("l", l.clone()).with("r", r.clone());
            let _ = evaluate(&Expr::infix(op, Expr::ident("l"), Expr::ident("r")), &env);
        }
    }
}

proptest! {
    /// `a..b` is the inclusive run of consecutive integers when `b > a`,
    /// and empty otherwise.
    #[test]
    fn range_law(a in -50i64..50, b in -50i64..50) {
        let v = evaluate(&Expr::infix(Op::Range, Expr::int(a), Expr::int(b)), &Bindings::new());
        let Value::List(items) = v else {
            return Err(TestCaseError::fail("range did not produce a list"));
        };
        if b > a {
            let expected: Vec<Value> = (a..=b).map(Value::Int).collect();
            prop_assert_eq!(items, expected);
        } else {
            prop_assert!(items.is_empty());
        }
    }

    /// `xs[-k]` is `xs[len - k]`; indices outside the list are null.
    #[test]
    fn negative_index_law(xs in prop::collection::vec(any::<i64>(), 1..10), k in 1usize..12) {
        let list = Value::List(xs.iter().copied().map(Value::Int).collect());
        let at = |i: i64| eval_with(&Expr::subscript(Expr::ident("xs"), Expr::int(i)), "xs", list.clone());
        let n = xs.len();
        if k <= n {
            prop_assert_eq!(at(-(k as i64)), at((n - k) as i64));
            prop_assert_eq!(at(-(k as i64)), Value::Int(xs[n - k]));
        } else {
            prop_assert_eq!(at(-(k as i64)), Value::Null);
            prop_assert_eq!(at(k as i64 + n as i64), Value::Null);
        }
    }

    /// Non-negative ordered bounds select the inclusive character range.
    #[test]
    fn substring_forward_range(s in "[a-z]{1,12}", lo in 0usize..12, len in 0usize..12) {
        let n = s.chars().count();
        prop_assume!(lo < n);
        let hi = (lo + len).min(n - 1);
        let expected: String = s.chars().skip(lo).take(hi - lo + 1).collect();
        prop_assert_eq!(substring(&s, Some(lo as i64), Some(hi as i64)), expected);
    }

    /// Substrings never invent characters.
    #[test]
    fn substring_is_bounded(s in "\\PC{0,16}", lo in -20i64..20, hi in -20i64..20) {
        let out = substring(&s, Some(lo), Some(hi));
        let n = s.chars().count();
        prop_assert!(out.chars().count() <= 2 * n);
        prop_assert!(out.chars().all(|c| s.contains(c)));
    }
}

proptest! {
    /// Nearest-palette lookup is deterministic, in range, and fixed on
    /// palette colours.
    #[test]
    fn nearest_colour_is_deterministic(rgb in 0u32..=0xFF_FFFF) {
        let c = Color::from_rgb(rgb);
        let idx = c.nearest_legacy();
        prop_assert!(idx < 16);
        prop_assert_eq!(idx, c.nearest_legacy());
        let snapped = Color::legacy(idx).map(Color::nearest_legacy);
        prop_assert_eq!(snapped, Some(idx));
    }

    /// Configuration loading never panics and reports errors by line.
    #[test]
    fn config_load_is_total(src in "(/(slot|set) [-a-zA-Z0-9=#\" ]{0,20}\n){0,6}") {
        let lines = src.lines().count();
        let (_, errs) = Config::load_str(&src);
        prop_assert!(errs.iter().all(|e| e.line >= 1 && e.line <= lines));
    }
}

#[test]
fn palette_colours_map_to_themselves() {
    for i in 0..16u8 {
        let c = Color::legacy(i).unwrap_or_else(|| panic!("missing palette entry {i}"));
        assert_eq!(c.nearest_legacy(), i, "{c}");
    }
}
