//! Property-based generators.

use crate::records::Widget;
use proptest::prelude::*;

/// Generates widget names: short, printable, possibly empty.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{0,24}"
}

/// Generates bare widgets with arbitrary fields.
pub fn arb_widget() -> impl Strategy<Value = Widget> {
    (arb_name(), any::<i64>()).prop_map(|(name, price)| Widget::new(name, price))
}

/// Generates a batch of bare widgets.
pub fn arb_widgets(max: usize) -> impl Strategy<Value = Vec<Widget>> {
    prop::collection::vec(arb_widget(), 0..=max)
}
