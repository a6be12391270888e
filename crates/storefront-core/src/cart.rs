//! Cart line items and the rules for merging them.
//!
//! A cart holds at most one line item per product id. Quantities never drop
//! below 1: decrementing past 1 is clamped, and removing an item is a
//! separate operation.
//!
//! Every mutator returns whether the cart actually changed so the caller
//! can skip persisting no-ops.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::ProductId;
use crate::product::Product;

/// One product entry in a cart.
///
/// The product fields are snapshotted when the item is first added and
/// flattened next to `quantity` and `selected` in the stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product snapshot taken at add time.
    #[serde(flatten)]
    pub product: Product,

    /// Number of units, at least 1.
    pub quantity: u32,

    /// Whether the item is marked for the next checkout.
    #[serde(default)]
    pub selected: bool,
}

impl CartLineItem {
    /// A fresh, unselected line item with quantity 1.
    #[must_use]
    pub fn new(product: Product) -> Self {
        Self {
            product,
            quantity: 1,
            selected: false,
        }
    }

    /// The line item id, which is the product id.
    #[must_use]
    pub fn id(&self) -> &ProductId {
        &self.product.id
    }

    /// `price * quantity`.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidPrice` for a negative price.
    /// - `CoreError::InvalidQuantity` for a zero quantity.
    /// - `CoreError::AmountOverflow` if the product does not fit in `i64`.
    pub fn line_total(&self) -> Result<i64> {
        if self.product.price < 0 {
            return Err(CoreError::InvalidPrice {
                product_id: self.product.id.to_string(),
                price: self.product.price,
            });
        }
        if self.quantity == 0 {
            return Err(CoreError::InvalidQuantity {
                product_id: self.product.id.to_string(),
                quantity: self.quantity,
            });
        }
        self.product
            .price
            .checked_mul(i64::from(self.quantity))
            .ok_or(CoreError::AmountOverflow("line total"))
    }
}

/// An ordered list of line items belonging to one user.
///
/// Stored remotely as a JSON array. Decoding goes through
/// [`Cart::from_items`], so duplicated ids or zero quantities coming from the
/// store are repaired on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLineItem>", into = "Vec<CartLineItem>")]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from raw line items, merging duplicate ids (quantities
    /// are summed, the first occurrence's other fields win) and clamping
    /// quantities to at least 1.
    #[must_use]
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        let mut cart = Self::new();
        for mut item in items {
            item.quantity = item.quantity.max(1);
            match cart.position(item.id()) {
                Some(idx) => {
                    let existing = &mut cart.items[idx];
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => cart.items.push(item),
            }
        }
        cart
    }

    /// Decode the stored cart document.
    ///
    /// `null` is an empty cart. Besides an array, an object whose values are
    /// line items is accepted, since the hosted store may hand arrays back
    /// as maps. When every key is an array index the items follow the
    /// numeric index order, otherwise the map order.
    ///
    /// # Errors
    ///
    /// Returns the decoding error when the document is not a list of line items.
    pub fn from_document(value: serde_json::Value) -> serde_json::Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::new()),
            serde_json::Value::Object(map) => {
                let mut entries: Vec<(Option<usize>, serde_json::Value)> = map
                    .into_iter()
                    .map(|(key, v)| (key.parse().ok(), v))
                    .collect();
                if entries.iter().all(|(index, _)| index.is_some()) {
                    entries.sort_by_key(|(index, _)| *index);
                }
                let items = entries
                    .into_iter()
                    .map(|(_, v)| serde_json::from_value(v))
                    .collect::<serde_json::Result<Vec<CartLineItem>>>()?;
                Ok(Self::from_items(items))
            }
            other => serde_json::from_value(other),
        }
    }

    /// The line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Number of distinct line items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line item by product id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Sum of quantities over all line items.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    fn position(&self, id: &ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Add one unit of `product`.
    ///
    /// An existing line item is incremented and keeps its `selected` flag;
    /// otherwise a new unselected item with quantity 1 is appended.
    pub fn add_item(&mut self, product: &Product) -> bool {
        match self.position(&product.id) {
            Some(idx) => {
                let item = &mut self.items[idx];
                item.quantity = item.quantity.saturating_add(1);
            }
            None => self.items.push(CartLineItem::new(product.clone())),
        }
        true
    }

    /// Set the quantity of `id` to `max(1, new_quantity)`.
    ///
    /// Returns `false` if the item is absent or already at that quantity.
    pub fn update_quantity(&mut self, id: &ProductId, new_quantity: i64) -> bool {
        let quantity = u32::try_from(new_quantity.max(1)).unwrap_or(u32::MAX);
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove the line item for `id`. Returns `false` if it was absent.
    pub fn remove_item(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    /// Remove every line item whose id is in `ids`.
    pub fn remove_items(&mut self, ids: &[ProductId]) -> bool {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(item.id()));
        self.items.len() != before
    }

    /// Flip the `selected` flag of `id`. Returns `false` if it was absent.
    pub fn toggle_select(&mut self, id: &ProductId) -> bool {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                item.selected = !item.selected;
                true
            }
            None => false,
        }
    }

    /// The line items marked for checkout, in cart order.
    #[must_use]
    pub fn selected_items(&self) -> Vec<CartLineItem> {
        self.items.iter().filter(|item| item.selected).cloned().collect()
    }

    /// Sum of line totals over the selected items.
    ///
    /// # Errors
    ///
    /// Propagates the validation errors of [`CartLineItem::line_total`] and
    /// `CoreError::AmountOverflow` if the sum overflows.
    pub fn selected_total(&self) -> Result<i64> {
        self.items
            .iter()
            .filter(|item| item.selected)
            .try_fold(0i64, |acc, item| {
                acc.checked_add(item.line_total()?)
                    .ok_or(CoreError::AmountOverflow("selected total"))
            })
    }
}

impl From<Vec<CartLineItem>> for Cart {
    fn from(items: Vec<CartLineItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartLineItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, price: i64) -> Product {
        Product::new(ProductId::new(id).unwrap(), format!("Product {id}"), price, "")
    }

    fn pid(id: &str) -> ProductId {
        ProductId::new(id).unwrap()
    }

    #[test]
    fn repeated_adds_merge_into_one_line() {
        let mut cart = Cart::new();
        let a = product("a", 100);
        let b = product("b", 200);

        for p in [&a, &b, &a, &a, &b] {
            cart.add_item(p);
        }

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(&pid("a")).unwrap().quantity, 3);
        assert_eq!(cart.get(&pid("b")).unwrap().quantity, 2);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn add_preserves_selection() {
        let mut cart = Cart::new();
        let a = product("a", 100);
        cart.add_item(&a);
        cart.toggle_select(&pid("a"));
        cart.add_item(&a);

        let item = cart.get(&pid("a")).unwrap();
        assert!(item.selected);
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn quantity_is_clamped_to_one() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 100));
        cart.update_quantity(&pid("a"), 5);

        for q in [0, -1, -100, i64::MIN] {
            cart.update_quantity(&pid("a"), q);
            assert_eq!(cart.get(&pid("a")).unwrap().quantity, 1);
            cart.update_quantity(&pid("a"), 3);
        }
    }

    #[test]
    fn update_quantity_reports_no_op() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 100));
        assert!(!cart.update_quantity(&pid("missing"), 3));
        assert!(!cart.update_quantity(&pid("a"), 1));
        assert!(cart.update_quantity(&pid("a"), 2));
    }

    #[test]
    fn remove_then_add_is_a_fresh_line() {
        let mut cart = Cart::new();
        let a = product("a", 100);
        cart.add_item(&a);
        cart.add_item(&a);
        cart.toggle_select(&pid("a"));

        assert!(cart.remove_item(&pid("a")));
        assert!(!cart.remove_item(&pid("a")));
        cart.add_item(&a);

        let item = cart.get(&pid("a")).unwrap();
        assert_eq!(item.quantity, 1);
        assert!(!item.selected);
    }

    #[test]
    fn toggle_missing_is_no_op() {
        let mut cart = Cart::new();
        assert!(!cart.toggle_select(&pid("a")));
        assert!(cart.is_empty());
    }

    #[test]
    fn selected_items_and_total() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 100_000));
        cart.add_item(&product("a", 100_000));
        cart.add_item(&product("b", 5_000));
        cart.add_item(&product("c", 7));
        cart.toggle_select(&pid("a"));
        cart.toggle_select(&pid("c"));

        let selected: Vec<String> = cart
            .selected_items()
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        assert_eq!(selected, vec!["a", "c"]);
        assert_eq!(cart.selected_total().unwrap(), 200_007);
    }

    #[test]
    fn remove_items_drops_checked_out_lines() {
        let mut cart = Cart::new();
        for id in ["a", "b", "c"] {
            cart.add_item(&product(id, 10));
        }
        assert!(cart.remove_items(&[pid("a"), pid("c")]));
        assert!(!cart.remove_items(&[pid("zzz")]));
        assert_eq!(cart.len(), 1);
        assert!(cart.get(&pid("b")).is_some());
    }

    #[test]
    fn stored_document_is_a_flat_array() {
        let mut cart = Cart::new();
        cart.add_item(&product("a", 100));
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            json!([{
                "id": "a",
                "name": "Product a",
                "price": 100,
                "image": "",
                "quantity": 1,
                "selected": false
            }])
        );
    }

    #[test]
    fn decoding_repairs_duplicates_and_zero_quantities() {
        let doc = json!([
            { "id": "a", "name": "A", "price": 10, "image": "", "quantity": 2, "selected": true },
            { "id": "b", "name": "B", "price": 20, "image": "", "quantity": 0 },
            { "id": "a", "name": "A", "price": 10, "image": "", "quantity": 3, "selected": false }
        ]);
        let cart = Cart::from_document(doc).unwrap();

        assert_eq!(cart.len(), 2);
        let a = cart.get(&pid("a")).unwrap();
        assert_eq!(a.quantity, 5);
        assert!(a.selected);
        assert_eq!(cart.get(&pid("b")).unwrap().quantity, 1);
    }

    #[test]
    fn decoding_accepts_null_and_maps() {
        assert!(Cart::from_document(serde_json::Value::Null).unwrap().is_empty());

        let doc = json!({
            "0": { "id": "a", "name": "A", "price": 10, "image": "", "quantity": 1 }
        });
        let cart = Cart::from_document(doc).unwrap();
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn map_documents_keep_array_index_order() {
        let line = |i: usize| json!({ "id": format!("p{i}"), "name": "P", "price": 10, "image": "", "quantity": 1 });
        let doc: serde_json::Map<String, serde_json::Value> =
            (0..12).map(|i| (i.to_string(), line(i))).collect();

        let cart = Cart::from_document(serde_json::Value::Object(doc)).unwrap();
        let ids: Vec<String> = cart.items().iter().map(|item| item.id().to_string()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
        assert_eq!(ids, expected);

        // Keys that are not indices keep the map order.
        let doc = json!({
            "x": { "id": "b", "name": "B", "price": 20, "image": "", "quantity": 1 },
            "y": { "id": "a", "name": "A", "price": 10, "image": "", "quantity": 1 }
        });
        let ids: Vec<String> = Cart::from_document(doc)
            .unwrap()
            .items()
            .iter()
            .map(|item| item.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn decoding_rejects_non_carts() {
        assert!(Cart::from_document(json!("nope")).is_err());
        assert!(Cart::from_document(json!([{ "id": "a" }])).is_err());
    }

    #[test]
    fn line_total_validates() {
        let item = CartLineItem::new(product("a", -5));
        assert!(matches!(item.line_total(), Err(CoreError::InvalidPrice { .. })));

        let mut item = CartLineItem::new(product("a", i64::MAX));
        item.quantity = 2;
        assert_eq!(item.line_total(), Err(CoreError::AmountOverflow("line total")));
    }
}
