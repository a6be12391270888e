//! Document paths.
//!
//! A path is a `/`-separated list of non-empty segments. Every location the
//! storefront reads or writes has a constructor here so the layout is
//! defined once:
//!
//! | Path | Content |
//! |------|---------|
//! | `users/{userId}/cart` | cart line items (array) |
//! | `users/{userId}/orders/{orderId}` | order listing entry |
//! | `orders/{orderId}` | primary order record |
//! | `favorites/{userId}/{productId}` | favorited product snapshot |
//! | `products/{productId}` | catalog product |

use std::fmt;
use std::str::FromStr;

use storefront_core::ids::validate_segment;
use storefront_core::{OrderId, ProductId, UserId};

use crate::error::{Result, StoreError};

/// A validated document path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

impl DocPath {
    /// Parse a path, validating every segment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidPath` for an empty path, an empty
    /// segment, or a segment with a forbidden character.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(StoreError::InvalidPath("empty path".into()));
        }
        for segment in path.split('/') {
            validate_segment(segment)
                .map_err(|e| StoreError::InvalidPath(format!("{path}: {e}")))?;
        }
        Ok(Self(path))
    }

    /// Append already-valid segments. Ids are validated on construction, so
    /// joining them cannot produce an invalid path.
    fn join(base: &str, segments: &[&str]) -> Self {
        let mut path = base.to_string();
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        Self(path)
    }

    /// `users/{userId}/cart`
    #[must_use]
    pub fn cart(user_id: &UserId) -> Self {
        Self::join("users", &[user_id.as_str(), "cart"])
    }

    /// `users/{userId}/orders`
    #[must_use]
    pub fn user_orders(user_id: &UserId) -> Self {
        Self::join("users", &[user_id.as_str(), "orders"])
    }

    /// `users/{userId}/orders/{orderId}`
    #[must_use]
    pub fn user_order(user_id: &UserId, order_id: &OrderId) -> Self {
        Self::join("users", &[user_id.as_str(), "orders", &order_id.to_string()])
    }

    /// `orders/{orderId}`
    #[must_use]
    pub fn order(order_id: &OrderId) -> Self {
        Self::join("orders", &[&order_id.to_string()])
    }

    /// `favorites/{userId}`
    #[must_use]
    pub fn favorites(user_id: &UserId) -> Self {
        Self::join("favorites", &[user_id.as_str()])
    }

    /// `favorites/{userId}/{productId}`
    #[must_use]
    pub fn favorite(user_id: &UserId, product_id: &ProductId) -> Self {
        Self::join("favorites", &[user_id.as_str(), product_id.as_str()])
    }

    /// `products`
    #[must_use]
    pub fn products() -> Self {
        Self("products".to_string())
    }

    /// The path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Strict ancestors, shortest first (`a`, `a/b` for `a/b/c`).
    #[must_use]
    pub fn ancestors(&self) -> Vec<&str> {
        self.0
            .match_indices('/')
            .map(|(idx, _)| &self.0[..idx])
            .collect()
    }

    /// Whether `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Whether a write at one path changes what a reader of the other sees:
    /// the paths are equal or one contains the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

impl FromStr for DocPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocPath({})", self.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> UserId {
        UserId::new("u42").unwrap()
    }

    #[test]
    fn well_known_paths() {
        let order_id = OrderId::generate();
        assert_eq!(DocPath::cart(&uid()).as_str(), "users/u42/cart");
        assert_eq!(DocPath::user_orders(&uid()).as_str(), "users/u42/orders");
        assert_eq!(
            DocPath::user_order(&uid(), &order_id).as_str(),
            format!("users/u42/orders/{order_id}")
        );
        assert_eq!(DocPath::order(&order_id).as_str(), format!("orders/{order_id}"));
        assert_eq!(
            DocPath::favorite(&uid(), &ProductId::new("p1").unwrap()).as_str(),
            "favorites/u42/p1"
        );
    }

    #[test]
    fn parse_rejects_bad_paths() {
        assert!(DocPath::new("").is_err());
        assert!(DocPath::new("users//cart").is_err());
        assert!(DocPath::new("/users").is_err());
        assert!(DocPath::new("users/a.b").is_err());
        assert!(DocPath::new("users/u1/cart").is_ok());
    }

    #[test]
    fn ancestry() {
        let users = DocPath::new("users/u42").unwrap();
        let cart = DocPath::cart(&uid());
        let lookalike = DocPath::new("users/u421/cart").unwrap();

        assert!(users.is_ancestor_of(&cart));
        assert!(!cart.is_ancestor_of(&users));
        assert!(!users.is_ancestor_of(&lookalike));
        assert!(!users.is_ancestor_of(&users));

        assert!(users.overlaps(&cart));
        assert!(cart.overlaps(&users));
        assert!(cart.overlaps(&cart));
        assert!(!cart.overlaps(&lookalike));
    }

    #[test]
    fn ancestors_shortest_first() {
        assert_eq!(DocPath::cart(&uid()).ancestors(), vec!["users", "users/u42"]);
        assert!(DocPath::products().ancestors().is_empty());
    }
}
