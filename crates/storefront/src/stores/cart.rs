//! Session-backed cart store.
//!
//! Every operation loads the cart from the visitor's storage, applies the
//! change to a [`Cart`] and writes it back. The cart expires a fixed window
//! after its first item was added; an expired cart is cleared before use.

use chrono::{DateTime, Duration, Utc};
use lattice_core::{
    Cart, CartLineItem, Clock, CurrencyCode, LineKey, Price, PriceError, Product, ProductId,
    Quantity,
};
use thiserror::Error;
use tracing::instrument;

use crate::storage::{ExpiringCache, KeyValueStorage, StorageError, keys};

/// Default cart window in seconds (1 hour).
pub const DEFAULT_CART_TTL_SECS: i64 = 60 * 60;

/// A requested line does not match what the product offers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("product {product} is not offered in size {size}")]
    UnknownSize { product: ProductId, size: String },

    #[error("product {product} is not offered in color {color}")]
    UnknownColor { product: ProductId, color: String },

    #[error("product {product} requires a size")]
    SizeRequired { product: ProductId },

    #[error("product {product} cannot be sold: {source}")]
    InvalidPrice {
        product: ProductId,
        source: PriceError,
    },
}

/// Build a cart line for `product` at its current price.
///
/// Blank color and size count as absent. A size is required when the
/// product lists any.
///
/// # Errors
///
/// Returns `CartError` if the color or size is not one the product offers,
/// or if the product's current price is negative.
pub fn line_item_for(
    product: &Product,
    quantity: Quantity,
    color: Option<String>,
    size: Option<String>,
) -> Result<CartLineItem, CartError> {
    let color = color.filter(|c| !c.trim().is_empty());
    let size = size.filter(|s| !s.trim().is_empty());

    if let Some(color) = &color
        && !product.offers_color(color)
    {
        return Err(CartError::UnknownColor {
            product: product.id.clone(),
            color: color.clone(),
        });
    }
    match &size {
        Some(size) if !product.offers_size(size) => {
            return Err(CartError::UnknownSize {
                product: product.id.clone(),
                size: size.clone(),
            });
        }
        None if !product.sizes.is_empty() => {
            return Err(CartError::SizeRequired {
                product: product.id.clone(),
            });
        }
        _ => {}
    }

    let price = Price::try_new(product.current_price(), CurrencyCode::default()).map_err(
        |source| CartError::InvalidPrice {
            product: product.id.clone(),
            source,
        },
    )?;

    Ok(CartLineItem {
        id: product.id.clone(),
        name: product.name.clone(),
        price: price.amount,
        image: product.image.clone(),
        quantity,
        color,
        size,
    })
}

/// Cart operations over one visitor's storage.
pub struct CartStore<'a, S> {
    storage: &'a S,
    clock: &'a dyn Clock,
    cache: ExpiringCache<Cart>,
}

impl<'a, S: KeyValueStorage> CartStore<'a, S> {
    pub fn new(storage: &'a S, clock: &'a dyn Clock, ttl: Duration) -> Self {
        Self {
            storage,
            clock,
            cache: ExpiringCache::new(keys::CART, keys::CART_EXPIRY, ttl),
        }
    }

    /// Load the current cart, empty if none is stored or it has expired.
    ///
    /// A stored cart that cannot be read is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn load(&self) -> Result<Cart, StorageError> {
        match self.cache.get(self.storage, self.clock.now()).await {
            Ok(cart) => Ok(cart.unwrap_or_default()),
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(error = %err, "discarding unreadable stored cart");
                self.cache.invalidate(self.storage).await?;
                Ok(Cart::new())
            }
            Err(err) => Err(err),
        }
    }

    /// When the current cart expires, if one is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn expires_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.cache.expires_at(self.storage).await
    }

    async fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        if cart.is_empty() {
            return self.cache.invalidate(self.storage).await;
        }
        self.cache
            .update(self.storage, cart, self.clock.now())
            .await
            .map(|_| ())
    }

    /// Add an item, merging it into the line with the same
    /// `(id, color, size)` if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self, item), fields(product_id = %item.id, quantity = %item.quantity))]
    pub async fn add_to_cart(&self, item: CartLineItem) -> Result<Cart, StorageError> {
        let mut cart = self.load().await?;
        cart.add(item);
        self.save(&cart).await?;
        Ok(cart)
    }

    /// Remove the line with exactly this key. Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, key: &LineKey) -> Result<Cart, StorageError> {
        let mut cart = self.load().await?;
        if cart.remove(key) {
            self.save(&cart).await?;
        }
        Ok(cart)
    }

    /// Remove every line for a product regardless of color and size.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn remove_all_variants(&self, id: &ProductId) -> Result<Cart, StorageError> {
        let mut cart = self.load().await?;
        if cart.remove_all_variants(id) > 0 {
            self.save(&cart).await?;
        }
        Ok(cart)
    }

    /// Set the quantity of the line with this key. Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        key: &LineKey,
        quantity: Quantity,
    ) -> Result<Cart, StorageError> {
        let mut cart = self.load().await?;
        if cart.update_quantity(key, quantity) {
            self.save(&cart).await?;
        }
        Ok(cart)
    }

    /// Total units in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn get_cart_count(&self) -> Result<u64, StorageError> {
        Ok(self.load().await?.count())
    }

    /// Empty the cart and drop its expiry marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), StorageError> {
        self.cache.invalidate(self.storage).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lattice_core::ManualClock;
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStorage;

    fn item(id: &str, quantity: i64, size: Option<&str>) -> CartLineItem {
        CartLineItem {
            id: ProductId::new(id),
            name: format!("Item {id}"),
            price: Decimal::new(10, 0),
            image: String::new(),
            quantity: Quantity::new(quantity).unwrap(),
            color: None,
            size: size.map(String::from),
        }
    }

    fn key(id: &str, size: Option<&str>) -> LineKey {
        LineKey::new(ProductId::new(id), None, size.map(String::from))
    }

    fn store<'a>(storage: &'a MemoryStorage, clock: &'a ManualClock) -> CartStore<'a, MemoryStorage> {
        CartStore::new(storage, clock, Duration::seconds(DEFAULT_CART_TTL_SECS))
    }

    #[tokio::test]
    async fn test_add_merges_and_counts() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        let carts = store(&storage, &clock);

        carts.add_to_cart(item("p1", 2, None)).await.unwrap();
        let cart = carts.add_to_cart(item("p1", 3, None)).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(carts.get_cart_count().await.unwrap(), 5);

        carts.remove_from_cart(&key("p1", None)).await.unwrap();
        assert_eq!(carts.get_cart_count().await.unwrap(), 0);
        assert!(carts.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_survives_reload() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();

        store(&storage, &clock)
            .add_to_cart(item("p1", 1, Some("M")))
            .await
            .unwrap();

        // A fresh store over the same storage sees the persisted cart.
        let reloaded = store(&storage, &clock).load().await.unwrap();
        assert_eq!(reloaded.count(), 1);
        assert_eq!(
            storage.read(keys::CART).await.unwrap().unwrap()["items"][0]["size"],
            "M"
        );
    }

    #[tokio::test]
    async fn test_cart_expires_after_window() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        let carts = store(&storage, &clock);

        carts.add_to_cart(item("p1", 1, None)).await.unwrap();
        clock.advance(Duration::minutes(30));
        // A later write does not extend the window.
        carts.add_to_cart(item("p2", 1, None)).await.unwrap();
        clock.advance(Duration::minutes(31));

        assert_eq!(carts.get_cart_count().await.unwrap(), 0);
        assert_eq!(carts.expires_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_cart_removes_expiry_marker() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        let carts = store(&storage, &clock);

        carts.add_to_cart(item("p1", 4, None)).await.unwrap();
        assert!(carts.expires_at().await.unwrap().is_some());

        carts.clear_cart().await.unwrap();
        assert_eq!(carts.get_cart_count().await.unwrap(), 0);
        assert!(!storage.contains(keys::CART_EXPIRY).unwrap());
    }

    #[tokio::test]
    async fn test_remove_by_key_keeps_other_variants() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        let carts = store(&storage, &clock);

        carts.add_to_cart(item("p1", 1, Some("M"))).await.unwrap();
        carts.add_to_cart(item("p1", 2, Some("L"))).await.unwrap();

        let cart = carts.remove_from_cart(&key("p1", Some("M"))).await.unwrap();
        assert_eq!(cart.count(), 2);

        let cart = carts
            .remove_all_variants(&ProductId::new("p1"))
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        let carts = store(&storage, &clock);

        carts.add_to_cart(item("p1", 1, None)).await.unwrap();
        carts
            .update_quantity(&key("p1", None), Quantity::new(9).unwrap())
            .await
            .unwrap();
        assert_eq!(carts.get_cart_count().await.unwrap(), 9);

        // Unknown line: no-op
        let cart = carts
            .update_quantity(&key("nope", None), Quantity::ONE)
            .await
            .unwrap();
        assert_eq!(cart.count(), 9);
    }

    #[test]
    fn test_line_item_for_validates_options() {
        let product = Product {
            id: ProductId::new("tee"),
            name: "Tee".into(),
            category: lattice_core::CategoryHandle::new("tops"),
            brand: None,
            material: None,
            price: Decimal::new(40, 0),
            discount: Decimal::new(25, 0),
            sizes: vec!["S".into(), "M".into()],
            colors: vec!["Red".into()],
            image: "/tee.jpg".into(),
        };

        let line = line_item_for(&product, Quantity::ONE, Some("Red".into()), Some("M".into()))
            .unwrap();
        assert_eq!(line.price, Decimal::new(30, 0));
        assert_eq!(line.size.as_deref(), Some("M"));

        assert!(matches!(
            line_item_for(&product, Quantity::ONE, None, Some("XL".into())),
            Err(CartError::UnknownSize { .. })
        ));
        assert!(matches!(
            line_item_for(&product, Quantity::ONE, Some("Blue".into()), Some("S".into())),
            Err(CartError::UnknownColor { .. })
        ));
        assert!(matches!(
            line_item_for(&product, Quantity::ONE, Some(String::new()), None),
            Err(CartError::SizeRequired { .. })
        ));
    }

    #[test]
    fn test_line_item_for_rejects_negative_price() {
        let product = Product {
            id: ProductId::new("neg"),
            name: "Broken".into(),
            category: lattice_core::CategoryHandle::new("tops"),
            brand: None,
            material: None,
            price: Decimal::new(-5, 0),
            discount: Decimal::ZERO,
            sizes: Vec::new(),
            colors: Vec::new(),
            image: String::new(),
        };

        let err = line_item_for(&product, Quantity::new(2).unwrap(), None, None).unwrap_err();
        assert_eq!(
            err,
            CartError::InvalidPrice {
                product: ProductId::new("neg"),
                source: PriceError::Negative(Decimal::new(-5, 0)),
            }
        );
    }

    #[tokio::test]
    async fn test_unreadable_cart_is_discarded() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at_epoch();
        storage
            .write(
                keys::CART,
                serde_json::json!({ "items": [{ "id": "p1", "quantity": 0 }] }),
            )
            .await
            .unwrap();
        storage
            .write(keys::CART_EXPIRY, serde_json::Value::from(10_000))
            .await
            .unwrap();

        let carts = store(&storage, &clock);
        assert!(carts.load().await.unwrap().is_empty());
        assert!(!storage.contains(keys::CART).unwrap());
    }
}
