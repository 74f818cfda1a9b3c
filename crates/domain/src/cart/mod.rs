//! Client carts.
//!
//! A cart is not a stream of its own: it is the set of a client's cart item
//! streams that are still active, found through the `client:` tag.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{CartItem, CartItemStatus};
pub use commands::AddCartItem;
pub use events::{
    CartItemAddedData, CartItemCheckedOutData, CartItemEvent, CartItemRemovedData,
    QuantityChangedData,
};
pub use service::CartService;
