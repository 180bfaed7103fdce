//! Use-case services orchestrating entities, repositories and dispatch.

pub mod category;
pub mod product;
pub mod purchase_order;

pub use category::CategoryService;
pub use product::ProductService;
pub use purchase_order::{OrderLine, PurchaseOrderService};
