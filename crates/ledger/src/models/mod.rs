//! Domain models for the inventory ledger.

pub mod customer_order;
pub mod inventory_lot;
pub mod purchase_order;
pub mod stock_change;
pub mod variant;

pub use customer_order::{
    CustomerInfo, CustomerOrder, CustomerOrderItem, CustomerOrderWithItems, NewCustomerOrder,
    NewCustomerOrderItem, OrderItemInput, PaymentMeta, UpdateCustomerOrderInput,
};
pub use inventory_lot::{InventoryLot, LotWithOrigin, NewLot};
pub use purchase_order::{
    NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderWithItems,
};
pub use stock_change::{NewStockChange, OrderRef, StockChangeEntry};
pub use variant::{NewVariant, ProductVariant};
