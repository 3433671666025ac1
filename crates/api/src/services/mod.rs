//! In-process saga participants.
//!
//! Each service keeps its state in memory and answers the fulfillment saga's
//! commands through a [`saga::CommandDispatcher`]. Failure toggles let tests
//! and demos force the compensation path.

pub mod inventory;
pub mod payment;
pub mod shipping;

pub use inventory::InMemoryInventoryService;
pub use payment::InMemoryPaymentService;
pub use shipping::InMemoryShippingService;
