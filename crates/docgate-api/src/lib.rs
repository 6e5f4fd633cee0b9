pub mod action;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod normalize;
pub mod router;
pub mod transfer;
pub mod validate;

pub use router::{AppState, GatewayOptions, gateway_router};
