//! Payment gateway adapters.

mod mock_gateway;
mod razorpay_adapter;
mod wire_types;

pub use mock_gateway::MockPaymentGateway;
pub use razorpay_adapter::RazorpayGateway;
