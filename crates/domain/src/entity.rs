//! Entity values — what the host reports for the sensors a room watches,
//! and the attributes a room publishes alongside its derived state.

mod attribute_value;
mod state_value;

pub use attribute_value::{AttributeValue, Attributes};
pub use state_value::StateValue;
