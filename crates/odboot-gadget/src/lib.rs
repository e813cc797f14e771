//! Device side of odboot: a FunctionFS function with one bulk OUT endpoint
//! that writes uploaded files into fixed slots.

pub mod descriptors;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod session;
pub mod shutdown;

pub use error::GadgetError;
pub use event_loop::{LoopExit, run};
pub use session::{BulkEndpoint, Closed, GadgetSession, SlotTable};
pub use shutdown::{ShutdownSignal, forward_signals};
