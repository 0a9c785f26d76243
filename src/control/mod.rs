//! Command dispatch: the single write path into device state.

mod dispatcher;
mod intent;

pub use dispatcher::CommandDispatcher;
pub use intent::Intent;
