//! Quota decisions and window timing.

mod decision;
mod gate;
mod key;
mod window;

pub use decision::{Decision, Usage};
pub use gate::{QuotaGate, DEFAULT_LIMIT};
pub use key::{QuotaKey, MAX_KEY_LEN};
pub use window::Window;
