//! Chunked fused linear + KTO loss.
//!
//! The forward pass owns its own gradient accumulation instead of leaving a
//! full-batch graph behind: each chunk is lifted into a fresh autodiff graph,
//! differentiated immediately, and folded into running buffers. The returned
//! [`KtoContext`] replays those buffers, scaled by the upstream gradient, when
//! the caller is ready to backpropagate.

mod api;
mod backward;
mod forward;
mod types;


pub use api::{fused_linear_kto, FusedLinearKtoFunction, FusedLinearKtoLoss};
pub use forward::fused_forward;
pub use types::{KtoContext, KtoForwardOutput, KtoGradients};
