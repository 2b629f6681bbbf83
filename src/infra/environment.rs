use crate::infra::{Action, AgentError};
use crate::perception::Frame;

/// The game the agent plays against: a screen it can read and a keyboard it can type on.
///
/// Calls never overlap. The runner awaits each one before issuing the next.
#[allow(async_fn_in_trait)]
pub trait Environment {
    /// Current screen, or None when the session cannot be observed.
    async fn read_frame(&mut self) -> Result<Option<Frame>, AgentError>;

    /// Deliver one input token.
    async fn send_action(&mut self, action: Action) -> Result<(), AgentError>;

    fn is_active(&self) -> bool;
}
