pub mod poll;
pub mod protocol;
pub mod sender;
pub mod session;

pub use poll::PollOutcome;
pub use protocol::{Ack, Bet, WinnersStatus};
pub use sender::{BetSource, SenderOutcome};
