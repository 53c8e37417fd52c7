//! Addresses, instruction encodings and account layouts of the Pole
//! pool program and the lending, staking and order-book programs it
//! settles against.

pub mod address;
pub mod error;
pub mod event;
pub mod instruction;
pub mod layout;
pub mod lending;
pub mod programs;
pub mod wire;

pub use address::AddressResolver;
pub use error::{ChainError, LayoutError};
pub use event::PoleEvent;
pub use instruction::PoleInstruction;
pub use layout::PoolAccount;
pub use programs::ProgramIds;
