//! The job's four roles: Dealer (rank 0), Farmer (rank 1), Outputter
//! (rank 2), and Workers (ranks 3..N-1). Each role is a single-threaded
//! loop that owns its local state exclusively and talks to the others
//! only through the [transport](crate::transport).

pub mod dealer;
pub mod farmer;
pub mod outputter;
pub mod worker;

pub use dealer::DealerVariant;
