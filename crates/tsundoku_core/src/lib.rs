pub mod bubble;
pub mod counters;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod scheduler;
pub mod shelf;

pub use bubble::BubbleService;
pub use domain::{
    Book, BookRef, BubbleState, BubbleStatus, NewBook, Reader, ReaderId, ReadingLevel,
    ShelfCounts, ShelfMembership, MAX_BUBBLE_COUNT,
};
pub use memory::MemoryStore;
pub use ports::{
    AddOutcome, BubbleStore, DecayOutcome, PortError, PortResult, ReaderStore, ShelfStore,
};
pub use scheduler::{BubbleScheduler, DecayReport};
pub use shelf::ShelfService;
