pub mod money;
pub mod receipt;
pub mod settlement;

pub use money::Won;
pub use receipt::{ExtractionResult, MenuItem};
pub use settlement::{
    equal_split, itemized_split, AssignedItem, RemainderPolicy, Settlement, SettlementError,
};
