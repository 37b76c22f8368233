mod account;
mod ids;
mod sub_entry;
pub mod traits;

pub use account::Account;
pub use ids::{AccountId, SubEntryId};
pub use sub_entry::{Direction, SubEntry, SubEntryStatus};
