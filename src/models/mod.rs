pub mod adherence;
pub mod alert;
pub mod conversation;
pub mod enums;
pub mod medication;
pub mod profile;

pub use adherence::*;
pub use alert::*;
pub use conversation::*;
pub use enums::*;
pub use medication::*;
pub use profile::*;
