pub mod conversation;
pub mod enums;
pub mod notification;
pub mod patient;
pub mod reminder;

pub use conversation::*;
pub use enums::*;
pub use notification::*;
pub use patient::*;
pub use reminder::*;
