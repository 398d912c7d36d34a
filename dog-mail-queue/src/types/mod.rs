pub mod ids;
pub mod category;
pub mod priority;
pub mod message;
pub mod job;
pub mod capabilities;
pub mod events;

pub use ids::JobId;
pub use category::EmailCategory;
pub use priority::Priority;
pub use message::{EmailContent, EmailMessage};
pub use job::EmailJob;
pub use capabilities::StoreCapabilities;
pub use events::JobEvent;
