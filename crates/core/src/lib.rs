pub mod client;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod notice;
pub mod progress;
pub mod request;
pub mod resource;
pub mod selection;

pub mod prelude {
    pub use crate::coordinator::{OperationCoordinator, OperationState, Phase};
    pub use crate::error::*;
    pub use crate::request::*;
    pub use crate::resource::ResourceType;
    pub use crate::selection::SelectionSet;
}
