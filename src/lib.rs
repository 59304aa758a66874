pub mod backend;
pub mod config;
pub mod controller;
pub mod inbox;
pub mod message;
pub mod status;
pub mod view;

pub use backend::{BackendError, BackendMode, Label, PredictionBackend, PredictionRequest};
pub use config::Config;
pub use controller::ClassificationController;
pub use inbox::{InboxClient, InboxSource};
pub use message::Message;
pub use status::{ClassificationStatus, IconStyle, StatusPresenter};
pub use view::InboxView;
