pub mod feishu;
pub mod manager;

pub use feishu::{FeishuClient, DEFAULT_BASE_URL};
pub use manager::DeliveryManager;

pub mod prelude {
    pub use super::{DeliveryManager, FeishuClient};
    pub use fb_core::{Destination, MessageTransport, OutgoingMessage};
}
