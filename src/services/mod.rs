// Business services shared through the axum state
pub mod agent_service;
pub mod ai_service;
pub mod game_store;
pub mod invoice_poller;
pub mod subscription_service;

pub use agent_service::AgentService;
pub use ai_service::AIService;
pub use game_store::GameStore;
pub use invoice_poller::PollConfig;
pub use subscription_service::{PaymentEvent, SubscriptionService};
