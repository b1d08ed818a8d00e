// Third-party platform clients
pub mod coinbase;
pub mod http;
pub mod lightning;
pub mod llm;
pub mod moralis;
pub mod sandbox;
pub mod strike;
pub mod stripe;

pub use coinbase::CoinbaseClient;
pub use lightning::{InvoiceGateway, InvoiceIssuer, InvoiceRequest, InvoiceStatusSource};
pub use llm::ChatRouter;
pub use moralis::MoralisClient;
pub use sandbox::SandboxGateway;
pub use strike::StrikeClient;
pub use stripe::StripeClient;
