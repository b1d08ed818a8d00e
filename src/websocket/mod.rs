// Real-time streams
pub mod payments;
