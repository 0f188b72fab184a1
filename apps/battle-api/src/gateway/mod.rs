pub mod events;
pub mod fanout;
pub mod handler;
pub mod reconcile;
pub mod server;
