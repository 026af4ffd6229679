pub mod controller;
pub mod link_channel;
