pub mod messages;
pub mod websocket_server;

pub use messages::{
    Ack, ClientMessage, InboundReceiver, InboundSender, ServerEvent, create_inbound_channel,
    dispatch_frame,
};
pub use websocket_server::{serve, start_websocket_server};
