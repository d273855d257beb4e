//! LINE Messaging API channel
//!
//! Webhook payload types and signature check, the reply / profile HTTP
//! clients, public media URLs, and [`LineHandler`], the conversation
//! state machine that ties them to the stores and the image composer.

pub mod event;
pub mod handler;
pub mod media;
pub mod mention;
pub mod messages;
pub mod profile;
pub mod reply;
pub mod signature;

pub use event::{Event, EventMessage, Mention, Mentionee, Source, WebhookPayload};
pub use handler::{CallbackResponse, HandlerConfig, HandlerDeps, LineHandler, Outgoing};
pub use media::{LocalMediaStore, MediaStore};
pub use mention::strip_mentions;
pub use messages::{QuickReply, QuickReplyItem, ReplyMessage};
pub use profile::{LineProfileClient, ProfileLookup};
pub use reply::{LineReplyClient, ReplyClient};
pub use signature::{sign, verify_signature};
