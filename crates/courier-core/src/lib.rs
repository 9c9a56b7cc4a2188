//! Dispatch engine for Courier.
//!
//! This crate routes inbound chat events to handlers, correlates inline
//! button taps with the handler that asked the question, and delivers every
//! reply through one serialized, retrying sender:
//!
//! - [`Matcher`] / [`HandlerRegistry`] - first-match routing in registration order
//! - [`ReplyTable`] - one-shot continuations keyed by sent message
//! - [`Dispatcher`] - the loop tying gateway updates to handlers and continuations
//! - [`OutboundSender`] / [`Outbox`] - the single consumer of the reply queue
//! - [`supervisor`] - panic-to-fault conversion with paste-sink reporting
//! - [`WatchedFolder`] - bounded polling for new entries in a folder
//! - [`codec`] - folding free text into `/name_token` command identifiers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_core::{
//!     outbound_queue, ChatGateway, Dispatcher, HandlerRegistry, Matcher, OutboundRequest,
//!     OutboundSender, ReplyTable,
//! };
//!
//! async fn serve(gateway: Arc<dyn ChatGateway>, updates: tokio::sync::mpsc::Receiver<courier_core::GatewayUpdate>) {
//!     let replies = Arc::new(ReplyTable::new());
//!     let (outbox, queue) = outbound_queue(64);
//!
//!     let mut registry = HandlerRegistry::new();
//!     let version_outbox = outbox.clone();
//!     registry.register(
//!         Matcher::command("/version").unwrap(),
//!         Arc::new(move |event, _caps| {
//!             let outbox = version_outbox.clone();
//!             tokio::spawn(async move {
//!                 let _ = outbox.send(OutboundRequest::text(event.origin, "v1")).await;
//!             });
//!         }),
//!     );
//!
//!     let sender = OutboundSender::new(Arc::clone(&gateway), Arc::clone(&replies));
//!     tokio::spawn(sender.run(queue));
//!
//!     Dispatcher::new(Arc::new(registry), replies, gateway).run(updates).await;
//! }
//! ```

pub mod codec;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gateway;
pub mod matcher;
pub mod outbound;
pub mod registry;
pub mod supervisor;
pub mod watch;

pub use correlation::{Continuation, ReplyTable};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{CoreError, Result, WatchError};
pub use event::{AttachedFile, GatewayUpdate, InboundEvent, InteractionReply, MessageRef};
pub use gateway::{ChatGateway, Choice, ChoiceSet, Document, OutgoingMessage};
pub use matcher::{Matcher, Pattern};
pub use outbound::{outbound_queue, OutboundRequest, OutboundSender, Outbox, MAX_MESSAGE_LEN};
pub use registry::{Handler, HandlerRegistry, Route};
pub use supervisor::{safe_call, supervise, PasteSink, TaskFault};
pub use watch::{DirectorySource, EntrySource, WatchedFolder};
