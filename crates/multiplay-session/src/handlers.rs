//! Handlers for the messages every session understands.
//!
//! They are registered before any application handler, so an application
//! that registers the same id replaces the built-in one.

use multiplay_protocol::{
    HandlerId, InitialResponse, LocationUpdate, PingData, ProtocolError, Response,
};

use crate::dispatcher::{DispatchContext, DispatcherBuilder, Handler};
use crate::SessionEvent;

/// A builder holding the INIT, LOCATION_UPDATE and PING handlers.
pub fn builtin_handlers() -> DispatcherBuilder {
    DispatcherBuilder::new()
        .register(HandlerId::INIT, InitHandler)
        .register(HandlerId::LOCATION_UPDATE, LocationHandler)
        .register(HandlerId::PING, PingHandler)
}

/// Handshake answer: applies the sequencing decision and starts pinging.
#[derive(Debug, Default)]
pub struct InitHandler;

impl Handler for InitHandler {
    fn handle(&self, response: &Response, ctx: &DispatchContext<'_>) -> Result<(), ProtocolError> {
        // Empty acks carry nothing to apply.
        if response.data.is_empty() {
            return Ok(());
        }
        let init: InitialResponse = response.decode_data()?;
        let outbox = ctx.outbox();

        if let Some(sequencing) = init.sequencing {
            outbox.set_sequencing(sequencing);
        }
        tracing::info!(
            user_id = %init.user_id,
            x = init.x,
            y = init.y,
            sequencing = outbox.sequencing(),
            "handshake complete"
        );
        ctx.emit(SessionEvent::HandshakeComplete(init));

        if outbox.heartbeat().enabled && !outbox.start_heartbeat() {
            tracing::debug!("heartbeat already running");
        }
        Ok(())
    }
}

/// World positions broadcast by the server.
#[derive(Debug, Default)]
pub struct LocationHandler;

impl Handler for LocationHandler {
    fn handle(&self, response: &Response, ctx: &DispatchContext<'_>) -> Result<(), ProtocolError> {
        // An empty body decodes to an empty list.
        let update: LocationUpdate = response.decode_data()?;
        tracing::trace!(users = update.users.len(), "location update");
        ctx.emit(SessionEvent::LocationUpdated(update.users));
        Ok(())
    }
}

/// Pong: records latency and schedules the next ping.
#[derive(Debug, Default)]
pub struct PingHandler;

impl Handler for PingHandler {
    fn handle(&self, response: &Response, ctx: &DispatchContext<'_>) -> Result<(), ProtocolError> {
        if response.data.is_empty() {
            return Ok(());
        }
        let pong: PingData = response.decode_data()?;
        let outbox = ctx.outbox();

        let sample = outbox.latency().record_pong(pong.timestamp);
        ctx.emit(SessionEvent::LatencyUpdated(sample));

        let heartbeat = outbox.heartbeat();
        if heartbeat.enabled {
            outbox.schedule_ping(heartbeat.interval);
        }
        Ok(())
    }
}
