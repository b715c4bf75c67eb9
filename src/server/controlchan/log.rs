use crate::server::controlchan::{error::ControlChanError, middleware::ControlChanMiddleware, Event, Reply};
use async_trait::async_trait;

// Logs every event and the reply it produced, with a per-session sequence
// number so interleaved sessions can be told apart in aggregated logs.
pub struct LoggingMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    pub logger: slog::Logger,
    pub sequence_nr: u64,
    pub next: Next,
}

#[async_trait]
impl<Next> ControlChanMiddleware for LoggingMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    async fn handle(&mut self, event: Event) -> Result<Reply, ControlChanError> {
        self.sequence_nr += 1;
        slog::debug!(self.logger, "Processing event {:?}", event; "seq" => self.sequence_nr);
        let result = self.next.handle(event).await;
        match &result {
            Ok(reply) => slog::debug!(self.logger, "Reply: {:?}", reply; "seq" => self.sequence_nr),
            Err(error) => slog::warn!(self.logger, "Event handler error: {:?}", error; "seq" => self.sequence_nr),
        }
        result
    }
}
