//! Rehydration: reconstructing a persisted conversation in memory
//! without replaying its live event stream.
//!
//! The canonical snapshot and the display log are fetched independently
//! because neither is derivable from the other: the canonical log lacks
//! the custom-signal records, the display log lacks tool bookkeeping.

use colloquy_protocol::{decode_snapshot, display, DisplayItem, ThreadId};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transcript::{project, RenderSink};

impl Client {
    /// Switch to a persisted conversation.
    ///
    /// Both retrievals run concurrently and commit together: on any
    /// failure the previous session, transcript, and sink are left
    /// untouched. On success the sink is cleared and the new transcript
    /// projected from scratch.
    pub async fn rehydrate(
        &mut self,
        thread_id: ThreadId,
        sink: &mut dyn RenderSink,
    ) -> Result<()> {
        let (envelope, records) = tokio::try_join!(
            self.transport.snapshot_envelope(&thread_id),
            self.transport.display_log(&thread_id),
        )
        .map_err(Error::rehydration)?;

        // The stored envelope must hold exactly one messages snapshot.
        let messages = decode_snapshot(&envelope)?;
        let items: Vec<DisplayItem> = records.iter().filter_map(display::project_record).collect();

        tracing::debug!(
            %thread_id,
            messages = messages.len(),
            items = items.len(),
            skipped = records.len() - items.len(),
            "rehydrated conversation"
        );

        let mut session = Session::new(thread_id);
        session.replace_all(messages);
        self.session = session;
        self.transcript = items;

        sink.clear();
        sink.render(&project(&self.transcript));
        Ok(())
    }
}
