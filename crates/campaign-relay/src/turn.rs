//! Turn orchestration: drain the completion stream through the marker scanner,
//! merge confirmed fields, push events, and hand off the finished record.

use std::collections::HashSet;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use campaign_core::{
    extract_markers, CampaignEvent, CampaignState, FieldMap, Marker, MarkerScanner, ScanItem,
    SessionStore, TurnError,
};
use campaign_llm::CompletionProvider;

use crate::config::TurnConfig;
use crate::prompt::build_messages;

pub type Result<T> = std::result::Result<T, TurnError>;

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Every field is present; the record was handed off and the session removed.
    Completed(CampaignState),
    /// Stream ended normally with fields still missing; the session persists.
    Exhausted { missing_fields: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Idle,
    Streaming,
    Completing,
    Exhausted,
    ErrorTerminated,
}

/// Run one turn to termination.
///
/// Fatal failures are reported on `event_tx` as an `error` event (unless the
/// client is already gone) and returned. Merges applied before a failure are kept.
pub async fn run_turn(
    request: &TurnRequest,
    store: &dyn SessionStore,
    provider: &dyn CompletionProvider,
    event_tx: &mpsc::Sender<CampaignEvent>,
    cancel_token: &CancellationToken,
    config: &TurnConfig,
) -> Result<TurnOutcome> {
    let mut turn = Turn::new(&request.session_id, store, event_tx);
    log::info!("[{}] Turn started", turn.session_id);

    match turn
        .drive(&request.message, provider, cancel_token, config)
        .await
    {
        Ok(outcome) => {
            log::info!(
                "[{}] Turn finished in phase {:?}, {} field(s) confirmed",
                turn.session_id,
                turn.phase,
                turn.emitted.len()
            );
            Ok(outcome)
        }
        Err(err) => {
            let failed_in = turn.phase;
            turn.phase = TurnPhase::ErrorTerminated;
            if err.is_reportable() {
                log::error!(
                    "[{}] Turn failed while {:?}: {}",
                    turn.session_id,
                    failed_in,
                    err
                );
                let _ = event_tx.send(CampaignEvent::error(err.to_string())).await;
            } else {
                log::info!("[{}] Turn stopped while {:?}: {}", turn.session_id, failed_in, err);
            }
            Err(err)
        }
    }
}

struct Turn<'a> {
    session_id: &'a str,
    store: &'a dyn SessionStore,
    events: &'a mpsc::Sender<CampaignEvent>,
    scanner: MarkerScanner,
    /// Raw model output of this turn, markers included.
    transcript: String,
    /// Field names already reported this turn.
    emitted: HashSet<String>,
    phase: TurnPhase,
}

impl<'a> Turn<'a> {
    fn new(
        session_id: &'a str,
        store: &'a dyn SessionStore,
        events: &'a mpsc::Sender<CampaignEvent>,
    ) -> Self {
        Self {
            session_id,
            store,
            events,
            scanner: MarkerScanner::new(),
            transcript: String::new(),
            emitted: HashSet::new(),
            phase: TurnPhase::Idle,
        }
    }

    async fn drive(
        &mut self,
        message: &str,
        provider: &dyn CompletionProvider,
        cancel_token: &CancellationToken,
        config: &TurnConfig,
    ) -> Result<TurnOutcome> {
        let state = self.store.get(self.session_id).await?;
        log::debug!(
            "[{}] Loaded state, missing: {:?}",
            self.session_id,
            state.missing_fields()
        );
        let messages = build_messages(self.store.schema(), &state, message, config);

        if cancel_token.is_cancelled() {
            return Err(TurnError::Cancelled);
        }

        self.phase = TurnPhase::Streaming;
        let mut stream = provider
            .chat_stream(&messages, config.temperature)
            .await
            .map_err(|e| TurnError::Upstream(e.to_string()))?;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(TurnError::Cancelled),
                next = stream.next() => next,
            };
            let Some(delta) = next else {
                break;
            };
            let delta = delta.map_err(|e| TurnError::Upstream(e.to_string()))?;
            self.on_fragment(&delta).await?;
        }
        drop(stream);

        self.finish(config).await
    }

    async fn on_fragment(&mut self, delta: &str) -> Result<()> {
        self.transcript.push_str(delta);

        let mut fresh = FieldMap::new();
        for item in self.scanner.feed(delta) {
            match item {
                ScanItem::Text(text) => self.emit(CampaignEvent::text(text)).await?,
                ScanItem::Marker(marker) => self.collect(marker, &mut fresh),
                ScanItem::Malformed(span) => self.drop_malformed(span),
            }
        }

        self.commit(fresh, |_| true).await
    }

    async fn finish(&mut self, config: &TurnConfig) -> Result<TurnOutcome> {
        if let Some(rest) = self.scanner.flush() {
            self.emit(CampaignEvent::text(rest)).await?;
        }

        // The full transcript is authoritative: the last occurrence of a field wins,
        // but only fields not yet reported this turn get a state event.
        let mut latest = FieldMap::new();
        let mut unreported = HashSet::new();
        for marker in extract_markers(&self.transcript) {
            if !self.store.schema().contains(&marker.name) {
                if self.emitted.insert(marker.name.clone()) {
                    log::debug!(
                        "[{}] Ignoring field '{}' outside the schema",
                        self.session_id,
                        marker.name
                    );
                }
                continue;
            }
            if self.emitted.insert(marker.name.clone()) {
                unreported.insert(marker.name.clone());
            }
            let value = marker.decode();
            latest.insert(marker.name, value);
        }
        if !unreported.is_empty() {
            log::debug!(
                "[{}] Final parse recovered {} field(s)",
                self.session_id,
                unreported.len()
            );
        }
        self.commit(latest, |name| unreported.contains(name)).await?;

        match self.store.take_complete(self.session_id).await? {
            Some(data) => {
                self.phase = TurnPhase::Completing;
                log::info!("[{}] Campaign complete, handing off", self.session_id);
                self.emit(CampaignEvent::Complete {
                    message: config.completion_message.clone(),
                    data: data.clone(),
                })
                .await?;
                Ok(TurnOutcome::Completed(data))
            }
            None => {
                self.phase = TurnPhase::Exhausted;
                let missing_fields = self.store.missing_fields(self.session_id).await?;
                Ok(TurnOutcome::Exhausted { missing_fields })
            }
        }
    }

    /// Queue a marker's value unless its field was already reported this turn.
    fn collect(&mut self, marker: Marker, fresh: &mut FieldMap) {
        if !self.emitted.insert(marker.name.clone()) {
            log::debug!(
                "[{}] Field '{}' already recorded this turn",
                self.session_id,
                marker.name
            );
            return;
        }

        let value = marker.decode();
        if !self.store.schema().contains(&marker.name) {
            log::debug!(
                "[{}] Ignoring field '{}' outside the schema: {:?}",
                self.session_id,
                marker.name,
                value
            );
            return;
        }
        fresh.insert(marker.name, value);
    }

    fn drop_malformed(&self, span: String) {
        let err = TurnError::MalformedMarker(span);
        debug_assert!(!err.is_fatal());
        log::warn!("[{}] Dropping marker: {}", self.session_id, err);
    }

    /// Merge `fields`, then report the ones selected by `report` in one state event.
    async fn commit(&mut self, fields: FieldMap, report: impl Fn(&str) -> bool) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let state = self.store.merge(self.session_id, &fields).await?;
        log::debug!(
            "[{}] Merged fields: {:?}",
            self.session_id,
            fields.keys().collect::<Vec<_>>()
        );

        let partial_data: FieldMap = fields
            .into_iter()
            .filter(|(name, _)| report(name))
            .collect();
        if partial_data.is_empty() {
            return Ok(());
        }
        self.emit(CampaignEvent::State {
            partial_data,
            missing_fields: state.missing_fields(),
        })
        .await
    }

    async fn emit(&self, event: CampaignEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| TurnError::ClientDisconnected)
    }
}
