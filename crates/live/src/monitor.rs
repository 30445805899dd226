//! The live loop: file event → header → tracker → check → broadcast.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use mrqa_compliance::{CheckContext, TemplateChecker};
use mrqa_core::{field_or_null, FieldMap, ParamField, SERIES_NUMBER, STATION};
use mrqa_ingest::FieldReader;
use mrqa_store::TemplateTable;

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::event::LiveEvent;
use crate::tracker::SeriesSignature;

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// How often the template table is rebuilt from storage.
    pub template_refresh: Duration,
    /// Stations silent this long are forgotten; `None` keeps them forever.
    pub station_idle: Option<Duration>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            template_refresh: Duration::from_secs(300),
            station_idle: None,
        }
    }
}

pub struct LiveMonitor {
    reader: Arc<dyn FieldReader>,
    checker: TemplateChecker,
    broadcaster: Broadcaster,
    templates: RwLock<TemplateTable>,
    settings: MonitorSettings,
}

impl LiveMonitor {
    pub fn new(
        reader: Arc<dyn FieldReader>,
        checker: TemplateChecker,
        broadcaster: Broadcaster,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            reader,
            checker,
            broadcaster,
            templates: RwLock::new(TemplateTable::default()),
            settings,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Process one finished file and publish what it means.
    pub async fn handle_file(&self, path: &Path) -> LiveEvent {
        let fields = self.reader.read(path).await;
        let event = self.classify(&fields).await;
        self.broadcaster.publish(&event);
        event
    }

    async fn classify(&self, fields: &FieldMap) -> LiveEvent {
        let station = field_or_null(fields, STATION).to_string();
        let signature = SeriesSignature::new(
            field_or_null(fields, SERIES_NUMBER),
            field_or_null(fields, ParamField::SequenceName.as_str()),
        );

        let observation = self
            .broadcaster
            .tracker()
            .write()
            .await
            .on_event(&station, signature.clone());

        if !observation.is_new {
            debug!(station = %station, repeat = observation.repeat_count, "series repeat");
            return LiveEvent::Update {
                station,
                content: observation.repeat_count,
            };
        }

        let record = {
            let table = self.templates.read().await;
            self.checker
                .check_with_table(&table, fields, CheckContext::Realtime)
        };
        if !record.conforms {
            warn!(
                station = %station,
                series = %signature.series,
                sequence = %signature.sequence,
                errors = %record.error_summary(),
                "acquisition does not conform to template"
            );
        }

        // The tracker may have moved on while the check ran.
        self.broadcaster
            .tracker()
            .write()
            .await
            .record_result(&station, &signature, record.clone());

        LiveEvent::New {
            station,
            content: record,
        }
    }

    /// Rebuild the template table and expire idle stations.
    pub async fn refresh(&self) -> Result<()> {
        let table = self.checker.inferencer().recompute().await?;
        *self.templates.write().await = table;

        if let Some(max_idle) = self.settings.station_idle {
            self.broadcaster
                .tracker()
                .write()
                .await
                .expire_idle(max_idle, Instant::now());
        }
        Ok(())
    }

    /// Run until the event channel closes.
    ///
    /// The first refresh happens immediately. A failed refresh keeps the
    /// previous template table.
    pub async fn run(self, mut files: mpsc::Receiver<PathBuf>) {
        let period = self.settings.template_refresh.max(Duration::from_secs(1));
        let mut refresh = tokio::time::interval(period);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(refresh_secs = period.as_secs(), "live monitor started");
        loop {
            tokio::select! {
                maybe_path = files.recv() => {
                    let Some(path) = maybe_path else {
                        info!("file event channel closed, live monitor stopping");
                        break;
                    };
                    self.handle_file(&path).await;
                }
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "template refresh failed, keeping previous table");
                    }
                }
            }
        }
    }
}
