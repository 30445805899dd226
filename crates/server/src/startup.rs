//! Building the shared services from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use mrqa_compliance::{parse_field_list, Comparator, ComparisonRules, TemplateChecker};
use mrqa_core::Config;
use mrqa_ingest::{HeaderDumpReader, TagList};
use mrqa_live::{Broadcaster, MonitorSettings, StationTracker};
use mrqa_store::{ParameterStore, TemplateInferencer};

pub async fn open_store(config: &Config) -> anyhow::Result<ParameterStore> {
    let store = ParameterStore::sqlite(&config.storage.db_url, config.storage.max_connections)
        .await
        .with_context(|| format!("opening {}", config.storage.db_url))?;
    info!(db_url = %config.storage.db_url, "parameter store ready");
    Ok(store)
}

pub fn build_checker(config: &Config, store: ParameterStore) -> anyhow::Result<TemplateChecker> {
    let rules = ComparisonRules::load(config.compliance.rules_file.as_deref())
        .context("loading comparison rules")?;
    let allow_null = parse_field_list(&config.compliance.allow_null)
        .context("parsing MRQA_ALLOW_NULL")?;
    Ok(TemplateChecker::new(
        TemplateInferencer::new(store),
        Comparator::new(rules),
        allow_null,
    ))
}

pub fn build_reader(config: &Config) -> anyhow::Result<Arc<HeaderDumpReader>> {
    let tags = TagList::load(config.reader.taglist.as_deref()).context("loading tag list")?;
    Ok(Arc::new(HeaderDumpReader::new(config.reader.command.clone(), tags)))
}

pub fn build_broadcaster(config: &Config) -> Broadcaster {
    Broadcaster::new(config.watch.event_queue, StationTracker::shared())
}

pub fn monitor_settings(config: &Config) -> MonitorSettings {
    MonitorSettings {
        template_refresh: Duration::from_secs(config.watch.template_refresh_secs),
        station_idle: match config.watch.station_idle_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    }
}
