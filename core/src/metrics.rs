use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::types::Variant;

/// Tellere for tabell-cachen. Eies av den som lager repositoryet og
/// deles via `Arc`, slik at hver prosess/test har sitt eget register.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    table_loads: IntCounterVec,
    table_cache_hits: IntCounterVec,
    stream_misses: IntCounter,
}

impl Metrics {
    /// Oppretter og registrerer tellerne. Feiler bare ved ugyldige
    /// metrikknavn eller duplikater i registeret.
    pub fn try_new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let table_loads = IntCounterVec::new(
            Opts::new(
                "activities_table_loads_total",
                "Antall ganger en aktivitetstabell er lest fra disk",
            ),
            &["variant"],
        )?;
        let table_cache_hits = IntCounterVec::new(
            Opts::new(
                "activities_table_cache_hits_total",
                "Antall oppslag servert fra cache",
            ),
            &["variant"],
        )?;
        let stream_misses = IntCounter::new(
            "activities_stream_misses_total",
            "Stream-filer som manglet eller ikke kunne leses",
        )?;

        registry.register(Box::new(table_loads.clone()))?;
        registry.register(Box::new(table_cache_hits.clone()))?;
        registry.register(Box::new(stream_misses.clone()))?;

        Ok(Self {
            registry,
            table_loads,
            table_cache_hits,
            stream_misses,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

pub fn table_loads_total(metrics: &Metrics, variant: Variant) -> IntCounter {
    metrics.table_loads.with_label_values(&[variant.as_str()])
}

pub fn table_cache_hits_total(metrics: &Metrics, variant: Variant) -> IntCounter {
    metrics.table_cache_hits.with_label_values(&[variant.as_str()])
}

pub fn stream_misses_total(metrics: &Metrics) -> &IntCounter {
    &metrics.stream_misses
}
