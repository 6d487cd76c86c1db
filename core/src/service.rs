//! Oppslag mot aktivitetsdata for visningslaget.
//!
//! Ren videresending: all tilstand ligger i repositoryet, og tjenesten
//! velger bare variant ut fra [`MetricView`].

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::error::CoreResult;
use crate::repository::ActivityRepository;
use crate::types::{Activity, MetricView, Table, Variant, YearSummary};

#[derive(Debug)]
pub struct ActivityService<R> {
    repo: R,
}

impl<R: ActivityRepository> ActivityService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn get_table(&self, view: MetricView) -> CoreResult<Arc<Table>> {
        self.repo.get_table(view.variant())
    }

    pub fn get_activity(&self, activity_id: i64, view: MetricView) -> CoreResult<Option<Activity>> {
        self.repo.get_activity(activity_id, view.variant())
    }

    /// Aktiviteter 1. jan – 31. des (inkludert) for året.
    pub fn get_activities_for_year(&self, year: i32, view: MetricView) -> CoreResult<Vec<Activity>> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1);
        let end = NaiveDate::from_ymd_opt(year, 12, 31);
        if start.is_none() || end.is_none() {
            return Ok(Vec::new());
        }
        self.repo.get_activities(view.variant(), start, end)
    }

    /// Hele tabellen (kopi) for valgt visning.
    pub fn get_all_activities(&self, view: MetricView) -> CoreResult<Table> {
        Ok(self.get_table(view)?.as_ref().clone())
    }

    /// De `count` nyeste aktivitetene.
    pub fn get_recent_activities(&self, count: usize, view: MetricView) -> CoreResult<Table> {
        // Tabellen er allerede sortert synkende ved lasting.
        Ok(self.get_table(view)?.head(count))
    }

    pub fn get_activity_stream(&self, activity_id: i64) -> Table {
        self.repo.get_stream(activity_id)
    }

    pub fn get_year_summary(&self, year: i32) -> CoreResult<YearSummary> {
        self.repo.get_year_summary(year)
    }

    /// Distinkte år med aktiviteter, nyeste først.
    pub fn available_years(&self, view: MetricView) -> CoreResult<Vec<i32>> {
        let table = self.get_table(view)?;
        let mut years: Vec<i32> = table
            .iter()
            .filter_map(|r| r.local_start().map(|ts| ts.year()))
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }

    pub fn invalidate(&self) {
        self.repo.invalidate();
    }

    /// Tabell for en eksplisitt variant, uten visningsvalg.
    pub fn get_variant(&self, variant: Variant) -> CoreResult<Arc<Table>> {
        self.repo.get_table(variant)
    }
}
