use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Standard toleranse (%) rundt forventet kurve før status endres.
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 10.0;

/// W/kg-økning per uke som regnes som oppnåelig / krevende. Heuristikk.
pub const ACHIEVABLE_WEEKLY_GAIN: f64 = 0.015;
pub const CHALLENGING_WEEKLY_GAIN: f64 = 0.025;

/// Mål: gå fra `start_wkg` til `target_wkg` mellom to datoer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub start_wkg: f64,
    pub target_wkg: f64,
    pub start_date: NaiveDateTime,
    pub target_date: NaiveDateTime,
}

impl Goal {
    /// Mål med datoer ved midnatt.
    pub fn new(start_wkg: f64, target_wkg: f64, start_date: NaiveDate, target_date: NaiveDate) -> Self {
        Self {
            start_wkg,
            target_wkg,
            start_date: start_date.and_time(NaiveTime::MIN),
            target_date: target_date.and_time(NaiveTime::MIN),
        }
    }

    /// Sjekker tidslinje og W/kg-spenn. Brukes når mål lagres; `status`
    /// tåler ugyldige mål og gir `Critical`.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.start_wkg > 0.0) || !(self.target_wkg > 0.0) {
            return Err(CoreError::MalformedGoal("W/kg must be positive".into()));
        }
        if self.target_date <= self.start_date {
            return Err(CoreError::MalformedGoal(
                "target_date must be after start_date".into(),
            ));
        }
        if self.target_wkg <= self.start_wkg {
            return Err(CoreError::MalformedGoal(
                "target_wkg must be greater than start_wkg".into(),
            ));
        }
        Ok(())
    }

    pub fn total_days(&self) -> i64 {
        whole_days(self.target_date - self.start_date)
    }

    pub fn wkg_improvement_needed(&self) -> f64 {
        self.target_wkg - self.start_wkg
    }

    /// Hele dager igjen til måldato, aldri negativt.
    pub fn days_remaining_at(&self, now: NaiveDateTime) -> i64 {
        whole_days(self.target_date - now).max(0)
    }

    pub fn weeks_remaining_at(&self, now: NaiveDateTime) -> f64 {
        self.days_remaining_at(now) as f64 / 7.0
    }
}

/// Hele dager, rundet ned (også for negative spenn).
fn whole_days(d: Duration) -> i64 {
    d.num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Ahead,
    OnTrack,
    Behind,
    Critical,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Ahead => "ahead",
            GoalStatus::OnTrack => "on_track",
            GoalStatus::Behind => "behind",
            GoalStatus::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GoalStatus::Ahead => "Ahead",
            GoalStatus::OnTrack => "On Track",
            GoalStatus::Behind => "Behind",
            GoalStatus::Critical => "Critical",
        }
    }

    pub fn on_pace(&self) -> bool {
        matches!(self, GoalStatus::Ahead | GoalStatus::OnTrack)
    }
}

/// Hvor realistisk nødvendig ukentlig fremgang er.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampDifficulty {
    Achieved,
    Achievable,
    Challenging,
    VeryDifficult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalConfig {
    pub tolerance_percent: f64,
    pub achievable_weekly_gain: f64,
    pub challenging_weekly_gain: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            achievable_weekly_gain: ACHIEVABLE_WEEKLY_GAIN,
            challenging_weekly_gain: CHALLENGING_WEEKLY_GAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub current_wkg: f64,
    pub target_wkg: f64,
    /// Ikke klampet: >100 er foran målet, <0 under utgangspunktet.
    pub progress_percentage: f64,
    pub wkg_remaining: f64,
    pub days_remaining: i64,
    pub weeks_remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    #[serde(flatten)]
    pub progress: GoalProgress,
    pub status: GoalStatus,
    pub status_label: String,
    pub required_weekly_gain: f64,
    pub expected_wkg_now: f64,
    pub ahead_behind_wkg: f64,
    pub on_pace: bool,
    pub ramp_difficulty: RampDifficulty,
}

/// Ren kalkulator for målfremgang mot en lineær kurve.
///
/// Klokken er injisert: `GoalTracker::new` bruker lokal tid ved hvert kall,
/// `GoalTracker::at` låser "nå" (tester, historiske visninger).
#[derive(Debug, Clone, Default)]
pub struct GoalTracker {
    config: GoalConfig,
    fixed_now: Option<NaiveDateTime>,
}

impl GoalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            config: GoalConfig::default(),
            fixed_now: Some(now),
        }
    }

    pub fn with_config(mut self, config: GoalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GoalConfig {
        &self.config
    }

    pub fn now(&self) -> NaiveDateTime {
        self.fixed_now.unwrap_or_else(|| Local::now().naive_local())
    }

    fn current_wkg(current_ftp: f64, weight_kg: f64) -> CoreResult<f64> {
        if !(weight_kg > 0.0) {
            return Err(CoreError::InvalidInput(format!(
                "weight_kg must be positive, got {weight_kg}"
            )));
        }
        if !current_ftp.is_finite() {
            return Err(CoreError::InvalidInput(format!(
                "current_ftp must be finite, got {current_ftp}"
            )));
        }
        Ok(current_ftp / weight_kg)
    }

    pub fn progress(&self, current_ftp: f64, weight_kg: f64, goal: &Goal) -> CoreResult<GoalProgress> {
        let current_wkg = Self::current_wkg(current_ftp, weight_kg)?;
        let total_improvement = goal.wkg_improvement_needed();
        let progress_percentage = if total_improvement > 0.0 {
            (current_wkg - goal.start_wkg) / total_improvement * 100.0
        } else {
            0.0
        };
        let now = self.now();

        Ok(GoalProgress {
            current_wkg,
            target_wkg: goal.target_wkg,
            progress_percentage,
            wkg_remaining: goal.target_wkg - current_wkg,
            days_remaining: goal.days_remaining_at(now),
            weeks_remaining: goal.weeks_remaining_at(now),
        })
    }

    /// W/kg per uke som trengs for å nå målet i tide; 0 når datoen er passert.
    pub fn required_weekly_gain(&self, goal: &Goal, current_wkg: f64) -> f64 {
        let weeks = goal.weeks_remaining_at(self.now());
        if weeks <= 0.0 {
            return 0.0;
        }
        (goal.target_wkg - current_wkg) / weeks
    }

    /// Status mot lineær kurve fra start til mål.
    ///
    /// Tidsandelen klampes *ikke*: etter måldato ekstrapoleres kurven forbi
    /// `target_wkg`. Ugyldig tidslinje (`total_days <= 0`) gir alltid `Critical`.
    pub fn status(
        &self,
        current_ftp: f64,
        weight_kg: f64,
        goal: &Goal,
        tolerance_percent: f64,
    ) -> CoreResult<GoalStatus> {
        let total_days = goal.total_days();
        if total_days <= 0 {
            log::warn!("mål med ugyldig tidslinje ({total_days} dager), status = critical");
            return Ok(GoalStatus::Critical);
        }
        let current_wkg = Self::current_wkg(current_ftp, weight_kg)?;

        let elapsed_days = whole_days(self.now() - goal.start_date);
        let time_progress = elapsed_days as f64 / total_days as f64;
        let total_improvement = goal.wkg_improvement_needed();
        let expected_wkg = goal.start_wkg + total_improvement * time_progress;

        let deviation_percent = if total_improvement > 0.0 {
            (current_wkg - expected_wkg) / total_improvement * 100.0
        } else {
            0.0
        };

        Ok(classify(deviation_percent, tolerance_percent))
    }

    /// Forventet W/kg på en gitt dato, med tidsandel klampet til [0, 1].
    pub fn expected_wkg_at(&self, goal: &Goal, date: NaiveDateTime) -> f64 {
        let total_days = goal.total_days();
        if total_days <= 0 {
            return goal.start_wkg;
        }
        let elapsed_days = whole_days(date - goal.start_date);
        let time_progress = (elapsed_days as f64 / total_days as f64).clamp(0.0, 1.0);
        goal.start_wkg + goal.wkg_improvement_needed() * time_progress
    }

    pub fn ramp_difficulty(&self, weekly_gain: f64) -> RampDifficulty {
        if weekly_gain <= 0.0 {
            RampDifficulty::Achieved
        } else if weekly_gain <= self.config.achievable_weekly_gain {
            RampDifficulty::Achievable
        } else if weekly_gain <= self.config.challenging_weekly_gain {
            RampDifficulty::Challenging
        } else {
            RampDifficulty::VeryDifficult
        }
    }

    /// Samlet øyeblikksbilde; beregnes på nytt ved hvert kall.
    pub fn summary(&self, current_ftp: f64, weight_kg: f64, goal: &Goal) -> CoreResult<GoalSummary> {
        // Lås klokken slik at alle delberegninger bruker samme "nå".
        let tracker = GoalTracker {
            config: self.config.clone(),
            fixed_now: Some(self.now()),
        };

        let progress = tracker.progress(current_ftp, weight_kg, goal)?;
        let status = tracker.status(current_ftp, weight_kg, goal, tracker.config.tolerance_percent)?;
        let required_weekly_gain = tracker.required_weekly_gain(goal, progress.current_wkg);
        let expected_wkg_now = tracker.expected_wkg_at(goal, tracker.now());

        Ok(GoalSummary {
            ahead_behind_wkg: progress.current_wkg - expected_wkg_now,
            progress,
            status,
            status_label: status.label().to_string(),
            required_weekly_gain,
            expected_wkg_now,
            on_pace: status.on_pace(),
            ramp_difficulty: tracker.ramp_difficulty(required_weekly_gain),
        })
    }
}

fn classify(deviation_percent: f64, tolerance: f64) -> GoalStatus {
    if deviation_percent > tolerance {
        GoalStatus::Ahead
    } else if deviation_percent >= -tolerance {
        GoalStatus::OnTrack
    } else if deviation_percent >= -2.0 * tolerance {
        GoalStatus::Behind
    } else {
        GoalStatus::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(10.01, 10.0), GoalStatus::Ahead);
        assert_eq!(classify(10.0, 10.0), GoalStatus::OnTrack);
        assert_eq!(classify(-10.0, 10.0), GoalStatus::OnTrack);
        assert_eq!(classify(-10.01, 10.0), GoalStatus::Behind);
        assert_eq!(classify(-20.0, 10.0), GoalStatus::Behind);
        assert_eq!(classify(-20.01, 10.0), GoalStatus::Critical);
    }

    #[test]
    fn whole_days_floors_negative_spans() {
        assert_eq!(whole_days(Duration::hours(-1)), -1);
        assert_eq!(whole_days(Duration::hours(47)), 1);
    }
}
