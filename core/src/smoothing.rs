use std::collections::{BTreeMap, VecDeque};

use chrono::{Duration, NaiveDate};

/// Én verdi per kalenderdag: dagens maksimum når flere punkter faller på samme dag.
pub fn daily_max<I>(points: I) -> BTreeMap<NaiveDate, f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut out: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (day, v) in points {
        if !v.is_finite() {
            continue;
        }
        out.entry(day)
            .and_modify(|cur| *cur = cur.max(v))
            .or_insert(v);
    }
    out
}

/// Rullende maksimum over et bakoverskuende vindu på `window_days` dager
/// (inkludert dagen selv), for hver kalenderdag fra første til siste punkt.
///
/// Dager uten aktivitet får vinduets maksimum videreført; en dag der hele
/// vinduet er tomt hoppes over.
pub fn rolling_max_by_day(daily: &BTreeMap<NaiveDate, f64>, window_days: u32) -> Vec<(NaiveDate, f64)> {
    let (Some((&first, _)), Some((&last, _))) = (daily.iter().next(), daily.iter().next_back()) else {
        return Vec::new();
    };
    let window = i64::from(window_days.max(1));

    // Monoton kø (dag, verdi) med synkende verdier
    let mut queue: VecDeque<(NaiveDate, f64)> = VecDeque::new();
    let mut out = Vec::new();

    let mut day = first;
    while day <= last {
        if let Some(&v) = daily.get(&day) {
            while queue.back().is_some_and(|&(_, b)| b <= v) {
                queue.pop_back();
            }
            queue.push_back((day, v));
        }
        let oldest = day - Duration::days(window - 1);
        while queue.front().is_some_and(|&(d, _)| d < oldest) {
            queue.pop_front();
        }
        if let Some(&(_, max)) = queue.front() {
            out.push((day, max));
        }
        day += Duration::days(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn daily_max_keeps_highest_per_day() {
        let daily = daily_max([(d(1, 1), 250.0), (d(1, 1), 262.0), (d(1, 2), 240.0)]);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[&d(1, 1)], 262.0);
    }

    #[test]
    fn window_drops_old_values() {
        let daily = daily_max([(d(1, 1), 300.0), (d(1, 3), 200.0)]);
        let out = rolling_max_by_day(&daily, 2);
        // 1. jan: 300, 2. jan: 300 (videreført), 3. jan: 300 har falt ut
        assert_eq!(out, vec![(d(1, 1), 300.0), (d(1, 2), 300.0), (d(1, 3), 200.0)]);
    }

    #[test]
    fn gap_longer_than_window_is_skipped() {
        let daily = daily_max([(d(1, 1), 300.0), (d(1, 5), 200.0)]);
        let out = rolling_max_by_day(&daily, 1);
        assert_eq!(out, vec![(d(1, 1), 300.0), (d(1, 5), 200.0)]);
    }

    #[test]
    fn empty_input() {
        assert!(rolling_max_by_day(&BTreeMap::new(), 42).is_empty());
    }
}
