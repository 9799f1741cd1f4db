use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::catalog::EventCatalog;
use crate::config::WeightConfig;
use crate::error::ScoringError;
use crate::models::{
    CodeSummary, DailyCount, DateRange, DriverReport, DriverTotal, EventCode, EventCount,
    EventRecord,
};

/// Weights as fractions in [0, 1]; codes without an entry weigh 0.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWeights {
    fractions: BTreeMap<EventCode, f64>,
}

impl NormalizedWeights {
    pub fn get(&self, code: EventCode) -> f64 {
        self.fractions.get(&code).copied().unwrap_or(0.0)
    }
}

pub fn validate_weights(weights: &WeightConfig) -> Result<NormalizedWeights, ScoringError> {
    let out_of_range: Vec<EventCode> = weights
        .iter()
        .filter(|(_, percent)| !(0..=100).contains(percent))
        .map(|(code, _)| code)
        .collect();
    let total: i64 = weights.iter().map(|(_, percent)| percent).sum();

    if !out_of_range.is_empty() || total != 100 {
        return Err(ScoringError::InvalidWeightSum {
            total,
            out_of_range,
        });
    }

    Ok(NormalizedWeights {
        fractions: weights
            .iter()
            .map(|(code, percent)| (code, percent as f64 / 100.0))
            .collect(),
    })
}

/// An event with its one-hot encoding over every code seen in the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatedRecord {
    pub record: EventRecord,
    pub indicators: BTreeMap<EventCode, u8>,
}

impl IndicatedRecord {
    pub fn indicator(&self, code: EventCode) -> u8 {
        self.indicators.get(&code).copied().unwrap_or(0)
    }
}

/// The loaded dataset with indicators derived once, independent of weights.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatedDataset {
    codes_present: Vec<EventCode>,
    rows: Vec<IndicatedRecord>,
}

impl IndicatedDataset {
    /// Distinct codes in order of first appearance.
    pub fn codes_present(&self) -> &[EventCode] {
        &self.codes_present
    }

    /// Codes a user may weight: present in the data and named by the catalog.
    pub fn offered_codes(&self, catalog: &EventCatalog) -> Vec<EventCode> {
        self.codes_present
            .iter()
            .copied()
            .filter(|code| catalog.contains(*code))
            .collect()
    }

    pub fn rows_in(&self, range: DateRange) -> Vec<&IndicatedRecord> {
        self.rows
            .iter()
            .filter(|row| range.contains(row.record.read_date()))
            .collect()
    }
}

pub fn derive_indicators(records: &[EventRecord]) -> IndicatedDataset {
    let mut codes_present: Vec<EventCode> = Vec::new();
    for record in records {
        if !codes_present.contains(&record.event_code) {
            codes_present.push(record.event_code);
        }
    }

    let rows = records
        .iter()
        .map(|record| IndicatedRecord {
            record: record.clone(),
            indicators: codes_present
                .iter()
                .map(|code| (*code, u8::from(*code == record.event_code)))
                .collect(),
        })
        .collect();

    IndicatedDataset {
        codes_present,
        rows,
    }
}

pub fn score_record(row: &IndicatedRecord, weights: &NormalizedWeights) -> f64 {
    row.indicators
        .iter()
        .map(|(code, indicator)| f64::from(*indicator) * weights.get(*code))
        .sum()
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredRecord<'a> {
    pub row: &'a IndicatedRecord,
    pub score: f64,
}

pub fn round_score(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Per-driver totals, highest first. Equal totals keep first-seen driver order.
pub fn aggregate_totals(scored: &[ScoredRecord<'_>]) -> Vec<DriverTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sums: Vec<(&str, f64)> = Vec::new();

    for entry in scored {
        let driver = entry.row.record.driver_id.as_str();
        let slot = *index.entry(driver).or_insert_with(|| {
            sums.push((driver, 0.0));
            sums.len() - 1
        });
        sums[slot].1 += entry.score;
    }

    let mut totals: Vec<DriverTotal> = sums
        .into_iter()
        .map(|(driver_id, sum)| DriverTotal {
            driver_id: driver_id.to_string(),
            total_score: round_score(sum),
        })
        .collect();

    // sort_by is stable, which preserves first-seen order on ties.
    totals.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    totals
}

pub fn top_n(totals: &[DriverTotal], limit: usize) -> &[DriverTotal] {
    &totals[..limit.min(totals.len())]
}

pub fn build_daily_series(rows: &[&IndicatedRecord]) -> Vec<DailyCount> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows {
        *per_day.entry(row.record.read_date()).or_insert(0) += 1;
    }

    per_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

/// Counts of catalogued, weighted and observed event types, in catalog order.
pub fn build_event_breakdown(
    rows: &[&IndicatedRecord],
    weights: &NormalizedWeights,
    codes_present: &[EventCode],
    catalog: &EventCatalog,
) -> Vec<EventCount> {
    catalog
        .entries()
        .filter(|(code, _)| codes_present.contains(code) && weights.get(*code) > 0.0)
        .filter_map(|(code, name)| {
            let count: usize = rows.iter().map(|row| usize::from(row.indicator(code))).sum();
            (count > 0).then(|| EventCount {
                event_code: code,
                event_name: name.to_string(),
                count,
            })
        })
        .collect()
}

/// Everything one "run" of the dashboard needs, captured at trigger time.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub weights: WeightConfig,
    pub driver_limit: usize,
    pub range: DateRange,
}

impl EvaluationRequest {
    /// Builds a request from user input, keeping only the codes the dataset
    /// offers for weighting. Returns the codes whose weights were dropped.
    pub fn for_dataset(
        dataset: &IndicatedDataset,
        catalog: &EventCatalog,
        weights: &WeightConfig,
        driver_limit: usize,
        range: DateRange,
    ) -> (Self, Vec<EventCode>) {
        let (weights, dropped) = weights.restrict_to(&dataset.offered_codes(catalog));
        let request = Self {
            weights,
            driver_limit,
            range,
        };
        (request, dropped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NoEventsFound,
    Ranked {
        drivers_scored: usize,
        reports: Vec<DriverReport>,
    },
}

pub fn evaluate(
    dataset: &IndicatedDataset,
    request: &EvaluationRequest,
    catalog: &EventCatalog,
) -> Result<Evaluation, ScoringError> {
    let weights = validate_weights(&request.weights)?;
    let rows = dataset.rows_in(request.range);
    tracing::debug!(
        rows = rows.len(),
        start = %request.range.start,
        end = %request.range.end,
        "filtered events to date range"
    );

    let activity: usize = rows
        .iter()
        .map(|row| row.indicators.values().map(|value| usize::from(*value)).sum::<usize>())
        .sum();
    if activity == 0 {
        return Ok(Evaluation::NoEventsFound);
    }

    let scored: Vec<ScoredRecord<'_>> = rows
        .iter()
        .copied()
        .map(|row| ScoredRecord {
            row,
            score: score_record(row, &weights),
        })
        .collect();
    let totals = aggregate_totals(&scored);

    let reports = top_n(&totals, request.driver_limit)
        .iter()
        .map(|total| {
            let driver_rows: Vec<&IndicatedRecord> = rows
                .iter()
                .copied()
                .filter(|row| row.record.driver_id == total.driver_id)
                .collect();
            DriverReport {
                driver_id: total.driver_id.clone(),
                total_score: total.total_score,
                daily_series: build_daily_series(&driver_rows),
                event_breakdown: build_event_breakdown(
                    &driver_rows,
                    &weights,
                    dataset.codes_present(),
                    catalog,
                ),
            }
        })
        .collect();

    Ok(Evaluation::Ranked {
        drivers_scored: totals.len(),
        reports,
    })
}

/// Per-code occurrence counts within `range`, in first-seen order.
pub fn summarize_codes(
    dataset: &IndicatedDataset,
    catalog: &EventCatalog,
    range: DateRange,
) -> Vec<CodeSummary> {
    let rows = dataset.rows_in(range);
    dataset
        .codes_present()
        .iter()
        .map(|code| CodeSummary {
            event_code: *code,
            event_name: catalog.name_for(*code).map(str::to_string),
            count: rows.iter().map(|row| usize::from(row.indicator(*code))).sum(),
            weightable: catalog.contains(*code),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|date| date.and_hms_opt(hour, 15, 0))
            .unwrap()
    }

    fn event(driver: &str, code: EventCode, day: u32, hour: u32) -> EventRecord {
        EventRecord {
            driver_id: driver.to_string(),
            event_code: code,
            read_timestamp: at(day, hour),
        }
    }

    fn march(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, end).unwrap(),
        )
    }

    fn request(weights: &[(EventCode, i64)], driver_limit: usize) -> EvaluationRequest {
        EvaluationRequest {
            weights: WeightConfig::from_pairs(weights.iter().copied()),
            driver_limit,
            range: march(1, 31),
        }
    }

    fn ranked(evaluation: Evaluation) -> Vec<DriverReport> {
        match evaluation {
            Evaluation::Ranked { reports, .. } => reports,
            Evaluation::NoEventsFound => panic!("expected ranked drivers"),
        }
    }

    fn sample_dataset() -> IndicatedDataset {
        derive_indicators(&[
            event("A", 16, 1, 8),
            event("A", 16, 1, 17),
            event("B", 25, 2, 9),
            event("A", 16, 3, 10),
        ])
    }

    #[test]
    fn weights_summing_to_hundred_pass() {
        let weights = validate_weights(&WeightConfig::from_pairs([(16, 100)])).unwrap();
        assert_eq!(weights.get(16), 1.0);
        assert_eq!(weights.get(25), 0.0);

        let weights =
            validate_weights(&WeightConfig::from_pairs([(16, 50), (25, 30), (28, 20)])).unwrap();
        assert_eq!(weights.get(25), 0.3);
    }

    #[test]
    fn weights_not_summing_to_hundred_fail() {
        let err = validate_weights(&WeightConfig::from_pairs([(16, 50), (25, 40)])).unwrap_err();
        assert_eq!(
            err,
            ScoringError::InvalidWeightSum {
                total: 90,
                out_of_range: vec![],
            }
        );
        assert!(validate_weights(&WeightConfig::default()).is_err());
    }

    #[test]
    fn out_of_range_weights_fail_even_when_sum_is_hundred() {
        let err = validate_weights(&WeightConfig::from_pairs([(16, 120), (25, -20)])).unwrap_err();
        assert_eq!(
            err,
            ScoringError::InvalidWeightSum {
                total: 100,
                out_of_range: vec![16, 25],
            }
        );
    }

    #[test]
    fn indicators_are_one_hot_over_codes_in_first_seen_order() {
        let dataset = sample_dataset();
        assert_eq!(dataset.codes_present(), &[16, 25]);

        let first = &dataset.rows[0];
        assert_eq!(first.indicator(16), 1);
        assert_eq!(first.indicator(25), 0);
        assert_eq!(first.indicators.len(), 2);
        assert!(dataset
            .rows
            .iter()
            .all(|row| row.indicators.values().map(|v| *v as u32).sum::<u32>() == 1));
    }

    #[test]
    fn record_score_uses_weight_of_its_code_only() {
        let dataset = sample_dataset();
        let weights = validate_weights(&WeightConfig::from_pairs([(16, 70), (25, 30)])).unwrap();
        assert_eq!(score_record(&dataset.rows[0], &weights), 0.7);
        assert_eq!(score_record(&dataset.rows[2], &weights), 0.3);
    }

    #[test]
    fn unweighted_codes_contribute_nothing() {
        let dataset = derive_indicators(&[event("A", 99, 1, 8)]);
        let weights = validate_weights(&WeightConfig::from_pairs([(16, 100)])).unwrap();
        assert_eq!(score_record(&dataset.rows[0], &weights), 0.0);
    }

    #[test]
    fn driver_total_is_count_times_weight() {
        let dataset = derive_indicators(&[
            event("A", 16, 1, 8),
            event("A", 16, 2, 8),
            event("A", 25, 2, 9),
        ]);
        let reports = ranked(
            evaluate(
                &dataset,
                &request(&[(16, 60), (25, 40)], 5),
                &EventCatalog::default(),
            )
            .unwrap(),
        );
        assert!((reports[0].total_score - 1.6).abs() < 1e-9);
    }

    #[test]
    fn shifting_weight_between_codes_is_linear() {
        let dataset = derive_indicators(&[event("A", 16, 1, 8), event("A", 25, 1, 9)]);
        let catalog = EventCatalog::default();
        for (w16, w25) in [(100, 0), (50, 50), (20, 80)] {
            let reports = ranked(
                evaluate(&dataset, &request(&[(16, w16), (25, w25)], 1), &catalog).unwrap(),
            );
            assert!((reports[0].total_score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn end_to_end_ranks_weighted_driver_first() {
        let reports = ranked(
            evaluate(
                &sample_dataset(),
                &request(&[(16, 100), (25, 0)], 1),
                &EventCatalog::default(),
            )
            .unwrap(),
        );

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.driver_id, "A");
        assert_eq!(report.total_score, 3.0);
        assert_eq!(
            report.daily_series,
            vec![
                DailyCount {
                    date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    count: 2,
                },
                DailyCount {
                    date: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
                    count: 1,
                },
            ]
        );
        assert_eq!(
            report.event_breakdown,
            vec![EventCount {
                event_code: 16,
                event_name: "Antena Violada".to_string(),
                count: 3,
            }]
        );
    }

    #[test]
    fn unweighted_driver_scores_zero() {
        let evaluation = evaluate(
            &sample_dataset(),
            &request(&[(16, 100)], 5),
            &EventCatalog::default(),
        )
        .unwrap();
        let reports = ranked(evaluation);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].driver_id, "B");
        assert_eq!(reports[1].total_score, 0.0);
        assert!(reports[1].event_breakdown.is_empty());
        assert_eq!(reports[1].daily_series.len(), 1);
    }

    #[test]
    fn ties_keep_first_seen_driver_order() {
        let dataset = derive_indicators(&[
            event("Z", 16, 1, 8),
            event("M", 16, 1, 9),
            event("A", 16, 1, 10),
            event("Q", 25, 1, 11),
        ]);
        let evaluation = evaluate(
            &dataset,
            &request(&[(16, 50), (25, 50)], 20),
            &EventCatalog::default(),
        )
        .unwrap();
        let order: Vec<String> = ranked(evaluation)
            .into_iter()
            .map(|report| report.driver_id)
            .collect();
        assert_eq!(order, vec!["Z", "M", "A", "Q"]);
    }

    #[test]
    fn top_n_returns_all_when_fewer_drivers_exist() {
        let totals = vec![DriverTotal {
            driver_id: "A".to_string(),
            total_score: 1.0,
        }];
        assert_eq!(top_n(&totals, 5).len(), 1);
        assert_eq!(top_n(&totals, 0).len(), 0);
    }

    #[test]
    fn totals_are_rounded_to_two_decimals() {
        assert_eq!(round_score(1.234), 1.23);
        assert_eq!(round_score(2.0000000000000004), 2.0);
        assert_eq!(round_score(0.125), 0.12);
    }

    #[test]
    fn events_outside_range_are_ignored() {
        let dataset = sample_dataset();
        let mut req = request(&[(16, 50), (25, 50)], 5);
        req.range = march(2, 3);

        let reports = ranked(evaluate(&dataset, &req, &EventCatalog::default()).unwrap());
        let a = reports.iter().find(|r| r.driver_id == "A").unwrap();
        assert_eq!(a.total_score, 0.5);
        assert_eq!(a.daily_series.len(), 1);
        assert_eq!(a.event_breakdown[0].count, 1);
    }

    #[test]
    fn empty_range_reports_no_events() {
        let mut req = request(&[(16, 100)], 5);
        req.range = march(20, 25);
        assert_eq!(
            evaluate(&sample_dataset(), &req, &EventCatalog::default()).unwrap(),
            Evaluation::NoEventsFound
        );

        let empty = derive_indicators(&[]);
        assert_eq!(
            evaluate(&empty, &request(&[(16, 100)], 5), &EventCatalog::default()).unwrap(),
            Evaluation::NoEventsFound
        );
    }

    #[test]
    fn reversed_range_reports_no_events() {
        let mut req = request(&[(16, 100)], 5);
        req.range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        );
        assert_eq!(
            evaluate(&sample_dataset(), &req, &EventCatalog::default()).unwrap(),
            Evaluation::NoEventsFound
        );
    }

    #[test]
    fn weights_for_uncatalogued_codes_are_dropped_before_validation() {
        let dataset = derive_indicators(&[event("A", 16, 1, 8), event("B", 99, 1, 9)]);
        let catalog = EventCatalog::default();
        let (req, dropped) = EvaluationRequest::for_dataset(
            &dataset,
            &catalog,
            &WeightConfig::from_pairs([(16, 50), (99, 50)]),
            5,
            march(1, 31),
        );

        assert_eq!(dropped, vec![99]);
        assert_eq!(
            evaluate(&dataset, &req, &catalog).unwrap_err(),
            ScoringError::InvalidWeightSum {
                total: 50,
                out_of_range: vec![],
            }
        );
    }

    #[test]
    fn offered_codes_left_unset_weigh_zero() {
        let dataset = sample_dataset();
        let catalog = EventCatalog::default();
        let (req, dropped) = EvaluationRequest::for_dataset(
            &dataset,
            &catalog,
            &WeightConfig::from_pairs([(16, 100)]),
            5,
            march(1, 31),
        );

        assert!(dropped.is_empty());
        assert_eq!(req.weights.get(25), Some(0));
        let reports = ranked(evaluate(&dataset, &req, &catalog).unwrap());
        assert_eq!(reports[0].total_score, 3.0);
    }

    #[test]
    fn empty_weight_input_fails_validation() {
        let dataset = sample_dataset();
        let catalog = EventCatalog::default();
        let (req, _) = EvaluationRequest::for_dataset(
            &dataset,
            &catalog,
            &WeightConfig::default(),
            5,
            march(1, 31),
        );
        assert!(matches!(
            evaluate(&dataset, &req, &catalog),
            Err(ScoringError::InvalidWeightSum { total: 0, .. })
        ));
    }

    #[test]
    fn repeated_readings_each_count() {
        let dataset = derive_indicators(&[event("A", 16, 1, 8), event("A", 16, 1, 8)]);
        let reports = ranked(
            evaluate(&dataset, &request(&[(16, 100)], 1), &EventCatalog::default()).unwrap(),
        );
        assert_eq!(reports[0].total_score, 2.0);
        assert_eq!(reports[0].daily_series[0].count, 2);
    }

    #[test]
    fn invalid_weights_stop_evaluation_before_activity_check() {
        let empty = derive_indicators(&[]);
        assert!(evaluate(&empty, &request(&[(16, 10)], 5), &EventCatalog::default()).is_err());
    }

    #[test]
    fn zero_weight_events_are_left_out_of_breakdown() {
        let dataset = derive_indicators(&[
            event("A", 16, 1, 8),
            event("A", 25, 1, 9),
            event("A", 99, 1, 10),
        ]);
        let reports = ranked(
            evaluate(
                &dataset,
                &request(&[(16, 100), (25, 0)], 1),
                &EventCatalog::default(),
            )
            .unwrap(),
        );
        let names: Vec<&str> = reports[0]
            .event_breakdown
            .iter()
            .map(|entry| entry.event_name.as_str())
            .collect();
        assert_eq!(names, vec!["Antena Violada"]);
        assert_eq!(reports[0].daily_series[0].count, 3);
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let dataset = sample_dataset();
        let req = request(&[(16, 40), (25, 60)], 5);
        let catalog = EventCatalog::default();
        assert_eq!(
            evaluate(&dataset, &req, &catalog).unwrap(),
            evaluate(&dataset, &req, &catalog).unwrap()
        );
    }

    #[test]
    fn offered_codes_require_catalog_entry() {
        let dataset = derive_indicators(&[event("A", 99, 1, 8), event("A", 25, 1, 9)]);
        assert_eq!(dataset.offered_codes(&EventCatalog::default()), vec![25]);
    }

    #[test]
    fn code_summary_counts_within_range() {
        let summary = summarize_codes(&sample_dataset(), &EventCatalog::default(), march(1, 2));
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[1].event_name.as_deref(), Some("Bateria Violada"));
        assert!(summary[1].weightable);
    }
}
