use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

//one train/test split; both segments are half-open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub index: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_end: NaiveDate,
}

impl WalkForwardWindow {
    //inclusive last day of the training segment
    pub fn train_last_day(&self) -> NaiveDate {
        self.train_end.pred_opt().unwrap_or(self.train_end)
    }

    //inclusive last day of the test segment
    pub fn test_last_day(&self) -> NaiveDate {
        self.test_end.pred_opt().unwrap_or(self.test_end)
    }
}

//slides (training, testing) forward by `step` months until a test window
//would end after `end`; month counts are assumed non-zero
pub fn generate_windows(
    start: NaiveDate,
    end: NaiveDate,
    training_months: u32,
    testing_months: u32,
    step_months: u32,
) -> Vec<WalkForwardWindow> {
    let mut windows = Vec::new();
    if training_months == 0 || testing_months == 0 || step_months == 0 {
        return windows;
    }

    for index in 0.. {
        let offset = match step_months.checked_mul(index as u32) {
            Some(offset) => offset,
            None => break,
        };

        let window = start
            .checked_add_months(Months::new(offset))
            .and_then(|train_start| {
                let train_end = train_start.checked_add_months(Months::new(training_months))?;
                let test_end = train_end.checked_add_months(Months::new(testing_months))?;
                Some(WalkForwardWindow {
                    index,
                    train_start,
                    train_end,
                    test_end,
                })
            });

        match window {
            Some(window) if window.test_end <= end => windows.push(window),
            _ => break,
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn two_years_yields_three_windows() {
        let windows = generate_windows(date(2020, 1, 1), date(2021, 12, 31), 12, 3, 3);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].train_start, date(2020, 1, 1));
        assert_eq!(windows[0].train_end, date(2021, 1, 1));
        assert_eq!(windows[0].test_end, date(2021, 4, 1));
        assert_eq!(windows[2].train_start, date(2020, 7, 1));
        assert_eq!(windows[2].test_end, date(2021, 10, 1));
        assert_eq!(windows[1].test_last_day(), date(2021, 6, 30));
    }

    #[test]
    fn test_window_ending_exactly_on_end_is_kept() {
        let windows = generate_windows(date(2020, 1, 1), date(2021, 4, 1), 12, 3, 3);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn range_shorter_than_one_window_is_empty() {
        assert!(generate_windows(date(2020, 1, 1), date(2020, 6, 30), 12, 3, 3).is_empty());
        assert!(generate_windows(date(2020, 1, 1), date(2030, 1, 1), 12, 3, 0).is_empty());
    }

    proptest! {
        #[test]
        fn windows_stay_in_range_and_advance(
            training in 1u32..24,
            testing in 1u32..12,
            step in 1u32..12,
            span in 0u32..96,
        ) {
            let start = date(2015, 1, 31);
            let end = start.checked_add_months(Months::new(span)).unwrap();
            let windows = generate_windows(start, end, training, testing, step);

            for (i, w) in windows.iter().enumerate() {
                prop_assert_eq!(w.index, i);
                prop_assert!(w.train_start < w.train_end);
                prop_assert!(w.train_end < w.test_end);
                prop_assert!(w.test_end <= end);
            }
            for pair in windows.windows(2) {
                prop_assert!(pair[0].train_start < pair[1].train_start);
            }
        }
    }
}
