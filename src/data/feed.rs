use crate::data::DataError;
use crate::events::BarEvent;
use chrono::NaiveDate;

//source of historical bars; shared read-only across optimizer workers
pub trait DataFeed: Send + Sync {
    //bars for a symbol whose date lies in [start, end], in feed order
    fn load_historical_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BarEvent>, DataError>;

    fn all_bars(&self) -> &[BarEvent];

    //first and last bar dates, if any
    fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let bars = self.all_bars();
        let first = bars.iter().map(|b| b.timestamp().date_naive()).min()?;
        let last = bars.iter().map(|b| b.timestamp().date_naive()).max()?;
        Some((first, last))
    }
}

//bars held in memory, served in the order given
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataFeed {
    bars: Vec<BarEvent>,
}

impl InMemoryDataFeed {
    pub fn new(bars: Vec<BarEvent>) -> Self {
        InMemoryDataFeed { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl DataFeed for InMemoryDataFeed {
    fn load_historical_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BarEvent>, DataError> {
        Ok(self
            .bars
            .iter()
            .filter(|bar| bar.symbol == symbol)
            .filter(|bar| {
                let date = bar.timestamp().date_naive();
                date >= start && date <= end
            })
            .cloned()
            .collect())
    }

    fn all_bars(&self) -> &[BarEvent] {
        &self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(symbol: &str, day: u32, close: f64) -> BarEvent {
        let ts = Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap();
        BarEvent::new(symbol, ts, close, close, close, close, 100.0, None).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    #[test]
    fn filters_symbol_and_inclusive_range() {
        let feed = InMemoryDataFeed::new(vec![
            bar("ES", 1, 100.0),
            bar("NQ", 2, 200.0),
            bar("ES", 2, 101.0),
            bar("ES", 3, 102.0),
            bar("ES", 4, 103.0),
        ]);

        let bars = feed.load_historical_data("ES", date(2), date(3)).unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![101.0, 102.0]);
    }

    #[test]
    fn keeps_feed_order() {
        let feed = InMemoryDataFeed::new(vec![bar("ES", 3, 3.0), bar("ES", 1, 1.0)]);
        let bars = feed.load_historical_data("ES", date(1), date(31)).unwrap();
        assert_eq!(bars[0].close, 3.0);
        assert_eq!(bars[1].close, 1.0);
    }

    #[test]
    fn reports_date_range() {
        let feed = InMemoryDataFeed::new(vec![bar("ES", 5, 1.0), bar("ES", 2, 1.0)]);
        assert_eq!(feed.date_range(), Some((date(2), date(5))));
        assert_eq!(InMemoryDataFeed::default().date_range(), None);
    }
}
