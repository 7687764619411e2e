use crate::data::{DataError, DataFeed, InMemoryDataFeed};
use crate::events::BarEvent;
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    turnover: Option<f64>,
    symbol: String,
}

//rfc 3339 timestamps, or plain dates taken as midnight utc
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

//loads bars from a csv file, sorted by timestamp
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<BarEvent>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let line = index + 2;
        let record: CsvRecord = result?;

        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| DataError::Timestamp {
                line,
                value: record.timestamp.clone(),
            })?;

        //ohlc ordering is left to the engine's bar gate
        let bar = BarEvent::new(
            record.symbol,
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
            record.turnover,
        )
        .map_err(|source| DataError::InvalidBar { line, source })?;

        bars.push(bar);
    }

    //stable, so same-timestamp rows keep file order
    bars.sort_by_key(|bar| bar.timestamp());

    Ok(bars)
}

//writes bars in the format load_csv reads
pub fn write_csv<P: AsRef<Path>>(path: P, bars: &[BarEvent]) -> Result<(), DataError> {
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path.as_ref())?;
    for bar in bars {
        writer.serialize(CsvRecord {
            timestamp: bar.timestamp().to_rfc3339(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            turnover: bar.turnover,
            symbol: bar.symbol.clone(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

//csv file loaded once into memory
#[derive(Debug, Clone)]
pub struct CsvDataFeed {
    inner: InMemoryDataFeed,
}

impl CsvDataFeed {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let bars = load_csv(path)?;
        Ok(CsvDataFeed {
            inner: InMemoryDataFeed::new(bars),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl DataFeed for CsvDataFeed {
    fn load_historical_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BarEvent>, DataError> {
        self.inner.load_historical_data(symbol, start, end)
    }

    fn all_bars(&self) -> &[BarEvent] {
        self.inner.all_bars()
    }
}
