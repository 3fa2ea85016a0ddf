//! Per-record emission: one text row in, at most one `(label, 1)` out.

use geo::Point;

use crate::config::RecordConfig;
use crate::pip::FeatureIndex;

/// Label for points no feature contains
pub const OUTSIDE_LABEL: &str = "[Points Outside Polygons]";
/// Label for matched features lacking the key attribute
pub const UNKNOWN_LABEL: &str = "Unknown";

/// What happened to a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No usable longitude/latitude; dropped silently
    Unparsable,
    /// Filter column present but did not contain the filter text
    Filtered,
    /// `feature` is `None` for the outside label
    Emitted {
        label: String,
        feature: Option<usize>,
    },
}

impl RecordOutcome {
    pub fn into_emission(self) -> Option<(String, u64)> {
        match self {
            RecordOutcome::Emitted { label, .. } => Some((label, 1)),
            _ => None,
        }
    }
}

/// Strip double quotes and split a raw row on commas.
pub fn split_fields(line: &str) -> Vec<String> {
    normalize_fields(line.split(','))
}

/// Strip double quotes from each field. Trailing empty fields are dropped,
/// so `1,2,` has two fields.
pub fn normalize_fields<'s, I>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut fields: Vec<String> = fields.into_iter().map(|f| f.replace('"', "")).collect();
    while fields.last().map_or(false, |f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Classifies records against a shared, already-built index
pub struct Emitter<'a> {
    index: &'a FeatureIndex,
    config: &'a RecordConfig,
    filter_text: String,
}

impl<'a> Emitter<'a> {
    pub fn new(index: &'a FeatureIndex, config: &'a RecordConfig) -> Self {
        Self {
            index,
            config,
            filter_text: config.filter_text.to_lowercase(),
        }
    }

    /// `emit(rawLine)`: the emission for one raw text row, if any
    pub fn emit(&self, line: &str) -> Option<(String, u64)> {
        self.evaluate(&split_fields(line)).into_emission()
    }

    /// Evaluate already split, quote-stripped fields
    pub fn evaluate<S: AsRef<str>>(&self, fields: &[S]) -> RecordOutcome {
        let Some(point) = self.location(fields) else {
            return RecordOutcome::Unparsable;
        };

        if !self.passes_filter(fields) {
            return RecordOutcome::Filtered;
        }

        match self.index.classify(point) {
            Some(i) => RecordOutcome::Emitted {
                label: self.label_for(i),
                feature: Some(i),
            },
            None => RecordOutcome::Emitted {
                label: OUTSIDE_LABEL.to_string(),
                feature: None,
            },
        }
    }

    fn location<S: AsRef<str>>(&self, fields: &[S]) -> Option<Point<f64>> {
        let parse =
            |column: usize| -> Option<f64> { fields.get(column)?.as_ref().trim().parse().ok() };
        let lon = parse(self.config.longitude_column)?;
        let lat = parse(self.config.latitude_column)?;
        Some(Point::new(lon, lat))
    }

    /// A filter column beyond the end of this row leaves the row unfiltered
    fn passes_filter<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        match self.config.filter_column.and_then(|c| fields.get(c)) {
            Some(value) => value.as_ref().to_lowercase().contains(&self.filter_text),
            None => true,
        }
    }

    fn label_for(&self, feature: usize) -> String {
        self.index
            .feature(feature)
            .and_then(|f| f.attribute(&self.config.key_attribute))
            .map(|value| value.to_string().replace('"', ""))
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }
}
