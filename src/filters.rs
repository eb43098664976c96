use tracing::warn;

use crate::config::{SourceConfig, MAIN_SOURCES_BOUNDARY};
use crate::errors::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Main,
    ExcludeMain,
    Id(i32),
    Range { from: Option<i32>, to: Option<i32> },
}

/// A parsed source selection: `main`, `exclude main`, single ids, ranges
/// (`a-b`, `-b`, `a-`), or any comma-separated mix of those.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    raw: String,
    segments: Vec<Segment>,
}

impl SourceFilter {
    pub fn parse(input: &str) -> Result<SourceFilter, ConfigError> {
        let mut segments = Vec::new();

        for part in input.split(',') {
            let part = part.trim();

            let segment = match part {
                "" => return Err(ConfigError::Filter(input.to_string())),
                "main" => Segment::Main,
                "exclude main" => Segment::ExcludeMain,
                _ => parse_ids(part).ok_or_else(|| ConfigError::Filter(input.to_string()))?,
            };

            segments.push(segment);
        }

        Ok(SourceFilter {
            raw: input.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, id: i32) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Main => id < MAIN_SOURCES_BOUNDARY,
            Segment::ExcludeMain => id >= MAIN_SOURCES_BOUNDARY,
            Segment::Id(wanted) => id == *wanted,
            Segment::Range { from, to } => from.map_or(true, |f| id >= f) && to.map_or(true, |t| id <= t),
        })
    }

    /// Ids the operator named one by one. Used to warn about entries that
    /// are not in the catalog; ranges and the main/custom selectors stay
    /// silent about gaps.
    fn explicit_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Id(id) => Some(*id),
            _ => None,
        })
    }

    /// Applies the filter to the catalog, warning about explicitly named
    /// ids with no catalog entry. An empty selection is the caller's error
    /// to raise.
    pub fn select<'a>(&self, sources: &'a [SourceConfig]) -> Vec<&'a SourceConfig> {
        for id in self.explicit_ids() {
            if !sources.iter().any(|source| source.id == id) {
                warn!(id, "the filter names a source that is not in the catalog");
            }
        }

        sources.iter().filter(|source| self.matches(source.id)).collect()
    }
}

fn parse_ids(part: &str) -> Option<Segment> {
    if !part.contains('-') {
        return part.parse::<i32>().ok().map(Segment::Id);
    }

    let (from, to) = part.split_once('-')?;
    let from = match from.trim() {
        "" => None,
        raw => Some(raw.parse::<i32>().ok()?),
    };
    let to = match to.trim() {
        "" => None,
        raw => Some(raw.parse::<i32>().ok()?),
    };

    // a bare dash selects nothing meaningful
    if from.is_none() && to.is_none() {
        return None;
    }

    Some(Segment::Range { from, to })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i32) -> SourceConfig {
        let yaml = format!("id: {id}\nparent: /data");
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn main_selects_curated_ids() {
        let filter = SourceFilter::parse("main").unwrap();
        assert!(filter.matches(1));
        assert!(filter.matches(999));
        assert!(!filter.matches(1000));
    }

    #[test]
    fn exclude_main_selects_custom_ids() {
        let filter = SourceFilter::parse("exclude main").unwrap();
        assert!(!filter.matches(999));
        assert!(filter.matches(1000));
        assert!(filter.matches(5000));
    }

    #[test]
    fn mixed_lists_and_ranges() {
        let filter = SourceFilter::parse("1,5,10-20,50-").unwrap();
        assert!(filter.matches(1));
        assert!(filter.matches(5));
        assert!(!filter.matches(6));
        assert!(filter.matches(10));
        assert!(filter.matches(20));
        assert!(!filter.matches(21));
        assert!(filter.matches(50));
        assert!(filter.matches(99999));
    }

    #[test]
    fn open_start_range() {
        let filter = SourceFilter::parse("-10").unwrap();
        assert!(filter.matches(0));
        assert!(filter.matches(10));
        assert!(!filter.matches(11));
    }

    #[test]
    fn rejects_garbage() {
        assert!(SourceFilter::parse("").is_err());
        assert!(SourceFilter::parse("1,,2").is_err());
        assert!(SourceFilter::parse("abc").is_err());
        assert!(SourceFilter::parse("-").is_err());
        assert!(SourceFilter::parse("1-2-3").is_err());
    }

    #[test]
    fn selects_from_catalog() {
        let catalog = vec![source(1), source(180), source(1002)];

        let filter = SourceFilter::parse("main").unwrap();
        let selected = filter.select(&catalog);
        assert_eq!(selected.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 180]);

        let filter = SourceFilter::parse("1002").unwrap();
        let selected = filter.select(&catalog);
        assert_eq!(selected.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1002]);

        // names a missing id; still returns what does match
        let filter = SourceFilter::parse("1,42").unwrap();
        let selected = filter.select(&catalog);
        assert_eq!(selected.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);
    }
}
