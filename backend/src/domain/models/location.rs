//! Location paths of the form `Plot > Bed`.
use serde::{Deserialize, Serialize};

/// Separator between location paths in the stored `location_path` column
pub const LOCATION_LIST_SEPARATOR: char = ';';

/// Separator between plot and bed inside one path
pub const PATH_SEPARATOR: char = '>';

/// A single parsed location path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPath {
    pub plot: String,
    pub bed: Option<String>,
}

impl LocationPath {
    /// Parse `"Plot A > Bed 1"`. The bed part is optional; a blank plot yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(2, PATH_SEPARATOR);
        let plot = parts.next().unwrap_or("").trim();
        if plot.is_empty() {
            return None;
        }
        let bed = parts
            .next()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        Some(Self {
            plot: plot.to_string(),
            bed,
        })
    }

    pub fn as_path(&self) -> String {
        match &self.bed {
            Some(bed) => format!("{} {} {}", self.plot, PATH_SEPARATOR, bed),
            None => self.plot.clone(),
        }
    }
}

/// Split a stored location column into its ordered paths, dropping blank segments
pub fn split_locations(joined: &str) -> Vec<String> {
    joined
        .split(LOCATION_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join paths for storage
pub fn join_locations(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plot_and_bed() {
        let path = LocationPath::parse(" Talhão 3 >  Canteiro 7 ").unwrap();
        assert_eq!(path.plot, "Talhão 3");
        assert_eq!(path.bed.as_deref(), Some("Canteiro 7"));
        assert_eq!(path.as_path(), "Talhão 3 > Canteiro 7");
    }

    #[test]
    fn test_parse_plot_only_and_blank() {
        let path = LocationPath::parse("Estufa").unwrap();
        assert_eq!(path.bed, None);
        assert!(LocationPath::parse("  > Canteiro 1").is_none());
    }

    #[test]
    fn test_split_and_join_preserve_order() {
        let paths = split_locations("Plot A > Bed 2;Plot A > Bed 1; ;Plot B");
        assert_eq!(paths, vec!["Plot A > Bed 2", "Plot A > Bed 1", "Plot B"]);
        assert_eq!(join_locations(&paths), "Plot A > Bed 2; Plot A > Bed 1; Plot B");
        assert!(split_locations("").is_empty());
    }
}
