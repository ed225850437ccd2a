//! Platform probe annotation: probe identifier to gene symbol

use std::collections::HashMap;

/// Symbols that platform tables use to mean "no gene"
const MISSING_SYMBOLS: [&str; 3] = ["---", "NA", "N/A"];

/// Separator used by GPL tables for probes mapping to several genes
const MULTI_SYMBOL_SEPARATOR: &str = "///";

/// Probe to gene symbol mapping for one array platform (many-to-one)
#[derive(Debug, Clone, Default)]
pub struct ProbeAnnotation {
    symbols: HashMap<String, String>,
}

impl ProbeAnnotation {
    /// Build an annotation from (probe, raw symbol) pairs
    ///
    /// Probes with a blank or placeholder symbol are skipped. Multi-gene entries
    /// (`"A /// B"`) keep the first symbol. The first row for a repeated probe wins.
    pub fn from_pairs<I, P, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: AsRef<str>,
    {
        let mut symbols = HashMap::new();
        for (probe, raw) in pairs {
            if let Some(symbol) = clean_symbol(raw.as_ref()) {
                symbols.entry(probe.into()).or_insert(symbol);
            }
        }
        Self { symbols }
    }

    /// Gene symbol for a probe, if annotated
    pub fn symbol(&self, probe: &str) -> Option<&str> {
        self.symbols.get(probe).map(String::as_str)
    }

    /// Number of annotated probes
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn clean_symbol(raw: &str) -> Option<String> {
    let first = raw.split(MULTI_SYMBOL_SEPARATOR).next().unwrap_or("").trim();
    if first.is_empty() || MISSING_SYMBOLS.contains(&first) {
        None
    } else {
        Some(first.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_cleaning() {
        let annotation = ProbeAnnotation::from_pairs(vec![
            ("1007_s_at", "DDR1 /// MIR4640"),
            ("1053_at", "RFC2"),
            ("117_at", ""),
            ("121_at", "---"),
            ("1053_at", "OTHER"),
        ]);

        assert_eq!(annotation.symbol("1007_s_at"), Some("DDR1"));
        assert_eq!(annotation.symbol("1053_at"), Some("RFC2"));
        assert_eq!(annotation.symbol("117_at"), None);
        assert_eq!(annotation.symbol("121_at"), None);
        assert_eq!(annotation.len(), 2);
    }
}
