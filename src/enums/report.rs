//! The debug report printed when debug logging is on.

use std::{collections::HashMap, fmt};

use log::info;

use crate::{
    compiler::{EventKind, EventLog},
    enums::{EnumDataMap, Reason, ReasonKind},
    program::symbols::{Symbols, TypeRef},
};

/// Summary of one unboxing analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Canonical names of the unboxed enums, sorted.
    pub unboxed: Vec<String>,
    /// Rejected enums with their reasons and multiplicities, sorted by
    /// reason count and then by name. Pinned-only enums are not listed here.
    pub ineligible: Vec<(String, Vec<(String, usize)>)>,
    /// Enums whose only reason is [`Reason::Pinned`], sorted.
    pub pinned: Vec<String>,
    /// Totals per reason kind, most frequent first.
    pub totals: Vec<(ReasonKind, usize)>,
}

impl AnalysisReport {
    /// Builds the report from the final data and the recorded rejections.
    #[must_use]
    pub fn build(
        symbols: &Symbols,
        data: &EnumDataMap,
        rejections: &[(TypeRef, Vec<Reason>)],
    ) -> Self {
        let mut unboxed: Vec<String> = data
            .unboxed_types()
            .iter()
            .map(|ty| symbols.source_name(*ty))
            .collect();
        unboxed.sort();

        let mut totals: HashMap<ReasonKind, usize> = HashMap::new();
        let mut pinned = Vec::new();
        let mut ineligible: Vec<(usize, String, Vec<(String, usize)>)> = Vec::new();
        for (ty, reasons) in rejections {
            if reasons.is_empty() || data.is_unboxed(*ty) {
                continue;
            }
            for reason in reasons {
                *totals.entry(reason.kind()).or_default() += 1;
            }
            let name = symbols.source_name(*ty);
            if reasons.iter().all(|r| matches!(r, Reason::Pinned)) {
                pinned.push(name);
                continue;
            }

            let mut counted: Vec<(String, usize)> = Vec::new();
            for reason in reasons {
                let described = reason.describe(symbols);
                match counted.iter_mut().find(|(d, _)| *d == described) {
                    Some((_, count)) => *count += 1,
                    None => counted.push((described, 1)),
                }
            }
            ineligible.push((reasons.len(), name, counted));
        }
        pinned.sort();
        ineligible.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut totals: Vec<(ReasonKind, usize)> = totals.into_iter().collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));

        Self {
            unboxed,
            ineligible: ineligible
                .into_iter()
                .map(|(_, name, reasons)| (name, reasons))
                .collect(),
            pinned,
            totals,
        }
    }

    /// Number of enums that could not be unboxed, pinned ones included.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.ineligible.len() + self.pinned.len()
    }

    /// Logs the report and records it as an [`EventKind::Info`] event.
    pub fn emit(&self, events: &EventLog) {
        let text = self.to_string();
        for line in text.lines() {
            info!("{line}");
        }
        events.record(EventKind::Info).message(text);
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unboxed {} enums", self.unboxed.len())?;
        for name in &self.unboxed {
            writeln!(f, "  {name}")?;
        }
        writeln!(f, "Unable to unbox {} enums", self.rejected_count())?;
        if !self.pinned.is_empty() {
            writeln!(f, "Pinned: {}", self.pinned.join(", "))?;
        }
        for (name, reasons) in &self.ineligible {
            writeln!(f, "  {name}")?;
            for (reason, count) in reasons {
                if *count > 1 {
                    writeln!(f, "    {reason} (x{count})")?;
                } else {
                    writeln!(f, "    {reason}")?;
                }
            }
        }
        if !self.totals.is_empty() {
            writeln!(f, "Reasons:")?;
            for (kind, count) in &self.totals {
                writeln!(f, "  {kind}: {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EnumData;

    #[test]
    fn test_report_orders_and_counts() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let op = symbols.class("com.example.Op");
        let mode = symbols.class("com.example.Mode");
        let kept = symbols.class("com.example.Kept");

        let mut data = EnumDataMap::empty();
        data.insert(color, EnumData::default());

        let rejections = vec![
            (kept, vec![Reason::Pinned]),
            (
                op,
                vec![Reason::DownCast, Reason::DownCast, Reason::InvalidPhi],
            ),
            (mode, vec![Reason::InvalidPhi]),
        ];
        let report = AnalysisReport::build(&symbols, &data, &rejections);

        assert_eq!(report.unboxed, vec!["com.example.Color".to_string()]);
        assert_eq!(report.pinned, vec!["com.example.Kept".to_string()]);
        assert_eq!(report.ineligible[0].0, "com.example.Mode");
        assert_eq!(
            report.ineligible[1].1,
            vec![("DownCast".to_string(), 2), ("InvalidPhi".to_string(), 1)]
        );
        assert_eq!(report.rejected_count(), 3);
        assert_eq!(report.totals[0], (ReasonKind::DownCast, 2));
        assert_eq!(report.totals[1], (ReasonKind::InvalidPhi, 2));
        assert_eq!(report.totals[2], (ReasonKind::Pinned, 1));

        let text = report.to_string();
        assert!(text.contains("Unable to unbox 3 enums"));
        assert!(text.contains("Pinned: com.example.Kept"));
        assert!(text.contains("DownCast (x2)"));
    }

    #[test]
    fn test_emit_records_info_event() {
        let symbols = Symbols::new();
        let report = AnalysisReport::build(&symbols, &EnumDataMap::empty(), &[]);
        let events = EventLog::new();
        report.emit(&events);
        assert_eq!(events.count_kind(EventKind::Info), 1);
    }
}
