//! CSV and JSON encoding of translation records.
//!
//! A [`Report`] collects one [`TranslationRecord`] per translated address. CSV output has a
//! header line that depends on the [`OutputMode`] and on whether page details are shown;
//! JSON output serializes the whole report together with a timestamp.

use itertools::Itertools;
use serde::Serialize;

use crate::decode::Translation;
use crate::memory::{DramAddr, VirtualPage};

/// Which stages of the translation are run and reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Virtual to physical address only
    VirtToPhys,
    /// Physical to DRAM address only
    PhysToDram,
    /// Virtual to physical to DRAM address
    VirtToDram,
}

impl OutputMode {
    /// Returns `true` if the mode starts from virtual addresses.
    pub fn has_virtual(&self) -> bool {
        matches!(self, OutputMode::VirtToPhys | OutputMode::VirtToDram)
    }

    /// Returns `true` if the mode decodes physical addresses.
    pub fn has_dram(&self) -> bool {
        matches!(self, OutputMode::PhysToDram | OutputMode::VirtToDram)
    }
}

const DRAM_COLUMNS: [&str; 6] = ["node", "channel", "rank", "bank", "row", "col"];
const PAGE_COLUMNS: [&str; 8] = [
    "vpage_info",
    "vpage_present",
    "physical_frame",
    "vpage_shift",
    "vpage_size",
    "vpage_swapped",
    "vpage_swap_type",
    "vpage_swap_offset",
];

/// Result of translating one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TranslationRecord {
    /// Virtual address, if translation started from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_addr: Option<u64>,
    /// Physical address
    pub physical_addr: u64,
    /// Normalized DCT address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<u64>,
    /// Address within the rank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_addr: Option<u64>,
    /// Decoded DRAM address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dram: Option<DramAddr>,
    /// Pagemap details of the virtual page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<VirtualPage>,
}

impl TranslationRecord {
    /// Record of a physical address without any decoding.
    pub fn physical(physical_addr: u64) -> Self {
        TranslationRecord {
            virtual_addr: None,
            physical_addr,
            normalized: None,
            rank_addr: None,
            dram: None,
            page: None,
        }
    }

    /// Record of a virtual address and the page that backs it.
    pub fn virtual_to_physical(virtual_addr: u64, physical_addr: u64, page: VirtualPage) -> Self {
        TranslationRecord {
            virtual_addr: Some(virtual_addr),
            page: Some(page),
            ..Self::physical(physical_addr)
        }
    }

    /// Adds the result of decoding the physical address.
    pub fn with_translation(self, translation: &Translation) -> Self {
        TranslationRecord {
            normalized: Some(translation.normalized),
            rank_addr: Some(translation.rank_addr),
            dram: Some(translation.dram),
            ..self
        }
    }

    /// CSV header line for `mode`, without trailing newline.
    pub fn csv_header(mode: OutputMode, verbose: bool) -> String {
        let mut columns = vec![];
        if mode.has_virtual() {
            columns.push("virtual_addr");
        }
        columns.push("physical_addr");
        if mode.has_dram() {
            columns.extend(DRAM_COLUMNS);
        }
        if verbose && mode.has_virtual() {
            columns.extend(PAGE_COLUMNS);
        }
        columns.join(",")
    }

    /// CSV line of this record for `mode`, without trailing newline.
    ///
    /// Fields that are missing from the record are left empty.
    pub fn csv_row(&self, mode: OutputMode, verbose: bool) -> String {
        let mut fields = vec![];
        if mode.has_virtual() {
            fields.push(self.virtual_addr.map(hex).unwrap_or_default());
        }
        fields.push(hex(self.physical_addr));
        if mode.has_dram() {
            match self.dram {
                Some(d) => fields.extend(
                    [d.node, d.channel, d.rank, d.bank, d.row, d.col].map(|v| v.to_string()),
                ),
                None => fields.extend(DRAM_COLUMNS.map(|_| String::new())),
            }
        }
        if verbose && mode.has_virtual() {
            match self.page {
                Some(p) => fields.extend([
                    hex(p.entry),
                    (p.present as u8).to_string(),
                    hex(p.pfn),
                    p.page_shift.to_string(),
                    p.page_size.to_string(),
                    (p.swapped as u8).to_string(),
                    p.swap_type.to_string(),
                    hex(p.swap_offset),
                ]),
                None => fields.extend(PAGE_COLUMNS.map(|_| String::new())),
            }
        }
        fields.iter().join(",")
    }
}

fn hex(v: u64) -> String {
    format!("{:#x}", v)
}

/// All records of one run, serializable as JSON.
#[derive(Debug, Serialize)]
pub struct Report {
    /// ISO 8601 timestamp of when the run started
    date: String,
    /// Stages that were run
    mode: OutputMode,
    /// One record per translated address
    records: Vec<TranslationRecord>,
}

impl Report {
    /// Creates an empty report timestamped now.
    pub fn new(mode: OutputMode) -> Self {
        Report {
            date: chrono::Local::now().to_rfc3339(),
            mode,
            records: vec![],
        }
    }

    /// Appends a record.
    pub fn push(&mut self, record: TranslationRecord) {
        self.records.push(record);
    }

    /// Number of records collected so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record was collected.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, Report, TranslationRecord};
    use crate::memory::{DramAddr, PageMapEntry, VirtualPage};

    fn record() -> TranslationRecord {
        let page = VirtualPage::new(0x7000_1234, PageMapEntry((1 << 63) | (12 << 55) | 0x42));
        let mut r = TranslationRecord::virtual_to_physical(0x7000_1234, 0x4_2234, page);
        r.dram = Some(DramAddr::new(0, 1, 2, 3, 400, 56));
        r
    }

    #[test]
    fn test_headers() {
        assert_eq!(
            TranslationRecord::csv_header(OutputMode::PhysToDram, false),
            "physical_addr,node,channel,rank,bank,row,col"
        );
        assert_eq!(
            TranslationRecord::csv_header(OutputMode::VirtToPhys, false),
            "virtual_addr,physical_addr"
        );
        assert_eq!(
            TranslationRecord::csv_header(OutputMode::VirtToDram, false),
            "virtual_addr,physical_addr,node,channel,rank,bank,row,col"
        );
        assert!(
            TranslationRecord::csv_header(OutputMode::VirtToPhys, true)
                .ends_with(",vpage_swap_type,vpage_swap_offset")
        );
        // physical input has no page columns
        assert_eq!(
            TranslationRecord::csv_header(OutputMode::PhysToDram, true),
            TranslationRecord::csv_header(OutputMode::PhysToDram, false)
        );
    }

    #[test]
    fn test_rows() {
        let r = record();
        assert_eq!(r.csv_row(OutputMode::VirtToPhys, false), "0x70001234,0x42234");
        assert_eq!(
            r.csv_row(OutputMode::VirtToDram, false),
            "0x70001234,0x42234,0,1,2,3,400,56"
        );
        assert_eq!(
            r.csv_row(OutputMode::VirtToPhys, true),
            "0x70001234,0x42234,0x8600000000000042,1,0x42,12,4096,0,2,0x2"
        );
        assert_eq!(
            TranslationRecord::physical(0x1000).csv_row(OutputMode::PhysToDram, false),
            "0x1000,,,,,,"
        );
    }

    #[test]
    fn test_report() -> anyhow::Result<()> {
        let mut report = Report::new(OutputMode::VirtToDram);
        assert!(report.is_empty());
        report.push(record());
        report.push(TranslationRecord::physical(0x1000));
        assert_eq!(report.len(), 2);

        let json = serde_json::to_value(&report)?;
        assert_eq!(json["mode"], "virt_to_dram");
        assert_eq!(json["records"][0]["dram"]["row"], 400);
        assert!(json["records"][0].get("normalized").is_none());
        assert!(json["date"].is_string());
        // undecodable addresses keep their physical address only
        assert_eq!(json["records"][1]["physical_addr"], 0x1000);
        assert!(json["records"][1].get("dram").is_none());
        Ok(())
    }
}
