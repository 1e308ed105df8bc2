//! Statement tables: CSV exports with one transaction per row.
//!
//! Only the description, merchant category and type columns are interpreted;
//! every other column is carried through unchanged when the labeled table is
//! written back.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use supercat_core::{CategoryLabel, TransactionRecord};

/// Header names of the columns the classifier reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub description: String,
    pub merchant_category: String,
    pub transaction_type: String,
    /// Column the label is written to (appended if absent)
    pub label: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            description: "Description_Anon".to_string(),
            merchant_category: "Merchant_Category".to_string(),
            transaction_type: "Type".to_string(),
            label: "Super_Category".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTable {
    columns: ColumnMap,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    description_idx: usize,
    merchant_idx: usize,
    type_idx: usize,
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("missing column '{name}' (found: {})", headers.join(", ")))
}

impl LedgerTable {
    pub fn from_reader<R: Read>(reader: R, columns: &ColumnMap) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("read header row")?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let description_idx = column_index(&headers, &columns.description)?;
        let merchant_idx = column_index(&headers, &columns.merchant_category)?;
        let type_idx = column_index(&headers, &columns.transaction_type)?;

        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("read row {}", i + 1))?;
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            // Short rows get empty cells so every column index is valid.
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            rows.push(row);
        }

        Ok(Self {
            columns: columns.clone(),
            headers,
            rows,
            description_idx,
            merchant_idx,
            type_idx,
        })
    }

    pub fn read_path(path: impl AsRef<Path>, columns: &ColumnMap) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(file, columns).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// The three classified fields of every row, in row order, as written
    /// in the file. Padding whitespace is part of the fingerprint.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.rows
            .iter()
            .map(|row| {
                TransactionRecord::new(
                    row[self.description_idx].as_str(),
                    row[self.merchant_idx].as_str(),
                    row[self.type_idx].as_str(),
                )
            })
            .collect()
    }

    fn label_idx(&self) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == self.columns.label)
    }

    /// Parse an existing label column.
    pub fn labels(&self) -> Result<Vec<CategoryLabel>> {
        let idx = self
            .label_idx()
            .with_context(|| format!("missing column '{}'", self.columns.label))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row[idx]
                    .trim()
                    .parse::<CategoryLabel>()
                    .with_context(|| format!("row {}", i + 1))
            })
            .collect()
    }

    /// Write the table with the label column set from `labels` (one per row).
    pub fn write_labeled<W: Write>(&self, writer: W, labels: &[CategoryLabel]) -> Result<()> {
        if labels.len() != self.rows.len() {
            bail!(
                "got {} labels for {} rows",
                labels.len(),
                self.rows.len()
            );
        }

        let mut wtr = csv::Writer::from_writer(writer);
        let label_idx = self.label_idx();

        let mut headers = self.headers.clone();
        if label_idx.is_none() {
            headers.push(self.columns.label.clone());
        }
        wtr.write_record(&headers).context("write header row")?;

        for (row, label) in self.rows.iter().zip(labels) {
            let mut out = row.clone();
            match label_idx {
                Some(idx) => out[idx] = label.to_string(),
                None => out.push(label.to_string()),
            }
            wtr.write_record(&out).context("write row")?;
        }
        wtr.flush().context("flush csv")?;
        Ok(())
    }

    pub fn write_labeled_path(
        &self,
        path: impl AsRef<Path>,
        labels: &[CategoryLabel],
    ) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        self.write_labeled(file, labels)
            .with_context(|| format!("write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "\
Year,Month,Description_Anon,Merchant_Category,Type,Amount
2024,3,CARREFOUR MARKET,Groceries,card payment,-23.10
2024,3,SALARY PAYMENT FROM EMPLOYER,,topup,2100.00
2024,4,Transfer to PERSON_NAME,,transfer
";

    fn table() -> LedgerTable {
        LedgerTable::from_reader(STATEMENT.as_bytes(), &ColumnMap::default()).unwrap()
    }

    #[test]
    fn test_records_in_row_order() {
        let t = table();
        assert_eq!(t.len(), 3);
        let records = t.records();
        assert_eq!(
            records[0],
            TransactionRecord::new("CARREFOUR MARKET", "Groceries", "card payment")
        );
        assert_eq!(records[1].merchant_category, "");
        assert_eq!(records[2].transaction_type, "transfer");
    }

    #[test]
    fn test_records_keep_cell_whitespace() {
        let csv = "Description_Anon,Merchant_Category,Type\n  ALDI  , Groceries,card payment \n";
        let t = LedgerTable::from_reader(csv.as_bytes(), &ColumnMap::default()).unwrap();
        let r = &t.records()[0];
        assert_eq!(r.description, "  ALDI  ");
        assert_eq!(r.merchant_category, " Groceries");
        assert_eq!(r.transaction_type, "card payment ");
        let trimmed = TransactionRecord::new("ALDI", "Groceries", "card payment");
        assert_ne!(r.fingerprint(), trimmed.fingerprint());
    }

    #[test]
    fn test_missing_column_is_named() {
        let cols = ColumnMap {
            transaction_type: "Kind".to_string(),
            ..ColumnMap::default()
        };
        let err = LedgerTable::from_reader(STATEMENT.as_bytes(), &cols).unwrap_err();
        assert!(err.to_string().contains("missing column 'Kind'"));
    }

    #[test]
    fn test_write_appends_label_column() {
        let t = table();
        let labels = [
            CategoryLabel::EssentialLiving,
            CategoryLabel::IncomeReceipts,
            CategoryLabel::FinancialManagement,
        ];
        let mut buf = Vec::new();
        t.write_labeled(&mut buf, &labels).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Year,Month,Description_Anon,Merchant_Category,Type,Amount,Super_Category"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024,3,CARREFOUR MARKET,Groceries,card payment,-23.10,Essential_Living"
        );
        // The short row was padded before the label was appended.
        assert_eq!(
            lines.nth(1).unwrap(),
            "2024,4,Transfer to PERSON_NAME,,transfer,,Financial_Management"
        );
    }

    #[test]
    fn test_write_replaces_existing_label_column() {
        let t = table();
        let mut first = Vec::new();
        t.write_labeled(&mut first, &[CategoryLabel::Other; 3]).unwrap();

        let relabeled = LedgerTable::from_reader(first.as_slice(), &ColumnMap::default()).unwrap();
        assert_eq!(relabeled.labels().unwrap(), vec![CategoryLabel::Other; 3]);

        let mut second = Vec::new();
        relabeled
            .write_labeled(&mut second, &[CategoryLabel::LifestyleSpending; 3])
            .unwrap();
        let text = String::from_utf8(second).unwrap();
        assert_eq!(text.lines().next().unwrap().matches("Super_Category").count(), 1);
        assert!(!text.contains(",Other"));
    }

    #[test]
    fn test_label_count_mismatch() {
        let err = table()
            .write_labeled(Vec::new(), &[CategoryLabel::Other])
            .unwrap_err();
        assert_eq!(err.to_string(), "got 1 labels for 3 rows");
    }

    #[test]
    fn test_unknown_label_names_row() {
        let csv = "Description_Anon,Merchant_Category,Type,Super_Category\n\
                   a,b,c,Other\n\
                   d,e,f,Groceries\n";
        let t = LedgerTable::from_reader(csv.as_bytes(), &ColumnMap::default()).unwrap();
        let err = t.labels().unwrap_err();
        assert_eq!(err.to_string(), "row 2");
        assert!(format!("{err:#}").contains("unknown category label 'Groceries'"));
    }
}
