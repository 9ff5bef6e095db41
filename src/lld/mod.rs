mod snapshot;

pub use snapshot::export_snapshot;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{DeviceSheetLayout, LinkSheetLayout, LldLayout, TableLayout};
use crate::models::{device_role, normalize_purpose, DeviceRecord, LinkEndpoint, LinkRecord};
use crate::utils::{is_placeholder, is_valid_ipv4, model_from_device_name, snake_case_header};

/// The LLD is malformed. Fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFormatError {
    #[error("cannot open LLD workbook {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },
    #[error("sheet '{sheet}' not found in the LLD")]
    MissingSheet { sheet: String },
    #[error("sheet '{sheet}': marker '{marker}' not found")]
    MissingMarker { sheet: String, marker: String },
    #[error("sheet '{sheet}': no header row")]
    MissingHeader { sheet: String },
    #[error("sheet '{sheet}': column '{column}' not found")]
    MissingColumn { sheet: String, column: String },
    #[error("sheet '{sheet}' row {row}: '{column}' is empty")]
    EmptyCell { sheet: String, row: usize, column: String },
    #[error("sheet '{sheet}' row {row}: device {device} is listed again with a different {field}")]
    DuplicateDevice {
        sheet: String,
        row: usize,
        device: String,
        field: String,
    },
}

/// Cell text of one sheet. Row index 0 is spreadsheet row 1.
pub type SheetRows = Vec<Vec<String>>;

/// SheetSource hands out sheets as rows of cell text
pub trait SheetSource {
    /// Rows of `name`, or None if the workbook has no such sheet
    fn sheet(&mut self, name: &str) -> Result<Option<SheetRows>, SourceFormatError>;
}

/// An .xlsx LLD on disk, read with calamine
pub struct WorkbookSource {
    path: PathBuf,
    workbook: Xlsx<BufReader<File>>,
}

impl WorkbookSource {
    pub fn open(path: &Path) -> Result<Self, SourceFormatError> {
        let workbook: Xlsx<_> = open_workbook(path).map_err(|e: calamine::XlsxError| {
            SourceFormatError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        tracing::debug!("Opened LLD workbook {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl SheetSource for WorkbookSource {
    fn sheet(&mut self, name: &str) -> Result<Option<SheetRows>, SourceFormatError> {
        if !self.workbook.sheet_names().iter().any(|s| s == name) {
            return Ok(None);
        }
        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| SourceFormatError::Open {
                path: self.path.clone(),
                reason: format!("sheet '{}': {}", name, e),
            })?;
        Ok(Some(range_to_rows(&range)))
    }
}

/// Flatten a calamine range into text rows, padded so that indexes match
/// spreadsheet positions even when the used range does not start at A1
fn range_to_rows(range: &Range<Data>) -> SheetRows {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: SheetRows = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_offset];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    rows
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{dt:?}"),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// In-memory sheets for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemorySheets {
    sheets: HashMap<String, SheetRows>,
}

#[cfg(test)]
impl MemorySheets {
    pub fn with_sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.insert(name.to_string(), rows);
        self
    }
}

#[cfg(test)]
impl SheetSource for MemorySheets {
    fn sheet(&mut self, name: &str) -> Result<Option<SheetRows>, SourceFormatError> {
        Ok(self.sheets.get(name).cloned())
    }
}

/// One row of a per-device table, keyed by snake_cased header. Unset cells are absent.
pub type TableRow = BTreeMap<String, String>;

/// Rows of every configured table for one device, keyed by table name
pub type DeviceTables<'a> = BTreeMap<&'a str, &'a [TableRow]>;

/// Everything the pipeline needs from one LLD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LldData {
    pub devices: Vec<DeviceRecord>,
    pub links: Vec<LinkRecord>,
    /// table name -> device name -> rows in sheet order
    pub tables: BTreeMap<String, BTreeMap<String, Vec<TableRow>>>,
}

impl LldData {
    /// Links with `device` on either end, in sheet order
    pub fn links_for(&self, device: &str) -> Vec<&LinkRecord> {
        self.links.iter().filter(|l| l.involves(device)).collect()
    }

    /// Every configured table for `device`; tables without rows for it are empty
    pub fn tables_for(&self, device: &str) -> DeviceTables<'_> {
        self.tables
            .iter()
            .map(|(name, by_device)| {
                let rows = by_device.get(device).map(Vec::as_slice).unwrap_or(&[]);
                (name.as_str(), rows)
            })
            .collect()
    }
}

fn row_contains(row: &[String], marker: &str) -> bool {
    row.iter().any(|c| c.contains(marker))
}

/// A located table: header lookup plus data rows with their spreadsheet row numbers
struct Table {
    sheet: String,
    headers: Vec<String>,
    columns: HashMap<String, usize>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    fn locate(
        sheet: &str,
        rows: SheetRows,
        start_marker: Option<&str>,
        end_marker: Option<&str>,
    ) -> Result<Self, SourceFormatError> {
        let mut idx = match start_marker {
            Some(marker) => {
                rows.iter()
                    .position(|r| row_contains(r, marker))
                    .ok_or_else(|| SourceFormatError::MissingMarker {
                        sheet: sheet.to_string(),
                        marker: marker.to_string(),
                    })?
                    + 1
            }
            None => 0,
        };
        while idx < rows.len() && rows[idx].iter().all(|c| c.trim().is_empty()) {
            idx += 1;
        }
        if idx >= rows.len() {
            return Err(SourceFormatError::MissingHeader {
                sheet: sheet.to_string(),
            });
        }

        let headers: Vec<String> = rows[idx].iter().map(|h| h.trim().to_string()).collect();
        let columns = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();

        let mut data = Vec::new();
        for (offset, row) in rows.into_iter().enumerate().skip(idx + 1) {
            if let Some(marker) = end_marker {
                if row_contains(&row, marker) {
                    break;
                }
            }
            data.push((offset + 1, row));
        }

        Ok(Self {
            sheet: sheet.to_string(),
            headers,
            columns,
            rows: data,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(&name.trim().to_lowercase()).copied()
    }

    fn required_column(&self, name: &str) -> Result<usize, SourceFormatError> {
        self.column(name).ok_or_else(|| SourceFormatError::MissingColumn {
            sheet: self.sheet.clone(),
            column: name.to_string(),
        })
    }
}

/// Cell value, or None if the cell is absent or a placeholder
fn value(row: &[String], col: Option<usize>) -> Option<String> {
    let cell = row.get(col?)?;
    if is_placeholder(cell) {
        None
    } else {
        Some(cell.trim().to_string())
    }
}

/// Extractor turns LLD sheets into device and link records plus the
/// per-device planning tables. Sheet and column names come from [`LldLayout`].
pub struct Extractor<'a> {
    layout: &'a LldLayout,
}

impl<'a> Extractor<'a> {
    pub fn new(layout: &'a LldLayout) -> Self {
        Self { layout }
    }

    pub fn extract(&self, source: &mut dyn SheetSource) -> Result<LldData, SourceFormatError> {
        let (devices, excluded) = self.extract_devices(source, &self.layout.devices)?;
        let links = self.extract_links(source, &self.layout.links)?;

        let mut tables = BTreeMap::new();
        for (name, layout) in &self.layout.tables {
            tables.insert(name.clone(), self.extract_table(source, name, layout)?);
        }

        let known: HashSet<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        for link in &links {
            for end in [&link.local, &link.remote] {
                let name = end.device.as_str();
                if !known.contains(name) && !excluded.contains(name) {
                    tracing::warn!(
                        "Link {}:{} <-> {}:{} references device {} that is not in the inventory",
                        link.local.device,
                        link.local.interface,
                        link.remote.device,
                        link.remote.interface,
                        name
                    );
                }
            }
        }

        tracing::info!(
            "Extracted {} devices, {} links and {} tables from LLD",
            devices.len(),
            links.len(),
            tables.len()
        );
        Ok(LldData {
            devices,
            links,
            tables,
        })
    }

    fn load(
        &self,
        source: &mut dyn SheetSource,
        sheet: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Table, SourceFormatError> {
        let rows = source
            .sheet(sheet)?
            .ok_or_else(|| SourceFormatError::MissingSheet {
                sheet: sheet.to_string(),
            })?;
        Table::locate(sheet, rows, start, end)
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.layout
            .exclude
            .iter()
            .any(|p| !p.is_empty() && name.contains(p.as_str()))
    }

    /// Device records in sheet order, deduplicated by name, plus the names
    /// that were dropped by the exclude list
    fn extract_devices(
        &self,
        source: &mut dyn SheetSource,
        layout: &DeviceSheetLayout,
    ) -> Result<(Vec<DeviceRecord>, HashSet<String>), SourceFormatError> {
        let table = self.load(
            source,
            &layout.sheet,
            layout.start_marker.as_deref(),
            layout.end_marker.as_deref(),
        )?;
        let cols = &layout.columns;

        let name_col = table.required_column(&cols.name)?;
        let filter = match &layout.filter {
            Some(f) => Some((table.required_column(&f.column)?, f.value.trim())),
            None => None,
        };

        let known: Vec<String> = cols.known().iter().map(|c| c.trim().to_lowercase()).collect();
        let extra: Vec<(usize, String)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty() && !known.contains(&h.to_lowercase()))
            .map(|(i, h)| (i, snake_case_header(h)))
            .filter(|(_, key)| !key.is_empty())
            .collect();

        let mut devices: Vec<DeviceRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut excluded = HashSet::new();

        for (row_no, row) in &table.rows {
            let Some(name) = value(row, Some(name_col)) else {
                continue;
            };

            if let Some((col, wanted)) = filter {
                let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
                if !cell.eq_ignore_ascii_case(wanted) {
                    tracing::debug!("Row {}: {} filtered out ({})", row_no, name, cell);
                    continue;
                }
            }

            if self.is_excluded(&name) {
                tracing::debug!("Row {}: {} excluded from generation", row_no, name);
                excluded.insert(name);
                continue;
            }

            let mut record = DeviceRecord::new(name.clone());
            record.role = value(row, table.column(&cols.role))
                .map(|r| device_role::normalize(&r))
                .or_else(|| device_role::infer_from_name(&name).map(str::to_string));
            record.raw_model =
                value(row, table.column(&cols.model)).or_else(|| model_from_device_name(&name));
            record.management_ip = value(row, table.column(&cols.management_ip));
            if let Some(ip) = record.management_ip.as_deref().filter(|ip| !is_valid_ipv4(ip)) {
                tracing::warn!("Row {}: {} has management IP '{}', not an IPv4 address", row_no, name, ip);
            }
            record.management_mask = value(row, table.column(&cols.management_mask));
            record.management_vlan = value(row, table.column(&cols.management_vlan));
            record.loopback_ip = value(row, table.column(&cols.loopback_ip));
            record.site = value(row, table.column(&cols.site));
            record.rack = value(row, table.column(&cols.rack));
            for (col, key) in &extra {
                if let Some(v) = value(row, Some(*col)) {
                    record.attributes.insert(key.clone(), v);
                }
            }

            match index.get(&name) {
                Some(&existing) => {
                    if let Err(field) = devices[existing].merge_duplicate(record) {
                        return Err(SourceFormatError::DuplicateDevice {
                            sheet: table.sheet.clone(),
                            row: *row_no,
                            device: name,
                            field,
                        });
                    }
                    tracing::debug!("Row {}: duplicate of {} merged", row_no, name);
                }
                None => {
                    index.insert(name, devices.len());
                    devices.push(record);
                }
            }
        }

        Ok((devices, excluded))
    }

    fn extract_links(
        &self,
        source: &mut dyn SheetSource,
        layout: &LinkSheetLayout,
    ) -> Result<Vec<LinkRecord>, SourceFormatError> {
        let table = self.load(
            source,
            &layout.sheet,
            layout.start_marker.as_deref(),
            layout.end_marker.as_deref(),
        )?;
        let cols = &layout.columns;

        let required = [
            (&cols.local_device, table.required_column(&cols.local_device)?),
            (&cols.local_interface, table.required_column(&cols.local_interface)?),
            (&cols.remote_device, table.required_column(&cols.remote_device)?),
            (&cols.remote_interface, table.required_column(&cols.remote_interface)?),
        ];
        let purpose_col = table.column(&cols.purpose);
        let vlan_col = table.column(&cols.vlan);
        let subnet_col = table.column(&cols.subnet);

        let mut links = Vec::new();
        for (row_no, row) in &table.rows {
            let ends: Vec<Option<String>> =
                required.iter().map(|(_, col)| value(row, Some(*col))).collect();
            if ends.iter().all(Option::is_none) {
                continue;
            }
            let mut cells = Vec::with_capacity(4);
            for ((column, _), cell) in required.iter().zip(ends) {
                match cell {
                    Some(v) => cells.push(v),
                    None => {
                        return Err(SourceFormatError::EmptyCell {
                            sheet: table.sheet.clone(),
                            row: *row_no,
                            column: column.to_string(),
                        })
                    }
                }
            }
            let mut cells = cells.into_iter();
            let (Some(local_device), Some(local_interface), Some(remote_device), Some(remote_interface)) =
                (cells.next(), cells.next(), cells.next(), cells.next())
            else {
                continue;
            };

            links.push(LinkRecord {
                local: LinkEndpoint {
                    device: local_device,
                    interface: local_interface,
                },
                remote: LinkEndpoint {
                    device: remote_device,
                    interface: remote_interface,
                },
                purpose: value(row, purpose_col).map(|p| normalize_purpose(&p)),
                vlan: value(row, vlan_col),
                subnet: value(row, subnet_col),
            });
        }
        Ok(links)
    }

    /// Rows of one per-device table grouped by device name. Rows without a
    /// device name are skipped.
    fn extract_table(
        &self,
        source: &mut dyn SheetSource,
        name: &str,
        layout: &TableLayout,
    ) -> Result<BTreeMap<String, Vec<TableRow>>, SourceFormatError> {
        let Some(rows) = source.sheet(&layout.sheet)? else {
            if layout.optional {
                tracing::debug!("Table {}: sheet '{}' absent, no rows", name, layout.sheet);
                return Ok(BTreeMap::new());
            }
            return Err(SourceFormatError::MissingSheet {
                sheet: layout.sheet.clone(),
            });
        };
        let table = Table::locate(
            &layout.sheet,
            rows,
            layout.start_marker.as_deref(),
            layout.end_marker.as_deref(),
        )?;
        let device_col = table.required_column(&layout.device_column)?;
        let keys: Vec<(usize, String)> = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (i, snake_case_header(h)))
            .filter(|(_, key)| !key.is_empty())
            .collect();

        let mut by_device: BTreeMap<String, Vec<TableRow>> = BTreeMap::new();
        let mut count = 0;
        for (_, row) in &table.rows {
            let Some(device) = value(row, Some(device_col)) else {
                continue;
            };
            let fields: TableRow = keys
                .iter()
                .filter_map(|(col, key)| value(row, Some(*col)).map(|v| (key.clone(), v)))
                .collect();
            by_device.entry(device).or_default().push(fields);
            count += 1;
        }
        tracing::debug!("Table {}: {} rows for {} devices", name, count, by_device.len());
        Ok(by_device)
    }
}
