use crate::error::DataError;
use crate::models::{Cell, Frame};
use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};

/// Timestamp prefix format of saved input copies.
pub const TS_FMT: &str = "%Y%m%d_%H%M%S";

/// File and directory helpers for the file stage.
///
/// Reads and writes the tabular formats the pipeline accepts:
/// - `.csv` through `csv`
/// - `.xlsx`/`.xls` through `calamine` (read only)
/// - `.json` records or column-oriented objects through `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileManager;

impl FileManager {
    pub fn new() -> Self {
        Self
    }

    pub fn check_path_exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    pub fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    pub fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }

    /// Create the directory and its parents. Succeeds if it already exists.
    pub fn ensure_dir(&self, path: &Utf8Path) -> Result<Utf8PathBuf> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path))?;
        Ok(path.to_path_buf())
    }

    /// Regular files directly in `dir` whose extension is in `exts`
    /// (case-insensitive), sorted by path. A missing directory yields nothing.
    pub fn list_files_by_ext(
        &self,
        dir: &Utf8Path,
        exts: &[String],
    ) -> Result<Vec<Utf8PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let wanted: Vec<String> = exts.iter().map(|e| normalize_ext(e)).collect();

        let mut files = Vec::new();
        for entry in dir
            .read_dir_utf8()
            .with_context(|| format!("Failed to list directory: {}", dir))?
        {
            let entry = entry.with_context(|| format!("Failed to read entry in: {}", dir))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().map(normalize_ext).unwrap_or_default();
            if wanted.contains(&ext) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// `YYYYMMDD_HHMMSS_<basename>` for the current local time.
    pub fn make_timestamp_name(&self, src: &Utf8Path) -> String {
        let ts = chrono::Local::now().format(TS_FMT);
        format!("{}_{}", ts, src.file_name().unwrap_or_default())
    }

    /// Copy `src` into `dst_dir`, optionally under a new name.
    pub fn copy_file(
        &self,
        src: &Utf8Path,
        dst_dir: &Utf8Path,
        rename: Option<&str>,
    ) -> Result<Utf8PathBuf> {
        self.ensure_dir(dst_dir)?;
        let name = match rename {
            Some(name) => name.to_string(),
            None => src.file_name().unwrap_or_default().to_string(),
        };
        let dst = dst_dir.join(name);
        fs::copy(src, &dst).with_context(|| format!("Failed to copy {} to {}", src, dst))?;
        Ok(dst)
    }

    /// Gzip `path` into `<path>.gz`.
    ///
    /// The original is removed only when `delete_original` is set and the gzip
    /// stream has been finished and flushed to disk.
    pub fn compress_file_gz(
        &self,
        path: &Utf8Path,
        delete_original: bool,
    ) -> Result<Utf8PathBuf> {
        let gz_path = Utf8PathBuf::from(format!("{}.gz", path));

        let mut input = BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path))?,
        );
        let output = File::create(&gz_path)
            .with_context(|| format!("Failed to create {}", gz_path))?;
        let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
        io::copy(&mut input, &mut encoder)
            .with_context(|| format!("Failed to compress {}", path))?;
        let mut writer = encoder
            .finish()
            .with_context(|| format!("Failed to finish gzip stream for {}", gz_path))?;
        writer.flush()?;
        writer
            .get_ref()
            .sync_all()
            .with_context(|| format!("Failed to sync {}", gz_path))?;

        if delete_original {
            fs::remove_file(path).with_context(|| format!("Failed to delete {}", path))?;
        }
        Ok(gz_path)
    }

    /// Read a tabular file, dispatching on the extension.
    pub fn read_file(&self, path: &Utf8Path) -> Result<Frame> {
        let ext = path.extension().map(normalize_ext).unwrap_or_default();
        match ext.as_str() {
            ".csv" => read_csv(path),
            ".xlsx" | ".xls" => read_excel(path),
            ".json" => read_json(path),
            _ => Err(DataError::UnsupportedExtension(ext).into()),
        }
    }

    /// Write a frame as csv or json records, creating parent directories.
    pub fn write_file(&self, frame: &Frame, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }
        let ext = path.extension().map(normalize_ext).unwrap_or_default();
        match ext.as_str() {
            ".csv" => {
                let mut writer = csv::Writer::from_path(path)
                    .with_context(|| format!("Failed to create {}", path))?;
                let columns = frame.cell_columns()?;
                writer.write_record(columns.iter().map(|(name, _)| name))?;
                for i in 0..frame.n_rows() {
                    writer.write_record(columns.iter().map(|(_, values)| values[i].to_string()))?;
                }
                writer.flush()?;
                Ok(())
            }
            ".json" => {
                let file =
                    File::create(path).with_context(|| format!("Failed to create {}", path))?;
                serde_json::to_writer(BufWriter::new(file), &frame.to_records()?)
                    .with_context(|| format!("Failed to write {}", path))?;
                Ok(())
            }
            _ => Err(DataError::UnsupportedExtension(ext).into()),
        }
    }
}

fn normalize_ext(ext: &str) -> String {
    let lower = ext.to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Unique column names from a raw header row.
///
/// Repeats of `a` become `a.1`, `a.2`, ... and blank names become
/// `Unnamed: <position>`, so every field keeps its own column.
pub fn dedupe_headers<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut taken: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.as_ref();
            let base = if name.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name.to_string()
            };
            let mut candidate = base.clone();
            while taken.contains(&candidate) {
                let n = repeats.entry(base.clone()).or_insert(0);
                *n += 1;
                candidate = format!("{}.{}", base, n);
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn read_csv(path: &Utf8Path) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path))?;

    let headers = dedupe_headers(
        reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path))?
            .iter(),
    );

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| DataError::MalformedRecord(format!("{}: {}", path, e)))?;
        for (values, field) in columns.iter_mut().zip(record.iter()) {
            values.push(Cell::parse(field));
        }
    }
    Ok(Frame::from_columns(headers.into_iter().zip(columns).collect())?)
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Bool(b) => Cell::Bool(*b),
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Cell::Int(*v as i64),
        Data::Float(v) => Cell::Float(*v),
        Data::String(s) if s.trim().is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn read_excel(path: &Utf8Path) -> Result<Frame> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Failed to open workbook {}", path))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        bail!("Workbook {} has no sheets", path);
    };
    let range = range.with_context(|| format!("Failed to read first sheet of {}", path))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Frame::new());
    };
    let headers = dedupe_headers(header.iter().map(|h| h.to_string()));
    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (j, values) in columns.iter_mut().enumerate() {
            values.push(row.get(j).map(excel_cell).unwrap_or(Cell::Null));
        }
    }
    Ok(Frame::from_columns(headers.into_iter().zip(columns).collect())?)
}

fn read_json(path: &Utf8Path) -> Result<Frame> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path))?;
    Ok(frame_from_json_table(&value)?)
}

/// JSON table in any of the layouts the file stage accepts:
/// `[{col: v}]`, `{col: [v]}` or `{col: {row: v}}`.
pub fn frame_from_json_table(value: &Value) -> Result<Frame, DataError> {
    match value {
        Value::Array(items) => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let Value::Object(map) = item else {
                    return Err(DataError::UnsupportedRawData(
                        "JSON array items must be objects".to_string(),
                    ));
                };
                records.push(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                        .collect::<IndexMap<_, _>>(),
                );
            }
            Frame::from_records(&records)
        }
        Value::Object(map) if map.values().all(Value::is_array) => {
            let columns = map
                .iter()
                .map(|(k, v)| {
                    let values = v
                        .as_array()
                        .map(|a| a.iter().map(Cell::from_json).collect())
                        .unwrap_or_default();
                    (k.clone(), values)
                })
                .collect();
            Frame::from_columns(columns)
        }
        Value::Object(map) if map.values().all(Value::is_object) => {
            let columns = map
                .iter()
                .map(|(k, v)| {
                    let values = v
                        .as_object()
                        .map(|o| o.values().map(Cell::from_json).collect())
                        .unwrap_or_default();
                    (k.clone(), values)
                })
                .collect();
            Frame::from_columns(columns)
        }
        other => Err(DataError::UnsupportedRawData(format!(
            "JSON table expected, got {}",
            json_kind(other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_list_files_by_ext_sorted_and_case_insensitive() {
        let (_dir, root) = temp_root();
        fs::write(root.join("b.CSV"), "a\n1\n").unwrap();
        fs::write(root.join("a.json"), "[]").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::create_dir(root.join("nested.csv")).unwrap();

        let fm = FileManager::new();
        let files = fm
            .list_files_by_ext(&root, &[".csv".to_string(), "json".to_string()])
            .unwrap();
        let names: Vec<&str> = files.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, vec!["a.json", "b.CSV"]);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let (_dir, root) = temp_root();
        let fm = FileManager::new();
        assert!(fm
            .list_files_by_ext(&root.join("absent"), &[".csv".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_timestamp_name_shape() {
        let name = FileManager::new().make_timestamp_name(Utf8Path::new("/x/input.csv"));
        assert!(name.ends_with("_input.csv"));
        assert_eq!(name.len(), "YYYYMMDD_HHMMSS_input.csv".len());
    }

    #[test]
    fn test_compress_keeps_original_unless_asked() {
        let (_dir, root) = temp_root();
        let src = root.join("data.csv");
        fs::write(&src, "a,b\n1,2\n").unwrap();
        let fm = FileManager::new();

        let gz = fm.compress_file_gz(&src, false).unwrap();
        assert!(src.exists());
        assert_eq!(gz, root.join("data.csv.gz"));

        let mut decoded = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "a,b\n1,2\n");

        fm.compress_file_gz(&src, true).unwrap();
        assert!(!src.exists());
    }

    #[test]
    fn test_compress_failure_keeps_nothing_deleted() {
        let (_dir, root) = temp_root();
        let fm = FileManager::new();
        assert!(fm.compress_file_gz(&root.join("absent.csv"), true).is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let (_dir, root) = temp_root();
        let src = root.join("in.csv");
        fs::write(&src, "a,b,c\n1,2.5,x\n,3.0,y\n").unwrap();
        let fm = FileManager::new();

        let frame = fm.read_file(&src).unwrap();
        assert_eq!(frame.shape(), (2, 3));
        assert_eq!(frame.column("a").unwrap()[1], Cell::Null);
        assert_eq!(frame.column("c").unwrap()[0], Cell::Text("x".into()));

        let out = root.join("out/copy.csv");
        fm.write_file(&frame, &out).unwrap();
        let back = fm.read_file(&out).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_read_json_layouts() {
        let records = serde_json::json!([{"a": 1, "b": "x"}, {"a": 2}]);
        let frame = frame_from_json_table(&records).unwrap();
        assert_eq!(frame.shape(), (2, 2));

        let columns = serde_json::json!({"a": [1, 2, 3], "b": [0.5, 1.5, 2.5]});
        assert_eq!(frame_from_json_table(&columns).unwrap().shape(), (3, 2));

        let nested = serde_json::json!({"a": {"0": 1, "1": 2}});
        assert_eq!(frame_from_json_table(&nested).unwrap().shape(), (2, 1));

        assert!(frame_from_json_table(&serde_json::json!(3)).is_err());
    }

    #[test]
    fn test_dedupe_headers() {
        assert_eq!(dedupe_headers(["a", "a", "b", "a"]), vec!["a", "a.1", "b", "a.2"]);
        assert_eq!(dedupe_headers(["a", "a.1", "a"]), vec!["a", "a.1", "a.2"]);
        assert_eq!(dedupe_headers(["x", " ", ""]), vec!["x", "Unnamed: 1", "Unnamed: 2"]);
    }

    #[test]
    fn test_unsupported_extension() {
        let (_dir, root) = temp_root();
        let path = root.join("data.parquet");
        fs::write(&path, "x").unwrap();
        let err = FileManager::new().read_file(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported extension"));
    }
}
